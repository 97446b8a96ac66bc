//! Encodes and decodes the `SyncdPatch`/`SyncdSnapshot` wire records into
//! plaintext [`ChatMutation`]s, maintaining the running [`LtHash`]
//! accumulator and the index→value-mac map needed to reverse a later
//! `REMOVE`.
//!
//! Wire shape per record: the index is never recoverable from the wire by
//! itself — `SyncdIndex.blob` is `HMAC(indexKey, json(index))`, one-way by
//! design, and only serves as a lookup key into the local index→value map.
//! The human-readable index and the opaque action payload both travel
//! inside the encrypted value blob here (`iv || AES-256-CBC(plaintext) ||
//! HMAC-SHA256(...)`), since the concrete per-action protobuf shapes
//! (contact mute, chat archive, pin, ...) are out of scope and are kept
//! whole as opaque bytes for the host application to interpret.

use std::collections::HashMap;

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{AppStateError, Result};
use crate::keys::MutationKeys;
use crate::lthash::LtHash;
use crate::mutation::{ChatMutation, SyncOperation};
use waproto::wa::{SyncdMutationSyncdOperation, SyncdPatch, SyncdRecord, SyncdSnapshot};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize, Deserialize)]
struct MutationPayload {
    index: Vec<String>,
    value: Vec<u8>,
}

fn hmac(key: &[u8; 32], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn op_byte(op: SyncOperation) -> u8 {
    match op {
        SyncOperation::Set => 0,
        SyncOperation::Remove => 1,
    }
}

/// Encrypts and MACs one mutation into wire form, returning the record plus
/// the `(index_mac, value_mac)` pair the caller folds into the LT-hash.
pub fn encode_mutation<R: RngCore>(
    operation: SyncOperation,
    chat: &ChatMutation,
    keys: &MutationKeys,
    key_id: &[u8],
    rng: &mut R,
) -> Result<(SyncdRecord, [u8; 32], [u8; 32])> {
    let index_json =
        serde_json::to_vec(&chat.index).map_err(|_| AppStateError::Malformed("index"))?;
    let index_mac = hmac(&keys.index_key, &[&index_json]);

    let payload = MutationPayload { index: chat.index.clone(), value: chat.value.clone() };
    let plaintext =
        serde_json::to_vec(&payload).map_err(|_| AppStateError::Malformed("payload"))?;

    let mut iv = [0u8; 16];
    rng.fill_bytes(&mut iv);
    let ciphertext = Aes256CbcEnc::new(&keys.value_encryption_key.into(), &iv.into())
        .encrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(&plaintext);

    let value_mac = hmac(
        &keys.value_mac_key,
        &[&[op_byte(operation)], key_id, &index_mac, &iv, &ciphertext],
    );

    let mut blob = Vec::with_capacity(iv.len() + ciphertext.len() + value_mac.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    blob.extend_from_slice(&value_mac);

    let record = SyncdRecord {
        index: Some(waproto::wa::SyncdIndex { blob: index_mac.to_vec() }),
        value: Some(waproto::wa::SyncdValue { blob }),
        key_id: Some(waproto::wa::KeyId { id: key_id.to_vec() }),
    };
    Ok((record, index_mac, value_mac))
}

fn decode_record(
    record: &SyncdRecord,
    keys: &MutationKeys,
    key_id: &[u8],
    operation: SyncOperation,
) -> Result<(ChatMutation, [u8; 32], [u8; 32])> {
    let index_mac: [u8; 32] = record
        .index
        .as_ref()
        .and_then(|i| i.blob.clone().try_into().ok())
        .ok_or(AppStateError::Malformed("index blob"))?;
    let blob = record
        .value
        .as_ref()
        .map(|v| v.blob.as_slice())
        .ok_or(AppStateError::Malformed("value blob"))?;
    if blob.len() < 16 + 32 {
        return Err(AppStateError::Malformed("value blob too short"));
    }
    let (iv_and_ciphertext, received_mac) = blob.split_at(blob.len() - 32);
    let (iv, ciphertext) = iv_and_ciphertext.split_at(16);

    let expected_mac = hmac(
        &keys.value_mac_key,
        &[&[op_byte(operation)], key_id, &index_mac, iv, ciphertext],
    );
    if !constant_time_eq(&expected_mac, received_mac) {
        return Err(AppStateError::ValueMacMismatch);
    }

    let plaintext = Aes256CbcDec::new(&keys.value_encryption_key.into(), iv.into())
        .decrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(ciphertext)
        .map_err(|_| AppStateError::Malformed("value padding"))?;
    let payload: MutationPayload =
        serde_json::from_slice(&plaintext).map_err(|_| AppStateError::Malformed("value json"))?;

    let chat = ChatMutation { operation, index: payload.index, value: payload.value };
    let mut value_mac = [0u8; 32];
    value_mac.copy_from_slice(received_mac);
    Ok((chat, index_mac, value_mac))
}

/// Applies one patch to the running hash/index map, returning the
/// mutations it carries and the version it advances to.
pub fn decode_patch(
    patch: &SyncdPatch,
    keys: &MutationKeys,
    key_id: &[u8],
    collection: &str,
    hash: &mut LtHash,
    index_value_map: &mut HashMap<[u8; 32], [u8; 32]>,
    verify_mac: bool,
) -> Result<(Vec<ChatMutation>, u64)> {
    let mut mutations = Vec::with_capacity(patch.mutations.len());
    for mutation in &patch.mutations {
        let operation = match mutation
            .operation
            .and_then(|raw| SyncdMutationSyncdOperation::try_from(raw).ok())
        {
            Some(SyncdMutationSyncdOperation::Remove) => SyncOperation::Remove,
            _ => SyncOperation::Set,
        };
        let record = mutation
            .record
            .as_ref()
            .ok_or(AppStateError::Malformed("mutation without record"))?;
        let (chat, index_mac, value_mac) = decode_record(record, keys, key_id, operation)?;

        match operation {
            SyncOperation::Set => {
                if let Some(previous) = index_value_map.get(&index_mac) {
                    hash.remove_entry(&index_mac, previous);
                }
                hash.add_entry(&index_mac, &value_mac);
                index_value_map.insert(index_mac, value_mac);
            }
            SyncOperation::Remove => {
                let previous = index_value_map
                    .remove(&index_mac)
                    .ok_or(AppStateError::UnknownIndex)?;
                hash.remove_entry(&index_mac, &previous);
            }
        }
        mutations.push(chat);
    }

    let version = patch.version.as_ref().and_then(|v| v.version).unwrap_or(0);
    if verify_mac {
        let expected = hmac(&keys.patch_mac_key, &[&hash.to_bytes(), &version.to_be_bytes(), key_id]);
        let received = patch.patch_mac.as_slice();
        if !constant_time_eq(&expected, received) {
            return Err(AppStateError::PatchMacMismatch(collection.to_owned()));
        }
    }

    Ok((mutations, version))
}

/// Decodes a full snapshot, rebuilding the hash and index map from scratch.
pub fn decode_snapshot(
    snapshot: &SyncdSnapshot,
    keys: &MutationKeys,
    key_id: &[u8],
    collection: &str,
    verify_mac: bool,
) -> Result<(Vec<ChatMutation>, LtHash, HashMap<[u8; 32], [u8; 32]>, u64)> {
    let mut hash = LtHash::zero();
    let mut index_value_map = HashMap::with_capacity(snapshot.records.len());
    let mut mutations = Vec::with_capacity(snapshot.records.len());

    for record in &snapshot.records {
        let (chat, index_mac, value_mac) = decode_record(record, keys, key_id, SyncOperation::Set)?;
        hash.add_entry(&index_mac, &value_mac);
        index_value_map.insert(index_mac, value_mac);
        mutations.push(chat);
    }

    let version = snapshot.version.as_ref().and_then(|v| v.version).unwrap_or(0);
    if verify_mac {
        let expected = hmac(&keys.snapshot_mac_key, &[&hash.to_bytes(), &version.to_be_bytes(), key_id]);
        if !constant_time_eq(&expected, &snapshot.mac) {
            return Err(AppStateError::SnapshotMacMismatch(collection.to_owned()));
        }
    }

    Ok((mutations, hash, index_value_map, version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use waproto::wa::{SyncdVersion, KeyId as WaKeyId};

    fn sample_mutation(index: &[&str], value: &[u8]) -> ChatMutation {
        ChatMutation {
            operation: SyncOperation::Set,
            index: index.iter().map(|s| s.to_string()).collect(),
            value: value.to_vec(),
        }
    }

    #[test]
    fn patch_round_trips_and_mac_verifies() {
        let keys = MutationKeys::derive(&[3u8; 32]);
        let key_id = b"key-1";
        let mut rng = OsRng;

        let chat = sample_mutation(&["mute", "1555@s.whatsapp.net"], b"opaque-action-bytes");
        let (record, index_mac, value_mac) =
            encode_mutation(SyncOperation::Set, &chat, &keys, key_id, &mut rng).expect("encode");

        let mut hash = LtHash::zero();
        hash.add_entry(&index_mac, &value_mac);

        let patch_mac = hmac(&keys.patch_mac_key, &[&hash.to_bytes(), &1u64.to_be_bytes(), key_id]);
        let patch = SyncdPatch {
            version: Some(SyncdVersion { version: Some(1) }),
            mutations: vec![waproto::wa::SyncdMutation {
                operation: Some(SyncdMutationSyncdOperation::Set as i32),
                record: Some(record),
            }],
            external_mutations: None,
            snapshot_mac: Vec::new(),
            key_id: Some(WaKeyId { id: key_id.to_vec() }),
            patch_mac: patch_mac.to_vec(),
        };

        let mut decode_hash = LtHash::zero();
        let mut map = HashMap::new();
        let (decoded, version) =
            decode_patch(&patch, &keys, key_id, "regular", &mut decode_hash, &mut map, true)
                .expect("decode");

        assert_eq!(version, 1);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].value, b"opaque-action-bytes");
        assert_eq!(decode_hash, hash);
    }

    #[test]
    fn tampered_patch_mac_is_rejected() {
        let keys = MutationKeys::derive(&[4u8; 32]);
        let key_id = b"key-1";
        let mut rng = OsRng;
        let chat = sample_mutation(&["archive"], b"x");
        let (record, _, _) =
            encode_mutation(SyncOperation::Set, &chat, &keys, key_id, &mut rng).expect("encode");

        let patch = SyncdPatch {
            version: Some(SyncdVersion { version: Some(1) }),
            mutations: vec![waproto::wa::SyncdMutation {
                operation: Some(SyncdMutationSyncdOperation::Set as i32),
                record: Some(record),
            }],
            external_mutations: None,
            snapshot_mac: Vec::new(),
            key_id: Some(WaKeyId { id: key_id.to_vec() }),
            patch_mac: vec![0u8; 32],
        };

        let mut hash = LtHash::zero();
        let mut map = HashMap::new();
        let result = decode_patch(&patch, &keys, key_id, "regular", &mut hash, &mut map, true);
        assert!(matches!(result, Err(AppStateError::PatchMacMismatch(_))));
    }
}
