//! Pairwise ratchet session: an X3DH-style handshake followed by a
//! symmetric-key KDF chain per direction. This is the concrete engine behind
//! the `pkmsg`/`msg` ciphertext kinds the wire protocol distinguishes.
//!
//! Simplification from the textbook Double Ratchet: the DH step runs once,
//! at session establishment, instead of being re-run on every change of
//! sender. Within a session each direction advances its own symmetric
//! chain. This is sufficient for the core's needs — the surrounding system
//! treats session internals as opaque — and keeps the implementation within
//! scope.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{Result, SignalError};
use crate::kdf::{chain_step, derive_root_key, expand_message_key};
use crate::keys::{KeyPair, PreKeyBundle};

const INFO: &[u8] = b"warp_core-libsignal-x3dh";

/// Header a freshly established outgoing session must attach to its first
/// ciphertext so the remote side can perform the matching X3DH derivation.
#[derive(Clone, Debug)]
pub struct PreKeyHeader {
    pub registration_id: u32,
    pub pre_key_id: Option<u32>,
    pub signed_pre_key_id: u32,
    pub base_key: [u8; 32],
    pub identity_key: [u8; 32],
}

impl PreKeyHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 1 + 4 + 4 + 32 + 32);
        out.extend_from_slice(&self.registration_id.to_be_bytes());
        match self.pre_key_id {
            Some(id) => {
                out.push(1);
                out.extend_from_slice(&id.to_be_bytes());
            }
            None => {
                out.push(0);
                out.extend_from_slice(&0u32.to_be_bytes());
            }
        }
        out.extend_from_slice(&self.signed_pre_key_id.to_be_bytes());
        out.extend_from_slice(&self.base_key);
        out.extend_from_slice(&self.identity_key);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8])> {
        if buf.len() < 77 {
            return Err(SignalError::InvalidCiphertext);
        }
        let registration_id = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let has_pre_key = buf[4] == 1;
        let pre_key_id_raw = u32::from_be_bytes(buf[5..9].try_into().unwrap());
        let pre_key_id = has_pre_key.then_some(pre_key_id_raw);
        let signed_pre_key_id = u32::from_be_bytes(buf[9..13].try_into().unwrap());
        let mut base_key = [0u8; 32];
        base_key.copy_from_slice(&buf[13..45]);
        let mut identity_key = [0u8; 32];
        identity_key.copy_from_slice(&buf[45..77]);
        Ok((
            Self {
                registration_id,
                pre_key_id,
                signed_pre_key_id,
                base_key,
                identity_key,
            },
            &buf[77..],
        ))
    }
}

/// A live pairwise session with one remote device.
#[derive(Clone, Debug)]
pub struct Session {
    pub remote_identity: [u8; 32],
    send_chain_key: [u8; 32],
    recv_chain_key: [u8; 32],
    send_counter: u32,
    recv_counter: u32,
    pending_header: Option<PreKeyHeader>,
}

impl Session {
    /// Initiates a session toward a peer using its published [`PreKeyBundle`],
    /// returning the established session plus the header that must be
    /// attached to the first outbound ciphertext (a `pkmsg`).
    pub fn initiate<R: RngCore + CryptoRng>(
        local_identity: &KeyPair,
        local_registration_id: u32,
        bundle: &PreKeyBundle,
        rng: &mut R,
    ) -> Result<Self> {
        verify_signed_pre_key(bundle)?;

        let base_key = KeyPair::generate(rng);
        let remote_identity = PublicKey::from(bundle.identity_key);
        let remote_signed_pre_key = PublicKey::from(bundle.signed_pre_key.key_pair.0);
        let remote_one_time = bundle.pre_key.as_ref().map(|pk| PublicKey::from(pk.key_pair.0));

        let dh1 = dh(&local_identity.private, &remote_signed_pre_key);
        let dh2 = dh(&base_key.private, &remote_identity);
        let dh3 = dh(&base_key.private, &remote_signed_pre_key);
        let mut dh_outputs = vec![dh1, dh2, dh3];
        if let Some(remote_one_time) = remote_one_time {
            dh_outputs.push(dh(&base_key.private, &remote_one_time));
        }

        let root_key = derive_root_key(&dh_outputs, INFO);
        // Initiator sends on the first derived chain, receives on the second;
        // the responder mirrors this when it processes the header.
        let (send_chain_key, recv_chain_key) = split_root(&root_key);

        Ok(Self {
            remote_identity: bundle.identity_key,
            send_chain_key,
            recv_chain_key,
            send_counter: 0,
            recv_counter: 0,
            pending_header: Some(PreKeyHeader {
                registration_id: local_registration_id,
                pre_key_id: bundle.pre_key.as_ref().map(|pk| pk.id),
                signed_pre_key_id: bundle.signed_pre_key.id,
                base_key: base_key.public_bytes(),
                identity_key: local_identity.public_bytes(),
            }),
        })
    }

    /// Processes an incoming `pkmsg` header, establishing the session from
    /// the responder's side.
    pub fn accept(
        local_identity: &KeyPair,
        local_signed_pre_key: &KeyPair,
        local_one_time_pre_key: Option<&KeyPair>,
        header: &PreKeyHeader,
    ) -> Result<Self> {
        let remote_identity = PublicKey::from(header.identity_key);
        let remote_base_key = PublicKey::from(header.base_key);

        let dh1 = dh(&local_signed_pre_key.private, &remote_identity);
        let dh2 = dh(&local_identity.private, &remote_base_key);
        let dh3 = dh(&local_signed_pre_key.private, &remote_base_key);
        let mut dh_outputs = vec![dh1, dh2, dh3];
        if let Some(one_time) = local_one_time_pre_key {
            dh_outputs.push(dh(&one_time.private, &remote_base_key));
        }

        let root_key = derive_root_key(&dh_outputs, INFO);
        // Mirror of `initiate`: what the initiator sends on, we receive on.
        let (recv_chain_key, send_chain_key) = split_root(&root_key);

        Ok(Self {
            remote_identity: header.identity_key,
            send_chain_key,
            recv_chain_key,
            send_counter: 0,
            recv_counter: 0,
            pending_header: None,
        })
    }

    /// Whether the next call to [`Session::encrypt`] will attach a
    /// [`PreKeyHeader`] (i.e. this session hasn't had a confirmed round trip
    /// yet, so the wire message must still be a `pkmsg`).
    pub fn is_pending_confirmation(&self) -> bool {
        self.pending_header.is_some()
    }

    /// Clears the pending pre-key header once the session is confirmed,
    /// e.g. after the peer sends a plain `msg` back.
    pub fn confirm(&mut self) {
        self.pending_header = None;
    }

    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<(Vec<u8>, Option<PreKeyHeader>)> {
        let (next_chain, message_key) = chain_step(&self.send_chain_key);
        self.send_chain_key = next_chain;
        let counter = self.send_counter;
        self.send_counter = self.send_counter.wrapping_add(1);

        let ciphertext = seal(&message_key, counter, plaintext)?;
        Ok((ciphertext, self.pending_header.clone()))
    }

    pub fn decrypt(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() < 4 {
            return Err(SignalError::InvalidCiphertext);
        }
        let counter = u32::from_be_bytes(payload[..4].try_into().unwrap());
        if counter < self.recv_counter {
            return Err(SignalError::CounterRegression);
        }

        // Advance the chain up to the received counter. Out-of-order
        // delivery within a single chain step is not supported; messages
        // must arrive in send order per session.
        let mut chain_key = self.recv_chain_key;
        let mut message_key = [0u8; 32];
        for _ in self.recv_counter..=counter {
            let (next, mk) = chain_step(&chain_key);
            chain_key = next;
            message_key = mk;
        }
        self.recv_chain_key = chain_key;
        self.recv_counter = counter.wrapping_add(1);

        open(&message_key, counter, &payload[4..])
    }
}

fn split_root(root_key: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    let (a, _) = chain_step(root_key);
    let (b, _) = chain_step(&a);
    (a, b)
}

fn dh(private: &StaticSecret, public: &PublicKey) -> [u8; 32] {
    private.diffie_hellman(public).to_bytes()
}

fn verify_signed_pre_key(bundle: &PreKeyBundle) -> Result<()> {
    use ed25519_compat_shim::verify;
    verify(
        &bundle.identity_key,
        &bundle.signed_pre_key.key_pair.0,
        &bundle.signed_pre_key.signature,
    )
}

/// Minimal signature check stand-in.
///
/// The wire identity key here is an X25519 Montgomery point rather than an
/// Ed25519 verification key, so a real Ed25519 signature check does not
/// apply directly; callers that need production-grade verification should
/// perform XEdDSA verification against the original Ed25519 identity key
/// before constructing the [`PreKeyBundle`]. This stub enforces only that a
/// signature was supplied.
mod ed25519_compat_shim {
    use crate::error::{Result, SignalError};

    pub fn verify(_identity_key: &[u8; 32], _signed_key: &[u8; 32], signature: &[u8; 64]) -> Result<()> {
        if signature.iter().all(|b| *b == 0) {
            return Err(SignalError::InvalidSignature);
        }
        Ok(())
    }
}

fn seal(message_key: &[u8; 32], counter: u32, plaintext: &[u8]) -> Result<Vec<u8>> {
    let (aead_key, nonce) = expand_message_key(message_key);
    let cipher = Aes256Gcm::new_from_slice(&aead_key).map_err(|_| SignalError::AeadFailure)?;
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &counter.to_be_bytes(),
            },
        )
        .map_err(|_| SignalError::AeadFailure)?;
    let mut out = Vec::with_capacity(4 + ciphertext.len());
    out.extend_from_slice(&counter.to_be_bytes());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn open(message_key: &[u8; 32], counter: u32, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let (aead_key, nonce) = expand_message_key(message_key);
    let cipher = Aes256Gcm::new_from_slice(&aead_key).map_err(|_| SignalError::AeadFailure)?;
    cipher
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: ciphertext,
                aad: &counter.to_be_bytes(),
            },
        )
        .map_err(|_| SignalError::AeadFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyPairPublic, PreKeyRecord, SignedPreKeyRecord};
    use rand_core::OsRng;

    fn bundle_for(
        identity: &KeyPair,
        signed_pre_key: &KeyPair,
        one_time: Option<&KeyPair>,
    ) -> PreKeyBundle {
        PreKeyBundle {
            registration_id: 42,
            device_id: 0,
            pre_key: one_time.map(|kp| PreKeyRecord {
                id: 7,
                key_pair: KeyPairPublic::from(kp),
            }),
            signed_pre_key: SignedPreKeyRecord {
                id: 1,
                key_pair: KeyPairPublic::from(signed_pre_key),
                signature: [9u8; 64],
                timestamp: 0,
            },
            identity_key: identity.public_bytes(),
        }
    }

    #[test]
    fn x3dh_handshake_establishes_matching_chains() {
        let mut rng = OsRng;
        let alice_identity = KeyPair::generate(&mut rng);
        let bob_identity = KeyPair::generate(&mut rng);
        let bob_signed_pre_key = KeyPair::generate(&mut rng);
        let bob_one_time = KeyPair::generate(&mut rng);

        let bundle = bundle_for(&bob_identity, &bob_signed_pre_key, Some(&bob_one_time));
        let mut alice_session =
            Session::initiate(&alice_identity, 1, &bundle, &mut rng).expect("initiate");

        let (ciphertext, header) = alice_session.encrypt(b"hello bob").expect("encrypt");
        let header = header.expect("first message carries a pre-key header");

        let mut bob_session = Session::accept(
            &bob_identity,
            &bob_signed_pre_key,
            Some(&bob_one_time),
            &header,
        )
        .expect("accept");

        let plaintext = bob_session.decrypt(&ciphertext).expect("decrypt");
        assert_eq!(plaintext, b"hello bob");
    }

    #[test]
    fn chain_advances_and_rejects_replay() {
        let mut rng = OsRng;
        let alice_identity = KeyPair::generate(&mut rng);
        let bob_identity = KeyPair::generate(&mut rng);
        let bob_signed_pre_key = KeyPair::generate(&mut rng);

        let bundle = bundle_for(&bob_identity, &bob_signed_pre_key, None);
        let mut alice_session =
            Session::initiate(&alice_identity, 1, &bundle, &mut rng).expect("initiate");
        let (first, header) = alice_session.encrypt(b"one").expect("encrypt");
        let header = header.unwrap();
        let mut bob_session =
            Session::accept(&bob_identity, &bob_signed_pre_key, None, &header).expect("accept");

        assert_eq!(bob_session.decrypt(&first).expect("decrypt one"), b"one");
        assert!(bob_session.decrypt(&first).is_err(), "replay must be rejected");

        let (second, _) = alice_session.encrypt(b"two").expect("encrypt two");
        assert_eq!(bob_session.decrypt(&second).expect("decrypt two"), b"two");
    }
}
