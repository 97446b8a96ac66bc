//! Wires [`warp_core_appstate`]'s resync engine and patch codec to the
//! `w:sync:app:state` IQ round trip and translates the resulting
//! mutations into the outward-facing events consumers actually want
//! (`chats.update`, `contacts.update`, `presence.update`, ...).

use std::collections::HashMap;

use rand::rngs::OsRng;
use warp_core_appstate::{
    ChatMutation, Collection, HashState, MutationKeys, SyncOperation, codec,
    resync_app_state as run_resync,
};
use warp_core_binary::BinaryNode;
use waproto::wa::{SyncdMutation, SyncdMutationSyncdOperation, SyncdPatch, SyncdVersion};

use crate::creds::KeyStore;
use crate::events::Event;
use crate::jid::Jid;

/// The full, fixed set of collections a cold resync (e.g. after initial
/// history sync completes) walks.
pub const ALL_COLLECTIONS: [Collection; 5] = Collection::ALL;

/// Drives a resync pass over `to_handle`, persists each collection's new
/// state via `store`, and translates the resulting mutations into events.
/// Mirrors the retry/abandon policy already implemented in
/// `warp_core_appstate::engine` — this function's job is strictly the
/// translation step plus persistence, not re-deriving that policy.
pub async fn resync_and_translate(
    to_handle: &[Collection],
    local_state: &HashMap<Collection, HashState>,
    fetcher: &dyn warp_core_appstate::AppStateFetcher,
    key_resolver: &dyn warp_core_appstate::SyncKeyResolver,
    verify_mac: bool,
    store: &impl KeyStore,
    emit: &impl Fn(Event),
) -> HashMap<Collection, HashState> {
    let results = run_resync(to_handle, local_state, fetcher, key_resolver, verify_mac).await;
    let mut new_state = local_state.clone();

    for result in results {
        match result {
            Ok(outcome) => {
                persist_collection_version(store, outcome.collection, outcome.state.version).await;
                for mutation in &outcome.mutations {
                    translate_mutation(mutation, emit);
                }
                new_state.insert(outcome.collection, outcome.state);
            }
            Err(err) => {
                tracing::warn!(error = %err, "app-state collection resync abandoned");
            }
        }
    }
    new_state
}

async fn persist_collection_version(store: &impl KeyStore, collection: Collection, version: u64) {
    store
        .set(
            crate::creds::NAMESPACE_APP_STATE_SYNC_VERSION,
            collection.as_str(),
            version.to_be_bytes().to_vec(),
        )
        .await;
}

/// `processSyncAction`: folds a single decoded mutation into the relevant
/// outward event. The index's first element names the action kind, which
/// in this implementation (see the codec's documented simplification) is
/// recoverable directly from local decryption rather than a separate
/// server-side `SyncActionValue` shape.
fn translate_mutation(mutation: &warp_core_appstate::ChatMutation, emit: &impl Fn(Event)) {
    let Some(action) = mutation.index.first() else { return };
    let Some(target) = mutation.index.get(1).and_then(|raw| Jid::parse(raw)) else { return };

    match (action.as_str(), mutation.operation) {
        ("mute", _) | ("archive", _) | ("pin", _) => emit(Event::ChatsUpdate(vec![target])),
        ("contact", SyncOperation::Set) => emit(Event::ContactsUpdate(vec![target])),
        ("deleteChat", SyncOperation::Remove) => emit(Event::ChatsDelete(vec![target])),
        _ => {}
    }
}

/// `chatModify`: turns a host-requested mutation (mute a chat, archive it,
/// ...) into a `ChatMutation`, encodes and MACs it against `state`, and
/// returns the updated state plus the `appPatch` IQ ready to send.
///
/// `state` is advanced in place; on an encode failure the caller's state
/// is left untouched and the error is returned for the caller to log or
/// surface, mirroring the read path's resync-and-report pattern.
pub fn chat_modification_to_patch(
    action: &str,
    target: &Jid,
    value: Vec<u8>,
    remove: bool,
    collection: Collection,
    state: &mut HashState,
    keys: &MutationKeys,
    key_id: &[u8],
    patch_id: &str,
) -> warp_core_appstate::Result<BinaryNode> {
    let operation = if remove { SyncOperation::Remove } else { SyncOperation::Set };
    let mutation = ChatMutation { operation, index: vec![action.to_string(), target.to_string()], value };

    let (record, index_mac, value_mac) =
        codec::encode_mutation(operation, &mutation, keys, key_id, &mut OsRng)?;

    match operation {
        SyncOperation::Set => {
            if let Some(previous) = state.index_value_map.get(&index_mac) {
                state.hash.remove_entry(&index_mac, previous);
            }
            state.hash.add_entry(&index_mac, &value_mac);
            state.index_value_map.insert(index_mac, value_mac);
        }
        SyncOperation::Remove => {
            if let Some(previous) = state.index_value_map.remove(&index_mac) {
                state.hash.remove_entry(&index_mac, &previous);
            }
        }
    }
    state.version += 1;

    let patch_mac = {
        use hmac::Mac;
        let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(&keys.patch_mac_key)
            .expect("hmac accepts any key length");
        mac.update(&state.hash.to_bytes());
        mac.update(&state.version.to_be_bytes());
        mac.update(key_id);
        mac.finalize().into_bytes().to_vec()
    };

    let syncd_patch = SyncdPatch {
        version: Some(SyncdVersion { version: Some(state.version) }),
        mutations: vec![SyncdMutation {
            operation: Some(SyncdMutationSyncdOperation::Set as i32),
            record: Some(record),
        }],
        external_mutations: None,
        snapshot_mac: vec![],
        key_id: Some(waproto::wa::KeyId { id: key_id.to_vec() }),
        patch_mac,
    };

    let mut buf = Vec::new();
    prost::Message::encode(&syncd_patch, &mut buf).expect("SyncdPatch always encodes");

    Ok(BinaryNode::new("iq")
        .with_attr("id", patch_id)
        .with_attr("type", "set")
        .with_attr("xmlns", "w:sync:app:state")
        .with_children(vec![
            BinaryNode::new("sync").with_children(vec![
                BinaryNode::new("collection")
                    .with_attr("name", collection.as_str())
                    .with_children(vec![BinaryNode::new("patch").with_bytes(buf)]),
            ]),
        ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp_core_appstate::ChatMutation;

    #[test]
    fn unknown_action_names_are_ignored_rather_than_panicking() {
        let mutation = ChatMutation {
            operation: SyncOperation::Set,
            index: vec!["somethingNew".to_string(), "1@s.whatsapp.net".to_string()],
            value: vec![],
        };
        translate_mutation(&mutation, &|_event| panic!("should not emit"));
    }

    #[test]
    fn mute_action_emits_chats_update() {
        let mutation = ChatMutation {
            operation: SyncOperation::Set,
            index: vec!["mute".to_string(), "1@s.whatsapp.net".to_string()],
            value: vec![],
        };
        let emitted = std::cell::Cell::new(false);
        translate_mutation(&mutation, &|event| {
            if matches!(event, Event::ChatsUpdate(_)) {
                emitted.set(true);
            }
        });
        assert!(emitted.get());
    }

    #[test]
    fn chat_modification_advances_version_and_builds_patch_node() {
        let keys = MutationKeys::derive(&[7u8; 32]);
        let mut state = HashState::default();
        let target = Jid::parse("1@s.whatsapp.net").unwrap();

        let node = chat_modification_to_patch(
            "archive",
            &target,
            b"true".to_vec(),
            false,
            Collection::RegularHigh,
            &mut state,
            &keys,
            b"key-1",
            "patch-id-1",
        )
        .expect("encode succeeds");

        assert_eq!(state.version, 1);
        assert_eq!(node.tag, "iq");
        let sync = node.get_child("sync").expect("sync child present");
        let collection = sync.get_child("collection").expect("collection child present");
        assert_eq!(collection.attrs.get("name").map(String::as_str), Some("regular_high"));
        assert!(collection.get_child("patch").is_some());
    }
}
