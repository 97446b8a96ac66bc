//! App-state synchronization: the LT-hash–verified patch/snapshot stream
//! that keeps settings like chat mutes, archives, and contact metadata
//! consistent across every linked device.

pub mod codec;
pub mod collection;
pub mod engine;
pub mod error;
pub mod keys;
pub mod lthash;
pub mod mutation;

pub use collection::Collection;
pub use engine::{
    AppStateFetcher, CollectionResyncResult, FetchError, HashState, PatchFetchOutcome,
    SyncKeyResolver, resync_app_state,
};
pub use error::{AppStateError, Result};
pub use keys::MutationKeys;
pub use lthash::LtHash;
pub use mutation::{ChatMutation, SyncOperation};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hmac::Mac;
    use rand::RngCore;
    use rand::rngs::OsRng;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use waproto::wa::{SyncdMutationSyncdOperation, SyncdPatch, SyncdVersion};

    struct FixedKeyResolver(HashMap<Vec<u8>, [u8; 32]>);

    impl SyncKeyResolver for FixedKeyResolver {
        fn resolve(&self, key_id: &[u8]) -> Option<[u8; 32]> {
            self.0.get(key_id).copied()
        }
    }

    struct SinglePatchFetcher {
        patch: Mutex<Option<SyncdPatch>>,
    }

    #[async_trait]
    impl AppStateFetcher for SinglePatchFetcher {
        async fn fetch_patches(
            &self,
            _collection: Collection,
            _since_version: u64,
        ) -> std::result::Result<PatchFetchOutcome, FetchError> {
            let patch = self.patch.lock().unwrap().take();
            match patch {
                Some(patch) => Ok(PatchFetchOutcome::Patches(vec![patch])),
                None => Ok(PatchFetchOutcome::Patches(vec![])),
            }
        }

        async fn fetch_snapshot(
            &self,
            _collection: Collection,
        ) -> std::result::Result<waproto::wa::SyncdSnapshot, FetchError> {
            Err(FetchError::NotFound)
        }
    }

    #[tokio::test]
    async fn resync_applies_a_pending_patch_and_advances_version() {
        let key_id = b"k1".to_vec();
        let sync_key = [5u8; 32];
        let keys = MutationKeys::derive(&sync_key);

        let chat = ChatMutation {
            operation: SyncOperation::Set,
            index: vec!["mute".to_string()],
            value: b"payload".to_vec(),
        };
        let mut rng = OsRng;
        let (record, index_mac, value_mac) =
            codec::encode_mutation(SyncOperation::Set, &chat, &keys, &key_id, &mut rng).unwrap();

        let mut hash = LtHash::zero();
        hash.add_entry(&index_mac, &value_mac);
        let mut mac_input = hash.to_bytes().to_vec();
        mac_input.extend_from_slice(&1u64.to_be_bytes());
        mac_input.extend_from_slice(&key_id);
        let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(&keys.patch_mac_key).unwrap();
        mac.update(&mac_input);
        let patch_mac = mac.finalize().into_bytes().to_vec();

        let patch = SyncdPatch {
            version: Some(SyncdVersion { version: Some(1) }),
            mutations: vec![waproto::wa::SyncdMutation {
                operation: Some(SyncdMutationSyncdOperation::Set as i32),
                record: Some(record),
            }],
            external_mutations: None,
            snapshot_mac: Vec::new(),
            key_id: Some(waproto::wa::KeyId { id: key_id.clone() }),
            patch_mac,
        };

        let fetcher = SinglePatchFetcher { patch: Mutex::new(Some(patch)) };
        let mut resolver_map = HashMap::new();
        resolver_map.insert(key_id, sync_key);
        let resolver = FixedKeyResolver(resolver_map);

        let results = resync_app_state(
            &[Collection::Regular],
            &HashMap::new(),
            &fetcher,
            &resolver,
            true,
        )
        .await;

        assert_eq!(results.len(), 1);
        let result = results.into_iter().next().unwrap().expect("resync succeeds");
        assert_eq!(result.state.version, 1);
        assert_eq!(result.mutations.len(), 1);
        assert_eq!(result.mutations[0].value, b"payload");
    }

    struct SnapshotThenPatchFetcher {
        snapshot_served: Mutex<bool>,
    }

    #[async_trait]
    impl AppStateFetcher for SnapshotThenPatchFetcher {
        async fn fetch_patches(
            &self,
            _collection: Collection,
            since_version: u64,
        ) -> std::result::Result<PatchFetchOutcome, FetchError> {
            if since_version == 0 {
                return Ok(PatchFetchOutcome::SnapshotRequired);
            }
            let patch = SyncdPatch {
                version: Some(SyncdVersion { version: Some(128) }),
                mutations: vec![],
                external_mutations: None,
                snapshot_mac: Vec::new(),
                key_id: Some(waproto::wa::KeyId { id: b"k1".to_vec() }),
                patch_mac: Vec::new(),
            };
            Ok(PatchFetchOutcome::Patches(vec![patch]))
        }

        async fn fetch_snapshot(
            &self,
            _collection: Collection,
        ) -> std::result::Result<waproto::wa::SyncdSnapshot, FetchError> {
            let mut served = self.snapshot_served.lock().unwrap();
            assert!(!*served, "snapshot should only be fetched once per round");
            *served = true;
            Ok(waproto::wa::SyncdSnapshot {
                version: Some(SyncdVersion { version: Some(123) }),
                records: vec![],
                mac: Vec::new(),
                key_id: Some(waproto::wa::KeyId { id: b"k1".to_vec() }),
            })
        }
    }

    #[tokio::test]
    async fn resync_continues_past_a_snapshot_to_pick_up_trailing_patches() {
        let fetcher = SnapshotThenPatchFetcher { snapshot_served: Mutex::new(false) };
        let mut resolver_map = HashMap::new();
        resolver_map.insert(b"k1".to_vec(), [5u8; 32]);
        let resolver = FixedKeyResolver(resolver_map);

        let results =
            resync_app_state(&[Collection::Regular], &HashMap::new(), &fetcher, &resolver, false)
                .await;

        assert_eq!(results.len(), 1);
        let result = results.into_iter().next().unwrap().expect("resync succeeds");
        assert_eq!(result.state.version, 128);
    }

    #[test]
    fn every_collection_name_round_trips() {
        for collection in Collection::ALL {
            let name = collection.as_str();
            assert_eq!(Collection::from_str(name), Some(collection));
        }
        let mut buf = [0u8; 1];
        OsRng.fill_bytes(&mut buf);
        let _ = buf;
    }
}
