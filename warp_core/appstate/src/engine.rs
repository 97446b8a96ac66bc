//! Drives the resync loop described for app-state collections: fetch
//! missing patches for every collection whose local version lags the
//! server's, fall back to a full snapshot when a collection is
//! unrecoverable from patches alone, and give up on a collection (rather
//! than retry forever) after repeated failures or a server 404.

use std::collections::HashMap;

use async_trait::async_trait;
use waproto::wa::{SyncdPatch, SyncdSnapshot};

use crate::collection::Collection;
use crate::error::{AppStateError, Result};
use crate::keys::MutationKeys;
use crate::lthash::LtHash;
use crate::mutation::ChatMutation;
use crate::codec;

const MAX_PATCH_ATTEMPTS: u32 = 2;

/// What the resync loop fetches from the server; the actual IQ round trip
/// lives in the orchestration layer above this crate.
#[async_trait]
pub trait AppStateFetcher: Send + Sync {
    async fn fetch_patches(
        &self,
        collection: Collection,
        since_version: u64,
    ) -> std::result::Result<PatchFetchOutcome, FetchError>;

    async fn fetch_snapshot(
        &self,
        collection: Collection,
    ) -> std::result::Result<SyncdSnapshot, FetchError>;
}

#[derive(Debug)]
pub enum FetchError {
    NotFound,
    Transient(String),
}

pub enum PatchFetchOutcome {
    Patches(Vec<SyncdPatch>),
    /// The server reports the requested version range is no longer
    /// reconstructible from patches; the caller must fall back to a full
    /// snapshot.
    SnapshotRequired,
}

/// Looks up the sync key for a patch/snapshot's declared `key_id`.
pub trait SyncKeyResolver: Send + Sync {
    fn resolve(&self, key_id: &[u8]) -> Option<[u8; 32]>;
}

/// Result of resyncing one collection.
pub struct CollectionResyncResult {
    pub collection: Collection,
    pub mutations: Vec<ChatMutation>,
    pub state: HashState,
}

/// Resyncs every collection in `to_handle` against its locally known state,
/// returning one result per collection that converged. A collection that
/// fails twice in a row, or that the server reports missing, is dropped
/// from the result set rather than blocking the others.
pub async fn resync_app_state(
    to_handle: &[Collection],
    local_state: &HashMap<Collection, HashState>,
    fetcher: &dyn AppStateFetcher,
    key_resolver: &dyn SyncKeyResolver,
    verify_mac: bool,
) -> Vec<Result<CollectionResyncResult>> {
    let mut results = Vec::with_capacity(to_handle.len());
    for &collection in to_handle {
        results.push(
            resync_one_collection(collection, local_state, fetcher, key_resolver, verify_mac).await,
        );
    }
    results
}

async fn resync_one_collection(
    collection: Collection,
    local_state: &HashMap<Collection, HashState>,
    fetcher: &dyn AppStateFetcher,
    key_resolver: &dyn SyncKeyResolver,
    verify_mac: bool,
) -> Result<CollectionResyncResult> {
    let mut state = local_state.get(&collection).cloned().unwrap_or_default();
    let mut mutations = Vec::new();
    let mut attempts = 0;
    let mut snapshotted = false;

    loop {
        attempts += 1;
        match fetcher.fetch_patches(collection, state.version).await {
            Ok(PatchFetchOutcome::Patches(patches)) => {
                for patch in &patches {
                    let key_id = patch
                        .key_id
                        .as_ref()
                        .map(|k| k.id.as_slice())
                        .ok_or(AppStateError::Malformed("patch missing key id"))?;
                    let sync_key = key_resolver
                        .resolve(key_id)
                        .ok_or_else(|| AppStateError::MissingSyncKey(hex_id(key_id)))?;
                    let keys = MutationKeys::derive(&sync_key);

                    let (decoded, version) = codec::decode_patch(
                        patch,
                        &keys,
                        key_id,
                        collection.as_str(),
                        &mut state.hash,
                        &mut state.index_value_map,
                        verify_mac,
                    )?;
                    state.version = version;
                    mutations.extend(decoded);
                }
                return Ok(CollectionResyncResult { collection, mutations, state });
            }
            Ok(PatchFetchOutcome::SnapshotRequired) if !snapshotted => {
                let snapshot = fetcher
                    .fetch_snapshot(collection)
                    .await
                    .map_err(|e| fetch_error_to_app_state_error(collection, e))?;
                let key_id = snapshot
                    .key_id
                    .as_ref()
                    .map(|k| k.id.as_slice())
                    .ok_or(AppStateError::Malformed("snapshot missing key id"))?;
                let sync_key = key_resolver
                    .resolve(key_id)
                    .ok_or_else(|| AppStateError::MissingSyncKey(hex_id(key_id)))?;
                let keys = MutationKeys::derive(&sync_key);

                let (snapshot_mutations, hash, index_value_map, version) =
                    codec::decode_snapshot(&snapshot, &keys, key_id, collection.as_str(), verify_mac)?;
                state.hash = hash;
                state.index_value_map = index_value_map;
                state.version = version;
                mutations.extend(snapshot_mutations);
                // The snapshot only covers the collection up to its own
                // version; any patches issued since then still need to be
                // fetched and folded in before this round is done.
                snapshotted = true;
                attempts = 0;
                continue;
            }
            Ok(PatchFetchOutcome::SnapshotRequired) => {
                return Err(AppStateError::Irrecoverable(collection.as_str().to_owned()));
            }
            Err(FetchError::NotFound) => {
                return Err(AppStateError::NotFound(collection.as_str().to_owned()));
            }
            Err(FetchError::Transient(_)) if attempts < MAX_PATCH_ATTEMPTS => continue,
            Err(FetchError::Transient(_)) => {
                return Err(AppStateError::Irrecoverable(collection.as_str().to_owned()));
            }
        }
    }
}

fn fetch_error_to_app_state_error(collection: Collection, err: FetchError) -> AppStateError {
    match err {
        FetchError::NotFound => AppStateError::NotFound(collection.as_str().to_owned()),
        FetchError::Transient(_) => AppStateError::Irrecoverable(collection.as_str().to_owned()),
    }
}

fn hex_id(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Per-collection persisted state: version, LT-hash accumulator, and the
/// index→value-mac map needed to process future `REMOVE`s.
#[derive(Clone, Default)]
pub struct HashState {
    pub version: u64,
    pub hash: LtHash,
    pub index_value_map: HashMap<[u8; 32], [u8; 32]>,
}
