//! Orchestration around the [`warp_core_libsignal::SignalRepository`]
//! boundary: pre-key bookkeeping and the `assertSessions`/`encryptMessage`
//! calls the relay path depends on.

use std::collections::HashSet;

use warp_core_libsignal::{PreKeyBundle, PreKeyRecord, SignalRepository};

use crate::creds::{Creds, KeyStore};
use crate::error::ClientError;
use crate::jid::JidWithDevice;

/// Generates (or returns already-generated, unconsumed) pre-keys starting
/// from `creds.next_pre_key_id`, advancing the counter by `count`. Upload
/// bookkeeping (`first_unuploaded_pre_key_id`) is the caller's job once
/// the batch is actually accepted by the server.
pub fn generate_or_get_pre_keys(creds: &mut Creds, count: u32) -> Vec<u32> {
    let start = creds.next_pre_key_id;
    let ids: Vec<u32> = (start..start + count).collect();
    creds.next_pre_key_id = start + count;
    ids
}

/// After a successful upload, advances `first_unuploaded_pre_key_id` to
/// one past the last id actually uploaded — never backwards, even if
/// upload batches race (hence the `max`).
pub fn mark_pre_keys_uploaded(creds: &mut Creds, last_uploaded_id: u32) {
    creds.first_unuploaded_pre_key_id = creds.first_unuploaded_pre_key_id.max(last_uploaded_id + 1);
}

/// Establishes sessions for `targets`: with `force`, every target is
/// re-keyed; otherwise only targets with no existing session are queried.
/// The actual `iq xmlns=encrypt get` round trip and bundle parsing belong
/// to the orchestration layer above this function (it needs the router);
/// this helper narrows the candidate list and performs the injection once
/// bundles are in hand.
pub async fn assert_sessions<R: SignalRepository>(
    repo: &R,
    targets: &[JidWithDevice],
    force: bool,
) -> Result<Vec<JidWithDevice>, ClientError> {
    let mut needs_session = Vec::new();
    for target in targets {
        let key = session_key(target);
        let has_session = repo.has_session(&key).await.map_err(ClientError::BadSession)?;
        if force || !has_session {
            needs_session.push(target.clone());
        }
    }
    Ok(needs_session)
}

/// Injects a freshly fetched bundle for `target`, returning whether a new
/// session was established (as opposed to one already present, which is a
/// caller bug if `assert_sessions` filtered correctly, but defended
/// against here since bundle delivery is async and races are possible).
pub async fn inject_bundle<R: SignalRepository>(
    repo: &R,
    target: &JidWithDevice,
    bundle: PreKeyBundle,
) -> Result<bool, ClientError> {
    let key = session_key(target);
    let had_session = repo.has_session(&key).await.map_err(ClientError::BadSession)?;
    repo.inject_pre_key_bundle(&key, bundle).await.map_err(ClientError::BadSession)?;
    Ok(!had_session)
}

pub fn session_key(target: &JidWithDevice) -> String {
    format!("{}:{}", target.user, target.device)
}

/// Which recipients among `all_targets` force a `pkmsg` envelope: any
/// target whose session did not exist before this send (i.e. whichever
/// subset `assert_sessions` reported as freshly established).
pub fn forces_pkmsg(freshly_established: &HashSet<String>, target: &JidWithDevice) -> bool {
    freshly_established.contains(&session_key(target))
}

/// Persists a set of inbound pre-keys into the store's `pre-key`
/// namespace, matching the namespace convention the rest of the crate
/// uses for all opaque key material.
pub async fn store_pre_keys(store: &impl KeyStore, records: &[PreKeyRecord]) {
    for record in records {
        let key = record.id.to_string();
        store.set(crate::creds::NAMESPACE_PRE_KEY, &key, record.key_pair.0.to_vec()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp_core_libsignal::store::IdentityKeyStore;
    use warp_core_libsignal::{
        DefaultSignalRepository, InMemorySignalStore, KeyPair, KeyPairPublic, SignedPreKeyRecord,
    };

    fn fresh_creds() -> Creds {
        let noise_key = KeyPair::generate(&mut rand_core::OsRng);
        let identity_key = KeyPair::generate(&mut rand_core::OsRng);
        let signed = KeyPair::generate(&mut rand_core::OsRng);
        Creds {
            noise_key: crate::creds::KeyPairBytes::from(&noise_key),
            signed_identity_key: crate::creds::KeyPairBytes::from(&identity_key),
            signed_pre_key: crate::creds::SignedPreKeyBytes::from(&SignedPreKeyRecord {
                id: 1,
                key_pair: KeyPairPublic::from(&signed),
                signature: [0u8; 64],
                timestamp: 0,
            }),
            registration_id: 1,
            adv_secret_key: [0u8; 32],
            me: None,
            platform: None,
            account: None,
            my_app_state_key_id: None,
            next_pre_key_id: 1,
            first_unuploaded_pre_key_id: 1,
            account_sync_counter: 0,
            last_account_sync_timestamp: None,
        }
    }

    #[test]
    fn pre_key_generation_advances_the_counter_densely() {
        let mut creds = fresh_creds();
        creds.next_pre_key_id = 10;
        let ids = generate_or_get_pre_keys(&mut creds, 5);
        assert_eq!(ids, vec![10, 11, 12, 13, 14]);
        assert_eq!(creds.next_pre_key_id, 15);
    }

    #[test]
    fn marking_uploaded_never_moves_backwards() {
        let mut creds = fresh_creds();
        creds.first_unuploaded_pre_key_id = 20;
        mark_pre_keys_uploaded(&mut creds, 5);
        assert_eq!(creds.first_unuploaded_pre_key_id, 20);
        mark_pre_keys_uploaded(&mut creds, 25);
        assert_eq!(creds.first_unuploaded_pre_key_id, 26);
    }

    fn bundle_for(store: &InMemorySignalStore) -> PreKeyBundle {
        let identity = store.identity_key_pair().unwrap();
        let signed = KeyPair::generate(&mut rand_core::OsRng);
        PreKeyBundle {
            registration_id: store.registration_id().unwrap(),
            device_id: 1,
            pre_key: None,
            signed_pre_key: SignedPreKeyRecord {
                id: 1,
                key_pair: KeyPairPublic::from(&signed),
                signature: [0u8; 64],
                timestamp: 0,
            },
            identity_key: KeyPairPublic::from(&identity).0,
        }
    }

    #[tokio::test]
    async fn assert_sessions_skips_targets_with_an_existing_session() {
        let store = InMemorySignalStore::new(1);
        let repository = DefaultSignalRepository::new(store);
        let target = JidWithDevice { user: "peer".into(), device: 0 };

        repository
            .inject_pre_key_bundle(&session_key(&target), bundle_for(repository.store()))
            .await
            .unwrap();

        let needing = assert_sessions(&repository, std::slice::from_ref(&target), false)
            .await
            .unwrap();
        assert!(needing.is_empty());

        let forced = assert_sessions(&repository, std::slice::from_ref(&target), true)
            .await
            .unwrap();
        assert_eq!(forced, vec![target]);
    }

    #[tokio::test]
    async fn inject_bundle_reports_whether_a_session_was_freshly_established() {
        let store = InMemorySignalStore::new(1);
        let repository = DefaultSignalRepository::new(store);
        let target = JidWithDevice { user: "peer".into(), device: 0 };
        let bundle = bundle_for(repository.store());

        let freshly_established = inject_bundle(&repository, &target, bundle).await.unwrap();
        assert!(freshly_established);
    }

    #[test]
    fn forces_pkmsg_only_for_freshly_established_sessions() {
        let target = JidWithDevice { user: "peer".into(), device: 0 };
        let mut fresh = HashSet::new();
        fresh.insert(session_key(&target));
        assert!(forces_pkmsg(&fresh, &target));

        let other = JidWithDevice { user: "other".into(), device: 0 };
        assert!(!forces_pkmsg(&fresh, &other));
    }
}
