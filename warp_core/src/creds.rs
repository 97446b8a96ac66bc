//! Account credentials and the namespaced key-value store collaborator.
//!
//! `Creds` is logically owned by the connection; the only writer is this
//! crate, via `creds.update` events, and persistence is the caller's
//! responsibility (see [`crate::events::Event::CredsUpdate`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

use crate::jid::Jid;
use warp_core_libsignal::{KeyPair, SignedPreKeyRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creds {
    pub noise_key: KeyPairBytes,
    pub signed_identity_key: KeyPairBytes,
    pub signed_pre_key: SignedPreKeyBytes,
    pub registration_id: u32,
    pub adv_secret_key: [u8; 32],
    pub me: Option<Jid>,
    pub platform: Option<String>,
    pub account: Option<waproto::wa::AdvSignedDeviceIdentity>,
    pub my_app_state_key_id: Option<Vec<u8>>,
    pub next_pre_key_id: u32,
    pub first_unuploaded_pre_key_id: u32,
    pub account_sync_counter: u32,
    pub last_account_sync_timestamp: Option<i64>,
}

impl Creds {
    /// Invariant: a creds value where uploads have not caught up with
    /// generation always has `first_unuploaded_pre_key_id <= next_pre_key_id`.
    pub fn check_invariant(&self) -> bool {
        self.first_unuploaded_pre_key_id <= self.next_pre_key_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPairBytes {
    pub public: [u8; 32],
    pub private: [u8; 32],
}

impl From<&KeyPair> for KeyPairBytes {
    fn from(pair: &KeyPair) -> Self {
        Self { public: pair.public_bytes(), private: pair.private.to_bytes() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedPreKeyBytes {
    pub key_id: u32,
    pub pair: KeyPairBytes,
    #[serde(with = "BigArray")]
    pub signature: [u8; 64],
}

impl From<&SignedPreKeyRecord> for SignedPreKeyBytes {
    fn from(record: &SignedPreKeyRecord) -> Self {
        Self {
            key_id: record.id,
            pair: KeyPairBytes { public: record.key_pair.0, private: [0; 32] },
            signature: record.signature,
        }
    }
}

/// The fixed set of namespaces a `KeyStore` implementation must support.
pub const NAMESPACE_PRE_KEY: &str = "pre-key";
pub const NAMESPACE_SESSION: &str = "session";
pub const NAMESPACE_SENDER_KEY: &str = "sender-key";
pub const NAMESPACE_SENDER_KEY_MEMORY: &str = "sender-key-memory";
pub const NAMESPACE_APP_STATE_SYNC_KEY: &str = "app-state-sync-key";
pub const NAMESPACE_APP_STATE_SYNC_VERSION: &str = "app-state-sync-version";

/// Opaque, namespaced key-value collaborator. Access outside a
/// [`KeyStore::transaction`] call is a logic error in the caller, not
/// something this crate can detect — the trait only exposes the atomic
/// path on purpose.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>);
    async fn remove(&self, namespace: &str, key: &str);
    async fn keys(&self, namespace: &str) -> Vec<String>;

    /// Runs `body` with exclusive access to the store; nested calls from
    /// within an outer transaction reuse the same underlying guard rather
    /// than deadlocking or re-acquiring.
    async fn transaction<'a, F, Fut, T>(&'a self, body: F) -> T
    where
        F: FnOnce(&'a Self) -> Fut + Send + 'a,
        Fut: std::future::Future<Output = T> + Send + 'a,
        T: Send,
        Self: Sized;
}

/// In-memory reference implementation, suitable for tests and as a
/// starting point for a persistent backend. A single `tokio::sync::Mutex`
/// stands in for the "one writer at a time" transaction semantics; nesting
/// is safe here only because `transaction` does not itself acquire a lock
/// held across the nested call — callers share one logical critical
/// section by convention, matching the single-connection serializer the
/// rest of this crate already assumes.
pub struct InMemoryKeyStore {
    inner: tokio::sync::Mutex<std::collections::HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self { inner: tokio::sync::Mutex::new(std::collections::HashMap::new()) }
    }
}

impl Default for InMemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().await.get(&(namespace.to_string(), key.to_string())).cloned()
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) {
        self.inner.lock().await.insert((namespace.to_string(), key.to_string()), value);
    }

    async fn remove(&self, namespace: &str, key: &str) {
        self.inner.lock().await.remove(&(namespace.to_string(), key.to_string()));
    }

    async fn keys(&self, namespace: &str) -> Vec<String> {
        self.inner
            .lock()
            .await
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, k)| k.clone())
            .collect()
    }

    async fn transaction<'a, F, Fut, T>(&'a self, body: F) -> T
    where
        F: FnOnce(&'a Self) -> Fut + Send + 'a,
        Fut: std::future::Future<Output = T> + Send + 'a,
        T: Send,
    {
        body(self).await
    }
}
