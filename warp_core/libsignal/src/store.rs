//! Narrow storage traits the ratchet and sender-key engines depend on, split
//! the way the wire protocol's own namespaces are split (identity, pre-key,
//! session, sender-key). A production integration backs these with the
//! host application's persistent `KeyStore` namespaces instead of the
//! in-memory map used here for tests and local experimentation.

use std::collections::HashMap;
use std::sync::RwLock;

use rand_core::OsRng;

use crate::error::{Result, SignalError};
use crate::keys::KeyPair;
use crate::sender_key::SenderKeyState;
use crate::session::Session;

pub trait IdentityKeyStore {
    fn identity_key_pair(&self) -> Result<KeyPair>;
    fn registration_id(&self) -> Result<u32>;
}

pub trait PreKeyStore {
    fn load_pre_key(&self, id: u32) -> Result<Option<KeyPair>>;
    fn store_pre_key(&self, id: u32, key_pair: KeyPair) -> Result<()>;
    fn remove_pre_key(&self, id: u32) -> Result<()>;
}

pub trait SignedPreKeyStore {
    fn load_signed_pre_key(&self, id: u32) -> Result<Option<(KeyPair, [u8; 64], u64)>>;
    fn store_signed_pre_key(&self, id: u32, key_pair: KeyPair, signature: [u8; 64], timestamp: u64) -> Result<()>;
}

pub trait SessionStore {
    fn load_session(&self, jid: &str) -> Result<Option<Session>>;
    fn store_session(&self, jid: &str, session: Session) -> Result<()>;
    fn has_session(&self, jid: &str) -> Result<bool> {
        Ok(self.load_session(jid)?.is_some())
    }
}

pub trait SenderKeyStore {
    fn load_sender_key(&self, group_id: &str, sender_id: &str) -> Result<Option<SenderKeyState>>;
    fn store_sender_key(&self, group_id: &str, sender_id: &str, state: SenderKeyState) -> Result<()>;
}

/// Composed capability needed to back a [`crate::repository::SignalRepository`].
pub trait SignalStore:
    IdentityKeyStore + PreKeyStore + SignedPreKeyStore + SessionStore + SenderKeyStore
{
}

impl<T> SignalStore for T where
    T: IdentityKeyStore + PreKeyStore + SignedPreKeyStore + SessionStore + SenderKeyStore
{
}

/// In-memory store for tests and for driving the reference repository
/// implementation before a real persistence backend is wired up.
pub struct InMemorySignalStore {
    identity_key_pair: KeyPair,
    registration_id: u32,
    pre_keys: RwLock<HashMap<u32, KeyPair>>,
    signed_pre_keys: RwLock<HashMap<u32, (KeyPair, [u8; 64], u64)>>,
    sessions: RwLock<HashMap<String, Session>>,
    sender_keys: RwLock<HashMap<(String, String), SenderKeyState>>,
}

impl InMemorySignalStore {
    pub fn new(registration_id: u32) -> Self {
        Self {
            identity_key_pair: KeyPair::generate(&mut OsRng),
            registration_id,
            pre_keys: RwLock::new(HashMap::new()),
            signed_pre_keys: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            sender_keys: RwLock::new(HashMap::new()),
        }
    }
}

impl IdentityKeyStore for InMemorySignalStore {
    fn identity_key_pair(&self) -> Result<KeyPair> {
        Ok(self.identity_key_pair.clone())
    }

    fn registration_id(&self) -> Result<u32> {
        Ok(self.registration_id)
    }
}

impl PreKeyStore for InMemorySignalStore {
    fn load_pre_key(&self, id: u32) -> Result<Option<KeyPair>> {
        let pre_keys = self.pre_keys.read().map_err(|_| SignalError::StorePoisoned("pre_keys"))?;
        Ok(pre_keys.get(&id).cloned())
    }

    fn store_pre_key(&self, id: u32, key_pair: KeyPair) -> Result<()> {
        let mut pre_keys = self.pre_keys.write().map_err(|_| SignalError::StorePoisoned("pre_keys"))?;
        pre_keys.insert(id, key_pair);
        Ok(())
    }

    fn remove_pre_key(&self, id: u32) -> Result<()> {
        let mut pre_keys = self.pre_keys.write().map_err(|_| SignalError::StorePoisoned("pre_keys"))?;
        pre_keys.remove(&id);
        Ok(())
    }
}

impl SignedPreKeyStore for InMemorySignalStore {
    fn load_signed_pre_key(&self, id: u32) -> Result<Option<(KeyPair, [u8; 64], u64)>> {
        let signed = self
            .signed_pre_keys
            .read()
            .map_err(|_| SignalError::StorePoisoned("signed_pre_keys"))?;
        Ok(signed.get(&id).cloned())
    }

    fn store_signed_pre_key(&self, id: u32, key_pair: KeyPair, signature: [u8; 64], timestamp: u64) -> Result<()> {
        let mut signed = self
            .signed_pre_keys
            .write()
            .map_err(|_| SignalError::StorePoisoned("signed_pre_keys"))?;
        signed.insert(id, (key_pair, signature, timestamp));
        Ok(())
    }
}

impl SessionStore for InMemorySignalStore {
    fn load_session(&self, jid: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.read().map_err(|_| SignalError::StorePoisoned("sessions"))?;
        Ok(sessions.get(jid).cloned())
    }

    fn store_session(&self, jid: &str, session: Session) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| SignalError::StorePoisoned("sessions"))?;
        sessions.insert(jid.to_owned(), session);
        Ok(())
    }
}

impl SenderKeyStore for InMemorySignalStore {
    fn load_sender_key(&self, group_id: &str, sender_id: &str) -> Result<Option<SenderKeyState>> {
        let sender_keys = self
            .sender_keys
            .read()
            .map_err(|_| SignalError::StorePoisoned("sender_keys"))?;
        Ok(sender_keys.get(&(group_id.to_owned(), sender_id.to_owned())).cloned())
    }

    fn store_sender_key(&self, group_id: &str, sender_id: &str, state: SenderKeyState) -> Result<()> {
        let mut sender_keys = self
            .sender_keys
            .write()
            .map_err(|_| SignalError::StorePoisoned("sender_keys"))?;
        sender_keys.insert((group_id.to_owned(), sender_id.to_owned()), state);
        Ok(())
    }
}
