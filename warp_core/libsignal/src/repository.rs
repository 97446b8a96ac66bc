//! The `SignalRepository` boundary: everything the rest of the system
//! needs from the double-ratchet/sender-key engine, without exposing
//! session internals.

use async_trait::async_trait;
use rand_core::OsRng;

use crate::error::{Result, SignalError};
use crate::keys::PreKeyBundle;
use crate::sender_key::SenderKeyState;
use crate::session::{PreKeyHeader, Session};
use crate::store::SignalStore;

/// Which of the three wire ciphertext shapes a message uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CiphertextKind {
    /// `pkmsg`: first message on a freshly established session, carries the
    /// X3DH header needed to derive it.
    PreKey,
    /// `msg`: ordinary pairwise ratchet message.
    Signal,
    /// `skmsg`: group message encrypted under a distributed sender key.
    SenderKey,
}

impl CiphertextKind {
    pub fn as_tag(self) -> &'static str {
        match self {
            CiphertextKind::PreKey => "pkmsg",
            CiphertextKind::Signal => "msg",
            CiphertextKind::SenderKey => "skmsg",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "pkmsg" => Ok(CiphertextKind::PreKey),
            "msg" => Ok(CiphertextKind::Signal),
            "skmsg" => Ok(CiphertextKind::SenderKey),
            _ => Err(SignalError::InvalidCiphertext),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EncryptedMessage {
    pub kind: CiphertextKind,
    pub ciphertext: Vec<u8>,
}

/// Opaque double-ratchet/sender-key primitives, consumed by the router and
/// multi-device fanout without either needing to know how sessions work
/// internally.
#[async_trait]
pub trait SignalRepository: Send + Sync {
    async fn has_session(&self, jid: &str) -> Result<bool>;

    /// Establishes (or re-establishes) an outgoing session toward `jid`
    /// from its published pre-key bundle. Idempotent: calling it again
    /// simply replaces the session.
    async fn inject_pre_key_bundle(&self, jid: &str, bundle: PreKeyBundle) -> Result<()>;

    async fn encrypt_message(&self, jid: &str, plaintext: &[u8]) -> Result<EncryptedMessage>;

    async fn decrypt_message(&self, jid: &str, message: &EncryptedMessage) -> Result<Vec<u8>>;

    async fn create_sender_key_distribution(&self, group_id: &str, sender_id: &str) -> Result<Vec<u8>>;

    async fn process_sender_key_distribution(
        &self,
        group_id: &str,
        sender_id: &str,
        distribution: &[u8],
    ) -> Result<()>;

    async fn encrypt_group_message(
        &self,
        group_id: &str,
        sender_id: &str,
        plaintext: &[u8],
    ) -> Result<EncryptedMessage>;

    async fn decrypt_group_message(
        &self,
        group_id: &str,
        sender_id: &str,
        message: &EncryptedMessage,
    ) -> Result<Vec<u8>>;
}

/// Reference implementation backing [`SignalRepository`] with the engines
/// in [`crate::session`] and [`crate::sender_key`].
pub struct DefaultSignalRepository<S> {
    store: S,
}

impl<S: SignalStore> DefaultSignalRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: SignalStore + Send + Sync> SignalRepository for DefaultSignalRepository<S> {
    async fn has_session(&self, jid: &str) -> Result<bool> {
        self.store.has_session(jid)
    }

    async fn inject_pre_key_bundle(&self, jid: &str, bundle: PreKeyBundle) -> Result<()> {
        let local_identity = self.store.identity_key_pair()?;
        let registration_id = self.store.registration_id()?;
        let mut rng = OsRng;
        let session = Session::initiate(&local_identity, registration_id, &bundle, &mut rng)?;
        self.store.store_session(jid, session)
    }

    async fn encrypt_message(&self, jid: &str, plaintext: &[u8]) -> Result<EncryptedMessage> {
        let mut session = self
            .store
            .load_session(jid)?
            .ok_or_else(|| SignalError::MissingSession(jid.to_owned()))?;

        let (body, header) = session.encrypt(plaintext)?;
        self.store.store_session(jid, session)?;

        match header {
            Some(header) => {
                let mut ciphertext = header.encode();
                ciphertext.extend_from_slice(&body);
                Ok(EncryptedMessage { kind: CiphertextKind::PreKey, ciphertext })
            }
            None => Ok(EncryptedMessage { kind: CiphertextKind::Signal, ciphertext: body }),
        }
    }

    async fn decrypt_message(&self, jid: &str, message: &EncryptedMessage) -> Result<Vec<u8>> {
        match message.kind {
            CiphertextKind::Signal => {
                let mut session = self
                    .store
                    .load_session(jid)?
                    .ok_or_else(|| SignalError::MissingSession(jid.to_owned()))?;
                let plaintext = session.decrypt(&message.ciphertext)?;
                self.store.store_session(jid, session)?;
                Ok(plaintext)
            }
            CiphertextKind::PreKey => {
                let (header, body) = PreKeyHeader::decode(&message.ciphertext)?;
                let mut session = match self.store.load_session(jid)? {
                    Some(existing) => existing,
                    None => {
                        let local_identity = self.store.identity_key_pair()?;
                        let (signed_pre_key, _signature, _timestamp) = self
                            .store
                            .load_signed_pre_key(header.signed_pre_key_id)?
                            .ok_or(SignalError::MissingSignedPreKey(header.signed_pre_key_id))?;
                        let one_time_pre_key = match header.pre_key_id {
                            Some(id) => Some(
                                self.store
                                    .load_pre_key(id)?
                                    .ok_or(SignalError::MissingPreKey(id))?,
                            ),
                            None => None,
                        };
                        let session = Session::accept(
                            &local_identity,
                            &signed_pre_key,
                            one_time_pre_key.as_ref(),
                            &header,
                        )?;
                        if let Some(id) = header.pre_key_id {
                            self.store.remove_pre_key(id)?;
                        }
                        session
                    }
                };
                session.confirm();
                let plaintext = session.decrypt(body)?;
                self.store.store_session(jid, session)?;
                Ok(plaintext)
            }
            CiphertextKind::SenderKey => Err(SignalError::InvalidCiphertext),
        }
    }

    async fn create_sender_key_distribution(&self, group_id: &str, sender_id: &str) -> Result<Vec<u8>> {
        let mut rng = OsRng;
        let state = SenderKeyState::generate(&mut rng);
        let distribution = state.to_distribution_bytes();
        self.store.store_sender_key(group_id, sender_id, state)?;
        Ok(distribution)
    }

    async fn process_sender_key_distribution(
        &self,
        group_id: &str,
        sender_id: &str,
        distribution: &[u8],
    ) -> Result<()> {
        let state = SenderKeyState::from_distribution_bytes(distribution)?;
        self.store.store_sender_key(group_id, sender_id, state)
    }

    async fn encrypt_group_message(
        &self,
        group_id: &str,
        sender_id: &str,
        plaintext: &[u8],
    ) -> Result<EncryptedMessage> {
        let mut state = self
            .store
            .load_sender_key(group_id, sender_id)?
            .ok_or_else(|| SignalError::MissingSenderKey {
                group: group_id.to_owned(),
                sender: sender_id.to_owned(),
            })?;
        let ciphertext = state.encrypt(plaintext)?;
        self.store.store_sender_key(group_id, sender_id, state)?;
        Ok(EncryptedMessage { kind: CiphertextKind::SenderKey, ciphertext })
    }

    async fn decrypt_group_message(
        &self,
        group_id: &str,
        sender_id: &str,
        message: &EncryptedMessage,
    ) -> Result<Vec<u8>> {
        let mut state = self
            .store
            .load_sender_key(group_id, sender_id)?
            .ok_or_else(|| SignalError::MissingSenderKey {
                group: group_id.to_owned(),
                sender: sender_id.to_owned(),
            })?;
        let plaintext = state.decrypt(&message.ciphertext)?;
        self.store.store_sender_key(group_id, sender_id, state)?;
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyPair, KeyPairPublic, PreKeyRecord, SignedPreKeyRecord};
    use crate::store::{IdentityKeyStore, InMemorySignalStore, PreKeyStore, SignedPreKeyStore};

    fn bundle_from_store(store: &InMemorySignalStore, one_time_id: Option<u32>) -> PreKeyBundle {
        let identity = store.identity_key_pair().unwrap();
        let signed = KeyPair::generate(&mut OsRng);
        store.store_signed_pre_key(1, signed.clone(), [1u8; 64], 0).unwrap();
        let pre_key = one_time_id.map(|id| {
            let kp = KeyPair::generate(&mut OsRng);
            store.store_pre_key(id, kp.clone()).unwrap();
            PreKeyRecord { id, key_pair: KeyPairPublic::from(&kp) }
        });
        PreKeyBundle {
            registration_id: store.registration_id().unwrap(),
            device_id: 0,
            pre_key,
            signed_pre_key: SignedPreKeyRecord {
                id: 1,
                key_pair: KeyPairPublic::from(&signed),
                signature: [1u8; 64],
                timestamp: 0,
            },
            identity_key: identity.public_bytes(),
        }
    }

    #[tokio::test]
    async fn pairwise_round_trip_through_the_repository_boundary() {
        let alice_store = InMemorySignalStore::new(10);
        let bob_store = InMemorySignalStore::new(20);
        let bob_bundle = bundle_from_store(&bob_store, Some(7));

        let alice_repo = DefaultSignalRepository::new(alice_store);
        let bob_repo = DefaultSignalRepository::new(bob_store);

        alice_repo.inject_pre_key_bundle("bob", bob_bundle).await.unwrap();
        let encrypted = alice_repo.encrypt_message("bob", b"hello").await.unwrap();
        assert_eq!(encrypted.kind, CiphertextKind::PreKey);

        let plaintext = bob_repo.decrypt_message("alice", &encrypted).await.unwrap();
        assert_eq!(plaintext, b"hello");

        let reply = bob_repo.encrypt_message("alice", b"hi back").await.unwrap();
        let plaintext = alice_repo.decrypt_message("bob", &reply).await.unwrap();
        assert_eq!(plaintext, b"hi back");
    }

    #[tokio::test]
    async fn group_fanout_round_trips_through_the_repository_boundary() {
        let sender_store = InMemorySignalStore::new(1);
        let recipient_store = InMemorySignalStore::new(2);
        let sender_repo = DefaultSignalRepository::new(sender_store);
        let recipient_repo = DefaultSignalRepository::new(recipient_store);

        let distribution = sender_repo
            .create_sender_key_distribution("group-1", "alice")
            .await
            .unwrap();
        recipient_repo
            .process_sender_key_distribution("group-1", "alice", &distribution)
            .await
            .unwrap();

        let encrypted = sender_repo
            .encrypt_group_message("group-1", "alice", b"group hello")
            .await
            .unwrap();
        assert_eq!(encrypted.kind, CiphertextKind::SenderKey);

        let plaintext = recipient_repo
            .decrypt_group_message("group-1", "alice", &encrypted)
            .await
            .unwrap();
        assert_eq!(plaintext, b"group hello");
    }
}
