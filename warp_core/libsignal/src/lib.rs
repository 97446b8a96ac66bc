//! Signal Protocol primitives backing the WhatsApp multi-device session
//! layer: pairwise X3DH + ratchet sessions for `pkmsg`/`msg`, and sender-key
//! chains for group `skmsg` fanout. Everything above this crate talks only
//! to [`repository::SignalRepository`]; session and chain internals are not
//! exposed.

pub mod error;
pub mod kdf;
pub mod keys;
pub mod repository;
pub mod sender_key;
pub mod session;
pub mod store;

pub use error::{Result, SignalError};
pub use keys::{KeyPair, KeyPairPublic, PreKeyBundle, PreKeyRecord, SignedPreKeyRecord};
pub use repository::{CiphertextKind, DefaultSignalRepository, EncryptedMessage, SignalRepository};
pub use sender_key::SenderKeyState;
pub use session::Session;
pub use store::{InMemorySignalStore, SignalStore};
