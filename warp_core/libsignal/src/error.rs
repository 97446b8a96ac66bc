use displaydoc::Display;

/// Failures surfaced by Signal Protocol primitives.
#[derive(Debug, Display)]
pub enum SignalError {
    /// no session exists for {0}
    MissingSession(String),
    /// no sender key exists for group {group}, sender {sender}
    MissingSenderKey { group: String, sender: String },
    /// pre-key {0} is not present in the local store
    MissingPreKey(u32),
    /// signed pre-key {0} is not present in the local store
    MissingSignedPreKey(u32),
    /// ciphertext is malformed or truncated
    InvalidCiphertext,
    /// signed pre-key signature failed verification
    InvalidSignature,
    /// identity key for {0} changed and was not explicitly trusted
    UntrustedIdentity(String),
    /// message counter went backwards (possible replay)
    CounterRegression,
    /// a backing store lock was poisoned: {0}
    StorePoisoned(&'static str),
    /// AEAD seal/open failed
    AeadFailure,
    /// key agreement failed: {0}
    KeyAgreement(String),
}

impl std::error::Error for SignalError {}

pub type Result<T> = std::result::Result<T, SignalError>;
