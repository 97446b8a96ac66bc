//! Key material shapes that cross the [`crate::repository::SignalRepository`]
//! boundary: identity keys, signed/one-time pre-keys, and the bundle a peer
//! publishes so others can start a session with it.

use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};

/// An X25519 key pair used for identity keys, signed pre-keys, one-time
/// pre-keys, and ratchet keys alike.
#[derive(Clone)]
pub struct KeyPair {
    pub private: StaticSecret,
    pub public: PublicKey,
}

impl KeyPair {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let private = StaticSecret::random_from_rng(rng);
        let public = PublicKey::from(&private);
        Self { private, public }
    }

    pub fn from_private(private: StaticSecret) -> Self {
        let public = PublicKey::from(&private);
        Self { private, public }
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public.to_bytes()))
            .finish_non_exhaustive()
    }
}

/// A signed pre-key: a medium-term ratchet key plus the identity signature
/// that vouches for it.
#[derive(Clone, Debug)]
pub struct SignedPreKeyRecord {
    pub id: u32,
    pub key_pair: KeyPairPublic,
    pub signature: [u8; 64],
    pub timestamp: u64,
}

/// A one-time pre-key: consumed by the first peer to build a session with
/// it, then discarded.
#[derive(Clone, Debug)]
pub struct PreKeyRecord {
    pub id: u32,
    pub key_pair: KeyPairPublic,
}

/// Just the public half of a [`KeyPair`], for cases where the private scalar
/// must not travel (bundles, wire messages).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPairPublic(pub [u8; 32]);

impl From<&KeyPair> for KeyPairPublic {
    fn from(pair: &KeyPair) -> Self {
        Self(pair.public_bytes())
    }
}

/// Everything needed to open a session with a remote device without first
/// talking to it: its identity key, a signed pre-key, and optionally a
/// one-time pre-key.
#[derive(Clone, Debug)]
pub struct PreKeyBundle {
    pub registration_id: u32,
    pub device_id: u32,
    pub pre_key: Option<PreKeyRecord>,
    pub signed_pre_key: SignedPreKeyRecord,
    pub identity_key: [u8; 32],
}
