//! Derives the four purpose-specific keys used to encrypt, authenticate,
//! and index a single app-state mutation from the 32-byte app-state-sync
//! key the server hands out per [`crate::collection::Collection`].

use hkdf::Hkdf;
use sha2::Sha256;

#[derive(Clone, Debug)]
pub struct MutationKeys {
    pub index_key: [u8; 32],
    pub value_encryption_key: [u8; 32],
    pub value_mac_key: [u8; 32],
    pub snapshot_mac_key: [u8; 32],
    pub patch_mac_key: [u8; 32],
}

impl MutationKeys {
    pub fn derive(app_state_sync_key: &[u8; 32]) -> Self {
        let hk = Hkdf::<Sha256>::new(None, app_state_sync_key);
        let mut okm = [0u8; 160];
        hk.expand(b"WhatsApp Mutation Keys", &mut okm)
            .expect("160 bytes is a valid HKDF output length");
        Self {
            index_key: okm[0..32].try_into().unwrap(),
            value_encryption_key: okm[32..64].try_into().unwrap(),
            value_mac_key: okm[64..96].try_into().unwrap(),
            snapshot_mac_key: okm[96..128].try_into().unwrap(),
            patch_mac_key: okm[128..160].try_into().unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic_and_keys_are_distinct() {
        let seed = [7u8; 32];
        let a = MutationKeys::derive(&seed);
        let b = MutationKeys::derive(&seed);
        assert_eq!(a.index_key, b.index_key);
        assert_ne!(a.index_key, a.value_encryption_key);
        assert_ne!(a.value_mac_key, a.snapshot_mac_key);
    }
}
