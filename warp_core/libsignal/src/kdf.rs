//! Key derivation helpers shared by the pairwise ratchet and the group
//! sender-key chain: an X3DH-style root derivation and a symmetric KDF chain
//! for per-message keys.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

const CHAIN_INPUT: &[u8] = &[0x01];
const MESSAGE_INPUT: &[u8] = &[0x02];

/// Combines the X3DH Diffie-Hellman outputs into a 32-byte root key.
pub fn derive_root_key(dh_outputs: &[[u8; 32]], info: &[u8]) -> [u8; 32] {
    let mut ikm = Vec::with_capacity(dh_outputs.len() * 32);
    for dh in dh_outputs {
        ikm.extend_from_slice(dh);
    }
    let hk = Hkdf::<Sha256>::new(Some(&[0u8; 32]), &ikm);
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm).expect("32 bytes is valid HKDF output length");
    okm
}

/// Advances a chain key one step, returning `(next_chain_key, message_key)`.
/// Mirrors the double ratchet's symmetric-key KDF chain: each step is an
/// HMAC of the current chain key keyed by a fixed single-byte label.
pub fn chain_step(chain_key: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    let next = hmac_sha256(chain_key, CHAIN_INPUT);
    let message_key = hmac_sha256(chain_key, MESSAGE_INPUT);
    (next, message_key)
}

fn hmac_sha256(key: &[u8; 32], input: &[u8]) -> [u8; 32] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(input);
    mac.finalize().into_bytes().into()
}

/// Expands a message key into an AEAD key and nonce via HKDF.
pub fn expand_message_key(message_key: &[u8; 32]) -> ([u8; 32], [u8; 12]) {
    let hk = Hkdf::<Sha256>::new(None, message_key);
    let mut okm = [0u8; 44];
    hk.expand(b"warp_core-libsignal-message", &mut okm)
        .expect("44 bytes is valid HKDF output length");
    let mut aead_key = [0u8; 32];
    let mut nonce = [0u8; 12];
    aead_key.copy_from_slice(&okm[..32]);
    nonce.copy_from_slice(&okm[32..]);
    (aead_key, nonce)
}
