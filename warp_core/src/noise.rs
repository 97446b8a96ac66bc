//! Noise_XX_25519_AESGCM_SHA256 state machine used to bring the websocket
//! transport up to an authenticated AEAD channel before any stanza flows.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use sha2::{Digest, Sha256};

use crate::error::{ClientError, HandshakeError};

pub const WA_NOISE_PROLOGUE: &[u8] = b"WA\x06\x05";
pub const NOISE_PROTOCOL_NAME: &[u8] = b"Noise_XX_25519_AESGCM_SHA256";

/// Tracks the handshake hash, chaining key, and per-direction AEAD state
/// across the three XX messages and into the post-handshake transport
/// phase. Counters are strictly increasing per direction and never reset.
#[derive(Debug, Clone)]
pub struct NoiseState {
    h: [u8; 32],
    chaining_key: [u8; 32],
    session_key: [u8; 32],
    send_counter: u32,
    recv_counter: u32,
}

impl NoiseState {
    pub fn new(prologue: &[u8]) -> Self {
        let h = initialize_handshake_hash(NOISE_PROTOCOL_NAME);
        let mut state = Self { h, chaining_key: h, session_key: [0; 32], send_counter: 0, recv_counter: 0 };
        state.mix_hash(prologue);
        state
    }

    pub fn new_wa() -> Self {
        Self::new(WA_NOISE_PROLOGUE)
    }

    pub fn mix_hash(&mut self, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.h);
        hasher.update(data);
        self.h.copy_from_slice(&hasher.finalize());
    }

    pub fn mix_into_key(&mut self, ikm: &[u8]) {
        let hk = Hkdf::<Sha256>::new(Some(&self.chaining_key), ikm);
        let mut output = [0u8; 64];
        if hk.expand(&[], &mut output).is_ok() {
            self.chaining_key.copy_from_slice(&output[..32]);
            self.session_key.copy_from_slice(&output[32..]);
        }
        self.send_counter = 0;
        self.recv_counter = 0;
    }

    pub fn encrypt_with_ad(&mut self, plaintext: &[u8], ad: &[u8]) -> Result<Vec<u8>, ClientError> {
        let nonce = build_nonce(self.send_counter);
        self.send_counter = self.send_counter.wrapping_add(1);
        let cipher = Aes256Gcm::new_from_slice(&self.session_key)
            .map_err(|_| HandshakeError::InvalidCertificate)
            .map_err(|_| ClientError::StreamError("noise cipher init failed".to_string()))?;
        cipher
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad: ad })
            .map_err(|_| ClientError::StreamError("noise encrypt failed".to_string()))
    }

    pub fn decrypt_with_ad(&mut self, ciphertext: &[u8], ad: &[u8]) -> Result<Vec<u8>, ClientError> {
        let nonce = build_nonce(self.recv_counter);
        self.recv_counter = self.recv_counter.wrapping_add(1);
        let cipher = Aes256Gcm::new_from_slice(&self.session_key)
            .map_err(|_| ClientError::StreamError("noise cipher init failed".to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(&nonce), Payload { msg: ciphertext, aad: ad })
            .map_err(|_| ClientError::StreamError("noise decrypt failed".to_string()))
    }

    pub fn handshake_hash(&self) -> [u8; 32] {
        self.h
    }

    pub fn split(&self) -> ([u8; 32], [u8; 32], [u8; 32]) {
        (self.chaining_key, self.session_key, self.h)
    }
}

fn build_nonce(counter: u32) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[8..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

fn initialize_handshake_hash(protocol_name: &[u8]) -> [u8; 32] {
    let mut hash = [0u8; 32];
    if protocol_name.len() <= hash.len() {
        hash[..protocol_name.len()].copy_from_slice(protocol_name);
        return hash;
    }
    hash.copy_from_slice(&Sha256::digest(protocol_name));
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_round_trips_with_matching_counters() {
        let mut send = NoiseState::new_wa();
        send.mix_into_key(b"shared secret");
        let mut recv = send.clone();

        let ciphertext = send.encrypt_with_ad(b"hello", b"ad").unwrap();
        let plaintext = recv.decrypt_with_ad(&ciphertext, b"ad").unwrap();
        assert_eq!(plaintext, b"hello");
    }
}
