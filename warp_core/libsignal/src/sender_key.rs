//! Group fanout via sender keys: one symmetric chain per (group, sender)
//! pair, distributed once to every device in the group over pairwise
//! sessions, then used to encrypt a single ciphertext for the whole group
//! instead of one ciphertext per recipient.

use rand_core::{CryptoRng, RngCore};

use crate::error::{Result, SignalError};
use crate::kdf::{chain_step, expand_message_key};

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

/// The symmetric state backing one sender's contribution to a group chat.
/// Encrypting advances `iteration`; decrypting a message from a remote copy
/// of this state catches the chain up to the message's iteration.
#[derive(Clone, Debug)]
pub struct SenderKeyState {
    chain_id: u32,
    iteration: u32,
    chain_key: [u8; 32],
}

impl SenderKeyState {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut chain_key = [0u8; 32];
        rng.fill_bytes(&mut chain_key);
        let mut chain_id_bytes = [0u8; 4];
        rng.fill_bytes(&mut chain_id_bytes);
        Self {
            chain_id: u32::from_be_bytes(chain_id_bytes),
            iteration: 0,
            chain_key,
        }
    }

    /// Serializes the chain for distribution as the payload of a
    /// `SenderKeyDistributionMessage`.
    pub fn to_distribution_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(40);
        out.extend_from_slice(&self.chain_id.to_be_bytes());
        out.extend_from_slice(&self.iteration.to_be_bytes());
        out.extend_from_slice(&self.chain_key);
        out
    }

    pub fn from_distribution_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != 40 {
            return Err(SignalError::InvalidCiphertext);
        }
        let chain_id = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let iteration = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        let mut chain_key = [0u8; 32];
        chain_key.copy_from_slice(&buf[8..40]);
        Ok(Self {
            chain_id,
            iteration,
            chain_key,
        })
    }

    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let (next, message_key) = chain_step(&self.chain_key);
        let iteration = self.iteration;
        self.chain_key = next;
        self.iteration = self.iteration.wrapping_add(1);
        let ciphertext = seal(&message_key, self.chain_id, iteration, plaintext)?;
        let mut out = Vec::with_capacity(8 + ciphertext.len());
        out.extend_from_slice(&self.chain_id.to_be_bytes());
        out.extend_from_slice(&iteration.to_be_bytes());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() < 8 {
            return Err(SignalError::InvalidCiphertext);
        }
        let chain_id = u32::from_be_bytes(payload[0..4].try_into().unwrap());
        let iteration = u32::from_be_bytes(payload[4..8].try_into().unwrap());
        if chain_id != self.chain_id {
            return Err(SignalError::InvalidCiphertext);
        }
        if iteration < self.iteration {
            return Err(SignalError::CounterRegression);
        }

        let mut chain_key = self.chain_key;
        let mut message_key = [0u8; 32];
        for _ in self.iteration..=iteration {
            let (next, mk) = chain_step(&chain_key);
            chain_key = next;
            message_key = mk;
        }
        self.chain_key = chain_key;
        self.iteration = iteration.wrapping_add(1);

        open(&message_key, chain_id, iteration, &payload[8..])
    }
}

fn seal(message_key: &[u8; 32], chain_id: u32, iteration: u32, plaintext: &[u8]) -> Result<Vec<u8>> {
    let (aead_key, nonce) = expand_message_key(message_key);
    let cipher = Aes256Gcm::new_from_slice(&aead_key).map_err(|_| SignalError::AeadFailure)?;
    let mut aad = Vec::with_capacity(8);
    aad.extend_from_slice(&chain_id.to_be_bytes());
    aad.extend_from_slice(&iteration.to_be_bytes());
    cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad: &aad })
        .map_err(|_| SignalError::AeadFailure)
}

fn open(message_key: &[u8; 32], chain_id: u32, iteration: u32, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let (aead_key, nonce) = expand_message_key(message_key);
    let cipher = Aes256Gcm::new_from_slice(&aead_key).map_err(|_| SignalError::AeadFailure)?;
    let mut aad = Vec::with_capacity(8);
    aad.extend_from_slice(&chain_id.to_be_bytes());
    aad.extend_from_slice(&iteration.to_be_bytes());
    cipher
        .decrypt(Nonce::from_slice(&nonce), Payload { msg: ciphertext, aad: &aad })
        .map_err(|_| SignalError::AeadFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn group_chain_round_trips_and_catches_up() {
        let mut rng = OsRng;
        let mut sender = SenderKeyState::generate(&mut rng);
        let distribution = sender.to_distribution_bytes();
        let mut recipient = SenderKeyState::from_distribution_bytes(&distribution).expect("parse");

        let first = sender.encrypt(b"hi group").expect("encrypt");
        assert_eq!(recipient.decrypt(&first).expect("decrypt"), b"hi group");

        let second = sender.encrypt(b"second message").expect("encrypt");
        assert_eq!(recipient.decrypt(&second).expect("decrypt"), b"second message");
    }

    #[test]
    fn rejects_replay_of_an_older_iteration() {
        let mut rng = OsRng;
        let mut sender = SenderKeyState::generate(&mut rng);
        let distribution = sender.to_distribution_bytes();
        let mut recipient = SenderKeyState::from_distribution_bytes(&distribution).expect("parse");

        let first = sender.encrypt(b"one").expect("encrypt");
        recipient.decrypt(&first).expect("decrypt");
        assert!(recipient.decrypt(&first).is_err());
    }
}
