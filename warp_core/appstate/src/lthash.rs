//! The additively-homomorphic hash used to verify app-state patch streams
//! without re-downloading the full state: each entry contributes a 128-byte
//! digest, split into sixteen little-endian `u64` lanes, and patches are
//! applied by wrapping-add (for a `SET`) or wrapping-sub (for a `REMOVE`)
//! lane by lane. The accumulator commutes, so replaying a set of patches in
//! any order converges on the same hash.

use sha2::{Digest, Sha256};

pub const LANE_COUNT: usize = 16;

/// A 128-byte running accumulator plus the version it reflects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LtHash {
    lanes: [u64; LANE_COUNT],
}

impl LtHash {
    pub const fn zero() -> Self {
        Self { lanes: [0u64; LANE_COUNT] }
    }

    pub fn from_bytes(bytes: &[u8; 128]) -> Self {
        let mut lanes = [0u64; LANE_COUNT];
        for (lane, chunk) in lanes.iter_mut().zip(bytes.chunks_exact(8)) {
            *lane = u64::from_le_bytes(chunk.try_into().unwrap());
        }
        Self { lanes }
    }

    pub fn to_bytes(&self) -> [u8; 128] {
        let mut out = [0u8; 128];
        for (lane, chunk) in self.lanes.iter().zip(out.chunks_exact_mut(8)) {
            chunk.copy_from_slice(&lane.to_le_bytes());
        }
        out
    }

    /// Expands an entry's `(index_mac, value_mac)` pair into the 128-byte
    /// digest contributed to the accumulator.
    fn entry_digest(index_mac: &[u8], value_mac: &[u8]) -> [u8; 128] {
        let mut out = [0u8; 128];
        let mut counter: u32 = 0;
        for chunk in out.chunks_mut(32) {
            let mut hasher = Sha256::new();
            hasher.update(index_mac);
            hasher.update(value_mac);
            hasher.update(counter.to_be_bytes());
            let digest = hasher.finalize();
            chunk.copy_from_slice(&digest[..chunk.len()]);
            counter += 1;
        }
        out
    }

    pub fn add_entry(&mut self, index_mac: &[u8], value_mac: &[u8]) {
        let digest = LtHash::from_bytes(&Self::entry_digest(index_mac, value_mac));
        for (lane, addend) in self.lanes.iter_mut().zip(digest.lanes) {
            *lane = lane.wrapping_add(addend);
        }
    }

    pub fn remove_entry(&mut self, index_mac: &[u8], value_mac: &[u8]) {
        let digest = LtHash::from_bytes(&Self::entry_digest(index_mac, value_mac));
        for (lane, subtrahend) in self.lanes.iter_mut().zip(digest.lanes) {
            *lane = lane.wrapping_sub(subtrahend);
        }
    }
}

impl Default for LtHash {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_returns_to_the_original_hash() {
        let mut hash = LtHash::zero();
        let before = hash.clone();
        hash.add_entry(b"index-a", b"value-a");
        assert_ne!(hash, before);
        hash.remove_entry(b"index-a", b"value-a");
        assert_eq!(hash, before);
    }

    #[test]
    fn accumulator_is_order_independent() {
        let mut a = LtHash::zero();
        a.add_entry(b"idx-1", b"val-1");
        a.add_entry(b"idx-2", b"val-2");

        let mut b = LtHash::zero();
        b.add_entry(b"idx-2", b"val-2");
        b.add_entry(b"idx-1", b"val-1");

        assert_eq!(a, b);
    }
}
