//! Rotational bloom filter used by the frontier/DB-writer to answer
//! "have we ever enqueued this URL" in O(1) with bounded memory.
//!
//! Two generations (`hot`, `cold`) of `m` bits each are kept. Adds always go
//! to `hot`; lookups check `hot` then `cold`. Once `hot` has absorbed
//! `k * m / 2` insertions it is atomically rotated into `cold` (replacing the
//! previous `cold`) and `hot` is reset to empty. This bounds the false
//! positive rate while letting the filter "forget" URLs seen only in a much
//! earlier, now-irrelevant generation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::path::Path;

/// Production default: ~10^8 URLs at p<=0.01 false-positive rate.
pub const DEFAULT_BITS: usize = 1 << 30;
pub const DEFAULT_HASHES: u32 = 7;

#[derive(Debug, Clone)]
struct BitArray {
    bits: Vec<u64>,
    len: usize,
}

impl BitArray {
    fn new(len_bits: usize) -> Self {
        let words = len_bits.div_ceil(64);
        Self {
            bits: vec![0u64; words],
            len: len_bits,
        }
    }

    fn set(&mut self, index: usize) {
        let i = index % self.len;
        self.bits[i / 64] |= 1u64 << (i % 64);
    }

    fn get(&self, index: usize) -> bool {
        let i = index % self.len;
        (self.bits[i / 64] >> (i % 64)) & 1 == 1
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.bits.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn from_bytes(bytes: &[u8], len_bits: usize) -> Self {
        let words = len_bits.div_ceil(64);
        let mut bits = vec![0u64; words];
        for (i, chunk) in bytes.chunks(8).enumerate() {
            if i >= words {
                break;
            }
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            bits[i] = u64::from_le_bytes(buf);
        }
        Self { bits, len: len_bits }
    }
}

/// Two-generation rotational bloom filter.
pub struct RotationalBloomFilter {
    hot: BitArray,
    cold: BitArray,
    m_bits: usize,
    k_hashes: u32,
    insertions_since_rotation: usize,
    rotate_threshold: usize,
}

impl RotationalBloomFilter {
    pub fn new(m_bits: usize, k_hashes: u32) -> Self {
        Self {
            hot: BitArray::new(m_bits),
            cold: BitArray::new(m_bits),
            m_bits,
            k_hashes,
            insertions_since_rotation: 0,
            rotate_threshold: (k_hashes as usize * m_bits) / 2,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_BITS, DEFAULT_HASHES)
    }

    fn indices(&self, s: &str) -> Vec<usize> {
        let (h1, h2) = double_hash(s);
        (0..self.k_hashes)
            .map(|i| {
                let combined = h1.wrapping_add((i as u64).wrapping_mul(h2));
                (combined % self.m_bits as u64) as usize
            })
            .collect()
    }

    /// Idempotent write. May trigger a rotation.
    pub fn add(&mut self, s: &str) {
        for idx in self.indices(s) {
            self.hot.set(idx);
        }
        self.insertions_since_rotation += 1;
        if self.insertions_since_rotation >= self.rotate_threshold {
            self.rotate();
        }
    }

    /// True if `s` has probably been added. Never false for something added
    /// since the last two rotations.
    pub fn contains(&self, s: &str) -> bool {
        let idxs = self.indices(s);
        idxs.iter().all(|&i| self.hot.get(i)) || idxs.iter().all(|&i| self.cold.get(i))
    }

    /// Atomically moves `hot` into `cold` and resets `hot`.
    pub fn rotate(&mut self) {
        self.cold = std::mem::replace(&mut self.hot, BitArray::new(self.m_bits));
        self.insertions_since_rotation = 0;
    }

    pub fn checkpoint(&self, hot_path: &Path, cold_path: &Path) -> std::io::Result<()> {
        let mut hot_file = std::fs::File::create(hot_path)?;
        hot_file.write_all(&self.hot.to_bytes())?;
        let mut cold_file = std::fs::File::create(cold_path)?;
        cold_file.write_all(&self.cold.to_bytes())?;
        Ok(())
    }

    /// Restores from disk. On any read/corruption error, starts with empty
    /// hot/cold arrays instead of failing the run.
    pub fn restore(m_bits: usize, k_hashes: u32, hot_path: &Path, cold_path: &Path) -> Self {
        let load = |path: &Path| -> Option<BitArray> {
            let mut file = std::fs::File::open(path).ok()?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf).ok()?;
            Some(BitArray::from_bytes(&buf, m_bits))
        };

        let hot = load(hot_path).unwrap_or_else(|| BitArray::new(m_bits));
        let cold = load(cold_path).unwrap_or_else(|| BitArray::new(m_bits));

        Self {
            hot,
            cold,
            m_bits,
            k_hashes,
            insertions_since_rotation: 0,
            rotate_threshold: (k_hashes as usize * m_bits) / 2,
        }
    }

    pub fn insertions_since_rotation(&self) -> usize {
        self.insertions_since_rotation
    }
}

/// Two independent 64-bit hashes via distinct `Hasher` seeds (Kirsch-Mitzenmacher
/// double hashing: `h_i = h1 + i*h2`).
fn double_hash(s: &str) -> (u64, u64) {
    let mut h1 = DefaultHasher::new();
    s.hash(&mut h1);
    let first = h1.finish();

    let mut h2 = DefaultHasher::new();
    0xdead_beef_u64.hash(&mut h2);
    s.hash(&mut h2);
    let second = h2.finish() | 1; // ensure odd, so it's coprime with power-of-two m

    (first, second)
}
