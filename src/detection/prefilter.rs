//! Bloom filter used to reject unknown hashes before the exact index is searched.
//!
//! Sized from the expected item count `n` and target false positive rate `p`:
//! - bits: `m = ceil(-n * ln(p) / ln(2)^2)`
//! - hash functions: `k = round((m / n) * ln(2))`
//!
//! Bit positions come from double hashing two seeded xxh3 values, so one pass
//! over the key yields all `k` probes. A negative answer is exact; a positive
//! answer is wrong with probability close to `p`.

use std::f64::consts::LN_2;
use xxhash_rust::xxh3::xxh3_64_with_seed;

const SEED_PRIMARY: u64 = 0x9E37_79B9_7F4A_7C15;
const SEED_SECONDARY: u64 = 0xC2B2_AE3D_27D4_EB4F;

/// Smallest bit array ever allocated.
const MIN_BITS: usize = 64;

/// Approximate-membership filter over signature hashes.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: usize,
    num_hashes: u32,
    items: usize,
}

impl BloomFilter {
    /// Create an empty filter sized for `expected_items` at `fp_rate`.
    ///
    /// `fp_rate` must lie in (0, 1); callers validate it through the database
    /// configuration before a filter is ever built.
    pub fn with_rate(expected_items: usize, fp_rate: f64) -> Self {
        let (num_bits, num_hashes) = optimal_params(expected_items, fp_rate);
        Self {
            bits: vec![0u64; num_bits.div_ceil(64)],
            num_bits,
            num_hashes,
            items: 0,
        }
    }

    /// Build a filter containing every hash in `hashes`.
    pub fn from_hashes<'a, I>(hashes: I, fp_rate: f64) -> Self
    where
        I: IntoIterator<Item = &'a str>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = hashes.into_iter();
        let mut filter = Self::with_rate(iter.len(), fp_rate);
        for hash in iter {
            filter.insert(hash);
        }
        filter
    }

    /// Add a hash to the filter.
    pub fn insert(&mut self, hash: &str) {
        let (h1, h2) = self.base_hashes(hash);
        for i in 0..self.num_hashes {
            let idx = self.probe(h1, h2, i);
            self.bits[idx / 64] |= 1u64 << (idx % 64);
        }
        self.items += 1;
    }

    /// Test membership. `false` means the hash was never inserted.
    #[inline]
    pub fn test(&self, hash: &str) -> bool {
        let (h1, h2) = self.base_hashes(hash);
        (0..self.num_hashes).all(|i| {
            let idx = self.probe(h1, h2, i);
            self.bits[idx / 64] & (1u64 << (idx % 64)) != 0
        })
    }

    /// Number of bits in the filter.
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Number of hash functions per key.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Number of inserted hashes.
    pub fn len(&self) -> usize {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.bits.len() * std::mem::size_of::<u64>()
    }

    #[inline]
    fn base_hashes(&self, hash: &str) -> (u64, u64) {
        let bytes = hash.as_bytes();
        // Odd step keeps probes from collapsing when h2 shares factors with m.
        (
            xxh3_64_with_seed(bytes, SEED_PRIMARY),
            xxh3_64_with_seed(bytes, SEED_SECONDARY) | 1,
        )
    }

    #[inline]
    fn probe(&self, h1: u64, h2: u64, i: u32) -> usize {
        (h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits as u64) as usize
    }
}

/// Compute `(bits, hash functions)` for `n` items at false positive rate `p`.
fn optimal_params(n: usize, p: f64) -> (usize, u32) {
    if n == 0 {
        return (MIN_BITS, 1);
    }
    let n = n as f64;
    let m = (-n * p.ln() / (LN_2 * LN_2)).ceil().max(MIN_BITS as f64);
    let k = ((m / n) * LN_2).round().max(1.0);
    (m as usize, k as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_hex(rng: &mut StdRng) -> String {
        let bytes: [u8; 32] = rng.gen();
        hex::encode(bytes)
    }

    #[test]
    fn test_optimal_params() {
        // 1000 items at 1% needs ~9586 bits and 7 hash functions.
        let (m, k) = optimal_params(1000, 0.01);
        assert_eq!(m, 9586);
        assert_eq!(k, 7);

        assert_eq!(optimal_params(0, 0.01), (MIN_BITS, 1));
    }

    #[test]
    fn test_no_false_negatives() {
        let mut rng = StdRng::seed_from_u64(1);
        let hashes: Vec<String> = (0..5_000).map(|_| random_hex(&mut rng)).collect();
        let filter = BloomFilter::from_hashes(hashes.iter().map(String::as_str), 0.01);

        assert_eq!(filter.len(), 5_000);
        for hash in &hashes {
            assert!(filter.test(hash), "false negative for {}", hash);
        }
    }

    #[test]
    fn test_false_positive_rate_within_target() {
        let mut rng = StdRng::seed_from_u64(42);
        let members: Vec<String> = (0..10_000).map(|_| random_hex(&mut rng)).collect();
        let filter = BloomFilter::from_hashes(members.iter().map(String::as_str), 0.001);

        let samples = 100_000;
        let false_positives = (0..samples)
            .map(|_| random_hex(&mut rng))
            .filter(|h| filter.test(h))
            .count();

        let observed = false_positives as f64 / samples as f64;
        assert!(observed < 0.005, "observed false positive rate {}", observed);
    }

    #[test]
    fn test_empty_filter_rejects_everything() {
        let filter = BloomFilter::from_hashes(std::iter::empty::<&str>(), 0.01);
        assert!(filter.is_empty());
        assert!(!filter.test("d41d8cd98f00b204e9800998ecf8427e"));
    }
}
