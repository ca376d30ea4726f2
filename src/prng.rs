//! Deterministic random stream used for every draw an audit makes.
//!
//! Each output block is a domain-separated SHA-256 digest of the seed and an
//! invocation counter, so anyone holding the published seed can recompute
//! the exact sequence of uniforms an audit consumed.  Streams are plain
//! values: there is no process-wide generator, and parallel work units each
//! construct their own stream from a reproducible key.

use crate::error::{AuditError, Result};
use rand::RngCore;
use sha2::{Digest, Sha256};

const STREAM_DOMAIN: &[u8] = b"AUDIT_POWER_STREAM";

/// 2^53, the number of distinct mantissa values of an `f64` in `[0, 1)`.
const MANTISSA_SPAN: f64 = (1u64 << 53) as f64;

/// A seeded SHA-256 counter-mode stream of uniform variates.
#[derive(Debug, Clone)]
pub struct RandomStream {
    seed: u64,
    counter: u64,
    buffer: [u8; 32],
    offset: usize,
}

impl RandomStream {
    /// Creates a stream seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            counter: 0,
            buffer: [0u8; 32],
            offset: 32,
        }
    }

    /// Creates the stream owned by work unit `index` of a batch keyed by `base`.
    pub fn for_trial(base: u64, index: u64) -> Self {
        Self::new(base.wrapping_add(index))
    }

    /// Parses a textual seed, rejecting anything that is not an integer.
    ///
    /// Negative integers are accepted and reinterpreted as their two's
    /// complement `u64`.
    pub fn from_seed_text(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if let Ok(seed) = trimmed.parse::<u64>() {
            return Ok(Self::new(seed));
        }
        trimmed
            .parse::<i64>()
            .map(|seed| Self::new(seed as u64))
            .map_err(|_| AuditError::InvalidSeedKind(text.to_string()))
    }

    /// Returns the seed this stream was constructed from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of hash blocks consumed so far.
    pub fn draws(&self) -> u64 {
        self.counter
    }

    fn next_block(&mut self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(STREAM_DOMAIN);
        hasher.update(self.seed.to_be_bytes());
        hasher.update(self.counter.to_be_bytes());
        let mut block = [0u8; 32];
        block.copy_from_slice(&hasher.finalize());
        self.counter = self.counter.wrapping_add(1);
        block
    }

    /// Returns the next uniform variate, strictly inside `(0, 1)`.
    pub fn next_uniform(&mut self) -> f64 {
        let block = self.next_block();
        let mut head = [0u8; 8];
        head.copy_from_slice(&block[..8]);
        let bits = u64::from_be_bytes(head) >> 11;
        (bits as f64 + 0.5) / MANTISSA_SPAN
    }

    /// Returns the next `m` uniforms; identical to `m` calls of [`next_uniform`](Self::next_uniform).
    pub fn next_uniform_batch(&mut self, m: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(m);
        for _ in 0..m {
            out.push(self.next_uniform());
        }
        out
    }
}

/// Validates a JSON seed, accepting only integers.
pub fn seed_from_value(value: &serde_json::Value) -> Result<u64> {
    if let Some(seed) = value.as_u64() {
        return Ok(seed);
    }
    value
        .as_i64()
        .map(|seed| seed as u64)
        .ok_or_else(|| AuditError::InvalidSeedKind(value.to_string()))
}

// `next_u64` consumes one whole block, like `next_uniform`; `fill_bytes`
// drains a buffered block before hashing the next one.
impl RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        let block = self.next_block();
        let mut head = [0u8; 8];
        head.copy_from_slice(&block[..8]);
        u64::from_be_bytes(head)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(32) {
            if self.offset >= self.buffer.len() {
                self.buffer = self.next_block();
                self.offset = 0;
            }
            let take = chunk.len().min(self.buffer.len() - self.offset);
            chunk[..take].copy_from_slice(&self.buffer[self.offset..self.offset + take]);
            self.offset += take;
            if take < chunk.len() {
                self.buffer = self.next_block();
                let rest = chunk.len() - take;
                chunk[take..].copy_from_slice(&self.buffer[..rest]);
                self.offset = rest;
            }
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_gives_identical_sequences() {
        let mut a = RandomStream::new(12345);
        let mut b = RandomStream::new(12345);
        for _ in 0..64 {
            assert_eq!(a.next_uniform().to_bits(), b.next_uniform().to_bits());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = RandomStream::new(1);
        let mut b = RandomStream::new(2);
        assert_ne!(a.next_uniform_batch(4), b.next_uniform_batch(4));
    }

    #[test]
    fn batch_matches_single_draws() {
        let mut single = RandomStream::new(7);
        let mut batched = RandomStream::new(7);
        let expected: Vec<f64> = (0..10).map(|_| single.next_uniform()).collect();
        assert_eq!(batched.next_uniform_batch(10), expected);
        assert_eq!(batched.draws(), 10);
    }

    #[test]
    fn uniforms_stay_inside_open_interval() {
        let mut stream = RandomStream::new(99);
        for u in stream.next_uniform_batch(5_000) {
            assert!(u > 0.0 && u < 1.0, "{u} escaped (0,1)");
        }
    }

    #[test]
    fn trial_streams_are_keyed_by_index() {
        let mut a = RandomStream::for_trial(10, 5);
        let mut b = RandomStream::new(15);
        assert_eq!(a.next_uniform(), b.next_uniform());
    }

    #[test]
    fn text_seeds_must_be_integers() {
        assert_eq!(RandomStream::from_seed_text("42").unwrap().seed(), 42);
        assert_eq!(
            RandomStream::from_seed_text("-1").unwrap().seed(),
            u64::MAX
        );
        for bad in ["1.5", "abc", ""] {
            assert!(matches!(
                RandomStream::from_seed_text(bad),
                Err(AuditError::InvalidSeedKind(_))
            ));
        }
    }

    #[test]
    fn json_seeds_must_be_integers() {
        assert_eq!(seed_from_value(&serde_json::json!(12345)).unwrap(), 12345);
        assert!(matches!(
            seed_from_value(&serde_json::json!(0.5)),
            Err(AuditError::InvalidSeedKind(_))
        ));
        assert!(matches!(
            seed_from_value(&serde_json::json!("7")),
            Err(AuditError::InvalidSeedKind(_))
        ));
    }

    #[test]
    fn fill_bytes_is_deterministic() {
        let mut a = RandomStream::new(3);
        let mut b = RandomStream::new(3);
        let mut left = [0u8; 70];
        let mut right = [0u8; 70];
        a.fill_bytes(&mut left);
        b.fill_bytes(&mut right);
        assert_eq!(left, right);
        assert!(left.iter().any(|&byte| byte != 0));
    }
}
