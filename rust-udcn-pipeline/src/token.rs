//! PIT-token and Interest nonce generation.
//!
//! A process-global 64-bit counter, seeded once from a CSPRNG and then
//! incremented atomically, as NDNc's `threadsafe-uint64-generator.hpp` does
//! for its PIT tokens. Collisions across pipelines in the same process are
//! tolerable: the PIT is per-pipeline, so a token only needs to be unique
//! within the pipeline that issued it.

use rand::RngCore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

static PIT_TOKEN_COUNTER: OnceLock<AtomicU64> = OnceLock::new();

/// Returns the next PIT-token value for any pipeline in this process.
pub fn next_pit_token() -> u64 {
    let counter = PIT_TOKEN_COUNTER.get_or_init(|| AtomicU64::new(rand::thread_rng().next_u64()));
    counter.fetch_add(1, Ordering::Relaxed)
}

/// Returns a fresh 4-byte Interest nonce. Every retransmission of a pending
/// Interest must carry a new one (spec §3, §8 property 3).
pub fn next_nonce() -> u32 {
    rand::thread_rng().next_u32()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_distinct() {
        let a = next_pit_token();
        let b = next_pit_token();
        assert_ne!(a, b);
    }

    #[test]
    fn nonces_vary() {
        let seen: std::collections::HashSet<u32> = (0..32).map(|_| next_nonce()).collect();
        assert!(seen.len() > 1);
    }
}
