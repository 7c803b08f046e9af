//! The pending-Interest table: a per-pipeline map from PIT-token to an
//! in-flight Interest, plus the FIFO order used to scan for timeouts.
//!
//! Mirrors NDNc's `PendingInterest` (`pending-interest.hpp`): each entry
//! remembers when it was expressed so `has_expired` is a cheap clock
//! comparison, and the owning pipeline is the sole writer of both the map
//! and the FIFO order (spec §5).

use crossbeam_channel::Sender;
use rust_udcn_common::packet::Interest;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::pipeline::Delivery;
use crate::token::{next_nonce, next_pit_token};

/// Maximum number of retries (NACK-duplicate refresh or timeout) before a
/// PIT entry is abandoned and a null sentinel is delivered (spec §3, §8.4).
pub const MAX_RETRIES: u8 = 8;

/// An in-flight Interest: owns everything needed to retransmit it and to
/// route its eventual response back to the consumer that requested it.
pub struct PendingInterest {
    pub token: u64,
    pub consumer_id: u64,
    pub interest: Interest,
    pub lifetime: Duration,
    pub retries: u8,
    pub expressed_at: Option<Instant>,
    /// Cloned handle to the consumer's delivery queue, captured at admission
    /// time so routing a response never needs to look the consumer back up
    /// in the (possibly already-unregistered) consumer map.
    pub delivery: Sender<Delivery>,
}

impl PendingInterest {
    pub fn new(consumer_id: u64, interest: Interest, delivery: Sender<Delivery>) -> Self {
        let lifetime = Duration::from_millis(interest.lifetime_ms);
        Self {
            token: next_pit_token(),
            consumer_id,
            interest,
            lifetime,
            retries: 0,
            expressed_at: None,
            delivery,
        }
    }

    pub fn mark_expressed(&mut self) {
        self.expressed_at = Some(Instant::now());
    }

    pub fn age(&self) -> Duration {
        self.expressed_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    pub fn has_expired(&self) -> bool {
        self.expressed_at.is_some() && self.age() >= self.lifetime
    }

    /// Produces a fresh nonce and a fresh PIT-token for a retransmission,
    /// preserving the consumer id per spec §3. Caller decides whether to
    /// bump `retries` (timeout does, duplicate-NACK refresh does not).
    pub fn refresh(&mut self) {
        self.token = next_pit_token();
        self.interest.nonce = next_nonce();
        self.expressed_at = None;
    }
}

/// Per-pipeline PIT: owns the token→entry map and the FIFO timeout order.
/// Single-writer by construction (only the pipeline worker thread touches
/// this type).
#[derive(Default)]
pub struct PendingInterestTable {
    entries: HashMap<u64, PendingInterest>,
    timeout_order: VecDeque<u64>,
}

impl PendingInterestTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, token: u64) -> Option<&PendingInterest> {
        self.entries.get(&token)
    }

    pub fn get_mut(&mut self, token: u64) -> Option<&mut PendingInterest> {
        self.entries.get_mut(&token)
    }

    pub fn remove(&mut self, token: u64) -> Option<PendingInterest> {
        self.entries.remove(&token)
    }

    /// All tokens currently present, irrespective of FIFO order. Used only
    /// to flush every in-flight entry when the pipeline closes fatally.
    pub fn tokens(&self) -> Vec<u64> {
        self.entries.keys().copied().collect()
    }

    /// Inserts a freshly-expressed entry and appends its token to the FIFO
    /// timeout order. Caller must have already called `mark_expressed`.
    pub fn insert_expressed(&mut self, entry: PendingInterest) {
        self.timeout_order.push_back(entry.token);
        self.entries.insert(entry.token, entry);
    }

    /// Re-admits a refreshed entry: same bookkeeping as a fresh insert, since
    /// refresh assigns a new token and clears `expressed_at` (caller marks it
    /// expressed again once actually retransmitted).
    pub fn reinsert(&mut self, entry: PendingInterest) {
        self.timeout_order.push_back(entry.token);
        self.entries.insert(entry.token, entry);
    }

    /// Scans the FIFO order from the head, draining entries that have
    /// expired (or have already been satisfied and are merely stale FIFO
    /// tombstones) and stopping at the first entry that is still live.
    /// Returns the tokens that expired so the caller can decide how to
    /// refresh or abandon each one; already-satisfied tombstones are
    /// silently dropped, matching spec §4.1 "Timeout".
    pub fn drain_expired(&mut self) -> Vec<u64> {
        let mut expired = Vec::new();
        while let Some(&token) = self.timeout_order.front() {
            match self.entries.get(&token) {
                None => {
                    // Already satisfied/erased; this FIFO slot is a tombstone.
                    self.timeout_order.pop_front();
                }
                Some(entry) if entry.has_expired() => {
                    self.timeout_order.pop_front();
                    expired.push(token);
                }
                Some(_) => break,
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_udcn_common::name::Name;

    fn delivery() -> Sender<Delivery> {
        crossbeam_channel::unbounded().0
    }

    fn interest() -> Interest {
        Interest::new(Name::from_path("/ndn/ft/dataset.bin"), 10)
    }

    #[test]
    fn fifo_scan_stops_at_first_live_entry() {
        let mut pit = PendingInterestTable::new();

        let mut old = PendingInterest::new(1, interest(), delivery());
        old.mark_expressed();
        let old_token = old.token;
        pit.insert_expressed(old);

        std::thread::sleep(Duration::from_millis(20));

        let mut young = PendingInterest::new(
            1,
            Interest::new(Name::from_path("/ndn/ft/dataset.bin"), 10_000),
            delivery(),
        );
        young.mark_expressed();
        pit.insert_expressed(young);

        let expired = pit.drain_expired();
        assert_eq!(expired, vec![old_token]);
        assert_eq!(pit.len(), 1);
    }

    #[test]
    fn tombstones_are_skipped() {
        let mut pit = PendingInterestTable::new();
        let mut entry = PendingInterest::new(1, interest(), delivery());
        entry.mark_expressed();
        let token = entry.token;
        pit.insert_expressed(entry);

        pit.remove(token);
        assert!(pit.drain_expired().is_empty());
    }

    #[test]
    fn refresh_issues_new_token_and_nonce_preserves_consumer() {
        let mut entry = PendingInterest::new(7, interest(), delivery());
        let old_token = entry.token;
        let old_nonce = entry.interest.nonce;
        entry.refresh();
        assert_ne!(entry.token, old_token);
        assert_ne!(entry.interest.nonce, old_nonce);
        assert_eq!(entry.consumer_id, 7);
        assert_eq!(entry.retries, 0);
    }
}
