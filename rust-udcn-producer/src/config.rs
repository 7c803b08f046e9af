//! Producer-side configuration (spec §4.3), mirroring how
//! `rust_udcn_face::config::FaceOptions` groups face-layer knobs.

use std::path::PathBuf;
use std::time::Duration;

use rust_udcn_common::name::{Name, MAX_NDN_PACKET_SIZE};
use rust_udcn_common::naming;

/// Minimum worker-pool size a caller may configure (`xrdndn-producer-options.hh`'s
/// `XRDNDN_INTERESTMANAGER_MIN_NTHREADS`).
pub const MIN_NTHREADS: u16 = 1;
/// Default worker-pool size (`XRDNDN_INTERESTMANAGER_DEFAULT_NTHREADS`).
pub const DEFAULT_NTHREADS: u16 = 8;

/// Minimum garbage-collector period (`XRDNDN_GB_MIN_TIMEPERIOD`).
pub const MIN_GC_PERIOD: Duration = Duration::from_secs(16);
/// Default garbage-collector period (`XRDNDN_GB_DEFAULT_TIMEPERIOD`).
pub const DEFAULT_GC_PERIOD: Duration = Duration::from_secs(256);
/// Default idle lifetime before a cached file handle is evicted.
pub const DEFAULT_GC_LIFETIME: Duration = Duration::from_secs(60);

/// Default segment size, matching NDNc's `ft-server`'s `ServerOptions::segmentSize`.
pub const DEFAULT_SEGMENT_SIZE: u64 = 6600;

/// Freshness period applied to metadata (RDR discovery) responses (spec §4.3 step 4).
pub const METADATA_FRESHNESS_PERIOD_MS: u64 = 2;

/// Everything the dispatcher needs to classify a name, find the
/// corresponding file under `root_dir`, and build a response.
#[derive(Debug, Clone)]
pub struct ProducerOptions {
    /// Directory tree served under `prefix`.
    pub root_dir: PathBuf,
    pub prefix: Name,
    pub segment_size: u64,
    pub nthreads: u16,
    pub gc_period: Duration,
    pub gc_lifetime: Duration,
    pub disable_signing: bool,
}

impl ProducerOptions {
    pub fn new(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            prefix: Name::from_path(naming::DEFAULT_NAME_PREFIX),
            segment_size: DEFAULT_SEGMENT_SIZE,
            nthreads: DEFAULT_NTHREADS,
            gc_period: DEFAULT_GC_PERIOD,
            gc_lifetime: DEFAULT_GC_LIFETIME,
            disable_signing: false,
        }
    }

    /// Clamps `nthreads`, `gc_period` and `segment_size` to the bounds the
    /// CLI surface advertises, rather than rejecting an out-of-range value
    /// outright (spec §6: "segment-size B ≤ 8800").
    pub fn normalized(mut self) -> Self {
        self.nthreads = self.nthreads.max(MIN_NTHREADS);
        if self.gc_period < MIN_GC_PERIOD {
            self.gc_period = MIN_GC_PERIOD;
        }
        if self.segment_size == 0 {
            self.segment_size = DEFAULT_SEGMENT_SIZE;
        }
        if self.segment_size > MAX_NDN_PACKET_SIZE as u64 {
            self.segment_size = MAX_NDN_PACKET_SIZE as u64;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_clamps_out_of_range_values() {
        let mut options = ProducerOptions::new(PathBuf::from("/srv/ft"));
        options.nthreads = 0;
        options.gc_period = Duration::from_secs(1);
        options.segment_size = 100_000;
        let options = options.normalized();

        assert_eq!(options.nthreads, MIN_NTHREADS);
        assert_eq!(options.gc_period, MIN_GC_PERIOD);
        assert_eq!(options.segment_size, MAX_NDN_PACKET_SIZE as u64);
    }
}
