//! Congestion window control: the fixed and AIMD pipeline variants.
//!
//! Modeled as a common trait plus two concrete types chosen once at
//! pipeline construction (spec §9 design notes prefer this tagged-enum
//! static dispatch over a trait object on the hot path).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub const MIN_WINDOW: usize = 64;
pub const MAX_WINDOW: usize = 65_536;
pub const MAX_RTT: Duration = Duration::from_millis(200);

/// Window-control behavior shared by the fixed and AIMD variants.
pub trait CongestionWindow: Send + Sync {
    /// Current number of Interests the pipeline may have in flight.
    fn cwnd(&self) -> usize;

    /// Called for every Data delivered to a consumer.
    fn on_data(&self, congestion_marked: bool);

    /// Called for every Interest timeout.
    fn on_timeout(&self);
}

/// Immutable window: `cwnd` never changes after construction.
pub struct FixedWindow {
    cwnd: usize,
}

impl FixedWindow {
    /// NDNc's benchmark client defaults `PipelineInterestsFixed` to 2048 when
    /// no `--pipeline-size` is given.
    pub const DEFAULT_CWND: usize = 2048;

    pub fn new(cwnd: usize) -> Self {
        Self { cwnd: cwnd.max(1) }
    }
}

impl Default for FixedWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CWND)
    }
}

impl CongestionWindow for FixedWindow {
    fn cwnd(&self) -> usize {
        self.cwnd
    }

    fn on_data(&self, _congestion_marked: bool) {}

    fn on_timeout(&self) {}
}

/// Additive-increase / multiplicative-decrease window, mirroring NDNc's
/// `PipelineInterestsAimd`.
pub struct AimdWindow {
    cwnd: AtomicUsize,
    ssthresh: AtomicUsize,
    inc_counter: AtomicUsize,
    last_decrease: std::sync::Mutex<Instant>,
    /// Nanoseconds since an arbitrary epoch, used only to let tests observe
    /// whether a decrease happened without racing `last_decrease`'s mutex.
    decreases: AtomicU64,
}

impl AimdWindow {
    pub fn new(initial_ssthresh: usize) -> Self {
        Self {
            cwnd: AtomicUsize::new(MIN_WINDOW),
            ssthresh: AtomicUsize::new(initial_ssthresh.max(MIN_WINDOW)),
            inc_counter: AtomicUsize::new(0),
            last_decrease: std::sync::Mutex::new(Instant::now() - MAX_RTT * 2),
            decreases: AtomicU64::new(0),
        }
    }

    pub fn ssthresh(&self) -> usize {
        self.ssthresh.load(Ordering::Relaxed)
    }

    /// Number of times `decrease_window` actually changed `cwnd` (test hook).
    pub fn decrease_count(&self) -> u64 {
        self.decreases.load(Ordering::Relaxed)
    }

    fn decrease_window(&self) {
        let mut last = self.last_decrease.lock().unwrap();
        if last.elapsed() < MAX_RTT {
            return;
        }
        let new_cwnd = (self.cwnd.load(Ordering::Relaxed) / 2).max(MIN_WINDOW);
        self.cwnd.store(new_cwnd, Ordering::Relaxed);
        self.ssthresh.store(new_cwnd, Ordering::Relaxed);
        self.inc_counter.store(0, Ordering::Relaxed);
        *last = Instant::now();
        self.decreases.fetch_add(1, Ordering::Relaxed);
    }

    fn increase_window(&self) {
        let cwnd = self.cwnd.load(Ordering::Relaxed);
        let ssthresh = self.ssthresh.load(Ordering::Relaxed);
        if cwnd < ssthresh {
            let new_cwnd = (cwnd + 1).min(MAX_WINDOW);
            self.cwnd.store(new_cwnd, Ordering::Relaxed);
        } else {
            let reached = self.inc_counter.fetch_add(1, Ordering::Relaxed) + 1 >= cwnd;
            if reached {
                self.inc_counter.store(0, Ordering::Relaxed);
                let new_cwnd = (cwnd + 1).min(MAX_WINDOW);
                self.cwnd.store(new_cwnd, Ordering::Relaxed);
            }
        }
    }
}

impl CongestionWindow for AimdWindow {
    fn cwnd(&self) -> usize {
        self.cwnd.load(Ordering::Relaxed)
    }

    fn on_data(&self, congestion_marked: bool) {
        if congestion_marked {
            self.decrease_window();
        }
        self.increase_window();
    }

    fn on_timeout(&self) {
        self.decrease_window();
    }
}

/// The two window-control strategies, chosen once at pipeline construction.
pub enum WindowControl {
    Fixed(FixedWindow),
    Aimd(AimdWindow),
}

impl CongestionWindow for WindowControl {
    fn cwnd(&self) -> usize {
        match self {
            Self::Fixed(w) => w.cwnd(),
            Self::Aimd(w) => w.cwnd(),
        }
    }

    fn on_data(&self, congestion_marked: bool) {
        match self {
            Self::Fixed(w) => w.on_data(congestion_marked),
            Self::Aimd(w) => w.on_data(congestion_marked),
        }
    }

    fn on_timeout(&self) {
        match self {
            Self::Fixed(w) => w.on_timeout(),
            Self::Aimd(w) => w.on_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_window_never_changes() {
        let w = FixedWindow::new(128);
        assert_eq!(w.cwnd(), 128);
        w.on_data(true);
        w.on_timeout();
        assert_eq!(w.cwnd(), 128);
    }

    #[test]
    fn aimd_slow_start_increases_every_data() {
        let w = AimdWindow::new(4096);
        assert_eq!(w.cwnd(), 64);
        for _ in 0..10 {
            w.on_data(false);
        }
        assert_eq!(w.cwnd(), 74);
    }

    #[test]
    fn aimd_stays_within_bounds() {
        let w = AimdWindow::new(4096);
        for _ in 0..200_000 {
            w.on_data(false);
        }
        assert!(w.cwnd() <= MAX_WINDOW);
        assert!(w.cwnd() >= MIN_WINDOW);
    }

    #[test]
    fn aimd_congestion_avoidance_increments_every_cwnd_packets() {
        let w = AimdWindow::new(100);
        // Drive cwnd to ssthresh via slow start.
        for _ in 0..36 {
            w.on_data(false);
        }
        assert_eq!(w.cwnd(), 100);
        // Now in congestion avoidance: needs `cwnd` (100) Data events for +1.
        for _ in 0..99 {
            w.on_data(false);
        }
        assert_eq!(w.cwnd(), 100);
        w.on_data(false);
        assert_eq!(w.cwnd(), 101);
    }

    #[test]
    fn decrease_suppressed_within_max_rtt() {
        let w = AimdWindow::new(4096);
        w.on_timeout();
        assert_eq!(w.decrease_count(), 1);
        w.on_timeout();
        assert_eq!(w.decrease_count(), 1, "second decrease within MAX_RTT must be suppressed");
    }

    #[test]
    fn scenario_f_aimd_slow_start_to_congestion_avoidance() {
        let w = AimdWindow::new(4096);
        for _ in 0..(4096 - 64) {
            w.on_data(false);
        }
        assert_eq!(w.cwnd(), 4096);

        // 4097th Data transitions to congestion avoidance; a congestion mark
        // at that moment halves the window.
        w.on_data(true);
        assert_eq!(w.cwnd(), 2048);
        assert_eq!(w.ssthresh(), 2048);

        // A second mark within MAX_RTT of the first leaves cwnd unchanged.
        w.on_data(true);
        assert_eq!(w.cwnd(), 2048);
    }
}
