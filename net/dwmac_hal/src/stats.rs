//! Read-only counters maintained by the engines and exposed upward.
//!
//! The struct is shared by reference across the interrupt dispatcher and the
//! two engines, so every field is a relaxed atomic; none of these counts is
//! used for control decisions.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::DiscardReason;

/// A relaxed monotonically increasing event counter.
#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub const fn new() -> Counter {
        Counter(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Every counter the engine exposes: frame/byte totals, per-reason receive
/// discards, per-cause interrupt counts, and recovery events.
#[derive(Debug, Default)]
pub struct DwmacStats {
    pub tx_frames: Counter,
    pub tx_bytes: Counter,
    pub tx_errors: Counter,

    pub rx_frames: Counter,
    pub rx_bytes: Counter,
    pub rx_dropped: Counter,

    pub rx_crc_errors: Counter,
    pub rx_runt_frames: Counter,
    pub rx_oversize_frames: Counter,
    pub rx_framing_errors: Counter,
    pub rx_collisions: Counter,

    pub tx_underflow_irq: Counter,
    pub tx_jabber_irq: Counter,
    pub tx_early_irq: Counter,
    pub tx_process_stopped_irq: Counter,
    pub fatal_bus_error_irq: Counter,
    pub rx_overflow_irq: Counter,
    pub rx_buf_unavailable_irq: Counter,
    pub rx_process_stopped_irq: Counter,
    pub rx_watchdog_irq: Counter,
    pub tx_normal_irq: Counter,
    pub rx_normal_irq: Counter,

    pub tx_resets: Counter,
    pub tx_stalls: Counter,
    pub tx_reclaim_runs: Counter,
    pub rx_poll_runs: Counter,
}

impl DwmacStats {
    /// Counts one discarded receive frame under its reason.
    pub fn record_discard(&self, reason: DiscardReason) {
        match reason {
            DiscardReason::Crc => self.rx_crc_errors.inc(),
            DiscardReason::Runt => self.rx_runt_frames.inc(),
            DiscardReason::Oversize => self.rx_oversize_frames.inc(),
            DiscardReason::Framing => self.rx_framing_errors.inc(),
            DiscardReason::Collision => self.rx_collisions.inc(),
        }
    }

    /// Total receive discards across every reason.
    pub fn rx_discards(&self) -> u64 {
        self.rx_crc_errors.get()
            + self.rx_runt_frames.get()
            + self.rx_oversize_frames.get()
            + self.rx_framing_errors.get()
            + self.rx_collisions.get()
    }
}
