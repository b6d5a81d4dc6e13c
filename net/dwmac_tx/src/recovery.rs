//! Error recovery for the transmit path.
//!
//! Three triggers funnel into [`TxEngine::reset`]: a fatal cause reported by
//! the controller (bus error, transmit process stopped), a transmit
//! underflow, and a stall detected by the watchdog. Underflow additionally
//! bumps the store-and-forward threshold before resetting, stepping the
//! trigger level up toward a fixed ceiling so repeated underflows become
//! progressively less likely. The controller owns that mutable threshold;
//! everything else about the configuration is immutable.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use log::{info, warn};
use spin::Mutex;

use dwmac_hal::{DmaOperations, DwmacStats};

use crate::TxEngine;

/// Recovery tunables, fixed at open.
#[derive(Clone, Copy, Debug)]
pub struct RecoveryConfig {
    /// Initial store-and-forward trigger level, in bytes.
    pub threshold: u32,
    /// Amount added to the threshold on each underflow.
    pub threshold_step: u32,
    /// Upper bound the threshold is clamped to.
    pub threshold_ceiling: u32,
    /// Pure store-and-forward mode: the threshold is not in use, so
    /// underflow events skip the bump and go straight to reset.
    pub store_and_forward: bool,
    /// How long transmit completions may be absent, with frames
    /// outstanding, before the path is declared stalled.
    pub watchdog_ms: u64,
}

struct WatchState {
    /// The consumed cursor at the last watchdog tick.
    last_consumed: u64,
    /// When outstanding work was first seen not to progress.
    pending_since: Option<u64>,
}

pub struct RecoveryController {
    dma: Arc<dyn DmaOperations>,
    stats: Arc<DwmacStats>,
    /// The adaptive threshold; the one mutable piece of configuration.
    threshold: AtomicU32,
    config: RecoveryConfig,
    watch: Mutex<WatchState>,
}

impl RecoveryController {
    /// Creates the controller and programs the initial threshold.
    pub fn new(
        dma: Arc<dyn DmaOperations>,
        stats: Arc<DwmacStats>,
        config: RecoveryConfig,
    ) -> RecoveryController {
        dma.set_dma_threshold(config.threshold);
        RecoveryController {
            dma,
            stats,
            threshold: AtomicU32::new(config.threshold),
            config,
            watch: Mutex::new(WatchState { last_consumed: 0, pending_since: None }),
        }
    }

    /// The current adaptive threshold.
    pub fn threshold(&self) -> u32 {
        self.threshold.load(Ordering::Relaxed)
    }

    /// Transmit underflow: step the threshold up (clamped at the ceiling),
    /// program it, then reset the transmit path.
    pub fn on_underflow(&self, tx: &TxEngine) {
        if !self.config.store_and_forward {
            let old = self.threshold.load(Ordering::Relaxed);
            let new = old
                .saturating_add(self.config.threshold_step)
                .min(self.config.threshold_ceiling);
            self.threshold.store(new, Ordering::Relaxed);
            info!("dwmac_tx::recovery: underflow, threshold {} -> {}", old, new);
            self.dma.set_dma_threshold(new);
        }
        tx.reset();
    }

    /// Fatal bus error or transmit process stopped: unconditional reset.
    pub fn on_fatal(&self, tx: &TxEngine) {
        tx.reset();
    }

    /// Periodic timer hook. Declares a stall when frames have been
    /// outstanding for the configured deadline with no completion progress,
    /// then disables coalescing for good and resets the transmit path.
    ///
    /// Coalescing stays off because a stalled ring with interrupt requests
    /// suppressed takes a full deadline to detect; after one stall, every
    /// frame requests its own completion interrupt.
    pub fn watchdog(&self, tx: &TxEngine, now_ms: u64) {
        let (produced, consumed) = tx.cursors();
        let mut watch = self.watch.lock();

        if produced == consumed || consumed != watch.last_consumed {
            watch.last_consumed = consumed;
            watch.pending_since = None;
            return;
        }

        match watch.pending_since {
            None => watch.pending_since = Some(now_ms),
            Some(since) if now_ms.saturating_sub(since) >= self.config.watchdog_ms => {
                warn!(
                    "dwmac_tx::recovery: no transmit completion for {} ms with {} slots in flight, resetting",
                    now_ms.saturating_sub(since),
                    produced - consumed,
                );
                watch.pending_since = None;
                watch.last_consumed = 0;
                drop(watch);

                self.stats.tx_stalls.inc();
                tx.disable_coalescing();
                tx.reset();
            }
            Some(_) => {}
        }
    }
}
