//! Packet transmit/receive engine for DWMAC-style Ethernet controllers.
//!
//! The engine is built around two fixed-size descriptor rings shared with
//! the controller's DMA. The silicon variant is abstracted behind the
//! [`DescriptorOps`] codec and the [`DmaOperations`] register interface,
//! both chosen once at [`Dwmac::open`]; nothing downstream branches on the
//! variant again.
//!
//! Control flow is split across three contexts:
//!
//! * [`Dwmac::handle_interrupt`] runs at the platform's interrupt boundary.
//!   It reads the DMA status word once, acknowledges exactly the bits it
//!   read, counts and routes abnormal causes, and schedules deferred work
//!   for the normal ones. Scheduling is idempotent: repeated interrupts
//!   while a task is pending are no-ops.
//! * [`Dwmac::service`] runs in whatever worker context the platform
//!   provides. It executes one queued work item: a transmit reclaim, or a
//!   budget-bounded receive poll. A poll that exhausts its budget
//!   reschedules itself; one that drains the ring re-enables the receive
//!   interrupt and exits polling mode.
//! * [`Dwmac::enqueue`] and the rest of the control surface are ordinary
//!   calls from the layer above.
//!
//! Transmit faults (underflow, process stopped, bus error, stall) are
//! repaired in place by the recovery controller; callers only ever observe
//! transient `Busy` backpressure.

#![no_std]

extern crate alloc;

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, trace, warn};

use dma_buffers::{BufferPool, TransmitFrame};
use dma_ring::DescriptorRing;
use dwmac_hal::{DmaOperations, DwmacStats, FrameSink, InterruptStatus, MacVariant};
use dwmac_rx::RxEngine;
use dwmac_tx::recovery::{RecoveryConfig, RecoveryController};
use dwmac_tx::{TxConfig, TxEngine};

pub use config::DwmacConfig;
pub use dwmac_hal::{ChecksumStatus, DescriptorOps, DiscardReason};
pub use dwmac_tx::EnqueueOutcome;

pub mod config;


/// Work handed from the interrupt boundary to the worker context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferredWork {
    /// Reclaim completed transmit slots.
    TxReclaim,
    /// Run one budget-bounded receive poll pass.
    RxPoll,
}

/// Interrupt causes the dispatcher knows how to handle.
const HANDLED_CAUSES: InterruptStatus = InterruptStatus::from_bits_truncate(
    InterruptStatus::TX_COMPLETE.bits()
        | InterruptStatus::TX_STOPPED.bits()
        | InterruptStatus::TX_JABBER.bits()
        | InterruptStatus::RX_OVERFLOW.bits()
        | InterruptStatus::TX_UNDERFLOW.bits()
        | InterruptStatus::RX_COMPLETE.bits()
        | InterruptStatus::RX_BUF_UNAVAILABLE.bits()
        | InterruptStatus::RX_STOPPED.bits()
        | InterruptStatus::RX_WATCHDOG.bits()
        | InterruptStatus::TX_EARLY.bits()
        | InterruptStatus::FATAL_BUS_ERROR.bits()
        | InterruptStatus::ABNORMAL_SUMMARY.bits()
        | InterruptStatus::NORMAL_SUMMARY.bits(),
);

pub struct Dwmac {
    config: DwmacConfig,
    dma: Arc<dyn DmaOperations>,
    tx: TxEngine,
    rx: RxEngine,
    recovery: RecoveryController,
    stats: Arc<DwmacStats>,
    link_up: AtomicBool,
    work: Arc<mpmc::Queue<DeferredWork>>,
    tx_scheduled: AtomicBool,
    rx_scheduled: AtomicBool,
}

impl Dwmac {
    /// Brings the engine up: allocates and arms both rings, programs the
    /// initial DMA threshold, and starts the two DMA channels. Ring or pool
    /// allocation failure is the one unrecoverable error and surfaces here;
    /// nothing is started in that case.
    pub fn open(
        config: DwmacConfig,
        variant: MacVariant,
        dma: Arc<dyn DmaOperations>,
        sink: Arc<dyn FrameSink>,
    ) -> Result<Dwmac, &'static str> {
        let config = config.validated();
        let ops = variant.descriptor_ops();
        let stats = Arc::new(DwmacStats::default());

        let tx = TxEngine::new(
            DescriptorRing::new(config.tx_ring_size)?,
            TxConfig {
                max_frags: config.max_frags,
                coalesce: config.tx_coalesce,
                csum_insertion: config.hw_checksum,
            },
            ops.clone(),
            dma.clone(),
            sink.clone(),
            stats.clone(),
        );

        // Enough spare buffers for one full poll pass to refill while the
        // delivered frames are still held upstream.
        let pool = BufferPool::new(
            config.rx_ring_size + config.rx_poll_budget,
            config.rx_buffer_len,
            true,
        )?;
        let rx = RxEngine::new(
            DescriptorRing::new(config.rx_ring_size)?,
            pool,
            ops,
            dma.clone(),
            sink,
            stats.clone(),
        )?;

        let recovery = RecoveryController::new(
            dma.clone(),
            stats.clone(),
            RecoveryConfig {
                threshold: config.dma_threshold,
                threshold_step: config.threshold_step,
                threshold_ceiling: config.threshold_ceiling,
                store_and_forward: config.store_and_forward,
                watchdog_ms: config.watchdog_ms,
            },
        );

        dma.start_tx();
        dma.start_rx();
        dma.enable_rx_interrupt();
        debug!("dwmac::open(): DMA rx/tx processes started ({:?})", variant);

        Ok(Dwmac {
            config,
            dma,
            tx,
            rx,
            recovery,
            stats,
            link_up: AtomicBool::new(false),
            work: Arc::new(mpmc::Queue::with_capacity(8)),
            tx_scheduled: AtomicBool::new(false),
            rx_scheduled: AtomicBool::new(false),
        })
    }

    /// Submits one outbound frame. `Busy` hands the frame back; the caller
    /// retries after the sink's next resume signal.
    pub fn enqueue(&self, frame: TransmitFrame) -> EnqueueOutcome {
        if !self.link_up.load(Ordering::Relaxed) {
            return EnqueueOutcome::Busy(frame);
        }
        self.tx.enqueue(frame)
    }

    /// Runs one receive poll pass. Normally invoked through
    /// [`service`](Self::service); exposed for platforms that poll directly.
    pub fn poll(&self, budget: usize) -> usize {
        if !self.link_up.load(Ordering::Relaxed) {
            return 0;
        }
        self.rx.poll(budget)
    }

    /// The interrupt dispatcher. Reads the DMA status once, writes back
    /// exactly the bits read (causes raised concurrently must survive the
    /// acknowledgement), then classifies.
    pub fn handle_interrupt(&self) {
        let status = self.dma.interrupt_status();
        if status.is_empty() {
            return;
        }
        self.dma.clear_interrupt(status);
        trace!("dwmac::handle_interrupt(): status {:?}", status);

        if status.intersects(InterruptStatus::ABNORMAL_SUMMARY) {
            if status.contains(InterruptStatus::TX_UNDERFLOW) {
                debug!("dwmac::handle_interrupt(): transmit underflow");
                self.stats.tx_underflow_irq.inc();
                self.recovery.on_underflow(&self.tx);
            }
            if status.contains(InterruptStatus::TX_JABBER) {
                self.stats.tx_jabber_irq.inc();
            }
            if status.contains(InterruptStatus::RX_OVERFLOW) {
                self.stats.rx_overflow_irq.inc();
            }
            if status.contains(InterruptStatus::RX_BUF_UNAVAILABLE) {
                self.stats.rx_buf_unavailable_irq.inc();
            }
            if status.contains(InterruptStatus::RX_STOPPED) {
                self.stats.rx_process_stopped_irq.inc();
            }
            if status.contains(InterruptStatus::RX_WATCHDOG) {
                self.stats.rx_watchdog_irq.inc();
            }
            if status.contains(InterruptStatus::TX_EARLY) {
                self.stats.tx_early_irq.inc();
            }
            if status.contains(InterruptStatus::TX_STOPPED) {
                error!("dwmac::handle_interrupt(): transmit process stopped");
                self.stats.tx_process_stopped_irq.inc();
                self.recovery.on_fatal(&self.tx);
            }
            if status.contains(InterruptStatus::FATAL_BUS_ERROR) {
                error!("dwmac::handle_interrupt(): fatal bus error");
                self.stats.fatal_bus_error_irq.inc();
                self.recovery.on_fatal(&self.tx);
            }
        }

        if status.intersects(InterruptStatus::NORMAL_SUMMARY) {
            if status.contains(InterruptStatus::RX_COMPLETE) {
                self.stats.rx_normal_irq.inc();
                // Mask further receive interrupts; polling mode owns the
                // ring until a pass drains it.
                self.dma.disable_rx_interrupt();
                self.schedule(DeferredWork::RxPoll, &self.rx_scheduled);
            }
            if status.contains(InterruptStatus::TX_COMPLETE) {
                self.stats.tx_normal_irq.inc();
                self.schedule(DeferredWork::TxReclaim, &self.tx_scheduled);
            }
        }

        let unexpected = status - HANDLED_CAUSES;
        if !unexpected.is_empty() {
            warn!("dwmac::handle_interrupt(): unexpected status {:?}", unexpected);
        }
    }

    fn schedule(&self, work: DeferredWork, scheduled: &AtomicBool) {
        if scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.work.push(work).is_err() {
            // Queue full can only mean the worker is wedged; the flag is
            // dropped so a later interrupt retries.
            scheduled.store(false, Ordering::Release);
            error!("dwmac::schedule(): deferred work queue is full, dropping {:?}", work);
        }
    }

    /// Executes one pending work item, if any. The platform's worker
    /// context calls this until it returns `false`.
    pub fn service(&self) -> bool {
        let work = match self.work.pop() {
            Some(work) => work,
            None => return false,
        };
        match work {
            DeferredWork::TxReclaim => {
                // Clear before running so a completion that lands mid-reclaim
                // schedules a fresh pass.
                self.tx_scheduled.store(false, Ordering::Release);
                self.tx.reclaim();
            }
            DeferredWork::RxPoll => {
                let budget = self.config.rx_poll_budget;
                let processed = self.poll(budget);
                if processed < budget {
                    // Drained: leave polling mode and listen again.
                    self.rx_scheduled.store(false, Ordering::Release);
                    self.dma.enable_rx_interrupt();
                } else if self.work.push(DeferredWork::RxPoll).is_err() {
                    self.rx_scheduled.store(false, Ordering::Release);
                    self.dma.enable_rx_interrupt();
                }
            }
        }
        true
    }

    /// Periodic timer hook driving the transmit stall watchdog.
    pub fn watchdog(&self, now_ms: u64) {
        self.recovery.watchdog(&self.tx, now_ms);
    }

    /// Link-state notification from the transceiver layer. Gates frame
    /// submission and polling; ring state is unaffected.
    pub fn link_changed(&self, up: bool) {
        debug!("dwmac::link_changed(): link {}", if up { "up" } else { "down" });
        self.link_up.store(up, Ordering::Relaxed);
    }

    pub fn stats(&self) -> &DwmacStats {
        &self.stats
    }

    /// The current adaptive DMA threshold.
    pub fn dma_threshold(&self) -> u32 {
        self.recovery.threshold()
    }

    /// Tears the engine down: stops the queue, quiesces and drains the
    /// transmit ring (releasing every outstanding buffer), stops the
    /// receive channel, and discards pending deferred work. Ring and
    /// buffer memory is released when the engine is dropped.
    pub fn close(self) {
        debug!("dwmac::close(): shutting down");
        self.link_up.store(false, Ordering::Relaxed);
        self.tx.shutdown();
        self.dma.disable_rx_interrupt();
        self.dma.stop_rx();
        while self.work.pop().is_some() {}
    }
}
