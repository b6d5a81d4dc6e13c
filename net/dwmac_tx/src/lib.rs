//! The transmit side of the DWMAC packet engine.
//!
//! [`TxEngine`] moves outbound frames into the shared descriptor ring and
//! takes completed slots back out of it:
//!
//! * `enqueue()` maps each piece of a frame onto one descriptor, prepared
//!   tail-to-head: every trailing fragment is handed to the controller as it
//!   is prepared, and the head descriptor is handed over *last*, behind a
//!   release fence. The controller matches on the head's OWN bit, so granting
//!   it first would let the DMA engine chase an incomplete chain.
//! * `reclaim()` walks the completed slots up to the first one the controller
//!   still owns, decodes per-frame status at last-fragment boundaries, and
//!   releases the bound buffers.
//!
//! Backpressure: when an enqueue leaves fewer free slots than one maximal
//! frame needs, the engine stops the queue and reports `Busy` until a later
//! reclaim frees strictly more than that reserve. The asymmetric thresholds
//! keep the queue from flapping when the ring hovers at the boundary.
//!
//! Interrupt coalescing: only every Nth frame keeps its completion-interrupt
//! request. A frame that stops the queue always keeps it, so the wake-up
//! completion is never deferred.
//!
//! [`recovery::RecoveryController`] drives the stop-drain-reinit path for
//! hardware faults and stalls.

#![no_std]

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{fence, AtomicBool, AtomicU8, Ordering};

use log::{debug, error};
use spin::Mutex;

use dma_buffers::{TransmitBuffer, TransmitFrame};
use dma_ring::DescriptorRing;
use dwmac_hal::{DescriptorOps, DmaOperations, DwmacStats, FrameSink};

pub mod recovery;


/// The result of submitting a frame.
pub enum EnqueueOutcome {
    /// The frame occupies ring slots and will be transmitted.
    Accepted,
    /// The queue is stopped or the ring has no room; the frame is handed
    /// back and the caller retries after the next resume signal.
    Busy(TransmitFrame),
}

/// Transmit-path state, driven by the recovery controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TxState {
    Running = 0,
    Stopped = 1,
    Resetting = 2,
}

/// Transmit-side tunables, fixed at open.
#[derive(Clone, Copy, Debug)]
pub struct TxConfig {
    /// Largest number of extra fragments a single frame may carry.
    /// The backpressure reserve is this plus one.
    pub max_frags: usize,
    /// A completion interrupt is requested on every `coalesce`th frame.
    /// 1 disables coalescing.
    pub coalesce: u32,
    /// Ask the core to insert checksums on transmit (ignored by cores
    /// without an offload engine).
    pub csum_insertion: bool,
}

struct TxInner {
    ring: DescriptorRing,
    /// The buffer mapped at each slot, released as the slot is reclaimed.
    bound: Vec<Option<TransmitBuffer>>,
    /// Frames since the last one that kept its interrupt request.
    coalesce_count: u32,
}

pub struct TxEngine {
    inner: Mutex<TxInner>,
    ops: Arc<dyn DescriptorOps>,
    dma: Arc<dyn DmaOperations>,
    sink: Arc<dyn FrameSink>,
    stats: Arc<DwmacStats>,
    state: AtomicU8,
    /// Queue stopped for backpressure; enqueue reports Busy while set.
    stopped: AtomicBool,
    /// Set after a stall: every frame requests a completion interrupt.
    coalesce_off: AtomicBool,
    coalesce: u32,
    reserve: usize,
    csum_insertion: bool,
}

impl TxEngine {
    /// Wraps a descriptor ring as the transmit ring: every descriptor is
    /// initialized to the empty software-owned state and the array is handed
    /// to the controller.
    pub fn new(
        ring: DescriptorRing,
        config: TxConfig,
        ops: Arc<dyn DescriptorOps>,
        dma: Arc<dyn DmaOperations>,
        sink: Arc<dyn FrameSink>,
        stats: Arc<DwmacStats>,
    ) -> TxEngine {
        for desc in ring.iter() {
            ops.init_tx_desc(desc);
        }
        dma.attach_tx_ring(ring.handle());

        let mut bound = Vec::with_capacity(ring.len());
        bound.resize_with(ring.len(), || None);

        TxEngine {
            inner: Mutex::new(TxInner { ring, bound, coalesce_count: 0 }),
            ops,
            dma,
            sink,
            stats,
            state: AtomicU8::new(TxState::Running as u8),
            stopped: AtomicBool::new(false),
            coalesce_off: AtomicBool::new(false),
            coalesce: config.coalesce.max(1),
            reserve: config.max_frags + 1,
            csum_insertion: config.csum_insertion,
        }
    }

    pub fn state(&self) -> TxState {
        match self.state.load(Ordering::Acquire) {
            0 => TxState::Running,
            1 => TxState::Stopped,
            _ => TxState::Resetting,
        }
    }

    fn set_state(&self, state: TxState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Whether the queue is currently stopped for backpressure.
    pub fn is_queue_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    fn stop_queue(&self) {
        if !self.stopped.swap(true, Ordering::Relaxed) {
            self.sink.transmit_stopped();
        }
    }

    fn wake_queue(&self) {
        if self.stopped.swap(false, Ordering::Relaxed) {
            self.sink.transmit_resumed();
        }
    }

    /// Stops requesting coalesced interrupts; every subsequent frame asks
    /// for its own completion interrupt. Not reversible for the engine's
    /// lifetime (set after a stall, where deferred completions are suspect).
    pub fn disable_coalescing(&self) {
        self.coalesce_off.store(true, Ordering::Relaxed);
    }

    pub fn available(&self) -> usize {
        self.inner.lock().ring.available()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().ring.in_flight()
    }

    /// The (produced, consumed) cursor pair, for introspection and the
    /// stall watchdog.
    pub fn cursors(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.ring.produced(), inner.ring.consumed())
    }

    /// Submits one frame. On success, `produced` advances by exactly the
    /// frame's fragment count plus one; on `Busy`, the ring is untouched.
    pub fn enqueue(&self, frame: TransmitFrame) -> EnqueueOutcome {
        if self.state() != TxState::Running || self.is_queue_stopped() {
            return EnqueueOutcome::Busy(frame);
        }
        if frame.num_fragments() > self.reserve - 1 {
            error!(
                "dwmac_tx::enqueue(): frame with {} fragments exceeds the configured maximum of {}",
                frame.num_fragments(),
                self.reserve - 1
            );
            return EnqueueOutcome::Busy(frame);
        }

        let needed = frame.num_fragments() + 1;
        let mut inner = self.inner.lock();
        let inner = &mut *inner;

        if inner.ring.available() < needed {
            // The stop signal should have prevented this.
            error!("dwmac_tx::enqueue(): BUG: tx ring full while the queue was awake");
            self.stop_queue();
            return EnqueueOutcome::Busy(frame);
        }

        let avail_after = inner.ring.available() - needed;
        let will_stop = avail_after < self.reserve;
        // A frame that stops the queue always keeps its interrupt request;
        // the completion that reopens the queue must not be deferred.
        let want_irq = will_stop || self.coalesce_off.load(Ordering::Relaxed) || {
            inner.coalesce_count += 1;
            if inner.coalesce_count >= self.coalesce {
                inner.coalesce_count = 0;
                true
            } else {
                false
            }
        };

        let total_len = frame.total_len();
        let num_frags = frame.num_fragments();
        let (head, frags) = frame.into_buffers();

        // Head slot: prepared now, granted to the controller last.
        let head_cursor = inner.ring.produced();
        {
            let desc = inner.ring.desc_at(head_cursor);
            self.ops.prepare_tx_desc(
                desc,
                head.dma_addr(),
                head.length() as u32,
                true,
                self.csum_insertion,
            );
            if num_frags == 0 {
                self.ops.close_tx_desc(desc);
                if !want_irq {
                    self.ops.clear_tx_ic(desc);
                }
            }
        }
        inner.bound[inner.ring.slot_index(head_cursor)] = Some(head);
        inner.ring.advance_produced();

        // Trailing fragments are granted as they are prepared; the last one
        // is closed (last-fragment flag, interrupt request) before its grant.
        for (i, frag) in frags.into_iter().enumerate() {
            let cursor = inner.ring.produced();
            let slot = inner.ring.slot_index(cursor);
            {
                let desc = inner.ring.desc_at(cursor);
                self.ops.prepare_tx_desc(
                    desc,
                    frag.dma_addr(),
                    frag.length() as u32,
                    false,
                    self.csum_insertion,
                );
                if i + 1 == num_frags {
                    self.ops.close_tx_desc(desc);
                    if !want_irq {
                        self.ops.clear_tx_ic(desc);
                    }
                }
                self.ops.set_tx_owner(desc);
            }
            inner.bound[slot] = Some(frag);
            inner.ring.advance_produced();
        }

        // Every trailing descriptor must be visibly hardware-owned before
        // the head is; the OWN grant is a release store, and this fence makes
        // the whole-chain ordering explicit rather than inherited from any
        // particular bus model.
        fence(Ordering::Release);
        self.ops.set_tx_owner(inner.ring.desc_at(head_cursor));

        if will_stop {
            debug!("dwmac_tx::enqueue(): ring nearly full, stopping the queue");
            self.stop_queue();
        }

        self.stats.tx_bytes.add(total_len as u64);
        self.dma.transmit_poll_demand();
        EnqueueOutcome::Accepted
    }

    /// Takes back every completed slot up to the first one the controller
    /// still owns, releasing buffers and counting per-frame status, then
    /// wakes the queue if enough room opened up.
    pub fn reclaim(&self) {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        self.stats.tx_reclaim_runs.inc();

        while !inner.ring.is_empty() {
            let cursor = inner.ring.consumed();
            {
                let desc = inner.ring.desc_at(cursor);
                // Acquire read of OWN; until it reads back software-owned,
                // the rest of the slot must not be inspected.
                if self.ops.get_tx_owner(desc) {
                    break;
                }
                if self.ops.get_tx_ls(desc) {
                    match self.ops.tx_status(desc) {
                        Ok(()) => self.stats.tx_frames.inc(),
                        Err(fault) => {
                            debug!("dwmac_tx::reclaim(): transmit fault: {:?}", fault);
                            self.stats.tx_errors.inc();
                        }
                    }
                }
                self.ops.release_tx_desc(desc);
            }
            inner.bound[inner.ring.slot_index(cursor)] = None;
            inner.ring.advance_consumed();
        }

        if self.is_queue_stopped() && inner.ring.available() > self.reserve {
            self.wake_queue();
        }
    }

    /// The stop-drain-reinit sequence: quiesce the transmit DMA, release
    /// every outstanding buffer, return all descriptors to the empty
    /// software-owned state, rewind the cursors, and restart.
    pub fn reset(&self) {
        self.set_state(TxState::Stopped);
        self.dma.stop_tx();

        let mut inner = self.inner.lock();
        self.set_state(TxState::Resetting);
        self.drain(&mut inner);
        self.dma.start_tx();
        self.set_state(TxState::Running);
        drop(inner);

        self.stopped.store(false, Ordering::Relaxed);
        self.sink.transmit_resumed();
        self.stats.tx_resets.inc();
    }

    /// Quiesce for teardown: like [`reset`](Self::reset) but the transmit
    /// path stays stopped and no resume is signalled.
    pub fn shutdown(&self) {
        self.set_state(TxState::Stopped);
        self.stopped.store(true, Ordering::Relaxed);
        self.dma.stop_tx();

        let mut inner = self.inner.lock();
        self.drain(&mut inner);
    }

    fn drain(&self, inner: &mut TxInner) {
        for slot in inner.bound.iter_mut() {
            *slot = None;
        }
        for desc in inner.ring.iter() {
            self.ops.init_tx_desc(desc);
        }
        inner.ring.reset();
        inner.coalesce_count = 0;
    }
}
