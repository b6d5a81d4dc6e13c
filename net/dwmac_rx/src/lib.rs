//! The receive side of the DWMAC packet engine.
//!
//! All receive descriptors start out hardware-owned with a buffer bound; the
//! controller fills them in ring order and hands each back by clearing its
//! OWN bit. [`RxEngine::poll`] scans forward from the frontier, delivering
//! completed frames upward and counting discards, for at most `budget` slots
//! per call. The caller uses the returned count to decide whether to
//! re-enable the receive interrupt (ring drained) or schedule another pass
//! (budget exhausted with work remaining).
//!
//! After every scan a refill pass re-arms the vacated slots with fresh
//! buffers from the pool. A discarded frame keeps its buffer bound and is
//! simply re-armed; a dry pool leaves the slot unbound, to be retried on the
//! next poll — temporary capacity loss, never a failure.

#![no_std]

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, error, warn};
use spin::Mutex;

use dma_buffers::{BufferPool, ReceiveBuffer};
use dma_ring::DescriptorRing;
use dwmac_hal::{DescriptorOps, DmaOperations, DwmacStats, FrameSink};

#[cfg(test)]
mod test;

/// Length of the frame check sequence the controller appends; delivered
/// lengths exclude it.
const FCS_LEN: u32 = 4;

struct RxInner {
    ring: DescriptorRing,
    /// The buffer mapped at each slot; `None` while awaiting refill.
    bound: Vec<Option<ReceiveBuffer>>,
    pool: BufferPool,
}

pub struct RxEngine {
    inner: Mutex<RxInner>,
    ops: Arc<dyn DescriptorOps>,
    sink: Arc<dyn FrameSink>,
    stats: Arc<DwmacStats>,
}

impl RxEngine {
    /// Wraps a descriptor ring as the receive ring: every slot gets a buffer
    /// from the pool and is handed to the controller, then the array is
    /// attached to the device. Fails only if the pool cannot cover the ring.
    pub fn new(
        ring: DescriptorRing,
        pool: BufferPool,
        ops: Arc<dyn DescriptorOps>,
        dma: Arc<dyn DmaOperations>,
        sink: Arc<dyn FrameSink>,
        stats: Arc<DwmacStats>,
    ) -> Result<RxEngine, &'static str> {
        let mut bound = Vec::with_capacity(ring.len());
        for slot in 0..ring.len() {
            let buf = pool
                .take()
                .ok_or("dwmac_rx::new(): buffer pool cannot fill the receive ring")?;
            let desc = ring.desc_at(slot as u64);
            ops.prepare_rx_desc(desc, buf.dma_addr(), buf.capacity() as u32);
            ops.set_rx_owner(desc);
            bound.push(Some(buf));
        }
        dma.attach_rx_ring(ring.handle());

        Ok(RxEngine {
            inner: Mutex::new(RxInner { ring, bound, pool }),
            ops,
            sink,
            stats,
        })
    }

    /// Scans at most `budget` completed slots, delivering good frames and
    /// counting discards, then refills the vacated window. Returns the
    /// number of slots processed, discards included; a count below `budget`
    /// means the ring was drained.
    pub fn poll(&self, budget: usize) -> usize {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        self.stats.rx_poll_runs.inc();

        let mut count = 0;
        while count < budget {
            // One slot always stays unused, even when refill is starved.
            if inner.ring.in_flight() >= inner.ring.len() - 1 {
                break;
            }
            let cursor = inner.ring.produced();
            let slot = inner.ring.slot_index(cursor);
            let status = {
                let desc = inner.ring.desc_at(cursor);
                // Acquire read of OWN: the frontier. Status and length are
                // only valid once the slot reads back software-owned.
                if self.ops.get_rx_owner(desc) {
                    break;
                }
                self.ops.rx_status(desc)
            };
            count += 1;

            match status {
                Err(reason) => {
                    // Drop the frame but keep the buffer; refill re-arms the
                    // slot as-is.
                    debug!("dwmac_rx::poll(): discarding frame: {:?}", reason);
                    self.stats.record_discard(reason);
                }
                Ok(checksum) => {
                    let frame_len = {
                        let desc = inner.ring.desc_at(cursor);
                        self.ops.get_rx_frame_len(desc).saturating_sub(FCS_LEN)
                    };
                    match inner.bound[slot].take() {
                        Some(mut buf) => {
                            buf.set_length(frame_len as u16);
                            self.stats.rx_frames.inc();
                            self.stats.rx_bytes.add(frame_len as u64);
                            self.sink.frame_received(buf, frame_len as u16, checksum);
                        }
                        None => {
                            error!("dwmac_rx::poll(): inconsistent receive descriptor chain");
                            self.stats.rx_dropped.inc();
                            inner.ring.advance_produced();
                            break;
                        }
                    }
                }
            }
            inner.ring.advance_produced();
        }

        self.refill(inner);
        count
    }

    /// Re-arms every drained slot up to the scan frontier, binding a fresh
    /// buffer where the old one was delivered upward. Stops at the first
    /// slot the pool cannot cover; that slot is retried on the next poll.
    fn refill(&self, inner: &mut RxInner) {
        while inner.ring.consumed() < inner.ring.produced() {
            let cursor = inner.ring.consumed();
            let slot = inner.ring.slot_index(cursor);
            if inner.bound[slot].is_none() {
                let Some(buf) = inner.pool.take() else {
                    warn!("dwmac_rx::refill(): buffer pool dry, slot left unarmed");
                    break;
                };
                let desc = inner.ring.desc_at(cursor);
                self.ops.prepare_rx_desc(desc, buf.dma_addr(), buf.capacity() as u32);
                inner.bound[slot] = Some(buf);
            }
            self.ops.set_rx_owner(inner.ring.desc_at(cursor));
            inner.ring.advance_consumed();
        }
    }

    /// Slots currently owned by the controller and armed for reception.
    pub fn armed(&self) -> usize {
        let inner = self.inner.lock();
        inner.ring.iter().filter(|d| self.ops.get_rx_owner(d)).count()
    }

    /// The (produced, consumed) cursor pair, for introspection.
    pub fn cursors(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.ring.produced(), inner.ring.consumed())
    }
}
