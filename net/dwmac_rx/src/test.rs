//! Tests for budget-bounded polling, discard accounting, and refill
//! liveness under pool exhaustion.

extern crate std;

use std::{sync::Arc, vec::Vec};

use spin::Mutex;

use dma_buffers::{BufferPool, ReceiveBuffer};
use dma_ring::DescriptorRing;
use dwmac_hal::descriptors::{DES_ERR_SUMMARY, RDES_CRC_ERROR, RDES_CSUM_VERIFIED, RDES_FIRST, RDES_LAST};
use dwmac_hal::{ChecksumStatus, DmaOperations, DwmacStats, FrameSink, InterruptStatus, MacVariant, SharedDescs};

use super::*;

#[derive(Default)]
struct MockDma {
    rx_ring: Mutex<Option<SharedDescs>>,
}

impl MockDma {
    fn descs(&self) -> SharedDescs {
        self.rx_ring.lock().clone().expect("rx ring not attached")
    }

    /// Simulates the controller finishing a reception into a slot:
    /// status written back, OWN cleared. `frame_len` includes the FCS.
    fn receive(&self, slot: usize, frame_len: u32) {
        self.descs()[slot].write_status(RDES_LAST | RDES_FIRST | (frame_len << 16));
    }

    fn receive_bad(&self, slot: usize) {
        self.descs()[slot].write_status(DES_ERR_SUMMARY | RDES_CRC_ERROR | RDES_LAST | RDES_FIRST);
    }
}

impl DmaOperations for MockDma {
    fn attach_rx_ring(&self, ring: SharedDescs) {
        *self.rx_ring.lock() = Some(ring);
    }
    fn start_tx(&self) {}
    fn stop_tx(&self) {}
    fn start_rx(&self) {}
    fn stop_rx(&self) {}
    fn transmit_poll_demand(&self) {}
    fn set_dma_threshold(&self, _threshold: u32) {}
    fn interrupt_status(&self) -> InterruptStatus {
        InterruptStatus::empty()
    }
    fn clear_interrupt(&self, _bits: InterruptStatus) {}
    fn enable_rx_interrupt(&self) {}
    fn disable_rx_interrupt(&self) {}
}

/// Holds delivered frames, keeping their buffers away from the pool until
/// the test releases them.
#[derive(Default)]
struct CapturingSink {
    frames: Mutex<Vec<(ReceiveBuffer, u16, ChecksumStatus)>>,
}

impl FrameSink for CapturingSink {
    fn frame_received(&self, frame: ReceiveBuffer, len: u16, checksum: ChecksumStatus) {
        self.frames.lock().push((frame, len, checksum));
    }
}

fn engine(
    n: usize,
    pool_capacity: usize,
    variant: MacVariant,
) -> (RxEngine, Arc<MockDma>, Arc<CapturingSink>, Arc<DwmacStats>) {
    let dma = Arc::new(MockDma::default());
    let sink = Arc::new(CapturingSink::default());
    let stats = Arc::new(DwmacStats::default());
    let pool = BufferPool::new(pool_capacity, 1536, false).unwrap();
    let rx = RxEngine::new(
        DescriptorRing::new(n).unwrap(),
        pool,
        variant.descriptor_ops(),
        dma.clone(),
        sink.clone(),
        stats.clone(),
    )
    .unwrap();
    (rx, dma, sink, stats)
}

#[test]
fn every_slot_starts_armed() {
    let (rx, _dma, _sink, _stats) = engine(8, 16, MacVariant::Mac100);
    assert_eq!(rx.armed(), 8);
    assert_eq!(rx.cursors(), (0, 0));
}

#[test]
fn new_fails_when_the_pool_cannot_cover_the_ring() {
    let dma = Arc::new(MockDma::default());
    let pool = BufferPool::new(4, 1536, false).unwrap();
    let result = RxEngine::new(
        DescriptorRing::new(8).unwrap(),
        pool,
        MacVariant::Mac100.descriptor_ops(),
        dma,
        Arc::new(CapturingSink::default()),
        Arc::new(DwmacStats::default()),
    );
    assert!(result.is_err());
}

#[test]
fn scenario_drained_below_budget_with_one_discard() {
    let (rx, dma, sink, stats) = engine(8, 16, MacVariant::Mac100);

    dma.receive(0, 68);
    dma.receive_bad(1);
    dma.receive(2, 132);

    let count = rx.poll(5);
    assert_eq!(count, 3, "discards count toward the budget");

    let frames = sink.frames.lock();
    assert_eq!(frames.len(), 2);
    // Delivered lengths omit the 4-byte FCS.
    assert_eq!(frames[0].1, 64);
    assert_eq!(frames[1].1, 128);
    assert_eq!(frames[0].2, ChecksumStatus::None);
    drop(frames);

    assert_eq!(stats.rx_frames.get(), 2);
    assert_eq!(stats.rx_bytes.get(), 64 + 128);
    assert_eq!(stats.rx_crc_errors.get(), 1);
    // Refill re-armed the whole window.
    assert_eq!(rx.cursors(), (3, 3));
    assert_eq!(rx.armed(), 8);
}

#[test]
fn budget_bounds_a_single_pass() {
    let (rx, dma, sink, _stats) = engine(8, 16, MacVariant::Mac100);
    for slot in 0..5 {
        dma.receive(slot, 68);
    }

    assert_eq!(rx.poll(3), 3);
    assert_eq!(rx.cursors(), (3, 3));
    assert_eq!(sink.frames.lock().len(), 3);

    // The remainder is picked up by the next pass.
    assert_eq!(rx.poll(3), 2);
    assert_eq!(rx.cursors(), (5, 5));
    assert_eq!(sink.frames.lock().len(), 5);
}

#[test]
fn discarded_frame_keeps_its_buffer() {
    // Pool sized exactly to the ring: a discard must re-arm without
    // touching the (now dry) pool.
    let (rx, dma, sink, stats) = engine(8, 8, MacVariant::Mac100);
    let addr_before = dma.descs()[0].buf1();

    dma.receive_bad(0);
    assert_eq!(rx.poll(5), 1);

    assert!(sink.frames.lock().is_empty());
    assert_eq!(stats.rx_crc_errors.get(), 1);
    assert_eq!(rx.armed(), 8, "the slot was re-armed");
    assert_eq!(dma.descs()[0].buf1(), addr_before, "same buffer, retried as-is");
}

#[test]
fn refill_starves_gracefully_and_recovers() {
    // Pool sized exactly to the ring; delivered buffers are held by the
    // sink, so refill starves until they are released.
    let (rx, dma, sink, stats) = engine(4, 4, MacVariant::Mac100);
    for slot in 0..4 {
        dma.receive(slot, 68);
    }

    // Scan keeps one slot spare, so only three are drained; the pool is
    // dry and nothing can be re-armed.
    assert_eq!(rx.poll(10), 3);
    assert_eq!(sink.frames.lock().len(), 3);
    assert_eq!(rx.armed(), 0);
    assert_eq!(rx.cursors(), (3, 0));

    // Nothing to scan, nothing to refill: bounded loss, no progress lost.
    assert_eq!(rx.poll(10), 0);
    assert_eq!(stats.rx_frames.get(), 3);

    // Releasing the delivered buffers recycles them; the next poll refills.
    sink.frames.lock().clear();
    assert_eq!(rx.poll(10), 0);
    assert_eq!(rx.armed(), 3);
    assert_eq!(rx.cursors(), (3, 3));

    // The fourth completed slot is now inside the scan window.
    assert_eq!(rx.poll(10), 1);
    assert_eq!(stats.rx_frames.get(), 4);
    sink.frames.lock().clear();
    assert_eq!(rx.poll(10), 0);
    assert_eq!(rx.armed(), 4, "every slot eventually returns to the controller");
    assert_eq!(rx.cursors(), (4, 4));
}

#[test]
fn gmac_reports_hardware_verified_checksums() {
    let (rx, dma, sink, _stats) = engine(2, 4, MacVariant::Gmac);
    dma.descs()[0].write_status(RDES_LAST | RDES_FIRST | RDES_CSUM_VERIFIED | (68 << 16));

    assert_eq!(rx.poll(1), 1);
    let frames = sink.frames.lock();
    assert_eq!(frames[0].2, ChecksumStatus::Unnecessary);
}
