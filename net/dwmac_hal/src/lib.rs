//! Hardware abstraction boundary for the DWMAC packet engine.
//!
//! This crate defines the three interfaces the transmit/receive engines are
//! written against, so the engines never branch on which silicon variant is
//! underneath them:
//!
//! * [`DescriptorOps`] — per-variant encode/decode of ring descriptors,
//!   implemented by [`Mac100Ops`] and [`GmacOps`] and selected once when the
//!   engine is opened.
//! * [`DmaOperations`] — the DMA register block: start/stop of the two
//!   channels, interrupt mask and status, poll demand, and the
//!   store-and-forward threshold. A platform (or a test mock) implements it.
//! * [`FrameSink`] — the upward interface: received-frame delivery and the
//!   transmit stop/resume backpressure signals.

#![no_std]

extern crate alloc;

use alloc::sync::Arc;
use bitflags::bitflags;
use dma_buffers::ReceiveBuffer;

pub mod descriptors;
mod gmac;
mod mac100;
pub mod stats;

pub use descriptors::DmaDescriptor;
pub use gmac::GmacOps;
pub use mac100::Mac100Ops;
pub use stats::{Counter, DwmacStats};

#[cfg(test)]
mod test;

/// A descriptor array shared between the engine and the device side.
pub type SharedDescs = Arc<[DmaDescriptor]>;

/// The silicon variants this engine supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MacVariant {
    /// 10/100 core: normal descriptors, no checksum offload.
    Mac100,
    /// Gigabit core: enhanced descriptors, receive checksum offload.
    Gmac,
}

impl MacVariant {
    /// Returns the descriptor codec for this variant. Called once at open;
    /// everything downstream holds only the returned interface.
    pub fn descriptor_ops(&self) -> Arc<dyn DescriptorOps> {
        match self {
            MacVariant::Mac100 => Arc::new(Mac100Ops),
            MacVariant::Gmac => Arc::new(GmacOps),
        }
    }
}

/// Checksum verdict reported alongside a delivered frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// The core verified the checksum; upper layers may skip it.
    Unnecessary,
    /// No checksum was verified in hardware.
    None,
}

/// Why a received frame was dropped instead of delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardReason {
    Crc,
    Runt,
    Oversize,
    Framing,
    Collision,
}

/// A per-packet transmit fault, decoded from the last-fragment slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxFault {
    Underflow,
    NoCarrier,
    LateCollision,
    ExcessiveCollisions,
    /// The error summary bit was set without a recognized detail bit.
    Unknown,
}

bitflags! {
    /// Causes read from the DMA interrupt status register.
    pub struct InterruptStatus: u32 {
        const TX_COMPLETE        = 1 << 0;
        const TX_STOPPED         = 1 << 1;
        const TX_JABBER          = 1 << 3;
        const RX_OVERFLOW        = 1 << 4;
        const TX_UNDERFLOW       = 1 << 5;
        const RX_COMPLETE        = 1 << 6;
        const RX_BUF_UNAVAILABLE = 1 << 7;
        const RX_STOPPED         = 1 << 8;
        const RX_WATCHDOG        = 1 << 9;
        const TX_EARLY           = 1 << 10;
        const FATAL_BUS_ERROR    = 1 << 13;
        const ABNORMAL_SUMMARY   = 1 << 15;
        const NORMAL_SUMMARY     = 1 << 16;
        /// Optional hardware blocks (line interface, MMC, PMT). These are
        /// kept masked; seeing one is unexpected.
        const GMAC_LINE          = 1 << 26;
        const GMAC_MMC           = 1 << 27;
        const GMAC_PMT           = 1 << 28;
    }
}

/// Variant-specific encode/decode of ring descriptors.
///
/// Implementations are stateless codecs over [`DmaDescriptor`] words; every
/// ownership grant they perform uses Release ordering and every ownership
/// read uses Acquire ordering (see [`descriptors`]).
pub trait DescriptorOps: Send + Sync {
    /// Reinitializes a transmit descriptor to the empty, software-owned state.
    fn init_tx_desc(&self, desc: &DmaDescriptor);

    /// Fills in a transmit descriptor for one fragment of a packet.
    /// `first` marks the head fragment; `csum_insertion` asks the core to
    /// insert the checksum on transmit (ignored by cores without offload).
    /// A `len` larger than [`max_buffer_len`](Self::max_buffer_len) spills
    /// into the descriptor's second buffer pair.
    fn prepare_tx_desc(&self, desc: &DmaDescriptor, addr: u64, len: u32, first: bool, csum_insertion: bool);

    /// Marks this descriptor as the last fragment of its packet and requests
    /// a completion interrupt for it.
    fn close_tx_desc(&self, desc: &DmaDescriptor);

    /// Clears the interrupt-request flag, for units suppressed by coalescing.
    fn clear_tx_ic(&self, desc: &DmaDescriptor);

    fn set_tx_owner(&self, desc: &DmaDescriptor);
    fn get_tx_owner(&self, desc: &DmaDescriptor) -> bool;

    /// Whether this descriptor holds the last fragment of its packet.
    fn get_tx_ls(&self, desc: &DmaDescriptor) -> bool;

    /// Clears a reclaimed descriptor's bindings; it stays software-owned.
    fn release_tx_desc(&self, desc: &DmaDescriptor);

    /// Decodes the per-packet completion status from a last-fragment slot.
    fn tx_status(&self, desc: &DmaDescriptor) -> Result<(), TxFault>;

    /// Fills in a receive descriptor with an empty buffer of `len` bytes.
    /// Does not hand the slot over; callers follow with
    /// [`set_rx_owner`](Self::set_rx_owner).
    fn prepare_rx_desc(&self, desc: &DmaDescriptor, addr: u64, len: u32);

    fn set_rx_owner(&self, desc: &DmaDescriptor);
    fn get_rx_owner(&self, desc: &DmaDescriptor) -> bool;

    /// Decodes a completed receive slot: delivered with a checksum verdict,
    /// or discarded for a reason.
    fn rx_status(&self, desc: &DmaDescriptor) -> Result<ChecksumStatus, DiscardReason>;

    /// Received frame length as reported by the controller, FCS included.
    fn get_rx_frame_len(&self, desc: &DmaDescriptor) -> u32;

    /// Largest buffer piece a single address/length pair can describe.
    /// One descriptor can carry up to twice this via its second pair.
    fn max_buffer_len(&self) -> u32;
}

/// The DMA register block of the controller, one implementation per platform.
///
/// `clear_interrupt` must write back exactly the bits passed to it: causes
/// raised after the corresponding `interrupt_status` read have to survive
/// the acknowledgement.
pub trait DmaOperations: Send + Sync {
    /// Hands the transmit descriptor array to the controller; the stand-in
    /// for programming the ring base address register.
    fn attach_tx_ring(&self, _ring: SharedDescs) {}
    /// Hands the receive descriptor array to the controller.
    fn attach_rx_ring(&self, _ring: SharedDescs) {}

    fn start_tx(&self);
    fn stop_tx(&self);
    fn start_rx(&self);
    fn stop_rx(&self);

    /// Kicks the transmit DMA to re-check the ring for new descriptors.
    fn transmit_poll_demand(&self);

    /// Programs the store-and-forward trigger level.
    fn set_dma_threshold(&self, threshold: u32);

    fn interrupt_status(&self) -> InterruptStatus;
    fn clear_interrupt(&self, bits: InterruptStatus);

    fn enable_rx_interrupt(&self);
    fn disable_rx_interrupt(&self);
}

/// Callbacks from the engine toward the layer that submits and consumes
/// frames.
pub trait FrameSink: Send + Sync {
    /// Delivers one received frame. `len` excludes the FCS.
    fn frame_received(&self, frame: ReceiveBuffer, len: u16, checksum: ChecksumStatus);

    /// The ring is nearly full; stop submitting until resumed.
    fn transmit_stopped(&self) {}

    /// Capacity is available again; submission may continue.
    fn transmit_resumed(&self) {}
}
