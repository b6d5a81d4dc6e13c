//! The DMA descriptor shared between software and the controller.
//!
//! One descriptor describes one ring slot: up to two buffer-address/length
//! pairs, an ownership bit, fragment-boundary flags, an interrupt-request
//! flag, and (once the controller hands the slot back) a status word.
//!
//! Every word is an atomic because the descriptor array is shared with the
//! device side: the controller writes `status` while software owns the rest.
//! The OWN bit is the synchronization point of the handoff protocol, so it is
//! always read with Acquire ordering and granted with Release ordering; the
//! remaining words are only ever touched by the current owner and are ordered
//! by the OWN transition itself.

use core::ops::Range;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use static_assertions::const_assert_eq;

/// Ownership bit in the status word: set = the controller owns this slot.
pub const DES_OWN: u32 = 1 << 31;

/// Error summary bit, valid for both transmit and receive status words.
pub const DES_ERR_SUMMARY: u32 = 1 << 15;

/* Transmit status word bits, written back by the controller. */
pub const TDES_UNDERFLOW: u32 = 1 << 1;
pub const TDES_EXCESSIVE_COLLISIONS: u32 = 1 << 8;
pub const TDES_LATE_COLLISION: u32 = 1 << 9;
pub const TDES_NO_CARRIER: u32 = 1 << 10;

/* Receive status word bits, written back by the controller. */
pub const RDES_CRC_ERROR: u32 = 1 << 1;
pub const RDES_DRIBBLING: u32 = 1 << 2;
pub const RDES_COLLISION: u32 = 1 << 6;
/// Receive checksum verified by the core (GMAC only).
pub const RDES_CSUM_VERIFIED: u32 = 1 << 7;
pub const RDES_LAST: u32 = 1 << 8;
pub const RDES_FIRST: u32 = 1 << 9;
pub const RDES_RUNT: u32 = 1 << 11;
pub const RDES_TOO_LONG: u32 = 1 << 12;
/// Received frame length (including the 4-byte FCS).
pub const RDES_FRAME_LEN: Range<usize> = 16..30;

/// One slot of a descriptor ring.
#[repr(C)]
pub struct DmaDescriptor {
    /// OWN bit plus the status the controller writes back on completion.
    status: AtomicU32,
    /// Variant-encoded control: buffer sizes, fragment flags, interrupt request.
    control: AtomicU32,
    /// DMA address of the first buffer piece.
    buf1: AtomicU64,
    /// DMA address of the second buffer piece, for frames a single pair
    /// cannot address.
    buf2: AtomicU64,
}

const_assert_eq!(core::mem::size_of::<DmaDescriptor>(), 24);

impl DmaDescriptor {
    pub const fn new() -> DmaDescriptor {
        DmaDescriptor {
            status: AtomicU32::new(0),
            control: AtomicU32::new(0),
            buf1: AtomicU64::new(0),
            buf2: AtomicU64::new(0),
        }
    }

    /// Reads the status word. Acquire: a caller that observes the OWN bit
    /// cleared also observes every write the controller made to this slot.
    pub fn status(&self) -> u32 {
        self.status.load(Ordering::Acquire)
    }

    /// Overwrites the status word. Release: pairs with `status()` on the
    /// other side of the handoff. The device side uses this to complete a
    /// slot (clearing OWN), software uses it to reinitialize one it owns.
    pub fn write_status(&self, value: u32) {
        self.status.store(value, Ordering::Release);
    }

    /// Hands this slot to the controller by setting the OWN bit.
    /// Release: all prior writes to this slot become visible before the
    /// ownership change does.
    pub fn set_owner_hardware(&self) {
        self.status.fetch_or(DES_OWN, Ordering::Release);
    }

    pub fn is_owner_hardware(&self) -> bool {
        self.status.load(Ordering::Acquire) & DES_OWN != 0
    }

    pub fn control(&self) -> u32 {
        self.control.load(Ordering::Relaxed)
    }

    pub fn write_control(&self, value: u32) {
        self.control.store(value, Ordering::Relaxed);
    }

    pub fn buf1(&self) -> u64 {
        self.buf1.load(Ordering::Relaxed)
    }

    pub fn write_buf1(&self, addr: u64) {
        self.buf1.store(addr, Ordering::Relaxed);
    }

    pub fn buf2(&self) -> u64 {
        self.buf2.load(Ordering::Relaxed)
    }

    pub fn write_buf2(&self, addr: u64) {
        self.buf2.store(addr, Ordering::Relaxed);
    }
}

impl core::fmt::Debug for DmaDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "{{status: {:#010X}, control: {:#010X}, buf1: {:#X}, buf2: {:#X}}}",
            self.status(),
            self.control(),
            self.buf1(),
            self.buf2()
        )
    }
}
