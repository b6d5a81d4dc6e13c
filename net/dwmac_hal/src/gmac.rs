//! Descriptor codec for the gigabit core ("enhanced" descriptors).
//!
//! Unlike the 10/100 layout, the transmit software flags (first/last
//! fragment, interrupt request, checksum insertion) live in the *status*
//! word next to OWN; the control word carries only the two buffer sizes.
//! The controller preserves those high status bits on write-back, which is
//! why `set_tx_owner` ORs OWN in instead of rewriting the word.

use bit_field::BitField;

use crate::descriptors::*;
use crate::{ChecksumStatus, DescriptorOps, DiscardReason, TxFault};

/* Control word layout: sizes only. */
const BUF1_SIZE: core::ops::Range<usize> = 0..13;
const BUF2_SIZE: core::ops::Range<usize> = 16..29;

/* Software flags in the status word. */
const CSUM_INSERTION: core::ops::Range<usize> = 22..24;
const FIRST_FRAGMENT: usize = 28;
const LAST_FRAGMENT: usize = 29;
const INTERRUPT_ON_COMPLETION: usize = 30;

/// Full checksum insertion: header and payload.
const CSUM_FULL: u32 = 0b11;

/// Largest piece one address/length pair can describe: 13 size bits.
const MAX_BUF_LEN: u32 = (1 << 13) - 1;

pub struct GmacOps;

impl GmacOps {
    fn pack_sizes(len: u32) -> u32 {
        let mut control = 0u32;
        if len > MAX_BUF_LEN {
            control.set_bits(BUF1_SIZE, MAX_BUF_LEN);
            control.set_bits(BUF2_SIZE, len - MAX_BUF_LEN);
        } else {
            control.set_bits(BUF1_SIZE, len);
        }
        control
    }

    fn write_buffers(desc: &DmaDescriptor, addr: u64, len: u32) {
        desc.write_buf1(addr);
        if len > MAX_BUF_LEN {
            desc.write_buf2(addr + MAX_BUF_LEN as u64);
        } else {
            desc.write_buf2(0);
        }
    }
}

impl DescriptorOps for GmacOps {
    fn init_tx_desc(&self, desc: &DmaDescriptor) {
        desc.write_control(0);
        desc.write_buf1(0);
        desc.write_buf2(0);
        desc.write_status(0);
    }

    fn prepare_tx_desc(&self, desc: &DmaDescriptor, addr: u64, len: u32, first: bool, csum_insertion: bool) {
        Self::write_buffers(desc, addr, len);
        desc.write_control(Self::pack_sizes(len));

        let mut status = 0u32;
        status.set_bit(FIRST_FRAGMENT, first);
        if csum_insertion {
            status.set_bits(CSUM_INSERTION, CSUM_FULL);
        }
        desc.write_status(status);
    }

    fn close_tx_desc(&self, desc: &DmaDescriptor) {
        let mut status = desc.status();
        status.set_bit(LAST_FRAGMENT, true);
        status.set_bit(INTERRUPT_ON_COMPLETION, true);
        desc.write_status(status);
    }

    fn clear_tx_ic(&self, desc: &DmaDescriptor) {
        let mut status = desc.status();
        status.set_bit(INTERRUPT_ON_COMPLETION, false);
        desc.write_status(status);
    }

    fn set_tx_owner(&self, desc: &DmaDescriptor) {
        // Keep the fragment flags: OWN is ORed over the prepared word.
        desc.set_owner_hardware();
    }

    fn get_tx_owner(&self, desc: &DmaDescriptor) -> bool {
        desc.is_owner_hardware()
    }

    fn get_tx_ls(&self, desc: &DmaDescriptor) -> bool {
        desc.status().get_bit(LAST_FRAGMENT)
    }

    fn release_tx_desc(&self, desc: &DmaDescriptor) {
        self.init_tx_desc(desc);
    }

    fn tx_status(&self, desc: &DmaDescriptor) -> Result<(), TxFault> {
        let status = desc.status();
        if status & DES_ERR_SUMMARY == 0 {
            return Ok(());
        }
        if status & TDES_UNDERFLOW != 0 {
            Err(TxFault::Underflow)
        } else if status & TDES_LATE_COLLISION != 0 {
            Err(TxFault::LateCollision)
        } else if status & TDES_EXCESSIVE_COLLISIONS != 0 {
            Err(TxFault::ExcessiveCollisions)
        } else if status & TDES_NO_CARRIER != 0 {
            Err(TxFault::NoCarrier)
        } else {
            Err(TxFault::Unknown)
        }
    }

    fn prepare_rx_desc(&self, desc: &DmaDescriptor, addr: u64, len: u32) {
        Self::write_buffers(desc, addr, len);
        desc.write_control(Self::pack_sizes(len));
        desc.write_status(0);
    }

    fn set_rx_owner(&self, desc: &DmaDescriptor) {
        desc.write_status(DES_OWN);
    }

    fn get_rx_owner(&self, desc: &DmaDescriptor) -> bool {
        desc.is_owner_hardware()
    }

    fn rx_status(&self, desc: &DmaDescriptor) -> Result<ChecksumStatus, DiscardReason> {
        let status = desc.status();
        if status & DES_ERR_SUMMARY == 0 {
            return Ok(if status & RDES_CSUM_VERIFIED != 0 {
                ChecksumStatus::Unnecessary
            } else {
                ChecksumStatus::None
            });
        }
        if status & RDES_CRC_ERROR != 0 {
            Err(DiscardReason::Crc)
        } else if status & RDES_RUNT != 0 {
            Err(DiscardReason::Runt)
        } else if status & RDES_TOO_LONG != 0 {
            Err(DiscardReason::Oversize)
        } else if status & RDES_DRIBBLING != 0 {
            Err(DiscardReason::Framing)
        } else if status & RDES_COLLISION != 0 {
            Err(DiscardReason::Collision)
        } else {
            Err(DiscardReason::Framing)
        }
    }

    fn get_rx_frame_len(&self, desc: &DmaDescriptor) -> u32 {
        desc.status().get_bits(RDES_FRAME_LEN)
    }

    fn max_buffer_len(&self) -> u32 {
        MAX_BUF_LEN
    }
}
