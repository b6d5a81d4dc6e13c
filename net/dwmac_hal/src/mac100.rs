//! Descriptor codec for the 10/100 core ("normal" descriptors).
//!
//! The control word carries both buffer sizes and all of the software flags
//! (first/last fragment, interrupt request); the status word is purely the
//! controller's write-back. There is no checksum engine, so
//! `csum_insertion` is ignored and received frames always report
//! [`ChecksumStatus::None`].

use bit_field::BitField;

use crate::descriptors::*;
use crate::{ChecksumStatus, DescriptorOps, DiscardReason, TxFault};

/* Control word layout. */
const BUF1_SIZE: core::ops::Range<usize> = 0..11;
const BUF2_SIZE: core::ops::Range<usize> = 11..22;
const FIRST_FRAGMENT: usize = 29;
const LAST_FRAGMENT: usize = 30;
const INTERRUPT_ON_COMPLETION: usize = 31;

/// Largest piece one address/length pair can describe: 11 size bits.
const MAX_BUF_LEN: u32 = (1 << 11) - 1;

pub struct Mac100Ops;

impl Mac100Ops {
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

impl DescriptorOps for Mac100Ops {
    fn init_tx_desc(&self, desc: &DmaDescriptor) {
        desc.write_control(0);
        desc.write_buf1(0);
        desc.write_buf2(0);
        desc.write_status(0);
    }

    fn prepare_tx_desc(&self, desc: &DmaDescriptor, addr: u64, len: u32, first: bool, _csum_insertion: bool) {
        let mut control = Self::pack_sizes(len);
        control.set_bit(FIRST_FRAGMENT, first);
        Self::write_buffers(desc, addr, len);
        desc.write_control(control);
        desc.write_status(0);
    }

    fn close_tx_desc(&self, desc: &DmaDescriptor) {
        let mut control = desc.control();
        control.set_bit(LAST_FRAGMENT, true);
        control.set_bit(INTERRUPT_ON_COMPLETION, true);
        desc.write_control(control);
    }

    fn clear_tx_ic(&self, desc: &DmaDescriptor) {
        let mut control = desc.control();
        control.set_bit(INTERRUPT_ON_COMPLETION, false);
        desc.write_control(control);
    }

    fn set_tx_owner(&self, desc: &DmaDescriptor) {
        desc.set_owner_hardware();
    }

    fn get_tx_owner(&self, desc: &DmaDescriptor) -> bool {
        desc.is_owner_hardware()
    }

    fn get_tx_ls(&self, desc: &DmaDescriptor) -> bool {
        desc.control().get_bit(LAST_FRAGMENT)
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
        } else if status & TDES_NO_CARRIER != 0 {
            Err(TxFault::NoCarrier)
        } else if status & TDES_LATE_COLLISION != 0 {
            Err(TxFault::LateCollision)
        } else if status & TDES_EXCESSIVE_COLLISIONS != 0 {
            Err(TxFault::ExcessiveCollisions)
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
            // No checksum engine on this core.
            return Ok(ChecksumStatus::None);
        }
        if status & RDES_CRC_ERROR != 0 {
            Err(DiscardReason::Crc)
        } else if status & RDES_RUNT != 0 {
            Err(DiscardReason::Runt)
        } else if status & RDES_TOO_LONG != 0 {
            Err(DiscardReason::Oversize)
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
