//! A fixed-size circular ring of DMA descriptors plus the cursor arithmetic
//! shared by the transmit and receive engines.
//!
//! The ring owns nothing about packets, only slots. Cursors are
//! monotonically increasing 64-bit counters; the physical slot is the cursor
//! modulo the ring size. One slot is always kept unused so that a full ring
//! and an empty ring are distinguishable:
//!
//! ```text
//! 0 <= produced - consumed <= N - 1
//! available = N - (produced - consumed) - 1
//! ```
//!
//! The descriptor array itself is shared with the device side (see
//! [`DescriptorRing::handle`]); the cursors are private to the engine that
//! owns the ring and are protected by that engine's lock.

#![no_std]

extern crate alloc;

use dwmac_hal::{DmaDescriptor, SharedDescs};

pub struct DescriptorRing {
    descs: SharedDescs,
    /// Count of slots handed to the consumer side; the next slot to fill.
    produced: u64,
    /// Count of slots taken back; the oldest slot still outstanding.
    consumed: u64,
}

impl DescriptorRing {
    /// Allocates a ring of `num_descs` descriptors.
    ///
    /// This is the only allocation the ring ever performs; every slot is
    /// reused for the ring's whole lifetime.
    pub fn new(num_descs: usize) -> Result<DescriptorRing, &'static str> {
        if num_descs < 2 {
            return Err("DescriptorRing::new(): a ring needs at least 2 descriptors");
        }
        let descs: SharedDescs = (0..num_descs).map(|_| DmaDescriptor::new()).collect();
        Ok(DescriptorRing { descs, produced: 0, consumed: 0 })
    }

    pub fn len(&self) -> usize {
        self.descs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.produced == self.consumed
    }

    /// A handle to the descriptor array, for the device side of the ring.
    pub fn handle(&self) -> SharedDescs {
        self.descs.clone()
    }

    /// Slots currently handed out and not yet taken back.
    pub fn in_flight(&self) -> usize {
        debug_assert!(self.produced >= self.consumed);
        (self.produced - self.consumed) as usize
    }

    /// Slots that can still be produced before the ring is full.
    pub fn available(&self) -> usize {
        self.len() - self.in_flight() - 1
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// The descriptor a cursor value refers to.
    pub fn desc_at(&self, cursor: u64) -> &DmaDescriptor {
        &self.descs[(cursor % self.len() as u64) as usize]
    }

    /// The slot the next produce will fill.
    pub fn produce_slot(&self) -> &DmaDescriptor {
        self.desc_at(self.produced)
    }

    /// The oldest outstanding slot.
    pub fn consume_slot(&self) -> &DmaDescriptor {
        self.desc_at(self.consumed)
    }

    /// Physical index of a cursor value, for per-slot bookkeeping arrays.
    pub fn slot_index(&self, cursor: u64) -> usize {
        (cursor % self.len() as u64) as usize
    }

    pub fn advance_produced(&mut self) {
        self.produced += 1;
        debug_assert!(self.in_flight() <= self.len() - 1);
    }

    pub fn advance_consumed(&mut self) {
        debug_assert!(self.consumed < self.produced);
        self.consumed += 1;
    }

    /// Rewinds both cursors to zero. Used by the stop-drain-reinit path;
    /// the caller is responsible for having reinitialized every descriptor.
    pub fn reset(&mut self) {
        self.produced = 0;
        self.consumed = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &DmaDescriptor> {
        self.descs.iter()
    }
}

#[cfg(test)]
mod test;
