//! Defines buffers that are used to send and receive packets through a
//! DMA-capable network controller, and the pool that recycles receive
//! buffers once a higher layer is done with them.
//!
//! A `ReceiveBuffer` automatically returns its memory to the pool it came
//! from when dropped, so the refill path can keep reusing a fixed set of
//! allocations instead of hitting the heap for every received frame.

#![no_std]

extern crate alloc;

use alloc::{
    boxed::Box,
    sync::{Arc, Weak},
    vec,
    vec::Vec,
};
use core::mem;
use core::ops::{Deref, DerefMut};
use log::error;

/// A buffer holding one physically-contiguous piece of an outbound packet.
pub struct TransmitBuffer {
    data: Box<[u8]>,
    length: u16,
}

impl TransmitBuffer {
    /// Creates a new zero-filled `TransmitBuffer` with the given size in bytes.
    /// The size is a `u16` because that is the maximum size of a single
    /// transmit buffer piece.
    pub fn new(size_in_bytes: u16) -> TransmitBuffer {
        TransmitBuffer {
            data: vec![0; size_in_bytes as usize].into_boxed_slice(),
            length: size_in_bytes,
        }
    }

    /// Creates a `TransmitBuffer` holding a copy of the given frame bytes.
    pub fn from_slice(frame: &[u8]) -> TransmitBuffer {
        let mut buf = TransmitBuffer::new(frame.len() as u16);
        buf.data[..frame.len()].copy_from_slice(frame);
        buf
    }

    /// The address the DMA engine should read this buffer from.
    pub fn dma_addr(&self) -> u64 {
        self.data.as_ptr() as usize as u64
    }

    pub fn length(&self) -> u16 {
        self.length
    }
}

impl Deref for TransmitBuffer {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.data[..self.length as usize]
    }
}
impl DerefMut for TransmitBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data[..self.length as usize]
    }
}

/// One outbound packet: a head buffer plus zero or more extra fragments,
/// each fragment occupying its own descriptor slot when enqueued.
pub struct TransmitFrame {
    head: TransmitBuffer,
    fragments: Vec<TransmitBuffer>,
}

impl TransmitFrame {
    pub fn new(head: TransmitBuffer) -> TransmitFrame {
        TransmitFrame { head, fragments: Vec::new() }
    }

    /// Appends one extra fragment to this frame.
    pub fn push_fragment(&mut self, fragment: TransmitBuffer) {
        self.fragments.push(fragment);
    }

    /// The number of *extra* fragments beyond the head buffer.
    /// A frame occupies `num_fragments() + 1` descriptor slots.
    pub fn num_fragments(&self) -> usize {
        self.fragments.len()
    }

    /// Total payload length across the head buffer and all fragments.
    pub fn total_len(&self) -> usize {
        self.head.length as usize
            + self.fragments.iter().map(|f| f.length as usize).sum::<usize>()
    }

    /// Largest single piece of this frame, in bytes.
    pub fn max_piece_len(&self) -> usize {
        self.fragments
            .iter()
            .map(|f| f.length as usize)
            .fold(self.head.length as usize, usize::max)
    }

    pub fn into_buffers(self) -> (TransmitBuffer, Vec<TransmitBuffer>) {
        (self.head, self.fragments)
    }
}

/// A buffer that stores a packet received from the controller.
/// When dropped, its underlying memory is automatically returned to the
/// `BufferPool` it was taken from, if that pool still exists.
pub struct ReceiveBuffer {
    data: Box<[u8]>,
    length: u16,
    pool: Weak<mpmc::Queue<ReceiveBuffer>>,
}

impl ReceiveBuffer {
    fn with_capacity(capacity: u16, pool: Weak<mpmc::Queue<ReceiveBuffer>>) -> ReceiveBuffer {
        ReceiveBuffer {
            data: vec![0; capacity as usize].into_boxed_slice(),
            length: 0,
            pool,
        }
    }

    /// The address the DMA engine should write received bytes to.
    pub fn dma_addr(&self) -> u64 {
        self.data.as_ptr() as usize as u64
    }

    /// The full size of the underlying allocation.
    pub fn capacity(&self) -> u16 {
        self.data.len() as u16
    }

    /// The number of valid bytes, i.e. the received frame length.
    pub fn length(&self) -> u16 {
        self.length
    }

    /// Sets the valid length after the hardware has filled this buffer.
    pub fn set_length(&mut self, length: u16) {
        self.length = length.min(self.data.len() as u16);
    }
}

impl Deref for ReceiveBuffer {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.data[..self.length as usize]
    }
}
impl DerefMut for ReceiveBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data[..self.length as usize]
    }
}

impl Drop for ReceiveBuffer {
    fn drop(&mut self) {
        // Take ownership of the allocation so we can hand it back to the
        // pool as a fresh buffer; an empty box marks an already-recycled one.
        let data = mem::take(&mut self.data);
        if data.is_empty() {
            return;
        }
        if let Some(pool) = self.pool.upgrade() {
            let recycled = ReceiveBuffer { data, length: 0, pool: self.pool.clone() };
            if let Err(mut rejected) = pool.push(recycled) {
                // Pool is full; sever the pool link so the rejected buffer
                // frees normally instead of re-entering this path.
                rejected.pool = Weak::new();
                error!("dma_buffers: receive buffer pool is full, freeing buffer instead");
            }
        }
    }
}

/// A bounded pool of pre-allocated receive buffers.
pub struct BufferPool {
    queue: Arc<mpmc::Queue<ReceiveBuffer>>,
    buffer_len: u16,
    fallback_alloc: bool,
}

impl BufferPool {
    /// Creates a pool pre-filled with `capacity` buffers of `buffer_len` bytes.
    ///
    /// With `fallback_alloc` set, `take()` falls back to a fresh heap
    /// allocation when the pool runs dry; otherwise an empty pool yields
    /// `None`, which the refill path treats as a transient allocation failure.
    pub fn new(capacity: usize, buffer_len: u16, fallback_alloc: bool) -> Result<BufferPool, &'static str> {
        if buffer_len == 0 {
            return Err("BufferPool::new(): buffer_len must be non-zero");
        }
        let queue = Arc::new(mpmc::Queue::with_capacity(capacity.next_power_of_two()));
        for _ in 0..capacity {
            let buf = ReceiveBuffer::with_capacity(buffer_len, Arc::downgrade(&queue));
            if queue.push(buf).is_err() {
                return Err("BufferPool::new(): failed to pre-fill buffer pool");
            }
        }
        Ok(BufferPool { queue, buffer_len, fallback_alloc })
    }

    /// Takes one buffer out of the pool, or allocates a fresh one if the pool
    /// is dry and fallback allocation is enabled.
    pub fn take(&self) -> Option<ReceiveBuffer> {
        self.queue.pop().or_else(|| {
            if self.fallback_alloc {
                Some(ReceiveBuffer::with_capacity(self.buffer_len, Arc::downgrade(&self.queue)))
            } else {
                None
            }
        })
    }

    pub fn buffer_len(&self) -> u16 {
        self.buffer_len
    }
}

#[cfg(test)]
mod test;
