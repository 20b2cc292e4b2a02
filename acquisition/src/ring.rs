//! DMA sample ring
//!
//! # Design
//!
//! The ring is a statically allocated array of raw 16-bit converter results shared between
//! exactly two parties: the DMA engine writes it circularly in hardware, the sample processing
//! task reads it. There is no lock. Ownership of a half is handed over by the DMA completion
//! events instead:
//!
//! * The half-transfer event hands the first half to the task.
//! * The transfer-complete event hands the second half to the task.
//!
//! Reading therefore requires a [ReadyHalf] token, which is only created from an observed
//! completion event. The task must be done with a half before the DMA engine wraps back into
//! it, i.e. within one half period.
//!
//! Each half holds `half_depth` interleaved sample sets of `channels` results each:
//!
//! ```text
//! | set 0: ch0 ch1 .. chN | set 1: ch0 .. | ... | set 2*half_depth-1 |
//! |<--------------- first half --------------->|<-- second half -->|
//! ```
use core::cell::UnsafeCell;
use core::sync::atomic::{fence, Ordering};

use crate::error::ConfigError;

/// The two halves of the ring.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Half {
    First,
    Second,
}

/// Permission to read one half of the ring.
///
/// Only created from a completion event.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct ReadyHalf(Half);

impl ReadyHalf {
    pub(crate) fn new(half: Half) -> Self {
        Self(half)
    }

    pub fn half(&self) -> Half {
        self.0
    }
}

/// Interleaving of sample sets in the ring.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RingLayout {
    pub channels: usize,
    pub half_depth: usize,
}

impl RingLayout {
    pub const fn new(channels: usize, half_depth: usize) -> Self {
        Self {
            channels,
            half_depth,
        }
    }

    /// Results per half.
    pub const fn half_len(&self) -> usize {
        self.channels * self.half_depth
    }

    /// Results in the whole ring.
    pub const fn len(&self) -> usize {
        2 * self.half_len()
    }

    /// Ring index of the result of sequence `position` in sample set `set`.
    pub const fn index(&self, set: usize, position: usize) -> usize {
        set * self.channels + position
    }
}

/// Where the DMA engine writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DmaTarget {
    pub address: *mut u16,
    /// Number of 16-bit words.
    pub len: usize,
}

/// The DMA destination buffer.
pub struct SampleRing<const LEN: usize> {
    buffer: UnsafeCell<[u16; LEN]>,
}

// Note(unsafe): The only writer is the DMA engine. Reads are gated by completion events, see the
// module documentation.
unsafe impl<const LEN: usize> Sync for SampleRing<LEN> {}

impl<const LEN: usize> Default for SampleRing<LEN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const LEN: usize> SampleRing<LEN> {
    pub const fn new() -> Self {
        Self {
            buffer: UnsafeCell::new([0; LEN]),
        }
    }

    pub const fn len(&self) -> usize {
        LEN
    }

    /// Verify that the ring matches `layout` exactly.
    pub fn check(&self, layout: &RingLayout) -> Result<(), ConfigError> {
        if layout.len() != LEN {
            return Err(ConfigError::BufferSize {
                expected: layout.len(),
                actual: LEN,
            });
        }
        Ok(())
    }

    /// The destination for a circular DMA transfer covering the whole ring.
    pub fn dma_target(&'static self) -> DmaTarget {
        DmaTarget {
            address: self.buffer.get().cast(),
            len: LEN,
        }
    }

    /// Borrow a half that the DMA engine has finished writing.
    pub fn read(&self, ready: ReadyHalf) -> &[u16] {
        let half_len = LEN / 2;
        let offset = match ready.half() {
            Half::First => 0,
            Half::Second => half_len,
        };
        // Order the reads after the completion event that handed the half over.
        fence(Ordering::Acquire);
        // Note(unsafe): The DMA engine is done with this half and will not write to it again
        // before the other half completed. The slice does not overlap the half being written.
        unsafe {
            core::slice::from_raw_parts(
                self.buffer.get().cast::<u16>().add(offset),
                half_len,
            )
        }
    }
}
