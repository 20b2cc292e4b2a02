//! Task notification flags
//!
//! The single synchronization primitive between the DMA interrupt and the sample processing task.
//! Posting merges bits into the pending word (`fetch_or`), waiting atomically takes and clears it
//! (`swap(0)`). Merging is monotonic, so no event posted before a wait returns can be lost, even
//! if several interrupts fire before the task runs. Several events of the same kind coalesce into
//! one bit.
use core::future::poll_fn;
use core::sync::atomic::{AtomicU32, Ordering};
use core::task::Poll;

use bitbybit::bitfield;
use futures::task::AtomicWaker;

#[bitfield(u32)]
#[derive(Debug, PartialEq, Eq)]
pub struct Events {
    /// The first half of the ring is ready.
    #[bit(0, rw)]
    pub half: bool,
    /// The second half of the ring is ready.
    #[bit(1, rw)]
    pub full: bool,
    /// The DMA engine reported a transfer error.
    #[bit(2, rw)]
    pub error: bool,
    /// Leave the processing loop.
    #[bit(3, rw)]
    pub stop: bool,
}

impl Events {
    pub const NONE: Self = Self::new_with_raw_value(0);
    pub const HALF: Self = Self::NONE.with_half(true);
    pub const FULL: Self = Self::NONE.with_full(true);
    pub const ERROR: Self = Self::NONE.with_error(true);
    pub const STOP: Self = Self::NONE.with_stop(true);

    pub fn is_empty(&self) -> bool {
        self.raw_value() == 0
    }

    pub fn union(self, other: Self) -> Self {
        Self::new_with_raw_value(self.raw_value() | other.raw_value())
    }
}

/// Pending events of one consumer task.
pub struct Notification {
    pending: AtomicU32,
    waker: AtomicWaker,
}

impl Default for Notification {
    fn default() -> Self {
        Self::new()
    }
}

impl Notification {
    pub const fn new() -> Self {
        Self {
            pending: AtomicU32::new(0),
            waker: AtomicWaker::new(),
        }
    }

    /// Merge `events` into the pending set and wake the waiting task.
    ///
    /// Callable from interrupt context: it neither blocks nor allocates.
    ///
    /// # Returns
    /// Whether a waiting task was made runnable by this call.
    pub fn post(&self, events: Events) -> bool {
        self.pending.fetch_or(events.raw_value(), Ordering::Release);
        match self.waker.take() {
            Some(waker) => {
                waker.wake();
                true
            }
            None => false,
        }
    }

    /// Take all pending events without waiting.
    pub fn take(&self) -> Events {
        Events::new_with_raw_value(self.pending.swap(0, Ordering::Acquire))
    }

    /// Wait until at least one event is pending, then take all of them.
    ///
    /// There is no timeout.
    pub async fn wait(&self) -> Events {
        poll_fn(|cx| {
            // Register before checking to not miss a post in between.
            self.waker.register(cx.waker());
            let events = self.take();
            if events.is_empty() {
                Poll::Pending
            } else {
                Poll::Ready(events)
            }
        })
        .await
    }
}
