//! DMA completion interrupt handling
use crate::diagnostics::Diagnostics;
use crate::notify::{Events, Notification};
use crate::peripherals::{DmaEvents, DmaFlags};

/// Translates DMA stream flags into task notifications.
///
/// Runs in interrupt context. It never touches the ring and never blocks.
pub struct CompletionNotifier<'a> {
    notification: &'a Notification,
    diagnostics: &'a Diagnostics,
}

impl<'a> CompletionNotifier<'a> {
    pub const fn new(
        notification: &'a Notification,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        Self {
            notification,
            diagnostics,
        }
    }

    /// Handle the DMA stream interrupt.
    ///
    /// Every pending cause is acknowledged in hardware before the matching event is posted so
    /// that a cause that reoccurs afterwards raises a fresh interrupt. Causes that are not
    /// pending are left alone.
    ///
    /// # Returns
    /// Whether the processing task was woken and a context switch should follow the interrupt.
    pub fn on_interrupt(&self, dma: &mut impl DmaEvents) -> bool {
        self.diagnostics.record_interrupt();
        let pending = dma.pending();
        let mut woken = false;

        if pending.half_transfer() {
            dma.acknowledge(DmaFlags::DEFAULT.with_half_transfer(true));
            woken |= self.notification.post(Events::HALF);
        }

        if pending.transfer_complete() {
            dma.acknowledge(DmaFlags::DEFAULT.with_transfer_complete(true));
            woken |= self.notification.post(Events::FULL);
        }

        if pending.transfer_error() {
            dma.acknowledge(DmaFlags::DEFAULT.with_transfer_error(true));
            let count = self.diagnostics.record_transfer_error();
            log::trace!("DMA transfer error #{count}");
            woken |= self.notification.post(Events::ERROR);
        }

        woken
    }
}
