///! DMA1 stream 0, moving ADC3 results into the sample ring.
///!
///! The stream is split in two: [AdcDma] owns the configuration registers and is used once during
///! bring up, [AdcDmaEvents] only touches the stream 0 bits of the interrupt status and clear
///! registers and lives in the interrupt handler.
use acquisition::{DmaEvents, DmaFlags, DmaStream, DmaTransfer};

use super::hal;

/// DMAMUX1 request line of ADC3.
const ADC3_DMA_REQUEST: u8 = 115;

/// Offset of TEIF0, HTIF0 and TCIF0 in LISR and LIFCR.
const STREAM0_FLAGS: u32 = 3;

/// All stream 0 flags, including FIFO and direct mode errors.
const STREAM0_ALL: u32 = 0b11_1101;

/// Translate LISR into the stream 0 completion flags.
pub fn flags_from_status(lisr: u32) -> DmaFlags {
    DmaFlags::new_with_raw_value(((lisr >> STREAM0_FLAGS) & 0b111) as u8)
}

/// The LIFCR value clearing `flags` of stream 0.
pub fn clear_value(flags: DmaFlags) -> u32 {
    (flags.raw_value() as u32) << STREAM0_FLAGS
}

/// DMA1 stream 0 configured for peripheral to memory transfers from ADC3.
pub struct AdcDma {
    dma: hal::stm32::DMA1,
    dmamux: hal::stm32::DMAMUX1,
    source: u32,
}

impl AdcDma {
    /// Take ownership of the stream. The DMA1 clock must be enabled.
    ///
    /// # Args
    /// * `dma` - DMA1, only stream 0 is used.
    /// * `dmamux` - The request multiplexer.
    /// * `source` - The address of the converter data register.
    pub fn new(
        dma: hal::stm32::DMA1,
        dmamux: hal::stm32::DMAMUX1,
        source: u32,
    ) -> Self {
        Self {
            dma,
            dmamux,
            source,
        }
    }
}

impl DmaStream for AdcDma {
    fn route_to_converter(&mut self) {
        self.dmamux.ccr[0]
            .modify(|_, w| unsafe { w.dmareq_id().bits(ADC3_DMA_REQUEST) });
    }

    fn clear_flags(&mut self) {
        self.dma.lifcr.write(|w| unsafe { w.bits(STREAM0_ALL) });
    }

    fn configure(&mut self, transfer: &DmaTransfer) {
        let stream = &self.dma.st[0];
        stream.cr.modify(|_, w| w.en().clear_bit());
        while stream.cr.read().en().bit_is_set() {}

        stream.par.write(|w| unsafe { w.bits(self.source) });
        stream
            .m0ar
            .write(|w| unsafe { w.bits(transfer.target.address as u32) });
        stream
            .ndtr
            .write(|w| unsafe { w.ndt().bits(transfer.target.len as u16) });
        stream.cr.modify(|_, w| unsafe {
            w.pl()
                .bits(0b10) // high
                .circ()
                .bit(transfer.circular)
                .msize()
                .bits(0b01) // 16
                .minc()
                .set_bit()
                .psize()
                .bits(0b01) // 16
                .pinc()
                .clear_bit()
                .dbm()
                .clear_bit()
                .dir()
                .bits(0b00) // peripheral_to_memory
                .pfctrl()
                .clear_bit() // dma is FC
                .teie()
                .bit(transfer.interrupts.transfer_error())
                .htie()
                .bit(transfer.interrupts.half_transfer())
                .tcie()
                .bit(transfer.interrupts.transfer_complete())
        });
        // Direct mode, every request moves one half word.
        stream.fcr.modify(|_, w| w.dmdis().clear_bit());
    }

    fn enable(&mut self) {
        self.dma.st[0].cr.modify(|_, w| w.en().set_bit());
    }
}

/// Interrupt flags of DMA1 stream 0.
pub struct AdcDmaEvents {}

impl AdcDmaEvents {
    /// Construct the event handle.
    ///
    /// # Safety
    /// This is only safe to call once. Once constructed, only the stream 0 bits of LISR and LIFCR
    /// are accessed, which no other owner writes.
    pub unsafe fn new() -> Self {
        Self {}
    }

    fn regs(&self) -> &hal::stm32::dma1::RegisterBlock {
        // Note(unsafe): LISR is read only and LIFCR writes only affect the bits written as 1.
        unsafe { &*hal::stm32::DMA1::ptr() }
    }
}

impl DmaEvents for AdcDmaEvents {
    fn pending(&mut self) -> DmaFlags {
        flags_from_status(self.regs().lisr.read().bits())
    }

    fn acknowledge(&mut self, flags: DmaFlags) {
        self.regs()
            .lifcr
            .write(|w| unsafe { w.bits(clear_value(flags)) });
    }
}
