//! Basic blocking delay
//!
//! A cycle counting busy wait, used for the converter regulator start up.
use embedded_hal_1::delay::DelayNs;

/// A basic delay implementation.
pub struct AsmDelay {
    frequency_mhz: u32,
}

impl AsmDelay {
    /// Create a new delay.
    ///
    /// # Args
    /// * `freq` - The CPU core frequency in Hz.
    pub fn new(freq: u32) -> AsmDelay {
        AsmDelay {
            frequency_mhz: freq / 1_000_000,
        }
    }
}

impl DelayNs for AsmDelay {
    fn delay_ns(&mut self, ns: u32) {
        // Round up, waiting too long is harmless.
        let cycles = (ns as u64 * self.frequency_mhz as u64).div_ceil(1_000);
        cortex_m::asm::delay(cycles.min(u32::MAX as u64) as u32)
    }

    fn delay_us(&mut self, us: u32) {
        cortex_m::asm::delay(self.frequency_mhz.saturating_mul(us))
    }
}
