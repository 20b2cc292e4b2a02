///! The sampling timer paces the converter's conversion sequences.
use super::hal;
use acquisition::{ConfigError, SampleTrigger};
use fugit::HertzU32;

use super::design_parameters::TIMER_FREQUENCY;

/// Master mode selection asserting TRGO on every update event.
const MMS_UPDATE: u8 = 0b010;

/// Compute the auto-reload value for `rate` update events per second of a
/// timer counting at `tick_rate`.
///
/// Returns `None` if the rate can not be represented with at least two ticks
/// per period.
pub fn period_ticks(tick_rate: u32, rate: u32) -> Option<u32> {
    if rate == 0 {
        return None;
    }
    let ticks = tick_rate / rate;
    (ticks >= 2).then(|| ticks - 1)
}

/// The timer used for triggering ADC conversion sequences.
///
/// Every update event asserts TRGO, the converter's external trigger.
pub struct SamplingTimer {
    timer: hal::timer::Timer<hal::stm32::TIM2>,
}

impl SamplingTimer {
    /// Construct the sampling timer. The timer is paused and counts at
    /// [TIMER_FREQUENCY].
    pub fn new(mut timer: hal::timer::Timer<hal::stm32::TIM2>) -> Self {
        timer.pause();
        timer.set_tick_freq(TIMER_FREQUENCY);

        Self { timer }
    }

    /// Manually set the period of the timer.
    pub fn set_period_ticks(&mut self, period: u32) {
        let regs = unsafe { &*hal::stm32::TIM2::ptr() };
        regs.arr.write(|w| w.arr().bits(period));

        // Force the new period to take effect immediately.
        self.timer.apply_freq();
    }

    /// Drive TRGO from the update event.
    pub fn trigger_on_update(&mut self) {
        let regs = unsafe { &*hal::stm32::TIM2::ptr() };
        regs.cr2.modify(|_, w| w.mms().bits(MMS_UPDATE));
    }
}

impl SampleTrigger for SamplingTimer {
    fn configure(&mut self, rate: HertzU32) -> Result<(), ConfigError> {
        let period = period_ticks(TIMER_FREQUENCY.to_Hz(), rate.raw())
            .ok_or(ConfigError::InvalidSampleRate(rate.raw()))?;
        self.set_period_ticks(period);
        self.trigger_on_update();
        log::debug!("Sampling timer period: {} ticks", period + 1);
        Ok(())
    }

    fn start(&mut self) {
        // Force a refresh of the frequency settings.
        self.timer.apply_freq();
        self.timer.reset_counter();

        self.timer.resume();
    }
}
