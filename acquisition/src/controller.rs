//! Acquisition bring-up
//!
//! Brings the trigger, DMA stream and converter from reset into continuous triggered
//! acquisition. The order matters:
//!
//! * The DMA stream has to be armed before the converter issues its first request.
//! * The converter must be calibrated while disabled and can only be configured once ready.
//! * The trigger is started last. Until then no conversion happens and the ring stays untouched.
use embedded_hal::delay::DelayNs;
use fugit::HertzU32;

use crate::config::{AcquisitionConfig, ChannelKind};
use crate::error::ConfigError;
use crate::peripherals::{
    CalibrationFactor, CalibrationStore, Converter, DmaFlags, DmaStream,
    DmaTransfer, SampleTrigger, TriggerEdge,
};
use crate::ring::{RingLayout, SampleRing};

/// Voltage regulator startup time.
pub const VREG_SETTLE_US: u32 = 20;

/// Upper bound on status polls while waiting for the end of calibration.
pub const CALIBRATION_POLL_LIMIT: u32 = 1_000_000;

/// Upper bound on status polls while waiting for the converter to become ready.
pub const READY_POLL_LIMIT: u32 = 100_000;

/// The outcome of a successful bring-up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ready {
    pub calibration: CalibrationFactor,
    /// Whether a calibration was run. `false` if a stored factor was reused.
    pub calibrated: bool,
    pub layout: RingLayout,
}

/// Owns the acquisition peripherals during bring-up.
pub struct AcquisitionController<T, D, A> {
    trigger: T,
    dma: D,
    adc: A,
}

impl<T, D, A> AcquisitionController<T, D, A>
where
    T: SampleTrigger,
    D: DmaStream,
    A: Converter,
{
    pub fn new(trigger: T, dma: D, adc: A) -> Self {
        Self { trigger, dma, adc }
    }

    pub fn release(self) -> (T, D, A) {
        (self.trigger, self.dma, self.adc)
    }

    /// Start continuous acquisition into `ring`.
    ///
    /// # Args
    /// * `config` - The acquisition parameters.
    /// * `ring` - The DMA destination. Its length must match the configured layout.
    /// * `store` - Calibration persistence. Calibration only runs if it is empty.
    /// * `delay` - Busy delay for the regulator startup.
    ///
    /// # Returns
    /// The calibration in use and the ring layout. On error the trigger has not been started.
    pub fn configure<const LEN: usize>(
        &mut self,
        config: &AcquisitionConfig,
        ring: &'static SampleRing<LEN>,
        store: &mut impl CalibrationStore,
        delay: &mut impl DelayNs,
    ) -> Result<Ready, ConfigError> {
        config.validate()?;
        let layout = config.layout();
        ring.check(&layout)?;

        self.trigger
            .configure(HertzU32::from_raw(config.sample_rate))?;

        self.dma.route_to_converter();
        self.dma.clear_flags();
        self.dma.configure(&DmaTransfer {
            target: ring.dma_target(),
            circular: true,
            interrupts: DmaFlags::ALL,
        });
        self.dma.enable();

        self.adc.power_up();
        delay.delay_us(VREG_SETTLE_US);

        let (calibration, calibrated) = match store.load() {
            Some(factor) => {
                log::info!("Reusing ADC calibration {:#x}", factor.0);
                (factor, false)
            }
            None => {
                let factor = self.calibrate()?;
                store.store(factor);
                log::info!("ADC calibrated: {:#x}", factor.0);
                (factor, true)
            }
        };

        self.adc.clear_ready();
        self.adc.enable();
        if !poll(READY_POLL_LIMIT, || self.adc.is_ready()) {
            return Err(ConfigError::AdcNotReady);
        }
        // The factor register only accepts writes while the converter is enabled.
        self.adc.load_calibration_factor(calibration);

        let internal = |kind| config.channels.iter().any(|c| c.kind == kind);
        self.adc.enable_internal_channels(
            internal(ChannelKind::TemperatureSensor),
            internal(ChannelKind::ReferenceVoltage),
        );
        for channel in config.channels.iter() {
            self.adc.set_sample_time(
                channel.id,
                config.sample_times.for_kind(channel.kind),
            )?;
        }
        self.adc.set_resolution(config.resolution_bits)?;
        self.adc.set_oversampling(
            config.oversampling.ratio,
            config.oversampling.shift,
        )?;
        self.adc
            .set_external_trigger(config.trigger_line, TriggerEdge::Rising)?;
        self.adc.set_sequence(&config.sequence())?;

        self.adc.start();
        self.trigger.start();

        log::info!(
            "Acquiring {} channels at {} Hz, {} sets per half ({} us)",
            layout.channels,
            config.sample_rate,
            layout.half_depth,
            config.half_period_us()
        );

        Ok(Ready {
            calibration,
            calibrated,
            layout,
        })
    }

    fn calibrate(&mut self) -> Result<CalibrationFactor, ConfigError> {
        self.adc.start_calibration();
        if !poll(CALIBRATION_POLL_LIMIT, || !self.adc.is_calibrating()) {
            return Err(ConfigError::CalibrationTimeout);
        }
        Ok(self.adc.calibration_factor())
    }
}

/// Poll `done` up to `limit` times.
fn poll(limit: u32, mut done: impl FnMut() -> bool) -> bool {
    (0..limit).any(|_| done())
}
