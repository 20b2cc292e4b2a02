//! Peripheral seams
//!
//! The acquisition logic programs the hardware exclusively through these traits. The firmware
//! implements them with register writes, tests with recording mocks.
use bitbybit::{bitenum, bitfield};
use fugit::HertzU32;
use serde::{Deserialize, Serialize};

use crate::config::SampleTime;
use crate::error::ConfigError;
use crate::ring::DmaTarget;

/// The converter's linearity and offset calibration result.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationFactor(pub u32);

/// Persistence of the calibration factor across reconfigurations.
///
/// A converter that was calibrated once keeps its factor. Calibration is only run if the store
/// is empty.
pub trait CalibrationStore {
    fn load(&self) -> Option<CalibrationFactor>;
    fn store(&mut self, factor: CalibrationFactor);
}

impl CalibrationStore for Option<CalibrationFactor> {
    fn load(&self) -> Option<CalibrationFactor> {
        *self
    }

    fn store(&mut self, factor: CalibrationFactor) {
        self.replace(factor);
    }
}

/// The edge of the trigger signal that starts a conversion sequence.
#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Default)]
pub enum TriggerEdge {
    #[default]
    Disabled = 0b00,
    Rising = 0b01,
    Falling = 0b10,
    Both = 0b11,
}

/// DMA stream completion and error flags.
#[bitfield(u8, default = 0)]
#[derive(Debug, PartialEq)]
pub struct DmaFlags {
    #[bit(0, rw)]
    pub transfer_error: bool,
    #[bit(1, rw)]
    pub half_transfer: bool,
    #[bit(2, rw)]
    pub transfer_complete: bool,
}

impl DmaFlags {
    pub const ALL: Self = Self::DEFAULT
        .with_transfer_error(true)
        .with_half_transfer(true)
        .with_transfer_complete(true);

    pub fn is_empty(&self) -> bool {
        self.raw_value() == 0
    }
}

/// Peripheral to memory transfer parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DmaTransfer {
    pub target: DmaTarget,
    /// Restart at the beginning of the target after the last word.
    pub circular: bool,
    /// Interrupt causes to enable.
    pub interrupts: DmaFlags,
}

/// The periodic conversion trigger.
pub trait SampleTrigger {
    /// Configure the trigger period without starting it.
    fn configure(&mut self, rate: HertzU32) -> Result<(), ConfigError>;

    /// Start issuing triggers.
    fn start(&mut self);
}

/// A DMA stream moving converter results to memory.
pub trait DmaStream {
    /// Connect the converter's DMA request to this stream.
    fn route_to_converter(&mut self);

    /// Clear all pending flags of the stream.
    fn clear_flags(&mut self);

    /// Program the transfer. The stream must be disabled.
    fn configure(&mut self, transfer: &DmaTransfer);

    /// Arm the stream. Transfers happen once the converter issues requests.
    fn enable(&mut self);
}

/// The interrupt side of a DMA stream.
pub trait DmaEvents {
    /// Pending flags.
    fn pending(&mut self) -> DmaFlags;

    /// Clear the given flags.
    fn acknowledge(&mut self, flags: DmaFlags);
}

/// Analog to digital converter programming.
///
/// Operations reflect the required power up and configuration order of an SAR converter with
/// self calibration and a hardware sequencer.
pub trait Converter {
    /// Leave deep power down and enable the internal voltage regulator.
    fn power_up(&mut self);

    /// Start self calibration. The converter must be disabled.
    fn start_calibration(&mut self);

    fn is_calibrating(&mut self) -> bool;

    /// Read the factor found by the last calibration.
    fn calibration_factor(&mut self) -> CalibrationFactor;

    /// Apply a previously found calibration factor.
    fn load_calibration_factor(&mut self, factor: CalibrationFactor);

    /// Clear a stale ready flag before enabling.
    fn clear_ready(&mut self);

    fn enable(&mut self);

    fn is_ready(&mut self) -> bool;

    /// Connect the internal temperature sensor and voltage reference channels.
    fn enable_internal_channels(&mut self, temperature: bool, reference: bool);

    fn set_sample_time(
        &mut self,
        channel: u8,
        time: SampleTime,
    ) -> Result<(), ConfigError>;

    fn set_resolution(&mut self, bits: u8) -> Result<(), ConfigError>;

    fn set_oversampling(
        &mut self,
        ratio: u16,
        shift: u8,
    ) -> Result<(), ConfigError>;

    /// Start a conversion sequence on `edge` of trigger `line`. Enable DMA
    /// requests for every result, in circular mode.
    fn set_external_trigger(
        &mut self,
        line: u8,
        edge: TriggerEdge,
    ) -> Result<(), ConfigError>;

    /// Program the conversion sequence, in order.
    fn set_sequence(&mut self, channels: &[u8]) -> Result<(), ConfigError>;

    /// Start converting. With an external trigger this arms the converter.
    fn start(&mut self);
}
