//! Acquisition configuration
//!
//! The acquisition logic is board agnostic. Everything that differs between boards (converter
//! channel numbers of the internal sensors, sampling time encodings, trigger line) is described by
//! a [BoardConfig] which is turned into an [AcquisitionConfig] at startup.
use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ring::RingLayout;

/// Maximum length of a conversion sequence.
pub const MAX_CHANNELS: usize = 16;

/// Maximum number of biquad stages per channel.
pub const MAX_STAGES: usize = 4;

/// Maximum number of filter coefficients.
pub const MAX_COEFFICIENTS: usize =
    MAX_STAGES * dsp::biquad::COEFFICIENTS_PER_STAGE;

/// Widest result the 16 bit DMA word can carry.
pub const MAX_RESOLUTION_BITS: u8 = 16;

/// Largest ring the DMA transfer counter can address.
pub const MAX_RING_LEN: usize = u16::MAX as usize;

/// Highest external trigger line code of the converter.
pub const MAX_TRIGGER_LINE: u8 = 0x1f;

/// The signal source behind a converter channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    /// An external analog input pin.
    External,
    /// The internal die temperature sensor.
    TemperatureSensor,
    /// The internal voltage reference.
    ReferenceVoltage,
}

impl ChannelKind {
    /// Internal channels are high impedance sources and need the slow sampling time.
    pub fn is_internal(&self) -> bool {
        !matches!(self, Self::External)
    }
}

/// One entry of the conversion sequence.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Converter channel number.
    pub id: u8,
    pub kind: ChannelKind,
    /// Whether the channel is fed through the filter bank.
    pub filtered: bool,
}

/// Sampling time in the register encoding of the converter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleTime(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleTimes {
    pub external: SampleTime,
    pub internal: SampleTime,
}

impl SampleTimes {
    pub fn for_kind(&self, kind: ChannelKind) -> SampleTime {
        if kind.is_internal() {
            self.internal
        } else {
            self.external
        }
    }
}

/// Hardware oversampling of every conversion.
///
/// `ratio` conversions are accumulated into one result, which is then shifted right by `shift`
/// bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oversampling {
    pub ratio: u16,
    pub shift: u8,
}

impl Oversampling {
    pub const NONE: Self = Self { ratio: 1, shift: 0 };

    pub fn is_enabled(&self) -> bool {
        self.ratio > 1
    }
}

/// Concatenated biquad coefficients, `[b0, b1, b2, a1, a2]` per stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub coefficients: Vec<f32, MAX_COEFFICIENTS>,
    pub stages: usize,
}

impl FilterConfig {
    pub fn new(
        coefficients: &[f32],
        stages: usize,
    ) -> Result<Self, ConfigError> {
        let coefficients = Vec::from_slice(coefficients).map_err(|_| {
            dsp::FilterError::TooManyStages(
                coefficients.len() / dsp::biquad::COEFFICIENTS_PER_STAGE,
            )
        })?;
        Ok(Self {
            coefficients,
            stages,
        })
    }
}

/// Board specific acquisition constants.
#[derive(Copy, Clone, Debug)]
pub struct BoardConfig {
    pub name: &'static str,
    /// External signal channels in acquisition order.
    pub external_channels: &'static [u8],
    /// Converter channel of the die temperature sensor.
    pub temperature_sensor: u8,
    /// Converter channel of the internal reference.
    pub reference: u8,
    /// Native converter resolution in bits.
    pub resolution_bits: u8,
    pub sample_times: SampleTimes,
    /// External trigger line code selecting the sample trigger's update event.
    pub trigger_line: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Conversion sequence in acquisition order.
    pub channels: Vec<ChannelConfig, MAX_CHANNELS>,
    pub resolution_bits: u8,
    pub oversampling: Oversampling,
    /// Sample set rate in Hz.
    pub sample_rate: u32,
    /// Sample sets per ring buffer half.
    pub half_depth: usize,
    pub sample_times: SampleTimes,
    pub trigger_line: u8,
    pub filter: FilterConfig,
}

impl AcquisitionConfig {
    /// Acquire all external channels of the board followed by the temperature
    /// sensor and the internal reference. All channels are filtered.
    pub fn for_board(
        board: &BoardConfig,
        sample_rate: u32,
        half_depth: usize,
        oversampling: Oversampling,
        filter: FilterConfig,
    ) -> Result<Self, ConfigError> {
        let internal = [
            (board.temperature_sensor, ChannelKind::TemperatureSensor),
            (board.reference, ChannelKind::ReferenceVoltage),
        ];
        let sequence = board
            .external_channels
            .iter()
            .map(|id| (*id, ChannelKind::External))
            .chain(internal);

        let mut channels = Vec::new();
        for (id, kind) in sequence {
            channels
                .push(ChannelConfig {
                    id,
                    kind,
                    filtered: true,
                })
                .map_err(|_| {
                    ConfigError::SequenceTooLong(
                        board.external_channels.len() + internal.len(),
                    )
                })?;
        }

        let config = Self {
            channels,
            resolution_bits: board.resolution_bits,
            oversampling,
            sample_rate,
            half_depth,
            sample_times: board.sample_times,
            trigger_line: board.trigger_line,
            filter,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::EmptySequence);
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.half_depth == 0 {
            return Err(ConfigError::InvalidHalfDepth);
        }
        if self.resolution_bits == 0
            || self.resolution_bits > MAX_RESOLUTION_BITS
        {
            return Err(ConfigError::UnsupportedResolution(
                self.resolution_bits,
            ));
        }
        let Oversampling { ratio, shift } = self.oversampling;
        // The oversampled result has to fit the 16 bit DMA word.
        match self.codes() {
            Some(codes) if codes > 0 && codes <= 1 << 16 => {}
            _ => return Err(ConfigError::InvalidOversampling { ratio, shift }),
        }
        let len = self
            .channels
            .len()
            .checked_mul(self.half_depth)
            .and_then(|half| half.checked_mul(2))
            .unwrap_or(usize::MAX);
        if len > MAX_RING_LEN {
            return Err(ConfigError::RingTooLong(len));
        }
        if self.trigger_line > MAX_TRIGGER_LINE {
            return Err(ConfigError::InvalidTriggerLine(self.trigger_line));
        }
        Ok(())
    }

    /// Converter channel numbers in acquisition order.
    pub fn sequence(&self) -> Vec<u8, MAX_CHANNELS> {
        self.channels.iter().map(|c| c.id).collect()
    }

    /// The code range of one (oversampled) result.
    ///
    /// Dividing raw codes by this maps them into `[0, 1)`.
    ///
    /// Zero if the resolution and oversampling do not describe a valid result.
    pub fn full_scale(&self) -> f32 {
        self.codes().unwrap_or(0) as f32
    }

    fn codes(&self) -> Option<u64> {
        1u64.checked_shl(self.resolution_bits as u32)?
            .checked_mul(self.oversampling.ratio as u64)?
            .checked_shr(self.oversampling.shift as u32)
    }

    pub fn layout(&self) -> RingLayout {
        RingLayout::new(self.channels.len(), self.half_depth)
    }

    /// Time for the DMA engine to fill one half of the ring.
    ///
    /// Draining a half has to finish within this period.
    pub fn half_period_us(&self) -> u32 {
        let us = (self.half_depth as u64).saturating_mul(1_000_000)
            / self.sample_rate.max(1) as u64;
        u32::try_from(us).unwrap_or(u32::MAX)
    }
}
