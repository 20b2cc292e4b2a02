//! Per-channel streaming filters
use dsp::{Cascade, FilterError};
use heapless::Vec;

use crate::config::{AcquisitionConfig, MAX_CHANNELS, MAX_STAGES};
use crate::error::ConfigError;

/// A biquad cascade with its input scaling.
///
/// Raw converter codes are divided by `scale` before entering the cascade.
#[derive(Clone, Debug)]
pub struct ChannelFilter {
    cascade: Cascade<MAX_STAGES>,
    scale: f32,
}

impl ChannelFilter {
    pub fn init(
        coefficients: &[f32],
        stage_count: usize,
        scale: f32,
    ) -> Result<Self, FilterError> {
        if !scale.is_finite() || scale <= 0. {
            return Err(FilterError::InvalidScale);
        }
        Ok(Self {
            cascade: Cascade::new(coefficients, stage_count)?,
            scale,
        })
    }

    /// Filter one raw sample.
    pub fn feed(&mut self, raw: u16) -> f32 {
        self.cascade.update(raw as f32 / self.scale)
    }

    /// Forget the filter history.
    pub fn reinit(&mut self) {
        self.cascade.reset();
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn cascade(&self) -> &Cascade<MAX_STAGES> {
        &self.cascade
    }
}

/// One optional filter per position in the conversion sequence.
#[derive(Clone, Debug, Default)]
pub struct FilterBank {
    filters: Vec<Option<ChannelFilter>, MAX_CHANNELS>,
}

impl FilterBank {
    /// A bank with a zeroed filter for every filtered channel of `config`.
    pub fn new(config: &AcquisitionConfig) -> Result<Self, ConfigError> {
        let mut filters = Vec::new();
        for channel in config.channels.iter() {
            let filter = if channel.filtered {
                Some(ChannelFilter::init(
                    &config.filter.coefficients,
                    config.filter.stages,
                    config.full_scale(),
                )?)
            } else {
                None
            };
            filters.push(filter).map_err(|_| {
                ConfigError::SequenceTooLong(config.channels.len())
            })?;
        }
        Ok(Self { filters })
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Feed a raw sample into the filter of sequence `position`.
    ///
    /// # Returns
    /// The filter output, `None` for unfiltered channels.
    pub fn feed(&mut self, position: usize, raw: u16) -> Option<f32> {
        self.filters
            .get_mut(position)?
            .as_mut()
            .map(|filter| filter.feed(raw))
    }

    /// Number of filtered channels.
    pub fn monitored(&self) -> usize {
        self.filters.iter().flatten().count()
    }

    pub fn get(&self, position: usize) -> Option<&ChannelFilter> {
        self.filters.get(position)?.as_ref()
    }

    pub fn reinit(&mut self) {
        self.filters.iter_mut().flatten().for_each(ChannelFilter::reinit);
    }
}
