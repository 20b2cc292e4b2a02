//! Runtime counters and sample observation
//!
//! All counters are plain atomics so that the interrupt, the processing task and the reporting
//! task can share one static instance without locks.
use core::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

use crate::config::MAX_CHANNELS;

const NO_CHANNEL: u32 = u32::MAX;

/// Receives every drained sample.
pub trait SampleSink {
    /// # Args
    /// * `position` - Position of the channel in the conversion sequence.
    /// * `raw` - The converter result.
    /// * `filtered` - The filter output if the channel is filtered.
    fn emit(&mut self, position: usize, raw: u16, filtered: Option<f32>);
}

impl SampleSink for () {
    fn emit(&mut self, _position: usize, _raw: u16, _filtered: Option<f32>) {}
}

/// The most recent filter output of every channel.
pub struct LatestSamples {
    values: [AtomicU32; MAX_CHANNELS],
}

impl Default for LatestSamples {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestSamples {
    pub const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const ZERO: AtomicU32 = AtomicU32::new(0);
        Self {
            values: [ZERO; MAX_CHANNELS],
        }
    }

    pub fn get(&self, position: usize) -> Option<f32> {
        self.values
            .get(position)
            .map(|v| f32::from_bits(v.load(Ordering::Relaxed)))
    }
}

impl SampleSink for &LatestSamples {
    fn emit(&mut self, position: usize, _raw: u16, filtered: Option<f32>) {
        if let (Some(slot), Some(y)) = (self.values.get(position), filtered) {
            slot.store(y.to_bits(), Ordering::Relaxed);
        }
    }
}

/// Last raw and filtered value of the channel of interest.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct ChannelSample {
    pub position: usize,
    pub raw: u16,
    pub filtered: f32,
}

/// A snapshot of the diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    /// DMA interrupts since the previous report.
    pub interrupts: u32,
    pub transfer_errors: u32,
    /// Transfer errors the processing task has seen.
    pub reported_errors: u32,
    /// Drains where both halves were pending at once.
    pub late_drains: u32,
    /// Processor cycles spent in the last DMA interrupt.
    pub isr_cycles: u32,
    pub channel: Option<ChannelSample>,
}

pub struct Diagnostics {
    interrupts: AtomicU32,
    transfer_errors: AtomicU32,
    reported_errors: AtomicU32,
    late_drains: AtomicU32,
    isr_cycles: AtomicU32,
    channel_of_interest: AtomicU32,
    raw: AtomicU32,
    filtered: AtomicU32,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    pub const fn new() -> Self {
        Self {
            interrupts: AtomicU32::new(0),
            transfer_errors: AtomicU32::new(0),
            reported_errors: AtomicU32::new(0),
            late_drains: AtomicU32::new(0),
            isr_cycles: AtomicU32::new(0),
            channel_of_interest: AtomicU32::new(NO_CHANNEL),
            raw: AtomicU32::new(0),
            filtered: AtomicU32::new(0),
        }
    }

    pub fn record_interrupt(&self) {
        self.interrupts.fetch_add(1, Ordering::Relaxed);
    }

    /// # Returns
    /// The total number of transfer errors, including this one.
    pub fn record_transfer_error(&self) -> u32 {
        self.transfer_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// # Returns
    /// The number of errors seen by the processing task, including this one.
    pub fn record_reported_error(&self) -> u32 {
        self.reported_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_late_drain(&self) {
        self.late_drains.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_isr_cycles(&self, cycles: u32) {
        self.isr_cycles.store(cycles, Ordering::Relaxed);
    }

    pub fn transfer_errors(&self) -> u32 {
        self.transfer_errors.load(Ordering::Relaxed)
    }

    pub fn reported_errors(&self) -> u32 {
        self.reported_errors.load(Ordering::Relaxed)
    }

    pub fn late_drains(&self) -> u32 {
        self.late_drains.load(Ordering::Relaxed)
    }

    /// Select the channel whose samples are captured for reporting.
    ///
    /// # Args
    /// * `position` - Sequence position of the channel, `None` disables the
    ///   capture.
    /// * `channels` - Length of the configured conversion sequence. Positions
    ///   beyond it disable the capture.
    pub fn set_channel_of_interest(
        &self,
        position: Option<usize>,
        channels: usize,
    ) {
        let position = position
            .filter(|p| *p < channels.min(MAX_CHANNELS))
            .map_or(NO_CHANNEL, |p| p as u32);
        self.channel_of_interest.store(position, Ordering::Relaxed);
    }

    pub fn channel_of_interest(&self) -> Option<usize> {
        match self.channel_of_interest.load(Ordering::Relaxed) {
            NO_CHANNEL => None,
            p => Some(p as usize),
        }
    }

    /// Capture a sample if it belongs to the channel of interest.
    pub fn capture(&self, position: usize, raw: u16, filtered: f32) {
        if self.channel_of_interest() == Some(position) {
            self.raw.store(raw as u32, Ordering::Relaxed);
            self.filtered.store(filtered.to_bits(), Ordering::Relaxed);
        }
    }

    /// Take a snapshot and restart the interrupt count.
    pub fn report(&self) -> Report {
        let channel = self.channel_of_interest().map(|position| ChannelSample {
            position,
            raw: self.raw.load(Ordering::Relaxed) as u16,
            filtered: f32::from_bits(self.filtered.load(Ordering::Relaxed)),
        });
        Report {
            interrupts: self.interrupts.swap(0, Ordering::Relaxed),
            transfer_errors: self.transfer_errors(),
            reported_errors: self.reported_errors(),
            late_drains: self.late_drains(),
            isr_cycles: self.isr_cycles.load(Ordering::Relaxed),
            channel,
        }
    }
}
