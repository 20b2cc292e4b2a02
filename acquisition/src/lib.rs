//! # Acquisition
//!
//! Hardware-agnostic core of a continuously sampling analog front end.
//!
//! A timer ([peripherals::SampleTrigger]) starts one conversion sequence of the
//! converter ([peripherals::Converter]) per period. The DMA engine
//! ([peripherals::DmaStream]) moves every result into a circular
//! [ring::SampleRing] without processor involvement and signals when either half
//! of the ring has been written. The [notifier::CompletionNotifier] runs in the
//! DMA interrupt, acknowledges the hardware and posts [notify::Events] to the
//! [task::SampleProcessor], which drains the newly valid half through one
//! streaming biquad filter per channel ([filter_bank::FilterBank]).
//!
//! The ring is never locked. The processor may only read a half after the
//! corresponding completion event was observed and has to finish before the DMA
//! engine wraps back into it. The half depth therefore bounds the processing
//! latency budget, see [config::AcquisitionConfig::half_period_us].
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod filter_bank;
pub mod notifier;
pub mod notify;
pub mod peripherals;
pub mod ring;
pub mod task;

pub use config::{
    AcquisitionConfig, BoardConfig, ChannelConfig, ChannelKind, FilterConfig,
    Oversampling, SampleTime, SampleTimes,
};
pub use controller::{AcquisitionController, Ready};
pub use diagnostics::{
    ChannelSample, Diagnostics, LatestSamples, Report, SampleSink,
};
pub use error::{ConfigError, RuntimeError};
pub use filter_bank::{ChannelFilter, FilterBank};
pub use notifier::CompletionNotifier;
pub use notify::{Events, Notification};
pub use peripherals::{
    CalibrationFactor, CalibrationStore, Converter, DmaEvents, DmaFlags,
    DmaStream, DmaTransfer, SampleTrigger, TriggerEdge,
};
pub use ring::{DmaTarget, Half, ReadyHalf, RingLayout, SampleRing};
pub use task::{Drained, SampleProcessor, TaskState};
