//! Sample processing task
//!
//! ```text
//! Setup --setup()--> Armed --wait()--> DrainHalf / DrainFull --> Armed ...
//!                      |
//!                      +--stop--> Stopped
//! ```
//!
//! The only suspension point is [Notification::wait] in [SampleProcessor::run].
use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::config::AcquisitionConfig;
use crate::controller::{AcquisitionController, Ready};
use crate::diagnostics::{Diagnostics, SampleSink};
use crate::error::{ConfigError, RuntimeError};
use crate::filter_bank::FilterBank;
use crate::notify::{Events, Notification};
use crate::peripherals::{CalibrationStore, Converter, DmaStream, SampleTrigger};
use crate::ring::{Half, ReadyHalf, RingLayout, SampleRing};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Not configured yet, or configuration failed.
    Setup,
    /// Waiting for events.
    Armed,
    DrainHalf,
    DrainFull,
    /// A stop event was observed.
    Stopped,
}

/// The outcome of processing one set of events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Drained {
    /// Sample sets drained from the first half.
    pub first_half: usize,
    /// Sample sets drained from the second half.
    pub second_half: usize,
    pub errors: Vec<RuntimeError, 2>,
    pub stop: bool,
}

/// Consumer of the ring.
pub struct SampleProcessor<'a, S, const LEN: usize> {
    ring: &'static SampleRing<LEN>,
    notification: &'a Notification,
    diagnostics: &'a Diagnostics,
    filters: FilterBank,
    layout: RingLayout,
    sink: S,
    state: TaskState,
}

impl<'a, S: SampleSink, const LEN: usize> SampleProcessor<'a, S, LEN> {
    pub fn new(
        ring: &'static SampleRing<LEN>,
        notification: &'a Notification,
        diagnostics: &'a Diagnostics,
        sink: S,
    ) -> Self {
        Self {
            ring,
            notification,
            diagnostics,
            filters: FilterBank::default(),
            layout: RingLayout::new(0, 0),
            sink,
            state: TaskState::Setup,
        }
    }

    /// Initialize the filters and start acquisition.
    ///
    /// Filters are created zeroed for every filtered channel, replacing any previous ones. On
    /// error the processor stays in [TaskState::Setup].
    pub fn setup<T, D, A>(
        &mut self,
        controller: &mut AcquisitionController<T, D, A>,
        config: &AcquisitionConfig,
        store: &mut impl CalibrationStore,
        delay: &mut impl DelayNs,
    ) -> Result<Ready, ConfigError>
    where
        T: SampleTrigger,
        D: DmaStream,
        A: Converter,
    {
        self.state = TaskState::Setup;
        let ready = FilterBank::new(config).and_then(|filters| {
            let ready = controller.configure(config, self.ring, store, delay)?;
            self.filters = filters;
            Ok(ready)
        });

        match ready {
            Ok(ready) => {
                self.layout = ready.layout;
                self.state = TaskState::Armed;
                log::info!(
                    "Filtering {} of {} channels",
                    self.filters.monitored(),
                    self.layout.channels
                );
                Ok(ready)
            }
            Err(err) => {
                log::error!("Acquisition setup failed: {err}");
                Err(err)
            }
        }
    }

    /// Drain the ring according to `events`.
    ///
    /// The first half is drained before the second one. A transfer error does not affect
    /// draining.
    pub fn process(&mut self, events: Events) -> Drained {
        let mut drained = Drained::default();

        if events.half() && events.full() {
            self.diagnostics.record_late_drain();
            log::warn!("Both ring halves pending, processing fell behind");
            drained.errors.push(RuntimeError::LateDrain).ok();
        }

        if events.half() {
            self.state = TaskState::DrainHalf;
            drained.first_half = self.drain(ReadyHalf::new(Half::First));
        }

        if events.full() {
            self.state = TaskState::DrainFull;
            drained.second_half = self.drain(ReadyHalf::new(Half::Second));
        }

        if events.error() {
            let count = self.diagnostics.record_reported_error();
            log::warn!("DMA transfer error, {count} so far");
            drained
                .errors
                .push(RuntimeError::TransferError { count })
                .ok();
        }

        drained.stop = events.stop();
        self.state = if drained.stop {
            TaskState::Stopped
        } else {
            TaskState::Armed
        };
        drained
    }

    /// Feed one half through the filters, set by set, channel by channel.
    ///
    /// # Returns
    /// The number of sample sets drained.
    fn drain(&mut self, ready: ReadyHalf) -> usize {
        let ring = self.ring;
        let samples = ring.read(ready);
        let channels = self.layout.channels;
        if channels == 0 {
            return 0;
        }

        for set in samples.chunks_exact(channels) {
            for (position, &raw) in set.iter().enumerate() {
                let filtered = self.filters.feed(position, raw);
                if let Some(y) = filtered {
                    self.diagnostics.capture(position, raw, y);
                }
                self.sink.emit(position, raw, filtered);
            }
        }
        samples.len() / channels
    }

    /// Process events until a stop event arrives.
    pub async fn run(&mut self) {
        if self.state != TaskState::Armed {
            log::warn!("Processing started in state {:?}", self.state);
        }
        loop {
            let events = self.notification.wait().await;
            if self.process(events).stop {
                log::info!("Sample processing stopped");
                break;
            }
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn layout(&self) -> RingLayout {
        self.layout
    }

    pub fn filters(&self) -> &FilterBank {
        &self.filters
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
