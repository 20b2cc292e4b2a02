mod common;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use acquisition::{
    CalibrationFactor, CompletionNotifier, Diagnostics, DmaFlags, Events, Half,
    Notification, RuntimeError, SampleProcessor, SampleRing, TaskState,
};
use common::*;
use embassy_futures::block_on;

struct Harness {
    ring: &'static SampleRing<RING_LEN>,
    notification: &'static Notification,
    diagnostics: &'static Diagnostics,
}

impl Harness {
    fn new() -> Self {
        Self {
            ring: ring(),
            notification: Box::leak(Box::new(Notification::new())),
            diagnostics: Box::leak(Box::new(Diagnostics::new())),
        }
    }

    fn notifier(&self) -> CompletionNotifier<'static> {
        CompletionNotifier::new(self.notification, self.diagnostics)
    }

    fn processor(
        &self,
    ) -> SampleProcessor<'static, CountingSink, RING_LEN> {
        let mut processor = SampleProcessor::new(
            self.ring,
            self.notification,
            self.diagnostics,
            CountingSink::default(),
        );
        let (mut controller, journal) = controller();
        processor
            .setup(
                &mut controller,
                &config(),
                &mut Some(CalibrationFactor(0x42)),
                &mut MockDelay { journal },
            )
            .unwrap();
        processor
    }
}

struct CountingWaker(AtomicUsize);

impl Wake for CountingWaker {
    fn wake(self: Arc<Self>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn setup_arms_processor() {
    let harness = Harness::new();
    let processor = harness.processor();
    assert_eq!(processor.state(), TaskState::Armed);
    assert_eq!(processor.filters().monitored(), CHANNELS);
    assert_eq!(processor.layout().half_depth, HALF_DEPTH);
}

#[test]
fn setup_failure_keeps_setup_state() {
    let harness = Harness::new();
    let mut processor = SampleProcessor::new(
        harness.ring,
        harness.notification,
        harness.diagnostics,
        CountingSink::default(),
    );
    let (controller, journal) = controller();
    let (trigger, dma, mut adc) = controller.release();
    adc.ready_polls = None;
    let mut controller =
        acquisition::AcquisitionController::new(trigger, dma, adc);

    let result = processor.setup(
        &mut controller,
        &config(),
        &mut None::<CalibrationFactor>,
        &mut MockDelay { journal },
    );
    assert_eq!(result, Err(acquisition::ConfigError::AdcNotReady));
    assert_eq!(processor.state(), TaskState::Setup);
}

#[test]
fn each_half_feeds_every_channel_half_depth_times() {
    let harness = Harness::new();
    let mut processor = harness.processor();

    let drained = processor.process(Events::HALF);
    assert_eq!(drained.first_half, HALF_DEPTH);
    assert_eq!(drained.second_half, 0);
    assert!(drained.errors.is_empty());
    assert_eq!(processor.sink().feeds, [HALF_DEPTH; CHANNELS]);

    let drained = processor.process(Events::FULL);
    assert_eq!(drained.second_half, HALF_DEPTH);
    assert_eq!(processor.sink().feeds, [2 * HALF_DEPTH; CHANNELS]);
    assert_eq!(processor.state(), TaskState::Armed);
}

#[test]
fn samples_are_routed_by_sequence_position() {
    let harness = Harness::new();
    let mut processor = harness.processor();
    harness.diagnostics.set_channel_of_interest(Some(3), CHANNELS);

    // Every result encodes its sequence position.
    write_half(harness.ring, Half::Second, |i| (i % CHANNELS) as u16 * 1000);
    processor.process(Events::FULL);

    let report = harness.diagnostics.report();
    let channel = report.channel.unwrap();
    assert_eq!(channel.position, 3);
    assert_eq!(channel.raw, 3000);
    // Channel 0 was fed zeros only.
    assert_eq!(processor.sink().last[0], Some(0.));
}

#[test]
fn no_wakeup_is_lost() {
    let harness = Harness::new();
    let notifier = harness.notifier();
    let mut dma = MockDmaEvents::default();

    let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
    let waker = Waker::from(counter.clone());
    let mut cx = Context::from_waker(&waker);

    let mut wait = Box::pin(harness.notification.wait());
    assert_eq!(wait.as_mut().poll(&mut cx), Poll::Pending);

    // Three interrupts in quick succession before the task gets to run.
    dma.raise(DmaFlags::DEFAULT.with_half_transfer(true));
    assert!(notifier.on_interrupt(&mut dma));
    dma.raise(DmaFlags::DEFAULT.with_transfer_complete(true));
    notifier.on_interrupt(&mut dma);
    dma.raise(DmaFlags::DEFAULT.with_transfer_error(true));
    notifier.on_interrupt(&mut dma);
    assert_eq!(dma.pending, 0);
    assert_eq!(dma.acknowledged, 3);
    assert_eq!(counter.0.load(Ordering::SeqCst), 1);

    let Poll::Ready(events) = wait.as_mut().poll(&mut cx) else {
        panic!("pending events were not observed");
    };
    assert!(events.half() && events.full() && events.error());

    // Posted between wake and the next wait.
    dma.raise(DmaFlags::DEFAULT.with_half_transfer(true));
    notifier.on_interrupt(&mut dma);
    let mut wait = Box::pin(harness.notification.wait());
    assert_eq!(wait.as_mut().poll(&mut cx), Poll::Ready(Events::HALF));
}

#[test]
fn bursts_are_all_processed() {
    let harness = Harness::new();
    let notifier = harness.notifier();
    let mut processor = harness.processor();
    let mut dma = MockDmaEvents::default();

    dma.raise(DmaFlags::DEFAULT.with_half_transfer(true));
    notifier.on_interrupt(&mut dma);
    dma.raise(DmaFlags::DEFAULT.with_transfer_complete(true));
    notifier.on_interrupt(&mut dma);
    dma.raise(DmaFlags::DEFAULT.with_transfer_error(true));
    notifier.on_interrupt(&mut dma);

    let events = block_on(harness.notification.wait());
    let drained = processor.process(events);
    assert_eq!(drained.first_half, HALF_DEPTH);
    assert_eq!(drained.second_half, HALF_DEPTH);
    assert_eq!(
        drained.errors.as_slice(),
        &[RuntimeError::LateDrain, RuntimeError::TransferError { count: 1 }]
    );
    assert_eq!(processor.sink().feeds, [2 * HALF_DEPTH; CHANNELS]);

    let report = harness.diagnostics.report();
    assert_eq!(report.interrupts, 3);
    assert_eq!(report.transfer_errors, 1);
    assert_eq!(report.reported_errors, 1);
    assert_eq!(report.late_drains, 1);
}

#[test]
fn transfer_error_is_counted_once_and_does_not_disturb_draining() {
    let harness = Harness::new();
    let mut processor = harness.processor();

    let drained = processor.process(Events::ERROR);
    assert_eq!(drained.first_half + drained.second_half, 0);
    assert_eq!(
        drained.errors.as_slice(),
        &[RuntimeError::TransferError { count: 1 }]
    );
    assert_eq!(harness.diagnostics.reported_errors(), 1);

    let drained = processor.process(Events::HALF);
    assert_eq!(drained.first_half, HALF_DEPTH);
    assert!(drained.errors.is_empty());
    assert_eq!(harness.diagnostics.reported_errors(), 1);

    let drained = processor.process(Events::FULL.union(Events::ERROR));
    assert_eq!(drained.second_half, HALF_DEPTH);
    assert_eq!(harness.diagnostics.reported_errors(), 2);
    assert_eq!(processor.sink().feeds, [2 * HALF_DEPTH; CHANNELS]);
}

#[test]
fn stop_ends_processing() {
    let harness = Harness::new();
    let mut processor = harness.processor();

    harness.notification.post(Events::HALF);
    harness.notification.post(Events::STOP);
    block_on(processor.run());

    assert_eq!(processor.state(), TaskState::Stopped);
    assert_eq!(processor.sink().feeds, [HALF_DEPTH; CHANNELS]);
}

#[test]
fn highpass_rejects_constant_input() {
    let harness = Harness::new();
    let notifier = harness.notifier();
    let mut processor = harness.processor();
    let mut dma = MockDmaEvents::default();
    harness.diagnostics.set_channel_of_interest(Some(0), CHANNELS);

    // Mid scale of the 15 bit oversampled result.
    write_half(harness.ring, Half::First, |_| 16384);
    write_half(harness.ring, Half::Second, |_| 16384);

    // Two seconds of acquisition.
    for _ in 0..(2 * SAMPLE_RATE as usize / (2 * HALF_DEPTH)) {
        for flag in [
            DmaFlags::DEFAULT.with_half_transfer(true),
            DmaFlags::DEFAULT.with_transfer_complete(true),
        ] {
            dma.raise(flag);
            notifier.on_interrupt(&mut dma);
            let events = block_on(harness.notification.wait());
            let drained = processor.process(events);
            assert!(drained.errors.is_empty());
        }
    }

    let sink = processor.sink();
    for position in 0..CHANNELS {
        let first = sink.first[position].unwrap();
        let last = sink.last[position].unwrap();
        assert!(first > 0.4, "{position}: {first}");
        assert!(last.abs() < 1e-2, "{position}: {last}");
    }
    let channel = harness.diagnostics.report().channel.unwrap();
    assert_eq!(channel.raw, 16384);
    assert!(channel.filtered.abs() < 1e-2);
}
