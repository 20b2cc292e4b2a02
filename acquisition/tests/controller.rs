mod common;

use acquisition::{
    CalibrationFactor, CalibrationStore, ConfigError, SampleRing, TriggerEdge,
};
use common::*;

fn configure(
    controller: &mut MockController,
    journal: &Journal,
    store: &mut Option<CalibrationFactor>,
) -> Result<acquisition::Ready, ConfigError> {
    let ring: &'static SampleRing<RING_LEN> = ring();
    controller.configure(
        &config(),
        ring,
        store,
        &mut MockDelay {
            journal: journal.clone(),
        },
    )
}

#[test]
fn bring_up_order() {
    let (mut controller, journal) = controller();
    let mut store = None;
    let ready = configure(&mut controller, &journal, &mut store).unwrap();

    assert!(ready.calibrated);
    assert_eq!(ready.calibration, CalibrationFactor(0x1234));
    assert_eq!(ready.layout.len(), RING_LEN);

    assert_eq!(
        *journal.borrow(),
        [
            Op::TriggerConfigure(5000),
            Op::DmaRoute,
            Op::DmaClear,
            Op::DmaConfigure {
                len: RING_LEN,
                circular: true,
                interrupts: 0b111,
            },
            Op::DmaEnable,
            Op::PowerUp,
            Op::Delay(20_000),
            Op::StartCalibration,
            Op::ClearReady,
            Op::Enable,
            Op::LoadCalibration(0x1234),
            Op::InternalChannels(true, true),
            Op::SampleTime(5, 4),
            Op::SampleTime(9, 4),
            Op::SampleTime(4, 4),
            Op::SampleTime(18, 6),
            Op::SampleTime(19, 6),
            Op::Resolution(12),
            Op::Oversampling(8, 0),
            Op::ExternalTrigger(11, TriggerEdge::Rising),
            Op::Sequence(vec![5, 9, 4, 18, 19]),
            Op::AdcStart,
            Op::TriggerStart,
        ]
    );
}

#[test]
fn stored_calibration_is_reused() {
    let (mut controller, journal) = controller();
    let mut store = Some(CalibrationFactor(0xabcd));
    let ready = configure(&mut controller, &journal, &mut store).unwrap();

    assert!(!ready.calibrated);
    assert_eq!(ready.calibration, CalibrationFactor(0xabcd));
    let journal = journal.borrow();
    assert!(!journal.contains(&Op::StartCalibration));
    assert!(journal.contains(&Op::LoadCalibration(0xabcd)));
}

#[test]
fn calibration_runs_once() {
    let (mut controller, journal) = controller();
    let mut store = None;
    configure(&mut controller, &journal, &mut store).unwrap();
    assert_eq!(store.load(), Some(CalibrationFactor(0x1234)));

    configure(&mut controller, &journal, &mut store).unwrap();
    let (_, _, adc) = controller.release();
    assert_eq!(*adc.calibration_starts.borrow(), 1);
}

#[test]
fn calibration_timeout_is_fatal() {
    let (controller, journal) = controller();
    let (trigger, dma, mut adc) = controller.release();
    adc.calibration_polls = None;
    let mut controller =
        acquisition::AcquisitionController::new(trigger, dma, adc);

    let mut store = None;
    assert_eq!(
        configure(&mut controller, &journal, &mut store),
        Err(ConfigError::CalibrationTimeout)
    );
    assert_eq!(store, None);
    let journal = journal.borrow();
    assert!(!journal.contains(&Op::Enable));
    assert!(!journal.contains(&Op::TriggerStart));
}

#[test]
fn converter_not_ready_is_fatal() {
    let (controller, journal) = controller();
    let (trigger, dma, mut adc) = controller.release();
    adc.ready_polls = None;
    let mut controller =
        acquisition::AcquisitionController::new(trigger, dma, adc);

    let mut store = Some(CalibrationFactor(1));
    assert_eq!(
        configure(&mut controller, &journal, &mut store),
        Err(ConfigError::AdcNotReady)
    );
    let journal = journal.borrow();
    assert_eq!(journal.last(), Some(&Op::Enable));
    assert!(!journal.contains(&Op::AdcStart));
}

#[test]
fn ring_size_mismatch_touches_nothing() {
    let (mut controller, journal) = controller();
    let ring: &'static SampleRing<8> = ring();
    let result = controller.configure(
        &config(),
        ring,
        &mut None::<CalibrationFactor>,
        &mut MockDelay {
            journal: journal.clone(),
        },
    );
    assert_eq!(
        result,
        Err(ConfigError::BufferSize {
            expected: RING_LEN,
            actual: 8
        })
    );
    assert!(journal.borrow().is_empty());
}
