#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use acquisition::{
    AcquisitionConfig, AcquisitionController, BoardConfig, CalibrationFactor,
    ConfigError, Converter, DmaEvents, DmaFlags, DmaStream, DmaTransfer,
    FilterConfig, Half, Oversampling, SampleRing, SampleSink, SampleTime,
    SampleTimes, SampleTrigger, TriggerEdge,
};
use embedded_hal::delay::DelayNs;
use fugit::HertzU32;

pub const HIGHPASS: [f32; 5] = [
    0.988_906_64,
    -1.977_812_5,
    0.988_906_64,
    1.977_689_4,
    -0.977_936_36,
];

pub const BOARD: BoardConfig = BoardConfig {
    name: "mock",
    external_channels: &[5, 9, 4],
    temperature_sensor: 18,
    reference: 19,
    resolution_bits: 12,
    sample_times: SampleTimes {
        external: SampleTime(4),
        internal: SampleTime(6),
    },
    trigger_line: 11,
};

pub const SAMPLE_RATE: u32 = 5000;
pub const HALF_DEPTH: usize = 16;
pub const CHANNELS: usize = 5;
pub const RING_LEN: usize = CHANNELS * HALF_DEPTH * 2;

/// 5 kHz, 16 deep halves, 12 bit 8x oversampled: 15 bit results.
pub fn config() -> AcquisitionConfig {
    AcquisitionConfig::for_board(
        &BOARD,
        SAMPLE_RATE,
        HALF_DEPTH,
        Oversampling { ratio: 8, shift: 0 },
        FilterConfig::new(&HIGHPASS, 1).unwrap(),
    )
    .unwrap()
}

pub fn ring<const LEN: usize>() -> &'static SampleRing<LEN> {
    Box::leak(Box::new(SampleRing::new()))
}

/// Write a half the way the DMA engine would.
pub fn write_half<const LEN: usize>(
    ring: &'static SampleRing<LEN>,
    half: Half,
    value: impl Fn(usize) -> u16,
) {
    let target = ring.dma_target();
    let offset = match half {
        Half::First => 0,
        Half::Second => LEN / 2,
    };
    for i in 0..LEN / 2 {
        unsafe {
            target
                .address
                .add(offset + i)
                .write_volatile(value(offset + i))
        };
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    TriggerConfigure(u32),
    TriggerStart,
    DmaRoute,
    DmaClear,
    DmaConfigure {
        len: usize,
        circular: bool,
        interrupts: u8,
    },
    DmaEnable,
    PowerUp,
    Delay(u32),
    StartCalibration,
    LoadCalibration(u32),
    ClearReady,
    Enable,
    InternalChannels(bool, bool),
    SampleTime(u8, u8),
    Resolution(u8),
    Oversampling(u16, u8),
    ExternalTrigger(u8, TriggerEdge),
    Sequence(Vec<u8>),
    AdcStart,
}

pub type Journal = Rc<RefCell<Vec<Op>>>;

pub struct MockTrigger {
    pub journal: Journal,
}

impl SampleTrigger for MockTrigger {
    fn configure(&mut self, rate: HertzU32) -> Result<(), ConfigError> {
        self.journal
            .borrow_mut()
            .push(Op::TriggerConfigure(rate.raw()));
        Ok(())
    }

    fn start(&mut self) {
        self.journal.borrow_mut().push(Op::TriggerStart);
    }
}

pub struct MockDma {
    pub journal: Journal,
}

impl DmaStream for MockDma {
    fn route_to_converter(&mut self) {
        self.journal.borrow_mut().push(Op::DmaRoute);
    }

    fn clear_flags(&mut self) {
        self.journal.borrow_mut().push(Op::DmaClear);
    }

    fn configure(&mut self, transfer: &DmaTransfer) {
        self.journal.borrow_mut().push(Op::DmaConfigure {
            len: transfer.target.len,
            circular: transfer.circular,
            interrupts: transfer.interrupts.raw_value(),
        });
    }

    fn enable(&mut self) {
        self.journal.borrow_mut().push(Op::DmaEnable);
    }
}

pub struct MockConverter {
    pub journal: Journal,
    /// Polls until calibration ends. `None` never ends.
    pub calibration_polls: Option<u32>,
    /// Polls until ready. `None` never becomes ready.
    pub ready_polls: Option<u32>,
    pub factor: u32,
    pub calibration_starts: Rc<RefCell<u32>>,
    polls: u32,
}

impl MockConverter {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            calibration_polls: Some(3),
            ready_polls: Some(2),
            factor: 0x1234,
            calibration_starts: Rc::new(RefCell::new(0)),
            polls: 0,
        }
    }

    fn log(&self, op: Op) {
        self.journal.borrow_mut().push(op);
    }

    fn poll(&mut self, limit: Option<u32>) -> bool {
        self.polls += 1;
        limit.is_some_and(|limit| self.polls >= limit)
    }
}

impl Converter for MockConverter {
    fn power_up(&mut self) {
        self.log(Op::PowerUp);
    }

    fn start_calibration(&mut self) {
        *self.calibration_starts.borrow_mut() += 1;
        self.polls = 0;
        self.log(Op::StartCalibration);
    }

    fn is_calibrating(&mut self) -> bool {
        !self.poll(self.calibration_polls)
    }

    fn calibration_factor(&mut self) -> CalibrationFactor {
        CalibrationFactor(self.factor)
    }

    fn load_calibration_factor(&mut self, factor: CalibrationFactor) {
        self.log(Op::LoadCalibration(factor.0));
    }

    fn clear_ready(&mut self) {
        self.log(Op::ClearReady);
    }

    fn enable(&mut self) {
        self.polls = 0;
        self.log(Op::Enable);
    }

    fn is_ready(&mut self) -> bool {
        self.poll(self.ready_polls)
    }

    fn enable_internal_channels(&mut self, temperature: bool, reference: bool) {
        self.log(Op::InternalChannels(temperature, reference));
    }

    fn set_sample_time(
        &mut self,
        channel: u8,
        time: SampleTime,
    ) -> Result<(), ConfigError> {
        self.log(Op::SampleTime(channel, time.0));
        Ok(())
    }

    fn set_resolution(&mut self, bits: u8) -> Result<(), ConfigError> {
        self.log(Op::Resolution(bits));
        Ok(())
    }

    fn set_oversampling(
        &mut self,
        ratio: u16,
        shift: u8,
    ) -> Result<(), ConfigError> {
        self.log(Op::Oversampling(ratio, shift));
        Ok(())
    }

    fn set_external_trigger(
        &mut self,
        line: u8,
        edge: TriggerEdge,
    ) -> Result<(), ConfigError> {
        self.log(Op::ExternalTrigger(line, edge));
        Ok(())
    }

    fn set_sequence(&mut self, channels: &[u8]) -> Result<(), ConfigError> {
        self.log(Op::Sequence(channels.to_vec()));
        Ok(())
    }

    fn start(&mut self) {
        self.log(Op::AdcStart);
    }
}

pub type MockController =
    AcquisitionController<MockTrigger, MockDma, MockConverter>;

pub fn controller() -> (MockController, Journal) {
    let journal = Journal::default();
    let controller = AcquisitionController::new(
        MockTrigger {
            journal: journal.clone(),
        },
        MockDma {
            journal: journal.clone(),
        },
        MockConverter::new(journal.clone()),
    );
    (controller, journal)
}

pub struct MockDelay {
    pub journal: Journal,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.journal.borrow_mut().push(Op::Delay(ns));
    }
}

/// Pending stream flags, cleared on acknowledge.
#[derive(Default)]
pub struct MockDmaEvents {
    pub pending: u8,
    pub acknowledged: u32,
}

impl MockDmaEvents {
    pub fn raise(&mut self, flags: DmaFlags) {
        self.pending |= flags.raw_value();
    }
}

impl DmaEvents for MockDmaEvents {
    fn pending(&mut self) -> DmaFlags {
        DmaFlags::new_with_raw_value(self.pending)
    }

    fn acknowledge(&mut self, flags: DmaFlags) {
        self.pending &= !flags.raw_value();
        self.acknowledged += 1;
    }
}

/// Counts samples per sequence position and keeps the latest output.
#[derive(Default)]
pub struct CountingSink {
    pub feeds: [usize; CHANNELS],
    pub first: [Option<f32>; CHANNELS],
    pub last: [Option<f32>; CHANNELS],
}

impl SampleSink for CountingSink {
    fn emit(&mut self, position: usize, _raw: u16, filtered: Option<f32>) {
        self.feeds[position] += 1;
        if self.first[position].is_none() {
            self.first[position] = filtered;
        }
        self.last[position] = filtered;
    }
}
