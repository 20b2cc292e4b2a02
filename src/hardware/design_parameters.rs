use acquisition::{
    AcquisitionConfig, BoardConfig, ConfigError, FilterConfig, Oversampling,
    SampleTime, SampleTimes,
};
use stm32h7xx_hal::time::Hertz;

/// The CPU core clock.
pub const SYSCLK: Hertz = Hertz::MHz(400);

/// The ADC kernel clock. Fixed frequency HSI routed through `per_ck`.
pub const ADC_KERNEL_CLOCK: Hertz = Hertz::MHz(64);

/// The counting frequency of the sampling timer.
pub const TIMER_FREQUENCY: Hertz = Hertz::MHz(100);

/// Sample sets per second.
pub const SAMPLE_RATE: u32 = 5_000;

/// Sample sets per ring buffer half.
// At 5 kHz one half is filled every 3.2 ms, which bounds the time to drain it.
pub const HALF_DEPTH: usize = 16;

/// Channels in the conversion sequence: three external inputs, temperature sensor and reference.
pub const CHANNELS: usize = 5;

/// Length of the DMA ring in results.
pub const RING_LEN: usize = CHANNELS * HALF_DEPTH * 2;

/// Every result accumulates 8 conversions, extending 12 bits to 15 bits.
pub const OVERSAMPLING: Oversampling = Oversampling { ratio: 8, shift: 0 };

/// Sequence position whose samples are captured for the periodic report.
pub const CHANNEL_OF_INTEREST: Option<usize> = Some(0);

/// Interval of the diagnostics report in milliseconds.
pub const REPORT_INTERVAL_MS: u32 = 500;

/// Second order highpass, `[b0, b1, b2, a1, a2]` with negated feedback coefficients.
pub const HIGHPASS: [f32; 5] = [
    0.988_906_64,
    -1.977_812_5,
    0.988_906_64,
    1.977_689_4,
    -0.977_936_36,
];

/// NUCLEO-H743ZI2: ADC3 inputs PF3 (INP5), PF4 (INP9) and PF5 (INP4).
pub const NUCLEO_H743: BoardConfig = BoardConfig {
    name: "nucleo-h743zi2",
    external_channels: &[5, 9, 4],
    temperature_sensor: 18,
    reference: 19,
    resolution_bits: 12,
    sample_times: SampleTimes {
        // 32.5 ADC clock cycles
        external: SampleTime(0b100),
        // 387.5 ADC clock cycles, the internal sources are high impedance.
        internal: SampleTime(0b110),
    },
    // adc_ext_trg11: TIM2_TRGO
    trigger_line: 11,
};

/// The acquisition configuration of the firmware.
pub fn acquisition_config() -> Result<AcquisitionConfig, ConfigError> {
    AcquisitionConfig::for_board(
        &NUCLEO_H743,
        SAMPLE_RATE,
        HALF_DEPTH,
        OVERSAMPLING,
        FilterConfig::new(&HIGHPASS, 1)?,
    )
}
