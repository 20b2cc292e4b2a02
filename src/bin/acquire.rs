//! # Continuous acquisition
//!
//! Samples three analog inputs, the die temperature sensor and the internal reference of ADC3 at
//! 5 kHz with 8x hardware oversampling and highpass filters every channel.
//!
//! ## Timing
//! TIM2 triggers one conversion sequence per sample period. DMA1 stream 0 moves the results into
//! a circular ring in AXI SRAM and interrupts once each half has been filled. The interrupt handler
//! only acknowledges the stream and posts the event, the filters run in a software task at lower
//! priority. Every half has to be drained before the DMA engine comes back to it, within 3.2 ms.
//!
//! ## Telemetry
//! Interrupt counts, errors, the duration of the last interrupt and the latest sample of the
//! channel of interest are logged over RTT twice per second.
#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

use kadc::hardware::design_parameters;

#[cfg(target_os = "none")]
use acquisition::{Diagnostics, LatestSamples, Notification, SampleRing};

/// Completion events from the DMA interrupt to the processing task.
#[cfg(target_os = "none")]
static NOTIFICATION: Notification = Notification::new();

#[cfg(target_os = "none")]
static DIAGNOSTICS: Diagnostics = Diagnostics::new();

/// Latest filter output per sequence position.
#[cfg(target_os = "none")]
static LATEST: LatestSamples = LatestSamples::new();

// The DMA target. AXI SRAM is not initialized on boot, the contents are undefined until the
// first half has been written.
#[cfg(target_os = "none")]
#[link_section = ".axisram.buffers"]
static RING: SampleRing<{ design_parameters::RING_LEN }> = SampleRing::new();

#[cfg(not(target_os = "none"))]
fn main() {
    let config = design_parameters::acquisition_config().unwrap();
    println!(
        "{}",
        serde_json_core::to_string::<_, 2048>(&config).unwrap()
    );
    println!(
        "half period: {} us, full scale: {}",
        config.half_period_us(),
        config.full_scale()
    );
}

#[cfg(target_os = "none")]
#[rtic::app(device = kadc::hardware::hal::stm32, peripherals = true, dispatchers=[DCMI, JPEG, LTDC, SDMMC])]
mod app {
    use super::*;

    use acquisition::{
        AcquisitionController, CalibrationFactor, CompletionNotifier,
        SampleProcessor,
    };
    use cortex_m::peripheral::DWT;
    use fugit::ExtU32;
    use kadc::hardware::{
        hal,
        setup::{self, AnalogInputs},
        AdcDma, AdcDmaEvents, AsmDelay, InternalAdc, SamplingTimer, Systick,
    };

    type Controller = AcquisitionController<SamplingTimer, AdcDma, InternalAdc>;
    type Processor = SampleProcessor<
        'static,
        &'static LatestSamples,
        { design_parameters::RING_LEN },
    >;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        dma_events: AdcDmaEvents,
        controller: Controller,
        processor: Processor,
        delay: AsmDelay,
        calibration: Option<CalibrationFactor>,
        inputs: AnalogInputs,
        led: hal::gpio::gpiob::PB14<hal::gpio::Output<hal::gpio::PushPull>>,
    }

    #[init]
    fn init(c: init::Context) -> (Shared, Local) {
        // Configure the microcontroller
        let devices = setup::setup(c.core, c.device);

        let controller = AcquisitionController::new(
            devices.trigger,
            devices.dma,
            devices.adc,
        );
        let processor =
            SampleProcessor::new(&RING, &NOTIFICATION, &DIAGNOSTICS, &LATEST);

        let local = Local {
            dma_events: devices.dma_events,
            controller,
            processor,
            delay: devices.delay,
            calibration: None,
            inputs: devices.inputs,
            led: devices.led,
        };

        acquire::spawn().unwrap();
        report::spawn().unwrap();

        (Shared {}, local)
    }

    /// Bring up the converter and drain the ring until stopped.
    ///
    /// Setup failures are fatal: without a calibrated and responsive converter there is nothing
    /// to acquire.
    #[task(priority = 2, local = [controller, processor, delay, calibration])]
    async fn acquire(c: acquire::Context) {
        let acquire::LocalResources {
            controller,
            processor,
            delay,
            calibration,
            ..
        } = c.local;

        let config = match design_parameters::acquisition_config() {
            Ok(config) => config,
            Err(err) => panic!("Invalid acquisition configuration: {err}"),
        };
        DIAGNOSTICS.set_channel_of_interest(
            design_parameters::CHANNEL_OF_INTEREST,
            config.channels.len(),
        );
        if let Err(err) =
            processor.setup(controller, &config, calibration, delay)
        {
            panic!("Acquisition setup failed: {err}");
        }

        processor.run().await;
    }

    /// Acknowledge the DMA stream and wake the processing task.
    #[task(binds = DMA1_STR0, local = [dma_events], priority = 3)]
    fn dma_complete(c: dma_complete::Context) {
        let start = DWT::cycle_count();
        CompletionNotifier::new(&NOTIFICATION, &DIAGNOSTICS)
            .on_interrupt(c.local.dma_events);
        DIAGNOSTICS.record_isr_cycles(DWT::cycle_count().wrapping_sub(start));
    }

    #[task(priority = 1, local = [inputs, led])]
    async fn report(_c: report::Context) {
        loop {
            Systick::delay(design_parameters::REPORT_INTERVAL_MS.millis())
                .await;

            let report = DIAGNOSTICS.report();
            match serde_json_core::to_string::<_, 256>(&report) {
                Ok(json) => log::info!("{}", json.as_str()),
                Err(err) => log::warn!("Failed to serialize report: {err:?}"),
            }

            let latest: heapless::Vec<f32, { design_parameters::CHANNELS }> =
                (0..design_parameters::CHANNELS)
                    .map(|position| LATEST.get(position).unwrap_or(f32::NAN))
                    .collect();
            log::info!("Latest: {:?}", latest.as_slice());
        }
    }
}
