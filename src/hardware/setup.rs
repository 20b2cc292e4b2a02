//! Board hardware configuration
//!
//! This file contains all of the hardware-specific configuration of the acquisition board.
use core::sync::atomic::{AtomicBool, Ordering};

use stm32h7xx_hal::{self as hal, prelude::*, rcc::ResetEnable};

use super::{
    adc::InternalAdc, delay::AsmDelay, design_parameters, dma, timers, Systick,
};

/// The analog inputs of the board, owned so that no other driver reconfigures them.
pub struct AnalogInputs {
    pub in0: hal::gpio::gpiof::PF3<hal::gpio::Analog>,
    pub in1: hal::gpio::gpiof::PF4<hal::gpio::Analog>,
    pub in2: hal::gpio::gpiof::PF5<hal::gpio::Analog>,
}

/// The acquisition hardware, configured but idle.
pub struct AcquisitionDevices {
    pub trigger: timers::SamplingTimer,
    pub dma: dma::AdcDma,
    pub dma_events: dma::AdcDmaEvents,
    pub adc: InternalAdc,
    pub delay: AsmDelay,
    pub inputs: AnalogInputs,
    /// The red user LED, lit by the panic handler.
    pub led: hal::gpio::gpiob::PB14<hal::gpio::Output<hal::gpio::PushPull>>,
}

/// Configure the board hardware.
///
/// # Note
/// Clocks, logging and the monotonic timer are brought up here. The converter, DMA stream and
/// sampling timer are only clocked and handed out, their configuration is left to
/// [acquisition::AcquisitionController].
///
/// # Args
/// * `core` - The Cortex-M core peripherals.
/// * `device` - The microcontroller peripherals to be configured.
///
/// # Returns
/// The acquisition peripherals in a disabled state.
pub fn setup(
    mut core: hal::stm32::CorePeripherals,
    device: hal::stm32::Peripherals,
) -> AcquisitionDevices {
    // Set up RTT logging
    {
        // Enable debug during WFE/WFI-induced sleep
        device.DBGMCU.cr.modify(|_, w| w.dbgsleep_d1().set_bit());

        // Set up RTT channel to use for `rprintln!()` as "best effort".
        // This removes a critical section around the logging and thus allows
        // the DMA interrupt to always preempt at low latency.
        // If it preempts while we are logging something and logs itself,
        // its message will be lost.
        let channels = rtt_target::rtt_init_default!();
        // Note(unsafe): The closure we pass does not establish a critical section
        // as demanded but it does ensure synchronization and implements a lock.
        unsafe {
            rtt_target::set_print_channel_cs(
                channels.up.0,
                &((|arg, f| {
                    static LOCKED: AtomicBool = AtomicBool::new(false);
                    if LOCKED.compare_exchange_weak(
                        false,
                        true,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    ) == Ok(false)
                    {
                        f(arg);
                        LOCKED.store(false, Ordering::Release);
                    }
                }) as rtt_target::CriticalSectionFunc),
            );
        }

        static LOGGER: rtt_logger::RTTLogger =
            rtt_logger::RTTLogger::new(log::LevelFilter::Info);
        // A logger can only fail to install if one is installed already.
        log::set_logger(&LOGGER)
            .map(|()| log::set_max_level(log::LevelFilter::Trace))
            .ok();
        log::info!("Starting");
    }

    let pwr = device.PWR.constrain();
    let vos = pwr.freeze();

    // Clear reset flags.
    device.RCC.rsr.write(|w| w.rmvf().set_bit());

    // The internal ADC runs from per_ck.
    device.RCC.d3ccipr.modify(|_, w| w.adcsel().per());

    let rcc = device.RCC.constrain();
    let ccdr = rcc
        // 8 MHz from the ST-LINK MCO
        .bypass_hse()
        .use_hse(8.MHz())
        .sysclk(design_parameters::SYSCLK)
        .hclk(200.MHz())
        // Fixed frequency HSI, only used for the internal ADC.
        .per_ck(design_parameters::ADC_KERNEL_CLOCK)
        .freeze(vos, &device.SYSCFG);

    Systick::start(core.SYST, ccdr.clocks.sysclk().to_Hz());

    core.SCB.enable_icache();

    // The cycle counter times the DMA interrupt.
    core.DCB.enable_trace();
    core.DWT.enable_cycle_counter();

    let delay = AsmDelay::new(ccdr.clocks.c_ck().to_Hz());

    let gpiob = device.GPIOB.split(ccdr.peripheral.GPIOB);
    let gpiof = device.GPIOF.split(ccdr.peripheral.GPIOF);

    let mut led = gpiob.pb14.into_push_pull_output();
    led.set_low();

    let inputs = AnalogInputs {
        in0: gpiof.pf3.into_analog(),
        in1: gpiof.pf4.into_analog(),
        in2: gpiof.pf5.into_analog(),
    };

    // Configure timer 2 to trigger conversions for the ADC
    let trigger = {
        // The timer frequency is manually adjusted by the sampling timer, so the 1KHz setting
        // here is a dont-care.
        let timer2 =
            device
                .TIM2
                .timer(1.kHz(), ccdr.peripheral.TIM2, &ccdr.clocks);
        timers::SamplingTimer::new(timer2)
    };

    let adc = {
        ccdr.peripheral.ADC3.enable().reset();
        InternalAdc::new(device.ADC3, device.ADC3_COMMON)
    };

    let dma = {
        ccdr.peripheral.DMA1.enable().reset();
        dma::AdcDma::new(
            device.DMA1,
            device.DMAMUX1,
            adc.data_register_address(),
        )
    };

    // Note(unsafe): The event handle is only constructed once, here.
    let dma_events = unsafe { dma::AdcDmaEvents::new() };

    log::info!("setup() complete");

    AcquisitionDevices {
        trigger,
        dma,
        dma_events,
        adc,
        delay,
        inputs,
        led,
    }
}
