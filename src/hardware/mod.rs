///! Module for all hardware-specific setup of the acquisition board
pub use stm32h7xx_hal as hal;

pub mod adc;
pub mod delay;
pub mod design_parameters;
pub mod dma;
pub mod setup;
pub mod timers;

pub use adc::InternalAdc;
pub use delay::AsmDelay;
pub use dma::{AdcDma, AdcDmaEvents};
pub use timers::SamplingTimer;

/// The frequency of the RTIC monotonic timer.
pub const MONOTONIC_FREQUENCY: u32 = 1_000;
rtic_monotonics::systick_monotonic!(Systick, MONOTONIC_FREQUENCY);

#[cfg(target_os = "none")]
#[inline(never)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    use core::{
        fmt::Write,
        sync::atomic::{AtomicBool, Ordering},
    };
    use cortex_m::asm;
    use rtt_target::{ChannelMode, UpChannel};

    cortex_m::interrupt::disable();

    // Recursion protection
    static PANICKED: AtomicBool = AtomicBool::new(false);
    while PANICKED.load(Ordering::Relaxed) {
        asm::bkpt();
    }
    PANICKED.store(true, Ordering::Relaxed);

    // Stop conversions so the ring is left as it was at the time of the panic.
    let tim2 = unsafe { &*hal::stm32::TIM2::ptr() };
    tim2.cr1.modify(|_, w| w.cen().clear_bit());

    // Turn on the red user LED (LD3, PB14)
    let gpiob = unsafe { &*hal::stm32::GPIOB::ptr() };
    gpiob.odr.modify(|_, w| w.odr14().high());

    // Analogous to panic-rtt-target
    if let Some(mut channel) = unsafe { UpChannel::conjure(0) } {
        channel.set_mode(ChannelMode::BlockIfFull);
        writeln!(channel, "{}", info).ok();
    }

    // Abort
    asm::udf();
}

#[cfg(target_os = "none")]
#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    panic!("HardFault at {:#?}", ef);
}

#[cfg(target_os = "none")]
#[cortex_m_rt::exception]
unsafe fn DefaultHandler(irqn: i16) {
    panic!("Unhandled exception (IRQn = {})", irqn);
}
