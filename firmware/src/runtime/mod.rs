use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use portable_atomic::AtomicU8;

use crate::hw::{ButtonBank, RelayBench};

mod control_task;
mod sampler_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Debounced button snapshot published by the sampler, consumed by the
/// control task. Bit 0 is P1.
static BUTTON_MASK: AtomicU8 = AtomicU8::new(0);

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA2,
        PA3,
        PA6,
        PA7,
        PB0,
        PB1,
        PB2,
        PB3,
        PB4,
        PB5,
        PB6,
        PB7,
        PC6,
        PC7,
        PC8,
        PC9,
        USART2,
        ..
    } = hal::init(config);

    // Coils idle released and indicators dark until the first refresh.
    let bench = RelayBench::new(
        [
            Output::new(PA0, Level::Low, Speed::Low),
            Output::new(PA6, Level::Low, Speed::Low),
            Output::new(PB0, Level::Low, Speed::Low),
            Output::new(PB2, Level::Low, Speed::Low),
        ],
        [
            Output::new(PA1, Level::Low, Speed::Low),
            Output::new(PA7, Level::Low, Speed::Low),
            Output::new(PB1, Level::Low, Speed::Low),
            Output::new(PB3, Level::Low, Speed::Low),
        ],
        [
            Output::new(PB4, Level::Low, Speed::Low),
            Output::new(PB5, Level::Low, Speed::Low),
            Output::new(PB6, Level::Low, Speed::Low),
            Output::new(PB7, Level::Low, Speed::Low),
        ],
    );

    let buttons = ButtonBank::new([
        Input::new(PC6, Pull::Up),
        Input::new(PC7, Pull::Up),
        Input::new(PC8, Pull::Up),
        Input::new(PC9, Pull::Up),
    ]);

    spawner
        .spawn(sampler_task::run(buttons, &BUTTON_MASK))
        .expect("failed to spawn button sampler task");

    spawner
        .spawn(control_task::run(USART2, PA2, PA3, bench, &BUTTON_MASK))
        .expect("failed to spawn control task");

    core::future::pending::<()>().await;
}
