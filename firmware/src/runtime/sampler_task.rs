use embassy_time::{Duration, Ticker};
use portable_atomic::{AtomicU8, Ordering};

use switchbank_core::buttons::Debouncer;

use crate::hw::ButtonBank;

const SAMPLE_PERIOD_MS: u64 = 10;

/// Samples the buttons on a fixed tick and publishes the debounced mask.
///
/// Runs unconditionally, including while a pulse holds the control task;
/// presses landing during a pulse are picked up on the next button poll.
#[embassy_executor::task]
pub async fn run(buttons: ButtonBank, mask: &'static AtomicU8) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_PERIOD_MS));
    let mut debouncer = Debouncer::new();

    loop {
        ticker.next().await;
        let snapshot = debouncer.sample(buttons.sample());
        mask.store(snapshot.bits(), Ordering::Relaxed);
    }
}
