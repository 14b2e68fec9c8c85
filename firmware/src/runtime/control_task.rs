use embassy_futures::select::{Either, select};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{
    BufferedUart, Config as UartConfig, DataBits, Error as UartError, Parity, StopBits,
};
use embassy_time::{Duration, Ticker, Timer};
use embedded_io_async::{Read, Write};
use heapless::String;
use portable_atomic::{AtomicU8, Ordering};
use static_cell::StaticCell;

use switchbank_core::buttons::ButtonBitmask;
use switchbank_core::controller::{Controller, PulsePlan, SerialOutcome, write_banner};
use switchbank_core::protocol::TransportError;

use crate::hw::RelayBench;

const CONSOLE_BAUD: u32 = 9_600;
const UART_BUFFER_SIZE: usize = 64;
const BUTTON_POLL_MS: u64 = 5;
const RESPONSE_CAPACITY: usize = 128;

static UART_TX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART2_LPUART2 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART2>;
});

/// Owns the console UART and the relay bench.
///
/// Serial bytes and button snapshots are multiplexed into one loop, so an
/// actuation pulse blocks both sources until its coil is released.
#[embassy_executor::task]
pub async fn run(
    usart: Peri<'static, hal::peripherals::USART2>,
    tx_pin: Peri<'static, hal::peripherals::PA2>,
    rx_pin: Peri<'static, hal::peripherals::PA3>,
    bench: RelayBench,
    buttons: &'static AtomicU8,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = CONSOLE_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        UART_TX_BUFFER.init([0; UART_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; UART_BUFFER_SIZE]),
        UartIrqs,
        config,
    )
    .expect("failed to initialize console UART");

    let (mut uart_tx, mut uart_rx) = uart.split();

    let mut controller = Controller::new(bench);
    let mut response: String<RESPONSE_CAPACITY> = String::new();

    if write_banner(&mut response).is_err() {
        defmt::warn!("console: banner formatting failed");
    }
    send(&mut uart_tx, &mut response).await;
    defmt::info!("console: ready at {} baud", CONSOLE_BAUD);

    let mut ticker = Ticker::every(Duration::from_millis(BUTTON_POLL_MS));
    let mut ingress = [0u8; 1];

    loop {
        match select(uart_rx.read(&mut ingress), ticker.next()).await {
            Either::First(Ok(count)) if count > 0 => {
                match controller.on_serial_byte(ingress[0], &mut response) {
                    Ok(SerialOutcome::Pulse(plan)) => {
                        run_pulse(&mut controller, plan, &mut response).await;
                    }
                    Ok(SerialOutcome::Overflow) => {
                        defmt::warn!("console: over-length line rejected");
                    }
                    Ok(_) => {}
                    Err(_) => defmt::warn!("console: response formatting failed"),
                }
            }
            Either::First(Ok(_)) => {}
            Either::First(Err(error)) => {
                let fault = match error {
                    UartError::Overrun => TransportError::Overrun,
                    _ => TransportError::Framing,
                };
                defmt::warn!("console: UART receive fault");
                if controller.on_transport_error(fault, &mut response).is_err() {
                    defmt::warn!("console: response formatting failed");
                }
            }
            Either::Second(()) => {
                let snapshot = ButtonBitmask::from_bits(buttons.load(Ordering::Relaxed));
                for plan in controller.on_buttons(snapshot) {
                    run_pulse(&mut controller, plan, &mut response).await;
                }
                controller.refresh_indicators();
            }
        }

        send(&mut uart_tx, &mut response).await;
    }
}

/// Energizes, holds for the configured switch time, releases, commits.
async fn run_pulse(
    controller: &mut Controller<RelayBench>,
    plan: PulsePlan,
    response: &mut String<RESPONSE_CAPACITY>,
) {
    controller.begin_pulse(plan);
    Timer::after(Duration::from_millis(u64::from(plan.hold_ms))).await;
    if controller.finish_pulse(plan, response).is_err() {
        defmt::warn!("console: response formatting failed");
    }
}

/// Flushes any accumulated response text out the UART.
async fn send<W: Write>(uart_tx: &mut W, response: &mut String<RESPONSE_CAPACITY>) {
    if response.is_empty() {
        return;
    }

    if uart_tx.write_all(response.as_bytes()).await.is_err() {
        defmt::warn!("console: UART write error");
    } else if uart_tx.flush().await.is_err() {
        defmt::warn!("console: UART flush error");
    }

    response.clear();
}
