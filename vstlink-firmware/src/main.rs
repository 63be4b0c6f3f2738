//! VSTLINK receiver station firmware
//!
//! Receives detection metadata and JPEG stills from a vision producer over
//! a single UART, answers every frame with ACK or NACK, stores verified
//! stills in a flash slot ring and pulses an LED per detection class.

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embedded_alloc::LlffHeap as Heap;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use vstlink_core::indicator::IndicatorBank;
use vstlink_hal_rp2040::flash::Rp2040FlashStorage;
use vstlink_hal_rp2040::gpio::LedOutput;
use vstlink_hal_rp2040::image_store::ImageStore;
use vstlink_hal_rp2040::time::EmbassyClock;
use vstlink_hal_rp2040::Polarity;

use crate::config::{log_config_summary, ConfigPersistence};

// Heap for frame bodies and decoded images
#[global_allocator]
static HEAP: Heap = Heap::empty();

// One base64 body (up to 96KB) plus its decoded JPEG
const HEAP_SIZE: usize = 192 * 1024;

/// Embedded default configuration (compiled into firmware)
/// Edit link.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../link.toml");

mod channels;
mod config;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// UART buffers (must live forever). RX holds a few poll windows at 921600 baud.
static TX_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 4096]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("VSTLINK receiver starting...");

    init_heap();

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Config first, then the same flash driver backs the image ring
    let mut persistence = ConfigPersistence::new(Rp2040FlashStorage::new(p.FLASH, p.DMA_CH0));
    let (config, source) = persistence.resolve(EMBEDDED_CONFIG).await;
    log_config_summary(&config, source);
    let image_store = ImageStore::open(persistence.into_storage()).await;
    info!("Image store opened at cursor {}", image_store.cursor());

    let mut uart_config = UartConfig::default();
    uart_config.baudrate = config.transport.baud_rate;

    let tx_buf = TX_BUF.init([0u8; 64]);
    let rx_buf = RX_BUF.init([0u8; 4096]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();

    info!("Link UART initialized at {} baud", config.transport.baud_rate);

    // Indicator LEDs on GPIO2..4
    let polarity = if config.indicator.active_low {
        Polarity::ActiveLow
    } else {
        Polarity::ActiveHigh
    };
    let leds = [
        LedOutput::new(p.PIN_2, polarity),
        LedOutput::new(p.PIN_3, polarity),
        LedOutput::new(p.PIN_4, polarity),
    ];
    let indicators = IndicatorBank::from_config(leds, &config.indicator, EmbassyClock);

    spawner
        .spawn(tasks::link_rx_task(rx, config.receiver, config.transport.rx_poll_ms))
        .unwrap();
    spawner.spawn(tasks::link_tx_task(tx)).unwrap();
    spawner.spawn(tasks::storage_task(image_store)).unwrap();
    spawner.spawn(tasks::indicator_task(indicators)).unwrap();

    info!("All tasks spawned");
}

fn init_heap() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    #[allow(static_mut_refs)]
    unsafe {
        HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
    }
}
