//! F-Stop - Darkroom Enlarger Timer Firmware
//!
//! Main firmware binary for RP2040-based enlarger timers. Drives a
//! dual-channel (hard/soft contrast) LED head, a 20x4 character
//! display, a 4x4 keypad with rotary encoder and footswitch, and a
//! checksummed serial link to a host.
//!
//! All timing-critical work happens synchronously inside the state
//! machine's poll; the only spawned task decodes the rotary encoder
//! from edge interrupts so detents are never lost while the main loop
//! is busy repainting the display.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_futures::select::select;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::UART0;
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_time::Timer;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use fstop_core::encoder::{DeltaAccumulator, Quadrature};
use fstop_core::machine::Machine;

use crate::board::{FlashEeprom, HostSerial, Keypad, Lcd, PwmLamp, WallClock};

mod board;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Detents accumulated by the encoder task, drained by the menu code
static ROTARY: DeltaAccumulator = DeltaAccumulator::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("F-Stop firmware starting...");

    let p = embassy_rp::init(Default::default());

    // Host link on UART0, 115200 baud default
    let uart_config = UartConfig::default();
    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let serial = HostSerial::new(uart);
    info!("Host UART initialized");

    // Keypad matrix: rows driven, columns read through pull-downs
    let rows = [
        Output::new(p.PIN_2, Level::Low),
        Output::new(p.PIN_3, Level::Low),
        Output::new(p.PIN_4, Level::Low),
        Output::new(p.PIN_5, Level::Low),
    ];
    let cols = [
        Input::new(p.PIN_6, Pull::Down),
        Input::new(p.PIN_7, Pull::Down),
        Input::new(p.PIN_8, Pull::Down),
        Input::new(p.PIN_9, Pull::Down),
    ];
    // footswitch closes to ground
    let button = Input::new(p.PIN_10, Pull::Up);
    let controls = Keypad::new(rows, cols, button);

    // Rotary encoder, decoded in its own task from edge interrupts
    let enc_a = Input::new(p.PIN_11, Pull::Up);
    let enc_b = Input::new(p.PIN_12, Pull::Up);
    spawner.spawn(encoder_task(enc_a, enc_b)).unwrap();

    // LED head: hard and soft channels share PWM slice 7
    let mut lamp_config = PwmConfig::default();
    lamp_config.top = 255;
    lamp_config.compare_a = 0;
    lamp_config.compare_b = 0;
    let lamp_pwm = Pwm::new_output_ab(p.PWM_SLICE7, p.PIN_14, p.PIN_15, lamp_config.clone());
    let lamp = PwmLamp::new(lamp_pwm, lamp_config);

    // Display backlight on PWM, so it can be dimmed for the darkroom
    let mut backlight_config = PwmConfig::default();
    backlight_config.top = 255;
    backlight_config.compare_b = 0;
    let backlight_pwm = Pwm::new_output_b(p.PWM_SLICE6, p.PIN_13, backlight_config.clone());

    let display = Lcd::new(
        Output::new(p.PIN_18, Level::Low),
        Output::new(p.PIN_19, Level::Low),
        Output::new(p.PIN_20, Level::Low),
        Output::new(p.PIN_21, Level::Low),
        Output::new(p.PIN_22, Level::Low),
        Output::new(p.PIN_26, Level::Low),
        backlight_pwm,
        backlight_config,
    );
    info!("Display initialized");

    // Settings and program slots, mirrored from the last flash sector
    let eeprom = FlashEeprom::new(p.FLASH);

    let mut machine = Machine::new(display, controls, &ROTARY, lamp, WallClock, serial, eeprom);
    machine.begin();
    info!("Timer running");

    loop {
        machine.poll();
        machine.storage_mut().flush();
        Timer::after_millis(2).await;
    }
}

/// Decode the quadrature encoder from pin edges into detent counts
#[embassy_executor::task]
async fn encoder_task(mut a: Input<'static>, mut b: Input<'static>) {
    let mut quad = Quadrature::new(a.is_high(), b.is_high());
    loop {
        select(a.wait_for_any_edge(), b.wait_for_any_edge()).await;
        let detents = quad.update(a.is_high(), b.is_high());
        if detents != 0 {
            trace!("encoder moved {}", detents);
            ROTARY.add(detents);
        }
    }
}
