//! HD44780 20x4 character display over a 4-bit GPIO bus
//!
//! Bus errors are swallowed: a display that has come loose must not
//! stop an exposure in progress. The backlight is a separate PWM
//! output so it can be dimmed for darkroom use.

use embassy_rp::gpio::Output;
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_time::Delay;
use hd44780_driver::bus::FourBitBus;
use hd44780_driver::{Cursor, CursorBlink, Display, DisplayMode, HD44780};

use fstop_core::traits::TextDisplay;

type Pin = Output<'static>;
type Bus = FourBitBus<Pin, Pin, Pin, Pin, Pin, Pin>;

/// DDRAM base address of each row on a 20x4 panel
const ROW_ADDR: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

pub struct Lcd {
    lcd: Option<HD44780<Bus>>,
    delay: Delay,
    backlight: Pwm<'static>,
    backlight_config: PwmConfig,
}

impl Lcd {
    pub fn new(
        rs: Pin,
        en: Pin,
        d4: Pin,
        d5: Pin,
        d6: Pin,
        d7: Pin,
        backlight: Pwm<'static>,
        backlight_config: PwmConfig,
    ) -> Self {
        let mut delay = Delay;
        let lcd = match HD44780::new_4bit(rs, en, d4, d5, d6, d7, &mut delay) {
            Ok(mut lcd) => {
                let _ = lcd.reset(&mut delay);
                let _ = lcd.clear(&mut delay);
                let _ = lcd.set_display_mode(
                    DisplayMode {
                        display: Display::On,
                        cursor_visibility: Cursor::Invisible,
                        cursor_blink: CursorBlink::Off,
                    },
                    &mut delay,
                );
                Some(lcd)
            }
            Err(_) => None,
        };

        Self {
            lcd,
            delay,
            backlight,
            backlight_config,
        }
    }
}

impl TextDisplay for Lcd {
    fn clear(&mut self) {
        if let Some(lcd) = self.lcd.as_mut() {
            let _ = lcd.clear(&mut self.delay);
        }
    }

    fn text(&mut self, row: u8, col: u8, text: &str) {
        if let Some(lcd) = self.lcd.as_mut() {
            let addr = ROW_ADDR[usize::from(row) % ROW_ADDR.len()] + col;
            let _ = lcd.set_cursor_pos(addr, &mut self.delay);
            let _ = lcd.write_str(text, &mut self.delay);
        }
    }

    fn set_backlight(&mut self, level: u8) {
        // 0..=8 maps onto the full duty range; 9 * 32 overshoots top,
        // which the slice treats as always-on
        self.backlight_config.compare_b = u16::from(level.min(8)) * 32;
        self.backlight.set_config(&self.backlight_config);
    }
}
