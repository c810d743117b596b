//! Dual-channel LED head driver
//!
//! Hard and soft contrast channels share one PWM slice. Power values
//! follow the paper curve convention: 0 is full output, 255 is off, so
//! the duty cycle is the complement of the power byte.

use embassy_rp::pwm::{Config as PwmConfig, Pwm};

use fstop_core::traits::Lamp;

pub struct PwmLamp {
    pwm: Pwm<'static>,
    config: PwmConfig,
}

impl PwmLamp {
    /// Takes a slice configured with both outputs; `config.top` must
    /// be 255 so power bytes map directly onto compare values.
    pub fn new(pwm: Pwm<'static>, config: PwmConfig) -> Self {
        let mut lamp = Self { pwm, config };
        lamp.all_off();
        lamp
    }

    fn set(&mut self, hard_duty: u16, soft_duty: u16) {
        self.config.compare_a = hard_duty;
        self.config.compare_b = soft_duty;
        self.pwm.set_config(&self.config);
    }
}

impl Lamp for PwmLamp {
    fn expose_on(&mut self, hard_power: u8, soft_power: u8) {
        self.set(255 - u16::from(hard_power), 255 - u16::from(soft_power));
    }

    fn focus_on(&mut self) {
        // both channels at full for composing and focusing
        self.set(255, 255);
    }

    fn all_off(&mut self) {
        self.set(0, 0);
    }
}
