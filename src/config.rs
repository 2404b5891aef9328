// SPDX-License-Identifier: Apache-2.0

//! Compile-time configuration: sensor constants, steering gains and loop timing.
//!
//! Nothing here is runtime-configurable. Alternate tunings are selected with Cargo features.
//!
//! ## Pin map
//!
//! The binary claims these pins by their typed `rp2040_hal` names.
//!
//! | Signal | Pin | Function |
//! | ------ | --- | -------- |
//! | Left motor PH | GP16 | push-pull output |
//! | Left motor EN | GP17 | PWM slice 0, channel B |
//! | Right motor PH | GP18 | push-pull output |
//! | Right motor EN | GP19 | PWM slice 1, channel B |
//! | Pixy2 SDA | GP20 | I2C0, pull-up |
//! | Pixy2 SCL | GP21 | I2C0, pull-up |
//!
//! The DRV8835 runs in PH/EN mode (MODE pin tied high).

use crate::time::Duration;

/// PWM counter wrap for the enable pins (0-255 duty range). Speeds are written to the PWM level
/// as-is, so this is also the speed that gives full duty.
pub const MOTOR_PWM_TOP: u16 = 255;

// Pixy2 on I2C0
/// Bus clock
pub const I2C_FREQ_HZ: u32 = 400_000;
/// 7-bit I2C address of the Pixy2
pub const PIXY2_I2C_ADDRESS: u8 = 0x54;

/// Horizontal field width reported by the line tracker, in pixels
pub const FRAME_WIDTH: u8 = 160;
/// Vertical field height reported by the line tracker, in pixels
pub const FRAME_HEIGHT: u8 = 120;
/// Centre column used for the offset percentage
pub const FRAME_CENTER: i32 = FRAME_WIDTH as i32 / 2 - 1;

/// Forward speed when the line is centred
pub const BASE_SPEED: i32 = 100;
/// Output clamp for either side
pub const MAX_SPEED: i32 = 300;
/// Smallest nonzero speed that still overcomes drivetrain friction
pub const MIN_SPEED: i32 = 40;
/// Spin speed while searching for a lost line
pub const SEARCH_SPEED: i32 = BASE_SPEED / 2;

/// Proportional steering gain
#[cfg(not(feature = "soft_steering"))]
pub const KP: Gain = Gain::new(5, 1);
/// Proportional steering gain
#[cfg(feature = "soft_steering")]
pub const KP: Gain = Gain::new(3, 10);

/// Added to every line offset to correct for camera mounting bias, in percent
pub const LINE_CENTER_OFFSET: i32 = 70;

/// Pause between control ticks
pub const MAIN_LOOP_DELAY_MS: u32 = 20;
/// A search lasting longer than this stops the motors and restarts the sweep
pub const SEARCH_TIMEOUT_MS: u32 = 2000;
/// Time spent spinning one way before the search reverses direction
pub const SEARCH_FLIP_MS: u32 = 1000;
/// How long the motors stay stopped after a search timeout
pub const SEARCH_STOP_HOLD_MS: u32 = 1000;
/// Delay between a successful sensor handshake and the first control tick
pub const STARTUP_DELAY_MS: u32 = 2000;

/// Integer gain expressed as `num / den`.
///
/// Lets fractional gains such as 0.3 run without floating point: `apply(71)` with `3/10` gives 21.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gain {
    /// Numerator
    num: i32,
    /// Denominator, never zero
    den: i32,
}

impl Gain {
    /// Create a gain of `num / den`. A zero denominator is treated as 1.
    pub const fn new(num: i32, den: i32) -> Self {
        Self {
            num,
            den: if den == 0 { 1 } else { den },
        }
    }

    /// Scale `value` by the gain, truncating toward zero.
    pub const fn apply(&self, value: i32) -> i32 {
        value.saturating_mul(self.num) / self.den
    }
}

/// Everything the steering controller needs, bundled so tests can build alternate tunings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SteeringConfig {
    /// See [`BASE_SPEED`]
    pub base_speed: i32,
    /// See [`MAX_SPEED`]
    pub max_speed: i32,
    /// See [`MIN_SPEED`]
    pub min_speed: i32,
    /// See [`SEARCH_SPEED`]
    pub search_speed: i32,
    /// See [`KP`]
    pub kp: Gain,
    /// See [`SEARCH_TIMEOUT_MS`]
    pub search_timeout: Duration,
    /// See [`SEARCH_FLIP_MS`]
    pub search_flip_period: Duration,
}

impl SteeringConfig {
    /// Tuning built from the crate constants.
    pub const DEFAULT: Self = Self {
        base_speed: BASE_SPEED,
        max_speed: MAX_SPEED,
        min_speed: MIN_SPEED,
        search_speed: SEARCH_SPEED,
        kp: KP,
        search_timeout: Duration::millis(SEARCH_TIMEOUT_MS as u64),
        search_flip_period: Duration::millis(SEARCH_FLIP_MS as u64),
    };
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
