//! This [RP2040](https://docs.rs/rp2040-hal) project drives a two-wheeled robot along a line seen by
//! a Pixy2 camera on I2C. Each control tick asks the camera for its main line vector, converts it
//! to a signed offset from the frame centre, and steers proportionally toward it. When the line is
//! lost the robot spins in place, sweeping both ways, and pauses whenever a sweep runs too long.
//!
//! Everything except peripheral bring-up lives in this library and is built on
//! [`embedded_hal`] traits, so it runs under `cargo test` on the host.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! | ------ | ------- |
//! | [`config`] | Pin map, gains, speeds and loop timing |
//! | [`bus`] | Timed I2C transport |
//! | [`pixy2`] | Line request, reply decoding and error taxonomy |
//! | [`steering`] | Follow/search state machine |
//! | [`drive`] | DRV8835 PH/EN motor output |
//! | [`follower`] | The control loop tying them together |
//! | `sim` | Fake sensor (feature `sim_sensor`) |
//!
//! ## Crate features
//!
//! - `soft_steering`: Uses a proportional gain of 0.3 instead of 5. Gentler turns, slower to
//!   recover on tight curves.
//! - `sim_sensor`: Replaces the camera with [`SimulatedLine`](crate::sim::SimulatedLine), which
//!   fabricates a detection every few ticks. Only useful on the bench.
//! - `trace_replies`: Logs every sensor reply and how it was decoded. Very noisy!
//! - `trace_drive`: Logs every command sent to the motors.
//!
//! ## Demo
//!
//! The following is a simplified version of the binary crate (`src/main.rs`), with clock and pin
//! setup left out.
//!
//! ```ignore
//! let clock = move || timer.get_counter();
//! let pixy = Pixy2Link::new(TimedI2c::new(i2c, clock), timer);
//! let motors = DifferentialDrive::new(
//!     PhEnMotor::new(left_ph, left_en, MOTOR_PWM_TOP),
//!     PhEnMotor::new(right_ph, right_en, MOTOR_PWM_TOP),
//! );
//!
//! let mut follower = LineFollower::new(pixy, motors, clock, SteeringConfig::DEFAULT);
//! follower.stop().unwrap();
//! follower.run(&mut timer)
//! ```

// Copyright 2024 Cameron Rodriguez
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_auto_cfg), feature(doc_cfg_hide))]

#[macro_use]
mod fmt;

pub mod bus;
pub mod config;
pub mod drive;
pub mod follower;
pub mod pixy2;
#[cfg(any(test, feature = "sim_sensor"))]
pub mod sim;
pub mod steering;
pub mod time;
