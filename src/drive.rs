// SPDX-License-Identifier: Apache-2.0

//! Motor output for a DRV8835 in PH/EN mode (MODE pin high).
//!
//! Each motor takes a phase pin (high = forward, low = reverse) and a PWM enable pin whose duty
//! cycle sets the speed. The speed magnitude is written straight to the PWM level, so with a wrap
//! of [`MOTOR_PWM_TOP`](crate::config::MOTOR_PWM_TOP) any speed at or past the wrap is full duty.

use embedded_hal::digital::{self, Error as _, OutputPin};
use embedded_hal::pwm::{self, Error as _, SetDutyCycle};

use crate::steering::DriveCommand;

/// Why a motor could not be set
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum DriveError {
    /// Phase pin could not be driven
    Phase(digital::ErrorKind),
    /// Enable duty cycle could not be set
    Duty(pwm::ErrorKind),
}

/// Something that turns a [`DriveCommand`] into wheel motion.
pub trait MotorOutput {
    /// Drive both sides at the commanded speeds.
    fn apply(&mut self, command: DriveCommand) -> Result<(), DriveError>;

    /// Stop both sides.
    fn stop(&mut self) -> Result<(), DriveError> {
        self.apply(DriveCommand::STOP)
    }
}

/// One side of the drivetrain.
pub trait SpeedControl {
    /// Set a signed speed; positive is forward.
    fn set_speed(&mut self, speed: i32) -> Result<(), DriveError>;
}

/// A single DRV8835 channel in PH/EN mode
pub struct PhEnMotor<PH, EN> {
    /// Direction pin
    phase: PH,
    /// Speed PWM
    enable: EN,
    /// Speed that maps to full duty, equal to the PWM wrap for a 1:1 speed to level mapping
    full_speed: u16,
}

impl<PH, EN> PhEnMotor<PH, EN>
where
    PH: OutputPin,
    EN: SetDutyCycle,
{
    /// Create a motor where `full_speed` (nonzero) maps to 100% duty. Call
    /// [`set_speed`](SpeedControl::set_speed) before relying on the output state.
    pub fn new(phase: PH, enable: EN, full_speed: u16) -> Self {
        Self {
            phase,
            enable,
            full_speed: full_speed.max(1),
        }
    }

    /// Release the pins.
    pub fn free(self) -> (PH, EN) {
        (self.phase, self.enable)
    }
}

impl<PH, EN> SpeedControl for PhEnMotor<PH, EN>
where
    PH: OutputPin,
    EN: SetDutyCycle,
{
    fn set_speed(&mut self, speed: i32) -> Result<(), DriveError> {
        let magnitude = speed.unsigned_abs().min(self.full_speed as u32) as u16;

        let phase = if speed >= 0 {
            self.phase.set_high()
        } else {
            self.phase.set_low()
        };
        phase.map_err(|err| DriveError::Phase(err.kind()))?;

        self.enable
            .set_duty_cycle_fraction(magnitude, self.full_speed)
            .map_err(|err| DriveError::Duty(err.kind()))
    }
}

/// Left and right motors driven together
pub struct DifferentialDrive<L, R> {
    /// Left side
    left: L,
    /// Right side
    right: R,
}

impl<L, R> DifferentialDrive<L, R>
where
    L: SpeedControl,
    R: SpeedControl,
{
    /// Pair two sides.
    pub fn new(left: L, right: R) -> Self {
        Self { left, right }
    }

    /// Release both sides.
    pub fn free(self) -> (L, R) {
        (self.left, self.right)
    }
}

impl<L, R> MotorOutput for DifferentialDrive<L, R>
where
    L: SpeedControl,
    R: SpeedControl,
{
    fn apply(&mut self, command: DriveCommand) -> Result<(), DriveError> {
        #[cfg(feature = "trace_drive")]
        trace!("motors L={} R={}", command.left, command.right);

        self.left.set_speed(command.left)?;
        self.right.set_speed(command.right)
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use super::*;
    use crate::config::{BASE_SPEED, MAX_SPEED, MIN_SPEED, MOTOR_PWM_TOP};

    #[derive(Default)]
    struct Pin {
        high: Option<bool>,
    }

    impl digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = Some(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = Some(true);
            Ok(())
        }
    }

    /// 0-255 PWM channel, matching the firmware's wrap value.
    #[derive(Default)]
    struct Pwm {
        duty: u16,
    }

    impl pwm::ErrorType for Pwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for Pwm {
        fn max_duty_cycle(&self) -> u16 {
            255
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            self.duty = duty;
            Ok(())
        }
    }

    fn motor() -> PhEnMotor<Pin, Pwm> {
        PhEnMotor::new(Pin::default(), Pwm::default(), MOTOR_PWM_TOP)
    }

    #[test]
    fn forward_sets_phase_high() {
        let mut m = motor();
        m.set_speed(MAX_SPEED).unwrap();
        let (phase, enable) = m.free();
        assert_eq!(phase.high, Some(true));
        assert_eq!(enable.duty, 255);
    }

    #[test]
    fn reverse_sets_phase_low_with_positive_duty() {
        let mut m = motor();
        m.set_speed(-150).unwrap();
        let (phase, enable) = m.free();
        assert_eq!(phase.high, Some(false));
        assert_eq!(enable.duty, 150);
    }

    #[test]
    fn speed_is_written_as_pwm_level() {
        for speed in [MIN_SPEED, BASE_SPEED, 254, 255] {
            let mut m = motor();
            m.set_speed(speed).unwrap();
            assert_eq!(m.free().1.duty as i32, speed);
        }
        let mut m = motor();
        m.set_speed(256).unwrap();
        assert_eq!(m.free().1.duty, 255);
    }

    #[test]
    fn zero_speed_is_zero_duty() {
        let mut m = motor();
        m.set_speed(200).unwrap();
        m.set_speed(0).unwrap();
        assert_eq!(m.free().1.duty, 0);
    }

    #[test]
    fn overspeed_is_capped_at_full_duty() {
        let mut m = motor();
        m.set_speed(-1000).unwrap();
        assert_eq!(m.free().1.duty, 255);
    }

    #[test]
    fn differential_drive_sets_both_sides() {
        let mut drive = DifferentialDrive::new(motor(), motor());
        drive.apply(DriveCommand { left: -50, right: 50 }).unwrap();
        let (left, right) = drive.free();
        let (left_phase, left_pwm) = left.free();
        let (right_phase, right_pwm) = right.free();
        assert_eq!(left_phase.high, Some(false));
        assert_eq!(right_phase.high, Some(true));
        assert_eq!(left_pwm.duty, 50);
        assert_eq!(right_pwm.duty, 50);

        let mut drive = DifferentialDrive::new(running_motor(), motor());
        drive.stop().unwrap();
        assert_eq!(drive.free().0.free().1.duty, 0);
    }

    fn running_motor() -> PhEnMotor<Pin, Pwm> {
        PhEnMotor::new(Pin::default(), Pwm { duty: 200 }, MOTOR_PWM_TOP)
    }
}
