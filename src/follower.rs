// SPDX-License-Identifier: Apache-2.0

//! The control loop: read the line, steer, drive.
//!
//! A tick always finishes the sensor read before computing and applying the command built from
//! it, so a command never mixes one tick's reading with another tick's state. Nothing here can
//! end the loop: a failed read is just [`LineReading::NotFound`], and a motor error is logged and
//! retried on the next tick.

use embedded_hal::delay::DelayNs;

use crate::bus::BusTransport;
use crate::config::{SteeringConfig, MAIN_LOOP_DELAY_MS, SEARCH_STOP_HOLD_MS};
use crate::drive::{DriveError, MotorOutput};
use crate::pixy2::{LineReading, Pixy2Link};
use crate::steering::{Action, Steering, SteeringController};
use crate::time::Monotonic;

/// Anything that can produce one [`LineReading`] per tick.
pub trait LineSource {
    /// Take a reading. Blocks until the reading is complete or has failed.
    fn line_reading(&mut self) -> LineReading;
}

impl<B, D> LineSource for Pixy2Link<B, D>
where
    B: BusTransport,
    D: DelayNs,
{
    fn line_reading(&mut self) -> LineReading {
        self.get_line_offset()
    }
}

/// What happened during one tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct TickReport {
    /// Reading fed to the controller
    pub reading: LineReading,
    /// Controller output
    pub steering: Steering,
    /// Error from the motors, if the command could not be applied
    pub drive_error: Option<DriveError>,
}

impl TickReport {
    /// How long the loop should keep the motors as they are before the next tick, on top of
    /// the regular loop delay.
    pub fn hold_ms(&self) -> u32 {
        match self.steering.action {
            Action::TimeoutStop => SEARCH_STOP_HOLD_MS,
            Action::Follow | Action::Spin => 0,
        }
    }
}

/// Sensor, controller and motors composed into one loop.
pub struct LineFollower<S, M, C> {
    /// Line sensor
    sensor: S,
    /// Drivetrain
    motors: M,
    /// Time source for controller timestamps
    clock: C,
    /// Steering state machine
    controller: SteeringController,
}

impl<S, M, C> LineFollower<S, M, C>
where
    S: LineSource,
    M: MotorOutput,
    C: Monotonic,
{
    /// Compose a follower. The controller's search timer starts now.
    pub fn new(sensor: S, motors: M, clock: C, config: SteeringConfig) -> Self {
        let controller = SteeringController::new(config, clock.now());
        Self {
            sensor,
            motors,
            clock,
            controller,
        }
    }

    /// Stop the motors, e.g. during start-up.
    pub fn stop(&mut self) -> Result<(), DriveError> {
        self.motors.stop()
    }

    /// Steering controller, for inspecting its state
    pub fn controller(&self) -> &SteeringController {
        &self.controller
    }

    /// Read the line, steer and apply the result.
    pub fn tick(&mut self) -> TickReport {
        let reading = self.sensor.line_reading();
        let steering = self.controller.tick(reading, self.clock.now());

        let drive_error = self.motors.apply(steering.command).err();
        if let Some(err) = drive_error {
            error!("unable to drive motors: {:?}", err);
        }

        TickReport {
            reading,
            steering,
            drive_error,
        }
    }

    /// One full loop iteration: [`tick`](Self::tick), any stop hold, then the loop delay.
    pub fn step<D: DelayNs>(&mut self, delay: &mut D) -> TickReport {
        let report = self.tick();
        let hold = report.hold_ms();
        if hold > 0 {
            delay.delay_ms(hold);
        }
        delay.delay_ms(MAIN_LOOP_DELAY_MS);
        report
    }

    /// Run forever.
    pub fn run<D: DelayNs>(&mut self, delay: &mut D) -> ! {
        loop {
            self.step(delay);
        }
    }

    /// Release the parts.
    pub fn free(self) -> (S, M, C) {
        (self.sensor, self.motors, self.clock)
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use embedded_hal::digital::ErrorKind;

    use super::*;
    use crate::config::Gain;
    use crate::steering::DriveCommand;
    use crate::time::{Duration, Instant};

    /// Replays a script of readings, advancing a shared clock by `read_ms` per read.
    struct ScriptedSensor<'a> {
        script: &'a [LineReading],
        next: usize,
        now_us: &'a Cell<u64>,
        read_ms: u64,
    }

    impl LineSource for ScriptedSensor<'_> {
        fn line_reading(&mut self) -> LineReading {
            self.now_us.set(self.now_us.get() + self.read_ms * 1_000);
            let reading = self
                .script
                .get(self.next)
                .copied()
                .unwrap_or(LineReading::NotFound);
            self.next += 1;
            reading
        }
    }

    #[derive(Default)]
    struct RecordingMotors {
        applied: [Option<DriveCommand>; 8],
        count: usize,
        fail: bool,
    }

    impl MotorOutput for RecordingMotors {
        fn apply(&mut self, command: DriveCommand) -> Result<(), DriveError> {
            if self.fail {
                return Err(DriveError::Phase(ErrorKind::Other));
            }
            self.applied[self.count] = Some(command);
            self.count += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct TallyDelay {
        total_ms: u32,
    }

    impl DelayNs for TallyDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ms += ns / 1_000_000;
        }
    }

    fn config() -> SteeringConfig {
        SteeringConfig {
            base_speed: 100,
            max_speed: 300,
            min_speed: 40,
            search_speed: 50,
            kp: Gain::new(3, 10),
            search_timeout: Duration::millis(2000),
            search_flip_period: Duration::millis(1000),
        }
    }

    #[test]
    fn tick_applies_command_from_its_own_reading() {
        let now = Cell::new(0);
        let script = [LineReading::Offset(71), LineReading::NotFound];
        let sensor = ScriptedSensor {
            script: &script,
            next: 0,
            now_us: &now,
            read_ms: 30,
        };
        let clock = || Instant::from_ticks(now.get());
        let mut follower = LineFollower::new(sensor, RecordingMotors::default(), clock, config());

        let report = follower.tick();
        assert_eq!(report.reading, LineReading::Offset(71));
        assert_eq!(report.steering.command, DriveCommand { left: 79, right: 121 });
        // timestamp is taken after the read completes
        assert_eq!(
            follower.controller().state().last_line_seen_at,
            Instant::from_ticks(30_000)
        );

        let report = follower.tick();
        assert_eq!(report.steering.action, Action::Spin);

        let (_, motors, _) = follower.free();
        assert_eq!(motors.count, 2);
        assert_eq!(motors.applied[0], Some(DriveCommand { left: 79, right: 121 }));
        assert_eq!(motors.applied[1], Some(DriveCommand { left: -50, right: 50 }));
    }

    #[test]
    fn motor_errors_do_not_stop_the_loop() {
        let now = Cell::new(0);
        let sensor = ScriptedSensor {
            script: &[LineReading::Offset(0)],
            next: 0,
            now_us: &now,
            read_ms: 30,
        };
        let motors = RecordingMotors {
            fail: true,
            ..RecordingMotors::default()
        };
        let mut follower =
            LineFollower::new(sensor, motors, || Instant::from_ticks(now.get()), config());

        let report = follower.tick();
        assert_eq!(report.drive_error, Some(DriveError::Phase(ErrorKind::Other)));
        assert_eq!(report.steering.action, Action::Follow);
        assert_eq!(follower.tick().steering.action, Action::Spin);
    }

    #[test]
    fn timeout_stop_holds_before_next_tick() {
        let now = Cell::new(0);
        let sensor = ScriptedSensor {
            script: &[],
            next: 0,
            now_us: &now,
            read_ms: 1100,
        };
        let mut follower = LineFollower::new(
            sensor,
            RecordingMotors::default(),
            || Instant::from_ticks(now.get()),
            config(),
        );
        let mut delay = TallyDelay::default();

        // search starts at 1.1 s; 2.2 s is still inside the timeout, 3.3 s is past it
        for _ in 0..2 {
            assert_eq!(follower.step(&mut delay).steering.action, Action::Spin);
        }
        assert_eq!(delay.total_ms, 2 * MAIN_LOOP_DELAY_MS);

        let report = follower.step(&mut delay);
        assert_eq!(report.steering.action, Action::TimeoutStop);
        assert_eq!(report.steering.command, DriveCommand::STOP);
        assert_eq!(delay.total_ms, 3 * MAIN_LOOP_DELAY_MS + SEARCH_STOP_HOLD_MS);

        assert_eq!(follower.step(&mut delay).steering.action, Action::Spin);
    }
}
