// SPDX-License-Identifier: Apache-2.0

//! Steering state machine.
//!
//! Turns the latest [`LineReading`] into a [`DriveCommand`]. With a line in view the robot steers
//! proportionally toward it; without one it spins in place, reversing the sweep every
//! [`search_flip_period`](SteeringConfig::search_flip_period) and stopping briefly each time a
//! sweep runs past [`search_timeout`](SteeringConfig::search_timeout).
//!
//! All state lives in a [`SteeringState`] value. [`SteeringState::next`] is a pure function of the
//! previous state, the reading and the current time, so the whole controller can be exercised
//! without hardware.

use crate::config::SteeringConfig;
use crate::pixy2::LineReading;
use crate::time::{elapsed, Instant};

/// Signed speed for each side of the drivetrain, already limited by [`DriveCommand::limited`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct DriveCommand {
    /// Left side, positive forward
    pub left: i32,
    /// Right side, positive forward
    pub right: i32,
}

impl DriveCommand {
    /// Both sides stopped
    pub const STOP: Self = Self { left: 0, right: 0 };

    /// Clamp each side to `±max_speed`, then raise any nonzero side below `min_speed` to
    /// `min_speed` with the same sign.
    pub fn limited(left: i32, right: i32, config: &SteeringConfig) -> Self {
        let limit = |speed: i32| {
            let speed = speed.clamp(-config.max_speed, config.max_speed);
            if speed != 0 && speed.abs() < config.min_speed {
                config.min_speed * speed.signum()
            } else {
                speed
            }
        };
        Self {
            left: limit(left),
            right: limit(right),
        }
    }
}

/// Which way the search spin turns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum SweepDirection {
    /// Left side backward, right side forward
    CounterClockwise,
    /// Left side forward, right side backward
    Clockwise,
}

impl SweepDirection {
    /// `+1` for [`CounterClockwise`](Self::CounterClockwise), `-1` for
    /// [`Clockwise`](Self::Clockwise)
    pub fn sign(self) -> i32 {
        match self {
            Self::CounterClockwise => 1,
            Self::Clockwise => -1,
        }
    }

    /// The opposite direction
    pub fn reversed(self) -> Self {
        match self {
            Self::CounterClockwise => Self::Clockwise,
            Self::Clockwise => Self::CounterClockwise,
        }
    }
}

/// Controller mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Mode {
    /// A line was seen on the last tick
    Following,
    /// No line since the search began
    Searching {
        /// When the sweep last changed direction (or the search began)
        swept_at: Instant,
    },
}

/// What kind of command a tick produced
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Action {
    /// Proportional steering toward a visible line
    Follow,
    /// Spinning in place to find the line
    Spin,
    /// Search sweep timed out; motors stopped and the sweep restarts
    TimeoutStop,
}

/// One tick of controller output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Steering {
    /// Speeds to apply
    pub command: DriveCommand,
    /// Why
    pub action: Action,
}

/// Everything the controller remembers between ticks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct SteeringState {
    /// Current mode
    pub mode: Mode,
    /// Direction of the next search spin
    pub search_direction: SweepDirection,
    /// Last time a line was seen, or the current search segment began
    pub last_line_seen_at: Instant,
}

impl SteeringState {
    /// Initial state at power-up. The first tick without a line starts a search.
    pub fn new(now: Instant) -> Self {
        Self {
            mode: Mode::Following,
            search_direction: SweepDirection::CounterClockwise,
            last_line_seen_at: now,
        }
    }

    /// Advance by one tick.
    pub fn next(
        self,
        reading: LineReading,
        now: Instant,
        config: &SteeringConfig,
    ) -> (Self, Steering) {
        match reading {
            LineReading::Offset(offset) => self.follow(offset, now, config),
            LineReading::NotFound => self.search(now, config),
        }
    }

    /// Proportional steering toward `offset`
    fn follow(self, offset: i8, now: Instant, config: &SteeringConfig) -> (Self, Steering) {
        if matches!(self.mode, Mode::Searching { .. }) {
            info!("line found at {}%", offset);
        }

        let turn = config.kp.apply(offset as i32);
        let command = DriveCommand::limited(
            config.base_speed - turn,
            config.base_speed + turn,
            config,
        );
        let state = Self {
            mode: Mode::Following,
            last_line_seen_at: now,
            ..self
        };
        (
            state,
            Steering {
                command,
                action: Action::Follow,
            },
        )
    }

    /// Spin-and-timeout search
    fn search(self, now: Instant, config: &SteeringConfig) -> (Self, Steering) {
        let mut state = self;
        let swept_at = match self.mode {
            Mode::Following => {
                info!("searching for line");
                state.last_line_seen_at = now;
                now
            }
            Mode::Searching { swept_at } => swept_at,
        };
        state.mode = Mode::Searching { swept_at };

        if elapsed(state.last_line_seen_at, now) > config.search_timeout {
            warn!("search timed out, stopping");
            state.last_line_seen_at = now;
            return (
                state,
                Steering {
                    command: DriveCommand::STOP,
                    action: Action::TimeoutStop,
                },
            );
        }

        let spin = config.search_speed * state.search_direction.sign();
        let command = DriveCommand::limited(-spin, spin, config);

        if elapsed(swept_at, now) > config.search_flip_period {
            state.search_direction = state.search_direction.reversed();
            state.mode = Mode::Searching { swept_at: now };
            debug!("sweeping {:?}", state.search_direction);
        }

        (
            state,
            Steering {
                command,
                action: Action::Spin,
            },
        )
    }
}

/// Steering tuning plus the state it evolves.
pub struct SteeringController {
    /// Tuning
    config: SteeringConfig,
    /// State after the last tick
    state: SteeringState,
}

impl SteeringController {
    /// Start in [`SteeringState::new`] at `now`.
    pub fn new(config: SteeringConfig, now: Instant) -> Self {
        Self {
            config,
            state: SteeringState::new(now),
        }
    }

    /// State after the last tick
    pub fn state(&self) -> SteeringState {
        self.state
    }

    /// Tuning in use
    pub fn config(&self) -> &SteeringConfig {
        &self.config
    }

    /// Feed one reading taken at `now`.
    pub fn tick(&mut self, reading: LineReading, now: Instant) -> Steering {
        let (state, steering) = self.state.next(reading, now, &self.config);
        self.state = state;
        steering
    }
}
