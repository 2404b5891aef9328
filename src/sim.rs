// SPDX-License-Identifier: Apache-2.0

//! Simulated line sensor for bench testing without a camera.
//!
//! [`SimulatedLine`] reports no line on most ticks and a fabricated detection every `period`
//! ticks, cycling through a fixed set of offsets. It is a stand-in for [`Pixy2Link`] only and shares
//! none of its decode path.
//!
//! [`Pixy2Link`]: crate::pixy2::Pixy2Link

use crate::follower::LineSource;
use crate::pixy2::LineReading;

/// Offsets reported by successive fake detections
const SWEEP: [i8; 5] = [-60, -20, 0, 20, 60];

/// Fake sensor producing periodic detections
pub struct SimulatedLine {
    /// Ticks between detections, at least 1
    period: u32,
    /// Ticks seen so far
    ticks: u32,
    /// Index into [`SWEEP`] of the next detection
    next_offset: usize,
}

impl SimulatedLine {
    /// Detect a line once every `period` ticks.
    pub fn new(period: u32) -> Self {
        Self {
            period: period.max(1),
            ticks: 0,
            next_offset: 0,
        }
    }
}

impl LineSource for SimulatedLine {
    fn line_reading(&mut self) -> LineReading {
        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % self.period != 0 {
            return LineReading::NotFound;
        }

        let offset = SWEEP[self.next_offset];
        self.next_offset = (self.next_offset + 1) % SWEEP.len();
        debug!("simulated line at {}%", offset);
        LineReading::Offset(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_once_per_period() {
        let mut sim = SimulatedLine::new(3);
        let readings: [LineReading; 9] = core::array::from_fn(|_| sim.line_reading());
        assert_eq!(
            readings,
            [
                LineReading::NotFound,
                LineReading::NotFound,
                LineReading::Offset(-60),
                LineReading::NotFound,
                LineReading::NotFound,
                LineReading::Offset(-20),
                LineReading::NotFound,
                LineReading::NotFound,
                LineReading::Offset(0),
            ]
        );
    }

    #[test]
    fn zero_period_detects_every_tick() {
        let mut sim = SimulatedLine::new(0);
        for expected in SWEEP.into_iter().chain(SWEEP) {
            assert_eq!(sim.line_reading(), LineReading::Offset(expected));
        }
    }
}
