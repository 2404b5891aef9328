// SPDX-License-Identifier: Apache-2.0

//! Time types for the control loop.
//!
//! These match the 1 MHz counter exposed by `rp2040_hal::Timer`, so a timer reading can be passed
//! straight into the library.

/// Microsecond timestamp since boot
pub type Instant = fugit::TimerInstantU64<1_000_000>;
/// Microsecond duration
pub type Duration = fugit::MicrosDurationU64;

/// Source of the current time.
///
/// Implemented for any `Fn() -> Instant`, so `move || timer.get_counter()` is a valid clock.
pub trait Monotonic {
    /// Current time
    fn now(&self) -> Instant;
}

impl<F> Monotonic for F
where
    F: Fn() -> Instant,
{
    fn now(&self) -> Instant {
        self()
    }
}

/// Time elapsed from `earlier` to `later`, saturating at zero if the clock went backwards.
pub fn elapsed(earlier: Instant, later: Instant) -> Duration {
    later
        .checked_duration_since(earlier)
        .unwrap_or(Duration::from_ticks(0))
}
