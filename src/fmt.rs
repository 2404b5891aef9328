// SPDX-License-Identifier: Apache-2.0

//! Logging macros shared by every module.
//!
//! On the RP2040 (`target_os = "none"`) messages go through [`defmt`](https://docs.rs/defmt) to
//! the RTT channel. Everywhere else (host unit tests) they go to the [`log`] facade, which is a
//! no-op unless a logger has been installed. Format strings must stick to `{}` and `{:?}`, which
//! both backends understand.
#![allow(unused_macros)]

/// Logs at trace level.
macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::trace!($s $(, $x)*);
        #[cfg(not(target_os = "none"))]
        ::log::trace!($s $(, $x)*);
    }};
}

/// Logs at debug level.
macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::debug!($s $(, $x)*);
        #[cfg(not(target_os = "none"))]
        ::log::debug!($s $(, $x)*);
    }};
}

/// Logs at info level.
macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::info!($s $(, $x)*);
        #[cfg(not(target_os = "none"))]
        ::log::info!($s $(, $x)*);
    }};
}

/// Logs at warn level.
macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::warn!($s $(, $x)*);
        #[cfg(not(target_os = "none"))]
        ::log::warn!($s $(, $x)*);
    }};
}

/// Logs at error level.
macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::error!($s $(, $x)*);
        #[cfg(not(target_os = "none"))]
        ::log::error!($s $(, $x)*);
    }};
}
