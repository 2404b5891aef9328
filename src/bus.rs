// SPDX-License-Identifier: Apache-2.0

//! Bus transport used by the sensor link.
//!
//! [`BusTransport`] is the only way the link talks to hardware. [`TimedI2c`] adapts any
//! [`embedded_hal::i2c::I2c`] bus to it and classifies a transfer that overran its time budget as
//! [`TransportFault::Timeout`].

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

use crate::time::{elapsed, Duration, Instant, Monotonic};

/// Why a bus transfer failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum TransportFault {
    /// The transfer did not complete within its time budget
    Timeout,
    /// The bus reported an error
    Error(ErrorKind),
}

/// Blocking byte transport to a device at a 7-bit address.
pub trait BusTransport {
    /// Write all of `bytes` to `address`.
    fn write(&mut self, address: u8, bytes: &[u8], timeout: Duration)
        -> Result<(), TransportFault>;

    /// Read into `buffer` from `address`, returning the number of bytes received.
    fn read(
        &mut self,
        address: u8,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportFault>;
}

/// An [`I2c`] bus with a wall-clock budget on every transfer.
///
/// The underlying bus call is blocking and cannot be interrupted; the budget is checked once the
/// call returns. Data that arrived late is discarded.
pub struct TimedI2c<I, C> {
    /// Wrapped bus
    i2c: I,
    /// Clock used to time each transfer
    clock: C,
}

impl<I, C> TimedI2c<I, C>
where
    I: I2c,
    C: Monotonic,
{
    /// Wrap `i2c`, timing transfers with `clock`.
    pub fn new(i2c: I, clock: C) -> Self {
        Self { i2c, clock }
    }

    /// Release the bus and clock.
    pub fn free(self) -> (I, C) {
        (self.i2c, self.clock)
    }

    /// Map a finished transfer started at `start` to a [`TransportFault`] if it failed or overran.
    fn settle<T>(
        &self,
        start: Instant,
        timeout: Duration,
        result: Result<T, I::Error>,
    ) -> Result<T, TransportFault> {
        if elapsed(start, self.clock.now()) > timeout {
            return Err(TransportFault::Timeout);
        }
        result.map_err(|err| TransportFault::Error(err.kind()))
    }
}

impl<I, C> BusTransport for TimedI2c<I, C>
where
    I: I2c,
    C: Monotonic,
{
    fn write(
        &mut self,
        address: u8,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportFault> {
        let start = self.clock.now();
        let result = self.i2c.write(address, bytes);
        self.settle(start, timeout, result)
    }

    fn read(
        &mut self,
        address: u8,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportFault> {
        let start = self.clock.now();
        let result = self.i2c.read(address, buffer).map(|()| buffer.len());
        self.settle(start, timeout, result)
    }
}
