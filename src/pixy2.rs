// SPDX-License-Identifier: Apache-2.0

//! Pixy2 line-tracking link.
//!
//! Each call to [`Pixy2Link::read_line`] sends one "get main features" request, waits for the
//! camera to process it, reads the reply and turns the first line vector into a signed offset
//! percentage. Every failure is reported as a distinct [`LinkError`]; the controller only ever
//! sees the collapsed [`LineReading`].
//!
//! ## Reply layout
//!
//! | Byte | Meaning |
//! | ---- | ------- |
//! | 0-1 | sync (`AF C1`) |
//! | 2 | packet type (`0x31` for line features) |
//! | 3 | payload length |
//! | 4-5 | checksum |
//! | 6-9 | vector `x0, y0, x1, y1` |
//! | 10-11 | vector index and flags |

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::ErrorKind;

use crate::bus::{BusTransport, TransportFault};
use crate::config::{FRAME_CENTER, FRAME_HEIGHT, FRAME_WIDTH, LINE_CENTER_OFFSET, PIXY2_I2C_ADDRESS};
use crate::time::Duration;

/// "Get main features" request for the line tracker
pub const LINE_REQUEST: [u8; 6] = [0xAE, 0xC1, 0x30, 0x02, 0x21, 0x01];
/// Firmware version request
pub const VERSION_REQUEST: [u8; 4] = [0xAE, 0xC1, 0x0E, 0x00];
/// Coordinate value the camera uses for "no data"
pub const INVALID_COORDINATE: u8 = 0xFF;

/// Packet type of a line features reply
const LINE_REPLY_TYPE: u8 = 0x31;
/// Packet type of a version reply
const VERSION_REPLY_TYPE: u8 = 0x0F;
/// Sync, type, length and checksum bytes ahead of the payload
const HEADER_LEN: usize = 6;
/// Payload bytes needed for one vector: `x0, y0, x1, y1, index, flags`
const VECTOR_PAYLOAD_LEN: u8 = 6;
/// Bytes read back for a line request
const LINE_REPLY_LEN: usize = 64;
/// Bytes read back for a version request
const VERSION_REPLY_LEN: usize = 16;

/// Bus budget for each half of a line request
const LINE_TIMEOUT: Duration = Duration::millis(50);
/// Time the camera needs between a line request and its reply
const LINE_SETTLE_MS: u32 = 30;
/// Bus budget for each half of the version handshake
const VERSION_TIMEOUT: Duration = Duration::millis(100);
/// Time the camera needs between a version request and its reply
const VERSION_SETTLE_MS: u32 = 50;

/// Why a line request produced no offset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum LinkError {
    /// The bus transfer overran its budget
    TransportTimeout,
    /// The bus reported an error
    TransportError(ErrorKind),
    /// The reply header was not a usable line (or version) reply
    MalformedReply {
        /// Packet type byte
        reply_type: u8,
        /// Payload length byte
        length: u8,
    },
    /// The vector holds a sentinel, falls outside the frame, or is vertical
    InvalidCoordinate(LineVector),
}

impl From<TransportFault> for LinkError {
    fn from(fault: TransportFault) -> Self {
        match fault {
            TransportFault::Timeout => Self::TransportTimeout,
            TransportFault::Error(kind) => Self::TransportError(kind),
        }
    }
}

/// What the steering controller gets each tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum LineReading {
    /// Line offset in percent, negative when the line is left of centre
    Offset(i8),
    /// No usable line this tick, for whatever reason
    NotFound,
}

impl From<Result<i8, LinkError>> for LineReading {
    fn from(result: Result<i8, LinkError>) -> Self {
        match result {
            Ok(offset) => Self::Offset(offset),
            Err(_) => Self::NotFound,
        }
    }
}

/// First line vector of a features reply, in camera pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct LineVector {
    /// Tail x
    pub x0: u8,
    /// Tail y
    pub y0: u8,
    /// Head x
    pub x1: u8,
    /// Head y
    pub y1: u8,
}

impl LineVector {
    /// Reject sentinel values, points outside the frame, and vertical vectors (undefined
    /// horizontal offset).
    pub fn validate(self) -> Result<Self, LinkError> {
        let xs = [self.x0, self.x1];
        let ys = [self.y0, self.y1];
        let sentinel = xs.into_iter().chain(ys).any(|c| c == INVALID_COORDINATE);
        let outside =
            xs.into_iter().any(|x| x >= FRAME_WIDTH) || ys.into_iter().any(|y| y >= FRAME_HEIGHT);

        if sentinel || outside || self.x0 == self.x1 {
            Err(LinkError::InvalidCoordinate(self))
        } else {
            Ok(self)
        }
    }

    /// Integer midpoint of the two x coordinates
    pub fn center_x(&self) -> i32 {
        (self.x0 as i32 + self.x1 as i32) / 2
    }

    /// Offset of the midpoint from [`FRAME_CENTER`] as a percentage clamped to ±100.
    pub fn raw_error(&self) -> i32 {
        ((self.center_x() - FRAME_CENTER) * 100 / FRAME_CENTER).clamp(-100, 100)
    }

    /// [`raw_error`](Self::raw_error) shifted by `calibration` and clamped to ±100 again.
    pub fn offset(&self, calibration: i32) -> i8 {
        (self.raw_error() + calibration).clamp(-100, 100) as i8
    }
}

/// Extract the first line vector from a line features reply.
///
/// `reply` is everything the bus returned; a reply shorter than its declared payload is malformed.
pub fn decode_line_reply(reply: &[u8]) -> Result<LineVector, LinkError> {
    let header = |i: usize| reply.get(i).copied().unwrap_or(0);
    let (reply_type, length) = (header(2), header(3));

    if reply.len() < HEADER_LEN
        || reply_type != LINE_REPLY_TYPE
        || length < VECTOR_PAYLOAD_LEN
        || HEADER_LEN + length as usize > reply.len()
    {
        return Err(LinkError::MalformedReply { reply_type, length });
    }

    LineVector {
        x0: reply[6],
        y0: reply[7],
        x1: reply[8],
        y1: reply[9],
    }
    .validate()
}

/// Camera identity returned by the version handshake
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct FirmwareVersion {
    /// Hardware revision
    pub hardware: u16,
    /// Firmware major version
    pub major: u8,
    /// Firmware minor version
    pub minor: u8,
    /// Firmware build number
    pub build: u16,
}

/// Parse a version reply.
pub fn decode_version_reply(reply: &[u8]) -> Result<FirmwareVersion, LinkError> {
    let header = |i: usize| reply.get(i).copied().unwrap_or(0);
    let (reply_type, length) = (header(2), header(3));

    if reply.len() < HEADER_LEN + 6 || reply_type != VERSION_REPLY_TYPE {
        return Err(LinkError::MalformedReply { reply_type, length });
    }

    Ok(FirmwareVersion {
        hardware: u16::from_le_bytes([reply[6], reply[7]]),
        major: reply[8],
        minor: reply[9],
        build: u16::from_le_bytes([reply[10], reply[11]]),
    })
}

/// Outcome counters since power-up, for diagnostics only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct LinkStats {
    /// Line requests issued
    pub requests: u32,
    /// Requests that produced an offset
    pub found: u32,
    /// [`LinkError::TransportTimeout`] count
    pub timeouts: u32,
    /// [`LinkError::TransportError`] count
    pub transport_errors: u32,
    /// [`LinkError::MalformedReply`] count
    pub malformed: u32,
    /// [`LinkError::InvalidCoordinate`] count
    pub invalid: u32,
}

impl LinkStats {
    /// Requests that produced no offset, whatever the reason
    pub fn failures(&self) -> u32 {
        self.timeouts
            .wrapping_add(self.transport_errors)
            .wrapping_add(self.malformed)
            .wrapping_add(self.invalid)
    }

    /// Count one request outcome
    fn record(&mut self, result: &Result<i8, LinkError>) {
        self.requests = self.requests.wrapping_add(1);
        let counter = match result {
            Ok(_) => &mut self.found,
            Err(LinkError::TransportTimeout) => &mut self.timeouts,
            Err(LinkError::TransportError(_)) => &mut self.transport_errors,
            Err(LinkError::MalformedReply { .. }) => &mut self.malformed,
            Err(LinkError::InvalidCoordinate(_)) => &mut self.invalid,
        };
        *counter = counter.wrapping_add(1);
    }
}

/// Pixy2 camera on a [`BusTransport`].
///
/// The link owns the bus; nothing else may talk to the camera while it exists.
pub struct Pixy2Link<B, D> {
    /// Transport to the camera
    bus: B,
    /// Settle delay between request and reply
    delay: D,
    /// 7-bit bus address
    address: u8,
    /// Added to every offset, see [`LINE_CENTER_OFFSET`]
    calibration: i32,
    /// Outcome counters
    stats: LinkStats,
}

impl<B, D> Pixy2Link<B, D>
where
    B: BusTransport,
    D: DelayNs,
{
    /// Create a link at [`PIXY2_I2C_ADDRESS`] with the default calibration.
    pub fn new(bus: B, delay: D) -> Self {
        Self {
            bus,
            delay,
            address: PIXY2_I2C_ADDRESS,
            calibration: LINE_CENTER_OFFSET,
            stats: LinkStats::default(),
        }
    }

    /// Replace the calibration offset.
    pub fn with_calibration(mut self, calibration: i32) -> Self {
        self.calibration = calibration;
        self
    }

    /// Counters since power-up
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Release the bus and delay.
    pub fn free(self) -> (B, D) {
        (self.bus, self.delay)
    }

    /// Ask the camera for its firmware version to confirm it is present and responding.
    pub fn handshake(&mut self) -> Result<FirmwareVersion, LinkError> {
        let mut reply = [0u8; VERSION_REPLY_LEN];
        let received =
            self.request(&VERSION_REQUEST, &mut reply, VERSION_TIMEOUT, VERSION_SETTLE_MS)?;
        let version = decode_version_reply(&reply[..received])?;
        info!(
            "Pixy2 hardware {} firmware {}.{} build {}",
            version.hardware, version.major, version.minor, version.build
        );
        Ok(version)
    }

    /// Request one line reading and decode it into a calibrated offset.
    pub fn read_line(&mut self) -> Result<i8, LinkError> {
        let result = self.fetch_line();
        self.stats.record(&result);
        match &result {
            Ok(offset) => debug!("line offset {}%", offset),
            Err(err @ (LinkError::TransportTimeout | LinkError::TransportError(_))) => warn!(
                "Pixy2 transfer failed: {:?} ({} of {} requests failed)",
                err,
                self.stats.failures(),
                self.stats.requests
            ),
            Err(err) => debug!("no line: {:?}", err),
        }

        #[cfg(feature = "trace_replies")]
        trace!("link stats: {:?}", self.stats);

        result
    }

    /// [`read_line`](Self::read_line) collapsed for the controller.
    pub fn get_line_offset(&mut self) -> LineReading {
        self.read_line().into()
    }

    /// Send the line request and decode the reply
    fn fetch_line(&mut self) -> Result<i8, LinkError> {
        let mut reply = [0u8; LINE_REPLY_LEN];
        let received = self.request(&LINE_REQUEST, &mut reply, LINE_TIMEOUT, LINE_SETTLE_MS)?;
        let decoded = decode_line_reply(&reply[..received]);

        #[cfg(feature = "trace_replies")]
        trace!("{} byte reply decoded as {:?}", received, decoded);

        let vector = decoded?;
        let offset = vector.offset(self.calibration);

        #[cfg(feature = "trace_replies")]
        trace!(
            "vector ({},{}) -> ({},{}), centre {}, raw {}%, calibrated {}%",
            vector.x0,
            vector.y0,
            vector.x1,
            vector.y1,
            vector.center_x(),
            vector.raw_error(),
            offset
        );

        Ok(offset)
    }

    /// Write `command`, wait `settle_ms`, then read into `reply`.
    fn request(
        &mut self,
        command: &[u8],
        reply: &mut [u8],
        timeout: Duration,
        settle_ms: u32,
    ) -> Result<usize, LinkError> {
        self.bus.write(self.address, command, timeout)?;
        self.delay.delay_ms(settle_ms);
        Ok(self.bus.read(self.address, reply, timeout)?)
    }
}
