//! Conversion from wall-clock time to UUIDv1 timestamps.

use chrono::{DateTime, Utc};

/// Seconds between the Gregorian reform (1582-10-15T00:00:00Z) and the Unix epoch.
const GREGORIAN_OFFSET_SECS: i64 = 12_219_292_800;

/// Number of 100-nanosecond ticks in a second.
const TICKS_PER_SEC: i128 = 10_000_000;

/// Mask of the 60-bit timestamp field.
pub const MAX_TICKS: u64 = (1 << 60) - 1;

/// Converts a point in time into the number of 100-nanosecond intervals since
/// 1582-10-15T00:00:00Z, wrapped modulo 2<sup>60</sup>.
///
/// Sub-tick precision is truncated. Instants before the epoch or after
/// 5236-03-31T21:21:00.6846975Z wrap around rather than fail.
///
/// # Examples
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use uuid1::clock::to_ticks;
///
/// let t = Utc.with_ymd_and_hms(1999, 9, 13, 0, 0, 0).unwrap();
/// assert_eq!(to_ticks(t), 131_564_736_000_000_000);
/// ```
pub fn to_ticks(time: DateTime<Utc>) -> u64 {
    let secs = time.timestamp() as i128 + GREGORIAN_OFFSET_SECS as i128;
    let ticks = secs * TICKS_PER_SEC + (time.timestamp_subsec_nanos() / 100) as i128;
    ticks.rem_euclid(1 << 60) as u64
}

/// A source of the current wall-clock time.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current time as a 60-bit tick count.
    fn ticks(&self) -> u64 {
        to_ticks(self.now())
    }
}

/// The system real-time clock.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a given instant.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
