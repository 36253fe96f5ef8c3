//! Access to the host's clock and local time zone.
//!
//! The parser and formatter never read the system clock or time zone
//! directly; they go through these traits so callers (and tests) can pin
//! both down.

use std::fmt::Display;

use jiff::{Timestamp, civil::DateTime, tz::TimeZone};

use crate::{DatetimeFields, ParseError, SECONDS_PER_MINUTE};

/// The `HostClock` trait defines an accessor to the host's clock.
pub trait HostClock {
    /// Current UTC time as whole seconds since the Unix epoch
    fn now_utc_seconds(&self) -> Result<i64, ParseError>;
}

/// The `HostTimeZone` trait converts between UTC and the host's wall clock.
pub trait HostTimeZone {
    /// Broken-down local time for a UTC instant given in epoch seconds.
    /// Sub-second fields of the result are zero.
    fn utc_to_local(&self, epoch_seconds: i64) -> Result<DatetimeFields, ParseError>;

    /// UTC epoch seconds for a local wall-clock time. Sub-second fields of
    /// `local` are ignored.
    fn local_to_utc(&self, local: &DatetimeFields) -> Result<i64, ParseError>;
}

/// `Host` marks a type that provides both the clock and the time zone.
pub trait Host: HostClock + HostTimeZone {}

// The unit host: a UTC time zone and a clock stopped at the Unix epoch.

impl HostClock for () {
    fn now_utc_seconds(&self) -> Result<i64, ParseError> {
        Ok(0)
    }
}

impl HostTimeZone for () {
    fn utc_to_local(&self, epoch_seconds: i64) -> Result<DatetimeFields, ParseError> {
        Ok(DatetimeFields::from_epoch_seconds(epoch_seconds))
    }

    fn local_to_utc(&self, local: &DatetimeFields) -> Result<i64, ParseError> {
        Ok(local.epoch_seconds())
    }
}

impl Host for () {}

/// A host with a constant UTC offset and a stopped clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FixedHost {
    /// Local time minus UTC, in minutes
    pub offset_minutes: i32,
    /// What the clock reports, in seconds since the Unix epoch
    pub now: i64,
}

impl FixedHost {
    pub const fn new(offset_minutes: i32, now: i64) -> Self {
        Self {
            offset_minutes,
            now,
        }
    }

    const fn offset_seconds(&self) -> i64 {
        self.offset_minutes as i64 * SECONDS_PER_MINUTE as i64
    }
}

impl HostClock for FixedHost {
    fn now_utc_seconds(&self) -> Result<i64, ParseError> {
        Ok(self.now)
    }
}

impl HostTimeZone for FixedHost {
    fn utc_to_local(&self, epoch_seconds: i64) -> Result<DatetimeFields, ParseError> {
        Ok(DatetimeFields::from_epoch_seconds(
            epoch_seconds + self.offset_seconds(),
        ))
    }

    fn local_to_utc(&self, local: &DatetimeFields) -> Result<i64, ParseError> {
        Ok(local.epoch_seconds() - self.offset_seconds())
    }
}

impl Host for FixedHost {}

/// The operating system's clock and configured time zone.
///
/// Ambiguous or skipped local times resolve the way `mktime` does with
/// `tm_isdst = -1`: the earlier offset for a fold, the later for a gap. An
/// undeterminable system time zone falls back to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SystemHost;

impl HostClock for SystemHost {
    fn now_utc_seconds(&self) -> Result<i64, ParseError> {
        Ok(Timestamp::now().as_second())
    }
}

impl HostTimeZone for SystemHost {
    fn utc_to_local(&self, epoch_seconds: i64) -> Result<DatetimeFields, ParseError> {
        let timestamp = Timestamp::from_second(epoch_seconds).map_err(conversion_error)?;
        let local = TimeZone::system().to_datetime(timestamp);
        trace!("system time zone maps {epoch_seconds} to {local}");
        Ok(DatetimeFields {
            year: i64::from(local.year()),
            month: i32::from(local.month()),
            day: i32::from(local.day()),
            hour: i32::from(local.hour()),
            minute: i32::from(local.minute()),
            second: i32::from(local.second()),
            ..DatetimeFields::default()
        })
    }

    fn local_to_utc(&self, local: &DatetimeFields) -> Result<i64, ParseError> {
        let civil = DateTime::new(
            i16::try_from(local.year).map_err(conversion_error)?,
            i8::try_from(local.month).map_err(conversion_error)?,
            i8::try_from(local.day).map_err(conversion_error)?,
            i8::try_from(local.hour).map_err(conversion_error)?,
            i8::try_from(local.minute).map_err(conversion_error)?,
            i8::try_from(local.second).map_err(conversion_error)?,
            0,
        )
        .map_err(conversion_error)?;
        let timestamp = TimeZone::system()
            .to_timestamp(civil)
            .map_err(conversion_error)?;
        Ok(timestamp.as_second())
    }
}

impl Host for SystemHost {}

fn conversion_error(err: impl Display) -> ParseError {
    debug!("local time conversion failed: {err}");
    ParseError::LocalTimeConversion(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_host_is_utc_at_epoch() {
        assert_eq!(().now_utc_seconds().unwrap(), 0);
        let local = ().utc_to_local(1_560_641_400).unwrap();
        assert_eq!(
            local,
            DatetimeFields::new(2019, 6, 15).unwrap().with_time(23, 30, 0).unwrap()
        );
        assert_eq!(().local_to_utc(&local).unwrap(), 1_560_641_400);
    }

    #[test]
    fn test_fixed_host_applies_offset() {
        let host = FixedHost::new(120, 42);
        assert_eq!(host.now_utc_seconds().unwrap(), 42);

        let local = host.utc_to_local(0).unwrap();
        assert_eq!(
            local,
            DatetimeFields::new(1970, 1, 1).unwrap().with_time(2, 0, 0).unwrap()
        );
        assert_eq!(host.local_to_utc(&local).unwrap(), 0);

        let west = FixedHost::new(-300, 0);
        let local = west.utc_to_local(0).unwrap();
        assert_eq!(
            local,
            DatetimeFields::new(1969, 12, 31).unwrap().with_time(19, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_system_host_round_trips() {
        let host = SystemHost;
        let now = host.now_utc_seconds().unwrap();
        assert!(now > 1_500_000_000);

        // Noon in the middle of a month is never inside a DST transition.
        let utc = 1_560_600_000;
        let local = host.utc_to_local(utc).unwrap();
        assert_eq!(host.local_to_utc(&local).unwrap(), utc);
    }

    #[test]
    fn test_system_host_rejects_unrepresentable_years() {
        let local = DatetimeFields::new(100_000, 1, 1).unwrap();
        assert!(matches!(
            SystemHost.local_to_utc(&local),
            Err(ParseError::LocalTimeConversion(_))
        ));
    }
}
