#[macro_use]
mod logging;

mod consts;
mod format;
mod host;
mod parse;
mod prelude;
mod types;

pub use consts::*;
pub use format::{get_datetime_iso_8601_strlen, make_iso_8601_datetime};
pub use host::{FixedHost, Host, HostClock, HostTimeZone, SystemHost};
pub use parse::{ParsedDatetime, parse_iso_8601_datetime};
pub use types::{
    Casting, DatetimeUnit, Field, Special, civil_from_days, days_from_civil, days_in_month,
    is_leap_year,
};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A broken-down calendar value with attosecond resolution.
///
/// Sub-second digits are stored in three groups of six: `us` holds
/// microseconds, `ps` the next six digits (picoseconds within the
/// microsecond) and `as_` the last six (attoseconds within the picosecond).
///
/// When `year` is [`NAT_YEAR`] the value is Not-a-Time and every other field
/// is meaningless, so all NaT values compare equal.
#[derive(Debug, Clone, Copy, Eq)]
pub struct DatetimeFields {
    pub year:   i64,
    pub month:  i32,
    pub day:    i32,
    pub hour:   i32,
    pub minute: i32,
    pub second: i32,
    pub us:     i32,
    pub ps:     i32,
    pub as_:    i32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The text does not follow the datetime grammar
    #[error("Error parsing datetime string \"{text}\" at position {position}")]
    InvalidSyntax { text: String, position: usize },

    /// A field was read completely but holds an impossible value
    #[error("{field} out of range in datetime string \"{text}\"")]
    FieldOutOfRange { text: String, field: Field },

    /// A field handed to a constructor holds an impossible value
    #[error("{field} value {value} is out of range")]
    InvalidField { field: Field, value: i64 },

    #[error(
        "Special value '{special}' can only be converted to a datetime with 'D' or larger units, \
         not '{requested}'"
    )]
    UnsupportedUnitForSpecial {
        special:   Special,
        requested: DatetimeUnit,
    },

    /// The detected precision may not be stored at the requested unit
    #[error("Cannot parse \"{text}\" as unit '{requested}' using casting rule {casting}")]
    CastingRefused {
        text:      String,
        detected:  DatetimeUnit,
        requested: DatetimeUnit,
        casting:   Casting,
    },

    /// The host refused to convert between UTC and local time
    #[error("Failed to convert between local time and UTC: {0}")]
    LocalTimeConversion(String),

    /// The output buffer ended before the rendering did
    #[error(
        "The buffer provided for ISO datetime formatting was too short, with length {provided} \
         (needs up to {needed_hint})"
    )]
    BufferTooShort { provided: usize, needed_hint: usize },

    #[error("Cannot create a datetime other than NaT with generic units")]
    GenericUnitWithConcreteValue,

    #[error("Invalid datetime unit: {0}")]
    InvalidUnit(String),
}

impl Default for DatetimeFields {
    /// The Unix epoch, 1970-01-01T00:00:00
    fn default() -> Self {
        Self {
            year:   1970,
            month:  JANUARY,
            day:    MIN_DAY,
            hour:   0,
            minute: 0,
            second: 0,
            us:     0,
            ps:     0,
            as_:    0,
        }
    }
}

impl DatetimeFields {
    /// Creates a value at midnight of the given date.
    ///
    /// # Errors
    /// Returns `ParseError::InvalidField` if the month or day is out of range.
    pub fn new(year: i64, month: i32, day: i32) -> Result<Self, ParseError> {
        if year == NAT_YEAR {
            return Err(ParseError::InvalidField {
                field: Field::Year,
                value: year,
            });
        }
        check_field(Field::Month, month, JANUARY, MAX_MONTH)?;
        check_field(Field::Day, day, MIN_DAY, days_in_month(year, month))?;
        Ok(Self {
            year,
            month,
            day,
            ..Self::default()
        })
    }

    /// The Not-a-Time value
    pub const fn nat() -> Self {
        Self {
            year:   NAT_YEAR,
            month:  JANUARY,
            day:    MIN_DAY,
            hour:   0,
            minute: 0,
            second: 0,
            us:     0,
            ps:     0,
            as_:    0,
        }
    }

    pub const fn is_nat(&self) -> bool {
        self.year == NAT_YEAR
    }

    /// Sets the time of day.
    ///
    /// # Errors
    /// Returns `ParseError::InvalidField` if any component is out of range.
    pub fn with_time(self, hour: i32, minute: i32, second: i32) -> Result<Self, ParseError> {
        check_field(Field::Hour, hour, 0, HOURS_PER_DAY - 1)?;
        check_field(Field::Minute, minute, 0, MINUTES_PER_HOUR - 1)?;
        check_field(Field::Second, second, 0, SECONDS_PER_MINUTE - 1)?;
        Ok(Self {
            hour,
            minute,
            second,
            ..self
        })
    }

    /// Sets the three sub-second groups (microseconds, then the next six
    /// digits, then the last six).
    ///
    /// # Errors
    /// Returns `ParseError::InvalidField` if a group is not in `0..1_000_000`.
    pub fn with_fraction(self, us: i32, ps: i32, as_: i32) -> Result<Self, ParseError> {
        for group in [us, ps, as_] {
            check_field(Field::Fraction, group, 0, FRACTION_GROUP_MAX - 1)?;
        }
        Ok(Self { us, ps, as_, ..self })
    }

    /// Whole days since 1970-01-01
    pub const fn epoch_days(&self) -> i64 {
        days_from_civil(self.year, self.month, self.day)
    }

    /// Whole seconds since the Unix epoch, ignoring the sub-second groups
    pub const fn epoch_seconds(&self) -> i64 {
        self.epoch_days() * SECONDS_PER_DAY
            + (self.hour * MINUTES_PER_HOUR * SECONDS_PER_MINUTE
                + self.minute * SECONDS_PER_MINUTE
                + self.second) as i64
    }

    /// Builds the UTC calendar value for a count of seconds since the Unix epoch
    pub const fn from_epoch_seconds(seconds: i64) -> Self {
        let days = seconds.div_euclid(SECONDS_PER_DAY);
        let secs = seconds.rem_euclid(SECONDS_PER_DAY) as i32;
        let (year, month, day) = civil_from_days(days);
        Self {
            year,
            month,
            day,
            hour: secs / (MINUTES_PER_HOUR * SECONDS_PER_MINUTE),
            minute: secs / SECONDS_PER_MINUTE % MINUTES_PER_HOUR,
            second: secs % SECONDS_PER_MINUTE,
            us: 0,
            ps: 0,
            as_: 0,
        }
    }

    /// Shifts the value by a number of minutes, carrying into the hour, day,
    /// month and year as needed.
    pub fn add_minutes(&mut self, minutes: i64) {
        let total = i64::from(self.hour) * i64::from(MINUTES_PER_HOUR)
            + i64::from(self.minute)
            + minutes;
        let mut days = total.div_euclid(MINUTES_PER_DAY);
        let in_day = total.rem_euclid(MINUTES_PER_DAY);
        self.hour = (in_day / i64::from(MINUTES_PER_HOUR)) as i32;
        self.minute = (in_day % i64::from(MINUTES_PER_HOUR)) as i32;

        while days > 0 {
            let remaining = i64::from(days_in_month(self.year, self.month) - self.day);
            if days <= remaining {
                self.day += days as i32;
                break;
            }
            days -= remaining + 1;
            self.day = MIN_DAY;
            self.next_month();
        }
        while days < 0 {
            let remaining = i64::from(self.day - MIN_DAY);
            if -days <= remaining {
                self.day += days as i32;
                break;
            }
            days += remaining + 1;
            self.prev_month();
            self.day = days_in_month(self.year, self.month);
        }
    }

    /// Renders the value into a freshly allocated string sized by
    /// [`get_datetime_iso_8601_strlen`].
    ///
    /// # Errors
    /// Fails only if the host cannot convert to local time.
    pub fn to_iso_string<H>(
        &self,
        local: bool,
        unit: Option<DatetimeUnit>,
        tz_offset: Option<i32>,
        host: &H,
    ) -> Result<String, ParseError>
    where
        H: HostTimeZone + ?Sized,
    {
        let mut buf = vec![0_u8; get_datetime_iso_8601_strlen(local, unit)];
        let len = make_iso_8601_datetime(self, &mut buf, local, unit, tz_offset, host)?;
        buf.truncate(len);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn next_month(&mut self) {
        if self.month == MAX_MONTH {
            self.month = JANUARY;
            self.year = self.year.saturating_add(1);
        } else {
            self.month += 1;
        }
    }

    fn prev_month(&mut self) {
        if self.month == JANUARY {
            self.month = MAX_MONTH;
            self.year = self.year.saturating_sub(1);
        } else {
            self.month -= 1;
        }
    }
}

fn check_field(field: Field, value: i32, min: i32, max: i32) -> Result<(), ParseError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ParseError::InvalidField {
            field,
            value: i64::from(value),
        })
    }
}

impl DatetimeFields {
    const fn key(&self) -> (i64, i32, i32, i32, i32, i32, i32, i32, i32) {
        if self.is_nat() {
            return (NAT_YEAR, 0, 0, 0, 0, 0, 0, 0, 0);
        }
        (
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.us,
            self.ps,
            self.as_,
        )
    }
}

impl PartialEq for DatetimeFields {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Hash for DatetimeFields {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for DatetimeFields {
    /// UTC rendering at the finest precision that is not all zeros
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_iso_string(false, None, None, &()).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl FromStr for DatetimeFields {
    type Err = ParseError;

    /// Parses at whatever precision the text carries, using the system clock
    /// and time zone for `now`, `today` and timestamps without an offset.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_iso_8601_datetime(s, None, Casting::Unsafe, &SystemHost).map(|parsed| parsed.value)
    }
}

impl serde::Serialize for DatetimeFields {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for DatetimeFields {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: i64, month: i32, day: i32, hour: i32, minute: i32) -> DatetimeFields {
        DatetimeFields::new(year, month, day)
            .unwrap()
            .with_time(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_default_is_epoch() {
        let value = DatetimeFields::default();
        assert_eq!(value.epoch_seconds(), 0);
        assert_eq!(value.to_string(), "1970-01-01");
    }

    #[test]
    fn test_new_validates() {
        assert!(DatetimeFields::new(2024, 2, 29).is_ok());
        assert!(matches!(
            DatetimeFields::new(2023, 2, 29),
            Err(ParseError::InvalidField { field: Field::Day, value: 29 })
        ));
        assert!(matches!(
            DatetimeFields::new(2023, 13, 1),
            Err(ParseError::InvalidField { field: Field::Month, value: 13 })
        ));
        assert!(DatetimeFields::new(NAT_YEAR, 1, 1).is_err());
    }

    #[test]
    fn test_with_time_and_fraction_validate() {
        let date = DatetimeFields::new(2024, 1, 1).unwrap();
        assert!(date.with_time(23, 59, 59).is_ok());
        assert!(matches!(
            date.with_time(24, 0, 0),
            Err(ParseError::InvalidField { field: Field::Hour, .. })
        ));
        assert!(matches!(
            date.with_time(0, 0, 60),
            Err(ParseError::InvalidField { field: Field::Second, .. })
        ));
        assert!(date.with_fraction(999_999, 0, 0).is_ok());
        assert!(matches!(
            date.with_fraction(0, 1_000_000, 0),
            Err(ParseError::InvalidField { field: Field::Fraction, .. })
        ));
    }

    #[test]
    fn test_nat_ignores_leftover_fields() {
        use std::collections::HashSet;

        let stale = DatetimeFields {
            month: 5,
            hour: 7,
            us: 12,
            ..DatetimeFields::nat()
        };
        assert!(stale.is_nat());
        assert_eq!(stale, DatetimeFields::nat());

        let set: HashSet<_> = [stale, DatetimeFields::nat()].into_iter().collect();
        assert_eq!(set.len(), 1);

        let epoch = DatetimeFields::default();
        assert_ne!(epoch, DatetimeFields { month: 2, ..epoch });
        assert_ne!(epoch, DatetimeFields::nat());
    }

    #[test]
    fn test_nat() {
        let nat = DatetimeFields::nat();
        assert!(nat.is_nat());
        assert!(!DatetimeFields::default().is_nat());
        assert_eq!(nat.to_string(), "NaT");
    }

    #[test]
    fn test_epoch_seconds_round_trip() {
        for seconds in [-86_401, -1, 0, 59, 86_399, 951_782_400, 1_560_641_400] {
            let value = DatetimeFields::from_epoch_seconds(seconds);
            assert_eq!(value.epoch_seconds(), seconds, "seconds {seconds}");
        }
        let value = DatetimeFields::from_epoch_seconds(-1);
        assert_eq!(value, DatetimeFields::new(1969, 12, 31).unwrap().with_time(23, 59, 59).unwrap());
    }

    #[test]
    fn test_add_minutes_cases() {
        struct TestCase {
            start:       DatetimeFields,
            minutes:     i64,
            expected:    DatetimeFields,
            description: &'static str,
        }

        let cases = [
            TestCase {
                start:       at(2019, 6, 15, 23, 30),
                minutes:     -120,
                expected:    at(2019, 6, 15, 21, 30),
                description: "within the day",
            },
            TestCase {
                start:       at(2019, 1, 1, 0, 30),
                minutes:     -120,
                expected:    at(2018, 12, 31, 22, 30),
                description: "back across a year boundary",
            },
            TestCase {
                start:       at(2018, 12, 31, 23, 0),
                minutes:     90,
                expected:    at(2019, 1, 1, 0, 30),
                description: "forward across a year boundary",
            },
            TestCase {
                start:       at(2000, 2, 28, 23, 0),
                minutes:     60,
                expected:    at(2000, 2, 29, 0, 0),
                description: "into a leap day",
            },
            TestCase {
                start:       at(1900, 3, 1, 0, 0),
                minutes:     -1,
                expected:    at(1900, 2, 28, 23, 59),
                description: "back over a non-leap February",
            },
            TestCase {
                start:       at(2019, 1, 30, 12, 0),
                minutes:     40 * 24 * 60,
                expected:    at(2019, 3, 11, 12, 0),
                description: "several months forward",
            },
            TestCase {
                start:       at(-1, 1, 1, 0, 0),
                minutes:     -1,
                expected:    at(-2, 12, 31, 23, 59),
                description: "negative years",
            },
        ];

        for case in &cases {
            let mut value = case.start;
            value.add_minutes(case.minutes);
            assert_eq!(value, case.expected, "{}", case.description);
        }
    }

    #[test]
    fn test_add_minutes_keeps_seconds_and_fraction() {
        let mut value = at(2019, 1, 1, 0, 0).with_fraction(5, 6, 7).unwrap();
        value.second = 42;
        value.add_minutes(-1);
        assert_eq!((value.second, value.us, value.ps, value.as_), (42, 5, 6, 7));
    }

    #[test]
    fn test_display_uses_finest_nonzero_unit() {
        let value = at(2019, 6, 15, 21, 30);
        assert_eq!(value.to_string(), "2019-06-15T21:30Z");

        let value = value.with_fraction(123_000, 0, 0).unwrap();
        assert_eq!(value.to_string(), "2019-06-15T21:30:00.123Z");
    }

    #[test]
    fn test_from_str_zoned() {
        let value: DatetimeFields = "2019-06-15T23:30:00+0200".parse().unwrap();
        assert_eq!(value, at(2019, 6, 15, 21, 30));

        let value: DatetimeFields = "nat".parse().unwrap();
        assert!(value.is_nat());
    }

    #[test]
    fn test_serde() {
        let value = at(2019, 6, 15, 21, 30).with_fraction(1, 0, 0).unwrap();
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#""2019-06-15T21:30:00.000001Z""#);
        let parsed: DatetimeFields = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);

        let json = serde_json::to_string(&DatetimeFields::new(-44, 3, 15).unwrap()).unwrap();
        assert_eq!(json, r#""-044-03-15""#);
        let parsed: DatetimeFields = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, DatetimeFields::new(-44, 3, 15).unwrap());
    }

    #[test]
    fn test_serde_validation() {
        for json in [r#""2024-13""#, r#""2024-02-30""#, r#""2024-01-01T24:00""#, r#""yesterday""#] {
            let result: Result<DatetimeFields, _> = serde_json::from_str(json);
            assert!(result.is_err(), "{json} should be rejected");
        }
    }
}
