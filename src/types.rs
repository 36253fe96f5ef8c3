use crate::consts::{
    CENTURY_CYCLE, DAYS_IN_MONTH, GREGORIAN_CYCLE, LEAP_YEAR_CYCLE, MAX_MONTH,
};
use crate::ParseError;
use crate::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Precision of a datetime, ordered from coarsest to finest.
///
/// The ordering is significant: casting rules compare units to decide
/// whether a conversion would truncate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
pub enum DatetimeUnit {
    /// Only valid for Not-a-Time
    #[display(fmt = "generic")]
    #[serde(rename = "generic")]
    Generic,
    #[display(fmt = "Y")]
    #[serde(rename = "Y")]
    Year,
    #[display(fmt = "M")]
    #[serde(rename = "M")]
    Month,
    #[display(fmt = "W")]
    #[serde(rename = "W")]
    Week,
    #[display(fmt = "D")]
    #[serde(rename = "D")]
    Day,
    #[display(fmt = "h")]
    #[serde(rename = "h")]
    Hour,
    #[display(fmt = "m")]
    #[serde(rename = "m")]
    Minute,
    #[display(fmt = "s")]
    #[serde(rename = "s")]
    Second,
    #[display(fmt = "ms")]
    #[serde(rename = "ms")]
    Millisecond,
    #[display(fmt = "us")]
    #[serde(rename = "us")]
    Microsecond,
    #[display(fmt = "ns")]
    #[serde(rename = "ns")]
    Nanosecond,
    #[display(fmt = "ps")]
    #[serde(rename = "ps")]
    Picosecond,
    #[display(fmt = "fs")]
    #[serde(rename = "fs")]
    Femtosecond,
    #[display(fmt = "as")]
    #[serde(rename = "as")]
    Attosecond,
}

impl DatetimeUnit {
    /// All units, coarsest first
    pub const ALL: [Self; 14] = [
        Self::Generic,
        Self::Year,
        Self::Month,
        Self::Week,
        Self::Day,
        Self::Hour,
        Self::Minute,
        Self::Second,
        Self::Millisecond,
        Self::Microsecond,
        Self::Nanosecond,
        Self::Picosecond,
        Self::Femtosecond,
        Self::Attosecond,
    ];

    /// Position of this unit in the coarse-to-fine ordering
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Year, month, week or day
    pub const fn is_date_unit(self) -> bool {
        matches!(self, Self::Year | Self::Month | Self::Week | Self::Day)
    }

    /// Hour or anything finer
    pub const fn is_time_unit(self) -> bool {
        self.index() >= Self::Hour.index()
    }
}

impl FromStr for DatetimeUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|unit| unit.to_string() == s)
            .ok_or_else(|| ParseError::InvalidUnit(s.to_owned()))
    }
}

/// Rule governing which precision changes are allowed after parsing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Casting {
    /// Units must match exactly
    #[display(fmt = "'no'")]
    No,
    /// Units must match exactly
    #[display(fmt = "'equiv'")]
    Equiv,
    /// Coarse to fine only, without crossing between date and time units
    #[display(fmt = "'safe'")]
    Safe,
    /// Coarse to fine only
    #[default]
    #[display(fmt = "'same_kind'")]
    SameKind,
    /// Anything goes
    #[display(fmt = "'unsafe'")]
    Unsafe,
}

impl Casting {
    /// Returns whether a value detected at `from` may be stored at `to`.
    pub fn can_cast(self, from: DatetimeUnit, to: DatetimeUnit) -> bool {
        use DatetimeUnit::Generic;

        match self {
            Self::Unsafe => true,
            Self::No | Self::Equiv => from == to,
            Self::SameKind | Self::Safe if from == Generic || to == Generic => from == Generic,
            Self::SameKind => from <= to,
            Self::Safe => from <= to && from.is_date_unit() == to.is_date_unit(),
        }
    }
}

/// Names the calendar field an out-of-range error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Field {
    #[display(fmt = "Year")]
    Year,
    #[display(fmt = "Month")]
    Month,
    #[display(fmt = "Day")]
    Day,
    #[display(fmt = "Hours")]
    Hour,
    #[display(fmt = "Minutes")]
    Minute,
    #[display(fmt = "Seconds")]
    Second,
    #[display(fmt = "Sub-second group")]
    Fraction,
    #[display(fmt = "Timezone hours offset")]
    OffsetHours,
    #[display(fmt = "Timezone minutes offset")]
    OffsetMinutes,
}

/// The special strings the parser recognises besides ISO dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Special {
    #[display(fmt = "NaT")]
    NaT,
    #[display(fmt = "today")]
    Today,
    #[display(fmt = "now")]
    Now,
}

// Helper functions

pub const fn is_leap_year(year: i64) -> bool {
    (year % LEAP_YEAR_CYCLE == 0 && year % CENTURY_CYCLE != 0) || (year % GREGORIAN_CYCLE == 0)
}

pub const fn days_in_month(year: i64, month: i32) -> i32 {
    debug_assert!(month >= 1 && month <= MAX_MONTH);

    DAYS_IN_MONTH[is_leap_year(year) as usize][(month - 1) as usize] as i32
}

/// Days since 1970-01-01 for a proleptic Gregorian date
pub const fn days_from_civil(year: i64, month: i32, day: i32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let yoe = year - era * 400;
    let month = month as i64;
    let doy = (153 * (month + if month > 2 { -3 } else { 9 }) + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Inverse of [`days_from_civil`]: `(year, month, day)`
pub const fn civil_from_days(days: i64) -> (i64, i32, i32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as i32;
    let month = (mp + if mp < 10 { 3 } else { -9 }) as i32;
    let year = yoe + era * 400;
    (if month <= 2 { year + 1 } else { year }, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use DatetimeUnit::*;

    #[test]
    fn test_unit_ordering() {
        assert!(Generic < Year);
        assert!(Year < Month);
        assert!(Month < Week);
        assert!(Week < Day);
        assert!(Day < Hour);
        assert!(Second < Millisecond);
        assert!(Femtosecond < Attosecond);
        for pair in DatetimeUnit::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{} should be coarser than {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_unit_display_and_from_str() {
        for unit in DatetimeUnit::ALL {
            let code = unit.to_string();
            assert_eq!(code.parse::<DatetimeUnit>().unwrap(), unit, "code {code}");
        }
        assert_eq!(Microsecond.to_string(), "us");
        assert_eq!(Minute.to_string(), "m");
        assert_eq!(Month.to_string(), "M");
        assert!(matches!(
            "fortnight".parse::<DatetimeUnit>(),
            Err(ParseError::InvalidUnit(s)) if s == "fortnight"
        ));
    }

    #[test]
    fn test_unit_serde() {
        let json = serde_json::to_string(&Nanosecond).unwrap();
        assert_eq!(json, r#""ns""#);
        let parsed: DatetimeUnit = serde_json::from_str(r#""D""#).unwrap();
        assert_eq!(parsed, Day);
    }

    #[test]
    fn test_unit_kinds() {
        assert!(Year.is_date_unit());
        assert!(Day.is_date_unit());
        assert!(!Hour.is_date_unit());
        assert!(!Generic.is_date_unit());
        assert!(Hour.is_time_unit());
        assert!(Attosecond.is_time_unit());
        assert!(!Day.is_time_unit());
    }

    #[test]
    fn test_can_cast_cases() {
        struct TestCase {
            casting:     Casting,
            from:        DatetimeUnit,
            to:          DatetimeUnit,
            allowed:     bool,
            description: &'static str,
        }

        let cases = [
            TestCase {
                casting:     Casting::Unsafe,
                from:        Attosecond,
                to:          Year,
                allowed:     true,
                description: "unsafe allows truncation",
            },
            TestCase {
                casting:     Casting::SameKind,
                from:        Microsecond,
                to:          Hour,
                allowed:     false,
                description: "same_kind refuses truncation",
            },
            TestCase {
                casting:     Casting::SameKind,
                from:        Day,
                to:          Second,
                allowed:     true,
                description: "same_kind crosses the date/time barrier",
            },
            TestCase {
                casting:     Casting::Safe,
                from:        Day,
                to:          Second,
                allowed:     false,
                description: "safe keeps dates and times apart",
            },
            TestCase {
                casting:     Casting::Safe,
                from:        Year,
                to:          Day,
                allowed:     true,
                description: "safe allows coarse to fine dates",
            },
            TestCase {
                casting:     Casting::Safe,
                from:        Generic,
                to:          Second,
                allowed:     true,
                description: "generic casts to anything",
            },
            TestCase {
                casting:     Casting::SameKind,
                from:        Second,
                to:          Generic,
                allowed:     false,
                description: "nothing concrete casts to generic",
            },
            TestCase {
                casting:     Casting::Equiv,
                from:        Second,
                to:          Second,
                allowed:     true,
                description: "equiv allows identical units",
            },
            TestCase {
                casting:     Casting::No,
                from:        Second,
                to:          Millisecond,
                allowed:     false,
                description: "no refuses any change",
            },
        ];

        for case in &cases {
            assert_eq!(
                case.casting.can_cast(case.from, case.to),
                case.allowed,
                "{} -> {} under {} ({})",
                case.from,
                case.to,
                case.casting,
                case.description
            );
        }
    }

    #[test]
    fn test_casting_display() {
        assert_eq!(Casting::SameKind.to_string(), "'same_kind'");
        assert_eq!(Casting::default(), Casting::SameKind);
        let json = serde_json::to_string(&Casting::SameKind).unwrap();
        assert_eq!(json, r#""same_kind""#);
    }

    #[test]
    fn test_is_leap_year_cases() {
        struct TestCase {
            year:        i64,
            is_leap:     bool,
            description: &'static str,
        }

        let cases = [
            TestCase { year: 2024, is_leap: true, description: "divisible by 4" },
            TestCase { year: 2023, is_leap: false, description: "not divisible by 4" },
            TestCase { year: 1900, is_leap: false, description: "century not divisible by 400" },
            TestCase { year: 2100, is_leap: false, description: "century not divisible by 400" },
            TestCase { year: 2000, is_leap: true, description: "divisible by 400" },
            TestCase { year: 0, is_leap: true, description: "year zero is divisible by 400" },
            TestCase { year: -4, is_leap: true, description: "negative divisible by 4" },
            TestCase { year: -100, is_leap: false, description: "negative century" },
            TestCase { year: -400, is_leap: true, description: "negative divisible by 400" },
            TestCase { year: -1, is_leap: false, description: "negative odd year" },
        ];

        for case in &cases {
            assert_eq!(
                is_leap_year(case.year),
                case.is_leap,
                "Year {} ({})",
                case.year,
                case.description
            );
        }
    }

    #[test]
    fn test_days_in_month() {
        for month in [1, 3, 5, 7, 8, 10, 12] {
            assert_eq!(days_in_month(2023, month), 31, "Month {month} should have 31 days");
        }
        for month in [4, 6, 9, 11] {
            assert_eq!(days_in_month(2023, month), 30, "Month {month} should have 30 days");
        }
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
    }

    #[test]
    fn test_days_from_civil() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(1970, 1, 2), 1);
        assert_eq!(days_from_civil(1969, 12, 31), -1);
        assert_eq!(days_from_civil(2000, 3, 1), 11_017);
        assert_eq!(days_from_civil(0, 3, 1), -719_468);
    }

    #[test]
    fn test_civil_from_days_inverts() {
        for days in [-1_000_000, -719_469, -1, 0, 1, 11_016, 11_017, 18_262, 2_932_896] {
            let (y, m, d) = civil_from_days(days);
            assert_eq!(days_from_civil(y, m, d), days, "day number {days}");
        }
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
        assert_eq!(civil_from_days(11_016), (2000, 2, 29));
    }
}
