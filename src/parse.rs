//! Parsing of extended ISO 8601 datetime strings.
//!
//! Differences from strict ISO 8601:
//!
//! * The year has no fixed width and may be negative, so `20100312` is the
//!   year 20100312, not March 12th 2010. The `-` between date fields is
//!   mandatory.
//! * Either `T` or a single space separates the date from the time.
//! * Only seconds may have a fraction, with up to 18 digits (attoseconds).
//! * Week dates, ordinal dates, leap seconds and `24:00:00` are rejected.
//! * `NaT` (or the empty string), `today` and `now` are accepted in any case.

use crate::consts::{
    CLOCK_SEPARATOR, DATE_SEPARATOR, DAYS_IN_MONTH, FRACTION_COARSE_DIGITS, FRACTION_GROUP_DIGITS,
    FRACTION_SEPARATOR, HOURS_PER_DAY, JANUARY, LOCAL_YEAR_MAX, LOCAL_YEAR_MIN, MAX_MONTH,
    MIN_DAY, MINUTES_PER_HOUR, SECONDS_PER_MINUTE, TIME_SEPARATOR, TIME_SEPARATOR_ALT,
    UTC_DESIGNATOR,
};
use crate::host::Host;
use crate::types::{Casting, DatetimeUnit, Field, Special, is_leap_year};
use crate::{DatetimeFields, ParseError};

/// Everything the parser learns from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParsedDatetime {
    /// The value, normalized to UTC unless `local` is set and the year was
    /// outside the range the host converts
    pub value:   DatetimeFields,
    /// No `Z` or offset was given, so the text was read as host local time
    pub local:   bool,
    /// Finest unit the text actually spelled out
    pub unit:    DatetimeUnit,
    /// Set when the text was `NaT`, `today` or `now`
    pub special: Option<Special>,
}

impl ParsedDatetime {
    pub const fn is_special(&self) -> bool {
        self.special.is_some()
    }
}

/// Parses `text` into a calendar value.
///
/// `requested` is the unit the caller will store the value at, or `None` if
/// it is not yet known. When given, the unit detected from the text must be
/// castable to it under `casting`.
///
/// # Errors
/// Returns the first grammar violation or out-of-range field encountered,
/// `CastingRefused` if the detected unit cannot be cast to `requested`, or
/// `LocalTimeConversion` if the host fails.
pub fn parse_iso_8601_datetime<H>(
    text: &str,
    requested: Option<DatetimeUnit>,
    casting: Casting,
    host: &H,
) -> Result<ParsedDatetime, ParseError>
where
    H: Host + ?Sized,
{
    if text.is_empty() || text.eq_ignore_ascii_case("nat") {
        return Ok(ParsedDatetime {
            value:   DatetimeFields::nat(),
            local:   false,
            unit:    DatetimeUnit::Generic,
            special: Some(Special::NaT),
        });
    }

    if requested == Some(DatetimeUnit::Generic) {
        return Err(ParseError::GenericUnitWithConcreteValue);
    }

    // "today" is midnight of the host's local date, stored as UTC so that
    // truncating to days gives the date the user expects.
    if text.eq_ignore_ascii_case("today") {
        if let Some(requested) = requested.filter(|unit| *unit > DatetimeUnit::Day) {
            return Err(ParseError::UnsupportedUnitForSpecial {
                special: Special::Today,
                requested,
            });
        }
        check_casting(text, DatetimeUnit::Day, requested, casting)?;
        let local = host.utc_to_local(host.now_utc_seconds()?)?;
        return Ok(ParsedDatetime {
            value:   DatetimeFields {
                year: local.year,
                month: local.month,
                day: local.day,
                ..DatetimeFields::default()
            },
            local:   false,
            unit:    DatetimeUnit::Day,
            special: Some(Special::Today),
        });
    }

    if text.eq_ignore_ascii_case("now") {
        check_casting(text, DatetimeUnit::Second, requested, casting)?;
        return Ok(ParsedDatetime {
            value:   DatetimeFields::from_epoch_seconds(host.now_utc_seconds()?),
            local:   false,
            unit:    DatetimeUnit::Second,
            special: Some(Special::Now),
        });
    }

    let mut scanner = Scanner::new(text);
    let mut stage = Stage::Year;
    while stage != Stage::Finish {
        stage = scanner.step(stage, host)?;
    }
    trace!("parsed {text:?} at unit {}, local = {}", scanner.unit, scanner.local);

    check_casting(text, scanner.unit, requested, casting)?;
    Ok(ParsedDatetime {
        value:   scanner.out,
        local:   scanner.local,
        unit:    scanner.unit,
        special: None,
    })
}

fn check_casting(
    text: &str,
    detected: DatetimeUnit,
    requested: Option<DatetimeUnit>,
    casting: Casting,
) -> Result<(), ParseError> {
    match requested {
        Some(requested) if !casting.can_cast(detected, requested) => {
            debug!("refusing to cast {text:?} from {detected} to {requested} under {casting}");
            Err(ParseError::CastingRefused {
                text: text.to_owned(),
                detected,
                requested,
                casting,
            })
        },
        _ => Ok(()),
    }
}

/// One field of the grammar. Each stage either ends the scan cleanly or
/// hands over to a later stage; none is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Frac1,
    Frac2,
    Frac3,
    TimeZone,
    Finish,
}

struct Scanner<'a> {
    text:  &'a str,
    bytes: &'a [u8],
    pos:   usize,
    out:   DatetimeFields,
    unit:  DatetimeUnit,
    local: bool,
    leap:  bool,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            out: DatetimeFields {
                year: 0,
                ..DatetimeFields::default()
            },
            unit: DatetimeUnit::Year,
            local: false,
            leap: false,
        }
    }

    fn step<H>(&mut self, stage: Stage, host: &H) -> Result<Stage, ParseError>
    where
        H: Host + ?Sized,
    {
        match stage {
            Stage::Year => self.year(),
            Stage::Month => self.month(),
            Stage::Day => self.day(),
            Stage::Hour => self.hour(),
            Stage::Minute => self.minute(),
            Stage::Second => self.second(),
            Stage::Frac1 => Ok(self.fraction(Stage::Frac1)),
            Stage::Frac2 => Ok(self.fraction(Stage::Frac2)),
            Stage::Frac3 => Ok(self.fraction(Stage::Frac3)),
            Stage::TimeZone => self.time_zone(host),
            Stage::Finish => Ok(Stage::Finish),
        }
    }

    fn year(&mut self) -> Result<Stage, ParseError> {
        self.skip_whitespace();
        let negative = self.eat(DATE_SEPARATOR);

        let start = self.pos;
        let mut year: i64 = 0;
        while let Some(digit) = self.peek_digit() {
            year = year
                .checked_mul(10)
                .and_then(|year| year.checked_add(i64::from(digit)))
                .ok_or_else(|| self.out_of_range(Field::Year))?;
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.syntax_error());
        }

        self.out.year = if negative { -year } else { year };
        self.leap = is_leap_year(self.out.year);

        if self.at_end() {
            return Ok(self.finish_at(DatetimeUnit::Year));
        }
        self.expect(DATE_SEPARATOR)?;
        Ok(Stage::Month)
    }

    fn month(&mut self) -> Result<Stage, ParseError> {
        self.out.month = self.two_digits(Field::Month, JANUARY, MAX_MONTH)?;

        if self.at_end() {
            return Ok(self.finish_at(DatetimeUnit::Month));
        }
        self.expect(DATE_SEPARATOR)?;
        Ok(Stage::Day)
    }

    fn day(&mut self) -> Result<Stage, ParseError> {
        let max_day = i32::from(DAYS_IN_MONTH[usize::from(self.leap)][(self.out.month - 1) as usize]);
        self.out.day = self.two_digits(Field::Day, MIN_DAY, max_day)?;

        if self.at_end() {
            return Ok(self.finish_at(DatetimeUnit::Day));
        }
        if !(self.eat(TIME_SEPARATOR) || self.eat(TIME_SEPARATOR_ALT)) {
            return Err(self.syntax_error());
        }
        Ok(Stage::Hour)
    }

    fn hour(&mut self) -> Result<Stage, ParseError> {
        self.out.hour = self.two_digits(Field::Hour, 0, HOURS_PER_DAY - 1)?;
        Ok(self.clock_field_end(Stage::Minute, DatetimeUnit::Hour))
    }

    fn minute(&mut self) -> Result<Stage, ParseError> {
        self.out.minute = self.two_digits(Field::Minute, 0, MINUTES_PER_HOUR - 1)?;
        Ok(self.clock_field_end(Stage::Second, DatetimeUnit::Minute))
    }

    fn second(&mut self) -> Result<Stage, ParseError> {
        self.out.second = self.two_digits(Field::Second, 0, SECONDS_PER_MINUTE - 1)?;
        if self.eat(FRACTION_SEPARATOR) {
            return Ok(Stage::Frac1);
        }
        self.unit = DatetimeUnit::Second;
        Ok(Stage::TimeZone)
    }

    /// After hours or minutes: a `:` introduces the next field, anything
    /// else moves on to the time zone.
    fn clock_field_end(&mut self, next: Stage, unit: DatetimeUnit) -> Stage {
        if self.eat(CLOCK_SEPARATOR) {
            next
        } else {
            self.unit = unit;
            Stage::TimeZone
        }
    }

    /// Reads up to six digits into the group for `stage`. Missing digits
    /// count as trailing zeros; only the digits present decide between the
    /// coarse and fine unit of the group.
    fn fraction(&mut self, stage: Stage) -> Stage {
        let mut value = 0;
        let mut digits = 0;
        for _ in 0..FRACTION_GROUP_DIGITS {
            value *= 10;
            if let Some(digit) = self.peek_digit() {
                value += i32::from(digit);
                self.pos += 1;
                digits += 1;
            }
        }

        let (slot, coarse, fine, next) = match stage {
            Stage::Frac1 => (
                &mut self.out.us,
                DatetimeUnit::Millisecond,
                DatetimeUnit::Microsecond,
                Some(Stage::Frac2),
            ),
            Stage::Frac2 => (
                &mut self.out.ps,
                DatetimeUnit::Nanosecond,
                DatetimeUnit::Picosecond,
                Some(Stage::Frac3),
            ),
            _ => (
                &mut self.out.as_,
                DatetimeUnit::Femtosecond,
                DatetimeUnit::Attosecond,
                None,
            ),
        };
        *slot = value;

        match next {
            Some(next) if self.peek_digit().is_some() => next,
            _ => {
                self.unit = if digits > FRACTION_COARSE_DIGITS {
                    fine
                } else {
                    coarse
                };
                Stage::TimeZone
            },
        }
    }

    fn time_zone<H>(&mut self, host: &H) -> Result<Stage, ParseError>
    where
        H: Host + ?Sized,
    {
        if self.bytes[self.pos..].iter().all(u8::is_ascii_whitespace) {
            self.local = true;
            self.convert_local(host)?;
            return Ok(Stage::Finish);
        }

        match self.peek() {
            Some(UTC_DESIGNATOR) => self.pos += 1,
            Some(sign @ (b'+' | b'-')) => {
                self.pos += 1;
                let hours = self.two_digits(Field::OffsetHours, 0, HOURS_PER_DAY - 1)?;
                let mut minutes = 0;
                if !self.at_end() {
                    self.eat(CLOCK_SEPARATOR);
                    minutes = self.two_digits(Field::OffsetMinutes, 0, MINUTES_PER_HOUR - 1)?;
                }
                let offset = i64::from(hours * MINUTES_PER_HOUR + minutes);
                self.out
                    .add_minutes(if sign == b'-' { offset } else { -offset });
            },
            _ => {},
        }

        self.skip_whitespace();
        if !self.at_end() {
            return Err(self.syntax_error());
        }
        Ok(Stage::Finish)
    }

    /// A timestamp without `Z` or an offset is local time. Only years the
    /// host can be trusted with are converted.
    fn convert_local<H>(&mut self, host: &H) -> Result<(), ParseError>
    where
        H: Host + ?Sized,
    {
        if self.out.year <= LOCAL_YEAR_MIN || self.out.year >= LOCAL_YEAR_MAX {
            return Ok(());
        }
        let utc = DatetimeFields::from_epoch_seconds(host.local_to_utc(&self.out)?);
        debug!("converted local {:?} to UTC {:?}", self.text, utc);
        self.out = DatetimeFields {
            us: self.out.us,
            ps: self.out.ps,
            as_: self.out.as_,
            ..utc
        };
        Ok(())
    }

    fn finish_at(&mut self, unit: DatetimeUnit) -> Stage {
        self.unit = unit;
        Stage::Finish
    }

    /// Exactly two digits, range checked as soon as they are read
    fn two_digits(&mut self, field: Field, min: i32, max: i32) -> Result<i32, ParseError> {
        let (Some(tens), Some(ones)) = (self.digit_at(self.pos), self.digit_at(self.pos + 1)) else {
            return Err(self.syntax_error());
        };
        let value = i32::from(tens) * 10 + i32::from(ones);
        if !(min..=max).contains(&value) {
            return Err(self.out_of_range(field));
        }
        self.pos += 2;
        Ok(value)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn digit_at(&self, pos: usize) -> Option<u8> {
        self.bytes
            .get(pos)
            .filter(|b| b.is_ascii_digit())
            .map(|b| b - b'0')
    }

    fn peek_digit(&self) -> Option<u8> {
        self.digit_at(self.pos)
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), ParseError> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.syntax_error())
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn syntax_error(&self) -> ParseError {
        debug!("syntax error in {:?} at position {}", self.text, self.pos);
        ParseError::InvalidSyntax {
            text:     self.text.to_owned(),
            position: self.pos,
        }
    }

    fn out_of_range(&self, field: Field) -> ParseError {
        debug!("{field} out of range in {:?}", self.text);
        ParseError::FieldOutOfRange {
            text: self.text.to_owned(),
            field,
        }
    }
}
