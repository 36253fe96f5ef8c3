//! Rendering of calendar values as extended ISO 8601 strings.

use crate::consts::{
    CLOCK_SEPARATOR, DATE_SEPARATOR, FRACTION_SEPARATOR, LOCAL_YEAR_MAX, LOCAL_YEAR_MIN,
    MAX_ISO8601_STRLEN, MINUTES_PER_DAY, MINUTES_PER_HOUR, NAT_STR, NAT_STRLEN, SECONDS_PER_MINUTE,
    TIME_SEPARATOR, UTC_DESIGNATOR,
};
use crate::host::HostTimeZone;
use crate::types::{DatetimeUnit, Field};
use crate::{DatetimeFields, ParseError};

/// Characters each unit adds on top of the next coarser one, indexed by
/// [`DatetimeUnit::index`]. Weeks render like days, so they add nothing.
const UNIT_WIDTHS: [usize; 14] = [
    0,  // generic
    21, // 64-bit year with sign
    3,  // "-MM"
    0,  // week
    3,  // "-DD"
    3,  // "Thh"
    3,  // ":mm"
    3,  // ":ss"
    4,  // ".###"
    3,  // "###" microseconds
    3,  // "###" nanoseconds
    3,  // "###" picoseconds
    3,  // "###" femtoseconds
    3,  // "###" attoseconds
];

/// Width of a "+hhmm" suffix
const OFFSET_WIDTH: usize = 5;
/// Width of a "Z" suffix
const UTC_WIDTH: usize = 1;

/// Buffer length, terminator included, that always suffices to render a value
/// at `unit`. `None` asks for a bound that covers every unit.
pub fn get_datetime_iso_8601_strlen(local: bool, unit: Option<DatetimeUnit>) -> usize {
    let Some(unit) = unit else {
        return MAX_ISO8601_STRLEN;
    };
    if unit == DatetimeUnit::Generic {
        return NAT_STRLEN;
    }
    let unit = if unit == DatetimeUnit::Week {
        DatetimeUnit::Day
    } else {
        unit
    };

    let mut len: usize = UNIT_WIDTHS[..=unit.index()].iter().sum();
    if unit.is_time_unit() {
        len += if local { OFFSET_WIDTH } else { UTC_WIDTH };
    }
    len + 1
}

/// Writes `value` into `out` as a NUL-terminated ISO 8601 string and returns
/// the number of bytes written before the terminator.
///
/// With `local` set the value is shown in local time with a `+hhmm` suffix,
/// using `tz_offset` minutes if given and the host time zone otherwise;
/// without it the value is shown in UTC with a `Z` suffix. Date-only units
/// never carry a suffix. `unit` of `None` picks the coarsest unit that loses
/// nothing.
///
/// # Errors
/// Returns `BufferTooShort` if `out` cannot hold the text and its terminator.
/// `out` is still NUL-terminated at its last byte in that case. Returns
/// `InvalidField` if `tz_offset` is a day or more, and
/// `LocalTimeConversion` if the host fails.
pub fn make_iso_8601_datetime<H>(
    value: &DatetimeFields,
    out: &mut [u8],
    local: bool,
    unit: Option<DatetimeUnit>,
    tz_offset: Option<i32>,
    host: &H,
) -> Result<usize, ParseError>
where
    H: HostTimeZone + ?Sized,
{
    if value.is_nat() || unit == Some(DatetimeUnit::Generic) {
        let mut writer = IsoWriter::new(out, NAT_STRLEN);
        writer.try_write(NAT_STR.as_bytes())?;
        return Ok(writer.finish());
    }

    let mut local = local;
    if (value.year <= LOCAL_YEAR_MIN || value.year >= LOCAL_YEAR_MAX) && tz_offset.is_none() {
        local = false;
    }

    let unit = match unit {
        None => detect_unit(value, local),
        Some(DatetimeUnit::Week) => DatetimeUnit::Day,
        Some(unit) => unit,
    };

    // Dates have no time zone
    if !unit.is_time_unit() {
        local = false;
    }

    let (shown, offset) = if local {
        match tz_offset {
            Some(offset) => {
                if !offset_in_range(offset) {
                    return Err(ParseError::InvalidField {
                        field: Field::OffsetHours,
                        value: i64::from(offset),
                    });
                }
                let mut shifted = *value;
                shifted.add_minutes(i64::from(offset));
                (shifted, offset)
            },
            None => to_host_local(value, host)?,
        }
    } else {
        (*value, 0)
    };

    let mut writer = IsoWriter::new(out, get_datetime_iso_8601_strlen(local, Some(unit)));
    write_fields(&mut writer, &shown, unit)?;
    if unit.is_time_unit() {
        if local {
            writer.try_write(&offset_suffix(offset))?;
        } else {
            writer.try_write(&[UTC_DESIGNATOR])?;
        }
    }
    Ok(writer.finish())
}

/// Coarsest unit that shows every non-zero field. Hours and minutes are
/// never split, and a local rendering always shows minutes.
fn detect_unit(value: &DatetimeFields, local: bool) -> DatetimeUnit {
    if value.as_ % 1000 != 0 {
        DatetimeUnit::Attosecond
    } else if value.as_ != 0 {
        DatetimeUnit::Femtosecond
    } else if value.ps % 1000 != 0 {
        DatetimeUnit::Picosecond
    } else if value.ps != 0 {
        DatetimeUnit::Nanosecond
    } else if value.us % 1000 != 0 {
        DatetimeUnit::Microsecond
    } else if value.us != 0 {
        DatetimeUnit::Millisecond
    } else if value.second != 0 {
        DatetimeUnit::Second
    } else if local || value.minute != 0 || value.hour != 0 {
        DatetimeUnit::Minute
    } else {
        DatetimeUnit::Day
    }
}

/// Converts a UTC value to the host's wall clock, to minute precision, and
/// returns it with the offset that was applied.
fn to_host_local<H>(value: &DatetimeFields, host: &H) -> Result<(DatetimeFields, i32), ParseError>
where
    H: HostTimeZone + ?Sized,
{
    let utc_minutes = minutes_since_epoch(value);
    let converted = host.utc_to_local(utc_minutes * i64::from(SECONDS_PER_MINUTE))?;

    let local = DatetimeFields {
        year: converted.year,
        month: converted.month,
        day: converted.day,
        hour: converted.hour,
        minute: converted.minute,
        ..*value
    };
    let offset = i32::try_from(minutes_since_epoch(&local) - utc_minutes)
        .map_err(|err| ParseError::LocalTimeConversion(err.to_string()))?;
    if !offset_in_range(offset) {
        return Err(ParseError::LocalTimeConversion(format!(
            "host offset of {offset} minutes exceeds a day"
        )));
    }
    trace!("host offset for {value} is {offset} minutes");
    Ok((local, offset))
}

/// Offsets of a day or more cannot be written as "+hhmm"
fn offset_in_range(offset: i32) -> bool {
    i64::from(offset).abs() < MINUTES_PER_DAY
}

fn minutes_since_epoch(value: &DatetimeFields) -> i64 {
    value.epoch_days() * MINUTES_PER_DAY
        + i64::from(value.hour * MINUTES_PER_HOUR + value.minute)
}

/// Emits the year and every field down to `unit`, coarsest first.
fn write_fields(
    writer: &mut IsoWriter<'_>,
    value: &DatetimeFields,
    unit: DatetimeUnit,
) -> Result<(), ParseError> {
    writer.try_write(format!("{:04}", value.year).as_bytes())?;

    let clock = [
        (DatetimeUnit::Month, DATE_SEPARATOR, value.month),
        (DatetimeUnit::Day, DATE_SEPARATOR, value.day),
        (DatetimeUnit::Hour, TIME_SEPARATOR, value.hour),
        (DatetimeUnit::Minute, CLOCK_SEPARATOR, value.minute),
        (DatetimeUnit::Second, CLOCK_SEPARATOR, value.second),
    ];
    for (step, separator, field) in clock {
        if unit < step {
            return Ok(());
        }
        writer.try_write(&[separator, digit(field / 10), digit(field)])?;
    }

    let fraction = [
        (DatetimeUnit::Millisecond, value.us / 1000),
        (DatetimeUnit::Microsecond, value.us),
        (DatetimeUnit::Nanosecond, value.ps / 1000),
        (DatetimeUnit::Picosecond, value.ps),
        (DatetimeUnit::Femtosecond, value.as_ / 1000),
        (DatetimeUnit::Attosecond, value.as_),
    ];
    for (step, group) in fraction {
        if unit < step {
            return Ok(());
        }
        if step == DatetimeUnit::Millisecond {
            writer.try_write(&[FRACTION_SEPARATOR])?;
        }
        writer.try_write(&[digit(group / 100), digit(group / 10), digit(group)])?;
    }
    Ok(())
}

/// "+hhmm" or "-hhmm"
fn offset_suffix(offset: i32) -> [u8; 5] {
    let sign = if offset < 0 { b'-' } else { b'+' };
    let offset = offset.abs();
    let (hours, minutes) = (offset / MINUTES_PER_HOUR, offset % MINUTES_PER_HOUR);
    [
        sign,
        digit(hours / 10),
        digit(hours),
        digit(minutes / 10),
        digit(minutes),
    ]
}

/// ASCII for the last decimal digit of `value`
fn digit(value: i32) -> u8 {
    b'0' + value.rem_euclid(10) as u8
}

/// Write cursor over a caller-provided buffer that never writes past its
/// end and always keeps one byte for the NUL terminator.
pub(crate) struct IsoWriter<'data> {
    data:        &'data mut [u8],
    filled:      usize,
    needed_hint: usize,
}

impl<'data> IsoWriter<'data> {
    pub(crate) fn new(data: &'data mut [u8], needed_hint: usize) -> Self {
        Self {
            data,
            filled: 0,
            needed_hint,
        }
    }

    /// Appends `bytes` if they fit with room to spare for the terminator.
    /// Otherwise writes the prefix that fits, terminates the buffer at its
    /// last byte and reports `BufferTooShort`.
    pub(crate) fn try_write(&mut self, bytes: &[u8]) -> Result<(), ParseError> {
        let room = self.data.len().saturating_sub(self.filled + 1);
        if bytes.len() > room {
            self.data[self.filled..self.filled + room].copy_from_slice(&bytes[..room]);
            if let Some(last) = self.data.last_mut() {
                *last = 0;
            }
            debug!(
                "datetime rendering needs more than {} bytes (hint {})",
                self.data.len(),
                self.needed_hint
            );
            return Err(ParseError::BufferTooShort {
                provided:    self.data.len(),
                needed_hint: self.needed_hint,
            });
        }
        self.data[self.filled..self.filled + bytes.len()].copy_from_slice(bytes);
        self.filled += bytes.len();
        Ok(())
    }

    /// Terminates the text and returns its length.
    pub(crate) fn finish(self) -> usize {
        if let Some(terminator) = self.data.get_mut(self.filled) {
            *terminator = 0;
        }
        self.filled
    }
}
