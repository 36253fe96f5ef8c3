/// Year value reserved for Not-a-Time; every other field is ignored when set
pub const NAT_YEAR: i64 = i64::MIN;

/// Text written for a Not-a-Time value
pub const NAT_STR: &str = "NaT";

/// Buffer length needed to render `NaT` plus the terminator
pub const NAT_STRLEN: usize = 4;

/// Largest buffer any rendering can need: 64-bit year, every field down to
/// attoseconds, a numeric offset and the terminator
pub const MAX_ISO8601_STRLEN: usize = 21 + 3 * 5 + 1 + 3 * 6 + 6 + 1;

/// Maximum valid month (December)
pub const MAX_MONTH: i32 = 12;

/// First day of month, used for lower bounds
pub const MIN_DAY: i32 = 1;

/// Month number for January
pub const JANUARY: i32 = 1;

/// Hours in a day
pub const HOURS_PER_DAY: i32 = 24;
/// Minutes in an hour
pub const MINUTES_PER_HOUR: i32 = 60;
/// Seconds in a minute
pub const SECONDS_PER_MINUTE: i32 = 60;
/// Minutes in a day, used for offset carry
pub const MINUTES_PER_DAY: i64 = 24 * 60;
/// Seconds in a day
pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Number of decimal digits in each sub-second group
pub const FRACTION_GROUP_DIGITS: usize = 6;
/// Digits given in a group beyond which the finer unit of that group is chosen
pub const FRACTION_COARSE_DIGITS: usize = 3;
/// Upper bound (exclusive) of a sub-second group
pub const FRACTION_GROUP_MAX: i32 = 1_000_000;

/// Years strictly above this are eligible for host local-time conversion
pub const LOCAL_YEAR_MIN: i64 = 1900;
/// Years strictly below this are eligible for host local-time conversion
pub const LOCAL_YEAR_MAX: i64 = 10000;

/// Days in each month, indexed by `[is_leap as usize][month - 1]`
pub const DAYS_IN_MONTH: [[u8; 12]; 2] = [
    [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31],
    [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31],
];

/// Leap year occurs every 4 years
pub(crate) const LEAP_YEAR_CYCLE: i64 = 4;
/// Century years are not leap years unless...
pub(crate) const CENTURY_CYCLE: i64 = 100;
/// ...they are divisible by 400 (Gregorian calendar correction)
pub(crate) const GREGORIAN_CYCLE: i64 = 400;

/// Date component separator
pub const DATE_SEPARATOR: u8 = b'-';
/// Date/time separator written by the formatter (a space is also accepted)
pub const TIME_SEPARATOR: u8 = b'T';
/// Alternate date/time separator accepted by the parser
pub const TIME_SEPARATOR_ALT: u8 = b' ';
/// Separator between hour, minute and second
pub const CLOCK_SEPARATOR: u8 = b':';
/// Introduces fractional seconds
pub const FRACTION_SEPARATOR: u8 = b'.';
/// UTC designator
pub const UTC_DESIGNATOR: u8 = b'Z';
