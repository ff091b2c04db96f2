//! Joda-style timestamp patterns rendered in a configured time zone.
//!
//! Patterns are compiled once into a token list when the appender is
//! configured, so formatting an event only walks the tokens. The pattern
//! language follows the Joda-Time `DateTimeFormat` letters operators already
//! write in their appender configuration (`yyyy-MM-dd'T'HH:mm:ssZ`).

use std::fmt::Write as _;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Offset, Timelike, Utc};
use chrono_tz::Tz;

pub const DEFAULT_TIME_FORMAT: &str = "yyyy-MM-dd'T'HH:mm:ssZ";
pub const DEFAULT_TIME_ZONE: &str = "UTC";

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Error returned when a time pattern or zone id cannot be used.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeFormatError {
    #[error("illegal pattern component '{component}' in time format \"{pattern}\"")]
    IllegalComponent { pattern: String, component: char },

    #[error("unknown time zone id \"{0}\"")]
    UnknownZone(String),
}

/// Time zone a [`TimeFormatter`] renders in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// IANA zone, e.g. `Asia/Shanghai` or `UTC`.
    Named(Tz),
    /// Fixed offset written as `+hh`, `+hhmm` or `+hh:mm`.
    Fixed(FixedOffset),
}

impl Zone {
    pub fn parse(id: &str) -> Result<Self, TimeFormatError> {
        if let Some(offset) = parse_fixed_offset(id) {
            return Ok(Zone::Fixed(offset));
        }
        id.parse::<Tz>()
            .map(Zone::Named)
            .map_err(|_| TimeFormatError::UnknownZone(id.to_string()))
    }

    /// Zone id as printed by the `ZZZ` pattern component.
    pub fn id(&self) -> String {
        match self {
            Zone::Named(tz) => tz.name().to_string(),
            Zone::Fixed(offset) => offset.to_string(),
        }
    }
}

fn parse_fixed_offset(id: &str) -> Option<FixedOffset> {
    let sign = match id.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let rest = &id[1..];
    if !rest.is_ascii() {
        return None;
    }
    let (hours, minutes) = match rest.len() {
        2 => (rest, "00"),
        4 => (&rest[..2], &rest[2..]),
        5 if rest.as_bytes()[2] == b':' => (&rest[..2], &rest[3..]),
        _ => return None,
    };
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Era,
    Century,
    YearOfEra,
    WeekYear,
    WeekOfWeekYear,
    DayOfWeekNumber,
    DayOfWeekText,
    Year,
    DayOfYear,
    Month,
    DayOfMonth,
    HalfDay,
    HourOfHalfDay,
    ClockHourOfHalfDay,
    HourOfDay,
    ClockHourOfDay,
    Minute,
    Second,
    Fraction,
    ZoneName,
    ZoneOffset,
}

impl Field {
    fn from_letter(c: char) -> Option<Self> {
        let field = match c {
            'G' => Field::Era,
            'C' => Field::Century,
            'Y' => Field::YearOfEra,
            'x' => Field::WeekYear,
            'w' => Field::WeekOfWeekYear,
            'e' => Field::DayOfWeekNumber,
            'E' => Field::DayOfWeekText,
            'y' => Field::Year,
            'D' => Field::DayOfYear,
            'M' => Field::Month,
            'd' => Field::DayOfMonth,
            'a' => Field::HalfDay,
            'K' => Field::HourOfHalfDay,
            'h' => Field::ClockHourOfHalfDay,
            'H' => Field::HourOfDay,
            'k' => Field::ClockHourOfDay,
            'm' => Field::Minute,
            's' => Field::Second,
            'S' => Field::Fraction,
            'z' => Field::ZoneName,
            'Z' => Field::ZoneOffset,
            _ => return None,
        };
        Some(field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Field { field: Field, count: usize },
}

fn compile(pattern: &str) -> Result<Vec<Token>, TimeFormatError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                literal.push('\'');
                i += 2;
                continue;
            }
            // Quoted text runs to the closing quote or the end of the pattern.
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        literal.push('\'');
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                literal.push(chars[i]);
                i += 1;
            }
            continue;
        }

        if c.is_ascii_alphabetic() {
            let field = Field::from_letter(c).ok_or_else(|| TimeFormatError::IllegalComponent {
                pattern: pattern.to_string(),
                component: c,
            })?;
            let start = i;
            while i < chars.len() && chars[i] == c {
                i += 1;
            }
            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(Token::Field {
                field,
                count: i - start,
            });
            continue;
        }

        literal.push(c);
        i += 1;
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

struct Localized {
    datetime: NaiveDateTime,
    offset_seconds: i32,
    abbreviation: String,
}

/// Compiled timestamp pattern bound to a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormatter {
    pattern: String,
    zone: Zone,
    tokens: Vec<Token>,
}

impl TimeFormatter {
    /// Compile `pattern` and resolve `zone_id`.
    pub fn new(pattern: &str, zone_id: &str) -> Result<Self, TimeFormatError> {
        let tokens = compile(pattern)?;
        let zone = Zone::parse(zone_id)?;
        Ok(Self {
            pattern: pattern.to_string(),
            zone,
            tokens,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// Render an epoch-millisecond timestamp, `None` when it is out of range.
    pub fn format_millis(&self, millis: i64) -> Option<String> {
        DateTime::from_timestamp_millis(millis).map(|ts| self.format(&ts))
    }

    pub fn format(&self, timestamp: &DateTime<Utc>) -> String {
        let local = self.localize(timestamp);
        let mut out = String::with_capacity(self.pattern.len() + 8);
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Field { field, count } => self.write_field(&mut out, *field, *count, &local),
            }
        }
        out
    }

    fn localize(&self, timestamp: &DateTime<Utc>) -> Localized {
        match self.zone {
            Zone::Named(tz) => {
                let local = timestamp.with_timezone(&tz);
                Localized {
                    datetime: local.naive_local(),
                    offset_seconds: local.offset().fix().local_minus_utc(),
                    abbreviation: local.offset().to_string(),
                }
            }
            Zone::Fixed(offset) => Localized {
                datetime: timestamp.with_timezone(&offset).naive_local(),
                offset_seconds: offset.local_minus_utc(),
                abbreviation: offset.to_string(),
            },
        }
    }

    fn write_field(&self, out: &mut String, field: Field, count: usize, local: &Localized) {
        let dt = &local.datetime;
        match field {
            Field::Era => out.push_str(if dt.year() > 0 { "AD" } else { "BC" }),
            Field::Century => pad(out, i64::from(dt.year().div_euclid(100)), count),
            Field::Year => write_year(out, i64::from(dt.year()), count),
            Field::YearOfEra => {
                let year = dt.year();
                let year = if year > 0 { year } else { 1 - year };
                write_year(out, i64::from(year), count);
            }
            Field::WeekYear => write_year(out, i64::from(dt.iso_week().year()), count),
            Field::WeekOfWeekYear => pad(out, i64::from(dt.iso_week().week()), count),
            Field::DayOfWeekNumber => pad(out, i64::from(dt.weekday().number_from_monday()), count),
            Field::DayOfWeekText => {
                let name = WEEKDAYS[dt.weekday().num_days_from_monday() as usize];
                out.push_str(if count >= 4 { name } else { &name[..3] });
            }
            Field::DayOfYear => pad(out, i64::from(dt.ordinal()), count),
            Field::Month => {
                let month = dt.month();
                if count >= 3 {
                    let name = MONTHS[month as usize - 1];
                    out.push_str(if count >= 4 { name } else { &name[..3] });
                } else {
                    pad(out, i64::from(month), count);
                }
            }
            Field::DayOfMonth => pad(out, i64::from(dt.day()), count),
            Field::HalfDay => out.push_str(if dt.hour() < 12 { "AM" } else { "PM" }),
            Field::HourOfHalfDay => pad(out, i64::from(dt.hour() % 12), count),
            Field::ClockHourOfHalfDay => {
                let hour = dt.hour() % 12;
                pad(out, i64::from(if hour == 0 { 12 } else { hour }), count);
            }
            Field::HourOfDay => pad(out, i64::from(dt.hour()), count),
            Field::ClockHourOfDay => {
                let hour = dt.hour();
                pad(out, i64::from(if hour == 0 { 24 } else { hour }), count);
            }
            Field::Minute => pad(out, i64::from(dt.minute()), count),
            Field::Second => pad(out, i64::from(dt.second()), count),
            Field::Fraction => {
                // Millisecond precision; leap-second nanos clamp to 999.
                let millis = (dt.nanosecond() / 1_000_000).min(999);
                let digits = format!("{millis:03}");
                if count <= 3 {
                    // Letter count is a minimum: only trailing zeros are dropped.
                    let significant = digits.trim_end_matches('0').len().max(count);
                    out.push_str(&digits[..significant]);
                } else {
                    out.push_str(&digits);
                    out.extend(std::iter::repeat('0').take(count - 3));
                }
            }
            Field::ZoneOffset => match count {
                1 => write_offset(out, local.offset_seconds, false),
                2 => write_offset(out, local.offset_seconds, true),
                _ => out.push_str(&self.zone.id()),
            },
            Field::ZoneName => {
                if count >= 4 {
                    out.push_str(&self.zone.id());
                } else {
                    out.push_str(&local.abbreviation);
                }
            }
        }
    }
}

fn pad(out: &mut String, value: i64, width: usize) {
    let _ = write!(out, "{value:0width$}");
}

fn write_year(out: &mut String, year: i64, count: usize) {
    if count == 2 {
        pad(out, year.rem_euclid(100), 2);
    } else {
        pad(out, year, count);
    }
}

fn write_offset(out: &mut String, offset_seconds: i32, separator: bool) {
    let sign = if offset_seconds < 0 { '-' } else { '+' };
    let total = offset_seconds.unsigned_abs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    if separator {
        let _ = write!(out, "{sign}{hours:02}:{minutes:02}");
    } else {
        let _ = write!(out, "{sign}{hours:02}{minutes:02}");
    }
}
