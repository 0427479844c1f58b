//! Time quantities used by range selectors, subqueries, offsets and rules
//!
//! A [`Duration`] is a signed count of milliseconds. Its text form is the
//! canonical multi-unit spelling the query engine accepts: non-zero
//! components from weeks down to milliseconds, largest first, no separators.
//!
//! ```text
//! 10 * MINUTE + 5 * SECOND   =>  10m5s
//! 90 * MINUTE                =>  1h30m
//! Duration::ZERO             =>  0ms
//! ```

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt, value},
    multi::many1,
    IResult,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ql::error::{QlError, QlResult};

const MILLIS_PER_SECOND: i64 = 1000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;
const MILLIS_PER_WEEK: i64 = 7 * MILLIS_PER_DAY;

/// Rendering units, largest first
const UNITS: [(&str, i64); 6] = [
    ("w", MILLIS_PER_WEEK),
    ("d", MILLIS_PER_DAY),
    ("h", MILLIS_PER_HOUR),
    ("m", MILLIS_PER_MINUTE),
    ("s", MILLIS_PER_SECOND),
    ("ms", 1),
];

/// A signed time quantity with millisecond resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    millis: i64,
}

pub const MILLISECOND: Duration = Duration::from_millis(1);
pub const SECOND: Duration = Duration::from_millis(MILLIS_PER_SECOND);
pub const MINUTE: Duration = Duration::from_millis(MILLIS_PER_MINUTE);
pub const HOUR: Duration = Duration::from_millis(MILLIS_PER_HOUR);
pub const DAY: Duration = Duration::from_millis(MILLIS_PER_DAY);
pub const WEEK: Duration = Duration::from_millis(MILLIS_PER_WEEK);

impl Duration {
    /// The empty duration, rendered as `0ms`
    pub const ZERO: Duration = Duration::from_millis(0);

    /// Create a duration from a raw millisecond count
    pub const fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    /// Create a duration of `count` units, e.g. `Duration::new(5, MINUTE)`
    pub fn new(count: i64, unit: Duration) -> Self {
        unit * count
    }

    pub fn from_secs(secs: i64) -> Self {
        Self::new(secs, SECOND)
    }

    pub fn from_mins(mins: i64) -> Self {
        Self::new(mins, MINUTE)
    }

    pub fn from_hours(hours: i64) -> Self {
        Self::new(hours, HOUR)
    }

    pub fn from_days(days: i64) -> Self {
        Self::new(days, DAY)
    }

    /// Total length in milliseconds
    pub fn as_millis(&self) -> i64 {
        self.millis
    }

    pub fn is_zero(&self) -> bool {
        self.millis == 0
    }

    /// Canonical text form, identical to the `Display` output
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis == 0 {
            return write!(f, "0ms");
        }
        if self.millis < 0 {
            write!(f, "-")?;
        }

        let mut rest = self.millis.unsigned_abs();
        for (suffix, size) in UNITS {
            let size = size as u64;
            let count = rest / size;
            if count > 0 {
                write!(f, "{}{}", count, suffix)?;
                rest %= size;
            }
        }
        Ok(())
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration::from_millis(self.millis.saturating_add(rhs.millis))
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        Duration::from_millis(self.millis.saturating_sub(rhs.millis))
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Duration {
        Duration::from_millis(self.millis.saturating_neg())
    }
}

impl Mul<i64> for Duration {
    type Output = Duration;

    fn mul(self, rhs: i64) -> Duration {
        Duration::from_millis(self.millis.saturating_mul(rhs))
    }
}

impl Mul<Duration> for i64 {
    type Output = Duration;

    fn mul(self, rhs: Duration) -> Duration {
        rhs * self
    }
}

/// Fractional scaling rounds to the nearest millisecond
impl Mul<f64> for Duration {
    type Output = Duration;

    fn mul(self, rhs: f64) -> Duration {
        Duration::from_millis((self.millis as f64 * rhs).round() as i64)
    }
}

impl Mul<Duration> for f64 {
    type Output = Duration;

    fn mul(self, rhs: Duration) -> Duration {
        rhs * self
    }
}

impl From<chrono::TimeDelta> for Duration {
    fn from(delta: chrono::TimeDelta) -> Self {
        Duration::from_millis(delta.num_milliseconds())
    }
}

impl FromStr for Duration {
    type Err = QlError;

    /// Parse the canonical form back, also accepting non-canonical spellings
    /// such as `90s` or `1h90m`
    fn from_str(s: &str) -> QlResult<Self> {
        match all_consuming(parse_duration)(s.trim()) {
            Ok((_, millis)) => Ok(Duration::from_millis(millis)),
            Err(_) => Err(QlError::InvalidDuration(s.to_string())),
        }
    }
}

/// Parse an optionally negated sequence of `<count><unit>` components
fn parse_duration(input: &str) -> IResult<&str, i64> {
    let (input, sign) = opt(char('-'))(input)?;
    let (input, parts) = many1(parse_component)(input)?;

    let total = parts
        .into_iter()
        .fold(0i64, |acc, part| acc.saturating_add(part));

    Ok((input, if sign.is_some() { -total } else { total }))
}

/// Parse one component like "10m"
fn parse_component(input: &str) -> IResult<&str, i64> {
    let (input, count) = map_res(digit1, |s: &str| s.parse::<i64>())(input)?;
    let (input, unit) = alt((
        // "ms" must be tried before "m"
        value(1i64, tag("ms")),
        value(MILLIS_PER_WEEK, tag("w")),
        value(MILLIS_PER_DAY, tag("d")),
        value(MILLIS_PER_HOUR, tag("h")),
        value(MILLIS_PER_MINUTE, tag("m")),
        value(MILLIS_PER_SECOND, tag("s")),
    ))(input)?;

    Ok((input, count.saturating_mul(unit)))
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_zero() {
        assert_eq!(Duration::ZERO.render(), "0ms");
        assert_eq!((0 * SECOND).render(), "0ms");
    }

    #[test]
    fn test_render_single_unit() {
        assert_eq!(Duration::new(5, MINUTE).render(), "5m");
        assert_eq!((7 * SECOND).render(), "7s");
        assert_eq!((250 * MILLISECOND).render(), "250ms");
        assert_eq!((2 * WEEK).render(), "2w");
    }

    #[test]
    fn test_render_compound() {
        assert_eq!((10 * MINUTE + 5 * SECOND).render(), "10m5s");
        assert_eq!((90 * MINUTE).render(), "1h30m");
        assert_eq!((8 * DAY + 1500 * MILLISECOND).render(), "1w1d1s500ms");
    }

    #[test]
    fn test_render_negative() {
        assert_eq!((-(5 * MINUTE)).render(), "-5m");
        assert_eq!((SECOND - MINUTE).render(), "-59s");
    }

    #[test]
    fn test_scalar_multiplication() {
        assert_eq!(4 * MINUTE, MINUTE * 4);
        assert_eq!((1.5 * HOUR).render(), "1h30m");
        assert_eq!((SECOND * 0.25).as_millis(), 250);
    }

    #[test]
    fn test_canonicalization_depends_on_magnitude_only() {
        assert_eq!((120 * SECOND).render(), (2 * MINUTE).render());
        assert_eq!(Duration::from_days(7), WEEK);
    }

    #[test]
    fn test_parse() {
        assert_eq!("10m5s".parse::<Duration>().unwrap(), 10 * MINUTE + 5 * SECOND);
        assert_eq!("90s".parse::<Duration>().unwrap().render(), "1m30s");
        assert_eq!("1w2d".parse::<Duration>().unwrap(), WEEK + 2 * DAY);
        assert_eq!("500ms".parse::<Duration>().unwrap(), 500 * MILLISECOND);
        assert_eq!("-5m".parse::<Duration>().unwrap(), -(5 * MINUTE));
        assert_eq!(" 0ms ".parse::<Duration>().unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "5", "m", "5x", "5m 3s", "--5m"] {
            let err = bad.parse::<Duration>().unwrap_err();
            assert!(matches!(err, QlError::InvalidDuration(_)), "{bad}");
        }
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&(10 * MINUTE)).unwrap();
        assert_eq!(json, "\"10m\"");

        let parsed: Duration = serde_json::from_str("\"1h5m\"").unwrap();
        assert_eq!(parsed, HOUR + 5 * MINUTE);

        assert!(serde_json::from_str::<Duration>("\"soon\"").is_err());
    }
}
