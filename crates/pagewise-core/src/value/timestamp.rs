use serde::{Deserialize, Serialize};
use std::fmt;
use time::{
    Date, Month, OffsetDateTime, PrimitiveDateTime, Time, format_description::well_known::Rfc3339,
};

const MILLIS_PER_DAY: i64 = 86_400_000;

///
/// Timestamp
///
/// UTC instant with millisecond precision.
/// Stored as unix milliseconds so ordering and hashing are integer-cheap.
///

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Build from `{seconds, nanoseconds}` as emitted by document stores.
    #[must_use]
    pub const fn from_parts(seconds: i64, nanoseconds: u32) -> Self {
        Self(
            seconds
                .saturating_mul(1_000)
                .saturating_add((nanoseconds / 1_000_000) as i64),
        )
    }

    /// Midnight UTC at the start of the given calendar day.
    pub fn from_ymd(year: i32, month: u8, day: u8) -> Option<Self> {
        let month = Month::try_from(month).ok()?;
        let date = Date::from_calendar_date(year, month, day).ok()?;
        let at = PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc();

        Some(Self::from_offset(at))
    }

    /// Parse an RFC 3339 instant (`2024-03-01T10:15:00Z`).
    pub fn parse_rfc3339(raw: &str) -> Option<Self> {
        OffsetDateTime::parse(raw, &Rfc3339).ok().map(Self::from_offset)
    }

    /// Parse a date-only `YYYY-MM-DD` value as midnight UTC.
    pub fn parse_date(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, '-');
        let year = parts.next()?.parse::<i32>().ok()?;
        let month = parts.next()?.parse::<u8>().ok()?;
        let day = parts.next()?.parse::<u8>().ok()?;

        Self::from_ymd(year, month, day)
    }

    /// Last representable millisecond of this instant's UTC day.
    #[must_use]
    pub const fn end_of_day(self) -> Self {
        let day_start = self.0.div_euclid(MILLIS_PER_DAY) * MILLIS_PER_DAY;

        Self(day_start + MILLIS_PER_DAY - 1)
    }

    fn from_offset(at: OffsetDateTime) -> Self {
        let millis = at.unix_timestamp_nanos() / 1_000_000;

        Self(i64::try_from(millis).unwrap_or(i64::MAX))
    }

    fn to_offset(self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * 1_000_000).ok()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_offset().and_then(|at| at.format(&Rfc3339).ok()) {
            Some(text) => write!(f, "{text}"),
            None => write!(f, "{}ms", self.0),
        }
    }
}

///
/// TESTS
///
