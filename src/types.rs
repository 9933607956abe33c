//! Core types for punchcard
//!
//! Source identifiers, the `[dayOfWeek, hour, count]` activity points every source
//! produces, and the time basis used to bucket raw timestamps.

use chrono::{DateTime, Datelike, FixedOffset, Local, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RetrieveError;

/// Days in a week; day 0 is Sunday.
pub const DAYS_PER_WEEK: usize = 7;

/// Hours in a day.
pub const HOURS_PER_DAY: usize = 24;

/// Remote data source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    GitHub,
    Wikipedia,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::GitHub => "github",
            SourceKind::Wikipedia => "wikipedia",
        }
    }

    /// Human-readable shape of a canonical key for this source
    pub fn expected_format(&self) -> &'static str {
        match self {
            SourceKind::GitHub => "owner/repo",
            SourceKind::Wikipedia => "username@host",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cell of a punch card: `count` events on `day` (0 = Sunday) at `hour`.
///
/// Serialized as a bare `[day, hour, count]` array, which is also the shape the
/// GitHub statistics endpoint returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u64; 3]", into = "[u64; 3]")]
pub struct ActivityPoint {
    pub day: u8,
    pub hour: u8,
    pub count: u64,
}

impl ActivityPoint {
    pub fn new(day: u8, hour: u8, count: u64) -> Result<Self, RetrieveError> {
        if usize::from(day) >= DAYS_PER_WEEK {
            return Err(RetrieveError::fetch(format!(
                "day of week out of range: {day}"
            )));
        }
        if usize::from(hour) >= HOURS_PER_DAY {
            return Err(RetrieveError::fetch(format!("hour out of range: {hour}")));
        }
        Ok(Self { day, hour, count })
    }

    /// A single event at the given day and hour
    pub fn single(day: u8, hour: u8) -> Result<Self, RetrieveError> {
        Self::new(day, hour, 1)
    }
}

impl TryFrom<[u64; 3]> for ActivityPoint {
    type Error = RetrieveError;

    fn try_from([day, hour, count]: [u64; 3]) -> Result<Self, Self::Error> {
        let day = u8::try_from(day)
            .map_err(|_| RetrieveError::fetch(format!("day of week out of range: {day}")))?;
        let hour = u8::try_from(hour)
            .map_err(|_| RetrieveError::fetch(format!("hour out of range: {hour}")))?;
        Self::new(day, hour, count)
    }
}

impl From<ActivityPoint> for [u64; 3] {
    fn from(p: ActivityPoint) -> Self {
        [u64::from(p.day), u64::from(p.hour), p.count]
    }
}

/// Ordered activity points. Duplicate `(day, hour)` pairs are kept as separate entries.
pub type ActivitySeries = Vec<ActivityPoint>;

/// 7x24 aggregation of a series (row = day, column = hour)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityGrid {
    cells: [[u64; HOURS_PER_DAY]; DAYS_PER_WEEK],
}

impl ActivityGrid {
    pub fn from_series(series: &[ActivityPoint]) -> Self {
        let mut cells = [[0u64; HOURS_PER_DAY]; DAYS_PER_WEEK];
        for p in series {
            let cell = &mut cells[usize::from(p.day)][usize::from(p.hour)];
            *cell = cell.saturating_add(p.count);
        }
        Self { cells }
    }

    pub fn get(&self, day: u8, hour: u8) -> u64 {
        self.cells
            .get(usize::from(day))
            .and_then(|row| row.get(usize::from(hour)))
            .copied()
            .unwrap_or(0)
    }

    pub fn rows(&self) -> &[[u64; HOURS_PER_DAY]; DAYS_PER_WEEK] {
        &self.cells
    }

    pub fn total(&self) -> u64 {
        self.cells.iter().flatten().sum()
    }

    pub fn max(&self) -> u64 {
        self.cells.iter().flatten().copied().max().unwrap_or(0)
    }
}

/// Clock used to turn absolute timestamps into day-of-week and hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeBasis {
    /// The machine's local time zone
    #[default]
    Local,
    /// A fixed UTC offset
    Fixed(FixedOffset),
}

impl TimeBasis {
    pub fn utc() -> Self {
        TimeBasis::Fixed(Utc.fix())
    }

    /// Returns `(day_of_week, hour)` with Sunday as day 0.
    pub fn locate(&self, ts: &DateTime<FixedOffset>) -> (u8, u8) {
        match self {
            TimeBasis::Local => {
                let t = ts.with_timezone(&Local);
                (t.weekday().num_days_from_sunday() as u8, t.hour() as u8)
            }
            TimeBasis::Fixed(offset) => {
                let t = ts.with_timezone(offset);
                (t.weekday().num_days_from_sunday() as u8, t.hour() as u8)
            }
        }
    }
}

impl FromStr for TimeBasis {
    type Err = RetrieveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "local" => return Ok(TimeBasis::Local),
            "utc" | "z" => return Ok(TimeBasis::utc()),
            _ => {}
        }

        let invalid = || RetrieveError::Config(format!("invalid time basis: {s}"));
        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(invalid()),
        };
        let (hh, mm) = rest.split_once(':').ok_or_else(invalid)?;
        let two_digits = |v: &str| v.len() == 2 && v.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(hh) || !two_digits(mm) {
            return Err(invalid());
        }
        let hours: i32 = hh.parse().map_err(|_| invalid())?;
        let minutes: i32 = mm.parse().map_err(|_| invalid())?;
        if minutes >= 60 {
            return Err(invalid());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(TimeBasis::Fixed)
            .ok_or_else(invalid)
    }
}

impl TryFrom<String> for TimeBasis {
    type Error = RetrieveError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeBasis> for String {
    fn from(t: TimeBasis) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TimeBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeBasis::Local => f.write_str("local"),
            TimeBasis::Fixed(offset) if offset.local_minus_utc() == 0 => f.write_str("utc"),
            TimeBasis::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}
