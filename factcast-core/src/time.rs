//! Preferred delivery times: parsing, canonical ordering, local-time resolution.

use anyhow::Result;
use chrono::{DateTime, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A wall-clock time of day with no date component.
///
/// Users pick one to three of these; the engine cycles through them in
/// ascending minutes-since-midnight order so slot generation is deterministic
/// regardless of input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreferredTime {
    pub hour: u32,
    pub minute: u32,
}

impl PreferredTime {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    /// Parse "HH:MM" (24h).
    pub fn parse(s: &str) -> Result<Self> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("invalid time '{s}': expected HH:MM"))?;
        let hour: u32 = h
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid hour in '{s}'"))?;
        let minute: u32 = m
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid minute in '{s}'"))?;
        if hour > 23 || minute > 59 {
            anyhow::bail!("time out of range: {s}");
        }
        Ok(Self { hour, minute })
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

impl std::fmt::Display for PreferredTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Canonical form: ascending by minutes since midnight, duplicates dropped.
pub fn canonicalize(times: &[PreferredTime]) -> Vec<PreferredTime> {
    let mut out: Vec<PreferredTime> = times.to_vec();
    out.sort_by_key(|t| t.minutes_since_midnight());
    out.dedup();
    out
}

/// Resolve a local (date, time-of-day) in an IANA zone to a UTC instant.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
/// Nonexistent local times (spring-forward gap) return None; callers skip
/// that occurrence.
pub fn resolve_local(date: NaiveDate, time: PreferredTime, tz: Tz) -> Option<DateTime<Utc>> {
    let ndt = date.and_hms_opt(time.hour, time.minute, 0)?;
    match tz.from_local_datetime(&ndt) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _later) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// Parse an IANA timezone name like "America/Chicago".
pub fn parse_tz(name: &str) -> Result<Tz> {
    name.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {name}"))
}
