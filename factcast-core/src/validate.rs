//! Schedule validity oracle.
//!
//! A pending schedule is valid when, bucketed by local calendar day, every day
//! strictly between the first and last scheduled day carries exactly one slot
//! per preferred time, and the edge days carry any non-empty subset (the first
//! day is truncated by "now", the last by the pending cap). A slot at a
//! time-of-day outside the preferred set, or two slots at the same time on the
//! same day, invalidates the whole schedule.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

use crate::time::{canonicalize, PreferredTime};

pub fn is_valid_schedule(
    instants: &[DateTime<Utc>],
    preferred: &[PreferredTime],
    tz: Tz,
) -> bool {
    if instants.is_empty() {
        return true;
    }

    let canon: HashSet<(u32, u32)> = canonicalize(preferred)
        .iter()
        .map(|t| (t.hour, t.minute))
        .collect();
    let per_day = canon.len();

    let mut days: BTreeMap<NaiveDate, Vec<(u32, u32)>> = BTreeMap::new();
    for at in instants {
        let local = at.with_timezone(&tz);
        let hm = (local.hour(), local.minute());
        if !canon.contains(&hm) {
            // Leftover from a since-changed preference.
            return false;
        }
        days.entry(local.date_naive()).or_default().push(hm);
    }

    let first = *days.keys().next().expect("non-empty");
    let last = *days.keys().next_back().expect("non-empty");

    for (day, times) in &days {
        let unique: HashSet<&(u32, u32)> = times.iter().collect();
        if unique.len() != times.len() {
            // Two slots at the same preferred time on one day.
            return false;
        }
        if *day > first && *day < last && times.len() != per_day {
            return false;
        }
    }

    // A day with no slots at all inside the span is a deficit too.
    let mut d = first.succ_opt();
    while let Some(day) = d {
        if day >= last {
            break;
        }
        if !days.contains_key(&day) {
            return false;
        }
        d = day.succ_opt();
    }

    true
}
