//! Slot generator: future (instant, time-of-day) pairs for notification delivery.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::time::{canonicalize, resolve_local, PreferredTime};

/// A generated delivery slot. `hour`/`minute` are the wall-clock components
/// the instant resolves to in the user's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub at: DateTime<Utc>,
    pub hour: u32,
    pub minute: u32,
}

/// Compute `count` future delivery slots.
///
/// Walks forward day by day from the later of `now` and `not_before`,
/// emitting one slot per canonical preferred time per day. Every emitted
/// instant is strictly after `now` and strictly after `not_before` when
/// given, so a caller extending an existing schedule (top-up) passes the
/// latest already-scheduled instant as `not_before` and gets no overlap.
///
/// Local times that do not exist in `tz` (spring-forward gap) are skipped.
pub fn generate_slots(
    preferred: &[PreferredTime],
    count: usize,
    not_before: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    tz: Tz,
) -> Vec<Slot> {
    let canon = canonicalize(preferred);
    if canon.is_empty() || count == 0 {
        return Vec::new();
    }

    // Everything emitted must be strictly after this instant.
    let floor = not_before.map_or(now, |nb| nb.max(now));

    let mut out = Vec::with_capacity(count);
    let mut day = floor.with_timezone(&tz).date_naive();

    while out.len() < count {
        for t in &canon {
            if out.len() >= count {
                break;
            }
            if let Some(at) = resolve_local(day, *t, tz) {
                if at > floor {
                    out.push(Slot {
                        at,
                        hour: t.hour,
                        minute: t.minute,
                    });
                }
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    out
}
