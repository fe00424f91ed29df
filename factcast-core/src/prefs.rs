//! Preference source capability.
//!
//! Injected into the scheduler by construction so the engine never reaches
//! back into app-layer settings at call time.

use chrono_tz::Tz;

use crate::time::PreferredTime;

pub trait PreferenceSource: Send + Sync {
    /// One to three delivery times per day.
    fn preferred_times(&self) -> Vec<PreferredTime>;

    /// Content locale tag, e.g. "en".
    fn locale(&self) -> String;

    /// The user's IANA zone; all wall-clock math resolves through it.
    fn timezone(&self) -> Tz;
}

/// Fixed preferences, for composition roots that read settings once per run.
#[derive(Debug, Clone)]
pub struct StaticPrefs {
    pub times: Vec<PreferredTime>,
    pub locale: String,
    pub tz: Tz,
}

impl StaticPrefs {
    pub fn new(times: Vec<PreferredTime>, locale: impl Into<String>, tz: Tz) -> Self {
        Self {
            times,
            locale: locale.into(),
            tz,
        }
    }
}

impl PreferenceSource for StaticPrefs {
    fn preferred_times(&self) -> Vec<PreferredTime> {
        self.times.clone()
    }

    fn locale(&self) -> String {
        self.locale.clone()
    }

    fn timezone(&self) -> Tz {
        self.tz
    }
}
