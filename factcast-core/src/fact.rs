//! Fact model: the unit of pushable content and its scheduling lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle with respect to notification scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactState {
    /// Never registered with the OS, eligible for selection.
    Unscheduled,
    /// Holds an OS handle and a delivery instant.
    Scheduled,
    /// Delivery instant has passed (or the fact was surfaced directly);
    /// part of the permanent feed.
    Shown,
}

/// A single pushable fact.
///
/// Note: scheduling columns live on the fact itself; the store is the only
/// writer and the orchestrator is the only caller of those writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub locale: String,
    pub text: String,

    /// Optional image to prefetch for the notification attachment.
    pub image_url: Option<String>,

    /// Future (or past, once fired) delivery instant.
    pub scheduled_for: Option<DateTime<Utc>>,

    /// Opaque OS registration handle. Present only after a confirmed
    /// registration.
    pub handle: Option<String>,

    /// When the fact entered the user's feed.
    pub shown_at: Option<DateTime<Utc>>,
}

impl Fact {
    pub fn new(id: impl Into<String>, locale: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locale: locale.into(),
            text: text.into(),
            image_url: None,
            scheduled_for: None,
            handle: None,
            shown_at: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn state(&self) -> FactState {
        if self.shown_at.is_some() {
            FactState::Shown
        } else if self.handle.is_some() {
            FactState::Scheduled
        } else {
            FactState::Unscheduled
        }
    }

    /// Eligible for selection by the scheduler.
    pub fn is_unscheduled(&self) -> bool {
        self.state() == FactState::Unscheduled
    }
}

/// A confirmed (fact, instant, handle) pairing. Exists only between a
/// successful OS registration and delivery or cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledSlot {
    pub fact_id: String,
    pub at: DateTime<Utc>,
    pub handle: String,
}
