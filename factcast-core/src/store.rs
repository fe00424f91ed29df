//! Content store capability and an in-memory reference implementation.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::fact::Fact;

/// Persistence capability the scheduler depends on.
///
/// The orchestrator is the only writer of scheduling columns; implementations
/// decide the storage shape (JSON file, sqlite, remote).
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Up to `n` facts eligible for scheduling, filtered by locale.
    async fn random_unscheduled(&self, n: usize, locale: &str) -> Result<Vec<Fact>>;

    /// Record a confirmed OS registration. Only called with a non-empty handle.
    async fn mark_scheduled(&self, id: &str, at: DateTime<Utc>, handle: &str) -> Result<()>;

    /// Surface a fact in the feed at `at` (immediate delivery path).
    async fn mark_shown_at(&self, id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Transition every fact whose delivery instant has passed into the feed.
    /// Returns how many transitioned.
    async fn mark_all_past_due_shown(&self, locale: Option<&str>, now: DateTime<Utc>)
        -> Result<usize>;

    /// Drop scheduling columns for future entries only; feed history stays.
    async fn clear_future_scheduling(&self, now: DateTime<Utc>) -> Result<()>;

    /// Drop scheduling columns unconditionally, past entries included.
    async fn clear_all_scheduling(&self) -> Result<()>;

    /// Drop pending associations whose handle is not in `valid_handles`.
    /// Returns how many were dropped.
    async fn clear_stale_handles(&self, valid_handles: &[String]) -> Result<usize>;

    /// Facts scheduled strictly after `now` and not yet shown.
    async fn count_future_pending(&self, locale: Option<&str>, now: DateTime<Utc>)
        -> Result<usize>;

    /// Latest delivery instant the store believes is scheduled.
    async fn latest_scheduled_instant(&self) -> Result<Option<DateTime<Utc>>>;

    /// Insert or replace a fact (content ingestion).
    async fn insert(&self, fact: Fact) -> Result<()>;

    /// Snapshot of every fact (feed rendering, status).
    async fn all(&self) -> Result<Vec<Fact>>;
}

/// Thread-safe in-memory store.
///
/// Selection walks facts in id order, which keeps the engine deterministic
/// under test; randomized selection is a production store's concern behind
/// the same capability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    facts: Mutex<BTreeMap<String, Fact>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facts(facts: impl IntoIterator<Item = Fact>) -> Self {
        let map = facts.into_iter().map(|f| (f.id.clone(), f)).collect();
        Self {
            facts: Mutex::new(map),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Fact>> {
        self.facts.lock().expect("store mutex poisoned")
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn random_unscheduled(&self, n: usize, locale: &str) -> Result<Vec<Fact>> {
        let facts = self.lock();
        Ok(facts
            .values()
            .filter(|f| f.is_unscheduled() && f.locale == locale)
            .take(n)
            .cloned()
            .collect())
    }

    async fn mark_scheduled(&self, id: &str, at: DateTime<Utc>, handle: &str) -> Result<()> {
        let mut facts = self.lock();
        let Some(f) = facts.get_mut(id) else {
            bail!("unknown fact: {id}");
        };
        f.scheduled_for = Some(at);
        f.handle = Some(handle.to_string());
        Ok(())
    }

    async fn mark_shown_at(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut facts = self.lock();
        let Some(f) = facts.get_mut(id) else {
            bail!("unknown fact: {id}");
        };
        f.shown_at = Some(at);
        Ok(())
    }

    async fn mark_all_past_due_shown(
        &self,
        locale: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut facts = self.lock();
        let mut count = 0;
        for f in facts.values_mut() {
            if f.shown_at.is_some() {
                continue;
            }
            if let Some(loc) = locale {
                if f.locale != loc {
                    continue;
                }
            }
            match f.scheduled_for {
                Some(at) if at <= now => {
                    // The fact entered the feed at its delivery instant.
                    f.shown_at = Some(at);
                    count += 1;
                }
                _ => {}
            }
        }
        Ok(count)
    }

    async fn clear_future_scheduling(&self, now: DateTime<Utc>) -> Result<()> {
        let mut facts = self.lock();
        for f in facts.values_mut() {
            if matches!(f.scheduled_for, Some(at) if at > now) {
                f.scheduled_for = None;
                f.handle = None;
            }
        }
        Ok(())
    }

    async fn clear_all_scheduling(&self) -> Result<()> {
        let mut facts = self.lock();
        for f in facts.values_mut() {
            f.scheduled_for = None;
            f.handle = None;
        }
        Ok(())
    }

    async fn clear_stale_handles(&self, valid_handles: &[String]) -> Result<usize> {
        let valid: HashSet<&str> = valid_handles.iter().map(String::as_str).collect();
        let mut facts = self.lock();
        let mut dropped = 0;
        for f in facts.values_mut() {
            if f.shown_at.is_some() {
                continue;
            }
            if matches!(&f.handle, Some(h) if !valid.contains(h.as_str())) {
                f.scheduled_for = None;
                f.handle = None;
                dropped += 1;
            }
        }
        Ok(dropped)
    }

    async fn count_future_pending(
        &self,
        locale: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let facts = self.lock();
        Ok(facts
            .values()
            .filter(|f| {
                f.shown_at.is_none()
                    && f.handle.is_some()
                    && matches!(f.scheduled_for, Some(at) if at > now)
                    && locale.is_none_or(|loc| f.locale == loc)
            })
            .count())
    }

    async fn latest_scheduled_instant(&self) -> Result<Option<DateTime<Utc>>> {
        let facts = self.lock();
        Ok(facts.values().filter_map(|f| f.scheduled_for).max())
    }

    async fn insert(&self, fact: Fact) -> Result<()> {
        let mut facts = self.lock();
        facts.insert(fact.id.clone(), fact);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Fact>> {
        let facts = self.lock();
        Ok(facts.values().cloned().collect())
    }
}
