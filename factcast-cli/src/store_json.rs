//! JSON-file content store: a `MemoryStore` working set flushed to
//! `~/.factcast/facts.json` after every mutation.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use factcast_core::{ContentStore, Fact, MemoryStore};

pub struct JsonStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonStore {
    pub fn load(path: PathBuf) -> Result<Self> {
        let facts: Vec<Fact> = if path.exists() {
            let s = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            inner: MemoryStore::with_facts(facts),
        })
    }

    async fn flush(&self) -> Result<()> {
        let facts = self.inner.all().await?;
        let json = serde_json::to_string_pretty(&facts)?;
        fs::write(&self.path, json).with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for JsonStore {
    async fn random_unscheduled(&self, n: usize, locale: &str) -> Result<Vec<Fact>> {
        self.inner.random_unscheduled(n, locale).await
    }

    async fn mark_scheduled(&self, id: &str, at: DateTime<Utc>, handle: &str) -> Result<()> {
        self.inner.mark_scheduled(id, at, handle).await?;
        self.flush().await
    }

    async fn mark_shown_at(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.inner.mark_shown_at(id, at).await?;
        self.flush().await
    }

    async fn mark_all_past_due_shown(
        &self,
        locale: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let n = self.inner.mark_all_past_due_shown(locale, now).await?;
        if n > 0 {
            self.flush().await?;
        }
        Ok(n)
    }

    async fn clear_future_scheduling(&self, now: DateTime<Utc>) -> Result<()> {
        self.inner.clear_future_scheduling(now).await?;
        self.flush().await
    }

    async fn clear_all_scheduling(&self) -> Result<()> {
        self.inner.clear_all_scheduling().await?;
        self.flush().await
    }

    async fn clear_stale_handles(&self, valid_handles: &[String]) -> Result<usize> {
        let n = self.inner.clear_stale_handles(valid_handles).await?;
        if n > 0 {
            self.flush().await?;
        }
        Ok(n)
    }

    async fn count_future_pending(
        &self,
        locale: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        self.inner.count_future_pending(locale, now).await
    }

    async fn latest_scheduled_instant(&self) -> Result<Option<DateTime<Utc>>> {
        self.inner.latest_scheduled_instant().await
    }

    async fn insert(&self, fact: Fact) -> Result<()> {
        self.inner.insert(fact).await?;
        self.flush().await
    }

    async fn all(&self) -> Result<Vec<Fact>> {
        self.inner.all().await
    }
}
