//! Delivery sync: fold past-due notifications into the permanent feed.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::store::ContentStore;

/// Mark every fact whose delivery instant is at or before `now` as shown.
///
/// Runs unconditionally at the start of every sync/clear cycle, whatever
/// branch follows. Clearing or rebuilding the queue without this step would
/// silently drop content the user already received.
pub async fn mark_past_due_delivered<S: ContentStore>(
    store: &S,
    locale: Option<&str>,
    now: DateTime<Utc>,
) -> Result<usize> {
    let count = store.mark_all_past_due_shown(locale, now).await?;
    if count > 0 {
        debug!(count, "folded past-due notifications into the feed");
    }
    Ok(count)
}
