//! OS notification queue capability.
//!
//! The queue is an external, independently-mutable peer: the engine treats its
//! pending count as authoritative for cap enforcement, but verifies handle
//! existence rather than assuming it.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fact::Fact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }
}

/// One live entry in the OS pending queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingNotification {
    pub handle: String,
    pub trigger_at: DateTime<Utc>,
}

/// What the OS renders when the notification fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
}

impl NotificationContent {
    pub fn from_fact(fact: &Fact) -> Self {
        Self {
            title: "Did you know?".to_string(),
            body: fact.text.clone(),
            image_url: fact.image_url.clone(),
        }
    }
}

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn permission_status(&self) -> Result<PermissionStatus>;

    async fn request_permission(&self) -> Result<PermissionStatus>;

    /// Live pending entries. Entries whose trigger has passed are the OS's
    /// business and do not appear here.
    async fn list_pending(&self) -> Result<Vec<PendingNotification>>;

    /// Register a notification; returns the OS-assigned handle. An empty
    /// handle is treated as a failed registration by callers.
    async fn register(&self, content: NotificationContent, trigger_at: DateTime<Utc>)
        -> Result<String>;

    async fn cancel_all(&self) -> Result<()>;
}
