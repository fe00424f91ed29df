//! Simulated device: notification permission + pending queue, persisted to
//! `~/.factcast/device.json`. Stands in for the OS bridge so every engine
//! path can be exercised from a terminal.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use factcast_core::{NotificationContent, NotificationQueue, PendingNotification, PermissionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimNotification {
    handle: String,
    trigger_at: DateTime<Utc>,
    title: String,
    body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct DeviceState {
    permission_granted: bool,
    next_handle: u64,
    pending: Vec<SimNotification>,
}

pub struct SimDevice {
    path: PathBuf,
    state: Mutex<DeviceState>,
}

impl SimDevice {
    pub fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let s = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?
        } else {
            DeviceState::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn save(&self, state: &DeviceState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, json).with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }

    pub fn set_permission(&self, granted: bool) -> Result<()> {
        let mut st = self.state.lock().expect("device state poisoned");
        st.permission_granted = granted;
        self.save(&st)
    }

    /// Remove entries whose trigger has passed, as the OS would once they
    /// fire, and return them for reporting.
    pub fn fire_due(&self, now: DateTime<Utc>) -> Result<Vec<PendingNotification>> {
        let mut st = self.state.lock().expect("device state poisoned");
        let (fired, kept): (Vec<SimNotification>, Vec<SimNotification>) =
            st.pending.drain(..).partition(|n| n.trigger_at <= now);
        st.pending = kept;
        self.save(&st)?;
        Ok(fired
            .into_iter()
            .map(|n| PendingNotification {
                handle: n.handle,
                trigger_at: n.trigger_at,
            })
            .collect())
    }
}

#[async_trait]
impl NotificationQueue for SimDevice {
    async fn permission_status(&self) -> Result<PermissionStatus> {
        let st = self.state.lock().expect("device state poisoned");
        Ok(if st.permission_granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        })
    }

    async fn request_permission(&self) -> Result<PermissionStatus> {
        // The simulated user always accepts the prompt.
        self.set_permission(true)?;
        Ok(PermissionStatus::Granted)
    }

    async fn list_pending(&self) -> Result<Vec<PendingNotification>> {
        let st = self.state.lock().expect("device state poisoned");
        Ok(st
            .pending
            .iter()
            .map(|n| PendingNotification {
                handle: n.handle.clone(),
                trigger_at: n.trigger_at,
            })
            .collect())
    }

    async fn register(
        &self,
        content: NotificationContent,
        trigger_at: DateTime<Utc>,
    ) -> Result<String> {
        let mut st = self.state.lock().expect("device state poisoned");
        st.next_handle += 1;
        let handle = format!("ntf-{:06}", st.next_handle);
        st.pending.push(SimNotification {
            handle: handle.clone(),
            trigger_at,
            title: content.title,
            body: content.body,
        });
        self.save(&st)?;
        Ok(handle)
    }

    async fn cancel_all(&self) -> Result<()> {
        let mut st = self.state.lock().expect("device state poisoned");
        st.pending.clear();
        self.save(&st)
    }
}
