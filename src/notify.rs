//! Device status notifications.
//!
//! [`StatusWatcher`] diffs consecutive device snapshots and reports status
//! transitions. [`NotificationCenter`] holds the active notifications and
//! their auto-dismiss deadlines.

use crate::device::{Device, DeviceStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Notification identifier. Millisecond timestamp, bumped to stay unique.
pub type NotificationId = u64;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tone {
    Success,
    Info,
    Warning,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Success => "success",
            Tone::Info => "info",
            Tone::Warning => "warning",
        }
    }
}

/// A transient message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub tone: Tone,
}

/// A status transition observed between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub device_id: String,
    pub device_name: String,
    pub from: DeviceStatus,
    pub to: DeviceStatus,
}

impl StatusChange {
    /// User-facing text for the new status.
    pub fn message(&self) -> String {
        match self.to {
            DeviceStatus::Online => format!("{} is now online.", self.device_name),
            DeviceStatus::Offline => format!("{} went offline.", self.device_name),
            DeviceStatus::Idle => format!("{} is now idle.", self.device_name),
        }
    }

    pub fn tone(&self) -> Tone {
        match self.to {
            DeviceStatus::Online => Tone::Success,
            DeviceStatus::Offline => Tone::Warning,
            DeviceStatus::Idle => Tone::Info,
        }
    }
}

/// Remembers the previous device snapshot between reconciliation passes.
#[derive(Debug, Clone, Default)]
pub struct StatusWatcher {
    previous: Option<HashMap<String, DeviceStatus>>,
}

impl StatusWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a baseline snapshot has been recorded.
    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    /// Compare `devices` with the previous snapshot and store them as the
    /// new one.
    ///
    /// The first call only records the baseline. Devices not present in
    /// the previous snapshot are recorded without a change.
    pub fn observe(&mut self, devices: &[Device]) -> Vec<StatusChange> {
        let current: HashMap<String, DeviceStatus> = devices
            .iter()
            .map(|d| (d.id.clone(), d.status))
            .collect();

        let changes = match &self.previous {
            None => Vec::new(),
            Some(previous) => devices
                .iter()
                .filter_map(|device| {
                    let before = previous.get(&device.id)?;
                    (*before != device.status).then(|| StatusChange {
                        device_id: device.id.clone(),
                        device_name: device.name.clone(),
                        from: *before,
                        to: device.status,
                    })
                })
                .collect(),
        };

        self.previous = Some(current);
        changes
    }
}

/// Active notifications with one auto-dismiss deadline each.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    ttl: Duration,
    active: Vec<Notification>,
    deadlines: BTreeMap<NotificationId, Instant>,
    last_id: NotificationId,
}

impl NotificationCenter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            active: Vec::new(),
            deadlines: BTreeMap::new(),
            last_id: 0,
        }
    }

    fn next_id(&mut self) -> NotificationId {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last_id = now_ms.max(self.last_id + 1);
        self.last_id
    }

    /// Add a notification and schedule its removal at `now + ttl`.
    pub fn push(&mut self, message: impl Into<String>, tone: Tone, now: Instant) -> NotificationId {
        let id = self.next_id();
        self.active.push(Notification {
            id,
            message: message.into(),
            tone,
        });
        self.deadlines.insert(id, now + self.ttl);
        id
    }

    /// Emit one notification per status change.
    pub fn push_changes(&mut self, changes: &[StatusChange], now: Instant) -> Vec<NotificationId> {
        changes
            .iter()
            .map(|change| self.push(change.message(), change.tone(), now))
            .collect()
    }

    /// Remove a notification and cancel its timer. Returns false if it was
    /// already gone.
    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        self.deadlines.remove(&id);
        let before = self.active.len();
        self.active.retain(|n| n.id != id);
        self.active.len() != before
    }

    /// Remove every notification whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<Notification> {
        let due: Vec<NotificationId> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        let mut expired = Vec::with_capacity(due.len());
        for id in due {
            self.deadlines.remove(&id);
            if let Some(pos) = self.active.iter().position(|n| n.id == id) {
                expired.push(self.active.remove(pos));
            }
        }
        expired
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Number of scheduled removals.
    pub fn pending_timers(&self) -> usize {
        self.deadlines.len()
    }

    /// Cancel every timer and drop every notification.
    pub fn clear(&mut self) {
        self.deadlines.clear();
        self.active.clear();
    }

    pub fn active(&self) -> &[Notification] {
        &self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
