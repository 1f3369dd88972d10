//! In-process change notifications.
//!
//! Every job or task state change is announced on a broadcast channel.
//! Publishing never blocks and never fails the transition that triggered it.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// What kind of row changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    DownloadJobUpdated,
    ImportTaskUpdated,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::DownloadJobUpdated => "download_job_updated",
            ChangeType::ImportTaskUpdated => "import_task_updated",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change notification. Subscribers re-read the subject for details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub event_type: ChangeType,
    pub subject_id: String,
}

/// Broadcaster for change events using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventPublisher {
    /// Create a new publisher with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event_type: ChangeType, subject_id: impl Into<String>) {
        // Send only fails when nobody is subscribed.
        let _ = self.sender.send(ChangeEvent {
            event_type,
            subject_id: subject_id.into(),
        });
    }

    pub fn job_updated(&self, job_id: &str) {
        self.publish(ChangeType::DownloadJobUpdated, job_id);
    }

    pub fn task_updated(&self, task_id: &str) {
        self.publish(ChangeType::ImportTaskUpdated, task_id);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}
