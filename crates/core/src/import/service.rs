//! User-facing import task operations.

use std::sync::Arc;

use tracing::info;

use super::{ImportError, ImportTask, ImportTaskStore, TaskFilter};
use crate::audit::{event_types, AuditLog, AuditRecord, NewAuditEvent, SubjectKind};
use crate::events::EventPublisher;

pub struct ImportService {
    store: Arc<dyn ImportTaskStore>,
    audit: AuditLog,
    events: EventPublisher,
}

impl ImportService {
    pub fn new(store: Arc<dyn ImportTaskStore>, audit: AuditLog, events: EventPublisher) -> Self {
        Self {
            store,
            audit,
            events,
        }
    }

    pub fn store(&self) -> &Arc<dyn ImportTaskStore> {
        &self.store
    }

    pub fn get(&self, id: &str) -> Result<ImportTask, ImportError> {
        self.store
            .get(id)?
            .ok_or_else(|| ImportError::NotFound(id.to_string()))
    }

    pub fn list(&self, filter: &TaskFilter) -> Result<(Vec<ImportTask>, i64), ImportError> {
        Ok((self.store.list(filter)?, self.store.count(filter)?))
    }

    pub fn cancel(&self, id: &str) -> Result<ImportTask, ImportError> {
        let (previous, task) = self.store.cancel(id)?;
        self.audit.record(
            NewAuditEvent::task(id, event_types::TASK_CANCELLED).transition(previous, task.status),
        );
        self.events.task_updated(id);
        info!(task_id = %id, "Import task cancelled");
        Ok(task)
    }

    /// Queue a new task re-running a completed or failed one.
    pub fn reimport(&self, id: &str) -> Result<ImportTask, ImportError> {
        let task = self.store.reimport(id)?;
        self.audit.record(
            NewAuditEvent::task(&task.id, event_types::REIMPORT_REQUESTED)
                .with_message(format!("reimport of task {}", id))
                .with_metadata(serde_json::json!({ "previous_task_id": id })),
        );
        self.events.task_updated(&task.id);
        info!(task_id = %task.id, previous_task_id = %id, "Reimport requested");
        Ok(task)
    }

    /// Audit rows for a task, oldest first.
    pub fn timeline(&self, id: &str) -> Result<Vec<AuditRecord>, ImportError> {
        self.get(id)?;
        self.audit
            .timeline(SubjectKind::ImportTask, id)
            .map_err(|e| ImportError::Database(e.to_string()))
    }

    /// The reimport chain through a task, newest first.
    pub fn history(&self, id: &str) -> Result<Vec<ImportTask>, ImportError> {
        self.store.history(id)
    }
}
