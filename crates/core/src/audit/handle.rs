use std::sync::Arc;

use super::{AuditError, AuditFilter, AuditRecord, AuditStore, NewAuditEvent, SubjectKind};

/// Cheaply cloneable handle used by services and workers to append audit rows.
///
/// Appending never fails the caller: a store error is logged and dropped, so a
/// state transition that already committed is not reported as failed.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append an event, logging any failure.
    pub fn record(&self, event: NewAuditEvent) {
        if let Err(e) = self.store.insert(&event) {
            tracing::error!(
                subject_id = %event.subject_id,
                event_type = %event.event_type,
                error = %e,
                "Failed to append audit event"
            );
        }
    }

    /// Events for one subject, oldest first.
    pub fn timeline(&self, kind: SubjectKind, id: &str) -> Result<Vec<AuditRecord>, AuditError> {
        self.store.query(&AuditFilter::timeline(kind, id))
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }
}
