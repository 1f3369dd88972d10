//! Mock placer for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::placer::{FilePlacement, ImportMethod, PlacedFile, Placer, PlacerError};

/// A recorded placement for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedPlacement {
    pub placement: FilePlacement,
    pub success: bool,
}

/// Placer that touches no files.
///
/// Every placement is recorded. Results report `method` and a fixed size;
/// [`MockPlacer::set_next_error`] makes the next call fail.
#[derive(Debug)]
pub struct MockPlacer {
    placements: Arc<RwLock<Vec<RecordedPlacement>>>,
    next_error: Arc<RwLock<Option<PlacerError>>>,
    method: ImportMethod,
}

impl Default for MockPlacer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlacer {
    pub fn new() -> Self {
        Self {
            placements: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            method: ImportMethod::Hardlink,
        }
    }

    /// Report `method` for every successful placement.
    pub fn with_method(mut self, method: ImportMethod) -> Self {
        self.method = method;
        self
    }

    pub async fn recorded_placements(&self) -> Vec<RecordedPlacement> {
        self.placements.read().await.clone()
    }

    pub async fn placement_count(&self) -> usize {
        self.placements.read().await.len()
    }

    pub async fn set_next_error(&self, error: PlacerError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Option<PlacerError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl Placer for MockPlacer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn place(&self, placement: FilePlacement) -> Result<PlacedFile, PlacerError> {
        if let Some(err) = self.take_error().await {
            self.placements.write().await.push(RecordedPlacement {
                placement,
                success: false,
            });
            return Err(err);
        }

        let placed = PlacedFile {
            destination: placement.destination.clone(),
            method: self.method,
            size_bytes: 50 * 1024 * 1024,
            checksum: placement
                .verify
                .filter(|_| self.method == ImportMethod::Copy)
                .map(|_| "mock-checksum-abc123".to_string()),
        };
        self.placements.write().await.push(RecordedPlacement {
            placement,
            success: true,
        });
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placer::ChecksumType;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_records_placements() {
        let placer = MockPlacer::new().with_method(ImportMethod::Copy);
        let placed = placer
            .place(
                FilePlacement::new("/dl/a.mkv", "/lib/A/A.mkv")
                    .with_verification(Some(ChecksumType::Sha256)),
            )
            .await
            .unwrap();

        assert_eq!(placed.destination, PathBuf::from("/lib/A/A.mkv"));
        assert_eq!(placed.method, ImportMethod::Copy);
        assert!(placed.checksum.is_some());

        let recorded = placer.recorded_placements().await;
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].success);
    }

    #[tokio::test]
    async fn test_error_injection() {
        let placer = MockPlacer::new();
        placer
            .set_next_error(PlacerError::SourceNotFound {
                path: PathBuf::from("/dl/a.mkv"),
            })
            .await;

        assert!(placer
            .place(FilePlacement::new("/dl/a.mkv", "/lib/a.mkv"))
            .await
            .is_err());
        assert!(placer
            .place(FilePlacement::new("/dl/a.mkv", "/lib/a.mkv"))
            .await
            .is_ok());
        assert_eq!(placer.placement_count().await, 2);
    }
}
