//! Trait definitions for the placer module.

use async_trait::async_trait;

use super::error::PlacerError;
use super::types::{FilePlacement, PlacedFile};

/// A placer that can put files at their final destinations.
#[async_trait]
pub trait Placer: Send + Sync {
    /// Returns the name of this placer implementation.
    fn name(&self) -> &str;

    /// Hardlink or copy one file. Parent directories are created as needed.
    async fn place(&self, placement: FilePlacement) -> Result<PlacedFile, PlacerError>;
}
