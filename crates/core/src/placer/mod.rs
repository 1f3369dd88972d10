//! Placing imported files in a library.
//!
//! A placement hardlinks the source when source and destination share a
//! filesystem and falls back to a copy otherwise. Copies are written to a
//! temporary sibling and renamed into place, so a crash never leaves a
//! half-written file under the final name.

mod config;
mod error;
mod fs_placer;
mod traits;
mod types;

pub use config::PlacerConfig;
pub use error::PlacerError;
pub use fs_placer::FsPlacer;
pub use traits::Placer;
pub use types::{ChecksumType, FilePlacement, ImportMethod, PlacedFile};
