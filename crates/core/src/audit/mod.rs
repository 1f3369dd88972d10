//! Append-only audit log of job and task transitions.

mod events;
mod handle;
mod sqlite;
mod store;

pub use events::*;
pub use handle::*;
pub use sqlite::*;
pub use store::*;
