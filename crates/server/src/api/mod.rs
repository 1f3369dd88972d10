pub mod candidates;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod policies;
pub mod routes;
pub mod settings;
pub mod tasks;
pub mod ws;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;

/// Maximum allowed limit for list queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for list queries
const DEFAULT_LIMIT: i64 = 100;
