//! HTTP surface, websocket event stream and metrics for the snaggle service.

pub mod api;
pub mod metrics;
pub mod state;

pub use api::create_router;
pub use state::AppState;
