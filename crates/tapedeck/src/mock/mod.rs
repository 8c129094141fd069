//! Mock server module.
//!
//! Serves the fixtures of a directory over HTTP and reloads them when the
//! directory changes.
//!
//! # Module Structure
//!
//! - `server` - MockServer struct, initial load and accept loop
//! - `handler` - Control endpoints, replay, delay and CORS

mod handler;
mod server;

pub use handler::{build_mock_response, MockContext, METRICS_PATH, RELOAD_PATH, ROUTES_PATH};
pub use server::MockServer;
