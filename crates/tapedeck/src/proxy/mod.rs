//! Capture proxy module.
//!
//! Forwards plain HTTP to its real destination while recording every
//! exchange, and relays CONNECT tunnels without looking inside them.
//!
//! # Module Structure
//!
//! - `server` - ProxyServer struct and accept loop
//! - `handler` - Dispatch between tunneling, control and forwarding
//! - `forwarding` - Forwarding with capture
//! - `tunnel` - CONNECT takeover and byte relay
//! - `control` - `/capture/*` endpoints
//! - `client` - Outbound HTTP client
//! - `tls` - Relaxed certificate verification toward targets
//! - `network` - Listener creation and accept retry

mod client;
mod context;
mod control;
mod forwarding;
mod handler;
mod headers;
mod network;
mod response_ext;
mod server;
mod tls;
mod tunnel;

pub use control::{CLEAR_PATH, LIVE_PATH, METRICS_PATH, SAVE_PATH, STATUS_PATH};
pub use forwarding::{decode_query, resolve_target, ResolvedTarget};
pub use headers::{canonical_name, first_values, forwardable_headers, CorsHeadersExt};
pub use network::{accept_with_retry, create_listener};
pub use response_ext::{error_response, json_response, text_response, ProxyBody, ResponseExt};
pub use server::ProxyServer;
pub use tunnel::{relay, TunnelStats};
