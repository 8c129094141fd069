//! Traffic recording for the capture proxy.
//!
//! Forwarded exchanges are reduced to reusable fixtures: the request path
//! is templated, bodies are kept as JSON when they parse, and the result
//! is held in a [`CaptureStore`] until it is flushed to disk.
//!
//! # Module Structure
//!
//! - `templater` - Concrete path to `{id}` template reduction
//! - `bucket` - Service bucket attribution used to partition files
//! - `types` - Captured exchange and capture file types
//! - `store` - Capture store implementation

mod bucket;
mod store;
mod templater;
mod types;

pub use bucket::{bucket_for, known_buckets, DEFAULT_BUCKET};
pub use store::{bucket_file_name, CaptureStore, FlushSummary, COMBINED_FILE_NAME};
pub use templater::{normalize, IdPrefixes, PathTemplater, ID_PLACEHOLDER};
pub use types::{
    request_body_value, response_body_value, truncate_text, CaptureFile, CapturedExchange,
    MAX_TEXT_BODY_CHARS, TRUNCATION_MARKER, TUNNEL_NOTE,
};
