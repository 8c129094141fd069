//! Tapedeck records HTTP traffic through a capture proxy and replays it from
//! a mock server.
//!
//! The capture side ([`proxy`], [`recording`]) forwards requests to their
//! real destination, reduces each exchange to a reusable fixture and writes
//! fixtures to disk on demand. The replay side ([`fixture`], [`mock`])
//! loads fixture files, matches requests against path templates and keeps
//! its table current as the fixture directory changes.

pub mod config;
pub mod error;
pub mod fixture;
pub mod metrics;
pub mod mock;
pub mod proxy;
pub mod recording;
pub mod template;
