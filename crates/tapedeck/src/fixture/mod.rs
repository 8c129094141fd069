//! Mock fixtures: registry, template matching and hot reload.
//!
//! # Module Structure
//!
//! - `types` - Fixture file and route definitions
//! - `registry` - Atomically swapped table of loaded routes
//! - `matcher` - Positional template matching and response rendering
//! - `watcher` - Debounced reload on fixture directory changes

mod matcher;
mod registry;
mod types;
mod watcher;

pub use matcher::{
    not_found_body, MockResponse, PathTemplate, ReplayMatcher, Resolution, RouteMatch,
};
pub use registry::{is_fixture_file, load_directory, ReloadSummary, RouteRegistry, RouteTable};
pub use types::{route_key, FixtureFile, RouteConfig};
pub use watcher::{relevant_paths, run_reload_loop, FixtureWatcher, DEFAULT_DEBOUNCE};
