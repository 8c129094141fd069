//! Route registry: the active set of mock fixtures.
//!
//! The registry is rebuilt wholesale on every reload. Files are read and
//! parsed into a fresh [`RouteTable`] before the write lock is taken; the
//! lock only guards the swap of one `Arc`, so readers see either the old
//! table or the new one, never a mixture.

use super::matcher::{PathTemplate, RouteMatch};
use super::types::{FixtureFile, RouteConfig};
use crate::error::FixtureError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct CompiledRoute {
    template: PathTemplate,
    route: Arc<RouteConfig>,
}

/// Immutable snapshot of all loaded routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    by_key: HashMap<String, Arc<RouteConfig>>,
    /// Candidates per upper-cased method, in precedence order.
    by_method: HashMap<String, Vec<CompiledRoute>>,
}

impl RouteTable {
    /// Build a table from routes in processing order. A later route with
    /// the same `METHOD:path` key replaces an earlier one.
    pub fn from_routes<I>(routes: I) -> Self
    where
        I: IntoIterator<Item = RouteConfig>,
    {
        let mut by_key: HashMap<String, Arc<RouteConfig>> = HashMap::new();
        for route in routes {
            by_key.insert(route.key(), Arc::new(route));
        }

        let mut by_method: HashMap<String, Vec<CompiledRoute>> = HashMap::new();
        for route in by_key.values() {
            by_method
                .entry(route.method.to_uppercase())
                .or_default()
                .push(CompiledRoute {
                    template: PathTemplate::parse(&route.path),
                    route: Arc::clone(route),
                });
        }
        for candidates in by_method.values_mut() {
            candidates.sort_by(|a, b| a.template.precedence_cmp(&b.template));
        }

        Self { by_key, by_method }
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// All routes sorted by key.
    pub fn routes(&self) -> Vec<Arc<RouteConfig>> {
        let mut keys: Vec<_> = self.by_key.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| Arc::clone(&self.by_key[key]))
            .collect()
    }

    /// First template (in precedence order) that structurally matches.
    pub fn find(&self, method: &str, path: &str) -> Option<RouteMatch> {
        self.by_method
            .get(&method.to_uppercase())?
            .iter()
            .find_map(|candidate| {
                candidate.template.captures(path).map(|params| RouteMatch {
                    route: Arc::clone(&candidate.route),
                    params,
                })
            })
    }
}

/// Outcome of loading a fixture directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub files: usize,
    pub routes: usize,
    pub skipped: Vec<PathBuf>,
}

/// Read every `*.json` file directly under `dir` into a new table.
///
/// Files that cannot be read or parsed are logged and skipped. Files are
/// processed in file name order, so on key collisions the file whose name
/// sorts last wins.
pub fn load_directory(dir: &Path) -> Result<(RouteTable, ReloadSummary), FixtureError> {
    let entries = fs::read_dir(dir).map_err(|source| FixtureError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut summary = ReloadSummary::default();
    let mut routes = Vec::new();
    for path in fixture_paths(dir, entries) {
        match read_fixture_file(&path) {
            Ok(file) => {
                debug!(
                    "Loaded {} routes from {}",
                    file.routes.len(),
                    path.display()
                );
                summary.files += 1;
                routes.extend(file.routes);
            }
            Err(e) => {
                warn!("Skipping fixture file: {}", e);
                summary.skipped.push(path);
            }
        }
    }

    let table = RouteTable::from_routes(routes);
    summary.routes = table.len();
    Ok((table, summary))
}

/// Fixture files among `entries`, sorted by name. Entries that cannot be
/// read are logged and skipped.
fn fixture_paths<I>(dir: &Path, entries: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = io::Result<fs::DirEntry>>,
{
    let mut files: Vec<PathBuf> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|path| is_fixture_file(path) && path.is_file())
        .collect();
    files.sort();
    files
}

/// Whether a path names a fixture file (`.json` extension).
pub fn is_fixture_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("json")
}

fn read_fixture_file(path: &Path) -> Result<FixtureFile, FixtureError> {
    let contents = fs::read_to_string(path).map_err(|source| FixtureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| FixtureError::MalformedFixtureFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Holder of the active [`RouteTable`].
#[derive(Debug, Default)]
pub struct RouteRegistry {
    active: RwLock<Arc<RouteTable>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table currently in effect. Holding it keeps it alive across
    /// reloads.
    pub fn current(&self) -> Arc<RouteTable> {
        Arc::clone(&self.active.read())
    }

    /// Install a new table. The previous one is dropped outside the lock.
    pub fn replace(&self, table: RouteTable) {
        let previous = std::mem::replace(&mut *self.active.write(), Arc::new(table));
        drop(previous);
    }

    /// Load `dir` and swap the result in. On a directory-level failure the
    /// previous table stays active.
    pub fn reload(&self, dir: &Path) -> Result<ReloadSummary, FixtureError> {
        let (table, summary) = load_directory(dir)?;
        self.replace(table);
        info!(
            "Total routes loaded: {} from {} files ({} skipped)",
            summary.routes,
            summary.files,
            summary.skipped.len()
        );
        crate::metrics::record_reload(summary.routes);
        Ok(summary)
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    pub fn find(&self, method: &str, path: &str) -> Option<RouteMatch> {
        self.current().find(method, path)
    }
}
