//! Capture store: append-only collection of recorded exchanges.

use super::bucket::bucket_for;
use super::types::{CaptureFile, CapturedExchange};
use crate::error::CaptureError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File holding every exchange of a flush.
pub const COMBINED_FILE_NAME: &str = "all-captured.json";

/// Per-bucket file name (`accounts-captured.json`).
pub fn bucket_file_name(bucket: &str) -> String {
    format!("{bucket}-captured.json")
}

/// Result of a successful flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushSummary {
    /// Number of exchanges written (and cleared).
    pub routes: usize,
    /// Files written, per-bucket files first, combined file last.
    pub files: Vec<PathBuf>,
}

/// Thread-safe store of captured exchanges.
///
/// A single mutex guards the collection; every critical section is short
/// except `flush`, which writes its files while holding the lock so that
/// no exchange can slip in between the write and the reset.
#[derive(Debug, Default)]
pub struct CaptureStore {
    exchanges: Mutex<Vec<CapturedExchange>>,
}

impl CaptureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, exchange: CapturedExchange) {
        self.exchanges.lock().push(exchange);
    }

    /// Copy of the current collection.
    pub fn snapshot(&self) -> Vec<CapturedExchange> {
        self.exchanges.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.exchanges.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.lock().is_empty()
    }

    /// Drop everything held. Returns how many exchanges were discarded.
    pub fn clear(&self) -> usize {
        let mut exchanges = self.exchanges.lock();
        let count = exchanges.len();
        exchanges.clear();
        count
    }

    /// Write one file per non-empty bucket plus the combined file, then reset.
    ///
    /// A failed write aborts the remaining writes and leaves the collection
    /// untouched; files already written stay on disk.
    pub fn flush(&self, output_dir: &Path) -> Result<FlushSummary, CaptureError> {
        let mut exchanges = self.exchanges.lock();
        if exchanges.is_empty() {
            return Err(CaptureError::NothingToFlush);
        }

        fs::create_dir_all(output_dir).map_err(|source| CaptureError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let mut grouped: BTreeMap<&str, Vec<CapturedExchange>> = BTreeMap::new();
        for exchange in exchanges.iter() {
            grouped
                .entry(bucket_for(&exchange.path))
                .or_default()
                .push(exchange.clone());
        }

        let mut files = Vec::with_capacity(grouped.len() + 1);
        for (bucket, routes) in grouped {
            let path = output_dir.join(bucket_file_name(bucket));
            let count = routes.len();
            write_capture_file(&path, &CaptureFile { routes })?;
            info!("Saved {} routes to {}", count, path.display());
            files.push(path);
        }

        let combined = output_dir.join(COMBINED_FILE_NAME);
        write_capture_file(
            &combined,
            &CaptureFile {
                routes: exchanges.clone(),
            },
        )?;
        info!(
            "Saved all {} captures to {}",
            exchanges.len(),
            combined.display()
        );
        files.push(combined);

        let routes = exchanges.len();
        exchanges.clear();
        Ok(FlushSummary { routes, files })
    }
}

fn write_capture_file(path: &Path, file: &CaptureFile) -> Result<(), CaptureError> {
    let json = serde_json::to_string_pretty(file)?;
    fs::write(path, json).map_err(|source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::types::response_body_value;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn exchange(method: &str, path: &str) -> CapturedExchange {
        CapturedExchange {
            method: method.to_string(),
            path: path.to_string(),
            status: 200,
            response: response_body_value(br#"{"ok": true}"#),
            headers: BTreeMap::new(),
            description: "Captured from test".to_string(),
            captured_at: chrono::Utc::now(),
            request_body: None,
            original_path: Some(path.to_string()),
            full_url: None,
            response_headers: None,
            request_headers: None,
            query_params: None,
            response_time_ms: Some(3),
            host: Some("api.test".to_string()),
            service: Some(bucket_for(path).to_string()),
        }
    }

    fn read_routes(path: &Path) -> Vec<CapturedExchange> {
        let json = fs::read_to_string(path).unwrap();
        serde_json::from_str::<CaptureFile>(&json).unwrap().routes
    }

    #[test]
    fn test_flush_empty_store_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("captured");
        let store = CaptureStore::new();

        let err = store.flush(&out).unwrap_err();
        assert!(matches!(err, CaptureError::NothingToFlush));
        assert!(!out.exists());
    }

    #[test]
    fn test_append_snapshot_clear() {
        let store = CaptureStore::new();
        store.append(exchange("GET", "/users/{id}"));
        store.append(exchange("POST", "/posts"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].path, "/users/{id}");

        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        // The snapshot is an independent copy.
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_flush_partitions_by_bucket_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let store = CaptureStore::new();
        store.append(exchange("GET", "/accounts/{id}"));
        store.append(exchange("GET", "/accounts/{id}/cards"));
        store.append(exchange("GET", "/wallet/{id}"));
        store.append(exchange("GET", "/health"));

        let summary = store.flush(dir.path()).unwrap();
        assert_eq!(summary.routes, 4);
        assert_eq!(store.len(), 0);

        let accounts = read_routes(&dir.path().join("accounts-captured.json"));
        assert_eq!(accounts.len(), 2);
        let cards = read_routes(&dir.path().join("cards-captured.json"));
        assert_eq!(cards.len(), 1);
        let misc = read_routes(&dir.path().join("misc-captured.json"));
        assert_eq!(misc.len(), 1);
        assert!(!dir.path().join("users-captured.json").exists());

        let combined = read_routes(&dir.path().join(COMBINED_FILE_NAME));
        assert_eq!(combined.len(), 4);
        assert_eq!(summary.files.last(), Some(&dir.path().join(COMBINED_FILE_NAME)));
    }

    #[test]
    fn test_bucket_files_union_equals_combined() {
        let dir = tempfile::tempdir().unwrap();
        let store = CaptureStore::new();
        let paths = [
            "/accounts/{id}",
            "/customers/{id}",
            "/ledger",
            "/users/{id}/posts",
            "/posts/{id}",
            "/statements/{id}",
            "/authorizations",
            "/other",
        ];
        for (i, path) in paths.iter().enumerate() {
            let mut ex = exchange("GET", path);
            ex.status = 200 + i as u16;
            store.append(ex);
        }

        let summary = store.flush(dir.path()).unwrap();
        let key = |e: &CapturedExchange| (e.method.clone(), e.path.clone(), e.status);

        let mut union = HashSet::new();
        for file in &summary.files[..summary.files.len() - 1] {
            for ex in read_routes(file) {
                assert!(union.insert(key(&ex)), "exchange written to two buckets");
            }
        }
        let combined: HashSet<_> = read_routes(&dir.path().join(COMBINED_FILE_NAME))
            .iter()
            .map(key)
            .collect();
        assert_eq!(union.len(), paths.len());
        assert_eq!(union, combined);
    }

    #[test]
    fn test_flush_overwrites_previous_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = CaptureStore::new();
        store.append(exchange("GET", "/users/{id}"));
        store.append(exchange("GET", "/users"));
        store.flush(dir.path()).unwrap();

        store.append(exchange("DELETE", "/users/{id}"));
        store.flush(dir.path()).unwrap();

        let users = read_routes(&dir.path().join("users-captured.json"));
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].method, "DELETE");
    }

    #[test]
    fn test_failed_flush_keeps_exchanges() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the output directory should be.
        let blocked = dir.path().join("not-a-dir");
        fs::write(&blocked, "x").unwrap();

        let store = CaptureStore::new();
        store.append(exchange("GET", "/users"));
        let err = store.flush(&blocked).unwrap_err();
        assert!(matches!(err, CaptureError::Io { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_appends() {
        let store = Arc::new(CaptureStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.append(exchange("GET", &format!("/t{t}/{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 400);
    }
}
