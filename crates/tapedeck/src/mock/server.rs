//! MockServer struct and main run loop.

use super::handler::{handle_mock_request, MockContext};
use crate::config::MockConfig;
use crate::fixture::{FixtureWatcher, ReplayMatcher, RouteRegistry};
use crate::proxy::{accept_with_retry, create_listener};
use anyhow::Context;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Replays fixtures from a watched directory.
pub struct MockServer {
    ctx: Arc<MockContext>,
    config: MockConfig,
}

impl MockServer {
    pub fn new(config: MockConfig) -> Self {
        let registry = Arc::new(RouteRegistry::new());
        let ctx = MockContext {
            matcher: ReplayMatcher::new(registry),
            fixtures_dir: config.fixtures_dir.clone(),
        };
        Self {
            ctx: Arc::new(ctx),
            config,
        }
    }

    pub fn registry(&self) -> Arc<RouteRegistry> {
        Arc::clone(self.ctx.matcher.registry())
    }

    /// Bind the configured port on all interfaces and serve forever.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = create_listener(addr)
            .with_context(|| format!("Failed to bind mock server to {addr}"))?;
        self.serve(listener).await
    }

    /// Load fixtures, start watching the fixture directory and serve
    /// connections accepted from `listener`.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let dir = &self.config.fixtures_dir;
        info!("Loading route configurations from: {}", dir.display());
        if let Err(e) = self.registry().reload(dir) {
            warn!("Failed to load initial routes: {}", e);
        }

        // Dropping the watcher stops the reloads, so it lives as long as
        // the accept loop.
        let _watcher = if self.config.watch {
            match FixtureWatcher::start(self.registry(), dir.clone(), self.config.debounce()) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    warn!("Failed to watch config directory: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let addr = listener.local_addr()?;
        info!("Mock API server listening on http://{}", addr);

        loop {
            let (stream, remote_addr) = accept_with_retry(|| listener.accept()).await;
            let ctx = Arc::clone(&self.ctx);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let ctx = Arc::clone(&ctx);
                    async move { handle_mock_request(&ctx, req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}
