//! ProxyServer struct and main run loop.

use super::client::create_http_client;
use super::context::ProxyContext;
use super::handler::handle_request;
use super::network::{accept_with_retry, create_listener};
use crate::config::{CaptureConfig, ForwardingMode};
use crate::recording::{CaptureStore, PathTemplater};
use anyhow::Context;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// The capture proxy.
pub struct ProxyServer {
    ctx: Arc<ProxyContext>,
    port: u16,
}

impl ProxyServer {
    /// Build the proxy from a resolved configuration.
    pub fn new(config: &CaptureConfig) -> Result<Self, anyhow::Error> {
        config.validate()?;
        let http_client = create_http_client(config.connect_timeout())
            .context("Failed to build TLS client configuration")?;

        let ctx = ProxyContext {
            http_client,
            mode: config.forwarding_mode(),
            templater: PathTemplater::new(config.id_prefixes.clone()),
            store: Arc::new(CaptureStore::new()),
            output_dir: config.output_dir.clone(),
            upstream_timeout: config.upstream_timeout(),
            connect_timeout: config.connect_timeout(),
        };

        Ok(Self {
            ctx: Arc::new(ctx),
            port: config.port,
        })
    }

    /// Handle to the store this proxy records into.
    pub fn store(&self) -> Arc<CaptureStore> {
        Arc::clone(&self.ctx.store)
    }

    /// Bind the configured port on all interfaces and serve forever.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener =
            create_listener(addr).with_context(|| format!("Failed to bind capture proxy to {addr}"))?;
        self.serve(listener).await
    }

    /// Serve connections accepted from `listener`.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let addr = listener.local_addr()?;
        info!("Capture proxy listening on http://{}", addr);
        match &self.ctx.mode {
            ForwardingMode::Transparent => info!("Transparent mode: forwarding to requested URLs"),
            ForwardingMode::Configured { targets } => {
                for (name, url) in targets {
                    info!("Added target: {} -> {}", name, url);
                }
            }
        }
        info!("Saving captures to {}", self.ctx.output_dir.display());

        loop {
            let (stream, remote_addr) = accept_with_retry(|| listener.accept()).await;
            let ctx = Arc::clone(&self.ctx);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let ctx = Arc::clone(&ctx);
                    async move { handle_request(&ctx, req).await }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(io, service)
                    .with_upgrades()
                    .await
                {
                    debug!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}
