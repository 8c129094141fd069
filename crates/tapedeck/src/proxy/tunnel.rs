//! CONNECT tunneling.
//!
//! The target is dialed before anything is promised to the client; a failed
//! dial is answered with 502 on the still-intact HTTP connection. Once the
//! dial succeeds the handler returns `200 Connection Established`, hyper
//! hands the raw connection over through its upgrade mechanism, and bytes
//! are relayed in both directions without being inspected.

use super::context::ProxyContext;
use crate::error::ProxyError;
use crate::metrics;
use crate::recording::{CaptureStore, CapturedExchange};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::ext::ReasonPhrase;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, info};

const RELAY_BUFFER_SIZE: usize = 16 * 1024;

/// How long the target may keep sending after the client has closed.
pub const HALF_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Bytes relayed by a finished tunnel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TunnelStats {
    /// Client to target.
    pub upstream: u64,
    /// Target to client.
    pub downstream: u64,
}

/// Dial the CONNECT target and, on success, schedule the relay for when
/// hyper releases the connection.
pub async fn open_tunnel(
    ctx: &ProxyContext,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, ProxyError> {
    let authority = req
        .uri()
        .authority()
        .map(|authority| authority.to_string())
        .ok_or_else(|| {
            ProxyError::InvalidProxyRequest("CONNECT requires a host:port target".to_string())
        })?;

    info!("CONNECT tunnel requested for: {}", authority);

    let target = match tokio::time::timeout(ctx.connect_timeout, TcpStream::connect(&authority))
        .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return Err(ProxyError::TunnelSetupFailed {
                authority,
                reason: e.to_string(),
            })
        }
        Err(_) => {
            return Err(ProxyError::TunnelSetupFailed {
                authority,
                reason: format!("connect timed out after {}s", ctx.connect_timeout.as_secs()),
            })
        }
    };

    let store = Arc::clone(&ctx.store);
    tokio::spawn(async move {
        match hyper::upgrade::on(req).await {
            Ok(upgraded) => run_tunnel(&store, &authority, TokioIo::new(upgraded), target).await,
            Err(e) => {
                error!("Connection takeover failed for {}: {}", authority, e);
                metrics::record_forward_error("tunnel");
            }
        }
    });

    let mut response = Response::new(Full::new(Bytes::new()));
    response
        .extensions_mut()
        .insert(ReasonPhrase::from_static(b"Connection Established"));
    Ok(response)
}

async fn run_tunnel<C>(store: &CaptureStore, authority: &str, client: C, target: TcpStream)
where
    C: AsyncRead + AsyncWrite + Send + 'static,
{
    store.append(CapturedExchange::tunnel(authority));
    metrics::record_tunnel_opened();
    info!("HTTPS tunnel established to {} (content not captured)", authority);

    let stats = relay(client, target).await;
    metrics::record_tunnel_bytes(stats.upstream, stats.downstream);
    info!(
        "Tunnel to {} closed: {} bytes up, {} bytes down",
        authority, stats.upstream, stats.downstream
    );
}

/// Copy bytes between `client` and `target` until one side is done.
///
/// Client to target runs as a background task, target to client on the
/// calling task, and the two are raced. A closed target ends the tunnel at
/// once. A closed client leaves the target [`HALF_CLOSE_GRACE`] to finish
/// its reply before both connections are dropped. Either way both sockets
/// are released before this returns.
pub async fn relay<C>(client: C, target: TcpStream) -> TunnelStats
where
    C: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (target_read, target_write) = target.into_split();
    let upstream = Arc::new(AtomicU64::new(0));
    let downstream = Arc::new(AtomicU64::new(0));

    let mut background = tokio::spawn(pump(client_read, target_write, Arc::clone(&upstream)));
    let foreground = pump(target_read, client_write, Arc::clone(&downstream));
    tokio::pin!(foreground);

    tokio::select! {
        result = &mut foreground => {
            log_pump_end("target->client", result);
            background.abort();
            if let Ok(result) = background.await {
                log_pump_end("client->target", result);
            }
        }
        joined = &mut background => {
            if let Ok(result) = joined {
                log_pump_end("client->target", result);
            }
            match tokio::time::timeout(HALF_CLOSE_GRACE, &mut foreground).await {
                Ok(result) => log_pump_end("target->client", result),
                Err(_) => debug!("Target still open after client closed, tearing down tunnel"),
            }
        }
    }

    TunnelStats {
        upstream: upstream.load(Ordering::Relaxed),
        downstream: downstream.load(Ordering::Relaxed),
    }
}

fn log_pump_end(direction: &str, result: io::Result<()>) {
    if let Err(e) = result {
        debug!("Tunnel {} ended: {}", direction, e);
    }
}

/// Copy until EOF, then shut down the writer. `copied` is updated as data
/// moves, so the count survives cancellation.
async fn pump<R, W>(mut reader: R, mut writer: W, copied: Arc<AtomicU64>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        copied.fetch_add(n as u64, Ordering::Relaxed);
    }
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn echo_server() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let (mut read, mut write) = socket.split();
            tokio::io::copy(&mut read, &mut write).await.unwrap();
            write.shutdown().await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_relay_is_byte_for_byte() {
        let addr = echo_server().await;
        let target = TcpStream::connect(addr).await.unwrap();
        let (client, mut peer) = tokio::io::duplex(64 * 1024);

        let relay = tokio::spawn(relay(client, target));

        let payload: Vec<u8> = (0..=255u8).cycle().take(40_000).collect();
        peer.write_all(&payload).await.unwrap();
        peer.shutdown().await.unwrap();

        let mut echoed = Vec::new();
        peer.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, payload);

        let stats = relay.await.unwrap();
        assert_eq!(stats.upstream, 40_000);
        assert_eq!(stats.downstream, 40_000);
    }

    #[tokio::test]
    async fn test_target_close_tears_down_client_side() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"bye").await.unwrap();
            // dropping the socket closes the target side
        });

        let target = TcpStream::connect(addr).await.unwrap();
        let (client, mut peer) = tokio::io::duplex(1024);
        let relay = tokio::spawn(relay(client, target));

        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"bye");

        // The client never closed its side; the relay still finishes.
        let stats = tokio::time::timeout(std::time::Duration::from_secs(5), relay)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.downstream, 3);
    }

    #[tokio::test]
    async fn test_client_close_tears_down_silent_target() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            let _ = received_tx.send(received);
            // Hold the connection open without answering.
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            drop(socket);
        });

        let target = TcpStream::connect(addr).await.unwrap();
        let (client, mut peer) = tokio::io::duplex(1024);
        let relay = tokio::spawn(relay(client, target));

        peer.write_all(b"hi").await.unwrap();
        peer.shutdown().await.unwrap();

        let stats = tokio::time::timeout(std::time::Duration::from_secs(5), relay)
            .await
            .expect("relay did not finish after the client closed")
            .unwrap();
        assert_eq!(stats.upstream, 2);
        assert_eq!(stats.downstream, 0);
        assert_eq!(received_rx.await.unwrap(), b"hi");

        // Both halves of the client stream are gone, so the peer sees EOF.
        let mut rest = Vec::new();
        peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_run_tunnel_records_one_exchange() {
        let addr = echo_server().await;
        let target = TcpStream::connect(addr).await.unwrap();
        let (client, mut peer) = tokio::io::duplex(1024);
        let store = Arc::new(CaptureStore::new());

        let task = {
            let store = Arc::clone(&store);
            let authority = addr.to_string();
            tokio::spawn(async move { run_tunnel(&store, &authority, client, target).await })
        };
        peer.write_all(b"ping").await.unwrap();
        peer.shutdown().await.unwrap();
        let mut echoed = Vec::new();
        peer.read_to_end(&mut echoed).await.unwrap();
        task.await.unwrap();

        assert_eq!(echoed, b"ping");
        let captured = store.snapshot();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].is_tunnel());
        assert_eq!(captured[0].path, addr.to_string());
    }
}
