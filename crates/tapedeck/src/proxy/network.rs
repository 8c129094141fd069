//! Listener creation shared by the capture proxy and the mock server.

use socket2::{Domain, Protocol, Socket, Type};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::warn;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Create a TCP listener with `SO_REUSEADDR`, so a restarted server can
/// rebind its port while old connections sit in `TIME_WAIT`.
pub fn create_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

/// Run `accept` until it yields a connection.
///
/// Accept failures such as running out of file descriptors are transient
/// for a long-running server; they are logged and retried after a short
/// pause instead of ending the accept loop.
pub async fn accept_with_retry<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(conn) => return conn,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[tokio::test]
    async fn test_binds_ephemeral_port() {
        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.port() > 0);
        assert!(tokio::net::TcpStream::connect(addr).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_errors_are_retried() {
        let mut attempts = 0;
        let started = tokio::time::Instant::now();
        let accepted = accept_with_retry(|| {
            attempts += 1;
            let result = if attempts < 3 {
                Err(io::Error::new(io::ErrorKind::Other, "Too many open files"))
            } else {
                Ok(attempts)
            };
            async move { result }
        })
        .await;

        assert_eq!(accepted, 3);
        assert!(started.elapsed() >= ACCEPT_RETRY_DELAY * 2);
    }

    #[tokio::test]
    async fn test_accept_with_retry_returns_connection() {
        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(tokio::net::TcpStream::connect(addr));

        let (_stream, remote) = accept_with_retry(|| listener.accept()).await;
        assert!(remote.ip().is_loopback());
        client.await.unwrap().unwrap();
    }
}
