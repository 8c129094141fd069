//! Shared outbound HTTP client.

use super::tls::relaxed_client_config;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::warn;

/// Type alias for the HTTP client used to reach capture targets.
pub type HttpClient =
    Client<hyper_rustls::HttpsConnector<HttpConnector>, BoxBody<Bytes, hyper::Error>>;

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Create the client with connection pooling and relaxed certificate checks.
pub fn create_http_client(connect_timeout: Duration) -> Result<HttpClient, rustls::Error> {
    let mut http_connector = HttpConnector::new();
    http_connector.set_connect_timeout(Some(connect_timeout));
    http_connector.enforce_http(false);

    warn!("TLS certificate verification DISABLED toward capture targets");
    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(relaxed_client_config()?)
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    Ok(Client::builder(TokioExecutor::new())
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .build(https_connector))
}
