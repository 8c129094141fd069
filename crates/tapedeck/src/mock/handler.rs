//! Request handling for the mock server.
//!
//! Requests under `/_mock/` are control requests. Everything else is
//! resolved against the active fixture table.

use crate::fixture::{MockResponse, ReplayMatcher, Resolution, RouteConfig};
use crate::metrics;
use crate::proxy::{error_response, json_response, CorsHeadersExt};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const ROUTES_PATH: &str = "/_mock/routes";
pub const RELOAD_PATH: &str = "/_mock/reload";
pub const METRICS_PATH: &str = "/_mock/metrics";

/// State shared by all mock requests.
pub struct MockContext {
    pub matcher: ReplayMatcher,
    pub fixtures_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct ReloadBody {
    routes: usize,
    files: usize,
    skipped: usize,
}

/// Handle a request to the mock server. CORS headers are added to every
/// response.
pub async fn handle_mock_request(
    ctx: &MockContext,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = match (&method, path.as_str()) {
        (&Method::GET, ROUTES_PATH) => {
            let routes = ctx.matcher.registry().current().routes();
            let routes: Vec<&RouteConfig> = routes.iter().map(|route| route.as_ref()).collect();
            json_response(StatusCode::OK, &routes)
        }
        (&Method::POST, RELOAD_PATH) => reload(ctx).await,
        (&Method::GET, METRICS_PATH) => {
            let mut response = Response::new(Full::new(Bytes::from(metrics::collect_metrics())));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        _ => replay(ctx, &method, &path).await,
    };

    response.headers_mut().allow_any_cors();
    Ok(response)
}

async fn replay(ctx: &MockContext, method: &Method, path: &str) -> Response<Full<Bytes>> {
    match ctx.matcher.resolve(method.as_str(), path) {
        Resolution::Matched(mock) => {
            metrics::record_mock_request(method.as_str(), true);
            info!("Matched route: {} {} -> {}", method, path, mock.status);
            if let Some(delay) = mock.delay {
                tokio::time::sleep(delay).await;
            }
            build_mock_response(mock)
        }
        Resolution::NotFound(_) if method == Method::OPTIONS => {
            debug!("Preflight for {}", path);
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NO_CONTENT;
            response
        }
        Resolution::NotFound(body) => {
            metrics::record_mock_request(method.as_str(), false);
            info!("No route found for {} {}", method, path);
            json_response(StatusCode::NOT_FOUND, &body)
        }
    }
}

/// Turn a rendered fixture into an HTTP response.
///
/// The body is always JSON-encoded, so a string payload is served as a JSON
/// string. `Content-Type` defaults to `application/json` unless the fixture
/// sets one. Headers that are not valid HTTP are skipped.
pub fn build_mock_response(mock: MockResponse) -> Response<Full<Bytes>> {
    let status = match StatusCode::from_u16(mock.status) {
        Ok(status) => status,
        Err(_) => {
            warn!("Fixture has invalid status {}", mock.status);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("invalid fixture status {}", mock.status),
            );
        }
    };

    let mut response = json_response(status, &mock.body);
    for (name, value) in &mock.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!("Skipping invalid fixture header {}: {}", name, value),
        }
    }
    response
}

async fn reload(ctx: &MockContext) -> Response<Full<Bytes>> {
    let registry = Arc::clone(ctx.matcher.registry());
    let dir = ctx.fixtures_dir.clone();
    match tokio::task::spawn_blocking(move || registry.reload(&dir)).await {
        Ok(Ok(summary)) => json_response(
            StatusCode::OK,
            &ReloadBody {
                routes: summary.routes,
                files: summary.files,
                skipped: summary.skipped.len(),
            },
        ),
        Ok(Err(e)) => {
            error!("Error reloading routes: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
        Err(e) => {
            error!("Reload task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "reload task failed")
        }
    }
}
