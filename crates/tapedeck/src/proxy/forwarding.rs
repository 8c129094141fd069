//! Plain HTTP forwarding with capture.
//!
//! The request body is read once and reused for both the outbound request
//! and the capture. The target's response is buffered in full, recorded,
//! and mirrored back to the client unchanged.

use super::context::ProxyContext;
use super::headers::{first_values, forwardable_headers};
use super::response_ext::full_body;
use crate::config::ForwardingMode;
use crate::error::ProxyError;
use crate::metrics;
use crate::recording::{bucket_for, request_body_value, response_body_value, CapturedExchange};
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::http::response::Parts;
use hyper::{HeaderMap, Method, Request, Response, Uri};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Where a request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub url: Uri,
    /// Host of `url`, used in the capture description.
    pub host: String,
}

/// Work out the outbound URL for a request.
///
/// Transparent mode forwards to the absolute URL the client asked for.
/// Configured mode joins the target of the request's service bucket (or
/// the `default` target) with the request's path and query.
pub fn resolve_target(
    mode: &ForwardingMode,
    uri: &Uri,
    templated_path: &str,
) -> Result<ResolvedTarget, ProxyError> {
    let url = match mode {
        ForwardingMode::Transparent => {
            if uri.scheme().is_none() || uri.authority().is_none() {
                return Err(ProxyError::InvalidProxyRequest(
                    "transparent mode requires an absolute-form request URI".to_string(),
                ));
            }
            uri.clone()
        }
        ForwardingMode::Configured { .. } => {
            let bucket = bucket_for(templated_path);
            let base = mode.target_for(bucket).ok_or_else(|| {
                ProxyError::InvalidProxyRequest(format!(
                    "no target configured for service '{bucket}'"
                ))
            })?;
            let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
            format!("{base}{path_and_query}").parse::<Uri>().map_err(|e| {
                ProxyError::InvalidProxyRequest(format!("invalid target URL: {e}"))
            })?
        }
    };

    let host = url.host().unwrap_or_default().to_string();
    Ok(ResolvedTarget { url, host })
}

/// Methods whose body is read and forwarded.
fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Forward `req`, record the exchange and return the target's response.
pub async fn forward_and_capture(
    ctx: &ProxyContext,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, ProxyError> {
    let (parts, body) = req.into_parts();
    let original_path = parts.uri.path().to_string();
    let templated_path = ctx.templater.normalize(&original_path);
    let target = resolve_target(&ctx.mode, &parts.uri, &templated_path)?;

    let request_body = if carries_body(&parts.method) {
        body.collect()
            .await
            .map_err(|e| {
                ProxyError::InvalidProxyRequest(format!("failed to read request body: {e}"))
            })?
            .to_bytes()
    } else {
        Bytes::new()
    };

    let request_headers = forwardable_headers(&parts.headers);
    let mut outbound = Request::new(full_body(request_body.clone()));
    *outbound.method_mut() = parts.method.clone();
    *outbound.uri_mut() = target.url.clone();
    *outbound.headers_mut() = request_headers.clone();

    debug!("Forwarding {} {}", parts.method, target.url);

    let started = Instant::now();
    let round_trip = async {
        let response = ctx
            .http_client
            .request(outbound)
            .await
            .map_err(|e| unavailable(&target, &e))?;
        let (response_parts, body) = response.into_parts();
        let bytes = body
            .collect()
            .await
            .map_err(|e| unavailable(&target, &e))?
            .to_bytes();
        Ok::<_, ProxyError>((response_parts, bytes))
    };
    let (response_parts, response_body) =
        match tokio::time::timeout(ctx.upstream_timeout, round_trip).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProxyError::Timeout {
                    target: target.url.to_string(),
                    timeout_secs: ctx.upstream_timeout.as_secs(),
                })
            }
        };
    let elapsed = started.elapsed();

    let exchange = ExchangeRecord {
        method: &parts.method,
        original_path: &original_path,
        templated_path,
        target: &target,
        request_headers: &request_headers,
        request_body: &request_body,
        response: &response_parts,
        response_body: &response_body,
        elapsed,
    }
    .into_captured();

    info!(
        "Captured: {} {} -> {} ({}ms)",
        exchange.method,
        original_path,
        exchange.status,
        elapsed.as_millis()
    );
    let service = exchange.service.clone().unwrap_or_default();
    metrics::record_capture(parts.method.as_str(), &service);
    metrics::record_upstream_duration(
        parts.method.as_str(),
        response_parts.status.as_u16(),
        elapsed.as_secs_f64() * 1000.0,
    );
    ctx.store.append(exchange);

    Ok(Response::from_parts(response_parts, Full::new(response_body)))
}

fn unavailable(target: &ResolvedTarget, error: &dyn std::error::Error) -> ProxyError {
    let mut reason = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    ProxyError::UpstreamUnavailable {
        target: target.url.to_string(),
        reason,
    }
}

/// Borrowed view of a completed round trip.
pub struct ExchangeRecord<'a> {
    pub method: &'a Method,
    pub original_path: &'a str,
    pub templated_path: String,
    pub target: &'a ResolvedTarget,
    pub request_headers: &'a HeaderMap,
    pub request_body: &'a [u8],
    pub response: &'a Parts,
    pub response_body: &'a [u8],
    pub elapsed: Duration,
}

impl ExchangeRecord<'_> {
    pub fn into_captured(self) -> CapturedExchange {
        let response_headers = first_values(&self.response.headers);
        let service = bucket_for(&self.templated_path).to_string();

        CapturedExchange {
            method: self.method.as_str().to_string(),
            status: self.response.status.as_u16(),
            response: response_body_value(self.response_body),
            headers: response_headers.clone(),
            description: format!("Captured from {}", self.target.host),
            captured_at: Utc::now(),
            request_body: request_body_value(self.request_body),
            original_path: Some(self.original_path.to_string()),
            full_url: Some(self.target.url.to_string()),
            response_headers: Some(response_headers),
            request_headers: Some(first_values(self.request_headers)),
            query_params: self.target.url.query().and_then(decode_query),
            response_time_ms: Some(self.elapsed.as_millis() as u64),
            host: Some(self.target.host.clone()),
            service: Some(service),
            path: self.templated_path,
        }
    }
}

/// Decode a query string into its first value per key.
pub fn decode_query(query: &str) -> Option<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(decode_component(key))
            .or_insert_with(|| decode_component(value));
    }
    if params.is_empty() {
        None
    } else {
        Some(params)
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
