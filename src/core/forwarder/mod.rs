//! Upstream forwarding with timeout supervision
//!
//! The forwarder performs the actual upstream call for a chosen provider:
//! credential injection, model rewriting, streaming relay, and the three
//! timeout classes (first-byte, idle, non-streaming). Every outcome is
//! reported to the health tracker before control returns.
//!
//! Any `Err` from [`Forwarder::forward`] happened before a single
//! response byte reached the client, so the dispatch loop may fail over
//! to the next candidate. Once a response has begun, mid-stream failures
//! are handled inside the relay stream: recorded, logged, never retried.

mod relay;
mod request;

pub use request::ProxyRequest;

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use bytes::Bytes;
use futures::StreamExt;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::core::health::HealthTracker;
use crate::core::types::{CliType, Provider};
use crate::utils::error::{GatewayError, Result};

/// Headers never copied in either direction
///
/// Hop-by-hop headers plus the ones the gateway computes itself.
static STRIPPED_HEADERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "proxy-connection",
        "te",
        "trailer",
        "transfer-encoding",
        "upgrade",
        "host",
        "content-length",
    ])
});

/// Inbound credential headers replaced with the provider's own
static CREDENTIAL_HEADERS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["authorization", "x-api-key", "x-goog-api-key"]));

/// The three timeout classes enforced per upstream attempt
#[derive(Debug, Clone, Copy)]
pub struct ForwardTimeouts {
    /// Maximum wait from send to the first response chunk (streaming)
    pub first_byte: Duration,
    /// Maximum gap between successive chunks once streaming has started
    pub idle: Duration,
    /// Maximum total wait for a complete non-streaming response
    pub non_stream: Duration,
}

impl Default for ForwardTimeouts {
    fn default() -> Self {
        Self {
            first_byte: Duration::from_secs(30),
            idle: Duration::from_secs(60),
            non_stream: Duration::from_secs(120),
        }
    }
}

/// Performs upstream calls on behalf of the dispatch loop
pub struct Forwarder {
    client: reqwest::Client,
    health: Arc<HealthTracker>,
    timeouts: ForwardTimeouts,
}

impl Forwarder {
    /// Build a forwarder with a shared connection pool
    ///
    /// The client carries only a connect timeout; the per-request classes
    /// are supervised by [`forward`](Self::forward) itself.
    pub fn new(health: Arc<HealthTracker>, timeouts: ForwardTimeouts) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            health,
            timeouts,
        })
    }

    /// Forward one request to one provider
    ///
    /// Returns an `HttpResponse` once the upstream response has begun
    /// (first chunk for streaming, complete body otherwise). Errors are
    /// always pre-first-byte and already reported to the health tracker.
    pub async fn forward(
        &self,
        provider: &Provider,
        inbound: &ProxyRequest,
    ) -> Result<HttpResponse> {
        let url = build_url(provider, inbound)?;
        let method = reqwest::Method::from_bytes(inbound.method.as_bytes())
            .map_err(|e| GatewayError::Internal(format!("invalid method: {}", e)))?;

        let builder = self
            .client
            .request(method, url)
            .headers(outbound_headers(provider, inbound))
            .body(effective_body(provider, inbound)?);

        let started = Instant::now();
        let send_budget = if inbound.stream_hint {
            self.timeouts.first_byte
        } else {
            self.timeouts.non_stream
        };

        let response = match timeout(send_budget, builder.send()).await {
            Err(_) => {
                self.health.record_failure(provider);
                return Err(GatewayError::Timeout(format!(
                    "no response headers from provider {} within {:?}",
                    provider.id, send_budget
                )));
            }
            Ok(Err(e)) => {
                self.health.record_failure(provider);
                return Err(GatewayError::Upstream(format!(
                    "request to provider {} failed: {}",
                    provider.id, e
                )));
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            // Forwarded verbatim; only transport/timeout failures count
            // against health, an upstream 4xx may just be a bad request.
            debug!(provider = %provider.id, status = %status, "upstream non-success status");
        }

        if inbound.stream_hint || is_event_stream(response.headers()) {
            self.begin_streaming(provider, response, started, inbound.stream_hint)
                .await
        } else {
            self.read_buffered(provider, response, started).await
        }
    }

    /// Streaming path: supervise the first chunk, then hand off to the relay
    async fn begin_streaming(
        &self,
        provider: &Provider,
        response: reqwest::Response,
        started: Instant,
        stream_hint: bool,
    ) -> Result<HttpResponse> {
        let status = response.status();
        let headers = response.headers().clone();
        let mut upstream = Box::pin(response.bytes_stream());

        // When only the response revealed streaming, the first-byte budget
        // was never armed; bound the first chunk by the idle class instead.
        let budget = if stream_hint {
            self.timeouts
                .first_byte
                .saturating_sub(started.elapsed())
        } else {
            self.timeouts.idle
        };

        let first_chunk: Option<Bytes> = match timeout(budget, upstream.next()).await {
            Err(_) => {
                self.health.record_failure(provider);
                return Err(GatewayError::Timeout(format!(
                    "first byte from provider {} not received within {:?}",
                    provider.id, self.timeouts.first_byte
                )));
            }
            Ok(Some(Err(e))) => {
                self.health.record_failure(provider);
                return Err(GatewayError::Upstream(format!(
                    "provider {} stream failed before first byte: {}",
                    provider.id, e
                )));
            }
            Ok(Some(Ok(chunk))) => Some(chunk),
            Ok(None) => None,
        };

        // The response has begun: from here on failures are mid-stream,
        // never retried, and handled inside the relay.
        self.health.record_success(&provider.id);
        debug!(
            provider = %provider.id,
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "streaming response begun"
        );

        let body = relay::relay(
            provider.clone(),
            Arc::clone(&self.health),
            first_chunk,
            upstream,
            self.timeouts.idle,
        );

        let mut builder = HttpResponse::build(downstream_status(status));
        copy_response_headers(&mut builder, &headers);
        Ok(builder.streaming(body))
    }

    /// Non-streaming path: the whole body within the non-stream budget
    async fn read_buffered(
        &self,
        provider: &Provider,
        response: reqwest::Response,
        started: Instant,
    ) -> Result<HttpResponse> {
        let status = response.status();
        let headers = response.headers().clone();

        let remaining = self.timeouts.non_stream.saturating_sub(started.elapsed());
        let body = match timeout(remaining, response.bytes()).await {
            Err(_) => {
                self.health.record_failure(provider);
                return Err(GatewayError::Timeout(format!(
                    "complete response from provider {} not received within {:?}",
                    provider.id, self.timeouts.non_stream
                )));
            }
            Ok(Err(e)) => {
                self.health.record_failure(provider);
                return Err(GatewayError::Upstream(format!(
                    "reading response body from provider {} failed: {}",
                    provider.id, e
                )));
            }
            Ok(Ok(body)) => body,
        };

        self.health.record_success(&provider.id);
        debug!(
            provider = %provider.id,
            status = %status,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "buffered response complete"
        );

        let mut builder = HttpResponse::build(downstream_status(status));
        copy_response_headers(&mut builder, &headers);
        Ok(builder.body(body))
    }
}

/// Upstream URL for one attempt: base URL + pass-through path and query
///
/// For Gemini the model travels in the path, so the model segment is
/// rewritten through the provider's map here.
fn build_url(provider: &Provider, inbound: &ProxyRequest) -> Result<String> {
    let base = provider.base_url.trim_end_matches('/');
    let path = if provider.cli_type == CliType::Gemini {
        rewrite_gemini_path(&inbound.path, provider)
    } else {
        inbound.path.clone()
    };
    let mut url = format!("{}/{}", base, path.trim_start_matches('/'));
    if !inbound.query.is_empty() {
        url.push('?');
        url.push_str(&inbound.query);
    }
    Ok(url)
}

/// Rewrite the `models/<name>` path segment through the provider's map
fn rewrite_gemini_path(path: &str, provider: &Provider) -> String {
    let Some(start) = path.find("models/").map(|i| i + "models/".len()) else {
        return path.to_string();
    };
    let rest = &path[start..];
    let end = rest
        .find(|c| c == ':' || c == '/')
        .unwrap_or(rest.len());
    let requested = &rest[..end];
    let effective = provider.rewrite_model(requested);
    if effective == requested {
        return path.to_string();
    }
    format!("{}{}{}", &path[..start], effective, &rest[end..])
}

/// Outbound body: top-level `"model"` rewritten, everything else verbatim
fn effective_body(provider: &Provider, inbound: &ProxyRequest) -> Result<Bytes> {
    let Some(json) = &inbound.body_json else {
        return Ok(inbound.body.clone());
    };
    let Some(requested) = json.get("model").and_then(|m| m.as_str()) else {
        return Ok(inbound.body.clone());
    };
    let effective = provider.rewrite_model(requested);
    if effective == requested {
        return Ok(inbound.body.clone());
    }
    let mut rewritten = json.clone();
    rewritten["model"] = serde_json::Value::String(effective.to_string());
    Ok(Bytes::from(serde_json::to_vec(&rewritten)?))
}

/// Inbound headers minus hop-by-hop and credentials, plus the provider's own
fn outbound_headers(provider: &Provider, inbound: &ProxyRequest) -> reqwest::header::HeaderMap {
    use reqwest::header::{HeaderName, HeaderValue};

    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in &inbound.headers {
        if STRIPPED_HEADERS.contains(name.as_str()) || CREDENTIAL_HEADERS.contains(name.as_str()) {
            continue;
        }
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value),
        ) else {
            warn!(header = name.as_str(), "dropping malformed inbound header");
            continue;
        };
        headers.append(name, value);
    }

    if inbound.body_json.is_some() && !headers.contains_key(reqwest::header::CONTENT_TYPE) {
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    let credential = match provider.cli_type {
        CliType::ClaudeCode => ("x-api-key", provider.credential.clone()),
        CliType::Codex => ("authorization", format!("Bearer {}", provider.credential)),
        CliType::Gemini => ("x-goog-api-key", provider.credential.clone()),
    };
    if let Ok(value) = HeaderValue::from_str(&credential.1) {
        headers.insert(HeaderName::from_static(credential.0), value);
    }

    headers
}

/// Whether the upstream response is a server-sent event stream
fn is_event_stream(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"))
}

/// Upstream status forwarded as received
fn downstream_status(status: reqwest::StatusCode) -> StatusCode {
    StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY)
}

/// Copy upstream response headers, minus the stripped set
fn copy_response_headers(
    builder: &mut actix_web::HttpResponseBuilder,
    headers: &reqwest::header::HeaderMap,
) {
    for (name, value) in headers {
        if STRIPPED_HEADERS.contains(name.as_str()) {
            continue;
        }
        builder.append_header((name.as_str(), value.as_bytes()));
    }
}
