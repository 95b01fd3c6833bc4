//! Inbound request model for the dispatch loop
//!
//! Parsed once per request; every failover attempt re-derives its own
//! provider-specific rewrites from this shared view, so a model map is
//! never applied twice.

use bytes::Bytes;
use serde_json::Value;

use crate::core::types::CliType;

/// An inbound client request, ready to be forwarded
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Client interface the request arrived on
    pub cli: CliType,
    /// HTTP method, verbatim
    pub method: String,
    /// Path below the interface prefix, pass-through
    pub path: String,
    /// Raw query string, possibly empty
    pub query: String,
    /// Inbound headers, names lowercased
    pub headers: Vec<(String, Vec<u8>)>,
    /// Raw body bytes
    pub body: Bytes,
    /// Body parsed as JSON when possible
    pub body_json: Option<Value>,
    /// Requested model, from the body or (Gemini) the path
    pub model: Option<String>,
    /// Session key for affinity, when derivable
    pub session_key: Option<String>,
    /// Whether the client asked for a streaming response
    pub stream_hint: bool,
}

impl ProxyRequest {
    /// Assemble from raw parts, extracting model, session key and
    /// streaming intent
    pub fn new(
        cli: CliType,
        method: String,
        path: String,
        query: String,
        headers: Vec<(String, Vec<u8>)>,
        body: Bytes,
    ) -> Self {
        let body_json: Option<Value> = serde_json::from_slice(&body).ok();
        let model = extract_model(cli, &path, body_json.as_ref());
        let session_key = extract_session_key(&headers, body_json.as_ref());
        let stream_hint = detect_stream(cli, &path, &query, &headers, body_json.as_ref());
        Self {
            cli,
            method,
            path,
            query,
            headers,
            body,
            body_json,
            model,
            session_key,
            stream_hint,
        }
    }
}

/// Requested model: top-level body field, or the Gemini path segment
fn extract_model(cli: CliType, path: &str, body: Option<&Value>) -> Option<String> {
    if let Some(model) = body
        .and_then(|b| b.get("model"))
        .and_then(|m| m.as_str())
    {
        return Some(model.to_string());
    }
    if cli == CliType::Gemini {
        return gemini_path_model(path).map(str::to_string);
    }
    None
}

/// Model name inside a `models/<name>` path segment
pub(crate) fn gemini_path_model(path: &str) -> Option<&str> {
    let start = path.find("models/")? + "models/".len();
    let rest = &path[start..];
    let end = rest.find(|c| c == ':' || c == '/').unwrap_or(rest.len());
    (!rest[..end].is_empty()).then(|| &rest[..end])
}

/// Stable per-conversation key for session affinity
///
/// In order: the `x-session-id` header, the Claude Code
/// `metadata.user_id` body field, a top-level `session_id` body field.
/// Absent means no affinity for this request.
fn extract_session_key(headers: &[(String, Vec<u8>)], body: Option<&Value>) -> Option<String> {
    if let Some(value) = headers
        .iter()
        .find(|(n, _)| n == "x-session-id")
        .and_then(|(_, v)| std::str::from_utf8(v).ok())
        .filter(|v| !v.is_empty())
    {
        return Some(value.to_string());
    }
    let body = body?;
    if let Some(user_id) = body
        .get("metadata")
        .and_then(|m| m.get("user_id"))
        .and_then(|u| u.as_str())
    {
        return Some(user_id.to_string());
    }
    body.get("session_id")
        .and_then(|s| s.as_str())
        .map(str::to_string)
}

/// Whether the client asked for a streaming response
fn detect_stream(
    cli: CliType,
    path: &str,
    query: &str,
    headers: &[(String, Vec<u8>)],
    body: Option<&Value>,
) -> bool {
    if body
        .and_then(|b| b.get("stream"))
        .and_then(|s| s.as_bool())
        .unwrap_or(false)
    {
        return true;
    }
    if headers
        .iter()
        .find(|(n, _)| n == "accept")
        .and_then(|(_, v)| std::str::from_utf8(v).ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
    {
        return true;
    }
    // Gemini encodes streaming in the RPC verb and `alt=sse`
    cli == CliType::Gemini && (path.contains(":streamGenerateContent") || query.contains("alt=sse"))
}
