//! The forwarding endpoint: any method, any path, per client interface
//!
//! Accepts `/{cli_type}/{tail}` for every method, plans a route, and
//! walks the plan. A pre-first-byte failure moves on to the next
//! candidate only when the plan allows failover (availability-first);
//! once a response has begun, the forwarder owns the outcome.

use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, web};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::forwarder::ProxyRequest;
use crate::core::types::CliType;
use crate::server::state::AppState;
use crate::utils::error::GatewayError;

/// Handles every request under `/{cli_type}/{tail:.*}`
pub async fn dispatch(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Bytes,
) -> ActixResult<HttpResponse> {
    let (cli_raw, tail) = path.into_inner();
    let Ok(cli) = cli_raw.parse::<CliType>() else {
        return Ok(HttpResponse::NotFound().json(json!({
            "error": {
                "code": "UNKNOWN_INTERFACE",
                "message": format!("unknown client interface: {}", cli_raw),
            }
        })));
    };

    let headers = req
        .headers()
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
        .collect();
    let inbound = ProxyRequest::new(
        cli,
        req.method().as_str().to_string(),
        tail,
        req.query_string().to_string(),
        headers,
        body,
    );

    let request_id = Uuid::new_v4();
    let plan = state.selector.plan(cli, inbound.session_key.as_deref())?;
    let total = plan.candidates.len();

    let mut last_err: Option<GatewayError> = None;
    for (attempt, provider) in plan.candidates.iter().enumerate() {
        match state.forwarder.forward(provider, &inbound).await {
            Ok(response) => {
                info!(
                    %request_id,
                    interface = %cli,
                    provider = %provider.id,
                    attempt = attempt + 1,
                    model = inbound.model.as_deref().unwrap_or("-"),
                    streaming = inbound.stream_hint,
                    "request forwarded"
                );
                return Ok(response);
            }
            Err(e) => {
                warn!(
                    %request_id,
                    interface = %cli,
                    provider = %provider.id,
                    attempt = attempt + 1,
                    error = %e,
                    "attempt failed before first byte"
                );
                last_err = Some(e);
                if !plan.failover {
                    break;
                }
            }
        }
    }

    let last_err =
        last_err.unwrap_or_else(|| GatewayError::Internal("empty route plan".to_string()));
    if plan.failover {
        // Every eligible candidate failed pre-first-byte
        Err(GatewayError::NoEligibleProviders(format!(
            "all {} candidates for {} failed, last error: {}",
            total, cli, last_err
        ))
        .into())
    } else {
        Err(last_err.into())
    }
}
