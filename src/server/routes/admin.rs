//! Administrative surface consumed by the management layer
//!
//! The persistence/administration layer owns provider records; these
//! endpoints are how its changes reach the router (full-list replace)
//! and how operators touch the router-owned health state. Credentials
//! are accepted on write but never echoed back.

use actix_web::{HttpResponse, Result as ActixResult, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

use crate::core::types::{CliType, ModelMap, Provider, RoutingConfig, RoutingMode};
use crate::server::state::AppState;
use crate::utils::error::GatewayError;

/// Body of a full-list provider replace
#[derive(Debug, Deserialize)]
pub struct ReplaceInterfaceRequest {
    #[serde(default)]
    pub mode: RoutingMode,
    /// Providers in priority order; positions are reassigned from it
    pub providers: Vec<Provider>,
}

/// One provider as reported to the administration layer
///
/// Registry record merged with live health state, credential redacted.
#[derive(Debug, Serialize)]
struct ProviderView {
    id: String,
    cli_type: CliType,
    name: String,
    base_url: String,
    enabled: bool,
    position: u32,
    weight: u32,
    failure_threshold: u32,
    blacklist_secs: u64,
    model_maps: Vec<ModelMap>,
    consecutive_failures: u32,
    blacklisted: bool,
    blacklist_remaining_secs: Option<u64>,
}

/// `PUT /admin/v1/interfaces/{cli_type}/providers`
pub async fn replace_providers(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ReplaceInterfaceRequest>,
) -> ActixResult<HttpResponse> {
    let cli: CliType = path.into_inner().parse::<CliType>()?;
    let request = body.into_inner();
    let count = request.providers.len();
    state
        .registry
        .replace(cli, request.providers, RoutingConfig { mode: request.mode })?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "interface": cli,
        "providers": count,
    })))
}

/// `GET /admin/v1/interfaces/{cli_type}/providers`
pub async fn list_providers(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let cli: CliType = path.into_inner().parse::<CliType>()?;
    let snapshot = state.registry.snapshot(cli);
    let now = Instant::now();

    let providers: Vec<ProviderView> = snapshot
        .providers
        .iter()
        .map(|p| {
            let health = state.health.status(&p.id);
            ProviderView {
                id: p.id.clone(),
                cli_type: p.cli_type,
                name: p.name.clone(),
                base_url: p.base_url.clone(),
                enabled: p.enabled,
                position: p.position,
                weight: p.weight,
                failure_threshold: p.failure_threshold,
                blacklist_secs: p.blacklist_secs,
                model_maps: p.model_maps.clone(),
                consecutive_failures: health.consecutive_failures,
                blacklisted: health.blacklisted(now),
                blacklist_remaining_secs: health
                    .blacklist_remaining(now)
                    .map(|d| d.as_secs()),
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "generated_at": Utc::now().to_rfc3339(),
        "interface": cli,
        "mode": snapshot.config.mode,
        "providers": providers,
    })))
}

/// `POST /admin/v1/providers/{id}/reset`
pub async fn reset_provider(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    require_known(&state, &id)?;
    state.health.reset(&id);
    Ok(HttpResponse::Ok().json(json!({"status": "ok", "provider": id})))
}

/// `POST /admin/v1/providers/{id}/unblacklist`
pub async fn unblacklist_provider(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    require_known(&state, &id)?;
    state.health.unblacklist(&id);
    Ok(HttpResponse::Ok().json(json!({"status": "ok", "provider": id})))
}

fn require_known(state: &AppState, id: &str) -> Result<(), GatewayError> {
    state
        .registry
        .find_provider(id)
        .map(|_| ())
        .ok_or_else(|| GatewayError::ProviderNotFound(id.to_string()))
}
