//! HTTP server setup and run loop

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::config::GatewayConfig;
use crate::server::routes::{admin, health, proxy};
use crate::server::state::AppState;
use crate::utils::error::Result;

/// Register every route on an app
///
/// Shared with the integration tests, which mount the same tree on a
/// test service. Registration order matters: the proxy catch-all must
/// come after `/health` and the admin scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/admin/v1")
                .route(
                    "/interfaces/{cli_type}/providers",
                    web::put().to(admin::replace_providers),
                )
                .route(
                    "/interfaces/{cli_type}/providers",
                    web::get().to(admin::list_providers),
                )
                .route("/providers/{id}/reset", web::post().to(admin::reset_provider))
                .route(
                    "/providers/{id}/unblacklist",
                    web::post().to(admin::unblacklist_provider),
                ),
        )
        .service(
            web::resource("/{cli_type}/{tail:.*}").route(web::route().to(proxy::dispatch)),
        );
}

/// Build state from configuration and serve until shutdown
pub async fn run(config: GatewayConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let state = web::Data::new(AppState::from_config(&config)?);

    info!(host = %host, port, "gateway listening");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .configure(configure)
    })
    .bind((host, port))?
    .run()
    .await?;

    Ok(())
}
