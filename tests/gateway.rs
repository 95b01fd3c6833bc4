//! End-to-end tests: dispatch loop against mock upstream providers

use actix_web::{App, test, web};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ccg_gateway::config::InterfaceConfig;
use ccg_gateway::server::{AppState, configure};
use ccg_gateway::{
    CliType, Forwarder, ForwardTimeouts, GatewayConfig, HealthTracker, ModelMap, Provider,
    ProviderRegistry, RoutingConfig, RoutingMode, Selector, SessionAffinity,
};

fn provider(id: &str, cli: CliType, base_url: &str) -> Provider {
    Provider {
        id: id.to_string(),
        cli_type: cli,
        name: id.to_string(),
        base_url: base_url.to_string(),
        credential: format!("sk-{}", id),
        enabled: true,
        position: 0,
        weight: 1,
        failure_threshold: 3,
        blacklist_secs: 300,
        model_maps: Vec::new(),
    }
}

fn state_with(cli: CliType, mode: RoutingMode, providers: Vec<Provider>) -> AppState {
    let mut config = GatewayConfig::default();
    config.interfaces.insert(cli, InterfaceConfig { mode, providers });
    AppState::from_config(&config).unwrap()
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(configure),
        )
        .await
    };
}

#[actix_web::test]
async fn health_endpoint_reports_ok() {
    let app = app!(state_with(CliType::Codex, RoutingMode::AvailabilityFirst, vec![]));
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn unknown_interface_is_not_found() {
    let app = app!(state_with(CliType::Codex, RoutingMode::AvailabilityFirst, vec![]));
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/cursor/v1/chat")
            .set_json(json!({}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn unconfigured_interface_is_service_unavailable() {
    let app = app!(state_with(CliType::Codex, RoutingMode::AvailabilityFirst, vec![]));
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/claude_code/v1/messages")
            .set_json(json!({"model": "claude-opus-4"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 503);
}

#[actix_web::test]
async fn forwards_with_rewritten_model_and_injected_credential() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-primary"))
        .and(body_partial_json(json!({"model": "claude-sonnet-4"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&upstream)
        .await;

    let mut p = provider("primary", CliType::ClaudeCode, &upstream.uri());
    p.credential = "sk-primary".to_string();
    p.model_maps = vec![ModelMap {
        source_model: "claude-opus-4".to_string(),
        target_model: "claude-sonnet-4".to_string(),
        enabled: true,
    }];
    let app = app!(state_with(
        CliType::ClaudeCode,
        RoutingMode::AvailabilityFirst,
        vec![p]
    ));

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/claude_code/v1/messages")
            .set_json(json!({"model": "claude-opus-4", "max_tokens": 16}))
            .to_request(),
    )
    .await;
    assert_eq!(body, json!({"ok": true}));
}

#[actix_web::test]
async fn availability_first_fails_over_in_position_order() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"served_by": "backup"})))
        .mount(&upstream)
        .await;

    // Position 0 refuses connections, position 1 answers
    let dead = provider("dead", CliType::ClaudeCode, "http://127.0.0.1:9");
    let backup = provider("backup", CliType::ClaudeCode, &upstream.uri());
    let app = app!(state_with(
        CliType::ClaudeCode,
        RoutingMode::AvailabilityFirst,
        vec![dead, backup]
    ));

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/claude_code/v1/messages")
            .set_json(json!({"model": "claude-opus-4"}))
            .to_request(),
    )
    .await;
    assert_eq!(body["served_by"], "backup");

    // The failed attempt was counted against the dead provider only
    let view: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/admin/v1/interfaces/claude_code/providers")
            .to_request(),
    )
    .await;
    assert_eq!(view["providers"][0]["id"], "dead");
    assert_eq!(view["providers"][0]["consecutive_failures"], 1);
    assert_eq!(view["providers"][1]["consecutive_failures"], 0);
}

#[actix_web::test]
async fn upstream_error_status_is_forwarded_not_failed_over() {
    let first = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"error": "rate limited"})),
        )
        .mount(&first)
        .await;
    let second = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&second)
        .await;

    let app = app!(state_with(
        CliType::Codex,
        RoutingMode::AvailabilityFirst,
        vec![
            provider("a", CliType::Codex, &first.uri()),
            provider("b", CliType::Codex, &second.uri()),
        ]
    ));

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/codex/v1/responses")
            .set_json(json!({"model": "gpt-5"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 429);
    assert!(second.received_requests().await.unwrap().is_empty());

    // A forwarded response is not a health failure
    let view: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/admin/v1/interfaces/codex/providers")
            .to_request(),
    )
    .await;
    assert_eq!(view["providers"][0]["consecutive_failures"], 0);
}

#[actix_web::test]
async fn load_balanced_traffic_follows_weights() {
    let a = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"served_by": "a"})))
        .mount(&a)
        .await;
    let b = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"served_by": "b"})))
        .mount(&b)
        .await;

    let mut pa = provider("a", CliType::Codex, &a.uri());
    pa.weight = 1;
    let mut pb = provider("b", CliType::Codex, &b.uri());
    pb.weight = 3;
    let app = app!(state_with(
        CliType::Codex,
        RoutingMode::LoadBalanced,
        vec![pa, pb]
    ));

    let mut hits_a = 0;
    let mut hits_b = 0;
    for _ in 0..8 {
        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/codex/v1/responses")
                .set_json(json!({"model": "gpt-5"}))
                .to_request(),
        )
        .await;
        match body["served_by"].as_str().unwrap() {
            "a" => hits_a += 1,
            _ => hits_b += 1,
        }
    }
    assert_eq!((hits_a, hits_b), (2, 6));
}

#[actix_web::test]
async fn session_key_sticks_to_one_provider() {
    let a = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"served_by": "a"})))
        .mount(&a)
        .await;
    let b = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"served_by": "b"})))
        .mount(&b)
        .await;

    let app = app!(state_with(
        CliType::Codex,
        RoutingMode::LoadBalanced,
        vec![
            provider("a", CliType::Codex, &a.uri()),
            provider("b", CliType::Codex, &b.uri()),
        ]
    ));

    let mut seen = std::collections::HashSet::new();
    for _ in 0..6 {
        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/codex/v1/responses")
                .insert_header(("x-session-id", "conversation-1"))
                .set_json(json!({"model": "gpt-5"}))
                .to_request(),
        )
        .await;
        seen.insert(body["served_by"].as_str().unwrap().to_string());
    }
    assert_eq!(seen.len(), 1);
}

#[actix_web::test]
async fn blacklisted_provider_is_excluded_until_unblacklisted() {
    let mut dead = provider("dead", CliType::Gemini, "http://127.0.0.1:9");
    dead.failure_threshold = 1;
    let app = app!(state_with(
        CliType::Gemini,
        RoutingMode::AvailabilityFirst,
        vec![dead]
    ));

    let request = || {
        test::TestRequest::post()
            .uri("/gemini/v1beta/models/gemini-pro:generateContent")
            .set_json(json!({"contents": []}))
            .to_request()
    };

    // The failed attempt trips the threshold
    let resp = test::call_service(&app, request()).await;
    assert_eq!(resp.status().as_u16(), 503);

    let view: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/admin/v1/interfaces/gemini/providers")
            .to_request(),
    )
    .await;
    assert_eq!(view["providers"][0]["blacklisted"], true);
    assert_eq!(view["providers"][0]["consecutive_failures"], 1);

    // Blacklisted: the selector finds nothing and no connection is tried
    let resp = test::call_service(&app, request()).await;
    assert_eq!(resp.status().as_u16(), 503);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/admin/v1/providers/dead/unblacklist")
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());

    let view: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/admin/v1/interfaces/gemini/providers")
            .to_request(),
    )
    .await;
    assert_eq!(view["providers"][0]["blacklisted"], false);
    assert_eq!(view["providers"][0]["consecutive_failures"], 0);
}

#[actix_web::test]
async fn admin_reset_requires_known_provider() {
    let app = app!(state_with(CliType::Codex, RoutingMode::AvailabilityFirst, vec![]));
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/admin/v1/providers/ghost/reset")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn admin_replace_takes_effect_immediately() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"served_by": "new"})))
        .mount(&upstream)
        .await;

    let app = app!(state_with(
        CliType::Codex,
        RoutingMode::AvailabilityFirst,
        vec![provider("old", CliType::Codex, "http://127.0.0.1:9")]
    ));

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri("/admin/v1/interfaces/codex/providers")
            .set_json(json!({
                "mode": "availability_first",
                "providers": [{
                    "id": "new",
                    "cli_type": "codex",
                    "name": "New",
                    "base_url": upstream.uri(),
                    "credential": "sk-new",
                }],
            }))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/codex/v1/responses")
            .set_json(json!({"model": "gpt-5"}))
            .to_request(),
    )
    .await;
    assert_eq!(body["served_by"], "new");
}

#[actix_web::test]
async fn admin_replace_rejects_invalid_lists() {
    let app = app!(state_with(CliType::Codex, RoutingMode::AvailabilityFirst, vec![]));
    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri("/admin/v1/interfaces/codex/providers")
            .set_json(json!({
                "providers": [
                    {"id": "dup", "cli_type": "codex", "name": "x",
                     "base_url": "https://a.example.com", "credential": "sk"},
                    {"id": "dup", "cli_type": "codex", "name": "y",
                     "base_url": "https://b.example.com", "credential": "sk"},
                ],
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn streaming_response_is_relayed_as_sse() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: {\"delta\":\"hi\"}\n\ndata: [DONE]\n\n", "text/event-stream"),
        )
        .mount(&upstream)
        .await;

    let app = app!(state_with(
        CliType::ClaudeCode,
        RoutingMode::AvailabilityFirst,
        vec![provider("sse", CliType::ClaudeCode, &upstream.uri())]
    ));

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/claude_code/v1/messages")
            .set_json(json!({"model": "claude-opus-4", "stream": true}))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    let body = test::read_body(resp).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("data: {\"delta\":\"hi\"}"));
    assert!(text.contains("[DONE]"));
}

/// First-byte timeout on the sole eligible provider: the request fails
/// with a no-provider error and the counter is incremented exactly once.
#[actix_web::test]
async fn first_byte_timeout_counts_one_failure() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: late\n\n", "text/event-stream")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&upstream)
        .await;

    let registry = Arc::new(ProviderRegistry::new());
    registry
        .replace(
            CliType::ClaudeCode,
            vec![provider("slow", CliType::ClaudeCode, &upstream.uri())],
            RoutingConfig {
                mode: RoutingMode::AvailabilityFirst,
            },
        )
        .unwrap();
    let health = Arc::new(HealthTracker::new());
    let sessions = Arc::new(SessionAffinity::new(Duration::from_secs(3600)));
    let selector = Selector::new(
        Arc::clone(&registry),
        Arc::clone(&health),
        Arc::clone(&sessions),
    );
    let forwarder = Forwarder::new(
        Arc::clone(&health),
        ForwardTimeouts {
            first_byte: Duration::from_millis(80),
            idle: Duration::from_millis(80),
            non_stream: Duration::from_millis(80),
        },
    )
    .unwrap();
    let app = app!(AppState {
        registry,
        health: Arc::clone(&health),
        sessions,
        selector,
        forwarder,
    });

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/claude_code/v1/messages")
            .set_json(json!({"model": "claude-opus-4", "stream": true}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 503);
    assert_eq!(health.status("slow").consecutive_failures, 1);
}
