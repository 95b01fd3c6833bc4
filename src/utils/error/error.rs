//! Gateway error type and its HTTP mapping

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors in administrative or client input
    #[error("Validation error: {0}")]
    Validation(String),

    /// No provider is enabled and un-blacklisted for a client interface
    #[error("No eligible providers: {0}")]
    NoEligibleProviders(String),

    /// Provider id not present in the registry
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Transport-level failure talking to an upstream provider
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A timeout class (first-byte, idle, non-streaming) was exceeded
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GatewayError {
    fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "CONFIG_ERROR",
            GatewayError::Validation(_) => "VALIDATION_ERROR",
            GatewayError::NoEligibleProviders(_) => "NO_ELIGIBLE_PROVIDERS",
            GatewayError::ProviderNotFound(_) => "PROVIDER_NOT_FOUND",
            GatewayError::Upstream(_) | GatewayError::HttpClient(_) => "UPSTREAM_ERROR",
            GatewayError::Timeout(_) => "TIMEOUT",
            GatewayError::Serialization(_) | GatewayError::Yaml(_) => "SERIALIZATION_ERROR",
            GatewayError::Io(_) => "IO_ERROR",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::NoEligibleProviders(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::ProviderNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream(_) | GatewayError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Serialization(_) | GatewayError::Yaml(_) => StatusCode::BAD_REQUEST,
            GatewayError::Io(_) | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }))
    }
}
