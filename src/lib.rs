//! # CCG Gateway
//!
//! A forwarding gateway that sits between AI-assistant command-line
//! clients (Claude Code, Codex, Gemini) and a set of upstream API
//! providers, presenting a single stable endpoint while transparently
//! routing, retrying and rebalancing traffic.
//!
//! The routing core makes per-request control decisions under
//! concurrency: provider selection (availability-first failover or
//! weighted load balancing with session affinity), time-bounded health
//! blacklisting that self-heals, model-name rewriting, and
//! timeout-supervised stream forwarding with partial-failure semantics
//! (a provider that fails mid-stream is never silently retried).
//!
//! Payloads are forwarded verbatim except for model-name substitution;
//! provider persistence and the administrative front-end are external
//! collaborators reached through [`server`]'s admin surface.

pub mod config;
pub mod core;
pub mod server;
pub mod utils;

pub use crate::config::GatewayConfig;
pub use crate::core::forwarder::{Forwarder, ForwardTimeouts, ProxyRequest};
pub use crate::core::health::HealthTracker;
pub use crate::core::registry::ProviderRegistry;
pub use crate::core::selector::{RoutePlan, Selector};
pub use crate::core::session::SessionAffinity;
pub use crate::core::types::{CliType, ModelMap, Provider, RoutingConfig, RoutingMode};
pub use crate::utils::error::{GatewayError, Result};
