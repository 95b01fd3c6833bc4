//! Provider selection: availability-first failover and weighted load balancing

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

use crate::core::health::HealthTracker;
use crate::core::registry::ProviderRegistry;
use crate::core::session::SessionAffinity;
use crate::core::types::{CliType, Provider, RoutingMode};
use crate::utils::error::{GatewayError, Result};

/// The selector's answer for one request
#[derive(Debug, Clone)]
pub struct RoutePlan {
    /// Candidates in attempt order; load-balanced plans hold exactly one
    pub candidates: Vec<Provider>,
    /// Whether a pre-first-byte failure may move on to the next candidate
    pub failover: bool,
}

/// Chooses providers for inbound requests
///
/// Availability-first returns the full eligible list in position order and
/// lets the dispatch loop walk it. Load-balanced returns a single provider:
/// a sticky session binding when one exists and is still eligible,
/// otherwise a cumulative-weight walk so traffic shares converge to the
/// configured weights over any request window.
pub struct Selector {
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthTracker>,
    sessions: Arc<SessionAffinity>,
    /// Per-interface rotating cursor for the weight walk
    cursors: DashMap<CliType, AtomicU64>,
}

impl Selector {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        health: Arc<HealthTracker>,
        sessions: Arc<SessionAffinity>,
    ) -> Self {
        Self {
            registry,
            health,
            sessions,
            cursors: DashMap::new(),
        }
    }

    /// Build a route plan for one inbound request
    pub fn plan(&self, cli: CliType, session_key: Option<&str>) -> Result<RoutePlan> {
        self.plan_at(cli, session_key, Instant::now())
    }

    pub(crate) fn plan_at(
        &self,
        cli: CliType,
        session_key: Option<&str>,
        now: Instant,
    ) -> Result<RoutePlan> {
        let snapshot = self.registry.snapshot(cli);

        // Snapshot is already position-sorted; filter keeps that order
        let eligible: Vec<Provider> = snapshot
            .providers
            .iter()
            .filter(|p| self.health.is_eligible_at(p, now))
            .cloned()
            .collect();

        if eligible.is_empty() {
            return Err(GatewayError::NoEligibleProviders(format!(
                "no enabled, un-blacklisted provider for {}",
                cli
            )));
        }

        match snapshot.config.mode {
            RoutingMode::AvailabilityFirst => {
                debug!(interface = %cli, candidates = eligible.len(), "availability-first plan");
                Ok(RoutePlan {
                    candidates: eligible,
                    failover: true,
                })
            }
            RoutingMode::LoadBalanced => {
                let chosen = self.pick_balanced(cli, &eligible, session_key, now);
                Ok(RoutePlan {
                    candidates: vec![chosen],
                    failover: false,
                })
            }
        }
    }

    fn pick_balanced(
        &self,
        cli: CliType,
        eligible: &[Provider],
        session_key: Option<&str>,
        now: Instant,
    ) -> Provider {
        // Stickiness takes precedence over weighting, but only while the
        // bound provider stays eligible; otherwise re-pick and overwrite.
        if let Some(key) = session_key {
            if let Some(bound_id) = self.sessions.get_at(key, now) {
                if let Some(provider) = eligible.iter().find(|p| p.id == bound_id) {
                    debug!(interface = %cli, provider = %bound_id, "session affinity hit");
                    return provider.clone();
                }
                debug!(
                    interface = %cli,
                    provider = %bound_id,
                    "sticky provider no longer eligible, re-picking"
                );
            }
        }

        let chosen = self.weighted_pick(cli, eligible);
        if let Some(key) = session_key {
            self.sessions.put_at(key, &chosen.id, now);
        }
        chosen
    }

    /// Cumulative-weight walk over the eligible list
    ///
    /// The per-interface cursor rotates through the total weight, so over
    /// any window of N requests each provider receives its weight fraction
    /// exactly. Equal weights fall out in position order because the
    /// eligible list is position-sorted.
    fn weighted_pick(&self, cli: CliType, eligible: &[Provider]) -> Provider {
        let total: u64 = eligible.iter().map(|p| u64::from(p.weight)).sum();
        let cursor = self
            .cursors
            .entry(cli)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
        let ticket = cursor % total;

        let mut walked = 0u64;
        for provider in eligible {
            walked += u64::from(provider.weight);
            if ticket < walked {
                debug!(interface = %cli, provider = %provider.id, ticket, "weighted pick");
                return provider.clone();
            }
        }
        // ticket < total, so the walk always lands inside the list
        unreachable!("weight walk exhausted the eligible list")
    }
}
