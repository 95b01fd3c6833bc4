//! Per-provider health state: failure counting and time-bounded blacklists
//!
//! State machine per provider: `healthy` until `failure_threshold`
//! consecutive transport failures, then `blacklisted` until
//! `blacklist_duration` elapses (checked lazily at selection time, no
//! background timer), a successful forward, or an administrative
//! unblacklist. State is process-local and intentionally not persisted:
//! a restart starts every provider healthy.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::core::types::Provider;

/// Mutable health state for one provider
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthState {
    /// Consecutive transport/timeout failures since the last success
    pub consecutive_failures: u32,
    /// Blacklist expiry; absent or past means not blacklisted
    pub blacklisted_until: Option<Instant>,
}

impl HealthState {
    /// Whether the blacklist is active at `now`
    pub fn blacklisted(&self, now: Instant) -> bool {
        self.blacklisted_until.is_some_and(|until| now < until)
    }

    /// Remaining blacklist time at `now`, if any
    pub fn blacklist_remaining(&self, now: Instant) -> Option<Duration> {
        self.blacklisted_until
            .and_then(|until| until.checked_duration_since(now))
            .filter(|d| !d.is_zero())
    }
}

/// Tracks failure counters and blacklists for all providers
///
/// Each provider gets its own mutex-guarded cell, so success/failure/reset
/// for one provider serialize against each other while different providers
/// stay fully independent.
#[derive(Debug, Default)]
pub struct HealthTracker {
    cells: DashMap<String, Mutex<HealthState>>,
}

impl HealthTracker {
    /// Create an empty tracker; every provider starts healthy
    pub fn new() -> Self {
        Self::default()
    }

    fn with_cell<T>(&self, id: &str, f: impl FnOnce(&mut HealthState) -> T) -> T {
        let cell = self
            .cells
            .entry(id.to_string())
            .or_insert_with(Mutex::default);
        let mut state = cell.lock();
        f(&mut state)
    }

    /// Record a successful forward: counter reset, blacklist cleared
    pub fn record_success(&self, id: &str) {
        self.with_cell(id, |state| {
            if state.consecutive_failures > 0 || state.blacklisted_until.is_some() {
                debug!(provider = id, "provider recovered");
            }
            *state = HealthState::default();
        });
    }

    /// Record a transport/timeout failure against a provider
    ///
    /// Blacklists the provider once the counter reaches its
    /// `failure_threshold`; further failures while at or past the
    /// threshold re-arm the blacklist window.
    pub fn record_failure(&self, provider: &Provider) {
        self.record_failure_at(provider, Instant::now());
    }

    pub(crate) fn record_failure_at(&self, provider: &Provider, now: Instant) {
        self.with_cell(&provider.id, |state| {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            if state.consecutive_failures >= provider.failure_threshold {
                state.blacklisted_until = Some(now + provider.blacklist_duration());
                warn!(
                    provider = %provider.id,
                    failures = state.consecutive_failures,
                    blacklist_secs = provider.blacklist_secs,
                    "provider blacklisted"
                );
            } else {
                debug!(
                    provider = %provider.id,
                    failures = state.consecutive_failures,
                    threshold = provider.failure_threshold,
                    "provider failure recorded"
                );
            }
        });
    }

    /// Whether a provider may be selected: enabled and not blacklisted
    pub fn is_eligible(&self, provider: &Provider) -> bool {
        self.is_eligible_at(provider, Instant::now())
    }

    pub(crate) fn is_eligible_at(&self, provider: &Provider, now: Instant) -> bool {
        if !provider.enabled {
            return false;
        }
        match self.cells.get(&provider.id) {
            Some(cell) => !cell.lock().blacklisted(now),
            None => true,
        }
    }

    /// Administrative reset: counter cleared, blacklist lifted
    ///
    /// Does not imply a success was observed.
    pub fn reset(&self, id: &str) {
        self.with_cell(id, |state| {
            *state = HealthState::default();
        });
        info!(provider = id, "health state reset");
    }

    /// Administrative unblacklist: blacklist lifted, counter cleared
    pub fn unblacklist(&self, id: &str) {
        self.with_cell(id, |state| {
            *state = HealthState::default();
        });
        info!(provider = id, "provider unblacklisted");
    }

    /// Current health state snapshot for a provider
    pub fn status(&self, id: &str) -> HealthState {
        self.cells
            .get(id)
            .map(|cell| *cell.lock())
            .unwrap_or_default()
    }
}
