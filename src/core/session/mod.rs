//! Session affinity: sticky provider assignments with idle eviction
//!
//! In load-balanced mode a request carrying a session key sticks to the
//! provider first chosen for that key. Entries refresh on every lookup
//! and are evicted after an idle window, lazily on access plus an
//! amortized sweep on insert, so the table cannot grow without bound.
//! The table stores only the provider id; eligibility is re-checked by
//! the selector, which treats an ineligible mapping as a miss and
//! overwrites it.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Sweep the whole table every this many inserts
const SWEEP_EVERY: u64 = 256;

#[derive(Debug, Clone)]
struct SessionEntry {
    provider_id: String,
    last_used: Instant,
}

/// Concurrency-safe session-key → provider-id table
#[derive(Debug)]
pub struct SessionAffinity {
    entries: DashMap<String, SessionEntry>,
    idle_window: Duration,
    puts: AtomicU64,
}

impl SessionAffinity {
    /// Create an empty table with the given idle window
    pub fn new(idle_window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            idle_window,
            puts: AtomicU64::new(0),
        }
    }

    /// Look up the sticky provider for a session key
    ///
    /// Refreshes `last_used` on a hit; an entry idle past the window is
    /// dropped and reported as a miss.
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn get_at(&self, key: &str, now: Instant) -> Option<String> {
        let mut entry = self.entries.get_mut(key)?;
        if now.saturating_duration_since(entry.last_used) >= self.idle_window {
            drop(entry);
            self.entries.remove(key);
            debug!(session = key, "idle session evicted on access");
            return None;
        }
        entry.last_used = now;
        Some(entry.provider_id.clone())
    }

    /// Bind a session key to a provider, overwriting any prior binding
    pub fn put(&self, key: &str, provider_id: &str) {
        self.put_at(key, provider_id, Instant::now());
    }

    pub(crate) fn put_at(&self, key: &str, provider_id: &str, now: Instant) {
        self.entries.insert(
            key.to_string(),
            SessionEntry {
                provider_id: provider_id.to_string(),
                last_used: now,
            },
        );
        if self.puts.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.evict_idle_at(now);
        }
    }

    /// Drop every entry idle past the window
    pub fn evict_idle(&self) {
        self.evict_idle_at(Instant::now());
    }

    pub(crate) fn evict_idle_at(&self, now: Instant) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_used) < self.idle_window);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "idle sessions swept");
        }
    }

    /// Number of live bindings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no bindings
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
