use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::resolver::Selection;

/// Live counters for tenant resolution and switching.
///
/// The fallback cases are silent to callers, so these counters are how a
/// missing preference is told apart from a stale one.
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    resolutions: AtomicU64,
    preferred: AtomicU64,
    default_no_preference: AtomicU64,
    stale_preference_discarded: AtomicU64,
    not_authenticated: AtomicU64,
    no_tenant: AtomicU64,
    transient_failures: AtomicU64,
    switches: AtomicU64,
    switch_noops: AtomicU64,
    switch_denials: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverMetricsSnapshot {
    pub resolutions: u64,
    pub preferred: u64,
    pub default_no_preference: u64,
    pub stale_preference_discarded: u64,
    pub not_authenticated: u64,
    pub no_tenant: u64,
    pub transient_failures: u64,
    pub switches: u64,
    pub switch_noops: u64,
    pub switch_denials: u64,
}

impl ResolverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_selection(&self, selection: &Selection) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        let counter = match selection {
            Selection::Preferred => &self.preferred,
            Selection::NoPreference => &self.default_no_preference,
            Selection::StalePreference { .. } => &self.stale_preference_discarded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_authenticated(&self) {
        self.not_authenticated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_tenant(&self) {
        self.no_tenant.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_failure(&self) {
        self.transient_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_switch(&self) {
        self.switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_switch_noop(&self) {
        self.switch_noops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_switch_denied(&self) {
        self.switch_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ResolverMetricsSnapshot {
        ResolverMetricsSnapshot {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            preferred: self.preferred.load(Ordering::Relaxed),
            default_no_preference: self.default_no_preference.load(Ordering::Relaxed),
            stale_preference_discarded: self.stale_preference_discarded.load(Ordering::Relaxed),
            not_authenticated: self.not_authenticated.load(Ordering::Relaxed),
            no_tenant: self.no_tenant.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            switches: self.switches.load(Ordering::Relaxed),
            switch_noops: self.switch_noops.load(Ordering::Relaxed),
            switch_denials: self.switch_denials.load(Ordering::Relaxed),
        }
    }
}
