use std::sync::Arc;

use futures::lock::Mutex;
use parking_lot::RwLock;
use tracing::debug;

use crate::collaborators::{IdentityProvider, MembershipStore};
use crate::config::{RosterConfig, RosterConfigSnapshot};
use crate::events::{
    deliver, parse_invalidation_pattern, Invalidation, InvalidationHub, InvalidationListener,
    InvalidationPattern, InvalidationScope, ListenerId,
};
use crate::metrics::ResolverMetrics;
use crate::resolver::TenantResolver;
use crate::tenant::TenantId;

struct RosterAppInner {
    config: RwLock<RosterConfig>,
    resolver: TenantResolver,
    invalidations: RwLock<InvalidationHub>,
    creation: Mutex<()>,
}

/// RosterApp is the central application container.
///
/// Transport-agnostic. Holds:
/// - config
/// - the tenant resolver and its collaborators
/// - the invalidation hub
///
/// Cloning is cheap; every clone shares the same state.
#[derive(Clone)]
pub struct RosterApp {
    inner: Arc<RosterAppInner>,
}

impl RosterApp {
    pub fn new(identity: Arc<dyn IdentityProvider>, memberships: Arc<dyn MembershipStore>) -> Self {
        Self::with_resolver(TenantResolver::new(identity, memberships))
    }

    pub fn with_resolver(resolver: TenantResolver) -> Self {
        Self {
            inner: Arc::new(RosterAppInner {
                config: RwLock::new(RosterConfig::new()),
                resolver,
                invalidations: RwLock::new(InvalidationHub::new()),
                creation: Mutex::new(()),
            }),
        }
    }

    /// Feathers: `app.set(key, value)`
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.inner.config.write().set(key, value);
    }

    /// Feathers: `app.get(key)`
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.config.read().get(key).map(|v| v.to_string())
    }

    pub fn config_snapshot(&self) -> RosterConfigSnapshot {
        self.inner.config.read().snapshot()
    }

    /// Apply `f` to the config under one write lock.
    pub fn configure<F>(&self, f: F)
    where
        F: FnOnce(&mut RosterConfig),
    {
        f(&mut self.inner.config.write());
    }

    pub fn resolver(&self) -> &TenantResolver {
        &self.inner.resolver
    }

    /// Serializes company creation so the per-principal cap holds in-process.
    pub(crate) fn creation_lock(&self) -> &Mutex<()> {
        &self.inner.creation
    }

    pub fn metrics(&self) -> &Arc<ResolverMetrics> {
        self.inner.resolver.metrics()
    }

    pub fn memberships(&self) -> &Arc<dyn MembershipStore> {
        self.inner.resolver.memberships()
    }
}

impl RosterApp {
    pub fn on(&self, pattern: InvalidationPattern, listener: InvalidationListener) -> ListenerId {
        self.inner.invalidations.write().on_pattern(pattern, listener)
    }

    /// `app.on_str("*.membership", listener)`
    pub fn on_str(&self, pattern: &str, listener: InvalidationListener) -> anyhow::Result<ListenerId> {
        let pat = parse_invalidation_pattern(pattern)?;
        Ok(self.on(pat, listener))
    }

    pub fn once(&self, pattern: InvalidationPattern, listener: InvalidationListener) -> ListenerId {
        self.inner.invalidations.write().once_pattern(pattern, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.invalidations.write().off(id)
    }

    /// Broadcast that `scope` data of `tenant_id` changed.
    ///
    /// Returns how many listeners failed; failures never propagate.
    pub async fn invalidate(&self, tenant_id: &TenantId, scope: InvalidationScope) -> usize {
        let inv = Invalidation::new(tenant_id.clone(), scope);

        let (listeners, once_ids) = {
            let hub = self.inner.invalidations.read();
            hub.snapshot(&inv)
        };

        debug!(tag = %inv.tag(), listeners = listeners.len(), "invalidation emitted");
        let failed = deliver(&listeners, &inv).await;

        self.inner
            .invalidations
            .write()
            .finalize_once_removals(&once_ids);

        failed
    }
}
