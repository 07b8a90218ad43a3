//! Tenant-scoped invalidation signals.
//!
//! Every mutation of company data emits an [`Invalidation`] keyed by the
//! company id. Listeners (view caches, the realtime channel) subscribe by
//! pattern. Delivery is best effort: a failing listener is logged and never
//! fails the mutation that emitted.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tenant::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static LISTENER_ID: AtomicU64 = AtomicU64::new(1);

fn next_listener_id() -> ListenerId {
    ListenerId(LISTENER_ID.fetch_add(1, Ordering::Relaxed))
}

/// Which kind of company data changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationScope {
    Tenant,
    Membership,
    Role,
    Location,
    Shift,
    Item,
}

impl InvalidationScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationScope::Tenant => "tenant",
            InvalidationScope::Membership => "membership",
            InvalidationScope::Role => "role",
            InvalidationScope::Location => "location",
            InvalidationScope::Shift => "shift",
            InvalidationScope::Item => "item",
        }
    }
}

impl fmt::Display for InvalidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvalidationScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tenant" | "company" => Ok(InvalidationScope::Tenant),
            "membership" | "employee" => Ok(InvalidationScope::Membership),
            "role" => Ok(InvalidationScope::Role),
            "location" => Ok(InvalidationScope::Location),
            "shift" => Ok(InvalidationScope::Shift),
            "item" => Ok(InvalidationScope::Item),
            other => Err(anyhow::anyhow!("Unknown invalidation scope '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invalidation {
    pub tenant_id: TenantId,
    pub scope: InvalidationScope,
}

impl Invalidation {
    pub fn new(tenant_id: TenantId, scope: InvalidationScope) -> Self {
        Self { tenant_id, scope }
    }

    /// Tag string, e.g. `company:7f3c…:membership`.
    pub fn tag(&self) -> String {
        format!("company:{}:{}", self.tenant_id, self.scope)
    }
}

pub type InvalidationListener =
    Arc<dyn for<'a> Fn(&'a Invalidation) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync>;

/// Wrap a closure as a listener: `listener(|inv| async move { ... }.boxed())`.
pub fn listener<F>(f: F) -> InvalidationListener
where
    F: for<'a> Fn(&'a Invalidation) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TenantPat {
    Any,
    Exact(TenantId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopePat {
    Any,
    Exact(InvalidationScope),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvalidationPattern {
    pub tenant: TenantPat,
    pub scope: ScopePat,
}

impl InvalidationPattern {
    pub fn any() -> Self {
        Self {
            tenant: TenantPat::Any,
            scope: ScopePat::Any,
        }
    }

    pub fn tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant: TenantPat::Exact(tenant_id),
            scope: ScopePat::Any,
        }
    }

    pub fn exact(tenant_id: TenantId, scope: InvalidationScope) -> Self {
        Self {
            tenant: TenantPat::Exact(tenant_id),
            scope: ScopePat::Exact(scope),
        }
    }

    pub fn matches(&self, inv: &Invalidation) -> bool {
        let tenant_ok = match &self.tenant {
            TenantPat::Any => true,
            TenantPat::Exact(t) => t == &inv.tenant_id,
        };
        let scope_ok = match &self.scope {
            ScopePat::Any => true,
            ScopePat::Exact(s) => s == &inv.scope,
        };
        tenant_ok && scope_ok
    }
}

/// Parse sugar strings like `"<tenant>.membership"`, `"*.shift"`, `"*.*"`.
///
/// Splits on the last `.` so tenant ids may contain dots.
pub fn parse_invalidation_pattern(input: &str) -> anyhow::Result<InvalidationPattern> {
    let s = input.trim();
    let Some((tenant, scope)) = s.rsplit_once('.') else {
        return Err(anyhow::anyhow!(
            "Invalid invalidation pattern '{s}'. Expected '<tenant>.<scope>'."
        ));
    };

    let tenant = match tenant.trim() {
        "" => return Err(anyhow::anyhow!("Invalid invalidation pattern '{s}': empty tenant")),
        "*" => TenantPat::Any,
        t => TenantPat::Exact(TenantId::new(t)),
    };

    let scope = match scope.trim() {
        "*" => ScopePat::Any,
        other => ScopePat::Exact(other.parse()?),
    };

    Ok(InvalidationPattern { tenant, scope })
}

#[derive(Clone)]
struct ListenerEntry {
    id: ListenerId,
    pattern: InvalidationPattern,
    listener: InvalidationListener,
    once: bool,
}

/// Listener registry for invalidations.
///
/// `RosterApp` keeps this behind a lock, so emission is split in three so
/// no lock is held across `.await`:
/// 1) [`snapshot`](Self::snapshot) matching listeners (read lock)
/// 2) await them with no lock held
/// 3) [`finalize_once_removals`](Self::finalize_once_removals) (write lock)
#[derive(Default)]
pub struct InvalidationHub {
    listeners: Vec<ListenerEntry>,
}

impl InvalidationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_pattern(&mut self, pattern: InvalidationPattern, listener: InvalidationListener) -> ListenerId {
        self.push(pattern, listener, false)
    }

    pub fn once_pattern(&mut self, pattern: InvalidationPattern, listener: InvalidationListener) -> ListenerId {
        self.push(pattern, listener, true)
    }

    fn push(&mut self, pattern: InvalidationPattern, listener: InvalidationListener, once: bool) -> ListenerId {
        let id = next_listener_id();
        self.listeners.push(ListenerEntry {
            id,
            pattern,
            listener,
            once,
        });
        id
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|e| e.id != id);
        before != self.listeners.len()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn snapshot(&self, inv: &Invalidation) -> (Vec<InvalidationListener>, Vec<ListenerId>) {
        let mut to_call = Vec::new();
        let mut once_ids = Vec::new();

        for entry in &self.listeners {
            if entry.pattern.matches(inv) {
                to_call.push(entry.listener.clone());
                if entry.once {
                    once_ids.push(entry.id);
                }
            }
        }

        (to_call, once_ids)
    }

    pub fn finalize_once_removals(&mut self, once_ids: &[ListenerId]) {
        if once_ids.is_empty() {
            return;
        }
        self.listeners.retain(|e| !once_ids.contains(&e.id));
    }
}

/// Await every listener; failures are logged, counted and swallowed.
pub async fn deliver(listeners: &[InvalidationListener], inv: &Invalidation) -> usize {
    let mut failed = 0;
    for f in listeners {
        if let Err(e) = f(inv).await {
            failed += 1;
            warn!(tag = %inv.tag(), error = %e, "invalidation listener failed");
        }
    }
    failed
}
