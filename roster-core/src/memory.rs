//! In-process collaborators.
//!
//! [`InMemoryMembershipStore`] backs the server when no database is
//! configured, and every test in the workspace. [`StaticIdentityProvider`]
//! maps bearer tokens to principals for local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::collaborators::{Credentials, IdentityProvider, MembershipStore};
use crate::errors::CollaboratorError;
use crate::tenant::{Membership, MembershipId, Principal, PrincipalId, Tenant, TenantId};

const STORE: &str = "membership store";

#[derive(Debug, Default)]
struct StoreState {
    tenants: Vec<Tenant>,
    memberships: Vec<Membership>,
}

impl StoreState {
    fn tenant(&self, id: &TenantId) -> Option<&Tenant> {
        self.tenants.iter().find(|t| &t.id == id)
    }

    /// Memberships carry the current tenant name, as a join would.
    fn joined(&self, m: &Membership) -> Option<Membership> {
        let tenant = self.tenant(&m.tenant_id)?;
        Some(Membership {
            tenant_name: tenant.name.clone(),
            ..m.clone()
        })
    }
}

/// Membership store kept in memory, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryMembershipStore {
    state: RwLock<StoreState>,
    unavailable: AtomicBool,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `Unavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), CollaboratorError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable(STORE, "store offline"));
        }
        Ok(())
    }

    pub fn insert_tenant(&self, tenant: Tenant) {
        let mut state = self.state.write();
        state.tenants.retain(|t| t.id != tenant.id);
        state.tenants.push(tenant);
    }

    /// Join `principal` to an existing tenant. `None` when the tenant is
    /// unknown or the pair already exists.
    pub fn add_member(
        &self,
        principal: &Principal,
        tenant_id: &TenantId,
        created_at: DateTime<Utc>,
    ) -> Option<Membership> {
        let mut state = self.state.write();
        let tenant = state.tenant(tenant_id)?.clone();
        let exists = state
            .memberships
            .iter()
            .any(|m| m.principal_id == principal.id && &m.tenant_id == tenant_id);
        if exists {
            return None;
        }

        let membership = Membership {
            id: MembershipId::new(Uuid::new_v4().to_string()),
            principal_id: principal.id.clone(),
            tenant_id: tenant.id,
            tenant_name: tenant.name,
            display_name: principal.member_label(),
            role_id: None,
            created_at,
        };
        state.memberships.push(membership.clone());
        Some(membership)
    }

    pub fn tenants(&self) -> Vec<Tenant> {
        self.state.read().tenants.clone()
    }

    pub fn membership_count(&self) -> usize {
        self.state.read().memberships.len()
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn memberships_for(&self, principal: &PrincipalId) -> Result<Vec<Membership>, CollaboratorError> {
        self.check_available()?;
        let state = self.state.read();
        let mut out: Vec<Membership> = state
            .memberships
            .iter()
            .filter(|m| &m.principal_id == principal)
            .filter_map(|m| state.joined(m))
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn has_membership(&self, principal: &PrincipalId, tenant: &TenantId) -> Result<bool, CollaboratorError> {
        self.check_available()?;
        let state = self.state.read();
        Ok(state.tenant(tenant).is_some()
            && state
                .memberships
                .iter()
                .any(|m| &m.principal_id == principal && &m.tenant_id == tenant))
    }

    async fn membership(&self, id: &MembershipId) -> Result<Option<Membership>, CollaboratorError> {
        self.check_available()?;
        let state = self.state.read();
        Ok(state
            .memberships
            .iter()
            .find(|m| &m.id == id)
            .and_then(|m| state.joined(m)))
    }

    async fn create_tenant(&self, name: &str, owner: &Principal) -> Result<(Tenant, Membership), CollaboratorError> {
        self.check_available()?;
        let tenant = Tenant::new(Uuid::new_v4().to_string(), name);
        let membership = Membership {
            id: MembershipId::new(Uuid::new_v4().to_string()),
            principal_id: owner.id.clone(),
            tenant_id: tenant.id.clone(),
            tenant_name: tenant.name.clone(),
            display_name: owner.member_label(),
            role_id: None,
            created_at: Utc::now(),
        };

        let mut state = self.state.write();
        state.tenants.push(tenant.clone());
        state.memberships.push(membership.clone());
        Ok((tenant, membership))
    }

    async fn delete_tenant(&self, tenant: &TenantId) -> Result<bool, CollaboratorError> {
        self.check_available()?;
        let mut state = self.state.write();
        let before = state.tenants.len();
        state.tenants.retain(|t| &t.id != tenant);
        if state.tenants.len() == before {
            return Ok(false);
        }
        state.memberships.retain(|m| &m.tenant_id != tenant);
        Ok(true)
    }

    async fn remove_membership(&self, id: &MembershipId) -> Result<bool, CollaboratorError> {
        self.check_available()?;
        let mut state = self.state.write();
        let before = state.memberships.len();
        state.memberships.retain(|m| &m.id != id);
        Ok(state.memberships.len() != before)
    }
}

/// Bearer token → principal, fixed at construction or via [`insert`](Self::insert).
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    principals: RwLock<HashMap<String, Principal>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal(self, token: impl Into<String>, principal: Principal) -> Self {
        self.insert(token, principal);
        self
    }

    pub fn insert(&self, token: impl Into<String>, principal: Principal) {
        self.principals.write().insert(token.into(), principal);
    }

    pub fn revoke(&self, token: &str) {
        self.principals.write().remove(token);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn current_principal(&self, credentials: &Credentials) -> Result<Option<Principal>, CollaboratorError> {
        let Some(token) = credentials.bearer_token() else {
            return Ok(None);
        };
        Ok(self.principals.read().get(&token).cloned())
    }
}
