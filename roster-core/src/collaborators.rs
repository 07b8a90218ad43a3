//! Seams to the outside world: who is asking, and what they belong to.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::CollaboratorError;
use crate::tenant::{Membership, MembershipId, Principal, PrincipalId, Tenant, TenantId};

/// The identity assertion of one request: its headers and cookies, as-is.
///
/// Roster never interprets credentials itself; identity providers do.
/// Header names are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_bearer(self, token: impl AsRef<str>) -> Self {
        self.with_header("authorization", format!("Bearer {}", token.as_ref()))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|s| s.as_str())
    }

    /// `Authorization: Bearer <token>`, if present and non-empty.
    pub fn bearer_token(&self) -> Option<String> {
        let v = self.header("authorization")?.trim();
        let (scheme, token) = v.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        Some(token.to_string())
    }
}

/// "Who is making this request?"
///
/// `Ok(None)` means no valid identity (not signed in, expired or forged
/// token). `Err` is reserved for the provider itself failing.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_principal(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<Principal>, CollaboratorError>;
}

/// Keyed access to companies and employee records.
///
/// Reads are equality-filtered lookups. `memberships_for` returns records
/// in creation order.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn memberships_for(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<Membership>, CollaboratorError>;

    async fn has_membership(
        &self,
        principal: &PrincipalId,
        tenant: &TenantId,
    ) -> Result<bool, CollaboratorError>;

    async fn membership(&self, id: &MembershipId) -> Result<Option<Membership>, CollaboratorError>;

    /// Create a company and its creator's membership atomically.
    async fn create_tenant(
        &self,
        name: &str,
        owner: &Principal,
    ) -> Result<(Tenant, Membership), CollaboratorError>;

    /// Delete a company and every membership in it. `false` if it was already gone.
    async fn delete_tenant(&self, tenant: &TenantId) -> Result<bool, CollaboratorError>;

    /// `false` if the record was already gone.
    async fn remove_membership(&self, id: &MembershipId) -> Result<bool, CollaboratorError>;
}
