//! Core multi-tenant types for Roster.
//!
//! A *tenant* is a company; a *principal* is a signed-in user; a
//! *membership* is the employee record joining the two. Every piece of
//! domain data is partitioned by [`TenantId`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new<S: Into<String>>(id: S) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Stable company identifier.
    TenantId
);
string_id!(
    /// Stable identifier issued by the identity provider.
    PrincipalId
);
string_id!(
    /// Identifier of one employee record.
    MembershipId
);
string_id!(RoleId);

/// An authenticated identity. Owned by the identity provider; Roster only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: PrincipalId,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl Principal {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: PrincipalId::new(id),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name recorded on a new membership: display name, else email.
    pub fn member_label(&self) -> Option<String> {
        self.display_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.email.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
}

impl Tenant {
    pub fn new(id: impl Into<TenantId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Typed join of one employee record to its company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: MembershipId,
    pub principal_id: PrincipalId,
    pub tenant_id: TenantId,
    pub tenant_name: String,
    pub display_name: Option<String>,
    pub role_id: Option<RoleId>,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn tenant(&self) -> Tenant {
        Tenant {
            id: self.tenant_id.clone(),
            name: self.tenant_name.clone(),
        }
    }
}

/// Client-held hint naming the company a principal last chose.
///
/// Advisory only: it is re-checked against current memberships on every
/// request and is ignored when it was issued to a different principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTenantPreference {
    pub tenant_id: TenantId,
    pub principal_id: PrincipalId,
}

impl ActiveTenantPreference {
    pub fn new(tenant_id: impl Into<TenantId>, principal_id: impl Into<PrincipalId>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            principal_id: principal_id.into(),
        }
    }

    pub fn belongs_to(&self, principal: &PrincipalId) -> bool {
        &self.principal_id == principal
    }
}

/// Authorized context for one request.
///
/// Only the resolver builds these, so `all_tenants` is never empty and
/// always contains `active_tenant`. Treat it as fresh as of resolution time,
/// not as a capability: mutations re-check membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContext {
    principal: Principal,
    active_tenant: Tenant,
    all_tenants: Vec<Tenant>,
}

impl TenantContext {
    pub(crate) fn new(principal: Principal, active_tenant: Tenant, all_tenants: Vec<Tenant>) -> Self {
        debug_assert!(all_tenants.contains(&active_tenant));
        Self {
            principal,
            active_tenant,
            all_tenants,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn active_tenant(&self) -> &Tenant {
        &self.active_tenant
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.active_tenant.id
    }

    pub fn all_tenants(&self) -> &[Tenant] {
        &self.all_tenants
    }

    pub fn is_member_of(&self, tenant: &TenantId) -> bool {
        self.all_tenants.iter().any(|t| &t.id == tenant)
    }
}
