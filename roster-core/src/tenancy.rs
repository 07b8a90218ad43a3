//! Tenancy mutations: onboarding a company, deleting one, removing an
//! employee, and clearing the active-company preference.
//!
//! Each mutation re-checks membership against the store before writing,
//! whatever the caller's [`TenantContext`] says, and emits a tenant-scoped
//! invalidation once it has committed.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info};
use validator::Validate;

use crate::app::RosterApp;
use crate::bail_roster;
use crate::collaborators::MembershipStore;
use crate::errors::{CollaboratorError, RosterError, RosterResult};
use crate::events::InvalidationScope;
use crate::resolver::ResolveError;
use crate::switch::PreferenceUpdate;
use crate::tenant::{Membership, MembershipId, Principal, Tenant, TenantContext, TenantId};

pub const DELETE_DENIED_MESSAGE: &str =
    "You are not authorized to delete this company or it does not exist.";
pub const REMOVE_DENIED_MESSAGE: &str =
    "You are not authorized to remove employees from this company.";

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantInput {
    #[validate(length(min = 1, max = 100, message = "Company name must be between 1 and 100 characters."))]
    pub name: String,
}

impl CreateTenantInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Result of a tenancy mutation plus what to do with the preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenancyChange<T> {
    pub value: T,
    pub preference: PreferenceUpdate,
}

impl<T> TenancyChange<T> {
    fn keep(value: T) -> Self {
        Self {
            value,
            preference: PreferenceUpdate::Keep,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTenant {
    pub tenant: Tenant,
    pub membership: Membership,
}

fn validation_errors_to_json(errs: &validator::ValidationErrors) -> Value {
    let mut out = Map::new();
    for (field, kind) in errs.errors() {
        if let validator::ValidationErrorsKind::Field(field_errors) = kind {
            let messages: Vec<Value> = field_errors
                .iter()
                .map(|e| {
                    Value::String(
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string()),
                    )
                })
                .collect();
            out.insert(field.to_string(), Value::Array(messages));
        }
    }
    Value::Object(out)
}

/// Fail closed unless `context`'s principal still belongs to its active
/// company.
pub async fn require_current_membership(
    context: &TenantContext,
    store: &dyn MembershipStore,
) -> RosterResult<()> {
    let principal_id = &context.principal().id;
    let tenant_id = context.tenant_id();
    let member = store
        .has_membership(principal_id, tenant_id)
        .await
        .map_err(|e| {
            error!(%principal_id, %tenant_id, error = %e, "membership re-check failed");
            RosterError::from(e).into_anyhow()
        })?;

    if !member {
        info!(%principal_id, %tenant_id, "membership revoked since resolution");
        return Err(RosterError::denied().into_anyhow());
    }
    Ok(())
}

/// Drop the preference unconditionally (sign-out and similar flows).
pub fn clear_preference() -> PreferenceUpdate {
    PreferenceUpdate::Clear
}

impl RosterApp {
    fn store_failure(&self, action: &'static str, err: CollaboratorError) -> anyhow::Error {
        self.metrics().record_transient_failure();
        error!(action, collaborator = err.collaborator(), error = %err, "tenancy mutation failed");
        RosterError::from(err).into_anyhow()
    }

    pub async fn require_current_membership(&self, context: &TenantContext) -> RosterResult<()> {
        require_current_membership(context, self.memberships().as_ref()).await
    }

    /// Onboarding: create a company with `principal` as its first employee.
    ///
    /// Needs authentication but no existing company.
    pub async fn create_tenant(
        &self,
        principal: &Principal,
        input: CreateTenantInput,
    ) -> RosterResult<TenancyChange<CreatedTenant>> {
        let input = CreateTenantInput::new(input.name.trim());
        input.validate().map_err(|e| {
            RosterError::unprocessable("Validation failed.")
                .with_errors(validation_errors_to_json(&e))
                .into_anyhow()
        })?;

        // Held across the cap check and the insert.
        let _creating = self.creation_lock().lock().await;

        let cap = self.config_snapshot().max_tenants_per_principal();
        let current = self
            .resolver()
            .memberships_of(principal)
            .await
            .map_err(|e: ResolveError| RosterError::from(e).into_anyhow())?;
        if current.len() >= cap {
            info!(principal_id = %principal.id, cap, "company creation rejected at cap");
            return Err(RosterError::conflict(format!(
                "You can belong to at most {cap} companies."
            ))
            .with_data(serde_json::json!({ "cap": cap }))
            .into_anyhow());
        }

        let (tenant, membership) = self
            .memberships()
            .create_tenant(&input.name, principal)
            .await
            .map_err(|e| self.store_failure("create_tenant", e))?;

        info!(principal_id = %principal.id, tenant_id = %tenant.id, "company created");
        self.invalidate(&tenant.id, InvalidationScope::Tenant).await;

        Ok(TenancyChange::keep(CreatedTenant { tenant, membership }))
    }

    /// Delete a company the caller belongs to, with all its employees.
    pub async fn delete_tenant(
        &self,
        context: &TenantContext,
        tenant_id: &TenantId,
    ) -> RosterResult<TenancyChange<TenantId>> {
        let principal_id = &context.principal().id;
        let member = self
            .memberships()
            .has_membership(principal_id, tenant_id)
            .await
            .map_err(|e| self.store_failure("delete_tenant", e))?;
        if !member {
            info!(%principal_id, %tenant_id, "company deletion denied");
            return Err(RosterError::forbidden(DELETE_DENIED_MESSAGE).into_anyhow());
        }

        let deleted = self
            .memberships()
            .delete_tenant(tenant_id)
            .await
            .map_err(|e| self.store_failure("delete_tenant", e))?;
        if !deleted {
            bail_roster!(not_found, "Failed to delete company. It might have been already deleted.");
        }

        info!(%principal_id, %tenant_id, "company deleted");
        self.invalidate(tenant_id, InvalidationScope::Tenant).await;

        let preference = if context.tenant_id() == tenant_id {
            PreferenceUpdate::Clear
        } else {
            PreferenceUpdate::Keep
        };
        Ok(TenancyChange {
            value: tenant_id.clone(),
            preference,
        })
    }

    /// Remove an employee record from the caller's active company.
    pub async fn remove_membership(
        &self,
        context: &TenantContext,
        membership_id: &MembershipId,
    ) -> RosterResult<TenancyChange<Membership>> {
        self.require_current_membership(context).await?;

        let actor = &context.principal().id;
        let tenant_id = context.tenant_id();

        let Some(target) = self
            .memberships()
            .membership(membership_id)
            .await
            .map_err(|e| self.store_failure("remove_membership", e))?
        else {
            bail_roster!(not_found, "Employee not found.");
        };

        if &target.tenant_id != tenant_id {
            info!(principal_id = %actor, %tenant_id, "employee removal denied: other company");
            return Err(RosterError::forbidden(REMOVE_DENIED_MESSAGE).into_anyhow());
        }

        let removed = self
            .memberships()
            .remove_membership(membership_id)
            .await
            .map_err(|e| self.store_failure("remove_membership", e))?;
        if !removed {
            bail_roster!(not_found, "Employee not found.");
        }

        info!(principal_id = %actor, %tenant_id, %membership_id, "employee removed");
        self.invalidate(tenant_id, InvalidationScope::Membership).await;

        let preference = if &target.principal_id == actor {
            PreferenceUpdate::Clear
        } else {
            PreferenceUpdate::Keep
        };
        Ok(TenancyChange {
            value: target,
            preference,
        })
    }
}
