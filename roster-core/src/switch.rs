//! Explicit active-company switching: the only writer of the preference.

use tracing::{debug, info};

use crate::collaborators::Credentials;
use crate::resolver::{reconcile, ResolveError, Resolution, Selection, TenantResolver};
use crate::tenant::{ActiveTenantPreference, TenantId};

/// What the transport should do with the client-held preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceUpdate {
    Keep,
    Set(ActiveTenantPreference),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    NotAuthenticated,
    /// Already the active company; nothing to write.
    Unchanged { tenant_id: TenantId },
    Switched { preference: ActiveTenantPreference },
    /// Not a member. `clear_preference` is set when the stored preference
    /// named the rejected company.
    Denied { clear_preference: bool },
}

impl SwitchOutcome {
    pub fn preference_update(&self) -> PreferenceUpdate {
        match self {
            SwitchOutcome::Switched { preference } => PreferenceUpdate::Set(preference.clone()),
            SwitchOutcome::Denied {
                clear_preference: true,
            } => PreferenceUpdate::Clear,
            _ => PreferenceUpdate::Keep,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SwitchOutcome::Unchanged { .. } | SwitchOutcome::Switched { .. }
        )
    }
}

impl TenantResolver {
    /// Make `requested` the active company for this principal's session.
    ///
    /// Membership is checked against a fresh read. Switching to the company
    /// that is already active (by a valid preference or by default) is a
    /// no-op; a stale preference is always rewritten.
    pub async fn switch_active_tenant(
        &self,
        credentials: &Credentials,
        current: Option<&ActiveTenantPreference>,
        requested: &TenantId,
    ) -> Result<SwitchOutcome, ResolveError> {
        let Some(principal) = self.principal(credentials).await? else {
            self.metrics().record_not_authenticated();
            return Ok(SwitchOutcome::NotAuthenticated);
        };

        let current = current.filter(|p| p.belongs_to(&principal.id));
        let clear_preference = current.is_some_and(|p| &p.tenant_id == requested);
        let principal_id = principal.id.clone();

        let memberships = self.memberships_of(&principal).await?;
        let resolution = reconcile(Some(principal), memberships, current);

        let outcome = match resolution {
            Resolution::Resolved { context, selection } if context.is_member_of(requested) => {
                let already_active = context.tenant_id() == requested
                    && !matches!(selection, Selection::StalePreference { .. });
                if already_active {
                    SwitchOutcome::Unchanged {
                        tenant_id: requested.clone(),
                    }
                } else {
                    SwitchOutcome::Switched {
                        preference: ActiveTenantPreference::new(requested.clone(), principal_id.clone()),
                    }
                }
            }
            _ => SwitchOutcome::Denied { clear_preference },
        };

        match &outcome {
            SwitchOutcome::Unchanged { .. } => {
                self.metrics().record_switch_noop();
                debug!(%principal_id, tenant_id = %requested, "switch to already active company");
            }
            SwitchOutcome::Switched { .. } => {
                self.metrics().record_switch();
                info!(%principal_id, tenant_id = %requested, "active company switched");
            }
            SwitchOutcome::Denied { clear_preference } => {
                self.metrics().record_switch_denied();
                info!(
                    %principal_id,
                    tenant_id = %requested,
                    clear_preference,
                    "switch denied: not a member"
                );
            }
            SwitchOutcome::NotAuthenticated => {}
        }

        Ok(outcome)
    }
}
