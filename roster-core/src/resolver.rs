//! # Tenant context resolution
//!
//! Every protected entry point starts here: who is asking, which companies
//! do they belong to, and which one is this request about.
//!
//! The decision itself is [`reconcile`], a pure function of
//! `(principal, membership snapshot, preference)`. [`TenantResolver`] only
//! gathers those three inputs from the collaborators, in order: identity
//! first, memberships second. It never writes anything; correcting a stale
//! preference is the job of the explicit switch operation.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::collaborators::{Credentials, IdentityProvider, MembershipStore};
use crate::errors::{CollaboratorError, RosterError, VERIFICATION_FAILED_MESSAGE};
use crate::metrics::ResolverMetrics;
use crate::tenant::{ActiveTenantPreference, Membership, Principal, Tenant, TenantContext, TenantId};

/// How the active tenant was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The preference named a current membership.
    Preferred,
    /// No preference; first membership by creation order.
    NoPreference,
    /// The preference named a company the principal no longer belongs to.
    StalePreference { discarded: TenantId },
}

/// Outcome of resolving a request. Both failure variants are routine
/// control flow: redirect to sign-in, or to company creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        context: TenantContext,
        selection: Selection,
    },
    NotAuthenticated,
    NoTenant { principal: Principal },
}

impl Resolution {
    pub fn context(&self) -> Option<&TenantContext> {
        match self {
            Resolution::Resolved { context, .. } => Some(context),
            _ => None,
        }
    }

    pub fn into_context(self) -> Option<TenantContext> {
        match self {
            Resolution::Resolved { context, .. } => Some(context),
            _ => None,
        }
    }
}

/// A collaborator failed while resolving. Never a routine outcome.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("identity lookup failed: {0}")]
    Identity(#[source] CollaboratorError),

    #[error("membership lookup failed: {0}")]
    Membership(#[source] CollaboratorError),
}

impl From<ResolveError> for RosterError {
    fn from(err: ResolveError) -> Self {
        RosterError::unavailable(VERIFICATION_FAILED_MESSAGE).with_source(anyhow::Error::new(err))
    }
}

/// Decide the tenant context for one request.
///
/// - no principal → `NotAuthenticated`
/// - no memberships → `NoTenant`
/// - preference naming a current membership → that tenant
/// - otherwise the earliest membership, with the reason in [`Selection`]
///
/// Memberships belonging to other principals are ignored, and so is a
/// preference issued to another principal.
pub fn reconcile(
    principal: Option<Principal>,
    mut memberships: Vec<Membership>,
    preference: Option<&ActiveTenantPreference>,
) -> Resolution {
    let Some(principal) = principal else {
        return Resolution::NotAuthenticated;
    };

    memberships.retain(|m| m.principal_id == principal.id);
    // stable: equal timestamps keep store order
    memberships.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut all_tenants: Vec<Tenant> = Vec::with_capacity(memberships.len());
    for m in &memberships {
        if !all_tenants.iter().any(|t| t.id == m.tenant_id) {
            all_tenants.push(m.tenant());
        }
    }

    let Some(first) = all_tenants.first().cloned() else {
        return Resolution::NoTenant { principal };
    };

    let preference = preference.filter(|p| p.belongs_to(&principal.id));

    let (active, selection) = match preference {
        None => (first, Selection::NoPreference),
        Some(pref) => match all_tenants.iter().find(|t| t.id == pref.tenant_id) {
            Some(t) => (t.clone(), Selection::Preferred),
            None => (
                first,
                Selection::StalePreference {
                    discarded: pref.tenant_id.clone(),
                },
            ),
        },
    };

    Resolution::Resolved {
        context: TenantContext::new(principal, active, all_tenants),
        selection,
    }
}

/// Gathers the inputs of [`reconcile`] from the identity provider and the
/// membership store. Holds no per-request state; clone freely.
#[derive(Clone)]
pub struct TenantResolver {
    identity: Arc<dyn IdentityProvider>,
    memberships: Arc<dyn MembershipStore>,
    metrics: Arc<ResolverMetrics>,
}

impl TenantResolver {
    pub fn new(identity: Arc<dyn IdentityProvider>, memberships: Arc<dyn MembershipStore>) -> Self {
        Self {
            identity,
            memberships,
            metrics: Arc::new(ResolverMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ResolverMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<ResolverMetrics> {
        &self.metrics
    }

    pub fn memberships(&self) -> &Arc<dyn MembershipStore> {
        &self.memberships
    }

    /// Identity only; used by flows that do not need a company yet.
    pub async fn principal(&self, credentials: &Credentials) -> Result<Option<Principal>, ResolveError> {
        self.identity
            .current_principal(credentials)
            .await
            .map_err(|e| {
                self.metrics.record_transient_failure();
                error!(collaborator = e.collaborator(), error = %e, "identity lookup failed");
                ResolveError::Identity(e)
            })
    }

    pub(crate) async fn memberships_of(&self, principal: &Principal) -> Result<Vec<Membership>, ResolveError> {
        self.memberships
            .memberships_for(&principal.id)
            .await
            .map_err(|e| {
                self.metrics.record_transient_failure();
                error!(
                    principal_id = %principal.id,
                    collaborator = e.collaborator(),
                    error = %e,
                    "membership lookup failed"
                );
                ResolveError::Membership(e)
            })
    }

    pub async fn resolve(
        &self,
        credentials: &Credentials,
        preference: Option<&ActiveTenantPreference>,
    ) -> Result<Resolution, ResolveError> {
        let Some(principal) = self.principal(credentials).await? else {
            self.metrics.record_not_authenticated();
            debug!("request has no valid identity");
            return Ok(Resolution::NotAuthenticated);
        };

        let memberships = self.memberships_of(&principal).await?;
        let resolution = reconcile(Some(principal), memberships, preference);
        self.observe(&resolution);
        Ok(resolution)
    }

    fn observe(&self, resolution: &Resolution) {
        match resolution {
            Resolution::Resolved { context, selection } => {
                self.metrics.record_selection(selection);
                let principal_id = &context.principal().id;
                let tenant_id = context.tenant_id();
                match selection {
                    Selection::Preferred => {
                        debug!(%principal_id, %tenant_id, "active company from preference");
                    }
                    Selection::NoPreference => {
                        info!(%principal_id, %tenant_id, "no active company preference, selected first company");
                    }
                    Selection::StalePreference { discarded } => {
                        warn!(
                            %principal_id,
                            %tenant_id,
                            discarded = %discarded,
                            "stale active company preference discarded, selected first company"
                        );
                    }
                }
            }
            Resolution::NoTenant { principal } => {
                self.metrics.record_no_tenant();
                debug!(principal_id = %principal.id, "principal has no company yet");
            }
            Resolution::NotAuthenticated => {
                self.metrics.record_not_authenticated();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::tenant::{MembershipId, PrincipalId};

    fn membership(principal: &str, tenant: &str, minutes: i64) -> Membership {
        Membership {
            id: MembershipId::new(format!("{principal}-{tenant}")),
            principal_id: PrincipalId::new(principal),
            tenant_id: TenantId::new(tenant),
            tenant_name: format!("Company {tenant}"),
            display_name: None,
            role_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
        }
    }

    fn pref(tenant: &str, principal: &str) -> ActiveTenantPreference {
        ActiveTenantPreference::new(tenant, principal)
    }

    #[test]
    fn absent_principal_is_not_authenticated_even_with_memberships() {
        let res = reconcile(None, vec![membership("p1", "A", 0)], Some(&pref("A", "p1")));
        assert_eq!(res, Resolution::NotAuthenticated);
    }

    #[test]
    fn no_memberships_is_no_tenant_even_with_preference() {
        let res = reconcile(Some(Principal::new("p2")), vec![], Some(&pref("A", "p2")));
        assert!(matches!(res, Resolution::NoTenant { principal } if principal.id.as_str() == "p2"));
    }

    #[test]
    fn orders_tenants_by_membership_creation() {
        let res = reconcile(
            Some(Principal::new("p1")),
            vec![membership("p1", "B", 5), membership("p1", "A", 1)],
            None,
        );
        let Resolution::Resolved { context, selection } = res else {
            panic!("expected resolved");
        };
        assert_eq!(selection, Selection::NoPreference);
        assert_eq!(context.tenant_id().as_str(), "A");
        let ids: Vec<_> = context.all_tenants().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn preference_for_another_principal_is_ignored() {
        let res = reconcile(
            Some(Principal::new("p1")),
            vec![membership("p1", "A", 0), membership("p1", "B", 1)],
            Some(&pref("B", "someone-else")),
        );
        let Resolution::Resolved { context, selection } = res else {
            panic!("expected resolved");
        };
        assert_eq!(selection, Selection::NoPreference);
        assert_eq!(context.tenant_id().as_str(), "A");
    }

    #[test]
    fn foreign_memberships_in_snapshot_are_dropped() {
        let res = reconcile(
            Some(Principal::new("p1")),
            vec![membership("p9", "Z", 0), membership("p1", "A", 1)],
            Some(&pref("Z", "p1")),
        );
        let Resolution::Resolved { context, selection } = res else {
            panic!("expected resolved");
        };
        assert_eq!(context.all_tenants().len(), 1);
        assert_eq!(context.tenant_id().as_str(), "A");
        assert_eq!(
            selection,
            Selection::StalePreference {
                discarded: TenantId::new("Z")
            }
        );
    }

    #[test]
    fn active_tenant_is_always_listed() {
        for preferred in ["A", "B", "C", "gone"] {
            let res = reconcile(
                Some(Principal::new("p1")),
                vec![
                    membership("p1", "A", 0),
                    membership("p1", "B", 1),
                    membership("p1", "C", 2),
                ],
                Some(&pref(preferred, "p1")),
            );
            let context = res.into_context().expect("resolved");
            assert!(context.is_member_of(context.tenant_id()));
        }
    }
}
