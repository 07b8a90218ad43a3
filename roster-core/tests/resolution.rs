use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use roster_core::errors::{CollaboratorError, RosterError, VERIFICATION_FAILED_MESSAGE};
use roster_core::{
    ActiveTenantPreference, Credentials, IdentityProvider, InMemoryMembershipStore, MembershipStore,
    Principal, ResolveError, Resolution, Selection, StaticIdentityProvider, SwitchOutcome, Tenant,
    TenantId, TenantResolver,
};

struct TimingOutIdentity;

#[async_trait::async_trait]
impl IdentityProvider for TimingOutIdentity {
    async fn current_principal(&self, _credentials: &Credentials) -> Result<Option<Principal>, CollaboratorError> {
        Err(CollaboratorError::timeout("identity provider"))
    }
}

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
}

struct Fixture {
    store: Arc<InMemoryMembershipStore>,
    resolver: TenantResolver,
}

/// P1 belongs to A (first) and B; P2 is signed in with no company; C exists.
fn fixture() -> Fixture {
    let store = Arc::new(InMemoryMembershipStore::new());
    store.insert_tenant(Tenant::new("A", "Alpha Foods"));
    store.insert_tenant(Tenant::new("B", "Beta Retail"));
    store.insert_tenant(Tenant::new("C", "Gamma Logistics"));

    let p1 = Principal::new("P1").with_email("p1@example.com");
    store.add_member(&p1, &TenantId::new("A"), at(0)).unwrap();
    store.add_member(&p1, &TenantId::new("B"), at(30)).unwrap();

    let identity = StaticIdentityProvider::new()
        .with_principal("tok-p1", p1)
        .with_principal("tok-p2", Principal::new("P2"));

    let resolver = TenantResolver::new(Arc::new(identity), store.clone());
    Fixture { store, resolver }
}

fn p1() -> Credentials {
    Credentials::new().with_bearer("tok-p1")
}

fn pref(tenant: &str, principal: &str) -> ActiveTenantPreference {
    ActiveTenantPreference::new(tenant, principal)
}

fn tenant_ids(res: &Resolution) -> Vec<&str> {
    res.context()
        .expect("resolved")
        .all_tenants()
        .iter()
        .map(|t| t.id.as_str())
        .collect()
}

#[tokio::test]
async fn scenario_no_preference_selects_first_company() {
    let fx = fixture();
    let res = fx.resolver.resolve(&p1(), None).await.unwrap();

    let ctx = res.context().expect("resolved");
    assert_eq!(ctx.tenant_id().as_str(), "A");
    assert_eq!(ctx.active_tenant().name, "Alpha Foods");
    assert_eq!(tenant_ids(&res), vec!["A", "B"]);
    assert!(matches!(res, Resolution::Resolved { selection: Selection::NoPreference, .. }));
}

#[tokio::test]
async fn scenario_valid_preference_is_honored() {
    let fx = fixture();
    let res = fx.resolver.resolve(&p1(), Some(&pref("B", "P1"))).await.unwrap();

    assert_eq!(res.context().unwrap().tenant_id().as_str(), "B");
    assert_eq!(tenant_ids(&res), vec!["A", "B"]);
    assert!(matches!(res, Resolution::Resolved { selection: Selection::Preferred, .. }));
}

#[tokio::test]
async fn scenario_stale_preference_falls_back_without_writing() {
    let fx = fixture();
    let b_membership = fx
        .store
        .memberships_for(&"P1".into())
        .await
        .unwrap()
        .into_iter()
        .find(|m| m.tenant_id.as_str() == "B")
        .unwrap();
    fx.store.remove_membership(&b_membership.id).await.unwrap();

    let res = fx.resolver.resolve(&p1(), Some(&pref("B", "P1"))).await.unwrap();
    assert_eq!(res.context().unwrap().tenant_id().as_str(), "A");
    assert_eq!(tenant_ids(&res), vec!["A"]);
    assert_eq!(
        res,
        Resolution::Resolved {
            context: res.context().unwrap().clone(),
            selection: Selection::StalePreference {
                discarded: TenantId::new("B")
            },
        }
    );

    let metrics = fx.resolver.metrics().snapshot();
    assert_eq!(metrics.stale_preference_discarded, 1);
    assert_eq!(metrics.default_no_preference, 0);
}

#[tokio::test]
async fn scenario_principal_without_memberships_is_no_tenant() {
    let fx = fixture();
    let p2 = Credentials::new().with_bearer("tok-p2");

    let res = fx.resolver.resolve(&p2, Some(&pref("A", "P2"))).await.unwrap();
    assert!(matches!(res, Resolution::NoTenant { ref principal } if principal.id.as_str() == "P2"));
    assert_eq!(fx.resolver.metrics().snapshot().no_tenant, 1);
}

#[tokio::test]
async fn scenario_switch_to_non_member_company_is_denied() {
    let fx = fixture();
    let current = pref("A", "P1");

    let outcome = fx
        .resolver
        .switch_active_tenant(&p1(), Some(&current), &TenantId::new("C"))
        .await
        .unwrap();
    assert_eq!(outcome, SwitchOutcome::Denied { clear_preference: false });
    assert!(!outcome.is_success());
    assert_eq!(outcome.preference_update(), roster_core::PreferenceUpdate::Keep);

    let res = fx.resolver.resolve(&p1(), Some(&current)).await.unwrap();
    assert_eq!(res.context().unwrap().tenant_id().as_str(), "A");
}

#[tokio::test]
async fn scenario_identity_timeout_is_a_transient_failure() {
    let store = Arc::new(InMemoryMembershipStore::new());
    let resolver = TenantResolver::new(Arc::new(TimingOutIdentity), store);

    let err = resolver.resolve(&p1(), None).await.unwrap_err();
    assert!(matches!(err, ResolveError::Identity(CollaboratorError::Timeout { .. })));

    let roster: RosterError = err.into();
    assert_eq!(roster.code(), 503);
    assert_eq!(roster.message, VERIFICATION_FAILED_MESSAGE);

    let metrics = resolver.metrics().snapshot();
    assert_eq!(metrics.transient_failures, 1);
    assert_eq!(metrics.not_authenticated, 0);
    assert_eq!(metrics.no_tenant, 0);
}

#[tokio::test]
async fn membership_store_outage_is_not_no_tenant() {
    let fx = fixture();
    fx.store.set_unavailable(true);

    let err = fx.resolver.resolve(&p1(), None).await.unwrap_err();
    assert!(matches!(err, ResolveError::Membership(_)));
    assert_eq!(fx.resolver.metrics().snapshot().no_tenant, 0);
}

#[tokio::test]
async fn missing_or_unknown_identity_is_not_authenticated() {
    let fx = fixture();
    let anonymous = fx.resolver.resolve(&Credentials::new(), Some(&pref("A", "P1"))).await.unwrap();
    assert_eq!(anonymous, Resolution::NotAuthenticated);

    let forged = Credentials::new().with_bearer("tok-unknown");
    assert_eq!(
        fx.resolver.resolve(&forged, None).await.unwrap(),
        Resolution::NotAuthenticated
    );
    assert_eq!(fx.resolver.metrics().snapshot().not_authenticated, 2);
}

#[tokio::test]
async fn repeated_resolution_is_idempotent() {
    let fx = fixture();
    let preference = pref("B", "P1");
    let first = fx.resolver.resolve(&p1(), Some(&preference)).await.unwrap();
    let second = fx.resolver.resolve(&p1(), Some(&preference)).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn switch_to_active_company_is_a_noop() {
    let fx = fixture();

    // active by default
    let outcome = fx
        .resolver
        .switch_active_tenant(&p1(), None, &TenantId::new("A"))
        .await
        .unwrap();
    assert_eq!(outcome, SwitchOutcome::Unchanged { tenant_id: TenantId::new("A") });
    assert_eq!(outcome.preference_update(), roster_core::PreferenceUpdate::Keep);

    // active by preference
    let outcome = fx
        .resolver
        .switch_active_tenant(&p1(), Some(&pref("B", "P1")), &TenantId::new("B"))
        .await
        .unwrap();
    assert!(matches!(outcome, SwitchOutcome::Unchanged { .. }));
    assert_eq!(fx.resolver.metrics().snapshot().switch_noops, 2);
}

#[tokio::test]
async fn switch_then_resolve_round_trips() {
    let fx = fixture();
    let outcome = fx
        .resolver
        .switch_active_tenant(&p1(), None, &TenantId::new("B"))
        .await
        .unwrap();

    let SwitchOutcome::Switched { preference } = outcome else {
        panic!("expected a switch, got {outcome:?}");
    };
    assert_eq!(preference, pref("B", "P1"));

    let res = fx.resolver.resolve(&p1(), Some(&preference)).await.unwrap();
    assert_eq!(res.context().unwrap().tenant_id().as_str(), "B");
}

#[tokio::test]
async fn denied_switch_clears_preference_naming_rejected_company() {
    let fx = fixture();
    let b_membership = fx
        .store
        .memberships_for(&"P1".into())
        .await
        .unwrap()
        .into_iter()
        .find(|m| m.tenant_id.as_str() == "B")
        .unwrap();
    fx.store.remove_membership(&b_membership.id).await.unwrap();

    let outcome = fx
        .resolver
        .switch_active_tenant(&p1(), Some(&pref("B", "P1")), &TenantId::new("B"))
        .await
        .unwrap();
    assert_eq!(outcome, SwitchOutcome::Denied { clear_preference: true });
    assert_eq!(outcome.preference_update(), roster_core::PreferenceUpdate::Clear);
}

#[tokio::test]
async fn stale_preference_is_rewritten_when_switching_to_fallback() {
    let fx = fixture();
    let outcome = fx
        .resolver
        .switch_active_tenant(&p1(), Some(&pref("gone", "P1")), &TenantId::new("A"))
        .await
        .unwrap();
    assert!(matches!(outcome, SwitchOutcome::Switched { .. }));
}

#[tokio::test]
async fn switch_without_identity_is_not_authenticated() {
    let fx = fixture();
    let outcome = fx
        .resolver
        .switch_active_tenant(&Credentials::new(), None, &TenantId::new("A"))
        .await
        .unwrap();
    assert_eq!(outcome, SwitchOutcome::NotAuthenticated);
}
