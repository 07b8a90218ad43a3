use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use roster_core::config::PREFERENCE_SECRET;
use roster_core::errors::{DENIED_MESSAGE, VERIFICATION_FAILED_MESSAGE};
use roster_core::{InMemoryMembershipStore, Principal, RosterApp, StaticIdentityProvider, Tenant, TenantId};
use roster_axum::axum;
use serde_json::Value;
use tower::ServiceExt;

struct Fixture {
    router: Router,
    store: Arc<InMemoryMembershipStore>,
}

// P1 belongs to A (older) and B; P2 has no company; C exists without P1.
fn fixture() -> Fixture {
    let store = Arc::new(InMemoryMembershipStore::new());
    let p1 = Principal::new("p1").with_display_name("Pat One");
    let p2 = Principal::new("p2").with_email("p2@example.com");
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    for (id, name) in [("A", "Alpha"), ("B", "Beta"), ("C", "Gamma")] {
        store.insert_tenant(Tenant::new(id, name));
    }
    store.add_member(&p1, &TenantId::new("A"), t0).unwrap();
    store
        .add_member(&p1, &TenantId::new("B"), t0 + Duration::minutes(30))
        .unwrap();

    let identity = StaticIdentityProvider::new()
        .with_principal("tok-p1", p1)
        .with_principal("tok-p2", p2);
    let app = RosterApp::new(Arc::new(identity), store.clone());
    app.set(PREFERENCE_SECRET, "test-preference-secret");

    let router = axum(app).unwrap().into_router();
    Fixture { router, store }
}

fn request(method: &str, uri: &str, token: Option<&str>, cookie: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, req: Request<Body>) -> axum::response::Response {
    router.clone().oneshot(req).await.unwrap()
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// `name=value` of the response's Set-Cookie header.
fn set_cookie_pair(res: &axum::response::Response) -> Option<String> {
    res.headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(';').next())
        .map(str::to_string)
}

fn location(res: &axum::response::Response) -> &str {
    res.headers().get("location").unwrap().to_str().unwrap()
}

#[tokio::test]
async fn health_reports_ok_with_request_id() {
    let fx = fixture();
    let res = send(&fx.router, request("GET", "/health", None, None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-request-id").is_some());
    assert_eq!(json_body(res).await["status"], "ok");
}

#[tokio::test]
async fn request_id_is_preserved_when_provided() {
    let fx = fixture();
    let mut req = request("GET", "/health", None, None, None);
    req.headers_mut()
        .insert("x-request-id", HeaderValue::from_static("req-test-123"));
    let res = send(&fx.router, req).await;
    assert_eq!(res.headers().get("x-request-id").unwrap(), "req-test-123");
}

#[tokio::test]
async fn anonymous_request_redirects_to_sign_in() {
    let fx = fixture();
    let res = send(&fx.router, request("GET", "/api/context", None, None, None)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/auth/signin");

    let forged = send(&fx.router, request("GET", "/api/context", Some("nope"), None, None)).await;
    assert_eq!(location(&forged), "/auth/signin");
}

#[tokio::test]
async fn principal_without_company_goes_to_onboarding() {
    let fx = fixture();
    let res = send(&fx.router, request("GET", "/api/context", Some("tok-p2"), None, None)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/dashboard/create-company");
}

#[tokio::test]
async fn default_context_is_oldest_company() {
    let fx = fixture();
    let res = send(&fx.router, request("GET", "/api/context", Some("tok-p1"), None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("set-cookie").is_none());

    let body = json_body(res).await;
    assert_eq!(body["activeTenant"]["id"], "A");
    assert_eq!(body["allTenants"].as_array().unwrap().len(), 2);
    assert_eq!(body["principal"]["id"], "p1");
}

#[tokio::test]
async fn switch_sets_cookie_and_next_request_follows_it() {
    let fx = fixture();
    let res = send(
        &fx.router,
        request("POST", "/api/context/switch", Some("tok-p1"), None, Some(r#"{"tenantId":"B"}"#)),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = set_cookie_pair(&res).expect("preference cookie");
    assert!(cookie.starts_with("app-active-company-id="));
    let body = json_body(res).await;
    assert_eq!(body["activeTenantId"], "B");
    assert_eq!(body["changed"], true);

    let res = send(&fx.router, request("GET", "/api/context", Some("tok-p1"), Some(&cookie), None)).await;
    assert_eq!(json_body(res).await["activeTenant"]["id"], "B");

    // Same company again is a no-op and writes nothing
    let res = send(
        &fx.router,
        request("POST", "/api/context/switch", Some("tok-p1"), Some(&cookie), Some(r#"{"tenantId":"B"}"#)),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("set-cookie").is_none());
    assert_eq!(json_body(res).await["changed"], false);
}

#[tokio::test]
async fn cookie_issued_to_another_principal_is_ignored() {
    let fx = fixture();
    let res = send(
        &fx.router,
        request("POST", "/api/context/switch", Some("tok-p1"), None, Some(r#"{"tenantId":"B"}"#)),
    )
    .await;
    let cookie = set_cookie_pair(&res).unwrap();

    fx.store
        .add_member(&Principal::new("p2"), &TenantId::new("A"), Utc::now())
        .unwrap();
    fx.store
        .add_member(&Principal::new("p2"), &TenantId::new("B"), Utc::now() + Duration::minutes(1))
        .unwrap();

    let res = send(&fx.router, request("GET", "/api/context", Some("tok-p2"), Some(&cookie), None)).await;
    assert_eq!(json_body(res).await["activeTenant"]["id"], "A");
}

#[tokio::test]
async fn switch_to_foreign_company_is_denied_plainly() {
    let fx = fixture();
    let res = send(
        &fx.router,
        request("POST", "/api/context/switch", Some("tok-p1"), None, Some(r#"{"tenantId":"C"}"#)),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(res.headers().get("set-cookie").is_none());
    let body = json_body(res).await;
    assert_eq!(body["message"], DENIED_MESSAGE);
    assert_eq!(body["className"], "forbidden");

    let unknown = send(
        &fx.router,
        request("POST", "/api/context/switch", Some("tok-p1"), None, Some(r#"{"tenantId":"ZZZ"}"#)),
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(unknown).await["message"], DENIED_MESSAGE);
}

#[tokio::test]
async fn switch_requires_identity_and_valid_body() {
    let fx = fixture();
    let res = send(
        &fx.router,
        request("POST", "/api/context/switch", None, None, Some(r#"{"tenantId":"A"}"#)),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/auth/signin");

    let res = send(
        &fx.router,
        request("POST", "/api/context/switch", Some("tok-p1"), None, Some("{\"tenantId\":")),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(res).await;
    assert_eq!(body["name"], "BadRequest");
    assert!(body.get("errors").is_some());
}

#[tokio::test]
async fn store_outage_is_generic_unavailable() {
    let fx = fixture();
    fx.store.set_unavailable(true);
    let res = send(&fx.router, request("GET", "/api/context", Some("tok-p1"), None, None)).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(res).await;
    assert_eq!(body["message"], VERIFICATION_FAILED_MESSAGE);
    assert!(!body.to_string().contains("store offline"));
}

#[tokio::test]
async fn onboarding_creates_company_then_context_resolves() {
    let fx = fixture();
    let res = send(
        &fx.router,
        request("POST", "/api/tenants", Some("tok-p2"), None, Some(r#"{"name":"  New Co  "}"#)),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = json_body(res).await;
    assert_eq!(body["tenant"]["name"], "New Co");
    assert_eq!(body["membership"]["displayName"], "p2@example.com");

    let res = send(&fx.router, request("GET", "/api/context", Some("tok-p2"), None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["activeTenant"]["name"], "New Co");
}

#[tokio::test]
async fn blank_company_name_is_unprocessable() {
    let fx = fixture();
    let res = send(
        &fx.router,
        request("POST", "/api/tenants", Some("tok-p2"), None, Some(r#"{"name":"   "}"#)),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json_body(res).await["errors"]["name"].is_array());
}

#[tokio::test]
async fn deleting_the_active_company_clears_the_cookie() {
    let fx = fixture();
    let res = send(
        &fx.router,
        request("POST", "/api/context/switch", Some("tok-p1"), None, Some(r#"{"tenantId":"B"}"#)),
    )
    .await;
    let cookie = set_cookie_pair(&res).unwrap();

    let res = send(&fx.router, request("DELETE", "/api/tenants/B", Some("tok-p1"), Some(&cookie), None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let cleared = res.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(json_body(res).await["deletedTenantId"], "B");

    let res = send(&fx.router, request("GET", "/api/context", Some("tok-p1"), None, None)).await;
    assert_eq!(json_body(res).await["activeTenant"]["id"], "A");
}

#[tokio::test]
async fn deleting_a_foreign_company_is_forbidden() {
    let fx = fixture();
    let res = send(&fx.router, request("DELETE", "/api/tenants/C", Some("tok-p1"), None, None)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(fx.store.tenants().len(), 3);
}

#[tokio::test]
async fn removing_an_unknown_membership_is_not_found() {
    let fx = fixture();
    let res = send(&fx.router, request("DELETE", "/api/memberships/missing", Some("tok-p1"), None, None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn forgetting_the_preference_clears_the_cookie() {
    let fx = fixture();
    let res = send(&fx.router, request("DELETE", "/api/context/preference", None, None, None)).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let cleared = res.headers().get("set-cookie").unwrap().to_str().unwrap();
    assert!(cleared.starts_with("app-active-company-id=;"));
}

#[tokio::test]
async fn extra_get_routes_share_the_request_id_layer() {
    let app = RosterApp::new(
        Arc::new(StaticIdentityProvider::new()),
        Arc::new(InMemoryMembershipStore::new()),
    );
    app.set(PREFERENCE_SECRET, "test-preference-secret");
    let router = axum(app)
        .unwrap()
        .use_get("/version", || async { "0.1.0" })
        .into_router();

    let res = send(&router, request("GET", "/version", None, None, None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-request-id").is_some());
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"0.1.0");
}
