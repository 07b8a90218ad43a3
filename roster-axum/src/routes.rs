use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use roster_core::errors::RosterError;
use roster_core::{
    clear_preference, CreateTenantInput, MembershipId, PreferenceUpdate, SwitchOutcome, TenantId,
};
use serde::Deserialize;
use serde_json::json;

use crate::extract::{ActiveTenant, RequestIdentity, SignedIn};
use crate::{RosterAxumError, RosterAxumState};

fn map_json_rejection(rejection: JsonRejection) -> RosterAxumError {
    RosterError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.to_string()]}))
        .into()
}

fn cookie_headers(state: &RosterAxumState, update: &PreferenceUpdate) -> HeaderMap {
    let mut headers = HeaderMap::new();
    state.preference.apply(update, &mut headers, Utc::now());
    headers
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchBody {
    #[serde(default)]
    pub tenant_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTenantBody {
    #[serde(default)]
    pub name: String,
}

async fn health(State(state): State<RosterAxumState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "resolver": state.app.metrics().snapshot(),
    }))
}

async fn current_context(tenant: ActiveTenant) -> impl IntoResponse {
    Json(tenant.context)
}

async fn switch_context(
    State(state): State<RosterAxumState>,
    identity: RequestIdentity,
    body: Result<Json<SwitchBody>, JsonRejection>,
) -> Result<Response, RosterAxumError> {
    let Json(body) = body.map_err(map_json_rejection)?;
    let requested = body.tenant_id.trim();
    if requested.is_empty() {
        return Err(RosterError::bad_request("tenantId is required").into());
    }
    let requested = TenantId::new(requested);

    let outcome = state
        .app
        .resolver()
        .switch_active_tenant(&identity.credentials, identity.preference.as_ref(), &requested)
        .await
        .map_err(RosterError::from)?;

    let headers = cookie_headers(&state, &outcome.preference_update());
    let response = match outcome {
        SwitchOutcome::NotAuthenticated => Redirect::to(&state.routes.sign_in).into_response(),
        SwitchOutcome::Unchanged { tenant_id } => {
            (headers, Json(json!({"activeTenantId": tenant_id, "changed": false}))).into_response()
        }
        SwitchOutcome::Switched { preference } => (
            headers,
            Json(json!({"activeTenantId": preference.tenant_id, "changed": true})),
        )
            .into_response(),
        SwitchOutcome::Denied { .. } => {
            (headers, RosterAxumError::from(RosterError::denied())).into_response()
        }
    };
    Ok(response)
}

async fn forget_preference(State(state): State<RosterAxumState>) -> impl IntoResponse {
    (StatusCode::NO_CONTENT, cookie_headers(&state, &clear_preference()))
}

async fn create_tenant(
    State(state): State<RosterAxumState>,
    SignedIn(principal): SignedIn,
    body: Result<Json<CreateTenantBody>, JsonRejection>,
) -> Result<Response, RosterAxumError> {
    let Json(body) = body.map_err(map_json_rejection)?;
    let change = state
        .app
        .create_tenant(&principal, CreateTenantInput::new(body.name))
        .await?;

    let headers = cookie_headers(&state, &change.preference);
    let created = change.value;
    Ok((
        StatusCode::CREATED,
        headers,
        Json(json!({"tenant": created.tenant, "membership": created.membership})),
    )
        .into_response())
}

async fn delete_tenant(
    State(state): State<RosterAxumState>,
    tenant: ActiveTenant,
    Path(id): Path<String>,
) -> Result<Response, RosterAxumError> {
    let change = state
        .app
        .delete_tenant(&tenant.context, &TenantId::new(id))
        .await?;
    let headers = cookie_headers(&state, &change.preference);
    Ok((headers, Json(json!({"deletedTenantId": change.value}))).into_response())
}

async fn remove_membership(
    State(state): State<RosterAxumState>,
    tenant: ActiveTenant,
    Path(id): Path<String>,
) -> Result<Response, RosterAxumError> {
    let change = state
        .app
        .remove_membership(&tenant.context, &MembershipId::new(id))
        .await?;
    let headers = cookie_headers(&state, &change.preference);
    Ok((headers, Json(change.value)).into_response())
}

pub fn context_router(state: RosterAxumState) -> Router<()> {
    Router::new()
        .route("/health", get(health))
        .route("/api/context", get(current_context))
        .route("/api/context/switch", post(switch_context))
        .route("/api/context/preference", delete(forget_preference))
        .route("/api/tenants", post(create_tenant))
        .route("/api/tenants/{id}", delete(delete_tenant))
        .route("/api/memberships/{id}", delete(remove_membership))
        .with_state(state)
}
