//! Request extractors that run tenant resolution before a handler.
//!
//! Handlers that take [`ActiveTenant`] only ever see an authorized
//! [`TenantContext`]; the routine outcomes become redirects.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use roster_core::errors::RosterError;
use roster_core::{ActiveTenantPreference, Credentials, Principal, Resolution, TenantContext};

use crate::cookies::parse_cookies;
use crate::error::RosterAxumError;
use crate::state::RosterAxumState;

/// Copy headers and cookies into the identity-agnostic [`Credentials`].
pub fn credentials_from_headers(headers: &HeaderMap) -> Credentials {
    let mut credentials = Credentials::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            credentials
                .headers
                .entry(name.as_str().to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    credentials.cookies = parse_cookies(headers);
    credentials
}

/// Raw request identity plus the decoded preference, before any lookup.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub credentials: Credentials,
    pub preference: Option<ActiveTenantPreference>,
}

impl RequestIdentity {
    pub fn read(headers: &HeaderMap, state: &RosterAxumState) -> Self {
        let credentials = credentials_from_headers(headers);
        let preference = state.preference.read(&credentials.cookies, Utc::now());
        Self {
            credentials,
            preference,
        }
    }
}

impl FromRequestParts<RosterAxumState> for RequestIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RosterAxumState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::read(&parts.headers, state))
    }
}

#[derive(Debug)]
pub enum ContextRejection {
    SignIn(String),
    Onboarding(String),
    Failed(RosterAxumError),
}

impl IntoResponse for ContextRejection {
    fn into_response(self) -> Response {
        match self {
            ContextRejection::SignIn(to) | ContextRejection::Onboarding(to) => {
                Redirect::to(&to).into_response()
            }
            ContextRejection::Failed(err) => err.into_response(),
        }
    }
}

/// The resolved tenant context for this request.
#[derive(Debug, Clone)]
pub struct ActiveTenant {
    pub context: TenantContext,
    pub identity: RequestIdentity,
}

impl FromRequestParts<RosterAxumState> for ActiveTenant {
    type Rejection = ContextRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RosterAxumState,
    ) -> Result<Self, Self::Rejection> {
        let identity = RequestIdentity::read(&parts.headers, state);
        let resolution = state
            .app
            .resolver()
            .resolve(&identity.credentials, identity.preference.as_ref())
            .await
            .map_err(|e| ContextRejection::Failed(RosterError::from(e).into()))?;

        match resolution {
            Resolution::Resolved { context, .. } => Ok(Self { context, identity }),
            Resolution::NotAuthenticated => {
                Err(ContextRejection::SignIn(state.routes.sign_in.clone()))
            }
            Resolution::NoTenant { .. } => {
                Err(ContextRejection::Onboarding(state.routes.onboarding.clone()))
            }
        }
    }
}

/// A signed-in principal, company or not.
#[derive(Debug, Clone)]
pub struct SignedIn(pub Principal);

impl FromRequestParts<RosterAxumState> for SignedIn {
    type Rejection = ContextRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RosterAxumState,
    ) -> Result<Self, Self::Rejection> {
        let credentials = credentials_from_headers(&parts.headers);
        match state.app.resolver().principal(&credentials).await {
            Ok(Some(principal)) => Ok(Self(principal)),
            Ok(None) => Err(ContextRejection::SignIn(state.routes.sign_in.clone())),
            Err(e) => Err(ContextRejection::Failed(RosterError::from(e).into())),
        }
    }
}
