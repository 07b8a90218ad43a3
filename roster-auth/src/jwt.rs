// Session identity from a signed JWT.

use async_trait::async_trait;
use chrono::Utc;
use roster_core::errors::CollaboratorError;
use roster_core::{Credentials, IdentityProvider, Principal};
use serde_json::{json, Value};
use tracing::debug;

use crate::options::{JwtAlgorithm, JwtOptions};

const COLLABORATOR: &str = "identity provider";

fn algorithm(alg: JwtAlgorithm) -> jsonwebtoken::Algorithm {
    match alg {
        JwtAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
        JwtAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
        JwtAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
    }
}

/// Verifies the session JWT locally.
///
/// The token comes from `Authorization: Bearer` or, failing that, the
/// session cookie. Any token that does not verify yields no principal.
#[derive(Clone, Debug)]
pub struct JwtIdentityProvider {
    options: JwtOptions,
}

impl JwtIdentityProvider {
    pub fn new(options: JwtOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &JwtOptions {
        &self.options
    }

    fn secret(&self) -> Result<&str, CollaboratorError> {
        self.options
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CollaboratorError::misconfigured(COLLABORATOR, "JWT secret is not configured"))
    }

    fn token_from(&self, credentials: &Credentials) -> Option<String> {
        credentials.bearer_token().or_else(|| {
            credentials
                .cookie(&self.options.session_cookie)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    }

    /// Issue a session token for `principal`.
    pub fn create_access_token(&self, principal: &Principal) -> Result<String, CollaboratorError> {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let secret = self.secret()?;
        let now = Utc::now().timestamp();
        let exp = now + self.options.access_token_expires_in.as_secs() as i64;

        let mut claims = json!({
            "sub": principal.id.as_str(),
            "iss": self.options.issuer,
            "aud": self.options.audience,
            "iat": now,
            "exp": exp,
        });
        if let Some(email) = &principal.email {
            claims["email"] = Value::String(email.clone());
        }
        if let Some(name) = &principal.display_name {
            claims["name"] = Value::String(name.clone());
        }

        let header = Header::new(algorithm(self.options.algorithm));
        encode(&header, &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|e| CollaboratorError::backend(COLLABORATOR, e.to_string()))
    }

    fn verify(&self, token: &str, secret: &str) -> Option<Value> {
        use jsonwebtoken::{decode, DecodingKey, Validation};

        let mut validation = Validation::new(algorithm(self.options.algorithm));
        validation.set_issuer(&[self.options.issuer.as_str()]);
        validation.set_audience(
            &self
                .options
                .audience
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>(),
        );

        match decode::<Value>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
            Ok(decoded) => Some(decoded.claims),
            Err(e) => {
                debug!(error = %e, "session token rejected");
                None
            }
        }
    }
}

fn principal_from_claims(claims: &Value) -> Option<Principal> {
    let sub = claims.get("sub")?.as_str()?.trim();
    if sub.is_empty() {
        return None;
    }

    let mut principal = Principal::new(sub);
    if let Some(email) = claims.get("email").and_then(Value::as_str) {
        principal = principal.with_email(email);
    }
    if let Some(name) = claims.get("name").and_then(Value::as_str) {
        principal = principal.with_display_name(name);
    }
    Some(principal)
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn current_principal(&self, credentials: &Credentials) -> Result<Option<Principal>, CollaboratorError> {
        let secret = self.secret()?;
        let Some(token) = self.token_from(credentials) else {
            return Ok(None);
        };
        Ok(self
            .verify(&token, secret)
            .as_ref()
            .and_then(principal_from_claims))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use roster_core::PrincipalId;

    use super::*;

    fn provider() -> JwtIdentityProvider {
        JwtIdentityProvider::new(JwtOptions::default().with_secret("test-secret"))
    }

    #[tokio::test]
    async fn issued_token_round_trips_through_bearer_and_cookie() {
        let idp = provider();
        let principal = Principal::new("u-1")
            .with_email("u1@example.com")
            .with_display_name("Uma");
        let token = idp.create_access_token(&principal).unwrap();

        let via_header = idp
            .current_principal(&Credentials::new().with_bearer(&token))
            .await
            .unwrap();
        assert_eq!(via_header, Some(principal.clone()));

        let via_cookie = idp
            .current_principal(&Credentials::new().with_cookie("roster-session", token))
            .await
            .unwrap();
        assert_eq!(via_cookie.map(|p| p.id), Some(PrincipalId::new("u-1")));
    }

    #[tokio::test]
    async fn forged_or_foreign_tokens_yield_no_principal() {
        let idp = provider();
        let other = JwtIdentityProvider::new(JwtOptions::default().with_secret("other-secret"));
        let forged = other.create_access_token(&Principal::new("u-1")).unwrap();
        assert_eq!(
            idp.current_principal(&Credentials::new().with_bearer(forged)).await.unwrap(),
            None
        );

        let wrong_issuer = JwtIdentityProvider::new(JwtOptions {
            issuer: "someone-else".to_string(),
            ..JwtOptions::default().with_secret("test-secret")
        });
        let token = wrong_issuer.create_access_token(&Principal::new("u-1")).unwrap();
        assert_eq!(
            idp.current_principal(&Credentials::new().with_bearer(token)).await.unwrap(),
            None
        );

        assert_eq!(
            idp.current_principal(&Credentials::new().with_bearer("not-a-jwt")).await.unwrap(),
            None
        );
        assert_eq!(idp.current_principal(&Credentials::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_token_yields_no_principal() {
        let idp = provider();
        let claims = json!({
            "sub": "u-1",
            "iss": "roster",
            "aud": ["roster-app"],
            "iat": Utc::now().timestamp() - 7200,
            "exp": Utc::now().timestamp() - 3600,
        });
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert_eq!(
            idp.current_principal(&Credentials::new().with_bearer(token)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn missing_secret_is_a_collaborator_failure() {
        let idp = JwtIdentityProvider::new(JwtOptions {
            access_token_expires_in: Duration::from_secs(60),
            ..JwtOptions::default()
        });
        let err = idp
            .current_principal(&Credentials::new().with_bearer("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Misconfigured { .. }));
    }
}
