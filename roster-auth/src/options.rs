// Identity and preference options.

use std::time::Duration;

use roster_core::config::{
    self, RosterConfigSnapshot, DEFAULT_JWT_AUDIENCE, DEFAULT_JWT_ISSUER, DEFAULT_REMOTE_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};

/// Session cookie carrying the JWT when no `Authorization` header is sent.
pub const SESSION_COOKIE: &str = "roster-session";

/// JWT signing algorithms
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum JwtAlgorithm {
    /// HMAC using SHA-256
    #[default]
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
}

/// Main identity configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthOptions {
    /// Session JWT verification
    pub jwt: JwtOptions,
    /// Hosted identity lookup; used instead of local JWT verification when set
    pub remote: Option<RemoteAuthOptions>,
    /// Active-company preference cookie
    pub preference: PreferenceOptions,
}

impl AuthOptions {
    pub fn from_config(cfg: &RosterConfigSnapshot) -> Self {
        Self {
            jwt: JwtOptions::from_config(cfg),
            remote: RemoteAuthOptions::from_config(cfg),
            preference: PreferenceOptions::from_config(cfg),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), String> {
        match &self.remote {
            Some(remote) => remote
                .validate()
                .map_err(|e| format!("Remote identity validation failed: {e}"))?,
            None => self
                .jwt
                .validate()
                .map_err(|e| format!("JWT validation failed: {e}"))?,
        }
        self.preference
            .validate()
            .map_err(|e| format!("Preference validation failed: {e}"))?;
        Ok(())
    }
}

/// JWT-specific configuration options
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtOptions {
    pub algorithm: JwtAlgorithm,
    /// Token issuer (iss claim)
    pub issuer: String,
    /// Token audience (aud claim)
    pub audience: Vec<String>,
    /// Lifetime of tokens issued by `create_access_token`
    #[serde(with = "humantime_serde")]
    pub access_token_expires_in: Duration,
    /// JWT signing secret
    pub secret: Option<String>,
    /// Cookie read when the request has no bearer token
    pub session_cookie: String,
}

impl Default for JwtOptions {
    fn default() -> Self {
        Self {
            algorithm: JwtAlgorithm::default(),
            issuer: DEFAULT_JWT_ISSUER.to_string(),
            audience: vec![DEFAULT_JWT_AUDIENCE.to_string()],
            access_token_expires_in: Duration::from_secs(3600),
            secret: None,
            session_cookie: SESSION_COOKIE.to_string(),
        }
    }
}

impl JwtOptions {
    pub fn from_config(cfg: &RosterConfigSnapshot) -> Self {
        let defaults = Self::default();
        Self {
            issuer: cfg
                .get_string(config::AUTH_JWT_ISSUER)
                .unwrap_or(defaults.issuer),
            audience: cfg
                .get(config::AUTH_JWT_AUDIENCE)
                .map(|a| {
                    a.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.audience),
            secret: cfg.get_string(config::AUTH_JWT_SECRET),
            ..defaults
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.issuer.is_empty() {
            return Err("JWT issuer cannot be empty".to_string());
        }

        if self.audience.is_empty() {
            return Err("JWT audience cannot be empty".to_string());
        }

        if self.secret.as_deref().map_or(true, str::is_empty) {
            return Err("HMAC algorithms require a secret".to_string());
        }

        if self.access_token_expires_in.as_secs() == 0 {
            return Err("Access token expiration must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Hosted auth service configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteAuthOptions {
    /// Base URL; the user endpoint is `{url}/auth/v1/user`
    pub url: String,
    /// Sent as the `apikey` header when set
    pub api_key: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl RemoteAuthOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            timeout: Duration::from_millis(DEFAULT_REMOTE_TIMEOUT_MS),
        }
    }

    /// `None` unless `auth.remote.url` is set.
    pub fn from_config(cfg: &RosterConfigSnapshot) -> Option<Self> {
        let url = cfg.get_string(config::AUTH_REMOTE_URL)?;
        Some(Self {
            url,
            api_key: cfg.get_string(config::AUTH_REMOTE_API_KEY),
            timeout: Duration::from_millis(
                cfg.get_u64(config::AUTH_REMOTE_TIMEOUT_MS)
                    .unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS),
            ),
        })
    }

    pub fn user_endpoint(&self) -> String {
        format!("{}/auth/v1/user", self.url.trim_end_matches('/'))
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("Remote identity URL must be a valid HTTP/HTTPS URL".to_string());
        }

        if self.timeout.is_zero() {
            return Err("Remote identity timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Active-company preference cookie configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreferenceOptions {
    pub cookie_name: String,
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
    /// HMAC key; falls back to the JWT secret in `from_config`
    pub secret: Option<String>,
    pub secure: bool,
}

impl Default for PreferenceOptions {
    fn default() -> Self {
        Self {
            cookie_name: config::DEFAULT_PREFERENCE_COOKIE.to_string(),
            max_age: days(config::DEFAULT_PREFERENCE_MAX_AGE_DAYS),
            secret: None,
            secure: false,
        }
    }
}

/// Browsers cap cookie lifetimes at about 400 days.
pub const MAX_PREFERENCE_AGE_DAYS: u64 = 400;

fn days(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(24 * 60 * 60))
}

impl PreferenceOptions {
    pub fn from_config(cfg: &RosterConfigSnapshot) -> Self {
        Self {
            cookie_name: cfg.preference_cookie_name(),
            max_age: days(cfg.preference_max_age_days()),
            secret: cfg.preference_secret(),
            secure: cfg.preference_secure(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.cookie_name.is_empty()
            || !self
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("Preference cookie name must be a non-empty token".to_string());
        }

        if self.secret.as_deref().map_or(true, str::is_empty) {
            return Err("Preference signing requires a secret".to_string());
        }

        if self.max_age.as_secs() == 0 {
            return Err("Preference max age must be greater than 0".to_string());
        }

        if self.max_age > days(MAX_PREFERENCE_AGE_DAYS) {
            return Err(format!(
                "Preference max age cannot exceed {MAX_PREFERENCE_AGE_DAYS} days"
            ));
        }

        Ok(())
    }
}
