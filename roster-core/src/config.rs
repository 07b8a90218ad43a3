//! # Roster configuration
//!
//! A string key/value store in the Feathers `app.set()` / `app.get()` style.
//! Values are layered by the application (defaults, then environment); the
//! core only reads them through [`RosterConfigSnapshot`].
//!
//! ```rust
//! use roster_core::RosterConfig;
//!
//! let mut cfg = RosterConfig::new();
//! cfg.set("tenants.max_per_principal", "3");
//! assert_eq!(cfg.snapshot().max_tenants_per_principal(), 3);
//! ```
//!
//! Environment overrides use a prefix and `__` as the path separator:
//! `ROSTER__PREFERENCE__MAX_AGE_DAYS=7` → `preference.max_age_days`.

use std::collections::HashMap;

pub const HTTP_HOST: &str = "http.host";
pub const HTTP_PORT: &str = "http.port";
pub const AUTH_JWT_SECRET: &str = "auth.jwt.secret";
pub const AUTH_JWT_ISSUER: &str = "auth.jwt.issuer";
pub const AUTH_JWT_AUDIENCE: &str = "auth.jwt.audience";
pub const AUTH_REMOTE_URL: &str = "auth.remote.url";
pub const AUTH_REMOTE_API_KEY: &str = "auth.remote.api_key";
pub const AUTH_REMOTE_TIMEOUT_MS: &str = "auth.remote.timeout_ms";
pub const PREFERENCE_COOKIE_NAME: &str = "preference.cookie_name";
pub const PREFERENCE_MAX_AGE_DAYS: &str = "preference.max_age_days";
pub const PREFERENCE_SECRET: &str = "preference.secret";
pub const PREFERENCE_SECURE: &str = "preference.secure";
pub const TENANTS_MAX_PER_PRINCIPAL: &str = "tenants.max_per_principal";
pub const ROUTES_SIGN_IN: &str = "routes.sign_in";
pub const ROUTES_ONBOARDING: &str = "routes.onboarding";
pub const DATABASE_URL: &str = "database.url";

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_JWT_ISSUER: &str = "roster";
pub const DEFAULT_JWT_AUDIENCE: &str = "roster-app";
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PREFERENCE_COOKIE: &str = "app-active-company-id";
pub const DEFAULT_PREFERENCE_MAX_AGE_DAYS: u64 = 30;
pub const DEFAULT_MAX_TENANTS_PER_PRINCIPAL: usize = 5;
pub const DEFAULT_SIGN_IN_ROUTE: &str = "/auth/signin";
pub const DEFAULT_ONBOARDING_ROUTE: &str = "/dashboard/create-company";

#[derive(Debug, Default)]
pub struct RosterConfig {
    values: HashMap<String, String>,
}

impl RosterConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn snapshot(&self) -> RosterConfigSnapshot {
        RosterConfigSnapshot::new(self.values.clone())
    }
}

/// Read-only copy of the config, handed to request-time code.
#[derive(Debug, Clone, Default)]
pub struct RosterConfigSnapshot {
    map: HashMap<String, String>,
}

impl RosterConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    /// Empty values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    pub fn get_u16(&self, key: &str) -> Option<u16> {
        self.get(key).and_then(|v| v.parse::<u16>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| match v.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        })
    }

    // ---- Typed settings with defaults ----

    pub fn http_host(&self) -> String {
        self.get_string(HTTP_HOST)
            .unwrap_or_else(|| DEFAULT_HTTP_HOST.to_string())
    }

    pub fn http_port(&self) -> u16 {
        self.get_u16(HTTP_PORT).unwrap_or(DEFAULT_HTTP_PORT)
    }

    pub fn max_tenants_per_principal(&self) -> usize {
        self.get_usize(TENANTS_MAX_PER_PRINCIPAL)
            .unwrap_or(DEFAULT_MAX_TENANTS_PER_PRINCIPAL)
    }

    pub fn preference_cookie_name(&self) -> String {
        self.get_string(PREFERENCE_COOKIE_NAME)
            .unwrap_or_else(|| DEFAULT_PREFERENCE_COOKIE.to_string())
    }

    pub fn preference_max_age_days(&self) -> u64 {
        self.get_u64(PREFERENCE_MAX_AGE_DAYS)
            .unwrap_or(DEFAULT_PREFERENCE_MAX_AGE_DAYS)
    }

    /// Signing secret for the preference; falls back to the JWT secret.
    pub fn preference_secret(&self) -> Option<String> {
        self.get_string(PREFERENCE_SECRET)
            .or_else(|| self.get_string(AUTH_JWT_SECRET))
    }

    pub fn preference_secure(&self) -> bool {
        self.get_bool(PREFERENCE_SECURE).unwrap_or(false)
    }

    pub fn sign_in_route(&self) -> String {
        self.get_string(ROUTES_SIGN_IN)
            .unwrap_or_else(|| DEFAULT_SIGN_IN_ROUTE.to_string())
    }

    pub fn onboarding_route(&self) -> String {
        self.get_string(ROUTES_ONBOARDING)
            .unwrap_or_else(|| DEFAULT_ONBOARDING_ROUTE.to_string())
    }
}

/// Map `PREFIX` + `A__B__C` environment variables onto `a.b.c` keys.
///
/// `prefix` includes its trailing separator, e.g. `"ROSTER__"`.
pub fn load_env_config(config: &mut RosterConfig, prefix: &str) {
    apply_env_vars(config, prefix, std::env::vars());
}

fn apply_env_vars<I>(config: &mut RosterConfig, prefix: &str, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        if let Some(stripped) = key.strip_prefix(prefix) {
            let normalized = stripped.to_lowercase().replace("__", ".");
            config.set(normalized, value);
        }
    }
}
