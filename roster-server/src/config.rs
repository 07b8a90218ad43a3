use std::env;

use roster_core::config::{
    AUTH_JWT_SECRET, AUTH_REMOTE_API_KEY, AUTH_REMOTE_URL, DATABASE_URL, HTTP_HOST, HTTP_PORT,
    PREFERENCE_SECRET,
};
use roster_core::{load_env_config, RosterConfig};

const DEV_SECRET: &str = "dev-secret";

/// Settings from well-known env vars, then any `ROSTER__SECTION__KEY` override.
pub fn config() -> RosterConfig {
    let mut cfg = RosterConfig::new();

    configure_http(&mut cfg);
    configure_auth(&mut cfg);
    configure_database(&mut cfg);

    load_env_config(&mut cfg, "ROSTER__");
    cfg
}

fn set_from_env(cfg: &mut RosterConfig, var: &str, key: &str) {
    if let Ok(value) = env::var(var) {
        let value = value.trim();
        if !value.is_empty() {
            cfg.set(key, value);
        }
    }
}

fn configure_http(cfg: &mut RosterConfig) {
    set_from_env(cfg, "HTTP_HOST", HTTP_HOST);
    set_from_env(cfg, "HTTP_PORT", HTTP_PORT);
}

fn configure_auth(cfg: &mut RosterConfig) {
    set_from_env(cfg, "AUTH_JWT_SECRET", AUTH_JWT_SECRET);
    set_from_env(cfg, "AUTH_REMOTE_URL", AUTH_REMOTE_URL);
    set_from_env(cfg, "AUTH_REMOTE_API_KEY", AUTH_REMOTE_API_KEY);
    set_from_env(cfg, "PREFERENCE_SECRET", PREFERENCE_SECRET);

    if !cfg.has(AUTH_JWT_SECRET) && !cfg.has(PREFERENCE_SECRET) {
        tracing::warn!("no AUTH_JWT_SECRET or PREFERENCE_SECRET set, using a development secret");
        cfg.set(PREFERENCE_SECRET, DEV_SECRET);
        if !cfg.has(AUTH_REMOTE_URL) {
            cfg.set(AUTH_JWT_SECRET, DEV_SECRET);
        }
    }
}

fn configure_database(cfg: &mut RosterConfig) {
    set_from_env(cfg, "DATABASE_URL", DATABASE_URL);
}
