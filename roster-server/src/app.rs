use std::sync::Arc;

use anyhow::{anyhow, Result};
use roster_auth::{JwtIdentityProvider, JwtOptions, RemoteAuthOptions, RemoteIdentityProvider};
use roster_core::{IdentityProvider, InMemoryMembershipStore, MembershipStore, RosterConfigSnapshot};

/// Hosted auth when a remote URL is configured, local JWT verification otherwise.
pub fn identity_provider(cfg: &RosterConfigSnapshot) -> Result<Arc<dyn IdentityProvider>> {
    if let Some(remote) = RemoteAuthOptions::from_config(cfg) {
        remote.validate().map_err(|e| anyhow!(e))?;
        tracing::info!(url = %remote.url, "using remote identity provider");
        return Ok(Arc::new(RemoteIdentityProvider::new(remote)?));
    }

    let jwt = JwtOptions::from_config(cfg);
    jwt.validate().map_err(|e| anyhow!(e))?;
    tracing::info!(issuer = %jwt.issuer, "using JWT identity provider");
    Ok(Arc::new(JwtIdentityProvider::new(jwt)))
}

#[cfg(feature = "postgres")]
pub async fn membership_store(cfg: &RosterConfigSnapshot) -> Result<Arc<dyn MembershipStore>> {
    use roster_core::config::DATABASE_URL;
    use roster_core::PgMembershipStore;

    if let Some(url) = cfg.get(DATABASE_URL) {
        let store = PgMembershipStore::connect(url).await?;
        store.ensure_schema().await?;
        tracing::info!("using postgres membership store");
        return Ok(Arc::new(store));
    }
    tracing::warn!("DATABASE_URL not set, memberships are kept in memory");
    Ok(Arc::new(InMemoryMembershipStore::new()))
}

#[cfg(not(feature = "postgres"))]
pub async fn membership_store(_cfg: &RosterConfigSnapshot) -> Result<Arc<dyn MembershipStore>> {
    tracing::warn!("built without the postgres feature, memberships are kept in memory");
    Ok(Arc::new(InMemoryMembershipStore::new()))
}

#[cfg(test)]
mod tests {
    use roster_core::config::{AUTH_JWT_SECRET, AUTH_REMOTE_URL};
    use roster_core::RosterConfig;

    use super::*;

    #[test]
    fn jwt_provider_needs_a_secret() {
        assert!(identity_provider(&RosterConfig::new().snapshot()).is_err());

        let mut cfg = RosterConfig::new();
        cfg.set(AUTH_JWT_SECRET, "s3cret");
        assert!(identity_provider(&cfg.snapshot()).is_ok());
    }

    #[test]
    fn remote_url_selects_remote_provider() {
        let mut cfg = RosterConfig::new();
        cfg.set(AUTH_REMOTE_URL, "https://auth.example.com");
        assert!(identity_provider(&cfg.snapshot()).is_ok());
    }
}
