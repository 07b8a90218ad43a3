// Signed active-company preference.
//
// Wire form: `<tenant>.<principal>.<expires>.<sig>` where tenant and
// principal are base64url, expires is unix seconds and sig is the base64url
// HMAC-SHA256 of everything before the last dot.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use roster_core::{ActiveTenantPreference, PrincipalId, TenantId};
use sha2::Sha256;
use tracing::debug;

use crate::options::PreferenceOptions;

type HmacSha256 = Hmac<Sha256>;

const MAX_VALUE_LEN: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum PreferenceCodecError {
    #[error("preference signing requires a non-empty secret")]
    MissingSecret,
}

#[derive(Clone)]
pub struct PreferenceCodec {
    key: Vec<u8>,
    max_age: Duration,
}

impl std::fmt::Debug for PreferenceCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceCodec")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl PreferenceCodec {
    pub fn new(secret: impl AsRef<[u8]>, max_age: Duration) -> Result<Self, PreferenceCodecError> {
        let key = secret.as_ref().to_vec();
        if key.is_empty() {
            return Err(PreferenceCodecError::MissingSecret);
        }
        Ok(Self { key, max_age })
    }

    pub fn from_options(options: &PreferenceOptions) -> Result<Self, PreferenceCodecError> {
        let secret = options
            .secret
            .as_deref()
            .ok_or(PreferenceCodecError::MissingSecret)?;
        Self::new(secret, options.max_age)
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn signature(&self, payload: &str) -> Option<HmacSha256> {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(&self.key).ok()?;
        mac.update(payload.as_bytes());
        Some(mac)
    }

    pub fn encode(&self, preference: &ActiveTenantPreference, now: DateTime<Utc>) -> String {
        let max_age = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
        let expires = now.timestamp().saturating_add(max_age);
        let payload = format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(preference.tenant_id.as_str()),
            URL_SAFE_NO_PAD.encode(preference.principal_id.as_str()),
            expires
        );
        let sig = self
            .signature(&payload)
            .map(|mac| URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
            .unwrap_or_default();
        format!("{payload}.{sig}")
    }

    /// `None` for anything that is not a valid, unexpired value.
    pub fn decode(&self, value: &str, now: DateTime<Utc>) -> Option<ActiveTenantPreference> {
        let value = value.trim();
        if value.is_empty() || value.len() > MAX_VALUE_LEN {
            return None;
        }

        let (payload, sig) = value.rsplit_once('.')?;
        let expected = URL_SAFE_NO_PAD.decode(sig).ok()?;
        if self.signature(payload)?.verify_slice(&expected).is_err() {
            debug!("active company preference signature mismatch");
            return None;
        }

        let mut parts = payload.split('.');
        let (Some(tenant), Some(principal), Some(expires), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };

        let expires: i64 = expires.parse().ok()?;
        if expires <= now.timestamp() {
            debug!("active company preference expired");
            return None;
        }

        let tenant = String::from_utf8(URL_SAFE_NO_PAD.decode(tenant).ok()?).ok()?;
        let principal = String::from_utf8(URL_SAFE_NO_PAD.decode(principal).ok()?).ok()?;
        if tenant.is_empty() || principal.is_empty() {
            return None;
        }

        Some(ActiveTenantPreference {
            tenant_id: TenantId::new(tenant),
            principal_id: PrincipalId::new(principal),
        })
    }
}
