use std::collections::HashMap;

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use roster_auth::{PreferenceCodec, PreferenceOptions};
use roster_core::{ActiveTenantPreference, PreferenceUpdate};

/// Every `name=value` pair of every `Cookie` header. First occurrence wins.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for value in headers.get_all(COOKIE) {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    out.entry(name.to_string())
                        .or_insert_with(|| value.trim().trim_matches('"').to_string());
                }
            }
        }
    }
    out
}

/// The active-company preference as an HTTP cookie.
#[derive(Clone, Debug)]
pub struct PreferenceCookie {
    codec: PreferenceCodec,
    name: String,
    secure: bool,
}

impl PreferenceCookie {
    pub fn new(codec: PreferenceCodec, name: impl Into<String>, secure: bool) -> Self {
        Self {
            codec,
            name: name.into(),
            secure,
        }
    }

    pub fn from_options(options: &PreferenceOptions) -> anyhow::Result<Self> {
        options.validate().map_err(anyhow::Error::msg)?;
        let codec = PreferenceCodec::from_options(options)?;
        Ok(Self::new(codec, options.cookie_name.clone(), options.secure))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn codec(&self) -> &PreferenceCodec {
        &self.codec
    }

    /// Invalid, forged or expired values read as absent.
    pub fn read(&self, cookies: &HashMap<String, String>, now: DateTime<Utc>) -> Option<ActiveTenantPreference> {
        cookies
            .get(&self.name)
            .and_then(|value| self.codec.decode(value, now))
    }

    fn attributes(&self, max_age: u64) -> String {
        let mut attrs = format!("Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax");
        if self.secure {
            attrs.push_str("; Secure");
        }
        attrs
    }

    pub fn set_header(&self, preference: &ActiveTenantPreference, now: DateTime<Utc>) -> Option<HeaderValue> {
        let value = self.codec.encode(preference, now);
        let cookie = format!(
            "{}={}; {}",
            self.name,
            value,
            self.attributes(self.codec.max_age().as_secs())
        );
        HeaderValue::from_str(&cookie).ok()
    }

    pub fn clear_header(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!("{}=; {}", self.name, self.attributes(0))).ok()
    }

    /// Append the `Set-Cookie` header `update` calls for, if any.
    pub fn apply(&self, update: &PreferenceUpdate, headers: &mut HeaderMap, now: DateTime<Utc>) {
        let value = match update {
            PreferenceUpdate::Keep => None,
            PreferenceUpdate::Set(preference) => self.set_header(preference, now),
            PreferenceUpdate::Clear => self.clear_header(),
        };
        if let Some(value) = value {
            headers.append(SET_COOKIE, value);
        }
    }
}
