// Identity from a hosted auth service.

use async_trait::async_trait;
use reqwest::StatusCode;
use roster_core::errors::CollaboratorError;
use roster_core::{Credentials, IdentityProvider, Principal};
use serde::Deserialize;
use tracing::debug;

use crate::options::{RemoteAuthOptions, SESSION_COOKIE};

const COLLABORATOR: &str = "identity provider";

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: RemoteUserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteUserMetadata {
    full_name: Option<String>,
}

impl From<RemoteUser> for Principal {
    fn from(user: RemoteUser) -> Self {
        Principal {
            id: user.id.into(),
            email: user.email,
            display_name: user.user_metadata.full_name,
        }
    }
}

/// Asks the hosted auth service who owns the request's access token:
/// `GET {url}/auth/v1/user`.
#[derive(Clone, Debug)]
pub struct RemoteIdentityProvider {
    client: reqwest::Client,
    options: RemoteAuthOptions,
}

impl RemoteIdentityProvider {
    pub fn new(options: RemoteAuthOptions) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| CollaboratorError::misconfigured(COLLABORATOR, e.to_string()))?;
        Ok(Self { client, options })
    }

    fn transport_error(err: reqwest::Error) -> CollaboratorError {
        if err.is_timeout() {
            CollaboratorError::timeout(COLLABORATOR)
        } else if err.is_connect() {
            CollaboratorError::unavailable(COLLABORATOR, err.to_string())
        } else {
            CollaboratorError::backend(COLLABORATOR, err.to_string())
        }
    }
}

#[async_trait]
impl IdentityProvider for RemoteIdentityProvider {
    async fn current_principal(&self, credentials: &Credentials) -> Result<Option<Principal>, CollaboratorError> {
        let Some(token) = credentials
            .bearer_token()
            .or_else(|| credentials.cookie(SESSION_COOKIE).map(str::to_string))
        else {
            return Ok(None);
        };

        let mut request = self
            .client
            .get(self.options.user_endpoint())
            .bearer_auth(&token);
        if let Some(key) = &self.options.api_key {
            request = request.header("apikey", key);
        }

        let response = request.send().await.map_err(Self::transport_error)?;

        match response.status() {
            status if status.is_success() => {
                let user: RemoteUser = response.json().await.map_err(Self::transport_error)?;
                Ok(Some(user.into()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("hosted auth rejected the access token");
                Ok(None)
            }
            status if status.is_server_error() => Err(CollaboratorError::unavailable(
                COLLABORATOR,
                format!("hosted auth returned {status}"),
            )),
            status => Err(CollaboratorError::backend(
                COLLABORATOR,
                format!("hosted auth returned {status}"),
            )),
        }
    }
}
