//! Client registration and endpoint configuration

use common::Secret;
use serde::Deserialize;

use crate::constants::{AUTHORIZE_ENDPOINT, PROFILE_ENDPOINT, REVOKE_ENDPOINT, TOKEN_ENDPOINT};
use crate::error::{Error, Result};

/// Values the provider issued when the application was registered.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Must match the redirect URI registered with the provider exactly.
    pub redirect_uri: String,
}

impl ClientCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<Secret<String>>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }
}

/// Provider endpoint URLs. Each field falls back to the built-in default when
/// omitted from the config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub authorize: String,
    pub token: String,
    pub revoke: String,
    pub profile: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize: AUTHORIZE_ENDPOINT.into(),
            token: TOKEN_ENDPOINT.into(),
            revoke: REVOKE_ENDPOINT.into(),
            profile: PROFILE_ENDPOINT.into(),
        }
    }
}

impl Endpoints {
    /// Check that every endpoint is an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("authorize", &self.authorize),
            ("token", &self.token),
            ("revoke", &self.revoke),
            ("profile", &self.profile),
        ] {
            let url = reqwest::Url::parse(value)
                .map_err(|e| Error::InvalidEndpoint(format!("{name} endpoint {value:?}: {e}")))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(Error::InvalidEndpoint(format!(
                    "{name} endpoint must use http or https, got: {value}"
                )));
            }
        }
        Ok(())
    }
}
