//! Configuration types and loading
//!
//! Path precedence: `--config` > `CONFIG_PATH` > `auth-gateway.toml`.
//! The OAuth client secret is loaded from the OAUTH_CLIENT_SECRET env var or
//! `client_secret_file`, never stored in the TOML directly.

use common::Secret;
use oauth_client::{ClientCredentials, Endpoints};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
}

/// HTTP listener and session cookie settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    /// Mark the session cookie `Secure`. Disable only for plain-http local runs.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

/// Identity provider client settings
#[derive(Debug, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    pub redirect_uri: String,
    /// Fetch the provider profile after each code exchange
    #[serde(default)]
    pub profile_enabled: bool,
    #[serde(default = "default_scopes")]
    pub scopes: String,
    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_max_connections() -> usize {
    1000
}

fn default_session_cookie() -> String {
    "sid".into()
}

fn default_secure_cookies() -> bool {
    true
}

fn default_scopes() -> String {
    oauth_client::constants::DEFAULT_SCOPES.into()
}

impl Config {
    /// Load configuration from a TOML file, resolve the client secret and
    /// validate.
    ///
    /// Client secret resolution order:
    /// 1. OAUTH_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    ///
    /// Both are trimmed; a blank value counts as unset.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        let env_secret = std::env::var("OAUTH_CLIENT_SECRET")
            .ok()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());

        if let Some(secret) = env_secret {
            config.oauth.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.oauth.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.oauth.client_secret = Some(Secret::new(secret));
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        if !self.oauth.redirect_uri.starts_with("http://")
            && !self.oauth.redirect_uri.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "redirect_uri must start with http:// or https://, got: {}",
                self.oauth.redirect_uri
            )));
        }

        self.oauth
            .endpoints
            .validate()
            .map_err(|e| common::Error::Config(e.to_string()))?;

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.server.session_cookie.trim().is_empty() {
            return Err(common::Error::Config(
                "session_cookie must not be empty".into(),
            ));
        }

        if self.oauth.client_secret.is_none() {
            return Err(common::Error::Config(
                "client secret missing: set OAUTH_CLIENT_SECRET or oauth.client_secret_file"
                    .into(),
            ));
        }

        Ok(())
    }

    /// Client registration for the token client.
    pub fn credentials(&self) -> common::Result<ClientCredentials> {
        let secret = self
            .oauth
            .client_secret
            .clone()
            .ok_or_else(|| common::Error::Config("client secret not loaded".into()))?;
        Ok(ClientCredentials {
            client_id: self.oauth.client_id.clone(),
            client_secret: secret,
            redirect_uri: self.oauth.redirect_uri.clone(),
        })
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("auth-gateway.toml")
    }
}
