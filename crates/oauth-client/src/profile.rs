//! Extended profile retrieval
//!
//! Only used when profile retrieval is enabled in configuration. The response
//! is kept as opaque JSON and stored on the credential as-is.

use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Fetches the signed-in user's profile with their access token.
#[derive(Clone)]
pub struct ProfileFetcher {
    http: reqwest::Client,
    url: String,
}

impl ProfileFetcher {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// GET the profile endpoint with bearer authorization.
    ///
    /// Transport errors, non-success statuses and non-JSON bodies all map to
    /// `Error::ProfileFetch`.
    #[instrument(skip_all)]
    pub async fn fetch(&self, access_token: &str) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(&self.url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::ProfileFetch(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ProfileFetch(format!(
                "profile endpoint returned {status}"
            )));
        }

        let profile = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::ProfileFetch(format!("profile body is not JSON: {e}")))?;
        debug!("profile fetched");
        Ok(profile)
    }
}
