//! Authorization URL construction
//!
//! Builds the consent-page redirect that starts the authorization-code flow.
//! The provider sends the browser back to `redirect_uri` with `code` (and the
//! `state` value, if one was supplied) in the query string.

use crate::config::{ClientCredentials, Endpoints};
use crate::error::{Error, Result};

/// Build the full authorization URL with all required OAuth parameters.
///
/// Parameters are appended to any query the configured endpoint already has
/// and are percent-encoded by `reqwest::Url`.
pub fn build_authorization_url(
    credentials: &ClientCredentials,
    endpoints: &Endpoints,
    scopes: &str,
    state: Option<&str>,
) -> Result<String> {
    let mut url = reqwest::Url::parse(&endpoints.authorize)
        .map_err(|e| Error::InvalidEndpoint(format!("authorize endpoint: {e}")))?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", &credentials.client_id)
            .append_pair("redirect_uri", &credentials.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", scopes);
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }

    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AUTHORIZE_ENDPOINT, DEFAULT_SCOPES};

    fn credentials() -> ClientCredentials {
        ClientCredentials::new("client-123", "secret", "https://app.example/auth/callback")
    }

    #[test]
    fn contains_required_params() {
        let url =
            build_authorization_url(&credentials(), &Endpoints::default(), DEFAULT_SCOPES, None)
                .unwrap();

        assert!(url.starts_with(AUTHORIZE_ENDPOINT));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example%2Fauth%2Fcallback"));
        assert!(url.contains("scope=openid+email+profile"));
        assert!(!url.contains("state="));
    }

    #[test]
    fn never_leaks_client_secret() {
        let url =
            build_authorization_url(&credentials(), &Endpoints::default(), "openid", Some("xyz"))
                .unwrap();
        assert!(!url.contains("secret"), "got: {url}");
        assert!(url.contains("state=xyz"));
    }

    #[test]
    fn keeps_existing_endpoint_query() {
        let endpoints = Endpoints {
            authorize: "https://idp.example/authorize?prompt=consent".into(),
            ..Endpoints::default()
        };
        let url = build_authorization_url(&credentials(), &endpoints, "openid", None).unwrap();
        assert!(url.starts_with("https://idp.example/authorize?prompt=consent&client_id="));
    }

    #[test]
    fn invalid_endpoint_is_reported() {
        let endpoints = Endpoints {
            authorize: "not a url".into(),
            ..Endpoints::default()
        };
        let err = build_authorization_url(&credentials(), &endpoints, "openid", None).unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint(_)), "got: {err:?}");
    }
}
