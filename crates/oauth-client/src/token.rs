//! OAuth token exchange, refresh and revocation
//!
//! Handles the three token-related provider interactions:
//! 1. Authorization code exchange (callback completion)
//! 2. Token refresh (request-time, when the stored credential has expired)
//! 3. Revocation (sign-out, best-effort)
//!
//! Exchange and refresh POST to the token endpoint with different grant types
//! and the same five form fields. Revocation is a GET against a separate
//! endpoint and never reports failure to its caller.

use std::sync::Arc;

use common::now_millis;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{ClientCredentials, Endpoints};
use crate::credential::{Credential, expiration_from};
use crate::error::{Error, Result};
use crate::id_token::{self, ChannelTrust, IdTokenVerifier, IdentityClaims};

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time. Refresh
/// responses usually omit `refresh_token` (no rotation) and may omit
/// `id_token`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// Build a brand-new credential from a code exchange response.
    pub fn into_credential(self, claims: IdentityClaims, acquired_at: u64) -> Result<Credential> {
        let refresh_token = self.refresh_token.ok_or_else(|| {
            Error::InvalidResponse("code exchange response has no refresh_token".into())
        })?;
        Ok(Credential {
            subject_id: claims.subject_id,
            email: claims.email,
            access_token: self.access_token,
            refresh_token,
            expiration: expiration_from(acquired_at, self.expires_in),
            profile: None,
        })
    }

    /// Apply a refresh response on top of the credential it refreshed.
    ///
    /// Keeps the previous refresh token when none was returned, keeps the
    /// previous identity when no identity token was returned, and always
    /// carries the profile forward.
    pub fn into_refreshed(
        self,
        previous: &Credential,
        claims: Option<IdentityClaims>,
        acquired_at: u64,
    ) -> Credential {
        let (subject_id, email) = match claims {
            Some(claims) => (claims.subject_id, claims.email),
            None => (previous.subject_id.clone(), previous.email.clone()),
        };
        Credential {
            subject_id,
            email,
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .unwrap_or_else(|| previous.refresh_token.clone()),
            expiration: expiration_from(acquired_at, self.expires_in),
            profile: previous.profile.clone(),
        }
    }
}

/// Which token a revocation call targets (log and metric label only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn label(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

enum Grant<'a> {
    AuthorizationCode(&'a str),
    RefreshToken(&'a str),
}

impl Grant<'_> {
    fn grant_type(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode(_) => "authorization_code",
            Grant::RefreshToken(_) => "refresh_token",
        }
    }
}

/// Client for the provider's token and revocation endpoints.
///
/// Cheap to clone: the HTTP client and verifier are shared.
#[derive(Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    credentials: ClientCredentials,
    endpoints: Endpoints,
    verifier: Arc<dyn IdTokenVerifier>,
}

impl TokenClient {
    /// Create a client that trusts identity tokens on channel grounds.
    pub fn new(http: reqwest::Client, credentials: ClientCredentials, endpoints: Endpoints) -> Self {
        Self {
            http,
            credentials,
            endpoints,
            verifier: Arc::new(ChannelTrust),
        }
    }

    /// Replace the identity-token verifier.
    pub fn with_verifier(mut self, verifier: Arc<dyn IdTokenVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Exchange an authorization code for a new credential.
    ///
    /// The expiration is anchored to the moment the token response arrived.
    #[instrument(skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<Credential> {
        let response = self.request_tokens(Grant::AuthorizationCode(code)).await?;
        let acquired_at = now_millis();

        let id_token = response.id_token.as_deref().ok_or_else(|| {
            Error::InvalidResponse("code exchange response has no id_token".into())
        })?;
        let claims = self.identify(id_token).await?;

        debug!(subject = %claims.subject_id, expires_in = response.expires_in, "code exchanged");
        response.into_credential(claims, acquired_at)
    }

    /// Refresh an expired credential.
    ///
    /// Returns the complete replacement credential; the caller persists it
    /// in one write.
    #[instrument(skip_all, fields(subject = %previous.subject_id))]
    pub async fn refresh(&self, previous: &Credential) -> Result<Credential> {
        let response = self
            .request_tokens(Grant::RefreshToken(&previous.refresh_token))
            .await?;
        let acquired_at = now_millis();

        let claims = match response.id_token.as_deref() {
            Some(id_token) => Some(self.identify(id_token).await?),
            None => None,
        };

        debug!(
            rotated = response.refresh_token.is_some(),
            expires_in = response.expires_in,
            "token refreshed"
        );
        Ok(response.into_refreshed(previous, claims, acquired_at))
    }

    /// Revoke one token, best-effort.
    ///
    /// Failures are logged and counted, never returned: once the local session
    /// is cleared there is nothing a caller could do about them.
    pub async fn revoke(&self, token: &str, kind: TokenKind) {
        match self.try_revoke(token).await {
            Ok(()) => {
                info!(token = kind.label(), "token revoked");
                metrics::counter!("auth_token_revocation_total", "token" => kind.label(), "outcome" => "success")
                    .increment(1);
            }
            Err(e) => {
                warn!(token = kind.label(), error = %e, "token revocation failed, continuing");
                metrics::counter!("auth_token_revocation_total", "token" => kind.label(), "outcome" => "failure")
                    .increment(1);
            }
        }
    }

    async fn try_revoke(&self, token: &str) -> Result<()> {
        let response = self
            .http
            .get(&self.endpoints.revoke)
            .query(&[("token", token)])
            .send()
            .await
            .map_err(|e| Error::Revocation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::Revocation(format!(
                "revocation endpoint returned {status}: {body}"
            )));
        }
        Ok(())
    }

    async fn identify(&self, id_token: &str) -> Result<IdentityClaims> {
        self.verifier
            .verify(id_token)
            .await
            .map_err(|reason| Error::MalformedToken(format!("verification failed: {reason}")))?;
        id_token::decode(id_token)
    }

    async fn request_tokens(&self, grant: Grant<'_>) -> Result<TokenResponse> {
        let grant_type = grant.grant_type();
        let (field, value) = match grant {
            Grant::AuthorizationCode(code) => ("code", code),
            Grant::RefreshToken(refresh) => ("refresh_token", refresh),
        };

        let response = self
            .http
            .post(&self.endpoints.token)
            .form(&[
                (field, value),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.expose().as_str()),
                ("grant_type", grant_type),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("{grant_type} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::InvalidResponse(format!("{grant_type} response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockProvider, id_token, token_body};
    use std::future::Future;
    use std::pin::Pin;

    fn client_for(provider: &MockProvider) -> TokenClient {
        TokenClient::new(
            reqwest::Client::new(),
            ClientCredentials::new("client-123", "secret-456", "https://app.example/auth/callback"),
            provider.endpoints(),
        )
    }

    fn stored(refresh: &str) -> Credential {
        Credential {
            subject_id: "sub-1".into(),
            email: "ada@example.com".into(),
            access_token: "T0".into(),
            refresh_token: refresh.into(),
            expiration: 1,
            profile: Some(serde_json::json!({"name": "Ada"})),
        }
    }

    #[test]
    fn token_response_tolerates_missing_optional_fields() {
        let json = r#"{"access_token":"T2","expires_in":3600,"token_type":"Bearer"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "T2");
        assert!(token.refresh_token.is_none());
        assert!(token.id_token.is_none());
    }

    #[test]
    fn into_refreshed_keeps_prior_refresh_token_and_profile() {
        let previous = stored("R1");
        let response = TokenResponse {
            access_token: "T2".into(),
            expires_in: 3600,
            refresh_token: None,
            id_token: None,
        };
        let refreshed = response.into_refreshed(&previous, None, 1_000);
        assert_eq!(refreshed.access_token, "T2");
        assert_eq!(refreshed.refresh_token, "R1");
        assert_eq!(refreshed.expiration, 1_000 + 3_600_000);
        assert_eq!(refreshed.profile, previous.profile);
        assert_eq!(refreshed.subject_id, "sub-1");
    }

    #[test]
    fn into_refreshed_takes_rotated_refresh_token() {
        let response = TokenResponse {
            access_token: "T2".into(),
            expires_in: 60,
            refresh_token: Some("R2".into()),
            id_token: None,
        };
        assert_eq!(response.into_refreshed(&stored("R1"), None, 0).refresh_token, "R2");
    }

    #[test]
    fn into_credential_requires_refresh_token() {
        let response = TokenResponse {
            access_token: "T1".into(),
            expires_in: 60,
            refresh_token: None,
            id_token: None,
        };
        let claims = IdentityClaims {
            subject_id: "s".into(),
            email: String::new(),
        };
        let err = response.into_credential(claims, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn exchange_code_builds_credential() {
        let provider = MockProvider::start().await;
        provider.on_exchange(
            200,
            token_body("T1", 3600, Some("R1"), Some(&id_token("sub-abc", "ada@example.com"))),
        );

        let before = now_millis();
        let credential = client_for(&provider).exchange_code("abc").await.unwrap();
        let after = now_millis();

        assert_eq!(credential.access_token, "T1");
        assert_eq!(credential.refresh_token, "R1");
        assert_eq!(credential.subject_id, "sub-abc");
        assert_eq!(credential.email, "ada@example.com");
        assert!(credential.profile.is_none());
        assert!(credential.expiration >= before + 3_600_000);
        assert!(credential.expiration <= after + 3_600_000);
    }

    #[tokio::test]
    async fn exchange_sends_exact_form_fields() {
        let provider = MockProvider::start().await;
        provider.on_exchange(200, token_body("T1", 3600, Some("R1"), Some(&id_token("s", "e"))));

        client_for(&provider).exchange_code("abc").await.unwrap();

        let requests = provider.token_requests();
        assert_eq!(requests.len(), 1);
        let form = &requests[0];
        assert_eq!(form.len(), 5, "unexpected fields: {form:?}");
        assert_eq!(form["code"], "abc");
        assert_eq!(form["client_id"], "client-123");
        assert_eq!(form["client_secret"], "secret-456");
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["redirect_uri"], "https://app.example/auth/callback");
    }

    #[tokio::test]
    async fn exchange_non_success_carries_status_and_body() {
        let provider = MockProvider::start().await;
        provider.on_exchange(401, serde_json::json!({"error": "invalid_client"}));

        let err = client_for(&provider).exchange_code("abc").await.unwrap_err();
        match err {
            Error::TokenExchange { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid_client"), "body: {body}");
            }
            other => panic!("expected TokenExchange, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exchange_with_undecodable_id_token_is_malformed() {
        let provider = MockProvider::start().await;
        provider.on_exchange(200, token_body("T1", 3600, Some("R1"), Some("garbage")));

        let err = client_for(&provider).exchange_code("abc").await.unwrap_err();
        assert!(matches!(err, Error::MalformedToken(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn exchange_against_dead_endpoint_is_http_error() {
        let endpoints = Endpoints {
            token: "http://127.0.0.1:1/token".into(),
            ..Endpoints::default()
        };
        let client = TokenClient::new(
            reqwest::Client::new(),
            ClientCredentials::new("c", "s", "https://app.example/cb"),
            endpoints,
        );
        let err = client.exchange_code("abc").await.unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn refresh_sends_refresh_grant_and_keeps_refresh_token() {
        let provider = MockProvider::start().await;
        provider.on_refresh(200, token_body("T2", 3600, None, None));

        let previous = stored("R1");
        let refreshed = client_for(&provider).refresh(&previous).await.unwrap();
        assert_eq!(refreshed.access_token, "T2");
        assert_eq!(refreshed.refresh_token, "R1");
        assert_eq!(refreshed.profile, previous.profile);

        let form = &provider.token_requests()[0];
        assert_eq!(form.len(), 5, "unexpected fields: {form:?}");
        assert_eq!(form["refresh_token"], "R1");
        assert_eq!(form["grant_type"], "refresh_token");
        assert_eq!(form["redirect_uri"], "https://app.example/auth/callback");
    }

    #[tokio::test]
    async fn refresh_rejection_is_token_exchange_error() {
        let provider = MockProvider::start().await;
        provider.on_refresh(400, serde_json::json!({"error": "invalid_grant"}));

        let err = client_for(&provider).refresh(&stored("R1")).await.unwrap_err();
        assert!(
            matches!(err, Error::TokenExchange { status: 400, .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn revoke_sends_token_query_parameter() {
        let provider = MockProvider::start().await;
        let client = client_for(&provider);

        client.revoke("T1", TokenKind::Access).await;
        client.revoke("R1", TokenKind::Refresh).await;

        assert_eq!(provider.revoked_tokens(), vec!["T1", "R1"]);
    }

    #[tokio::test]
    async fn revoke_swallows_failures() {
        let provider = MockProvider::start().await;
        provider.on_revoke(500);
        // Returns () regardless; nothing to assert beyond not panicking and
        // the request having been made.
        client_for(&provider).revoke("T1", TokenKind::Access).await;
        assert_eq!(provider.revoked_tokens(), vec!["T1"]);

        let dead = TokenClient::new(
            reqwest::Client::new(),
            ClientCredentials::new("c", "s", "https://app.example/cb"),
            Endpoints {
                revoke: "http://127.0.0.1:1/revoke".into(),
                ..Endpoints::default()
            },
        );
        dead.revoke("T1", TokenKind::Access).await;
    }

    struct RejectAll;

    impl IdTokenVerifier for RejectAll {
        fn verify<'a>(
            &'a self,
            _id_token: &'a str,
        ) -> Pin<Box<dyn Future<Output = std::result::Result<(), String>> + Send + 'a>> {
            Box::pin(async { Err("untrusted issuer".to_string()) })
        }
    }

    #[tokio::test]
    async fn custom_verifier_can_reject_identity_token() {
        let provider = MockProvider::start().await;
        provider.on_exchange(200, token_body("T1", 3600, Some("R1"), Some(&id_token("s", "e"))));

        let client = client_for(&provider).with_verifier(Arc::new(RejectAll));
        let err = client.exchange_code("abc").await.unwrap_err();
        assert!(err.to_string().contains("untrusted issuer"), "got: {err}");
    }
}
