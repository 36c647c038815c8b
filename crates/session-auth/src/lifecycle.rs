//! Credential lifecycle state machine
//!
//! Each session is in one of three states, derived on every read rather than
//! stored:
//!
//! - `NoCredential` → `Fresh`     successful code exchange
//! - `Fresh` → `Expired`          wall clock passes `expiration` (no write)
//! - `Expired` → `Fresh`          successful refresh, full credential rewritten
//! - any → `NoCredential`         sign-out
//!
//! A failed refresh is not a transition: the stale credential stays in the
//! session so the next request can try again, and the error goes back to the
//! caller. No operation here retries on its own.

use std::sync::Arc;

use common::now_millis;
use oauth_client::{Credential, ProfileFetcher, ProjectedIdentity, TokenClient, TokenKind};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::store::SessionStore;

/// Validity of a session's credential at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialState {
    NoCredential,
    Fresh(Credential),
    Expired(Credential),
}

impl CredentialState {
    /// Classify a stored credential against `now_millis`.
    pub fn classify(credential: Option<Credential>, now_millis: u64) -> Self {
        match credential {
            None => CredentialState::NoCredential,
            Some(c) if c.is_fresh_at(now_millis) => CredentialState::Fresh(c),
            Some(c) => CredentialState::Expired(c),
        }
    }

    /// State label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CredentialState::NoCredential => "no_credential",
            CredentialState::Fresh(_) => "fresh",
            CredentialState::Expired(_) => "expired",
        }
    }
}

/// Outcome of gating a request on its session credential.
#[derive(Debug, Clone, PartialEq)]
pub enum Authentication {
    Authenticated(ProjectedIdentity),
    /// No credential in the session; the request must be rejected.
    Unauthenticated,
}

/// Drives code exchange, request-time refresh and sign-out for sessions
/// held in a `SessionStore`.
///
/// Holds no per-session state of its own; everything lives in the store.
pub struct CredentialLifecycle {
    store: Arc<dyn SessionStore>,
    tokens: TokenClient,
    profiles: Option<ProfileFetcher>,
}

impl CredentialLifecycle {
    /// Lifecycle without profile retrieval.
    pub fn new(store: Arc<dyn SessionStore>, tokens: TokenClient) -> Self {
        Self {
            store,
            tokens,
            profiles: None,
        }
    }

    /// Enable profile retrieval after each code exchange.
    pub fn with_profiles(mut self, profiles: ProfileFetcher) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn tokens(&self) -> &TokenClient {
        &self.tokens
    }

    pub fn profiles_enabled(&self) -> bool {
        self.profiles.is_some()
    }

    /// Current state of a session, read from the store.
    pub async fn state(&self, session_id: &str) -> Result<CredentialState> {
        let stored = self.store.get(session_id).await?;
        Ok(CredentialState::classify(stored, now_millis()))
    }

    /// Decide whether a request may proceed.
    ///
    /// `Fresh` and `NoCredential` are answered from the store alone. `Expired`
    /// triggers a refresh; the refreshed credential is written back in one
    /// `set` only after the exchange fully succeeded. A refresh failure is
    /// returned as an error, never as `Unauthenticated`.
    #[instrument(skip_all, fields(session = %session_tag(session_id)))]
    pub async fn authenticate_request(&self, session_id: &str) -> Result<Authentication> {
        let state = self.state(session_id).await?;
        metrics::counter!("auth_request_decisions_total", "decision" => state.label()).increment(1);

        match state {
            CredentialState::NoCredential => {
                debug!("no credential in session");
                Ok(Authentication::Unauthenticated)
            }
            CredentialState::Fresh(credential) => {
                Ok(Authentication::Authenticated(credential.project()))
            }
            CredentialState::Expired(credential) => {
                debug!(subject = %credential.subject_id, "credential expired, refreshing");
                let refreshed = match self.tokens.refresh(&credential).await {
                    Ok(refreshed) => refreshed,
                    Err(e) => {
                        warn!(error = %e, "token refresh failed, stored credential left in place");
                        metrics::counter!("auth_token_refresh_total", "outcome" => "failure")
                            .increment(1);
                        return Err(e.into());
                    }
                };
                metrics::counter!("auth_token_refresh_total", "outcome" => "success").increment(1);

                let identity = refreshed.project();
                self.store.set(session_id, refreshed).await?;
                info!(subject = %identity.id, "credential refreshed");
                Ok(Authentication::Authenticated(identity))
            }
        }
    }

    /// Complete the callback: exchange `code`, store the credential, and
    /// attach the profile when enabled.
    ///
    /// A missing or blank code fails before any provider call. When profile
    /// retrieval fails the credential has already been stored; the session
    /// stays signed in but the operation still reports the failure.
    #[instrument(skip_all, fields(session = %session_tag(session_id)))]
    pub async fn complete_code_exchange(
        &self,
        session_id: &str,
        code: Option<&str>,
    ) -> Result<ProjectedIdentity> {
        let code = code
            .filter(|c| !c.trim().is_empty())
            .ok_or(Error::MissingAuthCode)?;

        let mut credential = match self.tokens.exchange_code(code).await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "code exchange failed");
                metrics::counter!("auth_token_exchange_total", "outcome" => "failure")
                    .increment(1);
                return Err(e.into());
            }
        };
        metrics::counter!("auth_token_exchange_total", "outcome" => "success").increment(1);

        self.store.set(session_id, credential.clone()).await?;
        info!(subject = %credential.subject_id, "credential stored in session");

        if let Some(profiles) = &self.profiles {
            let profile = profiles.fetch(&credential.access_token).await.map_err(|e| {
                warn!(error = %e, "profile fetch failed after credential was stored");
                e
            })?;
            credential.profile = Some(profile);
            self.store.set(session_id, credential.clone()).await?;
            debug!("profile attached to credential");
        }

        Ok(credential.project())
    }

    /// Sign the session out.
    ///
    /// The session credential is cleared first and unconditionally; then the
    /// access and refresh tokens are revoked concurrently. Store and
    /// revocation failures are logged only.
    #[instrument(skip_all, fields(session = %session_tag(session_id)))]
    pub async fn sign_out(&self, session_id: &str) {
        let stored = self.store.get(session_id).await.unwrap_or_else(|e| {
            warn!(error = %e, "could not read session credential before sign-out");
            None
        });

        if let Err(e) = self.store.delete(session_id).await {
            warn!(error = %e, "failed to clear session credential");
        }

        let Some(credential) = stored else {
            debug!("sign-out on session without credential");
            return;
        };

        tokio::join!(
            self.tokens.revoke(&credential.access_token, TokenKind::Access),
            self.tokens.revoke(&credential.refresh_token, TokenKind::Refresh),
        );
        info!(subject = %credential.subject_id, "signed out");
    }
}

/// Short, log-safe prefix of a session id.
fn session_tag(session_id: &str) -> &str {
    session_id.get(..8).unwrap_or(session_id)
}
