//! Session-bound credential and its request-scoped projection
//!
//! A `Credential` is what the session store keeps between requests. A
//! `ProjectedIdentity` is the read-only view handed to route handlers; it is
//! rebuilt from the stored credential on every request and never written back.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Provider-issued tokens plus the identity they were issued for.
///
/// `expiration` is a unix timestamp in milliseconds (absolute, not a delta),
/// computed once when the tokens are acquired and again on each refresh.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Provider's stable subject identifier (`sub` claim)
    pub subject_id: String,
    /// Provider-asserted email, not signature-verified
    pub email: String,
    /// Bearer token for provider API calls
    pub access_token: String,
    /// Best known refresh token; kept when a refresh response omits one
    pub refresh_token: String,
    /// Expiration as unix timestamp in milliseconds
    pub expiration: u64,
    /// Extended profile, set once and carried across refreshes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<serde_json::Value>,
}

impl Credential {
    /// Whether the access token is still usable at `now_millis`.
    ///
    /// A credential expiring exactly now counts as expired.
    pub fn is_fresh_at(&self, now_millis: u64) -> bool {
        self.expiration > now_millis
    }

    /// Build the request-scoped view of this credential.
    pub fn project(&self) -> ProjectedIdentity {
        ProjectedIdentity {
            id: self.subject_id.clone(),
            email: self.email.clone(),
            access_token: self.access_token.clone(),
            profile: self.profile.clone(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("subject_id", &self.subject_id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expiration", &self.expiration)
            .field("profile", &self.profile.is_some())
            .finish()
    }
}

/// Identity of the signed-in user for the duration of one request.
///
/// The access token is available to handlers that call provider APIs on the
/// user's behalf but is never serialized into responses.
#[derive(Clone, PartialEq, Serialize)]
pub struct ProjectedIdentity {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<serde_json::Value>,
}

impl fmt::Debug for ProjectedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectedIdentity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .field("profile", &self.profile)
            .finish()
    }
}

/// Absolute expiration for a token acquired at `acquired_at_millis` with a
/// provider-declared lifetime of `expires_in_secs`.
pub fn expiration_from(acquired_at_millis: u64, expires_in_secs: u64) -> u64 {
    acquired_at_millis.saturating_add(expires_in_secs.saturating_mul(1000))
}
