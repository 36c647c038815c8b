//! Error types for identity provider calls

/// Errors from token exchange, refresh, revocation and profile calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure talking to the token endpoint.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("malformed identity token: {0}")]
    MalformedToken(String),

    #[error("profile fetch failed: {0}")]
    ProfileFetch(String),

    /// Only ever logged; revocation failures never reach a caller.
    #[error("token revocation failed: {0}")]
    Revocation(String),

    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
}

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;
