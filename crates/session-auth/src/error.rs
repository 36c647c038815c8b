//! Error types for session lifecycle operations

/// Errors surfaced to the request that triggered them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Callback arrived without an authorization code.
    #[error("authorization code missing from callback")]
    MissingAuthCode,

    /// Exchange, refresh, identity decoding or profile retrieval failed.
    #[error(transparent)]
    Provider(#[from] oauth_client::Error),

    #[error("session store error: {0}")]
    Store(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
