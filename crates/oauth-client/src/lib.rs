//! OAuth2 authorization-code client for a single identity provider
//!
//! Covers every outbound call the session layer makes to the provider. This
//! crate holds no session state; it turns provider responses into
//! `Credential` values and leaves storage to the caller.
//!
//! Credential flow:
//! 1. Browser is sent to `authorize::build_authorization_url()`
//! 2. Callback hands the code to `TokenClient::exchange_code()`
//! 3. `id_token::decode()` pulls subject and email out of the identity token
//! 4. Optional `ProfileFetcher::fetch()` attaches extended profile data
//! 5. Expired credentials go through `TokenClient::refresh()`
//! 6. Sign-out calls `TokenClient::revoke()` once per token, best-effort

pub mod authorize;
pub mod config;
pub mod constants;
pub mod credential;
pub mod error;
pub mod id_token;
pub mod profile;
pub mod token;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use authorize::build_authorization_url;
pub use config::{ClientCredentials, Endpoints};
pub use credential::{Credential, ProjectedIdentity, expiration_from};
pub use error::{Error, Result};
pub use id_token::{ChannelTrust, IdTokenVerifier, IdentityClaims};
pub use profile::ProfileFetcher;
pub use token::{TokenClient, TokenKind, TokenResponse};
