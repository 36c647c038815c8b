//! Provider endpoint defaults
//!
//! The deployment targets Google's OAuth2 endpoints unless the config file
//! overrides them. None of these values are secrets.

/// Consent page the browser is redirected to
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Token endpoint for code exchange and refresh (form-encoded POST)
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Revocation endpoint (GET with `token` query parameter)
pub const REVOKE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/revoke";

/// Extended profile endpoint (GET with bearer authorization)
pub const PROFILE_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Scopes requested on the consent page. `openid email` is what puts `sub`
/// and `email` into the identity token.
pub const DEFAULT_SCOPES: &str = "openid email profile";
