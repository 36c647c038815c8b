//! Session-bound credential lifecycle
//!
//! Decides, per request, whether the credential stored in a session is fresh,
//! expired or absent, refreshes it when needed, and projects it into the
//! identity route handlers see. Also drives the callback (code exchange) and
//! sign-out flows. Storage is delegated to a `SessionStore` implementation
//! owned by the host.
//!
//! Session lifecycle:
//! 1. Callback → `complete_code_exchange()` stores a credential → `Fresh`
//! 2. Wall clock passes `expiration` → `Expired` (no write involved)
//! 3. Next protected request → `authenticate_request()` refreshes → `Fresh`
//! 4. Failed refresh → error surfaced, stored credential left as-is
//! 5. `sign_out()` from any state → `NoCredential`, tokens revoked best-effort

pub mod error;
pub mod lifecycle;
pub mod store;

pub use error::{Error, Result};
pub use lifecycle::{Authentication, CredentialLifecycle, CredentialState};
pub use store::{MemorySessionStore, SessionStore};
