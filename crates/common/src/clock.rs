//! Wall-clock helper
//!
//! Credential expirations are absolute unix timestamps in milliseconds. All
//! crates read the clock through this one function so the unit never drifts.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in milliseconds.
///
/// A clock set before 1970 reads as 0, which makes every stored credential
/// look expired rather than panicking.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
