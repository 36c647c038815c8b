//! Session store contract and in-memory reference implementation
//!
//! The host owns session storage. The lifecycle manager only needs three
//! operations keyed by an opaque session id, each atomic on its own. Nothing
//! here assumes exclusive access across calls: two requests may read the same
//! credential, refresh independently, and both write back.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use oauth_client::Credential;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;

/// Key-value storage of one credential per session.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn SessionStore>`).
pub trait SessionStore: Send + Sync {
    /// Credential stored for the session, if any.
    fn get<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Credential>>> + Send + 'a>>;

    /// Store (or replace) the session's credential as a whole.
    fn set<'a>(
        &'a self,
        session_id: &'a str,
        credential: Credential,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Remove the session's credential. Removing an absent one is not an error.
    fn delete<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Process-local session store.
///
/// The `RwLock` is held only for the duration of a single map operation, so
/// readers never wait on a provider round-trip.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Credential>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently holding a credential.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn get<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Credential>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.sessions.read().await.get(session_id).cloned()) })
    }

    fn set<'a>(
        &'a self,
        session_id: &'a str,
        credential: Credential,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.sessions
                .write()
                .await
                .insert(session_id.to_string(), credential);
            debug!("stored session credential");
            Ok(())
        })
    }

    fn delete<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if self.sessions.write().await.remove(session_id).is_some() {
                debug!("removed session credential");
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn credential(access: &str) -> Credential {
        Credential {
            subject_id: "sub".into(),
            email: "ada@example.com".into(),
            access_token: access.into(),
            refresh_token: "R".into(),
            expiration: 0,
            profile: None,
        }
    }

    #[tokio::test]
    async fn set_get_delete() {
        let store = MemorySessionStore::new();
        assert!(store.get("s1").await.unwrap().is_none());

        store.set("s1", credential("T1")).await.unwrap();
        assert_eq!(store.get("s1").await.unwrap().unwrap().access_token, "T1");
        assert_eq!(store.len().await, 1);

        store.delete("s1").await.unwrap();
        assert!(store.get("s1").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn delete_absent_is_ok() {
        let store = MemorySessionStore::new();
        assert!(store.delete("never-existed").await.is_ok());
    }

    #[tokio::test]
    async fn set_replaces_whole_credential() {
        let store = MemorySessionStore::new();
        store.set("s1", credential("T1")).await.unwrap();
        store.set("s1", credential("T2")).await.unwrap();
        assert_eq!(store.get("s1").await.unwrap().unwrap().access_token, "T2");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = MemorySessionStore::new();
        store.set("a", credential("TA")).await.unwrap();
        store.set("b", credential("TB")).await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.get("b").await.unwrap().unwrap().access_token, "TB");
    }

    #[tokio::test]
    async fn concurrent_writes_dont_corrupt() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());

        let mut handles = vec![];
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set("shared", credential(&format!("T{i}")))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // Last writer wins, but whatever is stored is one complete credential
        let stored = store.get("shared").await.unwrap().unwrap();
        assert!(stored.access_token.starts_with('T'));
        assert_eq!(stored.refresh_token, "R");
    }
}
