//! Session cookie handling
//!
//! The cookie only carries an opaque session id; credentials stay server-side
//! in the session store.

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

/// Session cookie settings shared by all auth routes.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
}

/// Session id carried by the request, if any.
pub fn session_id(jar: &CookieJar, settings: &CookieSettings) -> Option<String> {
    jar.get(&settings.name)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty())
}

/// New random session id. Ids offered by the client are never adopted.
pub fn mint_session_id() -> String {
    uuid::Uuid::new_v4().as_simple().to_string()
}

/// Point the session cookie at `session_id`.
pub fn issue_session(jar: CookieJar, settings: &CookieSettings, session_id: &str) -> CookieJar {
    jar.add(session_cookie(settings, session_id))
}

/// Expire the session cookie.
pub fn clear_session(jar: CookieJar, settings: &CookieSettings) -> CookieJar {
    jar.remove(Cookie::build((settings.name.clone(), "")).path("/"))
}

fn session_cookie(settings: &CookieSettings, session_id: &str) -> Cookie<'static> {
    Cookie::build((settings.name.clone(), session_id.to_owned()))
        .http_only(true)
        .secure(settings.secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::http::header::COOKIE;

    fn settings() -> CookieSettings {
        CookieSettings {
            name: "sid".into(),
            secure: true,
        }
    }

    fn jar_with(cookie: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie.parse().unwrap());
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn reads_existing_session() {
        let jar = jar_with("other=1; sid=abc123");
        assert_eq!(session_id(&jar, &settings()).as_deref(), Some("abc123"));
    }

    #[test]
    fn empty_cookie_is_no_session() {
        let jar = jar_with("sid=");
        assert_eq!(session_id(&jar, &settings()), None);
    }

    #[test]
    fn issue_session_replaces_client_cookie() {
        let jar = issue_session(jar_with("sid=abc123"), &settings(), "fresh-id");
        assert_eq!(jar.get("sid").unwrap().value(), "fresh-id");
    }

    #[test]
    fn issued_cookie_is_hardened() {
        let id = mint_session_id();
        assert_eq!(id.len(), 32);
        let jar = issue_session(CookieJar::new(), &settings(), &id);

        let cookie = jar.get("sid").unwrap();
        assert_eq!(cookie.value(), id);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn minted_ids_are_unique() {
        assert_ne!(mint_session_id(), mint_session_id());
    }

    #[test]
    fn clear_session_drops_cookie() {
        let jar = clear_session(jar_with("sid=abc123"), &settings());
        assert!(jar.get("sid").is_none());
    }
}
