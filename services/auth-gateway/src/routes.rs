//! Auth routes and the protecting middleware
//!
//! - `GET|POST /auth/callback`: exchange the authorization code for the session
//! - `GET|POST /auth/signout`: revoke and clear the session credential
//! - `GET /auth/login`: redirect to the provider consent page
//! - `GET /me`: projected identity of the signed-in user (protected)

use axum::Json;
use axum::extract::{Extension, FromRequest, Query, Request, State};
use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, body::Body};
use axum_extra::extract::CookieJar;
use oauth_client::{ProjectedIdentity, build_authorization_url};
use serde::Deserialize;
use session_auth::{Authentication, SessionStore};
use tracing::{Instrument, info_span, warn};

use crate::AppState;
use crate::error::ApiError;
use crate::session;

/// Callback parameters, from the query string or the request body.
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

/// Extract the authorization code: query `code` first, then a JSON or
/// form-encoded POST body.
async fn callback_code(request: Request<Body>) -> Option<String> {
    if let Ok(Query(params)) = Query::<CallbackParams>::try_from_uri(request.uri()) {
        if params.code.is_some() {
            return params.code;
        }
    }

    if request.method() != Method::POST {
        return None;
    }

    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));

    if is_json {
        Json::<CallbackParams>::from_request(request, &())
            .await
            .ok()
            .and_then(|Json(p)| p.code)
    } else {
        Form::<CallbackParams>::from_request(request, &())
            .await
            .ok()
            .and_then(|Form(p)| p.code)
    }
}

fn request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

/// Complete the authorization-code flow.
///
/// The credential is always bound to a freshly minted session id; a session
/// id offered by the client is discarded along with anything stored under
/// it. The cookie is issued whenever a credential ended up stored, including
/// a failed profile fetch after the credential was persisted, and never
/// otherwise.
pub(crate) async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request<Body>,
) -> Response {
    let span = info_span!("callback", request_id = %request_id());
    async move {
        let code = callback_code(request).await;
        let previous = session::session_id(&jar, &state.cookies);
        let session_id = session::mint_session_id();

        let outcome = state
            .auth
            .complete_code_exchange(&session_id, code.as_deref())
            .await;

        let bound = match &outcome {
            Ok(_) => true,
            Err(_) => matches!(state.sessions.get(&session_id).await, Ok(Some(_))),
        };

        let jar = if bound {
            if let Some(previous) = previous {
                if let Err(e) = state.sessions.delete(&previous).await {
                    warn!(error = %e, "failed to discard previous session");
                }
            }
            session::issue_session(jar, &state.cookies, &session_id)
        } else {
            jar
        };

        match outcome {
            Ok(identity) => (jar, Json(identity)).into_response(),
            Err(e) => (jar, ApiError::from(e)).into_response(),
        }
    }
    .instrument(span)
    .await
}

/// Sign out and expire the session cookie. Always succeeds.
pub(crate) async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(session_id) = session::session_id(&jar, &state.cookies) {
        state
            .auth
            .sign_out(&session_id)
            .instrument(info_span!("sign_out", request_id = %request_id()))
            .await;
    }

    (
        session::clear_session(jar, &state.cookies),
        Json(serde_json::json!({ "status": "signed_out" })),
    )
}

/// Redirect the browser to the provider's consent page.
pub(crate) async fn login(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let tokens = state.auth.tokens();
    let url = build_authorization_url(
        tokens.credentials(),
        tokens.endpoints(),
        &state.scopes,
        None,
    )?;
    Ok(Redirect::to(&url))
}

/// Identity of the signed-in user.
pub(crate) async fn me(Extension(identity): Extension<ProjectedIdentity>) -> Json<ProjectedIdentity> {
    Json(identity)
}

/// Reject requests without a session credential; refresh expired ones.
///
/// On success the `ProjectedIdentity` is placed in request extensions for
/// downstream handlers. A failed refresh is reported as a provider error and
/// never as 401, so the client can tell "signed out" from "provider down".
pub(crate) async fn require_credential(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(session_id) = session::session_id(&jar, &state.cookies) else {
        return Err(ApiError::Unauthenticated);
    };

    let outcome = state
        .auth
        .authenticate_request(&session_id)
        .instrument(info_span!("authenticate", request_id = %request_id()))
        .await
        .map_err(ApiError::Refresh)?;

    match outcome {
        Authentication::Authenticated(identity) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Authentication::Unauthenticated => Err(ApiError::Unauthenticated),
    }
}
