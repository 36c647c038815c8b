//! In-process mock identity provider for tests
//!
//! Serves `/authorize`, `/token`, `/revoke` and `/profile` on an ephemeral
//! localhost port, answers with canned replies, and records every request so
//! tests can assert on what was (or was not) sent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Form, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tokio::net::TcpListener;

use crate::config::Endpoints;

#[derive(Clone)]
struct Reply {
    status: u16,
    body: String,
}

impl Reply {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, "application/json")], self.body).into_response()
    }
}

struct MockState {
    exchange: Mutex<Reply>,
    refresh: Mutex<Reply>,
    revoke: Mutex<Reply>,
    profile: Mutex<Reply>,
    token_requests: Mutex<Vec<HashMap<String, String>>>,
    revoked: Mutex<Vec<String>>,
    profile_requests: Mutex<Vec<String>>,
}

/// Handle to a running mock provider. The server lives until the test's
/// runtime shuts down.
pub struct MockProvider {
    base_url: String,
    state: Arc<MockState>,
}

impl MockProvider {
    /// Bind to `127.0.0.1:0` and start serving.
    ///
    /// Until configured, token requests fail with `400 invalid_grant`,
    /// revocations succeed and the profile endpoint returns `{}`.
    pub async fn start() -> Self {
        let invalid_grant = Reply::json(400, serde_json::json!({"error": "invalid_grant"}));
        let state = Arc::new(MockState {
            exchange: Mutex::new(invalid_grant.clone()),
            refresh: Mutex::new(invalid_grant),
            revoke: Mutex::new(Reply::json(200, serde_json::json!({}))),
            profile: Mutex::new(Reply::json(200, serde_json::json!({}))),
            token_requests: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
            profile_requests: Mutex::new(Vec::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = axum::Router::new()
            .route("/authorize", get(|| async { "consent page" }))
            .route("/token", post(token))
            .route("/revoke", get(revoke))
            .route("/profile", get(profile))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// Endpoints pointing at this mock.
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            authorize: format!("{}/authorize", self.base_url),
            token: format!("{}/token", self.base_url),
            revoke: format!("{}/revoke", self.base_url),
            profile: format!("{}/profile", self.base_url),
        }
    }

    pub fn on_exchange(&self, status: u16, body: serde_json::Value) {
        *self.state.exchange.lock().unwrap() = Reply::json(status, body);
    }

    pub fn on_refresh(&self, status: u16, body: serde_json::Value) {
        *self.state.refresh.lock().unwrap() = Reply::json(status, body);
    }

    pub fn on_revoke(&self, status: u16) {
        *self.state.revoke.lock().unwrap() = Reply::json(status, serde_json::json!({}));
    }

    /// Profile reply with a raw body, so tests can serve non-JSON.
    pub fn on_profile(&self, status: u16, body: impl Into<String>) {
        *self.state.profile.lock().unwrap() = Reply {
            status,
            body: body.into(),
        };
    }

    /// Form fields of every token endpoint request, in arrival order.
    pub fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.state.token_requests.lock().unwrap().clone()
    }

    /// `token` query values of every revocation request, in arrival order.
    pub fn revoked_tokens(&self) -> Vec<String> {
        self.state.revoked.lock().unwrap().clone()
    }

    /// `Authorization` header of every profile request, in arrival order.
    pub fn profile_requests(&self) -> Vec<String> {
        self.state.profile_requests.lock().unwrap().clone()
    }

    /// Total requests received on the token, revoke and profile endpoints.
    pub fn request_count(&self) -> usize {
        self.token_requests().len() + self.revoked_tokens().len() + self.profile_requests().len()
    }
}

async fn token(
    State(state): State<Arc<MockState>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Reply {
    let reply = match fields.get("grant_type").map(String::as_str) {
        Some("refresh_token") => state.refresh.lock().unwrap().clone(),
        _ => state.exchange.lock().unwrap().clone(),
    };
    state.token_requests.lock().unwrap().push(fields);
    reply
}

async fn revoke(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    state
        .revoked
        .lock()
        .unwrap()
        .push(params.get("token").cloned().unwrap_or_default());
    state.revoke.lock().unwrap().clone()
}

async fn profile(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.profile_requests.lock().unwrap().push(authorization);
    state.profile.lock().unwrap().clone()
}

/// Unsigned identity token carrying `sub` and `email`.
pub fn id_token(sub: &str, email: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({"iss": "https://accounts.google.com", "sub": sub, "email": email})
            .to_string(),
    );
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Token endpoint response body.
pub fn token_body(
    access_token: &str,
    expires_in: u64,
    refresh_token: Option<&str>,
    id_token: Option<&str>,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": access_token,
        "expires_in": expires_in,
        "token_type": "Bearer",
    });
    if let Some(refresh) = refresh_token {
        body["refresh_token"] = refresh.into();
    }
    if let Some(id) = id_token {
        body["id_token"] = id.into();
    }
    body
}
