//! HTTP error responses
//!
//! Every failure leaves the gateway as `{"error":{"type":...,"message":...}}`
//! except a rejected token request, which passes the provider's own body
//! through to the caller. On the callback the provider status is kept too.
//! On a protected route a provider 401/403 becomes 502, so that 401 always
//! means "no credential in session".

use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

/// Request-level failure of an auth route or the protecting middleware.
#[derive(Debug)]
pub enum ApiError {
    /// No credential bound to the session
    Unauthenticated,
    Auth(session_auth::Error),
    /// Failure while authenticating a protected request (store read or refresh)
    Refresh(session_auth::Error),
}

impl From<session_auth::Error> for ApiError {
    fn from(e: session_auth::Error) -> Self {
        ApiError::Auth(e)
    }
}

impl From<oauth_client::Error> for ApiError {
    fn from(e: oauth_client::Error) -> Self {
        ApiError::Auth(e.into())
    }
}

fn classify(e: &session_auth::Error) -> (StatusCode, &'static str) {
    match e {
        session_auth::Error::MissingAuthCode => (StatusCode::BAD_REQUEST, "missing_auth_code"),
        session_auth::Error::Store(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "session_store_error")
        }
        session_auth::Error::Provider(e) => match e {
            oauth_client::Error::TokenExchange { status, .. } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                "token_exchange_failed",
            ),
            oauth_client::Error::ProfileFetch(_) => {
                (StatusCode::BAD_GATEWAY, "profile_fetch_failed")
            }
            oauth_client::Error::InvalidEndpoint(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
            _ => (StatusCode::BAD_GATEWAY, "provider_error"),
        },
    }
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "authentication_error"),
            ApiError::Auth(e) => classify(e),
            ApiError::Refresh(e) => match classify(e) {
                (status, error_type)
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
                {
                    (StatusCode::BAD_GATEWAY, error_type)
                }
                other => other,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();

        if let ApiError::Auth(session_auth::Error::Provider(
            oauth_client::Error::TokenExchange { body, .. },
        ))
        | ApiError::Refresh(session_auth::Error::Provider(
            oauth_client::Error::TokenExchange { body, .. },
        )) = &self
        {
            let content_type = if serde_json::from_str::<serde_json::Value>(body).is_ok() {
                "application/json"
            } else {
                "text/plain; charset=utf-8"
            };
            return (status, [(CONTENT_TYPE, content_type)], body.clone()).into_response();
        }

        let message = match &self {
            ApiError::Unauthenticated => "no credential in session".to_string(),
            ApiError::Auth(e) | ApiError::Refresh(e) => e.to_string(),
        };

        (
            status,
            axum::Json(serde_json::json!({
                "error": {
                    "type": error_type,
                    "message": message,
                }
            })),
        )
            .into_response()
    }
}
