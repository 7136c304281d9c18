use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::{password::HashError, repo::StoreError, token::TokenError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid payload")]
    InvalidPayload(String),
    #[error("missing required fields")]
    MissingFields,
    #[error("invalid email format")]
    InvalidEmailFormat,
    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("email already in use")]
    EmailTaken,
    /// Covers both an unknown email and a wrong password.
    #[error("invalid email or password")]
    InvalidLogin,
    #[error("invalid user id: {0}")]
    InvalidUserId(#[from] uuid::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Sign(#[from] TokenError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::InvalidPayload(_)
            | AuthError::MissingFields
            | AuthError::InvalidEmailFormat
            | AuthError::PasswordTooShort(_)
            | AuthError::InvalidUserId(_) => StatusCode::BAD_REQUEST,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidLogin => StatusCode::UNAUTHORIZED,
            AuthError::Store(_) | AuthError::Hash(_) | AuthError::Sign(_) => {
                error!(error = %self, "auth request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if status.is_server_error() {
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
