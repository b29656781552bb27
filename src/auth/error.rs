use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use super::dto::MessageResponse;
use crate::users::{Role, StoreError};

/// Validation outcomes reported to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Email is required")]
    EmailRequired,
    #[error("E-mail is required")]
    LoginEmailRequired,
    #[error("Invalid role")]
    UnknownRole,
    #[error("Patient name and password are required")]
    PatientFieldsRequired,
    #[error("Invalid {0} admin key")]
    InvalidAdminKey(Role),
    #[error("User already exists")]
    UserExists,
    #[error("Invalid email")]
    UnknownEmail,
    #[error("Role mismatch")]
    RoleMismatch,
    #[error("Invalid {0} key")]
    InvalidLoginKey(Role),
    #[error("Password is required")]
    PasswordRequired,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Missing Google authentication data")]
    MissingFederatedData,
    #[error("Only patients can login via Google")]
    FederatedRoleNotAllowed,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// Request body that is not the expected JSON.
    #[error(transparent)]
    Body(#[from] JsonRejection),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            AuthError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => AuthError::Rejected(Rejection::UserExists),
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::Rejected(r) => (StatusCode::BAD_REQUEST, r.to_string()),
            AuthError::Body(rejection) => {
                warn!(error = %rejection, "malformed request body");
                (rejection.status(), rejection.body_text())
            }
            AuthError::Internal(e) => {
                error!(error = ?e, "auth request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(MessageResponse::failure(message))).into_response()
    }
}
