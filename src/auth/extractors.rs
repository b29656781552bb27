use std::{future::Future, pin::Pin};

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use tracing::{error, warn};
use uuid::Uuid;

use super::{dto::MessageResponse, session::TOKEN_COOKIE};
use crate::{
    state::AppState,
    users::{
        repo_types::{ConsultantProfile, DoctorProfile, PatientProfile},
        PublicUser, Role, User,
    },
};

/// The caller's account as loaded by the auth middleware. Holds no credential
/// material.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub role: Role,
    pub email: String,
    pub display_name: Option<String>,
    pub patient_profile: PatientProfile,
    pub doctor_profile: DoctorProfile,
    pub consultant_profile: ConsultantProfile,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            email: user.email,
            display_name: user.display_name,
            patient_profile: user.patient_profile,
            doctor_profile: user.doctor_profile,
            consultant_profile: user.consultant_profile,
        }
    }
}

impl From<&AuthenticatedUser> for PublicUser {
    fn from(user: &AuthenticatedUser) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthRejection {
    #[error("No token provided")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("User not found")]
    UserNotFound,
    #[error("User not authenticated")]
    NotAuthenticated,
    #[error("Access denied")]
    AccessDenied,
    #[error("Server error in auth")]
    Internal(#[source] anyhow::Error),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthRejection::AccessDenied => StatusCode::FORBIDDEN,
            AuthRejection::Internal(e) => {
                error!(error = ?e, "auth middleware error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        };
        (status, Json(MessageResponse::failure(self.to_string()))).into_response()
    }
}

/// Session cookie first, then `Authorization: Bearer <token>`.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(TOKEN_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, AuthRejection> {
    let token = extract_token(headers).ok_or(AuthRejection::MissingToken)?;

    let Some(claims) = state.jwt.verify(&token) else {
        warn!("invalid or expired token");
        return Err(AuthRejection::InvalidToken);
    };

    let user = state
        .users
        .find_by_id(claims.id)
        .await
        .map_err(|e| AuthRejection::Internal(e.into()))?
        .ok_or_else(|| {
            warn!(user_id = %claims.id, "token for unknown user");
            AuthRejection::UserNotFound
        })?;

    Ok(user.into())
}

/// Rejects unauthenticated requests and exposes the [`AuthenticatedUser`]
/// to downstream handlers through request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let user = authenticate(&state, req.headers()).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

pub fn check_roles(
    user: Option<&AuthenticatedUser>,
    allowed: &[Role],
) -> Result<(), AuthRejection> {
    let user = user.ok_or(AuthRejection::NotAuthenticated)?;
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        warn!(user_id = %user.id, role = %user.role, "access denied");
        Err(AuthRejection::AccessDenied)
    }
}

type GuardFuture = Pin<Box<dyn Future<Output = Result<Response, AuthRejection>> + Send>>;

/// Role guard to run after [`require_auth`].
pub fn require_any_role(
    allowed: &'static [Role],
) -> impl Fn(Request, Next) -> GuardFuture + Clone + Send + Sync + 'static {
    move |req: Request, next: Next| -> GuardFuture {
        Box::pin(async move {
            check_roles(req.extensions().get::<AuthenticatedUser>(), allowed)?;
            Ok(next.run(req).await)
        })
    }
}

/// Handler extractor for the authenticated caller. Reuses the middleware's
/// result when present.
pub struct AuthUser(pub AuthenticatedUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(AuthUser(user.clone()));
        }
        authenticate(state, &parts.headers).await.map(AuthUser)
    }
}
