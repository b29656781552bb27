use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{CookieJar, WithRejection};
use tracing::{info, instrument, warn};

use super::{
    dto::{
        AuthResponse, CallbackQuery, GoogleLoginRequest, LoginRequest, MeResponse,
        MessageResponse, RegisterRequest,
    },
    error::AuthError,
    extractors::AuthUser,
    services::{self, AuthOutcome},
    session::OAUTH_STATE_COOKIE,
};
use crate::{
    oauth::{AuthorizationState, OAuthError},
    state::AppState,
    users::PublicUser,
};

/// JSON body whose parse failures answer with the `{success, message}` shape.
type JsonBody<T> = WithRejection<Json<T>, AuthError>;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/google", get(google_start))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/google-login", post(google_login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

/// Sets the session cookie and builds the success body.
fn signed_in(
    state: &AppState,
    jar: CookieJar,
    outcome: AuthOutcome,
    message: Option<&str>,
) -> (CookieJar, Json<AuthResponse>) {
    let jar = jar.add(state.cookies.issue(outcome.token.clone()));
    let body = AuthResponse {
        success: true,
        message: message.map(str::to_string),
        role: outcome.user.role,
        token: outcome.token,
        user: PublicUser::from(&outcome.user),
    };
    (jar, Json(body))
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), AuthError> {
    let outcome = services::register(&state, payload).await?;
    let (jar, body) = signed_in(&state, jar, outcome, None);
    Ok((StatusCode::CREATED, jar, body))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    let outcome = services::login(&state, payload).await?;
    Ok(signed_in(&state, jar, outcome, None))
}

#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.add(state.cookies.clear()),
        Json(MessageResponse::ok("Logged Out")),
    )
}

#[instrument(skip(state, jar))]
pub async fn google_start(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let (url, auth_state) = state.identity.authorization_url();
    let jar = jar.add(state.cookies.oauth_state(auth_state.to_cookie_value()));
    info!("redirecting to google");
    (jar, Redirect::to(&url))
}

#[derive(Debug, thiserror::Error)]
enum CallbackFailure {
    #[error(transparent)]
    Provider(#[from] OAuthError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

async fn complete_google(
    state: &AppState,
    stored: Option<AuthorizationState>,
    query: CallbackQuery,
) -> Result<AuthOutcome, CallbackFailure> {
    if let Some(reason) = query.error {
        return Err(OAuthError::Denied(reason).into());
    }
    let stored = stored.ok_or(OAuthError::MissingAuthState)?;
    if query.state.as_deref() != Some(stored.csrf_token.as_str()) {
        return Err(OAuthError::CsrfMismatch.into());
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| OAuthError::TokenExchange("missing authorization code".into()))?;

    let profile = state.identity.exchange(&code, &stored).await?;
    Ok(services::federated_login(state, None, profile).await?)
}

/// Always clears `oauth_state`. Provider and validation failures redirect to
/// the login page; store failures answer 500.
#[instrument(skip(state, jar, query))]
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let stored = jar
        .get(OAUTH_STATE_COOKIE)
        .and_then(|c| AuthorizationState::from_cookie_value(c.value()));
    let jar = jar.add(state.cookies.clear_oauth_state());

    match complete_google(&state, stored, query).await {
        Ok(outcome) => {
            let message = Some("Google Authentication Successful");
            signed_in(&state, jar, outcome, message).into_response()
        }
        Err(CallbackFailure::Auth(e @ AuthError::Internal(_))) => (jar, e).into_response(),
        Err(e) => {
            warn!(error = %e, "google callback failed");
            let login_page = Redirect::to(&state.config.google.failure_redirect);
            (jar, login_page).into_response()
        }
    }
}

#[instrument(skip(state, jar, payload))]
pub async fn google_login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): JsonBody<GoogleLoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    let requested = payload.role.clone();
    let outcome = services::federated_login(&state, requested.as_deref(), payload.into()).await?;
    Ok(signed_in(&state, jar, outcome, None))
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        success: true,
        user: PublicUser::from(&user),
    })
}
