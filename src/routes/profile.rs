use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;

use crate::{
    auth::extractors::{require_any_role, require_auth, AuthUser},
    state::AppState,
    users::{
        repo_types::{ConsultantProfile, DoctorProfile, PatientProfile},
        Role,
    },
};

#[derive(Debug, Serialize)]
pub struct ProfileResponse<T> {
    pub success: bool,
    pub profile: T,
}

impl<T> ProfileResponse<T> {
    fn ok(profile: T) -> Json<Self> {
        Json(Self {
            success: true,
            profile,
        })
    }
}

async fn patient_profile(AuthUser(user): AuthUser) -> Json<ProfileResponse<PatientProfile>> {
    ProfileResponse::ok(user.patient_profile)
}

async fn doctor_profile(AuthUser(user): AuthUser) -> Json<ProfileResponse<DoctorProfile>> {
    ProfileResponse::ok(user.doctor_profile)
}

async fn consultant_profile(
    AuthUser(user): AuthUser,
) -> Json<ProfileResponse<ConsultantProfile>> {
    ProfileResponse::ok(user.consultant_profile)
}

/// Role-scoped reads. `require_auth` wraps the per-role guards.
pub fn profile_routes(state: AppState) -> Router<AppState> {
    let patient = Router::new()
        .route("/patient/profile", get(patient_profile))
        .route_layer(middleware::from_fn(require_any_role(&[Role::Patient])));
    let doctor = Router::new()
        .route("/doctor/profile", get(doctor_profile))
        .route_layer(middleware::from_fn(require_any_role(&[Role::Doctor])));
    let consultant = Router::new()
        .route("/consultant/profile", get(consultant_profile))
        .route_layer(middleware::from_fn(require_any_role(&[Role::Consultant])));

    Router::new()
        .merge(patient)
        .merge(doctor)
        .merge(consultant)
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
