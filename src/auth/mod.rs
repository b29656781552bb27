use axum::{middleware, Router};

use crate::state::AppState;

mod claims;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod policy;
pub mod resolver;
pub mod role_gate;
pub mod services;
pub mod session;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new().merge(handlers::auth_routes()).merge(
        handlers::me_routes()
            .route_layer(middleware::from_fn_with_state(state, extractors::require_auth)),
    )
}
