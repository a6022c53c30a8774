use crate::state::AppState;
use crate::v1::handlers::audit::{export_audit, list_audit};
use crate::v1::handlers::auth::{login, logout, me, register};
use crate::v1::handlers::linemen::{active_linemen, get_lineman, seed_sample};
use crate::v1::handlers::live::{linemen_live, requests_live};
use crate::v1::handlers::requests::{apply_action, get_request, list_requests};
use crate::v1::middleware::auth::require_auth;
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};

pub fn router(state: AppState) -> Router<AppState> {
    Router::<AppState>::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .merge(protected_routes(&state))
}

pub fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::<AppState>::new()
        .route("/requests", get(list_requests))
        .route("/requests/live", get(requests_live))
        .route("/requests/{id}", get(get_request))
        .route("/requests/{id}/actions", post(apply_action))
        .route("/linemen/active", get(active_linemen))
        .route("/linemen/live", get(linemen_live))
        .route("/linemen/sample", post(seed_sample))
        .route("/linemen/{id}", get(get_lineman))
        .route("/audit", get(list_audit))
        .route("/audit/export", get(export_audit))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}
