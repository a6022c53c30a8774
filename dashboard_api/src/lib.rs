pub mod state;
pub mod v1;

use crate::state::AppState;
use crate::v1::error::ErrorMessage;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use shared::SessionsConfig;
use shared::error::ConfigError;
use shared::live::ChangeFeed;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::time;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tracing::error;

pub const SESSION_COOKIE_NAME: &str = "line_clearance_session";

/// Full application router: `/health`, the `/v1` API and the middleware stack.
pub fn app<Store>(state: AppState, sessions: SessionManagerLayer<Store>) -> Router
where
    Store: SessionStore + Clone,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/v1", v1::router(state.clone()))
        .fallback(not_found)
        .layer(sessions)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AnyOrigin)
                .allow_methods(AnyOrigin)
                .allow_headers(AnyOrigin),
        )
        .with_state(state)
}

/// Cookie session layer that expires sessions after the configured inactivity.
pub fn session_layer<Store>(
    store: Store,
    config: &SessionsConfig,
) -> Result<SessionManagerLayer<Store>, ConfigError>
where
    Store: SessionStore + Clone,
{
    let inactivity = config.inactivity_duration()?;
    let inactivity =
        time::Duration::try_from(inactivity).unwrap_or(time::Duration::hours(8));

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_secure(config.secure_cookies)
        .with_expiry(Expiry::OnInactivity(inactivity)))
}

async fn health_check(State(feed): State<ChangeFeed>) -> impl IntoResponse {
    let msg = if let Some(timestamp) = feed.last_change() {
        format!("Last change notification: {timestamp}")
    } else {
        "No change notifications yet".into()
    };

    (StatusCode::OK, msg)
}

async fn not_found() -> ErrorMessage {
    ErrorMessage::from((StatusCode::NOT_FOUND, "no such route"))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(name: "handler.panicked", details = %details, "handler panicked");

    ErrorMessage::from((
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong. Please retry, or return to the dashboard home page.",
    ))
    .into_response()
}
