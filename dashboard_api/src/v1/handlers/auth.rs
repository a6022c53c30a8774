use crate::state::Identity;
use crate::v1::api_models::Credentials;
use crate::v1::error::ApiError;
use crate::v1::session::SupervisorSession;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use shared::identity::{IdentityClient, IdentityError};
use tower_sessions::Session;

/// Signs in with the identity provider and starts a supervisor session.
pub async fn login(
    State(identity): State<Identity>,
    session: Session,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let client = provider(identity, &body)?;

    let user = client.sign_in(&body.email, &body.password).await?;
    let supervisor = SupervisorSession::begin(&session, user).await?;

    Ok((StatusCode::OK, Json(supervisor)))
}

/// Creates a supervisor account and signs the new supervisor in.
pub async fn register(
    State(identity): State<Identity>,
    session: Session,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let client = provider(identity, &body)?;

    let user = client.sign_up(&body.email, &body.password).await?;
    let supervisor = SupervisorSession::begin(&session, user).await?;

    Ok((StatusCode::CREATED, Json(supervisor)))
}

// Blank input is a 400 even when no provider is configured.
fn provider(identity: Identity, body: &Credentials) -> Result<IdentityClient, ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(IdentityError::InvalidInput.into());
    }
    identity.client.ok_or(ApiError::IdentityUnavailable)
}

pub async fn logout(session: Session) -> Result<impl IntoResponse, ApiError> {
    SupervisorSession::end(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The signed-in supervisor, or 401 when there is no session.
pub async fn me(session: Session) -> Result<impl IntoResponse, ApiError> {
    let supervisor = SupervisorSession::current(&session)
        .await?
        .ok_or(ApiError::AuthRequired)?;
    Ok((StatusCode::OK, Json(supervisor)))
}
