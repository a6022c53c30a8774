use crate::v1::error::ApiError;
use crate::v1::session::constants::SESSION_USER_KEY;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::identity::AuthUser;
use tower_sessions::Session;
use tracing::info;

pub mod constants {
    // The key used in the session to store the signed-in supervisor
    pub const SESSION_USER_KEY: &str = "supervisor";
}

/// The signed-in supervisor, stored server-side for the lifetime of the session.
///
/// Created by [`SupervisorSession::begin`] on sign-in and destroyed by
/// [`SupervisorSession::end`] on sign-out. Handlers that take it as an argument only run for
/// signed-in supervisors.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorSession {
    pub uid: String,
    pub email: String,
    pub signed_in_at: DateTime<Utc>,
}

impl SupervisorSession {
    pub async fn begin(session: &Session, user: AuthUser) -> Result<Self, ApiError> {
        // New id on privilege change so a pre-login cookie can't be reused.
        session.cycle_id().await?;

        let supervisor = Self {
            uid: user.uid,
            email: user.email,
            signed_in_at: Utc::now(),
        };
        session.insert(SESSION_USER_KEY, &supervisor).await?;
        info!(name: "session.begin", uid = %supervisor.uid, "Supervisor session started");

        Ok(supervisor)
    }

    pub async fn current(session: &Session) -> Result<Option<Self>, ApiError> {
        Ok(session.get::<Self>(SESSION_USER_KEY).await?)
    }

    /// Removes the session record and its cookie. Returns who was signed in, if anyone.
    pub async fn end(session: &Session) -> Result<Option<Self>, ApiError> {
        let current = Self::current(session).await?;
        session.flush().await?;
        if let Some(supervisor) = &current {
            info!(name: "session.end", uid = %supervisor.uid, "Supervisor session ended");
        }
        Ok(current)
    }

    /// Identity recorded on the requests this supervisor updates.
    pub fn supervisor_id(&self) -> &str {
        &self.email
    }
}

impl<S> FromRequestParts<S> for SupervisorSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::AuthRequired)?;

        Self::current(&session).await?.ok_or(ApiError::AuthRequired)
    }
}
