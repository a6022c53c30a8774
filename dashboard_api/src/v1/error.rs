use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Serialize, Serializer};
use shared::dialog::DialogError;
use shared::identity::IdentityError;
use shared::store::QueryError;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    #[serde(serialize_with = "serialize_status")]
    pub status_code: StatusCode,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),
    #[error("authentication required")]
    AuthRequired,
    #[error("no identity provider is configured")]
    IdentityUnavailable,
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    QueryError(#[from] QueryError),
    #[error(transparent)]
    Dialog(#[from] DialogError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Session(e) => {
                warn!(error = ?e, "session error");
                ErrorMessage::from((StatusCode::INTERNAL_SERVER_ERROR, "internal server error"))
                    .into_response()
            }
            ApiError::AuthRequired => {
                ErrorMessage::from((StatusCode::UNAUTHORIZED, "sign in required")).into_response()
            }
            ApiError::IdentityUnavailable => {
                warn!("sign-in attempted without an identity provider configured");
                ErrorMessage::from((StatusCode::SERVICE_UNAVAILABLE, "")).into_response()
            }
            ApiError::Identity(e) => match e {
                IdentityError::Rejected(reason) => {
                    warn!(reason = %reason, "identity provider rejected sign-in");
                    ErrorMessage::from((StatusCode::UNAUTHORIZED, "invalid email or password"))
                        .into_response()
                }
                IdentityError::RegistrationRejected(reason) => {
                    warn!(reason = %reason, "identity provider rejected registration");
                    ErrorMessage::from((StatusCode::BAD_REQUEST, reason)).into_response()
                }
                e @ IdentityError::InvalidInput => {
                    ErrorMessage::from((StatusCode::BAD_REQUEST, e.to_string())).into_response()
                }
                IdentityError::Transport(e) => {
                    warn!(error = ?e, "identity provider request failed");
                    ErrorMessage::from((StatusCode::BAD_GATEWAY, "identity provider unreachable"))
                        .into_response()
                }
            },
            ApiError::QueryError(e) => query_error_response(e),
            ApiError::Dialog(e) => match e {
                e @ DialogError::ActionNotAllowed { .. } => {
                    warn!(error = %e, "action refused");
                    ErrorMessage::from((StatusCode::CONFLICT, e.to_string())).into_response()
                }
                DialogError::NotOpen => {
                    warn!("confirm called without an open dialog");
                    ErrorMessage::from((StatusCode::INTERNAL_SERVER_ERROR, "")).into_response()
                }
                DialogError::Update(e) => query_error_response(e),
            },
            ApiError::BadRequest(msg) => {
                ErrorMessage::from((StatusCode::BAD_REQUEST, msg)).into_response()
            }
        }
    }
}

fn query_error_response(e: QueryError) -> Response {
    match e {
        QueryError::Sql(e) => {
            warn!(error = ?e, "sql error");
            ErrorMessage::from((StatusCode::INTERNAL_SERVER_ERROR, "")).into_response()
        }
        e @ QueryError::NotFound(_) => {
            ErrorMessage::from((StatusCode::NOT_FOUND, e.to_string())).into_response()
        }
        QueryError::IllegalTransition(e) => {
            warn!(error = %e, "illegal status transition");
            ErrorMessage::from((StatusCode::CONFLICT, e.to_string())).into_response()
        }
    }
}

fn serialize_status<S>(value: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(value.as_u16())
}

impl From<(StatusCode, String)> for ErrorMessage {
    fn from((status_code, message): (StatusCode, String)) -> Self {
        Self {
            status_code,
            message,
        }
    }
}

impl From<(StatusCode, &str)> for ErrorMessage {
    fn from((status_code, message): (StatusCode, &str)) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ErrorMessage {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}
