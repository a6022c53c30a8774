use crate::state::Db;
use crate::v1::api_models::{ActiveLinemenResponse, SeedResponse};
use crate::v1::error::ApiError;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use shared::map::{WorkerDetails, markers_for};
use shared::store::linemen::{SeedOutcome, fetch_active_linemen, fetch_lineman, seed_sample_linemen};

pub async fn active_linemen(State(db): State<Db>) -> Result<impl IntoResponse, ApiError> {
    let requested_at = Utc::now();
    let linemen = fetch_active_linemen(&db.pool).await?;
    let markers = markers_for(&linemen);

    Ok((
        StatusCode::OK,
        Json(ActiveLinemenResponse {
            requested_at,
            markers,
            linemen,
        }),
    ))
}

/// Detail overlay for one worker on the map.
pub async fn get_lineman(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lineman = fetch_lineman(&db.pool, &id).await?;
    Ok((
        StatusCode::OK,
        Json(WorkerDetails::from_lineman(&lineman, Utc::now())),
    ))
}

pub async fn seed_sample(State(db): State<Db>) -> Result<impl IntoResponse, ApiError> {
    let outcome = seed_sample_linemen(&db.pool).await?;
    let status = match outcome {
        SeedOutcome::Inserted(_) => StatusCode::CREATED,
        SeedOutcome::Skipped => StatusCode::OK,
    };
    Ok((status, Json(SeedResponse::from(outcome))))
}
