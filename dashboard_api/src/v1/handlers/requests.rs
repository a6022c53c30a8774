use crate::state::Db;
use crate::v1::api_models::{ActionRequest, RequestListResponse, RequestView};
use crate::v1::error::ApiError;
use crate::v1::extractors::params::ListParams;
use crate::v1::session::SupervisorSession;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use shared::dialog::ActionDialog;
use shared::filter::{RequestSummary, filter_records, paginate};
use shared::store::requests::{PgStatusUpdater, fetch_request, fetch_requests};

/// On success, returns one page of requests matching `search` and `status`, newest first,
/// with summary statistics over every request.
pub async fn list_requests(
    State(db): State<Db>,
    params: ListParams,
) -> Result<impl IntoResponse, ApiError> {
    let requested_at = Utc::now();
    let requests = fetch_requests(&db.pool).await?;

    let summary = RequestSummary::tally(&requests);
    let filtered = filter_records(&requests, &params.search, params.status);
    let page = paginate(filtered, params.page).map(|r| RequestView::from(r.clone()));

    Ok((
        StatusCode::OK,
        Json(RequestListResponse {
            requested_at,
            summary,
            page,
        }),
    ))
}

pub async fn get_request(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let request = fetch_request(&db.pool, &id).await?;
    Ok((StatusCode::OK, Json(RequestView::from(request))))
}

/// Approves, denies or completes a request on behalf of the signed-in supervisor.
///
/// Runs one confirmation dialog: refused with 409 when the request's current status does not
/// allow the action, otherwise the update is applied and the written fields are returned.
pub async fn apply_action(
    State(db): State<Db>,
    supervisor: SupervisorSession,
    Path(id): Path<String>,
    Json(body): Json<ActionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = fetch_request(&db.pool, &id).await?;

    let mut dialog = ActionDialog::new();
    dialog.open(body.action, request)?;
    dialog.set_notes(body.notes.unwrap_or_default());

    let updater = PgStatusUpdater::new(db.pool);
    let applied = dialog
        .confirm(&updater, Some(supervisor.supervisor_id()))
        .await?;

    Ok((StatusCode::OK, Json(applied)))
}
