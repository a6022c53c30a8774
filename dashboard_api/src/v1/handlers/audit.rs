use crate::state::Db;
use crate::v1::api_models::{AuditListResponse, AuditView};
use crate::v1::error::ApiError;
use crate::v1::extractors::params::AuditParams;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use shared::export::{audit_csv, export_filename};
use shared::filter::{AuditAnalytics, filter_records, paginate};
use shared::models::AuditRecord;
use shared::store::requests::fetch_historical_requests;
use sqlx::{Pool, Postgres};
use tracing::{info, warn};

/// Completed and denied requests as audit records, most recently updated first.
async fn audit_records(pool: &Pool<Postgres>) -> Result<Vec<AuditRecord>, ApiError> {
    let records = fetch_historical_requests(pool)
        .await?
        .into_iter()
        .filter_map(|request| match AuditRecord::try_from(request) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "skipping unresolved request in audit log");
                None
            }
        })
        .collect();
    Ok(records)
}

fn select<'a>(
    records: &'a [AuditRecord],
    params: &AuditParams,
    now: DateTime<Utc>,
) -> Vec<&'a AuditRecord> {
    filter_records(records, &params.list.search, params.list.status)
        .into_iter()
        .filter(|record| params.window.matches(record.resolved_at, now))
        .collect()
}

pub async fn list_audit(
    State(db): State<Db>,
    params: AuditParams,
) -> Result<impl IntoResponse, ApiError> {
    let requested_at = Utc::now();
    let records = audit_records(&db.pool).await?;
    let selected = select(&records, &params, requested_at);

    let analytics = AuditAnalytics::tally(selected.iter().copied());
    let page = paginate(selected, params.list.page).map(|r| AuditView::from(r.clone()));

    Ok((
        StatusCode::OK,
        Json(AuditListResponse {
            requested_at,
            analytics,
            page,
        }),
    ))
}

/// Every audit record matching the filters as a CSV attachment. Pagination is ignored.
pub async fn export_audit(
    State(db): State<Db>,
    params: AuditParams,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let records = audit_records(&db.pool).await?;
    let selected = select(&records, &params, now);
    let csv = audit_csv(selected.iter().copied());

    let disposition = format!("attachment; filename=\"{}\"", export_filename(now));
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    info!(name: "audit.exported", rows = selected.len(), "Audit log exported");

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
