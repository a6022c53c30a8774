use crate::dialog::StatusUpdater;
use crate::models::{AppliedUpdate, ClearanceRequest};
use crate::status::RequestStatus;
use crate::store::QueryError;
use sqlx::{Executor, Pool, Postgres};
use tracing::{info, instrument};

const UNKNOWN_SUPERVISOR: &str = "unknown";

const REQUEST_COLUMNS: &str = r"
    id, substation, feeder, fault_type, status, created_at, updated_at, lineman_id,
    supervisor_notes, audio_url, priority, last_updated_by, reviewed_at, reviewed_by,
    resolved_at
";

/// All requests, newest first.
pub async fn fetch_requests<'e, E>(executor: E) -> Result<Vec<ClearanceRequest>, QueryError>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("SELECT {REQUEST_COLUMNS} FROM requests ORDER BY created_at DESC");
    sqlx::query_as::<_, ClearanceRequest>(&query)
        .fetch_all(executor)
        .await
        .map_err(QueryError::from)
}

pub async fn fetch_request<'e, E>(executor: E, id: &str) -> Result<ClearanceRequest, QueryError>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1");
    sqlx::query_as::<_, ClearanceRequest>(&query)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| QueryError::NotFound(id.to_string()))
}

/// Completed and denied requests, most recently updated first.
pub async fn fetch_historical_requests<'e, E>(
    executor: E,
) -> Result<Vec<ClearanceRequest>, QueryError>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {REQUEST_COLUMNS} FROM requests \
         WHERE status IN ('completed', 'denied') \
         ORDER BY updated_at DESC NULLS LAST"
    );
    sqlx::query_as::<_, ClearanceRequest>(&query)
        .fetch_all(executor)
        .await
        .map_err(QueryError::from)
}

/// Moves a request to `status` and records who did it.
///
/// The current status is read under a row lock, so an illegal transition is rejected before
/// anything is written. Concurrent legal updates are not versioned; the last one wins.
#[instrument(skip(pool, notes))]
pub async fn update_request_status(
    pool: &Pool<Postgres>,
    id: &str,
    status: RequestStatus,
    supervisor: Option<&str>,
    notes: Option<&str>,
) -> Result<AppliedUpdate, QueryError> {
    let supervisor = supervisor
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_SUPERVISOR);
    let notes = notes.map(str::trim).filter(|n| !n.is_empty());

    let mut tx = pool.begin().await?;

    let current = sqlx::query_scalar::<_, RequestStatus>(
        "SELECT status FROM requests WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| QueryError::NotFound(id.to_string()))?;

    current.transition_to(status)?;

    let applied = sqlx::query_as::<_, AppliedUpdate>(
        r"
        UPDATE requests
        SET status           = $2,
            updated_at       = now(),
            last_updated_by  = $3,
            supervisor_notes = COALESCE($4, supervisor_notes),
            reviewed_at      = CASE WHEN $5 THEN now() ELSE reviewed_at END,
            reviewed_by      = CASE WHEN $5 THEN $3 ELSE reviewed_by END,
            resolved_at      = CASE WHEN $6 THEN now() ELSE resolved_at END
        WHERE id = $1
        RETURNING id, status, updated_at, last_updated_by, supervisor_notes,
                  reviewed_at, reviewed_by, resolved_at
        ",
    )
    .bind(id)
    .bind(status)
    .bind(supervisor)
    .bind(notes)
    .bind(status != RequestStatus::Pending)
    .bind(status.is_terminal())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        name: "request.status_updated",
        id = id,
        from = %current,
        to = %status,
        supervisor = supervisor,
        "Request status updated"
    );

    Ok(applied)
}

pub async fn approve_request(
    pool: &Pool<Postgres>,
    id: &str,
    supervisor: Option<&str>,
    notes: Option<&str>,
) -> Result<AppliedUpdate, QueryError> {
    update_request_status(pool, id, RequestStatus::Approved, supervisor, notes).await
}

pub async fn deny_request(
    pool: &Pool<Postgres>,
    id: &str,
    supervisor: Option<&str>,
    notes: Option<&str>,
) -> Result<AppliedUpdate, QueryError> {
    update_request_status(pool, id, RequestStatus::Denied, supervisor, notes).await
}

pub async fn complete_request(
    pool: &Pool<Postgres>,
    id: &str,
    supervisor: Option<&str>,
    notes: Option<&str>,
) -> Result<AppliedUpdate, QueryError> {
    update_request_status(pool, id, RequestStatus::Completed, supervisor, notes).await
}

/// [`StatusUpdater`] backed by the `requests` table.
#[derive(Clone)]
pub struct PgStatusUpdater {
    pool: Pool<Postgres>,
}

impl PgStatusUpdater {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

impl StatusUpdater for PgStatusUpdater {
    async fn update_status(
        &self,
        id: &str,
        status: RequestStatus,
        supervisor: Option<&str>,
        notes: Option<&str>,
    ) -> Result<AppliedUpdate, QueryError> {
        update_request_status(&self.pool, id, status, supervisor, notes).await
    }
}
