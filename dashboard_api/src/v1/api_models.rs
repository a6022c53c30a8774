use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::filter::{AuditAnalytics, Page, RequestSummary};
use shared::map::MapMarker;
use shared::models::{AuditRecord, ClearanceRequest, Lineman};
use shared::status::RequestAction;
use shared::store::linemen::SeedOutcome;
use shared::timestamps::{NOT_AVAILABLE, display_date, display_timestamp};

/// Body of both sign-in and registration.
#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ActionRequest {
    pub action: RequestAction,
    pub notes: Option<String>,
}

/// A request as the list and detail views render it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    #[serde(flatten)]
    pub request: ClearanceRequest,
    pub created_at_display: String,
    pub updated_at_display: String,
    pub allowed_actions: Vec<RequestAction>,
}

impl From<ClearanceRequest> for RequestView {
    fn from(request: ClearanceRequest) -> Self {
        Self {
            created_at_display: display_timestamp(Some(request.created_at)),
            updated_at_display: display_timestamp(request.updated_at),
            allowed_actions: request.allowed_actions(),
            request,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestListResponse {
    pub requested_at: DateTime<Utc>,
    pub summary: RequestSummary,
    #[serde(flatten)]
    pub page: Page<RequestView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditView {
    #[serde(flatten)]
    pub record: AuditRecord,
    pub supervisor_display: String,
    pub resolved_on: String,
}

impl From<AuditRecord> for AuditView {
    fn from(record: AuditRecord) -> Self {
        Self {
            supervisor_display: record
                .supervisor
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            resolved_on: display_date(record.resolved_at),
            record,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditListResponse {
    pub requested_at: DateTime<Utc>,
    pub analytics: AuditAnalytics,
    #[serde(flatten)]
    pub page: Page<AuditView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLinemenResponse {
    pub requested_at: DateTime<Utc>,
    pub markers: Vec<MapMarker>,
    pub linemen: Vec<Lineman>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedResponse {
    pub inserted: usize,
    pub skipped: bool,
}

impl From<SeedOutcome> for SeedResponse {
    fn from(outcome: SeedOutcome) -> Self {
        match outcome {
            SeedOutcome::Skipped => Self {
                inserted: 0,
                skipped: true,
            },
            SeedOutcome::Inserted(inserted) => Self {
                inserted,
                skipped: false,
            },
        }
    }
}

/// One frame on a live socket: the full current result set.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot<T> {
    pub sent_at: DateTime<Utc>,
    pub items: Vec<T>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinemenSnapshotItem {
    #[serde(flatten)]
    pub lineman: Lineman,
    pub marker: Option<MapMarker>,
}
