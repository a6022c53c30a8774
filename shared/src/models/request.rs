use crate::status::{RequestAction, RequestStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A line clearance ticket as submitted by a field worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ClearanceRequest {
    pub id: String,
    pub substation: String,
    pub feeder: Option<String>,
    pub fault_type: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub lineman_id: Option<String>,
    pub supervisor_notes: Option<String>,
    pub audio_url: Option<String>,
    pub priority: Option<String>,
    pub last_updated_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ClearanceRequest {
    pub fn allowed_actions(&self) -> Vec<RequestAction> {
        self.status.allowed_actions()
    }

    pub fn accepts(&self, action: RequestAction) -> bool {
        self.status.can_transition_to(action.target())
    }
}

/// Fields written by a status update, as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AppliedUpdate {
    pub id: String,
    pub status: RequestStatus,
    pub updated_at: DateTime<Utc>,
    pub last_updated_by: String,
    pub supervisor_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}
