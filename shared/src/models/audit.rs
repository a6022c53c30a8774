use crate::models::ClearanceRequest;
use crate::status::RequestStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("request {id} is {status}; only completed or denied requests appear in the audit log")]
pub struct NotResolved {
    pub id: String,
    pub status: RequestStatus,
}

/// Historical view of a request once it has been completed or denied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: String,
    pub substation: String,
    pub feeder: Option<String>,
    pub fault_type: String,
    pub status: RequestStatus,
    pub lineman_id: Option<String>,
    pub supervisor: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub supervisor_notes: Option<String>,
}

impl TryFrom<ClearanceRequest> for AuditRecord {
    type Error = NotResolved;

    fn try_from(request: ClearanceRequest) -> Result<Self, Self::Error> {
        if !request.status.is_terminal() {
            return Err(NotResolved {
                id: request.id,
                status: request.status,
            });
        }

        Ok(Self {
            id: request.id,
            substation: request.substation,
            feeder: request.feeder,
            fault_type: request.fault_type,
            status: request.status,
            lineman_id: request.lineman_id,
            supervisor: request.reviewed_by.or(request.last_updated_by),
            resolved_at: request.resolved_at.or(request.updated_at),
            supervisor_notes: request.supervisor_notes,
        })
    }
}
