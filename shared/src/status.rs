use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle of a line clearance request.
///
/// ```text
/// pending ──approve──▶ approved ──complete──▶ completed
///    │
///    └──deny──▶ denied
/// ```
///
/// `denied` and `completed` are terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
    Completed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestAction {
    Approve,
    Deny,
    Complete,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("request is already {0} and cannot change status")]
    Terminal(RequestStatus),
    #[error("cannot move a request from {from} to {to}")]
    NotAllowed {
        from: RequestStatus,
        to: RequestStatus,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown request status {0:?}")]
pub struct ParseStatusError(pub String);

/// Every legal `(from, to)` pair. Anything not listed is rejected.
const TRANSITIONS: &[(RequestStatus, RequestStatus)] = &[
    (RequestStatus::Pending, RequestStatus::Approved),
    (RequestStatus::Pending, RequestStatus::Denied),
    (RequestStatus::Approved, RequestStatus::Completed),
];

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Denied,
        RequestStatus::Completed,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Denied => "denied",
            RequestStatus::Completed => "completed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Denied | RequestStatus::Completed)
    }

    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        TRANSITIONS.contains(&(self, next))
    }

    pub fn transition_to(self, next: RequestStatus) -> Result<RequestStatus, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self));
        }
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError::NotAllowed {
                from: self,
                to: next,
            })
        }
    }

    pub fn apply(self, action: RequestAction) -> Result<RequestStatus, TransitionError> {
        self.transition_to(action.target())
    }

    /// Actions a supervisor may take on a request in this status.
    pub fn allowed_actions(self) -> Vec<RequestAction> {
        RequestAction::ALL
            .into_iter()
            .filter(|action| self.can_transition_to(action.target()))
            .collect()
    }
}

impl RequestAction {
    pub const ALL: [RequestAction; 3] = [
        RequestAction::Approve,
        RequestAction::Deny,
        RequestAction::Complete,
    ];

    pub const fn target(self) -> RequestStatus {
        match self {
            RequestAction::Approve => RequestStatus::Approved,
            RequestAction::Deny => RequestStatus::Denied,
            RequestAction::Complete => RequestStatus::Completed,
        }
    }
}

impl Display for RequestStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Display for RequestAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestAction::Approve => write!(f, "approve"),
            RequestAction::Deny => write!(f, "deny"),
            RequestAction::Complete => write!(f, "complete"),
        }
    }
}

impl FromStr for RequestStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// Status selector used by list views; `all` matches every status.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(RequestStatus),
}

impl StatusFilter {
    pub fn matches(self, status: RequestStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() || s.trim().eq_ignore_ascii_case("all") {
            Ok(StatusFilter::All)
        } else {
            s.parse().map(StatusFilter::Only)
        }
    }
}

impl<'de> Deserialize<'de> for StatusFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
