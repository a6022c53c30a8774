//! Confirmation flow for supervisor actions.
//!
//! ```text
//! Closed ──open──▶ Open ──confirm──▶ Confirming ──ok──▶ Closed
//!                   ▲                     │
//!                   └──────── error ──────┘
//! ```

use crate::models::{AppliedUpdate, ClearanceRequest};
use crate::status::{RequestAction, RequestStatus};
use crate::store::QueryError;
use std::future::Future;
use thiserror::Error;
use tracing::warn;

/// Anything that can persist a status change for a request.
pub trait StatusUpdater {
    fn update_status(
        &self,
        id: &str,
        status: RequestStatus,
        supervisor: Option<&str>,
        notes: Option<&str>,
    ) -> impl Future<Output = Result<AppliedUpdate, QueryError>> + Send;
}

#[derive(Debug, Error)]
pub enum DialogError {
    #[error("cannot {action} a request that is {status}")]
    ActionNotAllowed {
        action: RequestAction,
        status: RequestStatus,
    },
    #[error("no action is open")]
    NotOpen,
    #[error(transparent)]
    Update(#[from] QueryError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DialogState {
    #[default]
    Closed,
    Open {
        action: RequestAction,
        target: ClearanceRequest,
        notes: String,
        error: Option<String>,
    },
    Confirming {
        action: RequestAction,
        target: ClearanceRequest,
        notes: String,
    },
}

#[derive(Debug, Default)]
pub struct ActionDialog {
    state: DialogState,
}

impl ActionDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DialogState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, DialogState::Closed)
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            DialogState::Open { error, .. } => error.as_deref(),
            _ => None,
        }
    }

    /// Opens the dialog for `action` on `target`. Refused when the request's status does not
    /// allow the action.
    pub fn open(
        &mut self,
        action: RequestAction,
        target: ClearanceRequest,
    ) -> Result<(), DialogError> {
        if !target.accepts(action) {
            return Err(DialogError::ActionNotAllowed {
                action,
                status: target.status,
            });
        }
        self.state = DialogState::Open {
            action,
            target,
            notes: String::new(),
            error: None,
        };
        Ok(())
    }

    pub fn set_notes(&mut self, text: impl Into<String>) {
        if let DialogState::Open { notes, .. } = &mut self.state {
            *notes = text.into();
        }
    }

    /// Closes the dialog, discarding notes and any error.
    pub fn cancel(&mut self) {
        self.state = DialogState::Closed;
    }

    /// Applies the open action through `updater`.
    ///
    /// On success the dialog closes and the applied update is returned. On failure the dialog
    /// goes back to `Open` with the error message and the same notes, ready for a retry.
    pub async fn confirm<U: StatusUpdater>(
        &mut self,
        updater: &U,
        supervisor: Option<&str>,
    ) -> Result<AppliedUpdate, DialogError> {
        let (action, target, notes) = match std::mem::take(&mut self.state) {
            DialogState::Open {
                action,
                target,
                notes,
                ..
            } => (action, target, notes),
            other => {
                self.state = other;
                return Err(DialogError::NotOpen);
            }
        };

        self.state = DialogState::Confirming {
            action,
            target: target.clone(),
            notes: notes.clone(),
        };

        let trimmed = notes.trim();
        let trimmed = (!trimmed.is_empty()).then_some(trimmed);

        match updater
            .update_status(&target.id, action.target(), supervisor, trimmed)
            .await
        {
            Ok(applied) => {
                self.state = DialogState::Closed;
                Ok(applied)
            }
            Err(e) => {
                warn!(
                    name: "dialog.confirm_failed",
                    id = %target.id,
                    action = %action,
                    error = %e,
                    "Status update failed"
                );
                self.state = DialogState::Open {
                    action,
                    target,
                    notes,
                    error: Some(e.to_string()),
                };
                Err(DialogError::Update(e))
            }
        }
    }
}
