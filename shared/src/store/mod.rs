//! Postgres queries behind every dashboard view.

pub mod linemen;
pub mod requests;

use crate::status::TransitionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("record {0} not found")]
    NotFound(String),
    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),
}
