use thiserror::Error;
use uuid::Uuid;

/// Rejections raised by the aggregates themselves.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    #[error("invalid transition: {aggregate} cannot {operation} while {from}")]
    InvalidTransition {
        aggregate: &'static str,
        from: String,
        operation: &'static str,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("robot {0} is already assigned to this delivery")]
    SameRobot(Uuid),

    #[error("robot {0} is not available")]
    RobotUnavailable(Uuid),

    #[error("route unavailable for at least one leg")]
    RouteUnavailable,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("version conflict on {aggregate} {id}: expected {expected}, found {actual}")]
    Conflict {
        aggregate: &'static str,
        id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("changeset is empty")]
    EmptyChangeset,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Store(StoreError::Conflict { .. }))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}
