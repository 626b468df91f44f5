use thiserror::Error;

use crate::ledger::LedgerError;
use crate::messaging::MessagingError;
use crate::models::TaskId;

/// Failures while turning a stored task into its scheduled message
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("task {0} has no dateFrom in its DataFetch payload")]
    MissingDateFrom(TaskId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("a task named '{0}' already exists")]
    DuplicateName(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("file {file_id} cannot be uploaded: {reason}")]
    UnusableFile { file_id: String, reason: String },

    #[error("invalid periodic schedule: {0}")]
    InvalidSchedule(String),

    #[error("mapping failed: {0}")]
    Mapping(#[from] MappingError),

    #[error("storage error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("messaging error: {0}")]
    Messaging(#[from] MessagingError),
}

impl TaskError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        TaskError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// User-facing rejection, as opposed to an internal failure
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            TaskError::DuplicateName(_)
                | TaskError::NotFound { .. }
                | TaskError::InvalidRequest(_)
                | TaskError::UnusableFile { .. }
                | TaskError::InvalidSchedule(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::RoutingKey;

    #[test]
    fn test_domain_classification() {
        assert!(TaskError::DuplicateName("x".into()).is_domain());
        assert!(TaskError::not_found("sensor", "s1").is_domain());
        assert!(!TaskError::Mapping(MappingError::MissingDateFrom(TaskId::from("t"))).is_domain());
        assert!(!TaskError::Messaging(MessagingError::MissingSchema(RoutingKey::UserUser)).is_domain());
    }
}
