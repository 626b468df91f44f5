use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{collection} not found: {id}")]
    NotFound { collection: &'static str, id: String },

    #[error("duplicate key in {collection}: {key}")]
    DuplicateKey { collection: &'static str, key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub(crate) fn not_found(collection: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            collection,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
