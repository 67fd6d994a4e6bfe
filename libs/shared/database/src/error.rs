use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}
