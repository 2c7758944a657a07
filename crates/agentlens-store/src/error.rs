//! Transport/backend errors (§7: "Transport errors from backends: propagated as-is").

use agentlens_types::ElementKind;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("no backend registered for kind {0}")]
    UnknownKind(ElementKind),

    #[error("duplicate element_id '{0}'")]
    Duplicate(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
