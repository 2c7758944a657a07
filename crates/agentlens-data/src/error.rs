use agentlens_types::ElementKind;

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error(transparent)]
    Store(#[from] agentlens_store::StoreError),

    #[error("tenant config resolution failed for '{tenant}' and no fallback was available")]
    TenantConfig { tenant: String },

    #[error("no store registered for kind {0}")]
    UnknownKind(ElementKind),
}

pub type DataResult<T> = Result<T, DataError>;
