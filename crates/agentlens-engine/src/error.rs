//! The engine/registry error taxonomy (§7).

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("input error: {0}")]
    InputError(String),

    #[error("data error: {0}")]
    DataError(String),

    #[error("dependency failure: predecessors failed: {0:?}")]
    DependencyFailure(Vec<String>),

    #[error("processing error in plugin '{plugin_id}': {class_name}: {message}")]
    ProcessingError {
        plugin_id: String,
        class_name: String,
        message: String,
        stack_trace: Option<String>,
    },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("tenant config error: {0}")]
    TenantConfigError(String),

    #[error(transparent)]
    Store(#[from] agentlens_store::StoreError),

    #[error(transparent)]
    Data(#[from] agentlens_data::DataError),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
