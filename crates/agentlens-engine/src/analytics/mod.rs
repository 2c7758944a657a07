//! Analytics plugin registry and execution engine (§4.5).

pub mod engine;
pub mod field_spec;
pub mod plugin;
pub mod registry;

pub use engine::{AnalyticsEngine, AnalyticsEngineConfig};
pub use field_spec::{validate_field_specs, FieldSpec, FieldType};
pub use plugin::{
    AnalyticsPlugin, ExecutionError, ExecutionResult, ExecutionStatus, PluginExecutionContext, PluginMap, PluginMetadata, PluginStatus,
};
pub use registry::AnalyticsRegistry;
