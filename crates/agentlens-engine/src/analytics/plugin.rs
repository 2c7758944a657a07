//! Plugin contract and execution result types (§4.5).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::field_spec::FieldSpec;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PluginStatus {
    Active,
    Disabled,
    Experimental,
}

/// Static description of a plugin, supplied at registration time (§4.5
/// "Plugin metadata").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    pub owner: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: PluginStatus,
    /// Plugins that must finish before this one runs.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Plugins this one starts after it finishes, regardless of their own `depends_on`.
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub config: serde_json::Value,
    pub input_spec: Vec<FieldSpec>,
    pub output_spec: Vec<FieldSpec>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Failure,
    InProgress,
    Timeout,
    InvalidConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionError {
    pub error_type: String,
    pub message: String,
    pub stack_trace: Option<String>,
}

/// Outcome of one plugin invocation (§4.5 "Execution semantics").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub result_id: String,
    pub analytics_id: String,
    pub status: ExecutionStatus,
    pub error: Option<ExecutionError>,
    pub execution_time_ms: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub config_used: serde_json::Value,
    pub input_data_used: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub output_result: serde_json::Value,
}

impl ExecutionResult {
    pub fn result_id_for(analytics_id: &str, start_time: DateTime<Utc>) -> String {
        format!("{analytics_id}_{}", start_time.format("%Y%m%d%H%M%S%6f"))
    }

    pub fn dependency_failure(
        analytics_id: &str,
        failed_predecessors: &[String],
        input_data_used: serde_json::Value,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            result_id: Self::result_id_for(analytics_id, start_time),
            analytics_id: analytics_id.to_string(),
            status: ExecutionStatus::Failure,
            error: Some(ExecutionError {
                error_type: "DependencyFailure".to_string(),
                message: format!("predecessor(s) failed: {}", failed_predecessors.join(", ")),
                stack_trace: None,
            }),
            execution_time_ms: 0.0,
            start_time,
            end_time: start_time,
            config_used: serde_json::Value::Null,
            input_data_used,
            output: None,
            output_result: serde_json::Value::Null,
        }
    }
}

/// A single analytics operation (§4.5). Registered once per `id`; invoked by
/// the engine's DAG executor with merged input from its predecessors.
#[async_trait]
pub trait AnalyticsPlugin: Send + Sync {
    fn metadata(&self) -> &PluginMetadata;

    /// Run the plugin against `input`, already validated against `input_spec`.
    async fn execute(&self, input: serde_json::Value, ctx: &PluginExecutionContext) -> anyhow::Result<serde_json::Value>;
}

/// Per-invocation collaborators a plugin needs to do its work: the tenant's
/// data manager and the engine-wide config.
pub struct PluginExecutionContext {
    pub data_manager: std::sync::Arc<agentlens_data::DataManager>,
    pub config: super::engine::AnalyticsEngineConfig,
}

pub type PluginMap = HashMap<String, std::sync::Arc<dyn AnalyticsPlugin>>;
