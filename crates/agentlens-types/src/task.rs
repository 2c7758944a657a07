//! Task and Action bodies — produced by the task-extraction visitor pipeline (§4.4).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::element::ElementHeader;
use crate::span::SpanEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskKind {
    Manual,
    Llm,
    Tool,
    Retriever,
    Agent,
    Guardrail,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskState {
    Created,
    Running,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Failure,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum TaskTag {
    Manual,
    Llm,
    Langchain,
    Langgraph,
    Crewai,
    Vectordb,
    Langfuse,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaskInput {
    pub goal: Option<String>,
    pub instructions: Option<serde_json::Value>,
    pub examples: Option<serde_json::Value>,
    pub data: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaskOutput {
    pub data: Option<String>,
    pub data_values: Option<serde_json::Value>,
    pub data_ranking: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

/// `{trace_id, span_id, parent_span_id}` — where a task came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogReference {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
}

/// A semantic unit of work, extracted from one or more spans (§3, §4.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    #[serde(flatten)]
    pub header: ElementHeader,
    pub kind: Option<TaskKind>,
    pub state: Option<TaskState>,
    pub status: Option<TaskStatus>,
    pub input: Option<TaskInput>,
    pub output: Option<TaskOutput>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub events: Vec<SpanEvent>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
    pub parent_id: Option<String>,
    /// Ids of prerequisite tasks, in order — the sibling-dependency edges §4.4 describes.
    #[serde(default)]
    pub dependent_ids: Vec<String>,
    pub action_id: Option<String>,
    pub log_reference: Option<LogReference>,

    // Extraction-time fields carried from the `gen_ai.task.*` attribute schema.
    pub code_id: Option<String>,
    pub code_vendor: Option<String>,
    pub requester_id: Option<String>,
    pub requester_type: Option<String>,
    pub requester_role: Option<String>,
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub dependencies_ids: Vec<String>,
    pub priority: Option<String>,
    pub graph_id: Option<String>,
    pub parent_name: Option<String>,
}

impl Task {
    pub fn add_tag(&mut self, tag: TaskTag) {
        let s = tag.to_string();
        if !self.header.tags.contains(&s) {
            self.header.tags.push(s);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Llm,
    Tool,
    VectorDb,
    Ml,
    Guardrail,
    Human,
    Other,
}

/// A reusable identity for a piece of code — deduplicated by `code_id` (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub header: ElementHeader,
    /// Semantic identity: `file:line:qualified-name`, or a synthesized equivalent.
    pub code_id: String,
    pub kind: ActionKind,
    pub input_schema: Option<serde_json::Value>,
    pub output_schema: Option<serde_json::Value>,
    pub is_generated: bool,
    #[serde(default)]
    pub consumed_resources: HashMap<String, serde_json::Value>,
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.code_id == other.code_id
    }
}
impl Eq for Action {}
