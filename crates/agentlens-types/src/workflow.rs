//! Workflow, WorkflowNode, WorkflowEdge, TraceWorkflow — the discovered process graph (§4.6).

use serde::{Deserialize, Serialize};

use crate::element::ElementHeader;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowEdgeType {
    Sequence,
    And,
    Xor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowNodeGateway {
    None,
    AndSplit,
    AndJoin,
    XorSplit,
    XorJoin,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(flatten)]
    pub header: ElementHeader,
    #[serde(default)]
    pub node_ids: Vec<String>,
    #[serde(default)]
    pub edge_ids: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowNode {
    #[serde(flatten)]
    pub header: ElementHeader,
    pub activity_name: String,
    pub gateway: WorkflowNodeGateway,
    pub action_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowEdge {
    #[serde(flatten)]
    pub header: ElementHeader,
    pub source_node_id: String,
    pub target_node_id: String,
    pub edge_type: WorkflowEdgeType,
    /// Fraction of observed traces exhibiting this transition.
    pub support: f64,
}

/// A Workflow materialized against one specific trace (the process-mining output
/// bound back to concrete task executions).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceWorkflow {
    #[serde(flatten)]
    pub header: ElementHeader,
    pub workflow_id: String,
    pub trace_id: String,
}
