//! Shared entity taxonomy and identifiers for agentlens.
//!
//! This crate is the relational foundation: the Element taxonomy, typed ids,
//! and the Store query language. It has **no internal agentlens dependencies** —
//! a pure leaf crate that every other crate builds on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Trace (root)
//!     └── owns Span (context.trace_id == Trace.element_id)
//!     └── owns Task (root_id == Trace.element_id)
//!             └── references Action (action_id)
//!     └── owns Metric / Issue / Annotation (root_id == Trace.element_id)
//! TraceGroup (root)
//!     └── owns aggregate Metric (root_id == TraceGroup.element_id)
//!     └── owns TraceWorkflow (workflow_id, trace_id)
//! ```
//!
//! # Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ElementId`] | Process-wide unique, kind-prefixed or caller-supplied artifact id |
//! | [`TenantId`] | Internal per-tenant cache key |
//! | [`Element`] | The tagged-union artifact body |
//! | [`ElementHeader`] | Fields shared by every artifact (ownership + relation links) |
//! | [`QueryFilter`] | One predicate of the Store's typed query language |

pub mod analytics;
pub mod element;
pub mod ids;
pub mod query;
pub mod span;
pub mod task;
pub mod workflow;

pub use analytics::{Annotation, Issue, IssueLevel, Metric, MetricType, MetricValue, Recommendation};
pub use element::{Element, ElementHeader, ElementKind};
pub use ids::{ElementId, TenantId};
pub use query::{Query, QueryFilter, QueryOperator};
pub use span::{Span, SpanContext, SpanEvent, SpanKind, SpanLink, SpanResource, SpanStatus, Trace, TraceGroup};
pub use task::{Action, ActionKind, LogReference, Task, TaskInput, TaskKind, TaskOutput, TaskState, TaskStatus, TaskTag};
pub use workflow::{TraceWorkflow, Workflow, WorkflowEdge, WorkflowEdgeType, WorkflowNode, WorkflowNodeGateway};
