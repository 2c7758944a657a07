//! # agentlens-engine
//!
//! Span traversal, the task-extraction visitor pipeline, and the analytics
//! plugin registry/execution engine (§4.4, §4.5, §4.6).
//!
//! A trace's spans go in one end (`span_traversal` + `visitors`) and come out
//! the other as persisted Tasks, Actions, Issues, Annotations, Metrics, and
//! discovered Workflows (`analytics` + `plugins`), all driven by plugins
//! registered in an [`analytics::AnalyticsRegistry`] and executed as a DAG by
//! an [`analytics::AnalyticsEngine`].

pub mod analytics;
pub mod error;
pub mod plugins;
pub mod span_traversal;
pub mod visitors;

pub use analytics::{
    AnalyticsEngine, AnalyticsEngineConfig, AnalyticsPlugin, AnalyticsRegistry, ExecutionError, ExecutionResult, ExecutionStatus, FieldSpec,
    FieldType, PluginExecutionContext, PluginMap, PluginMetadata, PluginStatus,
};
pub use error::{AnalyticsError, AnalyticsResult};
pub use plugins::{
    register_default_plugins, AnnotationAnalytics, CausalDiscovery, ChangePointDetector, CycleDetector, IssueAnalytics,
    IssueDistributionTrace, TaskAnalytics,
};
pub use span_traversal::{SpanProcessor, SpanTreeTraverser, TraversalContext, VisitPhase};
pub use visitors::{default_pipeline, take_tasks, ActionDedupMap, ActionVisitor, FrameworkHandler};
