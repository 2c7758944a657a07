//! LangGraph visitor (§4.4): identifies graph nodes and records node
//! dependencies so [`FrameworkHandler::detect_sibling_dependencies`] can wire
//! `dependent_ids` between sibling tasks once the root is reached.

use std::collections::HashMap;

use agentlens_types::{ElementHeader, ElementId, LogReference, Span, Task, TaskKind, TaskTag};

use super::base::{tasks_map, FrameworkHandler};
use crate::span_traversal::TraversalContext;

pub struct LangGraphVisitor;

impl FrameworkHandler for LangGraphVisitor {
    fn name(&self) -> &str {
        "LangGraph processor"
    }

    fn is_framework_span(&self, span: &Span) -> bool {
        span.service_name() == "langgraph" || span.raw_attributes.contains_key("langgraph.node.name")
    }

    fn build_task(&self, span: &Span, _parent: Option<&Task>) -> Option<Task> {
        let node_name = span
            .raw_attributes
            .get("langgraph.node.name")
            .and_then(|v| v.as_str())
            .unwrap_or(&span.name)
            .to_string();

        let mut header = ElementHeader::new(ElementId::from_string(format!("task_{}", span.context.span_id)));
        header.root_id = Some(ElementId::from_string(span.context.trace_id.clone()));
        header.name = Some(node_name.clone());

        let mut task = Task {
            header,
            kind: Some(TaskKind::Agent),
            state: None,
            status: None,
            input: None,
            output: None,
            start_time: span.start_time,
            end_time: span.end_time,
            events: span.events.clone(),
            issues: Vec::new(),
            metrics: HashMap::new(),
            parent_id: span.parent_id.clone(),
            dependent_ids: Vec::new(),
            action_id: None,
            log_reference: Some(LogReference {
                trace_id: span.context.trace_id.clone(),
                span_id: span.context.span_id.clone(),
                parent_span_id: span.parent_id.clone(),
            }),
            code_id: None,
            code_vendor: None,
            requester_id: None,
            requester_type: None,
            requester_role: None,
            request_id: None,
            session_id: None,
            dependencies_ids: Vec::new(),
            priority: None,
            graph_id: span.raw_attributes.get("langgraph.graph.id").and_then(|v| v.as_str()).map(String::from),
            parent_name: Some(node_name),
        };
        task.add_tag(TaskTag::Langgraph);
        Some(task)
    }

    /// Wires a `dependent_ids` edge from each child task to its immediately
    /// preceding sibling, in start-time order — the node-sequencing a graph
    /// executor enforces (§4.4 "extract node dependencies from span attributes").
    fn detect_sibling_dependencies(&self, root_task_id: &ElementId, ctx: &mut TraversalContext) {
        let tasks = tasks_map(ctx);
        let mut siblings: Vec<(ElementId, chrono::DateTime<chrono::Utc>)> = tasks
            .values()
            .filter(|t| t.parent_id.as_deref() == Some(root_task_id.as_str()))
            .map(|t| (t.header.element_id.clone(), t.start_time))
            .collect();
        siblings.sort_by_key(|(_, start)| *start);

        for window in siblings.windows(2) {
            let (prev_id, _) = &window[0];
            let (curr_id, _) = &window[1];
            if let Some(task) = tasks.get_mut(curr_id) {
                task.dependent_ids.push(prev_id.as_str().to_string());
            }
        }
    }
}
