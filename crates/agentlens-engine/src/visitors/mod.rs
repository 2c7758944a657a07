//! Task-extraction visitor pipeline (§4.4): one [`SpanProcessor`](crate::span_traversal::SpanProcessor)
//! per supported framework, first-match-wins, plus the Action visitor that
//! runs after every framework visitor has had a chance to claim the span.

pub mod actions;
pub mod base;
pub mod crewai;
pub mod langchain;
pub mod langfuse;
pub mod langgraph;
pub mod llm;
pub mod manual;
pub mod vectordb;

use base::{FrameworkVisitor, TASKS};

pub use actions::{ActionDedupMap, ActionVisitor};
pub use base::{FrameworkHandler, ParentStack, SpanToTaskMap, TaskMap, ACTIONS};
pub use crewai::CrewAiVisitor;
pub use langchain::LangChainVisitor;
pub use langfuse::LangfuseVisitor;
pub use langgraph::LangGraphVisitor;
pub use llm::LlmVisitor;
pub use manual::ManualVisitor;
pub use vectordb::VectorDbVisitor;

use crate::span_traversal::SpanProcessor;

/// Builds the default pipeline in detection-priority order (§4.4): manual,
/// LLM, LangChain, LangGraph, CrewAI, VectorDB, Langfuse, then Actions.
///
/// `dedup` is shared with every caller that processes spans belonging to the
/// same process, so identical `code_id`s collapse to one canonical Action
/// across traces.
pub fn default_pipeline(dedup: ActionDedupMap) -> Vec<Box<dyn SpanProcessor>> {
    vec![
        Box::new(FrameworkVisitor::new(ManualVisitor)),
        Box::new(FrameworkVisitor::new(LlmVisitor)),
        Box::new(FrameworkVisitor::new(LangChainVisitor)),
        Box::new(FrameworkVisitor::new(LangGraphVisitor)),
        Box::new(FrameworkVisitor::new(CrewAiVisitor)),
        Box::new(FrameworkVisitor::new(VectorDbVisitor)),
        Box::new(FrameworkVisitor::new(LangfuseVisitor)),
        Box::new(ActionVisitor::new(dedup)),
    ]
}

/// Drains the accumulated tasks out of a finished traversal's context.
pub fn take_tasks(ctx: &mut crate::span_traversal::TraversalContext) -> TaskMap {
    ctx.get_mut::<TaskMap>(TASKS).map(std::mem::take).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span_traversal::{SpanTreeTraverser, TraversalContext};
    use agentlens_types::{ElementHeader, ElementId, Span, SpanContext, SpanKind, SpanResource, SpanStatus};
    use chrono::Utc;
    use std::collections::HashMap as StdHashMap;
    use std::sync::{Arc, Mutex};

    fn manual_span(id: &str, task_id: &str) -> Span {
        let mut attrs = StdHashMap::new();
        attrs.insert("gen_ai.task.id".to_string(), serde_json::Value::String(task_id.to_string()));
        Span {
            header: ElementHeader::new(ElementId::from_string(id)),
            context: SpanContext { trace_id: "T1".into(), span_id: id.to_string() },
            parent_id: None,
            name: "do_work.task".to_string(),
            kind: SpanKind::Internal,
            start_time: Utc::now(),
            end_time: Utc::now(),
            status: SpanStatus::Ok,
            resource: SpanResource::default(),
            raw_attributes: attrs,
            events: vec![],
            links: vec![],
        }
    }

    #[test]
    fn default_pipeline_turns_manual_span_into_task_with_root_action() {
        let dedup: ActionDedupMap = Arc::new(Mutex::new(StdHashMap::new()));
        let mut traverser = SpanTreeTraverser::new();
        for processor in default_pipeline(dedup) {
            traverser.register_processor(processor);
        }

        let spans = vec![manual_span("S1", "Task-42")];
        let mut ctx = TraversalContext::new();
        traverser.traverse(&spans, &mut ctx);

        let tasks = take_tasks(&mut ctx);
        let task = tasks.get(&ElementId::from_string("Task-42")).expect("manual task created");
        let action_id = task.action_id.as_deref().expect("root task gets an action");

        let actions = ctx.get::<StdHashMap<ElementId, agentlens_types::Action>>(ACTIONS).unwrap();
        let root_action = actions.get(&ElementId::from_string(action_id)).expect("canonical action recorded");
        assert_eq!(root_action.code_id, "main");
    }
}
