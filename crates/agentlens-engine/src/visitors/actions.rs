//! The Action visitor (§4.4): runs last, orthogonal to the framework
//! visitors. Synthesizes an [`Action`] for any span that either carries a
//! manual `gen_ai.action.*` attribute set, was already turned into a Task by
//! an earlier visitor, or matches a known action span-name table.
//!
//! Actions are deduplicated by `code_id` in a process-wide map guarded by a
//! single mutex, so concurrent trace processing collapses identical actions
//! (§5 "the first writer wins for a given code_id").

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use agentlens_types::{Action, ActionKind, ElementHeader, ElementId, Span};

use super::base::{span_to_task_map, tasks_map, ACTIONS};
use crate::span_traversal::{SpanProcessor, TraversalContext, VisitPhase};

const KNOWN_ACTION_SPAN_NAMES: &[&str] = &["http.request", "db.query", "file.read", "file.write"];
const MAIN_ACTION_CODE_ID: &str = "main";

/// Shared, process-wide dedup map: `code_id -> canonical Action`.
pub type ActionDedupMap = Arc<Mutex<HashMap<String, Action>>>;

pub struct ActionVisitor {
    dedup: ActionDedupMap,
}

impl ActionVisitor {
    pub fn new(dedup: ActionDedupMap) -> Self {
        Self { dedup }
    }

    fn manual_action_code_id(span: &Span) -> Option<String> {
        span.raw_attributes.get("gen_ai.action.code.id").and_then(|v| v.as_str()).map(String::from)
    }

    fn action_kind_for(span: &Span) -> ActionKind {
        span.raw_attributes
            .get("gen_ai.action.kind")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(ActionKind::Other)
    }

    /// Resolve or create the canonical Action for `code_id`, returning its id.
    fn canonicalize(&self, code_id: String, kind: ActionKind) -> ElementId {
        let mut dedup = self.dedup.lock().expect("action dedup mutex poisoned");
        let action = dedup.entry(code_id.clone()).or_insert_with(|| Action {
            header: ElementHeader::new(ElementId::generate("Action")),
            code_id,
            kind,
            input_schema: None,
            output_schema: None,
            is_generated: false,
            consumed_resources: HashMap::new(),
        });
        action.header.element_id.clone()
    }
}

impl SpanProcessor for ActionVisitor {
    fn should_process(&self, span: &Span, ctx: &TraversalContext) -> bool {
        Self::manual_action_code_id(span).is_some()
            || ctx.get::<super::base::SpanToTaskMap>(super::base::SPAN_ID_TO_TASK).is_some_and(|m| m.contains_key(&span.context.span_id))
            || KNOWN_ACTION_SPAN_NAMES.contains(&span.name.as_str())
    }

    fn process(&self, span: &Span, phase: VisitPhase, ctx: &mut TraversalContext) {
        if phase != VisitPhase::BeforeChildren {
            return;
        }

        let code_id = Self::manual_action_code_id(span).unwrap_or_else(|| span.name.clone());
        let kind = Self::action_kind_for(span);
        let action_id = self.canonicalize(code_id, kind);

        if let Some(task_id) = span_to_task_map(ctx).get(&span.context.span_id).cloned() {
            if let Some(task) = tasks_map(ctx).get_mut(&task_id) {
                task.action_id = Some(action_id.as_str().to_string());
            }
        }
    }

    fn after_traversal(&self, ctx: &mut TraversalContext) {
        let root_task_ids: Vec<ElementId> = tasks_map(ctx)
            .values()
            .filter(|t| t.parent_id.is_none())
            .map(|t| t.header.element_id.clone())
            .collect();

        for root_id in root_task_ids {
            let main_action_id = self.canonicalize(MAIN_ACTION_CODE_ID.to_string(), ActionKind::Other);
            if let Some(task) = tasks_map(ctx).get_mut(&root_id) {
                task.action_id = Some(main_action_id.as_str().to_string());
            }
        }

        let dedup = self.dedup.lock().expect("action dedup mutex poisoned");
        let actions: HashMap<ElementId, Action> =
            dedup.values().map(|a| (a.header.element_id.clone(), a.clone())).collect();
        ctx.set(ACTIONS, actions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_types::{ElementKind, SpanContext, SpanKind, SpanResource, SpanStatus, Task, TaskKind};
    use chrono::Utc;

    fn span(id: &str, name: &str) -> Span {
        Span {
            header: ElementHeader::new(ElementId::from_string(id)),
            context: SpanContext { trace_id: "T1".into(), span_id: id.to_string() },
            parent_id: None,
            name: name.to_string(),
            kind: SpanKind::Internal,
            start_time: Utc::now(),
            end_time: Utc::now(),
            status: SpanStatus::Ok,
            resource: SpanResource::default(),
            raw_attributes: Default::default(),
            events: vec![],
            links: vec![],
        }
    }

    #[test]
    fn same_code_id_dedups_to_one_action() {
        let dedup: ActionDedupMap = Arc::new(Mutex::new(HashMap::new()));
        let visitor = ActionVisitor::new(dedup.clone());
        let mut ctx = TraversalContext::new();

        visitor.process(&span("S1", "http.request"), VisitPhase::BeforeChildren, &mut ctx);
        visitor.process(&span("S2", "http.request"), VisitPhase::BeforeChildren, &mut ctx);

        assert_eq!(dedup.lock().unwrap().len(), 1);
    }

    #[test]
    fn root_task_gets_synthetic_main_action() {
        let dedup: ActionDedupMap = Arc::new(Mutex::new(HashMap::new()));
        let visitor = ActionVisitor::new(dedup.clone());
        let mut ctx = TraversalContext::new();

        let mut header = ElementHeader::new(ElementId::from_string("Task-root"));
        header.root_id = Some(ElementId::from_string("T1"));
        let task = Task {
            header,
            kind: Some(TaskKind::Manual),
            state: None,
            status: None,
            input: None,
            output: None,
            start_time: Utc::now(),
            end_time: Utc::now(),
            events: vec![],
            issues: vec![],
            metrics: Default::default(),
            parent_id: None,
            dependent_ids: vec![],
            action_id: None,
            log_reference: None,
            code_id: None,
            code_vendor: None,
            requester_id: None,
            requester_type: None,
            requester_role: None,
            request_id: None,
            session_id: None,
            dependencies_ids: vec![],
            priority: None,
            graph_id: None,
            parent_name: None,
        };
        tasks_map(&mut ctx).insert(ElementId::from_string("Task-root"), task);

        visitor.after_traversal(&mut ctx);

        let task = tasks_map(&mut ctx).get(&ElementId::from_string("Task-root")).unwrap();
        assert!(task.action_id.is_some());
        let actions = ctx.get::<HashMap<ElementId, Action>>(ACTIONS).unwrap();
        assert_eq!(actions.len(), 1);
        let _ = ElementKind::Action;
    }
}
