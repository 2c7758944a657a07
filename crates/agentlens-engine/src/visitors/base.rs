//! Shared machinery for task-extraction visitors (§4.4).
//!
//! The design ports a class hierarchy (`BaseTaskGraphVisitor` + one subclass
//! per framework) into one generic [`FrameworkVisitor<H>`] parameterized by a
//! [`FrameworkHandler`] — the dynamic dispatch the original gets from virtual
//! methods, we get from the trait object stored in the handler slot, without
//! needing a distinct struct per framework.

use std::collections::HashMap;

use agentlens_types::{ElementId, Task};

use crate::span_traversal::{SpanProcessor, TraversalContext, VisitPhase};

/// Stack of ancestor task ids currently in scope, per-trace.
pub const LAST_PARENTS: &str = "LAST_PARENTS";
/// `span_id -> element_id` for every span that became a task.
pub const SPAN_ID_TO_TASK: &str = "SPAN_ID_TO_TASK";
/// `element_id -> Task`, accumulated across the whole traversal run.
pub const TASKS: &str = "TASKS";
/// `element_id -> Action`, populated by the action visitor (§4.4).
pub const ACTIONS: &str = "ACTIONS";

pub type TaskMap = HashMap<ElementId, Task>;
pub type SpanToTaskMap = HashMap<String, ElementId>;
pub type ParentStack = Vec<ElementId>;

pub fn tasks_map(ctx: &mut TraversalContext) -> &mut TaskMap {
    ctx.get_or_insert_with(TASKS, TaskMap::new)
}

pub fn span_to_task_map(ctx: &mut TraversalContext) -> &mut SpanToTaskMap {
    ctx.get_or_insert_with(SPAN_ID_TO_TASK, SpanToTaskMap::new)
}

pub fn parent_stack(ctx: &mut TraversalContext) -> &mut ParentStack {
    ctx.get_or_insert_with(LAST_PARENTS, ParentStack::new)
}

/// Everything a framework-specific visitor needs to supply; the traversal
/// plumbing (stack push/pop, ctx bookkeeping, sibling-dependency pass at the
/// root) lives once in [`FrameworkVisitor`].
pub trait FrameworkHandler: Send + Sync {
    fn name(&self) -> &str;

    /// §4.4 `_is_framework_span`: first-match-wins detection.
    fn is_framework_span(&self, span: &agentlens_types::Span) -> bool;

    /// Builds the canonical Task for this span, given the current parent (if
    /// any). Returning `None` means "framework span, but no task created" —
    /// distinct from `is_framework_span` returning false.
    fn build_task(&self, span: &agentlens_types::Span, parent: Option<&Task>) -> Option<Task>;

    /// Sibling-dependency detection, run once per root task (§4.4 AFTER_CHILDREN
    /// on the root). Default: no-op: most frameworks don't have a generic
    /// equivalent; LangGraph/CrewAI override it.
    fn detect_sibling_dependencies(&self, _root_task_id: &ElementId, _ctx: &mut TraversalContext) {}
}

/// Generic `SpanProcessor` driving one [`FrameworkHandler`] through the base
/// algorithm (§4.4): create task on BEFORE_CHILDREN, push onto the parent
/// stack, pop on AFTER_CHILDREN, and run sibling-dependency detection when
/// popping back to the root.
pub struct FrameworkVisitor<H: FrameworkHandler> {
    pub handler: H,
}

impl<H: FrameworkHandler> FrameworkVisitor<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

impl<H: FrameworkHandler> SpanProcessor for FrameworkVisitor<H> {
    fn should_process(&self, span: &agentlens_types::Span, _ctx: &TraversalContext) -> bool {
        self.handler.is_framework_span(span)
    }

    fn process(&self, span: &agentlens_types::Span, phase: VisitPhase, ctx: &mut TraversalContext) {
        match phase {
            VisitPhase::BeforeChildren => {
                let parent_id = parent_stack(ctx).last().cloned();
                let parent_task = parent_id.as_ref().and_then(|id| tasks_map(ctx).get(id).cloned());

                let Some(task) = self.handler.build_task(span, parent_task.as_ref()) else {
                    return;
                };
                let task_id = task.header.element_id.clone();

                span_to_task_map(ctx).insert(span.context.span_id.clone(), task_id.clone());
                tasks_map(ctx).insert(task_id.clone(), task);
                parent_stack(ctx).push(task_id);
            }
            VisitPhase::AfterChildren => {
                let popped = parent_stack(ctx).pop();
                if let Some(task_id) = popped {
                    if parent_stack(ctx).is_empty() {
                        self.handler.detect_sibling_dependencies(&task_id, ctx);
                    }
                }
            }
        }
    }
}
