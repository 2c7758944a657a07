//! Span tree traversal (§4.3): a two-phase depth-first walk over the span
//! forest, with a registry of processors applied at each node.

use std::collections::{HashMap, HashSet};

use agentlens_types::Span;

/// Which side of a node's children a processor is being invoked on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitPhase {
    BeforeChildren,
    AfterChildren,
}

/// Shared, string-keyed scratchpad passed through one traversal run.
/// Conventional keys (§4.3): `LAST_PARENTS`, `SPAN_ID_TO_TASK`, `TASKS`, `ACTIONS`.
#[derive(Default)]
pub struct TraversalContext {
    values: HashMap<String, Box<dyn std::any::Any + Send>>,
}

impl TraversalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: 'static>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    pub fn get_or_insert_with<T: Send + 'static>(&mut self, key: &str, default: impl FnOnce() -> T) -> &mut T {
        self.values
            .entry(key.to_string())
            .or_insert_with(|| Box::new(default()))
            .downcast_mut::<T>()
            .expect("traversal context key reused with a different type")
    }

    pub fn set<T: Send + 'static>(&mut self, key: &str, value: T) {
        self.values.insert(key.to_string(), Box::new(value));
    }
}

/// One stage of the task-extraction pipeline (§4.4): a framework visitor, the
/// action visitor, or any other per-span processor.
pub trait SpanProcessor: Send + Sync {
    /// Whether this processor wants to see `span` at all. Most processors
    /// answer unconditionally `true` and make their real decision inside
    /// `process` — this hook exists for processors that can cheaply skip
    /// spans outside their framework (e.g. by `resource.service_name`).
    fn should_process(&self, span: &Span, ctx: &TraversalContext) -> bool {
        let _ = (span, ctx);
        true
    }

    fn process(&self, span: &Span, phase: VisitPhase, ctx: &mut TraversalContext);

    /// Called once after the whole forest has been walked.
    fn after_traversal(&self, ctx: &mut TraversalContext) {
        let _ = ctx;
    }
}

/// Walks a span forest depth-first, applying every registered [`SpanProcessor`]
/// at each node in registration order (stack-like: first-registered sees a
/// span first on the way down, last on the way up).
#[derive(Default)]
pub struct SpanTreeTraverser {
    processors: Vec<Box<dyn SpanProcessor>>,
}

impl SpanTreeTraverser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_processor(&mut self, processor: Box<dyn SpanProcessor>) {
        self.processors.push(processor);
    }

    pub fn traverse(&self, spans: &[Span], ctx: &mut TraversalContext) {
        let children_map = Self::build_children_map(spans);

        let span_by_id: HashMap<&str, &Span> = spans.iter().map(|s| (s.context.span_id.as_str(), s)).collect();

        let mut roots: Vec<&Span> = spans
            .iter()
            .filter(|s| match &s.parent_id {
                None => true,
                Some(parent_id) => !span_by_id.contains_key(parent_id.as_str()),
            })
            .collect();
        roots.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.context.span_id.cmp(&b.context.span_id)));

        let mut visited = HashSet::new();
        for root in roots {
            self.traverse_span(root, &children_map, &mut visited, ctx);
        }

        for processor in &self.processors {
            processor.after_traversal(ctx);
        }
    }

    fn build_children_map<'a>(spans: &'a [Span]) -> HashMap<&'a str, Vec<&'a Span>> {
        let mut map: HashMap<&str, Vec<&Span>> = HashMap::new();
        for span in spans {
            if let Some(parent_id) = &span.parent_id {
                map.entry(parent_id.as_str()).or_default().push(span);
            }
        }
        for children in map.values_mut() {
            children.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.context.span_id.cmp(&b.context.span_id)));
        }
        map
    }

    fn traverse_span<'a>(
        &self,
        span: &'a Span,
        children_map: &HashMap<&'a str, Vec<&'a Span>>,
        visited: &mut HashSet<String>,
        ctx: &mut TraversalContext,
    ) {
        if !visited.insert(span.context.span_id.clone()) {
            return;
        }

        for processor in &self.processors {
            if processor.should_process(span, ctx) {
                processor.process(span, VisitPhase::BeforeChildren, ctx);
            }
        }

        if let Some(children) = children_map.get(span.context.span_id.as_str()) {
            for child in children {
                self.traverse_span(child, children_map, visited, ctx);
            }
        }

        for processor in &self.processors {
            if processor.should_process(span, ctx) {
                processor.process(span, VisitPhase::AfterChildren, ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_types::{ElementHeader, ElementId, SpanContext, SpanKind, SpanResource, SpanStatus};
    use chrono::{Duration, Utc};
    use std::sync::Mutex;

    fn span(id: &str, parent: Option<&str>, offset_secs: i64) -> Span {
        Span {
            header: ElementHeader::new(ElementId::from_string(id)),
            context: SpanContext {
                trace_id: "T1".to_string(),
                span_id: id.to_string(),
            },
            parent_id: parent.map(|p| p.to_string()),
            name: id.to_string(),
            kind: SpanKind::Internal,
            start_time: Utc::now() + Duration::seconds(offset_secs),
            end_time: Utc::now() + Duration::seconds(offset_secs + 1),
            status: SpanStatus::Ok,
            resource: SpanResource::default(),
            raw_attributes: Default::default(),
            events: vec![],
            links: vec![],
        }
    }

    struct RecordingProcessor {
        log: Mutex<Vec<String>>,
    }

    impl SpanProcessor for RecordingProcessor {
        fn process(&self, span: &Span, phase: VisitPhase, _ctx: &mut TraversalContext) {
            let tag = match phase {
                VisitPhase::BeforeChildren => "before",
                VisitPhase::AfterChildren => "after",
            };
            self.log.lock().unwrap().push(format!("{tag}:{}", span.name));
        }
    }

    #[test]
    fn visits_depth_first_with_before_after_phases() {
        let spans = vec![
            span("root", None, 0),
            span("child_a", Some("root"), 1),
            span("child_b", Some("root"), 2),
            span("grandchild", Some("child_a"), 2),
        ];

        let mut traverser = SpanTreeTraverser::new();
        let recorder = std::sync::Arc::new(RecordingProcessor { log: Mutex::new(Vec::new()) });
        traverser.register_processor(Box::new(TestProxy(recorder.clone())));

        let mut ctx = TraversalContext::new();
        traverser.traverse(&spans, &mut ctx);

        let log = recorder.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "before:root",
                "before:child_a",
                "before:grandchild",
                "after:grandchild",
                "after:child_a",
                "before:child_b",
                "after:child_b",
                "after:root",
            ]
        );
    }

    struct TestProxy(std::sync::Arc<RecordingProcessor>);
    impl SpanProcessor for TestProxy {
        fn process(&self, span: &Span, phase: VisitPhase, ctx: &mut TraversalContext) {
            self.0.process(span, phase, ctx);
        }
    }

    #[test]
    fn duplicate_span_id_in_input_is_visited_once() {
        let spans = vec![span("root", None, 0), span("root", None, 0)];
        let mut traverser = SpanTreeTraverser::new();
        let recorder = std::sync::Arc::new(RecordingProcessor { log: Mutex::new(Vec::new()) });
        traverser.register_processor(Box::new(TestProxy(recorder.clone())));

        let mut ctx = TraversalContext::new();
        traverser.traverse(&spans, &mut ctx);
        assert_eq!(recorder.log.lock().unwrap().len(), 2);
    }
}
