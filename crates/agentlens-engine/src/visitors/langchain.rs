//! LangChain/LangGraph share a detection strategy: a `resource.service_name`
//! tag or a framework-specific attribute identifies spans belonging to a
//! graph-structured agent run (§4.4).

use std::collections::HashMap;

use agentlens_types::{ElementHeader, ElementId, LogReference, Span, Task, TaskKind, TaskTag};

use super::base::FrameworkHandler;

pub struct LangChainVisitor;

fn is_langchain_span(span: &Span) -> bool {
    span.service_name() == "langchain" || span.raw_attributes.contains_key("langchain.chain.type")
}

impl FrameworkHandler for LangChainVisitor {
    fn name(&self) -> &str {
        "LangChain processor"
    }

    fn is_framework_span(&self, span: &Span) -> bool {
        is_langchain_span(span)
    }

    fn build_task(&self, span: &Span, _parent: Option<&Task>) -> Option<Task> {
        let mut header = ElementHeader::new(ElementId::from_string(format!("task_{}", span.context.span_id)));
        header.root_id = Some(ElementId::from_string(span.context.trace_id.clone()));
        header.name = Some(span.name.clone());

        let graph_id = span.raw_attributes.get("langchain.graph.id").and_then(|v| v.as_str()).map(String::from);

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
            graph_id,
            parent_name: None,
        };
        task.add_tag(TaskTag::Langchain);
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_types::{SpanContext, SpanKind, SpanResource, SpanStatus};
    use chrono::Utc;

    #[test]
    fn detects_by_service_name() {
        let visitor = LangChainVisitor;
        let mut resource = SpanResource::default();
        resource.service_name = "langchain".to_string();
        let span = Span {
            header: ElementHeader::new(ElementId::from_string("S1")),
            context: SpanContext { trace_id: "T1".into(), span_id: "S1".into() },
            parent_id: None,
            name: "chain.invoke".to_string(),
            kind: SpanKind::Internal,
            start_time: Utc::now(),
            end_time: Utc::now(),
            status: SpanStatus::Ok,
            resource,
            raw_attributes: Default::default(),
            events: vec![],
            links: vec![],
        };
        assert!(visitor.is_framework_span(&span));
    }
}
