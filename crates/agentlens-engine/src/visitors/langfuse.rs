//! Langfuse visitor (§4.4): an `observation_type` attribute maps to a
//! canonical task tag/action kind (`generation`, `tool`, `retriever`, `agent`,
//! `guardrail`).

use std::collections::HashMap;

use agentlens_types::{ElementHeader, ElementId, LogReference, Span, Task, TaskKind, TaskTag};

use super::base::FrameworkHandler;

const OBSERVATION_TYPE: &str = "langfuse.observation.type";

pub struct LangfuseVisitor;

fn observation_kind(observation_type: &str) -> (TaskKind, TaskTag) {
    match observation_type {
        "generation" => (TaskKind::Llm, TaskTag::Llm),
        "tool" => (TaskKind::Tool, TaskTag::Langfuse),
        "retriever" => (TaskKind::Retriever, TaskTag::Langfuse),
        "agent" => (TaskKind::Agent, TaskTag::Langfuse),
        "guardrail" => (TaskKind::Guardrail, TaskTag::Langfuse),
        _ => (TaskKind::Other, TaskTag::Langfuse),
    }
}

impl FrameworkHandler for LangfuseVisitor {
    fn name(&self) -> &str {
        "Langfuse processor"
    }

    fn is_framework_span(&self, span: &Span) -> bool {
        span.raw_attributes.contains_key(OBSERVATION_TYPE)
    }

    fn build_task(&self, span: &Span, _parent: Option<&Task>) -> Option<Task> {
        let observation_type = span.raw_attributes.get(OBSERVATION_TYPE).and_then(|v| v.as_str()).unwrap_or("");
        let (kind, tag) = observation_kind(observation_type);

        let mut header = ElementHeader::new(ElementId::from_string(format!("task_{}", span.context.span_id)));
        header.root_id = Some(ElementId::from_string(span.context.trace_id.clone()));
        header.name = Some(span.name.clone());

        let mut task = Task {
            header,
            kind: Some(kind),
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
            graph_id: None,
            parent_name: None,
        };
        task.add_tag(tag);
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_types::{SpanContext, SpanKind, SpanResource, SpanStatus};
    use chrono::Utc;

    #[test]
    fn maps_generation_observation_to_llm_kind() {
        let visitor = LangfuseVisitor;
        let mut attrs = HashMap::new();
        attrs.insert(OBSERVATION_TYPE.to_string(), serde_json::Value::String("generation".to_string()));
        let span = Span {
            header: ElementHeader::new(ElementId::from_string("S1")),
            context: SpanContext { trace_id: "T1".into(), span_id: "S1".into() },
            parent_id: None,
            name: "observation".to_string(),
            kind: SpanKind::Internal,
            start_time: Utc::now(),
            end_time: Utc::now(),
            status: SpanStatus::Ok,
            resource: SpanResource::default(),
            raw_attributes: attrs,
            events: vec![],
            links: vec![],
        };
        let task = visitor.build_task(&span, None).unwrap();
        assert_eq!(task.kind, Some(TaskKind::Llm));
    }
}
