//! The LLM task visitor (§4.4): detects chat/completion spans by name and
//! extracts prompt/completion content plus `gen_ai.usage.*` token counts.

use std::collections::HashMap;

use agentlens_types::{ElementHeader, ElementId, LogReference, Span, Task, TaskInput, TaskKind, TaskOutput, TaskTag};
use serde_json::Value;

use super::base::FrameworkHandler;

const KNOWN_LLM_SPAN_NAMES: &[&str] = &["llm.generate", "chat.completions"];

pub struct LlmVisitor;

fn token_count(attrs: &HashMap<String, Value>, key: &str) -> Option<f64> {
    attrs.get(key).and_then(|v| v.as_f64())
}

impl FrameworkHandler for LlmVisitor {
    fn name(&self) -> &str {
        "LLM processor"
    }

    fn is_framework_span(&self, span: &Span) -> bool {
        span.name.ends_with(".chat") || KNOWN_LLM_SPAN_NAMES.contains(&span.name.as_str())
    }

    fn build_task(&self, span: &Span, _parent: Option<&Task>) -> Option<Task> {
        let attrs = &span.raw_attributes;

        let prompt = span
            .events
            .iter()
            .find(|e| e.name == "gen_ai.content.prompt")
            .and_then(|e| e.attributes.get("content").cloned());
        let completion = span
            .events
            .iter()
            .find(|e| e.name == "gen_ai.content.completion")
            .and_then(|e| e.attributes.get("content").cloned());

        let mut metrics = HashMap::new();
        if let Some(t) = token_count(attrs, "gen_ai.usage.prompt_tokens") {
            metrics.insert("prompt_tokens".to_string(), t);
        }
        if let Some(t) = token_count(attrs, "gen_ai.usage.completion_tokens") {
            metrics.insert("completion_tokens".to_string(), t);
        }

        let mut header = ElementHeader::new(ElementId::from_string(format!("task_{}", span.context.span_id)));
        header.root_id = Some(ElementId::from_string(span.context.trace_id.clone()));
        header.name = Some(span.name.trim_end_matches(".chat").to_string());

        let mut task = Task {
            header,
            kind: Some(TaskKind::Llm),
            state: None,
            status: None,
            input: prompt.map(|p| TaskInput {
                goal: None,
                instructions: None,
                examples: None,
                data: p.as_str().map(String::from),
                metadata: None,
            }),
            output: completion.map(|c| TaskOutput {
                data: c.as_str().map(String::from),
                data_values: None,
                data_ranking: None,
                metadata: None,
            }),
            start_time: span.start_time,
            end_time: span.end_time,
            events: span.events.clone(),
            issues: Vec::new(),
            metrics,
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

        task.add_tag(TaskTag::Llm);
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_types::{SpanContext, SpanKind, SpanResource, SpanStatus};
    use chrono::Utc;

    #[test]
    fn detects_spans_ending_in_dot_chat() {
        let visitor = LlmVisitor;
        let span = Span {
            header: ElementHeader::new(ElementId::from_string("S1")),
            context: SpanContext { trace_id: "T1".into(), span_id: "S1".into() },
            parent_id: None,
            name: "openai.chat".to_string(),
            kind: SpanKind::Client,
            start_time: Utc::now(),
            end_time: Utc::now(),
            status: SpanStatus::Ok,
            resource: SpanResource::default(),
            raw_attributes: Default::default(),
            events: vec![],
            links: vec![],
        };
        assert!(visitor.is_framework_span(&span));
        let task = visitor.build_task(&span, None).unwrap();
        assert_eq!(task.kind, Some(TaskKind::Llm));
    }
}
