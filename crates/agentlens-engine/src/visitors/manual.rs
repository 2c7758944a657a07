//! The Manual task visitor (§4.4): attribute `gen_ai.task.id` present → always
//! create a task, parsing the full `gen_ai.task.*` attribute schema.

use std::collections::HashMap;
use std::str::FromStr;

use agentlens_types::{
    ElementHeader, ElementId, LogReference, Task, TaskInput, TaskOutput, TaskState, TaskStatus, TaskTag,
};
use agentlens_types::{Span, TaskKind};
use serde_json::Value;

use super::base::FrameworkHandler;

const OTEL_TASK_ID: &str = "gen_ai.task.id";
const TASK_SUFFIX: &str = ".task";

pub struct ManualVisitor;

fn attr_str<'a>(attrs: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    attrs.get(key).and_then(|v| v.as_str())
}

fn attr_json(attrs: &HashMap<String, Value>, key: &str) -> Option<Value> {
    attrs.get(key).and_then(|v| match v {
        Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.clone()),
    })
}

impl FrameworkHandler for ManualVisitor {
    fn name(&self) -> &str {
        "ManualTask processor"
    }

    fn is_framework_span(&self, span: &Span) -> bool {
        span.raw_attributes.contains_key(OTEL_TASK_ID)
    }

    fn build_task(&self, span: &Span, _parent: Option<&Task>) -> Option<Task> {
        let attrs = &span.raw_attributes;

        let task_element_id = attr_str(attrs, OTEL_TASK_ID)
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("task_{}", span.context.span_id));

        let raw_name = attr_str(attrs, "gen_ai.task.name")
            .map(|s| s.to_string())
            .unwrap_or_else(|| span.name.replace(".task", ""));
        let name = raw_name.split(TASK_SUFFIX).next().unwrap_or(&raw_name).to_string();

        let tags: Vec<String> = attr_json(attrs, "gen_ai.task.tags")
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let kind = attr_str(attrs, "gen_ai.task.kind").and_then(|s| TaskKind::from_str(s).ok());
        let state = attr_str(attrs, "gen_ai.task.state").and_then(|s| TaskState::from_str(s).ok());
        let status = attr_str(attrs, "gen_ai.task.status")
            .map(|s| TaskStatus::from_str(s).unwrap_or(TaskStatus::Unknown));

        let has_input = attrs.keys().any(|k| k.starts_with("gen_ai.task.input."));
        let input = has_input.then(|| TaskInput {
            goal: attr_str(attrs, "gen_ai.task.input.goal").map(String::from),
            instructions: attr_json(attrs, "gen_ai.task.input.instructions"),
            examples: attr_json(attrs, "gen_ai.task.input.examples"),
            data: attr_str(attrs, "gen_ai.task.input.data").map(String::from),
            metadata: attr_json(attrs, "gen_ai.task.input.metadata"),
        });

        let has_output = attrs.keys().any(|k| k.starts_with("gen_ai.task.output."));
        let output = has_output.then(|| TaskOutput {
            data: attr_str(attrs, "gen_ai.task.output.data").map(String::from),
            data_values: attr_json(attrs, "gen_ai.task.output.data.values"),
            data_ranking: attr_json(attrs, "gen_ai.task.output.data.ranking"),
            metadata: attr_json(attrs, "gen_ai.task.output.metadata"),
        });

        let dependencies_ids: Vec<String> = attr_json(attrs, "gen_ai.task.dependencies.ids")
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let mut additional_attrs: HashMap<String, Value> = attrs
            .iter()
            .filter(|(k, _)| !k.starts_with("gen_ai.task."))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        additional_attrs.insert("span_kind".to_string(), Value::String(span.kind.to_string()));
        additional_attrs.insert("service_name".to_string(), Value::String(span.service_name().to_string()));

        let mut issues = Vec::new();
        for event in &span.events {
            if event.name == "exception" {
                if let Some(msg) = event.attributes.get("exception.message").and_then(|v| v.as_str()) {
                    if !issues.contains(&msg.to_string()) {
                        issues.push(msg.to_string());
                    }
                }
            }
        }

        let mut metrics = HashMap::new();
        let duration_ms = span.duration_ms();
        if duration_ms > 0 {
            metrics.insert("duration_ms".to_string(), duration_ms as f64);
        }

        let mut header = ElementHeader::new(ElementId::from_string(task_element_id));
        header.root_id = Some(ElementId::from_string(span.context.trace_id.clone()));
        header.attributes = additional_attrs;
        header.tags = tags;
        header.name = Some(name);

        let mut task = Task {
            header,
            kind,
            state,
            status,
            input,
            output,
            start_time: span.start_time,
            end_time: span.end_time,
            events: span.events.clone(),
            issues,
            metrics,
            parent_id: attr_str(attrs, "gen_ai.task.parent.id").map(String::from).or_else(|| span.parent_id.clone()),
            dependent_ids: Vec::new(),
            action_id: attr_str(attrs, "gen_ai.task.action.id").map(String::from),
            log_reference: Some(LogReference {
                trace_id: span.context.trace_id.clone(),
                span_id: span.context.span_id.clone(),
                parent_span_id: span.parent_id.clone(),
            }),
            code_id: attr_str(attrs, "gen_ai.task.code.id").map(String::from),
            code_vendor: attr_str(attrs, "gen_ai.task.code.vendor").map(String::from),
            requester_id: attr_str(attrs, "gen_ai.task.requester.id").map(String::from),
            requester_type: attr_str(attrs, "gen_ai.task.requester.type").map(String::from),
            requester_role: attr_str(attrs, "gen_ai.task.requester.role").map(String::from),
            request_id: attr_str(attrs, "gen_ai.task.request.id").map(String::from),
            session_id: attr_str(attrs, "gen_ai.task.session.id").map(String::from),
            dependencies_ids,
            priority: attr_str(attrs, "gen_ai.task.priority").map(String::from),
            graph_id: None,
            parent_name: None,
        };

        task.add_tag(TaskTag::Manual);
        task.header.attributes.insert("framework".to_string(), Value::String(self.name().to_string()));

        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_types::{SpanContext, SpanKind, SpanResource, SpanStatus};
    use chrono::Utc;

    fn manual_span() -> Span {
        let mut attrs = HashMap::new();
        attrs.insert("gen_ai.task.id".to_string(), Value::String("Task-42".to_string()));
        attrs.insert("gen_ai.task.kind".to_string(), Value::String("manual".to_string()));
        attrs.insert("gen_ai.task.input.goal".to_string(), Value::String("summarize doc".to_string()));
        Span {
            header: ElementHeader::new(ElementId::from_string("S1")),
            context: SpanContext {
                trace_id: "T1".to_string(),
                span_id: "S1".to_string(),
            },
            parent_id: None,
            name: "review.task".to_string(),
            kind: SpanKind::Internal,
            start_time: Utc::now(),
            end_time: Utc::now() + chrono::Duration::milliseconds(50),
            status: SpanStatus::Ok,
            resource: SpanResource::default(),
            raw_attributes: attrs,
            events: vec![],
            links: vec![],
        }
    }

    #[test]
    fn detects_manual_task_spans_by_task_id_attribute() {
        let visitor = ManualVisitor;
        assert!(visitor.is_framework_span(&manual_span()));
    }

    #[test]
    fn builds_task_with_stripped_suffix_and_manual_tag() {
        let visitor = ManualVisitor;
        let task = visitor.build_task(&manual_span(), None).unwrap();
        assert_eq!(task.header.name.as_deref(), Some("review"));
        assert_eq!(task.header.element_id.as_str(), "Task-42");
        assert!(task.header.tags.contains(&"MANUAL".to_string()));
        assert_eq!(task.input.unwrap().goal.as_deref(), Some("summarize doc"));
    }
}
