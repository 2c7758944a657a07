//! CrewAI visitor (§4.4): service tag `crewai`; recognizes crew/task/agent
//! lifecycle spans and tags the resulting tasks by their CrewAI role.

use std::collections::HashMap;

use agentlens_types::{ElementHeader, ElementId, LogReference, Span, Task, TaskKind, TaskTag};

use super::base::FrameworkHandler;

const CREW_SPAN_NAMES: &[&str] = &["Crew.kickoff", "Task.execute", "Task.created"];

pub struct CrewAiVisitor;

fn is_agent_execution_span(span: &Span) -> bool {
    span.name.starts_with("Agent.") || span.raw_attributes.contains_key("crewai.agent.role")
}

fn is_tool_usage_span(span: &Span) -> bool {
    span.name.starts_with("Tool.") || span.raw_attributes.contains_key("crewai.tool.name")
}

impl FrameworkHandler for CrewAiVisitor {
    fn name(&self) -> &str {
        "CrewAI processor"
    }

    fn is_framework_span(&self, span: &Span) -> bool {
        span.service_name() == "crewai"
            && (CREW_SPAN_NAMES.contains(&span.name.as_str()) || is_agent_execution_span(span) || is_tool_usage_span(span))
    }

    fn build_task(&self, span: &Span, _parent: Option<&Task>) -> Option<Task> {
        let kind = if is_tool_usage_span(span) {
            TaskKind::Tool
        } else if is_agent_execution_span(span) {
            TaskKind::Agent
        } else {
            TaskKind::Other
        };

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
            requester_id: span.raw_attributes.get("crewai.agent.role").and_then(|v| v.as_str()).map(String::from),
            requester_type: Some("agent".to_string()),
            requester_role: None,
            request_id: None,
            session_id: None,
            dependencies_ids: Vec::new(),
            priority: None,
            graph_id: None,
            parent_name: None,
        };
        task.add_tag(TaskTag::Crewai);
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_types::{SpanContext, SpanKind, SpanResource, SpanStatus};
    use chrono::Utc;

    fn crew_span(name: &str) -> Span {
        let mut resource = SpanResource::default();
        resource.service_name = "crewai".to_string();
        Span {
            header: ElementHeader::new(ElementId::from_string("S1")),
            context: SpanContext { trace_id: "T1".into(), span_id: "S1".into() },
            parent_id: None,
            name: name.to_string(),
            kind: SpanKind::Internal,
            start_time: Utc::now(),
            end_time: Utc::now(),
            status: SpanStatus::Ok,
            resource,
            raw_attributes: Default::default(),
            events: vec![],
            links: vec![],
        }
    }

    #[test]
    fn recognizes_known_lifecycle_spans() {
        let visitor = CrewAiVisitor;
        assert!(visitor.is_framework_span(&crew_span("Crew.kickoff")));
        assert!(visitor.is_framework_span(&crew_span("Task.execute")));
        assert!(!visitor.is_framework_span(&crew_span("unrelated.span")));
    }

    #[test]
    fn tool_spans_become_tool_kind_tasks() {
        let visitor = CrewAiVisitor;
        let task = visitor.build_task(&crew_span("Tool.search"), None).unwrap();
        assert_eq!(task.kind, Some(TaskKind::Tool));
    }
}
