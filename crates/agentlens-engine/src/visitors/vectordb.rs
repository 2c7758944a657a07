//! VectorDB visitor (§4.4): detects retrieval spans by span kind and
//! service-name patterns (Pinecone, Chroma, Weaviate, pgvector, ...).

use std::collections::HashMap;

use agentlens_types::{ElementHeader, ElementId, LogReference, Span, SpanKind, Task, TaskKind, TaskOutput, TaskTag};

use super::base::FrameworkHandler;

const VECTOR_DB_SERVICE_MARKERS: &[&str] = &["pinecone", "chroma", "weaviate", "qdrant", "pgvector", "milvus"];

pub struct VectorDbVisitor;

fn is_vector_db_span(span: &Span) -> bool {
    span.kind == SpanKind::Client
        && VECTOR_DB_SERVICE_MARKERS.iter().any(|marker| span.service_name().to_lowercase().contains(marker))
}

impl FrameworkHandler for VectorDbVisitor {
    fn name(&self) -> &str {
        "VectorDB processor"
    }

    fn is_framework_span(&self, span: &Span) -> bool {
        is_vector_db_span(span)
    }

    fn build_task(&self, span: &Span, _parent: Option<&Task>) -> Option<Task> {
        let num_results = span.raw_attributes.get("vectordb.num_results").and_then(|v| v.as_f64());

        let mut header = ElementHeader::new(ElementId::from_string(format!("task_{}", span.context.span_id)));
        header.root_id = Some(ElementId::from_string(span.context.trace_id.clone()));
        header.name = Some(span.name.clone());

        let mut metrics = HashMap::new();
        if let Some(n) = num_results {
            metrics.insert("num_results".to_string(), n);
        }

        let mut task = Task {
            header,
            kind: Some(TaskKind::Retriever),
            state: None,
            status: None,
            input: None,
            output: Some(TaskOutput {
                data: None,
                data_values: None,
                data_ranking: None,
                metadata: Some(serde_json::json!({ "store": span.service_name() })),
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
        task.add_tag(TaskTag::Vectordb);
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_types::{SpanContext, SpanResource, SpanStatus};
    use chrono::Utc;

    #[test]
    fn detects_known_vector_store_service_names() {
        let visitor = VectorDbVisitor;
        let mut resource = SpanResource::default();
        resource.service_name = "pinecone-client".to_string();
        let span = Span {
            header: ElementHeader::new(ElementId::from_string("S1")),
            context: SpanContext { trace_id: "T1".into(), span_id: "S1".into() },
            parent_id: None,
            name: "query".to_string(),
            kind: SpanKind::Client,
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
