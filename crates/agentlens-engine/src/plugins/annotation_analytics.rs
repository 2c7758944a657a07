//! AnnotationAnalytics (§4.6): scans span events for a `DataAnnotation`-
//! prefixed event name and persists an Annotation element per match.

use agentlens_types::{Annotation, Element, ElementHeader, ElementId};
use async_trait::async_trait;

use crate::analytics::{AnalyticsPlugin, FieldSpec, FieldType, PluginExecutionContext, PluginMetadata, PluginStatus};

pub struct AnnotationAnalytics;

const ANNOTATION_EVENT_PREFIX: &str = "DataAnnotation";

impl AnnotationAnalytics {
    pub fn metadata() -> PluginMetadata {
        PluginMetadata {
            id: "annotation_analytics".to_string(),
            name: "Annotation Analytics".to_string(),
            version: "1.0.0".to_string(),
            owner: "platform".to_string(),
            description: "Scans span events for data-annotation markers and persists Annotation elements".to_string(),
            tags: vec![],
            status: PluginStatus::Active,
            depends_on: vec![],
            triggers: vec![],
            config: serde_json::Value::Null,
            input_spec: vec![FieldSpec::new("trace_id", FieldType::String, true)],
            output_spec: vec![FieldSpec::new("annotations", FieldType::Array, true).array_of(FieldType::Any)],
        }
    }
}

#[async_trait]
impl AnalyticsPlugin for AnnotationAnalytics {
    fn metadata(&self) -> &PluginMetadata {
        static META: std::sync::OnceLock<PluginMetadata> = std::sync::OnceLock::new();
        META.get_or_init(AnnotationAnalytics::metadata)
    }

    async fn execute(&self, input: serde_json::Value, ctx: &PluginExecutionContext) -> anyhow::Result<serde_json::Value> {
        let trace_id = input.get("trace_id").and_then(|v| v.as_str()).ok_or_else(|| anyhow::anyhow!("missing trace_id"))?;
        let spans = ctx.data_manager.get_spans(trace_id).await?;

        let mut annotations = Vec::new();
        for span in &spans {
            for event in &span.events {
                if !event.name.starts_with(ANNOTATION_EVENT_PREFIX) {
                    continue;
                }
                let mut header = ElementHeader::new(ElementId::generate("Annotation"));
                header.root_id = Some(ElementId::from_string(trace_id.to_string()));
                header.add_related(ElementId::from_string(span.context.span_id.clone()), agentlens_types::ElementKind::Span);

                annotations.push(Annotation {
                    header,
                    annotation_type: event.attributes.get("annotation_type").and_then(|v| v.as_str()).unwrap_or("note").to_string(),
                    path_to_string: event.attributes.get("path").and_then(|v| v.as_str()).map(String::from),
                    segment_start: event.attributes.get("segment_start").and_then(|v| v.as_u64()),
                    segment_end: event.attributes.get("segment_end").and_then(|v| v.as_u64()),
                    annotation_title: event.attributes.get("title").and_then(|v| v.as_str()).map(String::from),
                    annotation_content: event.attributes.get("content").and_then(|v| v.as_str()).map(String::from),
                });
            }
        }

        ctx.data_manager.bulk_store(annotations.iter().cloned().map(Element::Annotation).collect(), true).await?;

        Ok(serde_json::json!({ "annotations": annotations }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_data::DataManager;
    use agentlens_store::InMemoryStore;
    use agentlens_types::{Span, SpanContext, SpanEvent, SpanKind, SpanResource, SpanStatus};
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn marked_event_becomes_an_annotation() {
        let store = Arc::new(InMemoryStore::new());
        let dm = Arc::new(DataManager::new(store));

        let span = Span {
            header: ElementHeader::new(ElementId::from_string("S1")),
            context: SpanContext { trace_id: "T1".into(), span_id: "S1".into() },
            parent_id: None,
            name: "op".to_string(),
            kind: SpanKind::Internal,
            start_time: Utc::now(),
            end_time: Utc::now(),
            status: SpanStatus::Ok,
            resource: SpanResource::default(),
            raw_attributes: Default::default(),
            events: vec![SpanEvent { name: "DataAnnotation.review".to_string(), timestamp: Utc::now(), attributes: Default::default() }],
            links: vec![],
        };
        dm.bulk_store(vec![Element::Span(span)], true).await.unwrap();

        let ctx = PluginExecutionContext { data_manager: dm, config: crate::analytics::AnalyticsEngineConfig::default() };
        let output = AnnotationAnalytics.execute(serde_json::json!({"trace_id": "T1"}), &ctx).await.unwrap();
        assert_eq!(output["annotations"].as_array().unwrap().len(), 1);
    }
}
