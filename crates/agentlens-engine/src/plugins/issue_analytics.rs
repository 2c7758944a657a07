//! IssueAnalytics (§4.6): scans span events for the `issue_type` marker
//! attribute and persists an Issue per match.

use agentlens_types::{Element, ElementHeader, ElementId, Issue, IssueLevel};
use async_trait::async_trait;

use crate::analytics::{AnalyticsPlugin, FieldSpec, FieldType, PluginExecutionContext, PluginMetadata, PluginStatus};

pub struct IssueAnalytics;

const ISSUE_TYPE_MARKER: &str = "issue_type";

impl IssueAnalytics {
    pub fn metadata() -> PluginMetadata {
        PluginMetadata {
            id: "issue_analytics".to_string(),
            name: "Issue Analytics".to_string(),
            version: "1.0.0".to_string(),
            owner: "platform".to_string(),
            description: "Scans span events for issue markers and persists Issue elements".to_string(),
            tags: vec![],
            status: PluginStatus::Active,
            depends_on: vec![],
            triggers: vec![],
            config: serde_json::Value::Null,
            input_spec: vec![FieldSpec::new("trace_id", FieldType::String, true)],
            output_spec: vec![FieldSpec::new("issues", FieldType::Array, true).array_of(FieldType::Any)],
        }
    }
}

#[async_trait]
impl AnalyticsPlugin for IssueAnalytics {
    fn metadata(&self) -> &PluginMetadata {
        static META: std::sync::OnceLock<PluginMetadata> = std::sync::OnceLock::new();
        META.get_or_init(IssueAnalytics::metadata)
    }

    async fn execute(&self, input: serde_json::Value, ctx: &PluginExecutionContext) -> anyhow::Result<serde_json::Value> {
        let trace_id = input.get("trace_id").and_then(|v| v.as_str()).ok_or_else(|| anyhow::anyhow!("missing trace_id"))?;
        let spans = ctx.data_manager.get_spans(trace_id).await?;

        let mut issues = Vec::new();
        for span in &spans {
            for event in &span.events {
                let Some(level) = event.attributes.get(ISSUE_TYPE_MARKER).and_then(|v| v.as_str()) else {
                    continue;
                };
                let level: IssueLevel = level.parse().unwrap_or(IssueLevel::Warning);
                let mut header = ElementHeader::new(ElementId::generate("Issue"));
                header.root_id = Some(ElementId::from_string(trace_id.to_string()));
                header.name = Some(event.name.clone());
                header.add_related(ElementId::from_string(span.context.span_id.clone()), agentlens_types::ElementKind::Span);

                issues.push(Issue {
                    header,
                    level,
                    confidence: None,
                    effect: vec![event.name.clone()],
                    timestamp: event.timestamp,
                });
            }
        }

        ctx.data_manager.bulk_store(issues.iter().cloned().map(Element::Issue).collect(), true).await?;

        Ok(serde_json::json!({ "issues": issues }))
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
    async fn marked_event_becomes_an_issue() {
        let store = Arc::new(InMemoryStore::new());
        let dm = Arc::new(DataManager::new(store));

        let mut attrs = std::collections::HashMap::new();
        attrs.insert(ISSUE_TYPE_MARKER.to_string(), serde_json::Value::String("ERROR".to_string()));
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
            events: vec![SpanEvent { name: "timeout".to_string(), timestamp: Utc::now(), attributes: attrs }],
            links: vec![],
        };
        dm.bulk_store(vec![Element::Span(span)], true).await.unwrap();

        let ctx = PluginExecutionContext { data_manager: dm, config: crate::analytics::AnalyticsEngineConfig::default() };
        let output = IssueAnalytics.execute(serde_json::json!({"trace_id": "T1"}), &ctx).await.unwrap();
        assert_eq!(output["issues"].as_array().unwrap().len(), 1);
    }
}
