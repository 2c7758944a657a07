//! TaskAnalytics (§4.6): the highest-value plugin. Runs the visitor pipeline
//! (§4.4) over one or more traces' spans, persists the resulting Tasks and
//! Actions, and is idempotent — a trace that already has tasks is skipped.

use std::sync::Arc;

use agentlens_types::{Element, ElementId, ElementKind};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;

use crate::analytics::{AnalyticsPlugin, FieldSpec, FieldType, PluginExecutionContext, PluginMetadata, PluginStatus};
use crate::span_traversal::{SpanTreeTraverser, TraversalContext};
use crate::visitors::{default_pipeline, take_tasks, ActionDedupMap, ACTIONS};

pub struct TaskAnalytics;

impl TaskAnalytics {
    pub fn metadata() -> PluginMetadata {
        PluginMetadata {
            id: "task_analytics".to_string(),
            name: "Task Analytics".to_string(),
            version: "1.0.0".to_string(),
            owner: "platform".to_string(),
            description: "Extracts Tasks and Actions from span trees via the framework visitor pipeline".to_string(),
            tags: vec!["core".to_string()],
            status: PluginStatus::Active,
            depends_on: vec![],
            triggers: vec![],
            config: serde_json::json!({ "max_concurrent_traces": 20 }),
            input_spec: vec![
                FieldSpec::new("trace_id", FieldType::String, false).with_description("single trace to process"),
                FieldSpec::new("trace_ids", FieldType::Array, false).array_of(FieldType::String).with_description("multiple traces"),
            ],
            output_spec: vec![
                FieldSpec::new("tasks", FieldType::Array, true).array_of(FieldType::Any),
                FieldSpec::new("actions", FieldType::Array, true).array_of(FieldType::Any),
            ],
        }
    }

    fn trace_ids_from_input(input: &serde_json::Value) -> Vec<String> {
        if let Some(id) = input.get("trace_id").and_then(|v| v.as_str()) {
            return vec![id.to_string()];
        }
        if let Some(ids) = input.get("trace_ids").and_then(|v| v.as_array()) {
            return ids.iter().filter_map(|v| v.as_str().map(String::from)).collect();
        }
        vec![]
    }

    async fn process_trace(
        trace_id: &str,
        ctx: &PluginExecutionContext,
        dedup: ActionDedupMap,
    ) -> anyhow::Result<(Vec<Element>, Vec<Element>)> {
        let root = ElementId::from_string(trace_id.to_string());
        let existing = ctx.data_manager.get_children(&root, ElementKind::Task, None).await?;
        if !existing.is_empty() {
            return Ok((vec![], vec![]));
        }

        let spans = ctx.data_manager.get_spans(trace_id).await?;
        if spans.is_empty() {
            return Ok((vec![], vec![]));
        }

        let mut traverser = SpanTreeTraverser::new();
        for processor in default_pipeline(dedup) {
            traverser.register_processor(processor);
        }

        let mut traversal_ctx = TraversalContext::new();
        traverser.traverse(&spans, &mut traversal_ctx);

        let tasks: Vec<Element> = take_tasks(&mut traversal_ctx).into_values().map(Element::Task).collect();
        let actions: Vec<Element> = traversal_ctx
            .get::<std::collections::HashMap<ElementId, agentlens_types::Action>>(ACTIONS)
            .cloned()
            .unwrap_or_default()
            .into_values()
            .map(Element::Action)
            .collect();

        ctx.data_manager.bulk_store(tasks.clone(), true).await?;
        ctx.data_manager.bulk_store(actions.clone(), true).await?;

        Ok((tasks, actions))
    }
}

#[async_trait]
impl AnalyticsPlugin for TaskAnalytics {
    fn metadata(&self) -> &PluginMetadata {
        static META: std::sync::OnceLock<PluginMetadata> = std::sync::OnceLock::new();
        META.get_or_init(TaskAnalytics::metadata)
    }

    async fn execute(&self, input: serde_json::Value, ctx: &PluginExecutionContext) -> anyhow::Result<serde_json::Value> {
        let trace_ids = Self::trace_ids_from_input(&input);
        let max_concurrent = ctx.config.task_analytics_max_concurrent_traces.max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let dedup: ActionDedupMap = Arc::new(std::sync::Mutex::new(std::collections::HashMap::new()));

        let trace_count = trace_ids.len().max(1);
        let results: Vec<anyhow::Result<(Vec<Element>, Vec<Element>)>> = stream::iter(trace_ids)
            .map(|trace_id| {
                let semaphore = semaphore.clone();
                let dedup = dedup.clone();
                async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                    Self::process_trace(&trace_id, ctx, dedup).await
                }
            })
            .buffer_unordered(trace_count)
            .collect()
            .await;

        let mut all_tasks = Vec::new();
        let mut all_actions = Vec::new();
        for result in results {
            let (tasks, actions) = result?;
            all_tasks.extend(tasks);
            all_actions.extend(actions);
        }

        Ok(serde_json::json!({
            "tasks": all_tasks,
            "actions": all_actions,
        }))
    }
}
