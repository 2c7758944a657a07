//! IssueDistributionTrace (§4.6): rolls issue-severity counts up a trace's
//! task parent tree and records a DISTRIBUTION metric per task.

use std::collections::HashMap;

use agentlens_types::{Element, ElementHeader, ElementId, ElementKind, Issue, Metric, MetricType, MetricValue, Task};
use async_trait::async_trait;

use crate::analytics::{AnalyticsPlugin, FieldSpec, FieldType, PluginExecutionContext, PluginMetadata, PluginStatus};

pub struct IssueDistributionTrace;

/// Counts issue levels directly attached to `task_id`, keyed by level name.
fn own_counts(task_id: &ElementId, issues_by_task: &HashMap<ElementId, Vec<Issue>>) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    if let Some(issues) = issues_by_task.get(task_id) {
        for issue in issues {
            *counts.entry(issue.level.to_string()).or_insert(0u64) += 1;
        }
    }
    counts
}

fn merge_counts(into: &mut HashMap<String, u64>, from: &HashMap<String, u64>) {
    for (level, count) in from {
        *into.entry(level.clone()).or_insert(0) += count;
    }
}

/// Post-order accumulation: a task's distribution is its own issues plus the
/// (already-computed) distributions of every child task.
fn accumulate(
    task_id: &ElementId,
    children_by_parent: &HashMap<ElementId, Vec<ElementId>>,
    issues_by_task: &HashMap<ElementId, Vec<Issue>>,
    memo: &mut HashMap<ElementId, HashMap<String, u64>>,
) -> HashMap<String, u64> {
    if let Some(cached) = memo.get(task_id) {
        return cached.clone();
    }
    let mut total = own_counts(task_id, issues_by_task);
    if let Some(children) = children_by_parent.get(task_id) {
        for child in children {
            let child_counts = accumulate(child, children_by_parent, issues_by_task, memo);
            merge_counts(&mut total, &child_counts);
        }
    }
    memo.insert(task_id.clone(), total.clone());
    total
}

impl IssueDistributionTrace {
    pub fn metadata() -> PluginMetadata {
        PluginMetadata {
            id: "issue_distribution_trace".to_string(),
            name: "Issue Distribution (Trace)".to_string(),
            version: "1.0.0".to_string(),
            owner: "platform".to_string(),
            description: "Aggregates issue-severity counts up a trace's task parent tree".to_string(),
            tags: vec![],
            status: PluginStatus::Active,
            depends_on: vec!["task_analytics".to_string(), "issue_analytics".to_string()],
            triggers: vec![],
            config: serde_json::Value::Null,
            input_spec: vec![FieldSpec::new("trace_id", FieldType::String, true)],
            output_spec: vec![FieldSpec::new("metrics", FieldType::Array, true).array_of(FieldType::Any)],
        }
    }
}

#[async_trait]
impl AnalyticsPlugin for IssueDistributionTrace {
    fn metadata(&self) -> &PluginMetadata {
        static META: std::sync::OnceLock<PluginMetadata> = std::sync::OnceLock::new();
        META.get_or_init(IssueDistributionTrace::metadata)
    }

    async fn execute(&self, input: serde_json::Value, ctx: &PluginExecutionContext) -> anyhow::Result<serde_json::Value> {
        let trace_id = input.get("trace_id").and_then(|v| v.as_str()).ok_or_else(|| anyhow::anyhow!("missing trace_id"))?;
        let root = ElementId::from_string(trace_id.to_string());

        let task_elements = ctx.data_manager.get_children(&root, ElementKind::Task, None).await?;
        let tasks: Vec<Task> = task_elements.into_iter().filter_map(|e| if let Element::Task(t) = e { Some(t) } else { None }).collect();
        if tasks.is_empty() {
            return Ok(serde_json::json!({ "metrics": [] }));
        }

        let issue_elements = ctx.data_manager.get_children(&root, ElementKind::Issue, None).await?;
        let mut issues_by_task: HashMap<ElementId, Vec<Issue>> = HashMap::new();
        for element in issue_elements {
            if let Element::Issue(issue) = element {
                for (id, kind) in issue.header.related_to_ids.iter().zip(issue.header.related_to_types.iter()) {
                    if *kind == ElementKind::Task {
                        issues_by_task.entry(id.clone()).or_default().push(issue.clone());
                    }
                }
            }
        }

        let mut children_by_parent: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        for task in &tasks {
            if let Some(parent_id) = &task.parent_id {
                children_by_parent.entry(ElementId::from_string(parent_id.clone())).or_default().push(task.header.element_id.clone());
            }
        }

        let mut memo = HashMap::new();
        let mut metrics = Vec::new();
        for task in &tasks {
            let distribution = accumulate(&task.header.element_id, &children_by_parent, &issues_by_task, &mut memo);
            let mut header = ElementHeader::new(ElementId::generate("Metric"));
            header.root_id = Some(root.clone());
            header.name = Some("issue_distribution".to_string());
            header.add_related(task.header.element_id.clone(), ElementKind::Task);

            metrics.push(Metric { header, metric_type: MetricType::Distribution, value: MetricValue::Distribution(distribution) });
        }

        ctx.data_manager.bulk_store(metrics.iter().cloned().map(Element::Metric).collect(), true).await?;

        Ok(serde_json::json!({ "metrics": metrics }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_data::DataManager;
    use agentlens_store::InMemoryStore;
    use agentlens_types::IssueLevel;
    use chrono::Utc;
    use std::sync::Arc;

    fn task(id: &str, root: &str, parent: Option<&str>) -> Task {
        Task {
            header: {
                let mut h = ElementHeader::new(ElementId::from_string(id));
                h.root_id = Some(ElementId::from_string(root));
                h
            },
            kind: None,
            state: Some(agentlens_types::TaskState::Completed),
            status: Some(agentlens_types::TaskStatus::Success),
            input: None,
            output: None,
            start_time: Utc::now(),
            end_time: Utc::now(),
            events: vec![],
            issues: vec![],
            metrics: Default::default(),
            parent_id: parent.map(String::from),
            dependent_ids: vec![],
            action_id: None,
            log_reference: None,
            code_id: None,
            code_vendor: None,
            requester_id: None,
            requester_type: None,
            requester_role: None,
            request_id: None,
            session_id: None,
            dependencies_ids: vec![],
            priority: None,
            graph_id: None,
            parent_name: None,
        }
    }

    fn issue_on(task_id: &str, root: &str, level: IssueLevel) -> Issue {
        let mut header = ElementHeader::new(ElementId::generate("Issue"));
        header.root_id = Some(ElementId::from_string(root));
        header.add_related(ElementId::from_string(task_id), ElementKind::Task);
        Issue { header, level, confidence: None, effect: vec![], timestamp: Utc::now() }
    }

    #[tokio::test]
    async fn child_issues_roll_up_to_the_parent() {
        let store = Arc::new(InMemoryStore::new());
        let dm = Arc::new(DataManager::new(store));

        dm.bulk_store(
            vec![
                Element::Task(task("Parent", "T1", None)),
                Element::Task(task("Child", "T1", Some("Parent"))),
                Element::Issue(issue_on("Child", "T1", IssueLevel::Error)),
            ],
            true,
        )
        .await
        .unwrap();

        let ctx = PluginExecutionContext { data_manager: dm, config: crate::analytics::AnalyticsEngineConfig::default() };
        let output = IssueDistributionTrace.execute(serde_json::json!({"trace_id": "T1"}), &ctx).await.unwrap();

        let metrics = output["metrics"].as_array().unwrap();
        let parent_metric = metrics
            .iter()
            .find(|m| m["related_to_ids"][0] == serde_json::json!("Parent"))
            .expect("parent metric present");
        assert_eq!(parent_metric["value"]["ERROR"], serde_json::json!(1));
    }
}
