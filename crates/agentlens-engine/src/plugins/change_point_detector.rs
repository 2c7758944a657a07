//! ChangePointDetector (§4.6): watches one metric series across the root
//! tasks of a trace group, in `start_time` order, and flags a statistically
//! significant shift with an Issue.
//!
//! Segmentation cost follows PELT: the negative Gaussian log-likelihood of a
//! segment under its own mean, using the series' overall standard deviation.
//! A changepoint at index 0 is an artifact of the recursion's base case, not
//! a real shift, and is always dropped.

use std::collections::HashMap;

use agentlens_types::{Element, ElementHeader, ElementId, ElementKind, Issue, IssueLevel, Task};
use async_trait::async_trait;
use chrono::Utc;

use crate::analytics::{AnalyticsPlugin, FieldSpec, FieldType, PluginExecutionContext, PluginMetadata, PluginStatus};

pub struct ChangePointDetector;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
    Any,
}

impl Direction {
    fn matches(&self, percent_change: f64) -> bool {
        match self {
            Direction::Increase => percent_change > 0.0,
            Direction::Decrease => percent_change < 0.0,
            Direction::Any => true,
        }
    }
}

/// The metrics this plugin knows how to read, and which direction of change is
/// worth flagging for each.
fn known_metric(name: &str) -> Option<Direction> {
    match name {
        "execution_time" => Some(Direction::Increase),
        "is_issue" => Some(Direction::Increase),
        "task_count" => Some(Direction::Any),
        "failure_rate" => Some(Direction::Increase),
        "token_usage" => Some(Direction::Increase),
        _ => None,
    }
}

fn metric_value(task: &Task, metric_name: &str) -> Option<f64> {
    match metric_name {
        "execution_time" => Some((task.end_time - task.start_time).num_milliseconds() as f64),
        "is_issue" => Some(if task.issues.is_empty() { 0.0 } else { 1.0 }),
        "task_count" => Some(1.0),
        "failure_rate" => Some(if task.status == Some(agentlens_types::TaskStatus::Failure) { 1.0 } else { 0.0 }),
        "token_usage" => task.metrics.get("token_usage").copied(),
        _ => None,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 1.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt().max(1e-9)
}

/// Negative Gaussian log-likelihood of `segment` under its own mean, with the
/// overall series' `sigma`. Lower is a better fit; PELT minimizes the sum of
/// these across segments plus a penalty per extra changepoint.
fn segment_cost(segment: &[f64], sigma: f64) -> f64 {
    if segment.is_empty() {
        return 0.0;
    }
    let m = mean(segment);
    segment.iter().map(|v| (v - m).powi(2) / (2.0 * sigma * sigma)).sum()
}

/// A simplified PELT: dynamic-programming changepoint search with a fixed
/// penalty (`2 * ln(n)`, the standard BIC-style term) against one global sigma.
fn pelt_changepoints(series: &[f64]) -> Vec<usize> {
    let n = series.len();
    if n < 4 {
        return vec![];
    }
    let sigma = stdev(series);
    let penalty = 2.0 * (n as f64).ln();

    let mut best_cost = vec![0.0_f64; n + 1];
    let mut last_changepoint = vec![0_usize; n + 1];
    best_cost[0] = -penalty;

    for end in 1..=n {
        let mut best = f64::INFINITY;
        let mut best_start = 0;
        for start in 0..end {
            let candidate = best_cost[start] + segment_cost(&series[start..end], sigma) + penalty;
            if candidate < best {
                best = candidate;
                best_start = start;
            }
        }
        best_cost[end] = best;
        last_changepoint[end] = best_start;
    }

    let mut points = Vec::new();
    let mut idx = n;
    while idx > 0 {
        let start = last_changepoint[idx];
        if start > 0 {
            points.push(start);
        }
        idx = start;
    }
    points.sort_unstable();
    points.retain(|p| *p != 0);
    points
}

struct WindowStats {
    before_mean: f64,
    after_mean: f64,
    before_count: usize,
    after_count: usize,
}

fn window_stats(series: &[f64], changepoint: usize, neighbors: &[usize], window_max: usize) -> Option<WindowStats> {
    let prev_bound = neighbors.iter().filter(|p| **p < changepoint).max().copied().unwrap_or(0);
    let next_bound = neighbors.iter().filter(|p| **p > changepoint).min().copied().unwrap_or(series.len());

    let before_start = prev_bound.max(changepoint.saturating_sub(window_max));
    let after_end = next_bound.min(changepoint + window_max);

    let before = &series[before_start..changepoint];
    let after = &series[changepoint..after_end];
    if before.len() <= 1 || after.len() <= 1 {
        return None;
    }

    Some(WindowStats {
        before_mean: mean(before),
        after_mean: mean(after),
        before_count: before.len(),
        after_count: after.len(),
    })
}

impl ChangePointDetector {
    pub fn metadata() -> PluginMetadata {
        PluginMetadata {
            id: "change_point_detector".to_string(),
            name: "Change Point Detector".to_string(),
            version: "1.0.0".to_string(),
            owner: "platform".to_string(),
            description: "Detects statistically significant shifts in a trace group's task metrics over time".to_string(),
            tags: vec![],
            status: PluginStatus::Active,
            depends_on: vec!["task_analytics".to_string()],
            triggers: vec![],
            config: serde_json::json!({
                "metric": "execution_time",
                "min_observations": 10,
                "ratio_bound": 0.5,
                "window_max": 10,
            }),
            input_spec: vec![
                FieldSpec::new("trace_ids", FieldType::Array, true).array_of(FieldType::String),
                FieldSpec::new("metric", FieldType::String, false).with_default(serde_json::json!("execution_time")),
                FieldSpec::new("min_observations", FieldType::Integer, false).with_default(serde_json::json!(10)),
                FieldSpec::new("ratio_bound", FieldType::Float, false).with_default(serde_json::json!(0.5)),
                FieldSpec::new("window_max", FieldType::Integer, false).with_default(serde_json::json!(10)),
            ],
            output_spec: vec![FieldSpec::new("issues", FieldType::Array, true).array_of(FieldType::Any)],
        }
    }
}

#[async_trait]
impl AnalyticsPlugin for ChangePointDetector {
    fn metadata(&self) -> &PluginMetadata {
        static META: std::sync::OnceLock<PluginMetadata> = std::sync::OnceLock::new();
        META.get_or_init(ChangePointDetector::metadata)
    }

    async fn execute(&self, input: serde_json::Value, ctx: &PluginExecutionContext) -> anyhow::Result<serde_json::Value> {
        let trace_ids: Vec<String> = input
            .get("trace_ids")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        if trace_ids.is_empty() {
            return Err(anyhow::anyhow!("missing trace_ids"));
        }
        let metric_name = input.get("metric").and_then(|v| v.as_str()).unwrap_or("execution_time").to_string();
        let direction = known_metric(&metric_name).unwrap_or(Direction::Any);
        let min_observations = input.get("min_observations").and_then(|v| v.as_u64()).unwrap_or(ctx.config.change_point_min_observations as u64) as usize;
        let ratio_bound = input.get("ratio_bound").and_then(|v| v.as_f64()).unwrap_or(ctx.config.change_point_ratio_bound);
        let window_max = input.get("window_max").and_then(|v| v.as_u64()).unwrap_or(ctx.config.change_point_window_max as u64) as usize;

        let root_ids: Vec<ElementId> = trace_ids.iter().map(|id| ElementId::from_string(id.clone())).collect();
        let elements = ctx.data_manager.get_children_for_list(&root_ids, ElementKind::Task).await?;
        let mut root_tasks: Vec<Task> = elements
            .into_iter()
            .filter_map(|e| match e {
                Element::Task(t) if t.parent_id.is_none() => Some(t),
                _ => None,
            })
            .collect();
        root_tasks.sort_by_key(|t| t.start_time);

        let mut issues = Vec::new();
        if root_tasks.len() >= min_observations {
            let series: Vec<f64> = root_tasks.iter().filter_map(|t| metric_value(t, &metric_name)).collect();
            if series.len() == root_tasks.len() {
                let changepoints = pelt_changepoints(&series);
                for (n, cp) in changepoints.iter().enumerate() {
                    let Some(stats) = window_stats(&series, *cp, &changepoints, window_max) else {
                        continue;
                    };
                    let percent_change = if stats.before_mean.abs() > 1e-9 {
                        (stats.after_mean - stats.before_mean) / stats.before_mean.abs() * 100.0
                    } else if stats.after_mean.abs() > 1e-9 {
                        f64::INFINITY
                    } else {
                        0.0
                    };

                    let significant = !percent_change.is_finite() || percent_change.abs() >= ratio_bound * 100.0;
                    if !significant || !direction.matches(percent_change) {
                        continue;
                    }

                    let changed_task = &root_tasks[*cp];
                    let mut header = ElementHeader::new(ElementId::generate("Issue"));
                    header.name = Some(format!("Change Point Issue: {}.{}", metric_name, n + 1));
                    header.description = Some(format!(
                        "{} shifted from {:.2} (n={}) to {:.2} (n={}) at task {}",
                        metric_name, stats.before_mean, stats.before_count, stats.after_mean, stats.after_count, changed_task.header.element_id.as_str()
                    ));
                    header.add_related(changed_task.header.element_id.clone(), ElementKind::Task);

                    issues.push(Issue {
                        header,
                        level: IssueLevel::Warning,
                        confidence: None,
                        effect: vec![metric_name.clone()],
                        timestamp: changed_task.start_time,
                    });
                }
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
    use chrono::Duration;
    use std::sync::Arc;

    fn task(id: &str, root: &str, start_offset_secs: i64, duration_ms: i64) -> Task {
        let start_time = Utc::now() + Duration::seconds(start_offset_secs);
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
            start_time,
            end_time: start_time + Duration::milliseconds(duration_ms),
            events: vec![],
            issues: vec![],
            metrics: Default::default(),
            parent_id: None,
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

    #[tokio::test]
    async fn flags_a_sustained_increase_in_execution_time() {
        let store = Arc::new(InMemoryStore::new());
        let dm = Arc::new(DataManager::new(store));

        let mut tasks = Vec::new();
        for i in 0..10 {
            tasks.push(task(&format!("A{i}"), "T1", i, 100));
        }
        for i in 10..20 {
            tasks.push(task(&format!("A{i}"), "T1", i, 5000));
        }
        dm.bulk_store(tasks.into_iter().map(Element::Task).collect(), true).await.unwrap();

        let ctx = PluginExecutionContext { data_manager: dm, config: crate::analytics::AnalyticsEngineConfig::default() };
        let output = ChangePointDetector
            .execute(serde_json::json!({"trace_ids": ["T1"], "metric": "execution_time", "min_observations": 10, "ratio_bound": 0.5}), &ctx)
            .await
            .unwrap();

        let issues = output["issues"].as_array().unwrap();
        assert!(!issues.is_empty(), "expected at least one change point issue");
    }

    #[tokio::test]
    async fn flat_series_has_no_change_points() {
        let store = Arc::new(InMemoryStore::new());
        let dm = Arc::new(DataManager::new(store));

        let tasks: Vec<Task> = (0..12).map(|i| task(&format!("A{i}"), "T1", i, 100)).collect();
        dm.bulk_store(tasks.into_iter().map(Element::Task).collect(), true).await.unwrap();

        let ctx = PluginExecutionContext { data_manager: dm, config: crate::analytics::AnalyticsEngineConfig::default() };
        let output = ChangePointDetector
            .execute(serde_json::json!({"trace_ids": ["T1"], "metric": "execution_time", "min_observations": 10, "ratio_bound": 0.5}), &ctx)
            .await
            .unwrap();

        assert_eq!(output["issues"].as_array().unwrap().len(), 0);
    }
}
