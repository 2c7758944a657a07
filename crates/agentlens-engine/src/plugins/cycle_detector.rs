//! CycleDetector (§4.6): finds repeating execution loops among a trace's
//! tasks from their `dependent_ids` edges.
//!
//! A task's name is conventionally `"{group}:{instance}"` (e.g.
//! `"retry:attempt-3"`); the part after the last `:` is the logical action
//! name. A DFS cycle is only reported when that action name repeats at least
//! `min_occurrences` times within the cycle — an incidental back-edge between
//! differently-named steps isn't a loop worth flagging.

use std::collections::{HashMap, HashSet};

use agentlens_types::{Element, ElementHeader, ElementId, ElementKind, Issue, IssueLevel, Task};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::analytics::{AnalyticsPlugin, FieldSpec, FieldType, PluginExecutionContext, PluginMetadata, PluginStatus};

pub struct CycleDetector;

const DEFAULT_MIN_OCCURRENCES: u64 = 2;

fn action_name(task_name: &str) -> &str {
    task_name.rsplit(':').next().unwrap_or(task_name)
}

/// One DFS-discovered cycle: the ordered ids of tasks on the loop.
#[derive(Clone, Debug)]
struct Cycle {
    ids: Vec<ElementId>,
}

fn enumerate_cycles(adjacency: &HashMap<ElementId, Vec<ElementId>>) -> Vec<Cycle> {
    let mut cycles = Vec::new();

    fn dfs(
        node: &ElementId,
        adjacency: &HashMap<ElementId, Vec<ElementId>>,
        path: &mut Vec<ElementId>,
        on_path: &mut HashSet<ElementId>,
        cycles: &mut Vec<Cycle>,
    ) {
        path.push(node.clone());
        on_path.insert(node.clone());

        if let Some(neighbors) = adjacency.get(node) {
            for next in neighbors {
                if on_path.contains(next) {
                    let start = path.iter().position(|id| id == next).expect("ancestor present on path");
                    cycles.push(Cycle { ids: path[start..].to_vec() });
                } else {
                    dfs(next, adjacency, path, on_path, cycles);
                }
            }
        }

        on_path.remove(node);
        path.pop();
    }

    for node in adjacency.keys() {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        dfs(node, adjacency, &mut path, &mut on_path, cycles);
    }
    cycles
}

fn dedup_by_sorted_ids(cycles: Vec<Cycle>) -> Vec<Cycle> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for cycle in cycles {
        let mut key: Vec<String> = cycle.ids.iter().map(|id| id.as_str().to_string()).collect();
        key.sort();
        if seen.insert(key) {
            out.push(cycle);
        }
    }
    out
}

fn passes_repeat_threshold(cycle: &Cycle, tasks: &HashMap<ElementId, Task>, min_occurrences: u64) -> bool {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for id in &cycle.ids {
        if let Some(task) = tasks.get(id) {
            let name = task.header.name.as_deref().unwrap_or("");
            *counts.entry(action_name(name)).or_default() += 1;
        }
    }
    counts.values().any(|count| *count >= min_occurrences)
}

/// `a` is contained in `b` if `a`'s ids appear, in order, as a subsequence of
/// `b`'s ids doubled (so rotations of the same loop still match).
fn is_subsequence_of(a: &Cycle, b: &Cycle) -> bool {
    if a.ids.len() >= b.ids.len() {
        return false;
    }
    let doubled: Vec<&ElementId> = b.ids.iter().chain(b.ids.iter()).collect();
    let mut i = 0;
    for candidate in &doubled {
        if i < a.ids.len() && **candidate == a.ids[i] {
            i += 1;
        }
        if i == a.ids.len() {
            return true;
        }
    }
    false
}

fn retain_maximal(cycles: Vec<Cycle>) -> Vec<Cycle> {
    cycles
        .iter()
        .enumerate()
        .filter(|(i, cycle)| !cycles.iter().enumerate().any(|(j, other)| *i != j && is_subsequence_of(cycle, other)))
        .map(|(_, c)| c.clone())
        .collect()
}

impl CycleDetector {
    pub fn metadata() -> PluginMetadata {
        PluginMetadata {
            id: "cycle_detector".to_string(),
            name: "Cycle Detector".to_string(),
            version: "1.0.0".to_string(),
            owner: "platform".to_string(),
            description: "Flags repeating execution loops among a trace's tasks".to_string(),
            tags: vec![],
            status: PluginStatus::Active,
            depends_on: vec!["task_analytics".to_string()],
            triggers: vec![],
            config: serde_json::json!({ "min_occurrences": DEFAULT_MIN_OCCURRENCES }),
            input_spec: vec![
                FieldSpec::new("trace_id", FieldType::String, true),
                FieldSpec::new("min_occurrences", FieldType::Integer, false).with_default(serde_json::json!(DEFAULT_MIN_OCCURRENCES)),
            ],
            output_spec: vec![FieldSpec::new("issues", FieldType::Array, true).array_of(FieldType::Any)],
        }
    }
}

#[async_trait]
impl AnalyticsPlugin for CycleDetector {
    fn metadata(&self) -> &PluginMetadata {
        static META: std::sync::OnceLock<PluginMetadata> = std::sync::OnceLock::new();
        META.get_or_init(CycleDetector::metadata)
    }

    async fn execute(&self, input: serde_json::Value, ctx: &PluginExecutionContext) -> anyhow::Result<serde_json::Value> {
        let trace_id = input.get("trace_id").and_then(|v| v.as_str()).ok_or_else(|| anyhow::anyhow!("missing trace_id"))?;
        let min_occurrences = input.get("min_occurrences").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_MIN_OCCURRENCES);

        let elements = ctx.data_manager.get_children(&ElementId::from_string(trace_id.to_string()), ElementKind::Task, None).await?;
        let tasks: HashMap<ElementId, Task> = elements
            .into_iter()
            .filter_map(|e| match e {
                Element::Task(t) => Some((t.header.element_id.clone(), t)),
                _ => None,
            })
            .collect();

        let mut adjacency: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        for task in tasks.values() {
            let edges = adjacency.entry(task.header.element_id.clone()).or_default();
            for dep in &task.dependent_ids {
                edges.push(ElementId::from_string(dep.clone()));
            }
        }

        let cycles = enumerate_cycles(&adjacency);
        let cycles = dedup_by_sorted_ids(cycles);
        let cycles: Vec<Cycle> = cycles.into_iter().filter(|c| passes_repeat_threshold(c, &tasks, min_occurrences)).collect();
        let cycles = retain_maximal(cycles);

        let mut issues = Vec::new();
        for (n, cycle) in cycles.iter().enumerate() {
            let cycle_tasks: Vec<&Task> = cycle.ids.iter().filter_map(|id| tasks.get(id)).collect();
            let earliest: DateTime<Utc> = cycle_tasks.iter().map(|t| t.start_time).min().unwrap_or_else(Utc::now);
            let description = cycle_tasks
                .iter()
                .map(|t| format!("{} ({})", t.header.name.as_deref().unwrap_or("?"), t.header.element_id.as_str()))
                .collect::<Vec<_>>()
                .join(", ");

            let mut header = ElementHeader::new(ElementId::generate("Issue"));
            header.root_id = Some(ElementId::from_string(trace_id.to_string()));
            header.name = Some(format!("Cycle Detection Issue: cycle_no.{}", n + 1));
            header.description = Some(description);
            if let Some(first) = cycle.ids.first() {
                header.add_related(first.clone(), ElementKind::Task);
            }

            issues.push(Issue {
                header,
                level: IssueLevel::Warning,
                confidence: None,
                effect: cycle_tasks.iter().map(|t| t.header.name.clone().unwrap_or_default()).collect(),
                timestamp: earliest,
            });
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
    use agentlens_types::{TaskState};
    use std::sync::Arc;

    fn task(id: &str, name: &str, dependent_ids: Vec<&str>) -> Task {
        Task {
            header: {
                let mut h = ElementHeader::new(ElementId::from_string(id));
                h.root_id = Some(ElementId::from_string("T1"));
                h.name = Some(name.to_string());
                h
            },
            kind: None,
            state: Some(TaskState::Completed),
            status: None,
            input: None,
            output: None,
            start_time: Utc::now(),
            end_time: Utc::now(),
            events: vec![],
            issues: vec![],
            metrics: Default::default(),
            parent_id: None,
            dependent_ids: dependent_ids.into_iter().map(String::from).collect(),
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
    async fn detects_one_maximal_cycle_and_ignores_acyclic_chain() {
        let store = Arc::new(InMemoryStore::new());
        let dm = Arc::new(DataManager::new(store));

        let tasks = vec![
            task("A", "step:search", vec!["B"]),
            task("B", "step:search", vec!["C"]),
            task("C", "step:search", vec!["A"]),
            task("D", "other:noop", vec!["E"]),
            task("E", "other:noop", vec![]),
        ];
        dm.bulk_store(tasks.into_iter().map(Element::Task).collect(), true).await.unwrap();

        let ctx = PluginExecutionContext { data_manager: dm, config: crate::analytics::AnalyticsEngineConfig::default() };
        let output = CycleDetector.execute(serde_json::json!({"trace_id": "T1", "min_occurrences": 2}), &ctx).await.unwrap();

        let issues = output["issues"].as_array().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0]["name"], serde_json::json!("Cycle Detection Issue: cycle_no.1"));
    }
}
