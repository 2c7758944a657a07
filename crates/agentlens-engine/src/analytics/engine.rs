//! Execution DAG construction and the per-request executor (§4.5).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::plugin::{ExecutionResult, ExecutionStatus, PluginExecutionContext};
use super::registry::AnalyticsRegistry;
use crate::error::AnalyticsResult;
use crate::AnalyticsError;

/// Engine-wide knobs (§7A). Defaults mirror the source's literals.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalyticsEngineConfig {
    pub enable_result_cache: bool,
    pub task_analytics_max_concurrent_traces: usize,
    pub change_point_min_observations: usize,
    pub change_point_ratio_bound: f64,
    pub change_point_window_max: usize,
}

impl Default for AnalyticsEngineConfig {
    fn default() -> Self {
        Self {
            enable_result_cache: false,
            task_analytics_max_concurrent_traces: 20,
            change_point_min_observations: 10,
            change_point_ratio_bound: 0.5,
            change_point_window_max: 10,
        }
    }
}

/// Builds the execution set and predecessor map for plugin `root` (§4.5
/// "Execution DAG" steps 1-2).
struct ExecutionGraph {
    /// All plugins reachable from `root` via `depends_on` or `triggers`.
    nodes: HashSet<String>,
    /// `plugin_id -> predecessors that must complete first`.
    predecessors: HashMap<String, HashSet<String>>,
}

fn build_execution_graph(registry: &AnalyticsRegistry, root: &str) -> AnalyticsResult<ExecutionGraph> {
    let mut nodes = HashSet::new();
    let mut stack = vec![root.to_string()];
    let mut path = Vec::new();

    fn visit(
        registry: &AnalyticsRegistry,
        id: &str,
        nodes: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> AnalyticsResult<()> {
        if path.contains(&id.to_string()) {
            return Err(AnalyticsError::ValidationError(format!("cyclic plugin dependency through `{id}`")));
        }
        if !nodes.insert(id.to_string()) {
            return Ok(());
        }
        path.push(id.to_string());
        let meta = registry
            .metadata(id)
            .ok_or_else(|| AnalyticsError::ValidationError(format!("unknown plugin `{id}`")))?;
        for neighbor in meta.depends_on.iter().chain(meta.triggers.iter()) {
            visit(registry, neighbor, nodes, path)?;
        }
        // Plugins that list `id` in their own `triggers` are reachable forward too.
        for other in registry.all_metadata() {
            if other.triggers.contains(&id.to_string()) {
                visit(registry, &other.id, nodes, path)?;
            }
        }
        path.pop();
        Ok(())
    }

    stack.clear();
    visit(registry, root, &mut nodes, &mut path)?;

    let mut predecessors: HashMap<String, HashSet<String>> = nodes.iter().map(|id| (id.clone(), HashSet::new())).collect();
    for id in &nodes {
        let meta = registry.metadata(id).expect("node present in registry");
        for dep in &meta.depends_on {
            if nodes.contains(dep) {
                predecessors.entry(id.clone()).or_default().insert(dep.clone());
            }
        }
        for triggered in &meta.triggers {
            if nodes.contains(triggered) {
                predecessors.entry(triggered.clone()).or_default().insert(id.clone());
            }
        }
    }

    Ok(ExecutionGraph { nodes, predecessors })
}

/// Kahn's algorithm, grouped into layers: every node in a layer has all its
/// predecessors resolved by the end of the previous layer, so a layer's nodes
/// are exactly the ones that may run concurrently (§4.5 step 3-4, "nodes with
/// no predecessors have an edge from START; ... the node waits for all of them").
/// A non-empty remainder after processing is a cycle.
fn topological_layers(graph: &ExecutionGraph) -> AnalyticsResult<Vec<Vec<String>>> {
    let mut in_degree: HashMap<&str, usize> = graph.nodes.iter().map(|n| (n.as_str(), 0)).collect();
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for (node, preds) in &graph.predecessors {
        *in_degree.get_mut(node.as_str()).expect("node in in_degree map") = preds.len();
        for pred in preds {
            successors.entry(pred.as_str()).or_default().push(node.as_str());
        }
    }

    let mut layers = Vec::new();
    let mut frontier: VecDeque<&str> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(n, _)| *n).collect();
    let mut processed = 0;

    while !frontier.is_empty() {
        let layer: Vec<&str> = frontier.drain(..).collect();
        processed += layer.len();
        let mut next_frontier = Vec::new();
        for node in &layer {
            if let Some(succs) = successors.get(node) {
                for succ in succs {
                    let degree = in_degree.get_mut(succ).expect("successor in in_degree map");
                    *degree -= 1;
                    if *degree == 0 {
                        next_frontier.push(*succ);
                    }
                }
            }
        }
        layers.push(layer.into_iter().map(String::from).collect());
        frontier.extend(next_frontier);
    }

    if processed != graph.nodes.len() {
        return Err(AnalyticsError::ValidationError("cycle detected in execution graph".to_string()));
    }
    Ok(layers)
}

/// Runs the DAG rooted at one requested plugin and returns every produced
/// [`ExecutionResult`], keyed by plugin id.
pub struct AnalyticsEngine {
    registry: Arc<AnalyticsRegistry>,
    config: AnalyticsEngineConfig,
    result_store: DashMap<(String, String), ExecutionResult>,
}

impl AnalyticsEngine {
    pub fn new(registry: Arc<AnalyticsRegistry>, config: AnalyticsEngineConfig) -> Self {
        Self { registry, config, result_store: DashMap::new() }
    }

    pub fn config(&self) -> &AnalyticsEngineConfig {
        &self.config
    }

    /// §4.5 "Caching": queried by `analytics_id` + exact-match `input_data_used`.
    fn find_cached_result(&self, analytics_id: &str, input: &serde_json::Value) -> Option<ExecutionResult> {
        if !self.config.enable_result_cache {
            return None;
        }
        let key = (analytics_id.to_string(), input.to_string());
        self.result_store
            .get(&key)
            .filter(|r| r.status == ExecutionStatus::Success)
            .map(|r| r.value().clone())
    }

    pub async fn execute(
        &self,
        root: &str,
        input: serde_json::Value,
        data_manager: Arc<agentlens_data::DataManager>,
    ) -> AnalyticsResult<HashMap<String, ExecutionResult>> {
        let graph = build_execution_graph(&self.registry, root)?;
        let layers = topological_layers(&graph)?;

        // Shared across the whole run: every node in a layer writes its own
        // key concurrently, and the next layer only starts once the barrier
        // on this `join_all` resolves, so no node ever observes a partial
        // write from a still-running peer (§5 "no node sees partial results").
        let results: Arc<DashMap<String, ExecutionResult>> = Arc::new(DashMap::new());

        for layer in layers {
            let futures = layer.into_iter().map(|plugin_id| {
                let results = results.clone();
                let data_manager = data_manager.clone();
                let input = input.clone();
                let predecessor_ids: Vec<String> = graph.predecessors.get(&plugin_id).cloned().unwrap_or_default().into_iter().collect();
                async move {
                    let meta = self
                        .registry
                        .metadata(&plugin_id)
                        .ok_or_else(|| AnalyticsError::ValidationError(format!("unknown plugin `{plugin_id}`")))?;

                    let predecessor_results: Vec<ExecutionResult> =
                        predecessor_ids.iter().filter_map(|id| results.get(id).map(|r| r.value().clone())).collect();

                    let failed: Vec<String> = predecessor_results
                        .iter()
                        .filter(|r| r.status == ExecutionStatus::Failure)
                        .map(|r| r.analytics_id.clone())
                        .collect();

                    let merged_input =
                        if predecessor_ids.is_empty() { input } else { merge_predecessor_outputs(&input, &predecessor_results) };

                    let result = if !failed.is_empty() {
                        ExecutionResult::dependency_failure(&plugin_id, &failed, merged_input, Utc::now())
                    } else if let Some(cached) = self.find_cached_result(&plugin_id, &merged_input) {
                        cached
                    } else {
                        self.run_plugin(&plugin_id, &meta.input_spec, merged_input, data_manager).await
                    };

                    self.result_store.insert((plugin_id.clone(), result.input_data_used.to_string()), result.clone());
                    results.insert(plugin_id, result);
                    Ok::<(), AnalyticsError>(())
                }
            });
            futures::future::try_join_all(futures).await?;
        }

        Ok(results.iter().map(|e| (e.key().clone(), e.value().clone())).collect())
    }

    async fn run_plugin(
        &self,
        plugin_id: &str,
        input_spec: &[super::field_spec::FieldSpec],
        merged_input: serde_json::Value,
        data_manager: Arc<agentlens_data::DataManager>,
    ) -> ExecutionResult {
        let start_time = Utc::now();

        if let Err(message) = validate_input(input_spec, &merged_input) {
            let end_time = Utc::now();
            return ExecutionResult {
                result_id: ExecutionResult::result_id_for(plugin_id, start_time),
                analytics_id: plugin_id.to_string(),
                status: ExecutionStatus::InvalidConfig,
                error: Some(super::plugin::ExecutionError { error_type: "InputError".to_string(), message, stack_trace: None }),
                execution_time_ms: (end_time - start_time).num_milliseconds() as f64,
                start_time,
                end_time,
                config_used: serde_json::Value::Null,
                input_data_used: merged_input,
                output: None,
                output_result: serde_json::Value::Null,
            };
        }

        let Some(plugin) = self.registry.get(plugin_id) else {
            let end_time = Utc::now();
            return ExecutionResult {
                result_id: ExecutionResult::result_id_for(plugin_id, start_time),
                analytics_id: plugin_id.to_string(),
                status: ExecutionStatus::Failure,
                error: Some(super::plugin::ExecutionError {
                    error_type: "ValidationError".to_string(),
                    message: format!("plugin `{plugin_id}` not found at execution time"),
                    stack_trace: None,
                }),
                execution_time_ms: 0.0,
                start_time,
                end_time,
                config_used: serde_json::Value::Null,
                input_data_used: merged_input,
                output: None,
                output_result: serde_json::Value::Null,
            };
        };

        let ctx = PluginExecutionContext { data_manager, config: self.config.clone() };
        let outcome = plugin.execute(merged_input.clone(), &ctx).await;
        let end_time = Utc::now();
        let execution_time_ms = (end_time - start_time).num_milliseconds() as f64;

        match outcome {
            Ok(output) => ExecutionResult {
                result_id: ExecutionResult::result_id_for(plugin_id, start_time),
                analytics_id: plugin_id.to_string(),
                status: ExecutionStatus::Success,
                error: None,
                execution_time_ms,
                start_time,
                end_time,
                config_used: serde_json::Value::Null,
                input_data_used: merged_input,
                output_result: output.clone(),
                output: Some(output),
            },
            Err(e) => ExecutionResult {
                result_id: ExecutionResult::result_id_for(plugin_id, start_time),
                analytics_id: plugin_id.to_string(),
                status: ExecutionStatus::Failure,
                error: Some(super::plugin::ExecutionError {
                    error_type: "ProcessingError".to_string(),
                    message: e.to_string(),
                    stack_trace: Some(format!("{e:?}")),
                }),
                execution_time_ms,
                start_time,
                end_time,
                config_used: serde_json::Value::Null,
                input_data_used: merged_input,
                output: None,
                output_result: serde_json::Value::Null,
            },
        }
    }
}

/// Later predecessors overwrite earlier ones on key collision (§4.5 step 2);
/// order among parallel predecessors is unspecified, matching the topological
/// order they were produced in here.
fn merge_predecessor_outputs(original_input: &serde_json::Value, predecessor_results: &[ExecutionResult]) -> serde_json::Value {
    let mut merged = original_input.as_object().cloned().unwrap_or_default();
    for result in predecessor_results {
        if let Some(output) = result.output.as_ref().and_then(|o| o.as_object()) {
            for (k, v) in output {
                merged.insert(k.clone(), v.clone());
            }
        }
    }
    serde_json::Value::Object(merged)
}

fn validate_input(spec: &[super::field_spec::FieldSpec], input: &serde_json::Value) -> Result<(), String> {
    let obj = input.as_object().ok_or_else(|| "input is not a JSON object".to_string())?;
    for field in spec {
        match obj.get(&field.name) {
            Some(value) if field.accepts(value) => {}
            Some(_) => return Err(format!("field `{}` has the wrong type", field.name)),
            None if field.required && field.default.is_none() => {
                return Err(format!("missing required field `{}`", field.name));
            }
            None => {}
        }
    }
    Ok(())
}
