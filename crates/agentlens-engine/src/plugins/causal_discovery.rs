//! CausalDiscovery (§4.6): Alpha Miner process discovery over root-task
//! sequences, producing a [`Workflow`] (activities + typed edges) plus one
//! [`TraceWorkflow`] binding it back to each concrete trace.
//!
//! Only the direct-succession / causality / parallel / choice relations are
//! computed — no log-based noise filtering, no long-distance dependencies.
//! A node or edge's SEQUENCE/AND/XOR type is decided from the *source*
//! activity's outgoing relations; the target's incoming relations are
//! consulted only when the source has a single successor, so a node is never
//! assigned two different split types depending on which edge you look at.

use std::collections::{HashMap, HashSet};

use agentlens_types::{
    Element, ElementHeader, ElementId, ElementKind, Task, TraceWorkflow, Workflow, WorkflowEdge, WorkflowEdgeType, WorkflowNode,
    WorkflowNodeGateway,
};
use async_trait::async_trait;

use crate::analytics::{AnalyticsPlugin, FieldSpec, FieldType, PluginExecutionContext, PluginMetadata, PluginStatus};

pub struct CausalDiscovery;

fn activity_name(task: &Task) -> String {
    task.header.name.clone().or_else(|| task.code_id.clone()).unwrap_or_else(|| task.header.element_id.as_str().to_string())
}

#[derive(Default)]
struct Footprint {
    direct_follows: HashMap<(String, String), u64>,
}

impl Footprint {
    fn observe(&mut self, sequence: &[String]) {
        for pair in sequence.windows(2) {
            *self.direct_follows.entry((pair[0].clone(), pair[1].clone())).or_default() += 1;
        }
    }

    fn follows(&self, a: &str, b: &str) -> u64 {
        self.direct_follows.get(&(a.to_string(), b.to_string())).copied().unwrap_or(0)
    }

    fn is_causal(&self, a: &str, b: &str) -> bool {
        self.follows(a, b) > 0 && self.follows(b, a) == 0
    }

    fn is_parallel(&self, a: &str, b: &str) -> bool {
        self.follows(a, b) > 0 && self.follows(b, a) > 0
    }
}

/// SEQUENCE if `successors` has one member; otherwise AND if every pair is
/// parallel, XOR if every pair is choice/causal-only, else XOR as a fallback.
fn split_type(successors: &[&String], footprint: &Footprint) -> WorkflowEdgeType {
    if successors.len() <= 1 {
        return WorkflowEdgeType::Sequence;
    }
    let all_parallel = successors
        .iter()
        .enumerate()
        .all(|(i, a)| successors.iter().skip(i + 1).all(|b| footprint.is_parallel(a, b)));
    if all_parallel {
        WorkflowEdgeType::And
    } else {
        WorkflowEdgeType::Xor
    }
}

fn gateway_for(edge_type: WorkflowEdgeType, is_split: bool) -> WorkflowNodeGateway {
    match (edge_type, is_split) {
        (WorkflowEdgeType::And, true) => WorkflowNodeGateway::AndSplit,
        (WorkflowEdgeType::And, false) => WorkflowNodeGateway::AndJoin,
        (WorkflowEdgeType::Xor, true) => WorkflowNodeGateway::XorSplit,
        (WorkflowEdgeType::Xor, false) => WorkflowNodeGateway::XorJoin,
        (WorkflowEdgeType::Sequence, _) => WorkflowNodeGateway::None,
    }
}

impl CausalDiscovery {
    pub fn metadata() -> PluginMetadata {
        PluginMetadata {
            id: "causal_discovery".to_string(),
            name: "Causal Discovery".to_string(),
            version: "1.0.0".to_string(),
            owner: "platform".to_string(),
            description: "Mines a process model from root-task sequences across a trace group".to_string(),
            tags: vec![],
            status: PluginStatus::Active,
            depends_on: vec!["task_analytics".to_string()],
            triggers: vec![],
            config: serde_json::Value::Null,
            input_spec: vec![FieldSpec::new("trace_ids", FieldType::Array, true).array_of(FieldType::String)],
            output_spec: vec![
                FieldSpec::new("workflow_id", FieldType::String, true),
                FieldSpec::new("node_count", FieldType::Integer, true),
                FieldSpec::new("edge_count", FieldType::Integer, true),
            ],
        }
    }
}

#[async_trait]
impl AnalyticsPlugin for CausalDiscovery {
    fn metadata(&self) -> &PluginMetadata {
        static META: std::sync::OnceLock<PluginMetadata> = std::sync::OnceLock::new();
        META.get_or_init(CausalDiscovery::metadata)
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

        let root_ids: Vec<ElementId> = trace_ids.iter().map(|id| ElementId::from_string(id.clone())).collect();
        let elements = ctx.data_manager.get_children_for_list(&root_ids, ElementKind::Task).await?;

        let mut by_trace: HashMap<String, Vec<Task>> = HashMap::new();
        for element in elements {
            if let Element::Task(task) = element {
                if task.parent_id.is_none() {
                    if let Some(root_id) = &task.header.root_id {
                        by_trace.entry(root_id.as_str().to_string()).or_default().push(task);
                    }
                }
            }
        }

        let mut footprint = Footprint::default();
        let mut sequences: Vec<Vec<String>> = Vec::new();
        let mut action_by_activity: HashMap<String, Option<String>> = HashMap::new();
        for (_, mut tasks) in by_trace {
            tasks.sort_by_key(|t| t.start_time);
            let names: Vec<String> = tasks
                .iter()
                .map(|t| {
                    let name = activity_name(t);
                    action_by_activity.entry(name.clone()).or_insert_with(|| t.action_id.clone());
                    name
                })
                .collect();
            footprint.observe(&names);
            sequences.push(names);
        }

        let activities: HashSet<String> = sequences.iter().flatten().cloned().collect();
        let mut activities: Vec<String> = activities.into_iter().collect();
        activities.sort();

        let mut node_ids: HashMap<String, ElementId> = HashMap::new();
        let mut out_gateway: HashMap<String, WorkflowNodeGateway> = HashMap::new();
        let mut in_gateway: HashMap<String, WorkflowNodeGateway> = HashMap::new();
        let mut edges = Vec::new();

        let total_traces = sequences.len().max(1) as f64;

        for source in &activities {
            let successors: Vec<&String> = activities.iter().filter(|target| footprint.is_causal(source, target)).collect();
            let edge_type = split_type(&successors, &footprint);
            if successors.len() > 1 {
                out_gateway.insert(source.clone(), gateway_for(edge_type, true));
            }
            for target in &successors {
                let support = footprint.follows(source, target) as f64 / total_traces;
                edges.push((source.clone(), (*target).clone(), edge_type, support));
            }
        }

        for target in &activities {
            let predecessors: Vec<&String> = activities.iter().filter(|source| footprint.is_causal(source, target)).collect();
            if predecessors.len() > 1 {
                let join_type = split_type(&predecessors, &footprint);
                in_gateway.insert(target.clone(), gateway_for(join_type, false));
            }
        }

        let mut nodes = Vec::new();
        for activity in &activities {
            let node_id = ElementId::generate("WorkflowNode");
            let gateway = out_gateway.get(activity).copied().or_else(|| in_gateway.get(activity).copied()).unwrap_or(WorkflowNodeGateway::None);
            let mut header = ElementHeader::new(node_id.clone());
            header.name = Some(activity.clone());
            nodes.push(WorkflowNode {
                header,
                activity_name: activity.clone(),
                gateway,
                action_id: action_by_activity.get(activity).cloned().flatten(),
            });
            node_ids.insert(activity.clone(), node_id);
        }

        let workflow_id = ElementId::generate("Workflow");
        let mut workflow_edges = Vec::new();
        for (source, target, edge_type, support) in edges {
            let source_node_id = node_ids[&source].clone();
            let target_node_id = node_ids[&target].clone();
            let mut header = ElementHeader::new(ElementId::generate("WorkflowEdge"));
            header.root_id = Some(workflow_id.clone());
            workflow_edges.push(WorkflowEdge {
                header,
                source_node_id: source_node_id.as_str().to_string(),
                target_node_id: target_node_id.as_str().to_string(),
                edge_type,
                support,
            });
        }

        let workflow = Workflow {
            header: {
                let mut h = ElementHeader::new(workflow_id.clone());
                h.name = Some("Discovered process model".to_string());
                h
            },
            node_ids: nodes.iter().map(|n| n.header.element_id.as_str().to_string()).collect(),
            edge_ids: workflow_edges.iter().map(|e| e.header.element_id.as_str().to_string()).collect(),
        };

        let mut to_store: Vec<Element> = Vec::new();
        to_store.extend(nodes.iter().cloned().map(Element::WorkflowNode));
        to_store.extend(workflow_edges.iter().cloned().map(Element::WorkflowEdge));
        to_store.push(Element::Workflow(workflow.clone()));

        for trace_id in &trace_ids {
            let mut header = ElementHeader::new(ElementId::generate("TraceWorkflow"));
            header.root_id = Some(ElementId::from_string(trace_id.clone()));
            to_store.push(Element::TraceWorkflow(TraceWorkflow {
                header,
                workflow_id: workflow_id.as_str().to_string(),
                trace_id: trace_id.clone(),
            }));
        }

        ctx.data_manager.bulk_store(to_store, true).await?;

        Ok(serde_json::json!({
            "workflow_id": workflow_id.as_str(),
            "node_count": nodes.len(),
            "edge_count": workflow_edges.len(),
        }))
    }
}
