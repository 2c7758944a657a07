//! The Element taxonomy: a shared header plus a tagged-union body (§3, §9 "Polymorphic elements").
//!
//! The source models this as a generic base class with a subclass per kind and
//! a private-constructor creation guard. Here that collapses into a sum type:
//! [`ElementHeader`] is the shared part, [`Element`] is the discriminated body,
//! and construction goes through [`Element::new`] / the kind-specific `From`
//! impls rather than a runtime token check — the type system is the guard.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analytics::{Annotation, Issue, Metric, Recommendation};
use crate::ids::ElementId;
use crate::span::{Span, Trace, TraceGroup};
use crate::task::{Action, Task};
use crate::workflow::{TraceWorkflow, Workflow, WorkflowEdge, WorkflowNode};

/// Fields shared by every persisted artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElementHeader {
    pub element_id: ElementId,
    /// Ownership link (§3): the element belongs to the lifecycle of this element, if any.
    pub root_id: Option<ElementId>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    pub plugin_metadata_id: Option<String>,
    /// Relation link (§3): many-to-many peer references, kept parallel with `related_to_types`.
    #[serde(default)]
    pub related_to_ids: Vec<ElementId>,
    #[serde(default)]
    pub related_to_types: Vec<ElementKind>,
}

impl ElementHeader {
    pub fn new(element_id: ElementId) -> Self {
        Self {
            element_id,
            root_id: None,
            name: None,
            description: None,
            tags: Vec::new(),
            attributes: HashMap::new(),
            plugin_metadata_id: None,
            related_to_ids: Vec::new(),
            related_to_types: Vec::new(),
        }
    }

    pub fn with_root(mut self, root_id: ElementId) -> Self {
        self.root_id = Some(root_id);
        self
    }

    /// Add a relation-link peer reference, keeping `related_to_ids`/`related_to_types` parallel.
    pub fn add_related(&mut self, id: ElementId, kind: ElementKind) {
        self.related_to_ids.push(id);
        self.related_to_types.push(kind);
    }

    /// Invariant check from §8: `len(related_to_ids) == len(related_to_types)`.
    pub fn relations_well_formed(&self) -> bool {
        self.related_to_ids.len() == self.related_to_types.len()
    }
}

/// The type discriminator. Doubles as the tag stored in `related_to_types` for
/// typed back-queries and as the `type` column in every store backend.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
    strum::Display, strum::EnumString, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ElementKind {
    Trace,
    Span,
    Task,
    Action,
    Metric,
    Issue,
    Annotation,
    TraceGroup,
    Workflow,
    WorkflowNode,
    WorkflowEdge,
    TraceWorkflow,
    Recommendation,
}

impl ElementKind {
    /// The id-generation prefix conventionally used for this kind (§3: `Action-…`, `Task-…`).
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ElementKind::Trace => "Trace",
            ElementKind::Span => "Span",
            ElementKind::Task => "Task",
            ElementKind::Action => "Action",
            ElementKind::Metric => "Metric",
            ElementKind::Issue => "Issue",
            ElementKind::Annotation => "Annotation",
            ElementKind::TraceGroup => "TraceGroup",
            ElementKind::Workflow => "Workflow",
            ElementKind::WorkflowNode => "WorkflowNode",
            ElementKind::WorkflowEdge => "WorkflowEdge",
            ElementKind::TraceWorkflow => "TraceWorkflow",
            ElementKind::Recommendation => "Recommendation",
        }
    }
}

/// The tagged-union Element. One header, one kind-specific body.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Trace(Trace),
    Span(Span),
    Task(Task),
    Action(Action),
    Metric(Metric),
    Issue(Issue),
    Annotation(Annotation),
    TraceGroup(TraceGroup),
    Workflow(Workflow),
    WorkflowNode(WorkflowNode),
    WorkflowEdge(WorkflowEdge),
    TraceWorkflow(TraceWorkflow),
    Recommendation(Recommendation),
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Trace(_) => ElementKind::Trace,
            Element::Span(_) => ElementKind::Span,
            Element::Task(_) => ElementKind::Task,
            Element::Action(_) => ElementKind::Action,
            Element::Metric(_) => ElementKind::Metric,
            Element::Issue(_) => ElementKind::Issue,
            Element::Annotation(_) => ElementKind::Annotation,
            Element::TraceGroup(_) => ElementKind::TraceGroup,
            Element::Workflow(_) => ElementKind::Workflow,
            Element::WorkflowNode(_) => ElementKind::WorkflowNode,
            Element::WorkflowEdge(_) => ElementKind::WorkflowEdge,
            Element::TraceWorkflow(_) => ElementKind::TraceWorkflow,
            Element::Recommendation(_) => ElementKind::Recommendation,
        }
    }

    pub fn header(&self) -> &ElementHeader {
        match self {
            Element::Trace(e) => &e.header,
            Element::Span(e) => &e.header,
            Element::Task(e) => &e.header,
            Element::Action(e) => &e.header,
            Element::Metric(e) => &e.header,
            Element::Issue(e) => &e.header,
            Element::Annotation(e) => &e.header,
            Element::TraceGroup(e) => &e.header,
            Element::Workflow(e) => &e.header,
            Element::WorkflowNode(e) => &e.header,
            Element::WorkflowEdge(e) => &e.header,
            Element::TraceWorkflow(e) => &e.header,
            Element::Recommendation(e) => &e.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut ElementHeader {
        match self {
            Element::Trace(e) => &mut e.header,
            Element::Span(e) => &mut e.header,
            Element::Task(e) => &mut e.header,
            Element::Action(e) => &mut e.header,
            Element::Metric(e) => &mut e.header,
            Element::Issue(e) => &mut e.header,
            Element::Annotation(e) => &mut e.header,
            Element::TraceGroup(e) => &mut e.header,
            Element::Workflow(e) => &mut e.header,
            Element::WorkflowNode(e) => &mut e.header,
            Element::WorkflowEdge(e) => &mut e.header,
            Element::TraceWorkflow(e) => &mut e.header,
            Element::Recommendation(e) => &mut e.header,
        }
    }

    pub fn element_id(&self) -> &ElementId {
        &self.header().element_id
    }

    pub fn root_id(&self) -> Option<&ElementId> {
        self.header().root_id.as_ref()
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Element::Task(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_span(&self) -> Option<&Span> {
        match self {
            Element::Span(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Element::Action(a) => Some(a),
            _ => None,
        }
    }
}
