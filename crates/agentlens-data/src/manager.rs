//! The data-manager (§4.2): domain methods layered over the generic Store.

use std::collections::HashMap;
use std::sync::Arc;

use agentlens_store::{BulkStoreResult, Store};
use agentlens_types::{Element, ElementId, ElementKind, Query, QueryFilter, Span, Trace, TraceGroup};
use chrono::{DateTime, Utc};

use crate::error::DataResult;

/// Wraps one or more [`Store`] backends behind the domain-shaped methods the
/// rest of the system calls. A `tag` narrows which underlying partition is
/// searched (e.g. "hot" vs "cold"); absent tag searches the primary store.
pub struct DataManager {
    primary: Arc<dyn Store>,
    tagged: HashMap<String, Arc<dyn Store>>,
}

impl DataManager {
    pub fn new(primary: Arc<dyn Store>) -> Self {
        Self {
            primary,
            tagged: HashMap::new(),
        }
    }

    pub fn with_tagged_store(mut self, tag: impl Into<String>, store: Arc<dyn Store>) -> Self {
        self.tagged.insert(tag.into(), store);
        self
    }

    fn store_for(&self, tag: Option<&str>) -> &Arc<dyn Store> {
        tag.and_then(|t| self.tagged.get(t)).unwrap_or(&self.primary)
    }

    /// A missing record returns `None`, never an error (§4.2 failure semantics).
    #[tracing::instrument(skip(self), fields(element_id = %element_id, kind = %kind))]
    pub async fn get_by_id(
        &self,
        element_id: &ElementId,
        kind: ElementKind,
        tag: Option<&str>,
    ) -> DataResult<Option<Element>> {
        Ok(self.store_for(tag).retrieve(kind, element_id).await?)
    }

    /// Ownership traversal: every element of `child_kind` whose `root_id` matches.
    pub async fn get_children(
        &self,
        root_id: &ElementId,
        child_kind: ElementKind,
        tag: Option<&str>,
    ) -> DataResult<Vec<Element>> {
        let mut query = Query::new();
        query.insert("root_id".to_string(), QueryFilter::eq(root_id.as_str()));
        Ok(self.store_for(tag).search(child_kind, &query).await?)
    }

    /// Batch variant of [`Self::get_children`]; caller regroups the flat list by `root_id`.
    pub async fn get_children_for_list(
        &self,
        root_ids: &[ElementId],
        child_kind: ElementKind,
    ) -> DataResult<Vec<Element>> {
        let ids: Vec<serde_json::Value> = root_ids.iter().map(|id| serde_json::json!(id.as_str())).collect();
        let mut query = Query::new();
        query.insert(
            "root_id".to_string(),
            QueryFilter {
                operator: agentlens_types::QueryOperator::EqualsMany,
                value: serde_json::Value::Array(ids),
            },
        );
        Ok(self.primary.search(child_kind, &query).await?)
    }

    pub async fn get_spans(&self, trace_id: &str) -> DataResult<Vec<Span>> {
        let mut query = Query::new();
        query.insert("context.trace_id".to_string(), QueryFilter::eq(trace_id));
        let elements = self.primary.search(ElementKind::Span, &query).await?;
        Ok(elements.into_iter().filter_map(|e| e.as_span().cloned()).collect())
    }

    /// Traces for a service within `[from, to]`. The time-range predicate is
    /// applied in-process, not via the generic [`Query`] language, since
    /// timestamps are compared as `DateTime`, not JSON numerics.
    pub async fn get_traces(
        &self,
        service: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DataResult<Vec<Trace>> {
        let all = self.primary.get_all(ElementKind::Trace).await?;
        Ok(all
            .into_iter()
            .filter_map(|e| match e {
                Element::Trace(t) => Some(t),
                _ => None,
            })
            .filter(|t| t.service_name == service && t.start_time >= from && t.end_time <= to)
            .collect())
    }

    pub async fn get_trace_groups(&self, service: &str) -> DataResult<Vec<TraceGroup>> {
        let mut query = Query::new();
        query.insert("service_name".to_string(), QueryFilter::eq(service));
        let elements = self.primary.search(ElementKind::TraceGroup, &query).await?;
        Ok(elements
            .into_iter()
            .filter_map(|e| match e {
                Element::TraceGroup(g) => Some(g),
                _ => None,
            })
            .collect())
    }

    pub async fn get_traces_for_trace_group(&self, trace_group_id: &ElementId) -> DataResult<Vec<Trace>> {
        let group = self.primary.retrieve(ElementKind::TraceGroup, trace_group_id).await?;
        let Some(Element::TraceGroup(group)) = group else {
            return Ok(Vec::new());
        };
        let mut traces = Vec::with_capacity(group.traces_ids.len());
        for trace_id in &group.traces_ids {
            let id = ElementId::from_string(trace_id.clone());
            if let Some(Element::Trace(trace)) = self.primary.retrieve(ElementKind::Trace, &id).await? {
                traces.push(trace);
            }
        }
        Ok(traces)
    }

    /// Follow `related_to` forward from a known element: resolve `element_id`
    /// (of `kind`), then retrieve each peer it lists, optionally narrowed to
    /// `target_kind`.
    pub async fn get_related_elements(
        &self,
        element_id: &ElementId,
        kind: ElementKind,
        target_kind: Option<ElementKind>,
    ) -> DataResult<Vec<Element>> {
        let Some(element) = self.primary.retrieve(kind, element_id).await? else {
            return Ok(Vec::new());
        };
        let header = element.header();
        let mut related = Vec::new();
        for (peer_id, peer_kind) in header.related_to_ids.iter().zip(header.related_to_types.iter()) {
            if let Some(target) = target_kind {
                if *peer_kind != target {
                    continue;
                }
            }
            if let Some(peer) = self.primary.retrieve(*peer_kind, peer_id).await? {
                related.push(peer);
            }
        }
        Ok(related)
    }

    /// Follow `related_to` backward: every element (of any kind) that lists
    /// `artifact_id` as one of its `related_to_ids`. Scans every kind.
    pub async fn get_elements_related_to_artifact(&self, artifact_id: &ElementId) -> DataResult<Vec<Element>> {
        use strum::IntoEnumIterator;
        let mut out = Vec::new();
        for kind in ElementKind::iter() {
            out.extend(self.elements_related_to_in_kind(artifact_id, kind).await?);
        }
        Ok(out)
    }

    /// Typed variant of [`Self::get_elements_related_to_artifact`]: scans only
    /// `target_kind`'s collection, per §4.2's `related_to_types` index.
    pub async fn get_elements_related_to_artifact_and_type(
        &self,
        artifact_id: &ElementId,
        target_kind: ElementKind,
    ) -> DataResult<Vec<Element>> {
        self.elements_related_to_in_kind(artifact_id, target_kind).await
    }

    async fn elements_related_to_in_kind(
        &self,
        artifact_id: &ElementId,
        kind: ElementKind,
    ) -> DataResult<Vec<Element>> {
        let all = self.primary.get_all(kind).await?;
        Ok(all
            .into_iter()
            .filter(|e| e.header().related_to_ids.iter().any(|id| id == artifact_id))
            .collect())
    }

    #[tracing::instrument(skip(self, elements), fields(count = elements.len()))]
    pub async fn bulk_store(&self, elements: Vec<Element>, ignore_duplicates: bool) -> DataResult<BulkStoreResult> {
        let result = self.primary.bulk_store(elements, ignore_duplicates).await?;
        if !result.failed.is_empty() {
            tracing::warn!(failed = result.failed.len(), "bulk_store had partial failures");
        }
        Ok(result)
    }

    pub async fn delete(&self, element_id: &ElementId, kind: ElementKind) -> DataResult<bool> {
        Ok(self.primary.delete(kind, element_id).await?)
    }

    pub async fn get_all(&self, kind: ElementKind) -> DataResult<Vec<Element>> {
        Ok(self.primary.get_all(kind).await?)
    }

    pub async fn search(&self, kind: ElementKind, query: &Query, tag: Option<&str>) -> DataResult<Vec<Element>> {
        Ok(self.store_for(tag).search(kind, query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_store::InMemoryStore;
    use agentlens_types::{ElementHeader, SpanContext, SpanKind, SpanResource, SpanStatus};

    fn manager() -> DataManager {
        DataManager::new(Arc::new(InMemoryStore::new()))
    }

    fn span(id: &str, trace_id: &str, root: &ElementId) -> Element {
        Element::Span(Span {
            header: ElementHeader::new(ElementId::from_string(id)).with_root(root.clone()),
            context: SpanContext {
                trace_id: trace_id.to_string(),
                span_id: id.to_string(),
            },
            parent_id: None,
            name: "agent.step".to_string(),
            kind: SpanKind::Internal,
            start_time: Utc::now(),
            end_time: Utc::now(),
            status: SpanStatus::Ok,
            resource: SpanResource::default(),
            raw_attributes: Default::default(),
            events: vec![],
            links: vec![],
        })
    }

    #[tokio::test]
    async fn get_children_filters_by_root_id() {
        let dm = manager();
        let root = ElementId::from_string("Trace-1");
        dm.bulk_store(vec![span("S1", "Trace-1", &root), span("S2", "Trace-2", &ElementId::from_string("Trace-2"))], false)
            .await
            .unwrap();

        let children = dm.get_children(&root, ElementKind::Span, None).await.unwrap();
        assert_eq!(children.len(), 1);
    }

    #[tokio::test]
    async fn get_related_elements_follows_forward_links() {
        let dm = manager();
        let task_id = ElementId::from_string("Task-1");
        let action_id = ElementId::from_string("Action-1");

        let mut task_header = ElementHeader::new(task_id.clone());
        task_header.add_related(action_id.clone(), ElementKind::Action);
        let task = Element::Task(agentlens_types::Task {
            header: task_header,
            kind: Some(agentlens_types::TaskKind::Manual),
            state: Some(agentlens_types::TaskState::Completed),
            status: Some(agentlens_types::TaskStatus::Success),
            input: None,
            output: None,
            start_time: Utc::now(),
            end_time: Utc::now(),
            events: vec![],
            issues: vec![],
            metrics: Default::default(),
            parent_id: None,
            dependent_ids: vec![],
            action_id: Some(action_id.as_str().to_string()),
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
        });

        let action = Element::Action(agentlens_types::Action {
            header: ElementHeader::new(action_id.clone()),
            code_id: "do_thing".to_string(),
            kind: agentlens_types::ActionKind::Tool,
            input_schema: None,
            output_schema: None,
            is_generated: false,
            consumed_resources: Default::default(),
        });

        dm.bulk_store(vec![task, action], false).await.unwrap();

        let related = dm
            .get_related_elements(&task_id, ElementKind::Task, Some(ElementKind::Action))
            .await
            .unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].element_id(), &action_id);
    }

    #[tokio::test]
    async fn missing_record_returns_none_not_error() {
        let dm = manager();
        let result = dm
            .get_by_id(&ElementId::from_string("missing"), ElementKind::Span, None)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
