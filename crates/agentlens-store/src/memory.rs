//! In-memory Store backend — the reference implementation, used by tests and
//! single-tenant/dev deployments.

use dashmap::DashMap;

use agentlens_types::{Element, ElementId, ElementKind, Query};

use crate::error::StoreResult;
use crate::store::Store;

/// Keyed by kind first so `get_all`/`search` don't scan unrelated collections,
/// then by element_id — mirrors the "one logical collection per artifact kind"
/// persisted-state layout from §6.
#[derive(Default)]
pub struct InMemoryStore {
    collections: DashMap<ElementKind, DashMap<ElementId, Element>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, kind: ElementKind) -> dashmap::mapref::one::Ref<'_, ElementKind, DashMap<ElementId, Element>> {
        self.collections.entry(kind).or_default();
        self.collections.get(&kind).expect("just inserted")
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn store(&self, value: Element) -> StoreResult<ElementId> {
        let kind = value.kind();
        let id = value.element_id().clone();
        self.collections.entry(kind).or_default();
        self.collections.get(&kind).unwrap().insert(id.clone(), value);
        Ok(id)
    }

    async fn retrieve(&self, kind: ElementKind, element_id: &ElementId) -> StoreResult<Option<Element>> {
        Ok(self.collection(kind).get(element_id).map(|r| r.value().clone()))
    }

    async fn search(&self, kind: ElementKind, query: &Query) -> StoreResult<Vec<Element>> {
        let collection = self.collection(kind);
        let matches = collection
            .iter()
            .filter(|entry| matches_query(entry.value(), query))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(matches)
    }

    async fn update(&self, kind: ElementKind, element_id: &ElementId, new_value: Element) -> StoreResult<bool> {
        let collection = self.collection(kind);
        if collection.contains_key(element_id) {
            collection.insert(element_id.clone(), new_value);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn delete(&self, kind: ElementKind, element_id: &ElementId) -> StoreResult<bool> {
        Ok(self.collection(kind).remove(element_id).is_some())
    }

    async fn get_all(&self, kind: ElementKind) -> StoreResult<Vec<Element>> {
        Ok(self.collection(kind).iter().map(|e| e.value().clone()).collect())
    }
}

/// A field is resolved either from the header (`element_id`, `root_id`, `tags`, ...)
/// or, failing that, from the kind-specific body via its JSON projection — keeps
/// the in-memory backend honest against the same "field → QueryFilter" contract
/// a document-store backend would implement with a JSON path query.
fn matches_query(element: &Element, query: &Query) -> bool {
    let projected = match serde_json::to_value(element) {
        Ok(v) => v,
        Err(_) => return false,
    };
    query.iter().all(|(field, filter)| match projected.get(field) {
        Some(value) => filter.matches(value),
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_types::{ElementHeader, QueryFilter, Span, SpanContext, SpanKind, SpanResource, SpanStatus};
    use chrono::Utc;

    fn sample_span(id: &str, trace_id: &str) -> Element {
        Element::Span(Span {
            header: ElementHeader::new(ElementId::from_string(id)),
            context: SpanContext {
                trace_id: trace_id.to_string(),
                span_id: id.to_string(),
            },
            parent_id: None,
            name: "agent.task".to_string(),
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
    async fn store_then_retrieve_roundtrips() {
        let store = InMemoryStore::new();
        let id = store.store(sample_span("S1", "T1")).await.unwrap();
        let back = store.retrieve(ElementKind::Span, &id).await.unwrap();
        assert!(back.is_some());
        assert_eq!(back.unwrap().element_id(), &id);
    }

    #[tokio::test]
    async fn retrieve_missing_returns_none_not_error() {
        let store = InMemoryStore::new();
        let result = store
            .retrieve(ElementKind::Span, &ElementId::from_string("missing"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn search_filters_by_field() {
        let store = InMemoryStore::new();
        store.store(sample_span("S1", "T1")).await.unwrap();
        store.store(sample_span("S2", "T2")).await.unwrap();

        let mut query = Query::new();
        query.insert("context.trace_id".to_string(), QueryFilter::eq("T1"));
        let results = store.search(ElementKind::Span, &query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].element_id().as_str(), "S1");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryStore::new();
        let id = store.store(sample_span("S1", "T1")).await.unwrap();
        assert!(store.delete(ElementKind::Span, &id).await.unwrap());
        assert!(!store.delete(ElementKind::Span, &id).await.unwrap());
    }

    #[tokio::test]
    async fn bulk_store_reports_duplicates_without_aborting() {
        let store = InMemoryStore::new();
        store.store(sample_span("S1", "T1")).await.unwrap();

        let result = store
            .bulk_store(vec![sample_span("S1", "T1"), sample_span("S2", "T1")], true)
            .await
            .unwrap();
        assert_eq!(result.stored_ids.len(), 1);
        assert_eq!(result.failed.len(), 1);
    }
}
