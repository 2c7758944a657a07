//! The Store abstraction (§4.1): uniform CRUD + typed query language over N backends.

use agentlens_types::{Element, ElementId, ElementKind, Query};

use crate::error::StoreResult;

/// Outcome of a bulk store: which values succeeded, and which were skipped/failed.
#[derive(Debug, Default)]
pub struct BulkStoreResult {
    pub stored_ids: Vec<ElementId>,
    /// `(index into the input slice, error message)` for entries that failed or were
    /// skipped as duplicates. Per §4.1, one failure does not corrupt the others.
    pub failed: Vec<(usize, String)>,
}

/// Decouples the data-manager layer from the concrete backend (document DB,
/// search index, in-memory). Implementors are expected to be cheaply `Clone`
/// (an `Arc` around shared state) since the data-manager holds one per tenant.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn store(&self, value: Element) -> StoreResult<ElementId>;

    async fn retrieve(&self, kind: ElementKind, element_id: &ElementId) -> StoreResult<Option<Element>>;

    /// AND-combined query over the given kind's collection (§4.1). Order is
    /// unspecified unless the backend recognizes a sort key in `query`.
    async fn search(&self, kind: ElementKind, query: &Query) -> StoreResult<Vec<Element>>;

    async fn update(&self, kind: ElementKind, element_id: &ElementId, new_value: Element) -> StoreResult<bool>;

    async fn delete(&self, kind: ElementKind, element_id: &ElementId) -> StoreResult<bool>;

    async fn get_all(&self, kind: ElementKind) -> StoreResult<Vec<Element>>;

    /// Atomic per-value: one failure does not abort the rest (§4.1).
    async fn bulk_store(&self, values: Vec<Element>, ignore_duplicates: bool) -> StoreResult<BulkStoreResult> {
        let mut result = BulkStoreResult::default();
        for (i, value) in values.into_iter().enumerate() {
            let kind = value.kind();
            let id = value.element_id().clone();
            if ignore_duplicates && self.retrieve(kind, &id).await?.is_some() {
                result.failed.push((i, format!("duplicate element_id '{id}'")));
                continue;
            }
            match self.store(value).await {
                Ok(id) => result.stored_ids.push(id),
                Err(e) => result.failed.push((i, e.to_string())),
            }
        }
        Ok(result)
    }
}
