//! Per-tenant component cache (§4.2, §5): a tenant's [`DataManager`] is built
//! lazily on first reference and cached by `tenant_id`. Concurrent first
//! references to the same tenant must not race into two different managers —
//! the second caller waits for and reuses the first's result.

use std::sync::Arc;

use agentlens_store::{InMemoryStore, SqliteStore, Store};
use agentlens_types::TenantId;
use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::error::{DataError, DataResult};
use crate::manager::DataManager;
use crate::tenant::{StoreKind, TenantConfig, TenantConfigResolver};

/// Builds and caches one [`DataManager`] per tenant.
///
/// `OnceCell` per tenant (rather than a single mutex over the whole map)
/// means building tenant A's manager never blocks a concurrent lookup of
/// tenant B — only concurrent first-lookups of the *same* tenant serialize.
pub struct DataManagerRegistry {
    resolver: TenantConfigResolver,
    cache: DashMap<TenantId, Arc<OnceCell<Arc<DataManager>>>>,
}

impl DataManagerRegistry {
    pub fn new(resolver: TenantConfigResolver) -> Self {
        Self {
            resolver,
            cache: DashMap::new(),
        }
    }

    /// Returns the tenant's cached manager, building it on first reference.
    #[tracing::instrument(skip(self), fields(tenant_id = tenant_external_id))]
    pub async fn get_or_create(&self, tenant_external_id: &str) -> DataResult<Arc<DataManager>> {
        let tenant_id = TenantId::from_external(tenant_external_id);
        let cell = self
            .cache
            .entry(tenant_id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_try_init(|| self.build(tenant_external_id)).await.cloned()
    }

    async fn build(&self, tenant_external_id: &str) -> DataResult<Arc<DataManager>> {
        let config = self.resolver.resolve(tenant_external_id).await?;
        Ok(Arc::new(DataManager::new(store_for_config(&config)?)))
    }
}

fn store_for_config(config: &TenantConfig) -> DataResult<Arc<dyn Store>> {
    match &config.store {
        StoreKind::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreKind::Sqlite { path } => {
            let store = SqliteStore::open(path).map_err(|_| DataError::TenantConfig {
                tenant: config.tenant_id.clone(),
            })?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::NullRemoteResolver;

    #[tokio::test]
    async fn concurrent_first_lookups_build_exactly_one_manager() {
        let registry = Arc::new(DataManagerRegistry::new(TenantConfigResolver::new(
            Box::new(NullRemoteResolver),
            None,
        )));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move { registry.get_or_create("acme-corp").await.unwrap() }));
        }

        let managers: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let first = Arc::as_ptr(&managers[0]);
        assert!(managers.iter().all(|m| Arc::as_ptr(m) == first));
    }
}
