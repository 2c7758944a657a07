//! Tenant config resolution (§4.2): remote service → local YAML → env defaults.
//!
//! The remote leg is a named external collaborator, not implemented here — it
//! is a pluggable [`RemoteTenantConfigResolver`] trait object so callers can
//! wire in whatever HTTP client/service discovery their deployment uses. The
//! local-YAML and env-default legs are fully implemented and are what a
//! single-tenant or dev deployment actually exercises.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

/// Which backend a tenant's data-manager should be built against.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StoreKind {
    Memory,
    Sqlite { path: String },
}

impl Default for StoreKind {
    fn default() -> Self {
        StoreKind::Memory
    }
}

/// Resolved configuration for one tenant's data-manager.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: String,
    pub hostname: String,
    pub credentials: Option<String>,
    pub store: StoreKind,
}

/// The remote resolution service (§4.2, §6): an external collaborator named by
/// the design but not implemented — callers supply a real implementation, or
/// [`NullRemoteResolver`] as the always-miss test double used when none is
/// configured.
#[async_trait::async_trait]
pub trait RemoteTenantConfigResolver: Send + Sync {
    async fn resolve(&self, tenant_id: &str) -> DataResult<Option<TenantConfig>>;
}

/// Always reports no remote config, so resolution falls through to the local
/// and env legs. The default when no remote service is wired in.
pub struct NullRemoteResolver;

#[async_trait::async_trait]
impl RemoteTenantConfigResolver for NullRemoteResolver {
    async fn resolve(&self, _tenant_id: &str) -> DataResult<Option<TenantConfig>> {
        Ok(None)
    }
}

/// On-disk shape of the local YAML fallback file: a flat map of tenant_id to config.
#[derive(Debug, Deserialize)]
struct LocalTenantFile {
    #[serde(default)]
    tenants: HashMap<String, TenantConfig>,
}

/// Implements the three-leg resolution order from §4.2.
pub struct TenantConfigResolver {
    remote: Box<dyn RemoteTenantConfigResolver>,
    local_config_path: Option<PathBuf>,
}

impl TenantConfigResolver {
    pub fn new(remote: Box<dyn RemoteTenantConfigResolver>, local_config_path: Option<PathBuf>) -> Self {
        Self {
            remote,
            local_config_path,
        }
    }

    /// Remote-less resolver using the default `~/.config/agentlens/tenants.yaml` path.
    pub fn with_default_local_path() -> Self {
        let path = dirs::config_dir().map(|d| d.join("agentlens").join("tenants.yaml"));
        Self::new(Box::new(NullRemoteResolver), path)
    }

    pub async fn resolve(&self, tenant_id: &str) -> DataResult<TenantConfig> {
        if let Some(config) = self.remote.resolve(tenant_id).await? {
            return Ok(config);
        }

        if let Some(config) = self.resolve_local(tenant_id)? {
            return Ok(config);
        }

        self.resolve_env_default(tenant_id)
    }

    fn resolve_local(&self, tenant_id: &str) -> DataResult<Option<TenantConfig>> {
        let Some(path) = &self.local_config_path else {
            return Ok(None);
        };
        let Ok(contents) = std::fs::read_to_string(path) else {
            return Ok(None);
        };
        let file: LocalTenantFile = serde_yaml::from_str(&contents)
            .map_err(|_| DataError::TenantConfig { tenant: tenant_id.to_string() })?;
        Ok(file.tenants.get(tenant_id).cloned())
    }

    /// Last resort: build a config from environment defaults. Never fails —
    /// the env-default leg always produces something, per §4.2's "last resort".
    fn resolve_env_default(&self, tenant_id: &str) -> DataResult<TenantConfig> {
        let hostname = std::env::var("AGENTLENS_DEFAULT_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let credentials = std::env::var("AGENTLENS_DEFAULT_API_KEY").ok();
        let store = match std::env::var("AGENTLENS_DEFAULT_STORE").as_deref() {
            Ok("sqlite") => StoreKind::Sqlite {
                path: std::env::var("AGENTLENS_DEFAULT_SQLITE_PATH")
                    .unwrap_or_else(|_| format!("{tenant_id}.sqlite3")),
            },
            _ => StoreKind::Memory,
        };
        Ok(TenantConfig {
            tenant_id: tenant_id.to_string(),
            hostname,
            credentials,
            store,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn env_default_leg_always_resolves() {
        let resolver = TenantConfigResolver::new(Box::new(NullRemoteResolver), None);
        let config = resolver.resolve("acme-corp").await.unwrap();
        assert_eq!(config.tenant_id, "acme-corp");
        assert_eq!(config.store, StoreKind::Memory);
    }

    #[tokio::test]
    async fn local_yaml_leg_takes_precedence_over_env_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenants.yaml");
        std::fs::write(
            &path,
            r#"
tenants:
  acme-corp:
    tenant_id: acme-corp
    hostname: acme.example.com
    credentials: null
    store:
      kind: sqlite
      path: /data/acme.sqlite3
"#,
        )
        .unwrap();

        let resolver = TenantConfigResolver::new(Box::new(NullRemoteResolver), Some(path));
        let config = resolver.resolve("acme-corp").await.unwrap();
        assert_eq!(config.hostname, "acme.example.com");
        assert_eq!(config.store, StoreKind::Sqlite { path: "/data/acme.sqlite3".to_string() });
    }

    struct StubRemote(TenantConfig);

    #[async_trait::async_trait]
    impl RemoteTenantConfigResolver for StubRemote {
        async fn resolve(&self, _tenant_id: &str) -> DataResult<Option<TenantConfig>> {
            Ok(Some(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn remote_leg_takes_precedence_over_everything() {
        let remote_config = TenantConfig {
            tenant_id: "acme-corp".to_string(),
            hostname: "remote.example.com".to_string(),
            credentials: None,
            store: StoreKind::Memory,
        };
        let resolver = TenantConfigResolver::new(Box::new(StubRemote(remote_config.clone())), None);
        let config = resolver.resolve("acme-corp").await.unwrap();
        assert_eq!(config.hostname, "remote.example.com");
    }
}
