//! Plugin registry: validation at register/update/delete time (§4.5).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;

use super::field_spec::{validate_field_specs, FieldSpec};
use super::plugin::{AnalyticsPlugin, PluginMetadata};
use crate::error::AnalyticsResult;
use crate::AnalyticsError;

#[derive(Default)]
pub struct AnalyticsRegistry {
    plugins: DashMap<String, Arc<dyn AnalyticsPlugin>>,
}

impl AnalyticsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn AnalyticsPlugin>> {
        self.plugins.get(id).map(|e| e.value().clone())
    }

    pub fn metadata(&self, id: &str) -> Option<PluginMetadata> {
        self.plugins.get(id).map(|e| e.value().metadata().clone())
    }

    pub fn all_metadata(&self) -> Vec<PluginMetadata> {
        self.plugins.iter().map(|e| e.value().metadata().clone()).collect()
    }

    /// §4.5 "Runtime module must be loadable and expose exactly one concrete
    /// plugin class" — ported as: reject a second registration under the same id.
    pub fn register(&self, plugin: Arc<dyn AnalyticsPlugin>) -> AnalyticsResult<()> {
        let meta = plugin.metadata().clone();
        if self.plugins.contains_key(&meta.id) {
            return Err(AnalyticsError::ValidationError(format!("plugin `{}` already registered", meta.id)));
        }
        self.validate_metadata(&meta)?;
        self.validate_dependencies(&meta)?;
        self.plugins.insert(meta.id.clone(), plugin);
        Ok(())
    }

    /// Re-validates every plugin that depends on `id` against the new output spec.
    /// The old registration is restored if any dependent fails re-validation.
    pub fn update(&self, plugin: Arc<dyn AnalyticsPlugin>) -> AnalyticsResult<()> {
        let meta = plugin.metadata().clone();
        let Some(previous) = self.get(&meta.id) else {
            return Err(AnalyticsError::ValidationError(format!("plugin `{}` is not registered", meta.id)));
        };
        self.validate_metadata(&meta)?;
        self.validate_dependencies(&meta)?;

        self.plugins.insert(meta.id.clone(), plugin);

        let dependents: Vec<PluginMetadata> = self
            .all_metadata()
            .into_iter()
            .filter(|d| d.id != meta.id && d.depends_on.contains(&meta.id))
            .collect();
        for dependent in dependents {
            let available = self.pipeline_available_fields(&dependent.depends_on);
            if let Err(e) = Self::check_inputs_satisfied(&dependent, &available) {
                self.plugins.insert(meta.id.clone(), previous);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Refused if any other plugin lists `id` in `dependsOn` or `triggers`.
    pub fn delete(&self, id: &str) -> AnalyticsResult<()> {
        let dependents: Vec<String> = self
            .all_metadata()
            .into_iter()
            .filter(|m| m.id != id && (m.depends_on.contains(&id.to_string()) || m.triggers.contains(&id.to_string())))
            .map(|m| m.id)
            .collect();
        if !dependents.is_empty() {
            return Err(AnalyticsError::ValidationError(format!(
                "cannot delete `{id}`: still referenced by {dependents:?}"
            )));
        }
        self.plugins.remove(id);
        Ok(())
    }

    fn validate_metadata(&self, meta: &PluginMetadata) -> AnalyticsResult<()> {
        validate_field_specs(&meta.input_spec).map_err(AnalyticsError::ValidationError)?;
        validate_field_specs(&meta.output_spec).map_err(AnalyticsError::ValidationError)?;

        for spec in &meta.input_spec {
            if let Some(default) = &spec.default {
                if !spec.accepts(default) {
                    return Err(AnalyticsError::ValidationError(format!(
                        "plugin `{}` default config value for `{}` does not type-check",
                        meta.id, spec.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Union of output and input fields of every `depends_on` plugin, then
    /// checks `meta`'s required input fields are satisfiable from that set.
    fn validate_dependencies(&self, meta: &PluginMetadata) -> AnalyticsResult<()> {
        for dep_id in &meta.depends_on {
            if !self.plugins.contains_key(dep_id) {
                return Err(AnalyticsError::ValidationError(format!(
                    "plugin `{}` depends on unregistered plugin `{dep_id}`",
                    meta.id
                )));
            }
        }

        // Forward `triggers` are validated only when the triggered plugin has
        // no own `depends_on` (otherwise it builds its own environment).
        for trigger_id in &meta.triggers {
            if let Some(triggered) = self.metadata(trigger_id) {
                if triggered.depends_on.is_empty() {
                    let available = self.pipeline_available_fields(std::slice::from_ref(&meta.id));
                    Self::check_inputs_satisfied(&triggered, &available)?;
                }
            }
        }

        if meta.depends_on.is_empty() {
            return Ok(());
        }
        let available = self.pipeline_available_fields(&meta.depends_on);
        Self::check_inputs_satisfied(meta, &available)
    }

    fn check_inputs_satisfied(meta: &PluginMetadata, available: &HashMap<String, FieldSpec>) -> AnalyticsResult<()> {
        for input in &meta.input_spec {
            if !input.required {
                continue;
            }
            match available.get(&input.name) {
                Some(provided) if provided.field_type == input.field_type || provided.field_type == super::field_spec::FieldType::Any => {}
                _ => {
                    return Err(AnalyticsError::ValidationError(format!(
                        "plugin `{}` requires input `{}` not satisfiable from its dependencies",
                        meta.id, input.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn pipeline_available_fields(&self, dep_ids: &[String]) -> HashMap<String, FieldSpec> {
        let mut available = HashMap::new();
        for dep_id in dep_ids {
            if let Some(dep) = self.metadata(dep_id) {
                for field in dep.input_spec.into_iter().chain(dep.output_spec) {
                    available.insert(field.name.clone(), field);
                }
            }
        }
        available
    }

    /// All plugin ids currently registered.
    pub fn ids(&self) -> HashSet<String> {
        self.plugins.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::field_spec::FieldType;
    use crate::analytics::plugin::{PluginExecutionContext, PluginStatus};
    use async_trait::async_trait;

    struct StubPlugin(PluginMetadata);

    #[async_trait]
    impl AnalyticsPlugin for StubPlugin {
        fn metadata(&self) -> &PluginMetadata {
            &self.0
        }

        async fn execute(&self, _input: serde_json::Value, _ctx: &PluginExecutionContext) -> anyhow::Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
    }

    fn meta(id: &str, depends_on: Vec<&str>, input: Vec<FieldSpec>, output: Vec<FieldSpec>) -> PluginMetadata {
        PluginMetadata {
            id: id.to_string(),
            name: id.to_string(),
            version: "1.0.0".to_string(),
            owner: "test".to_string(),
            description: String::new(),
            tags: vec![],
            status: PluginStatus::Active,
            depends_on: depends_on.into_iter().map(String::from).collect(),
            triggers: vec![],
            config: serde_json::Value::Null,
            input_spec: input,
            output_spec: output,
        }
    }

    #[test]
    fn duplicate_id_registration_is_rejected() {
        let registry = AnalyticsRegistry::new();
        registry.register(Arc::new(StubPlugin(meta("p1", vec![], vec![], vec![])))).unwrap();
        let err = registry.register(Arc::new(StubPlugin(meta("p1", vec![], vec![], vec![])))).unwrap_err();
        assert!(matches!(err, AnalyticsError::ValidationError(_)));
    }

    #[test]
    fn dependency_missing_required_field_is_rejected() {
        let registry = AnalyticsRegistry::new();
        registry.register(Arc::new(StubPlugin(meta("p1", vec![], vec![], vec![])))).unwrap();
        let p2 = meta(
            "p2",
            vec!["p1"],
            vec![FieldSpec::new("x", FieldType::Integer, true)],
            vec![],
        );
        let err = registry.register(Arc::new(StubPlugin(p2))).unwrap_err();
        assert!(matches!(err, AnalyticsError::ValidationError(_)));
    }

    #[test]
    fn dependency_providing_required_field_is_accepted() {
        let registry = AnalyticsRegistry::new();
        let p1 = meta("p1", vec![], vec![], vec![FieldSpec::new("x", FieldType::Integer, false)]);
        registry.register(Arc::new(StubPlugin(p1))).unwrap();
        let p2 = meta("p2", vec!["p1"], vec![FieldSpec::new("x", FieldType::Integer, true)], vec![]);
        assert!(registry.register(Arc::new(StubPlugin(p2))).is_ok());
    }

    #[test]
    fn delete_refused_while_dependents_exist() {
        let registry = AnalyticsRegistry::new();
        let p1 = meta("p1", vec![], vec![], vec![FieldSpec::new("x", FieldType::Integer, false)]);
        registry.register(Arc::new(StubPlugin(p1))).unwrap();
        let p2 = meta("p2", vec!["p1"], vec![FieldSpec::new("x", FieldType::Integer, true)], vec![]);
        registry.register(Arc::new(StubPlugin(p2))).unwrap();

        assert!(registry.delete("p1").is_err());
        registry.delete("p2").unwrap();
        assert!(registry.delete("p1").is_ok());
    }
}
