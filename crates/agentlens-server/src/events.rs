//! Event notification (§6): accept a "something changed" signal, fan it out
//! to the analytics engine in the background, and let callers poll for the
//! outcome.

use std::collections::HashMap;
use std::sync::Arc;

use agentlens_data::DataManagerRegistry;
use agentlens_engine::{AnalyticsEngine, ExecutionResult};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    pub status: EventStatus,
    pub results: Option<HashMap<String, ExecutionResult>>,
    pub error: Option<String>,
}

impl EventRecord {
    fn pending() -> Self {
        Self { status: EventStatus::Pending, results: None, error: None }
    }
}

/// Dispatches posted events to the analytics engine off the request path and
/// records their outcome for later lookup by `event_id` (§6's
/// `POST /api/events` / `GET /api/events/{id}/status` contract).
pub struct EventBus {
    engine: Arc<AnalyticsEngine>,
    dm_registry: Arc<DataManagerRegistry>,
    records: Arc<DashMap<String, EventRecord>>,
}

impl EventBus {
    pub fn new(engine: Arc<AnalyticsEngine>, dm_registry: Arc<DataManagerRegistry>) -> Self {
        Self { engine, dm_registry, records: Arc::new(DashMap::new()) }
    }

    /// Registers the event, spawns its analytics run, and returns the
    /// `event_id` immediately — the caller polls [`EventBus::status`] rather
    /// than blocking on the run.
    pub fn post_event(&self, tenant_external_id: &str, analytics_id: &str, trace_or_group_id: &str, content: serde_json::Value) -> String {
        let event_id = format!("{analytics_id}:{trace_or_group_id}");
        self.records.insert(event_id.clone(), EventRecord::pending());

        let engine = self.engine.clone();
        let dm_registry = self.dm_registry.clone();
        let records = self.records.clone();
        let tenant_external_id = tenant_external_id.to_string();
        let analytics_id = analytics_id.to_string();
        let returned_id = event_id.clone();

        tokio::spawn(async move {
            if let Some(mut record) = records.get_mut(&event_id) {
                record.status = EventStatus::Processing;
            }

            let outcome = match dm_registry.get_or_create(&tenant_external_id).await {
                Ok(data_manager) => engine.execute(&analytics_id, content, data_manager).await,
                Err(err) => Err(agentlens_engine::AnalyticsError::DataError(err.to_string())),
            };

            if let Some(mut record) = records.get_mut(&event_id) {
                match outcome {
                    Ok(results) => {
                        record.status = EventStatus::Completed;
                        record.results = Some(results);
                    }
                    Err(err) => {
                        record.status = EventStatus::Failed;
                        record.error = Some(err.to_string());
                    }
                }
            }
        });

        returned_id
    }

    pub fn status(&self, event_id: &str) -> Option<EventRecord> {
        self.records.get(event_id).map(|r| r.clone())
    }
}
