//! Span and Trace bodies — the entities created exclusively by ingestion (§3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::element::ElementHeader;

/// OTel span kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanKind {
    Client,
    Server,
    Internal,
    Producer,
    Consumer,
}

/// Span status, following OTel's three-valued status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanStatus {
    Unset,
    Ok,
    Error,
}

/// `{trace_id, span_id}` — the OTel span context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanContext {
    pub trace_id: String,
    pub span_id: String,
}

/// A span event: `{name, timestamp, attributes}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// A link to another span context (OTel span links).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpanLink {
    pub context: SpanContext,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Resource attributes attached to a span (minimally, its originating service).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpanResource {
    pub service_name: String,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// A single OpenTelemetry span, transcribed into the internal entity model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Span {
    #[serde(flatten)]
    pub header: ElementHeader,
    pub context: SpanContext,
    pub parent_id: Option<String>,
    pub name: String,
    pub kind: SpanKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SpanStatus,
    pub resource: SpanResource,
    #[serde(default)]
    pub raw_attributes: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub events: Vec<SpanEvent>,
    #[serde(default)]
    pub links: Vec<SpanLink>,
}

impl Span {
    pub fn duration_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds()
    }

    pub fn service_name(&self) -> &str {
        &self.resource.service_name
    }
}

/// A Trace: the set of Spans sharing a `trace_id`, plus aggregate fields
/// computed at ingestion time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trace {
    #[serde(flatten)]
    pub header: ElementHeader,
    pub service_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub num_of_spans: u64,
    #[serde(default)]
    pub agent_ids: Vec<String>,
    /// severity → count, e.g. `{"ERROR": 2}`.
    #[serde(default)]
    pub failures: HashMap<String, u64>,
}

/// A user-created, mutable grouping of traces (§3 Lifecycles).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceGroup {
    #[serde(flatten)]
    pub header: ElementHeader,
    pub service_name: String,
    #[serde(default)]
    pub traces_ids: Vec<String>,
}
