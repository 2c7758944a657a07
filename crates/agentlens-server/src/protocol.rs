//! Wire shape for the tokio-native line-protocol listener (§6): the core's
//! ingestion and event-notification surface is a set of async functions, not
//! bound to any HTTP framework; this is the newline-delimited JSON envelope
//! the binary crate exposes them through for local testing.

use agentlens_types::Span;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    IngestSpans {
        tenant_id: String,
        spans: Vec<Span>,
        #[serde(default)]
        rewrite_stale: bool,
    },
    IngestLogStream {
        tenant_id: String,
        body: String,
        #[serde(default)]
        rewrite_stale: bool,
    },
    PostEvent {
        tenant_id: String,
        analytics_id: String,
        trace_or_group_id: String,
        content: serde_json::Value,
    },
    EventStatus {
        event_id: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
pub enum Response {
    Ok { result: serde_json::Value },
    Error { message: String },
}

impl Response {
    pub fn ok(result: serde_json::Value) -> Self {
        Response::Ok { result }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_status_request_parses_from_json() {
        let raw = serde_json::json!({"command": "event_status", "event_id": "task_analytics:trace-1"});
        let request: Request = serde_json::from_value(raw).unwrap();
        assert!(matches!(request, Request::EventStatus { event_id } if event_id == "task_analytics:trace-1"));
    }

    #[test]
    fn post_event_request_parses_from_json() {
        let raw = serde_json::json!({
            "command": "post_event",
            "tenant_id": "acme",
            "analytics_id": "task_analytics",
            "trace_or_group_id": "trace-1",
            "content": {"trace_ids": ["trace-1"]},
        });
        let request: Request = serde_json::from_value(raw).unwrap();
        assert!(matches!(request, Request::PostEvent { tenant_id, .. } if tenant_id == "acme"));
    }
}
