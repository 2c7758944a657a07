//! Span ingestion (§6): OTLP-shaped span transcription and log-file import.
//!
//! The wire-level OTLP HTTP+protobuf framing is a named external collaborator
//! (decoding it would mean vendoring an OTLP protobuf schema with no other use
//! in this codebase); what's implemented here is the receiver's actual job —
//! transcribe an already-decoded span into the internal entity and persist
//! it, with the stale-span rewrite and service-name sanitization §6 and §9
//! describe.

use std::sync::LazyLock;

use agentlens_data::DataManager;
use agentlens_store::BulkStoreResult;
use agentlens_types::{Element, Span};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::constants::STALE_SPAN_AGE_DAYS;

static INVALID_SERVICE_NAME_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new("[^A-Za-z0-9-]").expect("static regex"));

/// Replaces every character outside `[A-Za-z0-9-]` with `_` (§6).
pub fn sanitize_service_name(name: &str) -> String {
    INVALID_SERVICE_NAME_CHARS.replace_all(name, "_").into_owned()
}

/// If `rewrite_stale`, shifts both span timestamps to preserve duration while
/// landing the start at yesterday, for any span older than
/// [`STALE_SPAN_AGE_DAYS`]. A migration aid, not a guarantee (§9) — never
/// applied unless the caller opts in.
fn rewrite_if_stale(mut span: Span, rewrite_stale: bool, now: DateTime<Utc>) -> Span {
    if !rewrite_stale {
        return span;
    }
    let age = now - span.start_time;
    if age > Duration::days(STALE_SPAN_AGE_DAYS) {
        let duration = span.end_time - span.start_time;
        let new_start = now - Duration::days(1);
        span.start_time = new_start;
        span.end_time = new_start + duration;
    }
    span
}

/// Transcribes and persists a batch of spans for one tenant (§6).
pub async fn ingest_spans(
    data_manager: &DataManager,
    spans: Vec<Span>,
    rewrite_stale: bool,
) -> Result<BulkStoreResult, agentlens_data::DataError> {
    let now = Utc::now();
    let spans: Vec<Span> = spans
        .into_iter()
        .map(|mut span| {
            span.resource.service_name = sanitize_service_name(&span.resource.service_name);
            rewrite_if_stale(span, rewrite_stale, now)
        })
        .collect();
    data_manager.bulk_store(spans.into_iter().map(Element::Span).collect(), true).await
}

/// Parses a text stream of concatenated JSON Span objects (§6's log-file
/// import), tolerating no delimiter between records — exactly what
/// `serde_json::Deserializer`'s stream deserializer is for. Records that fail
/// to parse are dropped rather than aborting the whole stream.
pub fn parse_log_stream(text: &str) -> Vec<Span> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Span>()
        .filter_map(|result| match result {
            Ok(span) => Some(span),
            Err(err) => {
                tracing::warn!(%err, "dropping malformed span record from log stream");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_types::{ElementHeader, ElementId, SpanContext, SpanKind, SpanResource, SpanStatus};

    fn span(service_name: &str, start_time: DateTime<Utc>) -> Span {
        Span {
            header: ElementHeader::new(ElementId::from_string("S1")),
            context: SpanContext { trace_id: "T1".into(), span_id: "S1".into() },
            parent_id: None,
            name: "op".to_string(),
            kind: SpanKind::Internal,
            start_time,
            end_time: start_time + Duration::milliseconds(50),
            status: SpanStatus::Ok,
            resource: SpanResource { service_name: service_name.to_string(), attributes: Default::default() },
            raw_attributes: Default::default(),
            events: vec![],
            links: vec![],
        }
    }

    #[test]
    fn sanitizes_disallowed_characters() {
        assert_eq!(sanitize_service_name("my service!.v2"), "my_service__v2");
    }

    #[test]
    fn stale_span_is_rewritten_only_when_opted_in() {
        let now = Utc::now();
        let old_start = now - Duration::days(45);
        let s = span("svc", old_start);

        let untouched = rewrite_if_stale(s.clone(), false, now);
        assert_eq!(untouched.start_time, old_start);

        let rewritten = rewrite_if_stale(s, true, now);
        assert!(rewritten.start_time > now - Duration::days(2));
    }

    #[test]
    fn recent_span_is_never_rewritten() {
        let now = Utc::now();
        let recent_start = now - Duration::days(1);
        let s = span("svc", recent_start);
        let result = rewrite_if_stale(s, true, now);
        assert_eq!(result.start_time, recent_start);
    }

    #[test]
    fn parses_concatenated_json_records() {
        let a = span("svc-a", Utc::now());
        let b = span("svc-b", Utc::now());
        let text = format!("{}{}", serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
        let parsed = parse_log_stream(&text);
        assert_eq!(parsed.len(), 2);
    }
}
