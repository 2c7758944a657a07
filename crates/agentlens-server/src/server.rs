//! Accept loop for the newline-delimited JSON listener: bind once, spawn a
//! task per connection, read requests line by line.

use std::sync::Arc;

use agentlens_data::DataManagerRegistry;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::events::EventBus;
use crate::ingest::{ingest_spans, parse_log_stream};
use crate::protocol::{Request, Response};

pub async fn run(listener: TcpListener, dm_registry: Arc<DataManagerRegistry>, event_bus: Arc<EventBus>) -> std::io::Result<()> {
    loop {
        let (socket, peer_addr) = listener.accept().await?;
        let dm_registry = dm_registry.clone();
        let event_bus = event_bus.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(socket, dm_registry, event_bus).await {
                tracing::warn!(%peer_addr, %err, "connection ended with an error");
            }
        });
    }
}

async fn handle_connection(socket: TcpStream, dm_registry: Arc<DataManagerRegistry>, event_bus: Arc<EventBus>) -> std::io::Result<()> {
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(request, &dm_registry, &event_bus).await,
            Err(err) => Response::error(format!("malformed request: {err}")),
        };
        let mut encoded = serde_json::to_vec(&response).expect("Response always serializes");
        encoded.push(b'\n');
        write_half.write_all(&encoded).await?;
    }
    Ok(())
}

async fn dispatch(request: Request, dm_registry: &Arc<DataManagerRegistry>, event_bus: &Arc<EventBus>) -> Response {
    match request {
        Request::IngestSpans { tenant_id, spans, rewrite_stale } => {
            let data_manager = match dm_registry.get_or_create(&tenant_id).await {
                Ok(dm) => dm,
                Err(err) => return Response::error(err.to_string()),
            };
            match ingest_spans(&data_manager, spans, rewrite_stale).await {
                Ok(result) => Response::ok(serde_json::json!({"stored": result.stored_ids.len(), "failed": result.failed.len()})),
                Err(err) => Response::error(err.to_string()),
            }
        }
        Request::IngestLogStream { tenant_id, body, rewrite_stale } => {
            let data_manager = match dm_registry.get_or_create(&tenant_id).await {
                Ok(dm) => dm,
                Err(err) => return Response::error(err.to_string()),
            };
            let spans = parse_log_stream(&body);
            match ingest_spans(&data_manager, spans, rewrite_stale).await {
                Ok(result) => Response::ok(serde_json::json!({"stored": result.stored_ids.len(), "failed": result.failed.len()})),
                Err(err) => Response::error(err.to_string()),
            }
        }
        Request::PostEvent { tenant_id, analytics_id, trace_or_group_id, content } => {
            let event_id = event_bus.post_event(&tenant_id, &analytics_id, &trace_or_group_id, content);
            Response::ok(serde_json::json!({"event_id": event_id}))
        }
        Request::EventStatus { event_id } => match event_bus.status(&event_id) {
            Some(record) => Response::ok(serde_json::to_value(record).expect("EventRecord always serializes")),
            None => Response::error(format!("unknown event_id `{event_id}`")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_data::{NullRemoteResolver, TenantConfigResolver};
    use agentlens_engine::{plugins::register_default_plugins, AnalyticsEngine, AnalyticsEngineConfig, AnalyticsRegistry};
    use std::net::SocketAddr;
    use tempfile::tempdir;
    use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader as TokioBufReader};

    async fn spawn_server() -> (SocketAddr, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let registry = Arc::new(AnalyticsRegistry::new());
        register_default_plugins(&registry).unwrap();
        let engine = Arc::new(AnalyticsEngine::new(registry, AnalyticsEngineConfig::default()));
        let resolver = TenantConfigResolver::new(Box::new(NullRemoteResolver), Some(dir.path().join("tenants.yaml")));
        let dm_registry = Arc::new(DataManagerRegistry::new(resolver));
        let event_bus = Arc::new(EventBus::new(engine, dm_registry.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(run(listener, dm_registry, event_bus));
        (addr, dir)
    }

    #[tokio::test]
    async fn post_event_then_status_round_trips_over_the_wire() {
        let (addr, _dir) = spawn_server().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = TokioBufReader::new(read_half).lines();

        let request = serde_json::json!({
            "command": "post_event",
            "tenant_id": "acme",
            "analytics_id": "task_analytics",
            "trace_or_group_id": "trace-1",
            "content": {"trace_ids": []},
        });
        write_half.write_all(format!("{request}\n").as_bytes()).await.unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        let reply: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["status"], "ok");
        assert!(reply["result"]["event_id"].as_str().unwrap().starts_with("task_analytics:"));
    }

    #[tokio::test]
    async fn malformed_request_gets_an_error_response() {
        let (addr, _dir) = spawn_server().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = TokioBufReader::new(read_half).lines();

        write_half.write_all(b"not json\n").await.unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        let reply: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["status"], "error");
    }
}
