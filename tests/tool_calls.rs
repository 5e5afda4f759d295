mod common;
use common::ENV_LOCK;

use bytes::Bytes;
use futures::stream;
use futures::StreamExt;
use relay::errors::ToolError;
use relay::managers::call::CallManager;
use relay::managers::download::{DownloadManager, DownloadPipeline};
use relay::services::connector::{CallOutcome, Connector};
use relay::services::logger::Logger;
use relay::services::tool_executor::{ToolExecutor, ToolHandler};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct DummyHandler {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl ToolHandler for DummyHandler {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({ "success": true, "args": args }))
    }
}

struct StubConnector {
    outcome: Mutex<Option<CallOutcome>>,
}

impl StubConnector {
    fn json(value: Value) -> Self {
        Self {
            outcome: Mutex::new(Some(CallOutcome::Json(value))),
        }
    }

    fn stream(chunks: Vec<&'static [u8]>) -> Self {
        let stream = stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok(Bytes::from_static(chunk))),
        )
        .boxed();
        Self {
            outcome: Mutex::new(Some(CallOutcome::Stream(stream))),
        }
    }
}

#[async_trait::async_trait]
impl Connector for StubConnector {
    async fn execute(
        &self,
        _resource: &str,
        _verb: &str,
        _params: &Value,
    ) -> Result<CallOutcome, ToolError> {
        Ok(self
            .outcome
            .lock()
            .expect("outcome slot")
            .take()
            .expect("single call"))
    }
}

fn call_manager_with(connector: StubConnector) -> CallManager {
    let logger = Logger::new("test");
    CallManager::new(
        logger.clone(),
        Arc::new(connector),
        Arc::new(DownloadPipeline::new(logger)),
    )
}

#[tokio::test]
async fn executor_wraps_results_with_tool_meta() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
    handlers.insert(
        "echo".to_string(),
        Arc::new(DummyHandler {
            calls: calls.clone(),
        }),
    );
    let executor = ToolExecutor::new(Logger::new("test"), handlers);

    let payload = executor
        .execute("echo", serde_json::json!({"x": 1}))
        .await
        .expect("execute");

    assert_eq!(payload.get("ok").and_then(Value::as_bool), Some(true));
    assert_eq!(
        payload
            .get("meta")
            .and_then(|m| m.get("tool"))
            .and_then(Value::as_str),
        Some("echo")
    );
    assert!(payload
        .get("meta")
        .and_then(|m| m.get("duration_ms"))
        .is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_tool_fails_with_a_suggestion() {
    let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
    handlers.insert(
        "call".to_string(),
        Arc::new(DummyHandler {
            calls: Arc::new(AtomicUsize::new(0)),
        }),
    );
    let executor = ToolExecutor::new(Logger::new("test"), handlers);

    let err = executor
        .execute("cal", serde_json::json!({}))
        .await
        .expect_err("must fail");
    assert!(err.message.contains("Unknown tool"));
    assert!(err.hint.as_deref().unwrap_or("").contains("call"));
}

#[tokio::test]
async fn call_shapes_envelope_responses_in_fixed_order() {
    let envelope = serde_json::json!({
        "data": [
            {"id": 1, "note": "", "body": "a long transcript body", "internal": {"secret": 1}},
            {"id": 2, "note": "kept", "body": "short", "internal": {"secret": 2}},
        ],
        "meta": {"page": 1, "total": 2},
    });
    let manager = call_manager_with(StubConnector::json(envelope));

    let args = serde_json::json!({
        "resource": "calls",
        "verb": "list",
        "output": {
            "pick": ["id", "note", "body"],
            "compact": true,
            "truncate": {"max_chars": 6, "suffix": "..."},
        },
    });
    let shaped = manager.handle(args).await.expect("handle");

    assert_eq!(
        shaped,
        serde_json::json!({
            "data": [
                {"id": 1, "body": "a long..."},
                {"id": 2, "note": "kept", "body": "short"},
            ],
            "meta": {"page": 1, "total": 2},
        })
    );
}

#[tokio::test]
async fn call_without_output_options_returns_the_raw_payload() {
    let payload = serde_json::json!({"data": [{"id": 1, "empty": ""}], "meta": {}});
    let manager = call_manager_with(StubConnector::json(payload.clone()));

    let args = serde_json::json!({"resource": "calls", "verb": "list"});
    let result = manager.handle(args).await.expect("handle");
    assert_eq!(result, payload);
}

#[tokio::test]
async fn call_requires_resource_and_verb() {
    let manager = call_manager_with(StubConnector::json(Value::Null));
    let err = manager
        .handle(serde_json::json!({"verb": "list"}))
        .await
        .expect_err("must fail");
    assert!(err.message.contains("resource"));
}

#[tokio::test]
async fn call_routes_binary_responses_through_the_download_pipeline() {
    let _guard = ENV_LOCK.lock().await;
    let dir = std::env::temp_dir().join(format!("relay-calls-{}", uuid::Uuid::new_v4()));
    std::env::set_var("RELAY_DOWNLOAD_DIR", &dir);

    let manager = call_manager_with(StubConnector::stream(vec![b"\x89PNG\r\n\x1a\n", b"pixels"]));
    let args = serde_json::json!({
        "resource": "screenshot",
        "verb": "render",
        "output": {"pick": ["id"]},
    });
    let result = manager.handle(args).await.expect("handle");

    let download = result.get("download").expect("download metadata");
    // Shaping never touches download metadata.
    assert!(download.get("file_path").is_some());
    assert!(download
        .get("file_path")
        .and_then(Value::as_str)
        .map(|p| p.ends_with(".png"))
        .unwrap_or(false));
}

#[tokio::test]
async fn download_tool_passes_structured_results_through() {
    let _guard = ENV_LOCK.lock().await;

    let payload = serde_json::json!({"status": "not ready"});
    let logger = Logger::new("test");
    let manager = DownloadManager::new(
        Arc::new(StubConnector::json(payload.clone())),
        Arc::new(DownloadPipeline::new(logger)),
    );

    let args = serde_json::json!({"entity": "recording", "verb": "export", "params": {"id": 9}});
    let result = manager.handle(args).await.expect("handle");
    assert_eq!(result, payload);
}
