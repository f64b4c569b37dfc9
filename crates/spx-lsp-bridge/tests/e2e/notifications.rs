//! Traffic the engine starts: notifications and requests to the host.

use crate::common::fake_engine::{wait_until, FakeEngineHandle, FakeLoader};
use crate::common::tracing::init_tracing_from_env;
use lsp_types::PublishDiagnosticsParams;
use serde_json::{json, Value};
use spx_lsp_bridge::{BridgeConfig, Session};
use spx_lsp_core::{LspMessage, RequestId, Response, ResponseError};
use std::sync::{Arc, Mutex};

fn in_process_session() -> (Session, FakeEngineHandle) {
    init_tracing_from_env();
    let (loader, engine) = FakeLoader::new();
    let session = Session::in_process(&BridgeConfig::default(), Box::new(loader)).unwrap();
    (session, engine)
}

fn diagnostics(path: &str, message: &str) -> Value {
    json!({
        "uri": format!("file:///{path}"),
        "diagnostics": [{
            "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 3}},
            "severity": 1,
            "message": message
        }]
    })
}

/// Round trip through the engine; everything it sent before answering has
/// been dispatched once this returns.
async fn barrier(session: &Session, engine: &mut FakeEngineHandle) {
    let marker = session
        .client()
        .send_request("spx/marker", None, None)
        .unwrap();
    let request = engine.next_request().await;
    engine.respond(request.id, Value::Null);
    marker.response().await.unwrap();
}

#[tokio::test]
async fn test_unhandled_notification_leaves_pending_request_alone() {
    let (session, mut engine) = in_process_session();
    let pending = session
        .client()
        .send_request("textDocument/hover", None, None)
        .unwrap();
    let request = engine.next_request().await;

    engine.notify(
        "textDocument/publishDiagnostics",
        Some(diagnostics("main.spx", "undefined: foo")),
    );
    assert_eq!(session.client().pending_count(), 1);

    engine.respond(request.id, json!({"contents": "ok"}));
    assert_eq!(pending.response().await.unwrap(), json!({"contents": "ok"}));
}

#[tokio::test]
async fn test_diagnostics_subscription() {
    let (session, mut engine) = in_process_session();
    let received: Arc<Mutex<Vec<PublishDiagnosticsParams>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let disposer = session
        .diagnostics()
        .subscribe(move |params| sink.lock().unwrap().push(params));

    engine.wait_loaded().await;
    engine.notify(
        "textDocument/publishDiagnostics",
        Some(diagnostics("main.spx", "undefined: foo")),
    );
    barrier(&session, &mut engine).await;
    {
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].uri.as_str(), "file:///main.spx");
        assert_eq!(received[0].diagnostics[0].message, "undefined: foo");
    }

    disposer.dispose();
    engine.notify(
        "textDocument/publishDiagnostics",
        Some(diagnostics("main.spx", "undefined: bar")),
    );
    barrier(&session, &mut engine).await;
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_handlers_run_in_registration_order() {
    let (session, mut engine) = in_process_session();
    let order = Arc::new(Mutex::new(Vec::new()));
    let _first = {
        let order = Arc::clone(&order);
        session
            .client()
            .on_notification("spx/progress", move |_| order.lock().unwrap().push("first"))
    };
    let _second = {
        let order = Arc::clone(&order);
        session
            .client()
            .on_notification("spx/progress", move |_| order.lock().unwrap().push("second"))
    };

    engine.wait_loaded().await;
    engine.notify("spx/progress", None);
    barrier(&session, &mut engine).await;
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
}

fn response_seen(engine: &FakeEngineHandle, id: i64) -> Option<Response> {
    engine.seen().into_iter().find_map(|seen| match seen.message {
        LspMessage::Response(response) if response.id == RequestId::Number(id) => Some(response),
        _ => None,
    })
}

#[tokio::test]
async fn test_engine_requests_answered_by_host() {
    let (session, engine) = in_process_session();
    let _disposer = session
        .client()
        .on_notification("workspace/configuration", |_| {});

    engine.wait_loaded().await;
    engine.send(LspMessage::request(
        100,
        "workspace/configuration",
        Some(json!({"items": []})),
    ));
    engine.send(LspMessage::request(101, "window/showMessageRequest", None));

    let handled = wait_until(|| response_seen(&engine, 100)).await;
    assert_eq!(handled.into_result().unwrap(), Value::Null);

    let unhandled = wait_until(|| response_seen(&engine, 101)).await;
    assert_eq!(
        unhandled.into_result().unwrap_err().code,
        ResponseError::METHOD_NOT_FOUND
    );
}
