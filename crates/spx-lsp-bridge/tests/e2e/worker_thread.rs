//! Sessions whose engine runs on a dedicated worker thread.

use crate::common::fake_engine::{wait_until, FakeLoader};
use crate::common::tracing::init_tracing_from_env;
use lsp_types::{
    HoverContents, HoverParams, MarkedString, Position, TextDocumentIdentifier,
    TextDocumentPositionParams,
};
use serde_json::json;
use spx_lsp_bridge::{BridgeConfig, Session};
use spx_lsp_core::ClientError;

#[tokio::test]
async fn test_hover_on_worker_thread() {
    init_tracing_from_env();
    let (loader, _engine) = FakeLoader::new();
    let loader = loader.auto_reply(|request, files| {
        let content = &files.get("main.spx")?.content;
        (request.method == "textDocument/hover").then(|| json!({ "contents": content }))
    });
    let mut session = Session::start(&BridgeConfig::default(), Box::new(loader)).unwrap();
    assert!(session.is_worker_alive());

    session.set_file("main.spx", "turn 90", 1).unwrap();
    let params = HoverParams {
        text_document_position_params: TextDocumentPositionParams {
            text_document: TextDocumentIdentifier {
                uri: "file:///main.spx".parse().unwrap(),
            },
            position: Position::new(0, 1),
        },
        work_done_progress_params: Default::default(),
    };
    let hover = session.hover().hover(params, None).await.unwrap().unwrap();
    assert_eq!(
        hover.contents,
        HoverContents::Scalar(MarkedString::String("turn 90".to_string()))
    );

    let client = session.client().clone();
    session.shutdown();
    assert!(client.is_closed());
}

#[tokio::test]
async fn test_startup_failure_rejects_then_closes() {
    init_tracing_from_env();
    let (loader, mut engine) = FakeLoader::gated();
    let loader = loader.fail_with("engine module failed to compile");
    let session = Session::start(&BridgeConfig::default(), Box::new(loader)).unwrap();
    let client = session.client().clone();

    let hover = client.send_request("textDocument/hover", None, None).unwrap();
    let completion = client
        .send_request("textDocument/completion", None, None)
        .unwrap();
    engine.open_gate();

    let expected = Err(ClientError::StartupFailure(
        "engine module failed to compile".to_string(),
    ));
    assert_eq!(hover.response().await, expected);
    assert_eq!(completion.response().await, expected);

    // The worker stops after failing; the client notices and refuses new work
    wait_until(|| client.is_closed().then_some(())).await;
    assert!(matches!(
        client.send_request("textDocument/hover", None, None),
        Err(ClientError::ChannelClosed)
    ));
    wait_until(|| (!session.is_worker_alive()).then_some(())).await;
}

#[test]
fn test_invalid_config_is_rejected_before_spawning() {
    let mut config = BridgeConfig::default();
    config.logging.default_level = "loud".to_string();
    let (loader, _engine) = FakeLoader::new();
    assert!(Session::start(&config, Box::new(loader)).is_err());
}
