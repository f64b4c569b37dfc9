//! Responses are paired with their requests by id, whatever order the engine
//! answers in.

use crate::common::fake_engine::{FakeEngineHandle, FakeLoader};
use crate::common::tracing::init_tracing_from_env;
use lsp_types::{
    CompletionParams, HoverContents, HoverParams, Position, TextDocumentIdentifier,
    TextDocumentPositionParams, Uri,
};
use serde_json::json;
use spx_lsp_bridge::{BridgeConfig, CompletionKey, Session};
use spx_lsp_core::{ClientError, RequestId, ResponseError};

fn uri(path: &str) -> Uri {
    format!("file:///{path}").parse().unwrap()
}

fn at(path: &str, line: u32, character: u32) -> TextDocumentPositionParams {
    TextDocumentPositionParams {
        text_document: TextDocumentIdentifier { uri: uri(path) },
        position: Position::new(line, character),
    }
}

fn in_process_session() -> (Session, FakeEngineHandle) {
    init_tracing_from_env();
    let (loader, engine) = FakeLoader::new();
    let session = Session::in_process(&BridgeConfig::default(), Box::new(loader)).unwrap();
    (session, engine)
}

#[tokio::test]
async fn test_second_request_answered_first() {
    let (session, mut engine) = in_process_session();
    let client = session.client();

    let hover = client
        .send_request("textDocument/hover", Some(json!({"line": 1})), None)
        .unwrap();
    let completion = client
        .send_request("textDocument/completion", Some(json!({"line": 2})), None)
        .unwrap();
    assert_eq!(hover.id(), &RequestId::Number(1));
    assert_eq!(completion.id(), &RequestId::Number(2));

    let first = engine.next_request().await;
    let second = engine.next_request().await;
    assert_eq!(first.method, "textDocument/hover");
    assert_eq!(second.method, "textDocument/completion");

    engine.respond(second.id, json!([{"label": "onStart"}]));
    engine.respond(first.id, json!({"contents": "func onStart()"}));

    let (hover, completion) = tokio::join!(hover.response(), completion.response());
    assert_eq!(hover.unwrap(), json!({"contents": "func onStart()"}));
    assert_eq!(completion.unwrap(), json!([{"label": "onStart"}]));
    assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn test_providers_in_flight_together() {
    let (session, mut engine) = in_process_session();
    let hover = session.hover();
    let completion = session.completion();
    let key = CompletionKey::new(uri("main.spx").as_str(), 2, 4);

    let hover_params = HoverParams {
        text_document_position_params: at("main.spx", 2, 4),
        work_done_progress_params: Default::default(),
    };
    let completion_params = CompletionParams {
        text_document_position: at("main.spx", 2, 4),
        work_done_progress_params: Default::default(),
        partial_result_params: Default::default(),
        context: None,
    };

    let engine_side = async {
        let a = engine.next_request().await;
        let b = engine.next_request().await;
        // Answer in reverse arrival order
        for request in [b, a] {
            let result = match request.method.as_str() {
                "textDocument/hover" => {
                    json!({"contents": {"kind": "markdown", "value": "Listen to game start"}})
                }
                "textDocument/completion" => json!([{"label": "onStart"}, {"label": "onClick"}]),
                other => panic!("Unexpected request {other}"),
            };
            engine.respond(request.id, result);
        }
    };

    let (hover, items, ()) = tokio::join!(
        hover.hover(hover_params, None),
        completion.complete(key.clone(), completion_params, None),
        engine_side
    );

    let hover = hover.unwrap().unwrap();
    assert!(matches!(
        hover.contents,
        HoverContents::Markup(ref markup) if markup.value == "Listen to game start"
    ));
    assert_eq!(items.unwrap().len(), 2);
    assert_eq!(completion.staged(&key).unwrap().len(), 2);
    assert_eq!(completion.commit(1).unwrap().label, "onClick");
}

#[tokio::test]
async fn test_response_for_unknown_id_is_ignored() {
    let (session, mut engine) = in_process_session();
    let pending = session
        .client()
        .send_request("textDocument/hover", None, None)
        .unwrap();

    let request = engine.next_request().await;
    engine.respond(RequestId::Number(99), json!("stray"));
    engine.respond(request.id, json!("mine"));

    assert_eq!(pending.response().await.unwrap(), json!("mine"));
}

#[tokio::test]
async fn test_engine_error_settles_only_its_request() {
    let (session, mut engine) = in_process_session();
    let client = session.client();
    let failing = client.send_request("textDocument/rename", None, None).unwrap();
    let healthy = client.send_request("textDocument/hover", None, None).unwrap();

    let rename = engine.next_request().await;
    let hover = engine.next_request().await;
    engine.respond_error(
        rename.id,
        ResponseError::new(ResponseError::INVALID_PARAMS, "cannot rename builtin"),
    );
    engine.respond(hover.id, json!(null));

    match failing.response().await {
        Err(ClientError::Engine(error)) => {
            assert_eq!(error.code, ResponseError::INVALID_PARAMS);
            assert_eq!(error.message, "cannot rename builtin");
        }
        other => panic!("Expected engine error, got {other:?}"),
    }
    assert_eq!(healthy.response().await.unwrap(), json!(null));
}
