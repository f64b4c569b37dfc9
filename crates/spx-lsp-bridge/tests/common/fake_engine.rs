//! Scriptable engine for driving the bridge end to end.
//!
//! Requests the engine cannot answer on its own are forwarded to the test
//! through [`FakeEngineHandle`], which answers them whenever (and in whatever
//! order) it likes.

use async_trait::async_trait;
use serde_json::Value;
use spx_lsp_bridge::{Engine, EngineLoader, Outbox};
use spx_lsp_core::{FileSet, LspMessage, Request, RequestId, ResponseError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Answers a request immediately, or returns `None` to hand it to the test.
pub type AutoReply = Arc<dyn Fn(&Request, &FileSet) -> Option<Value> + Send + Sync>;

/// A message as dispatched to the engine, with the snapshot it saw.
#[derive(Debug, Clone)]
pub struct Seen {
    pub message: LspMessage,
    pub files: FileSet,
}

struct FakeEngine {
    outbox: Outbox,
    auto_reply: Option<AutoReply>,
    requests: mpsc::UnboundedSender<Request>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Engine for FakeEngine {
    fn handle_message(&mut self, message: LspMessage, files: &FileSet) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(Seen {
            message: message.clone(),
            files: files.clone(),
        });
        if let LspMessage::Request(request) = message {
            match self.auto_reply.as_ref().and_then(|reply| reply(&request, files)) {
                Some(result) => self.outbox.respond(request.id, result)?,
                None => {
                    let _ = self.requests.send(request);
                }
            }
        }
        Ok(())
    }
}

pub struct FakeLoader {
    gate: Option<oneshot::Receiver<()>>,
    failure: Option<String>,
    auto_reply: Option<AutoReply>,
    requests: mpsc::UnboundedSender<Request>,
    seen: Arc<Mutex<Vec<Seen>>>,
    outbox: Arc<Mutex<Option<Outbox>>>,
}

impl FakeLoader {
    /// Loader that starts the engine right away.
    pub fn new() -> (FakeLoader, FakeEngineHandle) {
        let (requests_tx, requests) = mpsc::unbounded_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let outbox = Arc::new(Mutex::new(None));
        let loader = FakeLoader {
            gate: None,
            failure: None,
            auto_reply: None,
            requests: requests_tx,
            seen: Arc::clone(&seen),
            outbox: Arc::clone(&outbox),
        };
        let handle = FakeEngineHandle {
            requests,
            outbox,
            seen,
            gate: None,
        };
        (loader, handle)
    }

    /// Loader that waits for [`FakeEngineHandle::open_gate`] before finishing.
    pub fn gated() -> (FakeLoader, FakeEngineHandle) {
        let (mut loader, mut handle) = Self::new();
        let (open, gate) = oneshot::channel();
        loader.gate = Some(gate);
        handle.gate = Some(open);
        (loader, handle)
    }

    pub fn fail_with(mut self, reason: &str) -> Self {
        self.failure = Some(reason.to_string());
        self
    }

    pub fn auto_reply<F>(mut self, reply: F) -> Self
    where
        F: Fn(&Request, &FileSet) -> Option<Value> + Send + Sync + 'static,
    {
        self.auto_reply = Some(Arc::new(reply));
        self
    }
}

#[async_trait]
impl EngineLoader for FakeLoader {
    async fn load(&mut self, outbox: Outbox) -> anyhow::Result<Box<dyn Engine>> {
        if let Some(gate) = self.gate.take() {
            let _ = gate.await;
        }
        if let Some(reason) = &self.failure {
            anyhow::bail!("{reason}");
        }
        *self.outbox.lock().unwrap() = Some(outbox.clone());
        Ok(Box::new(FakeEngine {
            outbox,
            auto_reply: self.auto_reply.clone(),
            requests: self.requests.clone(),
            seen: Arc::clone(&self.seen),
        }))
    }
}

/// The test's side of a [`FakeLoader`].
pub struct FakeEngineHandle {
    requests: mpsc::UnboundedReceiver<Request>,
    outbox: Arc<Mutex<Option<Outbox>>>,
    seen: Arc<Mutex<Vec<Seen>>>,
    gate: Option<oneshot::Sender<()>>,
}

impl FakeEngineHandle {
    pub fn open_gate(&mut self) {
        if let Some(open) = self.gate.take() {
            let _ = open.send(());
        }
    }

    /// Next request the engine did not answer by itself.
    pub async fn next_request(&mut self) -> Request {
        tokio::time::timeout(TIMEOUT, self.requests.recv())
            .await
            .expect("Timed out waiting for a request")
            .expect("Engine dropped")
    }

    /// Wait until the loader has handed out the engine.
    pub async fn wait_loaded(&self) {
        wait_until(|| self.outbox.lock().unwrap().as_ref().map(|_| ())).await
    }

    fn outbox(&self) -> Outbox {
        self.outbox
            .lock()
            .unwrap()
            .clone()
            .expect("Engine not loaded")
    }

    pub fn respond(&self, id: RequestId, result: Value) {
        self.outbox().respond(id, result).unwrap();
    }

    pub fn respond_error(&self, id: RequestId, error: ResponseError) {
        self.outbox().respond_error(id, error).unwrap();
    }

    pub fn notify(&self, method: &str, params: Option<Value>) {
        self.outbox().notify(method, params).unwrap();
    }

    pub fn send(&self, message: LspMessage) {
        self.outbox().send(message).unwrap();
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_methods(&self) -> Vec<String> {
        self.seen()
            .iter()
            .filter_map(|seen| seen.message.method().map(str::to_owned))
            .collect()
    }

    /// Wait until the engine has dispatched a message with `method`.
    pub async fn wait_for_method(&self, method: &str) -> Seen {
        wait_until(|| {
            self.seen()
                .into_iter()
                .find(|seen| seen.message.method() == Some(method))
        })
        .await
    }
}

/// Poll `check` until it yields a value.
pub async fn wait_until<T>(mut check: impl FnMut() -> Option<T>) -> T {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if let Some(value) = check() {
            return value;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "Timed out waiting for condition"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
