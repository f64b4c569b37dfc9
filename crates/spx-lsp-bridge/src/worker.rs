//! Worker Runtime Host
//!
//! Hosts the language server engine behind a [`Channel`]. The engine is loaded
//! once per worker; loading is asynchronous and races with inbound traffic:
//!
//! - `files` envelopes replace the snapshot immediately, whatever the state
//! - `lsp` envelopes are queued until the engine is running, then drained in
//!   arrival order
//!
//! If loading fails, every queued request is answered with
//! `SERVER_NOT_INITIALIZED` and the worker stops, closing its channel. There is
//! no restart; the owner recreates the worker if it wants to recover.
//!
//! Two ways to run it:
//! - [`WorkerRuntime::spawn_local`]: a tokio task over any [`Channel`]
//! - [`WorkerHandle::spawn`]: a dedicated OS thread with its own runtime

use crate::config::WorkerConfig;
use crate::transport::{Channel, Transport};
use async_trait::async_trait;
use serde_json::Value;
use spx_lsp_core::jsonrpc::{from_jsonrpc, to_jsonrpc};
use spx_lsp_core::{
    ClientError, Envelope, FileSet, LspMessage, RequestId, Response, ResponseError,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

/// The language server engine, as seen from the worker.
pub trait Engine: Send {
    /// Dispatch one message. `files` is the current snapshot.
    ///
    /// Responses and notifications go out through the [`Outbox`] given to the
    /// loader. An error here is logged; for a request it is also answered with
    /// `INTERNAL_ERROR`.
    fn handle_message(&mut self, message: LspMessage, files: &FileSet) -> anyhow::Result<()>;
}

/// Creates the engine. Called exactly once per worker.
#[async_trait]
pub trait EngineLoader: Send {
    async fn load(&mut self, outbox: Outbox) -> anyhow::Result<Box<dyn Engine>>;
}

/// Sink for messages travelling from the engine to the host.
#[derive(Clone)]
pub struct Outbox {
    transport: Arc<dyn Transport>,
}

impl Outbox {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Forward a message unmodified, wrapped in an `lsp` envelope.
    pub fn send(&self, message: LspMessage) -> Result<(), ClientError> {
        let value = Envelope::lsp(message)
            .encode()
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        self.transport.post_message(value)
    }

    pub fn respond(&self, id: RequestId, result: Value) -> Result<(), ClientError> {
        self.send(LspMessage::Response(Response::ok(id, result)))
    }

    pub fn respond_error(&self, id: RequestId, error: ResponseError) -> Result<(), ClientError> {
        self.send(LspMessage::Response(Response::err(id, error)))
    }

    pub fn notify(&self, method: impl Into<String>, params: Option<Value>) -> Result<(), ClientError> {
        self.send(LspMessage::notification(method, params))
    }

    /// Classify a JSON-RPC 2.0 object produced by the engine and forward it.
    pub fn send_jsonrpc(&self, value: Value) -> Result<(), ClientError> {
        let message = from_jsonrpc(value).map_err(|e| ClientError::Serialization(e.to_string()))?;
        self.send(message)
    }

    fn close(&self) {
        self.transport.terminate();
    }
}

/// Engine that speaks plain JSON-RPC 2.0 objects instead of [`LspMessage`]s.
///
/// Each inbound message is converted with [`to_jsonrpc`] before `dispatch`
/// sees it. Replies go back through [`Outbox::send_jsonrpc`].
pub struct JsonRpcEngine<F> {
    dispatch: F,
}

impl<F> JsonRpcEngine<F>
where
    F: FnMut(Value, &FileSet) -> anyhow::Result<()> + Send,
{
    pub fn new(dispatch: F) -> Self {
        Self { dispatch }
    }
}

impl<F> Engine for JsonRpcEngine<F>
where
    F: FnMut(Value, &FileSet) -> anyhow::Result<()> + Send,
{
    fn handle_message(&mut self, message: LspMessage, files: &FileSet) -> anyhow::Result<()> {
        (self.dispatch)(to_jsonrpc(&message), files)
    }
}

enum EngineState {
    Starting { queue: VecDeque<LspMessage> },
    Running(Box<dyn Engine>),
    Failed(String),
}

/// Dispatcher state for one worker.
///
/// Synchronous on purpose: the async parts (loading, receiving) live in the
/// run loop, and the state transitions here can be driven directly in tests.
pub struct WorkerRuntime {
    files: FileSet,
    state: EngineState,
    outbox: Outbox,
}

impl WorkerRuntime {
    pub fn new(outbox: Outbox) -> Self {
        Self {
            files: FileSet::new(),
            state: EngineState::Starting {
                queue: VecDeque::new(),
            },
            outbox,
        }
    }

    /// The snapshot from the most recent `files` envelope.
    pub fn files(&self) -> &FileSet {
        &self.files
    }

    pub fn is_starting(&self) -> bool {
        matches!(self.state, EngineState::Starting { .. })
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, EngineState::Running(_))
    }

    /// Startup failure message, if the engine could not be loaded.
    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            EngineState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Handle one raw value from the host. Malformed values are dropped.
    pub fn handle_value(&mut self, value: Value) {
        match Envelope::decode(value) {
            Ok(envelope) => self.handle_envelope(envelope),
            Err(e) => tracing::warn!("Worker dropped undecodable message: {}", e),
        }
    }

    pub fn handle_envelope(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Files { files } => {
                tracing::trace!("Worker received {} files", files.len());
                self.files = files;
            }
            Envelope::Lsp { message } => match &mut self.state {
                EngineState::Starting { queue } => queue.push_back(message),
                EngineState::Running(_) => self.dispatch(message),
                EngineState::Failed(reason) => {
                    let reason = reason.clone();
                    self.reject_not_initialized(message, &reason);
                }
            },
        }
    }

    /// Record the outcome of loading the engine and drain the queue.
    pub fn on_engine_loaded(&mut self, result: anyhow::Result<Box<dyn Engine>>) {
        let queue = match std::mem::replace(&mut self.state, EngineState::Failed(String::new())) {
            EngineState::Starting { queue } => queue,
            other => {
                self.state = other;
                tracing::warn!("Engine load completed twice; ignoring");
                return;
            }
        };

        match result {
            Ok(engine) => {
                tracing::info!("Language server engine started ({} queued)", queue.len());
                self.state = EngineState::Running(engine);
                for message in queue {
                    self.dispatch(message);
                }
            }
            Err(e) => {
                let reason = format!("{e:#}");
                tracing::error!("Language server engine failed to start: {}", reason);
                for message in queue {
                    self.reject_not_initialized(message, &reason);
                }
                self.state = EngineState::Failed(reason);
            }
        }
    }

    fn dispatch(&mut self, message: LspMessage) {
        let EngineState::Running(engine) = &mut self.state else {
            return;
        };
        let request_id = match &message {
            LspMessage::Request(request) => Some(request.id.clone()),
            _ => None,
        };
        let method = message.method().map(str::to_owned);

        if let Err(e) = engine.handle_message(message, &self.files) {
            tracing::warn!(
                "Engine failed to handle {}: {:#}",
                method.as_deref().unwrap_or("response"),
                e
            );
            if let Some(id) = request_id {
                let error = ResponseError::new(ResponseError::INTERNAL_ERROR, format!("{e:#}"));
                if let Err(e) = self.outbox.respond_error(id, error) {
                    tracing::debug!("Could not report engine error: {}", e);
                }
            }
        }
    }

    fn reject_not_initialized(&self, message: LspMessage, reason: &str) {
        if let LspMessage::Request(request) = message {
            let error = ResponseError::new(ResponseError::SERVER_NOT_INITIALIZED, reason);
            if let Err(e) = self.outbox.respond_error(request.id, error) {
                tracing::debug!("Could not report startup failure: {}", e);
            }
        }
    }

    /// Run a worker over `channel` as a tokio task.
    pub fn spawn_local(
        loader: Box<dyn EngineLoader>,
        channel: Channel,
    ) -> tokio::task::JoinHandle<()> {
        let outbox = Outbox::new(channel.transport);
        tokio::spawn(run(loader, channel.inbound, outbox, CancellationToken::new()))
    }
}

/// Worker event loop: load the engine while already accepting messages.
async fn run(
    mut loader: Box<dyn EngineLoader>,
    mut inbound: UnboundedReceiver<Value>,
    outbox: Outbox,
    shutdown: CancellationToken,
) {
    let mut runtime = WorkerRuntime::new(outbox.clone());
    let loader_outbox = outbox.clone();
    let mut loading = Box::pin(async move { loader.load(loader_outbox).await });

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = &mut loading, if runtime.is_starting() => {
                runtime.on_engine_loaded(result);
                if runtime.failure().is_some() {
                    // Answer whatever already arrived before going away
                    while let Ok(value) = inbound.try_recv() {
                        runtime.handle_value(value);
                    }
                    break;
                }
            }
            message = inbound.recv() => match message {
                Some(value) => runtime.handle_value(value),
                None => break,
            },
        }
    }

    tracing::info!("Language server worker stopped");
    outbox.close();
}

/// Worker-side port of a [`WorkerHandle`]: posts to the host.
struct HostPort {
    to_host: Mutex<Option<UnboundedSender<Value>>>,
}

impl Transport for HostPort {
    fn post_message(&self, message: Value) -> Result<(), ClientError> {
        let to_host = self.to_host.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = to_host.as_ref().ok_or(ClientError::ChannelClosed)?;
        sender.send(message).map_err(|_| ClientError::ChannelClosed)
    }

    fn terminate(&self) {
        self.to_host
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn is_closed(&self) -> bool {
        self.to_host
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, |sender| sender.is_closed())
    }
}

/// Host-side handle of a worker running on its own OS thread.
pub struct WorkerHandle {
    to_worker: Mutex<Option<UnboundedSender<Value>>>,
    shutdown: CancellationToken,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerHandle {
    /// Start a worker thread. Returns the handle and the host end of the
    /// channel (the handle is its transport).
    pub fn spawn(
        loader: Box<dyn EngineLoader>,
        config: &WorkerConfig,
    ) -> anyhow::Result<(Arc<WorkerHandle>, Channel)> {
        let (to_worker, worker_inbound) = mpsc::unbounded_channel();
        let (to_host, host_inbound) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let outbox = Outbox::new(Arc::new(HostPort {
            to_host: Mutex::new(Some(to_host)),
        }));
        let worker_shutdown = shutdown.clone();

        let thread = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!("Failed to create worker runtime: {}", e);
                        return;
                    }
                };
                runtime.block_on(run(loader, worker_inbound, outbox, worker_shutdown));
            })?;

        tracing::info!("Spawned language server worker thread {:?}", config.thread_name);

        let handle = Arc::new(WorkerHandle {
            to_worker: Mutex::new(Some(to_worker)),
            shutdown,
            thread: Mutex::new(Some(thread)),
        });
        let channel = Channel::new(Arc::clone(&handle) as Arc<dyn Transport>, host_inbound);
        Ok((handle, channel))
    }

    /// Whether the worker thread is still running.
    pub fn is_alive(&self) -> bool {
        self.thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Wait for the worker thread to exit. Call after [`Transport::terminate`].
    pub fn join(&self) {
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                tracing::error!("Language server worker thread panicked");
            }
        }
    }
}

impl Transport for WorkerHandle {
    fn post_message(&self, message: Value) -> Result<(), ClientError> {
        let to_worker = self.to_worker.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = to_worker.as_ref().ok_or(ClientError::ChannelClosed)?;
        sender.send(message).map_err(|_| ClientError::ChannelClosed)
    }

    fn terminate(&self) {
        self.shutdown.cancel();
        self.to_worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn is_closed(&self) -> bool {
        self.to_worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, |sender| sender.is_closed())
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}
