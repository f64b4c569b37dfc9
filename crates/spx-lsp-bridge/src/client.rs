//! LSP Client (request/response correlator)
//!
//! One client per channel. Outgoing requests get fresh integer ids and a
//! pending entry; the inbound dispatch task settles entries by id and routes
//! everything else to notification handlers by method.
//!
//! # Settlement
//!
//! Every request settles exactly once, through whichever of these happens
//! first:
//! - a matching response arrives (`Ok` or [`ClientError::Engine`])
//! - its cancellation token fires, or the [`PendingRequest`] is dropped
//!   ([`ClientError::Canceled`]; a `$/cancelRequest` is sent and a late
//!   response is discarded)
//! - the channel closes ([`ClientError::ChannelClosed`] for all pending)
//!
//! Responses may arrive in any order; pairing is by id only.

use crate::config::ClientConfig;
use crate::transport::{Channel, Transport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use spx_lsp_core::{ClientError, Envelope, LspMessage, RequestId, Response, ResponseError};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

type Outcome = Result<Value, ClientError>;
type Handler = Arc<dyn Fn(Option<Value>) + Send + Sync>;

const EXECUTE_COMMAND: &str = "workspace/executeCommand";

struct ClientState {
    next_id: i64,
    pending: HashMap<RequestId, oneshot::Sender<Outcome>>,
    handlers: HashMap<String, Vec<(u64, Handler)>>,
    next_handler_id: u64,
    closed: bool,
}

struct Shared {
    state: Mutex<ClientState>,
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_value(&self, value: Value) {
        let message = match Envelope::decode(value) {
            Ok(Envelope::Lsp { message }) => message,
            Ok(Envelope::Files { .. }) => {
                tracing::debug!("Client ignoring files envelope from worker");
                return;
            }
            Err(e) => {
                tracing::warn!("Client dropped undecodable message: {}", e);
                return;
            }
        };
        tracing::trace!("Client received {:?}", message);

        match message {
            LspMessage::Response(response) => self.settle(response),
            LspMessage::Notification(notification) => {
                if !self.run_handlers(&notification.method, notification.params) {
                    tracing::debug!("No handler for notification {}", notification.method);
                }
            }
            LspMessage::Request(request) => {
                let handled = self.run_handlers(&request.method, request.params);
                let response = if handled {
                    Response::ok(request.id, Value::Null)
                } else {
                    tracing::debug!("No handler for engine request {}", request.method);
                    Response::err(
                        request.id,
                        ResponseError::new(
                            ResponseError::METHOD_NOT_FOUND,
                            format!("Unhandled method {}", request.method),
                        ),
                    )
                };
                if let Err(e) = self.post(LspMessage::Response(response)) {
                    tracing::debug!("Could not answer engine request: {}", e);
                }
            }
        }
    }

    fn settle(&self, response: Response) {
        let sender = self.lock().pending.remove(&response.id);
        match sender {
            Some(sender) => {
                let outcome = response
                    .into_result()
                    .map_err(ClientError::from_response_error);
                // The receiver may be gone if the caller stopped waiting
                let _ = sender.send(outcome);
            }
            None => tracing::debug!(
                "Discarding response for unknown or canceled request {}",
                response.id
            ),
        }
    }

    /// Run handlers for `method` in registration order. Returns whether any ran.
    fn run_handlers(&self, method: &str, params: Option<Value>) -> bool {
        // Clone out of the lock so handlers may (un)subscribe
        let handlers: Vec<Handler> = match self.lock().handlers.get(method) {
            Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return false,
        };
        for handler in &handlers {
            // A panicking handler must not take the dispatch task down with it
            if catch_unwind(AssertUnwindSafe(|| handler(params.clone()))).is_err() {
                tracing::error!("Handler for {} panicked", method);
            }
        }
        !handlers.is_empty()
    }

    fn post(&self, message: LspMessage) -> Result<(), ClientError> {
        let value = Envelope::lsp(message)
            .encode()
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        self.transport.post_message(value)
    }

    /// Remove a pending entry the caller gave up on and tell the engine.
    fn abandon(&self, id: &RequestId) {
        let removed = {
            let mut state = self.lock();
            let removed = state.pending.remove(id).is_some();
            removed && !state.closed
        };
        if removed {
            tracing::trace!("Canceling request {}", id);
            let cancel = LspMessage::notification(
                self.config.cancel_method.clone(),
                Some(json!({ "id": id })),
            );
            if let Err(e) = self.post(cancel) {
                tracing::debug!("Could not send cancellation for {}: {}", id, e);
            }
        }
    }

    fn shutdown(&self, reason: &str) {
        let pending = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.pending)
        };
        tracing::info!(
            "LSP client closed ({}), rejecting {} pending requests",
            reason,
            pending.len()
        );
        for (_, sender) in pending {
            let _ = sender.send(Err(ClientError::ChannelClosed));
        }
        self.transport.terminate();
    }
}

/// Handle to the correlator. Cheap to clone; all clones share one channel.
#[derive(Clone)]
pub struct LspClient {
    shared: Arc<Shared>,
}

impl LspClient {
    /// Start dispatching inbound messages from `channel`.
    ///
    /// Must be called within a tokio runtime.
    pub fn connect(channel: Channel, config: &ClientConfig) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(ClientState {
                next_id: 1,
                pending: HashMap::new(),
                handlers: HashMap::new(),
                next_handler_id: 0,
                closed: false,
            }),
            transport: channel.transport,
            config: config.clone(),
        });
        tokio::spawn(dispatch_loop(Arc::clone(&shared), channel.inbound));
        Self { shared }
    }

    /// Send a request and return its pending handle.
    ///
    /// Fails immediately, without sending, if the client is closed or
    /// `cancel` has already fired.
    pub fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: Option<CancellationToken>,
    ) -> Result<PendingRequest, ClientError> {
        if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(ClientError::Canceled);
        }

        let (sender, receiver) = oneshot::channel();
        let mut state = self.shared.lock();
        if state.closed {
            return Err(ClientError::ChannelClosed);
        }
        let id = RequestId::Number(state.next_id);
        state.next_id += 1;

        let value = Envelope::lsp(LspMessage::request(id.clone(), method, params))
            .encode()
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        state.pending.insert(id.clone(), sender);
        // Post under the lock so ids reach the engine in allocation order
        if let Err(e) = self.shared.transport.post_message(value) {
            state.pending.remove(&id);
            return Err(e);
        }
        drop(state);

        tracing::trace!("Sent request {} {}", id, method);
        Ok(PendingRequest {
            id,
            receiver,
            cancel,
            shared: Arc::clone(&self.shared),
            settled: false,
        })
    }

    /// Send a request and wait for its raw result.
    pub async fn request_raw(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: Option<CancellationToken>,
    ) -> Result<Value, ClientError> {
        if !self.shared.config.trace_requests {
            return self.send_request(method, params, cancel)?.response().await;
        }

        let command = if method == EXECUTE_COMMAND {
            params
                .as_ref()
                .and_then(|p| p.get("command"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        } else {
            None
        };
        let span = tracing::info_span!(
            "lsp.request",
            lsp.method = method,
            lsp.command = command.as_deref(),
            duration_ms = tracing::field::Empty,
            success = tracing::field::Empty,
            canceled = tracing::field::Empty,
        );

        let started = Instant::now();
        let result = async { self.send_request(method, params, cancel)?.response().await }
            .instrument(span.clone())
            .await;

        span.record("duration_ms", started.elapsed().as_millis() as u64);
        match &result {
            Err(e) if e.is_canceled() => {
                span.record("canceled", true);
            }
            Err(e) => {
                span.record("success", false);
                tracing::debug!(parent: &span, "Request {} failed: {}", method, e);
            }
            Ok(_) => {
                span.record("success", true);
            }
        }
        result
    }

    /// Typed request using the `lsp_types` method table.
    pub async fn request<R>(
        &self,
        params: R::Params,
        cancel: Option<CancellationToken>,
    ) -> Result<R::Result, ClientError>
    where
        R: lsp_types::request::Request,
    {
        let params = to_params(&params)?;
        let result = self.request_raw(R::METHOD, params, cancel).await?;
        serde_json::from_value(result).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// Fire-and-forget notification to the engine.
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::ChannelClosed);
        }
        self.shared.post(LspMessage::notification(method, params))
    }

    pub fn notify_typed<N>(&self, params: N::Params) -> Result<(), ClientError>
    where
        N: lsp_types::notification::Notification,
    {
        let params = to_params(&params)?;
        self.notify(N::METHOD, params)
    }

    /// Register a handler for inbound notifications (and engine-initiated
    /// requests) with this method.
    ///
    /// Handlers for the same method run in registration order. The handler
    /// stays registered until [`Disposer::dispose`] is called.
    pub fn on_notification<F>(&self, method: &str, handler: F) -> Disposer
    where
        F: Fn(Option<Value>) + Send + Sync + 'static,
    {
        let mut state = self.shared.lock();
        let handler_id = state.next_handler_id;
        state.next_handler_id += 1;
        state
            .handlers
            .entry(method.to_string())
            .or_default()
            .push((handler_id, Arc::new(handler)));

        Disposer {
            shared: Arc::downgrade(&self.shared),
            method: method.to_string(),
            handler_id,
        }
    }

    /// Like [`on_notification`](Self::on_notification) with params decoded
    /// into the notification's type. Undecodable params are logged and skipped.
    pub fn on_typed_notification<N, F>(&self, handler: F) -> Disposer
    where
        N: lsp_types::notification::Notification,
        F: Fn(N::Params) + Send + Sync + 'static,
    {
        self.on_notification(N::METHOD, move |params| {
            match serde_json::from_value::<N::Params>(params.unwrap_or(Value::Null)) {
                Ok(params) => handler(params),
                Err(e) => tracing::warn!("Invalid params for {}: {}", N::METHOD, e),
            }
        })
    }

    /// Reject all pending requests with `ChannelClosed` and tear the channel
    /// down. Idempotent.
    pub fn close(&self) {
        self.shared.shutdown("closed by host");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending.len()
    }
}

impl std::fmt::Debug for LspClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("LspClient")
            .field("next_id", &state.next_id)
            .field("pending", &state.pending.len())
            .field("closed", &state.closed)
            .finish()
    }
}

fn to_params<P: Serialize>(params: &P) -> Result<Option<Value>, ClientError> {
    let value =
        serde_json::to_value(params).map_err(|e| ClientError::Serialization(e.to_string()))?;
    Ok(match value {
        Value::Null => None,
        value => Some(value),
    })
}

/// Decode a raw result into `T`.
pub fn decode_result<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

/// Closes the client when the dispatch task ends, however it ends.
struct ShutdownOnExit(Arc<Shared>);

impl Drop for ShutdownOnExit {
    fn drop(&mut self) {
        let reason = if std::thread::panicking() {
            "dispatch task panicked"
        } else {
            "channel ended"
        };
        self.0.shutdown(reason);
    }
}

async fn dispatch_loop(shared: Arc<Shared>, mut inbound: UnboundedReceiver<Value>) {
    let _guard = ShutdownOnExit(Arc::clone(&shared));
    while let Some(value) = inbound.recv().await {
        shared.handle_value(value);
    }
}

/// An outstanding request.
///
/// Dropping it before it settles cancels the request.
pub struct PendingRequest {
    id: RequestId,
    receiver: oneshot::Receiver<Outcome>,
    cancel: Option<CancellationToken>,
    shared: Arc<Shared>,
    settled: bool,
}

impl PendingRequest {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Wait for the outcome.
    ///
    /// An outcome that was already delivered when the token fires is still
    /// returned; cancellation only wins over a request that has not settled.
    pub async fn response(mut self) -> Result<Value, ClientError> {
        let received = match self.cancel.clone() {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                outcome = &mut self.receiver => Some(outcome),
            },
            None => Some((&mut self.receiver).await),
        };

        let outcome = match received {
            Some(received) => Some(received.unwrap_or(Err(ClientError::ChannelClosed))),
            None => match self.receiver.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => None,
                // Sender dropped without an outcome only during teardown
                Err(TryRecvError::Closed) => Some(Err(ClientError::ChannelClosed)),
            },
        };

        self.settled = true;
        match outcome {
            Some(outcome) => outcome,
            None => {
                self.shared.abandon(&self.id);
                Err(ClientError::Canceled)
            }
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if !self.settled {
            self.shared.abandon(&self.id);
        }
    }
}

/// Removes one notification handler.
pub struct Disposer {
    shared: Weak<Shared>,
    method: String,
    handler_id: u64,
}

impl Disposer {
    pub fn dispose(self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut state = shared.lock();
        if let Some(handlers) = state.handlers.get_mut(&self.method) {
            handlers.retain(|(id, _)| *id != self.handler_id);
            if handlers.is_empty() {
                state.handlers.remove(&self.method);
            }
        }
    }
}
