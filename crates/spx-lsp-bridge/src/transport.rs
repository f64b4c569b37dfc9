//! Channel transports
//!
//! A transport is one direction of an ordered, message-passing duplex. Values
//! are carried as `serde_json::Value` so each side decodes every message on
//! its own and a malformed message cannot poison the stream.
//!
//! Two implementations satisfy the same contract:
//! - [`paired`]: in-process pair, used for tests and non-worker embeddings
//! - [`WorkerHandle`](crate::worker::WorkerHandle): the worker thread

use serde_json::Value;
use spx_lsp_core::ClientError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Outbound side of a channel.
pub trait Transport: Send + Sync {
    /// Queue a message for the peer. Delivery order equals call order.
    fn post_message(&self, message: Value) -> Result<(), ClientError>;

    /// Tear the channel down. Idempotent.
    fn terminate(&self);

    fn is_closed(&self) -> bool;
}

/// One end of a duplex: where to post, and where inbound messages arrive.
pub struct Channel {
    pub transport: Arc<dyn Transport>,
    pub inbound: UnboundedReceiver<Value>,
}

impl Channel {
    pub fn new(transport: Arc<dyn Transport>, inbound: UnboundedReceiver<Value>) -> Self {
        Self { transport, inbound }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("transport", &"<dyn Transport>")
            .field("closed", &self.transport.is_closed())
            .finish()
    }
}

/// Senders for both directions of a paired channel.
///
/// Shared by the two ends so that terminating either one drops both senders
/// and both inbound streams end.
#[derive(Default)]
struct PairState {
    to_a: Option<UnboundedSender<Value>>,
    to_b: Option<UnboundedSender<Value>>,
}

/// In-process transport end created by [`paired`].
pub struct PairedTransport {
    state: Arc<Mutex<PairState>>,
    /// true: this end posts to B; false: to A
    posts_to_b: bool,
}

impl PairedTransport {
    fn peer_sender(&self) -> Option<UnboundedSender<Value>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if self.posts_to_b {
            state.to_b.clone()
        } else {
            state.to_a.clone()
        }
    }
}

impl Transport for PairedTransport {
    fn post_message(&self, message: Value) -> Result<(), ClientError> {
        let sender = self.peer_sender().ok_or(ClientError::ChannelClosed)?;
        sender.send(message).map_err(|_| ClientError::ChannelClosed)
    }

    fn terminate(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.to_a = None;
        state.to_b = None;
    }

    fn is_closed(&self) -> bool {
        match self.peer_sender() {
            Some(sender) => sender.is_closed(),
            None => true,
        }
    }
}

/// Create an in-process duplex. Messages posted on one end arrive on the
/// other end's `inbound` in order.
pub fn paired() -> (Channel, Channel) {
    let (to_a, inbound_a) = mpsc::unbounded_channel();
    let (to_b, inbound_b) = mpsc::unbounded_channel();
    let state = Arc::new(Mutex::new(PairState {
        to_a: Some(to_a),
        to_b: Some(to_b),
    }));

    let a = Channel::new(
        Arc::new(PairedTransport {
            state: Arc::clone(&state),
            posts_to_b: true,
        }),
        inbound_a,
    );
    let b = Channel::new(
        Arc::new(PairedTransport {
            state,
            posts_to_b: false,
        }),
        inbound_b,
    );
    (a, b)
}
