//! # spx LSP bridge
//!
//! Connects the spx code editor to a language server engine running in a
//! worker. The host and the worker share nothing but an ordered message
//! channel carrying [`Envelope`](spx_lsp_core::Envelope)s.
//!
//! ```text
//!  host                                   worker
//!  ─────────────────────────              ──────────────────────
//!  providers ─► LspClient ──lsp──────────► WorkerRuntime ─► Engine
//!                  ▲                           │
//!                  └───────────lsp─────────────┘
//!  DocumentStore ──────────files──────────► (snapshot)
//! ```
//!
//! [`Session`] wires the pieces together.

pub mod client;
pub mod completion_cache;
pub mod config;
pub mod document_store;
pub mod providers;
pub mod session;
pub mod tracing_setup;
pub mod transport;
pub mod worker;

pub use client::{Disposer, LspClient, PendingRequest};
pub use completion_cache::{CompletionCache, CompletionKey, StageId, StagedItem};
pub use config::{BridgeConfig, ConfigError};
pub use document_store::DocumentStore;
pub use session::Session;
pub use transport::{paired, Channel, Transport};
pub use worker::{Engine, EngineLoader, JsonRpcEngine, Outbox, WorkerHandle, WorkerRuntime};

pub use spx_lsp_core as core;
