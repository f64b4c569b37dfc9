//! Feature providers
//!
//! Thin callers of the [`LspClient`]. Each provider only sees the client's
//! request/notification surface and the shared completion cache, never the
//! channel or the worker.

mod code_action;
mod command;
mod completion;
mod diagnostics;
mod document_link;
mod formatting;
mod hover;
mod navigation;
mod rename;

pub use code_action::CodeActionProvider;
pub use command::{CommandProvider, InputSlot, RenameResourceParams, ResourceIdentifier};
pub use completion::CompletionProvider;
pub use diagnostics::DiagnosticsProvider;
pub use document_link::{DefinitionIdentifier, DocumentLinkProvider, ResourceReference, ResourceReferenceKind};
pub use formatting::FormattingProvider;
pub use hover::HoverProvider;
pub use navigation::NavigationProvider;
pub use rename::RenameProvider;

use crate::client::LspClient;
use crate::completion_cache::CompletionCache;
use lsp_types::CompletionItem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type SharedCompletionCache = Arc<Mutex<CompletionCache<CompletionItem>>>;

/// What a provider is allowed to reach.
#[derive(Clone)]
pub struct ProviderContext {
    client: LspClient,
    cache: SharedCompletionCache,
}

impl ProviderContext {
    pub fn new(client: LspClient, cache: SharedCompletionCache) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &LspClient {
        &self.client
    }

    pub(crate) fn cache(&self) -> MutexGuard<'_, CompletionCache<CompletionItem>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
