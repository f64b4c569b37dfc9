//! Session: one worker, one client, one document store, one staging cache.
//!
//! Owns the wiring so an editor only deals with files and providers. Document
//! mutations made through the session also invalidate staged completions for
//! the documents they touch.

use crate::client::LspClient;
use crate::completion_cache::CompletionCache;
use crate::config::BridgeConfig;
use crate::document_store::DocumentStore;
use crate::providers::{
    CodeActionProvider, CommandProvider, CompletionProvider, DiagnosticsProvider,
    DocumentLinkProvider, FormattingProvider, HoverProvider, NavigationProvider, ProviderContext,
    RenameProvider, SharedCompletionCache,
};
use crate::transport::{paired, Channel, Transport};
use crate::worker::{EngineLoader, WorkerHandle, WorkerRuntime};
use spx_lsp_core::{ClientError, FileSet};
use std::sync::{Arc, Mutex, PoisonError};

enum WorkerKind {
    Thread(Arc<WorkerHandle>),
    Task(tokio::task::JoinHandle<()>),
}

pub struct Session {
    client: LspClient,
    documents: DocumentStore,
    cache: SharedCompletionCache,
    worker: WorkerKind,
}

impl Session {
    /// Start the engine on a dedicated worker thread.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(config: &BridgeConfig, loader: Box<dyn EngineLoader>) -> anyhow::Result<Self> {
        config.validate()?;
        let (handle, channel) = WorkerHandle::spawn(loader, &config.worker)?;
        Ok(Self::connect(config, channel, WorkerKind::Thread(handle)))
    }

    /// Start the engine as a task on the current runtime, over an in-process
    /// channel.
    pub fn in_process(config: &BridgeConfig, loader: Box<dyn EngineLoader>) -> anyhow::Result<Self> {
        config.validate()?;
        let (host, worker) = paired();
        let task = WorkerRuntime::spawn_local(loader, worker);
        Ok(Self::connect(config, host, WorkerKind::Task(task)))
    }

    fn connect(config: &BridgeConfig, channel: Channel, worker: WorkerKind) -> Self {
        let transport = Arc::clone(&channel.transport);
        let client = LspClient::connect(channel, &config.client);
        Self {
            client,
            documents: DocumentStore::new(transport, &config.documents),
            cache: Arc::new(Mutex::new(CompletionCache::new())),
            worker,
        }
    }

    pub fn client(&self) -> &LspClient {
        &self.client
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn provider_context(&self) -> ProviderContext {
        ProviderContext::new(self.client.clone(), Arc::clone(&self.cache))
    }

    pub fn hover(&self) -> HoverProvider {
        HoverProvider::new(self.provider_context())
    }

    pub fn completion(&self) -> CompletionProvider {
        CompletionProvider::new(self.provider_context())
    }

    pub fn diagnostics(&self) -> DiagnosticsProvider {
        DiagnosticsProvider::new(self.provider_context())
    }

    pub fn formatting(&self) -> FormattingProvider {
        FormattingProvider::new(self.provider_context())
    }

    pub fn code_actions(&self) -> CodeActionProvider {
        CodeActionProvider::new(self.provider_context())
    }

    pub fn rename(&self) -> RenameProvider {
        RenameProvider::new(self.provider_context())
    }

    pub fn document_links(&self) -> DocumentLinkProvider {
        DocumentLinkProvider::new(self.provider_context())
    }

    pub fn navigation(&self) -> NavigationProvider {
        NavigationProvider::new(self.provider_context())
    }

    pub fn commands(&self) -> CommandProvider {
        CommandProvider::new(self.provider_context())
    }

    pub fn set_file(
        &mut self,
        path: &str,
        content: impl Into<String>,
        mod_time: u64,
    ) -> Result<(), ClientError> {
        self.invalidate(&[path]);
        self.documents.set_file(path, content, mod_time)
    }

    pub fn delete_file(&mut self, path: &str) -> Result<bool, ClientError> {
        self.invalidate(&[path]);
        self.documents.delete_file(path)
    }

    pub fn rename_file(&mut self, from: &str, to: &str) -> Result<bool, ClientError> {
        self.invalidate(&[from, to]);
        self.documents.rename_file(from, to)
    }

    /// Replace the whole project. Drops any staged completions.
    pub fn replace_all(&mut self, files: FileSet) -> Result<(), ClientError> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
        self.documents.replace_all(files)
    }

    fn invalidate(&self, paths: &[&str]) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        for path in paths {
            if cache.invalidate_document(path) {
                return;
            }
        }
    }

    /// Whether the engine side is still running.
    pub fn is_worker_alive(&self) -> bool {
        match &self.worker {
            WorkerKind::Thread(handle) => handle.is_alive(),
            WorkerKind::Task(task) => !task.is_finished(),
        }
    }

    /// Reject outstanding requests and stop the worker.
    pub fn shutdown(self) {
        self.client.close();
        match self.worker {
            WorkerKind::Thread(handle) => handle.terminate(),
            WorkerKind::Task(task) => task.abort(),
        }
    }
}
