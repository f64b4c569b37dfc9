use super::ProviderContext;
use crate::client::Disposer;
use lsp_types::notification::PublishDiagnostics;
use lsp_types::request::{DocumentDiagnosticRequest, WorkspaceDiagnosticRequest};
use lsp_types::{
    DocumentDiagnosticParams, DocumentDiagnosticReportResult, PublishDiagnosticsParams,
    WorkspaceDiagnosticParams, WorkspaceDiagnosticReportResult,
};
use spx_lsp_core::ClientError;
use tokio_util::sync::CancellationToken;

/// Pull diagnostics on demand, or subscribe to pushed ones.
pub struct DiagnosticsProvider {
    ctx: ProviderContext,
}

impl DiagnosticsProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    pub async fn document_diagnostics(
        &self,
        params: DocumentDiagnosticParams,
        cancel: Option<CancellationToken>,
    ) -> Result<DocumentDiagnosticReportResult, ClientError> {
        self.ctx
            .client()
            .request::<DocumentDiagnosticRequest>(params, cancel)
            .await
    }

    pub async fn workspace_diagnostics(
        &self,
        params: WorkspaceDiagnosticParams,
        cancel: Option<CancellationToken>,
    ) -> Result<WorkspaceDiagnosticReportResult, ClientError> {
        self.ctx
            .client()
            .request::<WorkspaceDiagnosticRequest>(params, cancel)
            .await
    }

    /// Receive every `textDocument/publishDiagnostics` from the engine.
    pub fn subscribe<F>(&self, handler: F) -> Disposer
    where
        F: Fn(PublishDiagnosticsParams) + Send + Sync + 'static,
    {
        self.ctx
            .client()
            .on_typed_notification::<PublishDiagnostics, _>(handler)
    }
}
