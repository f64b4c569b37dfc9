use super::ProviderContext;
use lsp_types::request::{PrepareRenameRequest, Rename};
use lsp_types::{PrepareRenameResponse, RenameParams, TextDocumentPositionParams, WorkspaceEdit};
use spx_lsp_core::ClientError;
use tokio_util::sync::CancellationToken;

pub struct RenameProvider {
    ctx: ProviderContext,
}

impl RenameProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    /// Range (and placeholder) of the symbol at the position, or `None` if it
    /// cannot be renamed.
    pub async fn prepare_rename(
        &self,
        params: TextDocumentPositionParams,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<PrepareRenameResponse>, ClientError> {
        self.ctx
            .client()
            .request::<PrepareRenameRequest>(params, cancel)
            .await
    }

    pub async fn rename(
        &self,
        params: RenameParams,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<WorkspaceEdit>, ClientError> {
        self.ctx.client().request::<Rename>(params, cancel).await
    }
}
