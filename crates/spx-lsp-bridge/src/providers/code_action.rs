use super::ProviderContext;
use lsp_types::request::CodeActionRequest;
use lsp_types::{CodeActionOrCommand, CodeActionParams};
use spx_lsp_core::ClientError;
use tokio_util::sync::CancellationToken;

pub struct CodeActionProvider {
    ctx: ProviderContext,
}

impl CodeActionProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    pub async fn code_actions(
        &self,
        params: CodeActionParams,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<CodeActionOrCommand>, ClientError> {
        let actions = self
            .ctx
            .client()
            .request::<CodeActionRequest>(params, cancel)
            .await?;
        Ok(actions.unwrap_or_default())
    }
}
