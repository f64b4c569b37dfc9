use super::ProviderContext;
use lsp_types::request::Formatting;
use lsp_types::{DocumentFormattingParams, TextEdit};
use spx_lsp_core::ClientError;
use tokio_util::sync::CancellationToken;

pub struct FormattingProvider {
    ctx: ProviderContext,
}

impl FormattingProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    /// Edits that format the whole document. Empty when already formatted.
    pub async fn format(
        &self,
        params: DocumentFormattingParams,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<TextEdit>, ClientError> {
        let edits = self
            .ctx
            .client()
            .request::<Formatting>(params, cancel)
            .await?;
        Ok(edits.unwrap_or_default())
    }
}
