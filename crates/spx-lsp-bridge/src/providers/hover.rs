use super::ProviderContext;
use lsp_types::request::HoverRequest;
use lsp_types::{Hover, HoverParams};
use spx_lsp_core::ClientError;
use tokio_util::sync::CancellationToken;

pub struct HoverProvider {
    ctx: ProviderContext,
}

impl HoverProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    pub async fn hover(
        &self,
        params: HoverParams,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<Hover>, ClientError> {
        self.ctx.client().request::<HoverRequest>(params, cancel).await
    }
}
