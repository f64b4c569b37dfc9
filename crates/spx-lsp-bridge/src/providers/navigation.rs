use super::ProviderContext;
use lsp_types::request::{GotoDefinition, GotoTypeDefinition, InlayHintRequest};
use lsp_types::{GotoDefinitionParams, GotoDefinitionResponse, InlayHint, InlayHintParams};
use spx_lsp_core::ClientError;
use tokio_util::sync::CancellationToken;

/// Go-to-definition, go-to-type-definition and inlay hints.
pub struct NavigationProvider {
    ctx: ProviderContext,
}

impl NavigationProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    pub async fn definition(
        &self,
        params: GotoDefinitionParams,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<GotoDefinitionResponse>, ClientError> {
        self.ctx
            .client()
            .request::<GotoDefinition>(params, cancel)
            .await
    }

    pub async fn type_definition(
        &self,
        params: GotoDefinitionParams,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<GotoDefinitionResponse>, ClientError> {
        self.ctx
            .client()
            .request::<GotoTypeDefinition>(params, cancel)
            .await
    }

    pub async fn inlay_hints(
        &self,
        params: InlayHintParams,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<InlayHint>, ClientError> {
        let hints = self
            .ctx
            .client()
            .request::<InlayHintRequest>(params, cancel)
            .await?;
        Ok(hints.unwrap_or_default())
    }
}
