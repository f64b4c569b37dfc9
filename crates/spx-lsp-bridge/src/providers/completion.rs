use super::ProviderContext;
use crate::completion_cache::{CompletionKey, StageId, StagedItem};
use lsp_types::request::{Completion, ResolveCompletionItem};
use lsp_types::{CompletionItem, CompletionParams, CompletionResponse, Documentation};
use spx_lsp_core::ClientError;
use tokio_util::sync::CancellationToken;

/// Requests completions and stages them for index-based commit.
pub struct CompletionProvider {
    ctx: ProviderContext,
}

impl CompletionProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    /// Request completions at `key` and stage them.
    ///
    /// Only plain item arrays are used; a `CompletionList` result is treated
    /// as empty. An empty result still replaces the staged entry.
    pub async fn complete(
        &self,
        key: CompletionKey,
        params: CompletionParams,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<CompletionItem>, ClientError> {
        let items = match self
            .ctx
            .client()
            .request::<Completion>(params, cancel)
            .await?
        {
            Some(CompletionResponse::Array(items)) => items,
            Some(CompletionResponse::List(_)) => {
                tracing::debug!("Ignoring completion list result");
                Vec::new()
            }
            None => Vec::new(),
        };

        let staged = items.iter().cloned().map(stage_item).collect();
        self.stage(key, staged);
        Ok(items)
    }

    fn stage(&self, key: CompletionKey, items: Vec<StagedItem<CompletionItem>>) -> StageId {
        self.ctx.cache().set(key, items)
    }

    /// Staged items for `key`, or `None` if the cursor has moved on.
    pub fn staged(&self, key: &CompletionKey) -> Option<Vec<StagedItem<CompletionItem>>> {
        self.ctx.cache().get(key).map(<[_]>::to_vec)
    }

    /// The item shown at `index` in the staged list.
    pub fn commit(&self, index: usize) -> Option<CompletionItem> {
        self.ctx
            .cache()
            .get_by_index(index)
            .map(|staged| staged.item.clone())
    }

    /// Ask the engine to fill in details for the staged item at `index`.
    ///
    /// Returns `None` if there is no such item.
    pub async fn resolve(
        &self,
        index: usize,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<CompletionItem>, ClientError> {
        let Some(item) = self.commit(index) else {
            return Ok(None);
        };
        let resolved = self
            .ctx
            .client()
            .request::<ResolveCompletionItem>(item, cancel)
            .await?;
        Ok(Some(resolved))
    }

    /// Drop the staged list (focus loss, dismissal). The key is kept.
    pub fn dismiss(&self) {
        self.ctx.cache().clear();
    }
}

fn stage_item(item: CompletionItem) -> StagedItem<CompletionItem> {
    let preview = item.documentation.as_ref().map(|doc| match doc {
        Documentation::String(text) => text.clone(),
        Documentation::MarkupContent(markup) => markup.value.clone(),
    });
    StagedItem { item, preview }
}
