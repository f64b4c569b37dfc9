use super::document_link::DefinitionIdentifier;
use super::ProviderContext;
use crate::client::decode_result;
use lsp_types::request::ExecuteCommand;
use lsp_types::{
    ExecuteCommandParams, Range, TextDocumentIdentifier, TextDocumentPositionParams, WorkspaceEdit,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use spx_lsp_core::ClientError;
use tokio_util::sync::CancellationToken;

pub const SPX_GET_DEFINITIONS: &str = "spx.getDefinitions";
pub const SPX_RENAME_RESOURCES: &str = "spx.renameResources";
pub const SPX_GET_INPUT_SLOTS: &str = "spx.getInputSlots";

/// A project resource, e.g. `spx://resources/sprites/Hero`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameResourceParams {
    pub resource: ResourceIdentifier,
    pub new_name: String,
}

/// A place in the code where the user can pick a value from a widget.
///
/// Only the range is interpreted here; the rest of the engine's payload is
/// kept as-is for the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSlot {
    pub range: Range,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// `workspace/executeCommand`, plus typed wrappers for the spx commands.
pub struct CommandProvider {
    ctx: ProviderContext,
}

impl CommandProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(
        &self,
        command: &str,
        arguments: Vec<Value>,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<Value>, ClientError> {
        let params = ExecuteCommandParams {
            command: command.to_string(),
            arguments,
            work_done_progress_params: Default::default(),
        };
        self.ctx
            .client()
            .request::<ExecuteCommand>(params, cancel)
            .await
    }

    async fn execute_typed<A, R>(
        &self,
        command: &str,
        arguments: Vec<A>,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<R>, ClientError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let arguments = arguments
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        match self.execute(command, arguments, cancel).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => decode_result(value).map(Some),
        }
    }

    /// Definitions referenced at each position.
    pub async fn get_definitions(
        &self,
        positions: Vec<TextDocumentPositionParams>,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<DefinitionIdentifier>, ClientError> {
        let definitions = self
            .execute_typed(SPX_GET_DEFINITIONS, positions, cancel)
            .await?;
        Ok(definitions.unwrap_or_default())
    }

    /// Edits that update every reference to the renamed resources.
    pub async fn rename_resources(
        &self,
        renames: Vec<RenameResourceParams>,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<WorkspaceEdit>, ClientError> {
        self.execute_typed(SPX_RENAME_RESOURCES, renames, cancel).await
    }

    pub async fn get_input_slots(
        &self,
        document: TextDocumentIdentifier,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<InputSlot>, ClientError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            text_document: TextDocumentIdentifier,
        }

        let slots = self
            .execute_typed(
                SPX_GET_INPUT_SLOTS,
                vec![Args {
                    text_document: document,
                }],
                cancel,
            )
            .await?;
        Ok(slots.unwrap_or_default())
    }
}
