//! Document links, and what the spx engine encodes in them.
//!
//! Besides ordinary links, the engine reports two kinds of semantic links:
//! - resource references: target `spx://resources/...`, `data.kind` says how
//!   the resource is referenced
//! - definitions: target `xgo:<package>?<name>#<overload>` (older engines use
//!   the `gop:` scheme)

use super::command::ResourceIdentifier;
use super::ProviderContext;
use lsp_types::request::DocumentLinkRequest;
use lsp_types::{DocumentLink, DocumentLinkParams, Position, Range, TextDocumentIdentifier, Uri};
use serde::{Deserialize, Serialize};
use spx_lsp_core::ClientError;
use std::fmt;
use tokio_util::sync::CancellationToken;

const RESOURCE_URI_PREFIX: &str = "spx://resources/";
const DEFINITION_SCHEMES: [&str; 2] = ["xgo:", "gop:"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceReferenceKind {
    /// `play "explosion"`
    StringLiteral,
    /// Field auto-bound to a sprite or sound
    AutoBinding,
    /// Use of an auto-bound field
    AutoBindingReference,
    /// Use of a constant naming a resource
    ConstantReference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceReference {
    pub kind: ResourceReferenceKind,
    pub range: Range,
    pub resource: ResourceIdentifier,
}

/// A definition in some package, as identified by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionIdentifier {
    /// Full package path; `main` for the project itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Exported name, e.g. `Sprite.turn`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overload_index: Option<u32>,
}

impl DefinitionIdentifier {
    /// Parse `xgo:<package>?<name>#<overload>`. Every part is optional.
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = DEFINITION_SCHEMES
            .iter()
            .find_map(|scheme| uri.strip_prefix(scheme))?;

        let (rest, overload_index) = match rest.split_once('#') {
            Some((rest, index)) => (rest, Some(index.parse().ok()?)),
            None => (rest, None),
        };
        let (package, name) = match rest.split_once('?') {
            Some((package, name)) => (package, Some(name)),
            None => (rest, None),
        };

        Some(Self {
            package: (!package.is_empty()).then(|| package.to_string()),
            name: name.filter(|n| !n.is_empty()).map(str::to_string),
            overload_index,
        })
    }
}

impl fmt::Display for DefinitionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xgo:{}", self.package.as_deref().unwrap_or(""))?;
        if let Some(name) = &self.name {
            write!(f, "?{name}")?;
        }
        if let Some(index) = self.overload_index {
            write!(f, "#{index}")?;
        }
        Ok(())
    }
}

pub struct DocumentLinkProvider {
    ctx: ProviderContext,
}

impl DocumentLinkProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    pub async fn document_links(
        &self,
        document: Uri,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<DocumentLink>, ClientError> {
        let params = DocumentLinkParams {
            text_document: TextDocumentIdentifier { uri: document },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        let links = self
            .ctx
            .client()
            .request::<DocumentLinkRequest>(params, cancel)
            .await?;
        Ok(links.unwrap_or_default())
    }

    /// Resource references in `document`.
    pub async fn resource_references(
        &self,
        document: Uri,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<ResourceReference>, ClientError> {
        let links = self.document_links(document, cancel).await?;
        Ok(links.iter().filter_map(resource_reference).collect())
    }

    /// The definition whose link covers `position`, if any.
    pub async fn definition_at(
        &self,
        document: Uri,
        position: Position,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<DefinitionIdentifier>, ClientError> {
        let links = self.document_links(document, cancel).await?;
        Ok(links
            .iter()
            .filter(|link| contains(&link.range, position))
            .find_map(|link| DefinitionIdentifier::parse(link.target.as_ref()?.as_str())))
    }
}

fn resource_reference(link: &DocumentLink) -> Option<ResourceReference> {
    let target = link.target.as_ref()?.as_str();
    if !target.starts_with(RESOURCE_URI_PREFIX) {
        return None;
    }
    let kind = link.data.as_ref()?.get("kind")?.clone();
    let kind = serde_json::from_value(kind).ok()?;
    Some(ResourceReference {
        kind,
        range: link.range,
        resource: ResourceIdentifier {
            uri: target.to_string(),
        },
    })
}

/// Both ends inclusive, like the editor's own ranges.
fn contains(range: &Range, position: Position) -> bool {
    let at = (position.line, position.character);
    (range.start.line, range.start.character) <= at && at <= (range.end.line, range.end.character)
}
