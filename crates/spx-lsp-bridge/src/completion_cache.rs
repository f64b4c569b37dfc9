//! Completion Staging Cache
//!
//! Single slot holding the candidates of the most recent completion request,
//! keyed by the cursor position that triggered it. The editor renders the
//! list, then commits a choice by index; the commit is a local lookup rather
//! than a new request, so it cannot race further cursor movement.
//!
//! The slot is overwritten by every `set`: when two requests overlap, the
//! last one to be staged wins, whichever was sent first.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cursor position a completion list was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompletionKey {
    pub document: String,
    pub line: u32,
    pub column: u32,
}

impl CompletionKey {
    pub fn new(document: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            document: document.into(),
            line,
            column,
        }
    }
}

/// One candidate plus its rendered documentation, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedItem<T> {
    pub item: T,
    pub preview: Option<String>,
}

impl<T> StagedItem<T> {
    pub fn new(item: T) -> Self {
        Self {
            item,
            preview: None,
        }
    }

    pub fn with_preview(mut self, preview: impl Into<String>) -> Self {
        self.preview = Some(preview.into());
        self
    }
}

/// Identity of one `set` call. Lets a caller tell whether the entry it
/// staged is still the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(u64);

static NEXT_STAGE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct CompletionCache<T> {
    key: Option<CompletionKey>,
    items: Vec<StagedItem<T>>,
    stage: Option<StageId>,
}

impl<T> Default for CompletionCache<T> {
    fn default() -> Self {
        Self {
            key: None,
            items: Vec::new(),
            stage: None,
        }
    }
}

impl<T> CompletionCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the staged entry. Indices handed out for the previous entry
    /// now refer to this one.
    pub fn set(&mut self, key: CompletionKey, items: Vec<StagedItem<T>>) -> StageId {
        let stage = StageId(NEXT_STAGE.fetch_add(1, Ordering::Relaxed));
        tracing::trace!(
            "Staged {} completions for {}:{}:{}",
            items.len(),
            key.document,
            key.line,
            key.column
        );
        self.key = Some(key);
        self.items = items;
        self.stage = Some(stage);
        stage
    }

    /// Staged items if `key` equals the staged key exactly.
    pub fn get(&self, key: &CompletionKey) -> Option<&[StagedItem<T>]> {
        match &self.key {
            Some(staged) if staged == key => Some(&self.items),
            _ => None,
        }
    }

    /// Direct lookup by display position. Does not check the key; call
    /// [`get`](Self::get) first.
    pub fn get_by_index(&self, index: usize) -> Option<&StagedItem<T>> {
        self.items.get(index)
    }

    /// Empty the list but keep the key (focus loss, dismissal).
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Drop both the list and the key.
    pub fn reset(&mut self) {
        self.key = None;
        self.items.clear();
        self.stage = None;
    }

    /// Reset if the staged entry belongs to the file at `path`. Returns
    /// whether it did.
    ///
    /// Staged keys name documents either by path or by URI, so a key matches
    /// when it equals `path` or when its percent-decoded form ends in
    /// `/{path}`.
    pub fn invalidate_document(&mut self, path: &str) -> bool {
        let staged_here = self
            .key
            .as_ref()
            .is_some_and(|key| names_path(&key.document, path));
        if staged_here {
            self.reset();
        }
        staged_here
    }

    /// Whether `stage` is the entry currently held.
    pub fn is_current(&self, stage: StageId) -> bool {
        self.stage == Some(stage)
    }

    pub fn staged_key(&self) -> Option<&CompletionKey> {
        self.key.as_ref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn names_path(document: &str, path: &str) -> bool {
    if document == path {
        return true;
    }
    let decoded = urlencoding::decode(document).unwrap_or(Cow::Borrowed(document));
    decoded == path || decoded.ends_with(&format!("/{path}"))
}
