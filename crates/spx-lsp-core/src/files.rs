//! FileSet: the complete text state of a project.
//!
//! A `FileSet` is always a whole snapshot. The worker never merges partial
//! updates: each `files` envelope replaces its previous view entirely.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A file in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub content: String,
    /// Unix timestamp in milliseconds
    #[serde(default)]
    pub mod_time: u64,
}

impl File {
    pub fn new(content: impl Into<String>, mod_time: u64) -> Self {
        Self {
            content: content.into(),
            mod_time,
        }
    }
}

/// Map from workspace-relative path to file.
///
/// A `None` entry marks a deleted file. It is kept on the wire for
/// compatibility but is invisible to `get`, `iter` and `len`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSet {
    entries: BTreeMap<String, Option<File>>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, file: File) -> Option<File> {
        self.entries.insert(path.into(), Some(file)).flatten()
    }

    pub fn remove(&mut self, path: &str) -> Option<File> {
        self.entries.remove(path).flatten()
    }

    pub fn get(&self, path: &str) -> Option<&File> {
        self.entries.get(path).and_then(Option::as_ref)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &File)> {
        self.entries
            .iter()
            .filter_map(|(path, file)| file.as_ref().map(|f| (path.as_str(), f)))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(path, _)| path)
    }

    /// Drop deleted entries and every file whose extension is not listed.
    ///
    /// Extensions include the leading dot (`".spx"`).
    pub fn retain_extensions(&mut self, extensions: &[String]) {
        self.entries.retain(|path, file| {
            file.is_some() && extensions.iter().any(|ext| path.ends_with(ext.as_str()))
        });
    }
}

impl FromIterator<(String, File)> for FileSet {
    fn from_iter<I: IntoIterator<Item = (String, File)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(p, f)| (p, Some(f))).collect(),
        }
    }
}
