//! Document Store
//!
//! Authoritative FileSet on the host side. Every mutation pushes a complete
//! `files` snapshot to the worker; there is no diffing. A push always happens
//! after the whole mutation is applied, so the worker never sees a
//! half-updated project.

use crate::config::DocumentConfig;
use crate::transport::Transport;
use spx_lsp_core::{ClientError, Envelope, File, FileSet};
use std::sync::Arc;

pub struct DocumentStore {
    files: Arc<FileSet>,
    transport: Arc<dyn Transport>,
    synced_extensions: Vec<String>,
    revision: u64,
}

impl DocumentStore {
    pub fn new(transport: Arc<dyn Transport>, config: &DocumentConfig) -> Self {
        Self {
            files: Arc::new(FileSet::new()),
            transport,
            synced_extensions: config.synced_extensions.clone(),
            revision: 0,
        }
    }

    /// Current snapshot. Cheap to clone and never changes underneath the
    /// holder; later mutations copy on write.
    pub fn snapshot(&self) -> Arc<FileSet> {
        Arc::clone(&self.files)
    }

    /// Number of pushes so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_file(
        &mut self,
        path: impl Into<String>,
        content: impl Into<String>,
        mod_time: u64,
    ) -> Result<(), ClientError> {
        let path = path.into();
        let content = content.into();
        self.update(|files| {
            files.insert(path, File::new(content, mod_time));
        })
    }

    /// Remove a file. Returns false (and pushes nothing) if it did not exist.
    pub fn delete_file(&mut self, path: &str) -> Result<bool, ClientError> {
        if !self.files.contains(path) {
            return Ok(false);
        }
        self.update(|files| {
            files.remove(path);
        })?;
        Ok(true)
    }

    /// Delete `from` and add its content under `to`, as one push.
    /// Returns false (and pushes nothing) if `from` did not exist.
    pub fn rename_file(&mut self, from: &str, to: impl Into<String>) -> Result<bool, ClientError> {
        if !self.files.contains(from) {
            return Ok(false);
        }
        let to = to.into();
        self.update(|files| {
            if let Some(file) = files.remove(from) {
                files.insert(to, file);
            }
        })?;
        Ok(true)
    }

    /// Replace the whole project, e.g. after loading it.
    pub fn replace_all(&mut self, files: FileSet) -> Result<(), ClientError> {
        self.files = Arc::new(files);
        self.sync()
    }

    /// Apply several mutations and push once.
    pub fn update<F>(&mut self, mutate: F) -> Result<(), ClientError>
    where
        F: FnOnce(&mut FileSet),
    {
        mutate(Arc::make_mut(&mut self.files));
        self.sync()
    }

    /// Push the current snapshot again.
    pub fn sync(&mut self) -> Result<(), ClientError> {
        let mut outgoing = FileSet::clone(&self.files);
        outgoing.retain_extensions(&self.synced_extensions);

        let value = Envelope::files(outgoing)
            .encode()
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        self.revision += 1;
        tracing::trace!(
            "Pushing files revision {} ({} files)",
            self.revision,
            self.files.len()
        );
        self.transport.post_message(value)
    }
}
