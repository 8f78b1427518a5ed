//! Staging area for downloaded documents
//!
//! Every remote document is copied into its own temporary file inside a per-run
//! directory. The staging area owns those files: they are removed when it is closed or
//! dropped, whichever comes first, so a failed or skipped inference step never leaves
//! copies behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::TryStreamExt;
use serde::Serialize;
use tempfile::{TempDir, TempPath};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::DownloadError;
use crate::remote::{ByteStream, RemoteResource};

const STAGING_DIR_PREFIX: &str = "xml-to-xsd-";
const MAX_PREFIX_LEN: usize = 40;

/// A remote document copied to local disk
#[derive(Debug, Clone, Serialize)]
pub struct StagedDocument {
    /// Local path of the staged copy
    pub path: PathBuf,
    /// The listed entry the copy was made from
    pub resource: RemoteResource,
    /// Number of bytes written
    pub bytes: u64,
}

/// Phase of a staging operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingPhase {
    Started,
    Progress,
    Finished,
}

/// Progress notification for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingProgress {
    pub resource: String,
    pub phase: StagingPhase,
    pub bytes_written: u64,
    pub expected_bytes: Option<u64>,
}

/// Observer notified while documents are staged
pub trait StagingObserver: Send + Sync {
    fn on_progress(&self, progress: &StagingProgress);
}

/// Owns the temporary copies made during one run
pub struct StagingArea {
    // Declared before `root` so staged files are removed before their directory.
    registry: Vec<TempPath>,
    root: TempDir,
    observer: Option<Arc<dyn StagingObserver>>,
}

impl StagingArea {
    /// Create a staging area under the system temporary directory
    pub fn new() -> std::io::Result<Self> {
        Self::in_dir(&std::env::temp_dir())
    }

    /// Create a staging area under `parent`
    pub fn in_dir(parent: &Path) -> std::io::Result<Self> {
        let root = tempfile::Builder::new()
            .prefix(STAGING_DIR_PREFIX)
            .tempdir_in(parent)?;
        debug!(path = %root.path().display(), "created staging area");
        Ok(Self {
            registry: Vec::new(),
            root,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn StagingObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Directory holding the staged copies
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Number of documents currently staged
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Copy `stream` into a new uniquely named temporary file.
    ///
    /// On failure the partial file is removed before returning.
    pub async fn stage(
        &mut self,
        resource: &RemoteResource,
        mut stream: ByteStream,
    ) -> Result<StagedDocument, DownloadError> {
        let write_error = |source: std::io::Error| DownloadError::Write {
            resource: resource.name.clone(),
            source,
        };

        let named = tempfile::Builder::new()
            .prefix(&file_prefix(&resource.name))
            .suffix(crate::filter::XML_FILE_SUFFIX)
            .tempfile_in(self.root.path())
            .map_err(write_error)?;
        let (file, temp_path) = named.into_parts();
        let mut file = tokio::fs::File::from_std(file);

        self.notify(resource, StagingPhase::Started, 0);

        let mut bytes_written = 0u64;
        loop {
            let chunk = match stream.try_next().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(source) => {
                    return Err(DownloadError::Interrupted {
                        resource: resource.name.clone(),
                        bytes_written,
                        source,
                    });
                }
            };
            file.write_all(&chunk).await.map_err(write_error)?;
            bytes_written += chunk.len() as u64;
            self.notify(resource, StagingPhase::Progress, bytes_written);
        }

        file.flush().await.map_err(write_error)?;
        file.sync_all().await.map_err(write_error)?;
        drop(file);

        self.notify(resource, StagingPhase::Finished, bytes_written);

        let path = temp_path.to_path_buf();
        self.registry.push(temp_path);

        Ok(StagedDocument {
            path,
            resource: resource.clone(),
            bytes: bytes_written,
        })
    }

    /// Remove every staged copy and the staging directory
    pub fn close(mut self) -> std::io::Result<()> {
        let mut first_error = None;
        for temp_path in self.registry.drain(..) {
            if let Err(e) = temp_path.close()
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        let root_path = self.root.path().to_path_buf();
        self.root.close()?;
        debug!(path = %root_path.display(), "removed staging area");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn notify(&self, resource: &RemoteResource, phase: StagingPhase, bytes_written: u64) {
        if let Some(observer) = &self.observer {
            observer.on_progress(&StagingProgress {
                resource: resource.name.clone(),
                phase,
                bytes_written,
                expected_bytes: resource.content_length,
            });
        }
    }
}

/// Build a readable temp file prefix from a resource name
fn file_prefix(name: &str) -> String {
    let stem = match name.len().checked_sub(crate::filter::XML_FILE_SUFFIX.len()) {
        Some(cut)
            if name
                .get(cut..)
                .is_some_and(|s| s.eq_ignore_ascii_case(crate::filter::XML_FILE_SUFFIX)) =>
        {
            &name[..cut]
        }
        _ => name,
    };

    let mut prefix: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_PREFIX_LEN)
        .collect();
    if prefix.is_empty() {
        prefix.push_str("document");
    }
    prefix.push('-');
    prefix
}
