//! Remote folder harvesting
//!
//! Folders are processed one at a time in configured order and resources in listing
//! order, so the staged documents come out in a stable sequence. A folder that cannot
//! be listed becomes a [`FolderFailure`]; a resource that cannot be downloaded becomes a
//! [`SkippedResource`]. Neither stops the harvest.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DownloadError, FailureKind, RemoteAccessError};
use crate::filter::ResourceFilter;
use crate::remote::{RemoteFolderClient, RemoteResource};
use crate::staging::{StagedDocument, StagingArea};

/// A remote folder that could not be listed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderFailure {
    pub folder: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl FolderFailure {
    pub fn new(folder: &str, error: &RemoteAccessError) -> Self {
        Self {
            folder: folder.to_string(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

/// An eligible remote document that could not be staged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedResource {
    pub folder: String,
    pub resource: String,
    pub reason: String,
}

impl SkippedResource {
    pub fn new(resource: &RemoteResource, error: &DownloadError) -> Self {
        Self {
            folder: resource.folder.clone(),
            resource: resource.name.clone(),
            reason: error.to_string(),
        }
    }
}

/// Non-fatal problem recorded during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HarvestWarning {
    FolderFailed(FolderFailure),
    ResourceSkipped(SkippedResource),
    LocalDocumentMissing { path: PathBuf },
}

impl fmt::Display for HarvestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarvestWarning::FolderFailed(failure) => {
                write!(f, "folder {} skipped: {}", failure.folder, failure.reason)
            }
            HarvestWarning::ResourceSkipped(skipped) => write!(
                f,
                "resource {} in {} skipped: {}",
                skipped.resource, skipped.folder, skipped.reason
            ),
            HarvestWarning::LocalDocumentMissing { path } => {
                write!(f, "local document {} not found", path.display())
            }
        }
    }
}

/// Outcome of harvesting all configured folders
#[derive(Debug, Default)]
pub struct HarvestReport {
    /// Staged documents in per-folder, per-listing order
    pub documents: Vec<StagedDocument>,
    pub failures: Vec<FolderFailure>,
    pub skipped: Vec<SkippedResource>,
    /// Number of listed entries the filter rejected
    pub filtered_out: usize,
}

impl HarvestReport {
    /// Local paths of the staged documents, in order
    pub fn document_paths(&self) -> Vec<PathBuf> {
        self.documents.iter().map(|d| d.path.clone()).collect()
    }

    /// Failures and skips as warnings, folder failures first
    pub fn warnings(&self) -> Vec<HarvestWarning> {
        self.failures
            .iter()
            .cloned()
            .map(HarvestWarning::FolderFailed)
            .chain(self.skipped.iter().cloned().map(HarvestWarning::ResourceSkipped))
            .collect()
    }
}

/// Lists, filters and stages documents from remote folders
pub struct Harvester {
    client: Arc<dyn RemoteFolderClient>,
    filter: ResourceFilter,
}

impl Harvester {
    pub fn new(client: Arc<dyn RemoteFolderClient>) -> Self {
        Self {
            client,
            filter: ResourceFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: ResourceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn filter(&self) -> &ResourceFilter {
        &self.filter
    }

    /// Harvest every folder into `staging`
    pub async fn harvest(&self, folders: &[String], staging: &mut StagingArea) -> HarvestReport {
        let mut report = HarvestReport::default();

        for folder in folders {
            self.harvest_folder(folder, staging, &mut report).await;
        }

        info!(
            folders = folders.len(),
            staged = report.documents.len(),
            failed_folders = report.failures.len(),
            skipped_resources = report.skipped.len(),
            "harvest finished"
        );
        report
    }

    async fn harvest_folder(
        &self,
        folder: &str,
        staging: &mut StagingArea,
        report: &mut HarvestReport,
    ) {
        let listing = match self.client.list(folder).await {
            Ok(listing) => listing,
            Err(error) => {
                warn!(folder, %error, "skipping unreachable folder");
                report.failures.push(FolderFailure::new(folder, &error));
                return;
            }
        };

        info!(folder, entries = listing.len(), "listed remote folder");

        for resource in listing {
            let eligibility = self.filter.classify(&resource);
            if !eligibility.is_eligible() {
                debug!(folder, resource = %resource.name, ?eligibility, "ignoring entry");
                report.filtered_out += 1;
                continue;
            }

            match self.download(&resource, staging).await {
                Ok(document) => {
                    info!(
                        folder,
                        resource = %resource.name,
                        bytes = document.bytes,
                        "staged document"
                    );
                    report.documents.push(document);
                }
                Err(error) => {
                    warn!(folder, resource = %resource.name, %error, "skipping resource");
                    report.skipped.push(SkippedResource::new(&resource, &error));
                }
            }
        }
    }

    async fn download(
        &self,
        resource: &RemoteResource,
        staging: &mut StagingArea,
    ) -> Result<StagedDocument, DownloadError> {
        let stream = self
            .client
            .fetch(resource)
            .await
            .map_err(|source| DownloadError::Fetch {
                resource: resource.name.clone(),
                source,
            })?;
        staging.stage(resource, stream).await
    }
}
