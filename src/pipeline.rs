//! Run orchestration
//!
//! One run: create the staging area, harvest the remote folders, append local documents,
//! drop local references that no longer exist, and invoke inference once if anything is
//! left. The staging area is closed on every path out of [`Pipeline::run`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::config::{Config, ConfigError, ConfigManager};
use crate::error::{HarvestError, Result};
use crate::filter::ResourceFilter;
use crate::harvester::{HarvestWarning, Harvester};
use crate::inference::{CommandInferrer, InferenceEngine, SchemaInferrer};
use crate::merge::{MergeOrder, merge};
use crate::remote::RemoteFolderClient;
use crate::staging::{StagingArea, StagingObserver};
use crate::webdav::{Credentials, WebDavClient, WebDavConfig};
use crate::xsd::NativeInferrer;

/// How an empty document set is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyInputPolicy {
    /// Log at warn level
    #[default]
    Warn,
    /// Log at info level
    Silent,
}

/// What a successful run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A schema was written to `schema`, inferred from `documents` inputs
    Generated { schema: PathBuf, documents: usize },
    /// Nothing to infer from; inference was not invoked
    NothingToProcess { reason: String },
}

/// Summary of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub engine: String,
    pub outcome: RunOutcome,
    /// Documents downloaded into the staging area
    pub staged_documents: usize,
    /// Local documents that existed at inference time
    pub local_documents: usize,
    /// Listed remote entries rejected by the filter
    pub filtered_out: usize,
    pub warnings: Vec<HarvestWarning>,
}

impl RunReport {
    pub fn is_generated(&self) -> bool {
        matches!(self.outcome, RunOutcome::Generated { .. })
    }
}

/// Inputs of a run that do not depend on the remote client or inference engine
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub folders: Vec<String>,
    pub local_documents: Vec<PathBuf>,
    pub schema_path: PathBuf,
    pub merge_order: MergeOrder,
    pub on_empty: EmptyInputPolicy,
    /// Parent of the per-run staging directory
    pub staging_dir: Option<PathBuf>,
}

impl PipelineSettings {
    pub fn new(schema_path: impl Into<PathBuf>) -> Self {
        Self {
            folders: Vec::new(),
            local_documents: Vec::new(),
            schema_path: schema_path.into(),
            merge_order: MergeOrder::default(),
            on_empty: EmptyInputPolicy::default(),
            staging_dir: None,
        }
    }

    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        let schema_path = config.output.schema_path.clone().ok_or_else(|| {
            ConfigError::Validation("An output schema path is required".to_string())
        })?;
        Ok(Self {
            folders: config.remote.folders.clone(),
            local_documents: config.local.documents.clone(),
            schema_path,
            merge_order: config.pipeline.merge_order,
            on_empty: config.pipeline.on_empty,
            staging_dir: config.pipeline.staging_dir.clone(),
        })
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.schema_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "An output schema path is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Harvest, merge and infer
pub struct Pipeline {
    harvester: Harvester,
    inferrer: Arc<dyn SchemaInferrer>,
    settings: PipelineSettings,
    observer: Option<Arc<dyn StagingObserver>>,
}

impl Pipeline {
    pub fn new(
        harvester: Harvester,
        inferrer: Arc<dyn SchemaInferrer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            harvester,
            inferrer,
            settings,
            observer: None,
        }
    }

    /// Wire up the WebDAV client and inference engine described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        ConfigManager::validate_config(config)?;

        let base_url = config.remote.host.as_deref().map(parse_host).transpose()?;
        let credentials = match (&config.remote.username, &config.remote.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };
        let webdav_config = WebDavConfig {
            timeout_seconds: config.network.timeout_seconds,
            connect_timeout_seconds: config.network.connect_timeout_seconds,
            retry_attempts: config.network.retry_attempts,
            retry_delay_ms: config.network.retry_delay_ms,
            ..WebDavConfig::default()
        };
        let client: Arc<dyn RemoteFolderClient> =
            Arc::new(WebDavClient::new(base_url, credentials, webdav_config)?);

        let filter = ResourceFilter::new().with_content_types(config.remote.content_types.clone());
        let harvester = Harvester::new(client).with_filter(filter);

        let inferrer: Arc<dyn SchemaInferrer> = match config.inference.engine {
            InferenceEngine::Native => Arc::new(NativeInferrer::new()),
            InferenceEngine::Command => {
                let program = config.inference.program.clone().ok_or_else(|| {
                    ConfigError::Validation(
                        "The command inference engine requires a program".to_string(),
                    )
                })?;
                Arc::new(CommandInferrer::new(program).with_args(config.inference.args.clone()))
            }
        };

        Ok(Self::new(
            harvester,
            inferrer,
            PipelineSettings::from_config(config)?,
        ))
    }

    pub fn with_observer(mut self, observer: Arc<dyn StagingObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Execute one run
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let clock = Instant::now();

        self.settings.validate()?;

        let mut staging = self.open_staging()?;
        let result = self.execute(&mut staging, started_at).await;

        let staging_path = staging.path().to_path_buf();
        if let Err(error) = staging.close() {
            warn!(path = %staging_path.display(), %error, "failed to remove staging area");
        }

        let mut report = result?;
        report.duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(report)
    }

    fn open_staging(&self) -> Result<StagingArea> {
        let parent = self
            .settings
            .staging_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let staging = StagingArea::in_dir(&parent)
            .map_err(|source| HarvestError::StagingSetup { path: parent, source })?;
        Ok(match &self.observer {
            Some(observer) => staging.with_observer(Arc::clone(observer)),
            None => staging,
        })
    }

    async fn execute(
        &self,
        staging: &mut StagingArea,
        started_at: DateTime<Utc>,
    ) -> Result<RunReport> {
        let harvest = self.harvester.harvest(&self.settings.folders, staging).await;
        let mut warnings = harvest.warnings();
        let harvested = harvest.document_paths();
        let staged_documents = harvested.len();

        let combined = merge(
            harvested,
            &self.settings.local_documents,
            self.settings.merge_order,
        );

        let mut documents = Vec::with_capacity(combined.len());
        for path in combined {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                documents.push(path);
            } else {
                warn!(path = %path.display(), "local document not found, skipping");
                warnings.push(HarvestWarning::LocalDocumentMissing { path });
            }
        }
        let local_documents = documents.len() - staged_documents.min(documents.len());

        let outcome = if documents.is_empty() {
            let nothing_configured =
                self.settings.folders.is_empty() && self.settings.local_documents.is_empty();
            let reason = if nothing_configured {
                "no remote folders or local documents configured".to_string()
            } else {
                "no documents were harvested and no local documents exist".to_string()
            };
            match self.settings.on_empty {
                EmptyInputPolicy::Warn => {
                    warn!(%reason, "nothing to process, skipping inference")
                }
                EmptyInputPolicy::Silent => {
                    info!(%reason, "nothing to process, skipping inference")
                }
            }
            RunOutcome::NothingToProcess { reason }
        } else {
            info!(
                documents = documents.len(),
                engine = self.inferrer.name(),
                schema = %self.settings.schema_path.display(),
                "inferring schema"
            );
            self.inferrer
                .infer(&documents, &self.settings.schema_path)
                .await?;
            RunOutcome::Generated {
                schema: self.settings.schema_path.clone(),
                documents: documents.len(),
            }
        };

        Ok(RunReport {
            started_at,
            duration_ms: 0,
            engine: self.inferrer.name().to_string(),
            outcome,
            staged_documents,
            local_documents,
            filtered_out: harvest.filtered_out,
            warnings,
        })
    }
}

/// Parse the configured host as the base for relative folder paths
fn parse_host(host: &str) -> std::result::Result<Url, ConfigError> {
    let mut url = Url::parse(host)
        .map_err(|e| ConfigError::Validation(format!("Invalid host {}: {}", host, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
