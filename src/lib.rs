//! # xml-to-xsd Library
//!
//! Harvests XML documents from WebDAV folders, stages them in a per-run temporary
//! directory, appends already-local documents, and infers a single XML Schema from the
//! combined set, either in-process or through an external tool such as `trang`.

pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod harvester;
pub mod inference;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod propfind;
pub mod remote;
pub mod staging;
pub mod webdav;
pub mod xsd;

pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager};
pub use error::{DownloadError, FailureKind, HarvestError, InferenceError, RemoteAccessError};
pub use filter::{Eligibility, ResourceFilter};
pub use harvester::{FolderFailure, HarvestReport, HarvestWarning, Harvester, SkippedResource};
pub use inference::{CommandInferrer, InferenceEngine, SchemaInferrer};
pub use merge::{MergeOrder, merge};
pub use output::Output;
pub use pipeline::{EmptyInputPolicy, Pipeline, PipelineSettings, RunOutcome, RunReport};
pub use remote::{ByteStream, RemoteFolderClient, RemoteResource};
pub use staging::{StagedDocument, StagingArea, StagingObserver, StagingPhase, StagingProgress};
pub use webdav::{Credentials, WebDavClient, WebDavConfig};
pub use xsd::{NativeInferrer, SchemaModel};
