use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::inference::InferenceEngine;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show errors
    Quiet,
    /// Show warnings and the run summary
    #[default]
    Normal,
    /// Show per-folder and per-document detail
    Verbose,
}

impl VerbosityLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            VerbosityLevel::Quiet
        } else if verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Default `tracing` filter directive for this level
    pub fn log_directive(self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "debug",
        }
    }
}

/// Report format on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Inference engine selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    /// Built-in structural inference
    Native,
    /// External program such as trang
    Command,
}

impl From<EngineArg> for InferenceEngine {
    fn from(engine: EngineArg) -> Self {
        match engine {
            EngineArg::Native => InferenceEngine::Native,
            EngineArg::Command => InferenceEngine::Command,
        }
    }
}

/// Harvest XML documents from WebDAV folders and local paths, then infer one XSD
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "xml-to-xsd")]
#[command(
    about = "Harvest XML documents from WebDAV folders and local files and infer an XML Schema"
)]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Remote folder, as a URL or a path on the remote host (repeatable)
    #[arg(short = 'f', long = "folder", action = clap::ArgAction::Append)]
    pub folders: Vec<String>,

    /// Local XML document (repeatable)
    #[arg(short = 'l', long = "local", action = clap::ArgAction::Append)]
    pub local_documents: Vec<PathBuf>,

    /// Base URL of the WebDAV server
    #[arg(long = "host")]
    pub host: Option<String>,

    /// WebDAV user name
    #[arg(short = 'u', long = "username")]
    pub username: Option<String>,

    /// WebDAV password
    #[arg(long = "password")]
    pub password: Option<String>,

    /// Accepted remote content type (repeatable)
    #[arg(long = "content-type", action = clap::ArgAction::Append)]
    pub content_types: Vec<String>,

    /// Path of the generated schema
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// HTTP connect timeout in seconds
    #[arg(long = "connect-timeout")]
    pub connect_timeout: Option<u64>,

    /// Number of retry attempts for transient remote failures
    #[arg(long = "retry-attempts")]
    pub retry_attempts: Option<u32>,

    /// Report format
    #[arg(long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Place local documents before harvested ones
    #[arg(long = "local-first")]
    pub local_first: bool,

    /// Do not warn when there is nothing to process
    #[arg(long = "silent-empty")]
    pub silent_empty: bool,

    /// Schema inference engine
    #[arg(long = "engine", value_enum)]
    pub engine: Option<EngineArg>,

    /// Program run by the command engine
    #[arg(long = "inference-program")]
    pub inference_program: Option<String>,

    /// Extra argument for the inference program (repeatable)
    #[arg(
        long = "inference-arg",
        action = clap::ArgAction::Append,
        allow_hyphen_values = true
    )]
    pub inference_args: Vec<String>,

    /// Parent directory for the per-run staging directory
    #[arg(long = "staging-dir")]
    pub staging_dir: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        VerbosityLevel::from_flags(self.verbose, self.quiet)
    }
}
