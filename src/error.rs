use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

/// Main application error type for failures that end a run
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Staging area could not be created in {path}: {source}")]
    StagingSetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema inference failed: {0}")]
    Inference(#[from] InferenceError),
}

/// Broad classification of a remote failure, used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unauthorized,
    NotFound,
    Timeout,
    Io,
}

/// Errors raised by a remote folder client for a single list or fetch call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteAccessError {
    #[error("Access denied: {url}")]
    Unauthorized { url: String },

    #[error("Remote resource not found: {url}")]
    NotFound { url: String },

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Remote I/O error: {url} - {details}")]
    Io { url: String, details: String },
}

impl RemoteAccessError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RemoteAccessError::Unauthorized { .. } => FailureKind::Unauthorized,
            RemoteAccessError::NotFound { .. } => FailureKind::NotFound,
            RemoteAccessError::Timeout { .. } => FailureKind::Timeout,
            RemoteAccessError::Io { .. } => FailureKind::Io,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            RemoteAccessError::Unauthorized { url }
            | RemoteAccessError::NotFound { url }
            | RemoteAccessError::Timeout { url, .. }
            | RemoteAccessError::Io { url, .. } => url,
        }
    }
}

/// Errors raised while copying one remote document into the staging area
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Failed to fetch {resource}: {source}")]
    Fetch {
        resource: String,
        #[source]
        source: RemoteAccessError,
    },

    #[error("Transfer of {resource} interrupted after {bytes_written} bytes: {source}")]
    Interrupted {
        resource: String,
        bytes_written: u64,
        #[source]
        source: RemoteAccessError,
    },

    #[error("Failed to write staged copy of {resource}: {source}")]
    Write {
        resource: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by a schema inference engine
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("No input documents given to schema inference")]
    NoDocuments,

    #[error("Failed to read {file}: {source}")]
    Read {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed XML in {file}: {details}")]
    Malformed { file: PathBuf, details: String },

    #[error("Failed to write schema to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {diagnostic}")]
    Tool {
        program: String,
        status: String,
        diagnostic: String,
    },

    #[error("Inference task failed: {details}")]
    Join { details: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_access_error_display() {
        let unauthorized = RemoteAccessError::Unauthorized {
            url: "https://dav.example.com/xml/".to_string(),
        };
        assert!(unauthorized.to_string().contains("Access denied"));
        assert!(
            unauthorized
                .to_string()
                .contains("https://dav.example.com/xml/")
        );

        let timeout = RemoteAccessError::Timeout {
            url: "https://dav.example.com/slow/".to_string(),
            timeout_seconds: 5,
        };
        assert!(timeout.to_string().contains("Request timeout"));
        assert!(timeout.to_string().contains("5 seconds"));
    }

    #[test]
    fn test_remote_access_error_kind() {
        let cases = [
            (
                RemoteAccessError::Unauthorized { url: "u".into() },
                FailureKind::Unauthorized,
            ),
            (
                RemoteAccessError::NotFound { url: "u".into() },
                FailureKind::NotFound,
            ),
            (
                RemoteAccessError::Timeout {
                    url: "u".into(),
                    timeout_seconds: 1,
                },
                FailureKind::Timeout,
            ),
            (
                RemoteAccessError::Io {
                    url: "u".into(),
                    details: "reset".into(),
                },
                FailureKind::Io,
            ),
        ];

        for (error, kind) in cases {
            assert_eq!(error.kind(), kind);
            assert_eq!(error.url(), "u");
        }
    }

    #[test]
    fn test_download_error_keeps_source() {
        use std::error::Error;

        let error = DownloadError::Interrupted {
            resource: "orders.xml".to_string(),
            bytes_written: 512,
            source: RemoteAccessError::Io {
                url: "https://dav.example.com/orders.xml".to_string(),
                details: "connection reset".to_string(),
            },
        };

        assert!(error.to_string().contains("orders.xml"));
        assert!(error.to_string().contains("512 bytes"));
        let source = error.source().unwrap();
        assert!(source.to_string().contains("connection reset"));
    }

    #[test]
    fn test_inference_error_display() {
        let malformed = InferenceError::Malformed {
            file: PathBuf::from("/tmp/broken.xml"),
            details: "unexpected end of input".to_string(),
        };
        assert!(malformed.to_string().contains("Malformed XML"));
        assert!(malformed.to_string().contains("broken.xml"));

        let tool = InferenceError::Tool {
            program: "trang".to_string(),
            status: "exit status: 1".to_string(),
            diagnostic: "fatal: cannot read input".to_string(),
        };
        assert!(tool.to_string().contains("trang"));
        assert!(tool.to_string().contains("cannot read input"));
    }

    #[test]
    fn test_inference_error_conversion() {
        let harvest_error: HarvestError = InferenceError::NoDocuments.into();
        assert!(matches!(
            harvest_error,
            HarvestError::Inference(InferenceError::NoDocuments)
        ));
    }

    #[test]
    fn test_failure_kind_serialization() {
        let json = serde_json::to_string(&FailureKind::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }
}
