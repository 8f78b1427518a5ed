//! Schema inference boundary
//!
//! The pipeline hands an ordered, non-empty list of documents and one output path to a
//! [`SchemaInferrer`]. Two engines are provided: [`CommandInferrer`] shells out to an
//! external tool such as `trang`, and [`crate::xsd::NativeInferrer`] infers the schema
//! in-process.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::InferenceError;

/// Available inference engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceEngine {
    #[default]
    Native,
    Command,
}

/// Derives one schema from a set of example documents
#[async_trait]
pub trait SchemaInferrer: Send + Sync {
    /// Short engine name for logs and reports
    fn name(&self) -> &str;

    /// Infer a schema from `documents` and write it to `output`
    async fn infer(&self, documents: &[PathBuf], output: &Path) -> Result<(), InferenceError>;
}

/// Runs `<program> <args...> <documents...> <output>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInferrer {
    program: String,
    args: Vec<String>,
}

impl CommandInferrer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Extra arguments placed before the document list
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, documents: &[PathBuf], output: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).args(documents).arg(output);
        command
    }
}

#[async_trait]
impl SchemaInferrer for CommandInferrer {
    fn name(&self) -> &str {
        &self.program
    }

    async fn infer(&self, documents: &[PathBuf], output: &Path) -> Result<(), InferenceError> {
        if documents.is_empty() {
            return Err(InferenceError::NoDocuments);
        }

        debug!(program = %self.program, documents = documents.len(), "running inference command");

        let result = self
            .command(documents, output)
            .output()
            .await
            .map_err(|source| InferenceError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if result.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        let diagnostic = if stderr.is_empty() {
            String::from_utf8_lossy(&result.stdout).trim().to_string()
        } else {
            stderr
        };

        Err(InferenceError::Tool {
            program: self.program.clone(),
            status: result.status.to_string(),
            diagnostic,
        })
    }
}
