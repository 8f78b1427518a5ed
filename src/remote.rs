//! Remote folder abstraction
//!
//! The harvester only ever talks to a [`RemoteFolderClient`]: list the children of a
//! folder, then stream the bytes of the ones worth keeping. [`crate::webdav::WebDavClient`]
//! is the production implementation; tests substitute in-memory clients.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::RemoteAccessError;

/// Streamed body of a remote resource
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, RemoteAccessError>> + Send>>;

/// One entry of a remote folder listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteResource {
    /// File name of the entry: the decoded last segment of its href
    pub name: String,
    /// `displayname` property reported by the server, for diagnostics only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Absolute location used to fetch the entry
    pub href: String,
    /// Content type reported by the server, if any
    pub content_type: Option<String>,
    /// Content length reported by the server, if any
    pub content_length: Option<u64>,
    /// Whether the entry is a collection
    pub is_directory: bool,
    /// The configured folder this entry was listed from
    pub folder: String,
}

impl RemoteResource {
    /// Convenience constructor for a plain file entry
    pub fn file(
        folder: impl Into<String>,
        name: impl Into<String>,
        href: impl Into<String>,
        content_type: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            href: href.into(),
            content_type: content_type.map(str::to_string),
            content_length: None,
            is_directory: false,
            folder: folder.into(),
        }
    }

    /// Convenience constructor for a collection entry
    pub fn directory(
        folder: impl Into<String>,
        name: impl Into<String>,
        href: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            href: href.into(),
            content_type: None,
            content_length: None,
            is_directory: true,
            folder: folder.into(),
        }
    }
}

/// Capability to list and fetch documents in remote folders
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteFolderClient: Send + Sync {
    /// List the immediate children of `folder`
    async fn list(&self, folder: &str) -> Result<Vec<RemoteResource>, RemoteAccessError>;

    /// Open a byte stream over the content of `resource`
    async fn fetch(&self, resource: &RemoteResource) -> Result<ByteStream, RemoteAccessError>;
}

/// Build a [`ByteStream`] from already-known chunks
pub fn stream_from_chunks<I>(chunks: I) -> ByteStream
where
    I: IntoIterator<Item = Result<Bytes, RemoteAccessError>>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures::stream::iter(chunks))
}
