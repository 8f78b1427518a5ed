#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xml_to_xsd::{InferenceError, SchemaInferrer};

/// One child entry in a PROPFIND listing
pub struct DavEntry {
    pub name: &'static str,
    pub content_type: Option<&'static str>,
    pub collection: bool,
}

impl DavEntry {
    pub fn file(name: &'static str, content_type: &'static str) -> Self {
        Self {
            name,
            content_type: Some(content_type),
            collection: false,
        }
    }

    pub fn untyped(name: &'static str) -> Self {
        Self {
            name,
            content_type: None,
            collection: false,
        }
    }

    pub fn collection(name: &'static str) -> Self {
        Self {
            name,
            content_type: None,
            collection: true,
        }
    }
}

/// Build a `207 Multi-Status` body for `folder_path` (with trailing slash) and its children
pub fn multistatus(folder_path: &str, entries: &[DavEntry]) -> String {
    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<d:multistatus xmlns:d=\"DAV:\">\n",
    );
    body.push_str(&format!(
        "<d:response><d:href>{}</d:href><d:propstat><d:prop>\
         <d:resourcetype><d:collection/></d:resourcetype>\
         </d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>\n",
        folder_path
    ));
    for entry in entries {
        let resource_type = if entry.collection {
            "<d:resourcetype><d:collection/></d:resourcetype>"
        } else {
            "<d:resourcetype/>"
        };
        let content_type = entry
            .content_type
            .map(|t| format!("<d:getcontenttype>{}</d:getcontenttype>", t))
            .unwrap_or_default();
        body.push_str(&format!(
            "<d:response><d:href>{}{}{}</d:href><d:propstat><d:prop>\
             <d:displayname>{}</d:displayname>{}{}\
             </d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>\n",
            folder_path,
            entry.name,
            if entry.collection { "/" } else { "" },
            entry.name,
            resource_type,
            content_type
        ));
    }
    body.push_str("</d:multistatus>\n");
    body
}

/// Serve a folder listing at `folder_path`
pub async fn mount_listing(server: &MockServer, folder_path: &str, entries: &[DavEntry]) {
    Mock::given(method("PROPFIND"))
        .and(path(folder_path))
        .respond_with(
            ResponseTemplate::new(207)
                .set_body_raw(multistatus(folder_path, entries), "application/xml; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Serve a document body at `file_path`
pub async fn mount_document(server: &MockServer, file_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "application/xml"))
        .mount(server)
        .await;
}

/// Answer every request on `folder_path` with `status`
pub async fn mount_status(server: &MockServer, folder_path: &str, status: u16) {
    Mock::given(path(folder_path))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub fn write_xml(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Number of per-run staging directories left under `dir`
pub fn staging_dirs(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("xml-to-xsd-"))
        .count()
}

/// Records the document lists it is asked to infer from
#[derive(Default)]
pub struct RecordingInferrer {
    pub calls: Mutex<Vec<Vec<PathBuf>>>,
    pub contents: Mutex<Vec<Vec<String>>>,
}

impl RecordingInferrer {
    pub fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SchemaInferrer for RecordingInferrer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn infer(&self, documents: &[PathBuf], _output: &Path) -> Result<(), InferenceError> {
        let contents = documents
            .iter()
            .map(|d| std::fs::read_to_string(d).unwrap_or_default())
            .collect();
        self.contents.lock().unwrap().push(contents);
        self.calls.lock().unwrap().push(documents.to_vec());
        Ok(())
    }
}
