use serde::{Deserialize, Serialize};

use crate::remote::RemoteResource;

/// Leading character marking a hidden entry
pub const HIDDEN_FILE_MARKER: char = '.';

/// Media type reported for XML documents
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// File name suffix used when the content type does not identify XML
pub const XML_FILE_SUFFIX: &str = ".xml";

/// Why a listed entry was or was not kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    /// Accepted on its content type
    XmlContentType,
    /// Accepted on its file name suffix
    XmlSuffix,
    Directory,
    Hidden,
    NotXml,
}

impl Eligibility {
    pub fn is_eligible(self) -> bool {
        matches!(self, Eligibility::XmlContentType | Eligibility::XmlSuffix)
    }
}

/// Decides from listing metadata alone whether a remote entry is an XML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFilter {
    content_types: Vec<String>,
}

impl Default for ResourceFilter {
    fn default() -> Self {
        Self {
            content_types: vec![XML_CONTENT_TYPE.to_string()],
        }
    }
}

impl ResourceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the accepted XML media types (compared case-insensitively)
    pub fn with_content_types(mut self, content_types: Vec<String>) -> Self {
        self.content_types = content_types
            .into_iter()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn content_types(&self) -> &[String] {
        &self.content_types
    }

    pub fn is_eligible(&self, resource: &RemoteResource) -> bool {
        self.classify(resource).is_eligible()
    }

    /// Classify an entry. Content type wins over the name suffix, which is only a
    /// fallback for servers that report a generic or missing type for XML.
    pub fn classify(&self, resource: &RemoteResource) -> Eligibility {
        if resource.is_directory {
            return Eligibility::Directory;
        }
        if resource.name.starts_with(HIDDEN_FILE_MARKER) {
            return Eligibility::Hidden;
        }
        if let Some(content_type) = resource.content_type.as_deref()
            && self.is_xml_media_type(content_type)
        {
            return Eligibility::XmlContentType;
        }
        if has_xml_suffix(&resource.name) {
            return Eligibility::XmlSuffix;
        }
        Eligibility::NotXml
    }

    fn is_xml_media_type(&self, content_type: &str) -> bool {
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        self.content_types
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(media_type))
    }
}

fn has_xml_suffix(name: &str) -> bool {
    name.len() >= XML_FILE_SUFFIX.len()
        && name
            .get(name.len() - XML_FILE_SUFFIX.len()..)
            .is_some_and(|suffix| suffix.eq_ignore_ascii_case(XML_FILE_SUFFIX))
}
