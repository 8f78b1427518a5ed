//! Native XML Schema inference
//!
//! Builds a structural model from example documents and renders it as an XSD in the
//! "Russian doll free" style: every element is declared globally and referenced from
//! its parents. Elements are keyed by local name; the namespace the first root element
//! is declared in (default or prefixed) becomes the target namespace. Descendants in
//! other namespaces are folded into that one.
//!
//! The model is insertion ordered, so the same documents in the same order always
//! produce the same schema text.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::InferenceError;
use crate::inference::SchemaInferrer;

const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Simple value types, ordered from most to least specific
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleType {
    Boolean,
    Integer,
    Decimal,
    String,
}

impl SimpleType {
    /// Classify one text or attribute sample
    pub fn classify(sample: &str) -> Self {
        let sample = sample.trim();
        if sample == "true" || sample == "false" {
            return SimpleType::Boolean;
        }

        let digits = sample.strip_prefix(['-', '+']).unwrap_or(sample);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return SimpleType::Integer;
        }

        let mut parts = digits.splitn(2, '.');
        let whole = parts.next().unwrap_or_default();
        let fraction = parts.next();
        if let Some(fraction) = fraction
            && !(whole.is_empty() && fraction.is_empty())
            && whole.bytes().all(|b| b.is_ascii_digit())
            && fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return SimpleType::Decimal;
        }

        SimpleType::String
    }

    /// Widen two observed types to one that accepts both
    pub fn merge(self, other: SimpleType) -> SimpleType {
        use SimpleType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Decimal) | (Decimal, Integer) => Decimal,
            _ => String,
        }
    }

    pub fn xsd_name(self) -> &'static str {
        match self {
            SimpleType::Boolean => "xs:boolean",
            SimpleType::Integer => "xs:integer",
            SimpleType::Decimal => "xs:decimal",
            SimpleType::String => "xs:string",
        }
    }
}

#[derive(Debug, Default, Clone)]
struct ChildModel {
    /// Parent instances containing this child at least once
    instances_with: usize,
    min: usize,
    max: usize,
}

#[derive(Debug, Clone)]
struct AttributeModel {
    count: usize,
    kind: SimpleType,
}

#[derive(Debug, Default, Clone)]
struct ElementModel {
    occurrences: usize,
    children: IndexMap<String, ChildModel>,
    unordered: bool,
    attributes: IndexMap<String, AttributeModel>,
    text_instances: usize,
    text_kind: Option<SimpleType>,
    mixed: bool,
}

impl ElementModel {
    fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Type of the simple content, if any instance had text
    fn content_type(&self) -> Option<SimpleType> {
        let kind = self.text_kind?;
        if self.text_instances < self.occurrences {
            // Empty instances only fit a string type
            Some(SimpleType::String)
        } else {
            Some(kind)
        }
    }

    fn record_attribute(&mut self, name: String, value: &str) {
        let kind = SimpleType::classify(value);
        self.attributes
            .entry(name)
            .and_modify(|a| {
                a.count += 1;
                a.kind = a.kind.merge(kind);
            })
            .or_insert(AttributeModel { count: 1, kind });
    }

    fn merge_child_order(&mut self, sequence: &[String]) {
        let mut collapsed: Vec<&str> = Vec::with_capacity(sequence.len());
        for name in sequence {
            if collapsed.last() != Some(&name.as_str()) {
                collapsed.push(name);
            }
        }

        let mut seen = IndexSet::new();
        for name in &collapsed {
            if !seen.insert(*name) {
                // A child reappears after a sibling
                self.unordered = true;
            }
        }

        let mut last_pos: Option<usize> = None;
        for name in seen {
            let pos = match self.children.get_index_of(name) {
                Some(pos) => {
                    if last_pos.is_some_and(|last| pos <= last) {
                        self.unordered = true;
                    }
                    pos
                }
                None => {
                    let pos = last_pos.map_or(0, |last| last + 1).min(self.children.len());
                    self.children
                        .shift_insert(pos, name.to_string(), ChildModel::default());
                    pos
                }
            };
            last_pos = Some(last_pos.map_or(pos, |last| last.max(pos)));
        }
    }

    fn finish_instance(&mut self, frame: Frame) {
        self.occurrences += 1;

        if !frame.text.is_empty() {
            self.text_instances += 1;
            let kind = SimpleType::classify(&frame.text);
            self.text_kind = Some(self.text_kind.map_or(kind, |k| k.merge(kind)));
            if !frame.children.is_empty() {
                self.mixed = true;
            }
        }

        self.merge_child_order(&frame.children);

        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for child in &frame.children {
            *counts.entry(child.as_str()).or_default() += 1;
        }
        for (child, count) in counts {
            if let Some(model) = self.children.get_mut(child) {
                model.min = if model.instances_with == 0 {
                    count
                } else {
                    model.min.min(count)
                };
                model.max = model.max.max(count);
                model.instances_with += 1;
            }
        }
    }
}

#[derive(Debug)]
struct Frame {
    name: String,
    children: Vec<String>,
    text: String,
}

/// Structural model accumulated over one or more documents
#[derive(Debug, Default, Clone)]
pub struct SchemaModel {
    elements: IndexMap<String, ElementModel>,
    roots: IndexSet<String>,
    target_namespace: Option<String>,
    documents: usize,
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents added so far
    pub fn document_count(&self) -> usize {
        self.documents
    }

    /// Names of all elements seen, in first-seen order
    pub fn element_names(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(String::as_str)
    }

    /// Add one document. `file` is only used in error messages.
    pub fn add_document(&mut self, file: &Path, xml: &[u8]) -> Result<(), InferenceError> {
        let malformed = |details: String| InferenceError::Malformed {
            file: file.to_path_buf(),
            details,
        };

        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut stack: Vec<Frame> = Vec::new();
        let mut saw_root = false;
        let mut buf = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                malformed(format!("at byte {}: {}", reader.buffer_position(), e))
            })?;

            match event {
                Event::Start(e) => {
                    let frame = self.open_element(&e, &mut stack, &mut saw_root, &malformed)?;
                    stack.push(frame);
                }
                Event::Empty(e) => {
                    let frame = self.open_element(&e, &mut stack, &mut saw_root, &malformed)?;
                    self.close_element(frame);
                }
                Event::End(_) => {
                    if let Some(frame) = stack.pop() {
                        self.close_element(frame);
                    }
                }
                Event::Text(e) => {
                    if let Some(frame) = stack.last_mut() {
                        let text = e.unescape().map_err(|e| {
                            malformed(format!("at byte {}: {}", reader.buffer_position(), e))
                        })?;
                        frame.text.push_str(text.trim());
                    }
                }
                Event::CData(e) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.text.push_str(String::from_utf8_lossy(e.as_ref()).trim());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(frame) = stack.last() {
            return Err(malformed(format!(
                "unexpected end of document inside <{}>",
                frame.name
            )));
        }
        if !saw_root {
            return Err(malformed("document has no root element".to_string()));
        }

        self.documents += 1;
        Ok(())
    }

    fn open_element<F>(
        &mut self,
        start: &BytesStart<'_>,
        stack: &mut [Frame],
        saw_root: &mut bool,
        malformed: &F,
    ) -> Result<Frame, InferenceError>
    where
        F: Fn(String) -> InferenceError,
    {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

        match stack.last_mut() {
            Some(parent) => parent.children.push(name.clone()),
            None => {
                if *saw_root {
                    return Err(malformed(format!("second root element <{}>", name)));
                }
                *saw_root = true;
                self.roots.insert(name.clone());
            }
        }

        let is_root = stack.is_empty();
        // Declaration that binds the root's own prefix, or the default namespace
        let root_binding = match start.name().prefix() {
            Some(prefix) => format!("xmlns:{}", String::from_utf8_lossy(prefix.as_ref())),
            None => "xmlns".to_string(),
        };
        let model = self.elements.entry(name.clone()).or_default();

        for attribute in start.attributes() {
            let attribute =
                attribute.map_err(|e| malformed(format!("bad attribute on <{}>: {}", name, e)))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| malformed(format!("bad attribute value on <{}>: {}", name, e)))?;

            if is_root
                && key == root_binding
                && self.target_namespace.is_none()
                && !value.is_empty()
            {
                self.target_namespace = Some(value.into_owned());
                continue;
            }
            if key == "xmlns" {
                continue;
            }
            // Namespace declarations and qualified attributes (xsi:*, xml:*) are not modelled
            if key.contains(':') {
                continue;
            }
            model.record_attribute(key, &value);
        }

        Ok(Frame {
            name,
            children: Vec::new(),
            text: String::new(),
        })
    }

    fn close_element(&mut self, frame: Frame) {
        self.elements
            .entry(frame.name.clone())
            .or_default()
            .finish_instance(frame);
    }

    /// Render the model as an XML Schema document
    pub fn to_xsd(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = write!(out, "<xs:schema xmlns:xs=\"{}\"", XS_NAMESPACE);
        out.push_str(" elementFormDefault=\"qualified\"");
        if let Some(namespace) = &self.target_namespace {
            let namespace = escape(namespace.as_str());
            let _ = write!(
                out,
                " targetNamespace=\"{}\" xmlns=\"{}\"",
                namespace, namespace
            );
        }
        out.push_str(">\n");

        for (name, model) in &self.elements {
            write_element(&mut out, name, model);
        }

        out.push_str("</xs:schema>\n");
        out
    }
}

fn write_element(out: &mut String, name: &str, model: &ElementModel) {
    let content_type = model.content_type();

    if !model.has_children() && model.attributes.is_empty() {
        match content_type {
            Some(kind) => {
                let _ = writeln!(
                    out,
                    "  <xs:element name=\"{}\" type=\"{}\"/>",
                    name,
                    kind.xsd_name()
                );
            }
            None => {
                let _ = writeln!(out, "  <xs:element name=\"{}\">", name);
                out.push_str("    <xs:complexType/>\n");
                out.push_str("  </xs:element>\n");
            }
        }
        return;
    }

    let _ = writeln!(out, "  <xs:element name=\"{}\">", name);

    if !model.has_children() {
        match content_type {
            Some(kind) => {
                out.push_str("    <xs:complexType>\n");
                out.push_str("      <xs:simpleContent>\n");
                let _ = writeln!(
                    out,
                    "        <xs:extension base=\"{}\">",
                    kind.xsd_name()
                );
                write_attributes(out, model, "          ");
                out.push_str("        </xs:extension>\n");
                out.push_str("      </xs:simpleContent>\n");
                out.push_str("    </xs:complexType>\n");
            }
            None => {
                out.push_str("    <xs:complexType>\n");
                write_attributes(out, model, "      ");
                out.push_str("    </xs:complexType>\n");
            }
        }
        out.push_str("  </xs:element>\n");
        return;
    }

    if model.mixed || content_type.is_some() {
        out.push_str("    <xs:complexType mixed=\"true\">\n");
    } else {
        out.push_str("    <xs:complexType>\n");
    }

    if model.unordered {
        out.push_str("      <xs:choice minOccurs=\"0\" maxOccurs=\"unbounded\">\n");
        for child in model.children.keys() {
            let _ = writeln!(out, "        <xs:element ref=\"{}\"/>", child);
        }
        out.push_str("      </xs:choice>\n");
    } else {
        out.push_str("      <xs:sequence>\n");
        for (child, stats) in &model.children {
            let _ = write!(out, "        <xs:element ref=\"{}\"", child);
            if stats.instances_with < model.occurrences || stats.min == 0 {
                out.push_str(" minOccurs=\"0\"");
            }
            if stats.max > 1 {
                out.push_str(" maxOccurs=\"unbounded\"");
            }
            out.push_str("/>\n");
        }
        out.push_str("      </xs:sequence>\n");
    }

    write_attributes(out, model, "      ");
    out.push_str("    </xs:complexType>\n");
    out.push_str("  </xs:element>\n");
}

fn write_attributes(out: &mut String, model: &ElementModel, indent: &str) {
    for (name, attribute) in &model.attributes {
        let _ = write!(
            out,
            "{}<xs:attribute name=\"{}\" type=\"{}\"",
            indent,
            name,
            attribute.kind.xsd_name()
        );
        if attribute.count >= model.occurrences {
            out.push_str(" use=\"required\"");
        }
        out.push_str("/>\n");
    }
}

/// Infer an XSD from documents on disk
pub fn infer_xsd(documents: &[PathBuf]) -> Result<String, InferenceError> {
    if documents.is_empty() {
        return Err(InferenceError::NoDocuments);
    }

    let mut model = SchemaModel::new();
    for document in documents {
        let xml = std::fs::read(document).map_err(|source| InferenceError::Read {
            file: document.clone(),
            source,
        })?;
        model.add_document(document, &xml)?;
    }
    Ok(model.to_xsd())
}

/// In-process schema inference engine
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeInferrer;

impl NativeInferrer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SchemaInferrer for NativeInferrer {
    fn name(&self) -> &str {
        "native"
    }

    async fn infer(&self, documents: &[PathBuf], output: &Path) -> Result<(), InferenceError> {
        let documents = documents.to_vec();
        let output = output.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let xsd = infer_xsd(&documents)?;
            std::fs::write(&output, xsd).map_err(|source| InferenceError::Write {
                path: output.clone(),
                source,
            })?;
            debug!(path = %output.display(), documents = documents.len(), "wrote schema");
            Ok(())
        })
        .await
        .map_err(|e| InferenceError::Join {
            details: e.to_string(),
        })?
    }
}
