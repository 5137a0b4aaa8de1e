//! Loading documents with quick-xml
//!
//! The reader only drives structure and well-formedness checks. Start tags are
//! re-scanned from the source text so that every attribute keeps its exact
//! spelling and position.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use xdt_traits::{Error, Result, SourceLocation};

use crate::document::{Attribute, Document, Element, NodeId, NodeKind, QName, XMLNS_NAMESPACE, XML_NAMESPACE};
use crate::encoding;
use crate::preservation::AttributePreservation;
use crate::tag::scan_start_tag;

/// Options controlling how a document is loaded
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Keep whitespace-only text and record attribute layout so that
    /// saving reproduces the source formatting
    pub preserve_whitespace: bool,
    /// File name reported in node provenance
    pub file: Option<String>,
}

impl LoadOptions {
    /// Options for formatting-preservation mode
    pub fn preserving() -> Self {
        Self {
            preserve_whitespace: true,
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

impl Document {
    /// Parse a document from text
    pub fn parse_str(text: &str, options: &LoadOptions) -> Result<Document> {
        parse(text, options)
    }

    /// Parse a document from raw bytes, detecting the encoding
    pub fn load_bytes(bytes: &[u8], options: &LoadOptions) -> Result<Document> {
        let (text, info) = encoding::decode(bytes)?;
        let mut document = parse(&text, options)?;
        document.set_encoding(info);
        Ok(document)
    }

    /// Load a document from a file. The path becomes the provenance file name
    /// unless `options` names one.
    pub fn load_file(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Document> {
        let path = path.as_ref();
        log::debug!("loading {}", path.display());
        let bytes = std::fs::read(path)?;
        let mut options = options.clone();
        if options.file.is_none() {
            options.file = Some(path.display().to_string());
        }
        Self::load_bytes(&bytes, &options)
    }
}

/// Byte offsets of line starts, for converting offsets to line and column
struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, starts }
    }

    /// 1-based line and character column of a byte offset
    fn locate(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let line = self.starts.partition_point(|&s| s <= offset);
        let start = self.starts[line - 1];
        let column = self
            .text
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - start);
        (line, column + 1)
    }
}

struct Loader<'a> {
    document: Document,
    lines: LineIndex<'a>,
    options: &'a LoadOptions,
    /// Open elements with the namespace declarations they introduced
    stack: Vec<(NodeId, Vec<(String, String)>)>,
}

pub(crate) fn parse(text: &str, options: &LoadOptions) -> Result<Document> {
    let mut document = Document::new();
    document.set_preserve_whitespace(options.preserve_whitespace);
    document.set_file(options.file.clone());

    let mut loader = Loader {
        document,
        lines: LineIndex::new(text),
        options,
        stack: Vec::new(),
    };

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = true;

    loop {
        let start = reader.buffer_position() as usize;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                let at = reader.error_position() as usize;
                return Err(loader.error_at(at, e.to_string()));
            }
        };
        let end = reader.buffer_position() as usize;
        let raw = &text[start..end];

        match event {
            Event::Start(e) => loader.open_element(&e, raw, start, false)?,
            Event::Empty(e) => loader.open_element(&e, raw, start, true)?,
            Event::End(_) => {
                loader.stack.pop();
            }
            Event::Text(t) => {
                let value = t
                    .unescape()
                    .map_err(|e| loader.error_at(start, e.to_string()))?
                    .into_owned();
                loader.add_text(value, raw, start)?;
            }
            Event::CData(_) => loader.add_markup(NodeKind::CData(inner(raw, 9, 3).to_string())),
            Event::Comment(_) => loader.add_markup(NodeKind::Comment(inner(raw, 4, 3).to_string())),
            Event::Decl(_) => loader.add_markup(NodeKind::Declaration(inner(raw, 2, 2).to_string())),
            Event::PI(_) => {
                loader.add_markup(NodeKind::ProcessingInstruction(inner(raw, 2, 2).to_string()))
            }
            Event::DocType(_) => loader.add_markup(NodeKind::DocType(inner(raw, 9, 1).to_string())),
            Event::Eof => break,
        }
    }

    if let Some((open, _)) = loader.stack.last() {
        let name = loader
            .document
            .name(*open)
            .map(|n| n.qualified())
            .unwrap_or_default();
        return Err(Error::xml_parse(format!(
            "Unexpected end of document; element '{}' is not closed",
            name
        )));
    }
    if loader.document.document_element().is_none() {
        return Err(Error::xml_parse("Root element is missing"));
    }
    Ok(loader.document)
}

/// Strip a markup construct's fixed-length opening and closing delimiters
fn inner(raw: &str, open: usize, close: usize) -> &str {
    raw.get(open..raw.len().saturating_sub(close)).unwrap_or("")
}

/// Attribute value normalization followed by reference expansion
fn attribute_value(raw_value: &str) -> std::result::Result<String, String> {
    let normalized = raw_value
        .replace("\r\n", " ")
        .replace(['\t', '\n', '\r'], " ");
    quick_xml::escape::unescape(&normalized)
        .map(|v| v.into_owned())
        .map_err(|e| e.to_string())
}

impl<'a> Loader<'a> {
    fn parent(&self) -> NodeId {
        self.stack
            .last()
            .map(|(id, _)| *id)
            .unwrap_or_else(|| self.document.root())
    }

    fn location(&self, offset: usize) -> SourceLocation {
        let (line, column) = self.lines.locate(offset);
        SourceLocation::new(self.options.file.clone(), line, column)
    }

    fn error_at(&self, offset: usize, message: String) -> Error {
        let (line, column) = self.lines.locate(offset);
        Error::xml_parse(format!("{} (line {}, column {})", message, line, column))
    }

    fn resolve(&self, prefix: &str, local_decls: &[(String, String)]) -> Option<String> {
        match prefix {
            "xml" => return Some(XML_NAMESPACE.to_string()),
            "xmlns" => return Some(XMLNS_NAMESPACE.to_string()),
            _ => {}
        }
        local_decls
            .iter()
            .rev()
            .chain(self.stack.iter().rev().flat_map(|(_, decls)| decls.iter().rev()))
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone())
            .filter(|uri| !uri.is_empty())
    }

    fn open_element(&mut self, start: &BytesStart<'_>, raw: &str, offset: usize, empty: bool) -> Result<()> {
        for attr in start.attributes() {
            attr.map_err(|e| self.error_at(offset, e.to_string()))?;
        }
        let tag_offset = offset + raw.find('<').unwrap_or(0);
        let tag = &raw[tag_offset - offset..];
        let scanned = scan_start_tag(tag)
            .ok_or_else(|| self.error_at(tag_offset, "Malformed start tag".to_string()))?;

        let mut values = Vec::with_capacity(scanned.attributes.len());
        let mut decls = Vec::new();
        for attr in &scanned.attributes {
            let value = attribute_value(&attr.raw_value).map_err(|e| self.error_at(tag_offset, e))?;
            if attr.name == "xmlns" {
                decls.push((String::new(), value.clone()));
            } else if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
                decls.push((prefix.to_string(), value.clone()));
            }
            values.push(value);
        }

        let name = self.qualify(&scanned.name, &decls, true, tag_offset)?;
        let (tag_line, tag_column) = self.lines.locate(tag_offset);
        let mut attributes = Vec::with_capacity(values.len());
        for (attr, value) in scanned.attributes.iter().zip(values) {
            let attr_name = self.qualify(&attr.name, &decls, false, tag_offset)?;
            let (line, column) = if attr.line == 1 {
                (tag_line, tag_column + attr.column - 1)
            } else {
                (tag_line + attr.line - 1, attr.column)
            };
            let location = SourceLocation::new(self.options.file.clone(), line, column);
            attributes.push(Attribute::parsed(attr_name, value, attr.raw.clone(), Some(location)));
        }

        let preservation = self
            .options
            .preserve_whitespace
            .then(|| AttributePreservation::capture(tag));
        let element = Element::loaded(
            name,
            attributes,
            empty,
            Some(self.location(tag_offset + 1)),
            preservation,
        );

        let parent = self.parent();
        if parent == self.document.root() && self.document.document_element().is_some() {
            return Err(self.error_at(tag_offset, "Multiple root elements".to_string()));
        }
        let id = self.document.push_loaded(parent, NodeKind::Element(element));
        if !empty {
            self.stack.push((id, decls));
        }
        Ok(())
    }

    fn qualify(&self, raw: &str, decls: &[(String, String)], element: bool, offset: usize) -> Result<QName> {
        match raw.split_once(':') {
            Some((prefix, local)) => {
                let namespace = self
                    .resolve(prefix, decls)
                    .ok_or_else(|| self.error_at(offset, format!("Prefix '{}' is not declared", prefix)))?;
                Ok(QName::new(Some(prefix.to_string()), local, Some(namespace)))
            }
            None if raw == "xmlns" => Ok(QName::new(None, raw, Some(XMLNS_NAMESPACE.to_string()))),
            // Unprefixed attributes are in no namespace.
            None if !element => Ok(QName::local(raw)),
            None => Ok(QName::new(None, raw, self.resolve("", decls))),
        }
    }

    fn add_text(&mut self, value: String, raw: &str, offset: usize) -> Result<()> {
        let whitespace = value.chars().all(char::is_whitespace);
        let parent = self.parent();
        if parent == self.document.root() && !whitespace {
            return Err(self.error_at(offset, "Text is not allowed outside the root element".to_string()));
        }
        if whitespace && !self.options.preserve_whitespace {
            return Ok(());
        }
        self.document.push_loaded(
            parent,
            NodeKind::Text {
                value,
                raw: Some(raw.to_string()),
            },
        );
        Ok(())
    }

    fn add_markup(&mut self, kind: NodeKind) {
        let parent = self.parent();
        self.document.push_loaded(parent, kind);
    }
}
