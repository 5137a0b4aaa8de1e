//! Serialization of documents
//!
//! Two writers exist: the preserving writer reproduces source text for
//! everything that was not touched, and the indenting writer lays the tree out
//! from scratch with two-space indentation.

use std::io::Write;
use std::path::Path;

use xdt_traits::Result;

use crate::document::{Attribute, Document, Element, NodeId, NodeKind};
use crate::encoding;
use crate::format;

const INDENT: &str = "  ";

impl Document {
    /// Serialize to a string. Preservation-mode documents are formatted
    /// first, which reconciles attribute layout and indents new elements.
    pub fn to_xml_string(&mut self) -> String {
        if self.preserve_whitespace() {
            format::format(self);
            write_preserving(self)
        } else {
            write_indented(self)
        }
    }

    /// Serialize into `writer` using the encoding detected at load
    pub fn save_to_writer<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        let text = self.to_xml_string();
        let bytes = encoding::encode(&text, *self.encoding())?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize to a file, replacing it if it exists
    pub fn save_to_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        log::debug!("saving {}", path.display());
        let mut file = std::fs::File::create(path)?;
        self.save_to_writer(&mut file)
    }
}

/// Escape character data
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value for a double-quoted attribute
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            '\t' => out.push_str("&#x9;"),
            _ => out.push(c),
        }
    }
    out
}

fn attribute_text(attr: &Attribute) -> String {
    match attr.raw() {
        Some(raw) => raw.to_string(),
        None => format!("{}=\"{}\"", attr.qualified_name(), escape_attribute(attr.value())),
    }
}

/// Namespace bindings visible while writing, used to give elements created
/// from another document a prefix that is valid at their new position
#[derive(Default)]
struct Scopes {
    stack: Vec<Vec<(String, String)>>,
}

impl Scopes {
    fn lookup(&self, prefix: &str) -> Option<&str> {
        self.stack
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.stack
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(p, u)| u == uri && self.lookup(p) == Some(uri))
            .map(|(p, _)| p.as_str())
    }

    /// Open a scope for `element`; returns its written name and a namespace
    /// declaration to add when its namespace is not bound here
    fn open(&mut self, element: &Element) -> (String, Option<String>) {
        let declared: Vec<(String, String)> = element
            .attributes()
            .iter()
            .filter_map(|a| a.name.declared_prefix().map(|p| (p.to_string(), a.value().to_string())))
            .collect();
        self.stack.push(declared);

        let name = &element.name;
        let own_prefix = name.prefix.clone().unwrap_or_default();
        match &name.namespace {
            Some(uri) => {
                if self.lookup(&own_prefix) == Some(uri.as_str()) {
                    return (name.qualified(), None);
                }
                if let Some(prefix) = self.prefix_for(uri).map(str::to_string) {
                    let written = if prefix.is_empty() {
                        name.local.clone()
                    } else {
                        format!("{}:{}", prefix, name.local)
                    };
                    return (written, None);
                }
                let decl = if own_prefix.is_empty() {
                    format!("xmlns=\"{}\"", escape_attribute(uri))
                } else {
                    format!("xmlns:{}=\"{}\"", own_prefix, escape_attribute(uri))
                };
                if let Some(scope) = self.stack.last_mut() {
                    scope.push((own_prefix, uri.clone()));
                }
                (name.qualified(), Some(decl))
            }
            None => {
                let default_bound = self.lookup("").is_some_and(|uri| !uri.is_empty());
                if name.prefix.is_none() && default_bound {
                    if let Some(scope) = self.stack.last_mut() {
                        scope.push((String::new(), String::new()));
                    }
                    return (name.qualified(), Some("xmlns=\"\"".to_string()));
                }
                (name.qualified(), None)
            }
        }
    }

    fn close(&mut self) {
        self.stack.pop();
    }
}

fn write_markup(out: &mut String, kind: &NodeKind) {
    match kind {
        NodeKind::CData(text) => {
            out.push_str("<![CDATA[");
            out.push_str(text);
            out.push_str("]]>");
        }
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction(content) | NodeKind::Declaration(content) => {
            out.push_str("<?");
            out.push_str(content);
            out.push_str("?>");
        }
        NodeKind::DocType(content) => {
            out.push_str("<!DOCTYPE");
            out.push_str(content);
            out.push('>');
        }
        NodeKind::Text { value, raw } => match raw {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&escape_text(value)),
        },
        NodeKind::Document | NodeKind::Element(_) => {}
    }
}

// ====== Preserving writer ======

/// Write the document reproducing source text wherever nodes are unchanged
pub fn write_preserving(doc: &Document) -> String {
    let mut writer = PreservingWriter {
        doc,
        out: String::new(),
        scopes: Scopes::default(),
    };
    for &child in doc.children(doc.root()) {
        writer.write_node(child);
    }
    writer.out
}

struct PreservingWriter<'a> {
    doc: &'a Document,
    out: String,
    scopes: Scopes,
}

impl<'a> PreservingWriter<'a> {
    fn write_node(&mut self, id: NodeId) {
        match self.doc.kind(id) {
            NodeKind::Element(element) => self.write_element(id, element),
            NodeKind::Document => {
                for &child in self.doc.children(id) {
                    self.write_node(child);
                }
            }
            other => write_markup(&mut self.out, other),
        }
    }

    fn write_element(&mut self, id: NodeId, element: &Element) {
        let (name, decl) = self.scopes.open(element);
        self.out.push('<');
        self.out.push_str(&name);

        let trailing = match element.preservation() {
            Some(record) => {
                let names = element.attribute_names();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                let (layout, trailing) = record.layout(&refs);
                for (space, attr_name) in layout {
                    if let Some(attr) = element.attribute(attr_name) {
                        self.out.push_str(space);
                        self.out.push_str(&attribute_text(attr));
                    }
                }
                Some(trailing.unwrap_or(""))
            }
            None => {
                for attr in element.attributes() {
                    self.out.push(' ');
                    self.out.push_str(&attribute_text(attr));
                }
                None
            }
        };
        if let Some(decl) = decl {
            self.out.push(' ');
            self.out.push_str(&decl);
        }

        let children = self.doc.children(id);
        // Inserted elements without content are written in the short form.
        if children.is_empty() && (element.is_self_closing() || !element.is_original()) {
            self.out.push_str(trailing.unwrap_or(" "));
            self.out.push_str("/>");
        } else {
            self.out.push_str(trailing.unwrap_or(""));
            self.out.push('>');
            for &child in children {
                self.write_node(child);
            }
            self.out.push_str("</");
            self.out.push_str(&name);
            self.out.push('>');
        }
        self.scopes.close();
    }
}

// ====== Indenting writer ======

/// Write the document laid out with two-space indentation
pub fn write_indented(doc: &Document) -> String {
    let mut writer = IndentingWriter {
        doc,
        out: String::new(),
        scopes: Scopes::default(),
    };
    let mut first = true;
    for &child in doc.children(doc.root()) {
        if doc.is_whitespace(child) {
            continue;
        }
        if !first {
            writer.out.push('\n');
        }
        first = false;
        writer.write_node(child, 0);
    }
    writer.out
}

struct IndentingWriter<'a> {
    doc: &'a Document,
    out: String,
    scopes: Scopes,
}

impl<'a> IndentingWriter<'a> {
    fn write_node(&mut self, id: NodeId, depth: usize) {
        match self.doc.kind(id) {
            NodeKind::Element(element) => self.write_element(id, element, depth),
            NodeKind::Text { value, .. } => self.out.push_str(&escape_text(value)),
            other => write_markup(&mut self.out, other),
        }
    }

    fn write_element(&mut self, id: NodeId, element: &Element, depth: usize) {
        let (name, decl) = self.scopes.open(element);
        self.out.push('<');
        self.out.push_str(&name);
        for attr in element.attributes() {
            self.out.push(' ');
            self.out.push_str(&format!(
                "{}=\"{}\"",
                attr.qualified_name(),
                escape_attribute(attr.value())
            ));
        }
        if let Some(decl) = decl {
            self.out.push(' ');
            self.out.push_str(&decl);
        }

        let children: Vec<NodeId> = self
            .doc
            .children(id)
            .iter()
            .copied()
            .filter(|&c| !self.doc.is_whitespace(c))
            .collect();
        if children.is_empty() {
            self.out.push_str(" />");
            self.scopes.close();
            return;
        }
        self.out.push('>');

        // Mixed content is written inline so text is not altered.
        let mixed = children
            .iter()
            .any(|&c| matches!(self.doc.kind(c), NodeKind::Text { .. } | NodeKind::CData(_)));
        for &child in &children {
            if !mixed {
                self.out.push('\n');
                self.out.push_str(&INDENT.repeat(depth + 1));
            }
            self.write_node(child, depth + 1);
        }
        if !mixed {
            self.out.push('\n');
            self.out.push_str(&INDENT.repeat(depth));
        }
        self.out.push_str("</");
        self.out.push_str(&name);
        self.out.push('>');
        self.scopes.close();
    }
}
