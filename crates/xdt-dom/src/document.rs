//! Arena document tree with source provenance
//!
//! Nodes live in a single arena and are addressed by [`NodeId`]. Removing a
//! node only detaches it, so ids held by callers never dangle.

use xdt_traits::{Error, NodeType, Result, SourceLocation};

use crate::encoding::EncodingInfo;
use crate::format;
use crate::preservation::AttributePreservation;

/// Namespace URI bound to the `xmlns` prefix
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Namespace URI bound to the `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Handle to a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Qualified name with its resolved namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
}

impl QName {
    pub fn new(prefix: Option<String>, local: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()),
            local: local.into(),
            namespace: namespace.filter(|n| !n.is_empty()),
        }
    }

    /// Unprefixed name in no namespace
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(None, local, None)
    }

    /// Name as written in markup: `prefix:local` or `local`
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }

    /// Whether this attribute name is an `xmlns` or `xmlns:p` declaration
    pub fn is_namespace_declaration(&self) -> bool {
        match &self.prefix {
            Some(prefix) => prefix == "xmlns",
            None => self.local == "xmlns",
        }
    }

    /// Prefix declared by an `xmlns` attribute; `""` for the default namespace
    pub fn declared_prefix(&self) -> Option<&str> {
        match &self.prefix {
            Some(prefix) if prefix == "xmlns" => Some(&self.local),
            None if self.local == "xmlns" => Some(""),
            _ => None,
        }
    }

    pub fn matches(&self, local: &str, namespace: Option<&str>) -> bool {
        self.local == local && self.namespace.as_deref() == namespace
    }
}

/// An attribute of an element
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QName,
    value: String,
    raw: Option<String>,
    location: Option<SourceLocation>,
}

impl Attribute {
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
            raw: None,
            location: None,
        }
    }

    pub(crate) fn parsed(
        name: QName,
        value: String,
        raw: String,
        location: Option<SourceLocation>,
    ) -> Self {
        Self {
            name,
            value,
            raw: Some(raw),
            location,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Source text of the attribute (`name="value"`) while it is unchanged
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub fn qualified_name(&self) -> String {
        self.name.qualified()
    }

    pub(crate) fn set_value(&mut self, value: String) {
        if self.value != value {
            self.value = value;
            self.raw = None;
        }
    }
}

/// Element payload
#[derive(Debug, Clone)]
pub struct Element {
    pub name: QName,
    attributes: Vec<Attribute>,
    self_closing: bool,
    is_original: bool,
    location: Option<SourceLocation>,
    preservation: Option<AttributePreservation>,
}

impl Element {
    pub(crate) fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            self_closing: false,
            is_original: false,
            location: None,
            preservation: None,
        }
    }

    pub(crate) fn loaded(
        name: QName,
        attributes: Vec<Attribute>,
        self_closing: bool,
        location: Option<SourceLocation>,
        preservation: Option<AttributePreservation>,
    ) -> Self {
        Self {
            name,
            attributes,
            self_closing,
            is_original: true,
            location,
            preservation,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attribute by its name as written (`p:local` or `local`)
    pub fn attribute(&self, qualified: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name.qualified() == qualified)
    }

    /// Attribute by local name and namespace URI
    pub fn attribute_ns(&self, local: &str, namespace: Option<&str>) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name.matches(local, namespace))
    }

    /// Whether the element was written as `<name/>` in its source
    pub fn is_self_closing(&self) -> bool {
        self.self_closing
    }

    /// True iff the element existed when the document was first loaded
    pub fn is_original(&self) -> bool {
        self.is_original
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub fn preservation(&self) -> Option<&AttributePreservation> {
        self.preservation.as_ref()
    }

    pub(crate) fn preservation_mut(&mut self) -> Option<&mut AttributePreservation> {
        self.preservation.as_mut()
    }

    pub(crate) fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.name.qualified()).collect()
    }
}

/// Content of an arena node
#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text { value: String, raw: Option<String> },
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
    Declaration(String),
    DocType(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Mutable XML document tree
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    preserve_whitespace: bool,
    encoding: EncodingInfo,
    file: Option<String>,
}

impl Document {
    /// Create an empty document containing only the document node
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            preserve_whitespace: false,
            encoding: EncodingInfo::default(),
            file: None,
        }
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The single top-level element, if present
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&c| self.is_element(c))
    }

    /// Path of the file the document was loaded from
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn set_file(&mut self, file: Option<String>) {
        self.file = file;
    }

    /// Whether the document was loaded in formatting-preservation mode
    pub fn preserve_whitespace(&self) -> bool {
        self.preserve_whitespace
    }

    pub(crate) fn set_preserve_whitespace(&mut self, preserve: bool) {
        self.preserve_whitespace = preserve;
    }

    pub fn encoding(&self) -> &EncodingInfo {
        &self.encoding
    }

    pub fn set_encoding(&mut self, encoding: EncodingInfo) {
        self.encoding = encoding;
    }

    // ====== Navigation ======

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn node_type(&self, id: NodeId) -> NodeType {
        match self.kind(id) {
            NodeKind::Document => NodeType::Document,
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Text { .. } => NodeType::Text,
            NodeKind::CData(_) => NodeType::CData,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::ProcessingInstruction(_) => NodeType::ProcessingInstruction,
            NodeKind::Declaration(_) => NodeType::Declaration,
            NodeKind::DocType(_) => NodeType::DocType,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).iter().copied().filter(|&c| self.is_element(c))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element(_))
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn name(&self, id: NodeId) -> Option<&QName> {
        self.element(id).map(|e| &e.name)
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        self.element(id).map(|e| e.attributes()).unwrap_or(&[])
    }

    pub fn attribute(&self, id: NodeId, qualified: &str) -> Option<&Attribute> {
        self.element(id).and_then(|e| e.attribute(qualified))
    }

    pub fn attribute_value(&self, id: NodeId, qualified: &str) -> Option<&str> {
        self.attribute(id, qualified).map(|a| a.value())
    }

    pub fn location(&self, id: NodeId) -> Option<&SourceLocation> {
        self.element(id).and_then(|e| e.location())
    }

    /// Whitespace-only text node
    pub fn is_whitespace(&self, id: NodeId) -> bool {
        match self.kind(id) {
            NodeKind::Text { value, .. } => value.chars().all(char::is_whitespace),
            _ => false,
        }
    }

    /// True iff the node is an element that existed at first load
    pub fn is_original(&self, id: NodeId) -> bool {
        self.element(id).map(|e| e.is_original()).unwrap_or(false)
    }

    /// Whether `id` was added after load.
    ///
    /// Only elements are ever inserted by transforms, so any other node is new
    /// exactly when its containing element is.
    pub fn is_new_node(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(element) = self.element(node) {
                return !element.is_original();
            }
            current = self.parent(node);
        }
        false
    }

    /// Whether `id` is reachable from the document node
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root() {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// All descendants of `id` in document order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Concatenated text of all descendant text nodes
    pub fn string_value(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Text { value, .. } => value.clone(),
            NodeKind::CData(value) | NodeKind::Comment(value) => value.clone(),
            NodeKind::ProcessingInstruction(content) => pi_parts(content).1.to_string(),
            NodeKind::Declaration(_) | NodeKind::DocType(_) => String::new(),
            NodeKind::Document | NodeKind::Element(_) => {
                let mut out = String::new();
                for node in self.descendants(id) {
                    match self.kind(node) {
                        NodeKind::Text { value, .. } | NodeKind::CData(value) => out.push_str(value),
                        _ => {}
                    }
                }
                out
            }
        }
    }

    /// Resolve a prefix (`None` for the default namespace) visible at `id`
    pub fn lookup_namespace(&self, id: NodeId, prefix: Option<&str>) -> Option<String> {
        let wanted = prefix.unwrap_or("");
        match wanted {
            "xml" => return Some(XML_NAMESPACE.to_string()),
            "xmlns" => return Some(XMLNS_NAMESPACE.to_string()),
            _ => {}
        }
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(element) = self.element(node) {
                for attr in element.attributes() {
                    if attr.name.declared_prefix() == Some(wanted) {
                        return Some(attr.value().to_string()).filter(|v| !v.is_empty());
                    }
                }
            }
            current = self.parent(node);
        }
        None
    }

    /// Namespace declarations in scope at `id`, innermost first, as
    /// `(prefix, uri)` pairs with `""` for the default namespace
    pub fn in_scope_namespaces(&self, id: NodeId) -> Vec<(String, String)> {
        let mut seen: Vec<(String, String)> = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(element) = self.element(node) {
                for attr in element.attributes() {
                    if let Some(prefix) = attr.name.declared_prefix() {
                        if !seen.iter().any(|(p, _)| p == prefix) {
                            seen.push((prefix.to_string(), attr.value().to_string()));
                        }
                    }
                }
            }
            current = self.parent(node);
        }
        seen.retain(|(_, uri)| !uri.is_empty());
        seen
    }

    // ====== Construction ======

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub(crate) fn push_loaded(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.push(kind);
        self.nodes[id.0].parent = Some(parent);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Create a detached element. Created elements are never original.
    pub fn create_element(&mut self, name: QName) -> NodeId {
        self.push(NodeKind::Element(Element::new(name)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text {
            value: text.into(),
            raw: None,
        })
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(text.into()))
    }

    /// Deep copy of `node` from `other` as a detached subtree of this
    /// document. Provenance is kept; the copies are never original.
    pub fn import_node(&mut self, other: &Document, node: NodeId) -> NodeId {
        let copy = self.push(copied_kind(other.kind(node)));
        for &child in other.children(node) {
            if !self.preserve_whitespace && other.is_whitespace(child) {
                continue;
            }
            let child_copy = self.import_node(other, child);
            self.attach(copy, child_copy, None);
        }
        copy
    }

    /// Deep copy of a node of this document as a detached subtree
    pub fn clone_node(&mut self, node: NodeId) -> NodeId {
        let copy = self.push(copied_kind(self.kind(node)));
        let children = self.children(node).to_vec();
        for child in children {
            let child_copy = self.clone_node(child);
            self.attach(copy, child_copy, None);
        }
        copy
    }

    // ====== Tree mutation ======

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        if !matches!(self.kind(parent), NodeKind::Document | NodeKind::Element(_)) {
            return Err(Error::operation("Only elements and the document can have children"));
        }
        if self.parent(child).is_some() {
            return Err(Error::operation("Node is already part of the tree"));
        }
        let mut current = Some(parent);
        while let Some(node) = current {
            if node == child {
                return Err(Error::operation("A node cannot be inserted below itself"));
            }
            current = self.parent(node);
        }
        if parent == self.root() && self.is_element(child) && self.document_element().is_some() {
            return Err(Error::operation("The document already has a root element"));
        }
        Ok(())
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        let children = &mut self.nodes[parent.0].children;
        match index {
            Some(i) => children.insert(i, child),
            None => children.push(child),
        }
        self.nodes[child.0].parent = Some(parent);
    }

    fn index_in_parent(&self, node: NodeId) -> Result<(NodeId, usize)> {
        let parent = self
            .parent(node)
            .ok_or_else(|| Error::operation("Reference node has no parent"))?;
        let index = self
            .children(parent)
            .iter()
            .position(|&c| c == node)
            .ok_or_else(|| Error::operation("Tree links are inconsistent"))?;
        Ok((parent, index))
    }

    /// Append a detached node as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insertable(parent, child)?;
        self.attach(parent, child, None);
        Ok(())
    }

    /// Insert a detached node as the first child of `parent`
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insertable(parent, child)?;
        self.attach(parent, child, Some(0));
        Ok(())
    }

    /// Insert a detached node immediately before `reference`
    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) -> Result<()> {
        let (parent, index) = self.index_in_parent(reference)?;
        self.check_insertable(parent, child)?;
        self.attach(parent, child, Some(index));
        Ok(())
    }

    /// Insert a detached node immediately after `reference`
    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) -> Result<()> {
        let (parent, index) = self.index_in_parent(reference)?;
        self.check_insertable(parent, child)?;
        self.attach(parent, child, Some(index + 1));
        Ok(())
    }

    /// Put a detached node where `old` is and detach `old`
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let (parent, index) = self.index_in_parent(old)?;
        if self.parent(new).is_some() {
            return Err(Error::operation("Node is already part of the tree"));
        }
        self.nodes[parent.0].children[index] = new;
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
        Ok(())
    }

    /// Detach a node from its parent. The node and its subtree stay valid.
    pub fn detach(&mut self, node: NodeId) {
        if let Ok((parent, index)) = self.index_in_parent(node) {
            self.nodes[parent.0].children.remove(index);
            self.nodes[node.0].parent = None;
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) -> Result<()> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Text { value, raw } => {
                *value = text.into();
                *raw = None;
                Ok(())
            }
            _ => Err(Error::operation("Node is not a text node")),
        }
    }

    // ====== Attribute mutation ======

    /// Set an attribute, replacing the value of an existing one with the same
    /// local name and namespace
    pub fn set_attribute(&mut self, element: NodeId, name: QName, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        let target = self
            .element_mut(element)
            .ok_or_else(|| Error::operation("Attributes can only be set on elements"))?;
        let existing = target
            .attributes
            .iter_mut()
            .find(|a| a.name.matches(&name.local, name.namespace.as_deref()));
        match existing {
            Some(attr) => attr.set_value(value),
            None => target.attributes.push(Attribute::new(name, value)),
        }
        self.attributes_changed(element);
        Ok(())
    }

    /// Remove an attribute by the name it is written with
    pub fn remove_attribute(&mut self, element: NodeId, qualified: &str) -> bool {
        let Some(target) = self.element_mut(element) else {
            return false;
        };
        let before = target.attributes.len();
        target.attributes.retain(|a| a.name.qualified() != qualified);
        let removed = target.attributes.len() != before;
        if removed {
            self.attributes_changed(element);
        }
        removed
    }

    /// Remove every attribute of an element
    pub fn clear_attributes(&mut self, element: NodeId) {
        if let Some(target) = self.element_mut(element) {
            target.attributes.clear();
            self.attributes_changed(element);
        }
    }

    /// Rename or drop attributes of `element`. `rename` returns the new name,
    /// or `None` to remove the attribute. Renamed attributes lose their
    /// source text.
    pub fn rewrite_attributes(&mut self, element: NodeId, mut rename: impl FnMut(&QName) -> Option<QName>) {
        let Some(target) = self.element_mut(element) else {
            return;
        };
        let mut changed = false;
        let attributes = std::mem::take(&mut target.attributes);
        for mut attr in attributes {
            match rename(&attr.name) {
                Some(name) => {
                    if name != attr.name {
                        attr.name = name;
                        attr.raw = None;
                        changed = true;
                    }
                    target.attributes.push(attr);
                }
                None => changed = true,
            }
        }
        if changed {
            self.attributes_changed(element);
        }
    }

    pub(crate) fn attributes_changed(&mut self, element: NodeId) {
        if !self.preserve_whitespace {
            return;
        }
        let indent = format::default_attribute_indent(self, element);
        if let Some(target) = self.element_mut(element) {
            let names = target.attribute_names();
            if let Some(record) = target.preservation_mut() {
                record.reconcile(names.iter().map(String::as_str), &indent);
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn copied_kind(kind: &NodeKind) -> NodeKind {
    match kind {
        NodeKind::Element(element) => NodeKind::Element(Element {
            name: element.name.clone(),
            attributes: element.attributes.clone(),
            self_closing: element.self_closing,
            is_original: false,
            location: element.location.clone(),
            preservation: None,
        }),
        other => other.clone(),
    }
}

/// Split processing instruction content into target and data
pub(crate) fn pi_parts(content: &str) -> (&str, &str) {
    let content = content.trim_start();
    match content.find(char::is_whitespace) {
        Some(i) => (&content[..i], content[i..].trim_start()),
        None => (content, ""),
    }
}
