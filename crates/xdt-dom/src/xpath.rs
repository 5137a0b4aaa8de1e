//! XPath selection over [`Document`] through `xee-xpath`
//!
//! Each query mirrors the attached tree into an xee document. The query is
//! wrapped so every selected item comes back as a short string naming its
//! position, which [`Mirror::resolve`] maps onto the arena again.

use xee_xpath::context::StaticContextBuilder;
use xee_xpath::{Atomic, Documents, Item, Queries, Query};
use xdt_traits::{Error, NamespaceBindings, Result, XPathSelect};

use crate::document::{Document, NodeId, NodeKind, XML_NAMESPACE};
use crate::writer::{escape_attribute, escape_text};

/// A node as seen by XPath: an arena node or an attribute of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XNode {
    Node(NodeId),
    Attribute(NodeId, usize),
}

impl XNode {
    /// The arena node itself, or the element owning an attribute
    pub fn owner(self) -> NodeId {
        match self {
            XNode::Node(id) | XNode::Attribute(id, _) => id,
        }
    }

    /// The arena node, `None` for attributes
    pub fn node(self) -> Option<NodeId> {
        match self {
            XNode::Node(id) => Some(id),
            XNode::Attribute(..) => None,
        }
    }
}

/// Serialized copy of a document plus its elements in document order
struct Mirror {
    xml: String,
    elements: Vec<NodeId>,
}

impl Mirror {
    fn of(doc: &Document) -> Self {
        let mut mirror = Mirror {
            xml: String::new(),
            elements: Vec::new(),
        };
        for &child in doc.children(doc.root()) {
            mirror.write(doc, child, "");
        }
        mirror
    }

    /// Namespaces are redeclared from resolved names so that nodes moved in
    /// from another document never depend on declarations they left behind.
    fn write(&mut self, doc: &Document, id: NodeId, default_namespace: &str) {
        match doc.kind(id) {
            NodeKind::Element(element) => {
                self.elements.push(id);
                let namespace = element.name.namespace.as_deref().unwrap_or("");
                self.xml.push('<');
                self.xml.push_str(&element.name.local);
                if namespace != default_namespace {
                    self.xml.push_str(&format!(" xmlns=\"{}\"", escape_attribute(namespace)));
                }
                let mut declared = 0;
                for attribute in element.attributes() {
                    let name = &attribute.name;
                    if name.is_namespace_declaration() {
                        continue;
                    }
                    self.xml.push(' ');
                    match name.namespace.as_deref() {
                        None => {}
                        Some(XML_NAMESPACE) => self.xml.push_str("xml:"),
                        Some(uri) => {
                            declared += 1;
                            self.xml
                                .push_str(&format!("xmlns:a{0}=\"{1}\" a{0}:", declared, escape_attribute(uri)));
                        }
                    }
                    self.xml.push_str(&name.local);
                    self.xml.push_str(&format!("=\"{}\"", escape_attribute(attribute.value())));
                }
                let children = doc.children(id);
                if children.is_empty() {
                    self.xml.push_str("/>");
                    return;
                }
                self.xml.push('>');
                for &child in children {
                    self.write(doc, child, namespace);
                }
                self.xml.push_str("</");
                self.xml.push_str(&element.name.local);
                self.xml.push('>');
            }
            NodeKind::Text { value, .. } | NodeKind::CData(value) => self.xml.push_str(&escape_text(value)),
            NodeKind::Comment(text) if !text.contains("--") && !text.ends_with('-') => {
                self.xml.push_str(&format!("<!--{}-->", text));
            }
            NodeKind::ProcessingInstruction(content) if !content.contains("?>") => {
                self.xml.push_str(&format!("<?{}?>", content));
            }
            _ => {}
        }
    }

    /// Expression selecting `node` in the mirrored document
    fn address(&self, doc: &Document, node: XNode) -> Result<String> {
        if node == XNode::Node(doc.root()) {
            return Ok("/".to_string());
        }
        let element = node.owner();
        let position = self
            .elements
            .iter()
            .position(|&e| e == element)
            .ok_or_else(|| Error::xpath_eval("context node is not attached to the document"))?;
        match node {
            XNode::Node(_) => Ok(format!("(/descendant::*)[{}]", position + 1)),
            XNode::Attribute(_, index) => {
                let nth = doc
                    .attributes(element)
                    .iter()
                    .take(index)
                    .filter(|a| !a.name.is_namespace_declaration())
                    .count();
                Ok(format!("(/descendant::*)[{}]/@*[{}]", position + 1, nth + 1))
            }
        }
    }

    /// Map one rendered item (see [`classify`]) back onto the arena
    fn resolve(&self, doc: &Document, rendered: &str, xpath: &str) -> Result<XNode> {
        let mut parts = rendered.splitn(4, ' ');
        let kind = parts.next().unwrap_or_default();
        let element = |position: Option<&str>| {
            position
                .and_then(|p| p.parse::<usize>().ok())
                .and_then(|p| self.elements.get(p).copied())
                .ok_or_else(|| Error::xpath_eval(format!("'{}' selected a node outside the document", xpath)))
        };
        match kind {
            "d" => Ok(XNode::Node(doc.root())),
            "e" => element(parts.next()).map(XNode::Node),
            "a" => {
                let owner = element(parts.next())?;
                let namespace = parts.next().filter(|ns| !ns.is_empty());
                let local = parts.next().unwrap_or_default();
                doc.attributes(owner)
                    .iter()
                    .position(|a| !a.name.is_namespace_declaration() && a.name.matches(local, namespace))
                    .map(|index| XNode::Attribute(owner, index))
                    .ok_or_else(|| Error::xpath_eval(format!("'{}' selected an unknown attribute '{}'", xpath, local)))
            }
            "o" => Err(Error::xpath_eval(format!(
                "'{}' selects text, comment or processing-instruction nodes, which cannot be addressed",
                xpath
            ))),
            _ => Err(Error::xpath_eval(format!("'{}' does not select nodes", xpath))),
        }
    }
}

/// Wrap `select`, evaluated from `context`, so each item renders as
/// `d`, `e <element>`, `a <owner> <namespace> <local>`, `o` or `v`
fn classify(context: &str, select: &str) -> String {
    format!(
        "for $n in (({}) ! ({})) return \
         if ($n instance of document-node()) then 'd' \
         else if ($n instance of element()) then \
           concat('e ', count($n/preceding::*) + count($n/ancestor::*)) \
         else if ($n instance of attribute()) then \
           concat('a ', count($n/../preceding::*) + count($n/../ancestor::*), ' ', namespace-uri($n), ' ', local-name($n)) \
         else if ($n instance of node()) then 'o' \
         else 'v'",
        context, select
    )
}

impl Document {
    /// Select nodes with the document node as context
    pub fn select(&self, xpath: &str, namespaces: &NamespaceBindings) -> Result<Vec<XNode>> {
        self.select_from(XNode::Node(self.root()), xpath, namespaces)
    }

    /// Select nodes relative to `context`
    pub fn select_from(&self, context: XNode, xpath: &str, namespaces: &NamespaceBindings) -> Result<Vec<XNode>> {
        let mirror = Mirror::of(self);
        let query_text = classify(&mirror.address(self, context)?, xpath);

        let mut static_context = StaticContextBuilder::default();
        static_context.namespaces(namespaces.iter());
        let queries = Queries::new(static_context);
        let query = queries
            .sequence(&query_text)
            .map_err(|e| Error::xpath_compile(format!("'{}': {:?}", xpath, e)))?;

        let mut documents = Documents::new();
        let handle = documents
            .add_string_without_uri(&mirror.xml)
            .map_err(|e| Error::xpath_eval(format!("{:?}", e)))?;
        let sequence = query
            .execute(&mut documents, handle)
            .map_err(|e| Error::xpath_eval(format!("'{}': {:?}", xpath, e)))?;

        let mut nodes = Vec::new();
        for item in sequence.iter() {
            match item {
                Item::Atomic(Atomic::String(_, rendered)) => nodes.push(mirror.resolve(self, &rendered, xpath)?),
                _ => return Err(Error::xpath_eval(format!("'{}' does not select nodes", xpath))),
            }
        }
        log::trace!("'{}' selected {} node(s)", xpath, nodes.len());
        Ok(nodes)
    }

    /// Select elements; an expression that reaches attributes is an error
    pub fn select_node_ids(&self, xpath: &str, namespaces: &NamespaceBindings) -> Result<Vec<NodeId>> {
        self.select(xpath, namespaces)?
            .into_iter()
            .map(|node| match node {
                XNode::Node(id) => Ok(id),
                XNode::Attribute(..) => Err(Error::xpath_eval(format!(
                    "'{}' selects attributes, but only elements can be targeted",
                    xpath
                ))),
            })
            .collect()
    }
}

impl XPathSelect for Document {
    type Node = XNode;

    fn select_nodes(&self, xpath: &str, namespaces: &NamespaceBindings) -> Result<Vec<XNode>> {
        self.select(xpath, namespaces)
    }

    fn select_nodes_from(&self, context: XNode, xpath: &str, namespaces: &NamespaceBindings) -> Result<Vec<XNode>> {
        self.select_from(context, xpath, namespaces)
    }
}
