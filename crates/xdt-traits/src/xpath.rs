//! XPath selection abstraction

use std::collections::BTreeMap;

use crate::error::Result;

/// Prefix under which an instruction element's default namespace is bound.
///
/// Addresses never rely on a default element namespace, so unprefixed names
/// in a namespaced transform are rewritten to use this prefix.
pub const DEFAULT_NAMESPACE_PREFIX: &str = "_defaultNamespace";

/// Prefix to namespace URI bindings used while evaluating an expression
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceBindings {
    bindings: BTreeMap<String, String>,
}

impl NamespaceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a prefix, replacing an earlier binding of the same prefix
    pub fn add(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.bindings.insert(prefix.into(), uri.into());
    }

    /// Look up the URI bound to a prefix
    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }
}

/// Trait for trees that can answer XPath node selections.
///
/// The transform engine queries both the live target document and its
/// pre-edit snapshot through this trait.
pub trait XPathSelect {
    /// Handle to a node of this tree
    type Node: Copy;

    /// Evaluate `xpath` with the document node as context
    fn select_nodes(&self, xpath: &str, namespaces: &NamespaceBindings) -> Result<Vec<Self::Node>>;

    /// Evaluate `xpath` relative to `context`
    fn select_nodes_from(
        &self,
        context: Self::Node,
        xpath: &str,
        namespaces: &NamespaceBindings,
    ) -> Result<Vec<Self::Node>>;

    /// Check whether `xpath` selects anything
    fn matches_any(&self, xpath: &str, namespaces: &NamespaceBindings) -> Result<bool> {
        Ok(!self.select_nodes(xpath, namespaces)?.is_empty())
    }
}
