//! Per-instruction state while walking the transform document

use std::cell::{Cell, OnceCell};

use xdt_dom::{Attribute, Document, NodeId, QName, TransformableDocument};
use xdt_traits::{NamespaceBindings, Result, SourceLocation, DEFAULT_NAMESPACE_PREFIX, TRANSFORM_NAMESPACE};

use crate::arguments::Directive;
use crate::locator::{Locator, LocatorBinding};
use crate::locators::DefaultLocator;
use crate::registry::NamedTypeRegistry;
use crate::transform::Transform;

pub const TRANSFORM_ATTRIBUTE: &str = "Transform";
pub const LOCATOR_ATTRIBUTE: &str = "Locator";
pub const SUPPRESS_WARNINGS_ATTRIBUTE: &str = "SupressWarnings";

/// A transform resolved from an `xdt:Transform` directive
pub struct ResolvedTransform {
    pub transform: Box<dyn Transform>,
    pub name: String,
    pub arguments: Option<String>,
}

/// Where the search for targets came up empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTarget {
    /// Address of the outermost instruction that matched nothing
    pub path: String,
    pub location: Option<SourceLocation>,
    /// Whether the address matched before any transform ran
    pub existed_in_original: bool,
}

impl MissingTarget {
    pub fn message(&self) -> String {
        if self.existed_in_original {
            format!(
                "Target '{}' matched the source document before transforms ran, but the matching elements were removed",
                self.path
            )
        } else {
            format!("No element in the source document matches '{}'", self.path)
        }
    }
}

/// One element of the transform document, seen from the walk.
///
/// Addresses and target sets are computed on first use and kept for the rest
/// of the run; children borrow their parent context to extend its address.
pub struct ElementContext<'a> {
    parent: Option<&'a ElementContext<'a>>,
    document: &'a Document,
    registry: &'a NamedTypeRegistry,
    element: NodeId,
    namespaces: OnceCell<NamespaceBindings>,
    path: OnceCell<String>,
    parent_path: OnceCell<String>,
    target_nodes: OnceCell<Vec<NodeId>>,
    target_parents: OnceCell<Vec<NodeId>>,
    transform_node: Cell<Option<NodeId>>,
}

impl<'a> ElementContext<'a> {
    pub fn new(
        parent: Option<&'a ElementContext<'a>>,
        document: &'a Document,
        registry: &'a NamedTypeRegistry,
        element: NodeId,
    ) -> Self {
        Self {
            parent,
            document,
            registry,
            element,
            namespaces: OnceCell::new(),
            path: OnceCell::new(),
            parent_path: OnceCell::new(),
            target_nodes: OnceCell::new(),
            target_parents: OnceCell::new(),
            transform_node: Cell::new(None),
        }
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn parent(&self) -> Option<&'a ElementContext<'a>> {
        self.parent
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.document.location(self.element)
    }

    pub fn name(&self) -> String {
        self.document.name(self.element).map(QName::qualified).unwrap_or_default()
    }

    /// A directive attribute (`xdt:<local>`) of this element
    pub fn directive(&self, local: &str) -> Option<&Attribute> {
        self.document
            .element(self.element)
            .and_then(|e| e.attribute_ns(local, Some(TRANSFORM_NAMESPACE)))
    }

    pub fn transform_attribute(&self) -> Option<&Attribute> {
        self.directive(TRANSFORM_ATTRIBUTE)
    }

    /// Location diagnostics about the transform are reported at
    pub fn transform_location(&self) -> Option<&SourceLocation> {
        self.transform_attribute()
            .and_then(Attribute::location)
            .or_else(|| self.location())
    }

    /// Prefix bindings in scope at this element, with the default namespace
    /// bound to the reserved prefix
    pub fn namespaces(&self) -> &NamespaceBindings {
        self.namespaces.get_or_init(|| {
            let mut bindings = NamespaceBindings::new();
            for (prefix, uri) in self.document.in_scope_namespaces(self.element) {
                if prefix.is_empty() {
                    bindings.add(DEFAULT_NAMESPACE_PREFIX, uri);
                } else {
                    bindings.add(prefix, uri);
                }
            }
            bindings
        })
    }

    /// Resolve the `xdt:Transform` directive, if any
    pub fn construct_transform(&self) -> Result<Option<ResolvedTransform>> {
        let Some(attr) = self.transform_attribute() else {
            return Ok(None);
        };
        let resolve = || -> Result<ResolvedTransform> {
            let directive = Directive::parse(attr.value())?;
            let transform = self.registry.construct_transform(&directive.name)?;
            Ok(ResolvedTransform {
                transform,
                name: directive.name,
                arguments: directive.arguments,
            })
        };
        resolve().map(Some).map_err(|e| e.at_node(attr.location().cloned()))
    }

    fn create_locator(&self) -> Result<(Box<dyn Locator>, String, Option<String>)> {
        let Some(attr) = self.directive(LOCATOR_ATTRIBUTE) else {
            return Ok((Box::new(DefaultLocator), "DefaultLocator".to_string(), None));
        };
        let resolve = || -> Result<(Box<dyn Locator>, String, Option<String>)> {
            let directive = Directive::parse(attr.value())?;
            let locator = self.registry.construct_locator(&directive.name)?;
            Ok((locator, directive.name, directive.arguments))
        };
        resolve().map_err(|e| e.at_node(attr.location().cloned()))
    }

    fn with_locator<T>(&self, build: impl FnOnce(&dyn Locator, &LocatorBinding<'_>) -> Result<T>) -> Result<T> {
        let parent_path = match self.parent {
            Some(parent) => parent.path()?,
            None => "",
        };
        let (locator, name, arguments) = self.create_locator()?;
        let binding = LocatorBinding::new(&name, parent_path, self.document, self.element, arguments.as_deref());
        build(locator.as_ref(), &binding).map_err(|e| e.at_node(self.location().cloned()))
    }

    /// Target address of this element
    pub fn path(&self) -> Result<&str> {
        if let Some(path) = self.path.get() {
            return Ok(path);
        }
        let path = self.with_locator(|locator, binding| locator.construct_path(binding))?;
        log::trace!("{} -> {}", self.name(), path);
        Ok(self.path.get_or_init(|| path))
    }

    /// Address used by transforms that operate on the parent of the match
    pub fn parent_path(&self) -> Result<&str> {
        if let Some(path) = self.parent_path.get() {
            return Ok(path);
        }
        let path = self.with_locator(|locator, binding| locator.construct_parent_path(binding))?;
        Ok(self.parent_path.get_or_init(|| path))
    }

    pub fn target_nodes(&self, target: &Document) -> Result<&[NodeId]> {
        if let Some(nodes) = self.target_nodes.get() {
            return Ok(nodes);
        }
        let nodes = target.select_node_ids(self.path()?, self.namespaces())?;
        Ok(self.target_nodes.get_or_init(|| nodes))
    }

    /// Matches of the parent address; empty at the top level
    pub fn target_parents(&self, target: &Document) -> Result<&[NodeId]> {
        if let Some(nodes) = self.target_parents.get() {
            return Ok(nodes);
        }
        let nodes = match self.parent {
            Some(_) => target.select_node_ids(self.parent_path()?, self.namespaces())?,
            None => Vec::new(),
        };
        Ok(self.target_parents.get_or_init(|| nodes))
    }

    /// `None` when this element has target nodes, otherwise where the search
    /// first failed on the way down
    pub fn missing_target_node(&self, target: &TransformableDocument) -> Result<Option<MissingTarget>> {
        if !self.target_nodes(target)?.is_empty() {
            return Ok(None);
        }
        let mut failed = self;
        while let Some(parent) = failed.parent {
            if !parent.target_nodes(target)?.is_empty() {
                break;
            }
            failed = parent;
        }
        self.describe_missing(failed, target).map(Some)
    }

    /// Like [`missing_target_node`](Self::missing_target_node) for the parent
    /// address
    pub fn missing_target_parent(&self, target: &TransformableDocument) -> Result<Option<MissingTarget>> {
        if !self.target_parents(target)?.is_empty() {
            return Ok(None);
        }
        let mut failed = self;
        while let Some(parent) = failed.parent {
            if parent.parent_path()?.is_empty() || !parent.target_parents(target)?.is_empty() {
                break;
            }
            failed = parent;
        }
        self.describe_missing(failed, target).map(Some)
    }

    fn describe_missing(&self, failed: &ElementContext<'_>, target: &TransformableDocument) -> Result<MissingTarget> {
        let path = failed.path()?.to_string();
        let existed_in_original = target
            .select_original(&path, self.namespaces())?
            .is_some_and(|nodes| !nodes.is_empty());
        Ok(MissingTarget {
            path,
            location: failed.location().cloned(),
            existed_in_original,
        })
    }

    /// Copy of this element inside the target document, created on first use.
    ///
    /// Directive attributes and namespace declarations are dropped from the
    /// copy and the remaining attributes lose their prefixes.
    pub fn transform_node(&self, target: &mut Document) -> NodeId {
        if let Some(node) = self.transform_node.get() {
            return node;
        }
        let node = target.import_node(self.document, self.element);
        strip_directives(target, node);
        self.transform_node.set(Some(node));
        node
    }
}

fn strip_directives(target: &mut Document, node: NodeId) {
    let mut elements = vec![node];
    elements.extend(target.descendants(node));
    for element in elements {
        if !target.is_element(element) {
            continue;
        }
        target.rewrite_attributes(element, |name| {
            if name.is_namespace_declaration() || name.namespace.as_deref() == Some(TRANSFORM_NAMESPACE) {
                None
            } else {
                Some(QName::local(name.local.clone()))
            }
        });
    }
}
