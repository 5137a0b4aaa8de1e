//! Path locators
//!
//! A locator turns an instruction element of the transform document into an
//! XPath address in the target document. The address is built step by step
//! from the parent instruction's address, so nested instructions describe a
//! path from the root down.

use std::cell::OnceCell;

use xdt_dom::{Document, NodeId, QName};
use xdt_traits::{ArgumentBound, Error, Result, DEFAULT_NAMESPACE_PREFIX};

use crate::arguments::split_arguments;

/// XPath axis of an appended step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    Parent,
    Ancestor,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    SelfAxis,
    DescendantOrSelf,
    AncestorOrSelf,
}

impl Axis {
    /// Text written in front of the node test
    pub fn prefix(self) -> &'static str {
        match self {
            Axis::Child => "",
            Axis::Descendant => "descendant::",
            Axis::Parent => "parent::",
            Axis::Ancestor => "ancestor::",
            Axis::FollowingSibling => "following-sibling::",
            Axis::PrecedingSibling => "preceding-sibling::",
            Axis::Following => "following::",
            Axis::Preceding => "preceding::",
            Axis::SelfAxis => "self::",
            Axis::DescendantOrSelf => "/",
            Axis::AncestorOrSelf => "ancestor-or-self::",
        }
    }
}

/// Append one location step to `base`.
///
/// ```
/// use xdt_engine::locator::{append_step, Axis};
///
/// assert_eq!(append_step("/a", Axis::Child, "b", "@k='1'"), "/a/b[@k='1']");
/// assert_eq!(append_step("/a/", Axis::Parent, "*", ""), "/a/parent::*");
/// ```
pub fn append_step(base: &str, axis: Axis, node_test: &str, predicate: &str) -> String {
    let mut path = String::with_capacity(base.len() + node_test.len() + predicate.len() + 4);
    path.push_str(base);
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(axis.prefix());
    path.push_str(node_test);
    if !predicate.is_empty() {
        if predicate.starts_with('[') {
            path.push_str(predicate);
        } else {
            path.push('[');
            path.push_str(predicate);
            path.push(']');
        }
    }
    path
}

/// Node test naming `name` the way the transform document wrote it.
///
/// Elements in a default namespace have no prefix in markup, so they get the
/// reserved prefix bound to that namespace during evaluation.
pub fn node_test_for(name: &QName) -> String {
    match (&name.prefix, &name.namespace) {
        (None, Some(_)) => format!("{}:{}", DEFAULT_NAMESPACE_PREFIX, name.local),
        _ => name.qualified(),
    }
}

/// Everything a locator may look at while building one path.
///
/// Lives for a single call; the split argument list is computed on first use.
pub struct LocatorBinding<'a> {
    name: &'a str,
    parent_path: &'a str,
    document: &'a Document,
    element: NodeId,
    argument_string: Option<&'a str>,
    arguments: OnceCell<Vec<String>>,
}

impl<'a> LocatorBinding<'a> {
    pub fn new(
        name: &'a str,
        parent_path: &'a str,
        document: &'a Document,
        element: NodeId,
        argument_string: Option<&'a str>,
    ) -> Self {
        Self {
            name,
            parent_path,
            document,
            element,
            argument_string,
            arguments: OnceCell::new(),
        }
    }

    /// Name the locator was requested by, used in error messages
    pub fn name(&self) -> &str {
        self.name
    }

    /// Address of the parent instruction; empty at the top of the document
    pub fn parent_path(&self) -> &str {
        self.parent_path
    }

    pub fn document(&self) -> &Document {
        self.document
    }

    /// The instruction element in the transform document
    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn element_name(&self) -> Option<&QName> {
        self.document.name(self.element)
    }

    /// Value of an attribute of the instruction element, by written name
    pub fn attribute_value(&self, qualified: &str) -> Option<&str> {
        self.document.attribute_value(self.element, qualified)
    }

    pub fn argument_string(&self) -> Option<&str> {
        self.argument_string
    }

    pub fn arguments(&self) -> Result<&[String]> {
        if let Some(arguments) = self.arguments.get() {
            return Ok(arguments);
        }
        let arguments = match self.argument_string {
            Some(text) => split_arguments(text)?,
            None => Vec::new(),
        };
        Ok(self.arguments.get_or_init(|| arguments))
    }

    /// Node test for the instruction element itself
    pub fn default_node_test(&self) -> String {
        self.element_name().map(node_test_for).unwrap_or_default()
    }

    /// Arguments, requiring at least `min` of them
    pub fn ensure_arguments(&self, min: usize) -> Result<&[String]> {
        let arguments = self.arguments()?;
        if arguments.len() < min {
            return Err(self.count_error(ArgumentBound::AtLeast(min)));
        }
        Ok(arguments)
    }

    /// Arguments, requiring between `min` and `max` of them
    pub fn ensure_arguments_between(&self, min: usize, max: usize) -> Result<&[String]> {
        let arguments = self.arguments()?;
        let count = arguments.len();
        if min == max && count != min {
            return Err(self.count_error(ArgumentBound::Exactly(min)));
        }
        if count < min {
            return Err(self.count_error(ArgumentBound::AtLeast(min)));
        }
        if count > max {
            return Err(self.count_error(ArgumentBound::AtMost(max)));
        }
        Ok(arguments)
    }

    fn count_error(&self, bound: ArgumentBound) -> Error {
        Error::ArgumentCountOutOfRange {
            name: self.name.to_string(),
            bound,
        }
    }
}

/// Strategy that builds the target address of an instruction element.
///
/// The provided methods describe a single child step named after the
/// instruction element; implementations override the pieces they change.
pub trait Locator {
    /// Axis of the appended step
    fn next_step_axis(&self) -> Axis {
        Axis::Child
    }

    /// Node test of the appended step
    fn next_step_node_test(&self, binding: &LocatorBinding<'_>) -> String {
        binding.default_node_test()
    }

    /// Predicate of the appended step; empty for none
    fn construct_predicate(&self, _binding: &LocatorBinding<'_>) -> Result<String> {
        Ok(String::new())
    }

    fn construct_path(&self, binding: &LocatorBinding<'_>) -> Result<String> {
        Ok(append_step(
            binding.parent_path(),
            self.next_step_axis(),
            &self.next_step_node_test(binding),
            &self.construct_predicate(binding)?,
        ))
    }

    /// Address that parent-targeting transforms operate on
    fn construct_parent_path(&self, binding: &LocatorBinding<'_>) -> Result<String> {
        Ok(binding.parent_path().to_string())
    }
}
