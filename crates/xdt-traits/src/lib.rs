//! Core types shared by the XML document transform crates.
//!
//! This crate defines the error taxonomy, source provenance, the diagnostics
//! sink and the XPath selection trait that the DOM and engine crates agree on.

pub mod error;
pub mod logger;
pub mod tree;
pub mod xpath;

pub use error::{ArgumentBound, Error, Result, TypeKind};
pub use logger::{Diagnostic, MessageType, Severity, TransformLogger};
pub use tree::{NodeType, SourceLocation};
pub use xpath::{NamespaceBindings, XPathSelect, DEFAULT_NAMESPACE_PREFIX};

/// Namespace URI of the transform directive vocabulary
pub const TRANSFORM_NAMESPACE: &str = "http://schemas.microsoft.com/XML-Document-Transform";
