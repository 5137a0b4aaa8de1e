//! Error types shared by the transform crates

use std::fmt;

use crate::tree::SourceLocation;

/// Result type for transform operations
pub type Result<T> = std::result::Result<T, Error>;

/// The capability a named type is requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// An edit operation (`xdt:Transform`)
    Transform,
    /// A path locator (`xdt:Locator`)
    Locator,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Transform => f.write_str("Transform"),
            TypeKind::Locator => f.write_str("Locator"),
        }
    }
}

/// Bound violated by a directive's argument list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentBound {
    AtLeast(usize),
    Exactly(usize),
    AtMost(usize),
}

impl fmt::Display for ArgumentBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, count) = match self {
            ArgumentBound::AtLeast(n) => ("at least ", *n),
            ArgumentBound::Exactly(n) => ("exactly ", *n),
            ArgumentBound::AtMost(n) => ("at most ", *n),
        };
        let noun = if count == 1 { "argument" } else { "arguments" };
        write!(f, "{}{} {}", prefix, count, noun)
    }
}

/// Unified error type for loading, locating and transforming
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No registered module exposes a type with this name
    #[error("Could not resolve '{name}' as a type of {kind}")]
    UnknownName { name: String, kind: TypeKind },

    /// More than one registered module exposes a type with this name
    #[error("Type '{name}' was found in more than one registered namespace")]
    AmbiguousName { name: String },

    /// The resolved type does not provide the requested capability
    #[error("Type '{name}' is a {found}, not a {expected}")]
    IncompatibleKind {
        name: String,
        expected: TypeKind,
        found: TypeKind,
    },

    /// The resolved type cannot be instantiated without arguments
    #[error("Type '{name}' has no usable constructor")]
    NotConstructible { name: String },

    /// A Match key names an attribute the instruction element lacks
    #[error("No attribute '{0}' exists for the Match locator")]
    MissingAttribute(String),

    /// A directive value or argument list could not be parsed
    #[error("Could not parse '{0}' as a directive value")]
    BadArgumentSyntax(String),

    /// Wrong number of arguments for a locator or transform
    #[error("{name} requires {bound}")]
    ArgumentCountOutOfRange { name: String, bound: ArgumentBound },

    /// No target node matched an instruction
    #[error("{0}")]
    MissingTarget(String),

    /// Malformed `xdt:Import` element
    #[error("Invalid Import directive: {0}")]
    ImportDirectiveInvalid(String),

    /// Failure raised by transform or locator logic
    #[error("{0}")]
    OperationFailure(String),

    /// XML parsing failed
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// XPath compilation failed
    #[error("XPath compilation error: {0}")]
    XPathCompile(String),

    /// XPath evaluation failed
    #[error("XPath evaluation error: {0}")]
    XPathEval(String),

    /// Text could not be decoded or encoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error attributed to a node in one of the documents
    #[error("{source}")]
    AtNode {
        location: SourceLocation,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a new XML parsing error
    pub fn xml_parse<S: Into<String>>(msg: S) -> Self {
        Error::XmlParse(msg.into())
    }

    /// Create a new XPath compilation error
    pub fn xpath_compile<S: Into<String>>(msg: S) -> Self {
        Error::XPathCompile(msg.into())
    }

    /// Create a new XPath evaluation error
    pub fn xpath_eval<S: Into<String>>(msg: S) -> Self {
        Error::XPathEval(msg.into())
    }

    /// Create a new operation failure
    pub fn operation<S: Into<String>>(msg: S) -> Self {
        Error::OperationFailure(msg.into())
    }

    /// Create a new import directive error
    pub fn import<S: Into<String>>(msg: S) -> Self {
        Error::ImportDirectiveInvalid(msg.into())
    }

    /// Attribute this error to a source location.
    ///
    /// An error that already carries a location keeps it: the innermost node
    /// is the most precise one.
    pub fn at_node(self, location: Option<SourceLocation>) -> Self {
        match (self, location) {
            (err @ Error::AtNode { .. }, _) => err,
            (err, Some(location)) => Error::AtNode {
                location,
                source: Box::new(err),
            },
            (err, None) => err,
        }
    }

    /// Source location attached to this error, if any
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Error::AtNode { location, .. } => Some(location),
            _ => None,
        }
    }

    /// The error without any location wrapper
    pub fn root(&self) -> &Error {
        match self {
            Error::AtNode { source, .. } => source.root(),
            other => other,
        }
    }
}
