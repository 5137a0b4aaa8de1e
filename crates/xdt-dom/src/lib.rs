//! XML document model for format-preserving transforms
//!
//! The tree keeps enough of the source text (attribute spelling, whitespace,
//! attribute layout) that a document loaded in preservation mode and saved
//! again comes back byte-for-byte. Edits only disturb the regions they touch.

pub mod document;
pub mod encoding;
pub mod format;
pub mod parse;
pub mod position;
pub mod preservation;
mod tag;
pub mod transformable;
pub mod writer;
pub mod xpath;

pub use document::{Attribute, Document, Element, NodeId, NodeKind, QName, XMLNS_NAMESPACE, XML_NAMESPACE};
pub use encoding::{EncodingInfo, TextEncoding};
pub use parse::LoadOptions;
pub use preservation::AttributePreservation;
pub use transformable::TransformableDocument;
pub use writer::{escape_attribute, escape_text, write_indented, write_preserving};
pub use xpath::XNode;
