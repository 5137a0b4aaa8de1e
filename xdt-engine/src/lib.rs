//! xdt-engine: XML Document Transform engine
//!
//! Applies a transform document (markup annotated with `xdt:Transform` and
//! `xdt:Locator` directives) to a target document, editing the target in
//! place. Targets loaded in preservation mode keep the formatting of
//! everything the transform did not touch.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use xdt_dom::{Document, LoadOptions, TransformableDocument};
//! use xdt_engine::XmlTransformation;
//!
//! let source = Document::load_file("web.config", &LoadOptions::preserving())?;
//! let mut target = TransformableDocument::new(source);
//! let mut transformation = XmlTransformation::from_file("web.Release.config")?;
//! if transformation.apply(&mut target) {
//!     target.save_to_path("web.config")?;
//! }
//! ```

pub mod arguments;
pub mod context;
pub mod locator;
pub mod locators;
pub mod logger;
pub mod registry;
pub mod transform;
pub mod transformation;
pub mod transforms;

// Re-export core types
pub use arguments::{split_arguments, Directive};
pub use context::{ElementContext, MissingTarget};
pub use locator::{append_step, Axis, Locator, LocatorBinding};
pub use locators::{ConditionLocator, DefaultLocator, MatchLocator, XPathLocator};
pub use logger::{CollectingLogger, LogTransformLogger, TransformationLogger};
pub use registry::{ModuleLoader, NamedType, NamedTypeRegistry, StaticModuleLoader, TypeModule, BUILTIN_NAMESPACE};
pub use transform::{MissingTargetMessage, Transform, TransformContext};
pub use transformation::{TransformationBuilder, XmlTransformation};

// Re-export shared types so callers need only this crate
pub use xdt_dom::{Document, LoadOptions, TransformableDocument};
pub use xdt_traits::{Error, Result, TransformLogger};
