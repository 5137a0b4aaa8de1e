//! Loading a transform document and applying it to targets

use std::path::Path;

use xdt_dom::{Document, LoadOptions, NodeId, TransformableDocument};
use xdt_traits::{Error, MessageType, Result, TransformLogger, TRANSFORM_NAMESPACE};

use crate::context::{ElementContext, SUPPRESS_WARNINGS_ATTRIBUTE};
use crate::logger::{LogTransformLogger, TransformationLogger};
use crate::registry::{ModuleLoader, NamedTypeRegistry, StaticModuleLoader};
use crate::transform::execute;

const IMPORT_ELEMENT: &str = "Import";

/// Options for loading a transform document
pub struct TransformationBuilder {
    logger: Box<dyn TransformLogger>,
    loader: Box<dyn ModuleLoader>,
}

impl Default for TransformationBuilder {
    fn default() -> Self {
        Self {
            logger: Box::new(LogTransformLogger::new()),
            loader: Box::new(StaticModuleLoader::new()),
        }
    }
}

impl TransformationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink for the diagnostics of loading and applying
    pub fn logger(mut self, logger: impl TransformLogger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    /// Where `xdt:Import` finds modules
    pub fn module_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    #[allow(clippy::wrong_self_convention)]
    pub fn from_str(self, text: &str) -> Result<XmlTransformation> {
        let document = Document::parse_str(text, &LoadOptions::default())?;
        self.from_document(document)
    }

    pub fn from_file(self, path: impl AsRef<Path>) -> Result<XmlTransformation> {
        let path = path.as_ref();
        let options = LoadOptions::default().with_file(path.to_string_lossy());
        let document = Document::load_file(path, &options)?;
        self.from_document(document)
    }

    pub fn from_document(self, document: Document) -> Result<XmlTransformation> {
        let mut registry = NamedTypeRegistry::new(self.loader);
        let root = document
            .file()
            .and_then(|f| Path::new(f).parent())
            .map(Path::to_path_buf);
        registry.set_relative_root(root);

        let mut transformation = XmlTransformation {
            document,
            registry,
            logger: TransformationLogger::new(self.logger),
            has_transform_namespace: false,
        };
        transformation.preprocess()?;
        Ok(transformation)
    }
}

/// How warnings are treated below the current instruction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct WalkState {
    suppress_warnings: bool,
}

/// A loaded transform document, ready to be applied to target documents
pub struct XmlTransformation {
    document: Document,
    registry: NamedTypeRegistry,
    logger: TransformationLogger,
    has_transform_namespace: bool,
}

impl XmlTransformation {
    /// Load transform markup with the default logger and module loader
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self> {
        TransformationBuilder::new().from_str(text)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        TransformationBuilder::new().from_file(path)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn registry(&self) -> &NamedTypeRegistry {
        &self.registry
    }

    pub fn has_logged_errors(&self) -> bool {
        self.logger.has_logged_errors()
    }

    fn preprocess(&mut self) -> Result<()> {
        let root = self.document.root();
        self.has_transform_namespace = self.document.descendants(root).into_iter().any(|node| {
            self.document.attributes(node).iter().any(|a| {
                a.name.is_namespace_declaration() && a.value() == TRANSFORM_NAMESPACE
            })
        });
        if !self.has_transform_namespace {
            return Ok(());
        }

        let directives: Vec<NodeId> = self
            .document
            .descendants(root)
            .into_iter()
            .filter(|&node| {
                self.document
                    .name(node)
                    .is_some_and(|n| n.namespace.as_deref() == Some(TRANSFORM_NAMESPACE))
            })
            .collect();
        for node in directives {
            let location = self.document.location(node).cloned();
            let name = self.document.name(node).map(|n| n.local.clone()).unwrap_or_default();
            if name == IMPORT_ELEMENT {
                if let Err(err) = self.preprocess_import(node) {
                    let err = err.at_node(location);
                    self.logger.log_error_from_exception(&err, None);
                    return Err(err);
                }
            } else {
                let message = format!("Unknown tag '{}'", self.document.name(node).map(|n| n.qualified()).unwrap_or(name));
                self.logger.log_warning(location.as_ref(), &message);
            }
        }
        Ok(())
    }

    fn preprocess_import(&mut self, node: NodeId) -> Result<()> {
        let mut assembly = None;
        let mut path = None;
        let mut namespace = None;
        for attr in self.document.attributes(node) {
            if attr.name.is_namespace_declaration() {
                continue;
            }
            let unknown = || Error::import(format!("Unknown attribute '{}'", attr.qualified_name()));
            if attr.name.namespace.is_some() {
                return Err(unknown().at_node(attr.location().cloned()));
            }
            match attr.name.local.as_str() {
                "assembly" => assembly = Some(attr.value().to_string()),
                "path" => path = Some(attr.value().to_string()),
                "namespace" => namespace = Some(attr.value().to_string()),
                _ => return Err(unknown().at_node(attr.location().cloned())),
            }
        }

        let namespace = namespace
            .ok_or_else(|| Error::import("Import requires a 'namespace' attribute"))?;
        match (assembly, path) {
            (Some(_), Some(_)) => Err(Error::import(
                "Import cannot have both an 'assembly' and a 'path' attribute",
            )),
            (None, None) => Err(Error::import(
                "Import requires an 'assembly' or a 'path' attribute",
            )),
            (Some(assembly), None) => self.registry.add_module_registration(&assembly, &namespace),
            (None, Some(path)) => self.registry.add_path_registration(&path, &namespace),
        }
    }

    /// Apply every instruction to `target`, editing it in place.
    ///
    /// Returns false when any error was logged; the target may still have
    /// been partially edited.
    pub fn apply(&mut self, target: &mut TransformableDocument) -> bool {
        self.logger.reset();
        if !self.has_transform_namespace {
            self.logger.log_message(
                MessageType::Normal,
                &format!("The expected namespace {} was not found in the transform file", TRANSFORM_NAMESPACE),
            );
            return true;
        }

        let mut walker = Walker {
            document: &self.document,
            registry: &self.registry,
            logger: &mut self.logger,
            target,
        };
        walker.walk_children(None, self.document.root(), WalkState::default());
        !self.logger.has_logged_errors()
    }

    /// Apply to a document, wrapping it for the call
    pub fn apply_to_document(&mut self, document: Document) -> (Document, bool) {
        let mut target = TransformableDocument::new(document);
        let succeeded = self.apply(&mut target);
        (target.into_document(), succeeded)
    }
}

struct Walker<'a> {
    document: &'a Document,
    registry: &'a NamedTypeRegistry,
    logger: &'a mut TransformationLogger,
    target: &'a mut TransformableDocument,
}

impl Walker<'_> {
    fn walk_children(&mut self, parent: Option<&ElementContext<'_>>, node: NodeId, state: WalkState) {
        let children: Vec<NodeId> = self.document.element_children(node).collect();
        for element in children {
            let context = ElementContext::new(parent, self.document, self.registry, element);
            self.handle_element(&context, state);
        }
    }

    /// Errors are logged at the instruction; its children are walked either
    /// way. An unreadable SupressWarnings value skips the instruction itself
    /// and leaves the inherited setting in force below it.
    fn handle_element(&mut self, context: &ElementContext<'_>, inherited: WalkState) {
        let state = match context.directive(SUPPRESS_WARNINGS_ATTRIBUTE) {
            Some(attr) => match parse_bool(attr.value()) {
                Ok(suppress_warnings) => Some(WalkState { suppress_warnings }),
                Err(err) => {
                    let err = err.at_node(attr.location().cloned());
                    self.logger.log_error_from_exception(&err, context.location());
                    None
                }
            },
            None => Some(inherited),
        };

        if let Some(state) = state {
            match context.construct_transform() {
                Ok(Some(resolved)) => {
                    let previous = self.logger.set_suppress_warnings(state.suppress_warnings);
                    self.target.on_before_change();
                    execute(&resolved, context, self.target, self.logger);
                    self.logger.set_suppress_warnings(previous);
                }
                Ok(None) => {}
                Err(err) => self.logger.log_error_from_exception(&err, context.location()),
            }
        }

        let state = state.unwrap_or(inherited);
        self.walk_children(Some(context), context.element(), state);
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::operation(format!("'{}' is not a valid boolean value", value))),
    }
}
