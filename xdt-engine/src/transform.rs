//! The transform protocol
//!
//! A [`Transform`] only implements `apply` for one target node. Everything
//! around it is shared:
//! - finding the targets
//! - reporting missing ones according to the transform's policy
//! - running once or once per match
//! - logging sections and errors
//!
//! That shared part lives in [`execute`].

use std::cell::OnceCell;

use xdt_dom::{Document, NodeId, TransformableDocument};
use xdt_traits::{ArgumentBound, Error, MessageType, NamespaceBindings, Result, SourceLocation};

use crate::arguments::split_arguments;
use crate::context::{ElementContext, ResolvedTransform};
use crate::logger::TransformationLogger;

/// How a transform reports that nothing matched its address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingTargetMessage {
    /// Verbose message only
    None,
    /// Normal message
    Information,
    #[default]
    Warning,
    /// Error; the transform is not executed
    Error,
}

/// An edit operation named by `xdt:Transform`
pub trait Transform {
    /// Run once per matched node instead of on the first one only
    fn apply_to_all_targets(&self) -> bool {
        false
    }

    /// Operate on the matches of the parent address (insertions)
    fn use_parent_as_target_node(&self) -> bool {
        false
    }

    fn missing_target_message(&self) -> MissingTargetMessage {
        MissingTargetMessage::Warning
    }

    /// Edit the target document for one target node
    fn apply(&self, context: &mut TransformContext<'_>) -> Result<()>;
}

/// What a transform sees while it is applied to one target node
pub struct TransformContext<'a> {
    document: &'a mut Document,
    logger: &'a mut TransformationLogger,
    name: &'a str,
    argument_string: Option<&'a str>,
    arguments: OnceCell<Vec<String>>,
    namespaces: &'a NamespaceBindings,
    location: Option<&'a SourceLocation>,
    transform_node: NodeId,
    target_node: NodeId,
    target_nodes: &'a [NodeId],
    target_child_nodes: &'a [NodeId],
}

impl<'a> TransformContext<'a> {
    pub fn document(&self) -> &Document {
        self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        self.document
    }

    /// Name the transform was requested by
    pub fn name(&self) -> &str {
        self.name
    }

    /// Copy of the instruction element inside the target document
    pub fn transform_node(&self) -> NodeId {
        self.transform_node
    }

    /// The node being edited
    pub fn target_node(&self) -> NodeId {
        self.target_node
    }

    /// Every node the address matched
    pub fn target_nodes(&self) -> &[NodeId] {
        self.target_nodes
    }

    /// For parent-targeting transforms, the matches of the element's own
    /// address below the parent
    pub fn target_child_nodes(&self) -> &[NodeId] {
        self.target_child_nodes
    }

    pub fn namespaces(&self) -> &NamespaceBindings {
        self.namespaces
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

    /// Arguments, requiring between `min` and `max` of them
    pub fn ensure_arguments_between(&self, min: usize, max: usize) -> Result<&[String]> {
        let arguments = self.arguments()?;
        let count = arguments.len();
        let bound = if min == max && count != min {
            Some(ArgumentBound::Exactly(min))
        } else if count < min {
            Some(ArgumentBound::AtLeast(min))
        } else if count > max {
            Some(ArgumentBound::AtMost(max))
        } else {
            None
        };
        match bound {
            Some(bound) => Err(Error::ArgumentCountOutOfRange {
                name: self.name.to_string(),
                bound,
            }),
            None => Ok(arguments),
        }
    }

    /// Warn when arguments were given to a transform that takes none
    pub fn expect_no_arguments(&mut self) {
        if self.argument_string.is_some_and(|a| !a.trim().is_empty()) {
            let message = format!("{} does not expect arguments; ignoring", self.name);
            self.log_warning(&message);
        }
    }

    pub fn log_message(&mut self, kind: MessageType, message: &str) {
        self.logger.log_message(kind, message);
    }

    /// Warning reported at the transform directive
    pub fn log_warning(&mut self, message: &str) {
        self.logger.log_warning(self.location, message);
    }
}

/// Run one resolved transform for an instruction element
pub(crate) fn execute(
    resolved: &ResolvedTransform,
    context: &ElementContext<'_>,
    target: &mut TransformableDocument,
    logger: &mut TransformationLogger,
) {
    let short_name = resolved.name.as_str();
    let long_name = match context.transform_location() {
        Some(at) => format!("{} (transform line {}, position {})", short_name, at.line, at.column),
        None => short_name.to_string(),
    };

    let mut started = false;
    let outcome = run(resolved, context, target, logger, &long_name, &mut started);
    if let Err(err) = &outcome {
        logger.log_error_from_exception(err, context.transform_location());
    }

    if started {
        let message = match outcome {
            Ok(()) => format!("Done executing {}", short_name),
            Err(_) => format!("Error while executing {}", short_name),
        };
        logger.end_section(MessageType::Verbose, &message);
    } else {
        logger.log_message(MessageType::Normal, &format!("Not executing {}", long_name));
    }
}

fn run(
    resolved: &ResolvedTransform,
    context: &ElementContext<'_>,
    target: &mut TransformableDocument,
    logger: &mut TransformationLogger,
    long_name: &str,
    started: &mut bool,
) -> Result<()> {
    let transform = resolved.transform.as_ref();
    let parent_mode = transform.use_parent_as_target_node();

    let missing = if parent_mode {
        context.missing_target_parent(target)?
    } else {
        context.missing_target_node(target)?
    };
    if let Some(missing) = missing {
        let message = missing.message();
        match transform.missing_target_message() {
            MissingTargetMessage::None => logger.log_message(MessageType::Verbose, &message),
            MissingTargetMessage::Information => logger.log_message(MessageType::Normal, &message),
            MissingTargetMessage::Warning => logger.log_warning(missing.location.as_ref(), &message),
            MissingTargetMessage::Error => {
                return Err(Error::MissingTarget(message).at_node(missing.location));
            }
        }
        return Ok(());
    }

    *started = true;
    logger.start_section(MessageType::Verbose, &format!("Executing {}", long_name));
    let path = if parent_mode { context.parent_path()? } else { context.path()? };
    logger.log_message(MessageType::Verbose, &format!("on {}", path));

    let targets = if parent_mode {
        context.target_parents(target)?
    } else {
        context.target_nodes(target)?
    };
    let child_nodes: &[NodeId] = if parent_mode { context.target_nodes(target)? } else { &[] };

    if transform.apply_to_all_targets() {
        let original = context.transform_node(target);
        for &node in targets {
            let fresh = target.clone_node(original);
            let result = apply_one(resolved, context, target, logger, node, fresh, targets, child_nodes);
            if let Err(err) = result {
                logger.log_error_from_exception(&err, context.transform_location());
            }
        }
        Ok(())
    } else {
        let Some(&first) = targets.first() else {
            return Ok(());
        };
        let node = context.transform_node(target);
        apply_one(resolved, context, target, logger, first, node, targets, child_nodes)
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_one(
    resolved: &ResolvedTransform,
    context: &ElementContext<'_>,
    target: &mut TransformableDocument,
    logger: &mut TransformationLogger,
    target_node: NodeId,
    transform_node: NodeId,
    target_nodes: &[NodeId],
    target_child_nodes: &[NodeId],
) -> Result<()> {
    let applying = {
        let name = target.name(target_node).map(|n| n.qualified()).unwrap_or_default();
        match target.location(target_node) {
            Some(at) => format!(
                "Applying to '{}' element (source line {}, position {})",
                name, at.line, at.column
            ),
            None => format!("Applying to '{}' element", name),
        }
    };
    logger.log_message(MessageType::Verbose, &applying);

    let mut transform_context = TransformContext {
        document: target.document_mut(),
        logger,
        name: &resolved.name,
        argument_string: resolved.arguments.as_deref(),
        arguments: OnceCell::new(),
        namespaces: context.namespaces(),
        location: context.transform_location(),
        transform_node,
        target_node,
        target_nodes,
        target_child_nodes,
    };
    resolved.transform.apply(&mut transform_context)
}
