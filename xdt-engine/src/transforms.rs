//! Built-in transforms

use xdt_dom::{NodeId, QName, XNode};
use xdt_traits::{Error, MessageType, Result};

use crate::transform::{MissingTargetMessage, Transform, TransformContext};

fn element_name(context: &TransformContext<'_>, node: NodeId) -> String {
    context
        .document()
        .name(node)
        .map(QName::qualified)
        .unwrap_or_default()
}

/// Replace the first match with the instruction element
#[derive(Debug, Default)]
pub struct Replace;

impl Transform for Replace {
    fn apply(&self, context: &mut TransformContext<'_>) -> Result<()> {
        context.expect_no_arguments();
        let target = context.target_node();
        let replacement = context.transform_node();
        context.document_mut().replace(target, replacement)?;
        let name = element_name(context, target);
        context.log_message(MessageType::Verbose, &format!("Replaced '{}' element", name));
        Ok(())
    }
}

fn remove_target(context: &mut TransformContext<'_>) -> Result<()> {
    context.expect_no_arguments();
    let target = context.target_node();
    if context.document().parent(target).is_none() {
        return Err(Error::operation("The node to remove is not part of the document"));
    }
    context.document_mut().detach(target);
    let name = element_name(context, target);
    context.log_message(MessageType::Verbose, &format!("Removed '{}' element", name));
    Ok(())
}

/// Remove the first match
#[derive(Debug, Default)]
pub struct Remove;

impl Transform for Remove {
    fn apply(&self, context: &mut TransformContext<'_>) -> Result<()> {
        remove_target(context)
    }
}

/// Remove every match
#[derive(Debug, Default)]
pub struct RemoveAll;

impl Transform for RemoveAll {
    fn apply_to_all_targets(&self) -> bool {
        true
    }

    fn apply(&self, context: &mut TransformContext<'_>) -> Result<()> {
        remove_target(context)
    }
}

fn append_to_target(context: &mut TransformContext<'_>) -> Result<()> {
    let parent = context.target_node();
    let node = context.transform_node();
    context.document_mut().append_child(parent, node)?;
    let name = element_name(context, node);
    context.log_message(MessageType::Verbose, &format!("Inserted '{}' element", name));
    Ok(())
}

/// Append the instruction element to the first match of the parent address
#[derive(Debug, Default)]
pub struct Insert;

impl Transform for Insert {
    fn use_parent_as_target_node(&self) -> bool {
        true
    }

    fn missing_target_message(&self) -> MissingTargetMessage {
        MissingTargetMessage::Error
    }

    fn apply(&self, context: &mut TransformContext<'_>) -> Result<()> {
        context.expect_no_arguments();
        append_to_target(context)
    }
}

/// Append the instruction element unless its own address already matches
#[derive(Debug, Default)]
pub struct InsertIfMissing;

impl Transform for InsertIfMissing {
    fn use_parent_as_target_node(&self) -> bool {
        true
    }

    fn missing_target_message(&self) -> MissingTargetMessage {
        MissingTargetMessage::Error
    }

    fn apply(&self, context: &mut TransformContext<'_>) -> Result<()> {
        context.expect_no_arguments();
        if context.target_child_nodes().is_empty() {
            append_to_target(context)
        } else {
            Ok(())
        }
    }
}

/// Sibling named by the single XPath argument, evaluated from the parent
fn sibling_element(context: &TransformContext<'_>) -> Result<NodeId> {
    let arguments = context.ensure_arguments_between(1, 1)?;
    let xpath = &arguments[0];
    let found = context
        .document()
        .select_from(XNode::Node(context.target_node()), xpath, context.namespaces())?;
    let first = found
        .first()
        .ok_or_else(|| Error::operation(format!("'{}' did not match any element", xpath)))?;
    match first.node() {
        Some(node) if context.document().is_element(node) => Ok(node),
        _ => Err(Error::operation(format!("'{}' did not select an element", xpath))),
    }
}

/// Insert the instruction element before the sibling its argument selects
#[derive(Debug, Default)]
pub struct InsertBefore;

impl Transform for InsertBefore {
    fn use_parent_as_target_node(&self) -> bool {
        true
    }

    fn missing_target_message(&self) -> MissingTargetMessage {
        MissingTargetMessage::Error
    }

    fn apply(&self, context: &mut TransformContext<'_>) -> Result<()> {
        let sibling = sibling_element(context)?;
        let node = context.transform_node();
        context.document_mut().insert_before(sibling, node)?;
        let name = element_name(context, node);
        context.log_message(MessageType::Verbose, &format!("Inserted '{}' element", name));
        Ok(())
    }
}

/// Insert the instruction element after the sibling its argument selects
#[derive(Debug, Default)]
pub struct InsertAfter;

impl Transform for InsertAfter {
    fn use_parent_as_target_node(&self) -> bool {
        true
    }

    fn missing_target_message(&self) -> MissingTargetMessage {
        MissingTargetMessage::Error
    }

    fn apply(&self, context: &mut TransformContext<'_>) -> Result<()> {
        let sibling = sibling_element(context)?;
        let node = context.transform_node();
        context.document_mut().insert_after(sibling, node)?;
        let name = element_name(context, node);
        context.log_message(MessageType::Verbose, &format!("Inserted '{}' element", name));
        Ok(())
    }
}

// ====== Attribute transforms ======

fn attributes_at(context: &TransformContext<'_>, node: NodeId, xpath: &str) -> Result<Vec<QName>> {
    let document = context.document();
    let found = document.select_from(XNode::Node(node), xpath, context.namespaces())?;
    Ok(found
        .into_iter()
        .filter_map(|n| match n {
            XNode::Attribute(owner, index) => document.attributes(owner).get(index).map(|a| a.name.clone()),
            XNode::Node(_) => None,
        })
        .collect())
}

/// Attributes of `node` named by the arguments, all of them without
/// arguments. Each argument that selects nothing is reported.
fn selected_attributes(context: &mut TransformContext<'_>, node: NodeId) -> Result<Vec<QName>> {
    let arguments = context.arguments()?.to_vec();
    if arguments.is_empty() {
        return attributes_at(context, node, "@*");
    }
    if arguments.len() > 1 {
        for argument in &arguments {
            if attributes_at(context, node, &format!("@{}", argument))?.is_empty() {
                context.log_warning(&format!("Argument '{}' did not match any attributes", argument));
            }
        }
    }
    let union: Vec<String> = arguments.iter().map(|a| format!("@{}", a)).collect();
    let names = attributes_at(context, node, &union.join("|"))?;
    if names.is_empty() && arguments.len() == 1 {
        context.log_warning(&format!("Argument '{}' did not match any attributes", arguments[0]));
    }
    Ok(names)
}

/// Copy attributes of the instruction element onto every match
#[derive(Debug, Default)]
pub struct SetAttributes;

impl Transform for SetAttributes {
    fn apply_to_all_targets(&self) -> bool {
        true
    }

    fn apply(&self, context: &mut TransformContext<'_>) -> Result<()> {
        let source = context.transform_node();
        let target = context.target_node();
        let names = selected_attributes(context, source)?;
        for name in &names {
            let qualified = name.qualified();
            let value = context
                .document()
                .attribute_value(source, &qualified)
                .unwrap_or_default()
                .to_string();
            context.document_mut().set_attribute(target, name.clone(), value)?;
            context.log_message(MessageType::Verbose, &format!("Set '{}' attribute", qualified));
        }
        if names.is_empty() {
            context.log_warning("No attributes found to set");
        } else {
            context.log_message(MessageType::Verbose, &format!("Set {} attributes", names.len()));
        }
        Ok(())
    }
}

/// Remove the named attributes from every match
#[derive(Debug, Default)]
pub struct RemoveAttributes;

impl Transform for RemoveAttributes {
    fn apply_to_all_targets(&self) -> bool {
        true
    }

    fn apply(&self, context: &mut TransformContext<'_>) -> Result<()> {
        let target = context.target_node();
        let names = selected_attributes(context, target)?;
        for name in &names {
            let qualified = name.qualified();
            context.document_mut().remove_attribute(target, &qualified);
            context.log_message(MessageType::Verbose, &format!("Removed '{}' attribute", qualified));
        }
        if names.is_empty() {
            context.log_warning("No attributes found to remove");
        } else {
            context.log_message(MessageType::Verbose, &format!("Removed {} attributes", names.len()));
        }
        Ok(())
    }
}
