//! Format repair for preservation-mode documents
//!
//! Elements that were inserted after load carry no whitespace of their own
//! (transform documents are read without it). Before a preserving save they
//! are given the indentation of their siblings so that the output reads as if
//! written by hand. Original regions are never touched.

use xdt_traits::Result;

use crate::document::{Document, NodeId, NodeKind};

const INDENT_UNIT: &str = "  ";
const ATTRIBUTE_INDENT: &str = "    ";

/// Indentation of the line a node starts on, taken from the whitespace text
/// immediately before it
fn indent_of(doc: &Document, node: NodeId) -> Option<String> {
    let parent = doc.parent(node)?;
    let siblings = doc.children(parent);
    let index = siblings.iter().position(|&c| c == node)?;
    let previous = *siblings.get(index.checked_sub(1)?)?;
    match doc.kind(previous) {
        NodeKind::Text { value, .. } if doc.is_whitespace(previous) => {
            value.rfind('\n').map(|i| value[i + 1..].to_string())
        }
        _ => None,
    }
}

fn is_line_break(doc: &Document, node: NodeId) -> bool {
    doc.is_whitespace(node)
        && matches!(doc.kind(node), NodeKind::Text { value, .. } if value.contains('\n'))
}

/// Whitespace placed before attributes that start a new line when the
/// element's own tag has no line break to copy
pub(crate) fn default_attribute_indent(doc: &Document, element: NodeId) -> String {
    format!(
        "\n{}{}",
        indent_of(doc, element).unwrap_or_default(),
        ATTRIBUTE_INDENT
    )
}

/// Reconcile every preservation record and indent inserted elements
pub fn format(doc: &mut Document) {
    if !doc.preserve_whitespace() {
        return;
    }
    for node in doc.descendants(doc.root()) {
        if doc.element(node).is_some_and(|e| e.preservation().is_some()) {
            doc.attributes_changed(node);
        }
    }
    if let Err(err) = indent_new_elements(doc) {
        log::warn!("could not indent inserted elements: {}", err);
    }
}

fn indent_new_elements(doc: &mut Document) -> Result<()> {
    let Some(root) = doc.document_element() else {
        return Ok(());
    };
    if !doc.is_original(root) {
        return indent_subtree(doc, root, "", INDENT_UNIT);
    }

    let mut inserted = Vec::new();
    collect_inserted(doc, root, &mut inserted);
    for node in inserted {
        place(doc, node)?;
    }
    Ok(())
}

/// New elements whose parent is original, outermost first
fn collect_inserted(doc: &Document, element: NodeId, out: &mut Vec<NodeId>) {
    for child in doc.element_children(element) {
        if doc.is_original(child) {
            collect_inserted(doc, child, out);
        } else {
            out.push(child);
        }
    }
}

fn place(doc: &mut Document, node: NodeId) -> Result<()> {
    let Some(parent) = doc.parent(node) else {
        return Ok(());
    };
    let siblings = doc.children(parent).to_vec();
    // Parents written on a single line stay that way.
    if !siblings.iter().any(|&c| is_line_break(doc, c)) {
        return Ok(());
    }

    let parent_indent = indent_of(doc, parent).unwrap_or_default();
    let child_indent = siblings
        .iter()
        .filter(|&&c| c != node && doc.is_original(c))
        .find_map(|&c| indent_of(doc, c))
        .unwrap_or_else(|| format!("{}{}", parent_indent, INDENT_UNIT));
    let unit = child_indent
        .strip_prefix(parent_indent.as_str())
        .filter(|unit| !unit.is_empty())
        .unwrap_or(INDENT_UNIT)
        .to_string();

    let Some(index) = siblings.iter().position(|&c| c == node) else {
        return Ok(());
    };
    let previous = index.checked_sub(1).and_then(|i| siblings.get(i)).copied();

    match previous {
        Some(space) if doc.is_whitespace(space) => {
            let only_inserted_follow = siblings[index..]
                .iter()
                .all(|&c| !doc.is_original(c) && !doc.is_whitespace(c));
            if only_inserted_follow && is_line_break(doc, space) {
                // Appended after the parent's closing run: that run moves to
                // the end and a sibling indent goes in front of the new element.
                doc.detach(space);
                doc.append_child(parent, space)?;
                let before = doc.create_text(format!("\n{}", child_indent));
                doc.insert_before(node, before)?;
            }
        }
        _ => {
            let before = doc.create_text(format!("\n{}", child_indent));
            doc.insert_before(node, before)?;
        }
    }
    let next = {
        let siblings = doc.children(parent);
        siblings
            .iter()
            .position(|&c| c == node)
            .and_then(|i| siblings.get(i + 1))
            .copied()
    };
    if let Some(next) = next {
        if !doc.is_whitespace(next) {
            let after = doc.create_text(format!("\n{}", child_indent));
            doc.insert_after(node, after)?;
        }
    }

    indent_subtree(doc, node, &child_indent, &unit)
}

/// Indent the content of an inserted element that has no whitespace yet
fn indent_subtree(doc: &mut Document, element: NodeId, indent: &str, unit: &str) -> Result<()> {
    let children = doc.children(element).to_vec();
    if children.is_empty() {
        return Ok(());
    }
    let has_text = children
        .iter()
        .any(|&c| matches!(doc.kind(c), NodeKind::Text { .. } | NodeKind::CData(_)));
    if has_text {
        return Ok(());
    }

    let child_indent = format!("{}{}", indent, unit);
    for child in children {
        let space = doc.create_text(format!("\n{}", child_indent));
        doc.insert_before(child, space)?;
        if doc.is_element(child) {
            indent_subtree(doc, child, &child_indent, unit)?;
        }
    }
    let closing = doc.create_text(format!("\n{}", indent));
    doc.append_child(element, closing)
}
