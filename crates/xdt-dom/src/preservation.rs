//! Attribute whitespace preservation
//!
//! Each element loaded in preservation mode keeps a record of the exact
//! whitespace that preceded every attribute in its start tag, plus the
//! whitespace before the closing `>` or `/>`. After attributes are added or
//! removed the record is reconciled so that the writer can reproduce the
//! original layout as closely as the new attribute set allows.

use indexmap::IndexMap;

use crate::position::WhitespaceTracker;
use crate::tag::scan_start_tag;

/// Key of the whitespace run before the tag terminator
const TRAILING_KEY: &str = "";

/// Per-element record of original inter-attribute whitespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePreservation {
    ordered_names: Vec<String>,
    leading_whitespace: IndexMap<String, String>,
    /// Runs of attributes removed since capture, restored if they come back
    removed_whitespace: IndexMap<String, String>,
    newline_indent: Option<String>,
    one_attribute_per_line: bool,
}

impl AttributePreservation {
    /// Record the layout of a raw start tag such as `<add key="a"\n  value="b" />`.
    ///
    /// Input the outer parser accepted always aligns; anything else yields a
    /// partial record.
    pub fn capture(start_tag: &str) -> Self {
        let mut record = Self::default();
        let Some(scanned) = scan_start_tag(start_tag) else {
            log::debug!("could not scan start tag for whitespace preservation");
            return record;
        };

        let mut tracker = WhitespaceTracker::new(start_tag);
        for attr in &scanned.attributes {
            record.ordered_names.push(attr.name.clone());
            if tracker.read_to_line_column(attr.line, attr.column) {
                record
                    .leading_whitespace
                    .insert(attr.name.clone(), tracker.preceding_whitespace().to_string());
            } else {
                log::debug!("no leading whitespace found for attribute '{}'", attr.name);
            }
        }
        if tracker.read_to_offset(scanned.terminal) {
            record.leading_whitespace.insert(
                TRAILING_KEY.to_string(),
                tracker.preceding_whitespace().to_string(),
            );
        } else {
            log::debug!("no trailing whitespace found for tag '{}'", scanned.name);
        }

        record.one_attribute_per_line = record.compute_one_attribute_per_line();
        record
    }

    /// Attribute names in original order, later additions appended
    pub fn ordered_names(&self) -> &[String] {
        &self.ordered_names
    }

    /// Recorded whitespace before an attribute
    pub fn leading_whitespace(&self, name: &str) -> Option<&str> {
        if name.is_empty() {
            return None;
        }
        self.leading_whitespace.get(name).map(String::as_str)
    }

    /// Recorded whitespace before `>` or `/>`
    pub fn trailing_whitespace(&self) -> Option<&str> {
        self.leading_whitespace.get(TRAILING_KEY).map(String::as_str)
    }

    /// Whether every original attribute sat on its own line
    pub fn is_one_attribute_per_line(&self) -> bool {
        self.one_attribute_per_line
    }

    /// Whitespace used in front of attributes added on their own line
    pub fn newline_indent(&self) -> Option<&str> {
        self.newline_indent.as_deref()
    }

    fn compute_one_attribute_per_line(&self) -> bool {
        let tracked = self
            .ordered_names
            .iter()
            .filter(|n| self.leading_whitespace.contains_key(n.as_str()))
            .count();
        if tracked < 2 {
            return false;
        }
        self.ordered_names
            .iter()
            .skip(1)
            .all(|name| match self.leading_whitespace.get(name.as_str()) {
                Some(space) => contains_newline(space),
                None => true,
            })
    }

    fn ensure_newline_indent(&mut self, default_indent: &str) -> String {
        if let Some(indent) = &self.newline_indent {
            return indent.clone();
        }
        let indent = self
            .leading_whitespace
            .values()
            .find(|space| contains_newline(space))
            .cloned()
            .unwrap_or_else(|| default_indent.to_string());
        self.newline_indent = Some(indent.clone());
        indent
    }

    /// Bring the record in line with the element's current attribute names.
    ///
    /// `default_indent` is used as the newline indent when no captured
    /// run contains a line break.
    pub fn reconcile<'a, I>(&mut self, current: I, default_indent: &str)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let current: Vec<&str> = current.into_iter().collect();
        if current.is_empty() {
            if !self.ordered_names.is_empty() {
                for (name, space) in self.leading_whitespace.drain(..) {
                    if name != TRAILING_KEY {
                        self.removed_whitespace.insert(name, space);
                    }
                }
                self.ordered_names.clear();
            }
            return;
        }

        for name in &current {
            if !self.ordered_names.iter().any(|n| n == name) {
                self.ordered_names.push(name.to_string());
            }
        }

        let mut first = true;
        let mut keep: Option<String> = None;
        let names = self.ordered_names.clone();
        for name in &names {
            let exists = current.contains(&name.as_str());

            if !exists {
                // The run in front of a removed attribute either replaces the
                // next survivor's run or is dropped with it.
                if let Some(space) = self.leading_whitespace.shift_remove(name.as_str()) {
                    self.removed_whitespace.insert(name.clone(), space.clone());
                    if first {
                        if keep.is_none() {
                            keep = Some(space);
                        }
                    } else if contains_newline(&space) {
                        keep = Some(space);
                    }
                }
            } else if let Some(carried) = keep.take() {
                let own_has_newline = self
                    .leading_whitespace
                    .get(name.as_str())
                    .is_some_and(|space| contains_newline(space));
                if first || !own_has_newline {
                    self.leading_whitespace.insert(name.clone(), carried);
                }
            } else if !self.leading_whitespace.contains_key(name.as_str()) {
                if let Some(space) = self.removed_whitespace.shift_remove(name.as_str()) {
                    self.leading_whitespace.insert(name.clone(), space);
                } else if first {
                    self.leading_whitespace.insert(name.clone(), " ".to_string());
                } else if self.one_attribute_per_line {
                    let indent = self.ensure_newline_indent(default_indent);
                    self.leading_whitespace.insert(name.clone(), indent);
                } else {
                    self.ensure_newline_indent(default_indent);
                }
            }

            first = first && !exists;
        }
    }

    /// Layout of the current attributes: `(leading whitespace, name)` in
    /// write order, then the trailing run. Names without a recorded run get a
    /// single space; names unknown to the record are appended.
    pub fn layout<'a, 'b>(&'a self, current: &[&'b str]) -> (Vec<(&'a str, &'b str)>, Option<&'a str>) {
        let mut out = Vec::with_capacity(current.len());
        for name in &self.ordered_names {
            if let Some(present) = current.iter().find(|c| **c == name.as_str()) {
                out.push((self.leading_whitespace(name).unwrap_or(" "), *present));
            }
        }
        for name in current {
            if !self.ordered_names.iter().any(|n| n == name) {
                out.push((" ", *name));
            }
        }
        (out, self.trailing_whitespace())
    }
}

fn contains_newline(space: &str) -> bool {
    space.contains('\n')
}
