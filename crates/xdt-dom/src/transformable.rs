//! Document wrapper that remembers its state before the first edit

use std::ops::{Deref, DerefMut};

use xdt_traits::{NamespaceBindings, Result};

use crate::document::{Document, NodeId};

/// A target document together with a lazily taken snapshot of how it looked
/// before any transform ran
#[derive(Debug, Clone)]
pub struct TransformableDocument {
    document: Document,
    original: Option<Document>,
}

impl TransformableDocument {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            original: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Take the snapshot if it has not been taken yet. Called right before a
    /// transform is about to change the document.
    pub fn on_before_change(&mut self) {
        if self.original.is_none() {
            log::trace!("taking snapshot of the target document");
            self.original = Some(self.document.clone());
        }
    }

    /// The snapshot, once taken
    pub fn original(&self) -> Option<&Document> {
        self.original.as_ref()
    }

    /// Evaluate `xpath` against the snapshot; `None` before any change
    pub fn select_original(&self, xpath: &str, namespaces: &NamespaceBindings) -> Result<Option<Vec<NodeId>>> {
        match &self.original {
            Some(original) => original.select_node_ids(xpath, namespaces).map(Some),
            None => Ok(None),
        }
    }

    /// Whether a transform may have changed the document. Conservative: any
    /// document that was about to be edited counts as changed.
    pub fn is_changed(&self) -> bool {
        self.original.is_some()
    }
}

impl From<Document> for TransformableDocument {
    fn from(document: Document) -> Self {
        Self::new(document)
    }
}

impl Deref for TransformableDocument {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.document
    }
}

impl DerefMut for TransformableDocument {
    fn deref_mut(&mut self) -> &mut Document {
        &mut self.document
    }
}
