//! Diagnostics sink for transformation runs

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::tree::SourceLocation;

/// Importance of an informational message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Normal,
    Verbose,
}

/// Severity of a recorded diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Message,
    Warning,
    Error,
}

/// A single diagnostic as reported to a sink.
///
/// Serializes to one flat JSON object per diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, location: Option<&SourceLocation>, message: &str) -> Self {
        Self {
            severity,
            file: location.and_then(|l| l.file.clone()),
            line: location.map(|l| l.line),
            column: location.map(|l| l.column),
            message: message.to_string(),
        }
    }

    /// `file (line, column) warning: message` form used by build tools
    pub fn to_line(&self) -> String {
        let kind = match self.severity {
            Severity::Message => return self.message.clone(),
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        let file = self
            .file
            .as_deref()
            .map(|f| {
                std::path::Path::new(f)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(f)
            })
            .unwrap_or("");
        match (self.line, self.column) {
            (Some(line), Some(column)) if file.is_empty() => {
                format!("({}, {}) {}: {}", line, column, kind, self.message)
            }
            (Some(line), Some(column)) => {
                format!("{} ({}, {}) {}: {}", file, line, column, kind, self.message)
            }
            _ if !file.is_empty() => format!("{} {}: {}", file, kind, self.message),
            _ => format!("{}: {}", kind, self.message),
        }
    }
}

/// Receiver of the diagnostics stream produced while applying a transform.
///
/// Implementations decide where the stream goes (ambient logging, a buffer,
/// a terminal). Sections nest and always come in start/end pairs.
pub trait TransformLogger {
    fn log_message(&mut self, kind: MessageType, message: &str);

    fn log_warning(&mut self, location: Option<&SourceLocation>, message: &str);

    fn log_error(&mut self, location: Option<&SourceLocation>, message: &str);

    /// Report an internal failure that escaped the operation that raised it.
    ///
    /// The error's own location wins over `location` when it carries one.
    fn log_error_from_exception(&mut self, error: &Error, location: Option<&SourceLocation>) {
        let location = error.location().or(location);
        let message = error.root().to_string();
        self.log_error(location, &message);
    }

    fn start_section(&mut self, kind: MessageType, message: &str);

    fn end_section(&mut self, kind: MessageType, message: &str);
}
