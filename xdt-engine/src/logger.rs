//! Diagnostics plumbing for a transformation run

use std::cell::RefCell;
use std::rc::Rc;

use xdt_traits::{Diagnostic, Error, MessageType, Severity, SourceLocation, TransformLogger};

/// Wrapper the engine logs through.
///
/// Tracks whether an error was reported during the current run and turns
/// warnings into normal messages while warnings are suppressed.
pub struct TransformationLogger {
    sink: Box<dyn TransformLogger>,
    has_logged_errors: bool,
    suppress_warnings: bool,
}

impl TransformationLogger {
    pub fn new(sink: Box<dyn TransformLogger>) -> Self {
        Self {
            sink,
            has_logged_errors: false,
            suppress_warnings: false,
        }
    }

    pub fn has_logged_errors(&self) -> bool {
        self.has_logged_errors
    }

    pub(crate) fn reset(&mut self) {
        self.has_logged_errors = false;
        self.suppress_warnings = false;
    }

    pub fn suppress_warnings(&self) -> bool {
        self.suppress_warnings
    }

    /// Set the suppression flag, returning the previous value
    pub(crate) fn set_suppress_warnings(&mut self, suppress: bool) -> bool {
        std::mem::replace(&mut self.suppress_warnings, suppress)
    }

    pub fn log_message(&mut self, kind: MessageType, message: &str) {
        self.sink.log_message(kind, message);
    }

    pub fn log_warning(&mut self, location: Option<&SourceLocation>, message: &str) {
        if self.suppress_warnings {
            self.sink.log_message(MessageType::Normal, message);
        } else {
            self.sink.log_warning(location, message);
        }
    }

    pub fn log_error(&mut self, location: Option<&SourceLocation>, message: &str) {
        self.has_logged_errors = true;
        self.sink.log_error(location, message);
    }

    pub fn log_error_from_exception(&mut self, error: &Error, location: Option<&SourceLocation>) {
        self.has_logged_errors = true;
        self.sink.log_error_from_exception(error, location);
    }

    pub fn start_section(&mut self, kind: MessageType, message: &str) {
        self.sink.start_section(kind, message);
    }

    pub fn end_section(&mut self, kind: MessageType, message: &str) {
        self.sink.end_section(kind, message);
    }
}

/// Sink that forwards diagnostics to the `log` facade
#[derive(Debug, Default)]
pub struct LogTransformLogger {
    depth: usize,
}

impl LogTransformLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn indent(&self) -> String {
        "  ".repeat(self.depth)
    }
}

impl TransformLogger for LogTransformLogger {
    fn log_message(&mut self, kind: MessageType, message: &str) {
        match kind {
            MessageType::Normal => log::info!("{}{}", self.indent(), message),
            MessageType::Verbose => log::debug!("{}{}", self.indent(), message),
        }
    }

    fn log_warning(&mut self, location: Option<&SourceLocation>, message: &str) {
        log::warn!("{}", Diagnostic::new(Severity::Warning, location, message).to_line());
    }

    fn log_error(&mut self, location: Option<&SourceLocation>, message: &str) {
        log::error!("{}", Diagnostic::new(Severity::Error, location, message).to_line());
    }

    fn start_section(&mut self, kind: MessageType, message: &str) {
        self.log_message(kind, message);
        self.depth += 1;
    }

    fn end_section(&mut self, kind: MessageType, message: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.log_message(kind, message);
    }
}

#[derive(Debug, Default)]
struct Collected {
    diagnostics: Vec<Diagnostic>,
    text: String,
    depth: usize,
}

/// Sink that records everything in memory.
///
/// Clones share one buffer, so a handle kept by the caller sees what the
/// engine logged through its own clone.
#[derive(Debug, Default, Clone)]
pub struct CollectingLogger {
    inner: Rc<RefCell<Collected>>,
}

impl CollectingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.borrow().diagnostics.clone()
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.with_severity(Severity::Error)
    }

    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.with_severity(Severity::Warning)
    }

    /// Every line logged so far; messages are indented by section depth and
    /// warnings and errors use the `file (line, column) kind: message` form
    pub fn log_text(&self) -> String {
        self.inner.borrow().text.clone()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.diagnostics.clear();
        inner.text.clear();
        inner.depth = 0;
    }

    fn with_severity(&self, severity: Severity) -> Vec<Diagnostic> {
        self.inner
            .borrow()
            .diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .cloned()
            .collect()
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        let mut inner = self.inner.borrow_mut();
        let line = match diagnostic.severity {
            Severity::Message => format!("{}{}", "  ".repeat(inner.depth), diagnostic.message),
            _ => diagnostic.to_line(),
        };
        inner.text.push_str(&line);
        inner.text.push('\n');
        inner.diagnostics.push(diagnostic);
    }
}

impl TransformLogger for CollectingLogger {
    fn log_message(&mut self, _kind: MessageType, message: &str) {
        self.record(Diagnostic::new(Severity::Message, None, message));
    }

    fn log_warning(&mut self, location: Option<&SourceLocation>, message: &str) {
        self.record(Diagnostic::new(Severity::Warning, location, message));
    }

    fn log_error(&mut self, location: Option<&SourceLocation>, message: &str) {
        self.record(Diagnostic::new(Severity::Error, location, message));
    }

    fn start_section(&mut self, kind: MessageType, message: &str) {
        self.log_message(kind, message);
        self.inner.borrow_mut().depth += 1;
    }

    fn end_section(&mut self, kind: MessageType, message: &str) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.depth = inner.depth.saturating_sub(1);
        }
        self.log_message(kind, message);
    }
}
