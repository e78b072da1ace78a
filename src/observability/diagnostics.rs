//! Configuration diagnostics.
//!
//! # Responsibilities
//! - Carry every rejection or auto-repair as a structured value
//! - Keep diagnostics in the order they were raised
//! - Mirror each diagnostic into the `tracing` stream
//!
//! # Design Decisions
//! - Diagnostics never abort the pass; the caller decides what is fatal
//! - The sink tracks the current line so handlers don't have to

use serde::Serialize;
use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnknownKeyword,
    UnexpectedBlockOpen,
    MissingBlockOpen,
    UnexpectedBlockClose,
    MissingBlockClose,
    MissingParameter,
    InvalidNumber,
    General,
    /// The configuration asks for something the target kernel cannot do.
    Unsupported,
}

/// A single configuration diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    /// The offending token, when one can be singled out.
    pub token: Option<String>,
    /// 1-based source line, when known.
    pub line: Option<usize>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.line {
            Some(line) => write!(f, "line {}: {}: {}", line, level, self.message),
            None => write!(f, "{}: {}", level, self.message),
        }
    }
}

/// Ordered collection of diagnostics for one parse pass.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    line: Option<usize>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the line subsequent diagnostics are attributed to.
    pub fn set_line(&mut self, line: usize) {
        self.line = Some(line);
    }

    /// Record a diagnostic and log it.
    pub fn report(
        &mut self,
        severity: Severity,
        kind: DiagnosticKind,
        token: Option<&str>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            severity,
            kind,
            message: message.into(),
            token: token.map(str::to_owned),
            line: self.line,
        };

        match severity {
            Severity::Warning => tracing::warn!(
                line = ?diagnostic.line,
                token = ?diagnostic.token,
                kind = ?diagnostic.kind,
                "{}",
                diagnostic.message
            ),
            Severity::Error => tracing::error!(
                line = ?diagnostic.line,
                token = ?diagnostic.token,
                kind = ?diagnostic.kind,
                "{}",
                diagnostic.message
            ),
        }

        self.entries.push(diagnostic);
    }

    /// Shorthand for a general configuration error.
    pub fn error(&mut self, token: Option<&str>, message: impl Into<String>) {
        self.report(Severity::Error, DiagnosticKind::General, token, message);
    }

    /// Shorthand for a general warning.
    pub fn warn(&mut self, token: Option<&str>, message: impl Into<String>) {
        self.report(Severity::Warning, DiagnosticKind::General, token, message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    /// True if any diagnostic message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|d| d.message.contains(needle))
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
