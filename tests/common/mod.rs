//! Shared utilities for integration tests.

use lvs_topology::observability::{Diagnostic, Severity};
use lvs_topology::{ParseOutcome, Parser, ParserOptions};

/// Parse topology text with default options.
pub fn parse(text: &str) -> ParseOutcome {
    parse_with(text, ParserOptions::default())
}

/// Parse topology text with the given options.
pub fn parse_with(text: &str, options: ParserOptions) -> ParseOutcome {
    Parser::new(options).unwrap().parse_str(text)
}

/// Error diagnostics only.
#[allow(dead_code)]
pub fn errors(outcome: &ParseOutcome) -> Vec<&Diagnostic> {
    outcome
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect()
}

/// True if any diagnostic message contains `needle`.
#[allow(dead_code)]
pub fn mentions(outcome: &ParseOutcome, needle: &str) -> bool {
    outcome.diagnostics.iter().any(|d| d.message.contains(needle))
}
