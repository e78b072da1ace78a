//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Builders and the dispatch engine produce:
//!     → diagnostics.rs (ordered, structured config diagnostics)
//!     → logging.rs (tracing events mirrored from every diagnostic)
//!
//! Consumers:
//!     → The caller, which decides whether diagnostics abort startup
//!     → Log output (stderr, pretty or JSON)
//! ```

pub mod diagnostics;
pub mod logging;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
