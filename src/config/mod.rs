//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! options file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → ParserOptions (validated, immutable)
//!
//! topology file
//!     → loader.rs (read)
//!     → lexer.rs (lines of tokens)
//!     → dispatch.rs (keyword tree, block nesting)
//!     → parser builders
//! ```
//!
//! # Design Decisions
//! - Options are fixed for a pass; a new pass is needed to apply changes
//! - All option fields have defaults so an empty file is valid
//! - Validation separates syntactic (serde) from semantic checks
//! - All file I/O lives in the loader

pub mod dispatch;
pub mod lexer;
pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::Capabilities;
pub use schema::ObservabilityConfig;
pub use schema::ParserOptions;
