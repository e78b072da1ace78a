//! Load-balancer topology parser library

pub mod config;
pub mod observability;
pub mod parser;
pub mod topology;

pub use config::schema::ParserOptions;
pub use parser::{BuilderState, ParseOutcome, Parser, ParserContext};
pub use topology::Topology;
