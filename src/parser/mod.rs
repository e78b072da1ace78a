//! Topology builders.
//!
//! # Data Flow
//! ```text
//! lexer lines
//!     → dispatch engine (keyword tree from keywords.rs)
//!     → directive handlers mutate the open entity in ParserContext
//!     → close handlers reconcile and commit to the Topology, or drop
//! ```
//!
//! # Builder States
//! ```text
//! Idle ──virtual_server_group──▶ InGroup ──}──▶ Idle
//! Idle ──virtual_server──▶ InVirtualServer ──real_server──▶ InRealServer
//!                              ▲                                 │
//!                              └────────────────}────────────────┘
//! InVirtualServer ──}──▶ Idle
//! ```
//!
//! # Design Decisions
//! - One open entity per level, held by value in the context
//! - Every problem is a diagnostic; the pass always reaches end of input
//! - A rejected directive never mutates the entity

mod fields;
mod group;
mod keywords;
mod real_server;
mod ssl;
mod virtual_server;

use serde::Serialize;
use tracing::debug;

use crate::config::dispatch::{BlockContext, DispatchError, KeywordTable};
use crate::config::lexer::{tokenize, Line};
use crate::config::ParserOptions;
use crate::observability::{Diagnostic, Diagnostics};
use crate::topology::{RealServer, Topology, VirtualServer, VirtualServerGroup};

/// Which entity the builder is currently filling in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    Idle,
    InGroup,
    InVirtualServer,
    InRealServer,
}

/// State threaded through one parse pass.
pub struct ParserContext {
    options: ParserOptions,
    topology: Topology,
    diagnostics: Diagnostics,
    current_vs: Option<VirtualServer>,
    current_rs: Option<RealServer>,
    current_vsg: Option<VirtualServerGroup>,
    skip_block: bool,
}

impl ParserContext {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            topology: Topology::default(),
            diagnostics: Diagnostics::new(),
            current_vs: None,
            current_rs: None,
            current_vsg: None,
            skip_block: false,
        }
    }

    pub fn state(&self) -> BuilderState {
        if self.current_rs.is_some() {
            BuilderState::InRealServer
        } else if self.current_vs.is_some() {
            BuilderState::InVirtualServer
        } else if self.current_vsg.is_some() {
            BuilderState::InGroup
        } else {
            BuilderState::Idle
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Ask the dispatch engine to discard the current block.
    fn request_skip(&mut self) {
        self.skip_block = true;
    }

    /// The open virtual server, borrowed alongside the sink.
    fn virtual_server(&mut self) -> Option<(&mut VirtualServer, &mut Diagnostics)> {
        let vs = self.current_vs.as_mut()?;
        Some((vs, &mut self.diagnostics))
    }

    /// The open real server, borrowed alongside the sink.
    fn real_server(&mut self) -> Option<(&mut RealServer, &mut Diagnostics)> {
        let rs = self.current_rs.as_mut()?;
        Some((rs, &mut self.diagnostics))
    }

    pub fn finish(self) -> ParseOutcome {
        ParseOutcome {
            topology: self.topology,
            diagnostics: self.diagnostics.into_vec(),
        }
    }
}

impl BlockContext for ParserContext {
    fn sink(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    fn take_skip_request(&mut self) -> bool {
        std::mem::take(&mut self.skip_block)
    }
}

/// Result of a parse pass: the model plus everything reported on the way.
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
    pub topology: Topology,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutcome {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == crate::observability::Severity::Error)
    }
}

/// Keyword table plus options; reusable across passes.
pub struct Parser {
    options: ParserOptions,
    table: KeywordTable<ParserContext>,
}

impl Parser {
    pub fn new(options: ParserOptions) -> Result<Self, DispatchError> {
        let table = keywords::keyword_table(&options.capabilities)?;
        Ok(Self { options, table })
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Run one pass over already-tokenized lines.
    pub fn parse_lines(&self, lines: &[Line]) -> ParseOutcome {
        let mut ctx = ParserContext::new(self.options.clone());
        self.table.run(&mut ctx, lines);

        debug!(
            virtual_servers = ctx.topology.virtual_servers.len(),
            groups = ctx.topology.groups.len(),
            diagnostics = ctx.diagnostics.len(),
            "Topology pass complete"
        );
        ctx.finish()
    }

    pub fn parse_str(&self, text: &str) -> ParseOutcome {
        self.parse_lines(&tokenize(text))
    }
}
