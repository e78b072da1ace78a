//! Keyword dispatch engine.
//!
//! # Responsibilities
//! - Hold the keyword tree (keyword → handler, optional nested body)
//! - Route each directive to the handler registered at the current level
//! - Track block nesting and run close handlers exactly once per block
//! - Skip unknown blocks and blocks a handler asked to discard
//!
//! # Design Decisions
//! - Handlers are plain `fn` pointers over a caller-owned context
//! - Duplicate keywords are rejected once, at registration
//! - Blocks still open at end of input are closed innermost-first

use thiserror::Error;

use crate::config::lexer::Line;
use crate::observability::{DiagnosticKind, Diagnostics, Severity};

/// Directive handler: receives the full token sequence (keyword first).
pub type Handler<C> = fn(&mut C, &[String]);

/// Block close handler.
pub type CloseHandler<C> = fn(&mut C);

/// Error raised while building a keyword table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("keyword `{keyword}` registered twice in `{level}`")]
    DuplicateKeyword { level: String, keyword: String },
}

/// What the engine needs from the parse context.
pub trait BlockContext {
    /// Sink for engine-level diagnostics.
    fn sink(&mut self) -> &mut Diagnostics;

    /// Returns true (and clears the request) if the last handler asked for
    /// its block to be discarded.
    fn take_skip_request(&mut self) -> bool;
}

/// Body attached to a keyword.
pub enum Body<C> {
    None,
    /// Nested keywords.
    Block {
        keywords: Vec<Keyword<C>>,
        close: Option<CloseHandler<C>>,
    },
    /// Free-form lines, each passed to `entry`.
    Values {
        entry: Handler<C>,
        close: Option<CloseHandler<C>>,
    },
}

/// A registered keyword.
pub struct Keyword<C> {
    name: &'static str,
    handler: Handler<C>,
    body: Body<C>,
}

impl<C> Keyword<C> {
    pub fn new(name: &'static str, handler: Handler<C>) -> Self {
        Self {
            name,
            handler,
            body: Body::None,
        }
    }

    /// Attach nested keywords.
    pub fn block(mut self, keywords: Vec<Keyword<C>>) -> Self {
        let close = self.take_close();
        self.body = Body::Block { keywords, close };
        self
    }

    /// Attach a value block whose lines go to `entry`.
    pub fn values(mut self, entry: Handler<C>) -> Self {
        let close = self.take_close();
        self.body = Body::Values { entry, close };
        self
    }

    /// Run `close` when this keyword's block ends.
    pub fn on_close(mut self, close: CloseHandler<C>) -> Self {
        match &mut self.body {
            Body::None => {
                self.body = Body::Block {
                    keywords: Vec::new(),
                    close: Some(close),
                }
            }
            Body::Block { close: slot, .. } | Body::Values { close: slot, .. } => *slot = Some(close),
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn take_close(&mut self) -> Option<CloseHandler<C>> {
        match &mut self.body {
            Body::None => None,
            Body::Block { close, .. } | Body::Values { close, .. } => close.take(),
        }
    }
}

/// Validated keyword tree.
pub struct KeywordTable<C> {
    root: Vec<Keyword<C>>,
}

enum Level<'k, C> {
    Keywords(&'k [Keyword<C>]),
    Values(Handler<C>),
    Skip,
}

struct Frame<'k, C> {
    name: &'k str,
    level: Level<'k, C>,
    close: Option<CloseHandler<C>>,
}

impl<'k, C> Frame<'k, C> {
    fn skip(name: &'k str) -> Self {
        Self {
            name,
            level: Level::Skip,
            close: None,
        }
    }
}

struct Run<'k, C> {
    root: &'k [Keyword<C>],
    stack: Vec<Frame<'k, C>>,
    pending: Option<Frame<'k, C>>,
}

impl<C: BlockContext> KeywordTable<C> {
    /// Build a table, rejecting duplicate keywords at any level.
    pub fn new(root: Vec<Keyword<C>>) -> Result<Self, DispatchError> {
        check_level("root", &root)?;
        Ok(Self { root })
    }

    /// Dispatch every line to its handler.
    pub fn run(&self, ctx: &mut C, lines: &[Line]) {
        let mut run = Run {
            root: &self.root,
            stack: Vec::new(),
            pending: None,
        };

        for line in lines {
            ctx.sink().set_line(line.number);
            let mut start = 0;
            for (idx, token) in line.tokens.iter().enumerate() {
                match token.as_str() {
                    "{" => {
                        run.segment(ctx, &line.tokens[start..idx], true);
                        start = idx + 1;
                    }
                    "}" => {
                        run.segment(ctx, &line.tokens[start..idx], false);
                        run.close_pending(ctx);
                        run.pop(ctx);
                        start = idx + 1;
                    }
                    _ => {}
                }
            }
            run.segment(ctx, &line.tokens[start..], false);
        }

        run.close_pending(ctx);
        while let Some(frame) = run.stack.pop() {
            ctx.sink().report(
                Severity::Warning,
                DiagnosticKind::MissingBlockClose,
                Some(frame.name),
                format!("missing '}}' at end of input for {}", frame.name),
            );
            close_frame(ctx, frame);
        }
    }
}

impl<'k, C: BlockContext> Run<'k, C> {
    fn segment(&mut self, ctx: &mut C, tokens: &[String], opens: bool) {
        if tokens.is_empty() {
            if opens {
                match self.pending.take() {
                    Some(frame) => self.stack.push(frame),
                    None => {
                        ctx.sink().report(
                            Severity::Error,
                            DiagnosticKind::UnexpectedBlockOpen,
                            Some("{"),
                            "unexpected '{' - skipping block",
                        );
                        self.stack.push(Frame::skip("{"));
                    }
                }
            }
            return;
        }

        self.close_pending(ctx);

        let level = match self.stack.last() {
            Some(frame) => match frame.level {
                Level::Keywords(keywords) => Level::Keywords(keywords),
                Level::Values(entry) => Level::Values(entry),
                Level::Skip => Level::Skip,
            },
            None => Level::Keywords(self.root),
        };

        match level {
            Level::Skip => {
                if opens {
                    self.stack.push(Frame::skip("{"));
                }
            }
            Level::Values(entry) => {
                entry(ctx, tokens);
                if ctx.take_skip_request() {
                    self.skip_top();
                }
                if opens {
                    unexpected_open(ctx, &tokens[0]);
                    self.stack.push(Frame::skip("{"));
                }
            }
            Level::Keywords(keywords) => {
                let Some(keyword) = keywords.iter().find(|k| k.name == tokens[0]) else {
                    ctx.sink().report(
                        Severity::Error,
                        DiagnosticKind::UnknownKeyword,
                        Some(tokens[0].as_str()),
                        format!("unknown keyword '{}'", tokens[0]),
                    );
                    if opens {
                        self.stack.push(Frame::skip("{"));
                    }
                    return;
                };
                self.dispatch(ctx, keyword, tokens, opens);
            }
        }
    }

    fn dispatch(&mut self, ctx: &mut C, keyword: &'k Keyword<C>, tokens: &[String], opens: bool) {
        (keyword.handler)(ctx, tokens);
        let skip = ctx.take_skip_request();

        let frame = match &keyword.body {
            Body::None => {
                if skip {
                    self.skip_top();
                }
                if opens {
                    unexpected_open(ctx, keyword.name);
                    self.stack.push(Frame::skip(keyword.name));
                }
                return;
            }
            _ if skip => Frame::skip(keyword.name),
            Body::Block { keywords, close } => Frame {
                name: keyword.name,
                level: Level::Keywords(keywords),
                close: *close,
            },
            Body::Values { entry, close } => Frame {
                name: keyword.name,
                level: Level::Values(*entry),
                close: *close,
            },
        };

        if opens {
            self.stack.push(frame);
        } else {
            self.pending = Some(frame);
        }
    }

    /// A block keyword not followed by '{' still gets its close handler.
    fn close_pending(&mut self, ctx: &mut C) {
        if let Some(frame) = self.pending.take() {
            ctx.sink().report(
                Severity::Error,
                DiagnosticKind::MissingBlockOpen,
                Some(frame.name),
                format!("missing '{{' after {}", frame.name),
            );
            close_frame(ctx, frame);
        }
    }

    fn pop(&mut self, ctx: &mut C) {
        match self.stack.pop() {
            Some(frame) => close_frame(ctx, frame),
            None => ctx.sink().report(
                Severity::Error,
                DiagnosticKind::UnexpectedBlockClose,
                Some("}"),
                "unexpected '}'",
            ),
        }
    }

    fn skip_top(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.level = Level::Skip;
            frame.close = None;
        }
    }
}

fn close_frame<C>(ctx: &mut C, frame: Frame<'_, C>) {
    if let Some(close) = frame.close {
        close(ctx);
    }
}

fn unexpected_open<C: BlockContext>(ctx: &mut C, keyword: &str) {
    ctx.sink().report(
        Severity::Error,
        DiagnosticKind::UnexpectedBlockOpen,
        Some(keyword),
        format!("{} does not take a block - skipping", keyword),
    );
}

fn check_level<C>(level: &str, keywords: &[Keyword<C>]) -> Result<(), DispatchError> {
    for (idx, keyword) in keywords.iter().enumerate() {
        if keywords[..idx].iter().any(|k| k.name == keyword.name) {
            return Err(DispatchError::DuplicateKeyword {
                level: level.to_string(),
                keyword: keyword.name.to_string(),
            });
        }
        if let Body::Block { keywords: nested, .. } = &keyword.body {
            check_level(keyword.name, nested)?;
        }
    }
    Ok(())
}
