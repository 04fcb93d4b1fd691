//! Block-capture state machine.
//!
//! Opening a construct moves the machine from `Idle` to `Capturing`; from
//! then on every line is buffered verbatim until the terminator that
//! balances the opener.  Inner openers are tracked on an explicit nesting
//! stack (by keyword only, their headers are parsed when the body runs), so
//! constructs of the same kind nest freely.  The closed [`Capture`] is
//! handed back to the interpreter, which dispatches it to a block
//! processor.
//!
//! `Try`, `Except` and `Now` are three consecutive constructs that form one
//! group.  The machine keeps the group as a [`TryGroup`] until the
//! interpreter decides it is complete.

use std::collections::HashMap;
use std::rc::Rc;

use super::error::Error;
use super::stmt::{opener_keyword, parse_line, ConstructKind, Opener, Stmt, TERMINATOR};
use super::value::Function;

// ── Headers ───────────────────────────────────────────────────────────────────

/// Construct-specific data fixed when a block opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    /// The condition is evaluated once, at entry.
    If { taken: bool },
    For { var: String, start: i64, end: i64 },
    While { cond: String },
    Func { name: String, params: Vec<String> },
    Class { name: String },
    Try,
    Except { binding: String },
    Now,
}

impl Header {
    pub fn kind(&self) -> ConstructKind {
        match self {
            Header::If { .. } => ConstructKind::If,
            Header::For { .. } => ConstructKind::For,
            Header::While { .. } => ConstructKind::While,
            Header::Func { .. } => ConstructKind::Func,
            Header::Class { .. } => ConstructKind::Class,
            Header::Try => ConstructKind::Try,
            Header::Except { .. } => ConstructKind::Except,
            Header::Now => ConstructKind::Now,
        }
    }
}

/// A block being (or done being) captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub header: Header,
    pub body: Vec<String>,
    /// Kinds of inner blocks opened but not yet terminated.
    nested: Vec<ConstructKind>,
}

#[derive(Debug, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing(Capture),
}

// ── Try groups ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptHandler {
    pub binding: String,
    pub body: Vec<String>,
}

impl ExceptHandler {
    /// An all-blank handler neither binds the error nor runs.
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(|line| line.trim().is_empty())
    }
}

/// A `Try` body with its optional `Except` handler and `Now` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryGroup {
    pub try_body: Vec<String>,
    pub handler: Option<ExceptHandler>,
    pub finally: Option<Vec<String>>,
}

// ── BlockMachine ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct BlockMachine {
    state: CaptureState,
    pending_try: Option<TryGroup>,
}

impl BlockMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, CaptureState::Capturing(_))
    }

    /// Start capturing a block.  Must only be called while idle.
    pub fn open(&mut self, header: Header) {
        debug_assert!(!self.is_capturing(), "block opened while capturing");
        tracing::trace!(kind = %header.kind(), "capture started");
        self.state = CaptureState::Capturing(Capture { header, body: Vec::new(), nested: Vec::new() });
    }

    /// Buffer one line of the open block.  Returns the finished capture when
    /// `line` is the terminator balancing the opener.  Lines fed while idle
    /// are ignored.
    pub fn absorb(&mut self, line: &str) -> Option<Capture> {
        let CaptureState::Capturing(capture) = &mut self.state else {
            return None;
        };
        let trimmed = line.trim();
        if trimmed == TERMINATOR {
            if capture.nested.pop().is_none() {
                let CaptureState::Capturing(done) = std::mem::take(&mut self.state) else {
                    return None;
                };
                tracing::trace!(kind = %done.header.kind(), lines = done.body.len(), "capture closed");
                return Some(done);
            }
        } else if let Some(kind) = opener_keyword(trimmed) {
            capture.nested.push(kind);
        }
        capture.body.push(line.to_owned());
        None
    }

    /// End of input: an open block is an error.
    pub fn finish(&mut self) -> Result<(), Error> {
        match std::mem::take(&mut self.state) {
            CaptureState::Idle => Ok(()),
            CaptureState::Capturing(capture) => Err(Error::syntax(format!(
                "unterminated {} block at end of input",
                capture.header.kind()
            ))),
        }
    }

    // ── Pending try group ───────────────────────────────────────────────────

    pub fn has_pending_try(&self) -> bool {
        self.pending_try.is_some()
    }

    /// A closed `Try` body starts a new group.
    pub fn begin_try(&mut self, try_body: Vec<String>) {
        debug_assert!(self.pending_try.is_none(), "previous try group was not flushed");
        self.pending_try = Some(TryGroup { try_body, handler: None, finally: None });
    }

    pub fn attach_except(&mut self, binding: String, body: Vec<String>) -> Result<(), Error> {
        match &mut self.pending_try {
            Some(group) if group.handler.is_none() => {
                group.handler = Some(ExceptHandler { binding, body });
                Ok(())
            }
            Some(_) => Err(Error::syntax("duplicate Except block for one Try")),
            None => Err(Error::syntax("Except block without a preceding Try")),
        }
    }

    /// A closed `Now` body completes the group.
    pub fn attach_finally(&mut self, body: Vec<String>) -> Result<TryGroup, Error> {
        let mut group = self
            .pending_try
            .take()
            .ok_or_else(|| Error::syntax("Now block without a preceding Try"))?;
        group.finally = Some(body);
        Ok(group)
    }

    pub fn take_pending_try(&mut self) -> Option<TryGroup> {
        self.pending_try.take()
    }
}

// ── Class bodies ──────────────────────────────────────────────────────────────

/// Build a class's method table from its captured body.  Only `func`
/// blocks, blank lines and comments may appear at the top of a class body.
pub fn collect_methods(class: &str, body: &[String]) -> Result<HashMap<String, Rc<Function>>, Error> {
    let mut methods = HashMap::new();
    let mut machine = BlockMachine::new();
    for line in body {
        if machine.is_capturing() {
            if let Some(Capture { header: Header::Func { name, params }, body, .. }) = machine.absorb(line) {
                tracing::trace!(class, method = %name, "method registered");
                methods.insert(name.clone(), Rc::new(Function::new(name, params, body)));
            }
            continue;
        }
        match parse_line(line)? {
            Stmt::Blank => {}
            Stmt::Open(Opener::Func { name, params }) => machine.open(Header::Func { name, params }),
            Stmt::End => return Err(Error::syntax("terminator without open block")),
            _ => {
                return Err(Error::syntax(format!(
                    "only method definitions are allowed in class '{class}': {}",
                    line.trim()
                )))
            }
        }
    }
    machine.finish()?;
    Ok(methods)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
