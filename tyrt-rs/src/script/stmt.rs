//! TyrtLang line classifier.
//!
//! A script is a sequence of lines.  Each trimmed line is classified on its
//! own into a [`Stmt`]; nothing here evaluates expressions, so the same
//! classifier serves the block-capture state machine (which only needs to
//! know whether a line opens or closes a block) and the executor.
//!
//! | Line | Statement |
//! |------|-----------|
//! | empty, or starting with `/0` | [`Stmt::Blank`] |
//! | `}` | [`Stmt::End`] |
//! | `BILHETE_NADA <cond> {` | [`Opener::If`] |
//! | `entr_i <var> ty <a>:<b> [_CS-TINK] {` | [`Opener::For`] |
//! | `/1<cond> {` | [`Opener::While`] |
//! | `func <name>(<params>) {` | [`Opener::Func`] |
//! | `class <name> {` | [`Opener::Class`] |
//! | `Try {` / `Except [as <name>] {` / `Now {` | try group openers |
//! | `tyrt <target> = <expr>` | [`Stmt::Assign`] |
//! | `const <NAME> = <expr>` | [`Stmt::Const`] |
//! | `print\|[<expr>]` | [`Stmt::Print`] |
//! | `loop.break` / `loop.continue` | loop control |
//! | `return_object [<expr>]` | [`Stmt::Return`] |
//! | anything containing `(` and ending in `)` | [`Stmt::Call`] |

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::error::Error;
use super::expr::{is_ident, split_index};

pub const COMMENT_MARKER: &str = "/0";
pub const TERMINATOR: &str = "}";
pub const BREAK: &str = "loop.break";
pub const CONTINUE: &str = "loop.continue";
pub const RETURN: &str = "return_object";
pub const PRINT_PREFIX: &str = "print|[";
pub const ASSIGN_KEYWORD: &str = "tyrt";
pub const CONST_KEYWORD: &str = "const";

/// Binding used by `Except {` when no `as <name>` clause is given.
pub const DEFAULT_ERROR_BINDING: &str = "tyrt_error_obj";

// ── Statement types ───────────────────────────────────────────────────────────

/// A classified source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// Empty line or comment.
    Blank,
    /// The block terminator `}`.
    End,
    Open(Opener),
    Assign { target: Target, expr: String },
    Const { name: String, expr: String },
    Print { expr: String },
    Break,
    Continue,
    Return { value: Option<String> },
    /// A bare call, evaluated for its side effects.
    Call { expr: String },
}

/// A block-opening line with its header parsed (but not evaluated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opener {
    If { cond: String },
    For { var: String, start: i64, end: i64 },
    While { cond: String },
    Func { name: String, params: Vec<String> },
    Class { name: String },
    Try,
    Except { binding: Option<String> },
    Now,
}

/// The construct a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructKind {
    If,
    For,
    While,
    Func,
    Class,
    Try,
    Except,
    Now,
}

impl Opener {
    pub fn kind(&self) -> ConstructKind {
        match self {
            Opener::If { .. } => ConstructKind::If,
            Opener::For { .. } => ConstructKind::For,
            Opener::While { .. } => ConstructKind::While,
            Opener::Func { .. } => ConstructKind::Func,
            Opener::Class { .. } => ConstructKind::Class,
            Opener::Try => ConstructKind::Try,
            Opener::Except { .. } => ConstructKind::Except,
            Opener::Now => ConstructKind::Now,
        }
    }
}

impl ConstructKind {
    /// The keyword that opens this construct.
    pub fn keyword(self) -> &'static str {
        match self {
            ConstructKind::If => "BILHETE_NADA",
            ConstructKind::For => "entr_i",
            ConstructKind::While => "/1",
            ConstructKind::Func => "func",
            ConstructKind::Class => "class",
            ConstructKind::Try => "Try",
            ConstructKind::Except => "Except",
            ConstructKind::Now => "Now",
        }
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Left-hand side of a `tyrt` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `name`: bound in the active scope.
    Name(String),
    /// `self.<field>`: a field of the receiver instance.
    Field(String),
    /// `<base>[<index>]`: element store or the `setitem` overload.
    Index { base: String, index: String },
}

// ── Header patterns ───────────────────────────────────────────────────────────

fn pattern(cell: &'static OnceLock<Regex>, src: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(src).expect("header patterns are valid regexes"))
}

fn for_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^entr_i\s+(\w+)\s+ty\s+(\d+):(\d+)\s*(?:_CS-TINK)?\s*\{$")
}

fn func_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^func\s+(\w+)\s*\((.*)\)\s*\{$")
}

fn class_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^class\s+(\w+)\s*\{$")
}

fn except_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^Except(?:\s+as\s+(\w+))?\s*\{?$")
}

// ── Classification ────────────────────────────────────────────────────────────

/// `true` if `line` starts with `keyword` followed by a non-word character
/// (or nothing).
fn has_keyword(line: &str, keyword: &str) -> bool {
    line.strip_prefix(keyword)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
}

/// Which construct `line` opens, judged by its leading keyword alone.
///
/// The header may still be malformed; the capture machine only needs the
/// kind to keep its nesting stack balanced.
pub fn opener_keyword(line: &str) -> Option<ConstructKind> {
    let line = line.trim();
    if line.starts_with("/1") {
        return Some(ConstructKind::While);
    }
    [
        ConstructKind::Try,
        ConstructKind::Except,
        ConstructKind::Now,
        ConstructKind::For,
        ConstructKind::If,
        ConstructKind::Class,
        ConstructKind::Func,
    ]
    .into_iter()
    .find(|kind| has_keyword(line, kind.keyword()))
}

/// Parse a single source line.
pub fn parse_line(raw: &str) -> Result<Stmt, Error> {
    let line = raw.trim();

    if line.is_empty() || line.starts_with(COMMENT_MARKER) {
        return Ok(Stmt::Blank);
    }
    if line == TERMINATOR {
        return Ok(Stmt::End);
    }
    if let Some(kind) = opener_keyword(line) {
        return parse_opener(kind, line).map(Stmt::Open);
    }

    if has_keyword(line, ASSIGN_KEYWORD) {
        if let Some((target, expr)) = line[ASSIGN_KEYWORD.len()..].split_once('=') {
            return Ok(Stmt::Assign { target: parse_target(target.trim())?, expr: expr.trim().to_owned() });
        }
    }
    if has_keyword(line, CONST_KEYWORD) {
        if let Some((name, expr)) = line[CONST_KEYWORD.len()..].split_once('=') {
            let name = name.trim();
            if !is_ident(name) {
                return Err(Error::syntax(format!("invalid constant name: '{name}'")));
            }
            return Ok(Stmt::Const { name: name.to_owned(), expr: expr.trim().to_owned() });
        }
    }

    if line == BREAK {
        return Ok(Stmt::Break);
    }
    if line == CONTINUE {
        return Ok(Stmt::Continue);
    }
    if has_keyword(line, RETURN) {
        let value = line[RETURN.len()..].trim();
        return Ok(Stmt::Return { value: (!value.is_empty()).then(|| value.to_owned()) });
    }

    if let Some(rest) = line.strip_prefix(PRINT_PREFIX) {
        let expr = rest
            .strip_suffix(']')
            .ok_or_else(|| Error::syntax(format!("print must end with ']': {line}")))?;
        return Ok(Stmt::Print { expr: expr.trim().to_owned() });
    }

    if line.contains('(') && line.ends_with(')') {
        return Ok(Stmt::Call { expr: line.to_owned() });
    }

    Err(Error::UnrecognizedLine(line.to_owned()))
}

fn parse_opener(kind: ConstructKind, line: &str) -> Result<Opener, Error> {
    let invalid = || Error::syntax(format!("invalid {kind} header: {line}"));
    match kind {
        ConstructKind::Try | ConstructKind::Now => {
            let rest = line[kind.keyword().len()..].trim();
            if !rest.is_empty() && rest != "{" {
                return Err(invalid());
            }
            Ok(if kind == ConstructKind::Try { Opener::Try } else { Opener::Now })
        }
        ConstructKind::Except => {
            let caps = except_header().captures(line).ok_or_else(invalid)?;
            Ok(Opener::Except { binding: caps.get(1).map(|m| m.as_str().to_owned()) })
        }
        ConstructKind::For => {
            let caps = for_header().captures(line).ok_or_else(invalid)?;
            let bound = |i: usize| {
                caps[i]
                    .parse::<i64>()
                    .map_err(|_| Error::syntax(format!("loop bound out of range: {}", &caps[i])))
            };
            Ok(Opener::For { var: caps[1].to_owned(), start: bound(2)?, end: bound(3)? })
        }
        ConstructKind::While | ConstructKind::If => {
            let body = line[kind.keyword().len()..]
                .strip_suffix('{')
                .ok_or_else(|| Error::syntax(format!("{kind} block must end with '{{'")))?;
            let cond = body.trim();
            if cond.is_empty() {
                return Err(Error::syntax(format!("{kind} block has no condition")));
            }
            let cond = cond.to_owned();
            Ok(if kind == ConstructKind::If { Opener::If { cond } } else { Opener::While { cond } })
        }
        ConstructKind::Func => {
            let caps = func_header().captures(line).ok_or_else(invalid)?;
            let params: Vec<String> = caps[2]
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .collect();
            if let Some(bad) = params.iter().find(|p| !is_ident(p)) {
                return Err(Error::syntax(format!("invalid parameter name '{bad}' in: {line}")));
            }
            Ok(Opener::Func { name: caps[1].to_owned(), params })
        }
        ConstructKind::Class => {
            let caps = class_header().captures(line).ok_or_else(invalid)?;
            Ok(Opener::Class { name: caps[1].to_owned() })
        }
    }
}

fn parse_target(target: &str) -> Result<Target, Error> {
    if let Some((base, index)) = split_index(target) {
        return Ok(Target::Index { base: base.to_owned(), index: index.trim().to_owned() });
    }
    if let Some(field) = target.strip_prefix("self.") {
        if is_ident(field) {
            return Ok(Target::Field(field.to_owned()));
        }
    }
    if is_ident(target) {
        return Ok(Target::Name(target.to_owned()));
    }
    Err(Error::syntax(format!("invalid assignment target: '{target}'")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
