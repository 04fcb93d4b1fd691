//! Error taxonomy for the TyrtLang interpreter.
//!
//! Errors come in two tiers.  [`RuntimeError`] is the umbrella a `Try`
//! block is allowed to catch; everything else in [`Error`] (malformed
//! headers, unrecognised lines, unevaluable expressions, escaped loop
//! signals) always propagates to the top level, where it is wrapped in a
//! [`LineError`] carrying the failing line number.

use std::sync::Arc;

use thiserror::Error;

/// Errors that belong to the `RuntimeError` umbrella and can be caught by
/// `Try` / `Except`.
///
/// `Clone` so a caught error can be bound to an `Except as name` variable.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("VariableNotDefined: {0}")]
    VariableNotDefined(String),

    #[error("ConstantReassignment: constant '{0}' is immutable")]
    ConstantReassignment(String),

    /// Arity mismatch, unknown method, or a bad collection operation.
    #[error("InvalidMethodCall: {0}")]
    InvalidMethodCall(String),

    #[error("OperatorNotImplemented: operator '{op}' is not implemented by class '{class}'")]
    OperatorNotImplemented { op: String, class: String },

    /// The host file-read primitive failed.
    #[error("RuntimeError: cannot read file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Any other runtime failure (index out of range, type mismatch, overflow).
    #[error("RuntimeError: {0}")]
    Failure(String),
}

impl RuntimeError {
    /// The kind name, as shown in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::VariableNotDefined(_) => "VariableNotDefined",
            RuntimeError::ConstantReassignment(_) => "ConstantReassignment",
            RuntimeError::InvalidMethodCall(_) => "InvalidMethodCall",
            RuntimeError::OperatorNotImplemented { .. } => "OperatorNotImplemented",
            RuntimeError::Io { .. } | RuntimeError::Failure(_) => "RuntimeError",
        }
    }

    pub fn undefined(msg: impl Into<String>) -> Self {
        RuntimeError::VariableNotDefined(msg.into())
    }

    pub fn invalid_call(msg: impl Into<String>) -> Self {
        RuntimeError::InvalidMethodCall(msg.into())
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        RuntimeError::Failure(msg.into())
    }
}

/// Every way executing a line can fail.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed construct header or stray terminator.
    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("UnrecognizedLineError: unrecognized line: {0}")]
    UnrecognizedLine(String),

    #[error("ExpressionError: {0}")]
    Expression(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// `loop.break` / `loop.continue` / `return_object` escaped every
    /// construct that could consume it.
    #[error("UnhandledSignal: '{0}' escaped its enclosing construct")]
    UnhandledSignal(&'static str),
}

impl Error {
    pub fn syntax(msg: impl Into<String>) -> Self {
        Error::Syntax(msg.into())
    }

    pub fn expression(msg: impl Into<String>) -> Self {
        Error::Expression(msg.into())
    }
}

/// An uncaught error reported at the top level, with the 1-based number of
/// the source line being executed when it surfaced.
#[derive(Debug, Error)]
#[error("uncaught error (line {line}): {error}")]
pub struct LineError {
    pub line: usize,
    #[source]
    pub error: Error,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
