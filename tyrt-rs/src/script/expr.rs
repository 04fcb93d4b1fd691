//! TyrtLang expression evaluator.
//!
//! Expressions are evaluated straight from their text, without a separate
//! token stream.  Each rule below is tried in order and the first match
//! wins; every rule re-enters the evaluator on its sub-expressions.
//!
//! 1. `self.<field>`: read a field of the receiver instance.
//! 2. Call-shaped text ending in `)`: `<recv>.<name>(…)`, `<name>(…)`,
//!    `.lista(…)` (sequence literal), `#dicionario(…)` (always an empty
//!    mapping).
//! 3. One binary operator, searched in the fixed order `+`, `==`, `>`, `<`
//!    (operators must be surrounded by spaces; the first textual match
//!    splits the expression).
//! 4. `<base>[<index>]`: element access or the `getitem` overload.
//! 5. `<recv>.<field>`: read a field of another instance.
//! 6. Names (constants, then the active scope), integer literals, and
//!    double-quoted string literals.
//!
//! Operator, bracket, and comma searches only look at the top level of the
//! text: string literals and bracketed sub-expressions are skipped.

use std::rc::Rc;

use super::builtins::sequence_method;
use super::error::{Error, RuntimeError};
use super::value::{Instance, Operator, Value};

/// Name of the sequence-literal constructor.
pub const SEQUENCE_LITERAL: &str = ".lista";
/// Name of the mapping-literal constructor.
pub const MAPPING_LITERAL: &str = "#dicionario";

// ── EvalContext ───────────────────────────────────────────────────────────────

/// What the evaluator needs from the interpreter.
///
/// [`Interpreter`](super::interp::Interpreter) implements this so the
/// evaluator can resolve names and re-enter body execution for calls.
pub trait EvalContext {
    /// Resolve a bare name (constants, then the active scope).
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Bare call `name(args)`: host primitive, user function, or class
    /// instantiation.
    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Error>;

    /// Invoke a declared method on an instance.
    fn call_method(&mut self, inst: &Rc<Instance>, name: &str, args: Vec<Value>) -> Result<Value, Error>;

    /// Dispatch an operator to the instance's overload.
    fn handle_operator(&mut self, inst: &Rc<Instance>, op: Operator, other: Option<Value>) -> Result<Value, Error>;
}

// ── Binary operators ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Eq,
    Gt,
    Lt,
}

/// Search order; the first operator found at the top level splits.
const BINARY_OPERATORS: [(BinOp, &str); 4] = [
    (BinOp::Add, " + "),
    (BinOp::Eq, " == "),
    (BinOp::Gt, " > "),
    (BinOp::Lt, " < "),
];

impl BinOp {
    fn operator(self) -> Operator {
        match self {
            BinOp::Add => Operator::Add,
            BinOp::Eq => Operator::Eq,
            BinOp::Gt => Operator::Gt,
            BinOp::Lt => Operator::Lt,
        }
    }

    /// Native semantics on two non-instance values.
    fn apply(self, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
        match self {
            BinOp::Add => left.add(right),
            BinOp::Eq => Ok(Value::Bool(left == right)),
            BinOp::Gt => Ok(Value::Bool(left.compare(right)?.is_gt())),
            BinOp::Lt => Ok(Value::Bool(left.compare(right)?.is_lt())),
        }
    }
}

// ── Text scanning ─────────────────────────────────────────────────────────────

/// `true` for a non-empty run of word characters.
pub fn is_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Byte offset of the first top-level occurrence of `needle`.
fn find_top_level(expr: &str, needle: &str) -> Option<usize> {
    let bytes = expr.as_bytes();
    let mut depth = 0i32;
    let mut in_str = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_str = !in_str,
            b'(' | b'[' if !in_str => depth += 1,
            b')' | b']' if !in_str => depth -= 1,
            _ if !in_str && depth == 0 && bytes[i..].starts_with(needle.as_bytes()) => {
                return Some(i)
            }
            _ => {}
        }
    }
    None
}

/// Split on top-level commas, dropping empty pieces.
pub fn split_args(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_str = false;
    let mut start = 0;
    for (i, &b) in args.as_bytes().iter().enumerate() {
        match b {
            b'"' => in_str = !in_str,
            b'(' | b'[' if !in_str => depth += 1,
            b')' | b']' if !in_str => depth -= 1,
            b',' if !in_str && depth == 0 => {
                parts.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&args[start..]);
    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

/// Offset of the bracket opening the one that ends `expr`.
fn matching_open(expr: &str, open: u8, close: u8) -> Option<usize> {
    let bytes = expr.as_bytes();
    if bytes.last() != Some(&close) {
        return None;
    }
    let mut depth = 0i32;
    let mut in_str = false;
    for i in (0..bytes.len()).rev() {
        match bytes[i] {
            b'"' => in_str = !in_str,
            b if b == close && !in_str => depth += 1,
            b if b == open && !in_str => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a single top-level binary operation.
pub fn split_binary(expr: &str) -> Option<(BinOp, &str, &str)> {
    BINARY_OPERATORS.iter().find_map(|&(op, needle)| {
        find_top_level(expr, needle)
            .map(|at| (op, expr[..at].trim(), expr[at + needle.len()..].trim()))
    })
}

/// `<base>[<index>]` → `(base, index)`.
pub fn split_index(expr: &str) -> Option<(&str, &str)> {
    let open = matching_open(expr, b'[', b']')?;
    let base = expr[..open].trim();
    if base.is_empty() || split_binary(base).is_some() {
        return None;
    }
    Some((base, &expr[open + 1..expr.len() - 1]))
}

/// `<recv>.<name>` → `(recv, name)` where `name` is an identifier.
fn split_dotted(text: &str) -> Option<(&str, &str)> {
    let dot = text.rfind('.')?;
    let (recv, name) = (text[..dot].trim(), &text[dot + 1..]);
    if recv.is_empty() || !is_ident(name) || split_binary(recv).is_some() {
        return None;
    }
    Some((recv, name))
}

/// The call forms rule 2 recognises.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallShape<'a> {
    Method { recv: &'a str, name: &'a str, args: &'a str },
    Plain { name: &'a str, args: &'a str },
    SequenceLiteral { items: &'a str },
    MappingLiteral,
}

fn split_call(expr: &str) -> Option<CallShape<'_>> {
    let open = matching_open(expr, b'(', b')')?;
    let callee = expr[..open].trim_end();
    let args = &expr[open + 1..expr.len() - 1];
    if callee == SEQUENCE_LITERAL {
        return Some(CallShape::SequenceLiteral { items: args });
    }
    if callee == MAPPING_LITERAL {
        return Some(CallShape::MappingLiteral);
    }
    if is_ident(callee) {
        return Some(CallShape::Plain { name: callee, args });
    }
    split_dotted(callee).map(|(recv, name)| CallShape::Method { recv, name, args })
}

fn is_int_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn string_literal(s: &str) -> Option<&str> {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate `src` against `ctx`, with `recv` as the `self` instance when a
/// method body is executing.
pub fn eval_expr<C>(ctx: &mut C, src: &str, recv: Option<&Rc<Instance>>) -> Result<Value, Error>
where
    C: EvalContext + ?Sized,
{
    let expr = src.trim();
    if expr.is_empty() {
        return Err(Error::expression("empty expression"));
    }

    // 1. Receiver field.
    if let Some(field) = expr.strip_prefix("self.").filter(|f| is_ident(f)) {
        let inst = recv
            .ok_or_else(|| Error::expression(format!("'self.{field}' used outside of a method")))?;
        return inst.field(field).ok_or_else(|| {
            RuntimeError::undefined(format!("instance variable 'self.{field}' is not defined")).into()
        });
    }

    // 2. Calls and collection literals.
    if let Some(shape) = split_call(expr) {
        return eval_call(ctx, shape, recv);
    }

    // 3. Binary operators.
    if let Some((op, left, right)) = split_binary(expr) {
        let lhs = eval_expr(ctx, left, recv)?;
        let rhs = eval_expr(ctx, right, recv)?;
        if let Value::Instance(inst) = &lhs {
            return ctx.handle_operator(inst, op.operator(), Some(rhs));
        }
        return Ok(op.apply(&lhs, &rhs)?);
    }

    // 4. Indexing.
    if let Some((base, index)) = split_index(expr) {
        let collection = match ctx.lookup(base) {
            Some(v) => v,
            None if is_ident(base) => {
                return Err(RuntimeError::undefined(format!("collection '{base}' is not defined")).into())
            }
            None => eval_expr(ctx, base, recv)?,
        };
        let key = eval_expr(ctx, index, recv)?;
        return match &collection {
            Value::Instance(inst) => ctx.handle_operator(inst, Operator::GetItem, Some(key)),
            other => Ok(other.get_index(&key)?),
        };
    }

    // 5. Field of another instance.
    if let Some((owner, field)) = split_dotted(expr) {
        if ctx.lookup(expr).is_none() && !is_int_literal(owner) {
            return match eval_expr(ctx, owner, recv)? {
                Value::Instance(inst) => inst.field(field).ok_or_else(|| {
                    RuntimeError::undefined(format!(
                        "instance variable '{field}' is not defined on '{}'",
                        inst.class_name()
                    ))
                    .into()
                }),
                other => Err(RuntimeError::undefined(format!(
                    "cannot read field '{field}' of a {}",
                    other.type_name()
                ))
                .into()),
            };
        }
    }

    // 6. Names and literals.
    if let Some(v) = ctx.lookup(expr) {
        return Ok(v);
    }
    if is_int_literal(expr) {
        return expr
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| RuntimeError::failure(format!("integer literal out of range: {expr}")).into());
    }
    if let Some(s) = string_literal(expr) {
        return Ok(Value::Str(s.to_owned()));
    }

    Err(RuntimeError::undefined(format!("cannot resolve expression '{expr}'")).into())
}

fn eval_args<C>(ctx: &mut C, args: &str, recv: Option<&Rc<Instance>>) -> Result<Vec<Value>, Error>
where
    C: EvalContext + ?Sized,
{
    split_args(args).into_iter().map(|a| eval_expr(ctx, a, recv)).collect()
}

fn eval_call<C>(ctx: &mut C, shape: CallShape<'_>, recv: Option<&Rc<Instance>>) -> Result<Value, Error>
where
    C: EvalContext + ?Sized,
{
    match shape {
        CallShape::Method { recv: target, name, args } => {
            let target = eval_expr(ctx, target, recv)?;
            let args = eval_args(ctx, args, recv)?;
            match target {
                Value::Seq(seq) => Ok(sequence_method(&seq, name, args)?),
                Value::Instance(inst) => {
                    if inst.method(name).is_some() {
                        ctx.call_method(&inst, name, args)
                    } else if name == "len" && args.is_empty() && inst.overload(Operator::Len).is_some() {
                        ctx.handle_operator(&inst, Operator::Len, None)
                    } else {
                        Err(RuntimeError::invalid_call(format!(
                            "method '{name}' is not defined on class '{}'",
                            inst.class_name()
                        ))
                        .into())
                    }
                }
                other => Err(RuntimeError::invalid_call(format!(
                    "value of type {} has no method '{name}'",
                    other.type_name()
                ))
                .into()),
            }
        }
        CallShape::Plain { name, args } => {
            let args = eval_args(ctx, args, recv)?;
            ctx.call(name, args)
        }
        CallShape::SequenceLiteral { items } => Ok(Value::seq(eval_args(ctx, items, recv)?)),
        // Contents are deliberately not parsed: the literal is always empty.
        CallShape::MappingLiteral => Ok(Value::empty_map()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
