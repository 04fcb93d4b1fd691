//! Built-in operations: sequence methods and the host file-read primitive.
//!
//! Each built-in receives already-evaluated arguments.  Sequence methods are
//! dispatched from the evaluator when the receiver of a dotted call is a
//! sequence; `read_file` is dispatched from the interpreter's bare-call path.

use std::sync::Arc;

use super::error::RuntimeError;
use super::interp::FileLoader;
use super::value::{seq_slot, Sequence, Value};

/// Name of the host file-read primitive.
pub const READ_FILE: &str = "read_file";

/// Dispatch `seq.<name>(args)`.
pub fn sequence_method(seq: &Sequence, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match name {
        "len" => {
            if !args.is_empty() {
                return Err(RuntimeError::invalid_call(format!(
                    "len() takes no arguments, {} given",
                    args.len()
                )));
            }
            Ok(Value::Int(seq.borrow().len() as i64))
        }
        "append" => {
            let [item]: [Value; 1] = args.try_into().map_err(|args: Vec<Value>| {
                RuntimeError::invalid_call(format!("append() expects 1 argument, {} given", args.len()))
            })?;
            seq.borrow_mut().push(item);
            Ok(Value::Seq(seq.clone()))
        }
        "pop" => {
            if args.len() > 1 {
                return Err(RuntimeError::invalid_call(format!(
                    "pop() expects 0 or 1 argument (index), {} given",
                    args.len()
                )));
            }
            let index = args.into_iter().next().unwrap_or(Value::Int(-1));
            let mut items = seq.borrow_mut();
            let slot = seq_slot(items.len(), &index)
                .map_err(|_| RuntimeError::failure(format!("index {index} out of range for pop()")))?;
            Ok(items.remove(slot))
        }
        other => Err(RuntimeError::invalid_call(format!("unknown sequence method: {other}"))),
    }
}

/// `read_file(path)`: the file's contents as a string.
pub fn read_file(loader: &FileLoader, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let path = match args.as_slice() {
        [Value::Str(path)] => path,
        _ => {
            return Err(RuntimeError::invalid_call(
                "read_file() expects 1 argument: the file path (string)",
            ))
        }
    };
    tracing::debug!(path = %path, "read_file");
    loader(path)
        .map(Value::Str)
        .map_err(|e| RuntimeError::Io { path: path.clone(), source: Arc::new(e) })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
