//! TyrtLang scripting engine.
//!
//! A line-oriented interpreter covering:
//!
//! - Variables (`tyrt x = …`) and write-once constants (`const N = …`)
//! - Conditionals, numeric-range and pre-test loops with `loop.break` /
//!   `loop.continue`
//! - Functions, classes with operator overloads (`___add___`, …)
//! - `Try` / `Except` / `Now` error handling
//!
//! # Quick start
//!
//! ```rust
//! use tyrt::script::Interpreter;
//!
//! let mut interp = Interpreter::new();
//! interp.run("tyrt x = 6\nprint|[x + 36]").unwrap();
//! assert_eq!(interp.output, vec!["42"]);
//! ```

pub mod builtins;
pub mod capture;
pub mod env;
pub mod error;
pub mod expr;
pub mod interp;
pub mod stmt;
pub mod value;

// Re-exports for convenience.
pub use error::{Error, LineError, RuntimeError};
pub use expr::EvalContext;
pub use interp::{FileLoader, Interpreter};
pub use value::Value;
