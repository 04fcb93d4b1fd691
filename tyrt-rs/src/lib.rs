//! TyrtLang: a line-oriented scripting language interpreter.
//!
//! The engine lives in [`script`]; [`source`], [`cli`] and [`logging`] are
//! the thin layers the `tyrt` binary puts around it.

pub mod cli;
pub mod logging;
pub mod script;
pub mod source;
