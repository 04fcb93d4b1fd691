//! Script source acquisition.
//!
//! A single argument may name a script file or be the script itself.  The
//! argument is treated as a path when it is one line long and either ends in
//! a script extension or contains a path separator.  A path that does not
//! exist falls back to being run as code.

use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Extensions a script file must carry.
pub const VALID_EXTENSIONS: [&str; 2] = [".tyrt", ".t"];

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("'{}' is not a script file: expected one of {}", .path.display(), VALID_EXTENSIONS.join(", "))]
    BadExtension { path: PathBuf },

    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Script text plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File { path: PathBuf, text: String },
    Inline(String),
    Stdin(String),
}

fn has_valid_extension(arg: &str) -> bool {
    VALID_EXTENSIONS.iter().any(|ext| arg.ends_with(ext))
}

fn looks_like_path(arg: &str) -> bool {
    !arg.contains('\n') && (has_valid_extension(arg) || arg.contains('/') || arg.contains('\\'))
}

impl Source {
    /// Interpret a command-line argument as a script path or inline code.
    pub fn resolve(arg: &str) -> Result<Source, SourceError> {
        if !looks_like_path(arg) {
            return Ok(Source::Inline(arg.to_owned()));
        }
        let path = Path::new(arg);
        if !has_valid_extension(arg) {
            return Err(SourceError::BadExtension { path: path.to_owned() });
        }
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Source::File { path: path.to_owned(), text }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no such file; running argument as code");
                Ok(Source::Inline(arg.to_owned()))
            }
            Err(source) => Err(SourceError::Io { path: path.to_owned(), source }),
        }
    }

    /// Read the whole script from standard input.
    pub fn from_stdin() -> Result<Source, SourceError> {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|source| SourceError::Io { path: PathBuf::from("<stdin>"), source })?;
        Ok(Source::Stdin(text))
    }

    pub fn text(&self) -> &str {
        match self {
            Source::File { text, .. } => text,
            Source::Inline(text) | Source::Stdin(text) => text,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File { path, .. } => write!(f, "file '{}'", path.display()),
            Source::Inline(_) => f.write_str("inline code"),
            Source::Stdin(_) => f.write_str("standard input"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
