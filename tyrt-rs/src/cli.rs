//! Command-line argument parsing.
//!
//! Usage:
//!   tyrt [-dq] [-c <code>] [<script>]
//!
//! With neither `-c` nor a script argument the script is read from stdin.

// ── Public types ──────────────────────────────────────────────────────────────

pub const USAGE: &str = "Usage: tyrt [-dq] [-c <code>] [<script>]";

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Where the script comes from.
    pub script: ScriptArg,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// Suppress the start/finish banners (`-q`).
    pub quiet: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub enum ScriptArg {
    /// Read the script from standard input (no arguments).
    #[default]
    Stdin,
    /// `-c <code>`: run this text.
    Inline(String),
    /// A positional argument: a script path, or code (see
    /// [`Source::resolve`](crate::source::Source::resolve)).
    Path(String),
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        // Non-flag argument.
        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        // Flag argument: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,
                'q' => args.quiet = true,

                // -c<code> or -c <code>
                'c' => {
                    let code = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-c requires a code argument".to_owned());
                    };
                    args.script = ScriptArg::Inline(code);
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    match (positional.len(), &args.script) {
        (0, _) => {}
        (1, ScriptArg::Stdin) => args.script = ScriptArg::Path(positional.remove(0)),
        (1, _) => return Err("cannot combine -c with a script argument".to_owned()),
        (n, _) => return Err(format!("too many arguments ({n})")),
    }

    Ok(args)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
