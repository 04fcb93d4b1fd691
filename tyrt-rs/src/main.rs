use std::process::ExitCode;

use tyrt::cli::{self, ScriptArg};
use tyrt::logging::init_tracing;
use tyrt::script::Interpreter;
use tyrt::source::Source;

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("tyrt: {e}");
            eprintln!("{}", cli::USAGE);
            return ExitCode::from(2);
        }
    };

    init_tracing(args.debug);

    let source = match args.script {
        ScriptArg::Inline(code) => Ok(Source::Inline(code)),
        ScriptArg::Path(arg) => Source::resolve(&arg),
        ScriptArg::Stdin => Source::from_stdin(),
    };
    let source = match source {
        Ok(s) => s,
        Err(e) => {
            eprintln!("tyrt: {e}");
            return ExitCode::from(2);
        }
    };

    // ── Banners go to stderr so stdout carries only script output ────────────
    let ver = env!("CARGO_PKG_VERSION");
    if !args.quiet {
        eprintln!("--- tyrt {ver}: running {source} ---");
    }

    let mut interp = Interpreter::new();
    interp.echo_stdout = true;
    let result = interp.run(source.text());

    let status = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(line = e.line, error = ?e.error, "run halted");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    };
    if !args.quiet {
        eprintln!("--- tyrt finished ---");
    }
    status
}
