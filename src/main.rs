//! Command-line host: an interactive session, or a script-file runner.
//!
//! Everything here drives the interpreter through its public embedding
//! surface; the language core neither reads arguments nor touches the
//! terminal on its own.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use petitcl::{FlowChange, Interp};

/// A compact interpreter for a Tcl-like command language.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Script files to run in order, sharing one interpreter. With no
    /// files, starts an interactive session.
    scripts: Vec<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut interp = Interp::init();

    if args.scripts.is_empty() {
        repl(&mut interp)?;
        return Ok(ExitCode::SUCCESS);
    }

    for path in &args.scripts {
        let script =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        if let Err(change) = interp.eval(script.as_bytes()) {
            eprintln!("{}: {change}", path.display());
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Reads and evaluates lines until end of input or a `quit` line, echoing
/// each non-empty outcome as `[code] text`.
fn repl(interp: &mut Interp) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;

    loop {
        let line = match editor.readline("petitcl> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if line.trim() == "quit" {
            return Ok(());
        }
        editor.add_history_entry(&line)?;

        let (code, text) = match interp.eval(line.as_bytes()) {
            Ok(result) => ("ok", result),
            Err(FlowChange::Error(msg)) => ("err", msg),
            Err(FlowChange::Return(value)) => ("return", value),
            Err(FlowChange::Break) => ("break", petitcl::empty()),
            Err(FlowChange::Continue) => ("continue", petitcl::empty()),
        };
        if !text.is_empty() {
            println!("[{code}] {}", String::from_utf8_lossy(&text));
        }
    }
}
