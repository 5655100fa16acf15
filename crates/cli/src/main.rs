//! rlox - command-line entry point: run a script, or start a REPL.

mod error;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use error::CliError;

#[derive(ClapParser)]
#[command(name = "rlox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A bytecode interpreter for the rlox language", long_about = None)]
struct Args {
    /// Print the compiled chunk's disassembly instead of running it
    #[arg(long)]
    disassemble: bool,

    /// Source file to run (omit for an interactive REPL); at most one
    /// is accepted, collected as a `Vec` so a second positional can be
    /// rejected as a usage error instead of being silently ignored.
    scripts: Vec<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("RLOX_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            e.exit_code()
        }
    };
    ExitCode::from(code as u8)
}

fn run(args: Args) -> Result<i32, CliError> {
    let mut scripts = args.scripts.into_iter();
    let script = scripts.next();
    if scripts.next().is_some() {
        return Err(CliError::Usage("Usage: rlox [path]".to_string()));
    }
    match script {
        Some(path) => run_file(&path, args.disassemble),
        None => {
            run_repl();
            Ok(0)
        }
    }
}

fn run_file(path: &PathBuf, disassemble: bool) -> Result<i32, CliError> {
    let source = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.clone(),
        source,
    })?;

    if disassemble {
        return Ok(disassemble_source(&source));
    }

    let mut vm = rlox_vm::Vm::new();
    let result = vm.interpret(&source);
    if let Err(e) = &result {
        eprint!("{e}");
    }
    Ok(rlox_vm::exit_code(&result))
}

fn disassemble_source(source: &str) -> i32 {
    let mut heap = rlox_core::Heap::new();
    match rlox_compiler::compile(source, &mut heap) {
        Ok(function) => {
            print!("{}", rlox_core::chunk::disassemble(&function.as_function().chunk, "script"));
            0
        }
        Err(e) => {
            eprint!("{e}");
            65
        }
    }
}

fn run_repl() {
    let mut vm = rlox_vm::Vm::new();
    let mut editor = DefaultEditor::new().expect("failed to initialize line editor");
    let history_path = history_path();
    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);
                if let Err(e) = vm.interpret(&line) {
                    eprint!("{e}");
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }
}

fn history_path() -> Option<PathBuf> {
    home::home_dir().map(|mut home| {
        home.push(".rlox_history");
        home
    })
}
