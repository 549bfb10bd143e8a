//! Wisp CLI - REPL and file-run entry point for the Wisp scripting language.
//!
//! Zero positional arguments starts an interactive REPL reading one line at
//! a time; one positional argument runs that file and exits with the code
//! spec.md §6 prescribes (0 / 65 / 70).

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wispc_vm::{InterpretResult, Vm};

/// Wisp - a bytecode compiler and VM for a small dynamically-typed language
#[derive(Parser, Debug)]
#[command(name = "wisp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a Wisp script, or start the REPL with no arguments", long_about = None)]
struct Cli {
    /// Script to run. Omit to start the REPL.
    path: Option<PathBuf>,

    /// Enable verbose logging (raises the tracing filter to debug)
    #[arg(short, long, env = "WISP_VERBOSE")]
    verbose: bool,

    /// Disable ANSI color in REPL/diagnostic output
    #[arg(long, env = "WISP_NO_COLOR")]
    no_color: bool,

    /// Force a garbage collection on every allocator growth call
    #[arg(long, env = "WISP_STRESS_GC")]
    stress_gc: bool,

    /// Log bytes reclaimed and the new threshold after each collection
    #[arg(long, env = "WISP_GC_LOG")]
    gc_heap_log: bool,

    /// Print each chunk's disassembly before running it
    #[arg(long, env = "WISP_DISASSEMBLE")]
    disassemble: bool,
}

/// The CLI carries no project/config file (spec.md §6 names no persisted
/// formats): this struct is just the parsed flags, reshaped for the run
/// functions below.
struct Config {
    no_color: bool,
    stress_gc: bool,
    gc_heap_log: bool,
    disassemble: bool,
}

impl From<&Cli> for Config {
    fn from(cli: &Cli) -> Self {
        Self {
            no_color: cli.no_color,
            stress_gc: cli.stress_gc,
            gc_heap_log: cli.gc_heap_log,
            disassemble: cli.disassemble,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.no_color, cli.gc_heap_log);

    let config = Config::from(&cli);
    let mut vm = Vm::new();
    vm.set_stress_gc(config.stress_gc);
    vm.set_disassemble(config.disassemble);

    let result = match &cli.path {
        Some(path) => run_file(&mut vm, path),
        None => run_repl(&mut vm, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

/// Reads the entire file, runs it once, and maps the outcome to spec.md §6's
/// exit-code contract.
fn run_file(vm: &mut Vm, path: &PathBuf) -> Result<u8> {
    let bytes = std::fs::read(path).with_context(|| format!("couldn't read {}", path.display()))?;
    Ok(exit_code_for(vm.interpret(&bytes)))
}

fn exit_code_for(result: InterpretResult) -> u8 {
    match result {
        InterpretResult::Ok => 0,
        InterpretResult::CompileError => 65,
        InterpretResult::RuntimeError => 70,
    }
}

fn init_logging(verbose: bool, no_color: bool, gc_heap_log: bool) {
    let directives = match (verbose, gc_heap_log) {
        (true, _) => "debug",
        (false, true) => "warn,wispc_core=debug",
        (false, false) => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let subscriber = fmt::layer().with_ansi(!no_color).with_target(false).with_writer(io::stderr);

    let _ = tracing_subscriber::registry().with(filter).with(subscriber).try_init();
}

/// One `Vm` runs every line; its heap, globals, and interned strings persist
/// across lines, so a function or variable defined on one line is visible on
/// the next (spec.md §7).
fn run_repl(vm: &mut Vm, config: &Config) -> Result<u8> {
    let prompt = if config.no_color { "> " } else { "\x1b[1;32m>\x1b[0m " };
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("{prompt}");
        io::stdout().flush().ok();
        line.clear();
        let bytes_read = stdin.lock().read_line(&mut line).context("reading from stdin")?;
        if bytes_read == 0 {
            println!();
            break;
        }
        vm.interpret(line.as_bytes());
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_zero_args_as_repl_mode() {
        let cli = Cli::parse_from(["wisp"]);
        assert!(cli.path.is_none());
    }

    #[test]
    fn cli_parses_one_positional_as_file_mode() {
        let cli = Cli::parse_from(["wisp", "script.wisp"]);
        assert_eq!(cli.path, Some(PathBuf::from("script.wisp")));
    }

    #[test]
    fn cli_parses_verbose_flag() {
        let cli = Cli::parse_from(["wisp", "-v", "script.wisp"]);
        assert!(cli.verbose);
    }

    #[test]
    fn cli_parses_stress_gc_flag() {
        let cli = Cli::parse_from(["wisp", "--stress-gc", "script.wisp"]);
        assert!(cli.stress_gc);
    }

    #[test]
    fn exit_code_mapping_matches_spec() {
        assert_eq!(exit_code_for(InterpretResult::Ok), 0);
        assert_eq!(exit_code_for(InterpretResult::CompileError), 65);
        assert_eq!(exit_code_for(InterpretResult::RuntimeError), 70);
    }
}
