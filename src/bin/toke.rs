//! `toke`: the FCode tokenizer CLI (spec.md §6.4).
//!
//! Reads one source file, optionally chasing `-I` include paths for
//! `fload`, and writes the tokenized FCode block to `-o FILE` (or stdout).
//! Exit codes: `0` success, `1` a `TkError` was recorded, `2` a `Fatal`
//! aborted the run.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fcode_tools::{Config, Tokenizer};

#[derive(Parser, Debug)]
#[command(name = "toke", about = "Tokenize Open Firmware (FCode) source")]
struct Args {
    /// Source file to tokenize.
    source: PathBuf,

    /// Verbose diagnostic output.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Output file (defaults to stdout).
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Additional include-path for `fload`, repeatable.
    #[arg(short = 'I', value_name = "DIR")]
    include: Vec<String>,

    /// Pre-define NAME (optionally `NAME=VAL`) for `[DEFINED]`, repeatable.
    #[arg(short = 'd', value_name = "NAME[=VAL]")]
    define: Vec<String>,

    /// Add NAME to the symbol trace list, repeatable.
    #[arg(short = 'T', value_name = "NAME")]
    trace: Vec<String>,
}

fn build_config(args: &Args) -> Config {
    let mut config = Config::default();
    config.verbose = args.verbose;
    config.include_paths = args.include.clone();
    config.trace_names = args.trace.clone();
    config.output_path = args.output.as_ref().map(|p| p.display().to_string());
    config.predefined = args
        .define
        .iter()
        .map(|d| match d.split_once('=') {
            Some((name, val)) => (name.to_string(), Some(val.to_string())),
            None => (d.clone(), None),
        })
        .collect();
    config
}

fn run(args: Args) -> Result<i32, String> {
    let config = build_config(&args);
    let level = if config.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    let _ = env_logger::Builder::new().filter_level(level).try_init();

    let source_name = args.source.display().to_string();
    let bytes = fs::read(&args.source).map_err(|e| format!("cannot read {source_name}: {e}"))?;
    log::debug!("read {} bytes from {source_name}", bytes.len());

    let mut tok = Tokenizer::new(config, source_name.clone());
    tok.push_source(bytes, source_name);

    match tok.compile() {
        Ok(()) => {}
        Err(fatal) => {
            eprintln!("{fatal}");
            return Ok(2);
        }
    }

    for msg in tok.diags.messages() {
        eprintln!("{msg}");
    }

    if tok.diags.had_errors() {
        return Ok(1);
    }

    let out_bytes = tok.emitter.into_bytes();
    match &args.output {
        Some(path) => fs::write(path, &out_bytes).map_err(|e| format!("cannot write {}: {e}", path.display()))?,
        None => io::stdout().write_all(&out_bytes).map_err(|e| e.to_string())?,
    }
    Ok(0)
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(code) => ExitCode::from(code as u8),
        Err(message) => {
            eprintln!("toke: {message}");
            ExitCode::from(2)
        }
    }
}
