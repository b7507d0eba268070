//! `detok`: the FCode detokenizer CLI (spec.md §6.5).
//!
//! Reads one or more FCode binaries and prints a readable listing for
//! each. `-f FILE` loads additional vendor FCode name assignments before
//! decoding begins (spec.md §6.6).

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fcode_tools::detok::Detokenizer;
use fcode_tools::Config;

#[derive(Parser, Debug)]
#[command(name = "detok", about = "Detokenize Open Firmware (FCode) binaries")]
struct Args {
    /// FCode binaries to detokenize.
    inputs: Vec<PathBuf>,

    /// Verbose output: print FCode-number comments beside named tokens.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Continue decoding past `end0`.
    #[arg(short = 'a', long = "all")]
    continue_past_end0: bool,

    /// Show line numbers beside each decoded line.
    #[arg(short = 'n', long = "numbers")]
    show_line_numbers: bool,

    /// Show byte offsets beside each decoded line (supersedes `-n`).
    #[arg(short = 'o', long = "offsets")]
    show_byte_offsets: bool,

    /// Load additional user-defined FCode name assignments, repeatable.
    #[arg(short = 'f', value_name = "FILE")]
    fcode_table: Vec<PathBuf>,
}

fn build_config(args: &Args) -> Config {
    let mut config = Config::default();
    config.verbose = args.verbose;
    config.continue_past_end0 = args.continue_past_end0;
    config.show_line_numbers = args.show_line_numbers;
    config.show_byte_offsets = args.show_byte_offsets;
    config
}

fn run(args: Args) -> Result<i32, String> {
    let config = build_config(&args);
    let level = if config.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    let _ = env_logger::Builder::new().filter_level(level).try_init();

    let mut detok = Detokenizer::new(config);

    for path in &args.fcode_table {
        let text = fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        let name = path.display().to_string();
        detok.user_tokens.load(&text, &name, &mut detok.diags);
    }

    let mut had_errors = false;
    for path in &args.inputs {
        let bytes = fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        log::debug!("read {} bytes from {}", bytes.len(), path.display());
        for line in detok.decode(&bytes) {
            println!("{}", line.text);
        }
    }
    for msg in detok.diags.messages() {
        eprintln!("{msg}");
    }
    if detok.diags.had_errors() {
        had_errors = true;
    }
    Ok(if had_errors { 1 } else { 0 })
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(code) => ExitCode::from(code as u8),
        Err(message) => {
            eprintln!("detok: {message}");
            ExitCode::from(2)
        }
    }
}
