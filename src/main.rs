//! ocigen - print a container configuration document
//!
//! ```text
//! ocigen                  # default document
//! ocigen template.json    # template, after pruning
//! ```
//!
//! The document is written to stdout, tab-indented. Logs go to stderr and
//! are controlled by `RUST_LOG`.

use std::process::ExitCode;

use ocigen::{logging, ExportOptions, Generator};

fn main() -> ExitCode {
    if let Err(e) = logging::init_logging() {
        eprintln!("ocigen: failed to initialize logging: {}", e);
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "failed to generate configuration");
            eprintln!("ocigen: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> ocigen::Result<()> {
    let mut generator = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(template = %path, "loading template");
            Generator::from_file(path)?
        }
        None => Generator::new(),
    };

    let stdout = std::io::stdout();
    generator.save(stdout.lock(), ExportOptions::default())?;
    println!();
    Ok(())
}
