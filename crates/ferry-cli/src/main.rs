//! Ferry command-line runner
//!
//! Loads one entry file through the `get`/`give` module loader. The entry's
//! result is discarded; any failure is reported on stderr with exit code 1.

use clap::Parser;
use ferry_engine::{run_entry, ExecutionContext, LoaderOptions};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Run a module and everything it requests with get()", long_about = None)]
#[command(version)]
struct Cli {
    /// Entry module, relative to the current directory
    file: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    ferry_engine::init_tracing();

    let ctx = ExecutionContext::new(LoaderOptions::default());
    run_entry(&ctx, &cli.file)?;
    Ok(())
}
