//! Ferry isolated runner
//!
//! Executes a single file with no `get` or `give` in scope.

use clap::Parser;
use ferry_engine::{run_isolated, ExecutionContext, LoaderOptions};

#[derive(Parser)]
#[command(name = "ferry-isolated")]
#[command(about = "Run one file in its own function scope, without module loading", long_about = None)]
#[command(version)]
struct Cli {
    /// File to run, relative to the current directory
    file: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    ferry_engine::init_tracing();

    let ctx = ExecutionContext::new(LoaderOptions::default());
    run_isolated(&ctx, &cli.file)?;
    Ok(())
}
