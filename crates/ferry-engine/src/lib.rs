//! Ferry engine
//!
//! A minimal module loader. Each file is run as the body of a function that
//! receives two capabilities:
//!
//! - `get(filename)` loads another file, resolved relative to the calling
//!   file, and returns the value that file handed back
//! - `give(value)` sets the current file's result
//!
//! # Module Structure
//!
//! - `parser`: lexer, AST and parser for module source
//! - `interp`: values, scopes, built-in globals and the evaluator
//! - `loader`: resolution, `get`/`give` and the entry bootstrap
//! - `error`: the error type every operation returns
//! - `stack`: native stack growth for deep recursion
//!
//! # Example
//!
//! ```ignore
//! use ferry_engine::{run_entry, ExecutionContext};
//!
//! let ctx = ExecutionContext::default();
//! let value = run_entry(&ctx, "./main.js")?;
//! println!("{}", value.inspect());
//! ```

pub mod error;
pub mod interp;
pub mod loader;
pub mod parser;
pub mod stack;

pub use error::{Error, Location, Result, RuntimeErrorKind};
pub use interp::{Capture, Console, ExecutionContext, Value};
pub use loader::{run_entry, run_entry_in, run_isolated, run_isolated_in, Loader, LoaderOptions};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a stderr `tracing` subscriber, once per process.
///
/// Defaults to `warn`; set `RUST_LOG` (e.g. `RUST_LOG=ferry_engine=debug`)
/// to see module resolution and loading.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(filter)
            .init();
    });
}
