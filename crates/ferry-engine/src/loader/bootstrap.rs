//! Entry points: starting a program from a single file.

use std::path::Path;

use super::resolve::resolve;
use super::wrap::ModuleFunction;
use super::{read_module, Loader};
use crate::error::{Error, Result};
use crate::interp::{ExecutionContext, Value};

/// Load `entry` as the main module, relative to the process working directory.
///
/// The entry is requested through a `get` whose parent is a synthetic
/// `<cwd>/__main__` file, so it resolves exactly like any other request.
pub fn run_entry(ctx: &ExecutionContext, entry: &str) -> Result<Value> {
    let cwd = std::env::current_dir().map_err(Error::CurrentDir)?;
    run_entry_in(ctx, &cwd, entry)
}

/// Like [`run_entry`] with an explicit working directory.
pub fn run_entry_in(ctx: &ExecutionContext, cwd: &Path, entry: &str) -> Result<Value> {
    let parent = cwd.join(&ctx.options().sentinel_name);
    tracing::debug!(entry, parent = %parent.display(), "bootstrap");
    Loader::new(parent).get(ctx, entry)
}

/// Run `path` on its own, with no `get` or `give` in scope.
///
/// The file shares the context's global object but cannot load other
/// modules, and there is no result to hand back.
pub fn run_isolated(ctx: &ExecutionContext, path: &str) -> Result<()> {
    let cwd = std::env::current_dir().map_err(Error::CurrentDir)?;
    run_isolated_in(ctx, &cwd, path)
}

/// Like [`run_isolated`] with an explicit working directory.
pub fn run_isolated_in(ctx: &ExecutionContext, cwd: &Path, path: &str) -> Result<()> {
    let path = resolve(cwd, path);
    tracing::debug!(module = %path.display(), "run isolated");
    let source = read_module(&path)?;
    let module = ModuleFunction::wrap(ctx, &path, &source, &[])?;
    module.invoke(ctx, Vec::new())?;
    ctx.record_execution();
    Ok(())
}
