//! Module loading: the `get` and `give` capabilities.
//!
//! Every module is handed its own `get`, bound to the module's absolute
//! path, and a fresh `give` that records the module's result. Loading a
//! module means:
//!
//! 1. resolve the requested name against the requester's directory
//! 2. read the file
//! 3. wrap the text as a function of `(get, give)`
//! 4. call it with a child `get` bound to the resolved path
//! 5. hand back whatever the last `give` call recorded
//!
//! By default nothing is cached and nothing guards against cycles; both are
//! opt-in through [`LoaderOptions`].

pub mod bootstrap;
pub mod options;
pub mod resolve;
pub mod wrap;

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::interp::{ExecutionContext, Value};
pub use bootstrap::{run_entry, run_entry_in, run_isolated, run_isolated_in};
pub use options::LoaderOptions;
pub use resolve::resolve;
use wrap::{ModuleFunction, MODULE_PARAMS};

/// A `get` capability bound to the file that owns it.
#[derive(Debug, Clone)]
pub struct Loader {
    parent: PathBuf,
}

impl Loader {
    /// Loader for code living at `parent`. Relative names resolve against
    /// `parent`'s directory.
    pub fn new(parent: impl Into<PathBuf>) -> Self {
        Self {
            parent: parent.into(),
        }
    }

    pub fn parent(&self) -> &Path {
        &self.parent
    }

    /// Directory relative names resolve against.
    pub fn directory(&self) -> PathBuf {
        resolve::parent_dir(&self.parent)
    }

    pub fn resolve(&self, filename: &str) -> PathBuf {
        resolve::resolve(&self.directory(), filename)
    }

    /// Load and execute `filename`, returning the value it gave.
    ///
    /// Every call reads and runs the file again unless memoization is on.
    pub fn get(&self, ctx: &ExecutionContext, filename: &str) -> Result<Value> {
        let path = self.resolve(filename);
        tracing::debug!(
            requested = filename,
            from = %self.parent.display(),
            resolved = %path.display(),
            "resolve module"
        );

        if ctx.options().memoize {
            if let Some(value) = ctx.cached(&path) {
                tracing::trace!(module = %path.display(), "cache hit");
                return Ok(value);
            }
        }

        let _in_flight = ctx.enter_module(&path)?;
        let source = read_module(&path)?;
        tracing::debug!(module = %path.display(), bytes = source.len(), "load module");
        let module = ModuleFunction::wrap(ctx, &path, &source, &MODULE_PARAMS)?;

        let slot = ResultSlot::new(path.clone());
        let child = Loader::new(path.clone());
        tracing::debug!(module = %path.display(), depth = ctx.depth(), "run module");
        module.invoke(ctx, vec![child.into_value(), slot.give()])?;
        ctx.record_execution();

        let value = slot.take();
        if ctx.options().memoize {
            ctx.cache_result(path, value.clone());
        }
        Ok(value)
    }

    /// The script-visible `get` function.
    pub fn into_value(self) -> Value {
        Value::native("get", move |ctx, _this, args| match args.first() {
            Some(Value::String(filename)) => self.get(ctx, filename),
            Some(other) => Err(Error::type_error(format!(
                "The \"filename\" argument must be of type string. Received {}",
                other.inspect()
            ))),
            None => Err(Error::type_error(
                "The \"filename\" argument must be of type string. Received undefined",
            )),
        })
    }
}

pub(crate) fn read_module(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Read {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Where a module's `give` writes its result.
///
/// The last call wins; `give()` with no argument records `undefined`.
#[derive(Debug, Clone)]
struct ResultSlot {
    path: Rc<Path>,
    value: Rc<RefCell<Value>>,
}

impl ResultSlot {
    fn new(path: PathBuf) -> Self {
        Self {
            path: Rc::from(path),
            value: Rc::default(),
        }
    }

    fn give(&self) -> Value {
        let slot = self.clone();
        Value::native("give", move |_, _, args| {
            let value = args.into_iter().next().unwrap_or_default();
            tracing::trace!(module = %slot.path.display(), value = ?value, "give");
            *slot.value.borrow_mut() = value;
            Ok(Value::Undefined)
        })
    }

    fn take(self) -> Value {
        self.value.take()
    }
}
