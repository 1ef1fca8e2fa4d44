//! The per-run execution context shared by every module.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::builtins::{self, Prototypes};
use super::console::Console;
use super::scope::Scope;
use super::value::{ObjectRef, Value};
use crate::error::{Error, Result, STACK_EXHAUSTED};
use crate::loader::LoaderOptions;

/// Environment for one run of the loader.
///
/// Each context has its own:
/// - global object (bindings visible to every module)
/// - console sink
/// - call-depth accounting and the chain of in-flight module loads
/// - result cache, used only when memoization is switched on
///
/// Contexts are single-threaded; independent runs need independent contexts.
pub struct ExecutionContext {
    options: LoaderOptions,
    global: ObjectRef,
    global_scope: Rc<Scope>,
    console: Console,
    prototypes: Prototypes,
    depth: Cell<usize>,
    in_flight: RefCell<Vec<PathBuf>>,
    cache: RefCell<FxHashMap<PathBuf, Value>>,
    executions: Cell<usize>,
}

impl ExecutionContext {
    /// Create a context writing console output to stdout/stderr.
    pub fn new(options: LoaderOptions) -> Self {
        Self::with_console(options, Console::Stdio)
    }

    /// Create a context with a specific console sink.
    pub fn with_console(options: LoaderOptions, console: Console) -> Self {
        let global: ObjectRef = Rc::new(RefCell::new(IndexMap::new()));
        builtins::install_globals(&global);
        Self {
            options,
            global,
            global_scope: Scope::root(),
            console,
            prototypes: Prototypes::new(),
            depth: Cell::new(0),
            in_flight: RefCell::default(),
            cache: RefCell::default(),
            executions: Cell::new(0),
        }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    /// The object behind `globalThis`.
    pub fn global(&self) -> &ObjectRef {
        &self.global
    }

    /// Scope every module function closes over.
    pub fn global_scope(&self) -> &Rc<Scope> {
        &self.global_scope
    }

    pub(crate) fn prototypes(&self) -> &Prototypes {
        &self.prototypes
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.global.borrow().get(name).cloned()
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.global.borrow_mut().insert(name.into(), value);
    }

    /// Current call depth.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Account for one more nested call, failing past `max_call_depth`.
    pub(crate) fn enter_call(&self) -> Result<CallGuard<'_>> {
        let depth = self.depth.get();
        if depth >= self.options.max_call_depth {
            return Err(Error::range_error(STACK_EXHAUSTED));
        }
        self.depth.set(depth + 1);
        Ok(CallGuard { ctx: self })
    }

    /// Mark `path` as being loaded until the guard drops.
    pub(crate) fn enter_module(&self, path: &Path) -> Result<ModuleGuard<'_>> {
        let mut in_flight = self.in_flight.borrow_mut();
        if self.options.detect_cycles && in_flight.iter().any(|p| p == path) {
            let start = in_flight.iter().position(|p| p == path).unwrap_or(0);
            let mut chain = in_flight[start..].to_vec();
            chain.push(path.to_path_buf());
            tracing::warn!(module = %path.display(), "circular dependency detected");
            return Err(Error::CircularDependency { chain });
        }
        in_flight.push(path.to_path_buf());
        Ok(ModuleGuard { ctx: self })
    }

    /// Modules currently being executed, outermost first.
    pub fn in_flight(&self) -> Vec<PathBuf> {
        self.in_flight.borrow().clone()
    }

    pub(crate) fn cached(&self, path: &Path) -> Option<Value> {
        self.cache.borrow().get(path).cloned()
    }

    pub(crate) fn cache_result(&self, path: PathBuf, value: Value) {
        self.cache.borrow_mut().insert(path, value);
    }

    pub(crate) fn record_execution(&self) {
        self.executions.set(self.executions.get() + 1);
    }

    /// Number of module bodies executed so far in this context.
    pub fn modules_executed(&self) -> usize {
        self.executions.get()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(LoaderOptions::default())
    }
}

/// Decrements the call depth on drop.
pub(crate) struct CallGuard<'ctx> {
    ctx: &'ctx ExecutionContext,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.ctx.depth.set(self.ctx.depth.get().saturating_sub(1));
    }
}

/// Pops the in-flight module on drop.
pub(crate) struct ModuleGuard<'ctx> {
    ctx: &'ctx ExecutionContext,
}

impl Drop for ModuleGuard<'_> {
    fn drop(&mut self) {
        self.ctx.in_flight.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_depth_is_bounded_and_restored() {
        let ctx = ExecutionContext::new(LoaderOptions::new().max_call_depth(2));
        {
            let _a = ctx.enter_call().unwrap();
            let _b = ctx.enter_call().unwrap();
            assert_eq!(ctx.depth(), 2);
            let err = ctx.enter_call().err().unwrap();
            assert!(err.is_stack_exhaustion());
        }
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_cycle_detection_is_opt_in() {
        let ctx = ExecutionContext::default();
        let _a = ctx.enter_module(Path::new("/a.js")).unwrap();
        let _again = ctx.enter_module(Path::new("/a.js")).unwrap();
        assert_eq!(ctx.in_flight().len(), 2);

        let ctx = ExecutionContext::new(LoaderOptions::new().detect_cycles(true));
        let _a = ctx.enter_module(Path::new("/a.js")).unwrap();
        let _b = ctx.enter_module(Path::new("/b.js")).unwrap();
        match ctx.enter_module(Path::new("/a.js")).err() {
            Some(Error::CircularDependency { chain }) => {
                assert_eq!(
                    chain,
                    vec![
                        PathBuf::from("/a.js"),
                        PathBuf::from("/b.js"),
                        PathBuf::from("/a.js")
                    ]
                );
            }
            other => panic!("expected a cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_globals_are_shared_through_global_object() {
        let ctx = ExecutionContext::default();
        ctx.set_global("answer", Value::Number(42.0));
        assert_eq!(
            ctx.get_global("answer").and_then(|v| v.as_number()),
            Some(42.0)
        );
        assert!(ctx.get_global("console").is_some());
    }
}
