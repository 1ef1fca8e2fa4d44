//! Run options for the module loader.

/// Default limit on nested calls before `RangeError`.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 2048;

/// File name of the synthetic parent the entry module is loaded from.
pub const DEFAULT_SENTINEL_NAME: &str = "__main__";

/// Options for one run of the loader.
///
/// The defaults give the plain behaviour: every `get` reads and executes the
/// file again, and a cycle recurses until the call-depth limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Cache each module's result by absolute path
    pub memoize: bool,

    /// Fail with `CircularDependency` when a module requests itself transitively
    pub detect_cycles: bool,

    /// Nested calls allowed before `Maximum call stack size exceeded`
    pub max_call_depth: usize,

    /// Name joined onto the working directory to form the entry's parent
    pub sentinel_name: String,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            memoize: false,
            detect_cycles: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            sentinel_name: DEFAULT_SENTINEL_NAME.to_string(),
        }
    }
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    pub fn detect_cycles(mut self, detect_cycles: bool) -> Self {
        self.detect_cycles = detect_cycles;
        self
    }

    /// Set the call-depth limit. Zero is raised to one so the entry can run.
    pub fn max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth.max(1);
        self
    }

    pub fn sentinel_name(mut self, sentinel_name: impl Into<String>) -> Self {
        self.sentinel_name = sentinel_name.into();
        self
    }
}
