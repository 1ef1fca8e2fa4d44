//! Error types for loading and running modules.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::parser::{ParseError, Span};

/// Which kind of script-level failure a [`Error::Runtime`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeErrorKind {
    /// Reading an undeclared identifier
    ReferenceError,
    /// Calling a non-function, writing a constant, bad argument types
    TypeError,
    /// Call-depth exhaustion and out-of-range arguments
    RangeError,
    /// A value raised by a `throw` statement
    Thrown,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuntimeErrorKind::ReferenceError => "ReferenceError",
            RuntimeErrorKind::TypeError => "TypeError",
            RuntimeErrorKind::RangeError => "RangeError",
            RuntimeErrorKind::Thrown => "Uncaught",
        })
    }
}

/// A position inside a module file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

fn at(location: &Option<Location>) -> String {
    match location {
        Some(location) => format!("\n    at {}", location),
        None => String::new(),
    }
}

fn format_chain(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Everything that can go wrong while loading or running a module.
///
/// Nothing in the loader catches these; an error raised in a deeply nested
/// module reaches the caller of the entry point unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The resolved module path does not exist
    #[error("Cannot find module '{}'", .path.display())]
    FileNotFound { path: PathBuf },

    /// The module exists but could not be read as UTF-8 text
    #[error("Failed to read module '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The process working directory is unavailable
    #[error("Cannot determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// Malformed module text
    #[error("{}:{line}:{column}: SyntaxError: {message}", .path.display())]
    Parse {
        path: PathBuf,
        message: String,
        line: u32,
        column: u32,
    },

    /// A failure while executing module code
    #[error("{kind}: {message}{}", at(.location))]
    Runtime {
        kind: RuntimeErrorKind,
        message: String,
        location: Option<Location>,
    },

    /// Only raised when cycle detection is switched on
    #[error("Circular dependency detected: {}", format_chain(.chain))]
    CircularDependency { chain: Vec<PathBuf> },
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// A runtime error with no location yet.
    pub fn runtime(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Error::Runtime {
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::runtime(RuntimeErrorKind::ReferenceError, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::runtime(RuntimeErrorKind::TypeError, message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::runtime(RuntimeErrorKind::RangeError, message)
    }

    /// Convert a parser failure for the module at `path`.
    pub fn parse(path: &Path, error: &ParseError) -> Self {
        Error::Parse {
            path: path.to_path_buf(),
            message: error.to_string(),
            line: error.span.line,
            column: error.span.column,
        }
    }

    /// Attach a source location to an unlocated runtime error.
    ///
    /// The first location wins, so the innermost expression is reported.
    pub fn located(self, path: &Path, span: &Span) -> Self {
        match self {
            Error::Runtime {
                kind,
                message,
                location: None,
            } => Error::Runtime {
                kind,
                message,
                location: Some(Location {
                    path: path.to_path_buf(),
                    line: span.line,
                    column: span.column,
                }),
            },
            other => other,
        }
    }

    /// The runtime kind, if this is a runtime error.
    pub fn runtime_kind(&self) -> Option<RuntimeErrorKind> {
        match self {
            Error::Runtime { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether this is the call-depth exhaustion failure.
    pub fn is_stack_exhaustion(&self) -> bool {
        matches!(
            self,
            Error::Runtime { kind: RuntimeErrorKind::RangeError, message, .. }
                if message == STACK_EXHAUSTED
        )
    }
}

pub(crate) const STACK_EXHAUSTED: &str = "Maximum call stack size exceeded";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_location_wins() {
        let inner = Span::new(10, 12, 3, 5);
        let outer = Span::new(0, 20, 1, 1);
        let err = Error::type_error("x is not a function")
            .located(Path::new("/m/a.js"), &inner)
            .located(Path::new("/m/b.js"), &outer);
        match err {
            Error::Runtime {
                location: Some(location),
                ..
            } => {
                assert_eq!(location.path, PathBuf::from("/m/a.js"));
                assert_eq!((location.line, location.column), (3, 5));
            }
            other => panic!("expected located runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_display_formats() {
        let err = Error::FileNotFound {
            path: PathBuf::from("/m/missing.js"),
        };
        assert_eq!(err.to_string(), "Cannot find module '/m/missing.js'");

        let err = Error::reference_error("foo is not defined")
            .located(Path::new("/m/a.js"), &Span::new(0, 3, 2, 7));
        assert_eq!(
            err.to_string(),
            "ReferenceError: foo is not defined\n    at /m/a.js:2:7"
        );

        let err = Error::CircularDependency {
            chain: vec![PathBuf::from("/a.js"), PathBuf::from("/b.js"), PathBuf::from("/a.js")],
        };
        assert_eq!(
            err.to_string(),
            "Circular dependency detected: /a.js -> /b.js -> /a.js"
        );
    }

    #[test]
    fn test_stack_exhaustion_is_recognised() {
        assert!(Error::range_error(STACK_EXHAUSTED).is_stack_exhaustion());
        assert!(!Error::range_error("Invalid array length").is_stack_exhaustion());
        assert!(!Error::type_error(STACK_EXHAUSTED).is_stack_exhaustion());
    }
}
