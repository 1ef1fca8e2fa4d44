//! Integration tests for module loading
//!
//! Tests the full `get`/`give` pipeline against real files: resolution,
//! result hand-back, re-execution, cycles, and failure modes.

use std::fs;
use std::path::Path;

use ferry_engine::{
    run_entry_in, run_isolated_in, Capture, Console, Error, ExecutionContext, LoaderOptions,
    RuntimeErrorKind, Value,
};
use tempfile::TempDir;

/// Write `files` into a fresh temporary directory.
fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    for (name, source) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, source).unwrap();
    }
    dir
}

fn context(options: LoaderOptions) -> (ExecutionContext, Capture) {
    let (console, capture) = Console::capture();
    (ExecutionContext::with_console(options, console), capture)
}

fn run(dir: &Path, entry: &str) -> (Result<Value, Error>, Capture) {
    let (ctx, capture) = context(LoaderOptions::default());
    (run_entry_in(&ctx, dir, entry), capture)
}

// ────────────────────────────────────────────────────────────────────────────
// give
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_entry_gives_value() {
    let dir = project(&[("main.js", "give(42)")]);
    let (value, _) = run(dir.path(), "./main.js");
    assert_eq!(value.unwrap().as_number(), Some(42.0));
}

#[test]
fn test_module_without_give_is_undefined() {
    let dir = project(&[("main.js", ""), ("quiet.js", "const x = 1")]);
    assert!(run(dir.path(), "./main.js").0.unwrap().is_undefined());
    assert!(run(dir.path(), "quiet.js").0.unwrap().is_undefined());
}

#[test]
fn test_last_give_wins() {
    let dir = project(&[("main.js", "give(1)\ngive('two')\ngive({ n: 3 })")]);
    let value = run(dir.path(), "./main.js").0.unwrap();
    assert_eq!(value.inspect(), "{ n: 3 }");
}

#[test]
fn test_give_without_argument_resets_to_undefined() {
    let dir = project(&[("main.js", "give(1)\ngive()")]);
    assert!(run(dir.path(), "./main.js").0.unwrap().is_undefined());
}

#[test]
fn test_extensionless_modules() {
    let dir = project(&[
        ("main", "const x = get('./util'); give(x + 1)"),
        ("util", "give(41)"),
        ("util.js", "give(0)"),
    ]);
    assert_eq!(run(dir.path(), "main").0.unwrap().as_number(), Some(42.0));
}

#[test]
fn test_no_extension_is_inferred() {
    let dir = project(&[("main", "get('./util')"), ("util.js", "give(41)")]);
    match run(dir.path(), "main").0 {
        Err(Error::FileNotFound { path }) => assert_eq!(path, dir.path().join("util")),
        other => panic!("expected FileNotFound, got {:?}", other),
    }
}

#[test]
fn test_dependency_result_flows_back() {
    let dir = project(&[
        ("main.js", "const add = get('./math.js')\ngive(add(3, 4))"),
        ("math.js", "give((a, b) => a + b)"),
    ]);
    assert_eq!(run(dir.path(), "./main.js").0.unwrap().as_number(), Some(7.0));
}

// ────────────────────────────────────────────────────────────────────────────
// Resolution
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_paths_resolve_against_requesting_file() {
    let dir = project(&[
        ("main.js", "give(get('./lib/a.js'))"),
        ("lib/a.js", "give('a:' + get('./b.js') + ':' + get('../top.js'))"),
        ("lib/b.js", "give('b')"),
        ("top.js", "give('top')"),
    ]);
    assert_eq!(run(dir.path(), "./main.js").0.unwrap().as_str(), Some("a:b:top"));
}

#[test]
fn test_resolution_ignores_process_cwd() {
    let dir = project(&[
        ("app/main.js", "give(get('./dep.js'))"),
        ("app/dep.js", "give('found')"),
    ]);
    // The entry is requested from the project root; `dep.js` still resolves
    // next to `main.js`.
    let value = run(dir.path(), "app/main.js").0.unwrap();
    assert_eq!(value.as_str(), Some("found"));
}

#[test]
fn test_absolute_request() {
    let dir = project(&[("abs.js", "give('abs')")]);
    let absolute = dir.path().join("abs.js");
    let other = project(&[]);
    let value = run(other.path(), absolute.to_str().unwrap()).0.unwrap();
    assert_eq!(value.as_str(), Some("abs"));
}

// ────────────────────────────────────────────────────────────────────────────
// Re-execution and shared state
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_repeated_get_executes_again() {
    let dir = project(&[
        ("main.js", "get('./count.js')\nget('./count.js')\ngive(globalThis.loads)"),
        ("count.js", "globalThis.loads = (globalThis.loads ?? 0) + 1\nconsole.log('loaded')"),
    ]);
    let (ctx, capture) = context(LoaderOptions::default());
    let value = run_entry_in(&ctx, dir.path(), "./main.js").unwrap();
    assert_eq!(value.as_number(), Some(2.0));
    assert_eq!(capture.stdout(), vec!["loaded", "loaded"]);
    assert_eq!(ctx.modules_executed(), 3);
}

#[test]
fn test_each_get_returns_a_fresh_value() {
    let dir = project(&[
        ("main.js", "const a = get('./obj.js'); const b = get('./obj.js'); give(a === b)"),
        ("obj.js", "give({})"),
    ]);
    assert_eq!(run(dir.path(), "./main.js").0.unwrap().inspect(), "false");
}

#[test]
fn test_memoize_runs_each_module_once() {
    let dir = project(&[
        ("main.js", "const a = get('./obj.js'); const b = get('./obj.js'); give(a === b)"),
        ("obj.js", "console.log('ran')\ngive({})"),
    ]);
    let (ctx, capture) = context(LoaderOptions::new().memoize(true));
    let value = run_entry_in(&ctx, dir.path(), "./main.js").unwrap();
    assert_eq!(value.inspect(), "true");
    assert_eq!(capture.stdout(), vec!["ran"]);
}

#[test]
fn test_top_level_bindings_do_not_leak_between_modules() {
    let dir = project(&[
        ("main.js", "const secret = 1\ngive(get('./peek.js'))"),
        ("peek.js", "give(typeof secret)"),
    ]);
    assert_eq!(run(dir.path(), "./main.js").0.unwrap().as_str(), Some("undefined"));
}

#[test]
fn test_globals_are_shared() {
    let dir = project(&[
        ("main.js", "shared = 'from main'\ngive(get('./read.js'))"),
        ("read.js", "give(shared)"),
    ]);
    assert_eq!(run(dir.path(), "./main.js").0.unwrap().as_str(), Some("from main"));
}

// ────────────────────────────────────────────────────────────────────────────
// Cycles
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_cycle_exhausts_call_stack() {
    let dir = project(&[("a.js", "get('./b.js')"), ("b.js", "get('./a.js')")]);
    let (ctx, _) = context(LoaderOptions::new().max_call_depth(200));
    let err = run_entry_in(&ctx, dir.path(), "./a.js").unwrap_err();
    assert!(err.is_stack_exhaustion(), "got {}", err);
    assert_eq!(ctx.depth(), 0);
    assert!(ctx.in_flight().is_empty());
}

#[test]
fn test_self_request_exhausts_call_stack() {
    let dir = project(&[("self.js", "get('./self.js')")]);
    let (ctx, _) = context(LoaderOptions::new().max_call_depth(100));
    let err = run_entry_in(&ctx, dir.path(), "./self.js").unwrap_err();
    assert_eq!(err.runtime_kind(), Some(RuntimeErrorKind::RangeError));
}

#[test]
fn test_cycle_detection_reports_chain() {
    let dir = project(&[("a.js", "get('./b.js')"), ("b.js", "get('./a.js')")]);
    let (ctx, _) = context(LoaderOptions::new().detect_cycles(true));
    match run_entry_in(&ctx, dir.path(), "./a.js") {
        Err(Error::CircularDependency { chain }) => {
            let names: Vec<_> = chain
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect();
            assert_eq!(names, vec!["a.js", "b.js", "a.js"]);
        }
        other => panic!("expected CircularDependency, got {:?}", other),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Failures
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_missing_dependency_fails_before_dependency_runs() {
    let dir = project(&[("main.js", "console.log('before')\nget('./missing.js')\nconsole.log('after')")]);
    let (value, capture) = run(dir.path(), "./main.js");
    match value {
        Err(Error::FileNotFound { path }) => {
            assert_eq!(path, dir.path().join("missing.js"));
        }
        other => panic!("expected FileNotFound, got {:?}", other),
    }
    assert_eq!(capture.stdout(), vec!["before"]);
}

#[test]
fn test_missing_entry() {
    let dir = project(&[]);
    let err = run(dir.path(), "./nope.js").0.unwrap_err();
    assert!(err.to_string().starts_with("Cannot find module"));
}

#[test]
fn test_syntax_error_names_file_and_line() {
    let dir = project(&[
        ("main.js", "get('./broken.js')"),
        ("broken.js", "console.log('never')\nlet = 5"),
    ]);
    let (value, capture) = run(dir.path(), "./main.js");
    match value {
        Err(Error::Parse { path, line, .. }) => {
            assert_eq!(path, dir.path().join("broken.js"));
            assert_eq!(line, 2);
        }
        other => panic!("expected Parse, got {:?}", other),
    }
    assert!(capture.stdout().is_empty());
}

#[test]
fn test_runtime_error_propagates_unchanged() {
    let dir = project(&[
        ("main.js", "get('./deep.js')"),
        ("deep.js", "get('./deeper.js')"),
        ("deeper.js", "\n\nundefinedThing()"),
    ]);
    let err = run(dir.path(), "./main.js").0.unwrap_err();
    match &err {
        Error::Runtime {
            kind: RuntimeErrorKind::ReferenceError,
            location: Some(location),
            ..
        } => {
            assert_eq!(location.path, dir.path().join("deeper.js"));
            assert_eq!(location.line, 3);
        }
        other => panic!("expected located ReferenceError, got {:?}", other),
    }
    assert!(err.to_string().contains("undefinedThing is not defined"));
}

#[test]
fn test_self_containing_array_is_a_value_not_a_crash() {
    let dir = project(&[("main.js", "const a = [1]; a.push(a); give(a + '' + a.join('-'))")]);
    assert_eq!(run(dir.path(), "./main.js").0.unwrap().as_str(), Some("1,1-"));
}

#[test]
fn test_leading_byte_order_mark() {
    let dir = project(&[("main.js", "\u{feff}give(1)")]);
    assert_eq!(run(dir.path(), "./main.js").0.unwrap().as_number(), Some(1.0));
}

#[test]
fn test_thrown_value_surfaces() {
    let dir = project(&[("main.js", "throw Error('nope')")]);
    let err = run(dir.path(), "./main.js").0.unwrap_err();
    assert_eq!(err.runtime_kind(), Some(RuntimeErrorKind::Thrown));
}

// ────────────────────────────────────────────────────────────────────────────
// Isolated variant
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_isolated_runs_file() {
    let dir = project(&[("solo.js", "console.log(typeof get, typeof give)")]);
    let (ctx, capture) = context(LoaderOptions::default());
    run_isolated_in(&ctx, dir.path(), "solo.js").unwrap();
    assert_eq!(capture.stdout(), vec!["undefined undefined"]);
}

#[test]
fn test_isolated_cannot_load_modules() {
    let dir = project(&[("solo.js", "get('./other.js')"), ("other.js", "")]);
    let (ctx, _) = context(LoaderOptions::default());
    let err = run_isolated_in(&ctx, dir.path(), "solo.js").unwrap_err();
    assert_eq!(err.runtime_kind(), Some(RuntimeErrorKind::ReferenceError));
}

#[test]
fn test_isolated_missing_file() {
    let dir = project(&[]);
    let (ctx, _) = context(LoaderOptions::default());
    let err = run_isolated_in(&ctx, dir.path(), "gone.js").unwrap_err();
    match err {
        Error::FileNotFound { path } => assert_eq!(path, dir.path().join("gone.js")),
        other => panic!("expected FileNotFound, got {:?}", other),
    }
}
