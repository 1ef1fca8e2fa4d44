//! Turning module text into a callable function.

use std::path::Path;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::interp::eval::{call_function, instantiate};
use crate::interp::{ExecutionContext, Value};
use crate::parser::ast::{FunctionBodyKind, FunctionLiteral, Identifier};
use crate::parser::Parser;

/// Parameter names of a module function, in call order.
pub const MODULE_PARAMS: [&str; 2] = ["get", "give"];

/// A module body compiled into a function of `params`.
///
/// The function closes over the global scope only, so nothing a module
/// declares at top level leaks into other modules.
pub struct ModuleFunction {
    function: Value,
}

impl ModuleFunction {
    /// Parse `source` as a function body taking `params`.
    ///
    /// Nothing runs here; a syntax error anywhere in the file fails the
    /// whole module before any of its statements execute.
    pub fn wrap(ctx: &ExecutionContext, path: &Path, source: &str, params: &[&str]) -> Result<Self> {
        let body = Parser::new(source)
            .and_then(Parser::parse_function_body)
            .map_err(|e| Error::parse(path, &e))?;

        let literal = FunctionLiteral {
            name: None,
            params: params
                .iter()
                .map(|name| Identifier::new(*name, body.span))
                .collect(),
            span: body.span,
            body: FunctionBodyKind::Block(body),
            is_arrow: false,
        };
        Ok(Self {
            function: instantiate(ctx, Rc::new(literal), Rc::from(path)),
        })
    }

    /// Call the module with `args` bound to its parameters.
    ///
    /// The return value of the body is discarded; modules hand results back
    /// through `give`.
    pub fn invoke(&self, ctx: &ExecutionContext, args: Vec<Value>) -> Result<()> {
        call_function(ctx, &self.function, Value::Undefined, args).map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Console;
    use crate::loader::LoaderOptions;

    #[test]
    fn test_wrap_reports_syntax_errors_with_path() {
        let ctx = ExecutionContext::default();
        let err = ModuleFunction::wrap(&ctx, Path::new("/m/bad.js"), "let x = ;", &MODULE_PARAMS)
            .err()
            .unwrap();
        match err {
            Error::Parse { path, line, .. } => {
                assert_eq!(path, Path::new("/m/bad.js"));
                assert_eq!(line, 1);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_top_level_return_is_allowed() {
        let (console, capture) = Console::capture();
        let ctx = ExecutionContext::with_console(LoaderOptions::default(), console);
        let module = ModuleFunction::wrap(
            &ctx,
            Path::new("/m/early.js"),
            "console.log('a')\nreturn 5\nconsole.log('b')",
            &[],
        )
        .unwrap();
        module.invoke(&ctx, Vec::new()).unwrap();
        assert_eq!(capture.stdout(), vec!["a"]);
    }

    #[test]
    fn test_top_level_declarations_stay_local() {
        let ctx = ExecutionContext::default();
        let module =
            ModuleFunction::wrap(&ctx, Path::new("/m/local.js"), "const hidden = 1", &[]).unwrap();
        module.invoke(&ctx, Vec::new()).unwrap();
        assert!(ctx.get_global("hidden").is_none());
        assert!(ctx.global_scope().lookup("hidden").is_none());
    }
}
