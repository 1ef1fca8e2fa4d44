//! Parser guards to prevent infinite loops and runaway nesting

use super::{ParseError, Parser};
use crate::parser::token::Span;

/// Maximum iterations for any parser loop before bailing out
const MAX_LOOP_ITERATIONS: usize = 100_000;

/// Maximum statement/expression nesting depth before rejecting the parse.
///
/// Recursion goes through [`crate::stack::ensure_sufficient_stack`], so this
/// bounds work on hostile input rather than protecting the native stack.
pub const MAX_PARSE_DEPTH: usize = 256;

/// Guard against infinite loops in the parser
///
/// # Example
///
/// ```ignore
/// let mut guard = LoopGuard::new("array_elements");
/// while !parser.check(&Token::RightBracket) {
///     guard.check()?;
///     // ... parse an element ...
/// }
/// ```
pub struct LoopGuard {
    name: &'static str,
    count: usize,
    max: usize,
}

impl LoopGuard {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            count: 0,
            max: MAX_LOOP_ITERATIONS,
        }
    }

    #[inline]
    pub fn with_limit(name: &'static str, max: usize) -> Self {
        Self { name, count: 0, max }
    }

    /// Check iteration count, return error if exceeded
    #[inline]
    pub fn check(&mut self) -> Result<(), ParseError> {
        self.count += 1;
        if self.count > self.max {
            return Err(ParseError::parser_limit_exceeded(
                format!("Loop '{}' exceeded {} iterations", self.name, self.max),
                Span::default(),
            ));
        }
        Ok(())
    }
}

/// Run `f` one nesting level deeper, failing once [`MAX_PARSE_DEPTH`] is hit.
pub fn nested<T>(
    parser: &mut Parser,
    what: &str,
    f: impl FnOnce(&mut Parser) -> Result<T, ParseError>,
) -> Result<T, ParseError> {
    if parser.depth >= MAX_PARSE_DEPTH {
        return Err(ParseError::parser_limit_exceeded(
            format!("Maximum nesting depth ({}) exceeded in {}", MAX_PARSE_DEPTH, what),
            parser.current_span(),
        ));
    }

    parser.depth += 1;
    let result = crate::stack::ensure_sufficient_stack(|| f(parser));
    parser.depth -= 1;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_guard_trips() {
        let mut guard = LoopGuard::with_limit("test", 3);
        assert!(guard.check().is_ok());
        assert!(guard.check().is_ok());
        assert!(guard.check().is_ok());
        assert!(guard.check().is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let source = format!("give({}1{})", "(".repeat(400), ")".repeat(400));
        let result = Parser::new(&source).and_then(Parser::parse_function_body);
        let err = result.expect_err("nesting should be bounded");
        assert!(matches!(
            err.kind,
            super::super::ParseErrorKind::ParserLimitExceeded { .. }
        ));
    }

    #[test]
    fn test_moderate_nesting_is_fine() {
        let source = format!("give({}1{})", "[".repeat(100), "]".repeat(100));
        assert!(Parser::new(&source)
            .and_then(Parser::parse_function_body)
            .is_ok());
    }
}
