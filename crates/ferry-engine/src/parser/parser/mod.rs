//! Recursive-descent parser for Ferry module source.
//!
//! The entry point is [`Parser::parse_function_body`]: a module file is the
//! body of the function the loader wraps around it, so `return` is allowed at
//! the top level.

pub mod expr;
pub mod guards;
pub mod stmt;

use std::fmt;

use crate::parser::ast::FunctionBody;
use crate::parser::lexer::{LexError, Lexer};
use crate::parser::token::{Span, Token};

/// What went wrong while parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// The lexer rejected the text
    Lex(LexError),
    UnexpectedToken { expected: Vec<Token>, found: Token },
    UnexpectedEof { expected: Vec<Token> },
    InvalidSyntax { reason: String },
    /// A reserved word for a feature the language leaves out
    Unsupported { feature: String },
    ParserLimitExceeded { reason: String },
}

/// A parse failure with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ParseError {
    pub fn lex(error: LexError) -> Self {
        let span = *error.span();
        let message = error.description();
        let suggestion = error.hint();
        Self {
            kind: ParseErrorKind::Lex(error),
            span,
            message,
            suggestion,
        }
    }

    pub fn invalid_syntax(reason: impl Into<String>, span: Span) -> Self {
        let reason = reason.into();
        Self {
            message: reason.clone(),
            kind: ParseErrorKind::InvalidSyntax { reason },
            span,
            suggestion: None,
        }
    }

    pub fn parser_limit_exceeded(reason: impl Into<String>, span: Span) -> Self {
        let reason = reason.into();
        Self {
            message: reason.clone(),
            kind: ParseErrorKind::ParserLimitExceeded { reason },
            span,
            suggestion: None,
        }
    }

    pub fn unsupported(token: &Token, span: Span) -> Self {
        let feature = token.to_string();
        Self {
            message: format!("'{}' is not supported in Ferry modules", feature),
            kind: ParseErrorKind::Unsupported { feature },
            span,
            suggestion: Some("Share values between files with get() and give()".to_string()),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Parser state over a token stream.
pub struct Parser {
    tokens: Vec<(Token, Span)>,
    position: usize,
    /// Current nesting depth, bounded by [`guards::MAX_PARSE_DEPTH`]
    pub(crate) depth: usize,
    /// Enclosing loops inside the current function
    pub(crate) loop_depth: usize,
}

impl Parser {
    /// Tokenize `source` and prepare to parse it.
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(source)
            .tokenize()
            .map_err(|mut errors| ParseError::lex(errors.remove(0)))?;
        Ok(Self::from_tokens(tokens))
    }

    /// Parser over already-lexed tokens (used for template interpolations).
    pub(crate) fn from_tokens(mut tokens: Vec<(Token, Span)>) -> Self {
        if !matches!(tokens.last(), Some((Token::Eof, _))) {
            let end = tokens.last().map(|(_, s)| Span::new(s.end, s.end, s.line, s.column + 1));
            tokens.push((Token::Eof, end.unwrap_or_default()));
        }
        Self {
            tokens,
            position: 0,
            depth: 0,
            loop_depth: 0,
        }
    }

    /// Parse the whole input as the body of a function.
    pub fn parse_function_body(mut self) -> Result<FunctionBody, ParseError> {
        let start = self.current_span();
        let mut statements = Vec::new();
        let mut guard = guards::LoopGuard::new("function_body");

        while !self.at_eof() {
            guard.check()?;
            if self.check(&Token::RightBrace) {
                return Err(ParseError::invalid_syntax(
                    "Unexpected '}' at the top level of the module",
                    self.current_span(),
                ));
            }
            statements.push(stmt::parse_statement(&mut self)?);
        }

        let span = self.combine_spans(&start, &self.current_span());
        Ok(FunctionBody::new(statements, span))
    }

    // ------------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------------

    pub fn current(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)].0
    }

    pub fn current_span(&self) -> Span {
        self.tokens[self.position.min(self.tokens.len() - 1)].1
    }

    /// Token `n` positions ahead of the current one.
    pub fn peek_nth(&self, n: usize) -> &Token {
        let index = (self.position + n).min(self.tokens.len() - 1);
        &self.tokens[index].0
    }

    pub fn peek(&self) -> &Token {
        self.peek_nth(1)
    }

    /// Span of the most recently consumed token.
    pub fn previous_span(&self) -> Span {
        self.tokens[self.position.saturating_sub(1)].1
    }

    pub fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !self.at_eof() {
            self.position += 1;
        }
        token
    }

    pub fn at_eof(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    pub fn check(&self, token: &Token) -> bool {
        self.current() == token
    }

    /// Consume `token` if present.
    pub fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, token: Token) -> Result<Span, ParseError> {
        if self.check(&token) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected_token(&[token]))
        }
    }

    /// Whether the current token is the identifier `word`, used for
    /// contextual keywords such as `of`.
    pub fn check_contextual(&self, word: &str) -> bool {
        matches!(self.current(), Token::Identifier(name) if name == word)
    }

    pub fn expect_contextual(&mut self, word: &str) -> Result<Span, ParseError> {
        if self.check_contextual(word) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected_token(&[Token::Identifier(word.to_string())]))
        }
    }

    /// Consume an optional statement terminator.
    pub fn eat_semicolon(&mut self) {
        self.eat(&Token::Semicolon);
    }

    /// Whether the current token starts a new line relative to the previous one.
    pub fn on_new_line(&self) -> bool {
        self.position > 0 && self.current_span().line > self.previous_span().line
    }

    pub fn combine_spans(&self, start: &Span, end: &Span) -> Span {
        start.merge(end)
    }

    pub fn unexpected_token(&self, expected: &[Token]) -> ParseError {
        let span = self.current_span();
        let found = self.current().clone();
        let wanted = expected
            .iter()
            .map(|t| format!("'{}'", t))
            .collect::<Vec<_>>()
            .join(" or ");

        if found == Token::Eof {
            return ParseError {
                message: if wanted.is_empty() {
                    "Unexpected end of input".to_string()
                } else {
                    format!("Unexpected end of input, expected {}", wanted)
                },
                kind: ParseErrorKind::UnexpectedEof {
                    expected: expected.to_vec(),
                },
                span,
                suggestion: None,
            };
        }

        let message = if wanted.is_empty() {
            format!("Unexpected token '{}'", found)
        } else {
            format!("Unexpected token '{}', expected {}", found, wanted)
        };
        ParseError {
            kind: ParseErrorKind::UnexpectedToken {
                expected: expected.to_vec(),
                found,
            },
            span,
            message,
            suggestion: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::*;

    fn parse(source: &str) -> FunctionBody {
        Parser::new(source)
            .and_then(Parser::parse_function_body)
            .unwrap_or_else(|e| panic!("parse failed: {}", e))
    }

    fn parse_err(source: &str) -> ParseError {
        match Parser::new(source).and_then(Parser::parse_function_body) {
            Ok(body) => panic!("expected parse error, got {:?}", body),
            Err(e) => e,
        }
    }

    #[test]
    fn test_empty_module() {
        assert!(parse("").is_empty());
        assert!(parse("  // nothing here\n").is_empty());
    }

    #[test]
    fn test_get_give_module() {
        let body = parse("const x = get('./util'); give(x + 1)");
        assert_eq!(body.len(), 2);
        match &body.statements[0] {
            Statement::VariableDecl(decl) => {
                assert_eq!(decl.kind, VariableKind::Const);
                assert_eq!(&*decl.declarators[0].name.name, "x");
                assert!(matches!(
                    decl.declarators[0].initializer,
                    Some(Expression::Call(_))
                ));
            }
            other => panic!("expected declaration, got {:?}", other),
        }
        match &body.statements[1] {
            Statement::Expression(stmt) => match &stmt.expression {
                Expression::Call(call) => {
                    assert_eq!(call.arguments.len(), 1);
                    assert!(matches!(call.arguments[0], Expression::Binary(_)));
                }
                other => panic!("expected call, got {:?}", other),
            },
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_top_level_return_is_allowed() {
        let body = parse("give(1)\nreturn\ngive(2)");
        assert_eq!(body.len(), 3);
        assert!(matches!(
            body.statements[1],
            Statement::Return(ReturnStatement { value: None, .. })
        ));
    }

    #[test]
    fn test_stray_closing_brace_is_rejected() {
        let err = parse_err("give(1) }");
        assert!(matches!(err.kind, ParseErrorKind::InvalidSyntax { .. }));
    }

    #[test]
    fn test_unexpected_eof() {
        let err = parse_err("give(");
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedEof { .. }));
    }

    #[test]
    fn test_reserved_word_is_unsupported() {
        let err = parse_err("import x from './x'");
        assert!(matches!(err.kind, ParseErrorKind::Unsupported { .. }));
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_lex_error_surfaces_as_parse_error() {
        let err = parse_err("give(#)");
        assert!(matches!(err.kind, ParseErrorKind::Lex(_)));
        assert_eq!(err.span.column, 6);
    }
}
