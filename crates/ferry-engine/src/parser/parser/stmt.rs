//! Statement parsing

use std::rc::Rc;

use super::guards::{nested, LoopGuard};
use super::{expr, ParseError, Parser};
use crate::parser::ast::*;
use crate::parser::token::{Span, Token};

/// Parse a statement.
pub fn parse_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    nested(parser, "statement", parse_statement_inner)
}

fn parse_statement_inner(parser: &mut Parser) -> Result<Statement, ParseError> {
    match parser.current() {
        Token::Let | Token::Const | Token::Var => {
            let decl = parse_variable_declaration(parser)?;
            parser.eat_semicolon();
            Ok(Statement::VariableDecl(decl))
        }
        Token::Function => parse_function_declaration(parser),
        Token::LeftBrace => parse_block(parser).map(Statement::Block),
        Token::If => parse_if_statement(parser),
        Token::While => parse_while_statement(parser),
        Token::Do => parse_do_while_statement(parser),
        Token::For => parse_for_statement(parser),
        Token::Return => parse_return_statement(parser),
        Token::Break | Token::Continue => parse_jump_statement(parser),
        Token::Throw => parse_throw_statement(parser),
        Token::Semicolon => {
            let span = parser.current_span();
            parser.advance();
            Ok(Statement::Empty(span))
        }
        token if token.is_reserved() => {
            Err(ParseError::unsupported(token, parser.current_span()))
        }
        _ => {
            let start_span = parser.current_span();
            let expression = expr::parse_expression(parser)?;
            parser.eat_semicolon();
            let span = parser.combine_spans(&start_span, expression.span());
            Ok(Statement::Expression(ExpressionStatement { expression, span }))
        }
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// Parse `let a = 1, b`, `const c = 2` or `var d` without the terminator.
pub(super) fn parse_variable_declaration(parser: &mut Parser) -> Result<VariableDecl, ParseError> {
    let start_span = parser.current_span();
    let kind = match parser.advance() {
        Token::Let => VariableKind::Let,
        Token::Const => VariableKind::Const,
        _ => VariableKind::Var,
    };

    let mut declarators = Vec::new();
    let mut guard = LoopGuard::new("variable_declarators");
    loop {
        guard.check()?;
        let name = parse_binding_identifier(parser)?;
        let initializer = if parser.eat(&Token::Equal) {
            Some(expr::parse_assignment(parser)?)
        } else {
            None
        };

        if kind == VariableKind::Const && initializer.is_none() && !parser.check_contextual("of") {
            return Err(ParseError::invalid_syntax(
                "Missing initializer in const declaration",
                name.span,
            )
            .with_suggestion("Add an initializer: const x = value;"));
        }

        let span = match &initializer {
            Some(init) => parser.combine_spans(&name.span, init.span()),
            None => name.span,
        };
        declarators.push(Declarator {
            name,
            initializer,
            span,
        });

        if !parser.eat(&Token::Comma) {
            break;
        }
    }

    let span = parser.combine_spans(&start_span, &parser.previous_span());
    Ok(VariableDecl {
        kind,
        declarators,
        span,
    })
}

pub(super) fn parse_binding_identifier(parser: &mut Parser) -> Result<Identifier, ParseError> {
    match parser.current().clone() {
        Token::Identifier(name) => {
            let span = parser.current_span();
            parser.advance();
            Ok(Identifier::new(name, span))
        }
        _ => Err(parser.unexpected_token(&[Token::Identifier("name".to_string())])),
    }
}

fn parse_function_declaration(parser: &mut Parser) -> Result<Statement, ParseError> {
    let start_span = parser.expect(Token::Function)?;
    let name = parse_binding_identifier(parser)?;
    let function = parse_function_rest(parser, Some(name.name.clone()), start_span)?;
    let span = function.span;
    Ok(Statement::FunctionDecl(FunctionDecl {
        name,
        function: Rc::new(function),
        span,
    }))
}

/// Parse `(params) { body }` after `function` and the optional name.
pub(super) fn parse_function_rest(
    parser: &mut Parser,
    name: Option<Rc<str>>,
    start_span: Span,
) -> Result<FunctionLiteral, ParseError> {
    let params = parse_parameter_list(parser)?;
    let body = parse_function_block(parser)?;
    let span = parser.combine_spans(&start_span, &body.span);
    Ok(FunctionLiteral {
        name,
        params,
        body: FunctionBodyKind::Block(body),
        is_arrow: false,
        span,
    })
}

/// Parse `(a, b, c)`.
pub(super) fn parse_parameter_list(parser: &mut Parser) -> Result<Vec<Identifier>, ParseError> {
    parser.expect(Token::LeftParen)?;
    let mut params: Vec<Identifier> = Vec::new();
    let mut guard = LoopGuard::new("parameters");

    while !parser.check(&Token::RightParen) {
        guard.check()?;
        let param = parse_binding_identifier(parser)?;
        if params.iter().any(|p| p.name == param.name) {
            return Err(ParseError::invalid_syntax(
                format!("Duplicate parameter name '{}'", param.name),
                param.span,
            ));
        }
        params.push(param);
        if !parser.eat(&Token::Comma) {
            break;
        }
    }

    parser.expect(Token::RightParen)?;
    Ok(params)
}

/// Parse `{ ... }` as a function body; loops outside do not reach inside.
pub(super) fn parse_function_block(parser: &mut Parser) -> Result<FunctionBody, ParseError> {
    let saved_loops = std::mem::replace(&mut parser.loop_depth, 0);
    let block = parse_block(parser);
    parser.loop_depth = saved_loops;
    let block = block?;
    Ok(FunctionBody::new(block.statements, block.span))
}

// ============================================================================
// Blocks and control flow
// ============================================================================

fn parse_block(parser: &mut Parser) -> Result<BlockStatement, ParseError> {
    let start_span = parser.expect(Token::LeftBrace)?;
    let mut statements = Vec::new();
    let mut guard = LoopGuard::new("block");

    while !parser.check(&Token::RightBrace) {
        guard.check()?;
        if parser.at_eof() {
            return Err(parser.unexpected_token(&[Token::RightBrace]));
        }
        statements.push(parse_statement(parser)?);
    }

    let end_span = parser.expect(Token::RightBrace)?;
    Ok(BlockStatement {
        statements,
        span: parser.combine_spans(&start_span, &end_span),
    })
}

fn parse_condition(parser: &mut Parser) -> Result<Expression, ParseError> {
    parser.expect(Token::LeftParen)?;
    let condition = expr::parse_expression(parser)?;
    parser.expect(Token::RightParen)?;
    Ok(condition)
}

fn parse_loop_body(parser: &mut Parser) -> Result<Statement, ParseError> {
    parser.loop_depth += 1;
    let body = parse_statement(parser);
    parser.loop_depth -= 1;
    body
}

fn parse_if_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    let start_span = parser.expect(Token::If)?;
    let condition = parse_condition(parser)?;
    let then_branch = Box::new(parse_statement(parser)?);
    let else_branch = if parser.eat(&Token::Else) {
        Some(Box::new(parse_statement(parser)?))
    } else {
        None
    };

    let end = else_branch.as_ref().map_or(then_branch.span(), |s| s.span());
    let span = parser.combine_spans(&start_span, end);
    Ok(Statement::If(IfStatement {
        condition,
        then_branch,
        else_branch,
        span,
    }))
}

fn parse_while_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    let start_span = parser.expect(Token::While)?;
    let condition = parse_condition(parser)?;
    let body = Box::new(parse_loop_body(parser)?);
    let span = parser.combine_spans(&start_span, body.span());
    Ok(Statement::While(WhileStatement {
        condition,
        body,
        span,
    }))
}

fn parse_do_while_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    let start_span = parser.expect(Token::Do)?;
    let body = Box::new(parse_loop_body(parser)?);
    parser.expect(Token::While)?;
    let condition = parse_condition(parser)?;
    parser.eat_semicolon();
    let span = parser.combine_spans(&start_span, &parser.previous_span());
    Ok(Statement::DoWhile(DoWhileStatement {
        body,
        condition,
        span,
    }))
}

/// Parse `for (init; test; update) body` or `for (let x of xs) body`.
fn parse_for_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    let start_span = parser.expect(Token::For)?;
    parser.expect(Token::LeftParen)?;

    let is_declaration = matches!(parser.current(), Token::Let | Token::Const | Token::Var);
    if is_declaration
        && matches!(parser.peek(), Token::Identifier(_))
        && matches!(parser.peek_nth(2), Token::Identifier(word) if word == "of")
    {
        let kind = match parser.advance() {
            Token::Let => VariableKind::Let,
            Token::Const => VariableKind::Const,
            _ => VariableKind::Var,
        };
        let binding = parse_binding_identifier(parser)?;
        parser.expect_contextual("of")?;
        let iterable = expr::parse_expression(parser)?;
        parser.expect(Token::RightParen)?;
        let body = Box::new(parse_loop_body(parser)?);
        let span = parser.combine_spans(&start_span, body.span());
        return Ok(Statement::ForOf(ForOfStatement {
            kind,
            binding,
            iterable,
            body,
            span,
        }));
    }

    let init = if parser.check(&Token::Semicolon) {
        None
    } else if is_declaration {
        Some(ForInit::VariableDecl(parse_variable_declaration(parser)?))
    } else {
        Some(ForInit::Expression(expr::parse_expression(parser)?))
    };
    parser.expect(Token::Semicolon)?;

    let test = if parser.check(&Token::Semicolon) {
        None
    } else {
        Some(expr::parse_expression(parser)?)
    };
    parser.expect(Token::Semicolon)?;

    let update = if parser.check(&Token::RightParen) {
        None
    } else {
        Some(expr::parse_expression(parser)?)
    };
    parser.expect(Token::RightParen)?;

    let body = Box::new(parse_loop_body(parser)?);
    let span = parser.combine_spans(&start_span, body.span());
    Ok(Statement::For(ForStatement {
        init,
        test,
        update,
        body,
        span,
    }))
}

/// True when the next token cannot start a `return`/`throw` operand on this line.
fn at_statement_end(parser: &Parser) -> bool {
    matches!(
        parser.current(),
        Token::Semicolon | Token::RightBrace | Token::Eof
    ) || parser.on_new_line()
}

fn parse_return_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    let start_span = parser.expect(Token::Return)?;
    let value = if at_statement_end(parser) {
        None
    } else {
        Some(expr::parse_expression(parser)?)
    };
    parser.eat_semicolon();

    let span = match &value {
        Some(v) => parser.combine_spans(&start_span, v.span()),
        None => start_span,
    };
    Ok(Statement::Return(ReturnStatement { value, span }))
}

fn parse_jump_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    let span = parser.current_span();
    let token = parser.advance();
    if parser.loop_depth == 0 {
        return Err(ParseError::invalid_syntax(
            format!("Illegal '{}' statement outside of a loop", token),
            span,
        ));
    }
    parser.eat_semicolon();
    Ok(match token {
        Token::Break => Statement::Break(span),
        _ => Statement::Continue(span),
    })
}

fn parse_throw_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    let start_span = parser.expect(Token::Throw)?;
    if at_statement_end(parser) {
        return Err(ParseError::invalid_syntax(
            "Missing expression after 'throw'",
            start_span,
        ));
    }
    let value = expr::parse_expression(parser)?;
    parser.eat_semicolon();
    let span = parser.combine_spans(&start_span, value.span());
    Ok(Statement::Throw(ThrowStatement { value, span }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Statement> {
        Parser::new(source)
            .and_then(Parser::parse_function_body)
            .unwrap_or_else(|e| panic!("parse failed: {}", e))
            .statements
    }

    fn parse_err(source: &str) -> ParseError {
        Parser::new(source)
            .and_then(Parser::parse_function_body)
            .expect_err("expected a parse error")
    }

    #[test]
    fn test_multiple_declarators() {
        let statements = parse("let a = 1, b, c = a");
        match &statements[0] {
            Statement::VariableDecl(decl) => {
                assert_eq!(decl.declarators.len(), 3);
                assert!(decl.declarators[1].initializer.is_none());
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_const_requires_initializer() {
        let err = parse_err("const x;");
        assert!(err.message.contains("Missing initializer"));
    }

    #[test]
    fn test_function_declaration() {
        let statements = parse("function add(a, b) { return a + b }");
        match &statements[0] {
            Statement::FunctionDecl(decl) => {
                assert_eq!(&*decl.name.name, "add");
                assert_eq!(decl.function.params.len(), 2);
                assert!(!decl.function.is_arrow);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_parameters_rejected() {
        let err = parse_err("function f(a, a) {}");
        assert!(err.message.contains("Duplicate parameter"));
    }

    #[test]
    fn test_if_else_chain() {
        let statements = parse("if (a) give(1) else if (b) give(2) else { give(3) }");
        match &statements[0] {
            Statement::If(stmt) => {
                assert!(matches!(
                    stmt.else_branch.as_deref(),
                    Some(Statement::If(_))
                ));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_for_loop_forms() {
        let statements = parse(
            "for (let i = 0; i < 3; i++) {}\nfor (;;) { break }\nfor (const x of xs) continue",
        );
        assert!(matches!(statements[0], Statement::For(_)));
        match &statements[1] {
            Statement::For(stmt) => {
                assert!(stmt.init.is_none() && stmt.test.is_none() && stmt.update.is_none());
            }
            other => panic!("expected for, got {:?}", other),
        }
        assert!(matches!(statements[2], Statement::ForOf(_)));
    }

    #[test]
    fn test_of_is_only_a_keyword_inside_for() {
        let statements = parse("const of = [{ of: 1 }]\nfor (const x of of) give(x.of)");
        assert!(matches!(statements[0], Statement::VariableDecl(_)));
        match &statements[1] {
            Statement::ForOf(stmt) => assert_eq!(&*stmt.binding.name, "x"),
            other => panic!("expected for-of, got {:?}", other),
        }
    }

    #[test]
    fn test_break_outside_loop() {
        let err = parse_err("break");
        assert!(err.message.contains("outside of a loop"));
    }

    #[test]
    fn test_loop_does_not_leak_into_function() {
        let err = parse_err("while (true) { const f = () => { break } }");
        assert!(err.message.contains("outside of a loop"));
    }

    #[test]
    fn test_return_without_semicolon_ends_at_newline() {
        let statements = parse("return\n42");
        assert!(matches!(
            statements[0],
            Statement::Return(ReturnStatement { value: None, .. })
        ));
        assert!(matches!(statements[1], Statement::Expression(_)));
    }

    #[test]
    fn test_do_while() {
        let statements = parse("do { i++ } while (i < 3);");
        assert!(matches!(statements[0], Statement::DoWhile(_)));
    }

    #[test]
    fn test_throw_requires_operand() {
        let err = parse_err("throw\n'x'");
        assert!(err.message.contains("Missing expression"));
    }
}
