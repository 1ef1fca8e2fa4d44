//! Expression parsing
//!
//! Precedence climbs from assignment (lowest) through conditional, logical,
//! equality, relational, additive, multiplicative, exponent, unary, postfix
//! and call/member expressions down to primaries.

use std::rc::Rc;

use super::guards::{nested, LoopGuard};
use super::stmt::{parse_binding_identifier, parse_function_block, parse_function_rest, parse_parameter_list};
use super::{ParseError, Parser};
use crate::parser::ast::*;
use crate::parser::token::{Span, TemplatePart, Token};

/// Parse a full expression.
pub fn parse_expression(parser: &mut Parser) -> Result<Expression, ParseError> {
    parse_assignment(parser)
}

/// Parse an assignment expression (also the level used for arguments and elements).
pub fn parse_assignment(parser: &mut Parser) -> Result<Expression, ParseError> {
    nested(parser, "expression", parse_assignment_inner)
}

fn parse_assignment_inner(parser: &mut Parser) -> Result<Expression, ParseError> {
    if is_arrow_function_start(parser) {
        return parse_arrow_function(parser);
    }

    let target = parse_conditional(parser)?;

    let operator = match parser.current() {
        Token::Equal => AssignmentOperator::Assign,
        Token::PlusEqual => AssignmentOperator::AddAssign,
        Token::MinusEqual => AssignmentOperator::SubtractAssign,
        Token::StarEqual => AssignmentOperator::MultiplyAssign,
        Token::SlashEqual => AssignmentOperator::DivideAssign,
        Token::PercentEqual => AssignmentOperator::ModuloAssign,
        Token::QuestionQuestionEqual => AssignmentOperator::NullishAssign,
        _ => return Ok(target),
    };

    if !target.is_assignment_target() {
        return Err(ParseError::invalid_syntax(
            "Invalid left-hand side in assignment",
            *target.span(),
        ));
    }
    parser.advance();

    let value = parse_assignment(parser)?;
    let span = parser.combine_spans(target.span(), value.span());
    Ok(Expression::Assignment(AssignmentExpression {
        operator,
        target: Box::new(target),
        value: Box::new(value),
        span,
    }))
}

// ============================================================================
// Arrow functions
// ============================================================================

fn is_arrow_function_start(parser: &Parser) -> bool {
    match parser.current() {
        Token::Identifier(_) => matches!(parser.peek(), Token::Arrow),
        Token::LeftParen => {
            let mut depth = 0usize;
            let mut offset = 0usize;
            loop {
                match parser.peek_nth(offset) {
                    Token::LeftParen => depth += 1,
                    Token::RightParen => {
                        depth -= 1;
                        if depth == 0 {
                            return matches!(parser.peek_nth(offset + 1), Token::Arrow);
                        }
                    }
                    Token::Eof => return false,
                    _ => {}
                }
                offset += 1;
            }
        }
        _ => false,
    }
}

fn parse_arrow_function(parser: &mut Parser) -> Result<Expression, ParseError> {
    let start_span = parser.current_span();
    let params = if parser.check(&Token::LeftParen) {
        parse_parameter_list(parser)?
    } else {
        vec![parse_binding_identifier(parser)?]
    };
    parser.expect(Token::Arrow)?;

    let body = if parser.check(&Token::LeftBrace) {
        FunctionBodyKind::Block(parse_function_block(parser)?)
    } else {
        FunctionBodyKind::Expression(Box::new(parse_assignment(parser)?))
    };

    let end_span = match &body {
        FunctionBodyKind::Block(block) => block.span,
        FunctionBodyKind::Expression(expr) => *expr.span(),
    };
    Ok(Expression::Function(Rc::new(FunctionLiteral {
        name: None,
        params,
        body,
        is_arrow: true,
        span: parser.combine_spans(&start_span, &end_span),
    })))
}

// ============================================================================
// Operators
// ============================================================================

fn parse_conditional(parser: &mut Parser) -> Result<Expression, ParseError> {
    let test = parse_logical_or(parser)?;
    if !parser.eat(&Token::Question) {
        return Ok(test);
    }

    let consequent = parse_assignment(parser)?;
    parser.expect(Token::Colon)?;
    let alternate = parse_assignment(parser)?;
    let span = parser.combine_spans(test.span(), alternate.span());
    Ok(Expression::Conditional(ConditionalExpression {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
        span,
    }))
}

fn logical(operator: LogicalOperator, left: Expression, right: Expression) -> Expression {
    let span = left.span().merge(right.span());
    Expression::Logical(LogicalExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
        span,
    })
}

fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    let span = left.span().merge(right.span());
    Expression::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
        span,
    })
}

/// `||` and `??` share a level.
fn parse_logical_or(parser: &mut Parser) -> Result<Expression, ParseError> {
    let mut left = parse_logical_and(parser)?;
    let mut guard = LoopGuard::new("logical_or");
    loop {
        guard.check()?;
        let operator = match parser.current() {
            Token::PipePipe => LogicalOperator::Or,
            Token::QuestionQuestion => LogicalOperator::Nullish,
            _ => return Ok(left),
        };
        parser.advance();
        let right = parse_logical_and(parser)?;
        left = logical(operator, left, right);
    }
}

fn parse_logical_and(parser: &mut Parser) -> Result<Expression, ParseError> {
    let mut left = parse_equality(parser)?;
    let mut guard = LoopGuard::new("logical_and");
    while parser.eat(&Token::AmpAmp) {
        guard.check()?;
        let right = parse_equality(parser)?;
        left = logical(LogicalOperator::And, left, right);
    }
    Ok(left)
}

fn parse_equality(parser: &mut Parser) -> Result<Expression, ParseError> {
    let mut left = parse_relational(parser)?;
    let mut guard = LoopGuard::new("equality");
    loop {
        guard.check()?;
        let operator = match parser.current() {
            Token::EqualEqual => BinaryOperator::Equal,
            Token::BangEqual => BinaryOperator::NotEqual,
            Token::EqualEqualEqual => BinaryOperator::StrictEqual,
            Token::BangEqualEqual => BinaryOperator::StrictNotEqual,
            _ => return Ok(left),
        };
        parser.advance();
        let right = parse_relational(parser)?;
        left = binary(operator, left, right);
    }
}

fn parse_relational(parser: &mut Parser) -> Result<Expression, ParseError> {
    let mut left = parse_additive(parser)?;
    let mut guard = LoopGuard::new("relational");
    loop {
        guard.check()?;
        let operator = match parser.current() {
            Token::Less => BinaryOperator::LessThan,
            Token::LessEqual => BinaryOperator::LessEqual,
            Token::Greater => BinaryOperator::GreaterThan,
            Token::GreaterEqual => BinaryOperator::GreaterEqual,
            _ => return Ok(left),
        };
        parser.advance();
        let right = parse_additive(parser)?;
        left = binary(operator, left, right);
    }
}

fn parse_additive(parser: &mut Parser) -> Result<Expression, ParseError> {
    let mut left = parse_multiplicative(parser)?;
    let mut guard = LoopGuard::new("additive");
    loop {
        guard.check()?;
        let operator = match parser.current() {
            Token::Plus => BinaryOperator::Add,
            Token::Minus => BinaryOperator::Subtract,
            _ => return Ok(left),
        };
        parser.advance();
        let right = parse_multiplicative(parser)?;
        left = binary(operator, left, right);
    }
}

fn parse_multiplicative(parser: &mut Parser) -> Result<Expression, ParseError> {
    let mut left = parse_exponent(parser)?;
    let mut guard = LoopGuard::new("multiplicative");
    loop {
        guard.check()?;
        let operator = match parser.current() {
            Token::Star => BinaryOperator::Multiply,
            Token::Slash => BinaryOperator::Divide,
            Token::Percent => BinaryOperator::Modulo,
            _ => return Ok(left),
        };
        parser.advance();
        let right = parse_exponent(parser)?;
        left = binary(operator, left, right);
    }
}

/// `**` is right-associative.
fn parse_exponent(parser: &mut Parser) -> Result<Expression, ParseError> {
    let base = parse_unary(parser)?;
    if !parser.eat(&Token::StarStar) {
        return Ok(base);
    }
    let exponent = nested(parser, "exponent", parse_exponent)?;
    Ok(binary(BinaryOperator::Exponent, base, exponent))
}

fn parse_unary(parser: &mut Parser) -> Result<Expression, ParseError> {
    let start_span = parser.current_span();
    let operator = match parser.current() {
        Token::Bang => UnaryOperator::Not,
        Token::Minus => UnaryOperator::Negate,
        Token::Plus => UnaryOperator::Plus,
        Token::Typeof => UnaryOperator::Typeof,
        Token::Void => UnaryOperator::Void,
        Token::PlusPlus | Token::MinusMinus => return parse_prefix_update(parser),
        _ => return parse_postfix(parser),
    };
    parser.advance();

    let operand = nested(parser, "unary operand", parse_unary)?;
    let span = parser.combine_spans(&start_span, operand.span());
    Ok(Expression::Unary(UnaryExpression {
        operator,
        operand: Box::new(operand),
        span,
    }))
}

fn update_operator(token: &Token) -> UpdateOperator {
    match token {
        Token::PlusPlus => UpdateOperator::Increment,
        _ => UpdateOperator::Decrement,
    }
}

fn parse_prefix_update(parser: &mut Parser) -> Result<Expression, ParseError> {
    let start_span = parser.current_span();
    let operator = update_operator(&parser.advance());
    let target = nested(parser, "update operand", parse_unary)?;
    if !target.is_assignment_target() {
        return Err(ParseError::invalid_syntax(
            "Invalid left-hand side expression in prefix operation",
            *target.span(),
        ));
    }
    let span = parser.combine_spans(&start_span, target.span());
    Ok(Expression::Update(UpdateExpression {
        operator,
        prefix: true,
        target: Box::new(target),
        span,
    }))
}

fn parse_postfix(parser: &mut Parser) -> Result<Expression, ParseError> {
    let target = parse_call_member(parser)?;
    if !matches!(parser.current(), Token::PlusPlus | Token::MinusMinus) || parser.on_new_line() {
        return Ok(target);
    }
    if !target.is_assignment_target() {
        return Err(ParseError::invalid_syntax(
            "Invalid left-hand side expression in postfix operation",
            *target.span(),
        ));
    }

    let operator = update_operator(&parser.advance());
    let span = parser.combine_spans(target.span(), &parser.previous_span());
    Ok(Expression::Update(UpdateExpression {
        operator,
        prefix: false,
        target: Box::new(target),
        span,
    }))
}

// ============================================================================
// Calls and member access
// ============================================================================

fn parse_property_identifier(parser: &mut Parser) -> Result<Identifier, ParseError> {
    match parser.current().property_name() {
        Some(name) => {
            let span = parser.current_span();
            parser.advance();
            Ok(Identifier::new(name, span))
        }
        None => Err(parser.unexpected_token(&[Token::Identifier("property".to_string())])),
    }
}

fn parse_arguments(parser: &mut Parser) -> Result<Vec<Expression>, ParseError> {
    parser.expect(Token::LeftParen)?;
    let mut arguments = Vec::new();
    let mut guard = LoopGuard::new("arguments");

    while !parser.check(&Token::RightParen) {
        guard.check()?;
        if parser.check(&Token::DotDotDot) {
            return Err(ParseError::unsupported(&Token::DotDotDot, parser.current_span()));
        }
        arguments.push(parse_assignment(parser)?);
        if !parser.eat(&Token::Comma) {
            break;
        }
    }

    parser.expect(Token::RightParen)?;
    Ok(arguments)
}

fn parse_call_member(parser: &mut Parser) -> Result<Expression, ParseError> {
    let mut expr = parse_primary(parser)?;
    let mut guard = LoopGuard::new("call_member");

    loop {
        guard.check()?;
        match parser.current() {
            Token::Dot => {
                parser.advance();
                let property = parse_property_identifier(parser)?;
                let span = parser.combine_spans(expr.span(), &property.span);
                expr = Expression::Member(MemberExpression {
                    object: Box::new(expr),
                    property,
                    optional: false,
                    span,
                });
            }
            Token::QuestionDot => {
                parser.advance();
                expr = match parser.current() {
                    Token::LeftParen => call(parser, expr, true)?,
                    Token::LeftBracket => index(parser, expr, true)?,
                    _ => {
                        let property = parse_property_identifier(parser)?;
                        let span = parser.combine_spans(expr.span(), &property.span);
                        Expression::Member(MemberExpression {
                            object: Box::new(expr),
                            property,
                            optional: true,
                            span,
                        })
                    }
                };
            }
            Token::LeftBracket => expr = index(parser, expr, false)?,
            Token::LeftParen => expr = call(parser, expr, false)?,
            _ => return Ok(expr),
        }
    }
}

fn call(parser: &mut Parser, callee: Expression, optional: bool) -> Result<Expression, ParseError> {
    let arguments = parse_arguments(parser)?;
    let span = parser.combine_spans(callee.span(), &parser.previous_span());
    Ok(Expression::Call(CallExpression {
        callee: Box::new(callee),
        arguments,
        optional,
        span,
    }))
}

fn index(parser: &mut Parser, object: Expression, optional: bool) -> Result<Expression, ParseError> {
    parser.expect(Token::LeftBracket)?;
    let index = parse_expression(parser)?;
    let end_span = parser.expect(Token::RightBracket)?;
    let span = parser.combine_spans(object.span(), &end_span);
    Ok(Expression::Index(IndexExpression {
        object: Box::new(object),
        index: Box::new(index),
        optional,
        span,
    }))
}

// ============================================================================
// Primaries
// ============================================================================

fn parse_primary(parser: &mut Parser) -> Result<Expression, ParseError> {
    let span = parser.current_span();
    match parser.current().clone() {
        Token::Number(value) => {
            parser.advance();
            Ok(Expression::Number(NumberLiteral { value, span }))
        }
        Token::StringLiteral(value) => {
            parser.advance();
            Ok(Expression::String(StringLiteral {
                value: value.into(),
                span,
            }))
        }
        Token::TemplateLiteral(parts) => {
            parser.advance();
            parse_template(parts, span)
        }
        Token::True | Token::False => {
            let value = parser.advance() == Token::True;
            Ok(Expression::Boolean(BooleanLiteral { value, span }))
        }
        Token::Null => {
            parser.advance();
            Ok(Expression::Null(span))
        }
        Token::This => {
            parser.advance();
            Ok(Expression::This(span))
        }
        Token::Identifier(name) => {
            parser.advance();
            if name == "undefined" {
                Ok(Expression::Undefined(span))
            } else {
                Ok(Expression::Identifier(Identifier::new(name, span)))
            }
        }
        Token::LeftParen => {
            parser.advance();
            let inner = parse_expression(parser)?;
            parser.expect(Token::RightParen)?;
            Ok(inner)
        }
        Token::LeftBracket => parse_array(parser),
        Token::LeftBrace => parse_object(parser),
        Token::Function => {
            parser.advance();
            let name = match parser.current() {
                Token::Identifier(_) => Some(parse_binding_identifier(parser)?.name),
                _ => None,
            };
            let function = parse_function_rest(parser, name, span)?;
            Ok(Expression::Function(Rc::new(function)))
        }
        token if token.is_reserved() => Err(ParseError::unsupported(&token, span)),
        _ => Err(parser.unexpected_token(&[])),
    }
}

fn parse_template(parts: Vec<TemplatePart>, span: Span) -> Result<Expression, ParseError> {
    let mut elements = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            TemplatePart::String(text) => elements.push(TemplateElement::String(text.into())),
            TemplatePart::Expression(tokens) => {
                if tokens.is_empty() {
                    return Err(ParseError::invalid_syntax(
                        "Empty ${} in template literal",
                        span,
                    ));
                }
                let mut inner = Parser::from_tokens(tokens);
                let expression = parse_expression(&mut inner)?;
                if !inner.at_eof() {
                    return Err(inner.unexpected_token(&[Token::RightBrace]));
                }
                elements.push(TemplateElement::Expression(expression));
            }
        }
    }
    Ok(Expression::Template(TemplateLiteral {
        parts: elements,
        span,
    }))
}

fn parse_array(parser: &mut Parser) -> Result<Expression, ParseError> {
    let start_span = parser.expect(Token::LeftBracket)?;
    let mut elements = Vec::new();
    let mut guard = LoopGuard::new("array_elements");

    while !parser.check(&Token::RightBracket) {
        guard.check()?;
        if parser.check(&Token::DotDotDot) {
            return Err(ParseError::unsupported(&Token::DotDotDot, parser.current_span()));
        }
        elements.push(parse_assignment(parser)?);
        if !parser.eat(&Token::Comma) {
            break;
        }
    }

    let end_span = parser.expect(Token::RightBracket)?;
    Ok(Expression::Array(ArrayExpression {
        elements,
        span: parser.combine_spans(&start_span, &end_span),
    }))
}

/// Canonical property name for a numeric key (`{ 1: x }` is `"1"`).
fn numeric_key(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn parse_object(parser: &mut Parser) -> Result<Expression, ParseError> {
    let start_span = parser.expect(Token::LeftBrace)?;
    let mut properties = Vec::new();
    let mut guard = LoopGuard::new("object_properties");

    while !parser.check(&Token::RightBrace) {
        guard.check()?;
        let key_span = parser.current_span();

        let (key, shorthand) = match parser.current().clone() {
            Token::LeftBracket => {
                parser.advance();
                let key = parse_assignment(parser)?;
                parser.expect(Token::RightBracket)?;
                (PropertyKey::Computed(key), None)
            }
            Token::StringLiteral(s) => {
                parser.advance();
                (PropertyKey::Static(s.into()), None)
            }
            Token::Number(n) => {
                parser.advance();
                (PropertyKey::Static(numeric_key(n).into()), None)
            }
            Token::Identifier(name) => {
                parser.advance();
                let ident = Identifier::new(name.clone(), key_span);
                (PropertyKey::Static(name.into()), Some(ident))
            }
            token => match token.property_name() {
                Some(name) => {
                    parser.advance();
                    (PropertyKey::Static(name.into()), None)
                }
                None => return Err(parser.unexpected_token(&[Token::RightBrace])),
            },
        };

        let value = match parser.current() {
            Token::Colon => {
                parser.advance();
                parse_assignment(parser)?
            }
            Token::LeftParen => {
                let name = match &key {
                    PropertyKey::Static(name) => Some(name.clone()),
                    PropertyKey::Computed(_) => None,
                };
                Expression::Function(Rc::new(parse_function_rest(parser, name, key_span)?))
            }
            _ => match shorthand {
                Some(ident) if ident.name.as_ref() != "undefined" => Expression::Identifier(ident),
                _ => return Err(parser.unexpected_token(&[Token::Colon])),
            },
        };

        let span = parser.combine_spans(&key_span, value.span());
        properties.push(Property { key, value, span });

        if !parser.eat(&Token::Comma) {
            break;
        }
    }

    let end_span = parser.expect(Token::RightBrace)?;
    Ok(Expression::Object(ObjectExpression {
        properties,
        span: parser.combine_spans(&start_span, &end_span),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Statement;

    fn expr(source: &str) -> Expression {
        let body = Parser::new(source)
            .and_then(Parser::parse_function_body)
            .unwrap_or_else(|e| panic!("parse failed: {}", e));
        match body.statements.into_iter().next() {
            Some(Statement::Expression(stmt)) => stmt.expression,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    fn err(source: &str) -> ParseError {
        Parser::new(source)
            .and_then(Parser::parse_function_body)
            .expect_err("expected a parse error")
    }

    #[test]
    fn test_precedence() {
        match expr("1 + 2 * 3") {
            Expression::Binary(b) => {
                assert_eq!(b.operator, BinaryOperator::Add);
                assert!(matches!(*b.right, Expression::Binary(ref r) if r.operator == BinaryOperator::Multiply));
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_exponent_is_right_associative() {
        match expr("2 ** 3 ** 2") {
            Expression::Binary(b) => {
                assert!(matches!(*b.left, Expression::Number(_)));
                assert!(matches!(*b.right, Expression::Binary(_)));
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        match expr("a = b = 1") {
            Expression::Assignment(a) => {
                assert!(matches!(*a.value, Expression::Assignment(_)));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        let e = err("1 = 2");
        assert!(e.message.contains("Invalid left-hand side"));
    }

    #[test]
    fn test_arrow_functions() {
        match expr("(a, b) => a + b") {
            Expression::Function(f) => {
                assert!(f.is_arrow);
                assert_eq!(f.params.len(), 2);
                assert!(matches!(f.body, FunctionBodyKind::Expression(_)));
            }
            other => panic!("expected arrow, got {:?}", other),
        }
        match expr("x => { return x }") {
            Expression::Function(f) => assert!(matches!(f.body, FunctionBodyKind::Block(_))),
            other => panic!("expected arrow, got {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_is_not_arrow() {
        assert!(matches!(expr("(a + b) * c"), Expression::Binary(_)));
    }

    #[test]
    fn test_member_call_chain() {
        match expr("console.log(a.b[0])") {
            Expression::Call(c) => {
                assert!(matches!(*c.callee, Expression::Member(_)));
                assert!(matches!(c.arguments[0], Expression::Index(_)));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_optional_chaining() {
        match expr("a?.b") {
            Expression::Member(m) => assert!(m.optional),
            other => panic!("expected member, got {:?}", other),
        }
        match expr("f?.(1)") {
            Expression::Call(c) => assert!(c.optional),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_object_literal_forms() {
        match expr("({ a: 1, b, 'c d': 2, [k]: 3, m() { return 4 }, 5: 6, default: 7 })") {
            Expression::Object(o) => {
                assert_eq!(o.properties.len(), 7);
                assert!(matches!(o.properties[1].value, Expression::Identifier(_)));
                assert!(matches!(o.properties[3].key, PropertyKey::Computed(_)));
                assert!(matches!(o.properties[4].value, Expression::Function(_)));
                assert_eq!(o.properties[5].key, PropertyKey::Static("5".into()));
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_template_literal() {
        match expr("`sum: ${a + b}!`") {
            Expression::Template(t) => {
                assert_eq!(t.parts.len(), 3);
                assert!(matches!(t.parts[1], TemplateElement::Expression(Expression::Binary(_))));
            }
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_postfix_update_requires_target() {
        let e = err("1++");
        assert!(e.message.contains("postfix"));
    }

    #[test]
    fn test_undefined_literal() {
        assert!(matches!(expr("undefined"), Expression::Undefined(_)));
    }

    #[test]
    fn test_spread_is_unsupported() {
        let e = err("f(...args)");
        assert!(matches!(e.kind, super::super::ParseErrorKind::Unsupported { .. }));
    }
}
