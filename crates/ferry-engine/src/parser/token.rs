//! Token definitions for Ferry module source.
//!
//! This module defines all tokens that can appear in a module body,
//! including keywords, operators, literals, and special tokens.

use std::fmt;

/// A token in Ferry module source.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Declarations
    Function,
    Let,
    Const,
    Var,

    // Control flow
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Return,
    Throw,

    // Operators spelled as words
    Typeof,
    Void,
    This,

    // Reserved, rejected by the parser with a dedicated message
    Class,
    New,
    Try,
    Catch,
    Finally,
    Switch,
    Import,
    Export,

    // Literals
    Number(f64),
    StringLiteral(String),
    TemplateLiteral(Vec<TemplatePart>),
    True,
    False,
    Null,

    // Identifiers
    Identifier(String),

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,

    // Unary
    PlusPlus,
    MinusMinus,
    Bang,

    // Comparison
    EqualEqual,
    BangEqual,
    EqualEqualEqual,
    BangEqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Logical
    AmpAmp,
    PipePipe,
    QuestionQuestion,

    // Assignment
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    QuestionQuestionEqual,

    // Other
    Question,
    QuestionDot,
    DotDotDot,
    Dot,
    Colon,
    Arrow,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,

    // Special
    Eof,
}

/// A part of a template literal.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    String(String),
    Expression(Vec<(Token, Span)>),
}

/// Source location information for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    /// Span covering both `self` and `other`, keeping the earlier position.
    pub fn merge(&self, other: &Span) -> Span {
        let (line, column) = if (other.line, other.column) < (self.line, self.column) {
            (other.line, other.column)
        } else {
            (self.line, self.column)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line,
            column,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Function => write!(f, "function"),
            Token::Let => write!(f, "let"),
            Token::Const => write!(f, "const"),
            Token::Var => write!(f, "var"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::For => write!(f, "for"),
            Token::While => write!(f, "while"),
            Token::Do => write!(f, "do"),
            Token::Break => write!(f, "break"),
            Token::Continue => write!(f, "continue"),
            Token::Return => write!(f, "return"),
            Token::Throw => write!(f, "throw"),
            Token::Typeof => write!(f, "typeof"),
            Token::Void => write!(f, "void"),
            Token::This => write!(f, "this"),
            Token::Class => write!(f, "class"),
            Token::New => write!(f, "new"),
            Token::Try => write!(f, "try"),
            Token::Catch => write!(f, "catch"),
            Token::Finally => write!(f, "finally"),
            Token::Switch => write!(f, "switch"),
            Token::Import => write!(f, "import"),
            Token::Export => write!(f, "export"),
            Token::Number(n) => write!(f, "{}", n),
            Token::StringLiteral(s) => write!(f, "{:?}", s),
            Token::TemplateLiteral(_) => write!(f, "`...`"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::StarStar => write!(f, "**"),
            Token::PlusPlus => write!(f, "++"),
            Token::MinusMinus => write!(f, "--"),
            Token::Bang => write!(f, "!"),
            Token::EqualEqual => write!(f, "=="),
            Token::BangEqual => write!(f, "!="),
            Token::EqualEqualEqual => write!(f, "==="),
            Token::BangEqualEqual => write!(f, "!=="),
            Token::Less => write!(f, "<"),
            Token::LessEqual => write!(f, "<="),
            Token::Greater => write!(f, ">"),
            Token::GreaterEqual => write!(f, ">="),
            Token::AmpAmp => write!(f, "&&"),
            Token::PipePipe => write!(f, "||"),
            Token::QuestionQuestion => write!(f, "??"),
            Token::Equal => write!(f, "="),
            Token::PlusEqual => write!(f, "+="),
            Token::MinusEqual => write!(f, "-="),
            Token::StarEqual => write!(f, "*="),
            Token::SlashEqual => write!(f, "/="),
            Token::PercentEqual => write!(f, "%="),
            Token::QuestionQuestionEqual => write!(f, "??="),
            Token::Question => write!(f, "?"),
            Token::QuestionDot => write!(f, "?."),
            Token::DotDotDot => write!(f, "..."),
            Token::Dot => write!(f, "."),
            Token::Colon => write!(f, ":"),
            Token::Arrow => write!(f, "=>"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::LeftBrace => write!(f, "{{"),
            Token::RightBrace => write!(f, "}}"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::Semicolon => write!(f, ";"),
            Token::Comma => write!(f, ","),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

impl Token {
    /// Returns true for keywords the parser refuses outright.
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            Token::Class
                | Token::New
                | Token::Try
                | Token::Catch
                | Token::Finally
                | Token::Switch
                | Token::Import
                | Token::Export
        )
    }

    /// Returns true if this token is a literal.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Token::Number(_)
                | Token::StringLiteral(_)
                | Token::TemplateLiteral(_)
                | Token::True
                | Token::False
                | Token::Null
        )
    }

    /// Returns true if this token is an assignment operator.
    pub fn is_assignment_operator(&self) -> bool {
        matches!(
            self,
            Token::Equal
                | Token::PlusEqual
                | Token::MinusEqual
                | Token::StarEqual
                | Token::SlashEqual
                | Token::PercentEqual
                | Token::QuestionQuestionEqual
        )
    }

    /// Property names may be any identifier-like word, keywords included.
    pub fn property_name(&self) -> Option<String> {
        match self {
            Token::Identifier(name) => Some(name.clone()),
            Token::True | Token::False | Token::Null => Some(self.to_string()),
            t if t.is_reserved() => Some(t.to_string()),
            Token::Function
            | Token::Let
            | Token::Const
            | Token::Var
            | Token::If
            | Token::Else
            | Token::For
            | Token::While
            | Token::Do
            | Token::Break
            | Token::Continue
            | Token::Return
            | Token::Throw
            | Token::Typeof
            | Token::Void
            | Token::This => Some(self.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge_keeps_earliest_position() {
        let a = Span::new(10, 12, 2, 3);
        let b = Span::new(2, 4, 1, 3);
        let merged = a.merge(&b);
        assert_eq!(merged.start, 2);
        assert_eq!(merged.end, 12);
        assert_eq!((merged.line, merged.column), (1, 3));
    }

    #[test]
    fn test_keywords_are_property_names() {
        assert_eq!(Token::Return.property_name().as_deref(), Some("return"));
        assert_eq!(Token::Class.property_name().as_deref(), Some("class"));
        assert_eq!(Token::Comma.property_name(), None);
    }
}
