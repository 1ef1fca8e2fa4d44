//! Lexer for Ferry module source.
//!
//! Regular tokens are recognised by logos. Whitespace, comments and template
//! literals are scanned by hand so that line/column tracking stays exact and
//! `${...}` interpolations can be tokenized recursively.

use crate::parser::token::{Span, TemplatePart, Token};
use logos::Logos;

/// Logos-based token enum for lexing.
///
/// Converted to the public [`Token`] enum after lexing.
#[derive(Logos, Debug, Clone, PartialEq)]
enum LogosToken {
    #[regex(r"[ \t\r\n]+", logos::skip)]
    Whitespace,

    #[token("function")]
    Function,
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("var")]
    Var,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("throw")]
    Throw,
    #[token("typeof")]
    Typeof,
    #[token("void")]
    Void,
    #[token("this")]
    This,
    #[token("class")]
    Class,
    #[token("new")]
    New,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("switch")]
    Switch,
    #[token("import")]
    Import,
    #[token("export")]
    Export,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // Identifiers (must come after keywords)
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // Numbers with numeric separator support
    #[regex(r"0[xX][0-9a-fA-F]+(_[0-9a-fA-F]+)*", parse_hex)]
    #[regex(r"0[bB][01]+(_[01]+)*", parse_binary)]
    #[regex(r"0[oO][0-7]+(_[0-7]+)*", parse_octal)]
    #[regex(r"[0-9]+(_[0-9]+)*", parse_decimal)]
    #[regex(r"[0-9]+(_[0-9]+)*\.[0-9]+(_[0-9]+)*([eE][+-]?[0-9]+)?", parse_decimal)]
    #[regex(r"[0-9]+(_[0-9]+)*[eE][+-]?[0-9]+", parse_decimal)]
    #[regex(r"\.[0-9]+(_[0-9]+)*([eE][+-]?[0-9]+)?", parse_decimal)]
    Number(f64),

    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    #[regex(r"'([^'\\\n]|\\.)*'", parse_string)]
    StringLiteral(String),

    // Operators (longer spellings win in logos)
    #[token("===")]
    EqualEqualEqual,
    #[token("!==")]
    BangEqualEqual,
    #[token("**")]
    StarStar,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    BangEqual,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("?.")]
    QuestionDot,
    #[token("??=")]
    QuestionQuestionEqual,
    #[token("??")]
    QuestionQuestion,
    #[token("=>")]
    Arrow,
    #[token("+=")]
    PlusEqual,
    #[token("-=")]
    MinusEqual,
    #[token("*=")]
    StarEqual,
    #[token("/=")]
    SlashEqual,
    #[token("%=")]
    PercentEqual,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("=")]
    Equal,
    #[token("?")]
    Question,
    #[token("...")]
    DotDotDot,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
}

fn parse_radix(lex: &mut logos::Lexer<'_, LogosToken>, radix: u32) -> Option<f64> {
    let digits = lex.slice()[2..].replace('_', "");
    u64::from_str_radix(&digits, radix).ok().map(|n| n as f64)
}

fn parse_hex(lex: &mut logos::Lexer<'_, LogosToken>) -> Option<f64> {
    parse_radix(lex, 16)
}

fn parse_binary(lex: &mut logos::Lexer<'_, LogosToken>) -> Option<f64> {
    parse_radix(lex, 2)
}

fn parse_octal(lex: &mut logos::Lexer<'_, LogosToken>) -> Option<f64> {
    parse_radix(lex, 8)
}

fn parse_decimal(lex: &mut logos::Lexer<'_, LogosToken>) -> Option<f64> {
    lex.slice().replace('_', "").parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, LogosToken>) -> Option<String> {
    let s = lex.slice();
    Some(unescape_string(&s[1..s.len() - 1]))
}

/// Push the character for a `\u` escape; `chars` is positioned after the `u`.
fn push_unicode_escape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String) {
    let mut hex = String::new();
    if chars.peek() == Some(&'{') {
        chars.next();
        while let Some(&ch) = chars.peek() {
            chars.next();
            if ch == '}' {
                break;
            }
            hex.push(ch);
        }
    } else {
        for _ in 0..4 {
            match chars.peek() {
                Some(&ch) if ch.is_ascii_hexdigit() => {
                    hex.push(ch);
                    chars.next();
                }
                _ => break,
            }
        }
    }

    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => out.push(char::REPLACEMENT_CHARACTER),
    }
}

fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('0') => result.push('\0'),
            Some('u') => push_unicode_escape(&mut chars, &mut result),
            Some('x') => {
                let hex: String = (0..2).filter_map(|_| chars.next()).collect();
                match u8::from_str_radix(&hex, 16) {
                    Ok(byte) => result.push(byte as char),
                    Err(_) => result.push_str(&hex),
                }
            }
            // Line continuation
            Some('\n') => {}
            Some(other) => result.push(other),
            None => break,
        }
    }

    result
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    UnexpectedCharacter { char: char, span: Span },
    UnterminatedString { span: Span },
    UnterminatedTemplate { span: Span },
    UnterminatedComment { span: Span },
}

/// Main lexer structure.
pub struct Lexer<'a> {
    source: &'a str,
    /// Byte offset of `source` inside the enclosing file.
    base: usize,
    line: u32,
    column: u32,
    tokens: Vec<(Token, Span)>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::at(source, 0, 1, 1)
    }

    /// Lexer for a fragment that starts at a known position of a larger file.
    fn at(source: &'a str, base: usize, line: u32, column: u32) -> Self {
        Self {
            source,
            base,
            line,
            column,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.base + start, self.base + end, self.line, self.column)
    }

    fn advance_over(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    /// Skip whitespace and comments starting at `pos`, returning the new position.
    fn skip_trivia(&mut self, mut pos: usize) -> usize {
        let bytes = self.source.as_bytes();
        while pos < bytes.len() {
            match bytes[pos] {
                b' ' | b'\t' | b'\r' => {
                    self.column += 1;
                    pos += 1;
                }
                b'\n' => {
                    self.line += 1;
                    self.column = 1;
                    pos += 1;
                }
                // U+FEFF, zero width
                0xEF if self.source[pos..].starts_with('\u{feff}') => {
                    pos += '\u{feff}'.len_utf8();
                }
                b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                    let end = self.source[pos..]
                        .find('\n')
                        .map_or(self.source.len(), |i| pos + i);
                    self.advance_over(&self.source[pos..end]);
                    pos = end;
                }
                b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                    match self.source[pos + 2..].find("*/") {
                        Some(i) => {
                            let end = pos + 2 + i + 2;
                            self.advance_over(&self.source[pos..end]);
                            pos = end;
                        }
                        None => {
                            let span = self.span(pos, self.source.len());
                            self.errors.push(LexError::UnterminatedComment { span });
                            self.advance_over(&self.source[pos..]);
                            pos = self.source.len();
                        }
                    }
                }
                _ => break,
            }
        }
        pos
    }

    pub fn tokenize(mut self) -> Result<Vec<(Token, Span)>, Vec<LexError>> {
        let mut pos = 0;

        loop {
            pos = self.skip_trivia(pos);
            if pos >= self.source.len() {
                break;
            }

            if self.source.as_bytes()[pos] == b'`' {
                let start_span = self.span(pos, pos + 1);
                match self.lex_template(pos + 1) {
                    Ok((parts, end)) => {
                        let span = Span { end: self.base + end, ..start_span };
                        self.tokens.push((Token::TemplateLiteral(parts), span));
                        self.advance_over(&self.source[pos..end]);
                        pos = end;
                    }
                    Err(err) => {
                        self.errors.push(err);
                        break;
                    }
                }
                continue;
            }

            let mut logos_lexer = LogosToken::lexer(&self.source[pos..]);
            let Some(result) = logos_lexer.next() else {
                break;
            };
            let range = logos_lexer.span();
            let (start, end) = (pos + range.start, pos + range.end);
            let span = self.span(start, end);

            match result {
                Ok(logos_token) => self.tokens.push((convert_token(logos_token), span)),
                Err(()) => {
                    let char = self.source[start..].chars().next().unwrap_or('\0');
                    let error = if char == '"' || char == '\'' {
                        LexError::UnterminatedString { span }
                    } else {
                        LexError::UnexpectedCharacter { char, span }
                    };
                    self.errors.push(error);
                }
            }

            self.advance_over(&self.source[start..end]);
            pos = end;
        }

        let eof_span = self.span(self.source.len(), self.source.len());
        self.tokens.push((Token::Eof, eof_span));

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    /// Scan a template literal body starting just after the opening backtick.
    ///
    /// Returns the parts and the byte position just past the closing backtick.
    fn lex_template(&mut self, start: usize) -> Result<(Vec<TemplatePart>, usize), LexError> {
        let mut parts = Vec::new();
        let mut text = String::new();
        let source = self.source;
        let mut pos = start;

        while pos < source.len() {
            let rest = &source[pos..];
            let Some(ch) = rest.chars().next() else { break };

            match ch {
                '`' => {
                    if !text.is_empty() {
                        parts.push(TemplatePart::String(text));
                    }
                    return Ok((parts, pos + 1));
                }
                '\\' => {
                    // Reuse the string unescaper on the two-character window
                    let escape_len = rest[1..].chars().next().map_or(1, |c| 1 + c.len_utf8());
                    let mut window_end = pos + escape_len;
                    if rest[1..].starts_with('u') || rest[1..].starts_with('x') {
                        let tail = &source[window_end..];
                        let extra = if rest[1..].starts_with("u{") {
                            tail.find('}').map_or(0, |i| i + 1)
                        } else {
                            let want = if rest[1..].starts_with('u') { 4 } else { 2 };
                            tail.chars().take(want).take_while(|c| c.is_ascii_hexdigit()).count()
                        };
                        window_end += extra;
                    }
                    let window = &source[pos..window_end];
                    if window == "\\$" || window == "\\`" {
                        text.push_str(&window[1..]);
                    } else {
                        text.push_str(&unescape_string(window));
                    }
                    pos = window_end;
                }
                '$' if rest.starts_with("${") => {
                    if !text.is_empty() {
                        parts.push(TemplatePart::String(std::mem::take(&mut text)));
                    }

                    let expr_start = pos + 2;
                    let mut depth = 1usize;
                    let mut end = expr_start;
                    for (i, c) in source[expr_start..].char_indices() {
                        match c {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    end = expr_start + i;
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                    if depth != 0 {
                        let span = self.span(pos, source.len());
                        return Err(LexError::UnterminatedTemplate { span });
                    }

                    // Position of the interpolation inside the file, for spans
                    let mut cursor = Lexer::at(source, self.base, self.line, self.column);
                    cursor.advance_over(&source[start - 1..expr_start]);
                    let inner = Lexer::at(
                        &source[expr_start..end],
                        self.base + expr_start,
                        cursor.line,
                        cursor.column,
                    );
                    match inner.tokenize() {
                        Ok(mut tokens) => {
                            tokens.pop(); // EOF
                            parts.push(TemplatePart::Expression(tokens));
                        }
                        Err(mut errors) => return Err(errors.remove(0)),
                    }
                    pos = end + 1;
                }
                _ => {
                    text.push(ch);
                    pos += ch.len_utf8();
                }
            }
        }

        let span = self.span(start - 1, source.len());
        Err(LexError::UnterminatedTemplate { span })
    }
}

fn convert_token(logos_token: LogosToken) -> Token {
    match logos_token {
        LogosToken::Function => Token::Function,
        LogosToken::Let => Token::Let,
        LogosToken::Const => Token::Const,
        LogosToken::Var => Token::Var,
        LogosToken::If => Token::If,
        LogosToken::Else => Token::Else,
        LogosToken::For => Token::For,
        LogosToken::While => Token::While,
        LogosToken::Do => Token::Do,
        LogosToken::Break => Token::Break,
        LogosToken::Continue => Token::Continue,
        LogosToken::Return => Token::Return,
        LogosToken::Throw => Token::Throw,
        LogosToken::Typeof => Token::Typeof,
        LogosToken::Void => Token::Void,
        LogosToken::This => Token::This,
        LogosToken::Class => Token::Class,
        LogosToken::New => Token::New,
        LogosToken::Try => Token::Try,
        LogosToken::Catch => Token::Catch,
        LogosToken::Finally => Token::Finally,
        LogosToken::Switch => Token::Switch,
        LogosToken::Import => Token::Import,
        LogosToken::Export => Token::Export,
        LogosToken::True => Token::True,
        LogosToken::False => Token::False,
        LogosToken::Null => Token::Null,
        LogosToken::Identifier(name) => Token::Identifier(name),
        LogosToken::Number(n) => Token::Number(n),
        LogosToken::StringLiteral(s) => Token::StringLiteral(s),
        LogosToken::EqualEqualEqual => Token::EqualEqualEqual,
        LogosToken::BangEqualEqual => Token::BangEqualEqual,
        LogosToken::StarStar => Token::StarStar,
        LogosToken::EqualEqual => Token::EqualEqual,
        LogosToken::BangEqual => Token::BangEqual,
        LogosToken::LessEqual => Token::LessEqual,
        LogosToken::GreaterEqual => Token::GreaterEqual,
        LogosToken::AmpAmp => Token::AmpAmp,
        LogosToken::PipePipe => Token::PipePipe,
        LogosToken::PlusPlus => Token::PlusPlus,
        LogosToken::MinusMinus => Token::MinusMinus,
        LogosToken::QuestionDot => Token::QuestionDot,
        LogosToken::QuestionQuestionEqual => Token::QuestionQuestionEqual,
        LogosToken::QuestionQuestion => Token::QuestionQuestion,
        LogosToken::Arrow => Token::Arrow,
        LogosToken::PlusEqual => Token::PlusEqual,
        LogosToken::MinusEqual => Token::MinusEqual,
        LogosToken::StarEqual => Token::StarEqual,
        LogosToken::SlashEqual => Token::SlashEqual,
        LogosToken::PercentEqual => Token::PercentEqual,
        LogosToken::Plus => Token::Plus,
        LogosToken::Minus => Token::Minus,
        LogosToken::Star => Token::Star,
        LogosToken::Slash => Token::Slash,
        LogosToken::Percent => Token::Percent,
        LogosToken::Bang => Token::Bang,
        LogosToken::Less => Token::Less,
        LogosToken::Greater => Token::Greater,
        LogosToken::Equal => Token::Equal,
        LogosToken::Question => Token::Question,
        LogosToken::DotDotDot => Token::DotDotDot,
        LogosToken::Dot => Token::Dot,
        LogosToken::Colon => Token::Colon,
        LogosToken::LeftParen => Token::LeftParen,
        LogosToken::RightParen => Token::RightParen,
        LogosToken::LeftBrace => Token::LeftBrace,
        LogosToken::RightBrace => Token::RightBrace,
        LogosToken::LeftBracket => Token::LeftBracket,
        LogosToken::RightBracket => Token::RightBracket,
        LogosToken::Semicolon => Token::Semicolon,
        LogosToken::Comma => Token::Comma,
        LogosToken::Whitespace => unreachable!("whitespace is skipped by logos"),
    }
}

impl LexError {
    /// Get the span of this error
    pub fn span(&self) -> &Span {
        match self {
            LexError::UnexpectedCharacter { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedTemplate { span }
            | LexError::UnterminatedComment { span } => span,
        }
    }

    /// Get a description of this error
    pub fn description(&self) -> String {
        match self {
            LexError::UnexpectedCharacter { char, .. } => {
                format!("Unexpected character '{}'", char)
            }
            LexError::UnterminatedString { .. } => "Unterminated string literal".to_string(),
            LexError::UnterminatedTemplate { .. } => "Unterminated template literal".to_string(),
            LexError::UnterminatedComment { .. } => "Unterminated block comment".to_string(),
        }
    }

    /// Get a hint for fixing this error
    pub fn hint(&self) -> Option<String> {
        match self {
            LexError::UnterminatedString { .. } => {
                Some("Add a closing quote on the same line to terminate the string".to_string())
            }
            LexError::UnterminatedTemplate { .. } => {
                Some("Add a closing backtick (`) to terminate the template literal".to_string())
            }
            LexError::UnterminatedComment { .. } => Some("Close the comment with */".to_string()),
            LexError::UnexpectedCharacter { .. } => None,
        }
    }
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.description(),
            self.span().line,
            self.span().column
        )
    }
}

impl std::error::Error for LexError {}
