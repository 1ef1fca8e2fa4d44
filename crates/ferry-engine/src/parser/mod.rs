//! Lexer and parser for Ferry module source.
//!
//! Module files are written in a small JavaScript subset. The whole file is
//! parsed as the body of a function taking `get` and `give`.
//!
//! # Example
//!
//! ```ignore
//! use ferry_engine::parser::Parser;
//!
//! let body = Parser::new("const x = get('./x'); give(x * 2)")?
//!     .parse_function_body()?;
//! assert_eq!(body.len(), 2);
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::FunctionBody;
pub use lexer::{LexError, Lexer};
pub use parser::{ParseError, ParseErrorKind, Parser};
pub use token::{Span, TemplatePart, Token};
