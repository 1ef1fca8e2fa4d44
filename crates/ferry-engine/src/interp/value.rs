//! Runtime values
//!
//! Arrays and objects are shared by reference (`Rc<RefCell<..>>`), the same
//! way script code observes them. Objects keep insertion order.

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;

use super::context::ExecutionContext;
use super::scope::Scope;
use crate::error::{Error, Result};
use crate::parser::ast::FunctionLiteral;
use crate::stack::ensure_sufficient_stack;

/// Shared, mutable array storage
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Shared, mutable, insertion-ordered property map
pub type ObjectRef = Rc<RefCell<IndexMap<Rc<str>, Value>>>;

/// Signature of a host function: `(context, this, arguments)`.
pub type NativeFn = dyn Fn(&ExecutionContext, Value, Vec<Value>) -> Result<Value>;

/// A script value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Rc<Function>),
}

/// A callable value.
pub enum Function {
    /// Script-defined function and the scope it closes over
    Closure(Closure),
    /// Host function
    Native(NativeFunction),
}

pub struct Closure {
    pub literal: Rc<FunctionLiteral>,
    pub scope: Rc<Scope>,
    /// Module file the function was defined in, for error locations
    pub origin: Rc<Path>,
}

pub struct NativeFunction {
    pub name: Rc<str>,
    pub call: Box<NativeFn>,
}

impl Function {
    pub fn name(&self) -> Option<&str> {
        match self {
            Function::Closure(closure) => closure.literal.name.as_deref(),
            Function::Native(native) => Some(&native.name),
        }
    }
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(properties: IndexMap<Rc<str>, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(properties)))
    }

    /// Wrap a host function.
    pub fn native<F>(name: &str, call: F) -> Self
    where
        F: Fn(&ExecutionContext, Value, Vec<Value>) -> Result<Value> + 'static,
    {
        Value::Function(Rc::new(Function::Native(NativeFunction {
            name: name.into(),
            call: Box::new(call),
        })))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
        }
    }

    /// Numeric conversion (`Number(value)`).
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_string()),
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            (Value::Array(_), Value::String(_) | Value::Number(_)) => {
                Value::string(self.to_string()).loose_equals(other)
            }
            (Value::String(_) | Value::Number(_), Value::Array(_)) => {
                self.loose_equals(&Value::string(other.to_string()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// Rendering used by `console.log`: strings nested in containers are quoted.
    pub fn inspect(&self) -> String {
        let mut out = String::new();
        inspect_into(self, &mut out, 0, false);
        out
    }

    /// Convert to JSON; `None` for values `JSON.stringify` skips.
    pub fn to_json(&self) -> Result<Option<serde_json::Value>> {
        to_json(self, &mut Vec::new())
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let radix = |prefix: &[&str], radix: u32| {
        prefix
            .iter()
            .find_map(|p| trimmed.strip_prefix(p))
            .map(|digits| {
                u64::from_str_radix(digits, radix)
                    .map(|n| n as f64)
                    .unwrap_or(f64::NAN)
            })
    };
    if let Some(n) = radix(&["0x", "0X"], 16)
        .or_else(|| radix(&["0b", "0B"], 2))
        .or_else(|| radix(&["0o", "0O"], 8))
    {
        return n;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            f64::NAN
        }
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

/// Format a number the way script code prints it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let magnitude = n.abs();
    if n.fract() == 0.0 && magnitude < 1e21 {
        return format!("{:.0}", n);
    }
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{}", n);
    }
    let formatted = format!("{:e}", n);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => formatted,
    }
}

impl fmt::Display for Value {
    /// Conversion performed by `String(value)` and `+` concatenation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => f.write_str(&join_array(items, ",")),
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Function(func) => {
                write!(f, "function {}() {{ [code] }}", func.name().unwrap_or(""))
            }
        }
    }
}

/// `Array.prototype.join`. Nullish items, and arrays already being joined
/// further up, render as empty strings.
pub fn join_array(items: &ArrayRef, separator: &str) -> String {
    let mut out = String::new();
    join_into(items, separator, &mut out, &mut Vec::new());
    out
}

fn join_into(items: &ArrayRef, separator: &str, out: &mut String, seen: &mut Vec<*const ()>) {
    let id = Rc::as_ptr(items) as *const ();
    if seen.contains(&id) {
        return;
    }
    seen.push(id);
    for (i, item) in items.borrow().iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        match item {
            Value::Array(inner) => {
                ensure_sufficient_stack(|| join_into(inner, ",", out, seen));
            }
            item if item.is_nullish() => {}
            item => out.push_str(&item.to_string()),
        }
    }
    seen.pop();
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

const INSPECT_DEPTH: usize = 2;

fn inspect_into(value: &Value, out: &mut String, depth: usize, nested: bool) {
    match value {
        Value::String(s) if nested => {
            out.push('\'');
            out.push_str(s);
            out.push('\'');
        }
        Value::Array(items) => {
            let items = items.borrow();
            if items.is_empty() {
                out.push_str("[]");
            } else if depth > INSPECT_DEPTH {
                out.push_str("[Array]");
            } else {
                out.push_str("[ ");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    inspect_into(item, out, depth + 1, true);
                }
                out.push_str(" ]");
            }
        }
        Value::Object(properties) => {
            let properties = properties.borrow();
            if properties.is_empty() {
                out.push_str("{}");
            } else if depth > INSPECT_DEPTH {
                out.push_str("[Object]");
            } else {
                out.push_str("{ ");
                for (i, (key, item)) in properties.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if is_plain_key(key) {
                        out.push_str(key);
                    } else {
                        out.push('\'');
                        out.push_str(key);
                        out.push('\'');
                    }
                    out.push_str(": ");
                    inspect_into(item, out, depth + 1, true);
                }
                out.push_str(" }");
            }
        }
        Value::Function(func) => match func.name() {
            Some(name) if !name.is_empty() => {
                out.push_str("[Function: ");
                out.push_str(name);
                out.push(']');
            }
            _ => out.push_str("[Function (anonymous)]"),
        },
        other => out.push_str(&other.to_string()),
    }
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn to_json(value: &Value, seen: &mut Vec<*const ()>) -> Result<Option<serde_json::Value>> {
    Ok(Some(match value {
        Value::Undefined | Value::Function(_) => return Ok(None),
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) if !n.is_finite() => serde_json::Value::Null,
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 9e15 => {
            serde_json::Value::from(*n as i64)
        }
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Array(items) => {
            let id = Rc::as_ptr(items) as *const ();
            enter(seen, id)?;
            let mut out = Vec::new();
            for item in items.borrow().iter() {
                out.push(to_json(item, seen)?.unwrap_or(serde_json::Value::Null));
            }
            seen.pop();
            serde_json::Value::Array(out)
        }
        Value::Object(properties) => {
            let id = Rc::as_ptr(properties) as *const ();
            enter(seen, id)?;
            let mut out = serde_json::Map::new();
            for (key, item) in properties.borrow().iter() {
                if let Some(json) = to_json(item, seen)? {
                    out.insert(key.to_string(), json);
                }
            }
            seen.pop();
            serde_json::Value::Object(out)
        }
    }))
}

fn enter(seen: &mut Vec<*const ()>, id: *const ()) -> Result<()> {
    if seen.contains(&id) {
        return Err(Error::type_error("Converting circular structure to JSON"));
    }
    seen.push(id);
    Ok(())
}
