//! Built-in globals and the methods of arrays and strings.

use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::context::ExecutionContext;
use super::eval::call_function;
use super::value::{format_number, join_array, ArrayRef, ObjectRef, Value};
use crate::error::{Error, Result, RuntimeErrorKind};

/// Largest index an assignment may grow an array to.
const MAX_ARRAY_LENGTH: usize = 1 << 24;

type Builtin = fn(&ExecutionContext, Value, Vec<Value>) -> Result<Value>;

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn object_of(entries: &[(&str, Value)]) -> Value {
    let mut properties = IndexMap::new();
    for (name, value) in entries {
        properties.insert(Rc::from(*name), value.clone());
    }
    Value::object(properties)
}

fn native(name: &'static str, f: Builtin) -> (&'static str, Value) {
    (name, Value::native(name, f))
}

// ============================================================================
// Globals
// ============================================================================

/// Populate a fresh global object.
pub fn install_globals(global: &ObjectRef) {
    let console = vec![native("log", console_log), native("error", console_error)];

    let mut math = vec![
        native("floor", |_, _, a| Ok(Value::Number(arg(&a, 0).to_number().floor()))),
        native("ceil", |_, _, a| Ok(Value::Number(arg(&a, 0).to_number().ceil()))),
        native("round", |_, _, a| Ok(Value::Number((arg(&a, 0).to_number() + 0.5).floor()))),
        native("trunc", |_, _, a| Ok(Value::Number(arg(&a, 0).to_number().trunc()))),
        native("abs", |_, _, a| Ok(Value::Number(arg(&a, 0).to_number().abs()))),
        native("sqrt", |_, _, a| Ok(Value::Number(arg(&a, 0).to_number().sqrt()))),
        native("pow", |_, _, a| {
            Ok(Value::Number(arg(&a, 0).to_number().powf(arg(&a, 1).to_number())))
        }),
        native("min", |_, _, a| Ok(Value::Number(fold_numbers(&a, f64::INFINITY, f64::min)))),
        native("max", |_, _, a| Ok(Value::Number(fold_numbers(&a, f64::NEG_INFINITY, f64::max)))),
    ];
    math.push(("PI", Value::Number(std::f64::consts::PI)));

    let json = vec![native("stringify", json_stringify), native("parse", json_parse)];
    let object = vec![
        native("keys", object_keys),
        native("values", object_values),
        native("entries", object_entries),
    ];
    let array = vec![native("isArray", |_, _, a| {
        Ok(Value::Bool(matches!(arg(&a, 0), Value::Array(_))))
    })];

    let mut globals: Vec<(&str, Value)> = vec![
        ("console", object_of(&console)),
        ("Math", object_of(&math)),
        ("JSON", object_of(&json)),
        ("Object", object_of(&object)),
        ("Array", object_of(&array)),
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
    ];
    globals.extend(vec![
        native("String", |_, _, a| {
            Ok(Value::string(a.first().map(Value::to_string).unwrap_or_default()))
        }),
        native("Number", |_, _, a| {
            Ok(Value::Number(a.first().map_or(0.0, Value::to_number)))
        }),
        native("Boolean", |_, _, a| Ok(Value::Bool(arg(&a, 0).is_truthy()))),
        native("isNaN", |_, _, a| Ok(Value::Bool(arg(&a, 0).to_number().is_nan()))),
        native("parseInt", parse_int),
        native("parseFloat", parse_float),
        native("Error", make_error),
    ]);

    let mut global = global.borrow_mut();
    for (name, value) in globals {
        global.insert(name.into(), value);
    }
}

fn fold_numbers(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> f64 {
    args.iter().fold(init, |acc, v| {
        let n = v.to_number();
        if acc.is_nan() || n.is_nan() {
            f64::NAN
        } else {
            f(acc, n)
        }
    })
}

fn render_arguments(args: &[Value]) -> String {
    args.iter()
        .map(Value::inspect)
        .collect::<Vec<_>>()
        .join(" ")
}

fn console_log(ctx: &ExecutionContext, _this: Value, args: Vec<Value>) -> Result<Value> {
    ctx.console().log(&render_arguments(&args));
    Ok(Value::Undefined)
}

fn console_error(ctx: &ExecutionContext, _this: Value, args: Vec<Value>) -> Result<Value> {
    ctx.console().error(&render_arguments(&args));
    Ok(Value::Undefined)
}

fn json_stringify(_ctx: &ExecutionContext, _this: Value, args: Vec<Value>) -> Result<Value> {
    let Some(json) = arg(&args, 0).to_json()? else {
        return Ok(Value::Undefined);
    };
    let pretty = match arg(&args, 2) {
        Value::Number(n) => n >= 1.0,
        Value::String(s) => !s.is_empty(),
        _ => false,
    };
    let text = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    text.map(Value::string)
        .map_err(|e| Error::type_error(e.to_string()))
}

fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::string(s),
        serde_json::Value::Array(items) => Value::array(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::object(
            map.into_iter()
                .map(|(k, v)| (Rc::from(k), from_json(v)))
                .collect(),
        ),
    }
}

fn json_parse(_ctx: &ExecutionContext, _this: Value, args: Vec<Value>) -> Result<Value> {
    let text = arg(&args, 0).to_string();
    serde_json::from_str(&text).map(from_json).map_err(|e| {
        Error::runtime(
            RuntimeErrorKind::Thrown,
            format!("SyntaxError: {} in JSON", e),
        )
    })
}

fn object_keys(_ctx: &ExecutionContext, _this: Value, args: Vec<Value>) -> Result<Value> {
    Ok(Value::array(match arg(&args, 0) {
        Value::Object(properties) => properties
            .borrow()
            .keys()
            .map(|k| Value::String(k.clone()))
            .collect(),
        Value::Array(items) => (0..items.borrow().len())
            .map(|i| Value::string(i.to_string()))
            .collect(),
        _ => Vec::new(),
    }))
}

fn object_values(_ctx: &ExecutionContext, _this: Value, args: Vec<Value>) -> Result<Value> {
    Ok(Value::array(match arg(&args, 0) {
        Value::Object(properties) => properties.borrow().values().cloned().collect(),
        Value::Array(items) => items.borrow().clone(),
        _ => Vec::new(),
    }))
}

fn object_entries(_ctx: &ExecutionContext, _this: Value, args: Vec<Value>) -> Result<Value> {
    Ok(Value::array(match arg(&args, 0) {
        Value::Object(properties) => properties
            .borrow()
            .iter()
            .map(|(k, v)| Value::array(vec![Value::String(k.clone()), v.clone()]))
            .collect(),
        _ => Vec::new(),
    }))
}

fn parse_int(_ctx: &ExecutionContext, _this: Value, args: Vec<Value>) -> Result<Value> {
    let text = arg(&args, 0).to_string();
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut radix = match arg(&args, 1) {
        Value::Undefined => 10,
        other => other.to_number() as u32,
    };
    let mut digits = digits;
    if radix == 0 || radix == 16 {
        if let Some(rest) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            digits = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }

    let mut result: Option<f64> = None;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => result = Some(result.unwrap_or(0.0) * f64::from(radix) + f64::from(d)),
            None => break,
        }
    }
    Ok(Value::Number(match result {
        Some(n) if negative => -n,
        Some(n) => n,
        None => f64::NAN,
    }))
}

fn parse_float(_ctx: &ExecutionContext, _this: Value, args: Vec<Value>) -> Result<Value> {
    let text = arg(&args, 0).to_string();
    let text = text.trim_start();
    if text.starts_with("Infinity") || text.starts_with("+Infinity") {
        return Ok(Value::Number(f64::INFINITY));
    }
    if text.starts_with("-Infinity") {
        return Ok(Value::Number(f64::NEG_INFINITY));
    }
    // Longest prefix that parses as a number.
    let end = text
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || matches!(*c, '.' | 'e' | 'E' | '+' | '-'))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    let number = (1..=end)
        .rev()
        .find_map(|len| text[..len].parse::<f64>().ok())
        .unwrap_or(f64::NAN);
    Ok(Value::Number(number))
}

fn make_error(_ctx: &ExecutionContext, _this: Value, args: Vec<Value>) -> Result<Value> {
    let message = match arg(&args, 0) {
        Value::Undefined => Value::string(""),
        other => Value::string(other.to_string()),
    };
    Ok(object_of(&[("name", Value::string("Error")), ("message", message)]))
}

/// Text reported for an uncaught `throw` of `value`.
pub fn describe_thrown(value: &Value) -> String {
    if let Value::Object(properties) = value {
        let properties = properties.borrow();
        if let Some(message) = properties.get("message") {
            let name = properties
                .get("name")
                .map(Value::to_string)
                .unwrap_or_else(|| "Error".to_string());
            return format!("{}: {}", name, message);
        }
    }
    match value {
        Value::String(s) => s.to_string(),
        other => other.inspect(),
    }
}

// ============================================================================
// Property access
// ============================================================================

/// Property name for a computed key.
pub fn property_key(key: &Value) -> Rc<str> {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(*n).into(),
        other => other.to_string().into(),
    }
}

/// Canonical array index (`"3"` but not `"03"` or `"3.0"`).
fn array_index(key: &str) -> Option<usize> {
    key.parse::<usize>()
        .ok()
        .filter(|index| index.to_string() == key)
}

/// Read `object[key]`.
pub fn get_property(ctx: &ExecutionContext, object: &Value, key: &str) -> Result<Value> {
    match object {
        Value::Undefined | Value::Null => Err(Error::type_error(format!(
            "Cannot read properties of {} (reading '{}')",
            object, key
        ))),
        Value::Object(properties) => Ok(properties.borrow().get(key).cloned().unwrap_or_default()),
        Value::Array(items) => {
            if key == "length" {
                return Ok(Value::Number(items.borrow().len() as f64));
            }
            if let Some(index) = array_index(key) {
                return Ok(items.borrow().get(index).cloned().unwrap_or_default());
            }
            Ok(ctx.prototypes().array(key))
        }
        Value::String(s) => {
            if key == "length" {
                return Ok(Value::Number(s.chars().count() as f64));
            }
            if let Some(index) = array_index(key) {
                return Ok(s
                    .chars()
                    .nth(index)
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or_default());
            }
            Ok(ctx.prototypes().string(key))
        }
        Value::Function(function) if key == "name" => {
            Ok(Value::string(function.name().unwrap_or("")))
        }
        _ => Ok(Value::Undefined),
    }
}

/// Write `object[key] = value`.
pub fn set_property(object: &Value, key: &str, value: Value) -> Result<()> {
    match object {
        Value::Undefined | Value::Null => Err(Error::type_error(format!(
            "Cannot set properties of {} (setting '{}')",
            object, key
        ))),
        Value::Object(properties) => {
            properties.borrow_mut().insert(key.into(), value);
            Ok(())
        }
        Value::Array(items) => {
            if key == "length" {
                let length = value.to_number();
                if length < 0.0 || length.fract() != 0.0 || length > MAX_ARRAY_LENGTH as f64 {
                    return Err(Error::range_error("Invalid array length"));
                }
                items.borrow_mut().resize(length as usize, Value::Undefined);
                return Ok(());
            }
            match array_index(key) {
                Some(index) if index < MAX_ARRAY_LENGTH => {
                    let mut items = items.borrow_mut();
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                    Ok(())
                }
                Some(_) => Err(Error::range_error("Invalid array length")),
                // Named properties on arrays are not kept.
                None => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

// ============================================================================
// Array and string methods
// ============================================================================

/// Shared method tables for arrays and strings.
pub(crate) struct Prototypes {
    array: FxHashMap<&'static str, Value>,
    string: FxHashMap<&'static str, Value>,
}

impl Prototypes {
    pub(crate) fn new() -> Self {
        let array = vec![
            native("push", array_push),
            native("pop", array_pop),
            native("join", array_join),
            native("map", array_map),
            native("filter", array_filter),
            native("forEach", array_for_each),
            native("reduce", array_reduce),
            native("includes", array_includes),
            native("indexOf", array_index_of),
            native("slice", array_slice),
            native("concat", array_concat),
        ];
        let string = vec![
            native("toUpperCase", |_, this, _| Ok(Value::string(this_string(&this)?.to_uppercase()))),
            native("toLowerCase", |_, this, _| Ok(Value::string(this_string(&this)?.to_lowercase()))),
            native("trim", |_, this, _| Ok(Value::string(this_string(&this)?.trim()))),
            native("includes", |_, this, a| {
                Ok(Value::Bool(this_string(&this)?.contains(&*arg(&a, 0).to_string())))
            }),
            native("startsWith", |_, this, a| {
                Ok(Value::Bool(this_string(&this)?.starts_with(&*arg(&a, 0).to_string())))
            }),
            native("endsWith", |_, this, a| {
                Ok(Value::Bool(this_string(&this)?.ends_with(&*arg(&a, 0).to_string())))
            }),
            native("indexOf", string_index_of),
            native("slice", string_slice),
            native("split", string_split),
        ];
        Self {
            array: array.into_iter().collect(),
            string: string.into_iter().collect(),
        }
    }

    pub(crate) fn array(&self, name: &str) -> Value {
        self.array.get(name).cloned().unwrap_or_default()
    }

    pub(crate) fn string(&self, name: &str) -> Value {
        self.string.get(name).cloned().unwrap_or_default()
    }
}

fn this_array(this: &Value) -> Result<ArrayRef> {
    match this {
        Value::Array(items) => Ok(items.clone()),
        other => Err(Error::type_error(format!(
            "Array method called on {}",
            other.type_of()
        ))),
    }
}

fn this_string(this: &Value) -> Result<Rc<str>> {
    match this {
        Value::String(s) => Ok(s.clone()),
        other => Err(Error::type_error(format!(
            "String method called on {}",
            other.type_of()
        ))),
    }
}

fn callback(args: &[Value], method: &str) -> Result<Value> {
    match args.first() {
        Some(f @ Value::Function(_)) => Ok(f.clone()),
        other => Err(Error::type_error(format!(
            "{} is not a function (in Array.prototype.{})",
            other.map(Value::inspect).unwrap_or_else(|| "undefined".to_string()),
            method
        ))),
    }
}

/// Normalize a relative index argument against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

fn array_push(_ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let items = this_array(&this)?;
    let mut items = items.borrow_mut();
    items.extend(args);
    Ok(Value::Number(items.len() as f64))
}

fn array_pop(_ctx: &ExecutionContext, this: Value, _args: Vec<Value>) -> Result<Value> {
    Ok(this_array(&this)?.borrow_mut().pop().unwrap_or_default())
}

fn array_join(_ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let separator = match arg(&args, 0) {
        Value::Undefined => ",".to_string(),
        other => other.to_string(),
    };
    Ok(Value::string(join_array(&this_array(&this)?, &separator)))
}

/// Call `f(item, index, array)` for a snapshot of the array.
fn for_each_item(
    ctx: &ExecutionContext,
    this: &Value,
    f: &Value,
    mut visit: impl FnMut(Value, Value) -> bool,
) -> Result<()> {
    let snapshot = this_array(this)?.borrow().clone();
    for (index, item) in snapshot.into_iter().enumerate() {
        let result = call_function(
            ctx,
            f,
            Value::Undefined,
            vec![item.clone(), Value::Number(index as f64), this.clone()],
        )?;
        if !visit(item, result) {
            break;
        }
    }
    Ok(())
}

fn array_map(ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let f = callback(&args, "map")?;
    let mut out = Vec::new();
    for_each_item(ctx, &this, &f, |_, result| {
        out.push(result);
        true
    })?;
    Ok(Value::array(out))
}

fn array_filter(ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let f = callback(&args, "filter")?;
    let mut out = Vec::new();
    for_each_item(ctx, &this, &f, |item, keep| {
        if keep.is_truthy() {
            out.push(item);
        }
        true
    })?;
    Ok(Value::array(out))
}

fn array_for_each(ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let f = callback(&args, "forEach")?;
    for_each_item(ctx, &this, &f, |_, _| true)?;
    Ok(Value::Undefined)
}

fn array_reduce(ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let f = callback(&args, "reduce")?;
    let snapshot = this_array(&this)?.borrow().clone();
    let mut items = snapshot.into_iter().enumerate();
    let mut acc = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match items.next() {
            Some((_, first)) => first,
            None => {
                return Err(Error::type_error(
                    "Reduce of empty array with no initial value",
                ))
            }
        },
    };
    for (index, item) in items {
        acc = call_function(
            ctx,
            &f,
            Value::Undefined,
            vec![acc, item, Value::Number(index as f64), this.clone()],
        )?;
    }
    Ok(acc)
}

fn array_includes(_ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let needle = arg(&args, 0);
    let items = this_array(&this)?;
    let found = items.borrow().iter().any(|item| same_value_zero(item, &needle));
    Ok(Value::Bool(found))
}

fn array_index_of(_ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let needle = arg(&args, 0);
    let items = this_array(&this)?;
    let position = items.borrow().iter().position(|item| item.strict_equals(&needle));
    Ok(Value::Number(position.map_or(-1.0, |i| i as f64)))
}

fn array_slice(_ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let items = this_array(&this)?;
    let items = items.borrow();
    let start = relative_index(&arg(&args, 0), items.len(), 0);
    let end = relative_index(&arg(&args, 1), items.len(), items.len());
    Ok(Value::array(if start < end {
        items[start..end].to_vec()
    } else {
        Vec::new()
    }))
}

fn array_concat(_ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let mut out = this_array(&this)?.borrow().clone();
    for value in args {
        match value {
            Value::Array(more) => out.extend(more.borrow().iter().cloned()),
            other => out.push(other),
        }
    }
    Ok(Value::array(out))
}

fn string_index_of(_ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let s = this_string(&this)?;
    let needle = arg(&args, 0).to_string();
    Ok(Value::Number(match s.find(&needle) {
        Some(byte) => s[..byte].chars().count() as f64,
        None => -1.0,
    }))
}

fn string_slice(_ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let chars: Vec<char> = this_string(&this)?.chars().collect();
    let start = relative_index(&arg(&args, 0), chars.len(), 0);
    let end = relative_index(&arg(&args, 1), chars.len(), chars.len());
    Ok(Value::string(if start < end {
        chars[start..end].iter().collect::<String>()
    } else {
        String::new()
    }))
}

fn string_split(_ctx: &ExecutionContext, this: Value, args: Vec<Value>) -> Result<Value> {
    let s = this_string(&this)?;
    let parts: Vec<Value> = match arg(&args, 0) {
        Value::Undefined => vec![Value::String(s)],
        separator => {
            let separator = separator.to_string();
            if separator.is_empty() {
                s.chars().map(|c| Value::string(c.to_string())).collect()
            } else {
                s.split(separator.as_str()).map(Value::string).collect()
            }
        }
    };
    Ok(Value::array(parts))
}
