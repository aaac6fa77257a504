//! Built-in functions
//!
//! Global functions available to every template, plus the methods bound to
//! strings and mappings through attribute access (`name.upper()`).

use std::collections::BTreeMap;

use crate::context::{ExecutionContext, Globals};
use crate::error::JinjaError;
use crate::lexer::Position;
use crate::value::{find_argument, Argument, Function, Value};

/// Upper bound on the number of items `range()` may produce
pub const MAX_RANGE_ITEMS: usize = 100_000;

const STRING_METHODS: &[&str] = &[
    "upper",
    "lower",
    "strip",
    "replace",
    "split",
    "startswith",
    "endswith",
    "join",
];

const MAPPING_METHODS: &[&str] = &["keys", "values", "items", "get"];

/// Globals holding every built-in function
pub fn builtin_globals() -> Globals {
    let mut globals = Globals::new();
    let functions = [
        Function::native("range", range_function),
        Function::native("len", len_function),
        Function::native("log", log_function),
        Function::native("raise_error", raise_error_function),
    ];
    for function in functions {
        globals.insert(function.name().to_string(), Value::Function(function));
    }
    globals
}

/// Required string argument, by name or position
pub fn string_argument(
    arguments: &[Argument],
    index: usize,
    name: &str,
    function: &str,
    position: Position,
) -> Result<String, JinjaError> {
    match find_argument(arguments, index, name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(JinjaError::type_mismatch(
            position,
            format!("{function}() argument `{name}` must be a string, got {}", other.kind()),
        )),
        None => Err(JinjaError::Runtime {
            position,
            message: format!("{function}() is missing argument `{name}`"),
        }),
    }
}

fn optional_string(
    arguments: &[Argument],
    index: usize,
    name: &str,
    function: &str,
    position: Position,
) -> Result<Option<String>, JinjaError> {
    match find_argument(arguments, index, name) {
        None | Some(Value::Undefined) => Ok(None),
        Some(_) => string_argument(arguments, index, name, function, position).map(Some),
    }
}

fn integer_argument(value: &Value, function: &str, position: Position) -> Result<i64, JinjaError> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Ok(*n as i64),
        other => Err(JinjaError::type_mismatch(
            position,
            format!("{function}() expects integers, got {}", other.kind()),
        )),
    }
}

/// range() function - list of integers
///
/// Usage in Jinja: {{ range(3) }} or {{ range(1, 10, 2) }}
/// Returns: [0, 1, 2] or [1, 3, 5, 7, 9]
fn range_function(
    _ctx: &mut ExecutionContext<'_>,
    position: Position,
    arguments: Vec<Argument>,
) -> Result<Value, JinjaError> {
    let bounds = arguments
        .iter()
        .map(|arg| integer_argument(&arg.value, "range", position))
        .collect::<Result<Vec<_>, _>>()?;

    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => {
            return Err(JinjaError::Runtime {
                position,
                message: format!("range() takes 1 to 3 arguments, got {}", bounds.len()),
            })
        }
    };

    if step == 0 {
        return Err(JinjaError::Runtime {
            position,
            message: "range() step must not be zero".to_string(),
        });
    }

    // Widened so bounds near the ends of the i64 range cannot overflow
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let span = if step > 0 { stop - start } else { start - stop };
    let count = if span <= 0 {
        0
    } else {
        (span - 1) / step.abs() + 1
    };
    if count > MAX_RANGE_ITEMS as i128 {
        return Err(JinjaError::Runtime {
            position,
            message: format!("range() would produce {count} items, limit is {MAX_RANGE_ITEMS}"),
        });
    }

    Ok(Value::List(
        (0..count)
            .map(|i| Value::Number((start + i * step) as f64))
            .collect(),
    ))
}

/// len() function - size of a string, list or mapping
///
/// Usage in Jinja: {{ len(columns) }}
fn len_function(
    _ctx: &mut ExecutionContext<'_>,
    position: Position,
    arguments: Vec<Argument>,
) -> Result<Value, JinjaError> {
    match find_argument(&arguments, 0, "value") {
        Some(Value::String(s)) => Ok(Value::from(s.chars().count())),
        Some(Value::List(items)) => Ok(Value::from(items.len())),
        Some(Value::Mapping(map)) => Ok(Value::from(map.len())),
        Some(other) => Err(JinjaError::type_mismatch(
            position,
            format!("len() of {} is not defined", other.kind()),
        )),
        None => Err(JinjaError::Runtime {
            position,
            message: "len() is missing argument `value`".to_string(),
        }),
    }
}

/// log() function - emit a message at info level
///
/// Usage in Jinja: {{ log('building ' + name) }}
/// Returns: nothing; the call renders as empty text
fn log_function(
    _ctx: &mut ExecutionContext<'_>,
    position: Position,
    arguments: Vec<Argument>,
) -> Result<Value, JinjaError> {
    let message = find_argument(&arguments, 0, "msg")
        .map(Value::to_string)
        .unwrap_or_default();
    tracing::info!(target: "jinsql::template", %position, "{message}");
    Ok(Value::Undefined)
}

/// raise_error() function - abort rendering with a message
///
/// Usage in Jinja: {% if not key %}{{ raise_error('key is required') }}{% endif %}
fn raise_error_function(
    _ctx: &mut ExecutionContext<'_>,
    position: Position,
    arguments: Vec<Argument>,
) -> Result<Value, JinjaError> {
    let message = find_argument(&arguments, 0, "msg")
        .map(Value::to_string)
        .unwrap_or_else(|| "raise_error() called".to_string());
    Err(JinjaError::Runtime { position, message })
}

/// Method `name` bound to `receiver`, if the receiver's kind has one
pub(crate) fn bound_method(receiver: &Value, name: &str) -> Option<Function> {
    let methods = match receiver {
        Value::String(_) => STRING_METHODS,
        Value::Mapping(_) => MAPPING_METHODS,
        _ => return None,
    };
    let method: &'static str = methods.iter().copied().find(|m| *m == name)?;

    let receiver = receiver.clone();
    Some(Function::native(method, move |_, position, arguments| {
        call_method(&receiver, method, position, &arguments)
    }))
}

fn call_method(
    receiver: &Value,
    method: &str,
    position: Position,
    arguments: &[Argument],
) -> Result<Value, JinjaError> {
    match receiver {
        Value::String(s) => string_method(s, method, position, arguments),
        Value::Mapping(map) => mapping_method(map, method, arguments),
        _ => Ok(Value::Undefined),
    }
}

fn string_method(
    s: &str,
    method: &str,
    position: Position,
    arguments: &[Argument],
) -> Result<Value, JinjaError> {
    let value = match method {
        "upper" => Value::from(s.to_uppercase()),
        "lower" => Value::from(s.to_lowercase()),
        "strip" => match optional_string(arguments, 0, "chars", method, position)? {
            Some(chars) => Value::from(s.trim_matches(|c: char| chars.contains(c))),
            None => Value::from(s.trim()),
        },
        "replace" => {
            let old = string_argument(arguments, 0, "old", method, position)?;
            let new = string_argument(arguments, 1, "new", method, position)?;
            Value::from(s.replace(&old, &new))
        }
        "split" => {
            let parts: Vec<Value> = match optional_string(arguments, 0, "sep", method, position)? {
                Some(sep) if !sep.is_empty() => s.split(sep.as_str()).map(Value::from).collect(),
                _ => s.split_whitespace().map(Value::from).collect(),
            };
            Value::List(parts)
        }
        "startswith" => {
            let prefix = string_argument(arguments, 0, "prefix", method, position)?;
            Value::Boolean(s.starts_with(&prefix))
        }
        "endswith" => {
            let suffix = string_argument(arguments, 0, "suffix", method, position)?;
            Value::Boolean(s.ends_with(&suffix))
        }
        "join" => match find_argument(arguments, 0, "items") {
            Some(Value::List(items)) => {
                let parts: Vec<String> = items.iter().map(Value::to_string).collect();
                Value::from(parts.join(s))
            }
            other => {
                return Err(JinjaError::type_mismatch(
                    position,
                    format!(
                        "join() expects a list, got {}",
                        other.map_or("nothing", Value::kind)
                    ),
                ))
            }
        },
        _ => Value::Undefined,
    };
    Ok(value)
}

fn mapping_method(
    map: &BTreeMap<String, Value>,
    method: &str,
    arguments: &[Argument],
) -> Result<Value, JinjaError> {
    let value = match method {
        "keys" => Value::List(map.keys().map(|k| Value::from(k.as_str())).collect()),
        "values" => Value::List(map.values().cloned().collect()),
        "items" => Value::List(
            map.iter()
                .map(|(k, v)| Value::List(vec![Value::from(k.as_str()), v.clone()]))
                .collect(),
        ),
        "get" => {
            let found = match find_argument(arguments, 0, "key") {
                Some(Value::String(key)) => map.get(key).cloned(),
                _ => None,
            };
            found
                .or_else(|| find_argument(arguments, 1, "default").cloned())
                .unwrap_or_default()
        }
        _ => Value::Undefined,
    };
    Ok(value)
}
