//! Runtime values
//!
//! Every expression evaluates to a [`Value`]. Mappings are kept in a
//! `BTreeMap` so iteration and rendering are deterministic.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::MacroDef;
use crate::context::{ExecutionContext, ScopeId};
use crate::error::JinjaError;
use crate::lexer::Position;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Boolean(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
    Function(Function),
}

/// One evaluated call-site argument; `name` is `None` for positional ones
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Value,
}

impl Argument {
    pub fn positional(value: impl Into<Value>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }
}

/// Look up an argument by name, falling back to its positional slot
pub fn find_argument<'a>(arguments: &'a [Argument], index: usize, name: &str) -> Option<&'a Value> {
    arguments
        .iter()
        .find(|arg| arg.name.as_deref() == Some(name))
        .or_else(|| arguments.iter().filter(|arg| arg.name.is_none()).nth(index))
        .map(|arg| &arg.value)
}

/// Signature of functions implemented in Rust
pub type NativeFn =
    dyn Fn(&mut ExecutionContext<'_>, Position, Vec<Argument>) -> Result<Value, JinjaError> + Send + Sync;

#[derive(Clone)]
pub enum Function {
    Native { name: Arc<str>, func: Arc<NativeFn> },
    /// A user macro and the scope it was defined in
    Macro { definition: Arc<MacroDef>, scope: ScopeId },
}

impl Function {
    pub fn native<F>(name: &str, func: F) -> Self
    where
        F: Fn(&mut ExecutionContext<'_>, Position, Vec<Argument>) -> Result<Value, JinjaError>
            + Send
            + Sync
            + 'static,
    {
        Self::Native {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Native { name, .. } => name,
            Self::Macro { definition, .. } => &definition.name,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native { name, .. } => write!(f, "Native({name})"),
            Self::Macro { definition, scope } => {
                write!(f, "Macro({} @ {:?})", definition.name, scope)
            }
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Native { func: a, .. }, Self::Native { func: b, .. }) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (
                Self::Macro { definition: a, scope: sa },
                Self::Macro { definition: b, scope: sb },
            ) => Arc::ptr_eq(a, b) && sa == sb,
            _ => false,
        }
    }
}

impl Value {
    /// Name of the value's kind for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Mapping(_) => "mapping",
            Self::Function(_) => "function",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined => false,
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Mapping(map) => !map.is_empty(),
            Self::Function(_) => true,
        }
    }

    /// Nested rendering: strings are quoted
    fn write_repr(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "'{}'", escape_string(s)),
            other => write!(f, "{other}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Mapping(a), Self::Mapping(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a == b,
            _ => false,
        }
    }
}

/// Renders the value as template output text
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => Ok(()),
            Self::Boolean(true) => write!(f, "TRUE"),
            Self::Boolean(false) => write!(f, "FALSE"),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::String(s) => write!(f, "{s}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.write_repr(f)?;
                }
                write!(f, "]")
            }
            Self::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}': ", escape_string(key))?;
                    value.write_repr(f)?;
                }
                write!(f, "}}")
            }
            Self::Function(Function::Native { name, .. }) => write!(f, "<function {name}>"),
            Self::Function(Function::Macro { definition, .. }) => {
                write!(f, "<macro {}>", definition.name)
            }
        }
    }
}

/// Integral numbers print without a fractional part
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

pub(crate) fn escape_string(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Self::Mapping(value)
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Self::Function(value)
    }
}
