//! Abstract syntax tree
//!
//! Every node records the position of the token it was built from and renders
//! back to template source through `Display`. Evaluation lives in `execute.rs`.

use std::fmt;
use std::sync::Arc;

use crate::lexer::Position;
use crate::value::{escape_string, format_number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Neg,
}

/// A call-site argument; `name` is `None` for positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct CallArgument {
    pub name: Option<String>,
    pub value: Node,
}

/// Ordered sequence of nodes whose outputs are concatenated
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub position: Position,
    pub nodes: Vec<Node>,
}

impl Body {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            nodes: Vec::new(),
        }
    }

    pub fn append(&mut self, node: Node) {
        self.nodes.push(node);
    }
}

/// One `if`/`elif` arm
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Node,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroParameter {
    pub name: String,
    /// Literal default, fixed at parse time
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    pub position: Position,
    pub name: String,
    pub parameters: Vec<MacroParameter>,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Raw template text
    Text { position: Position, text: String },
    /// `{{ expr }}`
    Output { position: Position, expr: Box<Node> },
    BooleanLiteral { position: Position, value: bool },
    NumberLiteral { position: Position, value: f64 },
    StringLiteral { position: Position, value: String },
    List { position: Position, items: Vec<Node> },
    Variable { position: Position, name: String },
    /// `target.name`
    Attribute {
        position: Position,
        target: Box<Node>,
        name: String,
    },
    /// `target[index]`
    Index {
        position: Position,
        target: Box<Node>,
        index: Box<Node>,
    },
    BinaryOp {
        position: Position,
        op: BinaryOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    UnaryOp {
        position: Position,
        op: UnaryOperator,
        operand: Box<Node>,
    },
    FunctionCall {
        position: Position,
        callee: Box<Node>,
        arguments: Vec<CallArgument>,
    },
    If {
        position: Position,
        branches: Vec<Branch>,
        otherwise: Option<Body>,
    },
    For {
        position: Position,
        targets: Vec<String>,
        iterable: Box<Node>,
        body: Body,
    },
    Macro(Arc<MacroDef>),
    Set {
        position: Position,
        name: String,
        value: Box<Node>,
    },
}

impl Node {
    pub fn position(&self) -> Position {
        match self {
            Self::Text { position, .. }
            | Self::Output { position, .. }
            | Self::BooleanLiteral { position, .. }
            | Self::NumberLiteral { position, .. }
            | Self::StringLiteral { position, .. }
            | Self::List { position, .. }
            | Self::Variable { position, .. }
            | Self::Attribute { position, .. }
            | Self::Index { position, .. }
            | Self::BinaryOp { position, .. }
            | Self::UnaryOp { position, .. }
            | Self::FunctionCall { position, .. }
            | Self::If { position, .. }
            | Self::For { position, .. }
            | Self::Set { position, .. } => *position,
            Self::Macro(definition) => definition.position,
        }
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{node}")?;
        }
        Ok(())
    }
}

impl fmt::Display for CallArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{name}=")?;
        }
        write!(f, "{}", self.value)
    }
}

impl fmt::Display for MacroParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        match &self.default {
            Some(Value::String(s)) => write!(f, "='{}'", escape_string(s)),
            Some(Value::Boolean(b)) => write!(f, "={b}"),
            Some(other) => write!(f, "={other}"),
            None => Ok(()),
        }
    }
}

impl fmt::Display for MacroDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{% macro {}(", self.name)?;
        write_separated(f, &self.parameters)?;
        write!(f, ") %}}{}{{% endmacro %}}", self.body)
    }
}

fn write_separated<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { text, .. } => write!(f, "{text}"),
            Self::Output { expr, .. } => write!(f, "{{{{ {expr} }}}}"),
            Self::BooleanLiteral { value, .. } => write!(f, "{value}"),
            Self::NumberLiteral { value, .. } => write!(f, "{}", format_number(*value)),
            Self::StringLiteral { value, .. } => write!(f, "'{}'", escape_string(value)),
            Self::List { items, .. } => {
                write!(f, "[")?;
                write_separated(f, items)?;
                write!(f, "]")
            }
            Self::Variable { name, .. } => write!(f, "{name}"),
            Self::Attribute { target, name, .. } => write!(f, "{target}.{name}"),
            Self::Index { target, index, .. } => write!(f, "{target}[{index}]"),
            Self::BinaryOp { op, left, right, .. } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Self::UnaryOp { op: UnaryOperator::Not, operand, .. } => write!(f, "(not {operand})"),
            Self::UnaryOp { op: UnaryOperator::Neg, operand, .. } => write!(f, "(-{operand})"),
            Self::FunctionCall { callee, arguments, .. } => {
                write!(f, "{callee}(")?;
                write_separated(f, arguments)?;
                write!(f, ")")
            }
            Self::If { branches, otherwise, .. } => {
                for (i, branch) in branches.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elif" };
                    write!(f, "{{% {keyword} {} %}}{}", branch.condition, branch.body)?;
                }
                if let Some(otherwise) = otherwise {
                    write!(f, "{{% else %}}{otherwise}")?;
                }
                write!(f, "{{% endif %}}")
            }
            Self::For { targets, iterable, body, .. } => {
                write!(f, "{{% for {} in {iterable} %}}{body}{{% endfor %}}", targets.join(", "))
            }
            Self::Macro(definition) => write!(f, "{definition}"),
            Self::Set { name, value, .. } => write!(f, "{{% set {name} = {value} %}}"),
        }
    }
}
