//! Node evaluation

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ast::{BinaryOperator, Body, Node, UnaryOperator};
use crate::context::ExecutionContext;
use crate::error::JinjaError;
use crate::lexer::Position;
use crate::operators;
use crate::value::{Argument, Function, Value};

impl Body {
    /// Execute every child in order, concatenating the defined results.
    /// The first error stops evaluation.
    pub fn render(&self, ctx: &mut ExecutionContext<'_>) -> Result<String, JinjaError> {
        let mut output = String::new();
        for node in &self.nodes {
            let value = node.execute(ctx)?;
            if !value.is_undefined() {
                output.push_str(&value.to_string());
            }
        }
        Ok(output)
    }

    pub fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Value, JinjaError> {
        self.render(ctx).map(Value::String)
    }
}

impl Node {
    pub fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Value, JinjaError> {
        match self {
            Self::Text { text, .. } => Ok(Value::String(text.clone())),
            Self::Output { expr, .. } => expr.execute(ctx),
            Self::BooleanLiteral { value, .. } => Ok(Value::Boolean(*value)),
            Self::NumberLiteral { value, .. } => Ok(Value::Number(*value)),
            Self::StringLiteral { value, .. } => Ok(Value::String(value.clone())),
            Self::List { items, .. } => {
                let values = items
                    .iter()
                    .map(|item| item.execute(ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(values))
            }
            Self::Variable { position, name } => ctx.get_variable(name, *position),
            Self::Attribute { target, name, .. } => {
                let target = target.execute(ctx)?;
                Ok(operators::attribute(&target, name))
            }
            Self::Index {
                position,
                target,
                index,
            } => {
                let target = target.execute(ctx)?;
                let index = index.execute(ctx)?;
                operators::index(&target, &index, *position)
            }
            Self::BinaryOp {
                position,
                op,
                left,
                right,
            } => execute_binary(ctx, *position, *op, left, right),
            Self::UnaryOp {
                position,
                op,
                operand,
            } => {
                let value = operand.execute(ctx)?;
                match op {
                    UnaryOperator::Not => Ok(Value::Boolean(!value.is_truthy())),
                    UnaryOperator::Neg => operators::negate(&value, *position),
                }
            }
            Self::FunctionCall {
                position,
                callee,
                arguments,
            } => {
                let mut evaluated = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    evaluated.push(Argument {
                        name: argument.name.clone(),
                        value: argument.value.execute(ctx)?,
                    });
                }

                match callee.execute(ctx)? {
                    Value::Function(function) => ctx.call(&function, *position, evaluated),
                    Value::Undefined => Err(JinjaError::UndefinedFunction {
                        position: *position,
                        name: callee.to_string(),
                    }),
                    other => Err(JinjaError::NotCallable {
                        position: *position,
                        name: callee.to_string(),
                        found: other.kind(),
                    }),
                }
            }
            Self::If {
                branches,
                otherwise,
                ..
            } => {
                for branch in branches {
                    if branch.condition.execute(ctx)?.is_truthy() {
                        return branch.body.execute(ctx);
                    }
                }
                match otherwise {
                    Some(body) => body.execute(ctx),
                    None => Ok(Value::Undefined),
                }
            }
            Self::For {
                position,
                targets,
                iterable,
                body,
            } => {
                let collection = iterable.execute(ctx)?;
                let items = loop_items(ctx, iterable, collection, targets.len(), *position)?;
                let length = items.len();

                ctx.scoped(|ctx| {
                    let mut output = String::new();
                    for (index, values) in items.into_iter().enumerate() {
                        for (target, value) in targets.iter().zip(values) {
                            ctx.set_variable(target.as_str(), value);
                        }
                        ctx.set_variable("loop", loop_info(index, length));
                        output.push_str(&body.render(ctx)?);
                    }
                    Ok(Value::String(output))
                })
            }
            Self::Macro(definition) => {
                let function = Function::Macro {
                    definition: Arc::clone(definition),
                    scope: ctx.current_scope(),
                };
                ctx.set_variable(definition.name.as_str(), Value::Function(function));
                Ok(Value::Undefined)
            }
            Self::Set { name, value, .. } => {
                let value = value.execute(ctx)?;
                ctx.set_variable(name.as_str(), value);
                Ok(Value::Undefined)
            }
        }
    }
}

fn execute_binary(
    ctx: &mut ExecutionContext<'_>,
    position: Position,
    op: BinaryOperator,
    left: &Node,
    right: &Node,
) -> Result<Value, JinjaError> {
    let left = left.execute(ctx)?;
    match op {
        BinaryOperator::And if !left.is_truthy() => Ok(left),
        BinaryOperator::Or if left.is_truthy() => Ok(left),
        BinaryOperator::And | BinaryOperator::Or => right.execute(ctx),
        _ => {
            let right = right.execute(ctx)?;
            operators::binary(op, &left, &right, position)
        }
    }
}

/// Per-iteration values for each loop target
fn loop_items(
    ctx: &ExecutionContext<'_>,
    iterable: &Node,
    collection: Value,
    targets: usize,
    position: Position,
) -> Result<Vec<Vec<Value>>, JinjaError> {
    match collection {
        Value::List(items) if targets == 1 => Ok(items.into_iter().map(|item| vec![item]).collect()),
        Value::List(items) => items
            .into_iter()
            .map(|item| match item {
                Value::List(parts) if parts.len() == targets => Ok(parts),
                other => Err(JinjaError::type_mismatch(
                    position,
                    format!("cannot unpack {} into {targets} loop variables", other.kind()),
                )),
            })
            .collect(),
        Value::Mapping(map) if targets == 1 => {
            Ok(map.into_keys().map(|key| vec![Value::String(key)]).collect())
        }
        Value::Mapping(map) => Ok(map
            .into_iter()
            .map(|(key, value)| vec![Value::String(key), value])
            .collect()),
        Value::Undefined => Err(ctx.nil_result_for(iterable)),
        other => Err(JinjaError::type_mismatch(
            position,
            format!("cannot iterate over {}", other.kind()),
        )),
    }
}

fn loop_info(index: usize, length: usize) -> Value {
    let mut info = BTreeMap::new();
    info.insert("index".to_string(), Value::from(index + 1));
    info.insert("index0".to_string(), Value::from(index));
    info.insert("first".to_string(), Value::Boolean(index == 0));
    info.insert("last".to_string(), Value::Boolean(index + 1 == length));
    info.insert("length".to_string(), Value::from(length));
    Value::Mapping(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Globals;
    use crate::template::Template;
    use pretty_assertions::assert_eq;

    fn render(source: &str) -> Result<String, JinjaError> {
        let globals = Globals::new();
        let mut ctx = ExecutionContext::new(&globals);
        Template::parse("test", source)?.render(&mut ctx)
    }

    #[test]
    fn test_short_circuit_returns_deciding_operand() {
        assert_eq!(render("{{ 0 or 'x' }}").unwrap(), "x");
        assert_eq!(render("{{ '' and missing() }}").unwrap(), "");
        assert_eq!(render("{{ 'a' or missing() }}").unwrap(), "a");
        assert_eq!(render("{{ 1 and 2 }}").unwrap(), "2");
    }

    #[test]
    fn test_if_chooses_one_branch() {
        let source = "{% for n in [0, 1, 2] %}{% if n == 0 %}zero{% elif n == 1 %}one{% else %}many{% endif %};{% endfor %}";
        assert_eq!(render(source).unwrap(), "zero;one;many;");
    }

    #[test]
    fn test_loop_variables() {
        let source = "{% for x in ['a', 'b', 'c'] %}{{ loop.index }}{{ x }}{% if not loop.last %},{% endif %}{% endfor %}";
        assert_eq!(render(source).unwrap(), "1a,2b,3c");
    }

    #[test]
    fn test_loop_unpacks_pairs() {
        let source = "{% for k, v in [['b', 2], ['a', 1]] %}{{ k }}={{ v }} {% endfor %}";
        assert_eq!(render(source).unwrap(), "b=2 a=1 ");
    }

    #[test]
    fn test_loop_scope_is_discarded() {
        let source = "{% set x = 'outer' %}{% for i in [1] %}{% set x = 'inner' %}{{ x }}{% endfor %}-{{ x }}{{ i }}";
        assert_eq!(render(source).unwrap(), "inner-outer");
    }

    #[test]
    fn test_iterating_undefined_names_the_expression() {
        let err = render("{% for x in nothing %}{% endfor %}").unwrap_err();
        assert_eq!(err.position(), Position::new(1, 13));
        assert_eq!(err.message(), "`nothing` is undefined");
    }

    #[test]
    fn test_iterating_number_is_type_mismatch() {
        let err = render("{% for x in 3 %}{% endfor %}").unwrap_err();
        assert!(matches!(err, JinjaError::TypeMismatch { .. }));
    }

    #[test]
    fn test_calling_non_function() {
        let err = render("{% set f = 'x' %}{{ f(1) }}").unwrap_err();
        assert_eq!(
            err,
            JinjaError::NotCallable {
                position: Position::new(1, 21),
                name: "f".to_string(),
                found: "string",
            }
        );
    }

    #[test]
    fn test_arguments_evaluate_before_callee() {
        let err = render("{{ missing(1 / 0) }}").unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_set_persists_in_current_scope() {
        assert_eq!(render("{% set a = 2 * 3 %}{{ a }}{{ a + 1 }}").unwrap(), "67");
    }
}
