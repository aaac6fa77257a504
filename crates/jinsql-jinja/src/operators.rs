//! Operator semantics
//!
//! Combinations not listed here are a `TypeMismatch`. Lookups never fail:
//! missing keys, out-of-range indexes and anything read from `Undefined` come
//! back as `Undefined`.

use std::cmp::Ordering;

use crate::ast::BinaryOperator;
use crate::error::JinjaError;
use crate::functions::bound_method;
use crate::lexer::Position;
use crate::value::Value;

pub fn binary(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
    position: Position,
) -> Result<Value, JinjaError> {
    let ordered = |test: fn(Ordering) -> bool| {
        compare(op, left, right, position).map(|ordering| Value::Boolean(test(ordering)))
    };

    match op {
        BinaryOperator::Or => Ok(if left.is_truthy() { left } else { right }.clone()),
        BinaryOperator::And => Ok(if left.is_truthy() { right } else { left }.clone()),
        BinaryOperator::Eq => Ok(Value::Boolean(left == right)),
        BinaryOperator::NotEq => Ok(Value::Boolean(left != right)),
        BinaryOperator::Lt => ordered(Ordering::is_lt),
        BinaryOperator::LtEq => ordered(Ordering::is_le),
        BinaryOperator::Gt => ordered(Ordering::is_gt),
        BinaryOperator::GtEq => ordered(Ordering::is_ge),
        BinaryOperator::In => contains(right, left, position).map(Value::Boolean),
        BinaryOperator::NotIn => contains(right, left, position).map(|found| Value::Boolean(!found)),
        BinaryOperator::Add => add(left, right, position),
        BinaryOperator::Sub | BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => {
            arithmetic(op, left, right, position)
        }
    }
}

fn mismatch(op: BinaryOperator, left: &Value, right: &Value, position: Position) -> JinjaError {
    JinjaError::type_mismatch(
        position,
        format!(
            "unsupported operand types for `{}`: {} and {}",
            op.symbol(),
            left.kind(),
            right.kind()
        ),
    )
}

fn compare(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
    position: Position,
) -> Result<Ordering, JinjaError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .partial_cmp(b)
            .ok_or_else(|| JinjaError::type_mismatch(position, "cannot order NaN")),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(mismatch(op, left, right, position)),
    }
}

fn contains(haystack: &Value, needle: &Value, position: Position) -> Result<bool, JinjaError> {
    match (haystack, needle) {
        (Value::String(s), Value::String(sub)) => Ok(s.contains(sub.as_str())),
        (Value::List(items), _) => Ok(items.contains(needle)),
        (Value::Mapping(map), Value::String(key)) => Ok(map.contains_key(key)),
        (Value::Mapping(_), _) => Ok(false),
        _ => Err(mismatch(BinaryOperator::In, needle, haystack, position)),
    }
}

fn add(left: &Value, right: &Value, position: Position) -> Result<Value, JinjaError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => Err(mismatch(BinaryOperator::Add, left, right, position)),
    }
}

fn arithmetic(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
    position: Position,
) -> Result<Value, JinjaError> {
    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        return Err(mismatch(op, left, right, position));
    };
    let (a, b) = (*a, *b);

    if matches!(op, BinaryOperator::Div | BinaryOperator::Mod) && b == 0.0 {
        return Err(JinjaError::Runtime {
            position,
            message: format!("division by zero in `{}`", op.symbol()),
        });
    }

    let result = match op {
        BinaryOperator::Sub => a - b,
        BinaryOperator::Mul => a * b,
        BinaryOperator::Div => a / b,
        // Result takes the sign of the divisor
        _ => {
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
    };
    Ok(Value::Number(result))
}

pub fn negate(value: &Value, position: Position) -> Result<Value, JinjaError> {
    match value {
        Value::Number(n) => Ok(Value::Number(-n)),
        other => Err(JinjaError::type_mismatch(
            position,
            format!("cannot negate {}", other.kind()),
        )),
    }
}

/// `target.name`: mapping keys first, then bound methods
pub fn attribute(target: &Value, name: &str) -> Value {
    if let Value::Mapping(map) = target {
        if let Some(value) = map.get(name) {
            return value.clone();
        }
    }
    bound_method(target, name)
        .map(Value::Function)
        .unwrap_or_default()
}

/// `target[index]`; negative list and string indexes count from the end
pub fn index(target: &Value, index: &Value, position: Position) -> Result<Value, JinjaError> {
    match (target, index) {
        (Value::Undefined, _) | (_, Value::Undefined) => Ok(Value::Undefined),
        (Value::List(items), Value::Number(n)) => {
            let slot = resolve_index(*n, items.len(), position)?;
            Ok(slot.and_then(|i| items.get(i)).cloned().unwrap_or_default())
        }
        (Value::String(s), Value::Number(n)) => {
            let slot = resolve_index(*n, s.chars().count(), position)?;
            Ok(slot
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default())
        }
        (Value::Mapping(map), Value::String(key)) => Ok(map.get(key).cloned().unwrap_or_default()),
        _ => Err(JinjaError::type_mismatch(
            position,
            format!("cannot index {} with {}", target.kind(), index.kind()),
        )),
    }
}

fn resolve_index(n: f64, len: usize, position: Position) -> Result<Option<usize>, JinjaError> {
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(JinjaError::type_mismatch(
            position,
            format!("index must be an integer, got {n}"),
        ));
    }

    let n = n as i64;
    let len = len as i64;
    let resolved = if n < 0 { len + n } else { n };
    Ok((0..len).contains(&resolved).then_some(resolved as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn pos() -> Position {
        Position::new(1, 1)
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn test_arithmetic_on_numbers() {
        assert_eq!(binary(BinaryOperator::Add, &num(2.0), &num(3.0), pos()).unwrap(), num(5.0));
        assert_eq!(binary(BinaryOperator::Sub, &num(2.0), &num(3.0), pos()).unwrap(), num(-1.0));
        assert_eq!(binary(BinaryOperator::Div, &num(7.0), &num(2.0), pos()).unwrap(), num(3.5));
        assert_eq!(binary(BinaryOperator::Mod, &num(-7.0), &num(3.0), pos()).unwrap(), num(2.0));
        assert_eq!(binary(BinaryOperator::Mod, &num(7.0), &num(-3.0), pos()).unwrap(), num(-2.0));
    }

    #[test]
    fn test_division_by_zero() {
        let err = binary(BinaryOperator::Div, &num(1.0), &num(0.0), pos()).unwrap_err();
        assert!(matches!(err, JinjaError::Runtime { .. }));
        assert!(binary(BinaryOperator::Mod, &num(1.0), &num(0.0), pos()).is_err());
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(
            binary(BinaryOperator::Add, &Value::from("a"), &Value::from("b"), pos()).unwrap(),
            Value::from("ab")
        );
        assert_eq!(
            binary(BinaryOperator::Add, &list(&["a"]), &list(&["b"]), pos()).unwrap(),
            list(&["a", "b"])
        );
    }

    #[test]
    fn test_mixed_operands_are_type_mismatch() {
        let err = binary(BinaryOperator::Add, &Value::from("a"), &num(1.0), pos()).unwrap_err();
        assert_eq!(
            err.message(),
            "unsupported operand types for `+`: string and number"
        );
        assert!(binary(BinaryOperator::Lt, &Value::from("a"), &num(1.0), pos()).is_err());
        assert!(binary(BinaryOperator::Mul, &Value::Undefined, &num(1.0), pos()).is_err());
    }

    #[test]
    fn test_comparisons() {
        let t = Value::Boolean(true);
        assert_eq!(binary(BinaryOperator::Lt, &num(1.0), &num(2.0), pos()).unwrap(), t);
        assert_eq!(binary(BinaryOperator::GtEq, &num(2.0), &num(2.0), pos()).unwrap(), t);
        assert_eq!(
            binary(BinaryOperator::Gt, &Value::from("b"), &Value::from("a"), pos()).unwrap(),
            t
        );
        assert_eq!(binary(BinaryOperator::Eq, &num(1.0), &Value::from("1"), pos()).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_membership() {
        let t = Value::Boolean(true);
        let f = Value::Boolean(false);
        assert_eq!(binary(BinaryOperator::In, &Value::from("ell"), &Value::from("hello"), pos()).unwrap(), t);
        assert_eq!(binary(BinaryOperator::In, &Value::from("b"), &list(&["a", "b"]), pos()).unwrap(), t);
        assert_eq!(binary(BinaryOperator::NotIn, &Value::from("c"), &list(&["a", "b"]), pos()).unwrap(), t);

        let mut map = BTreeMap::new();
        map.insert("k".to_string(), num(1.0));
        let map = Value::Mapping(map);
        assert_eq!(binary(BinaryOperator::In, &Value::from("k"), &map, pos()).unwrap(), t);
        assert_eq!(binary(BinaryOperator::In, &Value::from("v"), &map, pos()).unwrap(), f);

        assert!(binary(BinaryOperator::In, &num(1.0), &num(1.0), pos()).is_err());
    }

    #[test]
    fn test_indexing() {
        let items = list(&["a", "b", "c"]);
        assert_eq!(index(&items, &num(0.0), pos()).unwrap(), Value::from("a"));
        assert_eq!(index(&items, &num(-1.0), pos()).unwrap(), Value::from("c"));
        assert_eq!(index(&items, &num(3.0), pos()).unwrap(), Value::Undefined);
        assert_eq!(index(&items, &num(-4.0), pos()).unwrap(), Value::Undefined);
        assert!(index(&items, &num(0.5), pos()).is_err());
        assert!(index(&items, &Value::from("x"), pos()).is_err());

        assert_eq!(index(&Value::from("héllo"), &num(1.0), pos()).unwrap(), Value::from("é"));
        assert_eq!(index(&Value::Undefined, &num(1.0), pos()).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_attributes() {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), Value::from("orders"));
        let map = Value::Mapping(map);

        assert_eq!(attribute(&map, "name"), Value::from("orders"));
        assert_eq!(attribute(&map, "missing"), Value::Undefined);
        assert!(matches!(attribute(&map, "keys"), Value::Function(_)));
        assert!(matches!(attribute(&Value::from("x"), "upper"), Value::Function(_)));
        assert_eq!(attribute(&Value::Undefined, "anything"), Value::Undefined);
        assert_eq!(attribute(&num(1.0), "real"), Value::Undefined);
    }
}
