// Runplan
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Runtime values produced by evaluating global expressions
//!
//! Arrays behave like numeric arrays: arithmetic applies element-wise and
//! scalars broadcast. Tuples behave like ordered records: `+` concatenates
//! and multiplying by an integer repeats.

use crate::builtins::Builtin;
use crate::error::{EvalError, EvalResult};
use crate::interpreter::DEFAULT_MAX_ITERATOR_LENGTH;
use crate::lexer::Operator;
use std::cmp::Ordering;
use std::fmt;

/// Evaluated value of an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    Generator(Generator),
    Function(Builtin),
}

/// Lazily produced sequence of values
#[derive(Debug, Clone, PartialEq)]
pub enum Generator {
    /// `True` once, then `False` forever
    First,
    /// `start, start + step, ...` without end
    Count { start: Box<Value>, step: Box<Value> },
    /// Finite sequence built by a generator expression
    Items(Vec<Value>),
}

impl Generator {
    /// Pull every element, failing once more than `limit` would be needed
    pub fn materialize(&self, limit: usize) -> EvalResult<Vec<Value>> {
        match self {
            Generator::First | Generator::Count { .. } => Err(EvalError::TooLong { limit }),
            Generator::Items(items) if items.len() > limit => Err(EvalError::TooLong { limit }),
            Generator::Items(items) => Ok(items.clone()),
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
            Value::Generator(_) => "generator",
            Value::Function(_) => "builtin_function",
        }
    }

    /// Whether iterating over the value is possible at all
    pub fn is_iterable(&self) -> bool {
        matches!(self, Value::Str(_) | Value::Array(_) | Value::Tuple(_) | Value::Generator(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Int(_) | Value::Float(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Truth value as used by `if`, `and`, `or` and `not`.
    ///
    /// Arrays with more than one element have no single truth value.
    pub fn is_truthy(&self) -> EvalResult<bool> {
        Ok(match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Array(items) => match items.as_slice() {
                [] => false,
                [single] => single.is_truthy()?,
                _ => {
                    return Err(EvalError::value_error(
                        "the truth value of an array with more than one element is ambiguous",
                    ));
                }
            },
            Value::Generator(_) | Value::Function(_) => true,
        })
    }

    /// Collect the elements of an iterable value, bounded by `limit`
    pub fn iterate(&self, limit: usize) -> EvalResult<Vec<Value>> {
        match self {
            Value::Array(items) | Value::Tuple(items) => Ok(items.clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Generator(generator) => generator.materialize(limit),
            other => Err(EvalError::type_error(format!("'{}' object is not iterable", other.type_name()))),
        }
    }

    pub fn len(&self) -> EvalResult<usize> {
        match self {
            Value::Array(items) | Value::Tuple(items) => Ok(items.len()),
            Value::Str(s) => Ok(s.chars().count()),
            other => Err(EvalError::type_error(format!("object of type '{}' has no len()", other.type_name()))),
        }
    }

    pub fn negate(&self) -> EvalResult<Value> {
        match self {
            Value::Int(i) => Ok(i.checked_neg().map(Value::Int).unwrap_or(Value::Float(-(*i as f64)))),
            Value::Bool(b) => Ok(Value::Int(-i64::from(*b))),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Array(items) => items.iter().map(Value::negate).collect::<EvalResult<_>>().map(Value::Array),
            other => Err(EvalError::type_error(format!("bad operand type for unary -: '{}'", other.type_name()))),
        }
    }

    pub fn positive(&self) -> EvalResult<Value> {
        match self {
            Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
            Value::Int(_) | Value::Float(_) => Ok(self.clone()),
            Value::Array(items) => items.iter().map(Value::positive).collect::<EvalResult<_>>().map(Value::Array),
            other => Err(EvalError::type_error(format!("bad operand type for unary +: '{}'", other.type_name()))),
        }
    }

    /// Apply an arithmetic operator under the default length bound
    pub fn binary(&self, op: Operator, rhs: &Value) -> EvalResult<Value> {
        self.binary_bounded(op, rhs, DEFAULT_MAX_ITERATOR_LENGTH)
    }

    /// Apply an arithmetic operator. Repetition and concatenation fail once
    /// the result would hold more than `limit` elements.
    pub fn binary_bounded(&self, op: Operator, rhs: &Value, limit: usize) -> EvalResult<Value> {
        match (self, rhs) {
            (Value::Array(_), _) | (_, Value::Array(_)) => broadcast(self, rhs, |a, b| a.binary_bounded(op, b, limit)),
            (Value::Str(a), Value::Str(b)) if op == Operator::Plus => Ok(Value::Str(format!("{a}{b}"))),
            (Value::Tuple(a), Value::Tuple(b)) if op == Operator::Plus => {
                if a.len() + b.len() > limit {
                    return Err(EvalError::TooLong { limit });
                }
                Ok(Value::Tuple(a.iter().chain(b).cloned().collect()))
            }
            (Value::Str(s), n) | (n, Value::Str(s)) if op == Operator::Star && n.as_i64().is_some() => {
                Ok(Value::Str(s.repeat(repeat_count(n, s.len(), limit)?)))
            }
            (Value::Tuple(items), n) | (n, Value::Tuple(items)) if op == Operator::Star && n.as_i64().is_some() => {
                let count = repeat_count(n, items.len(), limit)?;
                Ok(Value::Tuple(items.iter().cloned().cycle().take(items.len() * count).collect()))
            }
            _ if self.is_number() && rhs.is_number() => numeric(self, op, rhs),
            _ => Err(EvalError::type_error(format!(
                "unsupported operand type(s) for {op}: '{}' and '{}'",
                self.type_name(),
                rhs.type_name()
            ))),
        }
    }

    /// Apply a comparison operator. Arrays compare element-wise.
    pub fn compare(&self, op: Operator, rhs: &Value) -> EvalResult<Value> {
        if matches!(self, Value::Array(_)) || matches!(rhs, Value::Array(_)) {
            return broadcast(self, rhs, |a, b| a.compare(op, b));
        }
        let result = match op {
            Operator::Equal => self.loosely_equals(rhs),
            Operator::NotEqual => !self.loosely_equals(rhs),
            _ => {
                let ordering = self.partial_order(rhs)?;
                match (op, ordering) {
                    (_, None) => false,
                    (Operator::Less, Some(o)) => o == Ordering::Less,
                    (Operator::LessEqual, Some(o)) => o != Ordering::Greater,
                    (Operator::Greater, Some(o)) => o == Ordering::Greater,
                    (Operator::GreaterEqual, Some(o)) => o != Ordering::Less,
                    _ => return Err(EvalError::type_error(format!("'{op}' is not a comparison"))),
                }
            }
        };
        Ok(Value::Bool(result))
    }

    /// Equality where numbers compare by value across int/float/bool
    pub fn loosely_equals(&self, rhs: &Value) -> bool {
        match (self, rhs) {
            (a, b) if a.is_number() && b.is_number() => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
            (Value::Array(a), Value::Array(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            (a, b) => a == b,
        }
    }

    /// Ordering for `<`-style comparisons; `None` means unordered (NaN)
    pub fn partial_order(&self, rhs: &Value) -> EvalResult<Option<Ordering>> {
        match (self, rhs) {
            (a, b) if a.is_number() && b.is_number() => Ok(match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.as_f64().zip(b.as_f64()).and_then(|(x, y)| x.partial_cmp(&y)),
            }),
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::Tuple(a), Value::Tuple(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if !x.loosely_equals(y) {
                        return x.partial_order(y);
                    }
                }
                Ok(Some(a.len().cmp(&b.len())))
            }
            _ => Err(EvalError::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                self.type_name(),
                rhs.type_name()
            ))),
        }
    }

    /// `target[index]` with Python-style negative indices
    pub fn index(&self, index: &Value) -> EvalResult<Value> {
        let Some(raw) = index.as_i64() else {
            return Err(EvalError::type_error(format!("indices must be integers, not '{}'", index.type_name())));
        };
        let items = match self {
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            Value::Array(items) | Value::Tuple(items) => items.clone(),
            other => return Err(EvalError::type_error(format!("'{}' object is not subscriptable", other.type_name()))),
        };
        let len = items.len() as i64;
        let position = if raw < 0 { raw + len } else { raw };
        if position < 0 || position >= len {
            return Err(EvalError::index_error(format!("index {raw} is out of range for length {len}")));
        }
        Ok(items[position as usize].clone())
    }

    /// `target[start:stop]`, clamped to the sequence bounds
    pub fn slice(&self, start: Option<&Value>, stop: Option<&Value>) -> EvalResult<Value> {
        let len = self.len()? as i64;
        let bound = |value: Option<&Value>, default: i64| -> EvalResult<usize> {
            let raw = match value {
                None | Some(Value::None) => default,
                Some(v) => v.as_i64().ok_or_else(|| EvalError::type_error("slice indices must be integers or None"))?,
            };
            let resolved = if raw < 0 { raw + len } else { raw };
            Ok(resolved.clamp(0, len) as usize)
        };
        let from = bound(start, 0)?;
        let to = bound(stop, len)?.max(from);
        Ok(match self {
            Value::Str(s) => Value::Str(s.chars().skip(from).take(to - from).collect()),
            Value::Array(items) => Value::Array(items[from..to].to_vec()),
            Value::Tuple(items) => Value::Tuple(items[from..to].to_vec()),
            _ => unreachable!("len() accepted a non-sequence"),
        })
    }
}

/// How often to repeat a sequence of `len` elements, provided the result stays within `limit`
fn repeat_count(n: &Value, len: usize, limit: usize) -> EvalResult<usize> {
    let count = usize::try_from(n.as_i64().unwrap_or(0).max(0)).unwrap_or(usize::MAX);
    if len == 0 {
        return Ok(0);
    }
    match len.checked_mul(count) {
        Some(total) if total <= limit => Ok(count),
        _ => Err(EvalError::TooLong { limit }),
    }
}

/// Element-wise application with scalar broadcasting
fn broadcast(lhs: &Value, rhs: &Value, op: impl Fn(&Value, &Value) -> EvalResult<Value>) -> EvalResult<Value> {
    let as_elements = |value: &Value| match value {
        Value::Array(items) | Value::Tuple(items) => Some(items.clone()),
        _ => None,
    };
    match (as_elements(lhs), as_elements(rhs)) {
        (Some(a), Some(b)) => {
            if a.len() != b.len() {
                return Err(EvalError::value_error(format!(
                    "operands could not be broadcast together with shapes ({},) ({},)",
                    a.len(),
                    b.len()
                )));
            }
            a.iter().zip(&b).map(|(x, y)| op(x, y)).collect::<EvalResult<_>>().map(Value::Array)
        }
        (Some(a), None) => a.iter().map(|x| op(x, rhs)).collect::<EvalResult<_>>().map(Value::Array),
        (None, Some(b)) => b.iter().map(|y| op(lhs, y)).collect::<EvalResult<_>>().map(Value::Array),
        (None, None) => op(lhs, rhs),
    }
}

fn numeric(lhs: &Value, op: Operator, rhs: &Value) -> EvalResult<Value> {
    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        return integer(a, op, b);
    }
    let (a, b) = match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(EvalError::type_error("numeric operands expected")),
    };
    let value = match op {
        Operator::Plus => a + b,
        Operator::Minus => a - b,
        Operator::Star => a * b,
        Operator::Slash => {
            if b == 0.0 {
                return Err(EvalError::zero_division("float division by zero"));
            }
            a / b
        }
        Operator::DoubleSlash => {
            if b == 0.0 {
                return Err(EvalError::zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        Operator::Percent => {
            if b == 0.0 {
                return Err(EvalError::zero_division("float modulo"));
            }
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }
        }
        Operator::Power => a.powf(b),
        other => return Err(EvalError::type_error(format!("'{other}' is not an arithmetic operator"))),
    };
    Ok(Value::Float(value))
}

// Integer arithmetic falls back to floats on overflow
fn integer(a: i64, op: Operator, b: i64) -> EvalResult<Value> {
    let (x, y) = (a as f64, b as f64);
    let value = match op {
        Operator::Plus => a.checked_add(b).map(Value::Int).unwrap_or(Value::Float(x + y)),
        Operator::Minus => a.checked_sub(b).map(Value::Int).unwrap_or(Value::Float(x - y)),
        Operator::Star => a.checked_mul(b).map(Value::Int).unwrap_or(Value::Float(x * y)),
        Operator::Slash => {
            if b == 0 {
                return Err(EvalError::zero_division("division by zero"));
            }
            Value::Float(x / y)
        }
        Operator::DoubleSlash => {
            if b == 0 {
                return Err(EvalError::zero_division("integer division or modulo by zero"));
            }
            match a.checked_div_euclid(b) {
                Some(q) => Value::Int(q - i64::from(b < 0 && a.rem_euclid(b) != 0)),
                None => Value::Float((x / y).floor()),
            }
        }
        Operator::Percent => {
            if b == 0 {
                return Err(EvalError::zero_division("integer division or modulo by zero"));
            }
            let r = a.checked_rem(b).unwrap_or(0);
            Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        Operator::Power => {
            if b < 0 {
                if a == 0 {
                    return Err(EvalError::zero_division("0 cannot be raised to a negative power"));
                }
                Value::Float(x.powf(y))
            } else {
                u32::try_from(b)
                    .ok()
                    .and_then(|exp| a.checked_pow(exp))
                    .map(Value::Int)
                    .unwrap_or(Value::Float(x.powf(y)))
            }
        }
        other => return Err(EvalError::type_error(format!("'{other}' is not an arithmetic operator"))),
    };
    Ok(value)
}

fn fmt_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        write!(f, "nan")
    } else if value.is_infinite() {
        write!(f, "{}", if value > 0.0 { "inf" } else { "-inf" })
    } else {
        write!(f, "{value:?}")
    }
}

fn fmt_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => fmt_float(f, *v),
            Value::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Value::Array(items) => {
                write!(f, "array([")?;
                fmt_items(f, items)?;
                write!(f, "])")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                fmt_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Generator(_) => write!(f, "<generator object>"),
            Value::Function(builtin) => write!(f, "<built-in function {}>", builtin.name()),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Value {
        Value::Array(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn test_array_broadcasting() {
        assert_eq!(ints(&[1, 2]).binary(Operator::Star, &Value::Int(10)).unwrap(), ints(&[10, 20]));
        assert_eq!(ints(&[1, 2]).binary(Operator::Plus, &ints(&[3, 4])).unwrap(), ints(&[4, 6]));
        assert!(ints(&[1, 2]).binary(Operator::Plus, &ints(&[1, 2, 3])).is_err());
    }

    #[test]
    fn test_tuple_semantics() {
        let t = Value::Tuple(vec![Value::Int(1)]);
        assert_eq!(t.binary(Operator::Star, &Value::Int(3)).unwrap(), Value::Tuple(vec![Value::Int(1); 3]));
        assert_eq!(
            t.binary(Operator::Plus, &Value::Tuple(vec![Value::Int(2)])).unwrap(),
            Value::Tuple(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_repetition_is_bounded() {
        let huge = Value::Int(1 << 62);
        let pair = Value::Tuple(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(pair.binary(Operator::Star, &huge), Err(EvalError::TooLong { limit: DEFAULT_MAX_ITERATOR_LENGTH }));
        assert_eq!(Value::from("ab").binary(Operator::Star, &huge), Err(EvalError::TooLong { limit: DEFAULT_MAX_ITERATOR_LENGTH }));
        assert!(matches!(
            Value::Array(vec![Value::from("ab")]).binary(Operator::Star, &huge),
            Err(EvalError::TooLong { .. })
        ));

        let zero = Value::Tuple(vec![Value::Int(0)]);
        assert!(matches!(zero.binary_bounded(Operator::Star, &Value::Int(11), 10), Err(EvalError::TooLong { limit: 10 })));
        assert_eq!(zero.binary_bounded(Operator::Star, &Value::Int(10), 10).unwrap().len().unwrap(), 10);
        assert!(matches!(pair.binary_bounded(Operator::Plus, &pair, 3), Err(EvalError::TooLong { limit: 3 })));
        assert_eq!(Value::Tuple(Vec::new()).binary(Operator::Star, &huge).unwrap(), Value::Tuple(Vec::new()));
        assert_eq!(Value::from("ab").binary(Operator::Star, &Value::Int(-1)).unwrap(), Value::from(""));
    }

    #[test]
    fn test_python_division_rules() {
        assert_eq!(Value::Int(7).binary(Operator::DoubleSlash, &Value::Int(-2)).unwrap(), Value::Int(-4));
        assert_eq!(Value::Int(-7).binary(Operator::Percent, &Value::Int(3)).unwrap(), Value::Int(2));
        assert_eq!(Value::Int(1).binary(Operator::Slash, &Value::Int(2)).unwrap(), Value::Float(0.5));
        assert!(matches!(Value::Int(1).binary(Operator::Slash, &Value::Int(0)), Err(EvalError::ZeroDivision { .. })));
        assert_eq!(Value::Int(2).binary(Operator::Power, &Value::Int(-1)).unwrap(), Value::Float(0.5));
    }

    #[test]
    fn test_overflow_promotes_to_float() {
        assert!(matches!(Value::Int(i64::MAX).binary(Operator::Plus, &Value::Int(1)).unwrap(), Value::Float(_)));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy().unwrap());
        assert!(Value::Tuple(vec![Value::Int(0)]).is_truthy().unwrap());
        assert!(!ints(&[0]).is_truthy().unwrap());
        assert!(ints(&[1, 2]).is_truthy().is_err());
    }

    #[test]
    fn test_index_and_slice() {
        let a = ints(&[1, 2, 3]);
        assert_eq!(a.index(&Value::Int(-1)).unwrap(), Value::Int(3));
        assert!(a.index(&Value::Int(3)).is_err());
        assert_eq!(a.slice(Some(&Value::Int(1)), None).unwrap(), ints(&[2, 3]));
        assert_eq!(a.slice(None, Some(&Value::Int(-5))).unwrap(), ints(&[]));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(f64::NAN).to_string(), "nan");
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).to_string(), "(1,)");
        assert_eq!(ints(&[1, 2]).to_string(), "array([1, 2])");
        assert_eq!(Value::from("a").to_string(), "'a'");
    }

    #[test]
    fn test_generators_are_bounded() {
        assert!(matches!(Generator::First.materialize(10), Err(EvalError::TooLong { limit: 10 })));
        assert_eq!(Generator::Items(vec![Value::Int(1)]).materialize(1).unwrap(), vec![Value::Int(1)]);
        assert!(Generator::Items(vec![Value::Int(1); 3]).materialize(2).is_err());
    }
}
