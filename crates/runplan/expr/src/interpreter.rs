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

//! Tree-walking evaluation of parsed expressions

use crate::ast::{AstNode, ComprehensionKind, UnaryOp};
use crate::builtins;
use crate::error::{EvalError, EvalResult};
use crate::parser::parse;
use crate::value::{Generator, Value};
use std::collections::HashMap;

/// Default bound on how many elements a generator may produce
pub const DEFAULT_MAX_ITERATOR_LENGTH: usize = 1_000_000;

/// Source of values for free names in an expression
pub trait Scope {
    /// Look a name up, returning `None` when it is not defined
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// Plain namespace of bound names backed by the helper library
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    bindings: HashMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }
}

impl Scope for Namespace {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).cloned().or_else(|| builtins::lookup(name))
    }
}

/// Evaluate `source` against `scope` with the default iterator bound
pub fn evaluate(source: &str, scope: &dyn Scope) -> EvalResult<Value> {
    Interpreter::new(scope).evaluate(source)
}

pub struct Interpreter<'s> {
    scope: &'s dyn Scope,
    // Comprehension variables, innermost last
    locals: Vec<(String, Value)>,
    max_iterator_length: usize,
}

impl<'s> Interpreter<'s> {
    pub fn new(scope: &'s dyn Scope) -> Self {
        Self {
            scope,
            locals: Vec::new(),
            max_iterator_length: DEFAULT_MAX_ITERATOR_LENGTH,
        }
    }

    pub fn with_max_iterator_length(mut self, limit: usize) -> Self {
        self.max_iterator_length = limit;
        self
    }

    pub fn evaluate(&mut self, source: &str) -> EvalResult<Value> {
        let ast = parse(source)?;
        self.eval(&ast)
    }

    pub fn eval(&mut self, node: &AstNode) -> EvalResult<Value> {
        match node {
            AstNode::None => Ok(Value::None),
            AstNode::Bool(b) => Ok(Value::Bool(*b)),
            AstNode::Int(i) => Ok(Value::Int(*i)),
            AstNode::Float(f) => Ok(Value::Float(*f)),
            AstNode::Str(s) => Ok(Value::Str(s.clone())),
            AstNode::Identifier(name) => self.resolve(name),
            AstNode::Array(items) => Ok(Value::Array(self.eval_all(items)?)),
            AstNode::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?)),
            AstNode::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Negate => value.negate(),
                    UnaryOp::Plus => value.positive(),
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy()?)),
                }
            }
            AstNode::BinaryOp { left, op, right } => {
                let lhs = self.eval(left)?;
                let rhs = self.eval(right)?;
                lhs.binary_bounded(*op, &rhs, self.max_iterator_length)
            }
            AstNode::Compare { first, rest } => {
                let mut lhs = self.eval(first)?;
                let mut result = Value::Bool(true);
                for (index, (op, operand)) in rest.iter().enumerate() {
                    let rhs = self.eval(operand)?;
                    result = lhs.compare(*op, &rhs)?;
                    if index + 1 < rest.len() && !result.is_truthy()? {
                        return Ok(result);
                    }
                    lhs = rhs;
                }
                Ok(result)
            }
            AstNode::And(left, right) => {
                let lhs = self.eval(left)?;
                if lhs.is_truthy()? { self.eval(right) } else { Ok(lhs) }
            }
            AstNode::Or(left, right) => {
                let lhs = self.eval(left)?;
                if lhs.is_truthy()? { Ok(lhs) } else { self.eval(right) }
            }
            AstNode::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition)?.is_truthy()? {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            AstNode::FunctionCall { callee, args, kwargs } => {
                let function = self.eval(callee)?;
                let args = self.eval_all(args)?;
                let mut evaluated = Vec::with_capacity(kwargs.len());
                for (name, value) in kwargs {
                    evaluated.push((name.clone(), self.eval(value)?));
                }
                match function {
                    Value::Function(builtin) => builtin.call(args, evaluated, self.max_iterator_length),
                    other => Err(EvalError::type_error(format!("'{}' object is not callable", other.type_name()))),
                }
            }
            AstNode::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                target.index(&index)
            }
            AstNode::Slice { target, start, stop } => {
                let target = self.eval(target)?;
                let start = start.as_deref().map(|n| self.eval(n)).transpose()?;
                let stop = stop.as_deref().map(|n| self.eval(n)).transpose()?;
                target.slice(start.as_ref(), stop.as_ref())
            }
            AstNode::Comprehension {
                kind,
                element,
                variable,
                iterable,
                condition,
            } => {
                let source = self.eval(iterable)?.iterate(self.max_iterator_length)?;
                let mut items = Vec::new();
                for item in source {
                    self.locals.push((variable.clone(), item));
                    let produced = self.comprehension_step(element, condition.as_deref());
                    self.locals.pop();
                    if let Some(value) = produced? {
                        items.push(value);
                    }
                }
                Ok(match kind {
                    ComprehensionKind::Array => Value::Array(items),
                    ComprehensionKind::Generator => Value::Generator(Generator::Items(items)),
                })
            }
        }
    }

    fn comprehension_step(&mut self, element: &AstNode, condition: Option<&AstNode>) -> EvalResult<Option<Value>> {
        if let Some(condition) = condition {
            if !self.eval(condition)?.is_truthy()? {
                return Ok(None);
            }
        }
        self.eval(element).map(Some)
    }

    fn eval_all(&mut self, nodes: &[AstNode]) -> EvalResult<Vec<Value>> {
        nodes.iter().map(|node| self.eval(node)).collect()
    }

    fn resolve(&self, name: &str) -> EvalResult<Value> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(local, _)| local == name) {
            return Ok(value.clone());
        }
        self.scope.lookup(name).ok_or_else(|| EvalError::name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> EvalResult<Value> {
        let mut ns = Namespace::new();
        ns.insert("a", Value::Array(vec![Value::Int(1), Value::Int(2)]));
        ns.insert("x", Value::Int(3));
        evaluate(source, &ns)
    }

    #[test]
    fn test_arithmetic_and_names() {
        assert_eq!(eval("x * 2 + 1").unwrap(), Value::Int(7));
        assert_eq!(eval("a * 10").unwrap(), Value::Array(vec![Value::Int(10), Value::Int(20)]));
        assert_eq!(eval("2 * MHz").unwrap(), Value::Float(2e6));
        assert!(matches!(eval("y + 1"), Err(EvalError::Name { .. })));
    }

    #[test]
    fn test_comprehension_shadows_namespace() {
        assert_eq!(eval("[x * 2 for x in a]").unwrap(), Value::Array(vec![Value::Int(2), Value::Int(4)]));
        assert_eq!(eval("x").unwrap(), Value::Int(3));
        assert_eq!(
            eval("(i for i in range(4) if i % 2)").unwrap(),
            Value::Generator(Generator::Items(vec![Value::Int(1), Value::Int(3)]))
        );
    }

    #[test]
    fn test_short_circuit() {
        assert_eq!(eval("0 and undefined_name").unwrap(), Value::Int(0));
        assert_eq!(eval("x or undefined_name").unwrap(), Value::Int(3));
        assert_eq!(eval("1 if x > 2 else undefined_name").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_chained_comparison() {
        assert_eq!(eval("1 < x <= 3").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 < x < 3").unwrap(), Value::Bool(false));
        assert_eq!(eval("5 < x < undefined_name").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_calls() {
        assert_eq!(eval("len(a)").unwrap(), Value::Int(2));
        assert!(matches!(eval("x(1)"), Err(EvalError::Type { .. })));
        assert!(matches!(eval("1 +"), Err(EvalError::Syntax(_))));
    }

    #[test]
    fn test_iterator_bound_applies_to_comprehensions() {
        let ns = Namespace::new();
        let result = Interpreter::new(&ns).with_max_iterator_length(3).evaluate("[i for i in count()]");
        assert_eq!(result, Err(EvalError::TooLong { limit: 3 }));
    }

    #[test]
    fn test_iterator_bound_applies_to_constructed_sequences() {
        let ns = Namespace::new();
        for source in ["(0,) * 3000000", "'ab' * 2**62", "(1, 2) * 2**62", "range(3000000)", "linspace(0, 1, 3000000)"] {
            let result = Interpreter::new(&ns).with_max_iterator_length(10).evaluate(source);
            assert_eq!(result, Err(EvalError::TooLong { limit: 10 }), "{source}");
        }
        let fits = Interpreter::new(&ns).with_max_iterator_length(10).evaluate("(0,) * 10").unwrap();
        assert_eq!(fits.len().unwrap(), 10);
    }
}
