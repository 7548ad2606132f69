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

//! Helper library preloaded into every globals namespace

use crate::error::{EvalError, EvalResult};
use crate::lexer::Operator;
use crate::value::{Generator, Value};
use rand::seq::SliceRandom;
use std::cmp::Ordering;

/// Callable helpers available to expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Abs,
    Sqrt,
    Exp,
    Log,
    Log10,
    Sin,
    Cos,
    Tan,
    Arcsin,
    Arccos,
    Arctan,
    Floor,
    Ceil,
    Round,
    Array,
    List,
    Tuple,
    Len,
    Sum,
    Min,
    Max,
    Range,
    Arange,
    Linspace,
    Logspace,
    Repeat,
    Concatenate,
    Shuffle,
    Quadspace,
    First,
    Count,
    Iterable,
}

const FUNCTIONS: &[(&str, Builtin)] = &[
    ("abs", Builtin::Abs),
    ("sqrt", Builtin::Sqrt),
    ("exp", Builtin::Exp),
    ("log", Builtin::Log),
    ("log10", Builtin::Log10),
    ("sin", Builtin::Sin),
    ("cos", Builtin::Cos),
    ("tan", Builtin::Tan),
    ("arcsin", Builtin::Arcsin),
    ("arccos", Builtin::Arccos),
    ("arctan", Builtin::Arctan),
    ("floor", Builtin::Floor),
    ("ceil", Builtin::Ceil),
    ("round", Builtin::Round),
    ("array", Builtin::Array),
    ("list", Builtin::List),
    ("tuple", Builtin::Tuple),
    ("len", Builtin::Len),
    ("sum", Builtin::Sum),
    ("min", Builtin::Min),
    ("max", Builtin::Max),
    ("range", Builtin::Range),
    ("arange", Builtin::Arange),
    ("linspace", Builtin::Linspace),
    ("logspace", Builtin::Logspace),
    ("repeat", Builtin::Repeat),
    ("concatenate", Builtin::Concatenate),
    ("shuffle", Builtin::Shuffle),
    ("quadspace", Builtin::Quadspace),
    // Older name kept for existing globals files
    ("drop_times", Builtin::Quadspace),
    ("first", Builtin::First),
    ("count", Builtin::Count),
    ("iterable", Builtin::Iterable),
];

const CONSTANTS: &[(&str, f64)] = &[
    ("pi", std::f64::consts::PI),
    ("e", std::f64::consts::E),
    ("inf", f64::INFINITY),
    ("nan", f64::NAN),
    ("ns", 1e-9),
    ("us", 1e-6),
    ("ms", 1e-3),
    ("s", 1.0),
    ("Hz", 1.0),
    ("kHz", 1e3),
    ("MHz", 1e6),
    ("GHz", 1e9),
];

/// Resolve a name against the helper library
pub fn lookup(name: &str) -> Option<Value> {
    if let Some((_, builtin)) = FUNCTIONS.iter().find(|(n, _)| *n == name) {
        return Some(Value::Function(*builtin));
    }
    CONSTANTS.iter().find(|(n, _)| *n == name).map(|(_, v)| Value::Float(*v))
}

/// Every name the helper library defines
pub fn names() -> impl Iterator<Item = &'static str> {
    FUNCTIONS.iter().map(|(n, _)| *n).chain(CONSTANTS.iter().map(|(n, _)| *n))
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        FUNCTIONS.iter().find(|(_, b)| b == self).map(|(n, _)| *n).unwrap_or("<builtin>")
    }

    /// Invoke the helper. `limit` bounds how many elements a generator may yield.
    pub fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>, limit: usize) -> EvalResult<Value> {
        let call = Call {
            name: self.name(),
            args,
            kwargs,
            limit,
        };
        match self {
            Builtin::Abs => call.elementwise(|v| match v {
                Value::Int(i) => Ok(i.checked_abs().map(Value::Int).unwrap_or(Value::Float((*i as f64).abs()))),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                other => Ok(Value::Float(float(other, "abs")?.abs())),
            }),
            Builtin::Sqrt => call.float_fn(f64::sqrt),
            Builtin::Exp => call.float_fn(f64::exp),
            Builtin::Log => call.float_fn(f64::ln),
            Builtin::Log10 => call.float_fn(f64::log10),
            Builtin::Sin => call.float_fn(f64::sin),
            Builtin::Cos => call.float_fn(f64::cos),
            Builtin::Tan => call.float_fn(f64::tan),
            Builtin::Arcsin => call.float_fn(f64::asin),
            Builtin::Arccos => call.float_fn(f64::acos),
            Builtin::Arctan => call.float_fn(f64::atan),
            Builtin::Floor => call.float_fn(f64::floor),
            Builtin::Ceil => call.float_fn(f64::ceil),
            Builtin::Round => round(call),
            Builtin::Array | Builtin::List => {
                let [value] = call.bind(&["object"], 1)?;
                let value = required(value)?;
                if value.is_iterable() {
                    Ok(Value::Array(value.iterate(limit)?))
                } else {
                    Ok(value)
                }
            }
            Builtin::Tuple => {
                let [value] = call.bind(&["iterable"], 0)?;
                match value {
                    Some(v) => Ok(Value::Tuple(v.iterate(limit)?)),
                    None => Ok(Value::Tuple(Vec::new())),
                }
            }
            Builtin::Len => {
                let [value] = call.bind(&["obj"], 1)?;
                Ok(Value::Int(required(value)?.len()? as i64))
            }
            Builtin::Sum => {
                let [items, start] = call.bind(&["iterable", "start"], 1)?;
                let mut total = start.unwrap_or(Value::Int(0));
                for item in required(items)?.iterate(limit)? {
                    total = total.binary_bounded(Operator::Plus, &item, limit)?;
                }
                Ok(total)
            }
            Builtin::Min => extremum(call, Ordering::Less),
            Builtin::Max => extremum(call, Ordering::Greater),
            Builtin::Range => range(call),
            Builtin::Arange => arange(call),
            Builtin::Linspace => {
                let [start, stop, num, endpoint] = call.bind(&["start", "stop", "num", "endpoint"], 2)?;
                let num = bounded(count_arg(num, 50, "num")?, limit)?;
                let endpoint = endpoint.map(|v| v.is_truthy()).transpose()?.unwrap_or(true);
                Ok(floats(linspace(float(&required(start)?, "start")?, float(&required(stop)?, "stop")?, num, endpoint)))
            }
            Builtin::Logspace => {
                let [start, stop, num, base] = call.bind(&["start", "stop", "num", "base"], 2)?;
                let num = bounded(count_arg(num, 50, "num")?, limit)?;
                let base = base.map(|b| float(&b, "base")).transpose()?.unwrap_or(10.0);
                let exponents = linspace(float(&required(start)?, "start")?, float(&required(stop)?, "stop")?, num, true);
                Ok(floats(exponents.into_iter().map(|x| base.powf(x)).collect()))
            }
            Builtin::Repeat => {
                let [values, repeats] = call.bind(&["a", "repeats"], 2)?;
                let repeats = count_arg(repeats, 1, "repeats")?;
                Ok(Value::Array(repeat(as_elements(required(values)?, limit)?, repeats, limit)?))
            }
            Builtin::Concatenate => {
                let [arrays] = call.bind(&["arrays"], 1)?;
                let mut joined = Vec::new();
                for part in required(arrays)?.iterate(limit)? {
                    joined.extend(part.iterate(limit)?);
                    bounded(joined.len(), limit)?;
                }
                Ok(Value::Array(joined))
            }
            Builtin::Shuffle => {
                let [values] = call.bind(&["x"], 1)?;
                let mut items = required(values)?.iterate(limit)?;
                items.shuffle(&mut rand::thread_rng());
                Ok(Value::Array(items))
            }
            Builtin::Quadspace => quadspace(call),
            Builtin::First => {
                call.bind::<0>(&[], 0)?;
                Ok(Value::Generator(Generator::First))
            }
            Builtin::Count => {
                let [start, step] = call.bind(&["start", "step"], 0)?;
                let start = start.unwrap_or(Value::Int(0));
                let step = step.unwrap_or(Value::Int(1));
                if !start.is_number() || !step.is_number() {
                    return Err(EvalError::type_error("count() arguments must be numbers"));
                }
                Ok(Value::Generator(Generator::Count {
                    start: Box::new(start),
                    step: Box::new(step),
                }))
            }
            Builtin::Iterable => {
                let [value] = call.bind(&["obj"], 1)?;
                Ok(Value::Bool(required(value)?.is_iterable()))
            }
        }
    }
}

/// Arguments of a single helper invocation
struct Call {
    name: &'static str,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    limit: usize,
}

impl Call {
    /// Match positional and keyword arguments to parameter names
    fn bind<const N: usize>(self, params: &[&str; N], required: usize) -> EvalResult<[Option<Value>; N]> {
        if self.args.len() > N {
            return Err(EvalError::type_error(format!(
                "{}() takes at most {N} arguments ({} given)",
                self.name,
                self.args.len()
            )));
        }
        let mut bound: [Option<Value>; N] = std::array::from_fn(|_| None);
        for (slot, value) in bound.iter_mut().zip(self.args) {
            *slot = Some(value);
        }
        for (key, value) in self.kwargs {
            let Some(index) = params.iter().position(|p| *p == key) else {
                return Err(EvalError::type_error(format!("{}() got an unexpected keyword argument '{key}'", self.name)));
            };
            if bound[index].is_some() {
                return Err(EvalError::type_error(format!("{}() got multiple values for argument '{key}'", self.name)));
            }
            bound[index] = Some(value);
        }
        if let Some(missing) = bound.iter().take(required).position(Option::is_none) {
            return Err(EvalError::type_error(format!(
                "{}() missing required argument '{}'",
                self.name, params[missing]
            )));
        }
        Ok(bound)
    }

    fn elementwise(self, f: impl Fn(&Value) -> EvalResult<Value>) -> EvalResult<Value> {
        let name = self.name;
        let [value] = self.bind(&["x"], 1)?;
        match required(value)? {
            Value::Array(items) | Value::Tuple(items) => items.iter().map(&f).collect::<EvalResult<_>>().map(Value::Array),
            scalar if scalar.is_number() => f(&scalar),
            other => Err(EvalError::type_error(format!("{name}() does not support '{}'", other.type_name()))),
        }
    }

    fn float_fn(self, f: fn(f64) -> f64) -> EvalResult<Value> {
        let name = self.name;
        self.elementwise(|v| Ok(Value::Float(f(float(v, name)?))))
    }
}

fn required(value: Option<Value>) -> EvalResult<Value> {
    // bind() has already rejected missing required arguments
    value.ok_or_else(|| EvalError::type_error("missing required argument"))
}

fn float(value: &Value, what: &str) -> EvalResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| EvalError::type_error(format!("{what}: expected a number, got '{}'", value.type_name())))
}

fn count_arg(value: Option<Value>, default: usize, what: &str) -> EvalResult<usize> {
    match value {
        None => Ok(default),
        Some(v) => match v.as_i64() {
            Some(n) if n >= 0 => Ok(n as usize),
            Some(n) => Err(EvalError::value_error(format!("{what} must be non-negative, got {n}"))),
            None => Err(EvalError::type_error(format!("{what} must be an integer"))),
        },
    }
}

fn floats(values: Vec<f64>) -> Value {
    Value::Array(values.into_iter().map(Value::Float).collect())
}

fn as_elements(value: Value, limit: usize) -> EvalResult<Vec<Value>> {
    if value.is_iterable() { value.iterate(limit) } else { Ok(vec![value]) }
}

/// Check that a result of `length` elements fits under `limit`
fn bounded(length: usize, limit: usize) -> EvalResult<usize> {
    if length > limit { Err(EvalError::TooLong { limit }) } else { Ok(length) }
}

fn repeat(values: Vec<Value>, repeats: usize, limit: usize) -> EvalResult<Vec<Value>> {
    let total = values.len().checked_mul(repeats).ok_or(EvalError::TooLong { limit })?;
    bounded(total, limit)?;
    Ok(values.into_iter().flat_map(|v| std::iter::repeat_n(v, repeats)).collect())
}

fn linspace(start: f64, stop: f64, num: usize, endpoint: bool) -> Vec<f64> {
    let divisions = if endpoint { num.saturating_sub(1) } else { num };
    if divisions == 0 {
        return if num == 0 { Vec::new() } else { vec![start] };
    }
    let step = (stop - start) / divisions as f64;
    (0..num)
        .map(|i| if endpoint && i == num - 1 { stop } else { start + step * i as f64 })
        .collect()
}

fn round(call: Call) -> EvalResult<Value> {
    let [value, ndigits] = call.bind(&["x", "ndigits"], 1)?;
    let digits = ndigits.map(|d| d.as_i64().ok_or_else(|| EvalError::type_error("ndigits must be an integer"))).transpose()?;
    let round_one = |v: &Value| -> EvalResult<Value> {
        match (v, digits) {
            (Value::Int(_), None) => Ok(v.clone()),
            (_, None) => Ok(Value::Float(float(v, "round")?.round_ties_even())),
            (_, Some(d)) => {
                let scale = 10f64.powi(d as i32);
                Ok(Value::Float((float(v, "round")? * scale).round_ties_even() / scale))
            }
        }
    };
    match required(value)? {
        Value::Array(items) | Value::Tuple(items) => items.iter().map(round_one).collect::<EvalResult<_>>().map(Value::Array),
        scalar => round_one(&scalar),
    }
}

fn extremum(call: Call, wanted: Ordering) -> EvalResult<Value> {
    let name = call.name;
    let limit = call.limit;
    if !call.kwargs.is_empty() {
        return Err(EvalError::type_error(format!("{name}() takes no keyword arguments")));
    }
    let candidates = match call.args.len() {
        0 => return Err(EvalError::type_error(format!("{name} expected at least 1 argument, got 0"))),
        1 => call.args[0].iterate(limit)?,
        _ => call.args,
    };
    let mut best: Option<Value> = None;
    for candidate in candidates {
        best = Some(match best {
            None => candidate,
            Some(current) => {
                if candidate.partial_order(&current)? == Some(wanted) {
                    candidate
                } else {
                    current
                }
            }
        });
    }
    best.ok_or_else(|| EvalError::value_error(format!("{name}() arg is an empty sequence")))
}

fn range(call: Call) -> EvalResult<Value> {
    let limit = call.limit;
    let [a, b, step] = call.bind(&["start", "stop", "step"], 1)?;
    let int = |v: Value| v.as_i64().ok_or_else(|| EvalError::type_error("range() arguments must be integers"));
    let (start, stop) = match b {
        Some(stop) => (int(required(a)?)?, int(stop)?),
        None => (0, int(required(a)?)?),
    };
    let step = step.map(int).transpose()?.unwrap_or(1);
    if step == 0 {
        return Err(EvalError::value_error("range() arg 3 must not be zero"));
    }
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let span = if step > 0 { stop - start } else { start - stop };
    let length = if span > 0 { (span + step.abs() - 1) / step.abs() } else { 0 };
    if length > limit as i128 {
        return Err(EvalError::TooLong { limit });
    }
    // Every element lies between start and stop, so it fits in an i64
    let items = (0..length).map(|i| Value::Int((start + i * step) as i64)).collect();
    Ok(Value::Tuple(items))
}

fn arange(call: Call) -> EvalResult<Value> {
    let limit = call.limit;
    let [a, b, step] = call.bind(&["start", "stop", "step"], 1)?;
    let (start, stop) = match b {
        Some(stop) => (required(a)?, stop),
        None => (Value::Int(0), required(a)?),
    };
    let step = step.unwrap_or(Value::Int(1));
    let all_ints = [&start, &stop, &step].iter().all(|v| matches!(v, Value::Int(_) | Value::Bool(_)));
    let (first, last, delta) = (float(&start, "start")?, float(&stop, "stop")?, float(&step, "step")?);
    if delta == 0.0 {
        return Err(EvalError::zero_division("arange() step must not be zero"));
    }
    let length = ((last - first) / delta).ceil().max(0.0);
    if !length.is_finite() || length > limit as f64 {
        return Err(EvalError::TooLong { limit });
    }
    let items = (0..length as usize)
        .map(|i| {
            if all_ints {
                Value::Int(start.as_i64().unwrap_or(0) + step.as_i64().unwrap_or(1) * i as i64)
            } else {
                Value::Float(first + delta * i as f64)
            }
        })
        .collect();
    Ok(Value::Array(items))
}

fn quadspace(call: Call) -> EvalResult<Value> {
    let limit = call.limit;
    let [t_min, t_max, n_points, randomise, repeats] = call.bind(&["t_min", "t_max", "n_points", "randomise", "repeats"], 3)?;
    let t_min = float(&required(t_min)?, "t_min")?;
    let t_max = float(&required(t_max)?, "t_max")?;
    let n_points = bounded(count_arg(n_points, 0, "n_points")?, limit)?;
    let repeats = count_arg(repeats, 1, "repeats")?;
    let randomise = randomise.map(|v| v.is_truthy()).transpose()?.unwrap_or(false);

    let times = linspace(t_min * t_min, t_max * t_max, n_points, true)
        .into_iter()
        .map(|t| Value::Float(t.sqrt()))
        .collect();
    let mut times = repeat(times, repeats, limit)?;
    if randomise {
        times.shuffle(&mut rand::thread_rng());
    }
    Ok(Value::Array(times))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> EvalResult<Value> {
        call_limited(name, args, 1_000_000)
    }

    fn call_limited(name: &str, args: Vec<Value>, limit: usize) -> EvalResult<Value> {
        match lookup(name) {
            Some(Value::Function(builtin)) => builtin.call(args, Vec::new(), limit),
            other => panic!("{name} resolved to {other:?}"),
        }
    }

    fn as_floats(value: Value) -> Vec<f64> {
        match value {
            Value::Array(items) => items.iter().map(|v| v.as_f64().unwrap()).collect(),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_constants() {
        assert_eq!(lookup("MHz"), Some(Value::Float(1e6)));
        assert_eq!(lookup("pi"), Some(Value::Float(std::f64::consts::PI)));
        assert_eq!(lookup("not_a_helper"), None);
        assert!(names().any(|n| n == "drop_times"));
    }

    #[test]
    fn test_linspace() {
        let values = as_floats(call("linspace", vec![Value::Int(0), Value::Int(1), Value::Int(5)]).unwrap());
        assert_eq!(values, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(as_floats(call("linspace", vec![Value::Int(3), Value::Int(4), Value::Int(1)]).unwrap()), vec![3.0]);
    }

    #[test]
    fn test_quadspace_matches_definition() {
        let values = as_floats(
            Builtin::Quadspace
                .call(
                    vec![Value::Int(0), Value::Int(2), Value::Int(3)],
                    vec![("repeats".to_string(), Value::Int(2))],
                    100,
                )
                .unwrap(),
        );
        let middle = 2.0_f64.sqrt();
        assert_eq!(values.len(), 6);
        assert_eq!(values[0], 0.0);
        assert!((values[2] - middle).abs() < 1e-12);
        assert_eq!(values[4], 2.0);
        assert_eq!(lookup("drop_times"), Some(Value::Function(Builtin::Quadspace)));
    }

    #[test]
    fn test_quadspace_randomise_keeps_elements() {
        let mut values = as_floats(
            Builtin::Quadspace
                .call(
                    vec![Value::Int(1), Value::Int(3), Value::Int(4)],
                    vec![("randomise".to_string(), Value::Bool(true))],
                    100,
                )
                .unwrap(),
        );
        values.sort_by(f64::total_cmp);
        assert_eq!(values.first(), Some(&1.0));
        assert_eq!(values.last(), Some(&3.0));
    }

    #[test]
    fn test_range_and_arange() {
        assert_eq!(call("range", vec![Value::Int(3)]).unwrap(), Value::Tuple(vec![Value::Int(0), Value::Int(1), Value::Int(2)]));
        assert_eq!(call("arange", vec![Value::Int(1), Value::Int(7), Value::Int(3)]).unwrap(), Value::Array(vec![Value::Int(1), Value::Int(4)]));
        assert_eq!(as_floats(call("arange", vec![Value::Float(0.0), Value::Float(1.0), Value::Float(0.5)]).unwrap()), vec![0.0, 0.5]);
        assert!(call("range", vec![Value::Int(1), Value::Int(2), Value::Int(0)]).is_err());
        assert_eq!(
            call("range", vec![Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap(),
            Value::Tuple(vec![Value::Int(5), Value::Int(3), Value::Int(1)])
        );
        assert_eq!(call("range", vec![Value::Int(i64::MAX - 1), Value::Int(i64::MAX)]).unwrap(), Value::Tuple(vec![Value::Int(i64::MAX - 1)]));
    }

    #[test]
    fn test_constructors_respect_length_bound() {
        let too_long = Err(EvalError::TooLong { limit: 10 });
        let n = Value::Int(3_000_000);
        let unit = || vec![Value::Int(0), Value::Int(1)];

        assert_eq!(call_limited("range", vec![n.clone()], 10), too_long);
        assert_eq!(call_limited("range", vec![Value::Int(i64::MIN), Value::Int(i64::MAX)], 10), too_long);
        assert_eq!(call_limited("range", vec![Value::Int(10)], 10).unwrap().len().unwrap(), 10);
        assert_eq!(call_limited("arange", vec![n.clone()], 10), too_long);
        assert_eq!(call_limited("linspace", [unit(), vec![n.clone()]].concat(), 10), too_long);
        assert_eq!(call_limited("logspace", [unit(), vec![n.clone()]].concat(), 10), too_long);
        assert_eq!(call_limited("quadspace", [unit(), vec![n.clone()]].concat(), 10), too_long);
        assert_eq!(call_limited("quadspace", [unit(), vec![Value::Int(4), Value::Bool(false), Value::Int(3)]].concat(), 10), too_long);
        assert_eq!(call_limited("repeat", vec![Value::Array(unit()), Value::Int(1 << 62)], 10), too_long);
        assert_eq!(call_limited("repeat", vec![Value::Array(unit()), Value::Int(5)], 10).unwrap().len().unwrap(), 10);

        let halves = Value::Tuple(vec![Value::Array(vec![Value::Int(0); 6]); 2]);
        assert_eq!(call_limited("concatenate", vec![halves], 10), too_long);
    }

    #[test]
    fn test_reductions() {
        let a = Value::Array(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        assert_eq!(call("sum", vec![a.clone()]).unwrap(), Value::Int(6));
        assert_eq!(call("min", vec![a.clone()]).unwrap(), Value::Int(1));
        assert_eq!(call("max", vec![Value::Int(4), Value::Float(4.5)]).unwrap(), Value::Float(4.5));
        assert_eq!(call("len", vec![a]).unwrap(), Value::Int(3));
        assert!(call("max", vec![Value::Array(Vec::new())]).is_err());
    }

    #[test]
    fn test_argument_binding_errors() {
        assert!(matches!(call("sqrt", vec![]), Err(EvalError::Type { .. })));
        assert!(Builtin::Count.call(vec![], vec![("stride".to_string(), Value::Int(1))], 10).is_err());
        assert!(call("len", vec![Value::Int(1), Value::Int(2)]).is_err());
    }

    #[test]
    fn test_generators_and_iterable() {
        assert_eq!(call("first", vec![]).unwrap(), Value::Generator(Generator::First));
        assert!(matches!(call("list", vec![Value::Generator(Generator::First)]), Err(EvalError::TooLong { .. })));
        assert_eq!(call("iterable", vec![Value::Int(1)]).unwrap(), Value::Bool(false));
        assert_eq!(call("iterable", vec![Value::from("ab")]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_elementwise_math() {
        assert_eq!(call("sqrt", vec![Value::Int(4)]).unwrap(), Value::Float(2.0));
        assert_eq!(as_floats(call("abs", vec![Value::Array(vec![Value::Int(-1), Value::Float(-2.5)])]).unwrap()), vec![1.0, 2.5]);
        assert_eq!(call("round", vec![Value::Float(2.5)]).unwrap(), Value::Float(2.0));
        assert_eq!(call("repeat", vec![Value::Array(vec![Value::Int(1), Value::Int(2)]), Value::Int(2)]).unwrap(), Value::Array(vec![Value::Int(1), Value::Int(1), Value::Int(2), Value::Int(2)]));
    }
}
