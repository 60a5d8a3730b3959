//! # Math, Array, String and Utility Intrinsics
//!
//! Everything that is not music-specific: numeric helpers (exact where the
//! inputs are rational), deterministic seeded randomness, array and object
//! primitives, string helpers, `print` (routed through the `log` facade)
//! and the `curve` constructor for automation.

use super::ArgView;
use crate::error::TakoError;
use crate::eval::{rat_like, CallArgs, Evaluator};
use crate::rat::Rat;
use crate::value::{deep_eq, format_value, CurveValue, ObjectMap, RngState, Value};
use log::info;
use std::cell::RefCell;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Math

/// `abs(x)` - exact on rationals.
pub fn abs(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("abs", call);
    args.arity(ev, 1, 1)?;
    match args.value(ev, 0)? {
        Value::Num(n) => Ok(Value::Num(n.abs())),
        Value::Rat(r) => Ok(Value::Rat(r.abs())),
        other => Err(args.err(
            ev,
            format!("expected a number or rational, got {}", other.type_name()),
        )),
    }
}

fn fold_extreme(
    ev: &mut Evaluator,
    call: &CallArgs,
    fname: &'static str,
    want_max: bool,
) -> Result<Value, TakoError> {
    let args = ArgView::new(fname, call);
    args.arity(ev, 1, usize::MAX)?;
    // a single array argument folds over its elements
    let values: Vec<Value> = if call.positional.len() == 1 {
        match args.value(ev, 0)? {
            Value::Array(items) => items.borrow().clone(),
            other => vec![other.clone()],
        }
    } else {
        call.positional.clone()
    };
    if values.is_empty() {
        return Err(args.err(ev, "expected at least one value"));
    }
    let mut best = values[0].clone();
    for value in &values[1..] {
        let cmp = match (&best, value) {
            (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
            (Value::Rat(a), Value::Rat(b)) => Some(a.cmp(b)),
            (Value::Rat(a), Value::Num(b)) => a.to_f64().partial_cmp(b),
            (Value::Num(a), Value::Rat(b)) => a.partial_cmp(&b.to_f64()),
            _ => None,
        };
        let cmp = cmp.ok_or_else(|| {
            args.err(
                ev,
                format!(
                    "cannot compare {} and {}",
                    best.type_name(),
                    value.type_name()
                ),
            )
        })?;
        let replace = if want_max {
            cmp == std::cmp::Ordering::Less
        } else {
            cmp == std::cmp::Ordering::Greater
        };
        if replace {
            best = value.clone();
        }
    }
    Ok(best)
}

/// `min(a, b, ...)` or `min(array)`.
pub fn min(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    fold_extreme(ev, call, "min", false)
}

/// `max(a, b, ...)` or `max(array)`.
pub fn max(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    fold_extreme(ev, call, "max", true)
}

/// `floor(x)` - largest integer not above `x`.
pub fn floor(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("floor", call);
    args.arity(ev, 1, 1)?;
    Ok(Value::Num(args.num(ev, 0)?.floor()))
}

/// `ceil(x)`.
pub fn ceil(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("ceil", call);
    args.arity(ev, 1, 1)?;
    Ok(Value::Num(args.num(ev, 0)?.ceil()))
}

/// `round(x)` - half away from zero.
pub fn round(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("round", call);
    args.arity(ev, 1, 1)?;
    Ok(Value::Num(args.num(ev, 0)?.round()))
}

/// `clamp(x, lo, hi)`.
pub fn clamp(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("clamp", call);
    args.arity(ev, 3, 3)?;
    let x = args.num(ev, 0)?;
    let lo = args.num(ev, 1)?;
    let hi = args.num(ev, 2)?;
    if hi < lo {
        return Err(args.err(ev, "upper bound is below lower bound"));
    }
    Ok(Value::Num(x.clamp(lo, hi)))
}

/// `pow(base, exp)`.
pub fn pow(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("pow", call);
    args.arity(ev, 2, 2)?;
    Ok(Value::Num(args.num(ev, 0)?.powf(args.num(ev, 1)?)))
}

/// `sqrt(x)`.
pub fn sqrt(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("sqrt", call);
    args.arity(ev, 1, 1)?;
    let x = args.num(ev, 0)?;
    if x < 0.0 {
        return Err(args.err(ev, "square root of a negative number"));
    }
    Ok(Value::Num(x.sqrt()))
}

/// `lerp(a, b, t)` - linear interpolation.
pub fn lerp(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("lerp", call);
    args.arity(ev, 3, 3)?;
    let a = args.num(ev, 0)?;
    let b = args.num(ev, 1)?;
    let t = args.num(ev, 2)?;
    Ok(Value::Num(a + (b - a) * t))
}

/// `rat(n, d)` - construct an exact rational.
pub fn rat(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("rat", call);
    args.arity(ev, 2, 2)?;
    let n = args.int(ev, 0)?;
    let d = args.int(ev, 1)?;
    Rat::new(n, d)
        .map(Value::Rat)
        .ok_or_else(|| args.err(ev, "denominator must be nonzero"))
}

/// `numerator(r)`.
pub fn numerator(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("numerator", call);
    args.arity(ev, 1, 1)?;
    Ok(Value::Num(args.rat(ev, 0)?.numerator() as f64))
}

/// `denominator(r)`.
pub fn denominator(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("denominator", call);
    args.arity(ev, 1, 1)?;
    Ok(Value::Num(args.rat(ev, 0)?.denominator() as f64))
}

// ---------------------------------------------------------------------------
// Deterministic randomness

/// `rng(seed)` - seeded PRNG state; identical seeds give identical streams.
pub fn rng(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("rng", call);
    args.arity(ev, 1, 1)?;
    let seed = args.int(ev, 0)?;
    Ok(Value::Rng(Rc::new(RefCell::new(RngState::new(
        seed as u64,
    )))))
}

/// `randInt(rng, lo, hi)` - uniform integer in `[lo, hi]`.
pub fn rand_int(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("randInt", call);
    args.arity(ev, 3, 3)?;
    let state = args.rng(ev, 0)?;
    let lo = args.int(ev, 1)?;
    let hi = args.int(ev, 2)?;
    if hi < lo {
        return Err(args.err(ev, "upper bound is below lower bound"));
    }
    let n = state.borrow_mut().int_in(lo, hi);
    Ok(Value::Num(n as f64))
}

/// `randFloat(rng)` - uniform float in `[0, 1)`.
pub fn rand_float(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("randFloat", call);
    args.arity(ev, 1, 1)?;
    let state = args.rng(ev, 0)?;
    let x = state.borrow_mut().next_f64();
    Ok(Value::Num(x))
}

/// `choose(rng, array)` - uniform pick.
pub fn choose(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("choose", call);
    args.arity(ev, 2, 2)?;
    let state = args.rng(ev, 0)?;
    let items = args.array(ev, 1)?;
    if items.is_empty() {
        return Err(args.err(ev, "cannot choose from an empty array"));
    }
    let index = state.borrow_mut().int_in(0, items.len() as i64 - 1);
    Ok(items[index as usize].clone())
}

// ---------------------------------------------------------------------------
// Arrays, objects, strings

/// `len(v)` - array, object, string or clip length.
pub fn len(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("len", call);
    args.arity(ev, 1, 1)?;
    let n = match args.value(ev, 0)? {
        Value::Array(items) => items.borrow().len(),
        Value::Object(map) => map.borrow().len(),
        Value::Str(s) => s.chars().count(),
        Value::Clip(c) => c.events.len(),
        other => {
            return Err(args.err(
                ev,
                format!(
                    "expected an array, object, string or clip, got {}",
                    other.type_name()
                ),
            ))
        }
    };
    Ok(Value::Num(n as f64))
}

/// `push(array, value)` - append in place; returns the array.
pub fn push(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("push", call);
    args.arity(ev, 2, 2)?;
    let array = args.value(ev, 0)?.clone();
    let value = args.value(ev, 1)?.clone();
    match &array {
        Value::Array(items) => {
            items.borrow_mut().push(value);
            Ok(array)
        }
        other => Err(args.err(
            ev,
            format!("expected an array, got {}", other.type_name()),
        )),
    }
}

/// `concatArrays(a, b, ...)` - new array with all elements.
pub fn concat_arrays(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("concatArrays", call);
    args.arity(ev, 1, usize::MAX)?;
    let mut all = Vec::new();
    for index in 0..call.positional.len() {
        all.extend(args.array(ev, index)?);
    }
    Ok(Value::array(all))
}

/// `sort(array)` - new array, ascending; numbers/rationals or strings.
pub fn sort(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("sort", call);
    args.arity(ev, 1, 1)?;
    let mut items = args.array(ev, 0)?;
    let mut failed = false;
    items.sort_by(|a, b| {
        let ordering = match (a, b) {
            (Value::Num(x), Value::Num(y)) => x.partial_cmp(y),
            (Value::Rat(x), Value::Rat(y)) => Some(x.cmp(y)),
            (Value::Rat(x), Value::Num(y)) => x.to_f64().partial_cmp(y),
            (Value::Num(x), Value::Rat(y)) => x.partial_cmp(&y.to_f64()),
            (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
            _ => None,
        };
        ordering.unwrap_or_else(|| {
            failed = true;
            std::cmp::Ordering::Equal
        })
    });
    if failed {
        return Err(args.err(
            ev,
            "array elements must be all numbers/rationals or all strings",
        ));
    }
    Ok(Value::array(items))
}

/// `reverse(array)` - new array, reversed.
pub fn reverse(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("reverse", call);
    args.arity(ev, 1, 1)?;
    let mut items = args.array(ev, 0)?;
    items.reverse();
    Ok(Value::array(items))
}

/// `range(end)` or `range(start, end)` - integer array `[start, end)`.
pub fn range(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("range", call);
    args.arity(ev, 1, 2)?;
    let (lo, hi) = if call.positional.len() == 1 {
        (0, args.int(ev, 0)?)
    } else {
        (args.int(ev, 0)?, args.int(ev, 1)?)
    };
    Ok(Value::array(
        (lo..hi).map(|n| Value::Num(n as f64)).collect(),
    ))
}

/// `join(array, sep)` - string join using display formatting.
pub fn join(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("join", call);
    args.arity(ev, 2, 2)?;
    let items = args.array(ev, 0)?;
    let sep = args.str(ev, 1)?;
    let parts: Vec<String> = items.iter().map(format_value).collect();
    Ok(Value::Str(parts.join(&sep)))
}

/// `split(string, sep)`.
pub fn split(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("split", call);
    args.arity(ev, 2, 2)?;
    let text = args.str(ev, 0)?;
    let sep = args.str(ev, 1)?;
    let parts: Vec<Value> = if sep.is_empty() {
        text.chars().map(|c| Value::Str(c.to_string())).collect()
    } else {
        text.split(&sep)
            .map(|p| Value::Str(p.to_string()))
            .collect()
    };
    Ok(Value::array(parts))
}

/// `contains(array, x)` by structural equality, or `contains(string, sub)`.
pub fn contains(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("contains", call);
    args.arity(ev, 2, 2)?;
    let needle = args.value(ev, 1)?.clone();
    match args.value(ev, 0)? {
        Value::Array(items) => Ok(Value::Bool(
            items.borrow().iter().any(|v| deep_eq(v, &needle)),
        )),
        Value::Str(s) => match &needle {
            Value::Str(sub) => Ok(Value::Bool(s.contains(sub.as_str()))),
            other => Err(args.err(
                ev,
                format!(
                    "substring search needs a string, got {}",
                    other.type_name()
                ),
            )),
        },
        other => Err(args.err(
            ev,
            format!("expected an array or string, got {}", other.type_name()),
        )),
    }
}

/// `keys(object)` - array of keys in insertion order.
pub fn keys(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("keys", call);
    args.arity(ev, 1, 1)?;
    match args.value(ev, 0)? {
        Value::Object(map) => Ok(Value::array(
            map.borrow()
                .keys()
                .map(|k| Value::Str(k.to_string()))
                .collect(),
        )),
        other => Err(args.err(
            ev,
            format!("expected an object, got {}", other.type_name()),
        )),
    }
}

/// `values(object)` - array of values in insertion order.
pub fn values(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("values", call);
    args.arity(ev, 1, 1)?;
    match args.value(ev, 0)? {
        Value::Object(map) => Ok(Value::array(
            map.borrow().iter().map(|(_, v)| v.clone()).collect(),
        )),
        other => Err(args.err(
            ev,
            format!("expected an object, got {}", other.type_name()),
        )),
    }
}

/// `str(v)` - display formatting.
pub fn str_of(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("str", call);
    args.arity(ev, 1, 1)?;
    Ok(Value::Str(format_value(args.value(ev, 0)?)))
}

/// `parseInt(s)` - integer or null.
pub fn parse_int(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("parseInt", call);
    args.arity(ev, 1, 1)?;
    let text = args.str(ev, 0)?;
    Ok(text
        .trim()
        .parse::<i64>()
        .map(|n| Value::Num(n as f64))
        .unwrap_or(Value::Null))
}

/// `parseFloat(s)` - number or null.
pub fn parse_float(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("parseFloat", call);
    args.arity(ev, 1, 1)?;
    let text = args.str(ev, 0)?;
    Ok(text
        .trim()
        .parse::<f64>()
        .map(Value::Num)
        .unwrap_or(Value::Null))
}

/// `upper(s)`.
pub fn upper(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("upper", call);
    args.arity(ev, 1, 1)?;
    Ok(Value::Str(args.str(ev, 0)?.to_uppercase()))
}

/// `lower(s)`.
pub fn lower(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("lower", call);
    args.arity(ev, 1, 1)?;
    Ok(Value::Str(args.str(ev, 0)?.to_lowercase()))
}

/// `trim(s)`.
pub fn trim(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("trim", call);
    args.arity(ev, 1, 1)?;
    Ok(Value::Str(args.str(ev, 0)?.trim().to_string()))
}

/// `print(...)` - space-joined display output through the log facade.
pub fn print(_ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let parts: Vec<String> = call.positional.iter().map(format_value).collect();
    info!("{}", parts.join(" "));
    Ok(Value::Null)
}

// ---------------------------------------------------------------------------
// Curves

/// `curve([[at, value], ...])` - piecewise-linear automation curve. Points
/// must be `[rational, number]` pairs in non-decreasing position order.
pub fn curve(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("curve", call);
    args.arity(ev, 1, 1)?;
    let raw = args.array(ev, 0)?;
    let mut points = Vec::with_capacity(raw.len());
    for item in &raw {
        let pair = match item {
            Value::Array(pair) => pair.borrow().clone(),
            other => {
                return Err(args.err(
                    ev,
                    format!(
                        "each point must be an [at, value] pair, got {}",
                        other.type_name()
                    ),
                ))
            }
        };
        if pair.len() != 2 {
            return Err(args.err(ev, "each point must be an [at, value] pair"));
        }
        let at = rat_like(&pair[0])
            .ok_or_else(|| args.err(ev, "point positions must be rational"))?;
        let value = match &pair[1] {
            Value::Num(n) => *n,
            Value::Rat(r) => r.to_f64(),
            other => {
                return Err(args.err(
                    ev,
                    format!("point values must be numbers, got {}", other.type_name()),
                ))
            }
        };
        if let Some((prev, _)) = points.last() {
            if at < *prev {
                return Err(args.err(ev, "point positions must be non-decreasing"));
            }
        }
        points.push((at, value));
    }
    Ok(Value::Curve(Rc::new(CurveValue { points })))
}
