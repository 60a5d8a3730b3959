//! # Rhythm Helpers
//!
//! Euclidean onset patterns, textual step patterns, swing, and the drum key
//! constructor used by `hit` statements and `std:drums`.

use super::ArgView;
use crate::error::TakoError;
use crate::eval::{CallArgs, Evaluator};
use crate::rat::Rat;
use crate::value::{ClipValue, Value};
use std::rc::Rc;

/// Drum keys understood by downstream renderers.
pub const DRUM_KEYS: &[&str] = &[
    "kick",
    "snare",
    "rim",
    "clap",
    "hatClosed",
    "hatOpen",
    "hatPedal",
    "ride",
    "rideBell",
    "crash",
    "tomLow",
    "tomMid",
    "tomHigh",
    "shaker",
    "tambourine",
    "cowbell",
];

/// `euclid(pulses, steps, rotation = 0)` - Euclidean rhythm as an array of
/// booleans, true on onsets. Uses the Bresenham formulation: step `i` is an
/// onset iff `((i + rotation) * pulses) mod steps < pulses`. Rotation may
/// also be passed as a named argument: `euclid(3, 8, rotation: 2)`.
pub fn euclid(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("euclid", call);
    args.arity(ev, 2, 3)?;
    let pulses = args.int(ev, 0)?;
    let steps = args.int(ev, 1)?;
    let rotation = match (args.get(2), args.named("rotation")) {
        (Some(_), _) => args.int(ev, 2)?,
        (None, Some(named)) => named.as_int().ok_or_else(|| {
            args.err(ev, "named argument 'rotation' must be an integer")
        })?,
        (None, None) => 0,
    };
    if steps <= 0 {
        return Err(args.err(ev, "step count must be positive"));
    }
    if pulses < 0 || pulses > steps {
        return Err(args.err(ev, "pulse count must be between 0 and the step count"));
    }
    let mut onsets = Vec::with_capacity(steps as usize);
    for i in 0..steps {
        let phase = (i + rotation).rem_euclid(steps);
        onsets.push(Value::Bool((phase * pulses).rem_euclid(steps) < pulses));
    }
    Ok(Value::array(onsets))
}

/// `pattern("x..x..x.")` - step pattern from text: `x`/`X` are onsets,
/// `.`, `-` and spaces are rests.
pub fn pattern(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("pattern", call);
    args.arity(ev, 1, 1)?;
    let text = args.str(ev, 0)?;
    let mut onsets = Vec::new();
    for c in text.chars() {
        match c {
            'x' | 'X' => onsets.push(Value::Bool(true)),
            '.' | '-' => onsets.push(Value::Bool(false)),
            c if c.is_whitespace() => {}
            other => {
                return Err(args.err(
                    ev,
                    format!("unexpected character '{}' in pattern (use 'x' and '.')", other),
                ))
            }
        }
    }
    Ok(Value::array(onsets))
}

/// `swing(clip, amount = 1/24)` - delay every offbeat eighth by `amount`.
/// Events at positions that are odd multiples of an eighth note shift late.
pub fn swing(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("swing", call);
    args.arity(ev, 1, 2)?;
    let clip = args.clip(ev, 0)?;
    let amount = match args.get(1) {
        Some(_) => args.rat(ev, 1)?,
        None => Rat::new(1, 24).unwrap_or(Rat::ZERO),
    };
    let eighth = Rat::new(1, 8).unwrap_or(Rat::ONE);
    let events = clip
        .events
        .iter()
        .map(|event| match event.start().as_rat() {
            Some(start) => {
                let steps = start.checked_div(eighth);
                let offbeat = steps
                    .map(|s| s.is_integer() && s.numerator() % 2 != 0)
                    .unwrap_or(false);
                if offbeat {
                    event.shifted(amount)
                } else {
                    event.clone()
                }
            }
            None => event.clone(),
        })
        .collect();
    let mut result = ClipValue::new(events);
    result.explicit_len = clip.explicit_len;
    Ok(Value::Clip(Rc::new(result)))
}

/// `drumKey(name)` - validate and return a drum key string.
pub fn drum_key(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("drumKey", call);
    args.arity(ev, 1, 1)?;
    let name = args.str(ev, 0)?;
    if DRUM_KEYS.contains(&name.as_str()) {
        Ok(Value::Str(name))
    } else {
        Err(args.err(
            ev,
            format!(
                "unknown drum key '{}' (available: {})",
                name,
                DRUM_KEYS.join(", ")
            ),
        ))
    }
}
