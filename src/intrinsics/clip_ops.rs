//! # Clip Transforms
//!
//! Native clip combinators: tiling (`repeat`, `concat`), layering
//! (`overlay`), windowing (`slice`), timeline moves (`shift`, `padTo`,
//! `stretch`, `quantize`), pitch moves (`transpose`) and the higher-order
//! `mapEvents`.
//!
//! Transforms that need a total clip length (`repeat`, `concat`, `slice`,
//! `stretch`) require every event start to be rational; clips positioned
//! with symbolic `bar:beat` references cannot be tiled before the meter map
//! is known and are rejected with a type error.

use super::ArgView;
use crate::error::TakoError;
use crate::eval::{CallArgs, Evaluator};
use crate::pitch::Pitch;
use crate::pos::Pos;
use crate::rat::Rat;
use crate::value::{ClipValue, Event, LyricValue, ObjectMap, Value};
use std::rc::Rc;

fn clip_value(clip: ClipValue) -> Value {
    Value::Clip(Rc::new(clip))
}

fn require_length(
    ev: &Evaluator,
    args: &ArgView,
    clip: &ClipValue,
) -> Result<Rat, TakoError> {
    clip.length().ok_or_else(|| {
        args.err(
            ev,
            "clip has symbolic bar:beat positions and no computable length",
        )
    })
}

/// `repeat(clip, times)` - tile a clip end to end.
pub fn repeat(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("repeat", call);
    args.arity(ev, 2, 2)?;
    let clip = args.clip(ev, 0)?;
    let times = args.int(ev, 1)?;
    if times < 0 {
        return Err(args.err(ev, "repeat count must be non-negative"));
    }
    let len = require_length(ev, &args, &clip)?;
    let mut events = Vec::with_capacity(clip.events.len() * times as usize);
    for k in 0..times {
        let offset = len * Rat::int(k);
        for event in &clip.events {
            events.push(event.shifted(offset));
        }
    }
    let mut result = ClipValue::new(events);
    result.explicit_len = Some(len * Rat::int(times));
    Ok(clip_value(result))
}

/// `concat(a, b, ...)` - append clips on a shared timeline.
pub fn concat(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("concat", call);
    args.arity(ev, 1, usize::MAX)?;
    let mut events = Vec::new();
    let mut offset = Rat::ZERO;
    for index in 0..call.positional.len() {
        let clip = args.clip(ev, index)?;
        let len = require_length(ev, &args, &clip)?;
        for event in &clip.events {
            events.push(event.shifted(offset));
        }
        offset = offset + len;
    }
    let mut result = ClipValue::new(events);
    result.explicit_len = Some(offset);
    Ok(clip_value(result))
}

/// `overlay(a, b, ...)` - merge clips at the same origin. Event order is
/// argument order, preserving each clip's insertion order.
pub fn overlay(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("overlay", call);
    args.arity(ev, 1, usize::MAX)?;
    let mut events = Vec::new();
    let mut explicit_len: Option<Rat> = None;
    for index in 0..call.positional.len() {
        let clip = args.clip(ev, index)?;
        if let Some(len) = clip.length() {
            explicit_len = Some(match explicit_len {
                Some(cur) if cur > len => cur,
                _ => len,
            });
        }
        events.extend(clip.events.iter().cloned());
    }
    let mut result = ClipValue::new(events);
    result.explicit_len = explicit_len;
    Ok(clip_value(result))
}

/// `slice(clip, from, to)` - events starting in `[from, to)`, rebased to 0.
pub fn slice(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("slice", call);
    args.arity(ev, 3, 3)?;
    let clip = args.clip(ev, 0)?;
    let from = args.rat(ev, 1)?;
    let to = args.rat(ev, 2)?;
    if to < from {
        return Err(args.err(ev, "slice end must not precede slice start"));
    }
    let mut events = Vec::new();
    for event in &clip.events {
        let start = match event.start().as_rat() {
            Some(start) => start,
            None => {
                return Err(args.err(
                    ev,
                    "cannot slice a clip with symbolic bar:beat positions",
                ))
            }
        };
        if start >= from && start < to {
            events.push(event.shifted(-from));
        }
    }
    let mut result = ClipValue::new(events);
    result.explicit_len = Some(to - from);
    Ok(clip_value(result))
}

/// `shift(clip, by)` - move every event by a rational delta. Works on
/// symbolic positions too.
pub fn shift(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("shift", call);
    args.arity(ev, 2, 2)?;
    let clip = args.clip(ev, 0)?;
    let by = args.rat(ev, 1)?;
    let events = clip.events.iter().map(|e| e.shifted(by)).collect();
    let mut result = ClipValue::new(events);
    result.explicit_len = clip.explicit_len.map(|len| len + by);
    Ok(clip_value(result))
}

/// `padTo(clip, len)` - extend the clip's logical length (a no-op when the
/// clip is already longer).
pub fn pad_to(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("padTo", call);
    args.arity(ev, 2, 2)?;
    let mut clip = args.clip(ev, 0)?;
    let len = args.rat(ev, 1)?;
    if len.is_negative() {
        return Err(args.err(ev, "pad length must be non-negative"));
    }
    let current = clip.explicit_len.unwrap_or(Rat::ZERO);
    if len > current {
        clip.explicit_len = Some(len);
    }
    Ok(clip_value(clip))
}

/// `mapEvents(clip, f)` - apply a function to each event, presented as an
/// object `{type, start, dur, ...}`. The function's return value (an object
/// of the same shape, or `null` to drop the event) replaces the event.
pub fn map_events(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("mapEvents", call);
    args.arity(ev, 2, 2)?;
    let clip = args.clip(ev, 0)?;
    let func = args.func(ev, 1)?;
    let mut events = Vec::with_capacity(clip.events.len());
    for event in &clip.events {
        let view = event_to_value(event);
        let result = ev.call_function(
            &func,
            CallArgs {
                positional: vec![view],
                named: Vec::new(),
                pos: call.pos,
            },
        )?;
        match result {
            Value::Null => {}
            other => events.push(value_to_event(ev, &args, &other)?),
        }
    }
    Ok(clip_value(ClipValue::new(events)))
}

/// `transpose(clip, semitones)` - transpose note and chord pitches.
pub fn transpose(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("transpose", call);
    args.arity(ev, 2, 2)?;
    let clip = args.clip(ev, 0)?;
    let semitones = args.int(ev, 1)? as i32;
    let events = clip
        .events
        .iter()
        .map(|event| {
            let mut event = event.clone();
            match &mut event {
                Event::Note { pitch, .. } => *pitch = pitch.transpose(semitones),
                Event::Chord { pitches, .. } => {
                    for p in pitches.iter_mut() {
                        *p = p.transpose(semitones);
                    }
                }
                _ => {}
            }
            event
        })
        .collect();
    let mut result = ClipValue::new(events);
    result.explicit_len = clip.explicit_len;
    Ok(clip_value(result))
}

/// `stretch(clip, factor)` - scale starts and durations by a positive
/// rational factor.
pub fn stretch(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("stretch", call);
    args.arity(ev, 2, 2)?;
    let clip = args.clip(ev, 0)?;
    let factor = args.rat(ev, 1)?;
    if factor.is_negative() || factor.is_zero() {
        return Err(args.err(ev, "stretch factor must be positive"));
    }
    let mut events = Vec::with_capacity(clip.events.len());
    for event in &clip.events {
        let start = match event.start().as_rat() {
            Some(start) => start,
            None => {
                return Err(args.err(
                    ev,
                    "cannot stretch a clip with symbolic bar:beat positions",
                ))
            }
        };
        events.push(rebase_event(event, Pos::Rat(start * factor), factor));
    }
    let mut result = ClipValue::new(events);
    result.explicit_len = clip.explicit_len.map(|len| len * factor);
    Ok(clip_value(result))
}

/// `quantize(clip, grid)` - round rational event starts to the nearest grid
/// multiple. Symbolic positions pass through untouched.
pub fn quantize(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("quantize", call);
    args.arity(ev, 2, 2)?;
    let clip = args.clip(ev, 0)?;
    let grid = args.rat(ev, 1)?;
    if grid.is_negative() || grid.is_zero() {
        return Err(args.err(ev, "quantize grid must be positive"));
    }
    let events = clip
        .events
        .iter()
        .map(|event| match event.start().as_rat() {
            Some(start) => {
                let snapped = start.quantize(grid);
                rebase_event(event, Pos::Rat(snapped), Rat::ONE)
            }
            None => event.clone(),
        })
        .collect();
    let mut result = ClipValue::new(events);
    result.explicit_len = clip.explicit_len;
    Ok(clip_value(result))
}

/// Rewrite an event's start (and scale its duration by `dur_factor`).
fn rebase_event(event: &Event, start: Pos, dur_factor: Rat) -> Event {
    let mut event = event.clone();
    match &mut event {
        Event::Note { start: s, dur, .. }
        | Event::Chord { start: s, dur, .. }
        | Event::DrumHit { start: s, dur, .. }
        | Event::Breath { start: s, dur, .. } => {
            *s = start;
            *dur = *dur * dur_factor;
        }
        Event::Control { start: s, .. } => *s = start,
        Event::Automation { start: s, end, .. } => {
            let span = match (end.as_rat(), s.as_rat()) {
                (Some(e), Some(b)) => (e - b) * dur_factor,
                _ => Rat::ZERO,
            };
            *s = start;
            *end = start.shift(span);
        }
        Event::Marker { pos, .. } => *pos = start,
    }
    event
}

// ---------------------------------------------------------------------------
// Event <-> object views for mapEvents

fn pos_to_value(pos: Pos) -> Value {
    match pos {
        Pos::Rat(r) => Value::Rat(r),
        other => Value::Pos(other),
    }
}

/// Present an event to user code as an object.
pub fn event_to_value(event: &Event) -> Value {
    let mut map = ObjectMap::new();
    match event {
        Event::Note {
            start,
            dur,
            pitch,
            velocity,
            voice,
            techniques,
            lyric,
            ext,
        } => {
            map.set("type", Value::Str("note".to_string()));
            map.set("start", pos_to_value(*start));
            map.set("dur", Value::Rat(*dur));
            map.set("pitch", Value::Pitch(*pitch));
            if let Some(v) = velocity {
                map.set("vel", Value::Num(*v));
            }
            if let Some(v) = voice {
                map.set("voice", Value::Num(*v as f64));
            }
            if !techniques.is_empty() {
                map.set(
                    "tech",
                    Value::array(
                        techniques
                            .iter()
                            .map(|t| Value::Str(t.clone()))
                            .collect(),
                    ),
                );
            }
            if let Some(l) = lyric {
                map.set("lyric", Value::Lyric(Rc::new(l.clone())));
            }
            for (k, v) in ext.iter() {
                map.set(k.clone(), v.clone());
            }
        }
        Event::Chord {
            start,
            dur,
            pitches,
            velocity,
            ext,
        } => {
            map.set("type", Value::Str("chord".to_string()));
            map.set("start", pos_to_value(*start));
            map.set("dur", Value::Rat(*dur));
            map.set(
                "pitches",
                Value::array(pitches.iter().map(|p| Value::Pitch(*p)).collect()),
            );
            if let Some(v) = velocity {
                map.set("vel", Value::Num(*v));
            }
            for (k, v) in ext.iter() {
                map.set(k.clone(), v.clone());
            }
        }
        Event::DrumHit {
            start,
            dur,
            key,
            velocity,
            ext,
        } => {
            map.set("type", Value::Str("drumHit".to_string()));
            map.set("start", pos_to_value(*start));
            map.set("dur", Value::Rat(*dur));
            map.set("key", Value::Str(key.clone()));
            if let Some(v) = velocity {
                map.set("vel", Value::Num(*v));
            }
            for (k, v) in ext.iter() {
                map.set(k.clone(), v.clone());
            }
        }
        Event::Breath {
            start,
            dur,
            intensity,
        } => {
            map.set("type", Value::Str("breath".to_string()));
            map.set("start", pos_to_value(*start));
            map.set("dur", Value::Rat(*dur));
            if let Some(v) = intensity {
                map.set("intensity", Value::Num(*v));
            }
        }
        Event::Control { start, kind, data } => {
            map.set("type", Value::Str("control".to_string()));
            map.set("start", pos_to_value(*start));
            map.set("kind", Value::Str(kind.clone()));
            map.set("data", data.clone());
        }
        Event::Automation {
            param,
            start,
            end,
            curve,
        } => {
            map.set("type", Value::Str("automation".to_string()));
            map.set("param", Value::Str(param.clone()));
            map.set("start", pos_to_value(*start));
            map.set("end", pos_to_value(*end));
            map.set("curve", Value::Curve(Rc::new(curve.clone())));
        }
        Event::Marker { pos, kind, label } => {
            map.set("type", Value::Str("marker".to_string()));
            map.set("pos", pos_to_value(*pos));
            map.set("kind", Value::Str(kind.clone()));
            map.set("label", Value::Str(label.clone()));
        }
    }
    Value::object(map)
}

/// Rebuild an event from the object returned by a `mapEvents` callback.
pub(crate) fn value_to_event(
    ev: &Evaluator,
    args: &ArgView,
    value: &Value,
) -> Result<Event, TakoError> {
    let map = match value {
        Value::Object(map) => map.borrow().clone(),
        other => {
            return Err(args.err(
                ev,
                format!(
                    "callback must return an event object or null, got {}",
                    other.type_name()
                ),
            ))
        }
    };
    let event_type = match map.get("type") {
        Some(Value::Str(s)) => s.clone(),
        _ => return Err(args.err(ev, "event object is missing its 'type' field")),
    };
    let get_pos = |key: &str| -> Result<Pos, TakoError> {
        match map.get(key) {
            Some(Value::Pos(p)) => Ok(*p),
            Some(Value::Rat(r)) => Ok(Pos::Rat(*r)),
            Some(v) => match v.as_int() {
                Some(n) => Ok(Pos::Rat(Rat::int(n))),
                None => Err(args.err(ev, format!("event field '{}' must be a position", key))),
            },
            None => Err(args.err(ev, format!("event object is missing '{}'", key))),
        }
    };
    let get_rat = |key: &str| -> Result<Rat, TakoError> {
        match map.get(key) {
            Some(Value::Rat(r)) => Ok(*r),
            Some(v) => v
                .as_int()
                .map(Rat::int)
                .ok_or_else(|| args.err(ev, format!("event field '{}' must be a rational", key))),
            None => Err(args.err(ev, format!("event object is missing '{}'", key))),
        }
    };
    let get_str = |key: &str| -> Result<String, TakoError> {
        match map.get(key) {
            Some(Value::Str(s)) => Ok(s.clone()),
            _ => Err(args.err(ev, format!("event field '{}' must be a string", key))),
        }
    };
    let known_note = [
        "type", "start", "dur", "pitch", "vel", "voice", "tech", "lyric",
    ];
    let collect_ext = |known: &[&str]| -> ObjectMap {
        let mut ext = ObjectMap::new();
        for (k, v) in map.iter() {
            if !known.contains(&k.as_str()) {
                ext.set(k.clone(), v.clone());
            }
        }
        ext
    };

    match event_type.as_str() {
        "note" => {
            let pitch = match map.get("pitch") {
                Some(Value::Pitch(p)) => *p,
                _ => return Err(args.err(ev, "note event needs a 'pitch' field")),
            };
            let velocity = match map.get("vel") {
                Some(Value::Num(n)) => Some(*n),
                _ => None,
            };
            let voice = map.get("voice").and_then(Value::as_int);
            let techniques = match map.get("tech") {
                Some(Value::Array(items)) => items
                    .borrow()
                    .iter()
                    .filter_map(|v| match v {
                        Value::Str(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect(),
                Some(Value::Str(s)) => vec![s.clone()],
                _ => Vec::new(),
            };
            let lyric = match map.get("lyric") {
                Some(Value::Lyric(l)) => Some((**l).clone()),
                Some(Value::Str(s)) => Some(LyricValue::word(s.clone())),
                _ => None,
            };
            Ok(Event::Note {
                start: get_pos("start")?,
                dur: get_rat("dur")?,
                pitch,
                velocity,
                voice,
                techniques,
                lyric,
                ext: collect_ext(&known_note),
            })
        }
        "chord" => {
            let pitches = match map.get("pitches") {
                Some(Value::Array(items)) => {
                    let items = items.borrow();
                    let mut pitches: Vec<Pitch> = Vec::with_capacity(items.len());
                    for item in items.iter() {
                        match item {
                            Value::Pitch(p) => pitches.push(*p),
                            _ => {
                                return Err(args.err(
                                    ev,
                                    "chord event 'pitches' must contain only pitches",
                                ))
                            }
                        }
                    }
                    pitches
                }
                _ => return Err(args.err(ev, "chord event needs a 'pitches' array")),
            };
            let velocity = match map.get("vel") {
                Some(Value::Num(n)) => Some(*n),
                _ => None,
            };
            Ok(Event::Chord {
                start: get_pos("start")?,
                dur: get_rat("dur")?,
                pitches,
                velocity,
                ext: collect_ext(&["type", "start", "dur", "pitches", "vel"]),
            })
        }
        "drumHit" => {
            let velocity = match map.get("vel") {
                Some(Value::Num(n)) => Some(*n),
                _ => None,
            };
            Ok(Event::DrumHit {
                start: get_pos("start")?,
                dur: get_rat("dur")?,
                key: get_str("key")?,
                velocity,
                ext: collect_ext(&["type", "start", "dur", "key", "vel"]),
            })
        }
        "breath" => Ok(Event::Breath {
            start: get_pos("start")?,
            dur: get_rat("dur")?,
            intensity: match map.get("intensity") {
                Some(Value::Num(n)) => Some(*n),
                _ => None,
            },
        }),
        "control" => Ok(Event::Control {
            start: get_pos("start")?,
            kind: get_str("kind")?,
            data: map.get("data").cloned().unwrap_or(Value::Null),
        }),
        "automation" => {
            let curve = match map.get("curve") {
                Some(Value::Curve(c)) => (**c).clone(),
                _ => return Err(args.err(ev, "automation event needs a 'curve' field")),
            };
            Ok(Event::Automation {
                param: get_str("param")?,
                start: get_pos("start")?,
                end: get_pos("end")?,
                curve,
            })
        }
        "marker" => Ok(Event::Marker {
            pos: get_pos("pos")?,
            kind: get_str("kind")?,
            label: get_str("label")?,
        }),
        other => Err(args.err(ev, format!("unknown event type '{}'", other))),
    }
}
