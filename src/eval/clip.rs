//! # Clip Evaluation
//!
//! A clip body executes with a mutable cursor starting at rational zero.
//! `at` repositions the cursor (possibly to a symbolic `bar:beat`), `rest`
//! advances it, and the sounding statements emit an event at the cursor and
//! advance by their duration. `cc`, `automation` and `marker` emit without
//! advancing.
//!
//! Known statement options populate typed event fields; unknown options land
//! in the event's `ext` bag untouched.

use crate::ast::{ClipExpr, ClipStmt, Expr};
use crate::error::{SourcePos, TakoError};
use crate::eval::{rat_like, Evaluator};
use crate::pitch::Pitch;
use crate::pos::Pos;
use crate::rat::Rat;
use crate::scope::Scope;
use crate::value::{ClipValue, CurveValue, Event, LyricValue, ObjectMap, Value};
use std::rc::Rc;

pub fn eval_clip(
    ev: &mut Evaluator,
    expr: &ClipExpr,
    scope: &Rc<Scope>,
) -> Result<ClipValue, TakoError> {
    let mut events = Vec::new();
    let mut cursor = Pos::ORIGIN;

    for stmt in &expr.stmts {
        match stmt {
            ClipStmt::At { target, pos } => {
                let value = ev.eval_expr(target, scope)?;
                cursor = expect_pos(ev, &value, *pos, "at")?;
            }
            ClipStmt::Rest { dur, pos } => {
                let value = ev.eval_expr(dur, scope)?;
                let dur = expect_dur(ev, &value, *pos, "rest")?;
                cursor = cursor.shift(dur);
            }
            ClipStmt::Note {
                pitch,
                dur,
                opts,
                pos,
            } => {
                let pitch_value = ev.eval_expr(pitch, scope)?;
                let pitch = expect_pitch(ev, &pitch_value, *pos, "note")?;
                let dur_value = ev.eval_expr(dur, scope)?;
                let dur = expect_dur(ev, &dur_value, *pos, "note")?;

                let mut velocity = None;
                let mut voice = None;
                let mut techniques = Vec::new();
                let mut lyric = None;
                let mut ext = ObjectMap::new();
                for (name, opt_expr) in opts {
                    let value = ev.eval_expr(opt_expr, scope)?;
                    match name.as_str() {
                        "vel" => velocity = Some(expect_number(ev, &value, *pos, "vel")?),
                        "voice" => {
                            voice = Some(value.as_int().ok_or_else(|| {
                                ev.type_error(*pos, "note option 'voice' must be an integer")
                            })?)
                        }
                        "tech" => techniques = expect_techniques(ev, &value, *pos)?,
                        "lyric" => lyric = Some(expect_lyric(ev, &value, *pos)?),
                        _ => ext.set(name.clone(), value),
                    }
                }
                events.push(Event::Note {
                    start: cursor,
                    dur,
                    pitch,
                    velocity,
                    voice,
                    techniques,
                    lyric,
                    ext,
                });
                cursor = cursor.shift(dur);
            }
            ClipStmt::Chord {
                pitches,
                dur,
                opts,
                pos,
            } => {
                let pitches_value = ev.eval_expr(pitches, scope)?;
                let pitches = expect_pitches(ev, &pitches_value, *pos)?;
                let dur_value = ev.eval_expr(dur, scope)?;
                let dur = expect_dur(ev, &dur_value, *pos, "chord")?;
                let (velocity, ext) = eval_common_opts(ev, opts, scope, *pos)?;
                events.push(Event::Chord {
                    start: cursor,
                    dur,
                    pitches,
                    velocity,
                    ext,
                });
                cursor = cursor.shift(dur);
            }
            ClipStmt::Hit {
                key,
                dur,
                opts,
                pos,
            } => {
                let key_value = ev.eval_expr(key, scope)?;
                let key = expect_str(ev, &key_value, *pos, "hit key")?;
                let dur_value = ev.eval_expr(dur, scope)?;
                let dur = expect_dur(ev, &dur_value, *pos, "hit")?;
                let (velocity, ext) = eval_common_opts(ev, opts, scope, *pos)?;
                events.push(Event::DrumHit {
                    start: cursor,
                    dur,
                    key,
                    velocity,
                    ext,
                });
                cursor = cursor.shift(dur);
            }
            ClipStmt::Breath { dur, opts, pos } => {
                let dur_value = ev.eval_expr(dur, scope)?;
                let dur = expect_dur(ev, &dur_value, *pos, "breath")?;
                let mut intensity = None;
                for (name, opt_expr) in opts {
                    let value = ev.eval_expr(opt_expr, scope)?;
                    if name == "intensity" {
                        intensity = Some(expect_number(ev, &value, *pos, "intensity")?);
                    }
                }
                events.push(Event::Breath {
                    start: cursor,
                    dur,
                    intensity,
                });
                cursor = cursor.shift(dur);
            }
            ClipStmt::Control {
                kind,
                value,
                opts: _,
                pos,
            } => {
                let kind_value = ev.eval_expr(kind, scope)?;
                let kind = match &kind_value {
                    Value::Str(s) => s.clone(),
                    Value::Num(_) => match kind_value.as_int() {
                        Some(n) => n.to_string(),
                        None => {
                            return Err(ev.type_error(
                                *pos,
                                "cc kind must be a string or controller number",
                            ))
                        }
                    },
                    other => {
                        return Err(ev.type_error(
                            *pos,
                            format!(
                                "cc kind must be a string or controller number, got {}",
                                other.type_name()
                            ),
                        ))
                    }
                };
                let data = ev.eval_expr(value, scope)?;
                events.push(Event::Control {
                    start: cursor,
                    kind,
                    data,
                });
            }
            ClipStmt::Automation {
                param,
                dur,
                curve,
                opts: _,
                pos,
            } => {
                let param_value = ev.eval_expr(param, scope)?;
                let param = expect_str(ev, &param_value, *pos, "automation param")?;
                let dur_value = ev.eval_expr(dur, scope)?;
                let dur = expect_dur(ev, &dur_value, *pos, "automation")?;
                let curve_value = ev.eval_expr(curve, scope)?;
                let curve = expect_curve(ev, &curve_value, *pos)?;
                events.push(Event::Automation {
                    param,
                    start: cursor,
                    end: cursor.shift(dur),
                    curve,
                });
            }
            ClipStmt::Marker { kind, label, pos } => {
                let kind_value = ev.eval_expr(kind, scope)?;
                let kind = expect_str(ev, &kind_value, *pos, "marker kind")?;
                let label_value = ev.eval_expr(label, scope)?;
                let label = expect_str(ev, &label_value, *pos, "marker label")?;
                events.push(Event::Marker {
                    pos: cursor,
                    kind,
                    label,
                });
            }
        }
    }

    let mut clip = ClipValue::new(events);
    // trailing rests count toward the clip's length
    if let Some(end) = cursor.as_rat() {
        if !end.is_negative() {
            clip.explicit_len = Some(end);
        }
    }
    Ok(clip)
}

fn eval_common_opts(
    ev: &mut Evaluator,
    opts: &[(String, Expr)],
    scope: &Rc<Scope>,
    pos: SourcePos,
) -> Result<(Option<f64>, ObjectMap), TakoError> {
    let mut velocity = None;
    let mut ext = ObjectMap::new();
    for (name, opt_expr) in opts {
        let value = ev.eval_expr(opt_expr, scope)?;
        if name == "vel" {
            velocity = Some(expect_number(ev, &value, pos, "vel")?);
        } else {
            ext.set(name.clone(), value);
        }
    }
    Ok((velocity, ext))
}

pub fn expect_pos(
    ev: &Evaluator,
    value: &Value,
    pos: SourcePos,
    context: &str,
) -> Result<Pos, TakoError> {
    match value {
        Value::Pos(p) => Ok(*p),
        _ => match rat_like(value) {
            Some(r) => Ok(Pos::Rat(r)),
            None => Err(ev.type_error(
                pos,
                format!(
                    "{} expects a position or rational, got {}",
                    context,
                    value.type_name()
                ),
            )),
        },
    }
}

pub fn expect_dur(
    ev: &Evaluator,
    value: &Value,
    pos: SourcePos,
    context: &str,
) -> Result<Rat, TakoError> {
    rat_like(value).ok_or_else(|| {
        ev.type_error(
            pos,
            format!(
                "{} expects a rational duration, got {}",
                context,
                value.type_name()
            ),
        )
    })
}

fn expect_pitch(
    ev: &Evaluator,
    value: &Value,
    pos: SourcePos,
    context: &str,
) -> Result<Pitch, TakoError> {
    match value {
        Value::Pitch(p) => Ok(*p),
        other => Err(ev.type_error(
            pos,
            format!("{} expects a pitch, got {}", context, other.type_name()),
        )),
    }
}

fn expect_pitches(
    ev: &Evaluator,
    value: &Value,
    pos: SourcePos,
) -> Result<Vec<Pitch>, TakoError> {
    match value {
        Value::Pitch(p) => Ok(vec![*p]),
        Value::Array(items) => {
            let items = items.borrow();
            let mut pitches = Vec::with_capacity(items.len());
            for item in items.iter() {
                match item {
                    Value::Pitch(p) => pitches.push(*p),
                    other => {
                        return Err(ev.type_error(
                            pos,
                            format!(
                                "chord expects an array of pitches, found {}",
                                other.type_name()
                            ),
                        ))
                    }
                }
            }
            Ok(pitches)
        }
        other => Err(ev.type_error(
            pos,
            format!(
                "chord expects an array of pitches, got {}",
                other.type_name()
            ),
        )),
    }
}

pub fn expect_str(
    ev: &Evaluator,
    value: &Value,
    pos: SourcePos,
    context: &str,
) -> Result<String, TakoError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(ev.type_error(
            pos,
            format!("{} expects a string, got {}", context, other.type_name()),
        )),
    }
}

pub fn expect_number(
    ev: &Evaluator,
    value: &Value,
    pos: SourcePos,
    context: &str,
) -> Result<f64, TakoError> {
    match value {
        Value::Num(n) => Ok(*n),
        Value::Rat(r) => Ok(r.to_f64()),
        other => Err(ev.type_error(
            pos,
            format!("{} expects a number, got {}", context, other.type_name()),
        )),
    }
}

fn expect_techniques(
    ev: &Evaluator,
    value: &Value,
    pos: SourcePos,
) -> Result<Vec<String>, TakoError> {
    match value {
        Value::Str(s) => Ok(vec![s.clone()]),
        Value::Array(items) => {
            let items = items.borrow();
            let mut techs = Vec::with_capacity(items.len());
            for item in items.iter() {
                match item {
                    Value::Str(s) => techs.push(s.clone()),
                    other => {
                        return Err(ev.type_error(
                            pos,
                            format!(
                                "'tech' expects a string or array of strings, found {}",
                                other.type_name()
                            ),
                        ))
                    }
                }
            }
            Ok(techs)
        }
        other => Err(ev.type_error(
            pos,
            format!(
                "'tech' expects a string or array of strings, got {}",
                other.type_name()
            ),
        )),
    }
}

fn expect_lyric(ev: &Evaluator, value: &Value, pos: SourcePos) -> Result<LyricValue, TakoError> {
    match value {
        Value::Str(s) => Ok(LyricValue::word(s.clone())),
        Value::Lyric(l) => Ok((**l).clone()),
        other => Err(ev.type_error(
            pos,
            format!(
                "'lyric' expects a string or lyric token, got {}",
                other.type_name()
            ),
        )),
    }
}

fn expect_curve(ev: &Evaluator, value: &Value, pos: SourcePos) -> Result<CurveValue, TakoError> {
    match value {
        Value::Curve(c) => Ok((**c).clone()),
        other => Err(ev.type_error(
            pos,
            format!(
                "automation expects a curve (build one with curve([...])), got {}",
                other.type_name()
            ),
        )),
    }
}
