//! # Score Evaluation
//!
//! Assembles the symbolic [`ScoreValue`] from a `score { ... }` literal:
//! metadata, tempo and meter maps, sound declarations, tracks with their
//! clip placements, and top-level markers. Everything stays symbolic; the
//! IR normalizer does position resolution and validation.

use crate::ast::{ScoreExpr, ScoreItem, TrackStmt};
use crate::error::TakoError;
use crate::eval::clip::{expect_dur, expect_number, expect_pos, expect_str};
use crate::eval::Evaluator;
use crate::rat::Rat;
use crate::scope::Scope;
use crate::value::{
    MarkerEvent, MeterEvent, MetaValue, Mix, ObjectMap, Placement, ScoreValue, SoundKind,
    SoundValue, TempoEvent, TrackRole, TrackValue, Value,
};
use std::rc::Rc;

/// Default tempo unit: the quarter note.
fn default_unit() -> Rat {
    Rat::new(1, 4).unwrap_or(Rat::ONE)
}

pub fn eval_score(
    ev: &mut Evaluator,
    expr: &ScoreExpr,
    scope: &Rc<Scope>,
) -> Result<ScoreValue, TakoError> {
    let mut score = ScoreValue::default();

    for item in &expr.items {
        match item {
            ScoreItem::Meta { entries, pos } => {
                for (key, value_expr) in entries {
                    let value = ev.eval_expr(value_expr, scope)?;
                    match key.as_str() {
                        "title" => score.meta.title = Some(expect_str(ev, &value, *pos, "title")?),
                        "artist" => {
                            score.meta.artist = Some(expect_str(ev, &value, *pos, "artist")?)
                        }
                        "album" => score.meta.album = Some(expect_str(ev, &value, *pos, "album")?),
                        "copyright" => {
                            score.meta.copyright = Some(expect_str(ev, &value, *pos, "copyright")?)
                        }
                        _ => score.meta.ext.set(key.clone(), value),
                    }
                }
            }
            ScoreItem::Tempo { entries, .. } => {
                for entry in entries {
                    let at_value = ev.eval_expr(&entry.at, scope)?;
                    let at = expect_pos(ev, &at_value, entry.pos, "tempo position")?;
                    let bpm_value = ev.eval_expr(&entry.bpm, scope)?;
                    let bpm = expect_number(ev, &bpm_value, entry.pos, "tempo")?;
                    let unit = match &entry.unit {
                        Some(unit_expr) => {
                            let unit_value = ev.eval_expr(unit_expr, scope)?;
                            expect_dur(ev, &unit_value, entry.pos, "tempo unit")?
                        }
                        None => default_unit(),
                    };
                    score.tempo_map.push(TempoEvent { at, bpm, unit });
                }
            }
            ScoreItem::Meter { entries, .. } => {
                for entry in entries {
                    let at_value = ev.eval_expr(&entry.at, scope)?;
                    let at = expect_pos(ev, &at_value, entry.pos, "meter position")?;
                    score.meter_map.push(MeterEvent {
                        at,
                        numerator: entry.numerator,
                        denominator: entry.denominator,
                    });
                }
            }
            ScoreItem::Sound {
                id,
                kind,
                opts,
                pos,
            } => {
                let kind = SoundKind::parse(kind).ok_or_else(|| {
                    ev.type_error(
                        *pos,
                        format!(
                            "unknown sound kind '{}'; expected instrument, drumKit, vocal or fx",
                            kind
                        ),
                    )
                })?;
                let mut map = ObjectMap::new();
                for (key, value_expr) in opts {
                    let value = ev.eval_expr(value_expr, scope)?;
                    map.set(key.clone(), value);
                }
                score.sounds.push(SoundValue {
                    id: id.clone(),
                    kind,
                    opts: map,
                });
            }
            ScoreItem::Track {
                name,
                role,
                sound,
                body,
                pos,
            } => {
                let role = TrackRole::parse(role).ok_or_else(|| {
                    ev.type_error(
                        *pos,
                        format!(
                            "unknown track role '{}'; expected Instrument, Drums, Vocal or Automation",
                            role
                        ),
                    )
                })?;
                let mut placements = Vec::new();
                let mut mix = None;
                for stmt in body {
                    match stmt {
                        TrackStmt::Place { at, clip, pos } => {
                            let at_value = ev.eval_expr(at, scope)?;
                            let at = expect_pos(ev, &at_value, *pos, "place position")?;
                            let clip_value = ev.eval_expr(clip, scope)?;
                            let clip = match &clip_value {
                                Value::Clip(c) => (**c).clone(),
                                other => {
                                    return Err(ev.type_error(
                                        *pos,
                                        format!(
                                            "place expects a clip, got {}",
                                            other.type_name()
                                        ),
                                    ))
                                }
                            };
                            placements.push(Placement { at, clip });
                        }
                        TrackStmt::Mix { entries, pos } => {
                            let mut value = Mix::default();
                            for (key, value_expr) in entries {
                                let entry = ev.eval_expr(value_expr, scope)?;
                                match key.as_str() {
                                    "gain" => {
                                        value.gain =
                                            Some(expect_number(ev, &entry, *pos, "gain")?)
                                    }
                                    "pan" => {
                                        value.pan = Some(expect_number(ev, &entry, *pos, "pan")?)
                                    }
                                    other => {
                                        return Err(ev.type_error(
                                            *pos,
                                            format!(
                                                "unknown mix option '{}' (available: gain, pan)",
                                                other
                                            ),
                                        ))
                                    }
                                }
                            }
                            mix = Some(value);
                        }
                    }
                }
                score.tracks.push(TrackValue {
                    name: name.clone(),
                    role,
                    sound: sound.clone(),
                    placements,
                    mix,
                });
            }
            ScoreItem::Marker {
                at,
                kind,
                label,
                pos,
            } => {
                let at_value = ev.eval_expr(at, scope)?;
                let at = expect_pos(ev, &at_value, *pos, "marker position")?;
                let kind_value = ev.eval_expr(kind, scope)?;
                let kind = expect_str(ev, &kind_value, *pos, "marker kind")?;
                let label_value = ev.eval_expr(label, scope)?;
                let label = expect_str(ev, &label_value, *pos, "marker label")?;
                score.markers.push(MarkerEvent {
                    pos: at,
                    kind,
                    label,
                });
            }
        }
    }

    Ok(score)
}
