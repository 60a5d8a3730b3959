//! # IR Normalizer
//!
//! Turns the evaluator's symbolic [`ScoreValue`] into the canonical
//! [`ScoreIr`]:
//!
//! 1. **Position resolution** - symbolic `bar:beat` starts inside clips are
//!    converted to rational whole-note offsets against the meter map;
//!    unresolvable positions are preserved with a warning. Score-level
//!    anchors (placements, tempo/meter entries, markers) keep their authored
//!    form so downstream tools can round-trip them.
//! 2. **Event sorting** - within each clip, events sort by
//!    `(start, insertion index)`; the stable sort makes output order
//!    deterministic.
//! 3. **Validation** - negative durations, out-of-range pitches and unknown
//!    sound ids are errors; role/kind mismatches, extreme tempos and
//!    out-of-vocal-range notes are warnings.
//!
//! No deduplication or merging happens here; the pass is pure
//! restructuring.

use crate::error::{Diagnostic, TakoError};
use crate::ir::*;
use crate::pos::Pos;
use crate::rat::Rat;
use crate::value::{ClipValue, Event, MeterEvent, ScoreValue, TrackRole, TrackValue};
use log::debug;

/// Tempo entries above this BPM draw a warning. The legacy checker used the
/// same threshold.
pub const TEMPO_WARN_BPM: f64 = 128.0;

/// Comfortable vocal range (MIDI): roughly C2 to C6.
pub const VOCAL_RANGE: (i32, i32) = (36, 84);

/// A resolved span of the meter map starting at a bar boundary.
struct MeterSeg {
    start_bar: u32,
    start_offset: Rat,
    numerator: u32,
    denominator: u32,
}

impl MeterSeg {
    fn bar_len(&self) -> Rat {
        Rat::new(self.numerator as i64, self.denominator as i64).unwrap_or(Rat::ONE)
    }

    fn beat_len(&self) -> Rat {
        Rat::new(1, self.denominator as i64).unwrap_or(Rat::ONE)
    }
}

/// Normalize an evaluated score into the IR. `file` names the entry module
/// in validation errors.
pub fn normalize(
    score: &ScoreValue,
    file: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<ScoreIr, TakoError> {
    let segs = build_meter_table(&score.meter_map, diagnostics);

    let mut tempo_map = Vec::with_capacity(score.tempo_map.len());
    for tempo in &score.tempo_map {
        if tempo.bpm <= 0.0 {
            return Err(validation_error(
                file,
                format!("tempo must be positive, got {}", tempo.bpm),
            ));
        }
        if tempo.unit.is_negative() || tempo.unit.is_zero() {
            return Err(validation_error(
                file,
                format!("tempo unit must be positive, got {}", tempo.unit),
            ));
        }
        if tempo.bpm > TEMPO_WARN_BPM {
            diagnostics.push(Diagnostic::warning(
                "tempo-range",
                format!(
                    "tempo {} bpm exceeds {} bpm; double-check the unit",
                    tempo.bpm, TEMPO_WARN_BPM
                ),
                None,
            ));
        }
        tempo_map.push(TempoIr {
            at: tempo.at,
            bpm: tempo.bpm,
            unit: tempo.unit,
        });
    }

    let meter_map = score
        .meter_map
        .iter()
        .map(|m| MeterIr {
            at: m.at,
            numerator: m.numerator,
            denominator: m.denominator,
        })
        .collect();

    let sounds = score
        .sounds
        .iter()
        .map(|s| SoundIr {
            id: s.id.clone(),
            kind: s.kind.as_str().to_string(),
            ext: object_to_json(&s.opts),
        })
        .collect();

    let mut tracks = Vec::with_capacity(score.tracks.len());
    for track in &score.tracks {
        tracks.push(normalize_track(track, score, &segs, file, diagnostics)?);
    }

    let markers = score
        .markers
        .iter()
        .map(|m| MarkerIr::new(m.pos, m.kind.clone(), m.label.clone()))
        .collect();

    debug!(
        "normalized score: {} track(s), {} sound(s)",
        score.tracks.len(),
        score.sounds.len()
    );

    Ok(ScoreIr {
        tako: IrHeader::current(),
        meta: MetaIr {
            title: score.meta.title.clone(),
            artist: score.meta.artist.clone(),
            album: score.meta.album.clone(),
            copyright: score.meta.copyright.clone(),
            ext: object_to_json(&score.meta.ext),
        },
        tempo_map,
        meter_map,
        sounds,
        tracks,
        markers,
    })
}

fn validation_error(file: &str, message: String) -> TakoError {
    TakoError::Type {
        file: file.to_string(),
        line: 0,
        column: 0,
        message,
    }
}

fn normalize_track(
    track: &TrackValue,
    score: &ScoreValue,
    segs: &[MeterSeg],
    file: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<TrackIr, TakoError> {
    let sound = score.sound(&track.sound).ok_or_else(|| {
        validation_error(
            file,
            format!(
                "track \"{}\" references unknown sound id \"{}\"",
                track.name, track.sound
            ),
        )
    })?;
    if sound.kind != track.role.expected_kind() {
        diagnostics.push(Diagnostic::warning(
            "role-sound-mismatch",
            format!(
                "track \"{}\" has role {} but sound \"{}\" is kind {}",
                track.name,
                track.role.as_str(),
                sound.id,
                sound.kind.as_str()
            ),
            None,
        ));
    }

    let mut placements = Vec::with_capacity(track.placements.len());
    for placement in &track.placements {
        placements.push(PlacementIr {
            at: placement.at,
            clip: normalize_clip(
                &placement.clip,
                track.name.as_str(),
                track.role,
                segs,
                file,
                diagnostics,
            )?,
        });
    }

    Ok(TrackIr {
        name: track.name.clone(),
        role: track.role.as_str().to_string(),
        sound: track.sound.clone(),
        placements,
        mix: track.mix.map(|m| MixIr {
            gain: m.gain,
            pan: m.pan,
        }),
    })
}

fn normalize_clip(
    clip: &ClipValue,
    track_name: &str,
    role: TrackRole,
    segs: &[MeterSeg],
    file: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<ClipIr, TakoError> {
    // resolve, validate, then stable-sort on (start, insertion index)
    let mut resolved: Vec<(Event, Pos)> = Vec::with_capacity(clip.events.len());
    for event in &clip.events {
        if let Some(dur) = event.dur() {
            if dur.is_negative() {
                return Err(validation_error(
                    file,
                    format!(
                        "negative event duration {} in track \"{}\"",
                        dur, track_name
                    ),
                ));
            }
        }
        check_pitches(event, track_name, role, file, diagnostics)?;

        let event = resolve_event(event, segs, diagnostics);
        let start = event.start();
        resolved.push((event, start));
    }
    resolved.sort_by(|(_, a), (_, b)| a.sort_key().cmp(&b.sort_key()));

    let events = resolved
        .iter()
        .map(|(event, _)| event_ir(event))
        .collect();
    Ok(ClipIr { events })
}

fn check_pitches(
    event: &Event,
    track_name: &str,
    role: TrackRole,
    file: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), TakoError> {
    let pitches: Vec<crate::pitch::Pitch> = match event {
        Event::Note { pitch, .. } => vec![*pitch],
        Event::Chord { pitches, .. } => pitches.clone(),
        _ => return Ok(()),
    };
    for pitch in pitches {
        if !pitch.in_midi_range() {
            return Err(validation_error(
                file,
                format!(
                    "pitch {} (midi {}) in track \"{}\" is outside the MIDI range 0-127",
                    pitch.name(),
                    pitch.midi,
                    track_name
                ),
            ));
        }
        if role == TrackRole::Vocal && (pitch.midi < VOCAL_RANGE.0 || pitch.midi > VOCAL_RANGE.1) {
            diagnostics.push(Diagnostic::warning(
                "vocal-range",
                format!(
                    "pitch {} in vocal track \"{}\" is outside the comfortable vocal range",
                    pitch.name(),
                    track_name
                ),
                None,
            ));
        }
    }
    Ok(())
}

fn resolve_event(event: &Event, segs: &[MeterSeg], diagnostics: &mut Vec<Diagnostic>) -> Event {
    let mut event = event.clone();
    match &mut event {
        Event::Note { start, .. }
        | Event::Chord { start, .. }
        | Event::DrumHit { start, .. }
        | Event::Breath { start, .. }
        | Event::Control { start, .. } => *start = resolve_pos(*start, segs, diagnostics),
        Event::Automation { start, end, .. } => {
            *start = resolve_pos(*start, segs, diagnostics);
            *end = resolve_pos(*end, segs, diagnostics);
        }
        Event::Marker { pos, .. } => *pos = resolve_pos(*pos, segs, diagnostics),
    }
    event
}

fn event_ir(event: &Event) -> EventIr {
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
        } => EventIr::Note {
            start: *start,
            dur: *dur,
            pitch: *pitch,
            velocity: *velocity,
            voice: *voice,
            techniques: techniques.clone(),
            lyric: lyric.as_ref().map(LyricIr::from),
            ext: object_to_json(ext),
        },
        Event::Chord {
            start,
            dur,
            pitches,
            velocity,
            ext,
        } => EventIr::Chord {
            start: *start,
            dur: *dur,
            pitches: pitches.clone(),
            velocity: *velocity,
            ext: object_to_json(ext),
        },
        Event::DrumHit {
            start,
            dur,
            key,
            velocity,
            ext,
        } => EventIr::DrumHit {
            start: *start,
            dur: *dur,
            key: key.clone(),
            velocity: *velocity,
            ext: object_to_json(ext),
        },
        Event::Breath {
            start,
            dur,
            intensity,
        } => EventIr::Breath {
            start: *start,
            dur: *dur,
            intensity: *intensity,
        },
        Event::Control { start, kind, data } => EventIr::Control {
            start: *start,
            kind: kind.clone(),
            data: value_to_json(data),
        },
        Event::Automation {
            param,
            start,
            end,
            curve,
        } => EventIr::Automation {
            param: param.clone(),
            start: *start,
            end: *end,
            curve: curve_points(curve),
        },
        Event::Marker { pos, kind, label } => EventIr::Marker {
            pos: *pos,
            kind: kind.clone(),
            label: label.clone(),
        },
    }
}

// ---------------------------------------------------------------------------
// Meter resolution

/// Build resolved meter segments. Entries must be anchored at bar starts in
/// increasing order, with the first at bar 1; entries that are not draw a
/// warning and are skipped for resolution purposes.
fn build_meter_table(meter_map: &[MeterEvent], diagnostics: &mut Vec<Diagnostic>) -> Vec<MeterSeg> {
    let mut segs: Vec<MeterSeg> = Vec::new();
    for meter in meter_map {
        if meter.numerator == 0 || meter.denominator == 0 {
            diagnostics.push(Diagnostic::warning(
                "meter-signature",
                format!(
                    "ignoring degenerate meter {}/{}",
                    meter.numerator, meter.denominator
                ),
                None,
            ));
            continue;
        }
        let bar = match meter.at {
            Pos::Ref { bar, beat } => {
                if beat != 1 {
                    diagnostics.push(Diagnostic::warning(
                        "meter-anchor",
                        format!("meter change at {}:{} snapped to start of bar {}", bar, beat, bar),
                        None,
                    ));
                }
                bar
            }
            Pos::Expr { bar, beat, offset } => {
                if beat != 1 || !offset.is_zero() {
                    diagnostics.push(Diagnostic::warning(
                        "meter-anchor",
                        format!("meter change snapped to start of bar {}", bar),
                        None,
                    ));
                }
                bar
            }
            Pos::Rat(offset) => {
                if offset.is_zero() {
                    1
                } else {
                    match offset_to_bar(&segs, offset) {
                        Some(bar) => bar,
                        None => {
                            diagnostics.push(Diagnostic::warning(
                                "meter-anchor",
                                format!(
                                    "meter change at offset {} is not on a bar boundary; ignored",
                                    offset
                                ),
                                None,
                            ));
                            continue;
                        }
                    }
                }
            }
        };

        if segs.is_empty() && bar != 1 {
            diagnostics.push(Diagnostic::warning(
                "meter-coverage",
                format!(
                    "first meter change is at bar {}, not bar 1; positions before it stay symbolic",
                    bar
                ),
                None,
            ));
        }
        if let Some(last) = segs.last() {
            if bar <= last.start_bar {
                diagnostics.push(Diagnostic::warning(
                    "meter-order",
                    format!("meter change at bar {} is out of order; ignored", bar),
                    None,
                ));
                continue;
            }
        }
        let start_offset = match segs.last() {
            Some(_) => match offset_of_bar(&segs, bar) {
                Some(offset) => offset,
                None => continue,
            },
            None => {
                if bar != 1 {
                    // cannot know the absolute offset of a later bar
                    continue;
                }
                Rat::ZERO
            }
        };
        segs.push(MeterSeg {
            start_bar: bar,
            start_offset,
            numerator: meter.numerator,
            denominator: meter.denominator,
        });
    }
    segs
}

fn seg_for_bar(segs: &[MeterSeg], bar: u32) -> Option<&MeterSeg> {
    segs.iter().rev().find(|seg| seg.start_bar <= bar)
}

fn offset_of_bar(segs: &[MeterSeg], bar: u32) -> Option<Rat> {
    let seg = seg_for_bar(segs, bar)?;
    Some(seg.start_offset + seg.bar_len() * Rat::int((bar - seg.start_bar) as i64))
}

fn resolve_ref(segs: &[MeterSeg], bar: u32, beat: u32) -> Option<Rat> {
    let seg = seg_for_bar(segs, bar)?;
    Some(
        seg.start_offset
            + seg.bar_len() * Rat::int((bar - seg.start_bar) as i64)
            + seg.beat_len() * Rat::int((beat - 1) as i64),
    )
}

/// Map a rational offset back to a bar number when it lands exactly on a
/// bar boundary.
fn offset_to_bar(segs: &[MeterSeg], offset: Rat) -> Option<u32> {
    let mut bar = 1u32;
    let mut cursor = Rat::ZERO;
    if segs.is_empty() {
        return None;
    }
    // walk bars until the offset is reached or passed
    let mut guard = 0u32;
    while cursor < offset && guard < 100_000 {
        let seg = seg_for_bar(segs, bar)?;
        cursor = cursor + seg.bar_len();
        bar += 1;
        guard += 1;
    }
    if cursor == offset {
        Some(bar)
    } else {
        None
    }
}

fn resolve_pos(pos: Pos, segs: &[MeterSeg], diagnostics: &mut Vec<Diagnostic>) -> Pos {
    match pos {
        Pos::Rat(_) => pos,
        Pos::Ref { bar, beat } => match resolve_ref(segs, bar, beat) {
            Some(offset) => Pos::Rat(offset),
            None => {
                diagnostics.push(unresolved_warning(pos));
                pos
            }
        },
        Pos::Expr { bar, beat, offset } => match resolve_ref(segs, bar, beat) {
            Some(base) => Pos::Rat(base + offset),
            None => {
                diagnostics.push(unresolved_warning(pos));
                pos
            }
        },
    }
}

fn unresolved_warning(pos: Pos) -> Diagnostic {
    Diagnostic::warning(
        "unresolved-position",
        format!(
            "position {} cannot be resolved without a covering meter map; kept symbolic",
            pos
        ),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{MetaValue, SoundKind, SoundValue, TempoEvent};

    fn rat(n: i64, d: i64) -> Rat {
        Rat::new(n, d).unwrap()
    }

    fn meters(entries: &[(u32, u32, u32)]) -> Vec<MeterEvent> {
        entries
            .iter()
            .map(|(bar, num, den)| MeterEvent {
                at: Pos::Ref { bar: *bar, beat: 1 },
                numerator: *num,
                denominator: *den,
            })
            .collect()
    }

    #[test]
    fn test_resolve_in_four_four() {
        let mut diags = Vec::new();
        let segs = build_meter_table(&meters(&[(1, 4, 4)]), &mut diags);
        assert!(diags.is_empty());
        assert_eq!(resolve_ref(&segs, 1, 1), Some(Rat::ZERO));
        assert_eq!(resolve_ref(&segs, 1, 3), Some(rat(1, 2)));
        assert_eq!(resolve_ref(&segs, 3, 1), Some(rat(2, 1)));
    }

    #[test]
    fn test_resolve_across_meter_change() {
        let mut diags = Vec::new();
        // 4/4 for two bars, then 3/4
        let segs = build_meter_table(&meters(&[(1, 4, 4), (3, 3, 4)]), &mut diags);
        assert_eq!(resolve_ref(&segs, 3, 1), Some(rat(2, 1)));
        assert_eq!(resolve_ref(&segs, 4, 1), Some(rat(11, 4)));
        assert_eq!(resolve_ref(&segs, 4, 2), Some(rat(3, 1)));
    }

    #[test]
    fn test_empty_meter_map_keeps_symbolic() {
        let mut diags = Vec::new();
        let segs = build_meter_table(&[], &mut diags);
        let resolved = resolve_pos(Pos::Ref { bar: 2, beat: 1 }, &segs, &mut diags);
        assert_eq!(resolved, Pos::Ref { bar: 2, beat: 1 });
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code.as_deref(), Some("unresolved-position"));
    }

    #[test]
    fn test_out_of_order_meter_ignored() {
        let mut diags = Vec::new();
        let segs = build_meter_table(&meters(&[(1, 4, 4), (1, 3, 4)]), &mut diags);
        assert_eq!(segs.len(), 1);
        assert!(diags.iter().any(|d| d.code.as_deref() == Some("meter-order")));
    }

    #[test]
    fn test_unknown_sound_id_errors() {
        let score = ScoreValue {
            meta: MetaValue::default(),
            tempo_map: vec![],
            meter_map: vec![],
            sounds: vec![],
            tracks: vec![TrackValue {
                name: "T".to_string(),
                role: TrackRole::Instrument,
                sound: "missing".to_string(),
                placements: vec![],
                mix: None,
            }],
            markers: vec![],
        };
        let mut diags = Vec::new();
        let err = normalize(&score, "test.mf", &mut diags).unwrap_err();
        assert!(err.to_string().contains("unknown sound id"));
    }

    #[test]
    fn test_role_kind_mismatch_warns() {
        let score = ScoreValue {
            meta: MetaValue::default(),
            tempo_map: vec![],
            meter_map: vec![],
            sounds: vec![SoundValue {
                id: "kit".to_string(),
                kind: SoundKind::DrumKit,
                opts: Default::default(),
            }],
            tracks: vec![TrackValue {
                name: "lead".to_string(),
                role: TrackRole::Instrument,
                sound: "kit".to_string(),
                placements: vec![],
                mix: None,
            }],
            markers: vec![],
        };
        let mut diags = Vec::new();
        let ir = normalize(&score, "test.mf", &mut diags).unwrap();
        assert_eq!(ir.tracks.len(), 1);
        assert!(diags
            .iter()
            .any(|d| d.code.as_deref() == Some("role-sound-mismatch")));
    }

    #[test]
    fn test_high_tempo_warns() {
        let score = ScoreValue {
            tempo_map: vec![TempoEvent {
                at: Pos::Ref { bar: 1, beat: 1 },
                bpm: 200.0,
                unit: rat(1, 4),
            }],
            ..Default::default()
        };
        let mut diags = Vec::new();
        normalize(&score, "test.mf", &mut diags).unwrap();
        assert!(diags.iter().any(|d| d.code.as_deref() == Some("tempo-range")));
    }
}
