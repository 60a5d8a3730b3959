//! # Theory Helpers
//!
//! Chord and scale construction from interval tables, plus pitch-class
//! utilities. Chord qualities and scale names are looked up by string so
//! user code can pass them through data.

use super::ArgView;
use crate::error::TakoError;
use crate::eval::{CallArgs, Evaluator};
use crate::value::Value;

const TRIADS: &[(&str, &[i32])] = &[
    ("maj", &[0, 4, 7]),
    ("min", &[0, 3, 7]),
    ("dim", &[0, 3, 6]),
    ("aug", &[0, 4, 8]),
    ("sus2", &[0, 2, 7]),
    ("sus4", &[0, 5, 7]),
];

const SEVENTHS: &[(&str, &[i32])] = &[
    ("maj7", &[0, 4, 7, 11]),
    ("min7", &[0, 3, 7, 10]),
    ("dom7", &[0, 4, 7, 10]),
    ("dim7", &[0, 3, 6, 9]),
    ("m7b5", &[0, 3, 6, 10]),
    ("minMaj7", &[0, 3, 7, 11]),
];

const SCALES: &[(&str, &[i32])] = &[
    ("major", &[0, 2, 4, 5, 7, 9, 11]),
    ("minor", &[0, 2, 3, 5, 7, 8, 10]),
    ("harmonicMinor", &[0, 2, 3, 5, 7, 8, 11]),
    ("melodicMinor", &[0, 2, 3, 5, 7, 9, 11]),
    ("dorian", &[0, 2, 3, 5, 7, 9, 10]),
    ("phrygian", &[0, 1, 3, 5, 7, 8, 10]),
    ("lydian", &[0, 2, 4, 6, 7, 9, 11]),
    ("mixolydian", &[0, 2, 4, 5, 7, 9, 10]),
    ("locrian", &[0, 1, 3, 5, 6, 8, 10]),
    ("majorPentatonic", &[0, 2, 4, 7, 9]),
    ("minorPentatonic", &[0, 3, 5, 7, 10]),
    ("blues", &[0, 3, 5, 6, 7, 10]),
    ("chromatic", &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]),
];

fn lookup(
    ev: &Evaluator,
    args: &ArgView,
    table: &'static [(&'static str, &'static [i32])],
    name: &str,
    what: &str,
) -> Result<&'static [i32], TakoError> {
    for (key, intervals) in table {
        if *key == name {
            return Ok(intervals);
        }
    }
    let available: Vec<&str> = table.iter().map(|(k, _)| *k).collect();
    Err(args.err(
        ev,
        format!(
            "unknown {} '{}' (available: {})",
            what,
            name,
            available.join(", ")
        ),
    ))
}

fn spread(root: crate::pitch::Pitch, intervals: &[i32]) -> Value {
    Value::array(
        intervals
            .iter()
            .map(|step| Value::Pitch(root.transpose(*step)))
            .collect(),
    )
}

/// `triad(root, quality = "maj")` - three-note chord as a pitch array.
pub fn triad(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("triad", call);
    args.arity(ev, 1, 2)?;
    let root = args.pitch(ev, 0)?;
    let quality = match args.get(1) {
        Some(Value::Str(s)) => s.clone(),
        Some(other) => {
            return Err(args.err(
                ev,
                format!("quality must be a string, got {}", other.type_name()),
            ))
        }
        None => "maj".to_string(),
    };
    let intervals = lookup(ev, &args, TRIADS, &quality, "triad quality")?;
    Ok(spread(root, intervals))
}

/// `seventh(root, quality = "maj7")` - four-note chord as a pitch array.
pub fn seventh(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("seventh", call);
    args.arity(ev, 1, 2)?;
    let root = args.pitch(ev, 0)?;
    let quality = match args.get(1) {
        Some(Value::Str(s)) => s.clone(),
        Some(other) => {
            return Err(args.err(
                ev,
                format!("quality must be a string, got {}", other.type_name()),
            ))
        }
        None => "maj7".to_string(),
    };
    let intervals = lookup(ev, &args, SEVENTHS, &quality, "seventh quality")?;
    Ok(spread(root, intervals))
}

/// `scale(root, name = "major")` - one octave of a scale as a pitch array.
pub fn scale(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("scale", call);
    args.arity(ev, 1, 2)?;
    let root = args.pitch(ev, 0)?;
    let name = match args.get(1) {
        Some(Value::Str(s)) => s.clone(),
        Some(other) => {
            return Err(args.err(
                ev,
                format!("scale name must be a string, got {}", other.type_name()),
            ))
        }
        None => "major".to_string(),
    };
    let intervals = lookup(ev, &args, SCALES, &name, "scale")?;
    Ok(spread(root, intervals))
}

/// `degree(scalePitches, n)` - 1-based scale degree with octave wrap, so
/// `degree(scale(C4), 8)` is `C5`.
pub fn degree(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("degree", call);
    args.arity(ev, 2, 2)?;
    let pitches = args.array(ev, 0)?;
    let n = args.int(ev, 1)?;
    if pitches.is_empty() {
        return Err(args.err(ev, "scale array is empty"));
    }
    if n < 1 {
        return Err(args.err(ev, "scale degrees start at 1"));
    }
    let len = pitches.len() as i64;
    let index = (n - 1) % len;
    let octaves = (n - 1) / len;
    match &pitches[index as usize] {
        Value::Pitch(p) => Ok(Value::Pitch(p.transpose((octaves * 12) as i32))),
        other => Err(args.err(
            ev,
            format!(
                "scale array must contain pitches, found {}",
                other.type_name()
            ),
        )),
    }
}

/// `pitchClass(p)` - pitch class 0-11 with C = 0.
pub fn pitch_class(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("pitchClass", call);
    args.arity(ev, 1, 1)?;
    let p = args.pitch(ev, 0)?;
    Ok(Value::Num(p.pitch_class() as f64))
}

/// `noteName(p)` - canonical spelling like "C#4".
pub fn note_name(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("noteName", call);
    args.arity(ev, 1, 1)?;
    let p = args.pitch(ev, 0)?;
    Ok(Value::Str(p.name()))
}

/// `interval(a, b)` - signed semitone distance from `a` up to `b`.
pub fn interval(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("interval", call);
    args.arity(ev, 2, 2)?;
    let a = args.pitch(ev, 0)?;
    let b = args.pitch(ev, 1)?;
    Ok(Value::Num((b.midi - a.midi) as f64))
}
