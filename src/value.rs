//! # Runtime Values
//!
//! The evaluator's tagged value type and the symbolic clip/score structures
//! it builds. Arrays and objects are shared (`Rc<RefCell<...>>`) so that
//! bindings alias the same storage, matching the language's mutable
//! collection semantics. Clips, scores, curves and functions are immutable
//! once built and shared by plain `Rc`.
//!
//! Object maps preserve insertion order; the IR normalizer depends on this
//! for deterministic output.

use crate::ast::Block;
use crate::error::TakoError;
use crate::pitch::Pitch;
use crate::pos::Pos;
use crate::rat::Rat;
use crate::scope::Scope;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Rat(Rat),
    Pitch(Pitch),
    Pos(Pos),
    Range {
        start: Box<Value>,
        end: Box<Value>,
        inclusive: bool,
    },
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<ObjectMap>>),
    Func(Rc<FuncValue>),
    Clip(Rc<ClipValue>),
    Score(Rc<ScoreValue>),
    Curve(Rc<CurveValue>),
    Lyric(Rc<LyricValue>),
    Rng(Rc<RefCell<RngState>>),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(map: ObjectMap) -> Value {
        Value::Object(Rc::new(RefCell::new(map)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Rat(_) => "rat",
            Value::Pitch(_) => "pitch",
            Value::Pos(_) => "pos",
            Value::Range { .. } => "range",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Func(_) => "function",
            Value::Clip(_) => "clip",
            Value::Score(_) => "score",
            Value::Curve(_) => "curve",
            Value::Lyric(_) => "lyric",
            Value::Rng(_) => "rng",
        }
    }

    /// Truthiness: `false`, `null`, `0` and `""` are falsy, everything else
    /// is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// An integral number, when the value is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Num(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Some(*n as i64),
            _ => None,
        }
    }
}

/// Structural equality, deep for containers. Functions, rng state and the
/// big symbolic structures compare by identity.
pub fn deep_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Num(x), Value::Num(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Rat(x), Value::Rat(y)) => x == y,
        (Value::Pitch(x), Value::Pitch(y)) => x == y,
        (Value::Pos(x), Value::Pos(y)) => x == y,
        (
            Value::Range {
                start: s1,
                end: e1,
                inclusive: i1,
            },
            Value::Range {
                start: s2,
                end: e2,
                inclusive: i2,
            },
        ) => i1 == i2 && deep_eq(s1, s2) && deep_eq(e1, e2),
        (Value::Array(x), Value::Array(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| deep_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map_or(false, |w| deep_eq(v, w)))
        }
        (Value::Func(x), Value::Func(y)) => Rc::ptr_eq(x, y),
        (Value::Clip(x), Value::Clip(y)) => Rc::ptr_eq(x, y),
        (Value::Score(x), Value::Score(y)) => Rc::ptr_eq(x, y),
        (Value::Curve(x), Value::Curve(y)) => Rc::ptr_eq(x, y),
        (Value::Lyric(x), Value::Lyric(y)) => {
            x.text == y.text && x.hyphen == y.hyphen && x.extend == y.extend
        }
        (Value::Rng(x), Value::Rng(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// Human-readable rendering used by `str()`, `print()` and error messages.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Num(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Value::Str(s) => s.clone(),
        Value::Rat(r) => r.to_string(),
        Value::Pitch(p) => p.to_string(),
        Value::Pos(p) => p.to_string(),
        Value::Range {
            start,
            end,
            inclusive,
        } => format!(
            "{}{}{}",
            format_value(start),
            if *inclusive { "..=" } else { ".." },
            format_value(end)
        ),
        Value::Array(items) => {
            let items = items.borrow();
            let parts: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let map = map.borrow();
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        Value::Func(f) => format!("fn {}", f.name()),
        Value::Clip(c) => format!("clip({} events)", c.events.len()),
        Value::Score(s) => format!("score({} tracks)", s.tracks.len()),
        Value::Curve(c) => format!("curve({} points)", c.points.len()),
        Value::Lyric(l) => l.text.clone(),
        Value::Rng(_) => "rng".to_string(),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_value(self))
    }
}

/// Insertion-ordered string map. Lookup is linear; maps in practice stay
/// small (option bags, metadata, exports).
#[derive(Clone, Debug, Default)]
pub struct ObjectMap {
    entries: Vec<(String, Value)>,
}

impl ObjectMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        for entry in &mut self.entries {
            if entry.0 == key {
                entry.1 = value;
                return;
            }
        }
        self.entries.push((key, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

/// Native function signature. Natives receive the evaluator so intrinsics
/// like `mapEvents` can call back into user functions.
pub type NativeFn =
    fn(&mut crate::eval::Evaluator<'_>, &crate::eval::CallArgs) -> Result<Value, TakoError>;

/// A callable: user-defined with a captured scope, or a native intrinsic.
pub enum FuncValue {
    User {
        name: String,
        params: Vec<String>,
        body: Rc<Block>,
        closure: Rc<Scope>,
        /// Source file of the definition, for error positions.
        file: String,
    },
    Native {
        name: &'static str,
        f: NativeFn,
    },
}

impl FuncValue {
    pub fn name(&self) -> &str {
        match self {
            FuncValue::User { name, .. } => name,
            FuncValue::Native { name, .. } => name,
        }
    }
}

impl fmt::Debug for FuncValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}", self.name())
    }
}

/// A lyric syllable. `hyphen` marks a syllable continued by the next one;
/// `extend` marks a melisma continuation.
#[derive(Clone, Debug, PartialEq)]
pub struct LyricValue {
    pub text: String,
    pub hyphen: bool,
    pub extend: bool,
}

impl LyricValue {
    pub fn word(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hyphen: false,
            extend: false,
        }
    }
}

/// Piecewise-linear automation curve: `(position, value)` points in whole
/// notes relative to the automation start.
#[derive(Clone, Debug, PartialEq)]
pub struct CurveValue {
    pub points: Vec<(Rat, f64)>,
}

/// Deterministic seeded PRNG (splitmix64). Hand-rolled so that identical
/// seeds produce identical scores on every platform.
#[derive(Clone, Debug)]
pub struct RngState {
    state: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[lo, hi]`.
    pub fn int_in(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo + 1) as u64;
        lo + (self.next_u64() % span) as i64
    }
}

// ---------------------------------------------------------------------------
// Clip structures

/// An ordered sequence of events with local timeline positions.
#[derive(Clone, Debug, Default)]
pub struct ClipValue {
    pub events: Vec<Event>,
    /// Explicit length set by `padTo`; composition helpers use the larger
    /// of this and the computed event extent.
    pub explicit_len: Option<Rat>,
}

impl ClipValue {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            explicit_len: None,
        }
    }

    /// Total length: the largest event end (or the explicit padding length,
    /// if larger), when every contributing event has a resolvable
    /// (rational) start. Symbolic starts make the length indeterminate.
    pub fn length(&self) -> Option<Rat> {
        let mut max = self.explicit_len.unwrap_or(Rat::ZERO);
        for event in &self.events {
            let start = event.start().as_rat()?;
            let end = match event.dur() {
                Some(d) => start + d,
                None => start,
            };
            if end > max {
                max = end;
            }
        }
        Some(max)
    }
}

/// Clip event variants. Insertion order is preserved through evaluation and
/// used as the sort tie-breaker in the IR.
#[derive(Clone, Debug)]
pub enum Event {
    Note {
        start: Pos,
        dur: Rat,
        pitch: Pitch,
        velocity: Option<f64>,
        voice: Option<i64>,
        techniques: Vec<String>,
        lyric: Option<LyricValue>,
        ext: ObjectMap,
    },
    Chord {
        start: Pos,
        dur: Rat,
        pitches: Vec<Pitch>,
        velocity: Option<f64>,
        ext: ObjectMap,
    },
    DrumHit {
        start: Pos,
        dur: Rat,
        key: String,
        velocity: Option<f64>,
        ext: ObjectMap,
    },
    Breath {
        start: Pos,
        dur: Rat,
        intensity: Option<f64>,
    },
    Control {
        start: Pos,
        kind: String,
        data: Value,
    },
    Automation {
        param: String,
        start: Pos,
        end: Pos,
        curve: CurveValue,
    },
    Marker {
        pos: Pos,
        kind: String,
        label: String,
    },
}

impl Event {
    pub fn start(&self) -> Pos {
        match self {
            Event::Note { start, .. }
            | Event::Chord { start, .. }
            | Event::DrumHit { start, .. }
            | Event::Breath { start, .. }
            | Event::Control { start, .. }
            | Event::Automation { start, .. } => *start,
            Event::Marker { pos, .. } => *pos,
        }
    }

    pub fn dur(&self) -> Option<Rat> {
        match self {
            Event::Note { dur, .. }
            | Event::Chord { dur, .. }
            | Event::DrumHit { dur, .. }
            | Event::Breath { dur, .. } => Some(*dur),
            Event::Automation { start, end, .. } => end.minus(*start),
            Event::Control { .. } | Event::Marker { .. } => None,
        }
    }

    /// Shift every position field by a rational delta.
    pub fn shifted(&self, delta: Rat) -> Event {
        let mut event = self.clone();
        match &mut event {
            Event::Note { start, .. }
            | Event::Chord { start, .. }
            | Event::DrumHit { start, .. }
            | Event::Breath { start, .. }
            | Event::Control { start, .. } => *start = start.shift(delta),
            Event::Automation { start, end, .. } => {
                *start = start.shift(delta);
                *end = end.shift(delta);
            }
            Event::Marker { pos, .. } => *pos = pos.shift(delta),
        }
        event
    }
}

// ---------------------------------------------------------------------------
// Score structures

/// Sound kinds accepted by `sound ... kind <kind>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoundKind {
    Instrument,
    DrumKit,
    Vocal,
    Fx,
}

impl SoundKind {
    pub fn parse(name: &str) -> Option<SoundKind> {
        match name {
            "instrument" => Some(SoundKind::Instrument),
            "drumKit" => Some(SoundKind::DrumKit),
            "vocal" => Some(SoundKind::Vocal),
            "fx" => Some(SoundKind::Fx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SoundKind::Instrument => "instrument",
            SoundKind::DrumKit => "drumKit",
            SoundKind::Vocal => "vocal",
            SoundKind::Fx => "fx",
        }
    }
}

/// Track roles accepted by `track ... role <Role>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackRole {
    Instrument,
    Drums,
    Vocal,
    Automation,
}

impl TrackRole {
    pub fn parse(name: &str) -> Option<TrackRole> {
        match name {
            "Instrument" => Some(TrackRole::Instrument),
            "Drums" => Some(TrackRole::Drums),
            "Vocal" => Some(TrackRole::Vocal),
            "Automation" => Some(TrackRole::Automation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackRole::Instrument => "Instrument",
            TrackRole::Drums => "Drums",
            TrackRole::Vocal => "Vocal",
            TrackRole::Automation => "Automation",
        }
    }

    /// The sound kind this role normally pairs with.
    pub fn expected_kind(&self) -> SoundKind {
        match self {
            TrackRole::Instrument => SoundKind::Instrument,
            TrackRole::Drums => SoundKind::DrumKit,
            TrackRole::Vocal => SoundKind::Vocal,
            TrackRole::Automation => SoundKind::Fx,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MetaValue {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub copyright: Option<String>,
    pub ext: ObjectMap,
}

#[derive(Clone, Debug)]
pub struct TempoEvent {
    pub at: Pos,
    pub bpm: f64,
    /// Note value carrying the beat, e.g. 1/4 for "quarter = bpm".
    pub unit: Rat,
}

#[derive(Clone, Debug)]
pub struct MeterEvent {
    pub at: Pos,
    pub numerator: u32,
    pub denominator: u32,
}

#[derive(Clone, Debug)]
pub struct SoundValue {
    pub id: String,
    pub kind: SoundKind,
    pub opts: ObjectMap,
}

#[derive(Clone, Debug)]
pub struct Placement {
    pub at: Pos,
    pub clip: ClipValue,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Mix {
    pub gain: Option<f64>,
    pub pan: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct TrackValue {
    pub name: String,
    pub role: TrackRole,
    pub sound: String,
    pub placements: Vec<Placement>,
    pub mix: Option<Mix>,
}

#[derive(Clone, Debug)]
pub struct MarkerEvent {
    pub pos: Pos,
    pub kind: String,
    pub label: String,
}

/// The evaluator's symbolic score, consumed by the IR normalizer.
#[derive(Clone, Debug, Default)]
pub struct ScoreValue {
    pub meta: MetaValue,
    pub tempo_map: Vec<TempoEvent>,
    pub meter_map: Vec<MeterEvent>,
    pub sounds: Vec<SoundValue>,
    pub tracks: Vec<TrackValue>,
    pub markers: Vec<MarkerEvent>,
}

impl ScoreValue {
    pub fn sound(&self, id: &str) -> Option<&SoundValue> {
        self.sounds.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(!Value::Num(0.0).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::Num(0.5).truthy());
        assert!(Value::Str("x".to_string()).truthy());
        assert!(Value::array(vec![]).truthy());
    }

    #[test]
    fn test_deep_eq_arrays() {
        let a = Value::array(vec![Value::Num(1.0), Value::Str("x".to_string())]);
        let b = Value::array(vec![Value::Num(1.0), Value::Str("x".to_string())]);
        let c = Value::array(vec![Value::Num(2.0)]);
        assert!(deep_eq(&a, &b));
        assert!(!deep_eq(&a, &c));
    }

    #[test]
    fn test_deep_eq_objects_ignore_order() {
        let mut m1 = ObjectMap::new();
        m1.set("a", Value::Num(1.0));
        m1.set("b", Value::Num(2.0));
        let mut m2 = ObjectMap::new();
        m2.set("b", Value::Num(2.0));
        m2.set("a", Value::Num(1.0));
        assert!(deep_eq(&Value::object(m1), &Value::object(m2)));
    }

    #[test]
    fn test_object_map_order() {
        let mut m = ObjectMap::new();
        m.set("z", Value::Num(1.0));
        m.set("a", Value::Num(2.0));
        m.set("z", Value::Num(3.0));
        let keys: Vec<&str> = m.keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert!(matches!(m.get("z"), Some(Value::Num(n)) if *n == 3.0));
    }

    #[test]
    fn test_rng_determinism() {
        let mut a = RngState::new(42);
        let mut b = RngState::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        let f = a.next_f64();
        assert!((0.0..1.0).contains(&f));
        for _ in 0..64 {
            let n = a.int_in(3, 7);
            assert!((3..=7).contains(&n));
        }
    }

    #[test]
    fn test_clip_length() {
        let clip = ClipValue::new(vec![
                Event::Note {
                    start: Pos::Rat(Rat::ZERO),
                    dur: Rat::new(1, 4).unwrap(),
                    pitch: Pitch::parse("C4").unwrap(),
                    velocity: None,
                    voice: None,
                    techniques: vec![],
                    lyric: None,
                    ext: ObjectMap::new(),
                },
                Event::Note {
                    start: Pos::Rat(Rat::new(1, 4).unwrap()),
                    dur: Rat::new(1, 2).unwrap(),
                    pitch: Pitch::parse("D4").unwrap(),
                    velocity: None,
                    voice: None,
                    techniques: vec![],
                    lyric: None,
                    ext: ObjectMap::new(),
                },
            ]);
        assert_eq!(clip.length(), Some(Rat::new(3, 4).unwrap()));
    }

    #[test]
    fn test_clip_length_symbolic() {
        let clip = ClipValue::new(vec![Event::Marker {
            pos: Pos::Ref { bar: 2, beat: 1 },
            kind: "section".to_string(),
            label: "A".to_string(),
        }]);
        assert_eq!(clip.length(), None);
    }

    #[test]
    fn test_clip_explicit_length() {
        let mut clip = ClipValue::new(vec![]);
        clip.explicit_len = Some(Rat::new(2, 1).unwrap());
        assert_eq!(clip.length(), Some(Rat::new(2, 1).unwrap()));
    }

    #[test]
    fn test_role_kind_pairing() {
        assert_eq!(TrackRole::Drums.expected_kind(), SoundKind::DrumKit);
        assert_eq!(SoundKind::parse("drumKit"), Some(SoundKind::DrumKit));
        assert_eq!(SoundKind::parse("piano"), None);
        assert_eq!(TrackRole::parse("Vocal"), Some(TrackRole::Vocal));
    }
}
