//! # Intermediate Representation
//!
//! The compiler's output contract: a JSON-serializable record consumed by
//! downstream renderers (MIDI, MusicXML, audio). Field order in the JSON is
//! the struct declaration order here and is part of the contract; all
//! rationals serialize as `{n, d}` and events are a tagged union on `type`.
//!
//! ```text
//! { tako: {irVersion, generator}, meta, tempoMap, meterMap,
//!   sounds, tracks, markers }
//! ```
//!
//! Produced by the [`crate::normalize`] pass; never constructed directly by
//! user-facing code.

use crate::pitch::Pitch;
use crate::pos::Pos;
use crate::rat::Rat;
use crate::value::{format_value, CurveValue, LyricValue, ObjectMap, Value};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Version of the IR schema emitted by this crate.
pub const IR_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct ScoreIr {
    pub tako: IrHeader,
    pub meta: MetaIr,
    #[serde(rename = "tempoMap")]
    pub tempo_map: Vec<TempoIr>,
    #[serde(rename = "meterMap")]
    pub meter_map: Vec<MeterIr>,
    pub sounds: Vec<SoundIr>,
    pub tracks: Vec<TrackIr>,
    pub markers: Vec<MarkerIr>,
}

impl ScoreIr {
    /// Canonical JSON rendering. Given identical inputs the output is
    /// byte-identical.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IrHeader {
    #[serde(rename = "irVersion")]
    pub ir_version: u32,
    pub generator: String,
    #[serde(rename = "sourceHash", skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
}

impl IrHeader {
    pub fn current() -> Self {
        Self {
            ir_version: IR_VERSION,
            generator: format!("tako {}", env!("CARGO_PKG_VERSION")),
            source_hash: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetaIr {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "JsonMap::is_empty")]
    pub ext: JsonMap<String, JsonValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TempoIr {
    pub at: Pos,
    pub bpm: f64,
    pub unit: Rat,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeterIr {
    pub at: Pos,
    pub numerator: u32,
    pub denominator: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SoundIr {
    pub id: String,
    pub kind: String,
    #[serde(flatten)]
    pub ext: JsonMap<String, JsonValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackIr {
    pub name: String,
    pub role: String,
    pub sound: String,
    pub placements: Vec<PlacementIr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mix: Option<MixIr>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MixIr {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacementIr {
    pub at: Pos,
    pub clip: ClipIr,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClipIr {
    pub events: Vec<EventIr>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LyricIr {
    pub text: String,
    pub hyphen: bool,
    pub extend: bool,
}

impl From<&LyricValue> for LyricIr {
    fn from(lyric: &LyricValue) -> Self {
        Self {
            text: lyric.text.clone(),
            hyphen: lyric.hyphen,
            extend: lyric.extend,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurvePointIr {
    pub at: Rat,
    pub value: f64,
}

pub fn curve_points(curve: &CurveValue) -> Vec<CurvePointIr> {
    curve
        .points
        .iter()
        .map(|(at, value)| CurvePointIr {
            at: *at,
            value: *value,
        })
        .collect()
}

/// Clip events, tagged on `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum EventIr {
    #[serde(rename = "note")]
    Note {
        start: Pos,
        dur: Rat,
        pitch: Pitch,
        #[serde(skip_serializing_if = "Option::is_none")]
        velocity: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        voice: Option<i64>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        techniques: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lyric: Option<LyricIr>,
        #[serde(skip_serializing_if = "JsonMap::is_empty")]
        ext: JsonMap<String, JsonValue>,
    },
    #[serde(rename = "chord")]
    Chord {
        start: Pos,
        dur: Rat,
        pitches: Vec<Pitch>,
        #[serde(skip_serializing_if = "Option::is_none")]
        velocity: Option<f64>,
        #[serde(skip_serializing_if = "JsonMap::is_empty")]
        ext: JsonMap<String, JsonValue>,
    },
    #[serde(rename = "drumHit")]
    DrumHit {
        start: Pos,
        dur: Rat,
        key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        velocity: Option<f64>,
        #[serde(skip_serializing_if = "JsonMap::is_empty")]
        ext: JsonMap<String, JsonValue>,
    },
    #[serde(rename = "breath")]
    Breath {
        start: Pos,
        dur: Rat,
        #[serde(skip_serializing_if = "Option::is_none")]
        intensity: Option<f64>,
    },
    #[serde(rename = "control")]
    Control {
        start: Pos,
        kind: String,
        data: JsonValue,
    },
    #[serde(rename = "automation")]
    Automation {
        param: String,
        start: Pos,
        end: Pos,
        curve: Vec<CurvePointIr>,
    },
    #[serde(rename = "marker")]
    Marker { pos: Pos, kind: String, label: String },
}

/// Top-level score markers carry an explicit `type` field per the schema.
#[derive(Debug, Clone, Serialize)]
pub struct MarkerIr {
    #[serde(rename = "type")]
    pub marker_type: &'static str,
    pub pos: Pos,
    pub kind: String,
    pub label: String,
}

impl MarkerIr {
    pub fn new(pos: Pos, kind: String, label: String) -> Self {
        Self {
            marker_type: "marker",
            pos,
            kind,
            label,
        }
    }
}

/// Convert a runtime value into JSON for `ext` bags and control data.
/// Structures without a natural JSON form fall back to their display
/// rendering.
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Num(n) => serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Str(s) => JsonValue::String(s.clone()),
        Value::Rat(r) => rat_json(*r),
        Value::Pitch(p) => serde_json::to_value(p).unwrap_or(JsonValue::Null),
        Value::Pos(p) => serde_json::to_value(p).unwrap_or(JsonValue::Null),
        Value::Range {
            start,
            end,
            inclusive,
        } => {
            let mut map = JsonMap::new();
            map.insert("start".to_string(), value_to_json(start));
            map.insert("end".to_string(), value_to_json(end));
            map.insert("inclusive".to_string(), JsonValue::Bool(*inclusive));
            JsonValue::Object(map)
        }
        Value::Array(items) => {
            JsonValue::Array(items.borrow().iter().map(value_to_json).collect())
        }
        Value::Object(map) => JsonValue::Object(object_to_json(&map.borrow())),
        Value::Curve(c) => JsonValue::Array(
            c.points
                .iter()
                .map(|(at, v)| {
                    let mut map = JsonMap::new();
                    map.insert("at".to_string(), rat_json(*at));
                    map.insert(
                        "value".to_string(),
                        serde_json::Number::from_f64(*v)
                            .map(JsonValue::Number)
                            .unwrap_or(JsonValue::Null),
                    );
                    JsonValue::Object(map)
                })
                .collect(),
        ),
        Value::Lyric(l) => {
            let mut map = JsonMap::new();
            map.insert("text".to_string(), JsonValue::String(l.text.clone()));
            map.insert("hyphen".to_string(), JsonValue::Bool(l.hyphen));
            map.insert("extend".to_string(), JsonValue::Bool(l.extend));
            JsonValue::Object(map)
        }
        other => JsonValue::String(format_value(other)),
    }
}

pub fn object_to_json(map: &ObjectMap) -> JsonMap<String, JsonValue> {
    let mut json = JsonMap::new();
    for (k, v) in map.iter() {
        json.insert(k.clone(), value_to_json(v));
    }
    json
}

fn rat_json(r: Rat) -> JsonValue {
    let mut map = JsonMap::new();
    map.insert("n".to_string(), JsonValue::from(r.numerator()));
    map.insert("d".to_string(), JsonValue::from(r.denominator()));
    JsonValue::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_field_order() {
        let ir = ScoreIr {
            tako: IrHeader::current(),
            meta: MetaIr::default(),
            tempo_map: vec![],
            meter_map: vec![],
            sounds: vec![],
            tracks: vec![],
            markers: vec![],
        };
        let json = ir.to_json();
        let tako_at = json.find("\"tako\"").unwrap();
        let meta_at = json.find("\"meta\"").unwrap();
        let tempo_at = json.find("\"tempoMap\"").unwrap();
        let tracks_at = json.find("\"tracks\"").unwrap();
        assert!(tako_at < meta_at && meta_at < tempo_at && tempo_at < tracks_at);
        assert!(json.contains("\"irVersion\": 1"));
    }

    #[test]
    fn test_event_tagged_union() {
        let event = EventIr::DrumHit {
            start: Pos::Rat(Rat::ZERO),
            dur: Rat::new(1, 4).unwrap(),
            key: "kick".to_string(),
            velocity: None,
            ext: JsonMap::new(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.starts_with(r#"{"type":"drumHit""#));
        assert!(!json.contains("velocity"));
    }

    #[test]
    fn test_marker_has_type_field() {
        let marker = MarkerIr::new(
            Pos::Ref { bar: 1, beat: 1 },
            "section".to_string(),
            "A".to_string(),
        );
        let json = serde_json::to_string(&marker).unwrap();
        assert!(json.contains(r#""type":"marker""#));
        assert!(json.contains(r#""kind":"posref""#));
    }

    #[test]
    fn test_value_to_json_rat() {
        // keys inside generic JSON values are sorted by serde_json's map
        let json = value_to_json(&Value::Rat(Rat::new(3, 4).unwrap()));
        assert_eq!(json["n"], 3);
        assert_eq!(json["d"], 4);
    }
}
