//! Integration tests for the Tako compiler
//!
//! Full pipeline coverage: source text through lexing, parsing, module
//! loading, evaluation and normalization to IR JSON.

use tako::ir::EventIr;
use tako::{compile, compile_to_ir, Compiler, Pos, Rat, Severity, TakoError};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Evaluate an expression by smuggling it through a meta extension field.
fn eval_expr_json(expr: &str) -> serde_json::Value {
    init_logs();
    let src = format!(
        "export fn main() -> Score {{ return score {{ meta {{ result: {}; }} }}; }}",
        expr
    );
    let ir = compile_to_ir(&src).unwrap();
    ir.meta.ext.get("result").cloned().unwrap()
}

#[test]
fn test_minimal_score() {
    init_logs();
    let ir = compile_to_ir("export fn main() -> Score { return score {}; }").unwrap();
    assert_eq!(ir.tako.ir_version, 1);
    assert!(ir.meta.title.is_none());
    assert!(ir.tempo_map.is_empty());
    assert!(ir.meter_map.is_empty());
    assert!(ir.sounds.is_empty());
    assert!(ir.tracks.is_empty());
    assert!(ir.markers.is_empty());
}

#[test]
fn test_single_note_score() {
    init_logs();
    let src = r#"
        export fn main() -> Score {
          return score {
            meter { 1:1 -> 4/4; } tempo { 1:1 -> 120bpm; }
            sound "s" kind instrument {}
            track "T" role Instrument sound "s" {
              place 1:1 clip { note C4 1/4; };
            }
          };
        }
    "#;
    let ir = compile_to_ir(src).unwrap();
    assert_eq!(ir.tempo_map.len(), 1);
    assert_eq!(ir.tempo_map[0].bpm, 120.0);
    assert_eq!(ir.tempo_map[0].unit, Rat::new(1, 4).unwrap());
    assert_eq!(ir.meter_map.len(), 1);
    assert_eq!(ir.meter_map[0].numerator, 4);
    assert_eq!(ir.sounds.len(), 1);
    assert_eq!(ir.sounds[0].kind, "instrument");

    assert_eq!(ir.tracks.len(), 1);
    let track = &ir.tracks[0];
    assert_eq!(track.name, "T");
    assert_eq!(track.role, "Instrument");
    assert_eq!(track.sound, "s");
    assert_eq!(track.placements.len(), 1);
    assert_eq!(track.placements[0].at, Pos::Ref { bar: 1, beat: 1 });

    let events = &track.placements[0].clip.events;
    assert_eq!(events.len(), 1);
    match &events[0] {
        EventIr::Note {
            start, dur, pitch, ..
        } => {
            assert_eq!(*start, Pos::Rat(Rat::ZERO));
            assert_eq!(*dur, Rat::new(1, 4).unwrap());
            assert_eq!(pitch.midi, 60);
            assert_eq!(pitch.cents, 0.0);
        }
        other => panic!("expected note, got {:?}", other),
    }
}

#[test]
fn test_rational_durations_exact() {
    init_logs();
    let src = r#"
        export fn main() -> Score {
          return score {
            sound "s" kind instrument {}
            track "T" role Instrument sound "s" {
              place 1:1 clip { note C4 1/3; note D4 2/3; };
            }
          };
        }
    "#;
    let ir = compile_to_ir(src).unwrap();
    let events = &ir.tracks[0].placements[0].clip.events;
    assert_eq!(events.len(), 2);
    match (&events[0], &events[1]) {
        (
            EventIr::Note { dur: d0, .. },
            EventIr::Note {
                start: s1, dur: d1, ..
            },
        ) => {
            assert_eq!(*d0, Rat::new(1, 3).unwrap());
            assert_eq!(*s1, Pos::Rat(Rat::new(1, 3).unwrap()));
            // cursor ends exactly on the whole note, not 0.99999...
            let end = match s1 {
                Pos::Rat(r) => *r + *d1,
                other => panic!("expected rational start, got {:?}", other),
            };
            assert_eq!(end, Rat::ONE);
        }
        other => panic!("expected two notes, got {:?}", other),
    }
}

#[test]
fn test_import_and_reexport() {
    init_logs();
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("helper.mf"),
        r#"
        export fn melody() -> Clip {
          return clip { note C4 1/4; note E4 1/4; };
        }
        "#,
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("main.mf"),
        r#"
        import { melody } from "helper.mf";
        export fn main() -> Score {
          return score {
            sound "s" kind instrument {}
            track "T" role Instrument sound "s" {
              place 1:1 melody();
            }
          };
        }
        "#,
    )
    .unwrap();

    let output = Compiler::new().compile_file(&tmp.path().join("main.mf"));
    assert!(output.is_ok(), "diagnostics: {:?}", output.diagnostics);
    let ir = output.ir.unwrap();
    let events = &ir.tracks[0].placements[0].clip.events;
    assert_eq!(events.len(), 2);

    // inlining the helper body gives the same clip
    let inline = compile_to_ir(
        r#"
        export fn main() -> Score {
          return score {
            sound "s" kind instrument {}
            track "T" role Instrument sound "s" {
              place 1:1 clip { note C4 1/4; note E4 1/4; };
            }
          };
        }
        "#,
    )
    .unwrap();
    assert_eq!(
        serde_json::to_string(&ir.tracks).unwrap(),
        serde_json::to_string(&inline.tracks).unwrap()
    );
}

#[test]
fn test_cyclic_function_imports_tolerated() {
    init_logs();
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("a.mf"),
        r#"
        import { bNote } from "b.mf";
        export fn aClip() -> Clip { return bNote(); }
        export fn main() -> Score {
          return score {
            sound "s" kind instrument {}
            track "T" role Instrument sound "s" { place 1:1 aClip(); }
          };
        }
        "#,
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("b.mf"),
        r#"
        import { aClip } from "a.mf";
        export fn bNote() -> Clip { return clip { note G4 1/4; }; }
        "#,
    )
    .unwrap();

    let output = Compiler::new().compile_file(&tmp.path().join("a.mf"));
    assert!(output.is_ok(), "diagnostics: {:?}", output.diagnostics);
}

#[test]
fn test_cyclic_constant_imports_error() {
    init_logs();
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("a.mf"),
        r#"
        import { cb } from "b.mf";
        export const ca = cb + 1;
        export fn main() -> Score { return score {}; }
        "#,
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("b.mf"),
        r#"
        import { ca } from "a.mf";
        export const cb = ca + 1;
        "#,
    )
    .unwrap();

    let output = Compiler::new().compile_file(&tmp.path().join("a.mf"));
    assert!(output.ir.is_none());
    assert!(output.diagnostics.iter().any(|d| {
        d.severity == Severity::Error && d.message.contains("cyclic constant initialization")
    }));
}

#[test]
fn test_path_traversal_rejected() {
    init_logs();
    let tmp = tempfile::tempdir().unwrap();
    let project = tmp.path().join("project");
    std::fs::create_dir(&project).unwrap();
    std::fs::write(tmp.path().join("secret.mf"), "export const x = 1;").unwrap();
    std::fs::write(
        project.join("main.mf"),
        r#"
        import { x } from "../secret.mf";
        export fn main() -> Score { return score {}; }
        "#,
    )
    .unwrap();

    let output = Compiler::new().compile_file(&project.join("main.mf"));
    assert!(output.ir.is_none());
    assert!(output
        .diagnostics
        .iter()
        .any(|d| d.code.as_deref() == Some("import")));
}

#[test]
fn test_compile_is_deterministic() {
    init_logs();
    let src = r#"
        import { backbeat } from "std:patterns";
        export fn main() -> Score {
          return score {
            meter { 1:1 -> 4/4; } tempo { 1:1 -> 96bpm; }
            sound "kit" kind drumKit {}
            track "drums" role Drums sound "kit" {
              place 1:1 repeat(backbeat(), 2);
            }
          };
        }
    "#;
    let first = compile(src).unwrap();
    let second = compile(src).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_rationals_in_ir_are_reduced() {
    init_logs();
    let src = r#"
        export fn main() -> Score {
          return score {
            sound "s" kind instrument {}
            track "T" role Instrument sound "s" {
              place 1:1 clip { note C4 2/8; note D4 4/8; };
            }
          };
        }
    "#;
    let ir = compile_to_ir(src).unwrap();
    for event in &ir.tracks[0].placements[0].clip.events {
        if let EventIr::Note { dur, .. } = event {
            let g = gcd(dur.numerator().unsigned_abs(), dur.denominator() as u64);
            assert!(dur.denominator() > 0);
            assert_eq!(g, 1);
        }
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[test]
fn test_events_sorted_by_start() {
    init_logs();
    // `at` jumps backwards; the normalizer re-sorts by start
    let src = r#"
        export fn main() -> Score {
          return score {
            sound "s" kind instrument {}
            track "T" role Instrument sound "s" {
              place 1:1 clip {
                at 1/2; note E4 1/4;
                at 0/1; note C4 1/4;
                at 1/2; note G4 1/4;
              };
            }
          };
        }
    "#;
    let ir = compile_to_ir(src).unwrap();
    let events = &ir.tracks[0].placements[0].clip.events;
    let starts: Vec<Rat> = events
        .iter()
        .map(|e| match e {
            EventIr::Note { start: Pos::Rat(r), .. } => *r,
            other => panic!("expected rational note start, got {:?}", other),
        })
        .collect();
    assert_eq!(
        starts,
        vec![Rat::ZERO, Rat::new(1, 2).unwrap(), Rat::new(1, 2).unwrap()]
    );
    // ties preserve insertion order: E4 was written before G4 at 1/2
    match (&events[1], &events[2]) {
        (EventIr::Note { pitch: p1, .. }, EventIr::Note { pitch: p2, .. }) => {
            assert_eq!(p1.midi, 64);
            assert_eq!(p2.midi, 67);
        }
        other => panic!("expected notes, got {:?}", other),
    }
}

#[test]
fn test_symbolic_clip_position_resolved_by_meter() {
    init_logs();
    let src = r#"
        export fn main() -> Score {
          return score {
            meter { 1:1 -> 4/4; }
            sound "s" kind instrument {}
            track "T" role Instrument sound "s" {
              place 1:1 clip { at 2:3; note C4 1/4; };
            }
          };
        }
    "#;
    let ir = compile_to_ir(src).unwrap();
    match &ir.tracks[0].placements[0].clip.events[0] {
        EventIr::Note { start, .. } => {
            // bar 2 beat 3 in 4/4 = 1 + 1/2 whole notes
            assert_eq!(*start, Pos::Rat(Rat::new(3, 2).unwrap()));
        }
        other => panic!("expected note, got {:?}", other),
    }
}

#[test]
fn test_unresolved_position_warns_and_survives() {
    init_logs();
    let src = r#"
        export fn main() -> Score {
          return score {
            sound "s" kind instrument {}
            track "T" role Instrument sound "s" {
              place 1:1 clip { at 2:1; note C4 1/4; };
            }
          };
        }
    "#;
    let output = Compiler::new().compile_source(src);
    let ir = output.ir.expect("unresolved positions are not fatal");
    match &ir.tracks[0].placements[0].clip.events[0] {
        EventIr::Note { start, .. } => assert_eq!(*start, Pos::Ref { bar: 2, beat: 1 }),
        other => panic!("expected note, got {:?}", other),
    }
    assert!(output
        .diagnostics
        .iter()
        .any(|d| d.code.as_deref() == Some("unresolved-position")));
}

#[test]
fn test_call_depth_boundary() {
    init_logs();
    // main() is one frame; rec(n) adds n + 1 more, so n = 510 reaches the
    // 512 limit exactly
    let template = |n: i64| {
        format!(
            r#"
            fn rec(n) {{
              if n == 0 {{ return 0; }}
              return rec(n - 1);
            }}
            export fn main() -> Score {{
              return score {{ meta {{ depth: rec({}); }} }};
            }}
            "#,
            n
        )
    };
    assert!(compile_to_ir(&template(510)).is_ok());
    match compile_to_ir(&template(511)) {
        Err(TakoError::StackOverflow { depth, .. }) => assert_eq!(depth, 512),
        other => panic!("expected stack overflow, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_operator_semantics() {
    init_logs();
    // exact rational sum
    let v = eval_expr_json("1/3 + 2/3");
    assert_eq!(v["n"], 1);
    assert_eq!(v["d"], 1);
    // integer division yields a rational
    let v = eval_expr_json("3 / 2");
    assert_eq!(v["n"], 3);
    assert_eq!(v["d"], 2);
    // pitch transposition
    assert_eq!(eval_expr_json("noteName(C4 + 7)"), "G4");
    assert_eq!(eval_expr_json("noteName(C4 - 1)"), "B3");
    // position shift keeps the symbolic base
    let v = eval_expr_json("str(2:1 + 1/8)");
    assert_eq!(v, "2:1+1/8");
    // null coalescing takes the right side only on null
    assert_eq!(eval_expr_json("null ?? 3"), 3.0);
    assert_eq!(eval_expr_json("0 ?? 3"), 0.0);
    // falsy set
    assert_eq!(eval_expr_json(r#""" || "fallback""#), "fallback");
    assert_eq!(eval_expr_json("1 && 2"), 2.0);
}

#[test]
fn test_pos_minus_pos() {
    init_logs();
    let v = eval_expr_json("(2:1 + 1/2) - (2:1 + 1/4)");
    assert_eq!(v["n"], 1);
    assert_eq!(v["d"], 4);
    // different bases cannot resolve at evaluation time
    let err = compile_to_ir(
        "export fn main() -> Score { return score { meta { x: 2:1 - 1:1; } }; }",
    )
    .unwrap_err();
    assert!(matches!(err, TakoError::Type { .. }));
}

#[test]
fn test_match_expression() {
    init_logs();
    assert_eq!(
        eval_expr_json(r#"match 2 { 1 => "one", 2 => "two", _ => "many" }"#),
        "two"
    );
    assert_eq!(
        eval_expr_json(r#"match 9 { 1 => "one", _ => "many" }"#),
        "many"
    );
    assert_eq!(
        eval_expr_json(r#"match 9 { 1 => "one" } ?? "nothing""#),
        "nothing"
    );
}

#[test]
fn test_stdlib_imports() {
    init_logs();
    let src = r#"
        import { sum } from "std:core";
        import { majorTriad } from "std:theory";
        export fn main() -> Score {
          return score {
            meta {
              total: sum([1, 2, 3]);
              third: noteName(majorTriad(C4)[1]);
            }
          };
        }
    "#;
    let ir = compile_to_ir(src).unwrap();
    assert_eq!(ir.meta.ext.get("total").cloned().unwrap(), 6.0);
    assert_eq!(ir.meta.ext.get("third").cloned().unwrap(), "E4");
}

#[test]
fn test_star_import_namespace() {
    init_logs();
    let src = r#"
        import * as th from "std:theory";
        export fn main() -> Score {
          return score {
            meta { fifth: noteName(th.majorTriad(C4)[2]); }
          };
        }
    "#;
    let ir = compile_to_ir(src).unwrap();
    assert_eq!(ir.meta.ext.get("fifth").cloned().unwrap(), "G4");
}

#[test]
fn test_stdlib_patterns_build_clips() {
    init_logs();
    let src = r#"
        import { fourOnFloor, backbeat } from "std:patterns";
        export fn main() -> Score {
          return score {
            meter { 1:1 -> 4/4; }
            sound "kit" kind drumKit {}
            track "drums" role Drums sound "kit" {
              place 1:1 fourOnFloor(null);
              place 2:1 backbeat();
            }
          };
        }
    "#;
    let ir = compile_to_ir(src).unwrap();
    let hits = |i: usize| {
        ir.tracks[0].placements[i]
            .clip
            .events
            .iter()
            .filter(|e| matches!(e, EventIr::DrumHit { .. }))
            .count()
    };
    assert_eq!(hits(0), 4);
    // 2 kicks + 2 snares + 8 hats
    assert_eq!(hits(1), 12);
}

#[test]
fn test_named_arguments() {
    init_logs();
    let src = r#"
        fn scaled(base, factor) {
          return base * (factor ?? 1);
        }
        export fn main() -> Score {
          return score { meta { x: scaled(2, factor: 3); y: scaled(5); } };
        }
    "#;
    let ir = compile_to_ir(src).unwrap();
    assert_eq!(ir.meta.ext.get("x").cloned().unwrap(), 6.0);
    assert_eq!(ir.meta.ext.get("y").cloned().unwrap(), 5.0);

    let err = compile_to_ir(
        r#"
        fn f(a) { return a; }
        export fn main() -> Score { return score { meta { x: f(1, wrong: 2); } }; }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("unknown named argument"));
    assert!(err.to_string().contains("available: a"));
}

#[test]
fn test_name_error_suggestion() {
    init_logs();
    let err = compile_to_ir(
        "export fn main() -> Score { return score { meta { x: repaet(clip {}, 2); } }; }",
    )
    .unwrap_err();
    match err {
        TakoError::Name {
            suggestion,
            message,
            ..
        } => {
            assert_eq!(suggestion.as_deref(), Some("repeat"));
            assert!(message.contains("Did you mean"));
        }
        other => panic!("expected name error, got {}", other),
    }
}

#[test]
fn test_pitch_followed_by_alnum_is_identifier() {
    init_logs();
    let err = compile_to_ir(
        "export fn main() -> Score { return score { meta { x: C4foo; } }; }",
    )
    .unwrap_err();
    assert!(matches!(err, TakoError::Name { .. }));
}

#[test]
fn test_role_sound_mismatch_is_warning_not_error() {
    init_logs();
    let src = r#"
        export fn main() -> Score {
          return score {
            sound "kit" kind drumKit {}
            track "lead" role Instrument sound "kit" {
              place 1:1 clip { note C4 1/4; };
            }
          };
        }
    "#;
    let output = Compiler::new().compile_source(src);
    assert!(output.ir.is_some());
    assert!(output.diagnostics.iter().any(|d| {
        d.severity == Severity::Warning && d.code.as_deref() == Some("role-sound-mismatch")
    }));
}

#[test]
fn test_clip_transforms_end_to_end() {
    init_logs();
    let src = r#"
        export fn main() -> Score {
          const motif = clip { note C4 1/4; note E4 1/4; };
          return score {
            meter { 1:1 -> 4/4; }
            sound "s" kind instrument {}
            track "T" role Instrument sound "s" {
              place 1:1 transpose(repeat(motif, 2), 12);
            }
          };
        }
    "#;
    let ir = compile_to_ir(src).unwrap();
    let events = &ir.tracks[0].placements[0].clip.events;
    assert_eq!(events.len(), 4);
    match &events[2] {
        EventIr::Note { start, pitch, .. } => {
            assert_eq!(*start, Pos::Rat(Rat::new(1, 2).unwrap()));
            assert_eq!(pitch.midi, 72); // C5 after transposition
        }
        other => panic!("expected note, got {:?}", other),
    }
}

#[test]
fn test_no_error_diagnostics_on_success() {
    init_logs();
    let output = Compiler::new()
        .compile_source("export fn main() -> Score { return score {}; }");
    assert!(output.is_ok());
    assert!(!output
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error));
}

#[test]
fn test_full_song_compiles() {
    init_logs();
    let src = r#"
        import { backbeat } from "std:patterns";
        import { majorScale, arpeggio } from "std:theory";
        import { lyricLine } from "std:vocal";

        const verseChords = [triad(C4, "maj"), triad(A3, "min"), triad(F3, "maj"), triad(G3, "maj")];

        fn chordTrack() {
          let out = clip {};
          for c in verseChords {
            out = concat(out, clip { chord c 1/1 vel: 72; });
          }
          return out;
        }

        export fn main() -> Score {
          const words = lyricLine("la la la la");
          return score {
            meta { title: "Demo"; artist: "Tako"; }
            meter { 1:1 -> 4/4; }
            tempo { 1:1 -> 112bpm; }
            sound "piano" kind instrument {}
            sound "kit" kind drumKit {}
            sound "voice" kind vocal {}
            track "keys" role Instrument sound "piano" {
              place 1:1 chordTrack();
              place 5:1 arpeggio(majorScale(C4), 1/8);
            }
            track "drums" role Drums sound "kit" {
              place 1:1 repeat(backbeat(), 4);
            }
            track "lead" role Vocal sound "voice" {
              place 1:1 clip {
                note E4 1/4 lyric: words[0];
                note D4 1/4 lyric: words[1];
                note C4 1/2 lyric: words[2];
              };
            }
            marker 1:1 "section" "verse";
          };
        }
    "#;
    let output = Compiler::new().compile_source(src);
    assert!(output.is_ok(), "diagnostics: {:?}", output.diagnostics);
    let ir = output.ir.unwrap();
    assert_eq!(ir.meta.title.as_deref(), Some("Demo"));
    assert_eq!(ir.tracks.len(), 3);
    assert_eq!(ir.markers.len(), 1);
    assert_eq!(ir.markers[0].kind, "section");
    let json = ir.to_json();
    assert!(json.contains("\"tako\""));
    assert!(json.contains("\"drumHit\""));
}
