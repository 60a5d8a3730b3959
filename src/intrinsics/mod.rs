//! # Intrinsics
//!
//! The fixed catalog of native functions seeded into every module's root
//! scope. Categories: clip transforms, theory helpers, rhythm helpers, drum
//! keys, vocal helpers, math and array/string utilities.
//!
//! Every intrinsic validates arity and argument types, naming itself in the
//! error. Natives receive the evaluator so higher-order intrinsics
//! (`mapEvents`) can call back into user functions.

pub mod clip_ops;
pub mod rhythm;
pub mod theory;
pub mod util;
pub mod vocal;

use crate::error::TakoError;
use crate::eval::{rat_like, CallArgs, Evaluator};
use crate::pitch::Pitch;
use crate::rat::Rat;
use crate::scope::Scope;
use crate::value::{ClipValue, FuncValue, NativeFn, RngState, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Install the full catalog into a root scope.
pub fn install(scope: &Rc<Scope>) {
    for (name, f) in CATALOG {
        scope.define(
            *name,
            Value::Func(Rc::new(FuncValue::Native { name: *name, f: *f })),
            false,
            false,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_unique() {
        let mut seen = std::collections::HashSet::new();
        for (name, _) in CATALOG {
            assert!(seen.insert(*name), "duplicate intrinsic name {}", name);
        }
    }

    #[test]
    fn test_install_defines_catalog() {
        let root = Scope::root();
        install(&root);
        assert!(root.get("repeat").is_some());
        assert!(root.get("euclid").is_some());
        assert!(root.get("print").is_some());
    }
}

/// Intrinsic names, for suggestion candidates.
pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|(name, _)| *name)
}

pub const CATALOG: &[(&'static str, NativeFn)] = &[
    // clip transforms
    ("repeat", clip_ops::repeat),
    ("concat", clip_ops::concat),
    ("overlay", clip_ops::overlay),
    ("slice", clip_ops::slice),
    ("shift", clip_ops::shift),
    ("padTo", clip_ops::pad_to),
    ("mapEvents", clip_ops::map_events),
    ("transpose", clip_ops::transpose),
    ("stretch", clip_ops::stretch),
    ("quantize", clip_ops::quantize),
    // theory
    ("triad", theory::triad),
    ("seventh", theory::seventh),
    ("scale", theory::scale),
    ("degree", theory::degree),
    ("pitchClass", theory::pitch_class),
    ("noteName", theory::note_name),
    ("interval", theory::interval),
    // rhythm and drums
    ("euclid", rhythm::euclid),
    ("pattern", rhythm::pattern),
    ("swing", rhythm::swing),
    ("drumKey", rhythm::drum_key),
    // vocal
    ("syllables", vocal::syllables),
    ("melisma", vocal::melisma),
    // math
    ("abs", util::abs),
    ("min", util::min),
    ("max", util::max),
    ("floor", util::floor),
    ("ceil", util::ceil),
    ("round", util::round),
    ("clamp", util::clamp),
    ("pow", util::pow),
    ("sqrt", util::sqrt),
    ("lerp", util::lerp),
    ("rat", util::rat),
    ("numerator", util::numerator),
    ("denominator", util::denominator),
    // random
    ("rng", util::rng),
    ("randInt", util::rand_int),
    ("randFloat", util::rand_float),
    ("choose", util::choose),
    // arrays, objects, strings
    ("len", util::len),
    ("push", util::push),
    ("concatArrays", util::concat_arrays),
    ("sort", util::sort),
    ("reverse", util::reverse),
    ("range", util::range),
    ("join", util::join),
    ("split", util::split),
    ("contains", util::contains),
    ("keys", util::keys),
    ("values", util::values),
    ("str", util::str_of),
    ("parseInt", util::parse_int),
    ("parseFloat", util::parse_float),
    ("upper", util::upper),
    ("lower", util::lower),
    ("trim", util::trim),
    ("print", util::print),
    // curves
    ("curve", util::curve),
];

/// Argument accessor shared by every intrinsic; produces typed errors that
/// name the function.
pub(crate) struct ArgView<'v> {
    pub fname: &'static str,
    pub call: &'v CallArgs,
}

impl<'v> ArgView<'v> {
    pub fn new(fname: &'static str, call: &'v CallArgs) -> Self {
        Self { fname, call }
    }

    pub fn err(&self, ev: &Evaluator, message: impl Into<String>) -> TakoError {
        ev.type_error(self.call.pos, format!("{}(): {}", self.fname, message.into()))
    }

    pub fn arity(&self, ev: &Evaluator, min: usize, max: usize) -> Result<(), TakoError> {
        let n = self.call.positional.len();
        if n < min || n > max {
            let expected = if max == usize::MAX {
                format!("at least {}", min)
            } else if min == max {
                format!("{}", min)
            } else {
                format!("{} to {}", min, max)
            };
            return Err(self.err(
                ev,
                format!("expected {} argument(s), got {}", expected, n),
            ));
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.call.positional.get(index)
    }

    pub fn named(&self, name: &str) -> Option<&Value> {
        self.call.named_arg(name)
    }

    pub fn value(&self, ev: &Evaluator, index: usize) -> Result<&Value, TakoError> {
        self.get(index)
            .ok_or_else(|| self.err(ev, format!("missing argument {}", index + 1)))
    }

    pub fn clip(&self, ev: &Evaluator, index: usize) -> Result<ClipValue, TakoError> {
        match self.value(ev, index)? {
            Value::Clip(c) => Ok((**c).clone()),
            other => Err(self.err(
                ev,
                format!(
                    "argument {} must be a clip, got {}",
                    index + 1,
                    other.type_name()
                ),
            )),
        }
    }

    pub fn rat(&self, ev: &Evaluator, index: usize) -> Result<Rat, TakoError> {
        let value = self.value(ev, index)?;
        rat_like(value).ok_or_else(|| {
            self.err(
                ev,
                format!(
                    "argument {} must be a rational, got {}",
                    index + 1,
                    value.type_name()
                ),
            )
        })
    }

    pub fn num(&self, ev: &Evaluator, index: usize) -> Result<f64, TakoError> {
        match self.value(ev, index)? {
            Value::Num(n) => Ok(*n),
            Value::Rat(r) => Ok(r.to_f64()),
            other => Err(self.err(
                ev,
                format!(
                    "argument {} must be a number, got {}",
                    index + 1,
                    other.type_name()
                ),
            )),
        }
    }

    pub fn int(&self, ev: &Evaluator, index: usize) -> Result<i64, TakoError> {
        let value = self.value(ev, index)?;
        value.as_int().ok_or_else(|| {
            self.err(
                ev,
                format!(
                    "argument {} must be an integer, got {}",
                    index + 1,
                    value.type_name()
                ),
            )
        })
    }

    pub fn str(&self, ev: &Evaluator, index: usize) -> Result<String, TakoError> {
        match self.value(ev, index)? {
            Value::Str(s) => Ok(s.clone()),
            other => Err(self.err(
                ev,
                format!(
                    "argument {} must be a string, got {}",
                    index + 1,
                    other.type_name()
                ),
            )),
        }
    }

    pub fn pitch(&self, ev: &Evaluator, index: usize) -> Result<Pitch, TakoError> {
        match self.value(ev, index)? {
            Value::Pitch(p) => Ok(*p),
            other => Err(self.err(
                ev,
                format!(
                    "argument {} must be a pitch, got {}",
                    index + 1,
                    other.type_name()
                ),
            )),
        }
    }

    pub fn array(&self, ev: &Evaluator, index: usize) -> Result<Vec<Value>, TakoError> {
        match self.value(ev, index)? {
            Value::Array(items) => Ok(items.borrow().clone()),
            other => Err(self.err(
                ev,
                format!(
                    "argument {} must be an array, got {}",
                    index + 1,
                    other.type_name()
                ),
            )),
        }
    }

    pub fn func(&self, ev: &Evaluator, index: usize) -> Result<Rc<FuncValue>, TakoError> {
        match self.value(ev, index)? {
            Value::Func(f) => Ok(Rc::clone(f)),
            other => Err(self.err(
                ev,
                format!(
                    "argument {} must be a function, got {}",
                    index + 1,
                    other.type_name()
                ),
            )),
        }
    }

    pub fn rng(&self, ev: &Evaluator, index: usize) -> Result<Rc<RefCell<RngState>>, TakoError> {
        match self.value(ev, index)? {
            Value::Rng(state) => Ok(Rc::clone(state)),
            other => Err(self.err(
                ev,
                format!(
                    "argument {} must be an rng (create one with rng(seed)), got {}",
                    index + 1,
                    other.type_name()
                ),
            )),
        }
    }
}
