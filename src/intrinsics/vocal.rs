//! # Vocal Helpers
//!
//! Text-to-lyric alignment: `syllables` splits lyric text into tokens (with
//! hyphen continuation flags) for attaching to notes one by one, and
//! `melisma` produces extension tokens for held syllables.

use super::ArgView;
use crate::error::TakoError;
use crate::eval::{CallArgs, Evaluator};
use crate::value::{LyricValue, Value};
use std::rc::Rc;

/// `syllables("hel-lo world")` - lyric tokens, one per syllable. A `-`
/// inside a word marks the syllable as continued (`hel-` + `lo`).
pub fn syllables(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("syllables", call);
    args.arity(ev, 1, 1)?;
    let text = args.str(ev, 0)?;
    let mut tokens = Vec::new();
    for word in text.split_whitespace() {
        let parts: Vec<&str> = word.split('-').filter(|p| !p.is_empty()).collect();
        for (i, part) in parts.iter().enumerate() {
            tokens.push(Value::Lyric(Rc::new(LyricValue {
                text: (*part).to_string(),
                hyphen: i + 1 < parts.len(),
                extend: false,
            })));
        }
    }
    Ok(Value::array(tokens))
}

/// `melisma()` - an extension token: the previous syllable keeps sounding
/// through the note this token is attached to.
pub fn melisma(ev: &mut Evaluator, call: &CallArgs) -> Result<Value, TakoError> {
    let args = ArgView::new("melisma", call);
    args.arity(ev, 0, 0)?;
    Ok(Value::Lyric(Rc::new(LyricValue {
        text: String::new(),
        hyphen: false,
        extend: true,
    })))
}
