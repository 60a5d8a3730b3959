//! # Error Types and Diagnostics
//!
//! This module defines all error types for the Tako compiler and the
//! diagnostic records the pipeline accumulates while it runs.
//!
//! All fatal errors include location information (file, line, column) to help
//! users identify and fix issues in their Tako source code.
//!
//! ## Error Types
//! - `Syntax` - Lexer/parser errors with line and column information
//! - `Import` - Unresolved modules, unsafe paths, missing exports
//! - `Type` - Runtime type mismatches detected by the evaluator or normalizer
//! - `Name` - References to undefined identifiers, with a "did you mean" hint
//! - `Io` - File read failures during module loading
//! - `StackOverflow` - Maximum call depth exceeded
//!
//! Warnings never abort compilation; they accumulate as [`Diagnostic`]
//! records with `Severity::Warning` and are returned alongside the IR.
//!
//! ## Usage
//! ```rust
//! use tako::{compile, TakoError};
//!
//! match compile("export fn main() -> Score { return score {}; }") {
//!     Ok(json) => println!("{}", json),
//!     Err(TakoError::Syntax { file, line, column, message }) => {
//!         eprintln!("{}:{}:{}: {}", file, line, column, message);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

/// A location in a source file: 1-based line and column, absolute byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl SourcePos {
    pub fn new(line: u32, column: u32, offset: u32) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Error, Debug)]
pub enum TakoError {
    /// Lexer or parser failure. Always fatal.
    ///
    /// # Example
    /// ```
    /// # use tako::TakoError;
    /// let err = TakoError::Syntax {
    ///     file: "song.mf".to_string(),
    ///     line: 5,
    ///     column: 10,
    ///     message: "unexpected token ';'".to_string(),
    /// };
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Syntax error at song.mf:5:10: unexpected token ';'"
    /// );
    /// ```
    #[error("Syntax error at {file}:{line}:{column}: {message}")]
    Syntax {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },

    /// Unresolved module, unsafe import path, or missing export. Fatal.
    #[error("Import error in {file}: {message}")]
    Import { file: String, message: String },

    /// Runtime type mismatch detected by the evaluator or normalizer. Fatal.
    #[error("Type error at {file}:{line}:{column}: {message}")]
    Type {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },

    /// Reference to an undefined identifier. Fatal. Carries a Levenshtein
    /// suggestion against in-scope names and intrinsics when one is close.
    #[error("Name error at {file}:{line}:{column}: {message}")]
    Name {
        file: String,
        line: u32,
        column: u32,
        message: String,
        suggestion: Option<String>,
    },

    /// File read failure during module loading. Fatal.
    #[error("IO error reading {path}: {message}")]
    Io { path: String, message: String },

    /// Maximum call depth exceeded. Fatal.
    #[error("Stack overflow at {file}:{line}:{column}: maximum call depth {depth} exceeded")]
    StackOverflow {
        file: String,
        line: u32,
        column: u32,
        depth: usize,
    },
}

impl TakoError {
    /// Convert this error into a diagnostic record for the shared buffer.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let (code, position, suggestion) = match self {
            TakoError::Syntax {
                file, line, column, ..
            } => (
                "syntax",
                Some(DiagnosticPos::new(file, *line, *column)),
                None,
            ),
            TakoError::Import { file, .. } => {
                ("import", Some(DiagnosticPos::new(file, 0, 0)), None)
            }
            TakoError::Type {
                file, line, column, ..
            } => ("type", Some(DiagnosticPos::new(file, *line, *column)), None),
            TakoError::Name {
                file,
                line,
                column,
                suggestion,
                ..
            } => (
                "name",
                Some(DiagnosticPos::new(file, *line, *column)),
                suggestion.clone(),
            ),
            TakoError::Io { .. } => ("io", None, None),
            TakoError::StackOverflow {
                file, line, column, ..
            } => (
                "stack-overflow",
                Some(DiagnosticPos::new(file, *line, *column)),
                None,
            ),
        };
        Diagnostic {
            severity: Severity::Error,
            code: Some(code.to_string()),
            message: self.to_string(),
            position,
            suggestion,
        }
    }
}

/// Diagnostic severity. Errors abort the pipeline; warnings accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Source position attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticPos {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl DiagnosticPos {
    pub fn new(file: &str, line: u32, column: u32) -> Self {
        Self {
            file: file.to_string(),
            line,
            column,
        }
    }
}

/// A single diagnostic record. The pipeline exposes the full buffer after
/// compilation; fatal compilations still return the buffer.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<DiagnosticPos>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    /// Build a warning diagnostic with an optional position.
    pub fn warning(code: &str, message: impl Into<String>, position: Option<DiagnosticPos>) -> Self {
        Self {
            severity: Severity::Warning,
            code: Some(code.to_string()),
            message: message.into(),
            position,
            suggestion: None,
        }
    }
}

/// Levenshtein edit distance, used for "did you mean" suggestions on
/// [`TakoError::Name`].
pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Pick the closest candidate to `name` within an edit distance budget.
pub(crate) fn closest_name<'a, I>(name: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let budget = (name.chars().count() / 3).max(1) + 1;
    let mut best: Option<(usize, &str)> = None;
    for cand in candidates {
        if cand == name {
            continue;
        }
        let d = levenshtein(name, cand);
        if d <= budget {
            match best {
                Some((bd, _)) if bd <= d => {}
                _ => best = Some((d, cand)),
            }
        }
    }
    best.map(|(_, s)| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = TakoError::Syntax {
            file: "song.mf".to_string(),
            line: 2,
            column: 7,
            message: "unexpected character '~'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Syntax error at song.mf:2:7: unexpected character '~'"
        );
    }

    #[test]
    fn test_error_to_diagnostic() {
        let err = TakoError::Name {
            file: "song.mf".to_string(),
            line: 3,
            column: 1,
            message: "undefined name 'repaet'".to_string(),
            suggestion: Some("repeat".to_string()),
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code.as_deref(), Some("name"));
        assert_eq!(diag.suggestion.as_deref(), Some("repeat"));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("repeat", "repaet"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_closest_name() {
        let names = ["repeat", "concat", "overlay"];
        assert_eq!(
            closest_name("repaet", names.iter().copied()),
            Some("repeat".to_string())
        );
        assert_eq!(closest_name("zzzzzz", names.iter().copied()), None);
    }
}
