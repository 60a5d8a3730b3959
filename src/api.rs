//! # Public API
//!
//! This module contains the main entry points for the Tako compiler library.
//!
//! ## Compilation Functions
//!
//! - [`compile()`] - source string to canonical IR JSON (recommended)
//! - [`compile_to_ir()`] - source string to the typed [`ScoreIr`] record
//! - [`Compiler`] - configurable pipeline (base directory for relative
//!   imports, stdlib override directory, entry file name) that always
//!   returns the full diagnostics buffer, even on fatal errors
//!
//! ## Typical Usage
//!
//! ```rust
//! use tako::compile;
//!
//! let source = r#"
//! export fn main() -> Score {
//!   return score {
//!     meter { 1:1 -> 4/4; } tempo { 1:1 -> 120bpm; }
//!     sound "piano" kind instrument {}
//!     track "lead" role Instrument sound "piano" {
//!       place 1:1 clip { note C4 1/4; note E4 1/4; note G4 1/2; };
//!     }
//!   };
//! }
//! "#;
//!
//! let json = compile(source)?;
//! // hand the JSON to a MIDI/MusicXML/audio renderer
//! # Ok::<(), tako::TakoError>(())
//! ```
//!
//! ## Compiling Files with Imports
//!
//! ```rust,no_run
//! use tako::Compiler;
//!
//! let output = Compiler::new().compile_file("songs/main.mf".as_ref());
//! for diag in &output.diagnostics {
//!     eprintln!("{:?}: {}", diag.severity, diag.message);
//! }
//! if let Some(ir) = output.ir {
//!     println!("{}", ir.to_json());
//! }
//! ```

use crate::error::{Diagnostic, TakoError};
use crate::eval::evaluate;
use crate::ir::ScoreIr;
use crate::loader::Loader;
use crate::normalize::normalize;
use std::path::{Path, PathBuf};

/// Result of a [`Compiler`] run: the IR (absent on fatal errors) plus the
/// full diagnostics buffer. Fatal errors appear in the buffer too.
pub struct CompileOutput {
    pub ir: Option<ScoreIr>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    /// True when compilation produced IR with no error diagnostics.
    pub fn is_ok(&self) -> bool {
        self.ir.is_some()
            && !self
                .diagnostics
                .iter()
                .any(|d| d.severity == crate::error::Severity::Error)
    }
}

/// Configurable compilation pipeline.
#[derive(Default)]
pub struct Compiler {
    base_dir: Option<PathBuf>,
    stdlib_dir: Option<PathBuf>,
    file_name: String,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            base_dir: None,
            stdlib_dir: None,
            file_name: "<source>".to_string(),
        }
    }

    /// Project base directory: relative imports must stay inside it.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// On-disk standard library overriding the bundled one.
    pub fn stdlib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stdlib_dir = Some(dir.into());
        self
    }

    /// Display name for in-memory sources in diagnostics.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Compile an in-memory source string.
    pub fn compile_source(&self, source: &str) -> CompileOutput {
        let (result, diagnostics) = self.pipeline(Input::Source(source));
        into_output(result, diagnostics)
    }

    /// Compile an entry file and the import graph reachable from it.
    pub fn compile_file(&self, path: &Path) -> CompileOutput {
        let (result, diagnostics) = self.pipeline(Input::File(path));
        into_output(result, diagnostics)
    }

    pub(crate) fn pipeline(&self, input: Input) -> (Result<ScoreIr, TakoError>, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let loader = Loader::new(self.base_dir.clone(), self.stdlib_dir.clone());
        let result = (|| {
            let graph = match input {
                Input::Source(source) => loader.load_source(source, &self.file_name)?,
                Input::File(path) => loader.load_file(path)?,
            };
            let score = evaluate(&graph, &mut diagnostics)?;
            let entry_file = graph
                .module(&graph.entry)
                .map(|m| m.file.clone())
                .unwrap_or_default();
            normalize(&score, &entry_file, &mut diagnostics)
        })();
        (result, diagnostics)
    }
}

pub(crate) enum Input<'a> {
    Source(&'a str),
    File(&'a Path),
}

fn into_output(
    result: Result<ScoreIr, TakoError>,
    mut diagnostics: Vec<Diagnostic>,
) -> CompileOutput {
    match result {
        Ok(ir) => CompileOutput {
            ir: Some(ir),
            diagnostics,
        },
        Err(error) => {
            diagnostics.push(error.to_diagnostic());
            CompileOutput {
                ir: None,
                diagnostics,
            }
        }
    }
}

/// Compile a Tako source string to canonical IR JSON.
///
/// This is the main entry point for the library. Fatal errors return
/// [`TakoError`]; warnings are dropped (use [`Compiler`] to read them).
///
/// # Pipeline
/// 1. Tokenize and parse the source (plus any `std:` imports)
/// 2. Initialize the module graph and run `main()`
/// 3. Normalize the resulting score into the IR
/// 4. Serialize with the canonical field order
///
/// # Example
/// ```rust
/// use tako::compile;
///
/// let json = compile("export fn main() -> Score { return score {}; }")?;
/// assert!(json.contains("\"irVersion\""));
/// # Ok::<(), tako::TakoError>(())
/// ```
///
/// # Errors
/// Returns [`TakoError`] if lexing, parsing, evaluation or normalization
/// fails.
pub fn compile(source: &str) -> Result<String, TakoError> {
    compile_to_ir(source).map(|ir| ir.to_json())
}

/// Compile a Tako source string to the typed IR record.
///
/// # Example
/// ```rust
/// use tako::compile_to_ir;
///
/// let ir = compile_to_ir("export fn main() -> Score { return score {}; }")?;
/// assert!(ir.tracks.is_empty());
/// # Ok::<(), tako::TakoError>(())
/// ```
pub fn compile_to_ir(source: &str) -> Result<ScoreIr, TakoError> {
    let (result, _diagnostics) = Compiler::new().pipeline(Input::Source(source));
    result
}
