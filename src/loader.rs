//! # Module Loader
//!
//! Resolves the import graph reachable from an entry module, caching each
//! parsed module by a canonical id. All file I/O happens here, before
//! evaluation; the evaluator is pure over the loaded graph.
//!
//! ## Resolution
//! - `std:<name>` resolves against the bundled standard library (embedded in
//!   the binary via `include_str!`, with an optional on-disk override
//!   directory).
//! - Anything else resolves relative to the importing module's directory.
//!
//! ## Safety
//! After resolution every on-disk path must stay inside the project base
//! directory (after symlink resolution) or the stdlib override directory.
//! Paths escaping via `..` fail with [`TakoError::Import`] naming the
//! importing module.
//!
//! ## Cycles
//! The loader tolerates import cycles: a module already in the cache is not
//! re-entered. The evaluator's two-phase module initialization handles
//! mutually recursive functions; cyclic constant dependencies surface there
//! as name errors.

use crate::ast::Program;
use crate::error::TakoError;
use crate::parser::parse;
use log::{debug, trace};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Bundled standard library sources, keyed by `std:` name.
static STDLIB: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("core", include_str!("../stdlib/core.mf")),
        ("theory", include_str!("../stdlib/theory.mf")),
        ("drums", include_str!("../stdlib/drums.mf")),
        ("vocal", include_str!("../stdlib/vocal.mf")),
        ("patterns", include_str!("../stdlib/patterns.mf")),
    ])
});

/// A loaded, parsed module.
#[derive(Debug)]
pub struct Module {
    /// Cache key: canonical absolute path, `std:<name>`, or the entry name
    /// for in-memory sources.
    pub id: String,
    /// Display name used in diagnostics.
    pub file: String,
    /// Directory for resolving this module's relative imports.
    pub dir: Option<PathBuf>,
    pub program: Program,
    /// Module ids of this module's imports, parallel to `program.imports`.
    pub resolved_imports: Vec<String>,
}

/// The resolved import graph. `order` is a post-order walk, so dependencies
/// come before their importers except on cycles.
#[derive(Debug)]
pub struct ModuleGraph {
    pub modules: HashMap<String, Module>,
    pub order: Vec<String>,
    pub entry: String,
}

impl ModuleGraph {
    pub fn module(&self, id: &str) -> Option<&Module> {
        self.modules.get(id)
    }
}

/// Module loader with project-root confinement.
pub struct Loader {
    base_dir: Option<PathBuf>,
    stdlib_dir: Option<PathBuf>,
}

enum Source {
    Embedded(&'static str),
    Disk(PathBuf),
}

struct Resolved {
    id: String,
    display: String,
    dir: Option<PathBuf>,
    source: Source,
}

impl Loader {
    pub fn new(base_dir: Option<PathBuf>, stdlib_dir: Option<PathBuf>) -> Self {
        Self {
            base_dir,
            stdlib_dir,
        }
    }

    /// Load the graph reachable from an entry file on disk.
    pub fn load_file(&self, path: &Path) -> Result<ModuleGraph, TakoError> {
        let canonical = canonicalize(path)?;
        let source = read_file(&canonical)?;
        let dir = canonical.parent().map(Path::to_path_buf);
        let base = match &self.base_dir {
            Some(dir) => canonicalize(dir)?,
            None => dir.clone().unwrap_or_else(|| PathBuf::from("/")),
        };
        let display = path.display().to_string();
        self.load_graph(
            canonical.display().to_string(),
            source,
            display,
            dir,
            Some(base),
        )
    }

    /// Load the graph reachable from an in-memory entry source. Relative
    /// imports require a configured base directory.
    pub fn load_source(&self, source: &str, file_name: &str) -> Result<ModuleGraph, TakoError> {
        let base = match &self.base_dir {
            Some(dir) => Some(canonicalize(dir)?),
            None => None,
        };
        self.load_graph(
            file_name.to_string(),
            source.to_string(),
            file_name.to_string(),
            base.clone(),
            base,
        )
    }

    fn load_graph(
        &self,
        entry_id: String,
        entry_source: String,
        entry_display: String,
        entry_dir: Option<PathBuf>,
        base: Option<PathBuf>,
    ) -> Result<ModuleGraph, TakoError> {
        let stdlib_base = match &self.stdlib_dir {
            Some(dir) => Some(canonicalize(dir)?),
            None => None,
        };
        let mut graph = ModuleGraph {
            modules: HashMap::new(),
            order: Vec::new(),
            entry: entry_id.clone(),
        };
        self.load_into(
            &mut graph,
            entry_id,
            entry_source,
            entry_display,
            entry_dir,
            base.as_deref(),
            stdlib_base.as_deref(),
        )?;
        debug!("loaded {} module(s)", graph.order.len());
        Ok(graph)
    }

    fn load_into(
        &self,
        graph: &mut ModuleGraph,
        id: String,
        source: String,
        display: String,
        dir: Option<PathBuf>,
        base: Option<&Path>,
        stdlib_base: Option<&Path>,
    ) -> Result<(), TakoError> {
        trace!("loading module {}", display);
        let program = parse(&source, &display)?;
        let imports: Vec<String> = program.imports.iter().map(|i| i.from.clone()).collect();
        graph.modules.insert(
            id.clone(),
            Module {
                id: id.clone(),
                file: display.clone(),
                dir: dir.clone(),
                program,
                resolved_imports: Vec::new(),
            },
        );

        let mut resolved_ids = Vec::new();
        for spec in &imports {
            let resolved = self.resolve(spec, dir.as_deref(), &display, base, stdlib_base)?;
            resolved_ids.push(resolved.id.clone());
            if graph.modules.contains_key(&resolved.id) {
                // cycle or diamond: reuse the cached module
                trace!("module {} already loaded", resolved.id);
                continue;
            }
            let source = match &resolved.source {
                Source::Embedded(text) => (*text).to_string(),
                Source::Disk(path) => read_file(path)?,
            };
            self.load_into(
                graph,
                resolved.id,
                source,
                resolved.display,
                resolved.dir,
                base,
                stdlib_base,
            )?;
        }

        if let Some(module) = graph.modules.get_mut(&id) {
            module.resolved_imports = resolved_ids;
        }
        graph.order.push(id);
        Ok(())
    }

    fn resolve(
        &self,
        spec: &str,
        dir: Option<&Path>,
        importer: &str,
        base: Option<&Path>,
        stdlib_base: Option<&Path>,
    ) -> Result<Resolved, TakoError> {
        if let Some(name) = spec.strip_prefix("std:") {
            return self.resolve_std(name, importer, stdlib_base);
        }

        let dir = dir.ok_or_else(|| TakoError::Import {
            file: importer.to_string(),
            message: format!(
                "cannot resolve relative import \"{}\" without a base directory",
                spec
            ),
        })?;
        let mut candidate = dir.join(spec);
        if !candidate.exists() && candidate.extension().is_none() {
            candidate.set_extension("mf");
        }
        let canonical = canonicalize(&candidate)?;

        let inside_base = base.map_or(false, |b| canonical.starts_with(b));
        let inside_stdlib = stdlib_base.map_or(false, |s| canonical.starts_with(s));
        if !inside_base && !inside_stdlib {
            return Err(TakoError::Import {
                file: importer.to_string(),
                message: format!(
                    "import \"{}\" resolves outside the project base directory",
                    spec
                ),
            });
        }

        Ok(Resolved {
            id: canonical.display().to_string(),
            display: candidate.display().to_string(),
            dir: canonical.parent().map(Path::to_path_buf),
            source: Source::Disk(canonical),
        })
    }

    fn resolve_std(
        &self,
        name: &str,
        importer: &str,
        stdlib_base: Option<&Path>,
    ) -> Result<Resolved, TakoError> {
        if let Some(stdlib) = stdlib_base {
            let candidate = stdlib.join(format!("{}.mf", name));
            if candidate.exists() {
                let canonical = canonicalize(&candidate)?;
                if !canonical.starts_with(stdlib) {
                    return Err(TakoError::Import {
                        file: importer.to_string(),
                        message: format!(
                            "standard library module \"std:{}\" escapes the stdlib directory",
                            name
                        ),
                    });
                }
                return Ok(Resolved {
                    id: format!("std:{}", name),
                    display: candidate.display().to_string(),
                    dir: canonical.parent().map(Path::to_path_buf),
                    source: Source::Disk(canonical),
                });
            }
        }
        match STDLIB.get(name) {
            Some(text) => Ok(Resolved {
                id: format!("std:{}", name),
                display: format!("std:{}", name),
                dir: None,
                source: Source::Embedded(text),
            }),
            None => Err(TakoError::Import {
                file: importer.to_string(),
                message: format!("unknown standard library module \"std:{}\"", name),
            }),
        }
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf, TakoError> {
    std::fs::canonicalize(path).map_err(|e| TakoError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn read_file(path: &Path) -> Result<String, TakoError> {
    std::fs::read_to_string(path).map_err(|e| TakoError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_load_single_file() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "main.mf",
            "export fn main() -> Score { return score {}; }",
        );
        let loader = Loader::new(None, None);
        let graph = loader.load_file(&tmp.path().join("main.mf")).unwrap();
        assert_eq!(graph.order.len(), 1);
        assert!(graph.module(&graph.entry).is_some());
    }

    #[test]
    fn test_import_resolves_relative() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "helper.mf", "export const x = 1;");
        write(
            tmp.path(),
            "main.mf",
            r#"import { x } from "helper.mf";
               export fn main() -> Score { return score {}; }"#,
        );
        let loader = Loader::new(None, None);
        let graph = loader.load_file(&tmp.path().join("main.mf")).unwrap();
        assert_eq!(graph.order.len(), 2);
        // dependency comes first in post-order
        assert!(graph.order[0].ends_with("helper.mf"));
        let entry = graph.module(&graph.entry).unwrap();
        assert_eq!(entry.resolved_imports.len(), 1);
    }

    #[test]
    fn test_import_without_extension() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "helper.mf", "export const x = 1;");
        write(
            tmp.path(),
            "main.mf",
            r#"import { x } from "helper";
               export fn main() -> Score { return score {}; }"#,
        );
        let loader = Loader::new(None, None);
        let graph = loader.load_file(&tmp.path().join("main.mf")).unwrap();
        assert_eq!(graph.order.len(), 2);
    }

    #[test]
    fn test_cycle_tolerated() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "a.mf",
            r#"import { b } from "b.mf";
               export fn a() { return b(); }"#,
        );
        write(
            tmp.path(),
            "b.mf",
            r#"import { a } from "a.mf";
               export fn b() { return 1; }"#,
        );
        let loader = Loader::new(None, None);
        let graph = loader.load_file(&tmp.path().join("a.mf")).unwrap();
        assert_eq!(graph.order.len(), 2);
    }

    #[test]
    fn test_path_traversal_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        fs::create_dir(&project).unwrap();
        write(tmp.path(), "outside.mf", "export const x = 1;");
        write(
            &project,
            "main.mf",
            r#"import { x } from "../outside.mf";
               export fn main() -> Score { return score {}; }"#,
        );
        let loader = Loader::new(None, None);
        let err = loader.load_file(&project.join("main.mf")).unwrap_err();
        match err {
            TakoError::Import { message, .. } => {
                assert!(message.contains("outside the project base"));
            }
            other => panic!("expected import error, got {}", other),
        }
    }

    #[test]
    fn test_missing_import_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "main.mf",
            r#"import { x } from "missing.mf";
               export fn main() -> Score { return score {}; }"#,
        );
        let loader = Loader::new(None, None);
        let err = loader.load_file(&tmp.path().join("main.mf")).unwrap_err();
        assert!(matches!(err, TakoError::Io { .. }));
    }

    #[test]
    fn test_dependency_parse_error_names_dependency() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "broken.mf", "const = ;");
        write(
            tmp.path(),
            "main.mf",
            r#"import { x } from "broken.mf";
               export fn main() -> Score { return score {}; }"#,
        );
        let loader = Loader::new(None, None);
        let err = loader.load_file(&tmp.path().join("main.mf")).unwrap_err();
        match err {
            TakoError::Syntax { file, .. } => assert!(file.contains("broken.mf")),
            other => panic!("expected syntax error, got {}", other),
        }
    }

    #[test]
    fn test_embedded_stdlib() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "main.mf",
            r#"import { kick } from "std:drums";
               export fn main() -> Score { return score {}; }"#,
        );
        let loader = Loader::new(None, None);
        let graph = loader.load_file(&tmp.path().join("main.mf")).unwrap();
        assert!(graph.modules.contains_key("std:drums"));
    }

    #[test]
    fn test_unknown_std_module() {
        let loader = Loader::new(None, None);
        let err = loader
            .load_source(
                r#"import { x } from "std:nonexistent";
                   export fn main() -> Score { return score {}; }"#,
                "<entry>",
            )
            .unwrap_err();
        assert!(matches!(err, TakoError::Import { .. }));
    }

    #[test]
    fn test_in_memory_relative_import_requires_base() {
        let loader = Loader::new(None, None);
        let err = loader
            .load_source(
                r#"import { x } from "helper.mf";
                   export fn main() -> Score { return score {}; }"#,
                "<entry>",
            )
            .unwrap_err();
        match err {
            TakoError::Import { message, .. } => {
                assert!(message.contains("without a base directory"))
            }
            other => panic!("expected import error, got {}", other),
        }
    }
}
