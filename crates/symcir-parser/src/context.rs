//! Compilation context: configuration, library tables and memoization.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use symcir_core::{Circuit, Diagnostic, DiagnosticKind, Expr, ModelDef};

use crate::error::{Error, Result};
use crate::parser::parse_netlist;
use crate::resolver;
use crate::syslib::SYSTEM_LIBRARY;

/// Compiler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Directory searched last when resolving `.lib`/`.include` paths.
    pub library_dir: PathBuf,
    /// Name of the Laplace variable.
    pub laplace_var: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            library_dir: PathBuf::from("lib"),
            laplace_var: "s".to_string(),
        }
    }
}

/// Globally visible definitions contributed by library files.
#[derive(Debug, Clone, Default)]
pub struct LibraryTables {
    pub models: IndexMap<String, ModelDef>,
    pub subcircuits: IndexMap<String, Arc<Circuit>>,
    pub params: IndexMap<String, Expr>,
}

impl LibraryTables {
    /// Merge the definitions of a compiled library circuit.
    ///
    /// Returns the names that replaced an earlier definition.
    fn merge(&mut self, library: Circuit) -> Vec<String> {
        let mut replaced = Vec::new();
        for (name, def) in library.model_defs {
            if self.models.insert(name.clone(), def).is_some() {
                replaced.push(name);
            }
        }
        for (name, sub) in library.subcircuits {
            if self.subcircuits.insert(name.clone(), Arc::new(sub)).is_some() {
                replaced.push(name);
            }
        }
        for (name, value) in library.param_defs {
            if self.params.insert(name.clone(), value).is_some() {
                replaced.push(name);
            }
        }
        replaced
    }
}

/// State shared by every compilation pass.
///
/// Holds the user library tables (filled by `.lib`/`.include`), the system
/// library tables (the embedded expansion-model prototypes) and the set of
/// library files already compiled.
#[derive(Debug, Clone)]
pub struct CompilationContext {
    pub config: CompilerConfig,
    pub user: LibraryTables,
    pub system: LibraryTables,
    compiled: HashSet<PathBuf>,
    loading: Vec<PathBuf>,
}

impl Default for CompilationContext {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl CompilationContext {
    pub fn new(config: CompilerConfig) -> Self {
        let mut ctx = Self {
            config,
            user: LibraryTables::default(),
            system: LibraryTables::default(),
            compiled: HashSet::new(),
            loading: Vec::new(),
        };
        ctx.load_system_library();
        ctx
    }

    fn load_system_library(&mut self) {
        let mut library = parse_netlist(SYSTEM_LIBRARY, self, None);
        resolver::resolve(&mut library, self);
        for d in library.diagnostics.iter().filter(|d| d.is_error()) {
            log::error!("system library: {}", d);
        }
        library.diagnostics.clear();
        self.system.merge(library);
    }

    pub fn laplace_var(&self) -> &str {
        &self.config.laplace_var
    }

    /// Whether `name` is a model defined in a library.
    pub fn is_library_model(&self, name: &str) -> bool {
        self.user.models.contains_key(name) || self.system.models.contains_key(name)
    }

    /// Library `.model` lookup, user library first.
    pub fn library_model(&self, name: &str) -> Option<&ModelDef> {
        self.user
            .models
            .get(name)
            .or_else(|| self.system.models.get(name))
    }

    /// Library subcircuit lookup, user library first.
    pub fn library_subcircuit(&self, name: &str) -> Option<&Arc<Circuit>> {
        self.user
            .subcircuits
            .get(name)
            .or_else(|| self.system.subcircuits.get(name))
    }

    /// Whether a library file has been compiled already.
    pub fn is_compiled(&self, path: &Path) -> bool {
        fs::canonicalize(path).is_ok_and(|p| self.compiled.contains(&p))
    }

    /// Resolve a library path: as written, then relative to the circuit
    /// directory, then relative to the library directory.
    pub fn resolve_path(&self, spec: &str, source_dir: Option<&Path>) -> Option<PathBuf> {
        let literal = PathBuf::from(spec);
        let mut candidates = vec![literal.clone()];
        if literal.is_relative() {
            if let Some(dir) = source_dir {
                candidates.push(dir.join(spec));
            }
            candidates.push(self.config.library_dir.join(spec));
        }
        candidates
            .into_iter()
            .find(|p| p.is_file())
            .and_then(|p| fs::canonicalize(p).ok())
    }

    /// Compile a library file once and merge its definitions into the user
    /// library tables.
    ///
    /// Returns the diagnostics produced while compiling the file; they belong
    /// to the circuit that referenced it.
    pub fn load_library(&mut self, spec: &str, source_dir: Option<&Path>) -> Result<Vec<Diagnostic>> {
        let path = self
            .resolve_path(spec, source_dir)
            .ok_or_else(|| Error::LibraryNotFound(spec.to_string()))?;
        if self.compiled.contains(&path) {
            log::debug!("library {} already compiled", path.display());
            return Ok(Vec::new());
        }
        if self.loading.contains(&path) {
            return Err(Error::RecursiveLibrary(path));
        }

        let text = fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        self.loading.push(path.clone());
        let dir = path.parent().map(Path::to_path_buf);
        let mut library = parse_netlist(&text, self, dir.as_deref());
        resolver::resolve(&mut library, self);
        self.loading.pop();
        self.compiled.insert(path.clone());
        log::info!("compiled library {}", path.display());

        let mut diagnostics: Vec<Diagnostic> = library
            .diagnostics
            .drain(..)
            .map(|mut d| {
                d.message = format!("{}: {}", path.display(), d.message);
                d
            })
            .collect();
        if !library.elements.is_empty() {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::Syntax,
                0,
                format!(
                    "{}: {} top-level element(s) in library ignored",
                    path.display(),
                    library.elements.len()
                ),
            ));
        }
        for name in self.user.merge(library) {
            log::warn!("library {} redefines '{}'", path.display(), name);
        }
        Ok(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_library_prototypes() {
        let ctx = CompilationContext::default();
        for name in ["D", "QV", "MV", "OV", "OC"] {
            let proto = ctx.library_subcircuit(name).unwrap();
            assert_eq!(proto.errors(), 0, "prototype {}", name);
            assert!(!proto.needs_expansion());
        }
        assert_eq!(ctx.library_subcircuit("QV").unwrap().ports, vec!["c", "b", "e"]);
        assert!(ctx.user.subcircuits.is_empty());
    }

    #[test]
    fn test_config_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.laplace_var, "s");
        assert_eq!(config.library_dir, PathBuf::from("lib"));
    }

    #[test]
    fn test_missing_library() {
        let mut ctx = CompilationContext::default();
        let err = ctx.load_library("does/not/exist.lib", None).unwrap_err();
        assert!(matches!(err, Error::LibraryNotFound(_)));
    }
}
