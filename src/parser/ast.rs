// Extraction results for a single Python module
//
// Symbols use the package-wide model types; everything else here is
// per-file scaffolding consumed by the analysis stages.

use crate::diagnostics::Diagnostic;
use crate::model::Symbol;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Symbols, imports and findings of one module
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedModule {
    /// Dotted module name
    pub module_name: String,
    /// File path relative to the source root
    pub path: PathBuf,
    /// Whether the file is a package `__init__.py`
    pub is_package: bool,
    /// Module symbol first, then everything else in source order
    pub symbols: Vec<Symbol>,
    /// Every import in the file, including lazy and dynamic ones
    pub imports: Vec<Import>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedModule {
    pub fn new(module_name: &str, path: PathBuf, is_package: bool) -> Self {
        Self {
            module_name: module_name.to_string(),
            path,
            is_package,
            symbols: Vec::new(),
            imports: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Package that relative imports are resolved against
    pub fn package(&self) -> &str {
        if self.is_package {
            &self.module_name
        } else {
            self.module_name
                .rsplit_once('.')
                .map(|(parent, _)| parent)
                .unwrap_or("")
        }
    }

    pub fn symbol(&self, qualified_name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.qualified_name == qualified_name)
    }

    /// Check if the module defines anything besides itself
    pub fn is_empty(&self) -> bool {
        self.symbols.iter().all(|s| s.is_module())
    }
}

/// An import statement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Import {
    /// The module being imported
    pub module: String,
    /// Specific names imported (for `from x import y`)
    pub names: Vec<ImportedName>,
    /// Import kind
    pub kind: ImportKind,
    /// Line number
    pub line: usize,
    /// Inside a function body
    pub lazy: bool,
}

impl Import {
    /// Create a simple `import x` style import
    pub fn simple(module: &str, line: usize) -> Self {
        Self {
            module: module.to_string(),
            names: vec![ImportedName::new(module)],
            kind: ImportKind::Direct,
            line,
            lazy: false,
        }
    }

    /// Create a `from x import y` style import
    pub fn from_import(module: &str, names: Vec<ImportedName>, line: usize) -> Self {
        Self {
            module: module.to_string(),
            names,
            kind: ImportKind::From,
            line,
            lazy: false,
        }
    }

    /// Create a relative import
    pub fn relative(module: &str, names: Vec<ImportedName>, level: usize, line: usize) -> Self {
        Self {
            module: module.to_string(),
            names,
            kind: ImportKind::Relative { level },
            line,
            lazy: false,
        }
    }

    /// Create an `importlib.import_module("x")` record
    pub fn dynamic(module: &str, line: usize) -> Self {
        Self {
            module: module.to_string(),
            names: Vec::new(),
            kind: ImportKind::Dynamic,
            line,
            lazy: false,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.names.iter().any(|n| n.name == "*")
    }
}

/// A single imported name with optional alias
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportedName {
    /// Original name
    pub name: String,
    /// Alias (from `as` clause)
    pub alias: Option<String>,
}

impl ImportedName {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
        }
    }

    pub fn with_alias(name: &str, alias: &str) -> Self {
        Self {
            name: name.to_string(),
            alias: Some(alias.to_string()),
        }
    }

    /// Get the name as used in code (alias if present, otherwise original)
    pub fn used_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Kind of import statement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x` or `import x as y`
    Direct,
    /// `from x import y`
    From,
    /// `from . import y` or `from ..x import y`
    Relative { level: usize },
    /// `importlib.import_module("x")` or `__import__("x")`
    Dynamic,
}

impl ImportKind {
    pub fn is_relative(&self) -> bool {
        matches!(self, ImportKind::Relative { .. })
    }
}

/// A call expression found in a test file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Last name of the callee (`Widget` for `shapes.Widget(...)`)
    pub callee: String,
    /// Enclosing simple statement, or the call itself
    pub snippet: String,
    pub line: usize,
}

/// Call sites of one companion test file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSource {
    /// Path relative to the source root
    pub path: PathBuf,
    /// File stem, e.g. `test_shapes`
    pub stem: String,
    pub calls: Vec<CallSite>,
}

impl TestSource {
    /// Whether this file tests the module whose last segment is `module`
    pub fn covers(&self, module: &str) -> bool {
        self.stem == format!("test_{}", module) || self.stem == format!("{}_test", module)
    }
}
