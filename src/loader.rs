//! Source discovery.
//!
//! Walks a source root and turns every `.py` file into a [`SourceUnit`].
//! Files matching the test patterns are kept apart as companion test
//! sources; they are never documented as modules.

use crate::config::AnalysisConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// One Python file ready for parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Path relative to the source root
    pub path: PathBuf,
    /// Dotted module name
    pub module_name: String,
    /// Whether this is a package `__init__.py`
    pub is_package: bool,
    /// File contents, not yet decoded
    pub raw_text: Vec<u8>,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, module_name: &str, raw_text: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        let is_package = path.file_stem().map_or(false, |s| s == "__init__");
        Self {
            path,
            module_name: module_name.to_string(),
            is_package,
            raw_text: raw_text.into(),
        }
    }
}

/// Everything found under a source root
#[derive(Debug, Default)]
pub struct LoadedSources {
    /// Modules in sorted path order
    pub modules: Vec<SourceUnit>,
    /// Companion test files in sorted path order
    pub tests: Vec<SourceUnit>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Glob patterns matched against relative paths.
///
/// A pattern containing `/` must match the whole relative path; any other
/// pattern matches if it matches a single path component.
#[derive(Debug, Clone)]
pub struct PathFilter {
    whole_path: Vec<Pattern>,
    component: Vec<Pattern>,
}

impl PathFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut whole_path = Vec::new();
        let mut component = Vec::new();
        for raw in patterns {
            let pattern = Pattern::new(raw)?;
            if raw.contains('/') {
                whole_path.push(pattern);
            } else {
                component.push(pattern);
            }
        }
        Ok(Self {
            whole_path,
            component,
        })
    }

    pub fn matches(&self, relative: &Path) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        let text = relative.to_string_lossy().replace('\\', "/");
        if self
            .whole_path
            .iter()
            .any(|p| p.matches_with(&text, options))
        {
            return true;
        }
        relative.iter().any(|part| {
            let part = part.to_string_lossy();
            self.component.iter().any(|p| p.matches_with(&part, options))
        })
    }
}

/// Discovers the Python files of one source root
pub struct SourceLoader {
    root: PathBuf,
    package_prefix: Option<String>,
    excludes: PathFilter,
    tests: PathFilter,
}

impl SourceLoader {
    pub fn new(root: &Path, config: &AnalysisConfig) -> Result<Self> {
        if !root.exists() {
            return Err(Error::PathNotFound(root.to_path_buf()));
        }
        let root = root.canonicalize()?;

        // A root that is itself a package contributes its name to every module
        let package_prefix = if root.join("__init__.py").is_file() {
            root.file_name()
                .map(|n| n.to_string_lossy().replace(['-', '.'], "_"))
        } else {
            None
        };

        Ok(Self {
            root,
            package_prefix,
            excludes: PathFilter::new(&config.exclude_patterns)?,
            tests: PathFilter::new(&config.test_patterns)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enumerate modules and companion tests in sorted path order
    pub fn load(&self) -> Result<LoadedSources> {
        let mut sources = LoadedSources::default();

        if self.root.is_file() {
            let name = self.root.file_name().map(PathBuf::from).unwrap_or_default();
            self.admit(&self.root, &name, &mut sources);
            return Ok(sources);
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_ignored_dir(e));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Dangling links, unreadable dirs and link loops cost one entry
                    let relative = e
                        .path()
                        .map(|p| p.strip_prefix(&self.root).unwrap_or(p).to_path_buf())
                        .unwrap_or_default();
                    debug!("Skipping {}: {}", relative.display(), e);
                    sources.diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::SkippedFile,
                        Location::file(relative),
                        format!("cannot read directory entry: {}", e),
                    ));
                    continue;
                }
            };
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().map_or(false, |e| e == "py") {
                files.push(path.to_path_buf());
            }
        }
        files.sort();

        for path in files {
            let relative = path.strip_prefix(&self.root).unwrap_or(&path).to_path_buf();
            self.admit(&path, &relative, &mut sources);
        }

        debug!(
            "Discovered {} modules and {} test files under {}",
            sources.modules.len(),
            sources.tests.len(),
            self.root.display()
        );
        Ok(sources)
    }

    fn admit(&self, path: &Path, relative: &Path, sources: &mut LoadedSources) {
        let is_test = self.tests.matches(relative);
        if !is_test && self.excludes.matches(relative) {
            debug!("Excluded {}", relative.display());
            return;
        }

        let raw_text = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                sources
                    .diagnostics
                    .push(Diagnostic::parse_failure(relative, format!("cannot read file: {}", e)));
                return;
            }
        };

        if is_test {
            let stem = relative
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            sources.tests.push(SourceUnit::new(relative, &stem, raw_text));
            return;
        }

        match self.module_name(relative) {
            Some(name) => sources.modules.push(SourceUnit::new(relative, &name, raw_text)),
            None => sources.diagnostics.push(Diagnostic::warning(
                DiagnosticKind::SkippedFile,
                Location::file(relative),
                "path is not an importable module name",
            )),
        }
    }

    /// Derive the dotted module name of a relative path
    pub fn module_name(&self, relative: &Path) -> Option<String> {
        let mut parts: Vec<String> = relative
            .iter()
            .map(|s| s.to_string_lossy().to_string())
            .collect();

        let last = parts.pop()?;
        let stem = last.strip_suffix(".py")?.to_string();
        if stem != "__init__" {
            parts.push(stem);
        }

        match &self.package_prefix {
            Some(prefix) => parts.insert(0, prefix.clone()),
            None => {
                if parts.len() > 1 && (parts[0] == "src" || parts[0] == "lib") {
                    parts.remove(0);
                }
            }
        }

        if parts.is_empty() || !parts.iter().all(|p| is_identifier(p)) {
            return None;
        }
        Some(parts.join("."))
    }
}

/// Directories never descended into
fn is_ignored_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || name == "__pycache__"
        || name == "site-packages"
        || entry.path().join("pyvenv.cfg").is_file()
}

/// Python identifier check (ASCII plus any non-ASCII letter)
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}
