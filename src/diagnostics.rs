//! Non-fatal findings surfaced next to the documentation model.
//!
//! Every stage returns its own diagnostics; the analyzer concatenates them
//! in a fixed stage order so two runs over the same tree report the same
//! sequence.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// Prevented the model from being assembled
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// What kind of condition was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// A file could not be read or parsed
    ParseFailure,
    /// A file was left out before parsing
    SkippedFile,
    /// An annotation could not be resolved
    UnresolvedType,
    /// An annotation matched several package symbols
    AmbiguousType,
    /// Signature and docstring disagree about a type
    TypeConflict,
    /// An import or inheritance cycle
    GraphCycle,
    /// An edge or example pointing at a missing symbol was dropped
    DanglingEdge,
    /// `importlib`/`__import__` usage
    DynamicImport,
    /// A name was bound twice in one scope
    Redefinition,
    /// Duplicate qualified names
    StructuralViolation,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::ParseFailure => "parse-failure",
            DiagnosticKind::SkippedFile => "skipped-file",
            DiagnosticKind::UnresolvedType => "unresolved-type",
            DiagnosticKind::AmbiguousType => "ambiguous-type",
            DiagnosticKind::TypeConflict => "type-conflict",
            DiagnosticKind::GraphCycle => "graph-cycle",
            DiagnosticKind::DanglingEdge => "dangling-edge",
            DiagnosticKind::DynamicImport => "dynamic-import",
            DiagnosticKind::Redefinition => "redefinition",
            DiagnosticKind::StructuralViolation => "structural-violation",
        }
    }
}

/// Where a diagnostic points
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub path: Option<PathBuf>,
    pub line: Option<usize>,
    /// Qualified name of the symbol involved, if any
    pub symbol: Option<String>,
}

impl Location {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            line: None,
            symbol: None,
        }
    }

    pub fn at(path: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            path: Some(path.into()),
            line: Some(line),
            symbol: None,
        }
    }

    pub fn symbol(qualified_name: impl Into<String>) -> Self {
        Self {
            path: None,
            line: None,
            symbol: Some(qualified_name.into()),
        }
    }

    pub fn with_symbol(mut self, qualified_name: impl Into<String>) -> Self {
        self.symbol = Some(qualified_name.into());
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, self.line, &self.symbol) {
            (Some(p), Some(l), _) => write!(f, "{}:{}", p.display(), l),
            (Some(p), None, _) => write!(f, "{}", p.display()),
            (None, _, Some(s)) => f.write_str(s),
            (None, _, None) => f.write_str("<package>"),
        }
    }
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        kind: DiagnosticKind,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            location,
            message: message.into(),
        }
    }

    pub fn info(kind: DiagnosticKind, location: Location, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, kind, location, message)
    }

    pub fn warning(kind: DiagnosticKind, location: Location, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, kind, location, message)
    }

    pub fn error(kind: DiagnosticKind, location: Location, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, kind, location, message)
    }

    /// A file that failed to parse
    pub fn parse_failure(path: &Path, cause: impl Into<String>) -> Self {
        Self::error(DiagnosticKind::ParseFailure, Location::file(path), cause)
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity,
            self.kind.as_str(),
            self.location,
            self.message
        )
    }
}

/// Count diagnostics at or above a severity
pub fn count_at_least(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity >= severity).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_line() {
        let d = Diagnostic::warning(
            DiagnosticKind::UnresolvedType,
            Location::at("pkg/mod.py", 12),
            "cannot resolve `Frob`",
        );
        assert_eq!(
            d.to_string(),
            "warning[unresolved-type] pkg/mod.py:12: cannot resolve `Frob`"
        );
    }

    #[test]
    fn test_display_symbol_only() {
        let d = Diagnostic::info(
            DiagnosticKind::GraphCycle,
            Location::symbol("pkg.a"),
            "cycle",
        );
        assert_eq!(d.to_string(), "info[graph-cycle] pkg.a: cycle");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Fatal > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_count_at_least() {
        let diags = vec![
            Diagnostic::info(DiagnosticKind::Redefinition, Location::symbol("a"), "x"),
            Diagnostic::warning(DiagnosticKind::GraphCycle, Location::symbol("b"), "y"),
            Diagnostic::parse_failure(Path::new("c.py"), "z"),
        ];
        assert_eq!(count_at_least(&diags, Severity::Warning), 2);
        assert_eq!(count_at_least(&diags, Severity::Fatal), 0);
        assert!(!diags[2].is_fatal());
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&DiagnosticKind::DanglingEdge).unwrap();
        assert_eq!(json, "\"dangling-edge\"");
    }
}
