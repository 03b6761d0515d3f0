// Syntax tree construction with tree-sitter

use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use crate::loader::SourceUnit;
use std::fmt;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser, Tree};

/// A parsed source unit: the tree plus the text it indexes into
pub struct SyntaxTree {
    path: PathBuf,
    module_name: String,
    is_package: bool,
    source: String,
    tree: Tree,
}

impl SyntaxTree {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn is_package(&self) -> bool {
        self.is_package
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("path", &self.path)
            .field("module_name", &self.module_name)
            .finish()
    }
}

/// A file that could not be turned into a syntax tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub path: PathBuf,
    pub cause: String,
}

impl ParseFailure {
    pub fn new(path: &Path, cause: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            cause: cause.into(),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::parse_failure(&self.path, &self.cause)
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.cause)
    }
}

/// Builds syntax trees; one per worker thread
pub struct TreeBuilder {
    parser: Parser,
}

impl TreeBuilder {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::language();
        parser
            .set_language(&language)
            .map_err(|e| Error::parser(format!("Failed to set Python language: {}", e)))?;
        Ok(Self { parser })
    }

    /// Parse one unit. Undecodable text and syntax errors are failures.
    pub fn parse(&mut self, unit: SourceUnit) -> std::result::Result<SyntaxTree, ParseFailure> {
        let SourceUnit {
            path,
            module_name,
            is_package,
            raw_text,
        } = unit;

        let mut source = String::from_utf8(raw_text).map_err(|e| {
            ParseFailure::new(
                &path,
                format!("not valid UTF-8 (byte offset {})", e.utf8_error().valid_up_to()),
            )
        })?;
        if source.starts_with('\u{feff}') {
            source.remove(0);
        }

        let tree = self
            .parser
            .parse(&source, None)
            .ok_or_else(|| ParseFailure::new(&path, "parser produced no tree"))?;

        if tree.root_node().has_error() {
            let cause = first_error(tree.root_node())
                .map(describe_error)
                .unwrap_or_else(|| "syntax error".to_string());
            return Err(ParseFailure::new(&path, cause));
        }

        Ok(SyntaxTree {
            path,
            module_name,
            is_package,
            source,
            tree,
        })
    }
}

/// First ERROR or MISSING node in document order
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find_map(first_error);
    found
}

fn describe_error(node: Node<'_>) -> String {
    let pos = node.start_position();
    if node.is_missing() {
        format!(
            "syntax error: missing `{}` at line {}, column {}",
            node.kind(),
            pos.row + 1,
            pos.column + 1
        )
    } else {
        format!(
            "syntax error at line {}, column {}",
            pos.row + 1,
            pos.column + 1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(source: &[u8]) -> SourceUnit {
        SourceUnit::new("pkg/mod.py", "pkg.mod", source.to_vec())
    }

    #[test]
    fn test_builder_new() {
        assert!(TreeBuilder::new().is_ok());
    }

    #[test]
    fn test_parse_valid_source() {
        let mut builder = TreeBuilder::new().unwrap();
        let tree = builder.parse(unit(b"def f():\n    return 1\n")).unwrap();
        assert_eq!(tree.module_name(), "pkg.mod");
        assert_eq!(tree.root().kind(), "module");
        assert!(!tree.is_package());
    }

    #[test]
    fn test_parse_syntax_error_reports_line() {
        let mut builder = TreeBuilder::new().unwrap();
        let failure = builder
            .parse(unit(b"x = 1\ndef broken(:\n    pass\n"))
            .unwrap_err();
        assert_eq!(failure.path, PathBuf::from("pkg/mod.py"));
        assert!(failure.cause.starts_with("syntax error"));
        assert!(failure.cause.contains("line 2"));
    }

    #[test]
    fn test_parse_invalid_utf8() {
        let mut builder = TreeBuilder::new().unwrap();
        let failure = builder.parse(unit(b"x = '\xff\xfe'\n")).unwrap_err();
        assert!(failure.cause.contains("UTF-8"));
    }

    #[test]
    fn test_parse_strips_bom() {
        let mut builder = TreeBuilder::new().unwrap();
        let tree = builder.parse(unit("\u{feff}X = 1\n".as_bytes())).unwrap();
        assert!(tree.source().starts_with('X'));
    }

    #[test]
    fn test_failure_diagnostic() {
        let failure = ParseFailure::new(Path::new("a.py"), "syntax error at line 1, column 1");
        let diagnostic = failure.to_diagnostic();
        assert_eq!(diagnostic.kind, crate::diagnostics::DiagnosticKind::ParseFailure);
        assert_eq!(diagnostic.severity, crate::diagnostics::Severity::Error);
    }
}
