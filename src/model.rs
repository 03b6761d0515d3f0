//! The documentation model handed to renderers.
//!
//! Symbols are stored in one insertion-ordered map keyed by qualified name.
//! Relationships refer to symbols only through those names, so cyclic
//! structures never need shared ownership.

use crate::metadata::PackageMetadata;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

/// File and line range a symbol was defined at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Path relative to the source root
    pub path: PathBuf,
    pub line_start: usize,
    pub line_end: usize,
}

impl SourceLocation {
    pub fn new(path: impl Into<PathBuf>, line_start: usize, line_end: usize) -> Self {
        Self {
            path: path.into(),
            line_start,
            line_end,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line_start)
    }
}

/// Kind of function parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Regular positional or keyword parameter
    Regular,
    /// Positional-only (before /)
    PositionalOnly,
    /// Keyword-only (after *)
    KeywordOnly,
    /// *args
    Args,
    /// **kwargs
    Kwargs,
}

/// A function parameter as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Annotation text from the signature
    pub annotation: Option<String>,
    /// Default value text
    pub default: Option<String>,
    pub kind: ParameterKind,
    /// Type named for this parameter in the docstring
    pub doc_annotation: Option<String>,
}

impl Parameter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            annotation: None,
            default: None,
            kind: ParameterKind::Regular,
            doc_annotation: None,
        }
    }

    pub fn with_annotation(name: &str, annotation: &str) -> Self {
        let mut param = Self::new(name);
        param.annotation = Some(annotation.to_string());
        param
    }

    pub fn default_present(&self) -> bool {
        self.default.is_some()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParameterKind::Args => f.write_str("*")?,
            ParameterKind::Kwargs => f.write_str("**")?,
            _ => {}
        }
        f.write_str(&self.name)?;
        if let Some(ref t) = self.annotation {
            write!(f, ": {}", t)?;
        }
        if let Some(ref d) = self.default {
            if self.annotation.is_some() {
                write!(f, " = {}", d)?;
            } else {
                write!(f, "={}", d)?;
            }
        }
        Ok(())
    }
}

/// Callable surface of a function or method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub parameters: Vec<Parameter>,
    pub return_annotation: Option<String>,
    pub is_async: bool,
    /// Return type named in the docstring
    pub doc_return: Option<String>,
}

impl Signature {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
            return_annotation: None,
            is_async: false,
            doc_return: None,
        }
    }

    /// Render as `def name(...) -> ret`
    pub fn render(&self, name: &str) -> String {
        let params: Vec<String> = self.parameters.iter().map(|p| p.to_string()).collect();
        let ret = self
            .return_annotation
            .as_ref()
            .map(|r| format!(" -> {}", r))
            .unwrap_or_default();
        let prefix = if self.is_async { "async " } else { "" };
        format!("{}def {}({}){}", prefix, name, params.join(", "), ret)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::new()
    }
}

/// Variant-specific data of a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SymbolKind {
    Module {
        is_package: bool,
    },
    Class {
        /// Base expressions as written
        bases: Vec<String>,
    },
    Function(Signature),
    Method(Signature),
    Constant {
        annotation: Option<String>,
        value: Option<String>,
    },
}

impl SymbolKind {
    pub fn label(&self) -> &'static str {
        match self {
            SymbolKind::Module { .. } => "module",
            SymbolKind::Class { .. } => "class",
            SymbolKind::Function(_) => "function",
            SymbolKind::Method(_) => "method",
            SymbolKind::Constant { .. } => "constant",
        }
    }
}

/// One documented item of the package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Dotted path, unique within the package
    pub qualified_name: String,
    /// Last segment of the qualified name
    pub name: String,
    /// Qualified name of the defining module
    pub module: String,
    #[serde(flatten)]
    pub kind: SymbolKind,
    /// Cleaned docstring; empty when the symbol has none
    pub docstring: String,
    pub location: SourceLocation,
    pub decorators: Vec<String>,
}

impl Symbol {
    pub fn new(
        qualified_name: impl Into<String>,
        module: impl Into<String>,
        kind: SymbolKind,
        location: SourceLocation,
    ) -> Self {
        let qualified_name = qualified_name.into();
        let name = qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&qualified_name)
            .to_string();
        Self {
            qualified_name,
            name,
            module: module.into(),
            kind,
            docstring: String::new(),
            location,
            decorators: Vec::new(),
        }
    }

    /// Qualified name of the enclosing scope (`None` for modules)
    pub fn parent(&self) -> Option<&str> {
        if matches!(self.kind, SymbolKind::Module { .. }) {
            return None;
        }
        self.qualified_name.rsplit_once('.').map(|(parent, _)| parent)
    }

    pub fn is_documented(&self) -> bool {
        !self.docstring.is_empty()
    }

    /// Starts with a single underscore; dunder names are public
    pub fn is_private(&self) -> bool {
        self.name.starts_with('_') && !(self.name.starts_with("__") && self.name.ends_with("__"))
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, SymbolKind::Class { .. })
    }

    pub fn is_module(&self) -> bool {
        matches!(self.kind, SymbolKind::Module { .. })
    }

    pub fn signature(&self) -> Option<&Signature> {
        match &self.kind {
            SymbolKind::Function(sig) | SymbolKind::Method(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators
            .iter()
            .any(|d| d == name || d.rsplit('.').next() == Some(name))
    }
}

/// A resolved annotation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeReference {
    /// Canonical type name
    Resolved(String),
    Unknown,
}

impl TypeReference {
    pub fn resolved(name: impl Into<String>) -> Self {
        TypeReference::Resolved(name.into())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeReference::Unknown)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            TypeReference::Resolved(n) => Some(n),
            TypeReference::Unknown => None,
        }
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeReference::Resolved(n) => f.write_str(n),
            TypeReference::Unknown => f.write_str("<unknown>"),
        }
    }
}

/// Where the text behind a type slot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSource {
    Signature,
    Docstring,
    /// Implicit `self`/`cls`
    Receiver,
    Absent,
}

/// One annotation slot after resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedSlot {
    pub name: String,
    pub type_ref: TypeReference,
    pub source: AnnotationSource,
}

/// Resolved types of a symbol, one entry per annotation slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTypes {
    pub parameters: Vec<TypedSlot>,
    pub returns: Option<TypedSlot>,
    pub bases: Vec<TypeReference>,
    /// Annotation of a constant
    pub value: Option<TypedSlot>,
}

impl SymbolTypes {
    /// All slots, in declaration order
    pub fn slots(&self) -> impl Iterator<Item = &TypeReference> {
        self.parameters
            .iter()
            .map(|s| &s.type_ref)
            .chain(self.returns.iter().map(|s| &s.type_ref))
            .chain(self.bases.iter())
            .chain(self.value.iter().map(|s| &s.type_ref))
    }
}

/// Kind of relationship edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Module A imports module B
    Imports,
    /// Class A inherits from class B
    Inherits,
    /// Module B is imported by module A
    UsedBy,
}

/// An outgoing edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub target: String,
    /// Part of a detected cycle
    pub cyclic: bool,
}

/// Edges keyed by source qualified name, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipGraph {
    edges: IndexMap<String, Vec<Edge>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge unless it already exists; returns whether it was new
    pub fn add(&mut self, source: &str, kind: EdgeKind, target: &str) -> bool {
        let edges = self.edges.entry(source.to_string()).or_default();
        if edges.iter().any(|e| e.kind == kind && e.target == target) {
            return false;
        }
        edges.push(Edge {
            kind,
            target: target.to_string(),
            cyclic: false,
        });
        true
    }

    /// Mark an existing edge as part of a cycle
    pub fn flag_cyclic(&mut self, source: &str, kind: EdgeKind, target: &str) {
        if let Some(edges) = self.edges.get_mut(source) {
            for edge in edges.iter_mut() {
                if edge.kind == kind && edge.target == target {
                    edge.cyclic = true;
                }
            }
        }
    }

    pub fn contains(&self, source: &str, kind: EdgeKind, target: &str) -> bool {
        self.find(source, kind, target).is_some()
    }

    pub fn find(&self, source: &str, kind: EdgeKind, target: &str) -> Option<&Edge> {
        self.edges
            .get(source)?
            .iter()
            .find(|e| e.kind == kind && e.target == target)
    }

    /// All edges leaving a symbol
    pub fn edges_from(&self, source: &str) -> &[Edge] {
        self.edges.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Targets of one kind of edge leaving a symbol
    pub fn targets<'a>(&'a self, source: &str, kind: EdgeKind) -> impl Iterator<Item = &'a str> {
        self.edges_from(source)
            .iter()
            .filter(move |e| e.kind == kind)
            .map(|e| e.target.as_str())
    }

    /// Every `(source, edge)` pair
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Edge)> {
        self.edges
            .iter()
            .flat_map(|(source, edges)| edges.iter().map(move |e| (source.as_str(), e)))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edge_count() == 0
    }

    /// Keep only edges for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Edge) -> bool) {
        for (source, edges) in self.edges.iter_mut() {
            edges.retain(|e| keep(source, e));
        }
        self.edges.retain(|_, edges| !edges.is_empty());
    }
}

/// Where an example was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleSource {
    Docstring,
    Test,
}

/// An illustrative snippet attached to a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub owner: String,
    pub source_kind: ExampleSource,
    pub code: String,
    /// Lines in `code`, never above the configured maximum
    pub line_count: usize,
    pub truncated: bool,
    /// Info string of a fenced block (`python`, `pycon`, ...)
    pub language: Option<String>,
    /// Test file the snippet came from
    pub origin: Option<PathBuf>,
    /// 1-based line inside the docstring or test file
    pub line: usize,
}

/// A module outside the package imported by package code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDependency {
    /// Top-level module name
    pub name: String,
    pub stdlib: bool,
    /// Package modules importing it, in discovery order
    pub imported_by: Vec<String>,
}

/// References leaving the package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalReferences {
    pub dependencies: Vec<ExternalDependency>,
    /// Class qualified name -> bases not owned by the package
    pub bases: IndexMap<String, Vec<String>>,
}

impl ExternalReferences {
    pub fn dependency(&self, name: &str) -> Option<&ExternalDependency> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    pub fn bases_of(&self, class: &str) -> &[String] {
        self.bases.get(class).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// One module of the package and its symbols in source order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_package: bool,
    pub symbols: Vec<String>,
}

/// Frozen, fully cross-referenced description of a package
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentationModel {
    metadata: PackageMetadata,
    modules: Vec<ModuleEntry>,
    symbols: IndexMap<String, Symbol>,
    types: IndexMap<String, SymbolTypes>,
    graph: RelationshipGraph,
    examples: Vec<Example>,
    externals: ExternalReferences,
    cross_references: bool,
}

impl DocumentationModel {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        metadata: PackageMetadata,
        modules: Vec<ModuleEntry>,
        symbols: IndexMap<String, Symbol>,
        types: IndexMap<String, SymbolTypes>,
        graph: RelationshipGraph,
        examples: Vec<Example>,
        externals: ExternalReferences,
        cross_references: bool,
    ) -> Self {
        Self {
            metadata,
            modules,
            symbols,
            types,
            graph,
            examples,
            externals,
            cross_references,
        }
    }

    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    pub fn modules(&self) -> &[ModuleEntry] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&ModuleEntry> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Symbols in package order
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn symbol(&self, qualified_name: &str) -> Option<&Symbol> {
        self.symbols.get(qualified_name)
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Symbols of one module, in source order
    pub fn symbols_in<'a>(&'a self, module: &ModuleEntry) -> impl Iterator<Item = &'a Symbol> + 'a {
        let names = module.symbols.clone();
        names.into_iter().filter_map(move |q| self.symbols.get(&q))
    }

    pub fn types(&self, qualified_name: &str) -> Option<&SymbolTypes> {
        self.types.get(qualified_name)
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn examples_for<'a>(&'a self, qualified_name: &'a str) -> impl Iterator<Item = &'a Example> {
        self.examples.iter().filter(move |e| e.owner == qualified_name)
    }

    pub fn externals(&self) -> &ExternalReferences {
        &self.externals
    }

    pub fn cross_references_enabled(&self) -> bool {
        self.cross_references
    }

    /// Symbols without a docstring
    pub fn undocumented(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values().filter(|s| !s.is_documented())
    }

    /// Serialize to JSON
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    /// SHA-256 of the compact JSON form, hex encoded
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }
}
