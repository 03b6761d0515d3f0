// Final merge of every stage into one frozen documentation model

use crate::analysis::graph::Relationships;
use crate::config::AnalysisConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::error::{Error, Result};
use crate::metadata::PackageMetadata;
use crate::model::{
    DocumentationModel, EdgeKind, Example, ModuleEntry, RelationshipGraph, Symbol, SymbolTypes,
};
use crate::parser::ParsedModule;
use indexmap::IndexMap;
use tracing::debug;

/// Everything the concurrent stages produced
#[derive(Debug, Default)]
pub struct StageOutputs {
    pub modules: Vec<ParsedModule>,
    pub types: IndexMap<String, SymbolTypes>,
    pub relationships: Relationships,
    pub examples: Vec<Example>,
}

fn edge_label(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Imports => "imports",
        EdgeKind::Inherits => "inherits",
        EdgeKind::UsedBy => "used_by",
    }
}

/// Build the model, or fail with a structural violation when two symbols
/// share a qualified name
pub fn assemble(
    outputs: StageOutputs,
    metadata: PackageMetadata,
    config: &AnalysisConfig,
) -> Result<(DocumentationModel, Vec<Diagnostic>)> {
    let StageOutputs {
        modules,
        types,
        relationships,
        examples,
    } = outputs;
    let mut diagnostics = Vec::new();

    let mut symbols: IndexMap<String, Symbol> = IndexMap::new();
    let mut entries = Vec::with_capacity(modules.len());
    for module in modules {
        let mut names = Vec::with_capacity(module.symbols.len());
        for symbol in module.symbols {
            if let Some(existing) = symbols.get(&symbol.qualified_name) {
                return Err(Error::structural(
                    symbol.qualified_name.clone(),
                    existing.location.to_string(),
                    symbol.location.to_string(),
                ));
            }
            names.push(symbol.qualified_name.clone());
            symbols.insert(symbol.qualified_name.clone(), symbol);
        }
        entries.push(ModuleEntry {
            name: module.module_name,
            path: module.path,
            is_package: module.is_package,
            symbols: names,
        });
    }

    let graph = if config.enable_cross_references {
        let mut graph = relationships.graph;
        graph.retain(|source, edge| {
            let keep = symbols.contains_key(source) && symbols.contains_key(&edge.target);
            if !keep {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::DanglingEdge,
                    Location::symbol(source),
                    format!(
                        "dropped {} edge to `{}`: endpoint is not a package symbol",
                        edge_label(edge.kind),
                        edge.target
                    ),
                ));
            }
            keep
        });
        graph
    } else {
        RelationshipGraph::new()
    };

    let mut kept_examples = Vec::with_capacity(examples.len());
    for example in examples {
        if symbols.contains_key(&example.owner) {
            kept_examples.push(example);
        } else {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::DanglingEdge,
                Location::symbol(&example.owner),
                "dropped example for a symbol that is not in the model",
            ));
        }
    }

    let types: IndexMap<String, SymbolTypes> = types
        .into_iter()
        .filter(|(name, _)| symbols.contains_key(name))
        .collect();

    debug!(
        "Assembled {} modules, {} symbols, {} edges, {} examples",
        entries.len(),
        symbols.len(),
        graph.edge_count(),
        kept_examples.len()
    );

    let model = DocumentationModel::from_parts(
        metadata,
        entries,
        symbols,
        types,
        graph,
        kept_examples,
        relationships.externals,
        config.enable_cross_references,
    );
    Ok((model, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExampleSource, SourceLocation, SymbolKind};
    use std::path::PathBuf;

    fn module(name: &str, path: &str, extra: &[&str]) -> ParsedModule {
        let mut parsed = ParsedModule::new(name, PathBuf::from(path), false);
        parsed.symbols.push(Symbol::new(
            name,
            name,
            SymbolKind::Module { is_package: false },
            SourceLocation::new(path, 1, 10),
        ));
        for (i, symbol) in extra.iter().enumerate() {
            parsed.symbols.push(Symbol::new(
                format!("{}.{}", name, symbol),
                name,
                SymbolKind::Class { bases: Vec::new() },
                SourceLocation::new(path, i + 2, i + 2),
            ));
        }
        parsed
    }

    fn example(owner: &str) -> Example {
        Example {
            owner: owner.to_string(),
            source_kind: ExampleSource::Docstring,
            code: "x()".to_string(),
            line_count: 1,
            truncated: false,
            language: None,
            origin: None,
            line: 1,
        }
    }

    #[test]
    fn test_module_entries_keep_source_order() {
        let outputs = StageOutputs {
            modules: vec![module("pkg.b", "pkg/b.py", &["Zed", "Alpha"]), module("pkg.a", "pkg/a.py", &[])],
            ..StageOutputs::default()
        };
        let (model, diagnostics) =
            assemble(outputs, PackageMetadata::default(), &AnalysisConfig::default()).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(model.modules()[0].name, "pkg.b");
        assert_eq!(model.modules()[0].symbols, vec!["pkg.b", "pkg.b.Zed", "pkg.b.Alpha"]);
        assert_eq!(model.symbol_count(), 4);
    }

    #[test]
    fn test_duplicate_names_are_structural() {
        let outputs = StageOutputs {
            modules: vec![module("pkg.a", "pkg/a.py", &[]), module("pkg.a", "pkg/a/__init__.py", &[])],
            ..StageOutputs::default()
        };
        let err = assemble(outputs, PackageMetadata::default(), &AnalysisConfig::default())
            .unwrap_err();
        assert!(err.is_structural());
        let message = err.to_string();
        assert!(message.contains("pkg/a.py:1"));
        assert!(message.contains("pkg/a/__init__.py:1"));
    }

    #[test]
    fn test_dangling_edges_and_orphan_examples_are_dropped() {
        let mut relationships = Relationships::default();
        relationships.graph.add("pkg.a", EdgeKind::Imports, "pkg.b");
        relationships.graph.add("pkg.a", EdgeKind::Imports, "pkg.gone");
        let outputs = StageOutputs {
            modules: vec![module("pkg.a", "pkg/a.py", &[]), module("pkg.b", "pkg/b.py", &[])],
            relationships,
            examples: vec![example("pkg.a"), example("pkg.gone.f")],
            ..StageOutputs::default()
        };
        let (model, diagnostics) =
            assemble(outputs, PackageMetadata::default(), &AnalysisConfig::default()).unwrap();

        assert_eq!(model.graph().edge_count(), 1);
        assert_eq!(model.examples().len(), 1);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.kind == DiagnosticKind::DanglingEdge));
    }

    #[test]
    fn test_cross_references_disabled() {
        let mut relationships = Relationships::default();
        relationships.graph.add("pkg.a", EdgeKind::Imports, "pkg.b");
        let outputs = StageOutputs {
            modules: vec![module("pkg.a", "pkg/a.py", &[]), module("pkg.b", "pkg/b.py", &[])],
            relationships,
            ..StageOutputs::default()
        };
        let config = AnalysisConfig {
            enable_cross_references: false,
            ..AnalysisConfig::default()
        };
        let (model, _) = assemble(outputs, PackageMetadata::default(), &config).unwrap();
        assert!(model.graph().is_empty());
        assert!(!model.cross_references_enabled());
    }
}
