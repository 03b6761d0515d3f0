// Relationship graph between modules and classes of the package

use crate::analysis::imports::{ImportResolver, ImportTarget};
use crate::analysis::index::SymbolIndex;
use crate::analysis::types::{Scope, TypeResolver};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::model::{EdgeKind, ExternalDependency, ExternalReferences, RelationshipGraph, SymbolKind};
use crate::parser::ParsedModule;
use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Edges, external references and findings of the relationship stage
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    pub graph: RelationshipGraph,
    pub externals: ExternalReferences,
    pub diagnostics: Vec<Diagnostic>,
}

/// Derives import, inheritance and used-by edges
pub struct RelationshipBuilder<'a> {
    index: &'a SymbolIndex<'a>,
    types: &'a TypeResolver<'a>,
    imports: ImportResolver,
}

impl<'a> RelationshipBuilder<'a> {
    pub fn new(
        index: &'a SymbolIndex<'a>,
        types: &'a TypeResolver<'a>,
        modules: &[ParsedModule],
    ) -> Self {
        Self {
            index,
            types,
            imports: ImportResolver::new(modules.iter().map(|m| m.module_name.as_str())),
        }
    }

    pub fn build(&self, modules: &[ParsedModule]) -> Relationships {
        let mut rel = Relationships::default();
        let mut dependencies: IndexMap<String, ExternalDependency> = IndexMap::new();

        for module in modules {
            for import in &module.imports {
                for target in self.imports.resolve(import, module) {
                    match target {
                        ImportTarget::Package(target) => {
                            if target != module.module_name {
                                rel.graph.add(&module.module_name, EdgeKind::Imports, &target);
                            }
                        }
                        ImportTarget::External { name, stdlib } => {
                            let dependency =
                                dependencies
                                    .entry(name.clone())
                                    .or_insert_with(|| ExternalDependency {
                                        name,
                                        stdlib,
                                        imported_by: Vec::new(),
                                    });
                            if !dependency.imported_by.contains(&module.module_name) {
                                dependency.imported_by.push(module.module_name.clone());
                            }
                        }
                        ImportTarget::Unresolved(text) => {
                            rel.diagnostics.push(Diagnostic::warning(
                                DiagnosticKind::DanglingEdge,
                                Location::at(&module.path, import.line)
                                    .with_symbol(&module.module_name),
                                format!("import `{}` does not resolve inside the package", text),
                            ));
                        }
                    }
                }
            }
        }
        rel.externals.dependencies = dependencies.into_values().collect();

        self.add_inheritance(modules, &mut rel);

        for kind in [EdgeKind::Imports, EdgeKind::Inherits] {
            flag_cycles(&mut rel.graph, kind, &mut rel.diagnostics);
        }
        add_used_by(&mut rel.graph);

        debug!(
            "Built {} edges, {} external dependencies",
            rel.graph.edge_count(),
            rel.externals.dependencies.len()
        );
        rel
    }

    fn add_inheritance(&self, modules: &[ParsedModule], rel: &mut Relationships) {
        for symbol in modules.iter().flat_map(|m| m.symbols.iter()) {
            let SymbolKind::Class { bases } = &symbol.kind else {
                continue;
            };
            let scope = Scope::of(symbol);
            for base in bases {
                // `Base[T]` inherits from `Base`
                let name = base.split('[').next().unwrap_or(base).trim();
                let target = self
                    .types
                    .package_symbol(name, &scope)
                    .filter(|q| *q != symbol.qualified_name)
                    .filter(|q| self.index.get(q).is_some_and(|s| s.is_class()));
                match target {
                    Some(target) => {
                        rel.graph
                            .add(&symbol.qualified_name, EdgeKind::Inherits, &target);
                    }
                    None => rel
                        .externals
                        .bases
                        .entry(symbol.qualified_name.clone())
                        .or_default()
                        .push(base.clone()),
                }
            }
        }
    }
}

/// Find cycles among edges of one kind.
///
/// Every strongly connected component with more than one node (or a
/// self-loop) is a cycle: each edge inside it is flagged and the component
/// gets one warning naming a concrete cycle through its first node.
fn flag_cycles(graph: &mut RelationshipGraph, kind: EdgeKind, diagnostics: &mut Vec<Diagnostic>) {
    let edges: Vec<(String, String)> = graph
        .iter()
        .filter(|(_, e)| e.kind == kind)
        .map(|(source, e)| (source.to_string(), e.target.clone()))
        .collect();

    let mut digraph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for (source, target) in &edges {
        digraph.add_edge(source.as_str(), target.as_str(), ());
    }

    // Node insertion order keeps reports stable across runs
    let order: HashMap<&str, usize> = digraph.nodes().enumerate().map(|(i, n)| (n, i)).collect();
    let rank = |node: &str| order.get(node).copied().unwrap_or(usize::MAX);

    let mut components: Vec<Vec<&str>> = tarjan_scc(&digraph)
        .into_iter()
        .filter(|c| c.len() > 1 || c.first().is_some_and(|n| digraph.contains_edge(*n, *n)))
        .collect();
    for component in &mut components {
        component.sort_by_key(|n| rank(n));
    }
    components.sort_by_key(|c| c.first().map_or(usize::MAX, |n| rank(n)));

    let label = match kind {
        EdgeKind::Inherits => "inheritance",
        _ => "import",
    };
    for component in &components {
        let members: HashSet<&str> = component.iter().copied().collect();
        for (source, target) in &edges {
            if members.contains(source.as_str()) && members.contains(target.as_str()) {
                graph.flag_cyclic(source, kind, target);
            }
        }
        let path = cycle_through(&digraph, component[0], &members);
        diagnostics.push(Diagnostic::warning(
            DiagnosticKind::GraphCycle,
            Location::symbol(component[0]),
            format!("{} cycle: {}", label, path.join(" -> ")),
        ));
    }
}

/// Shortest walk from `start` back to itself inside one component
fn cycle_through<'g>(
    digraph: &DiGraphMap<&'g str, ()>,
    start: &'g str,
    members: &HashSet<&'g str>,
) -> Vec<&'g str> {
    let mut previous: HashMap<&'g str, &'g str> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        for next in digraph.neighbors(node) {
            if !members.contains(next) {
                continue;
            }
            if next == start {
                let mut back = Vec::new();
                let mut at = node;
                while at != start {
                    back.push(at);
                    match previous.get(at) {
                        Some(prev) => at = *prev,
                        None => break,
                    }
                }
                back.reverse();

                let mut path = vec![start];
                path.extend(back);
                path.push(start);
                return path;
            }
            if !previous.contains_key(next) {
                previous.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    vec![start, start]
}

/// Mirror every import edge as a used-by edge on its target
fn add_used_by(graph: &mut RelationshipGraph) {
    let mirrored: Vec<(String, String, bool)> = graph
        .iter()
        .filter(|(_, e)| e.kind == EdgeKind::Imports)
        .map(|(source, e)| (e.target.clone(), source.to_string(), e.cyclic))
        .collect();

    for (target, source, cyclic) in mirrored {
        graph.add(&target, EdgeKind::UsedBy, &source);
        if cyclic {
            graph.flag_cyclic(&target, EdgeKind::UsedBy, &source);
        }
    }
}
