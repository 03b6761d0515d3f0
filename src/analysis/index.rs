// Read-only lookup tables over every extracted symbol

use crate::analysis::imports::ImportResolver;
use crate::model::{Symbol, SymbolKind};
use crate::parser::ParsedModule;
use std::collections::{HashMap, HashSet};

/// Re-export chains longer than this are treated as unresolvable
const MAX_REEXPORT_DEPTH: usize = 8;

/// Qualified names, per-module import bindings and simple-name lookups
pub struct SymbolIndex<'a> {
    symbols: HashMap<&'a str, &'a Symbol>,
    modules: HashSet<&'a str>,
    /// module -> local name -> dotted path it refers to
    bindings: HashMap<&'a str, HashMap<String, String>>,
    /// simple name -> qualified names of classes and constants
    simple_names: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> SymbolIndex<'a> {
    pub fn build(modules: &'a [ParsedModule]) -> Self {
        let mut symbols = HashMap::new();
        let mut module_names = HashSet::new();
        let mut simple_names: HashMap<&'a str, Vec<&'a str>> = HashMap::new();

        for module in modules {
            module_names.insert(module.module_name.as_str());
            for symbol in &module.symbols {
                symbols
                    .entry(symbol.qualified_name.as_str())
                    .or_insert(symbol);
                if matches!(symbol.kind, SymbolKind::Class { .. } | SymbolKind::Constant { .. }) {
                    let entry = simple_names.entry(symbol.name.as_str()).or_default();
                    if !entry.contains(&symbol.qualified_name.as_str()) {
                        entry.push(symbol.qualified_name.as_str());
                    }
                }
            }
        }

        let mut index = Self {
            symbols,
            modules: module_names,
            bindings: HashMap::new(),
            simple_names,
        };

        let mut bindings = HashMap::new();
        for module in modules {
            bindings.insert(module.module_name.as_str(), index.module_bindings(module, modules));
        }
        index.bindings = bindings;
        index
    }

    fn module_bindings(
        &self,
        module: &ParsedModule,
        modules: &'a [ParsedModule],
    ) -> HashMap<String, String> {
        let mut bound = HashMap::new();
        for import in module.imports.iter().filter(|i| !i.lazy) {
            for (name, path) in ImportResolver::bindings(import, module) {
                if name != "*" {
                    bound.insert(name, path);
                    continue;
                }
                // Star imports bind every public top-level name of a package module
                let Some(source) = modules.iter().find(|m| m.module_name == path) else {
                    continue;
                };
                for symbol in &source.symbols {
                    if symbol.parent() == Some(path.as_str()) && !symbol.name.starts_with('_') {
                        bound
                            .entry(symbol.name.clone())
                            .or_insert_with(|| symbol.qualified_name.clone());
                    }
                }
            }
        }
        bound
    }

    pub fn get(&self, qualified_name: &str) -> Option<&'a Symbol> {
        self.symbols.get(qualified_name).copied()
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.symbols.contains_key(qualified_name)
    }

    pub fn is_module(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    /// Whether a dotted path lies inside one of the package's modules
    pub fn is_package_path(&self, dotted: &str) -> bool {
        let mut prefix = String::new();
        for part in dotted.split('.') {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(part);
            if self.is_module(&prefix) {
                return true;
            }
        }
        false
    }

    /// Dotted path a local name of `module` is bound to by an import
    pub fn binding(&self, module: &str, name: &str) -> Option<&str> {
        self.bindings.get(module)?.get(name).map(String::as_str)
    }

    /// Classes and constants with this simple name, in package order
    pub fn by_simple_name(&self, name: &str) -> &[&'a str] {
        self.simple_names
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Follow a dotted path to a package symbol, through re-exports
    pub fn resolve_path(&self, dotted: &str) -> Option<&'a str> {
        self.resolve_path_at(dotted, 0)
    }

    fn resolve_path_at(&self, dotted: &str, depth: usize) -> Option<&'a str> {
        if let Some((&qualified, _)) = self.symbols.get_key_value(dotted) {
            return Some(qualified);
        }
        if depth >= MAX_REEXPORT_DEPTH {
            return None;
        }

        let parts: Vec<&str> = dotted.split('.').collect();
        for split in (1..parts.len()).rev() {
            let module = parts[..split].join(".");
            if !self.is_module(&module) {
                continue;
            }
            let target = self.binding(&module, parts[split])?;
            let mut next = target.to_string();
            for rest in &parts[split + 1..] {
                next.push('.');
                next.push_str(rest);
            }
            if next == dotted {
                return None;
            }
            return self.resolve_path_at(&next, depth + 1);
        }
        None
    }
}
