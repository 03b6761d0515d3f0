// Symbol extraction from Python syntax trees

use crate::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::model::{Parameter, ParameterKind, Signature, SourceLocation, Symbol, SymbolKind};
use crate::parser::ast::*;
use crate::parser::docstring;
use crate::parser::tree::SyntaxTree;
use indexmap::IndexMap;
use std::path::PathBuf;
use tree_sitter::Node;

/// Extract symbols and imports from one module's tree
pub fn extract(tree: &SyntaxTree) -> ParsedModule {
    SymbolExtractor::new(tree).run(tree)
}

/// Collect the call sites of a companion test file
pub fn collect_test_source(tree: &SyntaxTree) -> TestSource {
    let mut calls = Vec::new();
    gather_calls(tree.root(), tree.source().as_bytes(), &mut calls);
    let stem = tree
        .path()
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    TestSource {
        path: tree.path().to_path_buf(),
        stem,
        calls,
    }
}

struct SymbolExtractor<'t> {
    source: &'t [u8],
    path: PathBuf,
    module: String,
    symbols: IndexMap<String, Symbol>,
    imports: Vec<Import>,
    diagnostics: Vec<Diagnostic>,
}

impl<'t> SymbolExtractor<'t> {
    fn new(tree: &'t SyntaxTree) -> Self {
        Self {
            source: tree.source().as_bytes(),
            path: tree.path().to_path_buf(),
            module: tree.module_name().to_string(),
            symbols: IndexMap::new(),
            imports: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn run(mut self, tree: &SyntaxTree) -> ParsedModule {
        let root = tree.root();
        let line_end = tree.source().lines().count().max(1);
        let mut module = Symbol::new(
            &self.module,
            &self.module,
            SymbolKind::Module {
                is_package: tree.is_package(),
            },
            SourceLocation::new(&self.path, 1, line_end),
        );
        module.docstring = docstring_of(root, self.source).unwrap_or_default();
        self.symbols.insert(self.module.clone(), module);

        let scope = self.module.clone();
        self.walk_block(root, &scope, false);
        self.collect_imports(root, false);

        let mut parsed = ParsedModule::new(&self.module, self.path, tree.is_package());
        parsed.symbols = self.symbols.into_values().collect();
        parsed.imports = self.imports;
        parsed.diagnostics = self.diagnostics;
        parsed
    }

    fn text(&self, node: Node<'_>) -> Option<&'t str> {
        node.utf8_text(self.source).ok()
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<&'t str> {
        node.child_by_field_name(field).and_then(|n| self.text(n))
    }

    fn location(&self, node: Node<'_>) -> SourceLocation {
        SourceLocation::new(
            &self.path,
            node.start_position().row + 1,
            node.end_position().row + 1,
        )
    }

    fn walk_block(&mut self, block: Node<'_>, scope: &str, in_class: bool) {
        let mut cursor = block.walk();
        for child in block.named_children(&mut cursor) {
            self.visit_statement(child, scope, in_class, Vec::new());
        }
    }

    /// Definitions inside `if`/`try`/`with` belong to the enclosing scope
    fn walk_compound(&mut self, node: Node<'_>, scope: &str, in_class: bool) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "block" => self.walk_block(child, scope, in_class),
                "elif_clause" | "else_clause" | "except_clause" | "except_group_clause"
                | "finally_clause" => self.walk_compound(child, scope, in_class),
                _ => {}
            }
        }
    }

    fn visit_statement(
        &mut self,
        node: Node<'_>,
        scope: &str,
        in_class: bool,
        decorators: Vec<String>,
    ) {
        match node.kind() {
            "class_definition" => {
                self.visit_class(node, scope, decorators);
            }
            "function_definition" => {
                self.visit_function(node, scope, in_class, decorators);
            }
            "decorated_definition" => {
                let decorators = decorator_names(node, self.source);
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.visit_statement(definition, scope, in_class, decorators);
                }
            }
            "expression_statement" => {
                self.visit_assignment(node, scope);
            }
            "if_statement" | "try_statement" | "with_statement" => {
                self.walk_compound(node, scope, in_class);
            }
            _ => {}
        }
    }

    fn visit_class(&mut self, node: Node<'_>, scope: &str, decorators: Vec<String>) -> Option<()> {
        let name = self.field_text(node, "name")?;
        let qualified = format!("{}.{}", scope, name);

        let bases = node
            .child_by_field_name("superclasses")
            .map(|args| base_expressions(args, self.source))
            .unwrap_or_default();
        let body = node.child_by_field_name("body");

        let mut symbol = Symbol::new(
            &qualified,
            &self.module,
            SymbolKind::Class { bases },
            self.location(node),
        );
        symbol.docstring = body
            .and_then(|b| docstring_of(b, self.source))
            .unwrap_or_default();
        symbol.decorators = decorators;
        self.insert(symbol);

        if let Some(body) = body {
            self.walk_block(body, &qualified, true);
        }
        Some(())
    }

    fn visit_function(
        &mut self,
        node: Node<'_>,
        scope: &str,
        in_class: bool,
        decorators: Vec<String>,
    ) -> Option<()> {
        let name = self.field_text(node, "name")?;
        let qualified = format!("{}.{}", scope, name);

        // `@x.setter` / `@x.deleter` fold into the property `x`
        if in_class
            && self.symbols.contains_key(&qualified)
            && decorators.iter().any(|d| is_accessor_of(d, name))
        {
            return Some(());
        }

        let mut signature = Signature::new();
        signature.is_async = has_async_keyword(node);
        signature.parameters = node
            .child_by_field_name("parameters")
            .map(|p| parse_parameters(p, self.source))
            .unwrap_or_default();
        signature.return_annotation = self.field_text(node, "return_type").map(str::to_string);

        let docstring = node
            .child_by_field_name("body")
            .and_then(|b| docstring_of(b, self.source))
            .unwrap_or_default();
        let declared = docstring::declared_types(&docstring);
        for param in &mut signature.parameters {
            param.doc_annotation = declared.params.get(&param.name).cloned();
        }
        signature.doc_return = declared.returns;

        let kind = if in_class {
            SymbolKind::Method(signature)
        } else {
            SymbolKind::Function(signature)
        };
        let mut symbol = Symbol::new(&qualified, &self.module, kind, self.location(node));
        symbol.docstring = docstring;
        symbol.decorators = decorators;
        self.insert(symbol);
        Some(())
    }

    /// `NAME = value` or `NAME: T = value` at module or class scope
    fn visit_assignment(&mut self, node: Node<'_>, scope: &str) -> Option<()> {
        let assignment = node.named_child(0)?;
        if assignment.kind() != "assignment" {
            return None;
        }
        let left = assignment.child_by_field_name("left")?;
        if left.kind() != "identifier" {
            return None;
        }
        let name = self.text(left)?;
        if !is_constant_name(name) {
            return None;
        }

        let annotation = self.field_text(assignment, "type").map(str::to_string);
        let mut right = assignment.child_by_field_name("right");
        // A = B = 1
        while let Some(r) = right.filter(|r| r.kind() == "assignment") {
            right = r.child_by_field_name("right");
        }
        let value = right.and_then(|r| self.text(r)).map(str::to_string);

        let symbol = Symbol::new(
            format!("{}.{}", scope, name),
            &self.module,
            SymbolKind::Constant { annotation, value },
            self.location(assignment),
        );
        self.insert(symbol);
        Some(())
    }

    /// Later bindings replace earlier ones in place
    fn insert(&mut self, mut symbol: Symbol) {
        let qualified = symbol.qualified_name.clone();
        let previous = self
            .symbols
            .get(&qualified)
            .map(|p| (p.docstring.clone(), p.has_decorator("overload"), p.location.line_start));

        if let Some((previous_doc, was_overload, previous_line)) = previous {
            if !symbol.is_documented() {
                symbol.docstring = previous_doc;
            }
            if !was_overload {
                self.diagnostics.push(Diagnostic::info(
                    DiagnosticKind::Redefinition,
                    Location::at(&self.path, symbol.location.line_start).with_symbol(&qualified),
                    format!(
                        "`{}` redefined; the definition from line {} is shadowed",
                        symbol.name, previous_line
                    ),
                ));
            }
            let prefix = format!("{}.", qualified);
            self.symbols.retain(|k, _| !k.starts_with(&prefix));
        }

        self.symbols.insert(qualified, symbol);
    }

    /// Imports anywhere in the file; those under a function are lazy
    fn collect_imports(&mut self, node: Node<'_>, lazy: bool) {
        match node.kind() {
            "import_statement" => {
                for mut import in parse_import(node, self.source) {
                    import.lazy = lazy;
                    self.imports.push(import);
                }
                return;
            }
            "import_from_statement" => {
                if let Some(mut import) = parse_import_from(node, self.source) {
                    import.lazy = lazy;
                    self.imports.push(import);
                }
                return;
            }
            "future_import_statement" => return,
            "call" => self.check_dynamic_import(node, lazy),
            _ => {}
        }

        let lazy = lazy || matches!(node.kind(), "function_definition" | "lambda");
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.collect_imports(child, lazy);
        }
    }

    fn check_dynamic_import(&mut self, call: Node<'_>, lazy: bool) {
        let Some(callee) = self.field_text(call, "function") else {
            return;
        };
        if !matches!(callee, "importlib.import_module" | "import_module" | "__import__") {
            return;
        }
        let line = call.start_position().row + 1;

        let literal = call
            .child_by_field_name("arguments")
            .and_then(|args| args.named_child(0))
            .filter(|arg| arg.kind() == "string")
            .and_then(|arg| string_value(arg, self.source))
            .filter(|m| !m.is_empty() && !m.starts_with('.'));

        match literal {
            Some(module) => {
                let mut import = Import::dynamic(&module, line);
                import.lazy = lazy;
                self.imports.push(import);
            }
            None => self.diagnostics.push(Diagnostic::info(
                DiagnosticKind::DynamicImport,
                Location::at(&self.path, line),
                format!("`{}` with a non-literal module name cannot be followed", callee),
            )),
        }
    }
}

/// ALL_CAPS names plus the conventional dunder metadata
fn is_constant_name(name: &str) -> bool {
    if name == "__version__" || name == "__author__" {
        return true;
    }
    let body = name.trim_start_matches('_');
    body.chars().next().map_or(false, |c| c.is_ascii_uppercase())
        && body
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn is_accessor_of(decorator: &str, name: &str) -> bool {
    match decorator.split_once('.') {
        Some((target, accessor)) => {
            target == name && matches!(accessor, "setter" | "deleter" | "getter")
        }
        None => false,
    }
}

/// Check if a function_definition node has an async keyword
fn has_async_keyword(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == "async");
    found
}

/// Decorator names with `@` and call arguments stripped
fn decorator_names(node: Node<'_>, source: &[u8]) -> Vec<String> {
    let mut decorators = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "decorator" {
            continue;
        }
        if let Ok(text) = child.utf8_text(source) {
            let dec = text.trim_start_matches('@');
            let dec = match dec.find('(') {
                Some(idx) => &dec[..idx],
                None => dec,
            };
            let dec: String = dec.split_whitespace().collect();
            if !dec.is_empty() {
                decorators.push(dec);
            }
        }
    }
    decorators
}

/// Base class expressions; keyword arguments such as `metaclass=` are skipped
fn base_expressions(args: Node<'_>, source: &[u8]) -> Vec<String> {
    let mut bases = Vec::new();
    let mut cursor = args.walk();
    for child in args.named_children(&mut cursor) {
        if matches!(
            child.kind(),
            "keyword_argument" | "comment" | "list_splat" | "dictionary_splat"
        ) {
            continue;
        }
        if let Ok(text) = child.utf8_text(source) {
            bases.push(text.to_string());
        }
    }
    bases
}

/// Parse function parameters
fn parse_parameters(node: Node<'_>, source: &[u8]) -> Vec<Parameter> {
    let text = |n: Node<'_>| n.utf8_text(source).unwrap_or("?").to_string();
    let regular = |keyword_only: bool| {
        if keyword_only {
            ParameterKind::KeywordOnly
        } else {
            ParameterKind::Regular
        }
    };

    let mut params: Vec<Parameter> = Vec::new();
    let mut keyword_only = false;
    let mut cursor = node.walk();

    for child in node.children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                let mut param = Parameter::new(&text(child));
                param.kind = regular(keyword_only);
                params.push(param);
            }
            "typed_parameter" => {
                let Some(inner) = child.named_child(0) else {
                    continue;
                };
                let (name, kind) = match inner.kind() {
                    "list_splat_pattern" => {
                        keyword_only = true;
                        (splat_name(inner, source), ParameterKind::Args)
                    }
                    "dictionary_splat_pattern" => (splat_name(inner, source), ParameterKind::Kwargs),
                    _ => (text(inner), regular(keyword_only)),
                };
                let mut param = Parameter::new(&name);
                param.kind = kind;
                param.annotation = child.child_by_field_name("type").map(text);
                params.push(param);
            }
            "default_parameter" | "typed_default_parameter" => {
                let Some(name) = child.child_by_field_name("name") else {
                    continue;
                };
                let mut param = Parameter::new(&text(name));
                param.kind = regular(keyword_only);
                param.annotation = child.child_by_field_name("type").map(text);
                param.default = child.child_by_field_name("value").map(text);
                params.push(param);
            }
            "list_splat_pattern" => {
                keyword_only = true;
                let mut param = Parameter::new(&splat_name(child, source));
                param.kind = ParameterKind::Args;
                params.push(param);
            }
            "dictionary_splat_pattern" => {
                let mut param = Parameter::new(&splat_name(child, source));
                param.kind = ParameterKind::Kwargs;
                params.push(param);
            }
            "keyword_separator" | "*" => {
                keyword_only = true;
            }
            "positional_separator" | "/" => {
                for param in params.iter_mut() {
                    if param.kind == ParameterKind::Regular {
                        param.kind = ParameterKind::PositionalOnly;
                    }
                }
            }
            _ => {}
        }
    }

    params
}

fn splat_name(node: Node<'_>, source: &[u8]) -> String {
    node.named_child(0)
        .and_then(|n| n.utf8_text(source).ok())
        .unwrap_or("?")
        .to_string()
}

/// Cleaned docstring of a module or block, if its first statement is a string
fn docstring_of(block: Node<'_>, source: &[u8]) -> Option<String> {
    let mut cursor = block.walk();
    let first = block
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" || first.named_child_count() != 1 {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    string_value(expr, source).map(|raw| docstring::clean(&raw))
}

/// Literal value of a plain (non-bytes, non-f) string, escapes left as written
pub fn string_value(node: Node<'_>, source: &[u8]) -> Option<String> {
    let text = node.utf8_text(source).ok()?;
    let quote_at = text.find(['"', '\''])?;
    let prefix = text[..quote_at].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }
    let body = &text[quote_at..];
    let inner = if (body.starts_with("\"\"\"") || body.starts_with("'''")) && body.len() >= 6 {
        &body[3..body.len() - 3]
    } else if body.len() >= 2 {
        &body[1..body.len() - 1]
    } else {
        return None;
    };
    Some(inner.to_string())
}

fn parse_import(node: Node<'_>, source: &[u8]) -> Vec<Import> {
    let line = node.start_position().row + 1;
    let mut imports = Vec::new();
    let mut cursor = node.walk();

    for child in node.children_by_field_name("name", &mut cursor) {
        match child.kind() {
            "dotted_name" => {
                if let Ok(module) = child.utf8_text(source) {
                    imports.push(Import::simple(module, line));
                }
            }
            "aliased_import" => {
                let name = child
                    .child_by_field_name("name")
                    .and_then(|n| n.utf8_text(source).ok());
                let alias = child
                    .child_by_field_name("alias")
                    .and_then(|n| n.utf8_text(source).ok());
                if let (Some(name), Some(alias)) = (name, alias) {
                    let mut import = Import::simple(name, line);
                    import.names = vec![ImportedName::with_alias(name, alias)];
                    imports.push(import);
                }
            }
            _ => {}
        }
    }

    imports
}

fn parse_import_from(node: Node<'_>, source: &[u8]) -> Option<Import> {
    let line = node.start_position().row + 1;
    let module_node = node.child_by_field_name("module_name")?;

    let (module, level) = if module_node.kind() == "relative_import" {
        let mut level = 0;
        let mut module = String::new();
        let mut cursor = module_node.walk();
        for inner in module_node.named_children(&mut cursor) {
            match inner.kind() {
                "import_prefix" => {
                    level = inner
                        .utf8_text(source)
                        .ok()?
                        .chars()
                        .filter(|c| *c == '.')
                        .count();
                }
                "dotted_name" => module = inner.utf8_text(source).ok()?.to_string(),
                _ => {}
            }
        }
        (module, level)
    } else {
        (module_node.utf8_text(source).ok()?.to_string(), 0)
    };

    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.children_by_field_name("name", &mut cursor) {
        match child.kind() {
            "dotted_name" => names.push(ImportedName::new(child.utf8_text(source).ok()?)),
            "aliased_import" => {
                let name = child.child_by_field_name("name")?.utf8_text(source).ok()?;
                let alias = child.child_by_field_name("alias")?.utf8_text(source).ok()?;
                names.push(ImportedName::with_alias(name, alias));
            }
            _ => {}
        }
    }
    let mut cursor = node.walk();
    if node
        .named_children(&mut cursor)
        .any(|c| c.kind() == "wildcard_import")
    {
        names.push(ImportedName::new("*"));
    }

    Some(if level > 0 {
        Import::relative(&module, names, level, line)
    } else {
        Import::from_import(&module, names, line)
    })
}

fn gather_calls(node: Node<'_>, source: &[u8], calls: &mut Vec<CallSite>) {
    if node.kind() == "call" {
        if let Some(site) = call_site(node, source) {
            calls.push(site);
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        gather_calls(child, source, calls);
    }
}

fn call_site(call: Node<'_>, source: &[u8]) -> Option<CallSite> {
    let function = call.child_by_field_name("function")?;
    let callee = match function.kind() {
        "identifier" => function.utf8_text(source).ok()?,
        "attribute" => function
            .child_by_field_name("attribute")?
            .utf8_text(source)
            .ok()?,
        _ => return None,
    };

    // Climb to the statement that owns the call
    let mut statement = call;
    while let Some(parent) = statement.parent() {
        if matches!(parent.kind(), "block" | "module") {
            break;
        }
        statement = parent;
    }
    let snippet_node = match statement.kind() {
        "expression_statement" | "return_statement" | "assert_statement" | "raise_statement"
        | "delete_statement" => statement,
        _ => call,
    };

    Some(CallSite {
        callee: callee.to_string(),
        snippet: snippet_node.utf8_text(source).ok()?.to_string(),
        line: snippet_node.start_position().row + 1,
    })
}
