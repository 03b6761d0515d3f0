// Annotation resolution against the package symbol index
//
// An annotation is parsed into a small expression tree, every name in it is
// resolved on its own, and the result is rendered back canonically. Any
// component that cannot be resolved turns the whole slot into Unknown.

use crate::analysis::imports::is_stdlib_module;
use crate::analysis::index::SymbolIndex;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::model::{
    AnnotationSource, ParameterKind, Signature, Symbol, SymbolKind, SymbolTypes, TypeReference,
    TypedSlot,
};
use crate::parser::ParsedModule;
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// String annotations nested deeper than this are not unquoted
const MAX_FORWARD_DEPTH: usize = 4;

/// Deprecated `typing` aliases and their builtin spelling
const GENERIC_ALIASES: &[(&str, &str)] = &[
    ("List", "list"),
    ("Dict", "dict"),
    ("Set", "set"),
    ("FrozenSet", "frozenset"),
    ("Tuple", "tuple"),
    ("Type", "type"),
    ("Text", "str"),
    ("NoneType", "None"),
];

const BUILTIN_TYPES: &[&str] = &[
    "int", "float", "complex", "str", "bytes", "bytearray", "memoryview", "bool",
    "list", "dict", "set", "frozenset", "tuple", "type", "object", "range", "slice",
    "None", "Ellipsis", "NotImplemented", "callable",
    "BaseException", "Exception", "ArithmeticError", "AssertionError", "AttributeError",
    "ConnectionError", "FileNotFoundError", "ImportError", "IndexError", "IOError",
    "KeyError", "KeyboardInterrupt", "LookupError", "ModuleNotFoundError",
    "NotImplementedError", "OSError", "PermissionError", "RuntimeError",
    "StopAsyncIteration", "StopIteration", "SystemExit", "TimeoutError", "TypeError",
    "UnicodeDecodeError", "UnicodeEncodeError", "UnicodeError", "ValueError",
    "ZeroDivisionError", "Warning", "UserWarning", "DeprecationWarning",
];

/// Names that mean `typing.<name>` when written bare
const TYPING_NAMES: &[&str] = &[
    "Any", "AnyStr", "Annotated", "AbstractSet", "AsyncContextManager", "AsyncGenerator",
    "AsyncIterable", "AsyncIterator", "Awaitable", "BinaryIO", "Callable", "ChainMap",
    "ClassVar", "Collection", "Concatenate", "Container", "ContextManager", "Coroutine",
    "Counter", "DefaultDict", "Deque", "Final", "Generator", "Generic", "Hashable", "IO",
    "Iterable", "Iterator", "Literal", "LiteralString", "Mapping", "Match",
    "MutableMapping", "MutableSequence", "MutableSet", "NamedTuple", "Never", "NoReturn",
    "NotRequired", "Optional", "OrderedDict", "ParamSpec", "Pattern", "Protocol",
    "Required", "Reversible", "Self", "Sequence", "Sized", "SupportsAbs", "SupportsBytes",
    "SupportsFloat", "SupportsIndex", "SupportsInt", "SupportsRound", "TextIO",
    "TypeAlias", "TypeGuard", "TypeVar", "TypedDict", "Union", "Unpack",
];

fn generic_alias(name: &str) -> Option<&'static str> {
    GENERIC_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, builtin)| *builtin)
}

/// Canonical spelling of a builtin or standard-library type name
pub fn canonical_name(name: &str) -> Option<String> {
    let name = name.strip_prefix("builtins.").unwrap_or(name);
    if let Some(tail) = name
        .strip_prefix("typing.")
        .or_else(|| name.strip_prefix("typing_extensions."))
    {
        return Some(generic_alias(tail).map_or_else(|| format!("typing.{}", tail), str::to_string));
    }
    if let Some(builtin) = generic_alias(name) {
        return Some(builtin.to_string());
    }
    if BUILTIN_TYPES.contains(&name) {
        return Some(name.to_string());
    }
    if TYPING_NAMES.contains(&name) {
        return Some(format!("typing.{}", name));
    }
    if name.contains('.') && is_stdlib_module(name) {
        return Some(name.to_string());
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Str(String),
    Num(String),
    Open,
    Close,
    LParen,
    RParen,
    Comma,
    Pipe,
    Ellipsis,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    start: usize,
    end: usize,
}

fn tokenize(text: &str) -> Option<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '[' | ']' | '(' | ')' | ',' | '|' => {
                chars.next();
                match c {
                    '[' => Token::Open,
                    ']' => Token::Close,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    _ => Token::Pipe,
                }
            }
            '.' => {
                if !text[start..].starts_with("...") {
                    return None;
                }
                chars.nth(2);
                Token::Ellipsis
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => {
                            if let Some((_, escaped)) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        ch if ch == c => {
                            closed = true;
                            break;
                        }
                        ch => value.push(ch),
                    }
                }
                if !closed {
                    return None;
                }
                Token::Str(value)
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut value = String::new();
                value.push(c);
                chars.next();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '.' || ch == '_' {
                        value.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Num(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut value = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                        value.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if value.ends_with('.') {
                    return None;
                }
                Token::Name(value)
            }
            _ => return None,
        };
        let end = chars.peek().map_or(text.len(), |&(i, _)| i);
        tokens.push(Spanned { token, start, end });
    }
    Some(tokens)
}

/// Parsed annotation expression
#[derive(Debug, Clone, PartialEq)]
enum TypeExpr {
    Name(String),
    Subscript { base: String, args: Vec<TypeExpr> },
    /// `Literal[...]`, arguments kept as written
    Literal { base: String, raw: String },
    List(Vec<TypeExpr>),
    Union(Vec<TypeExpr>),
    Ellipsis,
    Verbatim(String),
}

struct AnnotationParser<'s> {
    text: &'s str,
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

fn parse_annotation(text: &str, depth: usize) -> Option<TypeExpr> {
    if depth > MAX_FORWARD_DEPTH {
        return None;
    }
    let tokens = tokenize(text)?;
    let mut parser = AnnotationParser {
        text,
        tokens,
        pos: 0,
        depth,
    };
    let expr = parser.union()?;
    (parser.pos == parser.tokens.len()).then_some(expr)
}

impl AnnotationParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos)?.token.clone();
        self.pos += 1;
        Some(token)
    }

    fn union(&mut self) -> Option<TypeExpr> {
        let mut items = vec![self.primary()?];
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            items.push(self.primary()?);
        }
        if items.len() == 1 {
            items.pop()
        } else {
            Some(TypeExpr::Union(items))
        }
    }

    fn primary(&mut self) -> Option<TypeExpr> {
        match self.next()? {
            Token::Name(name) => {
                if self.peek() != Some(&Token::Open) {
                    return Some(TypeExpr::Name(name));
                }
                self.pos += 1;
                if name.rsplit('.').next() == Some("Literal") {
                    let raw = self.raw_until_close()?;
                    Some(TypeExpr::Literal { base: name, raw })
                } else {
                    let args = self.items_until_close()?;
                    Some(TypeExpr::Subscript { base: name, args })
                }
            }
            Token::Open => Some(TypeExpr::List(self.items_until_close()?)),
            Token::LParen => {
                let inner = self.union()?;
                (self.next()? == Token::RParen).then_some(inner)
            }
            Token::Ellipsis => Some(TypeExpr::Ellipsis),
            Token::Str(quoted) => parse_annotation(&quoted, self.depth + 1),
            Token::Num(number) => Some(TypeExpr::Verbatim(number)),
            _ => None,
        }
    }

    fn items_until_close(&mut self) -> Option<Vec<TypeExpr>> {
        let mut items = Vec::new();
        if self.peek() == Some(&Token::Close) {
            self.pos += 1;
            return Some(items);
        }
        loop {
            items.push(self.union()?);
            match self.next()? {
                Token::Comma => {
                    if self.peek() == Some(&Token::Close) {
                        self.pos += 1;
                        return Some(items);
                    }
                }
                Token::Close => return Some(items),
                _ => return None,
            }
        }
    }

    /// Source text up to the bracket closing the one just consumed
    fn raw_until_close(&mut self) -> Option<String> {
        let start = self.tokens.get(self.pos.checked_sub(1)?)?.end;
        let mut depth = 0usize;
        for i in self.pos..self.tokens.len() {
            match self.tokens[i].token {
                Token::Open => depth += 1,
                Token::Close if depth == 0 => {
                    let raw = self.text.get(start..self.tokens[i].start)?.trim().to_string();
                    self.pos = i + 1;
                    return Some(raw);
                }
                Token::Close => depth -= 1,
                _ => {}
            }
        }
        None
    }
}

/// Why a name or annotation did not resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Unparseable,
    Unresolved(String),
    Ambiguous(String, Vec<String>),
}

/// Lexical position an annotation is resolved from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope<'s> {
    pub module: &'s str,
    /// Enclosing classes, innermost first
    pub enclosing: Vec<&'s str>,
}

impl<'s> Scope<'s> {
    pub fn module(module: &'s str) -> Self {
        Self {
            module,
            enclosing: Vec::new(),
        }
    }

    /// Scope an annotation written on `symbol` is evaluated in
    pub fn of(symbol: &'s Symbol) -> Self {
        let module = symbol.module.as_str();
        let mut enclosing = Vec::new();
        let mut current = symbol.parent();
        while let Some(scope) = current {
            if scope == module || scope.len() <= module.len() {
                break;
            }
            enclosing.push(scope);
            current = scope.rsplit_once('.').map(|(parent, _)| parent);
        }
        Self { module, enclosing }
    }
}

/// Normalizes annotations into canonical type names
pub struct TypeResolver<'a> {
    index: &'a SymbolIndex<'a>,
    aliases: &'a BTreeMap<String, String>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(index: &'a SymbolIndex<'a>, aliases: &'a BTreeMap<String, String>) -> Self {
        Self { index, aliases }
    }

    /// Resolve one annotation without recording anything
    pub fn resolve(&self, annotation: &str, scope: &Scope<'_>) -> TypeReference {
        match self.resolve_text(annotation, scope) {
            Ok(name) => TypeReference::Resolved(name),
            Err(_) => TypeReference::Unknown,
        }
    }

    pub fn resolve_text(&self, annotation: &str, scope: &Scope<'_>) -> Result<String, Failure> {
        let text = annotation.trim();
        if let Some(mapped) = self.aliases.get(text) {
            return Ok(mapped.clone());
        }
        let expr = parse_annotation(text, 0).ok_or(Failure::Unparseable)?;
        self.resolve_expr(&expr, scope)
    }

    /// Package symbol a bare or dotted name refers to, if any
    pub fn package_symbol(&self, name: &str, scope: &Scope<'_>) -> Option<String> {
        self.resolve_name(name, scope)
            .ok()
            .filter(|q| self.index.contains(q))
    }

    fn resolve_expr(&self, expr: &TypeExpr, scope: &Scope<'_>) -> Result<String, Failure> {
        match expr {
            TypeExpr::Name(name) => self.resolve_name(name, scope),
            TypeExpr::Subscript { base, args } => {
                let base = self.resolve_name(base, scope)?;
                let args = self.resolve_list(args, scope)?;
                Ok(format!("{}[{}]", base, args.join(", ")))
            }
            TypeExpr::Literal { base, raw } => {
                Ok(format!("{}[{}]", self.resolve_name(base, scope)?, raw))
            }
            TypeExpr::List(items) => Ok(format!("[{}]", self.resolve_list(items, scope)?.join(", "))),
            TypeExpr::Union(items) => Ok(self.resolve_list(items, scope)?.join(" | ")),
            TypeExpr::Ellipsis => Ok("...".to_string()),
            TypeExpr::Verbatim(text) => Ok(text.clone()),
        }
    }

    fn resolve_list(&self, items: &[TypeExpr], scope: &Scope<'_>) -> Result<Vec<String>, Failure> {
        items.iter().map(|item| self.resolve_expr(item, scope)).collect()
    }

    fn resolve_name(&self, name: &str, scope: &Scope<'_>) -> Result<String, Failure> {
        if let Some(mapped) = self.aliases.get(name) {
            return Ok(mapped.clone());
        }

        for enclosing in scope.enclosing.iter().chain(std::iter::once(&scope.module)) {
            if let Some(qualified) = self.index.resolve_path(&format!("{}.{}", enclosing, name)) {
                return Ok(qualified.to_string());
            }
        }

        let (head, rest) = match name.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (name, None),
        };
        if let Some(path) = self.index.binding(scope.module, head) {
            let full = match rest {
                Some(rest) => format!("{}.{}", path, rest),
                None => path.to_string(),
            };
            if let Some(qualified) = self.index.resolve_path(&full) {
                return Ok(qualified.to_string());
            }
            if !self.index.is_package_path(&full) {
                return Ok(canonical_name(&full).unwrap_or(full));
            }
            return Err(Failure::Unresolved(name.to_string()));
        }

        if let Some(qualified) = self.index.resolve_path(name) {
            return Ok(qualified.to_string());
        }

        if rest.is_none() {
            match self.index.by_simple_name(name) {
                [only] => return Ok(only.to_string()),
                [] => {}
                several => {
                    return Err(Failure::Ambiguous(
                        name.to_string(),
                        several.iter().map(|s| s.to_string()).collect(),
                    ))
                }
            }
        }

        canonical_name(name).ok_or_else(|| Failure::Unresolved(name.to_string()))
    }

    /// Resolve an annotation, recording a diagnostic when it fails
    fn checked(
        &self,
        annotation: &str,
        scope: &Scope<'_>,
        symbol: &Symbol,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> TypeReference {
        let failure = match self.resolve_text(annotation, scope) {
            Ok(name) => return TypeReference::Resolved(name),
            Err(failure) => failure,
        };

        let location = Location::at(&symbol.location.path, symbol.location.line_start)
            .with_symbol(&symbol.qualified_name);
        let diagnostic = match failure {
            Failure::Unparseable => Diagnostic::warning(
                DiagnosticKind::UnresolvedType,
                location,
                format!("cannot parse annotation `{}`", annotation),
            ),
            Failure::Unresolved(name) => Diagnostic::warning(
                DiagnosticKind::UnresolvedType,
                location,
                format!("cannot resolve `{}` in annotation `{}`", name, annotation),
            ),
            Failure::Ambiguous(name, candidates) => Diagnostic::warning(
                DiagnosticKind::AmbiguousType,
                location,
                format!(
                    "`{}` in annotation `{}` matches {}",
                    name,
                    annotation,
                    candidates.join(", ")
                ),
            ),
        };
        diagnostics.push(diagnostic);
        TypeReference::Unknown
    }

    /// Signature annotation first, docstring type as a fallback
    fn typed_slot(
        &self,
        name: &str,
        annotation: Option<&str>,
        declared: Option<&str>,
        scope: &Scope<'_>,
        symbol: &Symbol,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> TypedSlot {
        let (type_ref, source) = match (annotation, declared) {
            (Some(annotation), declared) => {
                let type_ref = self.checked(annotation, scope, symbol, diagnostics);
                if let (TypeReference::Resolved(signature), Some(declared)) = (&type_ref, declared) {
                    if let Ok(documented) = self.resolve_text(declared, scope) {
                        if documented != *signature {
                            diagnostics.push(Diagnostic::info(
                                DiagnosticKind::TypeConflict,
                                Location::at(&symbol.location.path, symbol.location.line_start)
                                    .with_symbol(&symbol.qualified_name),
                                format!(
                                    "`{}` is `{}` in the signature but `{}` in the docstring",
                                    name, signature, documented
                                ),
                            ));
                        }
                    }
                }
                (type_ref, AnnotationSource::Signature)
            }
            (None, Some(declared)) => (
                self.checked(declared, scope, symbol, diagnostics),
                AnnotationSource::Docstring,
            ),
            (None, None) => (TypeReference::Unknown, AnnotationSource::Absent),
        };
        TypedSlot {
            name: name.to_string(),
            type_ref,
            source,
        }
    }

    fn signature_types(
        &self,
        symbol: &Symbol,
        signature: &Signature,
        is_method: bool,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> SymbolTypes {
        let scope = Scope::of(symbol);
        let mut types = SymbolTypes::default();

        for (i, param) in signature.parameters.iter().enumerate() {
            let receiver = is_method
                && i == 0
                && param.annotation.is_none()
                && matches!(param.kind, ParameterKind::Regular | ParameterKind::PositionalOnly)
                && !symbol.has_decorator("staticmethod");
            let slot = match symbol.parent().filter(|_| receiver) {
                Some(class) => {
                    let type_name = if symbol.has_decorator("classmethod") || param.name == "cls" {
                        format!("type[{}]", class)
                    } else {
                        class.to_string()
                    };
                    TypedSlot {
                        name: param.name.clone(),
                        type_ref: TypeReference::Resolved(type_name),
                        source: AnnotationSource::Receiver,
                    }
                }
                None => self.typed_slot(
                    &param.name,
                    param.annotation.as_deref(),
                    param.doc_annotation.as_deref(),
                    &scope,
                    symbol,
                    diagnostics,
                ),
            };
            types.parameters.push(slot);
        }

        types.returns = Some(self.typed_slot(
            "return",
            signature.return_annotation.as_deref(),
            signature.doc_return.as_deref(),
            &scope,
            symbol,
            diagnostics,
        ));
        types
    }

    /// Resolved slots of one symbol; modules have none
    pub fn resolve_symbol(&self, symbol: &Symbol) -> (Option<SymbolTypes>, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let types = match &symbol.kind {
            SymbolKind::Module { .. } => None,
            SymbolKind::Function(signature) => {
                Some(self.signature_types(symbol, signature, false, &mut diagnostics))
            }
            SymbolKind::Method(signature) => {
                Some(self.signature_types(symbol, signature, true, &mut diagnostics))
            }
            SymbolKind::Class { bases } => {
                let scope = Scope::of(symbol);
                let bases = bases
                    .iter()
                    .map(|base| self.checked(base, &scope, symbol, &mut diagnostics))
                    .collect();
                Some(SymbolTypes {
                    bases,
                    ..SymbolTypes::default()
                })
            }
            SymbolKind::Constant { annotation, .. } => {
                let scope = Scope::of(symbol);
                let value = self.typed_slot(
                    &symbol.name,
                    annotation.as_deref(),
                    None,
                    &scope,
                    symbol,
                    &mut diagnostics,
                );
                Some(SymbolTypes {
                    value: Some(value),
                    ..SymbolTypes::default()
                })
            }
        };
        (types, diagnostics)
    }

    /// Resolve every symbol of the package in parallel, keeping package order
    pub fn resolve_all(
        &self,
        modules: &[ParsedModule],
    ) -> (IndexMap<String, SymbolTypes>, Vec<Diagnostic>) {
        let symbols: Vec<&Symbol> = modules.iter().flat_map(|m| m.symbols.iter()).collect();
        let resolved: Vec<_> = symbols
            .par_iter()
            .map(|symbol| (symbol.qualified_name.as_str(), self.resolve_symbol(symbol)))
            .collect();

        let mut types = IndexMap::new();
        let mut diagnostics = Vec::new();
        for (qualified_name, (slots, found)) in resolved {
            if let Some(slots) = slots {
                types.entry(qualified_name.to_string()).or_insert(slots);
            }
            diagnostics.extend(found);
        }
        (types, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SourceUnit;
    use crate::parser::{extract, TreeBuilder};

    fn package(files: &[(&str, &str, &str)]) -> Vec<ParsedModule> {
        let mut builder = TreeBuilder::new().unwrap();
        files
            .iter()
            .map(|(path, name, source)| {
                extract(&builder.parse(SourceUnit::new(*path, name, *source)).unwrap())
            })
            .collect()
    }

    fn single(source: &str) -> Vec<ParsedModule> {
        package(&[("pkg/mod.py", "pkg.mod", source)])
    }

    fn resolve_in(modules: &[ParsedModule], annotation: &str) -> TypeReference {
        let index = SymbolIndex::build(modules);
        let aliases = BTreeMap::new();
        let resolver = TypeResolver::new(&index, &aliases);
        resolver.resolve(annotation, &Scope::module(&modules[0].module_name))
    }

    fn resolved(name: &str) -> TypeReference {
        TypeReference::resolved(name)
    }

    #[test]
    fn test_canonical_names() {
        assert_eq!(canonical_name("List").as_deref(), Some("list"));
        assert_eq!(canonical_name("typing.Dict").as_deref(), Some("dict"));
        assert_eq!(canonical_name("NoneType").as_deref(), Some("None"));
        assert_eq!(canonical_name("Optional").as_deref(), Some("typing.Optional"));
        assert_eq!(canonical_name("typing.Optional").as_deref(), Some("typing.Optional"));
        assert_eq!(canonical_name("typing_extensions.Self").as_deref(), Some("typing.Self"));
        assert_eq!(canonical_name("builtins.int").as_deref(), Some("int"));
        assert_eq!(
            canonical_name("collections.abc.Iterable").as_deref(),
            Some("collections.abc.Iterable")
        );
        assert_eq!(canonical_name("Frob"), None);
    }

    #[test]
    fn test_parse_annotation_shapes() {
        assert_eq!(
            parse_annotation("Dict[str, List[int]]", 0),
            Some(TypeExpr::Subscript {
                base: "Dict".to_string(),
                args: vec![
                    TypeExpr::Name("str".to_string()),
                    TypeExpr::Subscript {
                        base: "List".to_string(),
                        args: vec![TypeExpr::Name("int".to_string())],
                    },
                ],
            })
        );
        assert_eq!(
            parse_annotation("Literal['a', \"b\"]", 0),
            Some(TypeExpr::Literal {
                base: "Literal".to_string(),
                raw: "'a', \"b\"".to_string(),
            })
        );
        assert_eq!(parse_annotation("a +", 0), None);
        assert_eq!(parse_annotation("List[int", 0), None);
    }

    #[test]
    fn test_builtin_and_compound_annotations() {
        let modules = single("x = 1\n");
        assert_eq!(resolve_in(&modules, "List[int]"), resolved("list[int]"));
        assert_eq!(
            resolve_in(&modules, "Optional[Dict[str, Any]]"),
            resolved("typing.Optional[dict[str, typing.Any]]")
        );
        assert_eq!(resolve_in(&modules, "int | None"), resolved("int | None"));
        assert_eq!(
            resolve_in(&modules, "Callable[[int, str], bool]"),
            resolved("typing.Callable[[int, str], bool]")
        );
        assert_eq!(resolve_in(&modules, "Tuple[int, ...]"), resolved("tuple[int, ...]"));
        assert_eq!(
            resolve_in(&modules, "Literal['r', 'w']"),
            resolved("typing.Literal['r', 'w']")
        );
    }

    #[test]
    fn test_unresolved_component_makes_slot_unknown() {
        let modules = single("x = 1\n");
        assert_eq!(resolve_in(&modules, "Frob"), TypeReference::Unknown);
        assert_eq!(resolve_in(&modules, "list[Frob]"), TypeReference::Unknown);
        assert_eq!(resolve_in(&modules, "not a type!"), TypeReference::Unknown);
    }

    #[test]
    fn test_forward_reference_to_later_class() {
        let modules = single(
            "def build(size: 'int') -> \"Widget\":\n    pass\n\nclass Widget:\n    pass\n",
        );
        assert_eq!(resolve_in(&modules, "\"Widget\""), resolved("pkg.mod.Widget"));
        assert_eq!(
            resolve_in(&modules, "Optional['Widget']"),
            resolved("typing.Optional[pkg.mod.Widget]")
        );
    }

    #[test]
    fn test_alias_table_exact() {
        let modules = single("x = 1\n");
        let index = SymbolIndex::build(&modules);
        let mut aliases = BTreeMap::new();
        aliases.insert("Vector".to_string(), "list[float]".to_string());
        aliases.insert("Dict[str, Any]".to_string(), "JSON".to_string());
        let resolver = TypeResolver::new(&index, &aliases);
        let scope = Scope::module("pkg.mod");
        assert_eq!(resolver.resolve("Vector", &scope), resolved("list[float]"));
        assert_eq!(resolver.resolve(" Dict[str, Any] ", &scope), resolved("JSON"));
        assert_eq!(
            resolver.resolve("Optional[Vector]", &scope),
            resolved("typing.Optional[list[float]]")
        );
    }

    #[test]
    fn test_import_bindings() {
        let modules = package(&[
            (
                "shapes/app.py",
                "shapes.app",
                "import numpy as np\nfrom .core import Widget\nfrom typing import List as L\nfrom collections.abc import Iterable\n",
            ),
            ("shapes/__init__.py", "shapes", ""),
            ("shapes/core.py", "shapes.core", "class Widget: pass\n"),
        ]);
        assert_eq!(resolve_in(&modules, "np.ndarray"), resolved("numpy.ndarray"));
        assert_eq!(resolve_in(&modules, "Widget"), resolved("shapes.core.Widget"));
        assert_eq!(resolve_in(&modules, "L[Widget]"), resolved("list[shapes.core.Widget]"));
        assert_eq!(
            resolve_in(&modules, "Iterable[str]"),
            resolved("collections.abc.Iterable[str]")
        );
        assert_eq!(resolve_in(&modules, "shapes.core.Widget"), resolved("shapes.core.Widget"));
    }

    #[test]
    fn test_ambiguous_simple_name() {
        let modules = package(&[
            ("shapes/app.py", "shapes.app", "x = 1\n"),
            ("shapes/a.py", "shapes.a", "class Widget: pass\n"),
            ("shapes/b.py", "shapes.b", "class Widget: pass\nclass Gadget: pass\n"),
        ]);
        assert_eq!(resolve_in(&modules, "Widget"), TypeReference::Unknown);
        assert_eq!(resolve_in(&modules, "Gadget"), resolved("shapes.b.Gadget"));

        let index = SymbolIndex::build(&modules);
        let aliases = BTreeMap::new();
        let resolver = TypeResolver::new(&index, &aliases);
        assert!(matches!(
            resolver.resolve_text("Widget", &Scope::module("shapes.app")),
            Err(Failure::Ambiguous(_, ref candidates)) if candidates.len() == 2
        ));
    }

    #[test]
    fn test_enclosing_scope_wins() {
        let modules = single(
            "class Node: pass\n\nclass Tree:\n    class Node: pass\n\n    def root(self) -> Node:\n        pass\n",
        );
        let index = SymbolIndex::build(&modules);
        let aliases = BTreeMap::new();
        let resolver = TypeResolver::new(&index, &aliases);
        let (types, diagnostics) = resolver.resolve_all(&modules);
        assert!(diagnostics.is_empty());
        let root = &types["pkg.mod.Tree.root"];
        assert_eq!(
            root.returns.as_ref().unwrap().type_ref,
            resolved("pkg.mod.Tree.Node")
        );
    }

    #[test]
    fn test_receivers() {
        let modules = single(
            "class Widget:\n    def draw(self): pass\n\n    @classmethod\n    def create(cls): pass\n\n    @staticmethod\n    def helper(x): pass\n",
        );
        let index = SymbolIndex::build(&modules);
        let aliases = BTreeMap::new();
        let resolver = TypeResolver::new(&index, &aliases);
        let (types, _) = resolver.resolve_all(&modules);

        let draw = &types["pkg.mod.Widget.draw"].parameters[0];
        assert_eq!(draw.type_ref, resolved("pkg.mod.Widget"));
        assert_eq!(draw.source, AnnotationSource::Receiver);

        let create = &types["pkg.mod.Widget.create"].parameters[0];
        assert_eq!(create.type_ref, resolved("type[pkg.mod.Widget]"));

        let helper = &types["pkg.mod.Widget.helper"].parameters[0];
        assert_eq!(helper.type_ref, TypeReference::Unknown);
        assert_eq!(helper.source, AnnotationSource::Absent);
    }

    #[test]
    fn test_docstring_fallback_and_conflict() {
        let modules = single(
            "def scale(factor, name: str):\n    \"\"\"Scale it.\n\n    Args:\n        factor (float): How much.\n        name (bytes): Label.\n    \"\"\"\n",
        );
        let index = SymbolIndex::build(&modules);
        let aliases = BTreeMap::new();
        let resolver = TypeResolver::new(&index, &aliases);
        let (types, diagnostics) = resolver.resolve_all(&modules);

        let params = &types["pkg.mod.scale"].parameters;
        assert_eq!(params[0].type_ref, resolved("float"));
        assert_eq!(params[0].source, AnnotationSource::Docstring);
        assert_eq!(params[1].type_ref, resolved("str"));
        assert_eq!(params[1].source, AnnotationSource::Signature);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::TypeConflict);
    }

    #[test]
    fn test_every_slot_is_filled() {
        let modules = single(
            "LIMIT: int = 3\nNAME = 'x'\n\nclass Base: pass\n\nclass Child(Base, Frob): pass\n\ndef run(a, b: Frob) -> None: pass\n",
        );
        let index = SymbolIndex::build(&modules);
        let aliases = BTreeMap::new();
        let resolver = TypeResolver::new(&index, &aliases);
        let (types, diagnostics) = resolver.resolve_all(&modules);

        assert!(!types.contains_key("pkg.mod"));
        assert_eq!(types["pkg.mod.LIMIT"].value.as_ref().unwrap().type_ref, resolved("int"));
        assert_eq!(
            types["pkg.mod.NAME"].value.as_ref().unwrap().source,
            AnnotationSource::Absent
        );
        assert_eq!(
            types["pkg.mod.Child"].bases,
            vec![resolved("pkg.mod.Base"), TypeReference::Unknown]
        );

        let run = &types["pkg.mod.run"];
        assert_eq!(run.parameters.len(), 2);
        assert_eq!(run.parameters[0].source, AnnotationSource::Absent);
        assert!(run.parameters[1].type_ref.is_unknown());
        assert_eq!(run.returns.as_ref().unwrap().type_ref, resolved("None"));

        let unresolved: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::UnresolvedType)
            .collect();
        assert_eq!(unresolved.len(), 2);
        assert!(unresolved[0].message.contains("Frob"));
    }
}
