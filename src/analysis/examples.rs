// Usage examples from docstrings and companion test files

use crate::model::{Example, ExampleSource, Symbol, SymbolKind};
use crate::parser::{ParsedModule, TestSource};
use rayon::prelude::*;

const FENCES: [&str; 2] = ["```", "~~~"];
const HEADINGS: [&str; 3] = ["Example", "Examples", "Usage"];

/// Collects code snippets and attaches them to the symbols they document
pub struct ExampleHarvester<'a> {
    max_lines: usize,
    tests: &'a [TestSource],
}

/// A snippet found in a docstring before truncation
struct Snippet {
    lines: Vec<String>,
    language: Option<String>,
    line: usize,
}

impl<'a> ExampleHarvester<'a> {
    pub fn new(max_lines: usize, tests: &'a [TestSource]) -> Self {
        Self {
            max_lines: max_lines.max(1),
            tests,
        }
    }

    /// Examples for every symbol of the package, in package order
    pub fn harvest_all(&self, modules: &[ParsedModule]) -> Vec<Example> {
        let symbols: Vec<&Symbol> = modules.iter().flat_map(|m| m.symbols.iter()).collect();
        symbols
            .par_iter()
            .map(|symbol| self.harvest(symbol))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    /// Docstring examples; a test call site only when the docstring has none
    pub fn harvest(&self, symbol: &Symbol) -> Vec<Example> {
        let examples: Vec<Example> = docstring_snippets(&symbol.docstring)
            .into_iter()
            .map(|snippet| {
                self.example(
                    symbol,
                    ExampleSource::Docstring,
                    snippet.lines,
                    snippet.language,
                    snippet.line,
                )
            })
            .collect();
        if !examples.is_empty() {
            return examples;
        }
        self.from_tests(symbol).into_iter().collect()
    }

    fn from_tests(&self, symbol: &Symbol) -> Option<Example> {
        if symbol.is_private()
            || !matches!(
                symbol.kind,
                SymbolKind::Class { .. } | SymbolKind::Function(_) | SymbolKind::Method(_)
            )
        {
            return None;
        }
        let module = symbol.module.rsplit('.').next().unwrap_or(&symbol.module);

        self.tests
            .iter()
            .filter(|test| test.covers(module))
            .find_map(|test| {
                let call = test.calls.iter().find(|c| c.callee == symbol.name)?;
                let mut example = self.example(
                    symbol,
                    ExampleSource::Test,
                    call.snippet.lines().map(str::to_string).collect(),
                    Some("python".to_string()),
                    call.line,
                );
                example.origin = Some(test.path.clone());
                Some(example)
            })
    }

    fn example(
        &self,
        symbol: &Symbol,
        source_kind: ExampleSource,
        mut lines: Vec<String>,
        language: Option<String>,
        line: usize,
    ) -> Example {
        let truncated = lines.len() > self.max_lines;
        lines.truncate(self.max_lines);
        Example {
            owner: symbol.qualified_name.clone(),
            source_kind,
            line_count: lines.len(),
            code: lines.join("\n"),
            truncated,
            language,
            origin: None,
            line,
        }
    }
}

/// Leading whitespace in characters, so non-ASCII spaces count once
fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Remove common indentation and surrounding blank lines
fn dedent(lines: &[&str]) -> Vec<String> {
    let margin = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);
    let mut out: Vec<String> = lines
        .iter()
        .map(|l| {
            let cut = l.char_indices().nth(margin).map_or(l.len(), |(i, _)| i);
            l[cut..].trim_end().to_string()
        })
        .collect();
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    let leading = out.iter().take_while(|l| l.is_empty()).count();
    out.drain(..leading);
    out
}

fn is_heading(trimmed: &str) -> bool {
    let name = trimmed
        .strip_suffix("::")
        .or_else(|| trimmed.strip_suffix(':'));
    name.is_some_and(|n| HEADINGS.contains(&n))
}

/// Fenced blocks, doctest sessions and indented example sections, in the
/// order they appear
fn docstring_snippets(doc: &str) -> Vec<Snippet> {
    let lines: Vec<&str> = doc.lines().collect();
    let mut snippets = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim_start();

        if let Some(fence) = FENCES.iter().find(|f| trimmed.starts_with(**f)) {
            let language = trimmed.trim_start_matches(fence.chars().next().unwrap_or('`')).trim();
            let start = i + 1;
            let end = (start..lines.len())
                .find(|&j| lines[j].trim_start().starts_with(fence))
                .unwrap_or(lines.len());
            let code = dedent(&lines[start..end]);
            if !code.is_empty() {
                snippets.push(Snippet {
                    lines: code,
                    language: (!language.is_empty()).then(|| language.to_string()),
                    line: start + 1,
                });
            }
            i = end + 1;
            continue;
        }

        if trimmed.starts_with(">>>") {
            let end = (i..lines.len())
                .find(|&j| lines[j].trim().is_empty())
                .unwrap_or(lines.len());
            snippets.push(Snippet {
                lines: dedent(&lines[i..end]),
                language: Some("pycon".to_string()),
                line: i + 1,
            });
            i = end;
            continue;
        }

        if is_heading(trimmed) {
            let heading_indent = indent_of(lines[i]);
            let start = i + 1;
            let end = (start..lines.len())
                .find(|&j| !lines[j].trim().is_empty() && indent_of(lines[j]) <= heading_indent)
                .unwrap_or(lines.len());
            let block = &lines[start..end];
            let nested = block.iter().any(|l| {
                let t = l.trim_start();
                t.starts_with(">>>") || FENCES.iter().any(|f| t.starts_with(f))
            });
            if !nested {
                let code = dedent(block);
                if !code.is_empty() {
                    let first = (start..end)
                        .find(|&j| !lines[j].trim().is_empty())
                        .unwrap_or(start);
                    snippets.push(Snippet {
                        lines: code,
                        language: Some("python".to_string()),
                        line: first + 1,
                    });
                }
                i = end;
                continue;
            }
        }

        i += 1;
    }
    snippets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Signature, SourceLocation};
    use crate::parser::CallSite;
    use std::path::PathBuf;

    fn function(name: &str, docstring: &str) -> Symbol {
        let mut symbol = Symbol::new(
            format!("shapes.core.{}", name),
            "shapes.core",
            SymbolKind::Function(Signature::new()),
            SourceLocation::new("shapes/core.py", 1, 3),
        );
        symbol.docstring = docstring.to_string();
        symbol
    }

    fn test_file(stem: &str, calls: &[(&str, &str, usize)]) -> TestSource {
        TestSource {
            path: PathBuf::from(format!("tests/{}.py", stem)),
            stem: stem.to_string(),
            calls: calls
                .iter()
                .map(|(callee, snippet, line)| CallSite {
                    callee: callee.to_string(),
                    snippet: snippet.to_string(),
                    line: *line,
                })
                .collect(),
        }
    }

    #[test]
    fn test_fenced_blocks() {
        let doc = "Build a widget.\n\n```python\nw = build()\nw.draw()\n```\n\n~~~\nplain()\n~~~";
        let examples = ExampleHarvester::new(10, &[]).harvest(&function("build", doc));
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].code, "w = build()\nw.draw()");
        assert_eq!(examples[0].language.as_deref(), Some("python"));
        assert_eq!(examples[0].line, 4);
        assert_eq!(examples[0].source_kind, ExampleSource::Docstring);
        assert_eq!(examples[1].code, "plain()");
        assert_eq!(examples[1].language, None);
    }

    #[test]
    fn test_doctest_session() {
        let doc = "Add numbers.\n\n>>> add(1, 2)\n3\n>>> add(\n...     2, 2)\n4\n\nMore prose.";
        let examples = ExampleHarvester::new(10, &[]).harvest(&function("add", doc));
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].code, ">>> add(1, 2)\n3\n>>> add(\n...     2, 2)\n4");
        assert_eq!(examples[0].language.as_deref(), Some("pycon"));
        assert_eq!(examples[0].line_count, 5);
    }

    #[test]
    fn test_example_section() {
        let doc = "Scale.\n\nExample:\n    s = scale(2)\n    print(s)\n\nReturns:\n    float: The factor.";
        let examples = ExampleHarvester::new(10, &[]).harvest(&function("scale", doc));
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].code, "s = scale(2)\nprint(s)");
        assert_eq!(examples[0].line, 4);
    }

    #[test]
    fn test_example_section_with_doctest_is_not_duplicated() {
        let doc = "Scale.\n\nExamples:\n    >>> scale(2)\n    4";
        let examples = ExampleHarvester::new(10, &[]).harvest(&function("scale", doc));
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].code, ">>> scale(2)\n4");
    }

    #[test]
    fn test_truncation() {
        let doc = "Long.\n\n```\na\nb\nc\nd\n```\n\n```\nx\ny\n```";
        let examples = ExampleHarvester::new(3, &[]).harvest(&function("long", doc));
        assert_eq!(examples[0].code, "a\nb\nc");
        assert_eq!(examples[0].line_count, 3);
        assert!(examples[0].truncated);
        assert_eq!(examples[1].line_count, 2);
        assert!(!examples[1].truncated);
    }

    #[test]
    fn test_snippet_at_exact_limit_is_whole() {
        let doc = "Exact.\n\n```\na\nb\nc\n```";
        let examples = ExampleHarvester::new(3, &[]).harvest(&function("exact", doc));
        assert_eq!(examples[0].code, "a\nb\nc");
        assert_eq!(examples[0].line_count, 3);
        assert!(!examples[0].truncated);
    }

    #[test]
    fn test_dedent_handles_multibyte_indentation() {
        assert_eq!(dedent(&["\u{a0}\u{a0}x = 1", "\u{a0}\u{a0}  y"]), vec!["x = 1", "  y"]);
        assert_eq!(dedent(&["\u{3000}run()", ""]), vec!["run()"]);
    }

    #[test]
    fn test_companion_test_fallback() {
        let tests = vec![
            test_file("test_other", &[("build", "other.build()", 3)]),
            test_file("test_core", &[("helper", "helper()", 2), ("build", "w = build(3)", 5)]),
        ];
        let harvester = ExampleHarvester::new(10, &tests);

        let examples = harvester.harvest(&function("build", "No examples here."));
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].source_kind, ExampleSource::Test);
        assert_eq!(examples[0].code, "w = build(3)");
        assert_eq!(examples[0].origin, Some(PathBuf::from("tests/test_core.py")));
        assert_eq!(examples[0].line, 5);

        assert!(harvester.harvest(&function("_build", "")).is_empty());

        let documented = harvester.harvest(&function("build", ">>> build()"));
        assert_eq!(documented[0].source_kind, ExampleSource::Docstring);
    }

    #[test]
    fn test_constants_never_use_tests() {
        let tests = vec![test_file("test_core", &[("LIMIT", "LIMIT()", 1)])];
        let mut constant = function("LIMIT", "");
        constant.kind = SymbolKind::Constant {
            annotation: None,
            value: Some("3".to_string()),
        };
        assert!(ExampleHarvester::new(10, &tests).harvest(&constant).is_empty());
    }
}
