// Docstring cleanup and declared-type extraction

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static GOOGLE_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\*{0,2}(\w+)\s*\(([^)]+)\)\s*:").unwrap());
static SPHINX_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*:type\s+\*{0,2}(\w+)\s*:\s*(.+?)\s*$").unwrap());
static SPHINX_TYPED_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*:param\s+(.+?)\s+\*{0,2}(\w+)\s*:").unwrap());
static SPHINX_RTYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*:rtype\s*:\s*(.+?)\s*$").unwrap());
static TYPE_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][\w.]*(\[[\w.\[\], |]*\])?( \| [A-Za-z_][\w.\[\], ]*)*$").unwrap());

/// Clean a raw docstring the way `inspect.cleandoc` does
pub fn clean(raw: &str) -> String {
    let expanded = expand_tabs(raw);
    let lines: Vec<&str> = expanded.split('\n').collect();

    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
    if let Some(first) = lines.first() {
        cleaned.push(first.trim_start().to_string());
    }
    for line in lines.iter().skip(1) {
        if line.trim().is_empty() {
            cleaned.push(String::new());
        } else {
            cleaned.push(line.get(margin..).unwrap_or(line.trim_start()).to_string());
        }
    }

    while cleaned.last().map_or(false, |l| l.trim().is_empty()) {
        cleaned.pop();
    }
    let leading = cleaned.iter().take_while(|l| l.trim().is_empty()).count();
    cleaned.drain(..leading);

    cleaned
        .iter()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn expand_tabs(text: &str) -> String {
    if !text.contains('\t') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut column = 0;
    for c in text.chars() {
        match c {
            '\t' => {
                let pad = 8 - column % 8;
                out.extend(std::iter::repeat(' ').take(pad));
                column += pad;
            }
            '\n' => {
                out.push(c);
                column = 0;
            }
            _ => {
                out.push(c);
                column += 1;
            }
        }
    }
    out
}

/// Types named by a docstring for parameters and return value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredTypes {
    pub params: HashMap<String, String>,
    pub returns: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Args,
    Returns,
}

/// Collect Google-style (`name (type):`) and Sphinx-style (`:type name:`)
/// type declarations from a cleaned docstring
pub fn declared_types(doc: &str) -> DeclaredTypes {
    let mut declared = DeclaredTypes::default();
    let mut section = Section::None;

    for line in doc.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(caps) = SPHINX_TYPE.captures(line) {
            declared.params.insert(caps[1].to_string(), caps[2].to_string());
            continue;
        }
        if let Some(caps) = SPHINX_TYPED_PARAM.captures(line) {
            declared
                .params
                .entry(caps[2].to_string())
                .or_insert_with(|| caps[1].trim().to_string());
            continue;
        }
        if let Some(caps) = SPHINX_RTYPE.captures(line) {
            declared.returns = Some(caps[1].to_string());
            continue;
        }

        // Section headers sit at the left margin
        if !line.starts_with(char::is_whitespace) {
            section = match trimmed {
                "Args:" | "Arguments:" | "Parameters:" | "Params:" | "Keyword Args:" => Section::Args,
                "Returns:" | "Return:" | "Yields:" => Section::Returns,
                _ => Section::None,
            };
            continue;
        }

        match section {
            Section::Args => {
                if let Some(caps) = GOOGLE_PARAM.captures(line) {
                    let ty = caps[2]
                        .trim()
                        .trim_end_matches("optional")
                        .trim_end()
                        .trim_end_matches(',')
                        .trim();
                    if !ty.is_empty() {
                        declared
                            .params
                            .entry(caps[1].to_string())
                            .or_insert_with(|| ty.to_string());
                    }
                }
            }
            Section::Returns => {
                if declared.returns.is_none() {
                    if let Some((ty, _)) = trimmed.split_once(':') {
                        let ty = ty.trim();
                        if TYPE_LIKE.is_match(ty) {
                            declared.returns = Some(ty.to_string());
                        }
                    }
                }
                section = Section::None;
            }
            Section::None => {}
        }
    }

    declared
}
