//! Package metadata from `pyproject.toml` or `setup.py`.
//!
//! The source root and up to two of its parents are searched; the first
//! directory with usable metadata wins. When nothing is declared the package
//! name falls back to a cleaned-up directory name.

use crate::config::ProjectConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Name used when nothing better can be found
pub const UNKNOWN_PACKAGE: &str = "unknown_package";

/// Directory names that say nothing about the package they hold
const GENERIC_DIRS: &[&str] = &["src", "lib", "site-packages", "dist-packages"];

static VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_]v?\d.*$").unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_.]+").unwrap());
static SETUP_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bname\s*=\s*['"]([^'"]+)['"]"#).unwrap());
static SETUP_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bversion\s*=\s*['"]([^'"]+)['"]"#).unwrap());
static SETUP_DESCRIPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bdescription\s*=\s*['"]([^'"]*)['"]"#).unwrap());
static SETUP_REQUIRES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\binstall_requires\s*=\s*\[(.*?)\]").unwrap());
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).unwrap());

/// Descriptive data about the analyzed package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub requires_python: Option<String>,
    /// Declared runtime requirements as written
    pub dependencies: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PyProjectFile {
    project: Option<ProjectTable>,
    tool: Option<ToolTable>,
}

#[derive(Debug, Deserialize)]
struct ProjectTable {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    #[serde(rename = "requires-python")]
    requires_python: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ToolTable {
    poetry: Option<PoetryTable>,
}

#[derive(Debug, Deserialize)]
struct PoetryTable {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
}

impl PackageMetadata {
    /// Collect metadata for the package rooted at `root`, then apply
    /// configured overrides
    pub fn discover(root: &Path, overrides: &ProjectConfig) -> Self {
        let start = if root.is_file() {
            root.parent().unwrap_or(root)
        } else {
            root
        };

        let mut metadata = start
            .ancestors()
            .take(3)
            .find_map(|dir| Self::from_pyproject(dir).or_else(|| Self::from_setup_py(dir)))
            .unwrap_or_else(|| Self {
                name: fallback_name(root),
                ..Self::default()
            });

        if let Some(ref name) = overrides.name {
            metadata.name = name.clone();
        }
        if let Some(ref version) = overrides.version {
            metadata.version = Some(version.clone());
        }
        metadata
    }

    fn from_pyproject(dir: &Path) -> Option<Self> {
        let path = dir.join("pyproject.toml");
        let contents = std::fs::read_to_string(&path).ok()?;
        let file: PyProjectFile = match toml::from_str(&contents) {
            Ok(file) => file,
            Err(e) => {
                warn!("Skipping malformed {}: {}", path.display(), e);
                return None;
            }
        };

        if let Some(project) = file.project {
            if let Some(name) = project.name {
                debug!("Package metadata from [project] in {}", path.display());
                return Some(Self {
                    name,
                    version: project.version,
                    description: project.description,
                    requires_python: project.requires_python,
                    dependencies: project.dependencies,
                });
            }
        }

        let poetry = file.tool.and_then(|t| t.poetry)?;
        let name = poetry.name?;
        debug!("Package metadata from [tool.poetry] in {}", path.display());
        let mut requires_python = None;
        let mut dependencies = Vec::new();
        for (dependency, spec) in poetry.dependencies {
            if dependency == "python" {
                requires_python = spec.as_str().map(str::to_string);
            } else {
                dependencies.push(dependency);
            }
        }
        Some(Self {
            name,
            version: poetry.version,
            description: poetry.description,
            requires_python,
            dependencies,
        })
    }

    fn from_setup_py(dir: &Path) -> Option<Self> {
        let path = dir.join("setup.py");
        let contents = std::fs::read_to_string(&path).ok()?;
        let capture = |re: &Regex| re.captures(&contents).map(|c| c[1].to_string());

        let name = capture(&SETUP_NAME)?;
        debug!("Package metadata from {}", path.display());
        let dependencies = SETUP_REQUIRES
            .captures(&contents)
            .map(|c| {
                QUOTED
                    .captures_iter(&c[1])
                    .map(|q| q[1].to_string())
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            name,
            version: capture(&SETUP_VERSION),
            description: capture(&SETUP_DESCRIPTION),
            requires_python: None,
            dependencies,
        })
    }
}

/// Normalize a directory name into a package name
fn clean_name(raw: &str) -> String {
    let unversioned = VERSION_SUFFIX.replace(raw, "");
    SEPARATORS
        .replace_all(&unversioned, "_")
        .trim_matches('_')
        .to_lowercase()
}

fn fallback_name(root: &Path) -> String {
    if root.is_file() {
        if let Some(stem) = root.file_stem().and_then(|s| s.to_str()) {
            let name = clean_name(stem);
            if !name.is_empty() {
                return name;
            }
        }
    }

    let mut dir = if root.is_file() { root.parent() } else { Some(root) };
    while let Some(current) = dir {
        let Some(raw) = current.file_name().and_then(|n| n.to_str()) else {
            break;
        };
        if GENERIC_DIRS.contains(&raw.to_lowercase().as_str()) {
            dir = current.parent();
            continue;
        }
        let name = clean_name(raw);
        if !name.is_empty() {
            return name;
        }
        break;
    }
    UNKNOWN_PACKAGE.to_string()
}
