use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name looked up next to the analyzed package
pub const CONFIG_FILE_NAME: &str = "chewdoc.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

/// Package metadata overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Analysis settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Paths matching any of these are never parsed as modules
    pub exclude_patterns: Vec<String>,
    /// Paths matching any of these are companion test sources, not modules
    pub test_patterns: Vec<String>,
    /// Raw annotation text -> canonical type name, consulted first
    pub known_types: BTreeMap<String, String>,
    pub max_example_lines: usize,
    pub enable_cross_references: bool,
    /// Worker threads for parsing; rayon's default when unset
    pub jobs: Option<usize>,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Where the JSON model is written; stdout when unset
    pub path: Option<PathBuf>,
    pub pretty: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: vec![
                "__pycache__".to_string(),
                ".*".to_string(),
                "tests/*".to_string(),
                "docs/*".to_string(),
                "build/*".to_string(),
                "dist/*".to_string(),
                "venv*".to_string(),
                ".venv*".to_string(),
            ],
            test_patterns: vec![
                "tests/*".to_string(),
                "test/*".to_string(),
                "test_*.py".to_string(),
                "*_test.py".to_string(),
            ],
            known_types: [("List", "list"), ("Dict", "dict"), ("Optional", "typing.Optional")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            max_example_lines: 10,
            enable_cross_references: true,
            jobs: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            pretty: true,
        }
    }
}

/// Shape of `pyproject.toml` as far as chewdoc cares
#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    tool: PyProjectTools,
}

#[derive(Debug, Default, Deserialize)]
struct PyProjectTools {
    chewdoc: Option<Config>,
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file or return defaults
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Read the `[tool.chewdoc]` table of a pyproject file, if present
    pub fn from_pyproject(path: &Path) -> Result<Option<Self>> {
        let contents = std::fs::read_to_string(path)?;
        let pyproject: PyProject = toml::from_str(&contents)?;
        match pyproject.tool.chewdoc {
            Some(config) => {
                config.validate()?;
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }

    /// Find the configuration belonging to a source root.
    ///
    /// `chewdoc.toml` wins over `[tool.chewdoc]` in `pyproject.toml`;
    /// defaults apply when neither exists.
    pub fn discover(root: &Path) -> Result<Self> {
        let dedicated = root.join(CONFIG_FILE_NAME);
        if dedicated.is_file() {
            debug!("Using config {}", dedicated.display());
            return Self::load(&dedicated);
        }

        let pyproject = root.join("pyproject.toml");
        if pyproject.is_file() {
            if let Some(config) = Self::from_pyproject(&pyproject)? {
                debug!("Using [tool.chewdoc] from {}", pyproject.display());
                return Ok(config);
            }
        }

        Ok(Self::default())
    }

    /// Merge CLI arguments into config (CLI takes precedence)
    pub fn merge_cli(
        &mut self,
        exclude: Vec<String>,
        max_example_lines: Option<usize>,
        no_cross_references: bool,
        package_version: Option<String>,
        output: Option<PathBuf>,
        compact: bool,
    ) {
        if !exclude.is_empty() {
            self.analysis.exclude_patterns.extend(exclude);
        }

        if let Some(lines) = max_example_lines {
            self.analysis.max_example_lines = lines;
        }

        if no_cross_references {
            self.analysis.enable_cross_references = false;
        }

        if let Some(version) = package_version {
            self.project.version = Some(version);
        }

        if let Some(out) = output {
            self.output.path = Some(out);
        }

        if compact {
            self.output.pretty = false;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.analysis.max_example_lines == 0 {
            return Err(Error::config_validation(
                "max_example_lines must be at least 1",
            ));
        }

        if self.analysis.jobs == Some(0) {
            return Err(Error::config_validation("jobs must be at least 1"));
        }

        for pattern in self
            .analysis
            .exclude_patterns
            .iter()
            .chain(&self.analysis.test_patterns)
        {
            glob::Pattern::new(pattern)?;
        }

        if self.analysis.known_types.keys().any(|k| k.trim().is_empty()) {
            return Err(Error::config_validation("known_types keys must not be empty"));
        }

        Ok(())
    }
}
