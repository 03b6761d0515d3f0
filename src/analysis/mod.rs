// Analysis pipeline: load, parse, resolve, relate, harvest, assemble

pub mod assemble;
pub mod examples;
pub mod graph;
pub mod imports;
pub mod index;
pub mod types;

pub use assemble::{assemble, StageOutputs};
pub use examples::ExampleHarvester;
pub use graph::{RelationshipBuilder, Relationships};
pub use imports::{ImportResolver, ImportTarget};
pub use index::SymbolIndex;
pub use types::{Scope, TypeResolver};

use crate::config::Config;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Location, Severity};
use crate::error::{Error, Result};
use crate::loader::{LoadedSources, SourceLoader, SourceUnit};
use crate::metadata::PackageMetadata;
use crate::model::DocumentationModel;
use crate::parser::{collect_test_source, extract, ParsedModule, TestSource, TreeBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Outcome of one analysis run
#[derive(Debug)]
pub struct AnalysisReport {
    /// `None` when a structural violation prevented assembly
    pub model: Option<DocumentationModel>,
    /// Findings of every stage, in stage order
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisReport {
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn count_at_least(&self, severity: Severity) -> usize {
        crate::diagnostics::count_at_least(&self.diagnostics, severity)
    }
}

/// Main analyzer that orchestrates the analysis pipeline
pub struct Analyzer {
    config: Config,
    verbose: bool,
}

impl Analyzer {
    /// Create a new analyzer with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        // Fail early if the grammar cannot be loaded at all
        TreeBuilder::new()?;
        Ok(Self {
            config,
            verbose: false,
        })
    }

    /// Create analyzer with verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Analyze the package rooted at `root`
    pub fn analyze(&self, root: &Path) -> Result<AnalysisReport> {
        let loader = SourceLoader::new(root, &self.config.analysis)?;
        let sources = loader.load()?;
        if sources.modules.is_empty() {
            return Err(Error::analysis(format!(
                "No Python modules found in {}",
                loader.root().display()
            )));
        }
        info!(
            "Analyzing {} modules ({} test files) in {}",
            sources.modules.len(),
            sources.tests.len(),
            loader.root().display()
        );

        let metadata = PackageMetadata::discover(loader.root(), &self.config.project);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.analysis.jobs.unwrap_or(0))
            .build()
            .map_err(|e| Error::analysis(format!("Cannot start worker pool: {}", e)))?;
        pool.install(|| self.run_stages(sources, metadata))
    }

    fn run_stages(&self, sources: LoadedSources, metadata: PackageMetadata) -> Result<AnalysisReport> {
        let LoadedSources {
            modules: units,
            tests,
            diagnostics: mut all,
        } = sources;

        let (mut modules, parse_diagnostics) = self.parse_modules(units);
        all.extend(parse_diagnostics);
        for module in &mut modules {
            all.append(&mut module.diagnostics);
        }
        let (test_sources, test_diagnostics) = parse_tests(tests);
        all.extend(test_diagnostics);
        debug!("Extracted {} modules", modules.len());

        // Extraction is complete; the remaining stages only read it
        let ((resolved, mut relationships), examples) = {
            let index = SymbolIndex::build(&modules);
            let resolver = TypeResolver::new(&index, &self.config.analysis.known_types);
            let builder = RelationshipBuilder::new(&index, &resolver, &modules);
            let harvester =
                ExampleHarvester::new(self.config.analysis.max_example_lines, &test_sources);

            rayon::join(
                || {
                    rayon::join(
                        || resolver.resolve_all(&modules),
                        || builder.build(&modules),
                    )
                },
                || harvester.harvest_all(&modules),
            )
        };
        let (types, type_diagnostics) = resolved;
        debug!(
            "Resolved {} symbols, harvested {} examples",
            types.len(),
            examples.len()
        );
        all.extend(type_diagnostics);
        all.append(&mut relationships.diagnostics);

        let outputs = StageOutputs {
            modules,
            types,
            relationships,
            examples,
        };
        match assemble(outputs, metadata, &self.config.analysis) {
            Ok((model, assemble_diagnostics)) => {
                all.extend(assemble_diagnostics);
                info!(
                    "Documented {} symbols with {} diagnostics",
                    model.symbol_count(),
                    all.len()
                );
                Ok(AnalysisReport {
                    model: Some(model),
                    diagnostics: all,
                })
            }
            Err(Error::StructuralViolation {
                qualified_name,
                first,
                second,
            }) => {
                all.push(Diagnostic::new(
                    Severity::Fatal,
                    DiagnosticKind::StructuralViolation,
                    Location::symbol(&qualified_name),
                    format!(
                        "duplicate qualified name `{}` defined at {} and {}",
                        qualified_name, first, second
                    ),
                ));
                Ok(AnalysisReport {
                    model: None,
                    diagnostics: all,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Parse and extract every module on the pool, keeping loader order
    fn parse_modules(&self, units: Vec<SourceUnit>) -> (Vec<ParsedModule>, Vec<Diagnostic>) {
        let progress = self.verbose.then(|| {
            let pb = ProgressBar::new(units.len() as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .map(|s| s.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            pb.set_style(style);
            pb.set_message("parsing");
            pb
        });

        let results: Vec<std::result::Result<ParsedModule, Diagnostic>> = units
            .into_par_iter()
            .map_init(
                || TreeBuilder::new().ok(),
                |builder, unit| {
                    let path = unit.path.clone();
                    let result = match builder {
                        Some(builder) => builder
                            .parse(unit)
                            .map(|tree| extract(&tree))
                            .map_err(|failure| failure.to_diagnostic()),
                        None => Err(Diagnostic::parse_failure(&path, "parser unavailable")),
                    };
                    if let Some(ref pb) = progress {
                        pb.inc(1);
                    }
                    result
                },
            )
            .collect();

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let mut modules = Vec::with_capacity(results.len());
        let mut diagnostics = Vec::new();
        for result in results {
            match result {
                Ok(module) => modules.push(module),
                Err(diagnostic) => diagnostics.push(diagnostic),
            }
        }
        (modules, diagnostics)
    }
}

/// Call sites of companion test files; broken ones are skipped with a warning
fn parse_tests(units: Vec<SourceUnit>) -> (Vec<TestSource>, Vec<Diagnostic>) {
    let results: Vec<std::result::Result<TestSource, Diagnostic>> = units
        .into_par_iter()
        .map_init(
            || TreeBuilder::new().ok(),
            |builder, unit| {
                let path = unit.path.clone();
                let failure = match builder {
                    Some(builder) => match builder.parse(unit) {
                        Ok(tree) => return Ok(collect_test_source(&tree)),
                        Err(failure) => failure.cause,
                    },
                    None => "parser unavailable".to_string(),
                };
                Err(Diagnostic::warning(
                    DiagnosticKind::SkippedFile,
                    Location::file(path),
                    format!("test file not used for examples: {}", failure),
                ))
            },
        )
        .collect();

    let mut tests = Vec::new();
    let mut diagnostics = Vec::new();
    for result in results {
        match result {
            Ok(test) => tests.push(test),
            Err(diagnostic) => diagnostics.push(diagnostic),
        }
    }
    (tests, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_analyze_small_package() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("shapes");
        write(&root, "__init__.py", "\"\"\"Shapes.\"\"\"\nfrom .core import Widget\n");
        write(
            &root,
            "core.py",
            "class Widget:\n    \"\"\"A widget.\n\n    >>> Widget().area()\n    0\n    \"\"\"\n\n    def area(self) -> int:\n        return 0\n",
        );

        let report = Analyzer::new(Config::default()).unwrap().analyze(&root).unwrap();
        let model = report.model.unwrap();
        assert_eq!(model.metadata().name, "shapes");
        assert_eq!(model.modules().len(), 2);
        assert!(model.symbol("shapes.core.Widget.area").is_some());
        assert_eq!(model.examples_for("shapes.core.Widget").count(), 1);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    }

    #[test]
    fn test_parse_failures_do_not_abort() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "good.py", "def ok(): pass\n");
        write(dir.path(), "bad.py", "def broken(:\n");

        let report = Analyzer::new(Config::default())
            .unwrap()
            .analyze(dir.path())
            .unwrap();
        let model = report.model.as_ref().unwrap();
        assert!(model.symbol("good.ok").is_some());
        assert!(model.module("bad").is_none());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::ParseFailure);
        assert_eq!(report.count_at_least(Severity::Error), 1);
    }

    #[test]
    fn test_no_modules_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "README.md", "nothing here");
        let err = Analyzer::new(Config::default())
            .unwrap()
            .analyze(dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("No Python modules found"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.analysis.max_example_lines = 0;
        assert!(Analyzer::new(config).is_err());
    }
}
