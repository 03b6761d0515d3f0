//! CLI module for chewdoc

mod args;

pub use args::{Args, Command};

use crate::analysis::Analyzer;
use crate::config::Config;
use crate::diagnostics::Severity;
use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tracing::Level;

/// Exit code when a structural violation prevented the model
const EXIT_NO_MODEL: u8 = 2;

/// Run the CLI application
pub fn run() -> ExitCode {
    let args = Args::parse_args();

    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

fn execute(args: Args) -> Result<ExitCode> {
    match args.command {
        Command::Analyze {
            path,
            config,
            exclude,
            max_example_lines,
            no_cross_references,
            package_version,
            output,
            compact,
            verbose,
        } => {
            init_logging(verbose);

            if !path.exists() {
                return Err(Error::PathNotFound(path));
            }

            let mut cfg = match &config {
                Some(config_path) => Config::load(config_path)?,
                None => Config::discover(config_root(&path))?,
            };

            // Merge CLI arguments (CLI takes precedence)
            cfg.merge_cli(
                exclude,
                max_example_lines,
                no_cross_references,
                package_version,
                output,
                compact,
            );

            let analyzer = Analyzer::new(cfg)?.with_verbose(verbose);
            let report = analyzer.analyze(&path)?;

            for diagnostic in &report.diagnostics {
                eprintln!("{}", diagnostic);
            }

            let Some(model) = report.model.as_ref() else {
                eprintln!("Error: no documentation model was produced");
                return Ok(ExitCode::from(EXIT_NO_MODEL));
            };

            let json = model.to_json(analyzer.config().output.pretty)?;
            match &analyzer.config().output.path {
                Some(out) => {
                    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(out, json + "\n")?;
                    if verbose {
                        eprintln!("Model written to {}", out.display());
                    }
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    writeln!(stdout, "{}", json)?;
                }
            }

            if verbose {
                eprintln!(
                    "{} modules, {} symbols, {} warnings",
                    model.modules().len(),
                    model.symbol_count(),
                    report.count_at_least(Severity::Warning)
                );
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Version => {
            println!("chewdoc {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Directory searched for `chewdoc.toml` / `pyproject.toml`
fn config_root(path: &Path) -> &Path {
    if path.is_file() {
        path.parent().unwrap_or(path)
    } else {
        path
    }
}
