//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Turn a Python package into a cross-referenced documentation model
#[derive(Parser, Debug)]
#[command(name = "chewdoc")]
#[command(about = "Turn a Python package into a cross-referenced documentation model")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze a package and write its documentation model as JSON
    Analyze {
        /// Package directory or single module file
        path: PathBuf,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Glob patterns to exclude (can be repeated)
        #[arg(long)]
        exclude: Vec<String>,

        /// Maximum lines per harvested example
        #[arg(long)]
        max_example_lines: Option<usize>,

        /// Leave out import, inheritance and used-by edges
        #[arg(long)]
        no_cross_references: bool,

        /// Package version to record instead of the declared one
        #[arg(long)]
        package_version: Option<String>,

        /// Write the model to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit compact JSON
        #[arg(long)]
        compact: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_defaults() {
        let args = Args::try_parse_from(["chewdoc", "analyze", "./src"]).unwrap();
        match args.command {
            Command::Analyze {
                path,
                config,
                exclude,
                max_example_lines,
                no_cross_references,
                output,
                compact,
                verbose,
                ..
            } => {
                assert_eq!(path, PathBuf::from("./src"));
                assert_eq!(config, None);
                assert!(exclude.is_empty());
                assert_eq!(max_example_lines, None);
                assert!(!no_cross_references);
                assert_eq!(output, None);
                assert!(!compact);
                assert!(!verbose);
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_analyze_with_options() {
        let args = Args::try_parse_from([
            "chewdoc", "analyze", "./project",
            "--config", "custom.toml",
            "--exclude", "legacy/*",
            "--exclude", "*_pb2.py",
            "--max-example-lines", "4",
            "--no-cross-references",
            "--package-version", "2.1.0",
            "--output", "/tmp/model.json",
            "--compact",
            "--verbose",
        ]).unwrap();

        match args.command {
            Command::Analyze {
                path, config, exclude, max_example_lines, no_cross_references,
                package_version, output, compact, verbose,
            } => {
                assert_eq!(path, PathBuf::from("./project"));
                assert_eq!(config, Some(PathBuf::from("custom.toml")));
                assert_eq!(exclude, vec!["legacy/*".to_string(), "*_pb2.py".to_string()]);
                assert_eq!(max_example_lines, Some(4));
                assert!(no_cross_references);
                assert_eq!(package_version.as_deref(), Some("2.1.0"));
                assert_eq!(output, Some(PathBuf::from("/tmp/model.json")));
                assert!(compact);
                assert!(verbose);
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_short_flags() {
        let args =
            Args::try_parse_from(["chewdoc", "analyze", ".", "-c", "a.toml", "-o", "out.json", "-v"])
                .unwrap();
        match args.command {
            Command::Analyze { config, output, verbose, .. } => {
                assert_eq!(config, Some(PathBuf::from("a.toml")));
                assert_eq!(output, Some(PathBuf::from("out.json")));
                assert!(verbose);
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_rejects_bad_line_count() {
        assert!(Args::try_parse_from(["chewdoc", "analyze", ".", "--max-example-lines", "many"]).is_err());
    }

    #[test]
    fn test_version_command() {
        let args = Args::try_parse_from(["chewdoc", "version"]).unwrap();
        assert!(matches!(args.command, Command::Version));
    }
}
