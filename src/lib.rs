//! Chewdoc - documentation models for Python packages
//!
//! Parses every module of a Python package, recovers its public surface,
//! resolves annotations, links modules and classes, harvests examples and
//! assembles everything into one frozen [`DocumentationModel`].

pub mod analysis;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod loader;
pub mod metadata;
pub mod model;
pub mod parser;

// Re-export main types
pub use analysis::{AnalysisReport, Analyzer};
pub use config::Config;
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use error::{Error, Result};
pub use metadata::PackageMetadata;
pub use model::DocumentationModel;
