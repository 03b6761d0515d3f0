// Parser module: syntax trees and per-module symbol extraction

pub mod ast;
pub mod docstring;
mod python;
mod tree;

pub use ast::*;
pub use python::{collect_test_source, extract};
pub use tree::{ParseFailure, SyntaxTree, TreeBuilder};
