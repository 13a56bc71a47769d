use std::path::PathBuf;

use crate::backend::{CodegenOptions, targets::Target};

/// Everything the driver needs for one compilation.
#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Pretty-print the loaded IR instead of generating code.
    pub dump_ir: bool,
    /// Fail (writing nothing) if generation recorded any warning.
    pub deny_warnings: bool,
    pub target: Target,
    pub codegen: CodegenOptions,
}

impl Config {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            dump_ir: false,
            deny_warnings: false,
            target: Target::Rust,
            codegen: CodegenOptions::default(),
        }
    }
}
