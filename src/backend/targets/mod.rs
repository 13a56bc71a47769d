use crate::{
    backend::{CodegenOptions, diagnostics::Diagnostics},
    frontend::ir::HybridIr,
};

pub mod rust;

/// A file the generator wants written into the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub contents: String,
}

pub trait CodeGenerator {
    /// Translates the whole program. Gaps are reported to `diagnostics`
    /// and never abort generation.
    fn generate(
        &self,
        program: &HybridIr,
        options: &CodegenOptions,
        diagnostics: &mut Diagnostics,
    ) -> Vec<OutputFile>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Target {
    #[default]
    Rust,
}

impl Target {
    pub fn get_code_generator(self) -> impl CodeGenerator {
        match self {
            Target::Rust => rust::RustCodeGenerator,
        }
    }
}
