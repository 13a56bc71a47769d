//! The backend turns a validated [`HybridIr`](crate::frontend::ir::HybridIr)
//! into target source text. Analysis shared by every target (types, control
//! flow) lives in [`crate::middle`]; each target under [`targets`] decides
//! how statements are spelled.
//!
//! Generated Rust depends on the runtime library in [`crate::runtime`],
//! which is shipped next to `main.rs` as one self-contained module file
//! produced by [`runtime_source`].

use crate::middle::cfg::ControlFlowStrategy;

pub mod diagnostics;
pub mod targets;
pub mod writer;

pub const DEFAULT_RUNTIME_NAME: &str = "go_runtime";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOptions {
    pub control_flow: ControlFlowStrategy,
    /// Module name of the emitted runtime, without the `.rs` extension.
    pub runtime_name: String,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            control_flow: ControlFlowStrategy::default(),
            runtime_name: DEFAULT_RUNTIME_NAME.to_string(),
        }
    }
}

/// Runtime files in dependency order, as `(module, source)`.
const RUNTIME_MODULES: &[(&str, &str)] = &[
    ("value", include_str!("../runtime/value.rs")),
    ("string", include_str!("../runtime/string.rs")),
    ("error", include_str!("../runtime/error.rs")),
    ("iface", include_str!("../runtime/iface.rs")),
    ("panic", include_str!("../runtime/panic.rs")),
    ("ptr", include_str!("../runtime/ptr.rs")),
    ("slice", include_str!("../runtime/slice.rs")),
    ("map", include_str!("../runtime/map.rs")),
    ("chan", include_str!("../runtime/chan.rs")),
    ("task", include_str!("../runtime/task.rs")),
    ("sync", include_str!("../runtime/sync.rs")),
    ("builtin", include_str!("../runtime/builtin.rs")),
    ("prelude", include_str!("../runtime/prelude.rs")),
];

/// The runtime library as a single module file named `runtime_name`.rs.
pub fn runtime_source(runtime_name: &str) -> String {
    let mut writer = writer::SourceWriter::new();
    writer.raw(&format!(
        indoc::indoc! {"
            // Runtime support for code generated by hybridc. DO NOT EDIT.
            // Declared from main.rs as `mod {};`.
            #![allow(dead_code, unused_imports, clippy::all)]
        "},
        runtime_name
    ));

    for (name, source) in RUNTIME_MODULES {
        writer.blank();
        writer.open(format!("pub mod {name}"));
        writer.raw(source);
        writer.close();
    }

    writer.blank();
    writer.line("pub use prelude::*;");
    writer.into_output()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_source_wraps_every_module() {
        let source = runtime_source("go_runtime");

        assert!(source.starts_with("// Runtime support for code generated by hybridc"));
        for (name, _) in RUNTIME_MODULES {
            assert!(source.contains(&format!("pub mod {name} {{")), "missing {name}");
        }
        assert!(source.trim_end().ends_with("pub use prelude::*;"));
        assert!(source.contains("Declared from main.rs as `mod go_runtime;`."));
    }

    #[test]
    fn default_options() {
        let options = CodegenOptions::default();

        assert_eq!(options.runtime_name, "go_runtime");
        assert_eq!(options.control_flow, ControlFlowStrategy::Structured);
    }
}
