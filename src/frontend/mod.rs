//! Reading the hybrid IR document written by the Go frontend.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

use self::ir::HybridIr;

pub mod ir;
pub mod pretty_print;
pub mod validate;

#[derive(Debug)]
pub struct SourceFile {
    pub contents: String,
    pub origin: SourceFileOrigin,
}

impl SourceFile {
    pub fn read(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|err| Error::io("read", path, err))?;

        Ok(SourceFile {
            contents,
            origin: SourceFileOrigin::File(path.to_path_buf()),
        })
    }

    pub fn from_memory(contents: impl Into<String>) -> Self {
        SourceFile {
            contents: contents.into(),
            origin: SourceFileOrigin::Memory,
        }
    }

    /// The 1-based `line` followed by a caret under `column`.
    pub fn snippet(&self, line: usize, column: usize) -> String {
        let text = self
            .contents
            .lines()
            .nth(line.saturating_sub(1))
            .unwrap_or_default();
        let caret_at = text
            .char_indices()
            .take_while(|(i, _)| *i + 1 < column)
            .count();

        format!("{text}\n{}^", " ".repeat(caret_at))
    }

    /// Deserializes the document. Unknown fields are ignored, missing
    /// required fields are errors.
    pub fn parse(&self) -> Result<HybridIr> {
        serde_json::from_str(&self.contents).map_err(|err| {
            let (line, column) = (err.line(), err.column());
            Error::Parse {
                origin: self.origin.to_string(),
                line,
                column,
                message: describe(&err),
                snippet: self.snippet(line, column),
            }
        })
    }
}

/// serde_json appends " at line L column C" itself; that is reported
/// separately.
fn describe(err: &serde_json::Error) -> String {
    let message = err.to_string();
    match message.rfind(" at line ") {
        Some(at) => message[..at].to_string(),
        None => message,
    }
}

#[derive(Debug)]
pub enum SourceFileOrigin {
    Memory,
    File(PathBuf),
}

impl core::fmt::Display for SourceFileOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFileOrigin::Memory => f.write_str("<memory>"),
            SourceFileOrigin::File(path) => f.write_fmt(format_args!("{}", path.display())),
        }
    }
}

/// Reads, parses and validates the IR at `path`.
pub fn load(path: &Path) -> Result<HybridIr> {
    let source = SourceFile::read(path)?;
    let program = source.parse()?;
    debug!(
        packages = program.packages.len(),
        main = %program.main_package,
        "parsed IR"
    );

    validate::validate(&program)?;
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_line_and_column() {
        let source = SourceFile::from_memory("{\n  \"packages\": [],\n  \"main_package\": 7\n}");
        let Err(Error::Parse {
            line,
            column,
            message,
            snippet,
            ..
        }) = source.parse()
        else {
            panic!("expected a parse error");
        };

        assert_eq!(line, 3);
        assert!(column > 0);
        assert!(message.contains("invalid type"));
        assert!(!message.contains(" at line "));
        assert!(snippet.starts_with("  \"main_package\": 7\n"));
        assert!(snippet.ends_with('^'));
    }

    #[test]
    fn unknown_type_kind_is_rejected() {
        let source = SourceFile::from_memory(
            r#"{"packages": [{"path": "main", "name": "main", "types": [{"name": "T", "kind": "union"}],
                "functions": [], "globals": [], "constants": [], "imports": [], "cgo_imports": []}],
                "main_package": "main"}"#,
        );

        assert!(matches!(source.parse(), Err(Error::Parse { .. })));
    }

    #[test]
    fn additive_unknown_fields_are_ignored() {
        let source = SourceFile::from_memory(
            r#"{"packages": [], "main_package": "main", "frontend_version": "2"}"#,
        );

        assert!(source.parse().is_ok());
    }

    #[test]
    fn snippet_points_at_column() {
        let source = SourceFile::from_memory("abc\ndefgh");
        assert_eq!(source.snippet(2, 3), "defgh\n  ^");
    }
}
