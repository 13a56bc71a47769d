//! One compilation from an IR file to an output directory.

use std::{
    fs,
    io::IsTerminal,
    path::{Path, PathBuf},
};

use mktemp::Temp;
use tracing::{debug, info, info_span};

use crate::{
    backend::{diagnostics::Diagnostics, targets::{CodeGenerator, OutputFile}},
    config::Config,
    error::{Error, Result},
    frontend::{self, pretty_print::pretty_print_ir},
};

/// What a successful run produced.
#[derive(Debug)]
pub enum Outcome {
    /// `--dump-ir`: the program listing, nothing written.
    Dumped(String),
    /// Paths of the files written, in generation order.
    Written(Vec<PathBuf>),
}

/// Loads, generates and writes. Warnings land in `diagnostics` even when
/// the run fails, so the caller can still show them.
pub fn run(config: &Config, diagnostics: &mut Diagnostics) -> Result<Outcome> {
    let program = {
        let _span = info_span!("load", input = %config.input.display()).entered();
        frontend::load(&config.input)?
    };

    if config.dump_ir {
        let listing = pretty_print_ir(&program);
        return Ok(Outcome::Dumped(match std::io::stdout().is_terminal() {
            true => listing,
            false => strip_ansi_escapes::strip_str(listing),
        }));
    }

    let files = {
        let _span = info_span!("generate", target = ?config.target).entered();
        config
            .target
            .get_code_generator()
            .generate(&program, &config.codegen, diagnostics)
    };
    debug!(warnings = diagnostics.len(), files = files.len(), "generated");

    if config.deny_warnings && !diagnostics.is_empty() {
        return Err(Error::DeniedWarnings {
            count: diagnostics.len(),
        });
    }

    let _span = info_span!("write", output_dir = %config.output_dir.display()).entered();
    let written = write_all(&config.output_dir, &files)?;
    info!(files = written.len(), "wrote output");
    Ok(Outcome::Written(written))
}

/// Stages every file in a temporary directory inside `output_dir` and only
/// then renames them into place, so a failed write leaves no partial output.
fn write_all(output_dir: &Path, files: &[OutputFile]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir).map_err(|err| Error::io("create", output_dir, err))?;

    let staging = Temp::new_dir_in(output_dir)
        .map_err(|err| Error::io("create a staging directory in", output_dir, err))?;
    let staging_dir = staging.to_path_buf();

    for file in files {
        let path = staging_dir.join(&file.name);
        fs::write(&path, &file.contents).map_err(|err| Error::io("write", path, err))?;
    }

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let from = staging_dir.join(&file.name);
        let to = output_dir.join(&file.name);
        fs::rename(&from, &to).map_err(|err| Error::io("move into place", &to, err))?;
        debug!(path = %to.display(), bytes = file.contents.len(), "wrote");
        written.push(to);
    }

    // `staging` removes the now empty directory when dropped.
    drop(staging);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> Temp {
        Temp::new_dir().unwrap()
    }

    #[test]
    fn writes_every_file_and_leaves_no_staging_directory() {
        let dir = scratch();
        let out = dir.join("out");
        let files = vec![
            OutputFile {
                name: "main.rs".to_string(),
                contents: "fn main() {}\n".to_string(),
            },
            OutputFile {
                name: "go_runtime.rs".to_string(),
                contents: "// runtime\n".to_string(),
            },
        ];

        let written = write_all(&out, &files).unwrap();

        assert_eq!(written, vec![out.join("main.rs"), out.join("go_runtime.rs")]);
        assert_eq!(fs::read_to_string(out.join("main.rs")).unwrap(), "fn main() {}\n");
        assert_eq!(fs::read_dir(&out).unwrap().count(), 2);
    }

    #[test]
    fn invalid_input_writes_nothing() {
        let dir = scratch();
        let input = dir.join("broken.json");
        fs::write(&input, "{\"packages\": [").unwrap();
        let out = dir.join("out");

        let result = run(&Config::new(&input, &out), &mut Diagnostics::new());

        assert!(matches!(result, Err(Error::Parse { .. })));
        assert!(!out.exists());
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let dir = scratch();

        let result = run(
            &Config::new(dir.join("absent.json"), dir.join("out")),
            &mut Diagnostics::new(),
        );

        assert!(matches!(result, Err(Error::Io { action: "read", .. })));
    }
}
