//! Structural checks the backend relies on but serde cannot express.

use hashbrown::HashSet;

use crate::error::{Error, Result};

use super::ir::{FunctionIr, HybridIr, PackageIr, TypeDef, TypeKind};

pub fn validate(program: &HybridIr) -> Result<()> {
    let mut paths = HashSet::new();
    for package in &program.packages {
        if !paths.insert(package.path.as_str()) {
            return Err(Error::invalid(
                format!("package {}", package.path),
                "duplicate package path",
            ));
        }
        validate_package(package)?;
    }

    if !program.packages.is_empty() && !paths.contains(program.main_package.as_str()) {
        return Err(Error::invalid(
            "program",
            format!("main package '{}' is not among the packages", program.main_package),
        ));
    }

    Ok(())
}

fn validate_package(package: &PackageIr) -> Result<()> {
    let mut type_names = HashSet::new();
    for def in &package.types {
        if !type_names.insert(def.name.as_str()) {
            return Err(Error::invalid(
                format!("{}.{}", package.path, def.name),
                "duplicate type definition",
            ));
        }
        validate_type(package, def)?;
    }

    for function in &package.functions {
        validate_function(package, function)?;
    }

    Ok(())
}

/// The kind decides which of fields, underlying and signature may be set.
/// Any of them may be missing; the generator reports that as a gap.
fn validate_type(package: &PackageIr, def: &TypeDef) -> Result<()> {
    let (fields, underlying, signature) = match def.kind {
        TypeKind::Struct | TypeKind::Interface => (true, false, false),
        TypeKind::Alias => (false, true, false),
        TypeKind::Func => (false, false, true),
    };
    let stray = [
        (!fields && !def.fields.is_empty(), "fields"),
        (!underlying && def.underlying.is_some(), "an underlying type"),
        (!signature && def.signature.is_some(), "a signature"),
    ]
    .into_iter()
    .find_map(|(stray, what)| stray.then_some(what));

    match stray {
        Some(what) => Err(Error::invalid(
            format!("{}.{}", package.path, def.name),
            format!("{} type carries {what}", <&str>::from(def.kind)),
        )),
        None => Ok(()),
    }
}

fn validate_function(package: &PackageIr, function: &FunctionIr) -> Result<()> {
    let location = || format!("{}.{}", package.path, function.name);

    if function.is_method && function.receiver.is_none() {
        return Err(Error::invalid(location(), "method without a receiver"));
    }

    let Some(body) = &function.body else {
        return Ok(());
    };
    if body.blocks.is_empty() {
        return Ok(());
    }

    let mut ids = HashSet::new();
    for block in &body.blocks {
        if !ids.insert(block.id) {
            return Err(Error::invalid(
                location(),
                format!("duplicate block id {}", block.id),
            ));
        }
    }
    if !ids.contains(&0) {
        return Err(Error::invalid(location(), "no entry block 0"));
    }

    for block in &body.blocks {
        if let Some(bad) = block.successors.iter().find(|s| !ids.contains(*s)) {
            return Err(Error::invalid(
                location(),
                format!("block {} has out-of-range successor {bad}", block.id),
            ));
        }
    }

    if let Some(defer) = body.defers.iter().find(|d| !ids.contains(&d.block_id)) {
        return Err(Error::invalid(
            location(),
            format!("defer `{}` names unknown block {}", defer.call, defer.block_id),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::SourceFile;

    fn program(functions: &str) -> HybridIr {
        program_with_types("[]", functions)
    }

    fn program_with_types(types: &str, functions: &str) -> HybridIr {
        SourceFile::from_memory(format!(
            r#"{{"packages": [{{"path": "main", "name": "main", "types": {types},
                "functions": {functions}, "globals": [], "constants": [], "imports": [],
                "cgo_imports": []}}], "main_package": "main"}}"#
        ))
        .parse()
        .unwrap()
    }

    #[test]
    fn accepts_well_formed_bodies() {
        let ir = program(
            r#"[{"name": "main", "signature": {"params": [], "results": [], "variadic": false},
                "is_method": false, "package": "main",
                "body": {"blocks": [{"id": 0, "instructions": [], "successors": [1]},
                                    {"id": 1, "instructions": [], "successors": []}],
                         "locals": [], "free_vars": [], "struct_hints": {}, "defers": []}}]"#,
        );

        assert!(validate(&ir).is_ok());
    }

    #[test]
    fn rejects_dangling_successor() {
        let ir = program(
            r#"[{"name": "main", "signature": {"params": [], "results": [], "variadic": false},
                "is_method": false, "package": "main",
                "body": {"blocks": [{"id": 0, "instructions": [], "successors": [4]}],
                         "locals": [], "free_vars": [], "struct_hints": {}, "defers": []}}]"#,
        );

        let err = validate(&ir).unwrap_err();
        assert!(err.to_string().contains("successor 4"));
    }

    #[test]
    fn rejects_method_without_receiver() {
        let ir = program(
            r#"[{"name": "M", "signature": {"params": [], "results": [], "variadic": false},
                "is_method": true, "package": "main"}]"#,
        );

        assert!(matches!(validate(&ir), Err(Error::Invalid { .. })));
    }

    #[test]
    fn rejects_unknown_main_package() {
        let mut ir = program("[]");
        ir.main_package = "cmd/other".into();

        assert!(validate(&ir).is_err());
    }

    #[test]
    fn rejects_defer_in_unknown_block() {
        let ir = program(
            r#"[{"name": "main", "signature": {"params": [], "results": [], "variadic": false},
                "is_method": false, "package": "main",
                "body": {"blocks": [{"id": 0, "instructions": [], "successors": []}],
                         "locals": [], "free_vars": [], "struct_hints": {},
                         "defers": [{"block_id": 3, "call": "f()"}]}}]"#,
        );

        let err = validate(&ir).unwrap_err();
        assert!(err.to_string().contains("unknown block 3"), "{err}");
    }

    #[test]
    fn type_kind_decides_which_parts_are_set() {
        let stray_signature = program_with_types(
            r#"[{"name": "Celsius", "kind": "alias", "underlying": "float64",
                 "signature": {"params": [], "results": [], "variadic": false}}]"#,
            "[]",
        );
        let stray_underlying = program_with_types(
            r#"[{"name": "Handler", "kind": "func", "underlying": "func()"}]"#,
            "[]",
        );
        let missing_underlying = program_with_types(r#"[{"name": "Opaque", "kind": "alias"}]"#, "[]");

        let err = validate(&stray_signature).unwrap_err();
        assert!(err.to_string().contains("alias type carries a signature"), "{err}");
        let err = validate(&stray_underlying).unwrap_err();
        assert!(err.to_string().contains("func type carries an underlying type"), "{err}");
        assert!(validate(&missing_underlying).is_ok());
    }
}
