//! Items for named types. Structs become Rust structs; interfaces, defined
//! non-struct types and function types become type aliases.

use itertools::Itertools;

use crate::{
    backend::{
        diagnostics::{Diagnostics, report_warning},
        writer::SourceWriter,
    },
    frontend::ir::{FuncSignature, PackageIr, TypeDef, TypeKind},
    middle::{
        sanitize::sanitize,
        ty::{FuncType, GoType, NamedType},
    },
};

use super::{
    ProgramContext,
    types::{dyn_fn, qualified_ident, render_type},
};

pub(super) fn emit_type(
    cx: &ProgramContext,
    package: &PackageIr,
    def: &TypeDef,
    diagnostics: &mut Diagnostics,
    w: &mut SourceWriter,
) {
    let ident = qualified_ident(&package.path, &def.name);
    let location = format!("{}.{}", package.path, def.name);
    w.blank();

    match def.kind {
        TypeKind::Struct => emit_struct(cx, package, def, &ident, &location, diagnostics, w),
        TypeKind::Interface => {
            let methods = match def.fields.is_empty() {
                true => def.methods.clone(),
                false => def.fields.iter().map(|f| f.name.clone()).collect(),
            };
            w.line(format!("pub type {ident} = Iface;"));
            w.line(format!(
                "pub const {ident}_METHODS: &[&str] = &[{}];",
                methods.iter().map(|m| format!("{m:?}")).join(", ")
            ));
        }
        TypeKind::Alias => {
            let underlying = def
                .underlying
                .as_deref()
                .filter(|u| !u.is_empty())
                .map(GoType::parse);
            let rust_ty = match underlying {
                Some(GoType::Unknown(text)) => {
                    report_warning!(
                        diagnostics,
                        &location,
                        "underlying type {text} is not supported; using interface{{}}"
                    );
                    "GoAny".to_string()
                }
                Some(ty) => render_type(&ty),
                None => {
                    report_warning!(diagnostics, &location, "no underlying type; using interface{{}}");
                    "GoAny".to_string()
                }
            };
            w.line(format!("pub type {ident} = {rust_ty};"));
        }
        TypeKind::Func => {
            let rust_ty = match &def.signature {
                Some(signature) => format!("GoFunc<{}>", dyn_fn(&func_type(signature))),
                None => {
                    report_warning!(diagnostics, &location, "function type without a signature");
                    "GoAny".to_string()
                }
            };
            w.line(format!("pub type {ident} = {rust_ty};"));
        }
    }
}

fn func_type(signature: &FuncSignature) -> FuncType {
    FuncType {
        params: signature.params.iter().map(|p| GoType::parse(&p.ty)).collect(),
        results: signature.results.iter().map(|r| GoType::parse(&r.ty)).collect(),
    }
}

fn emit_struct(
    cx: &ProgramContext,
    package: &PackageIr,
    def: &TypeDef,
    ident: &str,
    location: &str,
    diagnostics: &mut Diagnostics,
    w: &mut SourceWriter,
) {
    let named = GoType::Named(NamedType {
        package: Some(package.path.clone()),
        name: def.name.clone(),
    });
    let derives = match cx.env.is_comparable(&named, &package.path) {
        true => "Clone, Default, PartialEq",
        false => "Clone, Default",
    };

    if !def.methods.is_empty() {
        w.line("/// Methods:");
        for method in &def.methods {
            w.line(format!("/// - `{method}`"));
        }
    }
    w.line(format!("#[derive({derives})]"));
    w.open(format!("pub struct {ident}"));
    for (i, field) in def.fields.iter().enumerate() {
        let name = match field.name.as_str() {
            "" | "_" => format!("_f{i}"),
            name => sanitize(name),
        };
        let rust_ty = if field.typ.is_empty() {
            report_warning!(
                diagnostics,
                location,
                "field {} has no type; using interface{{}}",
                field.name
            );
            "GoAny".to_string()
        } else {
            render_type(&GoType::parse(&field.typ))
        };
        if let Some(tag) = field.tag.as_deref().filter(|t| !t.is_empty()) {
            w.comment(format!("tag: {tag}"));
        }
        w.line(format!("pub {name}: {rust_ty},"));
    }
    w.close();
}

#[cfg(test)]
mod tests {
    use crate::backend::targets::rust::tests::{EMPTY_MAIN, generate, main_package};

    #[test]
    fn structs_derive_equality_when_comparable() {
        let types = r#"
            {"name": "Point", "kind": "struct", "fields": [{"name": "x", "typ": "int"}, {"name": "y", "typ": "int"}], "methods": ["String"]},
            {"name": "Bag", "kind": "struct", "fields": [{"name": "items", "typ": "[]string", "tag": "json:\"items\""}]}"#;

        let (main_rs, diagnostics) = generate(&main_package(types, EMPTY_MAIN));

        assert!(diagnostics.is_empty(), "{:?}", diagnostics.warnings());
        assert!(main_rs.contains("/// - `String`\n#[derive(Clone, Default, PartialEq)]\npub struct main_Point {"));
        assert!(main_rs.contains("    pub x: isize,\n    pub y: isize,\n"));
        assert!(main_rs.contains("#[derive(Clone, Default)]\npub struct main_Bag {"));
        assert!(main_rs.contains("// tag: json:\"items\""));
    }

    #[test]
    fn missing_field_type_is_reported() {
        let types = r#"{"name": "Opaque", "kind": "struct", "fields": [{"name": "handle"}]}"#;

        let (main_rs, diagnostics) = generate(&main_package(types, EMPTY_MAIN));

        assert!(main_rs.contains("pub handle: GoAny,"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.warnings()[0].location, "main.Opaque");
    }

    #[test]
    fn interfaces_aliases_and_function_types() {
        let types = r#"
            {"name": "Shape", "kind": "interface", "fields": [{"name": "Area", "typ": "func() float64"}]},
            {"name": "Celsius", "kind": "alias", "underlying": "float64"},
            {"name": "Handler", "kind": "func", "signature": {"params": [{"name": "s", "type": "string"}], "results": [{"name": "", "type": "error"}], "variadic": false}}"#;

        let (main_rs, diagnostics) = generate(&main_package(types, EMPTY_MAIN));

        assert!(diagnostics.is_empty(), "{:?}", diagnostics.warnings());
        assert!(main_rs.contains("pub type main_Shape = Iface;"));
        assert!(main_rs.contains("pub const main_Shape_METHODS: &[&str] = &[\"Area\"];"));
        assert!(main_rs.contains("pub type main_Celsius = f64;"));
        assert!(main_rs.contains(
            "pub type main_Handler = GoFunc<dyn Fn(GoString) -> GoError + Send + Sync>;"
        ));
    }
}
