//! The Rust target: one `main.rs` holding every package, flattened, plus
//! the runtime module file.

use hashbrown::{HashMap, HashSet};
use tracing::{debug, debug_span};

use crate::{
    backend::{
        CodegenOptions,
        diagnostics::{Diagnostics, report_warning},
        runtime_source,
        targets::{CodeGenerator, OutputFile},
        writer::SourceWriter,
    },
    frontend::ir::{FunctionIr, GlobalVar, HybridIr, OpKind, PackageIr},
    middle::ty::{GoType, TypeEnv},
};

use self::{
    types::{map_type, qualified_ident},
    values::{ConstantIssue, render_constant, split_constant},
};

mod calls;
mod control;
mod function;
mod lower;
mod typedef;
pub mod types;
pub mod values;

pub struct RustCodeGenerator;

impl CodeGenerator for RustCodeGenerator {
    fn generate(
        &self,
        program: &HybridIr,
        options: &CodegenOptions,
        diagnostics: &mut Diagnostics,
    ) -> Vec<OutputFile> {
        let cx = ProgramContext::new(program, options);
        let main_rs = emit_program(&cx, diagnostics);

        vec![
            OutputFile {
                name: "main.rs".to_string(),
                contents: main_rs,
            },
            OutputFile {
                name: format!("{}.rs", options.runtime_name),
                contents: runtime_source(&options.runtime_name),
            },
        ]
    }
}

/// Program-wide facts shared by every function being emitted.
pub(crate) struct ProgramContext<'a> {
    pub program: &'a HybridIr,
    pub options: &'a CodegenOptions,
    pub env: TypeEnv,
    /// Descriptors of the values bound by `MakeClosure`, keyed by the
    /// closure's package and name.
    closure_bindings: HashMap<(String, String), Vec<String>>,
    /// Item names of the functions that call `recover`.
    recovering: HashSet<String>,
}

impl<'a> ProgramContext<'a> {
    pub fn new(program: &'a HybridIr, options: &'a CodegenOptions) -> Self {
        let mut cx = Self {
            program,
            options,
            env: TypeEnv::from_program(program),
            closure_bindings: HashMap::new(),
            recovering: program
                .packages
                .iter()
                .flat_map(|p| p.functions.iter().map(move |f| (p, f)))
                .filter(|(_, f)| f.body.as_ref().is_some_and(function::calls_recover))
                .map(|(p, f)| function::item_ident(p, f))
                .collect(),
        };
        cx.collect_closure_bindings();
        cx
    }

    /// Free variable types are only known at the `MakeClosure` site, and
    /// a closure may itself bind its parent's free variables, so this
    /// repeats until nothing new is learned.
    fn collect_closure_bindings(&mut self) {
        let program = self.program;
        for _ in 0..8 {
            let mut changed = false;
            for package in &program.packages {
                for function in &package.functions {
                    let Some(body) = &function.body else { continue };
                    let types = self.value_types(function);
                    for instr in body.blocks.iter().flat_map(|b| &b.instructions) {
                        if instr.kind() != OpKind::MakeClosure {
                            continue;
                        }
                        let Some((callee, bound)) = instr.args.split_first() else {
                            continue;
                        };
                        let descriptors: Vec<String> = bound
                            .iter()
                            .map(|name| {
                                types.get(name.as_str()).cloned().unwrap_or_default()
                            })
                            .collect();
                        let key = (package.path.clone(), callee.clone());
                        if self.closure_bindings.get(&key) != Some(&descriptors) {
                            self.closure_bindings.insert(key, descriptors);
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Descriptors of a function's parameters, free variables and results.
    fn value_types(&self, function: &FunctionIr) -> HashMap<String, String> {
        let mut types = HashMap::new();
        if let Some(receiver) = &function.receiver {
            types.insert(receiver.name.clone(), receiver_descriptor(function));
        }
        for param in &function.signature.params {
            types.insert(param.name.clone(), param.ty.clone());
        }
        let Some(body) = &function.body else { return types };
        if let Some(bound) = self.closure_bindings(&function.package, &function.name) {
            for (name, ty) in body.free_vars.iter().zip(bound) {
                types.insert(name.clone(), ty.clone());
            }
        }
        for instr in body.blocks.iter().flat_map(|b| &b.instructions) {
            if let (Some(result), Some(ty)) = (instr.result(), instr.ty()) {
                types.insert(result.to_string(), ty.to_string());
            }
        }
        types
    }

    pub fn closure_bindings(&self, package: &str, name: &str) -> Option<&[String]> {
        self.closure_bindings
            .get(&(package.to_string(), name.to_string()))
            .map(Vec::as_slice)
    }

    /// Whether the item named `ident` calls `recover`.
    pub fn recovers(&self, ident: &str) -> bool {
        self.recovering.contains(ident)
    }

    /// Whether any function in the program calls `recover`.
    pub fn any_recovers(&self) -> bool {
        !self.recovering.is_empty()
    }

    /// A package-level function (not a method) by package path and name.
    pub fn function(&self, package: &str, name: &str) -> Option<&'a FunctionIr> {
        self.program
            .package(package)?
            .functions
            .iter()
            .find(|f| !f.is_method && f.name == name)
    }

    /// Every method named `name` in the program, with its package.
    pub fn methods_named(&self, name: &str) -> Vec<(&'a PackageIr, &'a FunctionIr)> {
        self.program
            .packages
            .iter()
            .flat_map(|p| p.functions.iter().map(move |f| (p, f)))
            .filter(|(_, f)| f.is_method && f.name == name && f.receiver.is_some())
            .collect()
    }

    /// The method `name` whose receiver base type is `receiver`.
    pub fn method(&self, receiver: &str, name: &str) -> Option<&'a FunctionIr> {
        self.methods_named(name)
            .into_iter()
            .map(|(_, f)| f)
            .find(|f| f.receiver.as_ref().is_some_and(|r| r.ty == receiver))
    }

    /// A global by name, preferring `package`.
    pub fn global(&self, package: &str, name: &str) -> Option<(&'a PackageIr, &'a GlobalVar)> {
        let find = |p: &'a PackageIr| p.globals.iter().find(|g| g.name == name).map(|g| (p, g));
        self.program
            .package(package)
            .and_then(find)
            .or_else(|| self.program.packages.iter().find_map(find))
    }
}

/// `*T` for pointer receivers, `T` otherwise.
pub(crate) fn receiver_descriptor(function: &FunctionIr) -> String {
    match &function.receiver {
        Some(receiver) if receiver.pointer => format!("*{}", receiver.ty),
        Some(receiver) => receiver.ty.clone(),
        None => String::new(),
    }
}

const HEADER: &str = indoc::indoc! {"
    // Code generated by hybridc. DO NOT EDIT.
    #![allow(
        non_snake_case,
        non_camel_case_types,
        non_upper_case_globals,
        unused,
        unreachable_code,
        clippy::all
    )]
"};

fn emit_program(cx: &ProgramContext, diagnostics: &mut Diagnostics) -> String {
    let mut w = SourceWriter::new();
    w.raw(HEADER);
    w.blank();
    w.line(format!("mod {};", cx.options.runtime_name));
    w.line(format!("use {}::*;", cx.options.runtime_name));

    for package in &cx.program.packages {
        let _span = debug_span!("package", path = %package.path).entered();
        emit_package(cx, package, diagnostics, &mut w);
    }

    emit_entry(cx, diagnostics, &mut w);
    w.into_output()
}

fn emit_package(
    cx: &ProgramContext,
    package: &PackageIr,
    diagnostics: &mut Diagnostics,
    w: &mut SourceWriter,
) {
    w.blank();
    w.comment(format!("package {} ({})", package.name, package.path));

    for cgo in &package.cgo_imports {
        for header in &cgo.headers {
            w.comment(format!("cgo: #include <{header}>"));
        }
        for flags in &cgo.cflags {
            w.comment(format!("cgo CFLAGS: {flags}"));
        }
        for flags in &cgo.ldflags {
            w.comment(format!("cgo LDFLAGS: {flags}"));
        }
    }

    for constant in &package.constants {
        let location = format!("{}.{}", package.path, constant.name);
        let ty = GoType::parse(&constant.ty);
        let (literal, issue) = render_constant(&constant.value, &ty, &cx.env, &package.path);
        warn_constant(diagnostics, &location, &constant.value, issue);
        w.line(format!(
            "pub const {}: {} = {literal};",
            qualified_ident(&package.path, &constant.name),
            map_type(&constant.ty),
        ));
    }

    for def in &package.types {
        typedef::emit_type(cx, package, def, diagnostics, w);
    }

    for global in &package.globals {
        emit_global(cx, package, global, diagnostics, w);
    }

    for function in &package.functions {
        let _span = debug_span!("function", name = %function.name).entered();
        function::emit_function(cx, package, function, diagnostics, w);
    }
    debug!(functions = package.functions.len(), "package emitted");
}

pub(crate) fn warn_constant(
    diagnostics: &mut Diagnostics,
    location: &str,
    literal: &str,
    issue: Option<ConstantIssue>,
) {
    match issue {
        None => {}
        Some(ConstantIssue::Malformed) => {
            report_warning!(diagnostics, location, "constant {literal} rendered as its zero value")
        }
        Some(ConstantIssue::PossiblyTruncated) => report_warning!(
            diagnostics,
            location,
            "string constant {literal} may have been shortened by the SSA printer"
        ),
    }
}

/// Globals are pointers in SSA; the static holds the pointee.
fn emit_global(
    cx: &ProgramContext,
    package: &PackageIr,
    global: &GlobalVar,
    diagnostics: &mut Diagnostics,
    w: &mut SourceWriter,
) {
    let ident = qualified_ident(&package.path, &global.name);
    let elem = global.ty.strip_prefix('*').unwrap_or(&global.ty);
    let rust_ty = map_type(elem);

    match global.value.as_deref().filter(|v| !v.is_empty()) {
        Some(value) => {
            let literal = split_constant(value).map_or(value, |(literal, _)| literal);
            let ty = GoType::parse(elem);
            let (expr, issue) = render_constant(literal, &ty, &cx.env, &package.path);
            warn_constant(diagnostics, &format!("{}.{}", package.path, global.name), value, issue);
            w.open(format!("fn {ident}_init() -> {rust_ty}"));
            w.line(expr);
            w.close();
            w.line(format!("pub static {ident}: Global<{rust_ty}> = Global::new({ident}_init);"));
        }
        None => {
            w.line(format!("pub static {ident}: Global<{rust_ty}> = Global::new(Default::default);"));
        }
    }
}

/// `fn main` runs every package's `init`, then the entry package's `main`.
fn emit_entry(cx: &ProgramContext, diagnostics: &mut Diagnostics, w: &mut SourceWriter) {
    let program = cx.program;
    if cx.function(&program.main_package, "main").is_none() {
        if !program.packages.is_empty() {
            report_warning!(
                diagnostics,
                &program.main_package,
                "entry package has no main function; no fn main emitted"
            );
        }
        return;
    }

    w.blank();
    w.open("fn main()");
    w.open("Scheduler::new().run(||");
    for package in &program.packages {
        if cx.function(&package.path, "init").is_some() {
            w.line(format!("{}();", qualified_ident(&package.path, "init")));
        }
    }
    w.line(format!("{}();", qualified_ident(&program.main_package, "main")));
    w.close_with("});");
    w.close();
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::frontend::SourceFile;

    /// Generates `main.rs` for an in-memory IR document.
    pub(crate) fn generate_with(json: &str, options: &CodegenOptions) -> (String, Diagnostics) {
        let program = SourceFile::from_memory(json)
            .parse()
            .unwrap_or_else(|err| panic!("fixture does not parse: {err}"));
        let mut diagnostics = Diagnostics::new();
        let files = RustCodeGenerator.generate(&program, options, &mut diagnostics);
        (files[0].contents.clone(), diagnostics)
    }

    pub(crate) fn generate(json: &str) -> (String, Diagnostics) {
        generate_with(json, &CodegenOptions::default())
    }

    /// An empty `main`, for fixtures about other functions.
    pub(crate) const EMPTY_MAIN: &str = r#"{"name": "main", "package": "main", "is_method": false,
        "signature": {"params": [], "results": [], "variadic": false},
        "body": {"blocks": [{"id": 0, "instructions": [{"op": "Return"}], "successors": []}]}}"#;

    /// Packages `[{path: main, ...}]` with the given functions (JSON array
    /// items) and types.
    pub(crate) fn main_package(types: &str, functions: &str) -> String {
        format!(
            r#"{{
                "main_package": "main",
                "packages": [{{
                    "path": "main", "name": "main",
                    "types": [{types}], "functions": [{functions}],
                    "globals": [], "constants": [], "imports": [], "cgo_imports": []
                }}]
            }}"#
        )
    }

    #[test]
    fn program_layout() {
        let json = main_package(
            "",
            r#"{"name": "main", "package": "main", "is_method": false,
                "signature": {"params": [], "results": [], "variadic": false},
                "body": {"blocks": [{"id": 0, "instructions": [
                    {"op": "Return", "args": []}
                ], "successors": []}]}}"#,
        );

        let (main_rs, diagnostics) = generate(&json);

        assert!(diagnostics.is_empty(), "{:?}", diagnostics.warnings());
        assert!(main_rs.starts_with("// Code generated by hybridc. DO NOT EDIT."));
        assert!(main_rs.contains("mod go_runtime;\nuse go_runtime::*;"));
        assert!(main_rs.contains("pub fn main_main() {"));
        assert!(main_rs.contains("Scheduler::new().run(|| {\n        main_main();\n    });"));
    }

    #[test]
    fn constants_and_globals() {
        let json = r#"{
            "main_package": "main",
            "packages": [{
                "path": "main", "name": "main", "types": [], "functions": [],
                "globals": [
                    {"name": "counter", "type": "*int"},
                    {"name": "greeting", "type": "*string", "value": "\"hi\":string"}
                ],
                "constants": [{"name": "Limit", "type": "untyped int", "value": "10"}],
                "imports": [], "cgo_imports": [{"cflags": ["-O2"], "pkg_path": "main"}]
            }]
        }"#;

        let (main_rs, diagnostics) = generate(json);

        assert!(main_rs.contains("// cgo CFLAGS: -O2"));
        assert!(main_rs.contains("pub const main_Limit: isize = 10isize;"));
        assert!(main_rs.contains(
            "pub static main_counter: Global<isize> = Global::new(Default::default);"
        ));
        assert!(main_rs.contains("fn main_greeting_init() -> GoString {"));
        // No main function in the entry package.
        assert_eq!(diagnostics.len(), 1);
        assert!(!main_rs.contains("fn main()"));
    }

    #[test]
    fn init_runs_before_main() {
        let empty = r#"{"params": [], "results": [], "variadic": false}"#;
        let body = r#"{"blocks": [{"id": 0, "instructions": [{"op": "Return"}], "successors": []}]}"#;
        let json = main_package(
            "",
            &format!(
                r#"{{"name": "init", "package": "main", "is_method": false, "signature": {empty}, "body": {body}}},
                   {{"name": "main", "package": "main", "is_method": false, "signature": {empty}, "body": {body}}}"#
            ),
        );

        let (main_rs, _) = generate(&json);

        let init = main_rs.find("        main_init();").unwrap_or(usize::MAX);
        let main = main_rs.find("        main_main();").unwrap_or(0);
        assert!(init < main);
    }
}
