use std::fmt::Write;

use colored::Colorize;
use itertools::Itertools;

use super::ir::{FunctionIr, HybridIr, Instruction, PackageIr, TypeKind};

/// Renders the IR for `--dump-ir`.
pub fn pretty_print_ir(program: &HybridIr) -> String {
    let mut out = String::new();

    for package in &program.packages {
        let marker = if package.path == program.main_package {
            " (main)".green().to_string()
        } else {
            String::new()
        };
        let _ = writeln!(
            out,
            "{} {} {}{marker}",
            "package".magenta(),
            package.name.blue(),
            format!("\"{}\"", package.path).white()
        );
        print_package(&mut out, package);
        out.push('\n');
    }

    out
}

fn print_package(out: &mut String, package: &PackageIr) {
    for import in &package.imports {
        let _ = writeln!(out, "  {} \"{import}\"", "import".magenta());
    }
    for cgo in &package.cgo_imports {
        let _ = writeln!(
            out,
            "  {} headers=[{}] cflags=[{}] ldflags=[{}]",
            "cgo".magenta(),
            cgo.headers.join(", "),
            cgo.cflags.join(" "),
            cgo.ldflags.join(" ")
        );
    }
    for constant in &package.constants {
        let _ = writeln!(
            out,
            "  {} {}: {} = {}",
            "const".magenta(),
            constant.name.blue(),
            constant.ty.yellow(),
            constant.value
        );
    }
    for def in &package.types {
        let _ = writeln!(
            out,
            "  {} {} {}",
            "type".magenta(),
            def.name.blue(),
            <&str>::from(def.kind).yellow()
        );
        match def.kind {
            TypeKind::Struct | TypeKind::Interface => {
                for field in &def.fields {
                    let _ = writeln!(out, "      {} {}", field.name, field.typ.yellow());
                }
            }
            TypeKind::Alias => {
                let underlying = def.underlying.as_deref().unwrap_or("?");
                let _ = writeln!(out, "      = {}", underlying.yellow());
            }
            TypeKind::Func => {}
        }
        if !def.methods.is_empty() {
            let _ = writeln!(out, "      methods: {}", def.methods.join(", "));
        }
    }
    for global in &package.globals {
        let _ = writeln!(
            out,
            "  {} {}: {}",
            "var".magenta(),
            global.name.blue(),
            global.ty.yellow()
        );
    }
    for function in &package.functions {
        print_function(out, function);
    }
}

fn print_function(out: &mut String, function: &FunctionIr) {
    let receiver = function
        .receiver
        .as_ref()
        .map(|r| format!("({} {}{}) ", r.name, if r.pointer { "*" } else { "" }, r.ty))
        .unwrap_or_default();
    let params = function
        .signature
        .params
        .iter()
        .map(|p| format!("{} {}", p.name, p.ty.yellow()))
        .join(", ");
    let results = function
        .signature
        .results
        .iter()
        .map(|p| p.ty.yellow().to_string())
        .join(", ");

    let _ = write!(
        out,
        "  {} {receiver}{}({params})",
        "func".magenta(),
        function.name.blue()
    );
    if !results.is_empty() {
        let _ = write!(out, " ({results})");
    }

    let Some(body) = &function.body else {
        out.push('\n');
        return;
    };
    out.push_str(" {\n");

    for block in &body.blocks {
        let successors = block.successors.iter().join(", ");
        let _ = write!(out, "    {}", format!("{}:", block.id).bright_red());
        if let Some(comment) = &block.comment {
            let _ = write!(out, " {}", format!("; {comment}").bright_black());
        }
        let _ = writeln!(out, " {}", format!("-> [{successors}]").bright_black());

        for instruction in &block.instructions {
            print_instruction(out, instruction);
        }
    }
    out.push_str("  }\n");
}

fn print_instruction(out: &mut String, instruction: &Instruction) {
    out.push_str("      ");
    if let Some(result) = instruction.result() {
        let _ = write!(out, "{result} {} ", "=".white());
    }
    let _ = write!(out, "{}", instruction.op.cyan());
    if !instruction.args.is_empty() {
        let _ = write!(out, " {}", instruction.args.join(", "));
    }
    if let Some(ty) = instruction.ty() {
        let _ = write!(out, " : {}", ty.yellow());
    }
    if !instruction.comment().is_empty() {
        let _ = write!(out, "  {}", format!("; {}", instruction.comment()).bright_black());
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::SourceFile;

    #[test]
    fn dump_lists_blocks_and_instructions() {
        let ir = SourceFile::from_memory(
            r#"{"packages": [{"path": "main", "name": "main", "types": [], "globals": [],
                "constants": [], "imports": ["fmt"], "cgo_imports": [],
                "functions": [{"name": "main", "is_method": false, "package": "main",
                    "signature": {"params": [], "results": [], "variadic": false},
                    "body": {"blocks": [{"id": 0, "successors": [], "instructions": [
                        {"op": "Call", "args": ["println", "\"hi\":string"], "comment": "println(\"hi\":string)"},
                        {"op": "Return", "comment": "return"}]}],
                        "locals": [], "free_vars": [], "struct_hints": {}, "defers": []}}]}],
                "main_package": "main"}"#,
        )
        .parse()
        .unwrap();

        let text = strip_ansi_escapes::strip_str(pretty_print_ir(&ir));

        assert!(text.contains("package main \"main\" (main)"));
        assert!(text.contains("import \"fmt\""));
        assert!(text.contains("0: -> []"));
        assert!(text.contains("Call println, \"hi\":string"));
    }
}
