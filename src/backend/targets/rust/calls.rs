//! Call sites: `Call`, `Go` and `Defer` all share one call description.
//!
//! The SSA comment is the only place the callee's spelling survives (for
//! methods the receiver type, for other packages the import path), so the
//! comment picks the kind of call and `args` supply the operands.

use std::iter;

use itertools::Itertools;

use crate::{
    backend::{diagnostics::report_warning, writer::SourceWriter},
    frontend::ir::Instruction,
    middle::{primitive::PrimitiveKind, sanitize::snake_case, ty::GoType},
};

use super::{
    function::FunctionContext,
    types::{map_type, method_ident, qualified_ident, qualify, render_type},
    values::Operand,
};

const BUILTINS: &[&str] = &[
    "len",
    "cap",
    "append",
    "copy",
    "delete",
    "close",
    "clear",
    "recover",
    "print",
    "println",
    "min",
    "max",
    "real",
    "imag",
    "complex",
    "ssa:wrapnilchk",
];

/// `sync` types the runtime implements with Go's method names in snake case.
const RUNTIME_SYNC_TYPES: &[&str] = &["Mutex", "RWMutex", "WaitGroup", "Once", "Pool", "Cond"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Callee {
    Builtin(String),
    /// A package-level function or a method of a type declared in the IR,
    /// by item name.
    Static(String),
    /// A method of a type outside the IR, by snake-cased method name.
    External { method: String, pointer: bool },
    /// Dynamic dispatch through an interface value.
    Invoke(String),
    /// A function value; `args[0]` is the value.
    Value,
    Missing,
}

#[derive(Debug, Clone)]
pub(super) struct CallSite {
    pub callee: Callee,
    /// Receivers and function values come first.
    pub args: Vec<Operand>,
}

/// `(*T).M(...)` or `(T).M(...)` as `(T, pointer, M)`.
fn parse_method(text: &str) -> Option<(&str, bool, &str)> {
    let inner = text.strip_prefix('(')?;
    let (receiver, rest) = inner.split_once(").")?;
    let method = rest.split('(').next()?;
    match receiver.strip_prefix('*') {
        Some(receiver) => Some((receiver, true, method)),
        None => Some((receiver, false, method)),
    }
}

/// `t0.Error()` as `Error`.
fn invoke_method(text: &str) -> &str {
    let head = text.split('(').next().unwrap_or(text);
    head.rsplit_once('.').map_or(head, |(_, method)| method)
}

impl FunctionContext<'_, '_> {
    /// Describes the call in `text`, the comment with any `go `/`defer `
    /// prefix removed.
    pub(super) fn call_site(&mut self, instr: &Instruction, text: &str) -> CallSite {
        if let Some(rest) = text.strip_prefix("invoke ") {
            let args = instr.args.iter().map(|a| self.operand(a)).collect();
            return CallSite {
                callee: Callee::Invoke(invoke_method(rest).to_string()),
                args,
            };
        }

        let Some((callee, rest)) = instr.args.split_first() else {
            report_warning!(self.diagnostics, &self.location, "call without callee: {text}");
            return CallSite {
                callee: Callee::Missing,
                args: Vec::new(),
            };
        };
        let mut args: Vec<Operand> = rest.iter().map(|a| self.operand(a)).collect();

        if self.values.contains_key(callee) {
            args.insert(0, self.operand(callee));
            return CallSite {
                callee: Callee::Value,
                args,
            };
        }

        if let Some((receiver, pointer, method)) = parse_method(text) {
            let callee = self.method_callee(receiver, pointer, method);
            return CallSite { callee, args };
        }

        let head = text.split('(').next().unwrap_or(text);
        let (program, package) = (self.program, self.package.path.clone());
        let package = package.as_str();
        let callee = if head == callee.as_str() {
            if BUILTINS.contains(&callee.as_str()) && program.function(package, callee).is_none() {
                Callee::Builtin(callee.clone())
            } else {
                if program.function(package, callee).is_none() {
                    report_warning!(
                        self.diagnostics,
                        &self.location,
                        "call to {callee}, which is not in the IR"
                    );
                }
                Callee::Static(qualified_ident(package, callee))
            }
        } else if let Some(path) = head
            .strip_suffix(callee.as_str())
            .and_then(|p| p.strip_suffix('.'))
        {
            if program.function(path, callee).is_none() {
                report_warning!(
                    self.diagnostics,
                    &self.location,
                    "external function {head} has no Rust counterpart"
                );
            }
            Callee::Static(qualified_ident(path, callee))
        } else {
            report_warning!(
                self.diagnostics,
                &self.location,
                "cannot tell how to call {callee} from `{text}`"
            );
            Callee::Static(qualified_ident(package, callee))
        };
        CallSite { callee, args }
    }

    fn method_callee(&mut self, receiver: &str, pointer: bool, method: &str) -> Callee {
        let package = self.package.path.clone();
        let GoType::Named(named) = qualify(&GoType::parse(receiver), &package) else {
            report_warning!(
                self.diagnostics,
                &self.location,
                "method {method} on unnamed receiver type {receiver}"
            );
            return Callee::External {
                method: snake_case(method),
                pointer,
            };
        };
        let type_package = named.package.as_deref().unwrap_or(&package);
        let name = &named.name;

        if self.program.env.is_declared(&named, &package) {
            let receiver = format!("{type_package}.{name}");
            if self.program.method(&receiver, method).is_none() {
                report_warning!(
                    self.diagnostics,
                    &self.location,
                    "method {receiver}.{method} is not in the IR"
                );
            }
            return Callee::Static(method_ident(&receiver, method));
        }

        if !(type_package == "sync" && RUNTIME_SYNC_TYPES.contains(&name.as_str())) {
            report_warning!(
                self.diagnostics,
                &self.location,
                "method {type_package}.{name}.{method} has no Rust counterpart"
            );
        }
        Callee::External {
            method: snake_case(method),
            pointer,
        }
    }

    /// The call as an expression.
    pub(super) fn call_expr(&mut self, site: &CallSite, result: Option<&GoType>) -> String {
        let (program, package) = (self.program, self.package);
        let (env, package) = (&program.env, package.path.as_str());
        let owned = |args: &[Operand]| args.iter().map(|a| a.owned(env, package)).join(", ");

        match &site.callee {
            Callee::Static(ident) => format!("{ident}({})", owned(&site.args)),
            Callee::Value => match site.args.split_first() {
                Some((f, rest)) => format!("(*{})({})", f.borrowed(), owned(rest)),
                None => "unreachable!()".to_string(),
            },
            Callee::External { method, pointer } => match site.args.split_first() {
                Some((receiver, rest)) if *pointer => {
                    format!("{}.get().{method}({})", receiver.borrowed(), owned(rest))
                }
                Some((receiver, rest)) => {
                    format!("{}.{method}({})", receiver.borrowed(), owned(rest))
                }
                None => format!("unimplemented!(\"{method} without receiver\")"),
            },
            Callee::Invoke(method) => {
                let method = method.clone();
                self.invoke_expr(&method, &site.args)
            }
            Callee::Builtin(name) => {
                let name = name.clone();
                self.builtin_expr(&name, &site.args, result)
            }
            Callee::Missing => "unimplemented!(\"call without callee\")".to_string(),
        }
    }

    /// Tries each method of that name declared in the IR against the
    /// dynamic type of the receiver.
    fn invoke_expr(&mut self, method: &str, args: &[Operand]) -> String {
        let (program, package) = (self.program, self.package);
        let (env, package) = (&program.env, package.path.as_str());
        let Some((receiver, rest)) = args.split_first() else {
            return format!("unimplemented!(\"invoke of {method} without receiver\")");
        };
        let is_error = matches!(env.resolve(&receiver.ty, package), GoType::Error);
        let rest: Vec<String> = rest.iter().map(|a| a.owned(env, package)).collect();

        let mut arms = Vec::new();
        for (_, function) in program.methods_named(method) {
            let Some(target) = &function.receiver else { continue };
            if function.signature.params.len() != rest.len() {
                continue;
            }
            let ty = map_type(&target.ty);
            let ident = method_ident(&target.ty, method);
            let call = |receiver: &str| {
                iter::once(receiver.to_string())
                    .chain(rest.iter().cloned())
                    .join(", ")
            };
            if !target.pointer {
                arms.push(format!(
                    "if let Some(__v) = __recv.downcast_ref::<{ty}>() {{ {ident}({}) }}",
                    call("__v.clone()")
                ));
            }
            let receiver = if target.pointer { "__v.clone()" } else { "__v.get()" };
            arms.push(format!(
                "if let Some(__v) = __recv.downcast_ref::<Ptr<{ty}>>() {{ {ident}({}) }}",
                call(receiver)
            ));
        }

        let fallback = match (method, rest.is_empty()) {
            ("Error", true) => "GoError::from_iface(__recv).error_string()".to_string(),
            _ if arms.is_empty() => {
                report_warning!(
                    self.diagnostics,
                    &self.location,
                    "no type in the IR implements interface method {method}"
                );
                return format!("unimplemented!(\"interface method {method}\")");
            }
            _ => format!(
                "go_panic(Iface::new(\"string\", GoString::from_static(\"missing method {method}\")))"
            ),
        };
        if arms.is_empty() && is_error {
            return format!("{}.error_string()", receiver.borrowed());
        }

        let iface = if is_error {
            format!("{}.as_iface().clone()", receiver.borrowed())
        } else {
            receiver.owned(env, package)
        };
        if arms.is_empty() {
            return format!("{{ let __recv: Iface = {iface}; {fallback} }}");
        }
        format!(
            "{{ let __recv: Iface = {iface}; {} else {{ {fallback} }} }}",
            arms.join(" else ")
        )
    }

    fn builtin_expr(&mut self, name: &str, args: &[Operand], result: Option<&GoType>) -> String {
        let (program, package) = (self.program, self.package);
        let (env, package) = (&program.env, package.path.as_str());
        let is_string = |op: &Operand| env.primitive_of(&op.ty, package) == Some(PrimitiveKind::String);

        match (name, args) {
            ("len", [x]) => format!("go_len(&{})", x.borrowed()),
            ("cap", [x]) => format!("go_cap(&{})", x.borrowed()),
            ("append", [s, tail]) if is_string(tail) => {
                format!("go_append_str(&{}, &{})", s.borrowed(), tail.borrowed())
            }
            ("append", [s, tail]) => format!("{}.append_slice(&{})", s.borrowed(), tail.borrowed()),
            ("append", [s]) => s.owned(env, package),
            ("copy", [dst, src]) if is_string(src) => {
                format!("go_copy_str(&{}, &{})", dst.borrowed(), src.borrowed())
            }
            ("copy", [dst, src]) => format!("go_copy(&{}, &{})", dst.borrowed(), src.borrowed()),
            ("delete", [m, key]) => format!("{}.delete(&{})", m.borrowed(), key.borrowed()),
            ("close", [c]) => format!("{}.close()", c.borrowed()),
            ("recover", []) => "__recover.recover()".to_string(),
            ("print" | "println", _) => {
                let function = if name == "print" { "go_print" } else { "go_println" };
                let refs = args.iter().map(|a| format!("&{}", a.borrowed())).join(", ");
                format!("{function}(&[{refs}])")
            }
            ("min" | "max", [first, rest @ ..]) => {
                let function = if name == "min" { "go_min" } else { "go_max" };
                rest.iter().fold(first.owned(env, package), |acc, next| {
                    format!("{function}({acc}, {})", next.owned(env, package))
                })
            }
            ("real", [z]) => format!("{}.re", z.borrowed()),
            ("imag", [z]) => format!("{}.im", z.borrowed()),
            ("complex", [re, im]) => {
                let ty = result.map_or_else(|| "Complex128".to_string(), render_type);
                format!("{ty}::new({}, {})", re.owned(env, package), im.owned(env, package))
            }
            ("ssa:wrapnilchk", [ptr, ..]) => ptr.owned(env, package),
            _ => {
                report_warning!(
                    self.diagnostics,
                    &self.location,
                    "builtin {name} with {} argument(s) is not supported",
                    args.len()
                );
                format!("unimplemented!(\"builtin {name}\")")
            }
        }
    }

    /// `Go` and `Defer` evaluate operands when the statement runs: each is
    /// bound to a fresh local that the task or cleanup then owns.
    fn detach(&self, site: &CallSite) -> (Vec<String>, CallSite) {
        let env = &self.program.env;
        let package = self.package.path.as_str();
        let mut lets = Vec::new();
        let mut args = Vec::new();
        for (i, arg) in site.args.iter().enumerate() {
            let local = format!("__a{i}");
            lets.push(format!("let {local} = {};", arg.owned(env, package)));
            args.push(Operand {
                expr: local,
                is_place: false,
                ..arg.clone()
            });
        }
        let site = CallSite {
            callee: site.callee.clone(),
            args,
        };
        (lets, site)
    }

    /// Whether a deferred call of `site` may be the function whose
    /// `recover` stops a panic. Function values and interface methods are
    /// only known at run time.
    fn arms_recover(&self, site: &CallSite) -> bool {
        match &site.callee {
            Callee::Static(ident) => self.program.recovers(ident),
            Callee::Value | Callee::Invoke(_) => self.program.any_recovers(),
            _ => false,
        }
    }

    /// `wrapper(move || { call; })` with operands bound beforehand.
    fn detached_call(
        &mut self,
        wrapper: &str,
        text: &str,
        instr: &Instruction,
        deferred: bool,
    ) -> String {
        let site = self.call_site(instr, text);
        let (lets, detached) = self.detach(&site);
        let mut call = self.call_expr(&detached, None);
        if deferred && self.arms_recover(&site) {
            call = format!("arm_recover(); {call}");
        }
        if lets.is_empty() {
            format!("{wrapper}(move || {{ {call}; }});")
        } else {
            format!("{wrapper}({{ {} move || {{ {call}; }} }});", lets.join(" "))
        }
    }

    pub(super) fn lower_call(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let text = instr.comment().to_string();
        let site = self.call_site(instr, &text);
        let result = instr.result().and_then(|r| self.values.get(r)).map(|v| v.ty.clone());
        let expr = self.call_expr(&site, result.as_ref());
        self.bind(instr, expr, w);
    }

    pub(super) fn lower_go(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let text = instr.comment().to_string();
        let text = text.strip_prefix("go ").unwrap_or(&text);
        let statement = self.detached_call("go_spawn", text, instr, false);
        w.line(statement);
    }

    pub(super) fn lower_defer(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let text = instr.comment().to_string();
        w.comment(&text);
        let text = text.strip_prefix("defer ").unwrap_or(&text);
        let statement = self.detached_call("__defers.push", text, instr, true);
        w.line(statement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::targets::rust::tests::{generate, main_package};

    #[test]
    fn method_text() {
        assert_eq!(
            parse_method("(*main.Point).Scale(t0, 2:float64)"),
            Some(("main.Point", true, "Scale"))
        );
        assert_eq!(parse_method("(Point).String(t1)"), Some(("Point", false, "String")));
        assert_eq!(parse_method("fmt.Println(t0)"), None);
        assert_eq!(invoke_method("t0.Error()"), "Error");
    }

    fn main_with(instructions: &str) -> String {
        main_package(
            "",
            &format!(
                r#"{{"name": "main", "package": "main", "is_method": false,
                    "signature": {{"params": [], "results": [], "variadic": false}},
                    "body": {{"blocks": [{{"id": 0, "instructions": [{instructions}], "successors": []}}]}}}}"#
            ),
        )
    }

    #[test]
    fn builtins() {
        let (main_rs, diagnostics) = generate(&main_with(
            r#"{"op": "MakeSlice", "args": ["1:int", "4:int"], "result": "t0", "type": "[]int", "comment": "make []int 1:int 4:int"},
               {"op": "Call", "args": ["len", "t0"], "result": "t1", "type": "int", "comment": "len(t0)"},
               {"op": "Call", "args": ["println", "t1", "\"n\":string"], "result": "t2", "type": "()", "comment": "println(t1, \"n\":string)"}"#,
        ));

        assert!(diagnostics.is_empty(), "{:?}", diagnostics.warnings());
        assert!(main_rs.contains("let t1: isize = go_len(&t0);"));
        assert!(main_rs.contains("go_println(&[&t1, &GoString::from_static_bytes(b\"n\")]);"));
    }

    #[test]
    fn go_statement_clones_operands_into_the_task() {
        let json = main_package(
            "",
            r#"{"name": "worker", "package": "main", "is_method": false,
                "signature": {"params": [{"name": "name", "type": "string"}], "results": [], "variadic": false},
                "body": {"blocks": [{"id": 0, "instructions": [{"op": "Return"}], "successors": []}]}},
               {"name": "main", "package": "main", "is_method": false,
                "signature": {"params": [{"name": "s", "type": "string"}], "results": [], "variadic": false},
                "body": {"blocks": [{"id": 0, "instructions": [
                    {"op": "Go", "args": ["worker", "s"], "comment": "go worker(s)"},
                    {"op": "Return"}
                ], "successors": []}]}}"#,
        );

        let (main_rs, diagnostics) = generate(&json);

        assert!(diagnostics.is_empty(), "{:?}", diagnostics.warnings());
        assert!(main_rs.contains("go_spawn({ let __a0 = s.clone(); move || { main_worker(__a0); } });"));
    }

    #[test]
    fn runtime_sync_methods_use_snake_case() {
        let (main_rs, diagnostics) = generate(&main_with(
            r#"{"op": "Alloc", "args": [], "result": "t0", "type": "*sync.WaitGroup", "comment": "local sync.WaitGroup (wg)"},
               {"op": "Call", "args": ["Add", "t0", "1:int"], "result": "t1", "type": "()", "comment": "(*sync.WaitGroup).Add(t0, 1:int)"},
               {"op": "Call", "args": ["Wait", "t0"], "result": "t2", "type": "()", "comment": "(*sync.WaitGroup).Wait(t0)"}"#,
        ));

        assert!(diagnostics.is_empty(), "{:?}", diagnostics.warnings());
        assert!(main_rs.contains("t0.get().add(1isize);"));
        assert!(main_rs.contains("t0.get().wait();"));
    }

    #[test]
    fn external_functions_are_warned() {
        let (main_rs, diagnostics) = generate(&main_with(
            r#"{"op": "Call", "args": ["Println", "t9"], "result": "t1", "type": "(n int, err error)", "comment": "fmt.Println(t9...)"}"#,
        ));

        assert!(main_rs.contains("fmt_Println("));
        assert!(
            diagnostics
                .warnings()
                .iter()
                .any(|w| w.message.contains("fmt.Println has no Rust counterpart"))
        );
    }

    #[test]
    fn error_invocation_dispatches_on_dynamic_type() {
        let my_err = r#"{"name": "MyErr", "kind": "struct", "fields": [{"name": "code", "typ": "int"}], "methods": ["Error"]}"#;
        let functions = r#"{"name": "Error", "package": "main", "is_method": true,
                "receiver": {"name": "e", "type": "main.MyErr", "pointer": true},
                "signature": {"params": [], "results": [{"name": "", "type": "string"}], "variadic": false},
                "body": {"blocks": [{"id": 0, "instructions": [
                    {"op": "Return", "args": ["\"bad\":string"]}
                ], "successors": []}]}},
            {"name": "describe", "package": "main", "is_method": false,
                "signature": {"params": [{"name": "err", "type": "error"}], "results": [{"name": "", "type": "string"}], "variadic": false},
                "body": {"blocks": [{"id": 0, "instructions": [
                    {"op": "Call", "args": ["err"], "result": "t0", "type": "string", "comment": "invoke err.Error()"},
                    {"op": "Return", "args": ["t0"]}
                ], "successors": []}]}}"#;

        let (main_rs, _) = generate(&main_package(my_err, functions));

        assert!(main_rs.contains("let __recv: Iface = err.as_iface().clone();"));
        assert!(main_rs.contains(
            "if let Some(__v) = __recv.downcast_ref::<Ptr<main_MyErr>>() { main_MyErr_Error(__v.clone()) }"
        ));
        assert!(main_rs.contains("else { GoError::from_iface(__recv).error_string() }"));
    }
}
