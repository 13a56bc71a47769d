//! Function items: signature, value table, declarations and the defer
//! scaffolding around the lowered body.

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use tracing::debug;

use crate::{
    backend::{
        diagnostics::{Diagnostics, report_warning},
        writer::SourceWriter,
    },
    frontend::ir::{BodyIr, FunctionIr, Instruction, OpKind, PackageIr},
    middle::{
        cfg::{
            Cfg,
            hints::reconcile,
            structure::reconstruct,
        },
        primitive::PrimitiveKind,
        sanitize::sanitize,
        ty::GoType,
    },
};

use super::{
    ProgramContext, control, receiver_descriptor,
    types::{map_type, method_ident, qualified_ident, render_type, results_type},
    values::Operand,
};

/// A named SSA value: parameter, free variable or instruction result.
#[derive(Debug, Clone)]
pub(super) struct Value {
    pub ident: String,
    pub ty: GoType,
    /// Go spelling of `ty`; empty when the frontend gave none.
    pub descriptor: String,
}

impl Value {
    fn new(ident: String, descriptor: &str) -> Self {
        Self {
            ident,
            ty: GoType::parse(descriptor),
            descriptor: descriptor.to_string(),
        }
    }

    /// The Rust type to declare, or `None` when it is unknown.
    fn declared_type(&self) -> Option<String> {
        let known = !self.descriptor.is_empty() && self.descriptor != "invalid type";
        (known || matches!(self.ty, GoType::Iter(..))).then(|| render_type(&self.ty))
    }

    fn is_unit(&self) -> bool {
        matches!(&self.ty, GoType::Tuple(items) if items.is_empty()) || self.descriptor == "()"
    }
}

pub(super) struct FunctionContext<'a, 'd> {
    pub program: &'a ProgramContext<'a>,
    pub package: &'a PackageIr,
    pub function: &'a FunctionIr,
    pub diagnostics: &'d mut Diagnostics,
    /// `path.Name`, for warnings.
    pub location: String,
    pub values: HashMap<String, Value>,
    /// Values declared at the top of the body and assigned later.
    pub hoisted: HashSet<String>,
}

impl<'a, 'd> FunctionContext<'a, 'd> {
    pub fn new(
        program: &'a ProgramContext<'a>,
        package: &'a PackageIr,
        function: &'a FunctionIr,
        diagnostics: &'d mut Diagnostics,
    ) -> Self {
        Self {
            program,
            package,
            function,
            diagnostics,
            location: format!("{}.{}", package.path, function.name),
            values: HashMap::new(),
            hoisted: HashSet::new(),
        }
    }

    /// The function's parameters as `(ident, descriptor)`: bound free
    /// variables, then the receiver, then the declared parameters.
    pub fn params(&mut self) -> Vec<(String, String)> {
        let function = self.function;
        let mut params = Vec::new();

        if let Some(body) = &function.body {
            if !body.free_vars.is_empty() {
                let bound = self
                    .program
                    .closure_bindings(&self.package.path, &function.name)
                    .map(<[String]>::to_vec)
                    .unwrap_or_default();
                if bound.len() != body.free_vars.len() {
                    report_warning!(
                        self.diagnostics,
                        &self.location,
                        "free variables of {} have no MakeClosure site; typed as interface{{}}",
                        function.name
                    );
                }
                for (i, name) in body.free_vars.iter().enumerate() {
                    let descriptor = bound
                        .get(i)
                        .filter(|d| !d.is_empty())
                        .cloned()
                        .unwrap_or_else(|| "interface{}".to_string());
                    params.push((param_ident(name, i, "_fv"), descriptor));
                    self.insert_value(name, params[params.len() - 1].clone());
                }
            }
        }

        if let Some(receiver) = &function.receiver {
            let param = (param_ident(&receiver.name, 0, "_recv"), receiver_descriptor(function));
            self.insert_value(&receiver.name, param.clone());
            params.push(param);
        }

        for (i, param) in function.signature.params.iter().enumerate() {
            let entry = (param_ident(&param.name, i, "_p"), param.ty.clone());
            self.insert_value(&param.name, entry.clone());
            params.push(entry);
        }
        params
    }

    fn insert_value(&mut self, name: &str, (ident, descriptor): (String, String)) {
        if name.is_empty() || name == "_" {
            return;
        }
        self.values
            .insert(name.to_string(), Value::new(ident, &descriptor));
    }

    pub fn results(&self) -> Vec<GoType> {
        self.function
            .signature
            .results
            .iter()
            .map(|r| GoType::parse(&r.ty))
            .collect()
    }

    /// Registers every instruction result, hoisting them all when the
    /// body has more than one block.
    fn collect_values(&mut self, body: &BodyIr) {
        let multi_block = body.blocks.len() > 1;
        for instr in body.blocks.iter().flat_map(|b| &b.instructions) {
            let Some(result) = instr.result() else { continue };
            let ident = sanitize(result);
            let value = match instr.kind() {
                OpKind::Range => Value {
                    ident: ident.clone(),
                    ty: self.range_type(instr),
                    descriptor: String::new(),
                },
                _ => Value::new(ident.clone(), instr.ty().unwrap_or_default()),
            };
            if multi_block {
                self.hoisted.insert(ident);
            }
            self.values.insert(result.to_string(), value);
        }
        for local in &body.locals {
            if let Some(value) = self.values.get(&local.name) {
                self.hoisted.insert(value.ident.clone());
            }
        }
    }

    /// `range` has no Go type of its own; the iterator yields the map's
    /// entries, or byte offsets and runes of a string.
    fn range_type(&self, instr: &Instruction) -> GoType {
        let operand = instr.args.first().and_then(|name| self.values.get(name));
        match operand.map(|v| self.program.env.resolve(&v.ty, &self.package.path)) {
            Some(GoType::Map(key, value)) => GoType::Iter(key.clone(), value.clone()),
            _ => GoType::Iter(
                Box::new(GoType::Primitive(PrimitiveKind::Int)),
                Box::new(GoType::Primitive(PrimitiveKind::Int32)),
            ),
        }
    }

    pub fn lookup_value(&self, name: &str) -> Option<Operand> {
        self.values.get(name).map(|value| Operand {
            expr: value.ident.clone(),
            ty: value.ty.clone(),
            descriptor: value.descriptor.clone(),
            is_place: true,
        })
    }

    /// Writes `let t: T = expr;`, or `t = expr;` for hoisted values, or
    /// a bare statement when the instruction has no result.
    pub fn bind(&mut self, instr: &Instruction, expr: impl AsRef<str>, w: &mut SourceWriter) {
        let expr = expr.as_ref();
        match self.binding_target(instr) {
            Some(target) => w.line(format!("{target} {expr};")),
            None => w.line(format!("{expr};")),
        }
    }

    /// Like [`bind`](Self::bind) for a block expression whose statements
    /// are `lines` and whose value is `tail`.
    pub fn bind_block(
        &mut self,
        instr: &Instruction,
        lines: &[String],
        tail: &str,
        w: &mut SourceWriter,
    ) {
        match self.binding_target(instr) {
            Some(target) => w.open(target),
            None => w.open(""),
        }
        for line in lines {
            w.line(line);
        }
        w.line(tail);
        w.close_with("};");
    }

    /// `let t: T =` or `t =`; `None` for results of type `()`.
    fn binding_target(&self, instr: &Instruction) -> Option<String> {
        let result = instr.result()?;
        let value = self.values.get(result)?;
        if value.is_unit() {
            return None;
        }
        if self.hoisted.contains(&value.ident) {
            return Some(format!("{} =", value.ident));
        }
        match value.declared_type() {
            Some(rust_ty) => Some(format!("let {}: {rust_ty} =", value.ident)),
            None => Some(format!("let {} =", value.ident)),
        }
    }

    /// `let mut` declarations for hoisted values: IR locals first, then the
    /// rest in instruction order.
    fn emit_declarations(&self, body: &BodyIr, w: &mut SourceWriter) {
        let locals = body.locals.iter().map(|l| l.name.as_str());
        let results = body
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter_map(Instruction::result);

        for name in locals.chain(results).unique() {
            let Some(value) = self.values.get(name) else { continue };
            if !self.hoisted.contains(&value.ident) || value.is_unit() {
                continue;
            }
            match value.declared_type() {
                Some(rust_ty) => w.line(format!(
                    "let mut {}: {rust_ty} = Default::default();",
                    value.ident
                )),
                None => w.line(format!("let mut {};", value.ident)),
            }
        }
    }
}

fn param_ident(name: &str, index: usize, prefix: &str) -> String {
    if name.is_empty() || name == "_" {
        format!("{prefix}{index}")
    } else {
        sanitize(name)
    }
}

/// Name of the Rust item for a function or method.
pub(super) fn item_ident(package: &PackageIr, function: &FunctionIr) -> String {
    match &function.receiver {
        Some(receiver) if function.is_method => method_ident(&receiver.ty, &function.name),
        _ => qualified_ident(&package.path, &function.name),
    }
}

/// Whether the body calls the `recover` builtin, directly or as a
/// `go`/`defer` statement.
pub(super) fn calls_recover(body: &BodyIr) -> bool {
    body.blocks.iter().flat_map(|b| &b.instructions).any(|i| {
        let text = i.comment();
        let text = text
            .strip_prefix("defer ")
            .or_else(|| text.strip_prefix("go "))
            .unwrap_or(text);
        matches!(i.kind(), OpKind::Call | OpKind::Defer | OpKind::Go)
            && i.args.first().is_some_and(|callee| callee == "recover")
            && text.starts_with("recover(")
    })
}

/// Whether the body registers any deferred call.
fn has_defers(body: &BodyIr) -> bool {
    !body.defers.is_empty()
        || body
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .any(|i| i.kind() == OpKind::Defer)
}

pub(super) fn emit_function(
    program: &ProgramContext,
    package: &PackageIr,
    function: &FunctionIr,
    diagnostics: &mut Diagnostics,
    w: &mut SourceWriter,
) {
    let mut cx = FunctionContext::new(program, package, function, diagnostics);
    let ident = item_ident(package, function);
    let params = cx
        .params()
        .into_iter()
        .map(|(name, descriptor)| format!("{name}: {}", map_type(&descriptor)))
        .join(", ");
    let results = results_type(&cx.results());
    let ret = results
        .as_deref()
        .map(|r| format!(" -> {r}"))
        .unwrap_or_default();

    w.blank();
    w.open(format!("pub fn {ident}({params}){ret}"));

    let body = function.body.as_ref().filter(|b| !b.blocks.is_empty());
    let Some(body) = body else {
        debug!(function = %cx.location, "no body");
        w.comment("no body in the IR");
        if results.is_some() {
            w.line(format!("unimplemented!(\"{} has no body\")", function.name));
        }
        w.close();
        return;
    };

    if program.recovers(&ident) {
        w.line("let __recover = RecoverScope::enter();");
    }
    cx.collect_values(body);
    let cfg = Cfg::new(&body.blocks);
    let shape = reconstruct(&cfg, program.options.control_flow);
    let hints = reconcile(&cx.location, &body.struct_hints, &cfg);
    let deferring = has_defers(body);

    if deferring {
        w.line("let __defers = DeferStack::new();");
        match &results {
            Some(r) => w.open(format!("let __outcome = __defers.guard(|| -> {r}")),
            None => w.open("let __outcome = __defers.guard(||"),
        }
    }

    cx.emit_declarations(body, w);
    control::emit_shape(&mut cx, body, &cfg, &shape, &hints, w);
    if results.is_some() {
        w.line("unreachable!()");
    }

    if deferring {
        w.close_with("});");
        w.line("__defers.unwind(__outcome)");
    }
    w.close();
}
