//! Straight-line instructions. Each one becomes a binding of its result,
//! or a statement when it has none.

use std::str::FromStr;

use itertools::Itertools;

use crate::{
    backend::{diagnostics::report_warning, writer::SourceWriter},
    frontend::ir::{Instruction, OpKind, TypeKind},
    middle::{
        op::{BinaryOp, UnaryOp},
        primitive::PrimitiveKind,
        sanitize::sanitize,
        ty::{FuncType, GoType},
    },
};

use super::{
    function::FunctionContext,
    types::{dyn_fn, qualified_ident, render_type, results_type},
    values::{Operand, render_constant, split_constant},
    warn_constant,
};

/// `#3` in `extract t0 #3` and `&t0.name [#3]`.
fn field_index(comment: &str) -> Option<usize> {
    let (_, rest) = comment.rsplit_once('#')?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// The operand texts between the brackets of `slice x[lo:hi:max]`.
fn slice_bounds(comment: &str) -> Vec<&str> {
    comment
        .rsplit_once('[')
        .and_then(|(_, rest)| rest.strip_suffix(']'))
        .map(|inner| inner.split(':').collect())
        .unwrap_or_default()
}

/// The states of `select blocking [<-t0, t1<-t2]`: `true` for receives.
fn select_states(comment: &str) -> Vec<bool> {
    comment
        .split_once('[')
        .and_then(|(_, rest)| rest.strip_suffix(']'))
        .map(|inner| {
            inner
                .split(", ")
                .filter(|s| !s.is_empty())
                .map(|state| state.starts_with("<-"))
                .collect()
        })
        .unwrap_or_default()
}

/// `func(int, string) (bool, error)`
fn func_descriptor(params: &[String], results: &[String]) -> String {
    let params = params.join(", ");
    match results {
        [] => format!("func({params})"),
        [single] => format!("func({params}) {single}"),
        _ => format!("func({params}) ({})", results.join(", ")),
    }
}

impl FunctionContext<'_, '_> {
    /// Resolves an SSA operand name: a named value, a constant, a global
    /// or a function used as a value.
    pub(super) fn operand(&mut self, name: &str) -> Operand {
        if let Some(operand) = self.lookup_value(name) {
            return operand;
        }
        let (program, package) = (self.program, self.package);

        if let Some((literal, descriptor)) = split_constant(name) {
            let ty = GoType::parse(descriptor);
            let (expr, issue) = render_constant(literal, &ty, &program.env, &package.path);
            warn_constant(self.diagnostics, &self.location, literal, issue);
            return Operand {
                expr,
                ty,
                descriptor: descriptor.to_string(),
                is_place: false,
            };
        }

        if let Some((owner, global)) = program.global(&package.path, name) {
            let ident = qualified_ident(&owner.path, &global.name);
            return Operand::temporary(format!("{ident}.ptr()"), &global.ty);
        }

        if let Some(function) = program.function(&package.path, name) {
            let signature = &function.signature;
            let params: Vec<String> = signature.params.iter().map(|p| p.ty.clone()).collect();
            let results: Vec<String> = signature.results.iter().map(|r| r.ty.clone()).collect();
            let func = FuncType {
                params: params.iter().map(|p| GoType::parse(p)).collect(),
                results: results.iter().map(|r| GoType::parse(r)).collect(),
            };
            let ident = qualified_ident(&package.path, name);
            return Operand {
                expr: format!("GoFunc::from_arc(Arc::new({ident}) as Arc<{}>)", dyn_fn(&func)),
                ty: GoType::Func(func),
                descriptor: func_descriptor(&params, &results),
                is_place: false,
            };
        }

        report_warning!(self.diagnostics, &self.location, "unknown operand {name}");
        Operand::place(sanitize(name), "")
    }

    fn operands(&mut self, instr: &Instruction) -> Vec<Operand> {
        instr.args.iter().map(|a| self.operand(a)).collect()
    }

    fn single_operand(&mut self, instr: &Instruction) -> Option<Operand> {
        match instr.args.as_slice() {
            [name] => Some(self.operand(name)),
            _ => None,
        }
    }

    fn owned(&self, operand: &Operand) -> String {
        operand.owned(&self.program.env, &self.package.path)
    }

    /// The declared type of the instruction's result.
    fn result_type(&self, instr: &Instruction) -> GoType {
        instr
            .result()
            .and_then(|r| self.values.get(r))
            .map(|v| v.ty.clone())
            .unwrap_or_else(|| GoType::parse(instr.ty().unwrap_or_default()))
    }

    fn resolved(&self, ty: &GoType) -> GoType {
        self.program.env.resolve(ty, &self.package.path).clone()
    }

    fn primitive(&self, ty: &GoType) -> Option<PrimitiveKind> {
        self.program.env.primitive_of(ty, &self.package.path)
    }

    fn is_copy(&self, ty: &GoType) -> bool {
        self.program.env.is_copy(ty, &self.package.path)
    }

    fn missing_operands(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        report_warning!(
            self.diagnostics,
            &self.location,
            "{} with {} operand(s) cannot be lowered: {}",
            instr.op,
            instr.args.len(),
            instr.comment()
        );
        self.placeholder(instr, w);
    }

    fn placeholder(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        if instr.result().is_some() {
            self.bind(instr, "Default::default()", w);
        }
    }

    pub(super) fn lower_instruction(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        match instr.kind() {
            OpKind::Alloc => self.bind(instr, "Ptr::new(Default::default())", w),
            OpKind::Store => match self.operands(instr).as_slice() {
                [address, value] => {
                    w.line(format!("{}.set({});", address.borrowed(), self.owned(value)))
                }
                _ => self.missing_operands(instr, w),
            },
            OpKind::UnOp => self.lower_unop(instr, w),
            OpKind::BinOp => self.lower_binop(instr, w),
            OpKind::Call => self.lower_call(instr, w),
            OpKind::Go => self.lower_go(instr, w),
            OpKind::Defer => self.lower_defer(instr, w),
            OpKind::Return => self.lower_return(instr, w),
            OpKind::Panic => match self.operands(instr).as_slice() {
                [value] => w.line(format!("go_panic({});", self.owned(value))),
                _ => self.missing_operands(instr, w),
            },
            OpKind::If | OpKind::Jump | OpKind::Phi | OpKind::RunDefers | OpKind::DebugRef => {}
            OpKind::MakeChan => {
                let elem = match self.resolved(&self.result_type(instr)) {
                    GoType::Chan(_, elem) => render_type(&elem),
                    _ => "_".to_string(),
                };
                match self.operands(instr).as_slice() {
                    [size] => {
                        let expr = format!("Chan::<{elem}>::new({})", self.owned(size));
                        self.bind(instr, expr, w)
                    }
                    _ => self.bind(instr, format!("Chan::<{elem}>::new(0isize)"), w),
                }
            }
            OpKind::Send => match self.operands(instr).as_slice() {
                [chan, value] => w.line(format!("{}.send({});", chan.borrowed(), self.owned(value))),
                _ => self.missing_operands(instr, w),
            },
            OpKind::Recv => match self.operands(instr).as_slice() {
                [chan] => self.bind(instr, format!("{}.recv()", chan.borrowed()), w),
                _ => self.missing_operands(instr, w),
            },
            OpKind::MakeSlice => {
                let elem = match self.resolved(&self.result_type(instr)) {
                    GoType::Slice(elem) => render_type(&elem),
                    _ => "_".to_string(),
                };
                match self.operands(instr).as_slice() {
                    [len, cap] => {
                        let expr = format!(
                            "GoSlice::<{elem}>::make({}, {})",
                            self.owned(len),
                            self.owned(cap)
                        );
                        self.bind(instr, expr, w)
                    }
                    [len] => {
                        let len = self.owned(len);
                        self.bind(instr, format!("GoSlice::<{elem}>::make({len}, {len})"), w)
                    }
                    _ => self.missing_operands(instr, w),
                }
            }
            OpKind::MakeMap => {
                let expr = match self.resolved(&self.result_type(instr)) {
                    GoType::Map(key, value) => {
                        format!("GoMap::<{}, {}>::make()", render_type(&key), render_type(&value))
                    }
                    _ => "GoMap::make()".to_string(),
                };
                self.bind(instr, expr, w)
            }
            OpKind::MapUpdate => match self.operands(instr).as_slice() {
                [map, key, value] => w.line(format!(
                    "{}.insert({}, {});",
                    map.borrowed(),
                    self.owned(key),
                    self.owned(value)
                )),
                _ => self.missing_operands(instr, w),
            },
            OpKind::Lookup => self.lower_lookup(instr, w),
            OpKind::IndexAddr => match self.operands(instr).as_slice() {
                [base, index] => {
                    let expr = format!("{}.elem_ptr({})", base.borrowed(), self.owned(index));
                    self.bind(instr, expr, w)
                }
                _ => self.missing_operands(instr, w),
            },
            OpKind::Index => match self.operands(instr).as_slice() {
                [base, index] => {
                    let expr = format!("{}.at({})", base.borrowed(), self.owned(index));
                    self.bind(instr, expr, w)
                }
                _ => self.missing_operands(instr, w),
            },
            OpKind::FieldAddr => self.lower_field_addr(instr, w),
            OpKind::Field => self.lower_field(instr, w),
            OpKind::Slice => self.lower_slice(instr, w),
            OpKind::Convert => match self.operands(instr).as_slice() {
                [value] => {
                    let target = render_type(&self.result_type(instr));
                    let expr = format!("go_convert::<{target}, _>({})", self.owned(value));
                    self.bind(instr, expr, w)
                }
                _ => self.missing_operands(instr, w),
            },
            OpKind::ChangeType => match self.operands(instr).as_slice() {
                [value] => {
                    let expr = self.owned(value);
                    self.bind(instr, expr, w)
                }
                _ => self.missing_operands(instr, w),
            },
            OpKind::ChangeInterface => self.lower_change_interface(instr, w),
            OpKind::MakeInterface => self.lower_make_interface(instr, w),
            OpKind::TypeAssert => self.lower_type_assert(instr, w),
            OpKind::MakeClosure => self.lower_make_closure(instr, w),
            OpKind::Extract => match self.operands(instr).as_slice() {
                [tuple] => {
                    let index = field_index(instr.comment()).unwrap_or_default();
                    let mut expr = format!("{}.{index}", tuple.borrowed());
                    if !self.is_copy(&self.result_type(instr)) {
                        expr.push_str(".clone()");
                    }
                    self.bind(instr, expr, w)
                }
                _ => self.missing_operands(instr, w),
            },
            OpKind::Range => match self.operands(instr).as_slice() {
                [value] => {
                    let expr = match self.resolved(&value.ty) {
                        GoType::Map(..) => format!("GoIter::over_map(&{})", value.borrowed()),
                        _ => format!("GoIter::over_string(&{})", value.borrowed()),
                    };
                    self.bind(instr, expr, w)
                }
                _ => self.missing_operands(instr, w),
            },
            OpKind::Next => match self.operands(instr).as_slice() {
                [iter] => self.bind(instr, format!("{}.next_entry()", iter.expr), w),
                _ => self.missing_operands(instr, w),
            },
            OpKind::Select => self.lower_select(instr, w),
            OpKind::Unknown(op) => {
                report_warning!(
                    self.diagnostics,
                    &self.location,
                    "unsupported instruction {op}: {}",
                    instr.comment()
                );
                w.comment(format!("unsupported: {op} {}", instr.comment()));
                self.placeholder(instr, w);
            }
        }
    }

    fn lower_return(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let values: Vec<String> = self
            .operands(instr)
            .iter()
            .map(|operand| self.owned(operand))
            .collect();
        match values.as_slice() {
            [] => w.line("return;"),
            [single] => w.line(format!("return {single};")),
            _ => w.line(format!("return ({});", values.join(", "))),
        }
    }

    fn lower_unop(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let Some(name) = instr.args.first() else {
            return self.missing_operands(instr, w);
        };
        let x = self.operand(name);
        let op = instr
            .operator
            .as_deref()
            .and_then(|op| UnaryOp::from_str(op).ok())
            .or_else(|| UnaryOp::from_comment(instr.comment(), name));
        let Some(op) = op else {
            report_warning!(
                self.diagnostics,
                &self.location,
                "cannot tell the operator of `{}`",
                instr.comment()
            );
            return self.placeholder(instr, w);
        };

        let kind = self.primitive(&x.ty);
        let expr = match op {
            UnaryOp::Deref => format!("{}.get()", x.borrowed()),
            UnaryOp::Recv => match self.result_type(instr) {
                GoType::Tuple(_) => format!("{}.recv_ok()", x.borrowed()),
                _ => format!("{}.recv()", x.borrowed()),
            },
            UnaryOp::Neg if kind.is_some_and(|k| k.is_integer()) => {
                format!("{}.wrapping_neg()", x.borrowed())
            }
            UnaryOp::Neg => format!("-{}", x.borrowed()),
            UnaryOp::Not | UnaryOp::Complement => format!("!{}", x.borrowed()),
        };
        if let Some(kind) = kind {
            if !matches!(op, UnaryOp::Deref | UnaryOp::Recv) && !kind.supports_unary_op(op) {
                report_warning!(self.diagnostics, &self.location, "operator {op} on {kind}");
            }
        }
        self.bind(instr, expr, w)
    }

    fn lower_binop(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let [x_name, y_name] = instr.args.as_slice() else {
            return self.missing_operands(instr, w);
        };
        let (x, y) = (self.operand(x_name), self.operand(y_name));
        let op = instr
            .operator
            .as_deref()
            .and_then(|op| BinaryOp::from_str(op).ok())
            .or_else(|| BinaryOp::from_comment(instr.comment(), x_name, y_name));
        let Some(op) = op else {
            report_warning!(
                self.diagnostics,
                &self.location,
                "cannot tell the operator of `{}`",
                instr.comment()
            );
            return self.placeholder(instr, w);
        };

        let kind = self.primitive(&x.ty).or_else(|| self.primitive(&y.ty));
        if let Some(kind) = kind {
            if !kind.supports_binary_op(op) {
                report_warning!(self.diagnostics, &self.location, "operator {op} on {kind}");
            }
        }

        let expr = self.binop_expr(op, kind, &x, &y);
        self.bind(instr, expr, w)
    }

    fn binop_expr(&self, op: BinaryOp, kind: Option<PrimitiveKind>, x: &Operand, y: &Operand) -> String {
        let (a, b) = (x.borrowed(), y.borrowed());
        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            let nil_check = match (x.is_nil_constant(), y.is_nil_constant()) {
                (false, true) => Some(&a),
                (true, false) => Some(&b),
                _ => None,
            };
            if let Some(value) = nil_check {
                return match op {
                    BinaryOp::Eq => format!("{value}.is_nil()"),
                    _ => format!("!{value}.is_nil()"),
                };
            }
        }
        if op.is_comparison() {
            return format!("{a} {op} {b}");
        }

        let integer = kind.is_some_and(|k| k.is_integer());
        match op {
            BinaryOp::Add if kind == Some(PrimitiveKind::String) => format!("{a}.concat(&{b})"),
            BinaryOp::Add if integer => format!("{a}.wrapping_add({b})"),
            BinaryOp::Sub if integer => format!("{a}.wrapping_sub({b})"),
            BinaryOp::Mul if integer => format!("{a}.wrapping_mul({b})"),
            BinaryOp::Div if integer => format!("{a}.wrapping_div({b})"),
            BinaryOp::Rem if integer => format!("{a}.wrapping_rem({b})"),
            BinaryOp::Shl => {
                format!("{a}.checked_shl(u32::try_from({b}).unwrap_or(u32::MAX)).unwrap_or(0)")
            }
            BinaryOp::Shr if kind.is_some_and(|k| k.is_signed()) => format!(
                "{a}.checked_shr(u32::try_from({b}).unwrap_or(u32::MAX)).unwrap_or(if {a} < 0 {{ -1 }} else {{ 0 }})"
            ),
            BinaryOp::Shr => {
                format!("{a}.checked_shr(u32::try_from({b}).unwrap_or(u32::MAX)).unwrap_or(0)")
            }
            BinaryOp::AndNot => format!("{a} & !{b}"),
            op => format!("{a} {op} {b}"),
        }
    }

    fn lower_lookup(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let [base, key]: [Operand; 2] = match self.operands(instr).try_into() {
            Ok(operands) => operands,
            Err(_) => return self.missing_operands(instr, w),
        };
        let comma_ok = matches!(self.result_type(instr), GoType::Tuple(_));
        let expr = match self.resolved(&base.ty) {
            GoType::Map(..) if comma_ok => format!("{}.lookup(&{})", base.borrowed(), key.borrowed()),
            GoType::Map(..) => format!("{}.get(&{})", base.borrowed(), key.borrowed()),
            _ => format!("{}.at({})", base.borrowed(), self.owned(&key)),
        };
        self.bind(instr, expr, w)
    }

    /// The name of the field a `FieldAddr`/`Field` selects from a value of
    /// struct type `ty`.
    fn field_name(&mut self, instr: &Instruction, ty: &GoType) -> String {
        let comment = instr.comment();
        let index = field_index(comment);
        let declared = match self.resolved(ty) {
            GoType::Named(named) => self
                .program
                .env
                .lookup(&named, &self.package.path)
                .filter(|info| info.kind == TypeKind::Struct)
                .and_then(|info| index.and_then(|i| info.fields.get(i)))
                .map(|(name, _)| name.clone()),
            _ => None,
        };
        if let Some(name) = declared {
            return sanitize(&name);
        }

        // `&t0.name [#1]` or `t0.name [#1]`
        let parsed = comment
            .split(" [#")
            .next()
            .and_then(|selector| selector.rsplit_once('.'))
            .map(|(_, name)| name.to_string());
        match parsed {
            Some(name) => sanitize(&name),
            None => {
                report_warning!(
                    self.diagnostics,
                    &self.location,
                    "cannot tell which field `{comment}` selects"
                );
                format!("field{}", index.unwrap_or_default())
            }
        }
    }

    fn lower_field_addr(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let Some(base) = self.single_operand(instr) else {
            return self.missing_operands(instr, w);
        };
        let elem = match self.resolved(&base.ty) {
            GoType::Pointer(elem) => *elem,
            other => other,
        };
        let name = self.field_name(instr, &elem);
        let expr = format!("{}.field(|v| &mut v.{name})", base.borrowed());
        self.bind(instr, expr, w)
    }

    fn lower_field(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let Some(base) = self.single_operand(instr) else {
            return self.missing_operands(instr, w);
        };
        let name = self.field_name(instr, &base.ty);
        let mut expr = format!("{}.{name}", base.borrowed());
        if !self.is_copy(&self.result_type(instr)) {
            expr.push_str(".clone()");
        }
        self.bind(instr, expr, w)
    }

    fn lower_slice(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let Some((base_name, rest)) = instr.args.split_first() else {
            return self.missing_operands(instr, w);
        };
        let base = self.operand(base_name);

        // The comment shows which of low, high and max are present; the
        // arguments hold only those.
        let mut remaining = rest.iter();
        let mut bounds = Vec::new();
        for text in slice_bounds(instr.comment()).into_iter().take(3) {
            let bound = match text.is_empty() {
                true => None,
                false => remaining.next().map(|name| self.operand(name)),
            };
            bounds.push(match bound {
                Some(operand) => format!("Some(({}).to_i64())", self.owned(&operand)),
                None => "None".to_string(),
            });
        }
        if bounds.len() < 2 {
            bounds.resize(2, "None".to_string());
        }

        let range = bounds.iter().take(2).join(", ");
        let expr = match self.resolved(&base.ty) {
            GoType::Pointer(elem) if matches!(*elem, GoType::Array(..)) => format!(
                "GoSlice::from_vec({}.get().as_slice().to_vec()).slice({range})",
                base.borrowed()
            ),
            _ if bounds.len() == 3 => {
                format!("{}.slice_cap({})", base.borrowed(), bounds.join(", "))
            }
            _ => format!("{}.slice({range})", base.borrowed()),
        };
        self.bind(instr, expr, w)
    }

    fn lower_change_interface(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let Some(value) = self.single_operand(instr) else {
            return self.missing_operands(instr, w);
        };
        let from_error = self.resolved(&value.ty) == GoType::Error;
        let to_error = self.resolved(&self.result_type(instr)) == GoType::Error;
        let expr = match (from_error, to_error) {
            (true, false) => format!("{}.as_iface().clone()", value.borrowed()),
            (false, true) => format!("GoError::from_iface({})", self.owned(&value)),
            _ => self.owned(&value),
        };
        self.bind(instr, expr, w)
    }

    fn lower_make_interface(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let Some(value) = self.single_operand(instr) else {
            return self.missing_operands(instr, w);
        };
        let boxed = format!("Iface::new({:?}, {})", value.descriptor, self.owned(&value));
        let expr = match self.resolved(&self.result_type(instr)) {
            GoType::Error => format!("GoError::from_iface({boxed})"),
            _ => boxed,
        };
        self.bind(instr, expr, w)
    }

    fn lower_type_assert(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let Some(value) = self.single_operand(instr) else {
            return self.missing_operands(instr, w);
        };
        let receiver = match self.resolved(&value.ty) {
            GoType::Error => format!("{}.as_iface()", value.borrowed()),
            _ => value.borrowed(),
        };
        let (target, comma_ok) = match self.result_type(instr) {
            GoType::Tuple(items) if items.len() == 2 => (items[0].clone(), true),
            other => (other, false),
        };
        let to_error = self.resolved(&target) == GoType::Error;
        let package = self.package.path.clone();

        let expr = if self.program.env.is_interface(&target, &package) {
            match (comma_ok, to_error) {
                (false, false) => format!("{receiver}.assert_iface()"),
                (false, true) => format!("GoError::from_iface({receiver}.assert_iface())"),
                (true, false) => format!("{receiver}.try_assert_iface()"),
                (true, true) => format!(
                    "{{ let (__v, __ok) = {receiver}.try_assert_iface(); (GoError::from_iface(__v), __ok) }}"
                ),
            }
        } else {
            let target = render_type(&target);
            match comma_ok {
                false => format!("{receiver}.assert::<{target}>()"),
                true => format!("{receiver}.try_assert::<{target}>()"),
            }
        };
        self.bind(instr, expr, w)
    }

    fn lower_make_closure(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let Some((callee, bound)) = instr.args.split_first() else {
            return self.missing_operands(instr, w);
        };
        let (program, package) = (self.program, self.package);
        let Some(function) = program.function(&package.path, callee) else {
            report_warning!(
                self.diagnostics,
                &self.location,
                "closure {callee} is not in the IR; the function value is nil"
            );
            return self.bind(instr, "GoFunc::nil()", w);
        };

        let signature = &function.signature;
        let params: Vec<GoType> = signature.params.iter().map(|p| GoType::parse(&p.ty)).collect();
        let results: Vec<GoType> = signature.results.iter().map(|r| GoType::parse(&r.ty)).collect();
        let dyn_ty = dyn_fn(&FuncType {
            params: params.clone(),
            results: results.clone(),
        });

        let bindings = bound
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let operand = self.operand(name);
                format!("let __b{i} = {};", self.owned(&operand))
            })
            .collect::<Vec<_>>();
        let arguments = (0..bound.len())
            .map(|i| format!("__b{i}.clone()"))
            .chain((0..params.len()).map(|i| format!("__p{i}")))
            .join(", ");
        let parameters = params
            .iter()
            .enumerate()
            .map(|(i, ty)| format!("__p{i}: {}", render_type(ty)))
            .join(", ");
        let ret = results_type(&results)
            .map(|r| format!(" -> {r}"))
            .unwrap_or_default();
        let ident = qualified_ident(&package.path, callee);

        let closure = format!("move |{parameters}|{ret} {{ {ident}({arguments}) }}");
        let body = match bindings.is_empty() {
            true => closure,
            false => format!("{{ {} {closure} }}", bindings.join(" ")),
        };
        self.bind(instr, format!("GoFunc::from_arc(Arc::new({body}) as Arc<{dyn_ty}>)"), w)
    }

    fn lower_select(&mut self, instr: &Instruction, w: &mut SourceWriter) {
        let comment = instr.comment();
        let blocking = !comment.starts_with("select nonblocking");
        let mut args = instr.args.iter();
        let mut lines = vec!["let mut __sel = Select::new();".to_string()];
        let mut received = Vec::new();

        for is_recv in select_states(comment) {
            let Some(chan) = args.next().map(|name| self.operand(name)) else { break };
            if is_recv {
                let slot = format!("__r{}", received.len());
                lines.push(format!("let {slot} = __sel.recv(&{});", chan.borrowed()));
                received.push(format!("{slot}.take()"));
            } else {
                let Some(value) = args.next().map(|name| self.operand(name)) else { break };
                lines.push(format!("__sel.send(&{}, {});", chan.borrowed(), self.owned(&value)));
            }
        }
        lines.push(format!("let (__index, __ok) = __sel.wait({blocking});"));

        let tail = std::iter::once("__index".to_string())
            .chain(std::iter::once("__ok".to_string()))
            .chain(received)
            .join(", ");
        self.bind_block(instr, &lines, &format!("({tail})"), w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::targets::rust::tests::{EMPTY_MAIN, generate, main_package};

    #[test]
    fn comment_parsing() {
        assert_eq!(field_index("extract t3 #1"), Some(1));
        assert_eq!(field_index("&t0.name [#2]"), Some(2));
        assert_eq!(slice_bounds("slice t0[1:int:]"), vec!["1:int", ""]);
        assert_eq!(slice_bounds("slice s[:]"), vec!["", ""]);
        assert_eq!(select_states("select blocking [<-t0, t1<-t2]"), vec![true, false]);
        assert_eq!(func_descriptor(&["int".into()], &[]), "func(int)");
    }

    fn body(params: &str, results: &str, instructions: &str) -> (String, Vec<String>) {
        let json = main_package(
            r#"{"name": "Node", "kind": "struct", "fields": [{"name": "val", "typ": "int"}, {"name": "next", "typ": "*main.Node"}]}"#,
            &format!(
                r#"{{"name": "f", "package": "main", "is_method": false,
                    "signature": {{"params": [{params}], "results": [{results}], "variadic": false}},
                    "body": {{"blocks": [{{"id": 0, "instructions": [{instructions}], "successors": []}}]}}}},
                   {EMPTY_MAIN}"#
            ),
        );
        let (main_rs, diagnostics) = generate(&json);
        let warnings = diagnostics.warnings().iter().map(|w| w.message.clone()).collect();
        (main_rs, warnings)
    }

    #[test]
    fn arithmetic_wraps_and_strings_concatenate() {
        let (main_rs, warnings) = body(
            r#"{"name": "a", "type": "int"}, {"name": "s", "type": "string"}"#,
            r#"{"name": "", "type": "string"}"#,
            r#"{"op": "BinOp", "args": ["a", "1:int"], "result": "t0", "type": "int", "comment": "a + 1:int"},
               {"op": "BinOp", "args": ["s", "s"], "result": "t1", "type": "string", "comment": "s + s", "operator": "+"},
               {"op": "BinOp", "args": ["a", "t0"], "result": "t2", "type": "bool", "comment": "a < t0"},
               {"op": "Return", "args": ["t1"]}"#,
        );

        assert!(warnings.is_empty(), "{warnings:?}");
        assert!(main_rs.contains("let t0: isize = a.wrapping_add(1isize);"));
        assert!(main_rs.contains("let t1: GoString = s.concat(&s);"));
        assert!(main_rs.contains("let t2: bool = a < t0;"));
        assert!(main_rs.contains("return t1.clone();"));
    }

    #[test]
    fn nil_comparison_uses_is_nil() {
        let (main_rs, _) = body(
            r#"{"name": "err", "type": "error"}"#,
            "",
            r#"{"op": "BinOp", "args": ["err", "nil:error"], "result": "t0", "type": "bool", "comment": "err != nil:error"},
               {"op": "Return", "args": []}"#,
        );

        assert!(main_rs.contains("let t0: bool = !err.is_nil();"));
    }

    #[test]
    fn fields_and_pointers() {
        let (main_rs, warnings) = body(
            r#"{"name": "n", "type": "*main.Node"}"#,
            "",
            r#"{"op": "FieldAddr", "args": ["n"], "result": "t0", "type": "*int", "comment": "&n.val [#0]"},
               {"op": "UnOp", "args": ["t0"], "result": "t1", "type": "int", "comment": "*t0"},
               {"op": "Store", "args": ["t0", "t1"], "comment": "*t0 = t1"},
               {"op": "Return", "args": []}"#,
        );

        assert!(warnings.is_empty(), "{warnings:?}");
        assert!(main_rs.contains("let t0: Ptr<isize> = n.field(|v| &mut v.val);"));
        assert!(main_rs.contains("let t1: isize = t0.get();"));
        assert!(main_rs.contains("t0.set(t1);"));
    }

    #[test]
    fn interfaces() {
        let (main_rs, _) = body(
            r#"{"name": "x", "type": "int"}"#,
            r#"{"name": "", "type": "int"}"#,
            r#"{"op": "MakeInterface", "args": ["x"], "result": "t0", "type": "interface{}", "comment": "make interface{} <- int (x)"},
               {"op": "TypeAssert", "args": ["t0"], "result": "t1", "type": "(value int, ok bool)", "comment": "typeassert,ok t0.(int)"},
               {"op": "Extract", "args": ["t1"], "result": "t2", "type": "int", "comment": "extract t1 #0"},
               {"op": "Return", "args": ["t2"]}"#,
        );

        assert!(main_rs.contains("let t0: GoAny = Iface::new(\"int\", x);"));
        assert!(main_rs.contains("let t1: (isize, bool) = t0.try_assert::<isize>();"));
        assert!(main_rs.contains("let t2: isize = t1.0;"));
    }

    #[test]
    fn slicing_reads_bounds_from_the_comment() {
        let (main_rs, _) = body(
            r#"{"name": "xs", "type": "[]int"}, {"name": "i", "type": "int"}"#,
            "",
            r#"{"op": "Slice", "args": ["xs", "i"], "result": "t0", "type": "[]int", "comment": "slice xs[:i]"},
               {"op": "Return", "args": []}"#,
        );

        assert!(main_rs.contains("let t0: GoSlice<isize> = xs.slice(None, Some((i).to_i64()));"));
    }

    #[test]
    fn select_binds_a_tuple() {
        let (main_rs, _) = body(
            r#"{"name": "c", "type": "chan int"}, {"name": "d", "type": "chan string"}, {"name": "s", "type": "string"}"#,
            "",
            r#"{"op": "Select", "args": ["c", "d", "s"], "result": "t0", "type": "(index int, recvOk bool, r_0 int)", "comment": "select blocking [<-c, d<-s]"},
               {"op": "Return", "args": []}"#,
        );

        assert!(main_rs.contains("let __r0 = __sel.recv(&c);"));
        assert!(main_rs.contains("__sel.send(&d, s.clone());"));
        assert!(main_rs.contains("let (__index, __ok) = __sel.wait(true);"));
        assert!(main_rs.contains("(__index, __ok, __r0.take())"));
    }

    #[test]
    fn unknown_instructions_are_reported() {
        let (main_rs, warnings) = body(
            "",
            "",
            r#"{"op": "Frobnicate", "args": [], "result": "t0", "type": "int", "comment": "frob"},
               {"op": "Return", "args": []}"#,
        );

        assert!(main_rs.contains("// unsupported: Frobnicate frob"));
        assert!(main_rs.contains("let t0: isize = Default::default();"));
        assert!(warnings.iter().any(|w| w.contains("unsupported instruction Frobnicate")));
    }
}
