//! Block-level emission for the three shapes a body can take.

use crate::{
    backend::{diagnostics::report_warning, writer::SourceWriter},
    frontend::ir::{BlockIr, BodyIr, Instruction, OpKind},
    index::Index,
    middle::cfg::{
        BlockIdx, Cfg,
        hints::HintAnnotations,
        structure::{Shape, Stmt},
    },
};

use super::function::FunctionContext;

/// Predecessor ids in the order of a phi's operands, from
/// `phi [0: t1, 2: 3:int] #x`.
fn phi_predecessors(comment: &str) -> Option<Vec<i64>> {
    let (_, rest) = comment.split_once('[')?;
    let (inner, _) = rest.rsplit_once(']')?;
    inner
        .split(", ")
        .map(|edge| edge.split_once(':')?.0.trim().parse().ok())
        .collect()
}

struct Emitter<'c, 'a, 'd> {
    cx: &'c mut FunctionContext<'a, 'd>,
    body: &'a BodyIr,
    cfg: &'c Cfg,
    hints: &'c HintAnnotations,
}

pub(super) fn emit_shape<'a>(
    cx: &mut FunctionContext<'a, '_>,
    body: &'a BodyIr,
    cfg: &Cfg,
    shape: &Shape,
    hints: &HintAnnotations,
    w: &mut SourceWriter,
) {
    let mut emitter = Emitter {
        cx,
        body,
        cfg,
        hints,
    };
    match shape {
        Shape::Structured(stmts) => emitter.stmts(stmts, w),
        Shape::Dispatch(order) => emitter.dispatch(order, w),
        Shape::Linear(order) => emitter.linear(order, w),
    }
}

impl<'a> Emitter<'_, 'a, '_> {
    fn block(&self, idx: BlockIdx) -> &'a BlockIr {
        &self.body.blocks[idx.index()]
    }

    fn terminator(&self, idx: BlockIdx) -> Option<&'a Instruction> {
        self.block(idx)
            .instructions
            .last()
            .filter(|i| i.kind().is_terminator())
    }

    /// The block's instructions except phis and branches.
    fn code(&mut self, idx: BlockIdx, w: &mut SourceWriter) {
        for instr in &self.block(idx).instructions {
            if matches!(instr.kind(), OpKind::Phi | OpKind::If | OpKind::Jump) {
                continue;
            }
            self.cx.lower_instruction(instr, w);
        }
    }

    fn condition(&mut self, idx: BlockIdx) -> String {
        let cond = self
            .terminator(idx)
            .filter(|i| i.kind() == OpKind::If)
            .and_then(|i| i.args.first());
        match cond {
            Some(name) => self.cx.operand(name).borrowed(),
            None => {
                report_warning!(
                    self.cx.diagnostics,
                    &self.cx.location,
                    "block {} branches two ways without an If",
                    self.cfg.id(idx)
                );
                "false".to_string()
            }
        }
    }

    /// Assigns the phis of `to` their values along the edge from `from`.
    /// With several phis every value is read before any is written.
    fn edge(&mut self, from: BlockIdx, to: BlockIdx, w: &mut SourceWriter) {
        let from_id = self.cfg.id(from);
        let phis: Vec<&'a Instruction> = self
            .block(to)
            .instructions
            .iter()
            .filter(|i| i.kind() == OpKind::Phi)
            .collect();

        let mut copies = Vec::new();
        for phi in phis {
            let position = phi_predecessors(phi.comment())
                .and_then(|ids| ids.iter().position(|id| *id == from_id))
                .or_else(|| self.cfg.predecessors(to).iter().position(|p| *p == from));
            let (Some(result), Some(name)) = (phi.result(), position.and_then(|p| phi.args.get(p)))
            else {
                report_warning!(
                    self.cx.diagnostics,
                    &self.cx.location,
                    "phi `{}` has no value for block {from_id}",
                    phi.comment()
                );
                continue;
            };
            let Some(target) = self.cx.lookup_value(result) else { continue };
            let value = self.cx.operand(name);
            let value = value.owned(&self.cx.program.env, &self.cx.package.path);
            copies.push((target.expr, value));
        }

        match copies.as_slice() {
            [] => {}
            [(target, value)] => w.line(format!("{target} = {value};")),
            _ => {
                for (i, (_, value)) in copies.iter().enumerate() {
                    w.line(format!("let __p{i} = {value};"));
                }
                for (i, (target, _)) in copies.iter().enumerate() {
                    w.line(format!("{target} = __p{i};"));
                }
            }
        }
    }

    fn stmts(&mut self, stmts: &[Stmt], w: &mut SourceWriter) {
        for stmt in stmts {
            match stmt {
                Stmt::Code(idx) => self.code(*idx, w),
                Stmt::Labeled { label, body } => {
                    w.open(format!("'b{}:", self.cfg.id(*label)));
                    self.stmts(body, w);
                    w.close();
                }
                Stmt::Loop { header, body } => {
                    let id = self.cfg.id(*header);
                    if let Some(position) = self.hints.loop_position(*header) {
                        w.comment(format!("for loop at {position}"));
                    }
                    w.open(format!("'l{id}: loop"));
                    self.stmts(body, w);
                    // Falling off the end leaves the loop.
                    w.line(format!("break 'l{id};"));
                    w.close();
                }
                Stmt::If {
                    block,
                    then_branch,
                    else_branch,
                } => {
                    let cond = self.condition(*block);
                    w.open(format!("if {cond}"));
                    self.stmts(then_branch, w);
                    if !else_branch.is_empty() {
                        w.reopen("} else {");
                        self.stmts(else_branch, w);
                    }
                    w.close();
                }
                Stmt::Edge { from, to } => self.edge(*from, *to, w),
                Stmt::Continue(header) => w.line(format!("continue 'l{};", self.cfg.id(*header))),
                Stmt::Break(label) => w.line(format!("break 'b{};", self.cfg.id(*label))),
            }
        }
    }

    /// A state machine over block ids, for graphs with no structured form.
    fn dispatch(&mut self, order: &[BlockIdx], w: &mut SourceWriter) {
        w.line(format!("let mut __block: i64 = {};", self.cfg.id(self.cfg.entry())));
        w.open("'dispatch: loop");
        w.open("match __block");
        for &idx in order {
            w.open(format!("{} =>", self.cfg.id(idx)));
            self.code(idx, w);
            let cfg = self.cfg;
            match cfg.successors(idx) {
                [] => {}
                [target] => self.goto(idx, *target, w),
                [then_target, else_target, ..] => {
                    let cond = self.condition(idx);
                    w.open(format!("if {cond}"));
                    self.goto(idx, *then_target, w);
                    w.reopen("} else {");
                    self.goto(idx, *else_target, w);
                    w.close();
                }
            }
            w.close();
        }
        w.line("_ => unreachable!(),");
        w.close();
        w.close();
    }

    fn goto(&mut self, from: BlockIdx, to: BlockIdx, w: &mut SourceWriter) {
        self.edge(from, to, w);
        w.line(format!("__block = {};", self.cfg.id(to)));
        w.line("continue 'dispatch;");
    }

    /// Every block in list order, branches left as comments.
    fn linear(&mut self, order: &[BlockIdx], w: &mut SourceWriter) {
        for (n, &idx) in order.iter().enumerate() {
            let id = self.cfg.id(idx);
            if n > 0 {
                w.open(format!("'b{id}:"));
            }
            for instr in &self.block(idx).instructions {
                match instr.kind() {
                    OpKind::If => {
                        let cond = self.condition(idx);
                        let targets = self.cfg.successors(idx).iter().map(|s| self.cfg.id(*s));
                        let targets: Vec<String> = targets.map(|t| t.to_string()).collect();
                        w.open(format!("if {cond}"));
                        w.comment(format!("branches to blocks {}", targets.join(" / ")));
                        w.close();
                    }
                    OpKind::Jump | OpKind::Phi => {
                        w.comment(format!("{} {}", instr.op, instr.comment()))
                    }
                    _ => self.cx.lower_instruction(instr, w),
                }
            }
            if n > 0 {
                w.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        CodegenOptions,
        targets::rust::tests::{EMPTY_MAIN, generate, generate_with, main_package},
    };
    use crate::middle::cfg::ControlFlowStrategy;

    #[test]
    fn phi_comment() {
        assert_eq!(phi_predecessors("phi [0: 0:int, 2: t4] #i"), Some(vec![0, 2]));
        assert_eq!(phi_predecessors("phi"), None);
    }

    /// `func count(n int) int { s := 0; for i := 0; i < n; i++ { s += i }; return s }`
    fn counting_loop() -> String {
        main_package(
            "",
            &format!(
                "{}, {EMPTY_MAIN}",
                r#"{"name": "count", "package": "main", "is_method": false,
                "signature": {"params": [{"name": "n", "type": "int"}], "results": [{"name": "", "type": "int"}], "variadic": false},
                "body": {
                    "blocks": [
                        {"id": 0, "instructions": [{"op": "Jump", "comment": "jump 1"}], "successors": [1]},
                        {"id": 1, "instructions": [
                            {"op": "Phi", "args": ["0:int", "t3"], "result": "t0", "type": "int", "comment": "phi [0: 0:int, 2: t3] #s"},
                            {"op": "Phi", "args": ["0:int", "t4"], "result": "t1", "type": "int", "comment": "phi [0: 0:int, 2: t4] #i"},
                            {"op": "BinOp", "args": ["t1", "n"], "result": "t2", "type": "bool", "comment": "t1 < n"},
                            {"op": "If", "args": ["t2"], "comment": "if t2 goto 2 else 3"}
                        ], "successors": [2, 3]},
                        {"id": 2, "instructions": [
                            {"op": "BinOp", "args": ["t0", "t1"], "result": "t3", "type": "int", "comment": "t0 + t1"},
                            {"op": "BinOp", "args": ["t1", "1:int"], "result": "t4", "type": "int", "comment": "t1 + 1:int"},
                            {"op": "Jump", "comment": "jump 1"}
                        ], "successors": [1]},
                        {"id": 3, "instructions": [{"op": "Return", "args": ["t0"], "comment": "return t0"}], "successors": []}
                    ],
                    "struct_hints": {"for_0": {"kind": "for", "lines": [12]}}
                }}"#
            ),
        )
    }

    #[test]
    fn loops_assign_phis_on_each_edge() {
        let (main_rs, diagnostics) = generate(&counting_loop());

        assert!(diagnostics.is_empty(), "{:?}", diagnostics.warnings());
        assert!(main_rs.contains("let mut t0: isize = Default::default();"));
        assert!(main_rs.contains("// for loop at 12"));
        assert!(main_rs.contains("'l1: loop {"));
        assert!(main_rs.contains("let __p0 = 0isize;"));
        assert!(main_rs.contains("let __p0 = t3;"));
        assert!(main_rs.contains("t1 = __p1;"));
        assert!(main_rs.contains("if t2 {"));
        assert!(main_rs.contains("continue 'l1;"));
        assert!(main_rs.contains("return t0;"));
    }

    #[test]
    fn linear_strategy_keeps_block_order() {
        let options = CodegenOptions {
            control_flow: ControlFlowStrategy::Linear,
            ..CodegenOptions::default()
        };

        let (main_rs, _) = generate_with(&counting_loop(), &options);

        let b1 = main_rs.find("'b1: {");
        let b3 = main_rs.find("'b3: {");
        assert!(b1.is_some() && b1 < b3);
        assert!(main_rs.contains("// branches to blocks 2 / 3"));
        assert!(main_rs.contains("// Phi phi [0: 0:int, 2: t3] #s"));
    }
}
