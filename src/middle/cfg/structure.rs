//! Structured control flow from a block graph, after Ramsey's "Beyond
//! Relooper": dominator-tree children with several forward predecessors
//! become the continuation of a labeled block, loop headers become labeled
//! loops, and every other block is inlined at its single predecessor.

use super::{BlockIdx, Cfg, ControlFlowStrategy};
use crate::index::Index;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// The instructions of a block, terminator excluded.
    Code(BlockIdx),
    /// `'b<id>: { body }`; breaking out of it continues at block `label`.
    Labeled { label: BlockIdx, body: Vec<Stmt> },
    /// `'l<id>: loop { body }`.
    Loop { header: BlockIdx, body: Vec<Stmt> },
    /// The two-way branch ending `block`.
    If {
        block: BlockIdx,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    /// Leaving `from` for `to`; carries the phi copies of `to`.
    Edge { from: BlockIdx, to: BlockIdx },
    Continue(BlockIdx),
    Break(BlockIdx),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Structured(Vec<Stmt>),
    /// Irreducible graph: a state machine over these blocks.
    Dispatch(Vec<BlockIdx>),
    /// Blocks in list order, each executed unconditionally.
    Linear(Vec<BlockIdx>),
}

pub fn reconstruct(cfg: &Cfg, strategy: ControlFlowStrategy) -> Shape {
    if cfg.is_empty() {
        return Shape::Structured(Vec::new());
    }

    match strategy {
        ControlFlowStrategy::Linear => Shape::Linear((0..cfg.len()).map(BlockIdx::new).collect()),
        ControlFlowStrategy::Structured if !cfg.is_reducible() => {
            Shape::Dispatch(cfg.reverse_postorder().to_vec())
        }
        ControlFlowStrategy::Structured => Shape::Structured(Structurer { cfg }.do_tree(cfg.entry())),
    }
}

struct Structurer<'a> {
    cfg: &'a Cfg,
}

impl Structurer<'_> {
    fn do_tree(&self, block: BlockIdx) -> Vec<Stmt> {
        let mut merges: Vec<BlockIdx> = self
            .cfg
            .dominator_children(block)
            .into_iter()
            .filter(|child| self.cfg.is_merge_node(*child))
            .collect();
        // Outermost labeled block gets the latest merge node.
        merges.reverse();

        let body = self.node_within(block, &merges);
        if self.cfg.is_loop_header(block) {
            vec![Stmt::Loop {
                header: block,
                body,
            }]
        } else {
            body
        }
    }

    fn node_within(&self, block: BlockIdx, merges: &[BlockIdx]) -> Vec<Stmt> {
        match merges.split_first() {
            None => {
                let mut out = vec![Stmt::Code(block)];
                out.extend(self.terminator(block));
                out
            }
            Some((&merge, rest)) => {
                let mut out = vec![Stmt::Labeled {
                    label: merge,
                    body: self.node_within(block, rest),
                }];
                out.extend(self.do_tree(merge));
                out
            }
        }
    }

    fn terminator(&self, block: BlockIdx) -> Vec<Stmt> {
        match self.cfg.successors(block) {
            [] => Vec::new(),
            [target] => self.do_branch(block, *target),
            [then_target, else_target, ..] => vec![Stmt::If {
                block,
                then_branch: self.do_branch(block, *then_target),
                else_branch: self.do_branch(block, *else_target),
            }],
        }
    }

    fn do_branch(&self, from: BlockIdx, to: BlockIdx) -> Vec<Stmt> {
        let mut out = vec![Stmt::Edge { from, to }];
        if self.cfg.is_retreating(from, to) {
            out.push(Stmt::Continue(to));
        } else if self.cfg.is_merge_node(to) {
            out.push(Stmt::Break(to));
        } else {
            out.extend(self.do_tree(to));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{index::Index, middle::cfg::tests::blocks};

    fn b(n: usize) -> BlockIdx {
        BlockIdx::new(n)
    }

    fn structured(successors: &[&[i64]]) -> Vec<Stmt> {
        match reconstruct(&Cfg::new(&blocks(successors)), ControlFlowStrategy::Structured) {
            Shape::Structured(stmts) => stmts,
            other => panic!("expected structured output, got {other:?}"),
        }
    }

    #[test]
    fn straight_line_is_inlined() {
        assert_eq!(
            structured(&[&[1], &[]]),
            vec![
                Stmt::Code(b(0)),
                Stmt::Edge { from: b(0), to: b(1) },
                Stmt::Code(b(1)),
            ]
        );
    }

    #[test]
    fn diamond_breaks_to_merge() {
        assert_eq!(
            structured(&[&[1, 2], &[3], &[3], &[]]),
            vec![
                Stmt::Labeled {
                    label: b(3),
                    body: vec![
                        Stmt::Code(b(0)),
                        Stmt::If {
                            block: b(0),
                            then_branch: vec![
                                Stmt::Edge { from: b(0), to: b(1) },
                                Stmt::Code(b(1)),
                                Stmt::Edge { from: b(1), to: b(3) },
                                Stmt::Break(b(3)),
                            ],
                            else_branch: vec![
                                Stmt::Edge { from: b(0), to: b(2) },
                                Stmt::Code(b(2)),
                                Stmt::Edge { from: b(2), to: b(3) },
                                Stmt::Break(b(3)),
                            ],
                        },
                    ],
                },
                Stmt::Code(b(3)),
            ]
        );
    }

    #[test]
    fn loop_continues_at_header() {
        // 0 -> 1; 1 -> {2, 3}; 2 -> 1
        assert_eq!(
            structured(&[&[1], &[2, 3], &[1], &[]]),
            vec![
                Stmt::Code(b(0)),
                Stmt::Edge { from: b(0), to: b(1) },
                Stmt::Loop {
                    header: b(1),
                    body: vec![
                        Stmt::Code(b(1)),
                        Stmt::If {
                            block: b(1),
                            then_branch: vec![
                                Stmt::Edge { from: b(1), to: b(2) },
                                Stmt::Code(b(2)),
                                Stmt::Edge { from: b(2), to: b(1) },
                                Stmt::Continue(b(1)),
                            ],
                            else_branch: vec![
                                Stmt::Edge { from: b(1), to: b(3) },
                                Stmt::Code(b(3)),
                            ],
                        },
                    ],
                },
            ]
        );
    }

    #[test]
    fn nested_merges_order_by_rpo() {
        // 0 -> {1, 2}; 1 -> {2, 3}; 2 -> 3; 3 exit. Both 2 and 3 merge under 0.
        let stmts = structured(&[&[1, 2], &[2, 3], &[3], &[]]);

        let [Stmt::Labeled { label: outer, body }, Stmt::Code(last)] = stmts.as_slice() else {
            panic!("unexpected shape {stmts:?}");
        };
        assert_eq!((*outer, *last), (b(3), b(3)));
        assert!(matches!(body.as_slice(), [Stmt::Labeled { label, .. }, Stmt::Code(two), ..]
            if *label == b(2) && *two == b(2)));
    }

    #[test]
    fn irreducible_falls_back_to_dispatch() {
        let cfg = Cfg::new(&blocks(&[&[1, 2], &[2], &[1, 3], &[]]));

        assert!(matches!(
            reconstruct(&cfg, ControlFlowStrategy::Structured),
            Shape::Dispatch(blocks) if blocks.len() == 4
        ));
    }

    #[test]
    fn linear_keeps_list_order() {
        let cfg = Cfg::new(&blocks(&[&[2], &[], &[1]]));

        assert_eq!(
            reconstruct(&cfg, ControlFlowStrategy::Linear),
            Shape::Linear(vec![b(0), b(1), b(2)])
        );
    }
}
