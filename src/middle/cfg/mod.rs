//! Control-flow analysis over a function's basic blocks: reverse postorder,
//! dominators, loop headers and reducibility.

use hashbrown::{HashMap, HashSet};
use strum::{Display, EnumString};

use crate::{
    frontend::ir::BlockIr,
    index::{Index, IndexVec, simple_index},
};

pub mod hints;
pub mod structure;

simple_index! {
    /// Position of a block in the function's block list.
    pub struct BlockIdx;
}

/// How block graphs become Rust statements.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase")]
pub enum ControlFlowStrategy {
    /// Loops, labeled blocks and `if`s recovered from the dominator tree.
    #[default]
    Structured,
    /// Every block as an unconditionally executed labeled scope.
    Linear,
}

#[derive(Debug)]
pub struct Cfg {
    ids: IndexVec<BlockIdx, i64>,
    index_of: HashMap<i64, BlockIdx>,
    entry: BlockIdx,
    succs: IndexVec<BlockIdx, Vec<BlockIdx>>,
    preds: IndexVec<BlockIdx, Vec<BlockIdx>>,
    rpo: Vec<BlockIdx>,
    rpo_number: IndexVec<BlockIdx, Option<usize>>,
    /// The entry block is its own immediate dominator here.
    doms: IndexVec<BlockIdx, Option<BlockIdx>>,
    loop_headers: HashSet<BlockIdx>,
    reducible: bool,
}

impl Cfg {
    /// Builds the graph. Successors naming unknown blocks are ignored; the
    /// IR is validated before this point.
    pub fn new(blocks: &[BlockIr]) -> Self {
        let ids: IndexVec<BlockIdx, i64> = IndexVec::from_raw(blocks.iter().map(|b| b.id).collect());
        let index_of: HashMap<i64, BlockIdx> = ids.enumerate().map(|(idx, id)| (*id, idx)).collect();
        let entry = index_of.get(&0).copied().unwrap_or(BlockIdx::new(0));

        let mut succs = IndexVec::from_elem_n(Vec::new(), blocks.len());
        let mut preds = IndexVec::from_elem_n(Vec::new(), blocks.len());
        for (idx, block) in blocks.iter().enumerate() {
            let from = BlockIdx::new(idx);
            for to in block.successors.iter().filter_map(|s| index_of.get(s)) {
                succs[from].push(*to);
                preds[*to].push(from);
            }
        }

        let mut cfg = Cfg {
            ids,
            index_of,
            entry,
            succs,
            preds,
            rpo: Vec::new(),
            rpo_number: IndexVec::from_elem_n(None, blocks.len()),
            doms: IndexVec::from_elem_n(None, blocks.len()),
            loop_headers: HashSet::new(),
            reducible: true,
        };
        if !blocks.is_empty() {
            cfg.compute_rpo();
            cfg.compute_dominators();
            cfg.classify_edges();
        }
        cfg
    }

    fn compute_rpo(&mut self) {
        let mut visited = IndexVec::from_elem_n(false, self.ids.len());
        let mut postorder = Vec::with_capacity(self.ids.len());
        // (block, next successor to visit)
        let mut stack = vec![(self.entry, 0usize)];
        visited[self.entry] = true;

        while let Some((block, next)) = stack.pop() {
            if let Some(&succ) = self.succs[block].get(next) {
                stack.push((block, next + 1));
                if !visited[succ] {
                    visited[succ] = true;
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(block);
            }
        }

        postorder.reverse();
        for (number, block) in postorder.iter().enumerate() {
            self.rpo_number[*block] = Some(number);
        }
        self.rpo = postorder;
    }

    /// Cooper, Harvey and Kennedy, "A Simple, Fast Dominance Algorithm".
    fn compute_dominators(&mut self) {
        self.doms[self.entry] = Some(self.entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in self.rpo.iter().skip(1) {
                let mut new_idom = None;
                for &pred in &self.preds[block] {
                    if self.doms[pred].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => self.intersect(pred, current),
                    });
                }
                if new_idom.is_some() && self.doms[block] != new_idom {
                    self.doms[block] = new_idom;
                    changed = true;
                }
            }
        }
    }

    fn intersect(&self, mut a: BlockIdx, mut b: BlockIdx) -> BlockIdx {
        let number = |x: BlockIdx| self.rpo_number[x].unwrap_or(usize::MAX);
        while a != b {
            while number(a) > number(b) {
                match self.doms[a] {
                    Some(up) => a = up,
                    None => return b,
                }
            }
            while number(b) > number(a) {
                match self.doms[b] {
                    Some(up) => b = up,
                    None => return a,
                }
            }
        }
        a
    }

    fn classify_edges(&mut self) {
        for &from in &self.rpo {
            for &to in &self.succs[from] {
                if !self.is_retreating(from, to) {
                    continue;
                }
                if self.dominates(to, from) {
                    self.loop_headers.insert(to);
                } else {
                    self.reducible = false;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn entry(&self) -> BlockIdx {
        self.entry
    }

    pub fn id(&self, block: BlockIdx) -> i64 {
        self.ids[block]
    }

    pub fn block_index(&self, id: i64) -> Option<BlockIdx> {
        self.index_of.get(&id).copied()
    }

    pub fn successors(&self, block: BlockIdx) -> &[BlockIdx] {
        &self.succs[block]
    }

    pub fn predecessors(&self, block: BlockIdx) -> &[BlockIdx] {
        &self.preds[block]
    }

    /// Reachable blocks in reverse postorder.
    pub fn reverse_postorder(&self) -> &[BlockIdx] {
        &self.rpo
    }

    pub fn rpo_number(&self, block: BlockIdx) -> Option<usize> {
        self.rpo_number[block]
    }

    pub fn is_reachable(&self, block: BlockIdx) -> bool {
        self.rpo_number[block].is_some()
    }

    pub fn immediate_dominator(&self, block: BlockIdx) -> Option<BlockIdx> {
        self.doms[block].filter(|_| block != self.entry)
    }

    pub fn dominates(&self, a: BlockIdx, b: BlockIdx) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.immediate_dominator(current) {
                Some(up) => current = up,
                None => return false,
            }
        }
    }

    /// An edge that does not go forward in reverse postorder.
    pub fn is_retreating(&self, from: BlockIdx, to: BlockIdx) -> bool {
        match (self.rpo_number[from], self.rpo_number[to]) {
            (Some(f), Some(t)) => t <= f,
            _ => false,
        }
    }

    pub fn is_back_edge(&self, from: BlockIdx, to: BlockIdx) -> bool {
        self.is_retreating(from, to) && self.dominates(to, from)
    }

    pub fn is_loop_header(&self, block: BlockIdx) -> bool {
        self.loop_headers.contains(&block)
    }

    /// Loop headers in reverse postorder.
    pub fn loop_headers(&self) -> Vec<BlockIdx> {
        self.rpo
            .iter()
            .copied()
            .filter(|b| self.is_loop_header(*b))
            .collect()
    }

    /// Whether every retreating edge targets a block dominating its source.
    pub fn is_reducible(&self) -> bool {
        self.reducible
    }

    /// A block entered by two or more forward edges.
    pub fn is_merge_node(&self, block: BlockIdx) -> bool {
        self.preds[block]
            .iter()
            .filter(|pred| self.is_reachable(**pred) && !self.is_retreating(**pred, block))
            .count()
            >= 2
    }

    /// Children in the dominator tree, in reverse postorder.
    pub fn dominator_children(&self, block: BlockIdx) -> Vec<BlockIdx> {
        self.rpo
            .iter()
            .copied()
            .filter(|child| self.immediate_dominator(*child) == Some(block))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Blocks `0..n` with the given successor lists.
    pub(crate) fn blocks(successors: &[&[i64]]) -> Vec<BlockIr> {
        successors
            .iter()
            .enumerate()
            .map(|(id, succs)| BlockIr {
                id: id as i64,
                instructions: Vec::new(),
                successors: succs.to_vec(),
                comment: None,
            })
            .collect()
    }

    fn idx(n: usize) -> BlockIdx {
        BlockIdx::new(n)
    }

    #[test]
    fn diamond_dominators() {
        // 0 -> {1, 2} -> 3
        let cfg = Cfg::new(&blocks(&[&[1, 2], &[3], &[3], &[]]));

        assert_eq!(cfg.immediate_dominator(idx(3)), Some(idx(0)));
        assert!(cfg.is_merge_node(idx(3)));
        assert!(!cfg.is_merge_node(idx(1)));
        assert!(cfg.is_reducible());
        assert!(cfg.loop_headers().is_empty());
        assert_eq!(cfg.dominator_children(idx(0)).len(), 3);
    }

    #[test]
    fn while_loop_header() {
        // 0 -> 1; 1 -> {2, 3}; 2 -> 1
        let cfg = Cfg::new(&blocks(&[&[1], &[2, 3], &[1], &[]]));

        assert_eq!(cfg.loop_headers(), vec![idx(1)]);
        assert!(cfg.is_back_edge(idx(2), idx(1)));
        assert!(!cfg.is_merge_node(idx(1)));
        assert!(cfg.is_reducible());
    }

    #[test]
    fn irreducible_graph() {
        // Two entries into the cycle 1 <-> 2.
        let cfg = Cfg::new(&blocks(&[&[1, 2], &[2], &[1, 3], &[]]));

        assert!(!cfg.is_reducible());
    }

    #[test]
    fn unreachable_blocks_are_ignored() {
        let cfg = Cfg::new(&blocks(&[&[], &[0]]));

        assert!(!cfg.is_reachable(idx(1)));
        assert_eq!(cfg.reverse_postorder(), &[idx(0)]);
    }

    #[test]
    fn strategy_names() {
        assert_eq!("linear".parse(), Ok(ControlFlowStrategy::Linear));
        assert_eq!(ControlFlowStrategy::Structured.to_string(), "structured");
    }
}
