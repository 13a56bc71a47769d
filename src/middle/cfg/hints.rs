//! Reconciling the frontend's syntax hints with the analyzed graph. Hints
//! only ever add annotations; they never change the recovered structure.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use tracing::debug;

use crate::frontend::ir::{HintIr, HintKind};

use super::{BlockIdx, Cfg};

#[derive(Debug, Default)]
pub struct HintAnnotations {
    loops: HashMap<BlockIdx, i64>,
}

impl HintAnnotations {
    /// Source position of the `for`/`range` statement heading this loop.
    pub fn loop_position(&self, header: BlockIdx) -> Option<i64> {
        self.loops.get(&header).copied()
    }
}

fn positions(hints: &BTreeMap<String, HintIr>, kind: HintKind) -> Vec<i64> {
    let mut positions: Vec<i64> = hints
        .values()
        .filter(|hint| hint.hint_kind() == Some(kind))
        .map(|hint| hint.lines.first().copied().unwrap_or_default())
        .collect();
    positions.sort_unstable();
    positions
}

pub fn reconcile(function: &str, hints: &BTreeMap<String, HintIr>, cfg: &Cfg) -> HintAnnotations {
    let mut annotations = HintAnnotations::default();
    if hints.is_empty() {
        return annotations;
    }

    let headers = cfg.loop_headers();
    let loops = positions(hints, HintKind::For);
    if loops.len() == headers.len() {
        annotations.loops = headers.into_iter().zip(loops).collect();
    } else {
        debug!(
            function,
            hinted = loops.len(),
            detected = headers.len(),
            "loop hints disagree with the block graph"
        );
    }

    let branches = positions(hints, HintKind::If).len() + positions(hints, HintKind::Switch).len();
    let two_way = cfg
        .reverse_postorder()
        .iter()
        .filter(|b| cfg.successors(**b).len() == 2)
        .count();
    if branches > two_way {
        debug!(
            function,
            hinted = branches,
            detected = two_way,
            "more branch hints than conditional blocks"
        );
    }

    annotations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{index::Index, middle::cfg::tests::blocks};

    fn hint(kind: &str, pos: i64) -> HintIr {
        HintIr {
            kind: kind.into(),
            lines: vec![pos],
            labels: Vec::new(),
        }
    }

    #[test]
    fn matching_loop_hints_annotate_headers() {
        // Two sequential loops headed by 1 and 3.
        let cfg = Cfg::new(&blocks(&[&[1], &[2, 3], &[1], &[4, 5], &[3], &[]]));
        let hints = BTreeMap::from([
            ("for_200".to_string(), hint("for", 200)),
            ("range_90".to_string(), hint("for", 90)),
            ("if_95".to_string(), hint("if", 95)),
        ]);

        let annotations = reconcile("f", &hints, &cfg);

        assert_eq!(annotations.loop_position(BlockIdx::new(1)), Some(90));
        assert_eq!(annotations.loop_position(BlockIdx::new(3)), Some(200));
    }

    #[test]
    fn mismatched_hints_are_ignored() {
        let cfg = Cfg::new(&blocks(&[&[1], &[2, 3], &[1], &[]]));
        let hints = BTreeMap::from([
            ("for_1".to_string(), hint("for", 1)),
            ("for_2".to_string(), hint("for", 2)),
        ]);

        let annotations = reconcile("f", &hints, &cfg);

        assert_eq!(annotations.loop_position(BlockIdx::new(1)), None);
    }
}
