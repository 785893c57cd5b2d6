//! Natural-loop detection over a function's CFG.
//!
//! Used when analysis facts do not list loops explicitly. A back edge `n → h`
//! exists when `h` dominates `n`; the loop body is `h` plus every block that
//! reaches `n` without passing through `h`. Back edges sharing a header are
//! merged into one loop.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ohash_core::id::BlockId;
use ohash_core::ir::Function;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loop {
    pub header: BlockId,
    pub blocks: BTreeSet<BlockId>,
}

impl Loop {
    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.contains(&block)
    }
}

/// All loops of one function, with the innermost loop of each block.
#[derive(Debug, Clone, Default)]
pub struct LoopForest {
    loops: Vec<Loop>,
    innermost: HashMap<BlockId, usize>,
}

impl LoopForest {
    pub fn from_loops(loops: Vec<Loop>) -> Self {
        let mut innermost: HashMap<BlockId, usize> = HashMap::new();
        for (idx, l) in loops.iter().enumerate() {
            for b in &l.blocks {
                let entry = innermost.entry(*b).or_insert(idx);
                if loops[*entry].blocks.len() > l.blocks.len() {
                    *entry = idx;
                }
            }
        }
        Self { loops, innermost }
    }

    pub fn compute(func: &Function) -> Self {
        let n = func.blocks.len();
        let index: HashMap<BlockId, usize> =
            func.blocks.iter().enumerate().map(|(i, b)| (b.id, i)).collect();

        let mut succs: Vec<Vec<usize>> = vec![vec![]; n];
        let mut preds: Vec<Vec<usize>> = vec![vec![]; n];
        for (i, b) in func.blocks.iter().enumerate() {
            for s in b.successors() {
                if let Some(&j) = index.get(&s) {
                    succs[i].push(j);
                    preds[j].push(i);
                }
            }
        }

        let reachable = reachable_from_entry(&succs);
        let dom = dominators(&preds, &reachable);

        // header -> body
        let mut bodies: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for u in (0..n).filter(|&u| reachable[u]) {
            for &h in &succs[u] {
                if !dom[u][h] {
                    continue;
                }
                let body = bodies.entry(h).or_insert_with(|| BTreeSet::from([h]));
                let mut stack = vec![u];
                while let Some(x) = stack.pop() {
                    if body.insert(x) {
                        stack.extend(preds[x].iter().copied().filter(|&p| reachable[p]));
                    }
                }
            }
        }

        let loops = bodies
            .into_iter()
            .map(|(h, body)| Loop {
                header: func.blocks[h].id,
                blocks: body.into_iter().map(|i| func.blocks[i].id).collect(),
            })
            .collect();
        Self::from_loops(loops)
    }

    /// Innermost loop containing `block`, if any.
    pub fn loop_for(&self, block: BlockId) -> Option<&Loop> {
        self.innermost.get(&block).map(|&i| &self.loops[i])
    }

    /// Number of loops that contain `block`.
    pub fn depth(&self, block: BlockId) -> usize {
        self.loops.iter().filter(|l| l.contains(block)).count()
    }

    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }
}

fn reachable_from_entry(succs: &[Vec<usize>]) -> Vec<bool> {
    let mut seen = vec![false; succs.len()];
    if succs.is_empty() {
        return seen;
    }
    let mut stack = vec![0usize];
    while let Some(x) = stack.pop() {
        if !seen[x] {
            seen[x] = true;
            stack.extend(succs[x].iter().copied());
        }
    }
    seen
}

/// Iterative dominator sets; `dom[i][k]` means block `k` dominates block `i`.
fn dominators(preds: &[Vec<usize>], reachable: &[bool]) -> Vec<Vec<bool>> {
    let n = preds.len();
    let only = |i: usize| (0..n).map(|k| k == i).collect::<Vec<bool>>();
    let mut dom: Vec<Vec<bool>> = (0..n)
        .map(|i| if i == 0 || !reachable[i] { only(i) } else { vec![true; n] })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for i in 1..n {
            if !reachable[i] {
                continue;
            }
            let mut next = vec![true; n];
            for &p in preds[i].iter().filter(|&&p| reachable[p]) {
                for k in 0..n {
                    next[k] &= dom[p][k];
                }
            }
            next[i] = true;
            if next != dom[i] {
                dom[i] = next;
                changed = true;
            }
        }
    }
    dom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::assert_well_nested;
    use ohash_core::id::InstId;
    use ohash_core::ir::{Block, InstKind, Instruction, Operand};
    use ohash_core::types::Type;

    fn br(id: u64, targets: &[u64]) -> Instruction {
        let cond = (targets.len() > 1).then(|| Operand::const_int(1, 1));
        Instruction::new(
            InstId::new(id),
            Type::Void,
            InstKind::Branch {
                cond,
                targets: targets.iter().map(|&t| BlockId::new(t)).collect(),
            },
        )
    }

    fn ret(id: u64) -> Instruction {
        Instruction::new(InstId::new(id), Type::Void, InstKind::Return { value: None })
    }

    fn func(blocks: Vec<(u64, Instruction)>) -> Function {
        Function {
            name: "f".into(),
            params: vec![],
            ret: Type::Void,
            blocks: blocks
                .into_iter()
                .map(|(id, t)| Block::new(BlockId::new(id), vec![t]))
                .collect(),
        }
    }

    #[test]
    fn straight_line_has_no_loops() {
        let f = func(vec![(0, br(0, &[1])), (1, ret(1))]);
        let forest = LoopForest::compute(&f);
        assert!(forest.is_empty());
        assert!(forest.loop_for(BlockId::new(0)).is_none());
    }

    #[test]
    fn simple_loop_is_detected() {
        // 0 -> 1 -> 2 -> 1, 1 -> 3
        let f = func(vec![
            (0, br(0, &[1])),
            (1, br(1, &[2, 3])),
            (2, br(2, &[1])),
            (3, ret(3)),
        ]);
        let forest = LoopForest::compute(&f);
        assert_eq!(forest.loops().len(), 1);
        let l = forest.loop_for(BlockId::new(2)).unwrap();
        assert_eq!(l.header, BlockId::new(1));
        assert_eq!(l.blocks, BTreeSet::from([BlockId::new(1), BlockId::new(2)]));
        assert!(forest.loop_for(BlockId::new(3)).is_none());
        assert!(forest.loop_for(BlockId::new(0)).is_none());
    }

    #[test]
    fn nested_loops_pick_innermost() {
        // 0 -> 1 -> 2 -> 3 -> 2 ; 3 -> 4 -> 1 ; 1 -> 5
        let f = func(vec![
            (0, br(0, &[1])),
            (1, br(1, &[2, 5])),
            (2, br(2, &[3])),
            (3, br(3, &[2, 4])),
            (4, br(4, &[1])),
            (5, ret(5)),
        ]);
        let forest = LoopForest::compute(&f);
        assert_well_nested(&forest);
        assert_eq!(forest.loops().len(), 2);
        assert_eq!(forest.loop_for(BlockId::new(3)).unwrap().header, BlockId::new(2));
        assert_eq!(forest.loop_for(BlockId::new(4)).unwrap().header, BlockId::new(1));
        assert_eq!(forest.depth(BlockId::new(3)), 2);
    }

    #[test]
    fn self_loop_and_unreachable_blocks() {
        let f = func(vec![(0, br(0, &[0, 1])), (1, ret(1)), (2, br(2, &[2]))]);
        let forest = LoopForest::compute(&f);
        assert_eq!(forest.loops().len(), 1);
        assert_eq!(forest.loop_for(BlockId::new(0)).unwrap().header, BlockId::new(0));
        assert!(forest.loop_for(BlockId::new(2)).is_none());
    }
}
