//! Pending insertions, collected during a read-only traversal and applied after.

use std::collections::{BTreeMap, HashMap};

use ohash_core::ir::{Function, Instruction};
use serde::Serialize;

use crate::error::{PassError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Before,
    After,
}

/// New instructions for one side of one original instruction.
#[derive(Debug, Clone)]
pub struct Insertion {
    pub placement: Placement,
    pub insts: Vec<Instruction>,
}

#[derive(Debug, Clone)]
pub struct Edit {
    /// Block index within the function.
    pub block: usize,
    /// Index of the original instruction within the block.
    pub anchor: usize,
    pub insertion: Insertion,
}

/// Apply `edits` to `func`. Several edits at the same anchor and placement keep
/// their relative order. Returns the number of instructions inserted.
pub fn apply_edits(func: &mut Function, edits: Vec<Edit>) -> Result<usize> {
    let mut by_block: BTreeMap<usize, Vec<Edit>> = BTreeMap::new();
    for e in edits {
        by_block.entry(e.block).or_default().push(e);
    }

    let mut inserted = 0;
    for (bi, block_edits) in by_block {
        let block = func.blocks.get_mut(bi).ok_or_else(|| {
            PassError::Invariant(format!("edit targets block index {bi} of '{}'", func.name))
        })?;

        let mut before: HashMap<usize, Vec<Instruction>> = HashMap::new();
        let mut after: HashMap<usize, Vec<Instruction>> = HashMap::new();
        for e in block_edits {
            if e.anchor >= block.insts.len() {
                return Err(PassError::Invariant(format!(
                    "edit anchor {} past end of block {}",
                    e.anchor, block.id
                )));
            }
            inserted += e.insertion.insts.len();
            let side = match e.insertion.placement {
                Placement::Before => &mut before,
                Placement::After => &mut after,
            };
            side.entry(e.anchor).or_default().extend(e.insertion.insts);
        }

        let original = std::mem::take(&mut block.insts);
        let mut out = Vec::with_capacity(original.len() + inserted);
        for (i, inst) in original.into_iter().enumerate() {
            if let Some(pre) = before.remove(&i) {
                out.extend(pre);
            }
            out.push(inst);
            if let Some(post) = after.remove(&i) {
                out.extend(post);
            }
        }
        block.insts = out;
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ohash_core::id::{BlockId, InstId};
    use ohash_core::ir::{Block, InstKind};
    use ohash_core::types::Type;

    fn other(id: u64) -> Instruction {
        Instruction::new(
            InstId::new(id),
            Type::Void,
            InstKind::Other {
                opcode: "nop".into(),
                operands: vec![],
            },
        )
    }

    fn edit(anchor: usize, placement: Placement, ids: &[u64]) -> Edit {
        Edit {
            block: 0,
            anchor,
            insertion: Insertion {
                placement,
                insts: ids.iter().map(|&i| other(i)).collect(),
            },
        }
    }

    #[test]
    fn inserts_around_anchors_in_order() {
        let mut f = Function {
            name: "f".into(),
            params: vec![],
            ret: Type::Void,
            blocks: vec![Block::new(BlockId::new(0), vec![other(0), other(1)])],
        };
        let n = apply_edits(
            &mut f,
            vec![
                edit(0, Placement::After, &[10]),
                edit(1, Placement::Before, &[11]),
                edit(1, Placement::Before, &[12]),
                edit(1, Placement::After, &[13]),
            ],
        )
        .unwrap();
        assert_eq!(n, 4);
        let ids: Vec<u64> = f.blocks[0].insts.iter().map(|i| i.id.get()).collect();
        assert_eq!(ids, vec![0, 10, 11, 12, 1, 13]);
    }

    #[test]
    fn rejects_out_of_range_anchor() {
        let mut f = Function {
            name: "f".into(),
            params: vec![],
            ret: Type::Void,
            blocks: vec![Block::new(BlockId::new(0), vec![other(0)])],
        };
        assert!(apply_edits(&mut f, vec![edit(5, Placement::Before, &[1])]).is_err());
    }
}
