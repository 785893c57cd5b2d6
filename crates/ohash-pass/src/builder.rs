//! Collects new instructions for one insertion point.

use ohash_core::id::InstIdAllocator;
use ohash_core::ir::{BinaryOp, Callee, CastOp, InstKind, Instruction, Operand};
use ohash_core::types::Type;

pub struct SiteBuilder<'a> {
    ids: &'a mut InstIdAllocator,
    insts: Vec<Instruction>,
}

impl<'a> SiteBuilder<'a> {
    pub fn new(ids: &'a mut InstIdAllocator) -> Self {
        Self { ids, insts: vec![] }
    }

    fn push(&mut self, ty: Type, kind: InstKind) -> Operand {
        let id = self.ids.fresh();
        self.insts.push(Instruction::new(id, ty, kind));
        Operand::Inst(id)
    }

    pub fn cast(&mut self, op: CastOp, value: Operand, to: Type) -> Operand {
        self.push(to, InstKind::Cast { op, value })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Operand, rhs: Operand, ty: Type) -> Operand {
        self.push(ty, InstKind::Binary { op, lhs, rhs })
    }

    /// Call to a `void` function.
    pub fn call(&mut self, callee: &str, args: Vec<Operand>) {
        self.push(
            Type::Void,
            InstKind::Call {
                callee: Callee::Direct(callee.to_string()),
                args,
            },
        );
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn finish(self) -> Vec<Instruction> {
        self.insts
    }
}
