//! Which values get folded, at which instructions, on which side.
//!
//! | kind                | value folded                               | side   |
//! |---------------------|--------------------------------------------|--------|
//! | compare             | `64 * (zext(result) + 1) + predicate` (i8) | after  |
//! | return with value   | returned value                             | before |
//! | load                | loaded value                               | after  |
//! | store               | stored value                               | after  |
//! | integer `add`       | sum                                        | after  |
//!
//! Everything else is left alone, `fadd` and atomic read-modify-write
//! included.
//! Pointer-typed values are declined by normalization.

use std::collections::HashMap;

use ohash_core::id::InstId;
use ohash_core::ir::{BinaryOp, CastOp, Function, InstKind, Instruction, Operand, Predicate};
use ohash_core::types::Type;

use crate::builder::SiteBuilder;
use crate::context::InstrumentationContext;
use crate::error::{PassError, Result};
use crate::worklist::{Insertion, Placement};

pub const COMPARISON_SCALE: i64 = 64;
pub const COMPARISON_BIAS: i64 = 1;

/// Value a comparison contributes to its accumulator, as the runtime sees it.
pub fn comparison_code(result: bool, predicate: Predicate) -> u8 {
    let scaled = (COMPARISON_SCALE as u8).wrapping_mul(result as u8 + COMPARISON_BIAS as u8);
    scaled.wrapping_add(predicate.code())
}

#[derive(Debug, Clone, PartialEq)]
pub enum FoldValue {
    /// Boolean result packed with its predicate code.
    Comparison { result: Operand, predicate: Predicate },
    Value { value: Operand, ty: Type },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoldPlan {
    pub value: FoldValue,
    pub placement: Placement,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstrumentationPolicy;

impl InstrumentationPolicy {
    /// Decide what, if anything, `inst` contributes. Emits nothing.
    pub fn plan(
        &self,
        func: &Function,
        results: &HashMap<InstId, Type>,
        inst: &Instruction,
    ) -> Result<Option<FoldPlan>> {
        let own = || FoldValue::Value {
            value: Operand::Inst(inst.id),
            ty: inst.ty.clone(),
        };
        let plan = match &inst.kind {
            InstKind::Compare { predicate, .. } => FoldPlan {
                value: FoldValue::Comparison {
                    result: Operand::Inst(inst.id),
                    predicate: *predicate,
                },
                placement: Placement::After,
            },
            InstKind::Return { value: Some(v) } => FoldPlan {
                value: FoldValue::Value {
                    value: v.clone(),
                    ty: operand_type(func, results, v)?,
                },
                placement: Placement::Before,
            },
            InstKind::Load { .. } => FoldPlan {
                value: own(),
                placement: Placement::After,
            },
            InstKind::Store { value, .. } => FoldPlan {
                value: FoldValue::Value {
                    value: value.clone(),
                    ty: operand_type(func, results, value)?,
                },
                placement: Placement::After,
            },
            InstKind::Binary { op: BinaryOp::Add, .. } => FoldPlan {
                value: own(),
                placement: Placement::After,
            },
            InstKind::Return { value: None }
            | InstKind::Binary { .. }
            | InstKind::AtomicRmw { .. }
            | InstKind::Call { .. }
            | InstKind::Phi { .. }
            | InstKind::Cast { .. }
            | InstKind::Branch { .. }
            | InstKind::Switch { .. }
            | InstKind::Alloca { .. }
            | InstKind::Unreachable
            | InstKind::Other { .. } => return Ok(None),
        };
        Ok(Some(plan))
    }

    /// Plan and emit the fold for `inst`. `None` when nothing applies or the
    /// value was declined.
    pub fn instrument(
        &self,
        ctx: &mut InstrumentationContext<'_>,
        func: &Function,
        results: &HashMap<InstId, Type>,
        inst: &Instruction,
    ) -> Result<Option<Insertion>> {
        let Some(plan) = self.plan(func, results, inst)? else {
            return Ok(None);
        };

        let mut b = SiteBuilder::new(&mut ctx.inst_ids);
        let (value, ty) = match plan.value {
            FoldValue::Comparison { result, predicate } => {
                if inst.ty != Type::I1 {
                    return Err(PassError::UnsupportedType(inst.ty.clone()));
                }
                (encode_comparison(&mut b, result, predicate), Type::I8)
            }
            FoldValue::Value { value, ty } => (value, ty),
        };

        match ctx.selector.fold(&mut *ctx.rng, &mut b, value, &ty)? {
            Some(_) => {
                ctx.stats.folds += 1;
                Ok(Some(Insertion {
                    placement: plan.placement,
                    insts: b.finish(),
                }))
            }
            None => {
                ctx.stats.declined += 1;
                Ok(None)
            }
        }
    }
}

fn operand_type(func: &Function, results: &HashMap<InstId, Type>, op: &Operand) -> Result<Type> {
    func.operand_type(results, op).ok_or_else(|| {
        PassError::Invariant(format!("operand {op} in '{}' has no known type", func.name))
    })
}

/// `64 * (zext(result) + 1) + predicate`, in `i8`.
fn encode_comparison(b: &mut SiteBuilder<'_>, result: Operand, predicate: Predicate) -> Operand {
    let ext = b.cast(CastOp::ZExt, result, Type::I8);
    let biased = b.binary(
        BinaryOp::Add,
        ext,
        Operand::const_int(8, COMPARISON_BIAS),
        Type::I8,
    );
    let scaled = b.binary(
        BinaryOp::Mul,
        Operand::const_int(8, COMPARISON_SCALE),
        biased,
        Type::I8,
    );
    b.binary(
        BinaryOp::Add,
        scaled,
        Operand::const_int(8, predicate.code() as i64),
        Type::I8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ohash_core::id::BlockId;
    use ohash_core::ir::{Block, RmwOp};

    fn inst(id: u64, ty: Type, kind: InstKind) -> Instruction {
        Instruction::new(InstId::new(id), ty, kind)
    }

    fn func(insts: Vec<Instruction>) -> Function {
        Function {
            name: "f".into(),
            params: vec![Type::Ptr, Type::F64],
            ret: Type::I32,
            blocks: vec![Block::new(BlockId::new(0), insts)],
        }
    }

    #[test]
    fn comparison_codes_distinguish_outcome_and_predicate() {
        assert_eq!(comparison_code(false, Predicate::Slt), 64 + 40);
        assert_eq!(comparison_code(true, Predicate::Slt), 128 + 40);
        assert_eq!(comparison_code(true, Predicate::Ne), 128 + 33);
        assert_ne!(
            comparison_code(true, Predicate::Ult),
            comparison_code(false, Predicate::Ult)
        );
    }

    #[test]
    fn decision_table() {
        let load = inst(0, Type::I32, InstKind::Load { ptr: Operand::Arg(0) });
        let store = inst(
            1,
            Type::Void,
            InstKind::Store {
                value: Operand::Arg(1),
                ptr: Operand::Arg(0),
            },
        );
        let add = inst(
            2,
            Type::I32,
            InstKind::Binary {
                op: BinaryOp::Add,
                lhs: Operand::Inst(InstId::new(0)),
                rhs: Operand::const_int(32, 1),
            },
        );
        let sub = inst(
            3,
            Type::I32,
            InstKind::Binary {
                op: BinaryOp::Sub,
                lhs: Operand::Inst(InstId::new(2)),
                rhs: Operand::const_int(32, 1),
            },
        );
        let rmw = inst(
            4,
            Type::I32,
            InstKind::AtomicRmw {
                op: RmwOp::Add,
                ptr: Operand::Arg(0),
                value: Operand::const_int(32, 1),
            },
        );
        let fadd = inst(
            5,
            Type::F64,
            InstKind::Binary {
                op: BinaryOp::FAdd,
                lhs: Operand::Arg(1),
                rhs: Operand::Arg(1),
            },
        );
        let ret = inst(
            6,
            Type::Void,
            InstKind::Return {
                value: Some(Operand::Inst(InstId::new(3))),
            },
        );
        let f = func(vec![load, store, add, sub, rmw, fadd, ret]);
        let results = f.result_types();
        let policy = InstrumentationPolicy;
        let plans: Vec<Option<FoldPlan>> = f.blocks[0]
            .insts
            .iter()
            .map(|i| policy.plan(&f, &results, i).unwrap())
            .collect();

        assert_eq!(plans[0].as_ref().unwrap().placement, Placement::After);
        assert_eq!(
            plans[1].as_ref().unwrap().value,
            FoldValue::Value {
                value: Operand::Arg(1),
                ty: Type::F64
            }
        );
        assert!(plans[2].is_some());
        assert!(plans[3].is_none());
        assert!(plans[4].is_none());
        assert!(plans[5].is_none());
        let ret_plan = plans[6].as_ref().unwrap();
        assert_eq!(ret_plan.placement, Placement::Before);
        assert_eq!(
            ret_plan.value,
            FoldValue::Value {
                value: Operand::Inst(InstId::new(3)),
                ty: Type::I32
            }
        );
    }
}
