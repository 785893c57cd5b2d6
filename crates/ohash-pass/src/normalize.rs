//! Turning arbitrary runtime values into the `i64` the combiners consume.

use ohash_core::ir::{CastOp, Operand};
use ohash_core::types::Type;

use crate::builder::SiteBuilder;
use crate::error::{PassError, Result};

/// How a value of a given type reaches `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Already `i64`; used as is.
    Identity,
    /// Narrower integer, zero-extended.
    ZeroExtend,
    /// Floating point, truncated towards zero into a signed integer.
    FloatToInt,
    /// Pointers are never hashed.
    Declined,
}

pub fn classify(ty: &Type) -> Result<Normalization> {
    match ty {
        Type::Int(64) => Ok(Normalization::Identity),
        Type::Int(bits) if *bits < 64 => Ok(Normalization::ZeroExtend),
        Type::Float(_) => Ok(Normalization::FloatToInt),
        t if t.is_ptr_or_ptr_vector() => Ok(Normalization::Declined),
        other => Err(PassError::UnsupportedType(other.clone())),
    }
}

/// Emit whatever conversion `ty` needs. `Ok(None)` means declined.
pub fn normalize(b: &mut SiteBuilder<'_>, value: Operand, ty: &Type) -> Result<Option<Operand>> {
    Ok(match classify(ty)? {
        Normalization::Identity => Some(value),
        Normalization::ZeroExtend => Some(b.cast(CastOp::ZExt, value, Type::I64)),
        Normalization::FloatToInt => Some(b.cast(CastOp::FpToSi, value, Type::I64)),
        Normalization::Declined => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ohash_core::id::{InstId, InstIdAllocator};
    use ohash_core::ir::InstKind;

    #[test]
    fn classifies_scalar_types() {
        assert_eq!(classify(&Type::I64).unwrap(), Normalization::Identity);
        assert_eq!(classify(&Type::I1).unwrap(), Normalization::ZeroExtend);
        assert_eq!(classify(&Type::Float(32)).unwrap(), Normalization::FloatToInt);
        assert_eq!(classify(&Type::Ptr).unwrap(), Normalization::Declined);
        let ptr_vec = Type::Vector {
            elem: Box::new(Type::Ptr),
            lanes: 4,
        };
        assert_eq!(classify(&ptr_vec).unwrap(), Normalization::Declined);
    }

    #[test]
    fn aggregates_are_an_invariant_violation() {
        let int_vec = Type::Vector {
            elem: Box::new(Type::I32),
            lanes: 4,
        };
        assert!(matches!(classify(&int_vec), Err(PassError::UnsupportedType(_))));
        assert!(classify(&Type::Void).is_err());
        assert!(classify(&Type::Int(128)).is_err());
    }

    #[test]
    fn i64_needs_no_instruction() {
        let mut ids = InstIdAllocator::starting_at(10);
        let mut b = SiteBuilder::new(&mut ids);
        let v = Operand::Inst(InstId::new(1));
        assert_eq!(normalize(&mut b, v.clone(), &Type::I64).unwrap(), Some(v));
        assert!(b.is_empty());
    }

    #[test]
    fn float_is_truncated() {
        let mut ids = InstIdAllocator::starting_at(10);
        let mut b = SiteBuilder::new(&mut ids);
        let out = normalize(&mut b, Operand::Arg(0), &Type::F64).unwrap();
        assert_eq!(out, Some(Operand::Inst(InstId::new(10))));
        let insts = b.finish();
        assert_eq!(insts.len(), 1);
        assert_eq!(insts[0].ty, Type::I64);
        assert!(matches!(
            insts[0].kind,
            InstKind::Cast {
                op: CastOp::FpToSi,
                ..
            }
        ));
    }

    #[test]
    fn pointers_emit_nothing() {
        let mut ids = InstIdAllocator::starting_at(0);
        let mut b = SiteBuilder::new(&mut ids);
        assert_eq!(normalize(&mut b, Operand::Null, &Type::Ptr).unwrap(), None);
        assert!(b.is_empty());
    }
}
