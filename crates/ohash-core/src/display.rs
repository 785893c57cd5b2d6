//! LLVM-flavoured textual rendering of modules, for CLI output and debugging.

use std::fmt;

use crate::ir::{Callee, ConstValue, Function, InstKind, Instruction, Module, Operand};

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Inst(id) => write!(f, "{id}"),
            Operand::Arg(i) => write!(f, "%arg{i}"),
            Operand::Const(c) => match c.value {
                ConstValue::Int(v) => write!(f, "{} {v}", c.ty),
                ConstValue::Float(v) => write!(f, "{} {v:?}", c.ty),
            },
            Operand::Global(g) => write!(f, "{g}"),
            Operand::Null => write!(f, "null"),
        }
    }
}

fn join<T: fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.ty.is_void() {
            write!(f, "{} = ", self.id)?;
        }
        match &self.kind {
            InstKind::Compare {
                predicate,
                lhs,
                rhs,
            } => {
                let kw = if predicate.is_float() { "fcmp" } else { "icmp" };
                write!(f, "{kw} {} {lhs}, {rhs}", predicate.mnemonic())
            }
            InstKind::Return { value: Some(v) } => write!(f, "ret {v}"),
            InstKind::Return { value: None } => write!(f, "ret void"),
            InstKind::Load { ptr } => write!(f, "load {}, {ptr}", self.ty),
            InstKind::Store { value, ptr } => write!(f, "store {value}, {ptr}"),
            InstKind::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {lhs}, {rhs}", format!("{op:?}").to_lowercase(), self.ty)
            }
            InstKind::AtomicRmw { op, ptr, value } => {
                write!(f, "atomicrmw {} {ptr}, {value}", format!("{op:?}").to_lowercase())
            }
            InstKind::Call { callee, args } => {
                let target = match callee {
                    Callee::Direct(name) => format!("@{name}"),
                    Callee::Indirect(op) => op.to_string(),
                };
                write!(f, "call {} {target}({})", self.ty, join(args))
            }
            InstKind::Phi { incoming } => write!(
                f,
                "phi {} {}",
                self.ty,
                join(incoming.iter().map(|i| format!("[ {}, {} ]", i.value, i.block)))
            ),
            InstKind::Cast { op, value } => write!(
                f,
                "{} {value} to {}",
                format!("{op:?}").to_lowercase(),
                self.ty
            ),
            InstKind::Branch { cond: None, targets } => write!(f, "br {}", join(targets)),
            InstKind::Branch {
                cond: Some(c),
                targets,
            } => write!(f, "br {c}, {}", join(targets)),
            InstKind::Switch {
                value,
                default,
                cases,
            } => write!(
                f,
                "switch {value}, {default} [{}]",
                join(cases.iter().map(|c| format!("{}: {}", c.value, c.target)))
            ),
            InstKind::Alloca { allocated } => write!(f, "alloca {allocated}"),
            InstKind::Unreachable => write!(f, "unreachable"),
            InstKind::Other { opcode, operands } => write!(f, "{opcode} {}", join(operands)),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kw = if self.is_declaration() { "declare" } else { "define" };
        write!(f, "{kw} {} @{}({})", self.ret, self.name, join(&self.params))?;
        if self.is_declaration() {
            return writeln!(f);
        }
        writeln!(f, " {{")?;
        for b in &self.blocks {
            match &b.label {
                Some(label) => writeln!(f, "{}:  ; {label}", b.id)?,
                None => writeln!(f, "{}:", b.id)?,
            }
            for inst in &b.insts {
                writeln!(f, "  {inst}")?;
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        for g in &self.globals {
            let init = match g.initializer.value {
                ConstValue::Int(v) => v.to_string(),
                ConstValue::Float(v) => format!("{v:?}"),
            };
            writeln!(f, "{} = @{} global {} {init}", g.id, g.name, g.ty)?;
        }
        for func in &self.functions {
            writeln!(f)?;
            write!(f, "{func}")?;
        }
        Ok(())
    }
}
