//! Program representation: modules → functions → blocks → instructions.
//!
//! The instrumenter only ever *appends* instructions to this representation;
//! it never rewrites operands, removes instructions, or changes control edges.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::{BlockId, GlobalId, InstId, InstIdAllocator};
use crate::types::Type;

/// Prefix marking compiler intrinsics.
pub const INTRINSIC_PREFIX: &str = "llvm.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstValue {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub ty: Type,
    pub value: ConstValue,
}

impl Constant {
    pub fn int(bits: u32, v: i64) -> Self {
        Self {
            ty: Type::Int(bits),
            value: ConstValue::Int(v),
        }
    }

    pub fn float(bits: u32, v: f64) -> Self {
        Self {
            ty: Type::Float(bits),
            value: ConstValue::Float(v),
        }
    }
}

/// Anything an instruction can consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Inst(InstId),
    Arg(u32),
    Const(Constant),
    Global(GlobalId),
    Null,
}

impl Operand {
    pub fn const_int(bits: u32, v: i64) -> Self {
        Operand::Const(Constant::int(bits, v))
    }
}

/// Relational predicates with their conventional numeric codes
/// (float predicates 0..=15, integer predicates 32..=41).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    FcmpFalse,
    FcmpOeq,
    FcmpOgt,
    FcmpOge,
    FcmpOlt,
    FcmpOle,
    FcmpOne,
    FcmpOrd,
    FcmpUno,
    FcmpUeq,
    FcmpUgt,
    FcmpUge,
    FcmpUlt,
    FcmpUle,
    FcmpUne,
    FcmpTrue,
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl Predicate {
    pub fn code(self) -> u8 {
        use Predicate::*;
        match self {
            FcmpFalse => 0,
            FcmpOeq => 1,
            FcmpOgt => 2,
            FcmpOge => 3,
            FcmpOlt => 4,
            FcmpOle => 5,
            FcmpOne => 6,
            FcmpOrd => 7,
            FcmpUno => 8,
            FcmpUeq => 9,
            FcmpUgt => 10,
            FcmpUge => 11,
            FcmpUlt => 12,
            FcmpUle => 13,
            FcmpUne => 14,
            FcmpTrue => 15,
            Eq => 32,
            Ne => 33,
            Ugt => 34,
            Uge => 35,
            Ult => 36,
            Ule => 37,
            Sgt => 38,
            Sge => 39,
            Slt => 40,
            Sle => 41,
        }
    }

    pub fn is_float(self) -> bool {
        self.code() < 32
    }

    pub fn mnemonic(self) -> &'static str {
        use Predicate::*;
        match self {
            FcmpFalse => "false",
            FcmpOeq => "oeq",
            FcmpOgt => "ogt",
            FcmpOge => "oge",
            FcmpOlt => "olt",
            FcmpOle => "ole",
            FcmpOne => "one",
            FcmpOrd => "ord",
            FcmpUno => "uno",
            FcmpUeq => "ueq",
            FcmpUgt => "ugt",
            FcmpUge => "uge",
            FcmpUlt => "ult",
            FcmpUle => "ule",
            FcmpUne => "une",
            FcmpTrue => "true",
            Eq => "eq",
            Ne => "ne",
            Ugt => "ugt",
            Uge => "uge",
            Ult => "ult",
            Ule => "ule",
            Sgt => "sgt",
            Sge => "sge",
            Slt => "slt",
            Sle => "sle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastOp {
    ZExt,
    SExt,
    Trunc,
    BitCast,
    FpToSi,
    SiToFp,
    PtrToInt,
    IntToPtr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmwOp {
    Xchg,
    Add,
    Sub,
    And,
    Or,
    Xor,
    Max,
    Min,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Callee {
    Direct(String),
    Indirect(Operand),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhiIncoming {
    pub value: Operand,
    pub block: BlockId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: i64,
    pub target: BlockId,
}

/// Closed set of instruction kinds. Passes match on this exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InstKind {
    Compare {
        predicate: Predicate,
        lhs: Operand,
        rhs: Operand,
    },
    Return {
        #[serde(default)]
        value: Option<Operand>,
    },
    Load {
        ptr: Operand,
    },
    Store {
        value: Operand,
        ptr: Operand,
    },
    Binary {
        #[serde(rename = "binop")]
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    AtomicRmw {
        #[serde(rename = "rmw")]
        op: RmwOp,
        ptr: Operand,
        value: Operand,
    },
    Call {
        callee: Callee,
        #[serde(default)]
        args: Vec<Operand>,
    },
    Phi {
        incoming: Vec<PhiIncoming>,
    },
    Cast {
        #[serde(rename = "cast")]
        op: CastOp,
        value: Operand,
    },
    Branch {
        #[serde(default)]
        cond: Option<Operand>,
        targets: Vec<BlockId>,
    },
    Switch {
        value: Operand,
        default: BlockId,
        #[serde(default)]
        cases: Vec<SwitchCase>,
    },
    Alloca {
        allocated: Type,
    },
    Unreachable,
    Other {
        opcode: String,
        #[serde(default)]
        operands: Vec<Operand>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: InstId,
    /// Result type; `void` when the instruction produces no value.
    #[serde(default)]
    pub ty: Type,
    #[serde(flatten)]
    pub kind: InstKind,
}

impl Instruction {
    pub fn new(id: InstId, ty: Type, kind: InstKind) -> Self {
        Self { id, ty, kind }
    }

    /// The produced value, if any.
    pub fn result(&self) -> Option<Operand> {
        if self.ty.is_void() {
            None
        } else {
            Some(Operand::Inst(self.id))
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            InstKind::Return { .. }
                | InstKind::Branch { .. }
                | InstKind::Switch { .. }
                | InstKind::Unreachable
        )
    }

    /// Name of the directly called function, for `call` instructions.
    pub fn called_function(&self) -> Option<&str> {
        match &self.kind {
            InstKind::Call {
                callee: Callee::Direct(name),
                ..
            } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn operands(&self) -> Vec<&Operand> {
        use InstKind::*;
        match &self.kind {
            Compare { lhs, rhs, .. } | Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Return { value } => value.iter().collect(),
            Load { ptr } => vec![ptr],
            Store { value, ptr } | AtomicRmw { ptr, value, .. } => vec![value, ptr],
            Call { callee, args } => {
                let mut ops: Vec<&Operand> = Vec::with_capacity(args.len() + 1);
                if let Callee::Indirect(target) = callee {
                    ops.push(target);
                }
                ops.extend(args.iter());
                ops
            }
            Phi { incoming } => incoming.iter().map(|i| &i.value).collect(),
            Cast { value, .. } => vec![value],
            Branch { cond, .. } => cond.iter().collect(),
            Switch { value, .. } => vec![value],
            Alloca { .. } | Unreachable => vec![],
            Other { operands, .. } => operands.iter().collect(),
        }
    }

    /// Control-flow successors named by this instruction.
    pub fn successors(&self) -> Vec<BlockId> {
        match &self.kind {
            InstKind::Branch { targets, .. } => targets.clone(),
            InstKind::Switch { default, cases, .. } => {
                let mut out = vec![*default];
                out.extend(cases.iter().map(|c| c.target));
                out
            }
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub insts: Vec<Instruction>,
}

impl Block {
    pub fn new(id: BlockId, insts: Vec<Instruction>) -> Self {
        Self {
            id,
            label: None,
            insts,
        }
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.insts.last().filter(|i| i.is_terminator())
    }

    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator().map(|t| t.successors()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Type>,
    #[serde(default)]
    pub ret: Type,
    /// Empty for declarations.
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Function {
    pub fn declaration(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            blocks: vec![],
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn is_intrinsic(&self) -> bool {
        self.name.starts_with(INTRINSIC_PREFIX)
    }

    /// The function's final block in layout order.
    pub fn exit_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|b| b.insts.iter())
    }

    /// Result type of every value-producing instruction.
    pub fn result_types(&self) -> HashMap<InstId, Type> {
        self.instructions()
            .filter(|i| !i.ty.is_void())
            .map(|i| (i.id, i.ty.clone()))
            .collect()
    }

    /// Type of `op` within this function, given `results` from [`Function::result_types`].
    pub fn operand_type(&self, results: &HashMap<InstId, Type>, op: &Operand) -> Option<Type> {
        match op {
            Operand::Inst(id) => results.get(id).cloned(),
            Operand::Arg(i) => self.params.get(*i as usize).cloned(),
            Operand::Const(c) => Some(c.ty.clone()),
            Operand::Global(_) | Operand::Null => Some(Type::Ptr),
        }
    }

    pub fn signature_matches(&self, params: &[Type], ret: &Type) -> bool {
        self.params == params && &self.ret == ret
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    #[default]
    External,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    pub id: GlobalId,
    pub name: String,
    pub ty: Type,
    pub initializer: Constant,
    #[serde(default)]
    pub linkage: Linkage,
    #[serde(default)]
    pub is_constant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub globals: Vec<Global>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            globals: vec![],
            functions: vec![],
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn global(&self, id: GlobalId) -> Option<&Global> {
        self.globals.iter().find(|g| g.id == id)
    }

    pub fn global_by_name(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Declare `name` unless a function with that name already exists.
    ///
    /// Returns `true` when a declaration was added. An existing symbol with a
    /// different signature is reported as an error.
    pub fn get_or_insert_function(&mut self, name: &str, params: Vec<Type>, ret: Type) -> Result<bool> {
        if let Some(existing) = self.function(name) {
            if !existing.signature_matches(&params, &ret) {
                return Err(Error::Ir(format!(
                    "function '{name}' already exists with a different signature"
                )));
            }
            return Ok(false);
        }
        self.functions.push(Function::declaration(name, params, ret));
        Ok(true)
    }

    /// Append an externally linked, zero-initialised `i64` global.
    pub fn add_i64_global(&mut self, name: String) -> Result<GlobalId> {
        if self.global_by_name(&name).is_some() {
            return Err(Error::Ir(format!("global '{name}' already exists")));
        }
        let id = GlobalId::new(self.globals.iter().map(|g| g.id.get() + 1).max().unwrap_or(0));
        self.globals.push(Global {
            id,
            name,
            ty: Type::I64,
            initializer: Constant::int(64, 0),
            linkage: Linkage::External,
            is_constant: false,
        });
        Ok(id)
    }

    /// Allocator for instruction IDs not yet used anywhere in the module.
    pub fn inst_id_allocator(&self) -> InstIdAllocator {
        let next = self
            .functions
            .iter()
            .flat_map(|f| f.instructions())
            .map(|i| i.id.get() + 1)
            .max()
            .unwrap_or(0);
        InstIdAllocator::starting_at(next)
    }

    /// Structural well-formedness checks.
    pub fn validate(&self) -> Result<()> {
        let mut fn_names = HashSet::new();
        for f in &self.functions {
            if !fn_names.insert(f.name.as_str()) {
                return Err(Error::Ir(format!("duplicate function '{}'", f.name)));
            }
        }
        let globals: HashSet<GlobalId> = self.globals.iter().map(|g| g.id).collect();
        if globals.len() != self.globals.len() {
            return Err(Error::Ir("duplicate global id".into()));
        }

        let mut inst_ids = HashSet::new();
        for f in &self.functions {
            let block_ids: BTreeSet<BlockId> = f.blocks.iter().map(|b| b.id).collect();
            if block_ids.len() != f.blocks.len() {
                return Err(Error::Ir(format!("duplicate block id in '{}'", f.name)));
            }
            let results = f.result_types();
            for b in &f.blocks {
                for inst in &b.insts {
                    if !inst_ids.insert(inst.id) {
                        return Err(Error::Ir(format!("duplicate instruction id {}", inst.id)));
                    }
                    for succ in inst.successors() {
                        if !block_ids.contains(&succ) {
                            return Err(Error::Ir(format!(
                                "{} in '{}' branches to unknown block {}",
                                inst.id, f.name, succ
                            )));
                        }
                    }
                    for op in inst.operands() {
                        let known = match op {
                            Operand::Inst(id) => results.contains_key(id),
                            Operand::Arg(i) => (*i as usize) < f.params.len(),
                            Operand::Global(g) => globals.contains(g),
                            Operand::Const(_) | Operand::Null => true,
                        };
                        if !known {
                            return Err(Error::Ir(format!(
                                "{} in '{}' uses undefined operand {:?}",
                                inst.id, f.name, op
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
