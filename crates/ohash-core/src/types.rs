//! Value types carried by IR operands and instruction results.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Void,
    /// Integer of the given bit width (`i1` is a boolean).
    Int(u32),
    /// IEEE float of the given bit width (16/32/64/128).
    Float(u32),
    Ptr,
    Vector { elem: Box<Type>, lanes: u32 },
    Struct(Vec<Type>),
}

impl Type {
    pub const I1: Type = Type::Int(1);
    pub const I8: Type = Type::Int(8);
    pub const I32: Type = Type::Int(32);
    pub const I64: Type = Type::Int(64);
    pub const F64: Type = Type::Float(64);

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, Type::Ptr)
    }

    /// Pointer, or a vector of pointers.
    pub fn is_ptr_or_ptr_vector(&self) -> bool {
        match self {
            Type::Ptr => true,
            Type::Vector { elem, .. } => elem.is_ptr(),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(b) => write!(f, "i{b}"),
            Type::Float(16) => write!(f, "half"),
            Type::Float(32) => write!(f, "float"),
            Type::Float(64) => write!(f, "double"),
            Type::Float(b) => write!(f, "f{b}"),
            Type::Ptr => write!(f, "ptr"),
            Type::Vector { elem, lanes } => write!(f, "<{lanes} x {elem}>"),
            Type::Struct(fields) => {
                write!(f, "{{ ")?;
                for (i, t) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, " }}")
            }
        }
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::Void
    }
}
