//! Strongly-typed identifiers used across the instrumenter.
//!
//! Downstream crates (analysis, pass, cli) should *not* use raw integers for IDs.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! new_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

new_id!(BlockId, "bb");
new_id!(InstId, "%");
new_id!(GlobalId, "@g");

/// Hands out fresh instruction IDs above everything already present in a module.
///
/// Instrumentation relies on this: any instruction whose ID is at or above the
/// allocator's starting point was inserted by the pass.
#[derive(Debug, Clone)]
pub struct InstIdAllocator {
    first: u64,
    next: u64,
}

impl InstIdAllocator {
    pub fn starting_at(first: u64) -> Self {
        Self { first, next: first }
    }

    pub fn fresh(&mut self) -> InstId {
        let id = InstId::new(self.next);
        self.next += 1;
        id
    }

    /// First ID handed out by this allocator.
    pub fn first(&self) -> InstId {
        InstId::new(self.first)
    }

    pub fn allocated(&self) -> u64 {
        self.next - self.first
    }
}
