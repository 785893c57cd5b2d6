//! Debug-time verification helpers for analysis results.
//!
//! Intended for tests and debug builds; they panic on violation.

use crate::loops::LoopForest;

/// Any two loops must be disjoint or one must contain the other.
pub fn assert_well_nested(forest: &LoopForest) {
    let loops = forest.loops();
    for (i, a) in loops.iter().enumerate() {
        assert!(
            a.contains(a.header),
            "loop header {} missing from its own body",
            a.header
        );
        for b in &loops[i + 1..] {
            let shared = a.blocks.intersection(&b.blocks).count();
            assert!(
                shared == 0 || a.blocks.is_subset(&b.blocks) || b.blocks.is_subset(&a.blocks),
                "loops headed by {} and {} partially overlap",
                a.header,
                b.header
            );
        }
    }
}
