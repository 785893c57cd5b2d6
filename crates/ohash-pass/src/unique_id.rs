//! Log-event identities.

/// Reserved for the session terminator `log(0, null)`.
pub const TERMINATOR_ID: u32 = 0;

/// Monotonic counter, reset at the start of every run. Never yields
/// [`TERMINATOR_ID`].
#[derive(Debug, Clone)]
pub struct UniqueIdGenerator {
    next: u32,
}

impl Default for UniqueIdGenerator {
    fn default() -> Self {
        Self {
            next: TERMINATOR_ID + 1,
        }
    }
}

impl UniqueIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.next = TERMINATOR_ID + 1;
    }

    pub fn next(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// IDs handed out since the last reset.
    pub fn issued(&self) -> u32 {
        self.next - (TERMINATOR_ID + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_reset() {
        let mut g = UniqueIdGenerator::new();
        assert_eq!(g.next(), 1);
        assert_eq!(g.next(), 2);
        assert_eq!(g.issued(), 2);
        g.reset();
        assert_eq!(g.next(), 1);
    }
}
