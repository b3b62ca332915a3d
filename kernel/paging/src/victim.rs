//! Selection of the slot that is reused when all slots of a pool are taken

/// A source of slot indices for eviction and direct mappings.
///
/// Production kernels use the free running cycle counter which is cheap and needs no bookkeeping.
pub trait VictimSelector {
    /// Pick an index in `0..pool_len`.
    ///
    /// `pool_len` is never 0.
    fn select(&mut self, pool_len: usize) -> usize;
}

/// Selects slots in turn.
///
/// Useful for tests and hosts without a cycle counter.
#[derive(Debug, Default, Clone)]
pub struct RoundRobin {
    next: usize,
}

impl VictimSelector for RoundRobin {
    fn select(&mut self, pool_len: usize) -> usize {
        let selected = self.next % pool_len;
        self.next = self.next.wrapping_add(1);
        selected
    }
}
