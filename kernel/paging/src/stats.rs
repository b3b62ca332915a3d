//! Counters of paging activity

/// Counters describing what the paging code did since boot
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct PagingStats {
    /// Page faults handled, including failed ones
    pub faults: u64,
    /// Faults resolved by mapping a whole region through the direct pool
    pub direct_mappings: u64,
    /// Faults on pages that were already held in a TCM slot
    pub resident_hits: u64,
    /// Faults that had to load a page into a TCM slot
    pub misses: u64,
    /// Resident pages that were displaced by another page
    pub evictions: u64,
    /// Dirty pages written back to their backing memory
    pub writebacks: u64,
    /// Faults that could not be resolved
    pub failures: u64,
}
