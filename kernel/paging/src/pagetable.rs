//! The inverted pagetable
//!
//! Instead of a hierarchy of tables indexed by parts of the virtual address, all mappings of all address spaces are
//! stored in one open-addressed hash table that is keyed by `(pasid, virtual granule)`.
//! Collisions are resolved by linear probing with Robin Hood displacement: whenever the entry being inserted is
//! further away from its ideal slot than the occupant of the current slot, the two swap places and insertion
//! continues with the displaced occupant.
//! This keeps the longest probe sequence short which bounds the cost of a lookup on the page fault path.
//!
//! The table is sized once during boot and never grows.
//! Entries are never removed.

use crate::addr::{is_small_page_aligned, Granularity, PAddr, Pasid, PagingKey, VAddr};
use crate::entry::{PageAttributes, PageTableEntry, NULL_ENTRY};
use crate::hash::murmur_finalize;
use core::mem;

/// An open-addressed hash table mapping `(pasid, granule)` to the descriptor of the mapping containing it
pub struct InvertedPageTable<'mem> {
    entries: &'mem mut [PageTableEntry],
    mask: u64,
    len: usize,
    /// The largest distance any entry has from its ideal slot
    max_probe: usize,
}

impl<'mem> InvertedPageTable<'mem> {
    /// The number of slots a table needs to hold `required_entries` while keeping the load factor at or below 2/3
    pub const fn capacity_for(required_entries: usize) -> usize {
        let wanted = required_entries + required_entries / 2;
        if wanted == 0 {
            1
        } else {
            wanted.next_power_of_two()
        }
    }

    /// Create a new empty table backed by `entries`.
    ///
    /// All existing content of the buffer is overwritten.
    ///
    /// # Panics
    /// The buffer length must be a power of two.
    pub fn new(entries: &'mem mut [PageTableEntry]) -> Self {
        assert!(
            entries.len().is_power_of_two(),
            "inverted pagetable capacity {} is not a power of two",
            entries.len()
        );
        log::trace!(
            "initializing empty inverted pagetable at {:p} with {} slots",
            entries.as_ptr(),
            entries.len()
        );
        entries.fill(PageTableEntry::null());
        Self {
            mask: entries.len() as u64 - 1,
            entries,
            len: 0,
            max_probe: 0,
        }
    }

    /// Adopt a table that was completely built by someone else.
    ///
    /// `max_probe` must be at least the largest distance of any entry from its ideal slot, otherwise lookups
    /// will miss entries.
    ///
    /// # Panics
    /// The buffer length must be a power of two and `max_probe` smaller than it.
    pub fn from_prebuilt(entries: &'mem mut [PageTableEntry], max_probe: usize) -> Self {
        assert!(entries.len().is_power_of_two());
        assert!(max_probe < entries.len());
        let len = entries.iter().filter(|entry| !entry.is_empty()).count();
        Self {
            mask: entries.len() as u64 - 1,
            entries,
            len,
            max_probe,
        }
    }

    /// The total number of slots
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// The number of occupied slots
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The largest distance any entry has from its ideal slot
    pub fn max_probe(&self) -> usize {
        self.max_probe
    }

    /// Read-only access to the raw slots
    pub fn entries(&self) -> &[PageTableEntry] {
        self.entries
    }

    #[inline]
    fn ideal_slot(&self, key: u64) -> usize {
        (murmur_finalize(key) & self.mask) as usize
    }

    /// How far `slot` is from the ideal slot of `key`, taking wrap-around into account
    #[inline]
    fn probe_distance(&self, key: u64, slot: usize) -> usize {
        (slot.wrapping_sub(self.ideal_slot(key)) as u64 & self.mask) as usize
    }

    /// Register a mapping of `size` bytes at `vaddr` in the address space `pasid` to point to `paddr`.
    ///
    /// One entry is inserted for every granule the mapping touches.
    /// A `size` of 0 is ignored.
    ///
    /// # Panics
    /// Since mappings are derived from the kernel image and boot configuration, any violation of the following is
    /// a bug and panics:
    /// - `size` and `paddr` must be small page aligned
    /// - `vaddr` must be aligned to its granularity
    /// - the mapping must not cross from small into huge granularity
    /// - a granule of the mapping must not already be mapped in the same address space
    /// - the table must have room for all granules
    pub fn insert(
        &mut self,
        pasid: Pasid,
        vaddr: VAddr,
        size: u64,
        attributes: PageAttributes,
        paddr: PAddr,
    ) {
        if size == 0 {
            return;
        }
        log::trace!(
            "inserting mapping {vaddr:#x}+{size:#x} -> {paddr:#x} ({attributes:?}) for pasid {pasid}"
        );

        let granularity = Granularity::of(vaddr);
        assert!(
            is_small_page_aligned(size) && is_small_page_aligned(paddr),
            "mapping {vaddr:#x}+{size:#x} -> {paddr:#x} is not page aligned"
        );
        assert_eq!(
            vaddr & !granularity.mask(),
            0,
            "cannot insert vaddr {vaddr:#x} which is not aligned to its {granularity:?} granularity"
        );
        let Some(last) = vaddr.checked_add(size - 1) else {
            panic!("mapping {vaddr:#x}+{size:#x} wraps around the end of the address space");
        };
        assert_eq!(
            Granularity::of(last),
            granularity,
            "mapping {vaddr:#x}+{size:#x} crosses the small/huge threshold"
        );

        let mut granule = vaddr;
        loop {
            let key = PagingKey::containing(pasid, granule).packed();
            self.insert_entry(PageTableEntry::new(key, vaddr, paddr, size, attributes));
            match granule.checked_add(granularity.size()) {
                Some(next) if next <= last => granule = next,
                _ => break,
            }
        }
    }

    /// Robin Hood insertion of one prepared entry
    fn insert_entry(&mut self, entry: PageTableEntry) {
        assert!(
            self.len < self.entries.len(),
            "inverted pagetable is full ({} entries)",
            self.entries.len()
        );

        let mut candidate = entry;
        let mut slot = self.ideal_slot(candidate.key);
        let mut distance = 0;
        loop {
            let occupant = &mut self.entries[slot];
            if occupant.is_empty() {
                *occupant = candidate;
                self.len += 1;
                self.max_probe = self.max_probe.max(distance);
                return;
            }
            assert_ne!(
                occupant.key, candidate.key,
                "duplicate insertion of pagetable key {:#x}",
                candidate.key
            );

            let occupant_key = occupant.key;
            let occupant_distance = self.probe_distance(occupant_key, slot);
            if occupant_distance < distance {
                mem::swap(&mut self.entries[slot], &mut candidate);
                self.max_probe = self.max_probe.max(distance);
                distance = occupant_distance;
            }

            slot = (slot + 1) & self.mask as usize;
            distance += 1;
        }
    }

    /// Find the descriptor of the mapping that contains `vaddr` in the address space `pasid`.
    ///
    /// When no such mapping exists, [`NULL_ENTRY`] is returned.
    pub fn resolve(&self, pasid: Pasid, vaddr: VAddr) -> &PageTableEntry {
        let key = PagingKey::containing(pasid, vaddr).packed();
        let mut slot = self.ideal_slot(key);
        for _ in 0..=self.max_probe {
            let entry = &self.entries[slot];
            if entry.is_empty() {
                return &NULL_ENTRY;
            }
            if entry.key == key {
                return match entry.contains(vaddr) {
                    true => entry,
                    false => &NULL_ENTRY,
                };
            }
            slot = (slot + 1) & self.mask as usize;
        }
        &NULL_ENTRY
    }

    /// Count how many granules a mapping of `size` bytes at `vaddr` occupies
    pub fn granules_of(vaddr: VAddr, size: u64) -> usize {
        if size == 0 {
            return 0;
        }
        let granularity = Granularity::of(vaddr);
        let first = vaddr & granularity.mask();
        let last = vaddr.saturating_add(size - 1) & granularity.mask();
        ((last - first) / granularity.size()) as usize + 1
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use super::*;
    use crate::entry::MemoryKind;
    use std::vec;

    fn rw() -> PageAttributes {
        PageAttributes::of_kind(MemoryKind::PagedTcm) | PageAttributes::WRITE
    }

    #[test]
    fn test_capacity_keeps_load_factor() {
        assert_eq!(InvertedPageTable::capacity_for(0), 1);
        assert_eq!(InvertedPageTable::capacity_for(1), 1);
        assert_eq!(InvertedPageTable::capacity_for(2), 4);
        assert_eq!(InvertedPageTable::capacity_for(10), 16);
        assert_eq!(InvertedPageTable::capacity_for(11), 32);
    }

    #[test]
    fn test_small_mapping_resolves() {
        let mut buf = vec![PageTableEntry::default(); 16];
        let mut table = InvertedPageTable::new(&mut buf);
        table.insert(1, 0x1000, 0x1000, rw(), 0x2000);

        let entry = table.resolve(1, 0x1000);
        assert_eq!(entry.base_virtual_address, 0x1000);
        assert_eq!(entry.physical_address, 0x2000);
        assert!(table.resolve(1, 0x1fff).contains(0x1fff));
        assert!(table.resolve(1, 0x2000).is_null());
    }

    #[test]
    fn test_multi_page_mapping_occupies_one_slot_per_page() {
        let mut buf = vec![PageTableEntry::default(); 16];
        let mut table = InvertedPageTable::new(&mut buf);
        table.insert(1, 0x10000, 0x4000, rw(), 0x80000);
        assert_eq!(table.len(), 4);
        for va in (0x10000..0x14000).step_by(0x800) {
            let entry = table.resolve(1, va);
            assert_eq!(entry.base_virtual_address, 0x10000);
            assert_eq!(entry.translate(va), 0x80000 + (va - 0x10000));
        }
    }

    #[test]
    fn test_zero_size_is_ignored() {
        let mut buf = vec![PageTableEntry::default(); 4];
        let mut table = InvertedPageTable::new(&mut buf);
        table.insert(1, 0x1000, 0, rw(), 0x2000);
        assert!(table.is_empty());
    }

    #[test]
    fn test_huge_mapping_is_one_granule() {
        let mut buf = vec![PageTableEntry::default(); 4];
        let mut table = InvertedPageTable::new(&mut buf);
        table.insert(2, 0x1_0000_0000_0000, 0x20000, rw(), 0x4000_0000);
        assert_eq!(table.len(), 1);
        let entry = table.resolve(2, 0x1_0000_0000_1000);
        assert_eq!(entry.base_virtual_address, 0x1_0000_0000_0000);
        assert!(table.resolve(2, 0x1_0000_0002_0000).is_null());
    }

    #[test]
    fn test_full_table_keeps_every_entry_reachable() {
        let mut buf = vec![PageTableEntry::default(); 64];
        let mut table = InvertedPageTable::new(&mut buf);
        for page in 0..64u64 {
            table.insert((page % 3) as u8, page * 0x1000, 0x1000, rw(), page * 0x1000);
        }
        assert_eq!(table.len(), 64);
        for page in 0..64u64 {
            let entry = table.resolve((page % 3) as u8, page * 0x1000 + 0x10);
            assert_eq!(entry.physical_address, page * 0x1000);
        }
    }

    #[test]
    fn test_from_prebuilt_counts_entries() {
        let mut buf = vec![PageTableEntry::default(); 8];
        let max_probe = {
            let mut table = InvertedPageTable::new(&mut buf);
            table.insert(1, 0x1000, 0x3000, rw(), 0x2000);
            table.max_probe()
        };
        let table = InvertedPageTable::from_prebuilt(&mut buf, max_probe);
        assert_eq!(table.len(), 3);
        assert_eq!(table.resolve(1, 0x3000).physical_address, 0x2000);
    }

    #[test]
    #[should_panic(expected = "full")]
    fn test_overflow_panics() {
        let mut buf = vec![PageTableEntry::default(); 2];
        let mut table = InvertedPageTable::new(&mut buf);
        table.insert(1, 0x1000, 0x3000, rw(), 0x2000);
    }

    #[test]
    #[should_panic(expected = "duplicate")]
    fn test_duplicate_panics() {
        let mut buf = vec![PageTableEntry::default(); 8];
        let mut table = InvertedPageTable::new(&mut buf);
        table.insert(1, 0x1000, 0x1000, rw(), 0x2000);
        table.insert(1, 0x1000, 0x1000, rw(), 0x5000);
    }

    #[test]
    #[should_panic(expected = "not aligned")]
    fn test_unaligned_vaddr_panics() {
        let mut buf = vec![PageTableEntry::default(); 8];
        let mut table = InvertedPageTable::new(&mut buf);
        table.insert(1, 0x1_0000_0000_1000, 0x1000, rw(), 0x2000);
    }

    #[test]
    fn test_granule_count() {
        assert_eq!(InvertedPageTable::granules_of(0x1000, 0), 0);
        assert_eq!(InvertedPageTable::granules_of(0x1000, 0x1000), 1);
        assert_eq!(InvertedPageTable::granules_of(0x1000, 0x1001), 2);
        assert_eq!(InvertedPageTable::granules_of(0x1_0000_0000_0000, 0x5000), 1);
    }
}
