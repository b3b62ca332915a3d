extern crate std;

use paging::addr::{HUGE_THRESHOLD, SMALL_PAGE_SIZE};
use paging::entry::{MemoryKind, PageAttributes, PageTableEntry, NULL_ENTRY};
use paging::pagetable::InvertedPageTable;
use std::vec;

fn writable() -> PageAttributes {
    PageAttributes::of_kind(MemoryKind::PagedTcm) | PageAttributes::WRITE
}

#[test]
fn every_address_of_a_mapping_resolves_to_it() {
    let mut buf = vec![PageTableEntry::default(); 32];
    let mut table = InvertedPageTable::new(&mut buf);
    table.insert(4, 0x40_0000, 0x5000, writable(), 0x8010_0000);
    table.insert(4, 0x40_5000, 0x1000, writable(), 0x9000_0000);

    for va in (0x40_0000..0x40_5000).step_by(0x200) {
        let entry = table.resolve(4, va);
        assert_eq!(entry.base_virtual_address, 0x40_0000);
        assert_eq!(entry.physical_address, 0x8010_0000);
    }
    // the byte after the end belongs to the next mapping
    assert_eq!(table.resolve(4, 0x40_5000).physical_address, 0x9000_0000);
    assert!(table.resolve(4, 0x40_6000).is_null());
}

#[test]
fn unmapped_addresses_resolve_to_the_null_entry() {
    let mut buf = vec![PageTableEntry::default(); 16];
    let mut table = InvertedPageTable::new(&mut buf);
    table.insert(1, 0x1000, 0x1000, writable(), 0x2000);

    for (pasid, va) in [(1, 0x0), (1, 0x2000), (2, 0x1000), (0, 0), (1, HUGE_THRESHOLD)] {
        let entry = table.resolve(pasid, va);
        assert_eq!(*entry, NULL_ENTRY);
        assert_eq!(entry.size(), 0);
        assert_eq!(entry.kind(), MemoryKind::DmaOnly);
    }
}

#[test]
fn address_spaces_do_not_alias() {
    let mut buf = vec![PageTableEntry::default(); 16];
    let mut table = InvertedPageTable::new(&mut buf);
    table.insert(1, 0x1000, 0x2000, writable(), 0x10_0000);
    table.insert(2, 0x1000, 0x2000, writable(), 0x20_0000);

    assert_eq!(table.resolve(1, 0x2800).translate(0x2800), 0x10_1800);
    assert_eq!(table.resolve(2, 0x2800).translate(0x2800), 0x20_1800);
}

#[test]
fn table_sized_for_the_load_factor_never_overflows() {
    for n in [1usize, 7, 100, 341, 1000] {
        let mut buf = vec![PageTableEntry::default(); InvertedPageTable::capacity_for(n)];
        let mut table = InvertedPageTable::new(&mut buf);
        for i in 0..n as u64 {
            table.insert((i % 7) as u8, i * SMALL_PAGE_SIZE, SMALL_PAGE_SIZE, writable(), i * SMALL_PAGE_SIZE);
        }
        assert_eq!(table.len(), n);
        assert!(table.len() * 3 / 2 <= table.capacity());
        for i in 0..n as u64 {
            assert_eq!(
                table.resolve((i % 7) as u8, i * SMALL_PAGE_SIZE).physical_address,
                i * SMALL_PAGE_SIZE
            );
        }
    }
}

#[test]
fn small_mapping_scenario() {
    let mut buf = vec![PageTableEntry::default(); 8];
    let mut table = InvertedPageTable::new(&mut buf);
    table.insert(
        1,
        0x1000,
        0x1000,
        PageAttributes::of_kind(MemoryKind::Cached) | PageAttributes::WRITE,
        0x2000,
    );

    let entry = table.resolve(1, 0x1000);
    assert_eq!(entry.base_virtual_address, 0x1000);
    assert_eq!(entry.physical_address, 0x2000);
    for offset in [0, 1, 0x800, 0xfff] {
        assert!(entry.contains(0x1000 + offset));
        assert_eq!(table.resolve(1, 0x1000 + offset), entry);
    }
}

#[test]
fn huge_mapping_uses_huge_granularity() {
    let va = 0x1_0000_0000_0000;
    let mut buf = vec![PageTableEntry::default(); 8];
    let mut table = InvertedPageTable::new(&mut buf);
    table.insert(3, va, 0x10_0000, writable(), 0x4000_0000);

    // one slot covers the whole mapping
    assert_eq!(table.len(), 1);
    let entry = table.resolve(3, va + SMALL_PAGE_SIZE);
    assert_eq!(entry.base_virtual_address, va);
    assert_eq!(entry.translate(va + SMALL_PAGE_SIZE), 0x4000_1000);
    assert!(table.resolve(3, va + 0x10_0000).is_null());
}

#[test]
#[should_panic(expected = "threshold")]
fn mapping_across_the_threshold_panics() {
    let mut buf = vec![PageTableEntry::default(); 8];
    let mut table = InvertedPageTable::new(&mut buf);
    table.insert(1, HUGE_THRESHOLD - SMALL_PAGE_SIZE, 2 * SMALL_PAGE_SIZE, writable(), 0);
}
