//! Construction of the boot time pagetable from the segments of the loaded images

use crate::addr::{PAddr, Pasid, VAddr};
use crate::entry::{PageAttributes, PageTableEntry};
use crate::pagetable::InvertedPageTable;

/// A contiguous region that is made visible to a set of address spaces
#[derive(Debug, Copy, Clone)]
pub struct Segment<'a> {
    pub virtual_address: VAddr,
    pub size: u64,
    pub physical_address: PAddr,
    pub attributes: PageAttributes,
    /// The address spaces in which the segment is mapped
    pub acl: &'a [Pasid],
}

/// Count the pagetable entries needed to hold all `segments`
pub fn required_entries(segments: &[Segment<'_>]) -> usize {
    segments
        .iter()
        .map(|segment| {
            InvertedPageTable::granules_of(segment.virtual_address, segment.size) * segment.acl.len()
        })
        .sum()
}

/// Build a pagetable in `buffer` that maps every segment in every address space of its acl.
///
/// # Panics
/// The buffer must be a power of two in length and large enough for all segments and the segments must satisfy the
/// requirements of [`InvertedPageTable::insert`].
pub fn bootstrap<'mem>(
    buffer: &'mem mut [PageTableEntry],
    segments: &[Segment<'_>],
) -> InvertedPageTable<'mem> {
    let required = required_entries(segments);
    assert!(
        required <= buffer.len(),
        "bootstrap needs {required} pagetable entries but only {} are available",
        buffer.len()
    );

    let mut table = InvertedPageTable::new(buffer);
    for segment in segments.iter().filter(|segment| segment.size != 0) {
        for &pasid in segment.acl {
            table.insert(
                pasid,
                segment.virtual_address,
                segment.size,
                segment.attributes,
                segment.physical_address,
            );
        }
    }
    log::debug!(
        "bootstrapped pagetable with {} of {} slots in use, max probe distance {}",
        table.len(),
        table.capacity(),
        table.max_probe()
    );
    table
}

#[cfg(test)]
mod test {
    extern crate std;

    use super::*;
    use crate::entry::MemoryKind;
    use std::vec;

    #[test]
    fn test_segments_are_mapped_per_acl_member() {
        let segments = [
            Segment {
                virtual_address: 0x1000,
                size: 0x2000,
                physical_address: 0x8000_0000,
                attributes: PageAttributes::of_kind(MemoryKind::PagedTcm),
                acl: &[1, 2],
            },
            Segment {
                virtual_address: 0x10_0000,
                size: 0,
                physical_address: 0x9000_0000,
                attributes: PageAttributes::of_kind(MemoryKind::Cached),
                acl: &[1],
            },
        ];
        assert_eq!(required_entries(&segments), 4);

        let mut buffer =
            vec![PageTableEntry::default(); InvertedPageTable::capacity_for(required_entries(&segments))];
        let table = bootstrap(&mut buffer, &segments);
        assert_eq!(table.len(), 4);
        assert_eq!(table.resolve(2, 0x2abc).physical_address, 0x8000_0000);
        assert!(table.resolve(3, 0x2abc).is_null());
        assert!(table.resolve(1, 0x10_0000).is_null());
    }

    #[test]
    #[should_panic(expected = "bootstrap needs")]
    fn test_too_small_buffer_panics() {
        let segments = [Segment {
            virtual_address: 0x1000,
            size: 0x3000,
            physical_address: 0x8000_0000,
            attributes: PageAttributes::of_kind(MemoryKind::PagedTcm),
            acl: &[1],
        }];
        let mut buffer = vec![PageTableEntry::default(); 2];
        bootstrap(&mut buffer, &segments);
    }
}
