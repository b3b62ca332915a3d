//! Index of the physical pages that are currently held in a TCM slot
//!
//! Every TCM paging slot owns one [`ResidentPage`] descriptor.
//! While a slot holds data it is linked into one of [`RESIDENT_BUCKET_COUNT`] hash buckets selected by the physical
//! address of that data so that a page fault can cheaply check whether the page it needs is already loaded.
//!
//! Buckets are circular doubly linked lists.
//! Since all nodes live in fixed arrays, links are stored as node indices instead of pointers: indices below
//! [`MAX_TCM_PAGES`] refer to page descriptors, the ones above refer to the bucket heads.

use crate::addr::{PAddr, SMALL_PAGE_MASK};
use bitflags::bitflags;
use core::fmt::{Debug, Formatter};
use static_assertions::const_assert;

/// Upper bound for the number of TCM slots used for paging
pub const MAX_TCM_PAGES: usize = 64;

/// The number of hash buckets of the index
pub const RESIDENT_BUCKET_COUNT: usize = 32;

const_assert!(RESIDENT_BUCKET_COUNT.is_power_of_two());
const_assert!(MAX_TCM_PAGES + RESIDENT_BUCKET_COUNT <= u16::MAX as usize);

type NodeId = u16;

const fn bucket_node(bucket: usize) -> NodeId {
    (MAX_TCM_PAGES + bucket) as NodeId
}

bitflags! {
    /// State flags which are kept in the otherwise unused low bits of [`ResidentPage::fb_offset`]
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct ResidentFlags: u64 {
        /// The slot was written to since its data was last written back
        const DIRTY = 1 << 0;
        /// The slot currently holds data and is linked into the index
        const RESIDENT = 1 << 1;
    }
}

const_assert!(ResidentFlags::all().bits() & SMALL_PAGE_MASK == 0);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Link {
    prev: NodeId,
    next: NodeId,
}

impl Link {
    /// A link of a node that is the only member of its list
    const fn lonely(id: NodeId) -> Self {
        Self { prev: id, next: id }
    }
}

/// Descriptor of one TCM paging slot
#[derive(Copy, Clone)]
pub struct ResidentPage {
    link: Link,
    /// Physical source address of the data held in the slot together with [`ResidentFlags`]
    fb_offset: u64,
}

impl ResidentPage {
    /// The physical address of the page held by this slot.
    ///
    /// Only meaningful while [`is_resident`](Self::is_resident) holds.
    pub fn physical_address(&self) -> PAddr {
        self.fb_offset & SMALL_PAGE_MASK
    }

    pub fn flags(&self) -> ResidentFlags {
        ResidentFlags::from_bits_truncate(self.fb_offset)
    }

    pub fn is_dirty(&self) -> bool {
        self.flags().contains(ResidentFlags::DIRTY)
    }

    pub fn is_resident(&self) -> bool {
        self.flags().contains(ResidentFlags::RESIDENT)
    }
}

impl Debug for ResidentPage {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResidentPage")
            .field("physical_address", &format_args!("{:#x}", self.physical_address()))
            .field("flags", &self.flags())
            .finish()
    }
}

/// Hash index from physical page addresses to the TCM slot holding them
pub struct ResidentIndex {
    pages: [ResidentPage; MAX_TCM_PAGES],
    heads: [Link; RESIDENT_BUCKET_COUNT],
}

impl ResidentIndex {
    pub const fn new() -> Self {
        let mut pages = [ResidentPage {
            link: Link::lonely(0),
            fb_offset: 0,
        }; MAX_TCM_PAGES];
        let mut i = 0;
        while i < MAX_TCM_PAGES {
            pages[i].link = Link::lonely(i as NodeId);
            i += 1;
        }

        let mut heads = [Link::lonely(0); RESIDENT_BUCKET_COUNT];
        let mut i = 0;
        while i < RESIDENT_BUCKET_COUNT {
            heads[i] = Link::lonely(bucket_node(i));
            i += 1;
        }

        Self { pages, heads }
    }

    /// Select the bucket that holds `paddr`.
    ///
    /// The modulo by 1023 breaks up the regular structure of page aligned addresses before the power of two mask is
    /// applied.
    #[inline]
    pub const fn bucket_for(paddr: PAddr) -> usize {
        (paddr % 1023) as usize & (RESIDENT_BUCKET_COUNT - 1)
    }

    fn link(&self, id: NodeId) -> &Link {
        let id = id as usize;
        match id < MAX_TCM_PAGES {
            true => &self.pages[id].link,
            false => &self.heads[id - MAX_TCM_PAGES],
        }
    }

    fn link_mut(&mut self, id: NodeId) -> &mut Link {
        let id = id as usize;
        match id < MAX_TCM_PAGES {
            true => &mut self.pages[id].link,
            false => &mut self.heads[id - MAX_TCM_PAGES],
        }
    }

    pub fn page(&self, slot: usize) -> &ResidentPage {
        &self.pages[slot]
    }

    /// Record that `slot` now holds the page at `paddr` and link it into the matching bucket.
    ///
    /// # Panics
    /// The slot must not already be resident.
    pub fn insert(&mut self, slot: usize, paddr: PAddr, dirty: bool) {
        assert!(
            !self.pages[slot].is_resident(),
            "tcm slot {slot} is already resident"
        );
        let mut flags = ResidentFlags::RESIDENT;
        flags.set(ResidentFlags::DIRTY, dirty);
        self.pages[slot].fb_offset = (paddr & SMALL_PAGE_MASK) | flags.bits();

        let node = slot as NodeId;
        let head = bucket_node(Self::bucket_for(paddr));
        let first = self.link(head).next;
        *self.link_mut(node) = Link {
            prev: head,
            next: first,
        };
        self.link_mut(first).prev = node;
        self.link_mut(head).next = node;
    }

    /// Unlink `slot` from its bucket and clear its flags.
    ///
    /// Slots which are not resident are left untouched.
    pub fn remove(&mut self, slot: usize) {
        if !self.pages[slot].is_resident() {
            return;
        }
        debug_assert!(
            !self.pages[slot].is_dirty(),
            "removing tcm slot {slot} which was not written back"
        );

        let node = slot as NodeId;
        let Link { prev, next } = *self.link(node);
        self.link_mut(prev).next = next;
        self.link_mut(next).prev = prev;
        *self.link_mut(node) = Link::lonely(node);
        self.pages[slot].fb_offset &= SMALL_PAGE_MASK;
    }

    /// Find the slot that holds the page at `paddr`
    pub fn lookup(&self, paddr: PAddr) -> Option<usize> {
        let paddr = paddr & SMALL_PAGE_MASK;
        let head = bucket_node(Self::bucket_for(paddr));
        let mut node = self.link(head).next;
        while node != head {
            let page = &self.pages[node as usize];
            if page.physical_address() == paddr {
                return Some(node as usize);
            }
            node = page.link.next;
        }
        None
    }

    pub fn mark_dirty(&mut self, slot: usize) {
        debug_assert!(self.pages[slot].is_resident());
        self.pages[slot].fb_offset |= ResidentFlags::DIRTY.bits();
    }

    pub fn clear_dirty(&mut self, slot: usize) {
        self.pages[slot].fb_offset &= !ResidentFlags::DIRTY.bits();
    }

    /// Iterate over the slots of one bucket in list order
    #[cfg(test)]
    fn bucket_members(&self, bucket: usize) -> impl Iterator<Item = usize> + '_ {
        let head = bucket_node(bucket);
        let mut node = self.link(head).next;
        core::iter::from_fn(move || {
            if node == head {
                return None;
            }
            let current = node;
            node = self.link(node).next;
            Some(current as usize)
        })
    }
}

impl Default for ResidentIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    #[test]
    fn test_same_page_same_bucket() {
        assert_eq!(
            ResidentIndex::bucket_for(0x8000_1000),
            ResidentIndex::bucket_for(0x8000_1000)
        );
        assert!(ResidentIndex::bucket_for(u64::MAX) < RESIDENT_BUCKET_COUNT);
    }

    #[test]
    fn test_insert_then_lookup() {
        let mut index = ResidentIndex::new();
        index.insert(3, 0x8000_2000, false);
        assert_eq!(index.lookup(0x8000_2000), Some(3));
        assert_eq!(index.lookup(0x8000_2abc), Some(3));
        assert_eq!(index.lookup(0x8000_3000), None);
        assert!(index.page(3).is_resident());
        assert!(!index.page(3).is_dirty());
        assert_eq!(index.page(3).physical_address(), 0x8000_2000);
    }

    #[test]
    fn test_remove_unlinks_only_that_slot() {
        // 1023 pages apart always share a bucket
        let a = 0x1000;
        let b = a + 1023 * 0x1000;
        assert_eq!(ResidentIndex::bucket_for(a), ResidentIndex::bucket_for(b));

        let mut index = ResidentIndex::new();
        index.insert(0, a, false);
        index.insert(1, b, false);
        index.insert(2, a + 0x1000, false);
        assert_eq!(
            index
                .bucket_members(ResidentIndex::bucket_for(a))
                .collect::<Vec<_>>(),
            [1, 0]
        );

        index.remove(0);
        assert_eq!(index.lookup(a), None);
        assert_eq!(index.lookup(b), Some(1));
        assert_eq!(index.lookup(a + 0x1000), Some(2));
        assert!(!index.page(0).is_resident());

        index.remove(1);
        assert_eq!(
            index
                .bucket_members(ResidentIndex::bucket_for(a))
                .count(),
            0
        );
    }

    #[test]
    fn test_dirty_flag() {
        let mut index = ResidentIndex::new();
        index.insert(5, 0x4000, true);
        assert!(index.page(5).is_dirty());
        index.clear_dirty(5);
        assert!(!index.page(5).is_dirty());
        index.mark_dirty(5);
        assert!(index.page(5).is_dirty());
        assert_eq!(index.page(5).physical_address(), 0x4000);
    }

    #[test]
    fn test_removing_non_resident_is_noop() {
        let mut index = ResidentIndex::new();
        index.remove(7);
        assert!(!index.page(7).is_resident());
    }

    #[test]
    #[should_panic(expected = "already resident")]
    fn test_double_insert_panics() {
        let mut index = ResidentIndex::new();
        index.insert(0, 0x1000, false);
        index.insert(0, 0x2000, false);
    }
}
