use crate::addr::{PAddr, Pasid, VAddr, KEY_PRESENT, SMALL_PAGE_MASK};
use bitflags::bitflags;
use core::fmt::{Debug, Formatter, Write};
use static_assertions::{assert_eq_size, const_assert};

/// Key of a slot that was never used
pub const EMPTY_KEY: u64 = 0;

/// Key of a slot whose entry was removed.
///
/// Nothing produces tombstones yet but the value is reserved so that removal can be added without changing the
/// table layout. It can never collide with a packed key because those always have their low page bits clear except
/// for the pasid and the present bit.
pub const TOMBSTONE_KEY: u64 = u64::MAX;

const SIZE_BITS: u64 = 56;
const SIZE_MASK: u64 = (1 << SIZE_BITS) - 1;
const KIND_SHIFT: u64 = SIZE_BITS;

/// The largest mapping size that can be encoded in an entry
pub const MAX_MAPPING_SIZE: u64 = SIZE_MASK;

/// What kind of memory a mapping describes and therefore how a fault on it is resolved
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u64)]
pub enum MemoryKind {
    /// Memory that is only ever accessed through the DMA engine.
    /// It must never be mapped for the CPU.
    DmaOnly = 0,
    /// Normal memory that is mapped directly but not cached
    Uncached = 1,
    /// Normal memory that is mapped directly and cached
    Cached = 2,
    /// Memory that is demand paged into TCM
    PagedTcm = 3,
    /// Device registers
    Mmio = 4,
}

impl MemoryKind {
    /// Decode a kind from its encoding.
    ///
    /// Unknown encodings are treated as [`DmaOnly`](MemoryKind::DmaOnly) which is never mapped for the CPU.
    const fn decode(value: u64) -> Self {
        match value {
            1 => MemoryKind::Uncached,
            2 => MemoryKind::Cached,
            3 => MemoryKind::PagedTcm,
            4 => MemoryKind::Mmio,
            _ => MemoryKind::DmaOnly,
        }
    }
}

bitflags! {
    /// Attributes of a mapping as they are stored in the upper bits of [`PageTableEntry`]'s size field
    #[derive(Copy, Clone, Eq, PartialEq, Default)]
    pub struct PageAttributes: u64 {
        /// The mapping may be written to
        const WRITE = 1 << 59;
        /// Code stored in the mapping may be executed
        const EXECUTE = 1 << 60;

        /// The bits which encode the [`MemoryKind`]
        const KIND = 0b111 << KIND_SHIFT;
    }
}

impl PageAttributes {
    /// Attributes of a read-only mapping of the given kind
    pub const fn of_kind(kind: MemoryKind) -> Self {
        Self::from_bits_retain((kind as u64) << KIND_SHIFT)
    }

    /// The kind of memory described by these attributes
    pub const fn kind(&self) -> MemoryKind {
        MemoryKind::decode((self.bits() & Self::KIND.bits()) >> KIND_SHIFT)
    }

    pub fn is_writable(&self) -> bool {
        self.contains(Self::WRITE)
    }

    pub fn is_executable(&self) -> bool {
        self.contains(Self::EXECUTE)
    }
}

impl Debug for PageAttributes {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?} ", self.kind())?;
        f.write_char(if self.is_writable() { 'W' } else { '-' })?;
        f.write_char(if self.is_executable() { 'X' } else { '-' })
    }
}

/// One slot of the inverted pagetable.
///
/// A mapping that spans several granules occupies one slot per granule, each carrying the same base address,
/// physical address and size so that any of them can translate any address of the mapping.
///
/// # Format
///
/// ```text
///  key:                  virtual page | KEY_PRESENT | pasid   (0 = empty slot)
///  base_virtual_address: first virtual address of the mapping
///  physical_address:     physical address of base_virtual_address
///  attributes_and_size:
///    63   61 60  59  58      56 55                                      0
///   ┌───────┬───┬───┬──────────┬─────────────────────────────────────────┐
///   │ rsvd  │ X │ W │   kind   │              size in bytes              │
///   └───────┴───┴───┴──────────┴─────────────────────────────────────────┘
/// ```
///
/// The layout is shared with the init task which builds a complete table in its own memory and registers it.
#[derive(Copy, Clone, Eq, PartialEq, Default)]
#[repr(C, align(32))]
pub struct PageTableEntry {
    pub(crate) key: u64,
    pub base_virtual_address: VAddr,
    pub physical_address: PAddr,
    pub(crate) attributes_and_size: u64,
}

assert_eq_size!(PageTableEntry, [u64; 4]);
const_assert!(PageAttributes::KIND.bits() & SIZE_MASK == 0);
const_assert!(TOMBSTONE_KEY & !SMALL_PAGE_MASK > KEY_PRESENT | Pasid::MAX as u64);

/// The descriptor returned for every address that is not mapped.
///
/// It has a size of 0 and is of kind [`MemoryKind::DmaOnly`] so it can never be paged in or mapped.
pub static NULL_ENTRY: PageTableEntry = PageTableEntry::null();

impl PageTableEntry {
    /// Create an entry that is stored under `key`
    pub const fn new(
        key: u64,
        base_virtual_address: VAddr,
        physical_address: PAddr,
        size: u64,
        attributes: PageAttributes,
    ) -> Self {
        assert!(size <= SIZE_MASK, "mapping size does not fit into an entry");
        Self {
            key,
            base_virtual_address,
            physical_address,
            attributes_and_size: (attributes.bits() & !SIZE_MASK) | size,
        }
    }

    /// Create an empty slot
    pub const fn null() -> Self {
        Self {
            key: EMPTY_KEY,
            base_virtual_address: 0,
            physical_address: 0,
            attributes_and_size: (MemoryKind::DmaOnly as u64) << KIND_SHIFT,
        }
    }

    /// The packed key under which this entry is stored
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Whether this slot has never been used
    pub fn is_empty(&self) -> bool {
        self.key == EMPTY_KEY
    }

    /// Whether this slot held an entry that was removed
    pub fn is_tombstone(&self) -> bool {
        self.key == TOMBSTONE_KEY
    }

    /// Whether this is the descriptor returned for unmapped addresses
    pub fn is_null(&self) -> bool {
        self.size() == 0
    }

    /// Size of the whole mapping in bytes
    pub fn size(&self) -> u64 {
        self.attributes_and_size & SIZE_MASK
    }

    pub fn attributes(&self) -> PageAttributes {
        PageAttributes::from_bits_truncate(self.attributes_and_size)
    }

    pub fn kind(&self) -> MemoryKind {
        self.attributes().kind()
    }

    pub fn is_writable(&self) -> bool {
        self.attributes().is_writable()
    }

    pub fn is_executable(&self) -> bool {
        self.attributes().is_executable()
    }

    /// Whether `vaddr` lies inside the mapping described by this entry
    pub fn contains(&self, vaddr: VAddr) -> bool {
        vaddr.wrapping_sub(self.base_virtual_address) < self.size()
    }

    /// Translate a virtual address of this mapping to the physical address backing it
    pub fn translate(&self, vaddr: VAddr) -> PAddr {
        debug_assert!(self.contains(vaddr));
        vaddr - self.base_virtual_address + self.physical_address
    }
}

impl Debug for PageTableEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return f.write_str("PageTableEntry (empty) { .. }");
        }
        f.write_fmt(format_args!(
            "PageTableEntry {{ key: {:#x}, vaddr: {:#x}, paddr: {:#x}, size: {:#x}, attributes: {:?} }}",
            self.key,
            self.base_virtual_address,
            self.physical_address,
            self.size(),
            self.attributes(),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_null_entry_is_dma_only_and_empty() {
        assert!(NULL_ENTRY.is_null());
        assert!(NULL_ENTRY.is_empty());
        assert_eq!(NULL_ENTRY.kind(), MemoryKind::DmaOnly);
        assert!(!NULL_ENTRY.is_writable());
        assert_eq!(NULL_ENTRY, PageTableEntry::default());
    }

    #[test]
    fn test_size_and_attributes_are_kept_apart() {
        let entry = PageTableEntry::new(
            0x1801,
            0x1000,
            0x8000_0000,
            0x3000,
            PageAttributes::of_kind(MemoryKind::PagedTcm) | PageAttributes::WRITE,
        );
        assert_eq!(entry.size(), 0x3000);
        assert_eq!(entry.kind(), MemoryKind::PagedTcm);
        assert!(entry.is_writable());
        assert!(!entry.is_executable());
    }

    #[test]
    fn test_translate_keeps_offset() {
        let entry = PageTableEntry::new(
            0x1801,
            0x1000,
            0x8000_0000,
            0x3000,
            PageAttributes::of_kind(MemoryKind::Cached),
        );
        assert!(entry.contains(0x3fff));
        assert!(!entry.contains(0x4000));
        assert!(!entry.contains(0x0fff));
        assert_eq!(entry.translate(0x2345), 0x8000_1345);
    }

    #[test]
    fn test_unknown_kind_decodes_as_dma_only() {
        let attributes = PageAttributes::from_bits_retain(7 << KIND_SHIFT);
        assert_eq!(attributes.kind(), MemoryKind::DmaOnly);
    }
}
