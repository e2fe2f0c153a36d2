//! Fixed geometry of the 1 MiB array.
//!
//! None of the helpers here validate their inputs: an index past the end of
//! the array produces an address past [`CAPACITY`], and the chip only decodes
//! the low address bits, so such accesses land on a mirror of the array.

/// Memory page size. The page is the largest unit a single program command writes.
pub const PAGE_SIZE: usize = 0x100;
/// Memory sector size. The sector is the smallest erasable unit.
pub const SECTOR_SIZE: usize = 0x10000;
/// Number of memory pages.
pub const PAGE_COUNT: usize = 0x1000;
/// Number of memory sectors.
pub const SECTOR_COUNT: usize = 0x10;

/// Total size of the array in bytes.
pub const CAPACITY: usize = PAGE_COUNT * PAGE_SIZE;
pub const PAGES_PER_SECTOR: usize = SECTOR_SIZE / PAGE_SIZE;

/// Value every byte reads back as after an erase.
pub const ERASED_BYTE: u8 = 0xFF;

/// Index of the last page, `0xFFF`.
pub const LAST_PAGE: u16 = (PAGE_COUNT - 1) as u16;
/// Index of the last sector, `0xF`.
pub const LAST_SECTOR: u8 = (SECTOR_COUNT - 1) as u8;
/// Offset of the last byte, `0xFFFFF`.
pub const LAST_OFFSET: u32 = (CAPACITY - 1) as u32;

const _: () = assert!(PAGE_COUNT * PAGE_SIZE == SECTOR_COUNT * SECTOR_SIZE);

/// Byte address of the first byte of `page`.
pub const fn page_address(page: u16) -> u32 {
    page as u32 * PAGE_SIZE as u32
}

/// Byte address of the first byte of `sector`.
pub const fn sector_address(sector: u8) -> u32 {
    sector as u32 * SECTOR_SIZE as u32
}

/// Length of the inclusive range `start..=end`, or 0 when `end < start`.
pub const fn range_len(start: u32, end: u32) -> usize {
    if end < start {
        0
    } else {
        ((end - start) as usize).saturating_add(1)
    }
}

/// Encodes `addr` as the 24-bit big-endian address that follows an opcode.
pub(crate) const fn address_bytes(addr: u32) -> [u8; 3] {
    [(addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
}
