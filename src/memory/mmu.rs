//! Memory management unit implemented
//! with a two-level page table

use super::Memory;
use crate::error::{MemoryError, MemoryErrorKind};
use crate::stats::StatRegistry;

const WORD_WIDTH: usize = 32;
const FIRST_LEVEL_WIDTH: usize = 10;
const SECOND_LEVEL_WIDTH: usize = 10;
const PAGE_WIDTH: usize = 12;

const FIRST_LEVEL_SIZE: usize = 1 << FIRST_LEVEL_WIDTH;
const SECOND_LEVEL_SIZE: usize = 1 << SECOND_LEVEL_WIDTH;
pub const PAGE_SIZE: usize = 1 << PAGE_WIDTH;

// Defines page type
type PageType = Box<[u8; PAGE_SIZE]>;

/// Memory management unit
pub struct MMU {
    // data[x][y][z] stores the byte at (x << 22) | (y << 12) | z
    // Allocate stuff lazily
    data: Vec<Option<Vec<Option<PageType>>>>,
    pages: usize,
}

impl Default for MMU {
    fn default() -> Self {
        Self::make()
    }
}

impl MMU {
    /// Make a new MMU
    pub fn make() -> Self {
        Self { data: vec![None; FIRST_LEVEL_SIZE], pages: 0 }
    }

    /// The first-level index of the address
    fn first_level_index(address: u32) -> usize {
        (address >> (WORD_WIDTH - FIRST_LEVEL_WIDTH)) as usize
    }
    /// The second-level index of the address
    fn second_level_index(address: u32) -> usize {
        ((address >> (WORD_WIDTH - FIRST_LEVEL_WIDTH - SECOND_LEVEL_WIDTH))
            & ((SECOND_LEVEL_SIZE - 1) as u32)) as usize
    }
    /// The page offset
    fn page_offset(address: u32) -> usize {
        (address & ((PAGE_SIZE - 1) as u32)) as usize
    }

    /// Number of allocated pages
    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Registers the memory statistics with `db`
    pub fn register_stats(&self, db: &mut StatRegistry) {
        db.reg_counter("mem.page_count", "total number of pages allocated", self.pages as u64);
        db.reg_counter(
            "mem.page_mem",
            "total size of memory pages allocated in bytes",
            (self.pages * PAGE_SIZE) as u64,
        );
    }

    /// Check if a page is allocated at the given address
    pub fn page_exists(&self, address: u32) -> bool {
        self.page(address).is_some()
    }

    /// Allocate a page of memory at the given address.
    /// Returns true iff a new page was allocated
    pub fn allocate_page(&mut self, address: u32) -> bool {
        let (i, j) = (
            Self::first_level_index(address),
            Self::second_level_index(address),
        );

        let second_level =
            self.data[i].get_or_insert_with(|| vec![None; SECOND_LEVEL_SIZE]);
        if second_level[j].is_none() {
            second_level[j] = Some(Box::new([0; PAGE_SIZE]));
            self.pages += 1;
            true
        } else {
            false
        }
    }

    /// Allocate every page overlapping `[start, start + len)`
    pub fn allocate_range(&mut self, start: u32, len: u32) {
        if len == 0 {
            return;
        }
        let first = start & !((PAGE_SIZE - 1) as u32);
        let last = start.wrapping_add(len - 1) & !((PAGE_SIZE - 1) as u32);
        let mut page = first;
        loop {
            self.allocate_page(page);
            if page == last {
                break;
            }
            page = page.wrapping_add(PAGE_SIZE as u32);
        }
    }

    fn page(&self, address: u32) -> Option<&PageType> {
        self.data[Self::first_level_index(address)]
            .as_ref()
            .and_then(|second| second[Self::second_level_index(address)].as_ref())
    }

    fn page_mut(&mut self, address: u32) -> Option<&mut PageType> {
        self.data[Self::first_level_index(address)]
            .as_mut()
            .and_then(|second| second[Self::second_level_index(address)].as_mut())
    }
}

impl Memory for MMU {
    fn get8(&mut self, address: u32) -> Result<u8, MemoryError> {
        self.page(address)
            .map(|page| page[Self::page_offset(address)])
            .ok_or(MemoryError::AccessError {
                address,
                kind: MemoryErrorKind::ReadUnallocated,
            })
    }

    fn set8(&mut self, address: u32, byte: u8) -> Result<(), MemoryError> {
        let page = self.page_mut(address).ok_or(MemoryError::AccessError {
            address,
            kind: MemoryErrorKind::WriteUnallocated,
        })?;
        page[Self::page_offset(address)] = byte;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatValue;

    #[test]
    fn test_page_exists() {
        let mut memory = MMU::make();
        let address = 0x12345678;

        assert!(!memory.page_exists(address));
        memory.allocate_page(address);
        assert!(memory.page_exists(address));
    }

    #[test]
    fn test_allocate_page() {
        let mut memory = MMU::make();
        let address = 0x12345678;

        assert!(memory.allocate_page(address));
        assert!(!memory.allocate_page(address));
        assert_eq!(memory.page_count(), 1);
    }

    #[test]
    fn test_allocate_range_spans_pages() {
        let mut memory = MMU::make();
        memory.allocate_range(0x0ffc, 8);
        assert!(memory.page_exists(0x0000));
        assert!(memory.page_exists(0x1000));
        assert!(!memory.page_exists(0x2000));
        assert_eq!(memory.page_count(), 2);
    }

    #[test]
    fn test_unallocated_access_faults() {
        let mut memory = MMU::make();
        assert_eq!(
            memory.get8(0x4000),
            Err(MemoryError::AccessError {
                address: 0x4000,
                kind: MemoryErrorKind::ReadUnallocated
            })
        );
        assert!(memory.set8(0x4000, 1).is_err());
    }

    #[test]
    fn test_wide_access_little_endian() {
        let mut memory = MMU::make();
        memory.allocate_page(0x1000);
        memory.set32(0x1000, 0x1122_3344).unwrap();
        assert_eq!(memory.get8(0x1000).unwrap(), 0x44);
        assert_eq!(memory.get16(0x1002).unwrap(), 0x1122);
        assert_eq!(memory.get(0x1000, 4).unwrap(), 0x1122_3344);
        assert_eq!(
            memory.get32(0x1002),
            Err(MemoryError::AlignmentError(0x1002, 4))
        );
    }

    #[test]
    fn test_by_hand() {
        let mut memory = MMU::make();
        assert!(memory.allocate_page(0x1000));

        // Make a string "Birds aren't real"
        let s: &[u8] = b"Birds aren't real";
        for (i, byte) in s.iter().enumerate() {
            memory.set8(0x1000 + i as u32, *byte).unwrap();
        }
        for (i, byte) in s.iter().enumerate() {
            assert_eq!(memory.get8(0x1000 + i as u32).unwrap(), *byte);
        }
    }

    #[test]
    fn test_register_stats() {
        let mut memory = MMU::make();
        memory.allocate_range(0x1000, 0x1001);
        let mut db = StatRegistry::new();
        memory.register_stats(&mut db);
        assert_eq!(db.get("mem.page_count"), Some(StatValue::Counter(2)));
        assert_eq!(db.get("mem.page_mem"), Some(StatValue::Counter(2 * PAGE_SIZE as u64)));
    }
}
