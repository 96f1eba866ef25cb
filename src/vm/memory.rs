//! # Linear Memory
//!
//! The flat byte memory owned by one App, with a C-style arena allocator
//! on top. Every access is bounds-checked: an address/length pair outside
//! the live region yields `VmError::MemoryFault`, never host corruption.

use crate::errors::VmError;
use std::collections::BTreeMap;

/// Offset 0 is reserved so a zero pointer always means NULL.
const HEAP_BASE: u64 = 8;

/// One allocator block.
#[derive(Clone, Copy, Debug)]
struct Block {
    size: u64,
    free: bool,
}

/// Byte-addressable memory exclusively owned by one App instance.
///
/// Grows on demand up to a configured ceiling; never shared across apps.
#[derive(Debug)]
pub struct LinearMemory {
    data: Vec<u8>,
    initial_size: usize,
    max_size: usize,
    /// Allocator blocks keyed by offset. Adjacent free blocks are coalesced.
    blocks: BTreeMap<u64, Block>,
}

impl LinearMemory {
    /// Creates memory of `initial_size` bytes, growable to `max_size`.
    #[must_use]
    pub fn new(initial_size: usize, max_size: usize) -> Self {
        Self {
            data: vec![0u8; initial_size],
            initial_size,
            max_size,
            blocks: BTreeMap::new(),
        }
    }

    /// Current memory size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the memory region is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resets to the initial zeroed image, discarding all allocations.
    pub fn reset(&mut self) {
        self.data.clear();
        self.data.resize(self.initial_size, 0);
        self.blocks.clear();
    }

    // -------------------------------------------------------------------------
    // Bounds-checked access
    // -------------------------------------------------------------------------

    fn check_range(&self, offset: u64, len: u64) -> Result<(), VmError> {
        let end = offset
            .checked_add(len)
            .ok_or(VmError::MemoryFault { offset, len })?;
        if end > self.data.len() as u64 {
            return Err(VmError::MemoryFault { offset, len });
        }
        Ok(())
    }

    /// Reads `len` bytes at `offset`.
    pub fn read(&self, offset: u64, len: u64) -> Result<&[u8], VmError> {
        self.check_range(offset, len)?;
        Ok(&self.data[offset as usize..(offset + len) as usize])
    }

    /// Writes `data` at `offset`.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), VmError> {
        self.check_range(offset, data.len() as u64)?;
        self.data[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Fills `len` bytes at `offset` with `byte` (memset).
    pub fn fill(&mut self, offset: u64, len: u64, byte: u8) -> Result<(), VmError> {
        self.check_range(offset, len)?;
        self.data[offset as usize..(offset + len) as usize].fill(byte);
        Ok(())
    }

    /// Copies `len` bytes from `src` to `dest`, overlap-safe (memmove).
    pub fn copy_within(&mut self, dest: u64, src: u64, len: u64) -> Result<(), VmError> {
        self.check_range(src, len)?;
        self.check_range(dest, len)?;
        self.data
            .copy_within(src as usize..(src + len) as usize, dest as usize);
        Ok(())
    }

    /// Reads the NUL-terminated string starting at `ptr` (without the NUL).
    ///
    /// # Errors
    ///
    /// `MemoryFault` if `ptr` is out of bounds or no NUL exists before the
    /// end of memory.
    pub fn cstr(&self, ptr: u64) -> Result<&[u8], VmError> {
        if ptr >= self.data.len() as u64 {
            return Err(VmError::MemoryFault {
                offset: ptr,
                len: 1,
            });
        }
        let tail = &self.data[ptr as usize..];
        match tail.iter().position(|&b| b == 0) {
            Some(pos) => Ok(&tail[..pos]),
            None => Err(VmError::MemoryFault {
                offset: ptr,
                len: tail.len() as u64,
            }),
        }
    }

    /// Length of the NUL-terminated string at `ptr`.
    pub fn cstr_len(&self, ptr: u64) -> Result<u64, VmError> {
        Ok(self.cstr(ptr)?.len() as u64)
    }

    // -------------------------------------------------------------------------
    // Arena allocator
    // -------------------------------------------------------------------------

    /// Allocates `size` bytes and returns the offset (NULL for size 0).
    ///
    /// Reuses the first fitting free block, otherwise grows the region.
    pub fn alloc(&mut self, size: u64) -> Result<u64, VmError> {
        if size == 0 {
            return Ok(0);
        }

        // First-fit over free blocks.
        let found = self
            .blocks
            .iter()
            .find(|(_, b)| b.free && b.size >= size)
            .map(|(&off, &b)| (off, b));

        if let Some((off, block)) = found {
            // Split when the remainder is worth keeping.
            if block.size > size + 16 {
                self.blocks.insert(off, Block { size, free: false });
                self.blocks.insert(
                    off + size,
                    Block {
                        size: block.size - size,
                        free: true,
                    },
                );
            } else {
                self.blocks.insert(
                    off,
                    Block {
                        size: block.size,
                        free: false,
                    },
                );
            }
            return Ok(off);
        }

        // Fresh block at the top of the heap.
        let top = self
            .blocks
            .iter()
            .next_back()
            .map_or(HEAP_BASE, |(&off, b)| off + b.size);
        let end = top
            .checked_add(size)
            .ok_or(VmError::MemoryFault { offset: top, len: size })?;
        self.grow_to(end)?;
        self.blocks.insert(top, Block { size, free: false });
        Ok(top)
    }

    /// Releases the block at `ptr`. Freeing NULL is a no-op.
    ///
    /// # Errors
    ///
    /// `MemoryFault` if `ptr` does not name a live allocation.
    pub fn free(&mut self, ptr: u64) -> Result<(), VmError> {
        if ptr == 0 {
            return Ok(());
        }
        match self.blocks.get_mut(&ptr) {
            Some(block) if !block.free => {
                block.free = true;
                self.coalesce(ptr);
                Ok(())
            }
            _ => Err(VmError::MemoryFault {
                offset: ptr,
                len: 0,
            }),
        }
    }

    /// Resizes the allocation at `ptr`; contents are preserved up to the
    /// smaller of the old and new sizes. `ptr == 0` behaves like `alloc`.
    pub fn realloc(&mut self, ptr: u64, size: u64) -> Result<u64, VmError> {
        if ptr == 0 {
            return self.alloc(size);
        }
        if size == 0 {
            self.free(ptr)?;
            return Ok(0);
        }
        let old_size = self.block_size(ptr).ok_or(VmError::MemoryFault {
            offset: ptr,
            len: 0,
        })?;
        if size <= old_size {
            return Ok(ptr);
        }
        let new_ptr = self.alloc(size)?;
        let src = self.read(ptr, old_size)?.to_vec();
        self.write(new_ptr, &src)?;
        self.free(ptr)?;
        Ok(new_ptr)
    }

    /// Size of the live allocation at `ptr`, if any.
    #[must_use]
    pub fn block_size(&self, ptr: u64) -> Option<u64> {
        self.blocks
            .get(&ptr)
            .filter(|b| !b.free)
            .map(|b| b.size)
    }

    /// Allocates and writes `bytes` followed by a terminating NUL; returns
    /// the offset of the new string.
    pub fn alloc_write_cstr(&mut self, bytes: &[u8]) -> Result<u64, VmError> {
        let ptr = self.alloc(bytes.len() as u64 + 1)?;
        self.write(ptr, bytes)?;
        self.write(ptr + bytes.len() as u64, &[0])?;
        Ok(ptr)
    }

    /// Allocates and writes raw `bytes`; returns the offset.
    pub fn alloc_write(&mut self, bytes: &[u8]) -> Result<u64, VmError> {
        if bytes.is_empty() {
            return Ok(0);
        }
        let ptr = self.alloc(bytes.len() as u64)?;
        self.write(ptr, bytes)?;
        Ok(ptr)
    }

    fn grow_to(&mut self, end: u64) -> Result<(), VmError> {
        if end <= self.data.len() as u64 {
            return Ok(());
        }
        if end > self.max_size as u64 {
            return Err(VmError::MemoryLimitExceeded {
                requested: end,
                max: self.max_size as u64,
            });
        }
        // Double to amortize growth, capped at the ceiling.
        let new_len = (self.data.len() * 2)
            .max(end as usize)
            .min(self.max_size);
        self.data.resize(new_len, 0);
        Ok(())
    }

    fn coalesce(&mut self, ptr: u64) {
        // Merge with the following free block.
        if let Some(&block) = self.blocks.get(&ptr) {
            let next_off = ptr + block.size;
            if let Some(&next) = self.blocks.get(&next_off) {
                if next.free {
                    self.blocks.remove(&next_off);
                    self.blocks.insert(
                        ptr,
                        Block {
                            size: block.size + next.size,
                            free: true,
                        },
                    );
                }
            }
        }
        // Merge with a preceding free block.
        if let Some((&prev_off, &prev)) = self.blocks.range(..ptr).next_back() {
            if prev.free && prev_off + prev.size == ptr {
                if let Some(&block) = self.blocks.get(&ptr) {
                    if block.free {
                        self.blocks.remove(&ptr);
                        self.blocks.insert(
                            prev_off,
                            Block {
                                size: prev.size + block.size,
                                free: true,
                            },
                        );
                    }
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn mem() -> LinearMemory {
        LinearMemory::new(4096, 64 * 1024)
    }

    #[test]
    fn test_alloc_free_reuse() {
        let mut m = mem();
        let a = m.alloc(100).unwrap();
        assert!(a >= HEAP_BASE);
        assert_eq!(m.block_size(a), Some(100));

        m.free(a).unwrap();
        assert_eq!(m.block_size(a), None);

        // Freed block is reused.
        let b = m.alloc(80).unwrap();
        assert_eq!(b, a);
    }

    #[test]
    fn test_alloc_zero_is_null() {
        let mut m = mem();
        assert_eq!(m.alloc(0).unwrap(), 0);
    }

    #[test]
    fn test_free_null_noop() {
        let mut m = mem();
        m.free(0).unwrap();
    }

    #[test]
    fn test_double_free_faults() {
        let mut m = mem();
        let a = m.alloc(10).unwrap();
        m.free(a).unwrap();
        assert!(matches!(m.free(a), Err(VmError::MemoryFault { .. })));
    }

    #[test]
    fn test_free_bad_ptr_faults() {
        let mut m = mem();
        assert!(matches!(m.free(12345), Err(VmError::MemoryFault { .. })));
    }

    #[test]
    fn test_realloc_preserves_contents() {
        let mut m = mem();
        let a = m.alloc(4).unwrap();
        m.write(a, b"abcd").unwrap();

        let b = m.realloc(a, 100).unwrap();
        assert_eq!(m.read(b, 4).unwrap(), b"abcd");
        assert_eq!(m.block_size(b), Some(100));
    }

    #[test]
    fn test_read_write_bounds() {
        let mut m = mem();
        m.write(0, &[1, 2, 3]).unwrap();
        assert_eq!(m.read(0, 3).unwrap(), &[1, 2, 3]);

        let len = m.len() as u64;
        assert!(matches!(
            m.read(len, 1),
            Err(VmError::MemoryFault { .. })
        ));
        assert!(matches!(
            m.write(len - 1, &[1, 2]),
            Err(VmError::MemoryFault { .. })
        ));
        // Offset overflow must not wrap.
        assert!(matches!(
            m.read(u64::MAX, 2),
            Err(VmError::MemoryFault { .. })
        ));
    }

    #[test]
    fn test_copy_within_overlapping() {
        let mut m = mem();
        m.write(0, &[1, 2, 3, 4, 5]).unwrap();
        m.copy_within(2, 0, 4).unwrap();
        assert_eq!(m.read(0, 6).unwrap(), &[1, 2, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cstr() {
        let mut m = mem();
        let p = m.alloc_write_cstr(b"hello").unwrap();
        assert_eq!(m.cstr(p).unwrap(), b"hello");
        assert_eq!(m.cstr_len(p).unwrap(), 5);
    }

    #[test]
    fn test_cstr_unterminated_faults() {
        let mut m = LinearMemory::new(8, 8);
        m.write(0, &[1; 8]).unwrap(); // no NUL anywhere
        assert!(matches!(m.cstr(0), Err(VmError::MemoryFault { .. })));
    }

    #[test]
    fn test_growth_and_limit() {
        let mut m = LinearMemory::new(16, 64);
        let a = m.alloc(32).unwrap();
        assert!(m.len() >= 40);
        m.free(a).unwrap();

        assert!(matches!(
            m.alloc(1024),
            Err(VmError::MemoryLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_reset_clears_heap() {
        let mut m = mem();
        let a = m.alloc(10).unwrap();
        m.write(a, b"x").unwrap();
        m.reset();
        assert_eq!(m.block_size(a), None);
        assert_eq!(m.read(a, 1).unwrap(), &[0]);
    }

    #[test]
    fn test_coalesce_allows_large_realloc() {
        let mut m = mem();
        let a = m.alloc(100).unwrap();
        let b = m.alloc(100).unwrap();
        m.free(a).unwrap();
        m.free(b).unwrap();
        // Coalesced into one 200-byte block starting at `a`.
        let c = m.alloc(200).unwrap();
        assert_eq!(c, a);
    }
}
