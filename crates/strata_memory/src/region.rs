//! Region allocator - linear allocation that survives code reloads
//!
//! Unlike a heap-backed arena, all bookkeeping lives in the first bytes of
//! the region itself. Re-attaching to the same region after the engine
//! core is reloaded resumes exactly where the previous code left off.
//!
//! Not thread-safe: callers serialise access (the host holds its reload
//! lock around every engine call).

use std::mem::size_of;

use crate::{align_up, checked_align_up, is_aligned};

const REGION_MAGIC: u64 = u64::from_le_bytes(*b"STRATARG");

#[repr(C)]
struct RegionHeader {
    magic: u64,
    /// Bytes in use, header included
    used: u64,
    /// Offset of the owner's root object, 0 if unset
    root: u64,
}

const HEADER_LEN: usize = align_up(size_of::<RegionHeader>(), 16);

/// Bump allocator over a caller-owned region
pub struct RegionAllocator {
    base: *mut u8,
    size: usize,
}

impl RegionAllocator {
    /// Attach to a region, formatting it if it has never been attached
    ///
    /// Returns the allocator and whether the region was freshly formatted.
    ///
    /// # Safety
    /// `base` must point to `size` writable bytes, aligned to 16, that stay
    /// valid for as long as the allocator or its allocations are used.
    pub unsafe fn attach(base: *mut u8, size: usize) -> Option<(Self, bool)> {
        if base.is_null() || size < HEADER_LEN || !is_aligned(base, 16) {
            return None;
        }

        let allocator = Self { base, size };
        let header = allocator.header();
        let fresh = header.magic != REGION_MAGIC;
        if fresh {
            header.magic = REGION_MAGIC;
            header.used = HEADER_LEN as u64;
            header.root = 0;
        } else if header.used as usize > size {
            // Region shrank underneath us; nothing in it can be trusted
            return None;
        }

        Some((allocator, fresh))
    }

    #[allow(clippy::mut_from_ref)]
    fn header(&self) -> &mut RegionHeader {
        unsafe { &mut *(self.base as *mut RegionHeader) }
    }

    /// Allocate `size` bytes at `align`, or `None` when the region is full
    ///
    /// Returned memory is whatever the region held before; a fresh arena is
    /// zeroed.
    pub fn allocate(&self, size: usize, align: usize) -> Option<*mut u8> {
        let header = self.header();
        let base = self.base as usize;
        let current = header.used as usize;

        let aligned = checked_align_up(base.checked_add(current)? as u64, align as u64)? as usize;
        let aligned_offset = aligned - base;
        let new_offset = aligned_offset.checked_add(size)?;
        if new_offset > self.size {
            return None;
        }

        header.used = new_offset as u64;
        Some(unsafe { self.base.add(aligned_offset) })
    }

    /// Allocate room for `count` values of `T`
    pub fn alloc_array<T>(&self, count: usize) -> Option<*mut T> {
        let size = size_of::<T>().checked_mul(count)?;
        self.allocate(size, std::mem::align_of::<T>()).map(|ptr| ptr as *mut T)
    }

    /// Offset of `ptr` from the region base
    pub fn offset_of(&self, ptr: *const u8) -> Option<u64> {
        let p = ptr as usize;
        let base = self.base as usize;
        (p >= base && p < base + self.size).then(|| (p - base) as u64)
    }

    /// Pointer to a previously returned offset
    pub fn at(&self, offset: u64) -> Option<*mut u8> {
        let offset = usize::try_from(offset).ok()?;
        (offset >= HEADER_LEN && offset < self.size).then(|| unsafe { self.base.add(offset) })
    }

    /// Record the owner's root object
    pub fn set_root(&self, ptr: *const u8) {
        if let Some(offset) = self.offset_of(ptr) {
            self.header().root = offset;
        }
    }

    /// The owner's root object, if one was recorded
    pub fn root(&self) -> Option<*mut u8> {
        match self.header().root {
            0 => None,
            offset => self.at(offset),
        }
    }

    /// Forget every allocation and the root
    pub fn reset(&self) {
        let header = self.header();
        header.used = HEADER_LEN as u64;
        header.root = 0;
    }

    pub fn capacity(&self) -> usize {
        self.size
    }

    pub fn used(&self) -> usize {
        self.header().used as usize
    }

    pub fn available(&self) -> usize {
        self.capacity() - self.used()
    }
}
