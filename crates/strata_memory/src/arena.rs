//! Process arena - one zero-initialised block, carved into regions
//!
//! The host reserves the arena once at startup. Its base address never
//! changes afterwards, so pointers into it stay valid across engine reloads.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::mem::size_of;
use std::ptr::NonNull;

use crate::{align_up, checked_align_up};
use crate::error::{ArenaError, Result};

/// Identifies an arena header written by this crate
pub const ARENA_MAGIC: u64 = u64::from_le_bytes(*b"STRATA\x00\x01");

/// Version of [`ArenaHeader`]
pub const ARENA_LAYOUT_VERSION: u32 = 1;

/// Alignment of the arena base
pub const ARENA_ALIGN: usize = 4096;

/// Alignment of every carved region
pub const REGION_ALIGN: usize = 64;

/// Offset and size of a region, relative to the arena base
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionDesc {
    pub offset: u64,
    pub size: u64,
}

/// Fixed header at the start of the arena
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ArenaHeader {
    pub magic: u64,
    pub layout_version: u32,
    pub _reserved: u32,
    /// Total arena size in bytes
    pub size: u64,
    pub editor: RegionDesc,
    pub engine: RegionDesc,
}

impl ArenaHeader {
    /// Bytes reserved for the header, rounded up to region alignment
    pub const RESERVED: usize = align_up(size_of::<ArenaHeader>(), REGION_ALIGN);
}

/// A carved region of the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub base: *mut u8,
    pub size: u64,
}

impl Region {
    /// View the region as bytes
    ///
    /// # Safety
    /// No other live reference may alias the region, and the arena must
    /// outlive the returned slice.
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        std::slice::from_raw_parts_mut(self.base, self.size as usize)
    }

    /// Check whether `ptr..ptr+len` lies inside the region
    pub fn contains(&self, ptr: *const u8, len: usize) -> bool {
        let start = self.base as usize;
        let end = start + self.size as usize;
        let p = ptr as usize;
        p >= start && p.checked_add(len).map_or(false, |e| e <= end)
    }
}

/// The process arena
///
/// `used` only grows; regions are never returned. Sub-allocation inside a
/// region belongs to whoever owns the region.
pub struct Arena {
    base: NonNull<u8>,
    layout: Layout,
    used: u64,
}

// Safety: the arena is a plain block of bytes; concurrent access to the
// regions it hands out is coordinated by their owners
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    /// Reserve and commit a zero-initialised arena of `total_bytes`
    ///
    /// The returned arena has `used == ArenaHeader::RESERVED`.
    pub fn initialize(total_bytes: u64) -> Result<Self> {
        if total_bytes < ArenaHeader::RESERVED as u64 {
            return Err(ArenaError::InvalidSize(total_bytes));
        }
        let size = usize::try_from(total_bytes).map_err(|_| ArenaError::InvalidSize(total_bytes))?;
        let layout = Layout::from_size_align(size, ARENA_ALIGN)
            .map_err(|_| ArenaError::InvalidSize(total_bytes))?;

        let ptr = unsafe { alloc_zeroed(layout) };
        let base = NonNull::new(ptr).ok_or(ArenaError::AllocationFailed { size: total_bytes })?;

        let arena = Self {
            base,
            layout,
            used: ArenaHeader::RESERVED as u64,
        };

        unsafe {
            arena.header_ptr().write(ArenaHeader {
                magic: ARENA_MAGIC,
                layout_version: ARENA_LAYOUT_VERSION,
                _reserved: 0,
                size: total_bytes,
                editor: RegionDesc::default(),
                engine: RegionDesc::default(),
            });
        }

        log::info!(
            "Reserved arena of {} KiB at {:p}",
            total_bytes / 1024,
            arena.base.as_ptr()
        );
        Ok(arena)
    }

    /// Reserve an arena sized for the header plus both regions and carve them
    pub fn with_regions(editor_region_size: u64, engine_region_size: u64) -> Result<Self> {
        let editor = checked_align_up(editor_region_size, REGION_ALIGN as u64)
            .ok_or(ArenaError::InvalidSize(editor_region_size))?;
        let engine = checked_align_up(engine_region_size, REGION_ALIGN as u64)
            .ok_or(ArenaError::InvalidSize(engine_region_size))?;
        let total = (ArenaHeader::RESERVED as u64)
            .checked_add(editor)
            .and_then(|t| t.checked_add(engine))
            .ok_or(ArenaError::InvalidSize(u64::MAX))?;

        let mut arena = Self::initialize(total)?;
        let editor_desc = arena.carve(editor)?;
        let engine_desc = arena.carve(engine)?;

        let header = arena.header_mut();
        header.editor = editor_desc;
        header.engine = engine_desc;
        Ok(arena)
    }

    /// Carve `size` bytes off the unused tail
    pub fn carve(&mut self, size: u64) -> Result<RegionDesc> {
        let offset =
            checked_align_up(self.used, REGION_ALIGN as u64).ok_or(ArenaError::InvalidSize(size))?;
        let available = self.size().saturating_sub(offset);
        if size > available {
            return Err(ArenaError::Exhausted { requested: size, available });
        }
        self.used = offset + size;
        Ok(RegionDesc { offset, size })
    }

    /// Resolve a region descriptor to an address range
    pub fn region(&self, desc: RegionDesc) -> Option<Region> {
        if desc.size == 0 || desc.offset.checked_add(desc.size)? > self.used {
            return None;
        }
        Some(Region {
            base: unsafe { self.base.as_ptr().add(desc.offset as usize) },
            size: desc.size,
        })
    }

    pub fn editor_region(&self) -> Option<Region> {
        self.region(self.header().editor)
    }

    pub fn engine_region(&self) -> Option<Region> {
        self.region(self.header().engine)
    }

    pub fn header(&self) -> &ArenaHeader {
        unsafe { &*self.header_ptr() }
    }

    fn header_mut(&mut self) -> &mut ArenaHeader {
        unsafe { &mut *self.header_ptr() }
    }

    fn header_ptr(&self) -> *mut ArenaHeader {
        self.base.as_ptr() as *mut ArenaHeader
    }

    pub fn base_address(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    pub fn size(&self) -> u64 {
        self.layout.size() as u64
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn available(&self) -> u64 {
        self.size() - self.used
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        log::debug!("Releasing arena at {:p}", self.base.as_ptr());
        unsafe { dealloc(self.base.as_ptr(), self.layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_reserves_header() {
        let arena = Arena::initialize(4096).unwrap();
        assert_eq!(arena.used(), ArenaHeader::RESERVED as u64);
        assert_eq!(arena.size(), 4096);
        assert_eq!(arena.header().magic, ARENA_MAGIC);
        assert_eq!(arena.base_address() as usize % ARENA_ALIGN, 0);
    }

    #[test]
    fn test_initialize_rejects_tiny_arena() {
        assert!(matches!(Arena::initialize(8), Err(ArenaError::InvalidSize(8))));
    }

    #[test]
    fn test_regions_are_zeroed_and_disjoint() {
        let arena = Arena::with_regions(1000, 4096).unwrap();
        let editor = arena.editor_region().unwrap();
        let engine = arena.engine_region().unwrap();

        assert_eq!(editor.size, 1024);
        assert_eq!(engine.size, 4096);
        assert!(editor.base as usize + editor.size as usize <= engine.base as usize);
        assert!(crate::is_aligned(editor.base, REGION_ALIGN));
        assert!(crate::is_aligned(engine.base, REGION_ALIGN));
        assert!(arena.used() <= arena.size());

        let bytes = unsafe { engine.as_mut_slice() };
        assert!(bytes.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_oversized_regions_are_rejected() {
        assert!(matches!(
            Arena::with_regions(u64::MAX - 10, 4096),
            Err(ArenaError::InvalidSize(_))
        ));
        assert!(matches!(
            Arena::with_regions(4096, u64::MAX - 10),
            Err(ArenaError::InvalidSize(_))
        ));
        assert!(matches!(
            Arena::with_regions(u64::MAX / 2, u64::MAX / 2),
            Err(ArenaError::InvalidSize(_))
        ));
    }

    #[test]
    fn test_carve_exhaustion() {
        let mut arena = Arena::initialize(1024).unwrap();
        arena.carve(512).unwrap();
        let err = arena.carve(4096).unwrap_err();
        assert!(matches!(err, ArenaError::Exhausted { requested: 4096, .. }));
        assert!(arena.used() <= arena.size());
    }

    #[test]
    fn test_region_contains() {
        let arena = Arena::with_regions(256, 256).unwrap();
        let editor = arena.editor_region().unwrap();
        assert!(editor.contains(editor.base, 256));
        assert!(!editor.contains(editor.base, 257));
    }

    #[test]
    fn test_unknown_region_is_none() {
        let arena = Arena::initialize(4096).unwrap();
        assert!(arena.engine_region().is_none());
    }
}
