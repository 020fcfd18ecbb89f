//! # strata_memory - Arena Memory
//!
//! One contiguous, zero-initialised block per process:
//!
//! ```text
//! ┌──────────────┬──────────────────────┬──────────────────────────────┐
//! │ ArenaHeader  │ editor region        │ engine region                │
//! │ (host)       │ (host scratch)       │ (engine core private state)  │
//! └──────────────┴──────────────────────┴──────────────────────────────┘
//! ```
//!
//! - [`Arena`]: the host-owned block, carved into regions.
//! - [`RegionAllocator`]: bump allocation inside a region, with its
//!   bookkeeping stored in the region so it survives engine reloads.

pub mod arena;
mod error;
pub mod region;

pub use arena::{Arena, ArenaHeader, Region, RegionDesc};
pub use error::{ArenaError, Result};
pub use region::RegionAllocator;

/// Align a value up to the given alignment
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Align a size up to the given alignment, or `None` on overflow
#[inline]
pub const fn checked_align_up(value: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    match value.checked_add(align - 1) {
        Some(padded) => Some(padded & !(align - 1)),
        None => None,
    }
}

/// Check if a pointer is aligned
#[inline]
pub fn is_aligned(ptr: *const u8, align: usize) -> bool {
    (ptr as usize) & (align - 1) == 0
}
