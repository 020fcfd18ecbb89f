//! Arena-resident engine state
//!
//! Everything the engine core knows lives in its region of the arena and
//! nowhere else, so swapping the code underneath leaves it untouched. All
//! types are `#[repr(C)]` and valid when zeroed.

use std::mem::size_of;

use strata_abi::{EngineMemory, PlatformApi};
use strata_memory::RegionAllocator;

use crate::assets::AssetRegistry;
use crate::heightmap::{Heightmap, HEIGHTMAP_SAMPLES};
use crate::scene::Scene;
use crate::transaction::{TransactionSlot, MAX_TRANSACTIONS};

/// Identifies initialised engine state
pub const STATE_MAGIC: u64 = u64::from_le_bytes(*b"ENGSTATE");

/// Bump whenever any arena-resident type changes shape
pub const STATE_LAYOUT_VERSION: u32 = 1;

#[repr(C)]
pub struct EngineState {
    pub magic: u64,
    pub layout_version: u32,
    /// Number of times this state has been resumed by freshly loaded code
    pub resume_count: u32,
    pub scene: Scene,
    pub assets: AssetRegistry,
    pub heightmap: Heightmap,
    pub transactions: [TransactionSlot; MAX_TRANSACTIONS],
}

/// Borrowed view of the engine for the duration of one entry point call
pub struct Engine<'a> {
    pub state: &'a mut EngineState,
    pub platform: &'a PlatformApi,
    pub allocator: RegionAllocator,
}

impl<'a> Engine<'a> {
    /// Resolve the state of an already initialised engine
    ///
    /// # Safety
    /// `memory` must be null or point to a live descriptor whose region
    /// and platform table outlive `'a`.
    pub unsafe fn from_memory(memory: *mut EngineMemory) -> Option<Self> {
        let (allocator, platform) = attach(memory)?;
        let state = allocator.root()? as *mut EngineState;
        let state = &mut *state;
        if state.magic != STATE_MAGIC || state.layout_version != STATE_LAYOUT_VERSION {
            return None;
        }
        Some(Self { state, platform, allocator })
    }

    /// Resume existing state or build it from scratch
    ///
    /// # Safety
    /// Same contract as [`Engine::from_memory`].
    pub unsafe fn initialize(memory: *mut EngineMemory) -> Option<Self> {
        let (allocator, platform) = attach(memory)?;

        if let Some(root) = allocator.root() {
            let state = &mut *(root as *mut EngineState);
            if state.magic == STATE_MAGIC && state.layout_version == STATE_LAYOUT_VERSION {
                state.resume_count += 1;
                log_platform!(
                    platform,
                    Info,
                    "Resuming engine state ({} objects, {} materials, {} assets)",
                    state.scene.object_count,
                    state.scene.material_count,
                    state.assets.count
                );
                return Some(Self { state, platform, allocator });
            }
            log_platform!(
                platform,
                Warn,
                "Engine state layout v{} does not match v{}, discarding it",
                state.layout_version,
                STATE_LAYOUT_VERSION
            );
            allocator.reset();
        }

        let Some(state_ptr) = allocator.alloc_array::<EngineState>(1) else {
            log_platform!(
                platform,
                Error,
                "Engine region of {} bytes cannot hold {} bytes of state",
                allocator.capacity(),
                size_of::<EngineState>()
            );
            return None;
        };
        let Some(samples) = allocator.alloc_array::<u16>(HEIGHTMAP_SAMPLES) else {
            log_platform!(platform, Error, "Engine region too small for the heightmap");
            allocator.reset();
            return None;
        };

        // Both allocations may hold bytes from a discarded layout
        std::ptr::write_bytes(state_ptr as *mut u8, 0, size_of::<EngineState>());
        std::ptr::write_bytes(samples, 0, HEIGHTMAP_SAMPLES);

        let state = &mut *state_ptr;
        state.magic = STATE_MAGIC;
        state.layout_version = STATE_LAYOUT_VERSION;
        state.scene.next_object_id = 1;
        state.scene.next_material_id = 1;
        state.assets.next_id = 1;
        state.heightmap.samples_offset = allocator.offset_of(samples as *const u8).unwrap_or(0);
        allocator.set_root(state_ptr as *const u8);

        let mut engine = Self { state, platform, allocator };
        engine.register_heightmap_asset();

        log_platform!(
            platform,
            Info,
            "Initialised engine state ({} KiB of {} KiB region)",
            engine.allocator.used() / 1024,
            engine.allocator.capacity() / 1024
        );
        Some(engine)
    }
}

unsafe fn attach<'a>(memory: *mut EngineMemory) -> Option<(RegionAllocator, &'a PlatformApi)> {
    let memory = memory.as_ref()?;
    let platform = memory.platform.as_ref()?;
    let size = usize::try_from(memory.size).ok()?;
    let (allocator, _fresh) = RegionAllocator::attach(memory.base, size)?;
    Some((allocator, platform))
}
