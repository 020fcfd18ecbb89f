//! Asset registry
//!
//! The engine decides which assets exist and whether they are current; the
//! host does the file reads. Every change to a registration is announced
//! through `notify_asset_registered` with a record that only lives for the
//! duration of the call.

use std::ffi::c_void;

use strata_abi::{
    AssetMetadata, AssetRegistration, AssetType, CompositeAssetState, FfiStr, FileAssetState,
    LoadedAsset, RegistrationType, MAX_COMPOSITE_COMPONENTS,
};

use crate::heightmap::HEIGHTMAP_SAMPLES;
use crate::state::Engine;

pub const MAX_ASSETS: usize = 256;
pub const MAX_ASSET_PATH: usize = 256;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct AssetSlot {
    pub id: u32,
    pub registration_type: u32,
    pub asset_type: u32,
    pub version: u32,
    pub last_write_time: u64,
    /// Host-owned bytes for file assets, arena bytes for virtual ones
    pub data: *const u8,
    pub data_size: u64,
    pub is_up_to_date: u8,
    pub is_load_queued: u8,
    pub path_len: u16,
    pub component_count: u32,
    pub components: [u32; MAX_COMPOSITE_COMPONENTS],
    pub path: [u8; MAX_ASSET_PATH],
}

impl AssetSlot {
    pub fn path(&self) -> &[u8] {
        &self.path[..self.path_len as usize]
    }

    fn registration_type(&self) -> Option<RegistrationType> {
        RegistrationType::from_raw(self.registration_type)
    }
}

#[repr(C)]
pub struct AssetRegistry {
    pub next_id: u32,
    pub count: u32,
    pub heightmap_asset_id: u32,
    pub _reserved: u32,
    pub slots: [AssetSlot; MAX_ASSETS],
}

impl AssetRegistry {
    pub fn slots(&self) -> &[AssetSlot] {
        &self.slots[..self.count as usize]
    }

    fn index_of(&self, id: u32) -> Option<usize> {
        self.slots().iter().position(|s| s.id == id)
    }

    fn push(&mut self, mut slot: AssetSlot) -> Option<usize> {
        let index = self.count as usize;
        if index >= MAX_ASSETS {
            return None;
        }
        slot.id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.slots[index] = slot;
        self.count += 1;
        Some(index)
    }
}

fn empty_slot(registration_type: RegistrationType, asset_type: u32) -> AssetSlot {
    AssetSlot {
        id: 0,
        registration_type: registration_type as u32,
        asset_type,
        version: 0,
        last_write_time: 0,
        data: std::ptr::null(),
        data_size: 0,
        is_up_to_date: 0,
        is_load_queued: 0,
        path_len: 0,
        component_count: 0,
        components: [0; MAX_COMPOSITE_COMPONENTS],
        path: [0; MAX_ASSET_PATH],
    }
}

impl<'a> Engine<'a> {
    /// Register the heightmap as a virtual asset backed by the arena
    pub(crate) fn register_heightmap_asset(&mut self) {
        let samples = self.heightmap_samples_ptr();
        let mut slot = empty_slot(RegistrationType::Virtual, AssetType::Heightmap as u32);
        slot.version = 1;
        slot.is_up_to_date = 1;
        slot.data = samples as *const u8;
        slot.data_size = (HEIGHTMAP_SAMPLES * std::mem::size_of::<u16>()) as u64;

        if let Some(index) = self.state.assets.push(slot) {
            self.state.assets.heightmap_asset_id = self.state.assets.slots[index].id;
            self.notify_asset(index);
        }
    }

    /// Register a file asset and queue its first load
    ///
    /// Registering a path twice returns the existing id.
    pub fn register_file_asset(&mut self, asset_type: u32, relative_path: &str) -> u32 {
        let bytes = relative_path.as_bytes();
        if bytes.is_empty() || bytes.len() > MAX_ASSET_PATH {
            log_platform!(self.platform, Error, "Rejected asset path '{}'", relative_path);
            return 0;
        }

        let existing = self.state.assets.slots().iter().find(|s| {
            s.registration_type() == Some(RegistrationType::File) && s.path() == bytes
        });
        if let Some(slot) = existing {
            return slot.id;
        }

        let mut slot = empty_slot(RegistrationType::File, asset_type);
        slot.path[..bytes.len()].copy_from_slice(bytes);
        slot.path_len = bytes.len() as u16;
        slot.last_write_time =
            (self.platform.get_file_last_write_time)(self.platform.host, FfiStr::new(relative_path));

        let Some(index) = self.state.assets.push(slot) else {
            log_platform!(self.platform, Error, "Asset registry full ({} assets)", MAX_ASSETS);
            return 0;
        };
        self.queue_load(index);
        self.state.assets.slots[index].id
    }

    /// Register an asset composed of up to four other assets
    pub fn register_composite_asset(&mut self, asset_type: u32, components: &[u32]) -> u32 {
        if components.is_empty() || components.len() > MAX_COMPOSITE_COMPONENTS {
            log_platform!(
                self.platform,
                Error,
                "Composite assets take 1 to {} components, got {}",
                MAX_COMPOSITE_COMPONENTS,
                components.len()
            );
            return 0;
        }
        if let Some(missing) = components.iter().find(|id| self.state.assets.index_of(**id).is_none()) {
            log_platform!(self.platform, Error, "Composite references unknown asset {}", missing);
            return 0;
        }

        let mut slot = empty_slot(RegistrationType::Composite, asset_type);
        slot.component_count = components.len() as u32;
        slot.components[..components.len()].copy_from_slice(components);
        slot.version = 1;
        slot.is_up_to_date = 1;

        let Some(index) = self.state.assets.push(slot) else {
            log_platform!(self.platform, Error, "Asset registry full ({} assets)", MAX_ASSETS);
            return 0;
        };
        self.notify_asset(index);
        self.state.assets.slots[index].id
    }

    /// Take delivery of a file read by the host
    pub fn on_asset_loaded(&mut self, asset_id: u32, data: *const u8, len: u64) {
        let Some(index) = self.state.assets.index_of(asset_id) else {
            log_platform!(self.platform, Warn, "Load completed for unknown asset {}", asset_id);
            return;
        };

        let platform = self.platform;
        let slot = &mut self.state.assets.slots[index];
        if slot.registration_type() == Some(RegistrationType::File) {
            // Stamp with the file that was actually read
            let write_time =
                (platform.get_file_last_write_time)(platform.host, FfiStr::from_bytes(slot.path()));
            slot.last_write_time = slot.last_write_time.max(write_time);
        }
        slot.version = slot.version.wrapping_add(1);
        slot.data = data;
        slot.data_size = len;
        slot.is_up_to_date = 1;
        slot.is_load_queued = 0;
        self.notify_asset(index);

        // Composites built from this asset changed too
        let dependents: Vec<usize> = self
            .state
            .assets
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.registration_type() == Some(RegistrationType::Composite)
                    && s.components[..s.component_count as usize].contains(&asset_id)
            })
            .map(|(i, _)| i)
            .collect();
        for dependent in dependents {
            let slot = &mut self.state.assets.slots[dependent];
            slot.version = slot.version.wrapping_add(1);
            self.notify_asset(dependent);
        }
    }

    /// Re-queue file assets whose files changed since they were last queued
    pub fn refresh_file_assets(&mut self) {
        for index in 0..self.state.assets.count as usize {
            let slot = &self.state.assets.slots[index];
            if slot.registration_type() != Some(RegistrationType::File) || slot.is_load_queued != 0 {
                continue;
            }

            let write_time = (self.platform.get_file_last_write_time)(
                self.platform.host,
                FfiStr::from_bytes(slot.path()),
            );
            if write_time > slot.last_write_time {
                self.state.assets.slots[index].last_write_time = write_time;
                self.queue_load(index);
            }
        }
    }

    fn queue_load(&mut self, index: usize) {
        let slot = &mut self.state.assets.slots[index];
        slot.is_up_to_date = 0;
        slot.is_load_queued = 1;
        (self.platform.queue_asset_load)(self.platform.host, slot.id, FfiStr::from_bytes(slot.path()));
        self.notify_asset(index);
    }

    /// Announce the current state of one registration
    pub(crate) fn notify_asset(&self, index: usize) {
        let slot = &self.state.assets.slots[index];
        let Some(registration_type) = slot.registration_type() else {
            return;
        };

        let metadata = AssetMetadata {
            asset_type: slot.asset_type,
            _reserved: 0,
        };
        let file_state = FileAssetState {
            relative_path: FfiStr::from_bytes(slot.path()),
            last_write_time: slot.last_write_time,
            is_up_to_date: slot.is_up_to_date != 0,
            is_load_queued: slot.is_load_queued != 0,
            _reserved: [0; 6],
        };
        let composite_state = CompositeAssetState {
            component_count: slot.component_count,
            components: slot.components,
        };

        let state: *const c_void = match registration_type {
            RegistrationType::File => &file_state as *const FileAssetState as *const c_void,
            RegistrationType::Composite => {
                &composite_state as *const CompositeAssetState as *const c_void
            }
            RegistrationType::Virtual => std::ptr::null(),
        };

        let registration = AssetRegistration {
            id: slot.id,
            registration_type: registration_type as u32,
            state,
            metadata: &metadata,
            loaded_asset: LoadedAsset {
                version: slot.version,
                _reserved: 0,
                data: slot.data,
                size: slot.data_size,
            },
        };
        (self.platform.notify_asset_registered)(self.platform.host, &registration);
    }

    /// Bump the heightmap asset after its samples changed
    pub(crate) fn touch_heightmap_asset(&mut self) {
        let id = self.state.assets.heightmap_asset_id;
        if let Some(index) = self.state.assets.index_of(id) {
            let slot = &mut self.state.assets.slots[index];
            slot.version = slot.version.wrapping_add(1);
            self.notify_asset(index);
        }
    }
}
