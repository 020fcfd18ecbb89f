//! Asset registration records
//!
//! The engine core owns every registration and all memory it points to.
//! A registration pointer handed to `notify_asset_registered` is only valid
//! for the duration of that call; the host copies out what it needs.

use std::ffi::c_void;

use crate::ffi::FfiStr;

/// Maximum number of component assets a composite asset can reference
pub const MAX_COMPOSITE_COMPONENTS: usize = 4;

/// How an asset's backing data is sourced
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationType {
    /// Loaded from a file under the assets root
    File = 0,
    /// Built from other registered assets
    Composite = 1,
    /// Produced by the engine itself
    Virtual = 2,
}

impl RegistrationType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::File),
            1 => Some(Self::Composite),
            2 => Some(Self::Virtual),
            _ => None,
        }
    }
}

/// What kind of data an asset holds
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    #[default]
    Unknown = 0,
    Texture = 1,
    Heightmap = 2,
    Shader = 3,
    Mesh = 4,
}

impl AssetType {
    /// Decode a raw type, mapping unknown values to `Unknown`
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Texture,
            2 => Self::Heightmap,
            3 => Self::Shader,
            4 => Self::Mesh,
            _ => Self::Unknown,
        }
    }
}

/// Current loaded data of an asset
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LoadedAsset {
    /// Bumped every time the data changes; 0 means never loaded
    pub version: u32,
    pub _reserved: u32,
    pub data: *const u8,
    pub size: u64,
}

impl LoadedAsset {
    pub const fn unloaded() -> Self {
        Self { version: 0, _reserved: 0, data: std::ptr::null(), size: 0 }
    }
}

/// Metadata common to every registration
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetMetadata {
    /// Raw [`AssetType`]
    pub asset_type: u32,
    pub _reserved: u32,
}

/// State reachable through `state` for [`RegistrationType::File`]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FileAssetState {
    /// Path relative to the assets root
    pub relative_path: FfiStr,
    /// Last write time observed when the asset was last queued
    pub last_write_time: u64,
    pub is_up_to_date: bool,
    pub is_load_queued: bool,
    pub _reserved: [u8; 6],
}

const _: () = assert!(
    std::mem::size_of::<FileAssetState>() == std::mem::size_of::<FfiStr>() + 16,
    "FileAssetState must not carry implicit padding"
);

/// State reachable through `state` for [`RegistrationType::Composite`]
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeAssetState {
    pub component_count: u32,
    pub components: [u32; MAX_COMPOSITE_COMPONENTS],
}

impl CompositeAssetState {
    /// Component ids actually in use
    pub fn components(&self) -> &[u32] {
        let count = (self.component_count as usize).min(MAX_COMPOSITE_COMPONENTS);
        &self.components[..count]
    }
}

/// A registration as announced through `notify_asset_registered`
#[repr(C)]
#[derive(Debug)]
pub struct AssetRegistration {
    pub id: u32,
    /// Raw [`RegistrationType`]
    pub registration_type: u32,
    /// `FileAssetState`, `CompositeAssetState` or null, keyed by type
    pub state: *const c_void,
    pub metadata: *const AssetMetadata,
    pub loaded_asset: LoadedAsset,
}
