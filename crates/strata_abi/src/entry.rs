//! Exported entry points of the engine core
//!
//! Symbol names and signatures here are the stable contract. The host
//! resolves each name once per load; a symbol missing from a build is an
//! absent feature, never an error.

use std::ffi::c_void;

use crate::command::MaterialProperties;
use crate::ffi::{EngineApi, EngineMemory, FfiStr, GetProcAddressFn, PlatformApi, Vec3};

/// Opaque engine-side transaction, only ever handled by pointer
pub type RawTransaction = c_void;

pub type EngineGetApiFn = extern "C" fn(
    get_proc_address: Option<GetProcAddressFn>,
    platform: *const PlatformApi,
) -> *const EngineApi;

pub type EditorInitializeFn = extern "C" fn(memory: *mut EngineMemory) -> bool;
pub type EditorUpdateFn = extern "C" fn(memory: *mut EngineMemory, delta_seconds: f32);

pub type EditorBeginTransactionFn = extern "C" fn(memory: *mut EngineMemory) -> *mut RawTransaction;
pub type EditorCommitTransactionFn = extern "C" fn(memory: *mut EngineMemory, tx: *mut RawTransaction);
pub type EditorDiscardTransactionFn = extern "C" fn(memory: *mut EngineMemory, tx: *mut RawTransaction);
pub type EditorClearTransactionFn = extern "C" fn(memory: *mut EngineMemory, tx: *mut RawTransaction);

pub type EditorAddObjectFn =
    extern "C" fn(memory: *mut EngineMemory, tx: *mut RawTransaction, asset_id: u32, position: Vec3);
pub type EditorDeleteObjectFn =
    extern "C" fn(memory: *mut EngineMemory, tx: *mut RawTransaction, object_id: u32);
pub type EditorSetObjectPropertyFn = extern "C" fn(
    memory: *mut EngineMemory,
    tx: *mut RawTransaction,
    object_id: u32,
    // raw ObjectProperty
    property: u32,
    value: f32,
);

pub type EditorAddMaterialFn = extern "C" fn(
    memory: *mut EngineMemory,
    tx: *mut RawTransaction,
    texture_asset_ids: *const u32,
    props: MaterialProperties,
);
pub type EditorDeleteMaterialFn =
    extern "C" fn(memory: *mut EngineMemory, tx: *mut RawTransaction, material_id: u32);
pub type EditorSwapMaterialFn = extern "C" fn(
    memory: *mut EngineMemory,
    tx: *mut RawTransaction,
    material_id_a: u32,
    material_id_b: u32,
);
pub type EditorSetMaterialTextureFn = extern "C" fn(
    memory: *mut EngineMemory,
    tx: *mut RawTransaction,
    material_id: u32,
    // raw TextureSlot
    slot: u32,
    asset_id: u32,
);
pub type EditorSetMaterialPropertiesFn = extern "C" fn(
    memory: *mut EngineMemory,
    tx: *mut RawTransaction,
    material_id: u32,
    props: MaterialProperties,
);

pub type EditorLoadHeightmapFn = extern "C" fn(memory: *mut EngineMemory, path: FfiStr) -> bool;
pub type EditorSaveHeightmapFn = extern "C" fn(memory: *mut EngineMemory, path: FfiStr) -> bool;

/// Exported symbol names
pub mod symbol {
    pub const ENGINE_GET_API: &str = "engine_get_api";
    pub const EDITOR_INITIALIZE: &str = "editorInitialize";
    pub const EDITOR_UPDATE: &str = "editorUpdate";
    pub const EDITOR_BEGIN_TRANSACTION: &str = "editorBeginTransaction";
    pub const EDITOR_COMMIT_TRANSACTION: &str = "editorCommitTransaction";
    pub const EDITOR_DISCARD_TRANSACTION: &str = "editorDiscardTransaction";
    pub const EDITOR_CLEAR_TRANSACTION: &str = "editorClearTransaction";
    pub const EDITOR_ADD_OBJECT: &str = "editorAddObject";
    pub const EDITOR_DELETE_OBJECT: &str = "editorDeleteObject";
    pub const EDITOR_SET_OBJECT_PROPERTY: &str = "editorSetObjectProperty";
    pub const EDITOR_ADD_MATERIAL: &str = "editorAddMaterial";
    pub const EDITOR_DELETE_MATERIAL: &str = "editorDeleteMaterial";
    pub const EDITOR_SWAP_MATERIAL: &str = "editorSwapMaterial";
    pub const EDITOR_SET_MATERIAL_TEXTURE: &str = "editorSetMaterialTexture";
    pub const EDITOR_SET_MATERIAL_PROPERTIES: &str = "editorSetMaterialProperties";
    pub const EDITOR_LOAD_HEIGHTMAP: &str = "editorLoadHeightmap";
    pub const EDITOR_SAVE_HEIGHTMAP: &str = "editorSaveHeightmap";

    /// Every symbol the host resolves, in resolution order
    pub const ALL: &[&str] = &[
        ENGINE_GET_API,
        EDITOR_INITIALIZE,
        EDITOR_UPDATE,
        EDITOR_BEGIN_TRANSACTION,
        EDITOR_COMMIT_TRANSACTION,
        EDITOR_DISCARD_TRANSACTION,
        EDITOR_CLEAR_TRANSACTION,
        EDITOR_ADD_OBJECT,
        EDITOR_DELETE_OBJECT,
        EDITOR_SET_OBJECT_PROPERTY,
        EDITOR_ADD_MATERIAL,
        EDITOR_DELETE_MATERIAL,
        EDITOR_SWAP_MATERIAL,
        EDITOR_SET_MATERIAL_TEXTURE,
        EDITOR_SET_MATERIAL_PROPERTIES,
        EDITOR_LOAD_HEIGHTMAP,
        EDITOR_SAVE_HEIGHTMAP,
    ];
}
