//! # strata_engine - Hot-Reloadable Engine Core
//!
//! Built as a `cdylib` and loaded by the editor host at runtime. The host
//! may unload and reload this library at any time between calls, so the
//! engine keeps no state of its own: everything lives in the arena region
//! described by the [`EngineMemory`] passed to every entry point.
//!
//! ## Contract
//!
//! - `engine_get_api` returns the [`EngineApi`] table.
//! - `editor*` entry points drive initialisation, ticking, transactions
//!   and heightmap I/O.
//! - Host effects (logging, file I/O, perf counters, asset loads,
//!   publishing) go through the [`PlatformApi`] table only.
//!
//! Every entry point tolerates null or uninitialised memory by doing
//! nothing.

use std::ffi::c_void;

use strata_abi::*;

macro_rules! log_platform {
    ($platform:expr, $level:ident, $($arg:tt)+) => {
        $platform.log(strata_abi::LogLevel::$level, &format!($($arg)+))
    };
}

pub mod assets;
mod error;
pub mod heightmap;
pub mod scene;
pub mod state;
pub mod transaction;

pub use error::ApplyError;
pub use heightmap::{HEIGHTMAP_FILE_LEN, HEIGHTMAP_RESOLUTION};
pub use state::{Engine, EngineState};

/// Smallest engine region that fits the state and the heightmap
pub const MIN_ENGINE_REGION: usize = std::mem::size_of::<EngineState>()
    + heightmap::HEIGHTMAP_SAMPLES * std::mem::size_of::<u16>()
    + 4096;

static ENGINE_API: EngineApi = EngineApi {
    version: ENGINE_API_VERSION,
    on_asset_loaded,
    register_file_asset,
    register_composite_asset,
    get_heightfield_height,
    get_heightmap_asset_id,
};

/// Run `f` against initialised engine state, or return `default`
fn with_engine<R>(memory: *mut EngineMemory, default: R, f: impl FnOnce(&mut Engine<'_>) -> R) -> R {
    match unsafe { Engine::from_memory(memory) } {
        Some(mut engine) => f(&mut engine),
        None => default,
    }
}

// ============================================================================
// API table
// ============================================================================

#[no_mangle]
pub extern "C" fn engine_get_api(
    _get_proc_address: Option<GetProcAddressFn>,
    platform: *const PlatformApi,
) -> *const EngineApi {
    if let Some(platform) = unsafe { platform.as_ref() } {
        log_platform!(platform, Debug, "Engine core bound (api v{})", ENGINE_API_VERSION);
    }
    &ENGINE_API
}

extern "C" fn on_asset_loaded(memory: *mut EngineMemory, asset_id: u32, data: *const u8, len: u64) {
    with_engine(memory, (), |engine| engine.on_asset_loaded(asset_id, data, len));
}

extern "C" fn register_file_asset(memory: *mut EngineMemory, asset_type: u32, relative_path: FfiStr) -> u32 {
    let Some(path) = (unsafe { relative_path.as_str() }) else {
        return 0;
    };
    with_engine(memory, 0, |engine| engine.register_file_asset(asset_type, path))
}

extern "C" fn register_composite_asset(
    memory: *mut EngineMemory,
    asset_type: u32,
    components: *const u32,
    count: u32,
) -> u32 {
    if components.is_null() {
        return 0;
    }
    let components = unsafe { std::slice::from_raw_parts(components, count as usize) };
    with_engine(memory, 0, |engine| engine.register_composite_asset(asset_type, components))
}

extern "C" fn get_heightfield_height(memory: *mut EngineMemory, x: f32, z: f32) -> f32 {
    with_engine(memory, 0.0, |engine| engine.heightfield_height(x, z))
}

extern "C" fn get_heightmap_asset_id(memory: *mut EngineMemory) -> u32 {
    with_engine(memory, 0, |engine| engine.state.assets.heightmap_asset_id)
}

// ============================================================================
// Editor entry points
// ============================================================================

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorInitialize(memory: *mut EngineMemory) -> bool {
    unsafe { Engine::initialize(memory) }.is_some()
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorUpdate(memory: *mut EngineMemory, _delta_seconds: f32) {
    with_engine(memory, (), |engine| {
        let platform = engine.platform;
        platform.timed("editor_update", || engine.refresh_file_assets());
    });
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorBeginTransaction(memory: *mut EngineMemory) -> *mut RawTransaction {
    with_engine(memory, std::ptr::null_mut(), |engine| engine.begin_transaction())
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorCommitTransaction(memory: *mut EngineMemory, tx: *mut RawTransaction) {
    with_engine(memory, (), |engine| engine.commit_transaction(tx));
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorDiscardTransaction(memory: *mut EngineMemory, tx: *mut RawTransaction) {
    with_engine(memory, (), |engine| engine.discard_transaction(tx));
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorClearTransaction(memory: *mut EngineMemory, tx: *mut RawTransaction) {
    with_engine(memory, (), |engine| engine.clear_transaction(tx));
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorAddObject(
    memory: *mut EngineMemory,
    tx: *mut RawTransaction,
    asset_id: u32,
    position: Vec3,
) {
    let command = AddObjectCommand { object_id: 0, asset_id, position };
    with_engine(memory, (), |engine| engine.buffer_mutation(tx, command.into()));
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorDeleteObject(memory: *mut EngineMemory, tx: *mut RawTransaction, object_id: u32) {
    let command = DeleteObjectCommand { object_id };
    with_engine(memory, (), |engine| engine.buffer_mutation(tx, command.into()));
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorSetObjectProperty(
    memory: *mut EngineMemory,
    tx: *mut RawTransaction,
    object_id: u32,
    property: u32,
    value: f32,
) {
    let command = SetObjectPropertyCommand { object_id, property, value };
    with_engine(memory, (), |engine| engine.buffer_mutation(tx, command.into()));
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorAddMaterial(
    memory: *mut EngineMemory,
    tx: *mut RawTransaction,
    texture_asset_ids: *const u32,
    props: MaterialProperties,
) {
    let mut textures = [0u32; TextureSlot::COUNT];
    if !texture_asset_ids.is_null() {
        let ids = unsafe { std::slice::from_raw_parts(texture_asset_ids, TextureSlot::COUNT) };
        textures.copy_from_slice(ids);
    }
    let command = AddMaterialCommand {
        material_id: 0,
        texture_asset_ids: textures,
        props,
    };
    with_engine(memory, (), |engine| engine.buffer_mutation(tx, command.into()));
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorDeleteMaterial(memory: *mut EngineMemory, tx: *mut RawTransaction, material_id: u32) {
    let command = DeleteMaterialCommand { material_id };
    with_engine(memory, (), |engine| engine.buffer_mutation(tx, command.into()));
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorSwapMaterial(
    memory: *mut EngineMemory,
    tx: *mut RawTransaction,
    material_id_a: u32,
    material_id_b: u32,
) {
    let command = SwapMaterialCommand { material_id_a, material_id_b };
    with_engine(memory, (), |engine| engine.buffer_mutation(tx, command.into()));
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorSetMaterialTexture(
    memory: *mut EngineMemory,
    tx: *mut RawTransaction,
    material_id: u32,
    slot: u32,
    asset_id: u32,
) {
    let command = SetMaterialTextureCommand { material_id, slot, asset_id };
    with_engine(memory, (), |engine| engine.buffer_mutation(tx, command.into()));
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorSetMaterialProperties(
    memory: *mut EngineMemory,
    tx: *mut RawTransaction,
    material_id: u32,
    props: MaterialProperties,
) {
    let command = SetMaterialPropertiesCommand { material_id, props };
    with_engine(memory, (), |engine| engine.buffer_mutation(tx, command.into()));
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorLoadHeightmap(memory: *mut EngineMemory, path: FfiStr) -> bool {
    let Some(path) = (unsafe { path.as_str() }) else {
        return false;
    };
    with_engine(memory, false, |engine| engine.load_heightmap(path))
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn editorSaveHeightmap(memory: *mut EngineMemory, path: FfiStr) -> bool {
    let Some(path) = (unsafe { path.as_str() }) else {
        return false;
    };
    with_engine(memory, false, |engine| engine.save_heightmap(path))
}

/// Every exported entry point by symbol name
///
/// Lets a host link the engine in-process and resolve it exactly as it
/// would resolve the shared library.
pub fn exported_symbols() -> Vec<(&'static str, *const c_void)> {
    vec![
        (symbol::ENGINE_GET_API, engine_get_api as EngineGetApiFn as *const c_void),
        (symbol::EDITOR_INITIALIZE, editorInitialize as EditorInitializeFn as *const c_void),
        (symbol::EDITOR_UPDATE, editorUpdate as EditorUpdateFn as *const c_void),
        (
            symbol::EDITOR_BEGIN_TRANSACTION,
            editorBeginTransaction as EditorBeginTransactionFn as *const c_void,
        ),
        (
            symbol::EDITOR_COMMIT_TRANSACTION,
            editorCommitTransaction as EditorCommitTransactionFn as *const c_void,
        ),
        (
            symbol::EDITOR_DISCARD_TRANSACTION,
            editorDiscardTransaction as EditorDiscardTransactionFn as *const c_void,
        ),
        (
            symbol::EDITOR_CLEAR_TRANSACTION,
            editorClearTransaction as EditorClearTransactionFn as *const c_void,
        ),
        (symbol::EDITOR_ADD_OBJECT, editorAddObject as EditorAddObjectFn as *const c_void),
        (symbol::EDITOR_DELETE_OBJECT, editorDeleteObject as EditorDeleteObjectFn as *const c_void),
        (
            symbol::EDITOR_SET_OBJECT_PROPERTY,
            editorSetObjectProperty as EditorSetObjectPropertyFn as *const c_void,
        ),
        (symbol::EDITOR_ADD_MATERIAL, editorAddMaterial as EditorAddMaterialFn as *const c_void),
        (
            symbol::EDITOR_DELETE_MATERIAL,
            editorDeleteMaterial as EditorDeleteMaterialFn as *const c_void,
        ),
        (symbol::EDITOR_SWAP_MATERIAL, editorSwapMaterial as EditorSwapMaterialFn as *const c_void),
        (
            symbol::EDITOR_SET_MATERIAL_TEXTURE,
            editorSetMaterialTexture as EditorSetMaterialTextureFn as *const c_void,
        ),
        (
            symbol::EDITOR_SET_MATERIAL_PROPERTIES,
            editorSetMaterialProperties as EditorSetMaterialPropertiesFn as *const c_void,
        ),
        (
            symbol::EDITOR_LOAD_HEIGHTMAP,
            editorLoadHeightmap as EditorLoadHeightmapFn as *const c_void,
        ),
        (
            symbol::EDITOR_SAVE_HEIGHTMAP,
            editorSaveHeightmap as EditorSaveHeightmapFn as *const c_void,
        ),
    ]
}

#[cfg(test)]
mod tests;
