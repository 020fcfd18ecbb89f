//! Shared fixtures: the engine core linked in-process

#![allow(dead_code)]

use std::path::Path;

use strata_host::prelude::*;

pub const ENGINE_MODULE: &str = "strata_engine (static)";

/// The engine core's exports as a loadable module
pub fn engine_module() -> StaticModule {
    StaticModule::new(ENGINE_MODULE, strata_engine::exported_symbols())
}

/// Small arena rooted at `assets_root`
pub fn test_config(assets_root: &Path) -> EditorConfig {
    let mut config = EditorConfig::default();
    config.memory.editor_region_size = 256 * 1024;
    config.memory.engine_region_size = 2 * 1024 * 1024;
    config.assets.root = assets_root.to_path_buf();
    config.reload.startup_retry_ms = 1;
    config.reload.startup_attempts = 2;
    config
}

/// Runtime with the engine core loaded and initialised
pub fn ready_runtime(assets_root: &Path) -> InteropRuntime {
    let runtime = InteropRuntime::new(&test_config(assets_root)).unwrap();
    assert!(runtime.load_module(Box::new(engine_module())));
    assert_eq!(runtime.state(), RuntimeState::Ready);
    runtime
}

/// Engine region bytes as they are right now
pub fn engine_region_bytes(runtime: &InteropRuntime) -> Vec<u8> {
    let region = runtime.arena().engine_region().unwrap();
    unsafe { std::slice::from_raw_parts(region.base, region.size as usize) }.to_vec()
}

pub fn flat_props(texture_size: f32) -> MaterialProperties {
    MaterialProperties {
        texture_size_in_world_units: texture_size,
        slope_start: 0.0,
        slope_end: 0.0,
        altitude_start: 0.0,
        altitude_end: 0.0,
    }
}

/// Commit one AddObject and return the new object id
pub fn add_object(runtime: &InteropRuntime, asset_id: u32) -> u32 {
    let mut tx = runtime.begin_transaction().unwrap();
    tx.add_object(asset_id, Vec3::new(1.0, 2.0, 3.0));
    match tx.commit().unwrap().commands.as_slice() {
        [Command::AddObject(cmd)] => cmd.object_id,
        other => panic!("expected one AddObject, got {:?}", other),
    }
}

/// Commit one AddMaterial and return the new material id
pub fn add_material(runtime: &InteropRuntime, texture_size: f32) -> u32 {
    let mut tx = runtime.begin_transaction().unwrap();
    tx.add_material([0; TextureSlot::COUNT], flat_props(texture_size));
    match tx.commit().unwrap().commands.as_slice() {
        [Command::AddMaterial(cmd)] => cmd.material_id,
        other => panic!("expected one AddMaterial, got {:?}", other),
    }
}
