//! Module loading, reloading and the hot-reload driver

mod common;

use std::fs::File;
use std::time::{Duration, SystemTime};

use common::*;
use strata_abi::symbol;
use strata_host::prelude::*;

#[test]
fn reload_is_idempotent_and_keeps_engine_state() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = ready_runtime(dir.path());
    let first = runtime.module_info().unwrap();
    let object = add_object(&runtime, 4);

    assert!(runtime.load_module(Box::new(engine_module())));
    let second = runtime.module_info().unwrap();

    assert_eq!(second.entry_points, first.entry_points);
    assert_eq!(second.entry_points.len(), symbol::ALL.len());
    assert_eq!(second.load_count, 2);
    assert_eq!(second.api_version, strata_abi::ENGINE_API_VERSION);

    // The object created before the reload is still there
    let mut tx = runtime.begin_transaction().unwrap();
    tx.delete_object(object);
    let published = tx.commit().unwrap();
    assert_eq!(published.commands.len(), 1);
}

#[test]
fn missing_export_disables_only_that_operation() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = InteropRuntime::new(&test_config(dir.path())).unwrap();
    let module = engine_module().without(symbol::EDITOR_SAVE_HEIGHTMAP);
    assert!(runtime.load_module(Box::new(module)));

    let entry = runtime.entry_points();
    assert_eq!(entry.present().len(), symbol::ALL.len() - 1);
    assert_eq!(entry.missing(), vec![symbol::EDITOR_SAVE_HEIGHTMAP]);
    assert!(entry.editor_save_heightmap.is_none());

    assert!(!runtime.save_heightmap("terrain.r16"));
    assert!(!dir.path().join("terrain.r16").exists());

    add_object(&runtime, 1);
    assert!(runtime.heightmap_asset_id().is_some());
}

#[test]
fn failed_reload_leaves_nothing_callable() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = ready_runtime(dir.path());
    let object = add_object(&runtime, 1);

    assert!(!runtime.reload_code(&dir.path().join("missing.so"), &dir.path().join("shadow.so")));
    assert_eq!(runtime.state(), RuntimeState::Failed);
    assert!(runtime.entry_points().is_empty());
    assert!(!runtime.is_loaded());
    assert!(runtime.begin_transaction().is_none());
    assert!(runtime.heightfield_height(0.5, 0.5).is_none());
    runtime.tick(0.016);

    // A later successful load picks the state back up
    assert!(runtime.load_module(Box::new(engine_module())));
    assert_eq!(runtime.state(), RuntimeState::Ready);
    let mut tx = runtime.begin_transaction().unwrap();
    tx.delete_object(object);
    assert_eq!(tx.commit().unwrap().commands.len(), 1);
}

#[test]
fn undersized_engine_region_fails_initialisation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.memory.engine_region_size = 64 * 1024;
    let runtime = InteropRuntime::new(&config).unwrap();

    assert!(!runtime.load_module(Box::new(engine_module())));
    assert_eq!(runtime.state(), RuntimeState::Failed);
    assert!(runtime.module_info().is_none());
    assert!(runtime.begin_transaction().is_none());
}

#[test]
fn hot_reload_waits_for_build_lock() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = ready_runtime(dir.path());

    let primary = dir.path().join("engine.so");
    let shadow = dir.path().join("engine_shadow.so");
    let lock = dir.path().join("build.lock");
    std::fs::write(&primary, b"half written").unwrap();

    let mut reloader = HotReloader::new(&lock);
    reloader.watch(&primary, &shadow);
    assert!(reloader.pending().is_empty());

    File::options()
        .write(true)
        .open(&primary)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();
    assert_eq!(reloader.pending(), vec![primary.clone()]);

    // Build still running: nothing happens
    std::fs::write(&lock, b"").unwrap();
    assert!(reloader.poll(&runtime).is_empty());
    assert_eq!(runtime.state(), RuntimeState::Ready);
    assert!(!shadow.exists());

    // Build finished with a broken artifact: the reload is attempted and fails
    std::fs::remove_file(&lock).unwrap();
    assert!(reloader.poll(&runtime).is_empty());
    assert_eq!(runtime.state(), RuntimeState::Failed);
    assert!(shadow.exists());
    assert_eq!(reloader.pending(), vec![primary.clone()]);
}

#[test]
fn disabled_reloader_never_touches_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = ready_runtime(dir.path());
    let mut reloader = HotReloader::disabled();
    assert!(reloader.poll(&runtime).is_empty());
    assert_eq!(runtime.module_info().unwrap().load_count, 1);
}

#[test]
fn shutdown_turns_everything_into_noops() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = ready_runtime(dir.path());
    runtime.shutdown();

    assert_eq!(runtime.state(), RuntimeState::ShutDown);
    assert!(!runtime.is_loaded());
    assert!(!runtime.load_module(Box::new(engine_module())));
    assert!(runtime.begin_transaction().is_none());
    assert!(runtime.register_file_asset(AssetType::Texture, "grass.png").is_none());
    runtime.tick(0.016);
    runtime.shutdown();
    assert_eq!(runtime.state(), RuntimeState::ShutDown);
}
