//! Reloading the engine core from its built shared library

mod common;

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};

use common::*;
use strata_abi::symbol;
use strata_host::prelude::*;

/// The engine cdylib cargo built next to this test binary
fn built_engine_library() -> Option<PathBuf> {
    let name = format!("{}strata_engine{}", DLL_PREFIX, DLL_SUFFIX);
    let exe = std::env::current_exe().ok()?;
    let deps = exe.parent()?;

    let found = [Some(deps), deps.parent()]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(&name))
        .find(|candidate| candidate.is_file())
        .or_else(|| {
            // Some toolchains leave a hashed name in deps/
            std::fs::read_dir(deps).ok()?.flatten().map(|e| e.path()).find(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| {
                        n.starts_with(&format!("{}strata_engine", DLL_PREFIX)) && n.ends_with(DLL_SUFFIX)
                    })
            })
        });
    found
}

fn install_module(built: &Path, dir: &Path) -> PathBuf {
    let primary = dir.join(format!("{}strata_engine{}", DLL_PREFIX, DLL_SUFFIX));
    std::fs::copy(built, &primary).unwrap();
    primary
}

#[test]
fn reloading_the_same_library_keeps_state() {
    let Some(built) = built_engine_library() else {
        eprintln!("strata_engine shared library not built, skipping");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let primary = install_module(&built, dir.path());
    let runtime = InteropRuntime::new(&test_config(dir.path())).unwrap();

    assert!(runtime.reload_code(&primary, &dir.path().join("shadow_1")));
    assert_eq!(runtime.state(), RuntimeState::Ready);
    let first = runtime.module_info().unwrap();
    assert_eq!(first.entry_points.len(), symbol::ALL.len());
    assert_eq!(first.api_version, strata_abi::ENGINE_API_VERSION);
    assert_eq!(first.load_count, 1);
    assert_eq!(first.watermark, strata_host::platform::file_last_write_time(&primary));

    let kept = add_object(&runtime, 7);
    let dropped = add_object(&runtime, 8);

    assert!(runtime.reload_code(&primary, &dir.path().join("shadow_2")));
    let second = runtime.module_info().unwrap();
    assert_eq!(second.entry_points, first.entry_points);
    assert_eq!(second.load_count, 2);

    // Objects created by the first load are still known to the second
    let mut tx = runtime.begin_transaction().unwrap();
    tx.delete_object(dropped);
    let published = tx.commit().unwrap();
    assert_eq!(published.commands.len(), 1);

    assert!(runtime.reload_code(&primary, &dir.path().join("shadow_3")));
    assert_eq!(runtime.module_info().unwrap().load_count, 3);

    let mut tx = runtime.begin_transaction().unwrap();
    tx.delete_object(dropped);
    tx.delete_object(kept);
    let published = tx.commit().unwrap();
    match published.commands.as_slice() {
        [Command::DeleteObject(cmd)] => assert_eq!(cmd.object_id, kept),
        other => panic!("unexpected {:?}", other),
    }

    // New ids continue after the ones handed out before the reloads
    assert!(add_object(&runtime, 9) > dropped);
}

#[test]
fn hot_reloader_picks_up_a_rebuilt_library() {
    let Some(built) = built_engine_library() else {
        eprintln!("strata_engine shared library not built, skipping");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let primary = install_module(&built, dir.path());
    let runtime = InteropRuntime::new(&test_config(dir.path())).unwrap();
    assert!(runtime.reload_blocking(&primary, &dir.path().join("startup_shadow")));
    let object = add_object(&runtime, 1);

    let mut reloader = HotReloader::new(dir.path().join("build.lock"));
    reloader.watch(&primary, dir.path().join("hot_shadow"));
    assert!(reloader.poll(&runtime).is_empty());

    std::fs::File::options()
        .write(true)
        .open(&primary)
        .unwrap()
        .set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(5))
        .unwrap();

    assert_eq!(reloader.poll(&runtime), vec![primary.clone()]);
    assert_eq!(runtime.state(), RuntimeState::Ready);
    assert_eq!(runtime.module_info().unwrap().load_count, 2);
    assert!(reloader.pending().is_empty());

    let mut tx = runtime.begin_transaction().unwrap();
    tx.delete_object(object);
    assert_eq!(tx.commit().unwrap().commands.len(), 1);
}
