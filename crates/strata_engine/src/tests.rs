//! Entry point tests against a recording platform table

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;

use strata_abi::*;
use strata_memory::Arena;

use super::*;

#[derive(Default)]
struct Recorder {
    published: Vec<Vec<u8>>,
    registrations: Vec<(u32, u32, u32, bool, bool)>,
    queued: Vec<(u32, String)>,
    files: HashMap<String, Vec<u8>>,
    write_times: HashMap<String, u64>,
    written: HashMap<String, Vec<u8>>,
    logs: Vec<String>,
}

fn recorder<'a>(host: *mut c_void) -> &'a RefCell<Recorder> {
    unsafe { &*(host as *const RefCell<Recorder>) }
}

fn text(s: FfiStr) -> String {
    unsafe { s.as_str() }.unwrap_or_default().to_string()
}

extern "C" fn log(host: *mut c_void, _level: u32, message: FfiStr) {
    recorder(host).borrow_mut().logs.push(text(message));
}

extern "C" fn perf(_host: *mut c_void, _name: FfiStr) {}

extern "C" fn last_write_time(host: *mut c_void, path: FfiStr) -> u64 {
    recorder(host).borrow().write_times.get(&text(path)).copied().unwrap_or(0)
}

extern "C" fn read_file(host: *mut c_void, path: FfiStr, out: *mut FileBuffer) -> bool {
    let Some(bytes) = recorder(host).borrow().files.get(&text(path)).cloned() else {
        return false;
    };
    let len = bytes.len() as u64;
    let data = Box::into_raw(bytes.into_boxed_slice()) as *mut u8;
    unsafe {
        (*out).len = len;
        (*out).data = data;
    }
    true
}

extern "C" fn release_file(_host: *mut c_void, buffer: *mut FileBuffer) {
    let buffer = unsafe { &mut *buffer };
    if !buffer.data.is_null() {
        let slice = std::ptr::slice_from_raw_parts_mut(buffer.data, buffer.len as usize);
        drop(unsafe { Box::from_raw(slice) });
    }
    *buffer = FileBuffer::empty();
}

extern "C" fn write_file(host: *mut c_void, path: FfiStr, data: *const u8, len: u64) -> bool {
    let bytes = unsafe { std::slice::from_raw_parts(data, len as usize) }.to_vec();
    recorder(host).borrow_mut().written.insert(text(path), bytes);
    true
}

extern "C" fn queue_load(host: *mut c_void, asset_id: u32, path: FfiStr) {
    recorder(host).borrow_mut().queued.push((asset_id, text(path)));
}

extern "C" fn notify(host: *mut c_void, registration: *const AssetRegistration) {
    let r = unsafe { &*registration };
    let (up_to_date, queued) = if r.registration_type == RegistrationType::File as u32 {
        let state = unsafe { &*(r.state as *const FileAssetState) };
        (state.is_up_to_date, state.is_load_queued)
    } else {
        (true, false)
    };
    recorder(host).borrow_mut().registrations.push((
        r.id,
        r.registration_type,
        r.loaded_asset.version,
        up_to_date,
        queued,
    ));
}

extern "C" fn publish(host: *mut c_void, buffer: *const u8) {
    let bytes = unsafe { CommandReader::from_raw(buffer) }.unwrap().to_owned_bytes();
    recorder(host).borrow_mut().published.push(bytes);
}

struct Harness {
    arena: Arena,
    recorder: Box<RefCell<Recorder>>,
    _platform: Box<PlatformApi>,
    memory: Box<EngineMemory>,
}

impl Harness {
    fn new() -> Self {
        let arena = Arena::with_regions(0, MIN_ENGINE_REGION as u64).unwrap();
        let region = arena.engine_region().unwrap();
        let recorder = Box::new(RefCell::new(Recorder::default()));
        let platform = Box::new(PlatformApi {
            host: &*recorder as *const RefCell<Recorder> as *mut c_void,
            log,
            start_perf_counter: perf,
            end_perf_counter: perf,
            get_file_last_write_time: last_write_time,
            read_entire_file: read_file,
            release_file,
            write_entire_file: write_file,
            queue_asset_load: queue_load,
            notify_asset_registered: notify,
            publish_transaction: publish,
        });
        let memory = Box::new(EngineMemory {
            platform: &*platform,
            base: region.base,
            size: region.size,
        });
        let harness = Self { arena, recorder, _platform: platform, memory };
        assert!(editorInitialize(harness.memory()));
        harness
    }

    fn memory(&self) -> *mut EngineMemory {
        (&*self.memory as *const EngineMemory).cast_mut()
    }

    fn region_bytes(&self) -> Vec<u8> {
        let region = self.arena.engine_region().unwrap();
        unsafe { std::slice::from_raw_parts(region.base, region.size as usize) }.to_vec()
    }

    fn published(&self) -> Vec<Vec<Command>> {
        self.recorder
            .borrow()
            .published
            .iter()
            .map(|bytes| CommandReader::new(bytes).unwrap().decode_all().unwrap())
            .collect()
    }

    fn engine(&self) -> Engine<'_> {
        unsafe { Engine::from_memory(self.memory()) }.unwrap()
    }

    fn add_object(&self, asset_id: u32) -> u32 {
        let tx = editorBeginTransaction(self.memory());
        editorAddObject(self.memory(), tx, asset_id, Vec3::new(1.0, 0.0, 2.0));
        editorCommitTransaction(self.memory(), tx);
        match self.published().last().and_then(|cmds| cmds.first().copied()) {
            Some(Command::AddObject(cmd)) => cmd.object_id,
            other => panic!("expected AddObject, got {:?}", other),
        }
    }
}

#[test]
fn test_add_object_publishes_one_record() {
    let h = Harness::new();
    let tx = editorBeginTransaction(h.memory());
    assert!(!tx.is_null());

    editorAddObject(h.memory(), tx, 9, Vec3::new(1.0, 2.0, 3.0));
    assert!(h.published().is_empty(), "mutations must wait for commit");

    editorCommitTransaction(h.memory(), tx);

    let published = h.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].len(), 1);
    match published[0][0] {
        Command::AddObject(cmd) => {
            assert_ne!(cmd.object_id, 0);
            assert_eq!(cmd.asset_id, 9);
            assert_eq!(h.engine().state.scene.object(cmd.object_id).unwrap().asset_id, 9);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_add_material_texture_size() {
    let h = Harness::new();
    let tx = editorBeginTransaction(h.memory());
    let props = MaterialProperties {
        texture_size_in_world_units: 2.5,
        slope_start: 0.0,
        slope_end: 0.0,
        altitude_start: 0.0,
        altitude_end: 0.0,
    };
    editorAddMaterial(h.memory(), tx, std::ptr::null(), props);
    editorCommitTransaction(h.memory(), tx);

    let published = h.published();
    match published[0].first() {
        Some(Command::AddMaterial(cmd)) => {
            assert_eq!(cmd.props.texture_size_in_world_units, 2.5);
            assert_ne!(cmd.material_id, 0);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_deletes_publish_in_issue_order() {
    let h = Harness::new();
    let a = h.add_object(1);
    let b = h.add_object(2);

    let tx = editorBeginTransaction(h.memory());
    editorDeleteObject(h.memory(), tx, b);
    editorDeleteObject(h.memory(), tx, a);
    editorCommitTransaction(h.memory(), tx);

    let last = h.published().pop().unwrap();
    assert_eq!(
        last,
        vec![
            Command::DeleteObject(DeleteObjectCommand { object_id: b }),
            Command::DeleteObject(DeleteObjectCommand { object_id: a }),
        ]
    );
    assert!(h.engine().state.scene.objects().is_empty());
}

#[test]
fn test_discard_leaves_arena_unchanged() {
    let h = Harness::new();
    h.add_object(1);
    let before = h.region_bytes();
    let publishes = h.published().len();

    let tx = editorBeginTransaction(h.memory());
    editorAddObject(h.memory(), tx, 5, Vec3::ZERO);
    editorSwapMaterial(h.memory(), tx, 1, 2);
    editorDiscardTransaction(h.memory(), tx);

    assert_eq!(h.published().len(), publishes);
    assert!(h.region_bytes() == before, "discard changed arena bytes");
}

#[test]
fn test_clear_keeps_transaction_open() {
    let h = Harness::new();
    let tx = editorBeginTransaction(h.memory());
    editorAddObject(h.memory(), tx, 1, Vec3::ZERO);
    editorClearTransaction(h.memory(), tx);
    editorAddObject(h.memory(), tx, 2, Vec3::ZERO);
    editorCommitTransaction(h.memory(), tx);

    let published = h.published();
    assert_eq!(published[0].len(), 1);
    assert!(matches!(published[0][0], Command::AddObject(AddObjectCommand { asset_id: 2, .. })));
}

#[test]
fn test_commit_skips_unappliable_mutations() {
    let h = Harness::new();
    let tx = editorBeginTransaction(h.memory());
    editorDeleteObject(h.memory(), tx, 404);
    editorCommitTransaction(h.memory(), tx);

    let published = h.published();
    assert_eq!(published.len(), 1, "commit publishes exactly once");
    assert!(published[0].is_empty());
    assert!(h.recorder.borrow().logs.iter().any(|l| l.contains("404")));
}

#[test]
fn test_closed_handle_is_ignored() {
    let h = Harness::new();
    let tx = editorBeginTransaction(h.memory());
    editorCommitTransaction(h.memory(), tx);

    editorAddObject(h.memory(), tx, 1, Vec3::ZERO);
    editorCommitTransaction(h.memory(), tx);
    assert_eq!(h.published().len(), 1);
    assert!(h.engine().state.scene.objects().is_empty());
}

#[test]
fn test_transaction_slots_exhaust() {
    let h = Harness::new();
    let handles: Vec<_> = (0..transaction::MAX_TRANSACTIONS)
        .map(|_| editorBeginTransaction(h.memory()))
        .collect();
    assert!(handles.iter().all(|tx| !tx.is_null()));
    assert!(editorBeginTransaction(h.memory()).is_null());

    editorDiscardTransaction(h.memory(), handles[0]);
    assert!(!editorBeginTransaction(h.memory()).is_null());
}

#[test]
fn test_state_survives_reinitialize() {
    let h = Harness::new();
    let id = h.add_object(3);

    // A freshly loaded module initialises against the same region
    assert!(editorInitialize(h.memory()));

    let engine = h.engine();
    assert_eq!(engine.state.resume_count, 1);
    assert!(engine.state.scene.object(id).is_some());
    assert_ne!(h.add_object(4), id);
}

#[test]
fn test_uninitialised_memory_is_inert() {
    let arena = Arena::with_regions(0, MIN_ENGINE_REGION as u64).unwrap();
    let region = arena.engine_region().unwrap();
    let h = Harness::new();
    let memory = EngineMemory {
        platform: h.memory.platform,
        base: region.base,
        size: region.size,
    };
    let memory = (&memory as *const EngineMemory).cast_mut();

    assert!(editorBeginTransaction(memory).is_null());
    assert!(editorBeginTransaction(std::ptr::null_mut()).is_null());
    editorUpdate(std::ptr::null_mut(), 0.016);
}

#[test]
fn test_file_asset_lifecycle() {
    let h = Harness::new();
    h.recorder.borrow_mut().write_times.insert("rock.tga".into(), 100);

    let api = unsafe { &*engine_get_api(None, h.memory.platform) };
    let id = (api.register_file_asset)(h.memory(), AssetType::Texture as u32, FfiStr::new("rock.tga"));
    assert_ne!(id, 0);
    assert_eq!(
        (api.register_file_asset)(h.memory(), AssetType::Texture as u32, FfiStr::new("rock.tga")),
        id
    );
    assert_eq!(h.recorder.borrow().queued, vec![(id, "rock.tga".to_string())]);
    assert_eq!(h.recorder.borrow().registrations.last(), Some(&(id, 0, 0, false, true)));

    let data = [1u8, 2, 3];
    (api.on_asset_loaded)(h.memory(), id, data.as_ptr(), data.len() as u64);
    assert_eq!(h.recorder.borrow().registrations.last(), Some(&(id, 0, 1, true, false)));

    // Unchanged file: nothing queued
    editorUpdate(h.memory(), 0.016);
    assert_eq!(h.recorder.borrow().queued.len(), 1);

    h.recorder.borrow_mut().write_times.insert("rock.tga".into(), 200);
    editorUpdate(h.memory(), 0.016);
    assert_eq!(h.recorder.borrow().queued.len(), 2);
    assert_eq!(h.recorder.borrow().registrations.last(), Some(&(id, 0, 1, false, true)));
}

#[test]
fn test_composite_asset_follows_components() {
    let h = Harness::new();
    let api = unsafe { &*engine_get_api(None, h.memory.platform) };
    let a = (api.register_file_asset)(h.memory(), AssetType::Texture as u32, FfiStr::new("a.tga"));
    let b = (api.register_file_asset)(h.memory(), AssetType::Texture as u32, FfiStr::new("b.tga"));

    let components = [a, b];
    let composite =
        (api.register_composite_asset)(h.memory(), AssetType::Texture as u32, components.as_ptr(), 2);
    assert_ne!(composite, 0);
    assert_eq!(h.recorder.borrow().registrations.last(), Some(&(composite, 1, 1, true, false)));

    (api.on_asset_loaded)(h.memory(), b, std::ptr::null(), 0);
    assert_eq!(h.recorder.borrow().registrations.last(), Some(&(composite, 1, 2, true, false)));

    let unknown = [999u32];
    assert_eq!(
        (api.register_composite_asset)(h.memory(), 0, unknown.as_ptr(), 1),
        0
    );
}

#[test]
fn test_heightmap_load_sample_save() {
    let h = Harness::new();
    let api = unsafe { &*engine_get_api(None, h.memory.platform) };
    let heightmap_id = (api.get_heightmap_asset_id)(h.memory());
    assert_ne!(heightmap_id, 0);

    let bytes: Vec<u8> = std::iter::repeat(u16::MAX.to_le_bytes())
        .take(heightmap::HEIGHTMAP_SAMPLES)
        .flatten()
        .collect();
    h.recorder.borrow_mut().files.insert("terrain.r16".into(), bytes.clone());

    assert!(editorLoadHeightmap(h.memory(), FfiStr::new("terrain.r16")));
    assert_eq!((api.get_heightfield_height)(h.memory(), 0.5, 0.5), 1.0);
    assert_eq!(h.recorder.borrow().registrations.last(), Some(&(heightmap_id, 2, 2, true, false)));

    assert!(editorSaveHeightmap(h.memory(), FfiStr::new("out.r16")));
    assert_eq!(h.recorder.borrow().written.get("out.r16"), Some(&bytes));
}

#[test]
fn test_heightmap_rejects_wrong_size() {
    let h = Harness::new();
    h.recorder.borrow_mut().files.insert("bad.r16".into(), vec![0u8; 10]);
    assert!(!editorLoadHeightmap(h.memory(), FfiStr::new("bad.r16")));
    assert!(!editorLoadHeightmap(h.memory(), FfiStr::new("missing.r16")));
}

#[test]
fn test_exported_symbols_cover_contract() {
    let exported: Vec<&str> = exported_symbols().into_iter().map(|(name, _)| name).collect();
    assert_eq!(exported, symbol::ALL);
}
