//! Interop runtime
//!
//! Owns the arena, the platform table and the currently loaded engine core
//! module. One mutex guards the module handle and its entry points; every
//! call into the module and the whole reload sequence run under it, so no
//! caller ever sees a half-swapped table.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use strata_abi::*;
use strata_memory::{Arena, ArenaError};

use crate::config::EditorConfig;
use crate::error::{InteropError, Result};
use crate::library::{EngineLibrary, EntryPoints, ModuleSource};
use crate::platform::{
    file_last_write_time, AssetLoadRequest, AssetRegistrationEvent, PerfStats, PlatformServices,
    PublishedTransaction,
};
use crate::transaction::Transaction;

/// Lifecycle of the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeState {
    /// Arena and platform table exist, nothing loaded yet
    Initialized,
    /// A module is loaded and initialised
    Ready,
    /// A reload is in progress
    Reloading,
    /// The last load failed; no module is loaded
    Failed,
    /// Shut down; every further call is a no-op
    ShutDown,
}

impl std::fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Ready => write!(f, "ready"),
            Self::Reloading => write!(f, "reloading"),
            Self::Failed => write!(f, "failed"),
            Self::ShutDown => write!(f, "shut down"),
        }
    }
}

/// Summary of the loaded module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    /// Version reported by `engine_get_api`, 0 when the table is absent
    pub api_version: u32,
    pub entry_points: Vec<&'static str>,
    /// Last write time of the primary file when it was loaded
    pub watermark: u64,
    /// Successful loads since the runtime was created
    pub load_count: u64,
}

struct ModuleSlot {
    module: Option<Box<dyn ModuleSource>>,
    entry: EntryPoints,
    api: *const EngineApi,
    watermark: u64,
    load_count: u64,
}

// Safety: `api` points into the loaded module and is only read under the
// module mutex
unsafe impl Send for ModuleSlot {}

impl ModuleSlot {
    fn empty() -> Self {
        Self {
            module: None,
            entry: EntryPoints::empty(),
            api: std::ptr::null(),
            watermark: 0,
            load_count: 0,
        }
    }

    fn api(&self) -> Option<&EngineApi> {
        unsafe { self.api.as_ref() }
    }

    /// Clear the entry points, then drop the module
    fn unload(&mut self) {
        self.entry = EntryPoints::empty();
        self.api = std::ptr::null();
        if let Some(module) = self.module.take() {
            log::info!("Unloaded engine module '{}'", module.name());
        }
    }
}

/// Drives one engine core module across reloads
pub struct InteropRuntime {
    module: Mutex<ModuleSlot>,
    state: RwLock<RuntimeState>,
    memory: Box<EngineMemory>,
    platform: Box<PlatformApi>,
    services: Arc<PlatformServices>,
    arena: Arena,
    startup_retry: Duration,
    startup_attempts: u32,
}

impl InteropRuntime {
    /// Reserve the arena and build the platform table
    ///
    /// Arena failure is returned to the caller, which cannot continue
    /// without it.
    pub fn new(config: &EditorConfig) -> Result<Self> {
        let arena = Arena::with_regions(
            config.memory.editor_region_size,
            config.memory.engine_region_size,
        )?;
        let engine_region = arena
            .engine_region()
            .ok_or(ArenaError::InvalidSize(config.memory.engine_region_size))?;

        let services = Arc::new(PlatformServices::new(
            config.assets.root.clone(),
            arena.editor_region(),
        ));
        let platform = Box::new(services.platform_api());
        let memory = Box::new(EngineMemory {
            platform: &*platform,
            base: engine_region.base,
            size: engine_region.size,
        });

        log::info!(
            "Interop runtime ready: engine region {} KiB at {:p}",
            engine_region.size / 1024,
            engine_region.base
        );

        Ok(Self {
            module: Mutex::new(ModuleSlot::empty()),
            state: RwLock::new(RuntimeState::Initialized),
            memory,
            platform,
            services,
            arena,
            startup_retry: config.startup_retry(),
            startup_attempts: config.reload.startup_attempts,
        })
    }

    pub fn state(&self) -> RuntimeState {
        *self.state.read()
    }

    fn set_state(&self, state: RuntimeState) {
        let mut current = self.state.write();
        if *current != state {
            log::debug!("Interop runtime {} -> {}", *current, state);
            *current = state;
        }
    }

    fn memory_ptr(&self) -> *mut EngineMemory {
        (&*self.memory as *const EngineMemory).cast_mut()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn services(&self) -> &Arc<PlatformServices> {
        &self.services
    }

    // ========== Loading ==========

    /// Unload, shadow-copy, load, resolve and initialise
    ///
    /// Tries once. On failure nothing is loaded and the entry points stay
    /// empty until a later attempt succeeds.
    pub fn reload_code(&self, primary: &Path, shadow: &Path) -> bool {
        match self.try_reload_code(primary, shadow) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Reload of {} failed: {}", primary.display(), e);
                false
            }
        }
    }

    /// [`reload_code`](Self::reload_code) with the failure reason
    pub fn try_reload_code(&self, primary: &Path, shadow: &Path) -> Result<()> {
        let mut slot = self.module.lock();
        if self.state() == RuntimeState::ShutDown {
            return Err(InteropError::ShutDown);
        }

        self.set_state(RuntimeState::Reloading);
        slot.unload();

        let result = self.load_from_disk(&mut slot, primary, shadow);
        self.set_state(match result {
            Ok(()) => RuntimeState::Ready,
            Err(_) => RuntimeState::Failed,
        });
        result
    }

    fn load_from_disk(&self, slot: &mut ModuleSlot, primary: &Path, shadow: &Path) -> Result<()> {
        let watermark = file_last_write_time(primary);
        std::fs::copy(primary, shadow).map_err(|e| InteropError::shadow_copy(primary, shadow, e))?;
        let library = EngineLibrary::load(shadow)?;
        self.install(slot, Box::new(library))?;
        slot.watermark = watermark;
        Ok(())
    }

    /// Swap in a module that is already in memory
    pub fn load_module(&self, module: Box<dyn ModuleSource>) -> bool {
        let mut slot = self.module.lock();
        if self.state() == RuntimeState::ShutDown {
            return false;
        }

        self.set_state(RuntimeState::Reloading);
        slot.unload();

        let name = module.name().to_string();
        match self.install(&mut slot, module) {
            Ok(()) => {
                self.set_state(RuntimeState::Ready);
                true
            }
            Err(e) => {
                log::warn!("Loading module '{}' failed: {}", name, e);
                self.set_state(RuntimeState::Failed);
                false
            }
        }
    }

    /// Resolve and initialise `module`, publishing it only if all of it works
    fn install(&self, slot: &mut ModuleSlot, module: Box<dyn ModuleSource>) -> Result<()> {
        let entry = EntryPoints::resolve(module.as_ref());

        let api = match entry.engine_get_api {
            Some(get_api) => get_api(None, &*self.platform),
            None => std::ptr::null(),
        };
        if let Some(api) = unsafe { api.as_ref() } {
            if api.version != ENGINE_API_VERSION {
                return Err(InteropError::VersionMismatch {
                    module_version: api.version,
                    expected_version: ENGINE_API_VERSION,
                });
            }
        }

        if let Some(initialize) = entry.editor_initialize {
            if !initialize(self.memory_ptr()) {
                return Err(InteropError::InitializeFailed {
                    region_size: self.memory.size,
                });
            }
        }

        log::info!(
            "Engine module '{}' bound {} of {} entry points",
            module.name(),
            entry.present().len(),
            symbol::ALL.len()
        );

        slot.module = Some(module);
        slot.entry = entry;
        slot.api = api;
        slot.watermark = 0;
        slot.load_count += 1;
        Ok(())
    }

    /// Reload until it succeeds, sleeping between attempts
    ///
    /// For the startup load that must complete before the editor can run.
    /// The lock is released while sleeping.
    pub fn reload_blocking(&self, primary: &Path, shadow: &Path) -> bool {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if self.reload_code(primary, shadow) {
                return true;
            }
            if self.state() == RuntimeState::ShutDown {
                return false;
            }
            if self.startup_attempts != 0 && attempt >= self.startup_attempts {
                log::error!(
                    "Engine module {} did not load after {} attempts",
                    primary.display(),
                    attempt
                );
                return false;
            }
            log::info!(
                "Engine module not loadable yet, retrying in {} ms",
                self.startup_retry.as_millis()
            );
            std::thread::sleep(self.startup_retry);
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.module.lock().module.is_some()
    }

    /// Copy of the current entry point table
    pub fn entry_points(&self) -> EntryPoints {
        self.module.lock().entry
    }

    /// Last write time of the module file at its last load
    pub fn watermark(&self) -> u64 {
        self.module.lock().watermark
    }

    pub fn module_info(&self) -> Option<ModuleInfo> {
        let slot = self.module.lock();
        let module = slot.module.as_ref()?;
        Some(ModuleInfo {
            name: module.name().to_string(),
            api_version: slot.api().map_or(0, |api| api.version),
            entry_points: slot.entry.present(),
            watermark: slot.watermark,
            load_count: slot.load_count,
        })
    }

    /// Run `f` against the loaded module under the module lock
    pub(crate) fn with_module<R>(
        &self,
        default: R,
        f: impl FnOnce(&EntryPoints, Option<&EngineApi>, *mut EngineMemory) -> R,
    ) -> R {
        let slot = self.module.lock();
        if slot.module.is_none() {
            return default;
        }
        f(&slot.entry, slot.api(), self.memory_ptr())
    }

    // ========== Tick ==========

    /// Deliver queued asset loads, then let the engine core update
    pub fn tick(&self, delta_seconds: f32) {
        let slot = self.module.lock();
        if slot.module.is_none() {
            return;
        }
        self.deliver_asset_loads(&slot);
        if let Some(update) = slot.entry.editor_update {
            update(self.memory_ptr(), delta_seconds);
        }
    }

    fn deliver_asset_loads(&self, slot: &ModuleSlot) {
        let requests = self.services.take_load_requests();
        if requests.is_empty() {
            return;
        }
        let Some(api) = slot.api() else {
            self.services.requeue(requests);
            return;
        };

        let mut failed = Vec::new();
        for request in requests {
            let path = self.services.resolve(&request.relative_path);
            match std::fs::read(&path) {
                Ok(bytes) => {
                    let data = bytes.into_boxed_slice();
                    (api.on_asset_loaded)(
                        self.memory_ptr(),
                        request.asset_id,
                        data.as_ptr(),
                        data.len() as u64,
                    );
                    self.services.retain_asset_data(request.asset_id, data);
                }
                Err(e) => {
                    log::debug!("Asset {} not loadable yet ({}): {}", request.asset_id, path.display(), e);
                    failed.push(request);
                }
            }
        }
        self.services.requeue(failed);
    }

    // ========== Transactions ==========

    /// Open a transaction, or `None` when no module can take one
    pub fn begin_transaction(&self) -> Option<Transaction<'_>> {
        let handle = self.with_module(std::ptr::null_mut(), |entry, _, memory| {
            entry
                .editor_begin_transaction
                .map_or(std::ptr::null_mut(), |begin| begin(memory))
        });
        (!handle.is_null()).then(|| Transaction::new(self, handle))
    }

    // ========== Engine API ==========

    /// Register a file asset relative to the assets root
    pub fn register_file_asset(&self, asset_type: AssetType, relative_path: &str) -> Option<u32> {
        let id = self.with_module(0, |_, api, memory| {
            api.map_or(0, |api| {
                (api.register_file_asset)(memory, asset_type as u32, FfiStr::new(relative_path))
            })
        });
        (id != 0).then_some(id)
    }

    /// Register an asset built from up to four existing assets
    pub fn register_composite_asset(&self, asset_type: AssetType, components: &[u32]) -> Option<u32> {
        let id = self.with_module(0, |_, api, memory| {
            api.map_or(0, |api| {
                (api.register_composite_asset)(
                    memory,
                    asset_type as u32,
                    components.as_ptr(),
                    components.len() as u32,
                )
            })
        });
        (id != 0).then_some(id)
    }

    /// Normalised terrain height at normalised coordinates
    pub fn heightfield_height(&self, x: f32, z: f32) -> Option<f32> {
        self.with_module(None, |_, api, memory| {
            api.map(|api| (api.get_heightfield_height)(memory, x, z))
        })
    }

    pub fn heightmap_asset_id(&self) -> Option<u32> {
        let id = self.with_module(0, |_, api, memory| {
            api.map_or(0, |api| (api.get_heightmap_asset_id)(memory))
        });
        (id != 0).then_some(id)
    }

    /// Load a raw heightmap relative to the assets root
    pub fn load_heightmap(&self, relative_path: &str) -> bool {
        self.with_module(false, |entry, _, memory| {
            entry
                .editor_load_heightmap
                .map_or(false, |load| load(memory, FfiStr::new(relative_path)))
        })
    }

    /// Save the heightmap relative to the assets root
    pub fn save_heightmap(&self, relative_path: &str) -> bool {
        self.with_module(false, |entry, _, memory| {
            entry
                .editor_save_heightmap
                .map_or(false, |save| save(memory, FfiStr::new(relative_path)))
        })
    }

    // ========== Observers ==========

    pub fn subscribe_transactions(&self) -> crossbeam_channel::Receiver<PublishedTransaction> {
        self.services.subscribe_transactions()
    }

    pub fn subscribe_assets(&self) -> crossbeam_channel::Receiver<AssetRegistrationEvent> {
        self.services.subscribe_assets()
    }

    /// Decode the most recently published buffer again
    pub fn replay_last_transaction(&self) -> Result<Option<PublishedTransaction>> {
        Ok(self.services.replay_last_transaction()?)
    }

    pub fn pending_loads(&self) -> Vec<AssetLoadRequest> {
        self.services.pending_loads()
    }

    pub fn perf_report(&self) -> Vec<PerfStats> {
        self.services.perf_report()
    }

    // ========== Shutdown ==========

    /// Unload the module; later calls are no-ops
    pub fn shutdown(&self) {
        let mut slot = self.module.lock();
        if self.state() == RuntimeState::ShutDown {
            return;
        }
        slot.unload();
        self.set_state(RuntimeState::ShutDown);
        log::info!("Interop runtime shut down");
    }
}

impl Drop for InteropRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(dir: &Path) -> EditorConfig {
        let mut config = EditorConfig::default();
        config.memory.editor_region_size = 64 * 1024;
        config.memory.engine_region_size = 64 * 1024;
        config.assets.root = dir.to_path_buf();
        config.reload.startup_retry_ms = 1;
        config.reload.startup_attempts = 3;
        config
    }

    #[test]
    fn test_new_runtime_is_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = InteropRuntime::new(&small_config(dir.path())).unwrap();
        assert_eq!(runtime.state(), RuntimeState::Initialized);
        assert!(!runtime.is_loaded());
        assert!(runtime.begin_transaction().is_none());
        assert_eq!(runtime.heightfield_height(0.5, 0.5), None);
    }

    #[test]
    fn test_missing_engine_region_is_an_arena_error() {
        let mut config = EditorConfig::default();
        config.memory.engine_region_size = 0;
        assert!(matches!(
            InteropRuntime::new(&config),
            Err(InteropError::Arena(ArenaError::InvalidSize(0)))
        ));
    }

    #[test]
    fn test_reload_of_missing_file_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = InteropRuntime::new(&small_config(dir.path())).unwrap();

        let result = runtime.try_reload_code(&dir.path().join("engine.so"), &dir.path().join("shadow.so"));
        assert!(matches!(result, Err(InteropError::ShadowCopy { .. })));
        assert_eq!(runtime.state(), RuntimeState::Failed);
        assert!(runtime.entry_points().is_empty());
    }

    #[test]
    fn test_reload_of_non_library_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("engine.so");
        std::fs::write(&primary, b"not a shared library").unwrap();
        let runtime = InteropRuntime::new(&small_config(dir.path())).unwrap();

        let result = runtime.try_reload_code(&primary, &dir.path().join("shadow.so"));
        assert!(matches!(result, Err(InteropError::LoadError { .. })));
        assert!(dir.path().join("shadow.so").exists());
        assert!(runtime.module_info().is_none());
    }

    #[test]
    fn test_blocking_reload_gives_up_after_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = InteropRuntime::new(&small_config(dir.path())).unwrap();
        assert!(!runtime.reload_blocking(&dir.path().join("engine.so"), &dir.path().join("shadow.so")));
        assert_eq!(runtime.state(), RuntimeState::Failed);
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = InteropRuntime::new(&small_config(dir.path())).unwrap();
        runtime.shutdown();
        runtime.shutdown();
        assert_eq!(runtime.state(), RuntimeState::ShutDown);

        let result = runtime.try_reload_code(&dir.path().join("a"), &dir.path().join("b"));
        assert!(matches!(result, Err(InteropError::ShutDown)));
        assert_eq!(runtime.state(), RuntimeState::ShutDown);
    }
}
