//! Hot-reload driver
//!
//! Polled once per host tick. Compares each watched module file's last
//! write time against the watermark recorded at its last load and reloads
//! it through the runtime when the file is newer. While the `build.lock`
//! marker exists a build is still writing, so nothing is reloaded.

use std::path::{Path, PathBuf};

use crate::config::EditorConfig;
use crate::platform::file_last_write_time;
use crate::runtime::InteropRuntime;

/// A module file being watched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedModule {
    pub primary: PathBuf,
    pub shadow: PathBuf,
    /// Last write time of `primary` at its last successful load
    pub watermark: u64,
}

impl WatchedModule {
    fn is_stale(&self) -> bool {
        file_last_write_time(&self.primary) > self.watermark
    }
}

/// Reloads watched modules when their files change
pub struct HotReloader {
    build_lock: PathBuf,
    modules: Vec<WatchedModule>,
    enabled: bool,
}

impl HotReloader {
    /// Create a reloader suppressed by `build_lock`
    pub fn new(build_lock: impl Into<PathBuf>) -> Self {
        Self {
            build_lock: build_lock.into(),
            modules: Vec::new(),
            enabled: true,
        }
    }

    /// Reloader for the configured engine module
    pub fn from_config(config: &EditorConfig) -> Self {
        let mut reloader = Self::new(config.build_lock_path());
        reloader.watch(&config.module.path, &config.module.shadow_path);
        reloader
    }

    /// Create a disabled reloader (for testing)
    pub fn disabled() -> Self {
        Self {
            build_lock: PathBuf::new(),
            modules: Vec::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start watching a module, taking its current write time as watermark
    pub fn watch(&mut self, primary: impl AsRef<Path>, shadow: impl AsRef<Path>) {
        let primary = primary.as_ref().to_path_buf();
        if self.modules.iter().any(|m| m.primary == primary) {
            return;
        }
        let watermark = file_last_write_time(&primary);
        log::debug!("Watching module for hot-reload: {}", primary.display());
        self.modules.push(WatchedModule {
            primary,
            shadow: shadow.as_ref().to_path_buf(),
            watermark,
        });
    }

    /// Stop watching a module
    pub fn unwatch(&mut self, primary: impl AsRef<Path>) {
        let primary = primary.as_ref();
        self.modules.retain(|m| m.primary != primary);
    }

    /// Whether a build currently holds the lock marker
    pub fn is_build_in_progress(&self) -> bool {
        self.build_lock.exists()
    }

    /// Watched modules whose files are newer than their watermark
    pub fn pending(&self) -> Vec<PathBuf> {
        self.modules
            .iter()
            .filter(|m| m.is_stale())
            .map(|m| m.primary.clone())
            .collect()
    }

    /// Reload every stale module once
    ///
    /// Returns the modules that reloaded. A failed reload keeps its old
    /// watermark and is tried again on the next poll.
    pub fn poll(&mut self, runtime: &InteropRuntime) -> Vec<PathBuf> {
        if !self.enabled {
            return Vec::new();
        }
        if self.is_build_in_progress() {
            log::trace!("Build in progress, reload suppressed");
            return Vec::new();
        }

        let mut reloaded = Vec::new();
        for module in self.modules.iter_mut().filter(|m| m.is_stale()) {
            log::info!("Detected change in module: {}", module.primary.display());
            if runtime.reload_code(&module.primary, &module.shadow) {
                module.watermark = runtime.watermark();
                log::info!("Hot-reloaded engine module: {}", module.primary.display());
                reloaded.push(module.primary.clone());
            }
        }
        reloaded
    }

    pub fn watched(&self) -> &[WatchedModule] {
        &self.modules
    }
}
