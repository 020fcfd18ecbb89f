//! Editor Configuration
//!
//! Sizes the arena, locates the engine core module and the assets root,
//! and sets the reload cadence. Every field has a default, so a missing
//! file or a partial one is fine.
//!
//! # Example Config File
//!
//! ```toml
//! [memory]
//! editor_region_size = 1048576
//! engine_region_size = 16777216
//!
//! [module]
//! path = "target/debug/libstrata_engine.so"
//! shadow_path = "target/debug/libstrata_engine_shadow.so"
//! build_lock = "build.lock"   # resolved next to the module
//!
//! [assets]
//! root = "assets"
//!
//! [reload]
//! startup_retry_ms = 100
//! startup_attempts = 0        # 0 retries until the module loads
//! tick_ms = 16
//! ```

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Arena sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Bytes reserved for the host (replay buffer)
    pub editor_region_size: u64,
    /// Bytes handed to the engine core
    pub engine_region_size: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            editor_region_size: 1024 * 1024,
            engine_region_size: 16 * 1024 * 1024,
        }
    }
}

/// Engine core module location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Library written by the build
    pub path: PathBuf,
    /// Copy that is actually loaded
    pub shadow_path: PathBuf,
    /// Marker file name whose presence means a build is running
    pub build_lock: String,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        let dir = Path::new("target").join("debug");
        Self {
            path: dir.join(format!("{}strata_engine{}", DLL_PREFIX, DLL_SUFFIX)),
            shadow_path: dir.join(format!("{}strata_engine_shadow{}", DLL_PREFIX, DLL_SUFFIX)),
            build_lock: "build.lock".to_string(),
        }
    }
}

/// Asset file locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory that relative asset paths resolve against
    pub root: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
        }
    }
}

/// Reload and tick cadence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Sleep between blocking startup load attempts
    pub startup_retry_ms: u64,
    /// Blocking startup attempts before giving up, 0 for unlimited
    pub startup_attempts: u32,
    /// Host tick interval
    pub tick_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            startup_retry_ms: 100,
            startup_attempts: 0,
            tick_ms: 16,
        }
    }
}

/// Complete editor configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub memory: MemoryConfig,
    pub module: ModuleConfig,
    pub assets: AssetsConfig,
    pub reload: ReloadConfig,
}

impl EditorConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded editor config from {}", path.display());
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Marker file that suppresses reloads, next to the module
    pub fn build_lock_path(&self) -> PathBuf {
        self.module
            .path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&self.module.build_lock)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.reload.tick_ms)
    }

    pub fn startup_retry(&self) -> Duration {
        Duration::from_millis(self.reload.startup_retry_ms)
    }

    /// Log the effective configuration
    pub fn print_summary(&self) {
        log::info!(
            "Arena: editor region {} KiB, engine region {} KiB",
            self.memory.editor_region_size / 1024,
            self.memory.engine_region_size / 1024
        );
        log::info!(
            "Module: {} (shadow {})",
            self.module.path.display(),
            self.module.shadow_path.display()
        );
        log::info!("Assets root: {}", self.assets.root.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.module.build_lock, "build.lock");
        assert_eq!(config.tick_interval(), Duration::from_millis(16));
        assert!(config.memory.engine_region_size > config.memory.editor_region_size);
    }

    #[test]
    fn test_partial_toml() {
        let config: EditorConfig = toml::from_str(
            r#"
            [module]
            path = "bin/engine.so"

            [reload]
            tick_ms = 33
            "#,
        )
        .unwrap();

        assert_eq!(config.module.path, PathBuf::from("bin/engine.so"));
        assert_eq!(config.module.build_lock, "build.lock");
        assert_eq!(config.reload.tick_ms, 33);
        assert_eq!(config.reload.startup_retry_ms, 100);
        assert_eq!(config.memory, MemoryConfig::default());
    }

    #[test]
    fn test_build_lock_next_to_module() {
        let mut config = EditorConfig::default();
        config.module.path = PathBuf::from("out/engine.so");
        assert_eq!(config.build_lock_path(), PathBuf::from("out/build.lock"));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(EditorConfig::load(&missing), Err(ConfigError::Read { .. })));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[memory\n").unwrap();
        assert!(matches!(EditorConfig::load(&bad), Err(ConfigError::Parse { .. })));

        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[assets]\nroot = \"data\"\n").unwrap();
        assert_eq!(EditorConfig::load(&good).unwrap().assets.root, PathBuf::from("data"));
    }
}
