//! Error types for the interop runtime

use std::path::PathBuf;

use strata_abi::CodecError;
use strata_memory::ArenaError;
use thiserror::Error;

/// Result type for interop operations
pub type Result<T> = std::result::Result<T, InteropError>;

/// Errors that can occur while loading and driving the engine core
#[derive(Debug, Error)]
pub enum InteropError {
    /// Failed to load dynamic library
    #[error("Failed to load library '{path}': {message}")]
    LoadError { path: PathBuf, message: String },

    /// Library does not export a required symbol
    #[error("Symbol '{symbol}' not found in module '{module}'")]
    SymbolNotFound { module: String, symbol: String },

    /// Copying the module to its shadow path failed
    #[error("Failed to copy '{from}' to '{to}': {source}")]
    ShadowCopy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Engine API table version differs from the host's
    #[error("Engine API version mismatch: module reports {module_version}, host expects {expected_version}")]
    VersionMismatch { module_version: u32, expected_version: u32 },

    /// `editorInitialize` refused the engine region
    #[error("Engine core failed to initialise in a {region_size} byte region")]
    InitializeFailed { region_size: u64 },

    /// The runtime has been shut down
    #[error("Interop runtime is shut down")]
    ShutDown,

    /// Arena reservation failed
    #[error("Arena error: {0}")]
    Arena(#[from] ArenaError),

    /// Published command buffer could not be decoded
    #[error("Command buffer error: {0}")]
    Codec(#[from] CodecError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InteropError {
    /// Create a load error
    pub fn load_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        InteropError::LoadError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a symbol not found error
    pub fn symbol_not_found(module: impl Into<String>, symbol: impl Into<String>) -> Self {
        InteropError::SymbolNotFound {
            module: module.into(),
            symbol: symbol.into(),
        }
    }

    /// Create a shadow copy error
    pub fn shadow_copy(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InteropError::ShadowCopy {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}

/// Errors reading an editor configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
