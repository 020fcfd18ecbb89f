//! # strata_host - Editor Interop Runtime
//!
//! Hosts the hot-reloadable engine core. The runtime owns the process
//! arena and the platform service table, loads the engine core from a
//! shadow copy, and swaps it for a fresh build whenever the module file
//! changes, without losing the state the engine core keeps in its region.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐  poll   ┌─────────────────┐  libloading  ┌──────────────┐
//! │   HotReloader   │────────▶│ InteropRuntime  │─────────────▶│ engine core  │
//! │ (build.lock,    │         │ (module lock,   │  EntryPoints │  (cdylib)    │
//! │  watermarks)    │         │  arena)         │              │              │
//! └─────────────────┘         └────────┬────────┘              └──────┬───────┘
//!                                      │                              │
//!                                      ▼                              │
//!                             ┌─────────────────┐   PlatformApi       │
//!                             │PlatformServices │◀────────────────────┘
//!                             │ (files, perf,   │
//!                             │  observers)     │───▶ crossbeam receivers
//!                             └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use strata_host::prelude::*;
//!
//! let config = EditorConfig::load_or_default(None)?;
//! let runtime = InteropRuntime::new(&config)?;
//! runtime.reload_blocking(&config.module.path, &config.module.shadow_path);
//!
//! let published = runtime.subscribe_transactions();
//! if let Some(mut tx) = runtime.begin_transaction() {
//!     tx.add_object(asset_id, Vec3::new(0.0, 0.0, 0.0));
//!     tx.commit();
//! }
//! ```

pub mod config;
mod error;
pub mod hot_reload;
pub mod library;
pub mod platform;
pub mod runtime;
pub mod transaction;

pub use config::EditorConfig;
pub use error::{ConfigError, InteropError, Result};
pub use hot_reload::{HotReloader, WatchedModule};
pub use library::{EngineLibrary, EntryPoints, ModuleSource, StaticModule};
pub use platform::{
    AssetLoadRequest, AssetRegistrationEvent, AssetSource, PerfStats, PlatformServices,
    PublishedTransaction,
};
pub use runtime::{InteropRuntime, ModuleInfo, RuntimeState};
pub use transaction::{Transaction, TransactionState};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::EditorConfig;
    pub use crate::error::{ConfigError, InteropError, Result};
    pub use crate::hot_reload::HotReloader;
    pub use crate::library::{EngineLibrary, ModuleSource, StaticModule};
    pub use crate::platform::{AssetRegistrationEvent, PublishedTransaction};
    pub use crate::runtime::{InteropRuntime, RuntimeState};
    pub use crate::transaction::Transaction;
    pub use strata_abi::{
        AssetType, Command, MaterialProperties, ObjectProperty, TextureSlot, Vec3,
    };
}
