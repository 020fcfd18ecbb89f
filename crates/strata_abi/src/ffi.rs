//! FFI types shared by the editor host and the engine core
//!
//! This module defines the C ABI types used to communicate across the
//! module boundary. All types use `#[repr(C)]` for ABI compatibility.
//! Field order is part of the contract; append, never reorder.

use std::ffi::{c_char, c_void};

use crate::asset::AssetRegistration;

/// Version of the [`EngineApi`] table layout
pub const ENGINE_API_VERSION: u32 = 1;

/// Borrowed UTF-8 string passed by pointer and length
///
/// Only valid for the duration of the call it is passed to.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl FfiStr {
    /// An empty string with a null pointer
    pub const fn empty() -> Self {
        Self { ptr: std::ptr::null(), len: 0 }
    }

    /// Borrow a Rust string for the duration of a call
    pub fn new(s: &str) -> Self {
        Self { ptr: s.as_ptr(), len: s.len() }
    }

    /// Borrow raw bytes that are expected to be UTF-8
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self { ptr: bytes.as_ptr(), len: bytes.len() }
    }

    /// View as a string slice
    ///
    /// Returns `None` for a null pointer or invalid UTF-8.
    ///
    /// # Safety
    /// `ptr` must point to `len` readable bytes that outlive `'a`.
    pub unsafe fn as_str<'a>(&self) -> Option<&'a str> {
        if self.ptr.is_null() {
            return if self.len == 0 { Some("") } else { None };
        }
        let bytes = std::slice::from_raw_parts(self.ptr, self.len);
        std::str::from_utf8(bytes).ok()
    }
}

/// Severity of a message logged through the platform table
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Decode a raw level, clamping unknown values to `Trace`
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Error,
            2 => Self::Warn,
            3 => Self::Info,
            4 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

/// Three-component vector (matches the engine's float3)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable, serde::Serialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// File contents handed to the engine by `read_entire_file`
///
/// Owned by the host; return it with `release_file`.
#[repr(C)]
#[derive(Debug)]
pub struct FileBuffer {
    pub data: *mut u8,
    pub len: u64,
}

impl FileBuffer {
    pub const fn empty() -> Self {
        Self { data: std::ptr::null_mut(), len: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_null() || self.len == 0
    }
}

impl Default for FileBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Platform service table (host -> engine)
// ============================================================================

/// Log a message at a [`LogLevel`]
pub type LogFn = extern "C" fn(host: *mut c_void, level: u32, message: FfiStr);

/// Last write time of a file in nanoseconds since the Unix epoch, 0 if missing
pub type GetFileLastWriteTimeFn = extern "C" fn(host: *mut c_void, path: FfiStr) -> u64;

/// Read a whole file into a host-owned buffer
pub type ReadEntireFileFn =
    extern "C" fn(host: *mut c_void, path: FfiStr, out: *mut FileBuffer) -> bool;

/// Release a buffer returned by [`ReadEntireFileFn`]
pub type ReleaseFileFn = extern "C" fn(host: *mut c_void, buffer: *mut FileBuffer);

/// Replace a file's contents
pub type WriteEntireFileFn =
    extern "C" fn(host: *mut c_void, path: FfiStr, data: *const u8, len: u64) -> bool;

/// Ask the host to load an asset file on its next tick
pub type QueueAssetLoadFn = extern "C" fn(host: *mut c_void, asset_id: u32, path: FfiStr);

/// Announce a new or changed asset registration
pub type NotifyAssetRegisteredFn =
    extern "C" fn(host: *mut c_void, registration: *const AssetRegistration);

/// Publish a committed transaction as a command buffer
pub type PublishTransactionFn = extern "C" fn(host: *mut c_void, buffer: *const u8);

/// Start or end a named perf counter
pub type PerfCounterFn = extern "C" fn(host: *mut c_void, name: FfiStr);

/// Host services available to the engine core
///
/// Built once by the host and handed unchanged to every load. The engine
/// reaches host-owned effects only through these slots. Slots are plain
/// function pointers, so none can be null.
#[repr(C)]
pub struct PlatformApi {
    /// Opaque host context passed back as the first argument of every slot
    pub host: *mut c_void,

    // Diagnostics
    pub log: LogFn,
    pub start_perf_counter: PerfCounterFn,
    pub end_perf_counter: PerfCounterFn,

    // File I/O
    pub get_file_last_write_time: GetFileLastWriteTimeFn,
    pub read_entire_file: ReadEntireFileFn,
    pub release_file: ReleaseFileFn,
    pub write_entire_file: WriteEntireFileFn,

    // Assets
    pub queue_asset_load: QueueAssetLoadFn,
    pub notify_asset_registered: NotifyAssetRegisteredFn,

    // Transactions
    pub publish_transaction: PublishTransactionFn,
}

// Safety: the table is immutable after construction and every slot is
// required to be callable from any thread holding the reload lock
unsafe impl Send for PlatformApi {}
unsafe impl Sync for PlatformApi {}

impl PlatformApi {
    /// Log through the host
    pub fn log(&self, level: LogLevel, message: &str) {
        (self.log)(self.host, level as u32, FfiStr::new(message));
    }

    /// Run `f` bracketed by a named perf counter
    pub fn timed<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
        (self.start_perf_counter)(self.host, FfiStr::new(name));
        let result = f();
        (self.end_perf_counter)(self.host, FfiStr::new(name));
        result
    }
}

// ============================================================================
// Engine memory and API table (engine -> host)
// ============================================================================

/// Descriptor of the arena region owned by the engine core
///
/// The descriptor itself is host-owned and lives at a stable address for
/// the life of the process; `base` is stable as well.
#[repr(C)]
#[derive(Debug)]
pub struct EngineMemory {
    /// Platform services, re-supplied on every load
    pub platform: *const PlatformApi,
    /// Start of the engine region
    pub base: *mut u8,
    /// Size of the engine region in bytes
    pub size: u64,
}

unsafe impl Send for EngineMemory {}
unsafe impl Sync for EngineMemory {}

/// Called by the host when a queued asset file has been read
pub type OnAssetLoadedFn =
    extern "C" fn(memory: *mut EngineMemory, asset_id: u32, data: *const u8, len: u64);

/// Register a file-backed asset; returns its id or 0
pub type RegisterFileAssetFn =
    extern "C" fn(memory: *mut EngineMemory, asset_type: u32, relative_path: FfiStr) -> u32;

/// Register an asset built from other assets; returns its id or 0
pub type RegisterCompositeAssetFn =
    extern "C" fn(memory: *mut EngineMemory, asset_type: u32, components: *const u32, count: u32) -> u32;

/// Normalised terrain height at normalised coordinates
pub type GetHeightfieldHeightFn = extern "C" fn(memory: *mut EngineMemory, x: f32, z: f32) -> f32;

/// Id of the virtual asset wrapping the heightmap
pub type GetHeightmapAssetIdFn = extern "C" fn(memory: *mut EngineMemory) -> u32;

/// Table returned by `engine_get_api`
///
/// This layout is the binary contract between host and engine core.
#[repr(C)]
pub struct EngineApi {
    pub version: u32,
    pub on_asset_loaded: OnAssetLoadedFn,
    pub register_file_asset: RegisterFileAssetFn,
    pub register_composite_asset: RegisterCompositeAssetFn,
    pub get_heightfield_height: GetHeightfieldHeightFn,
    pub get_heightmap_asset_id: GetHeightmapAssetIdFn,
}

/// Renderer symbol lookup handed to the engine core
pub type GetProcAddressFn = extern "C" fn(name: *const c_char) -> *const c_void;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffi_str_round_trip() {
        let s = FfiStr::new("terrain/rock.tga");
        assert_eq!(unsafe { s.as_str() }, Some("terrain/rock.tga"));
    }

    #[test]
    fn test_ffi_str_null() {
        assert_eq!(unsafe { FfiStr::empty().as_str() }, Some(""));

        let bogus = FfiStr { ptr: std::ptr::null(), len: 4 };
        assert_eq!(unsafe { bogus.as_str() }, None);
    }

    #[test]
    fn test_log_level_from_raw() {
        assert_eq!(LogLevel::from_raw(2), LogLevel::Warn);
        assert_eq!(LogLevel::from_raw(99), LogLevel::Trace);
    }
}
