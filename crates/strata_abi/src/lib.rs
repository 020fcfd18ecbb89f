//! # strata_abi - Host/Engine Binary Boundary
//!
//! Every type that crosses between the editor host and the hot-reloadable
//! engine core lives here. All of it is `#[repr(C)]` and must stay binary
//! stable across reloads: a host built against one revision keeps driving
//! an engine core rebuilt from a later one.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────────┐   PlatformApi (host fns)   ┌──────────────────┐
//! │   Editor host    │───────────────────────────▶│   Engine core    │
//! │  (strata_host)   │                            │ (strata_engine)  │
//! │                  │◀───────────────────────────│                  │
//! └────────┬─────────┘   editor* entry points,    └────────┬─────────┘
//!          │             EngineApi table                   │
//!          │                                               │
//!          └──────────── EngineMemory (arena) ─────────────┘
//! ```
//!
//! The engine core publishes state changes as a command buffer:
//!
//! ```text
//! [u64 size][u32 kind][payload][u32 kind][payload]...
//! ```
//!
//! Records are packed back to back with no padding, native little-endian.
//! See [`codec`] for the reader and writer.

pub mod asset;
pub mod codec;
pub mod command;
pub mod entry;
mod error;
pub mod ffi;

pub use asset::*;
pub use codec::{CommandReader, CommandRecord, CommandWriter};
pub use command::*;
pub use entry::*;
pub use error::{CodecError, Result};
pub use ffi::*;
