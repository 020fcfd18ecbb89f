//! Host-side transaction handle
//!
//! Wraps the opaque handle returned by `editorBeginTransaction`. Mutations
//! are buffered by the engine core and applied only on commit. A guard
//! dropped while still active discards its transaction.

use serde::Serialize;
use strata_abi::*;

use crate::library::EntryPoints;
use crate::platform::PublishedTransaction;
use crate::runtime::InteropRuntime;

/// The state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionState {
    /// Accepting mutations
    Active,
    /// Applied and published
    Committed,
    /// Dropped without effect
    Discarded,
}

/// An open engine transaction
pub struct Transaction<'a> {
    runtime: &'a InteropRuntime,
    handle: *mut RawTransaction,
    state: TransactionState,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(runtime: &'a InteropRuntime, handle: *mut RawTransaction) -> Self {
        Self {
            runtime,
            handle,
            state: TransactionState::Active,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Raw handle as returned by the engine core
    pub fn handle(&self) -> *mut RawTransaction {
        self.handle
    }

    fn call(&self, f: impl FnOnce(&EntryPoints, *mut EngineMemory, *mut RawTransaction)) {
        let handle = self.handle;
        self.runtime.with_module((), |entry, _, memory| f(entry, memory, handle));
    }

    // ========== Mutations ==========

    pub fn add_object(&mut self, asset_id: u32, position: Vec3) {
        self.call(|entry, memory, tx| {
            if let Some(add) = entry.editor_add_object {
                add(memory, tx, asset_id, position);
            }
        });
    }

    pub fn delete_object(&mut self, object_id: u32) {
        self.call(|entry, memory, tx| {
            if let Some(delete) = entry.editor_delete_object {
                delete(memory, tx, object_id);
            }
        });
    }

    pub fn set_object_property(&mut self, object_id: u32, property: ObjectProperty, value: f32) {
        self.call(|entry, memory, tx| {
            if let Some(set) = entry.editor_set_object_property {
                set(memory, tx, object_id, property as u32, value);
            }
        });
    }

    pub fn add_material(
        &mut self,
        texture_asset_ids: [u32; TextureSlot::COUNT],
        props: MaterialProperties,
    ) {
        self.call(|entry, memory, tx| {
            if let Some(add) = entry.editor_add_material {
                add(memory, tx, texture_asset_ids.as_ptr(), props);
            }
        });
    }

    pub fn delete_material(&mut self, material_id: u32) {
        self.call(|entry, memory, tx| {
            if let Some(delete) = entry.editor_delete_material {
                delete(memory, tx, material_id);
            }
        });
    }

    /// Swap the blend order of two materials
    pub fn swap_material(&mut self, material_id_a: u32, material_id_b: u32) {
        self.call(|entry, memory, tx| {
            if let Some(swap) = entry.editor_swap_material {
                swap(memory, tx, material_id_a, material_id_b);
            }
        });
    }

    pub fn set_material_texture(&mut self, material_id: u32, slot: TextureSlot, asset_id: u32) {
        self.call(|entry, memory, tx| {
            if let Some(set) = entry.editor_set_material_texture {
                set(memory, tx, material_id, slot as u32, asset_id);
            }
        });
    }

    pub fn set_material_properties(&mut self, material_id: u32, props: MaterialProperties) {
        self.call(|entry, memory, tx| {
            if let Some(set) = entry.editor_set_material_properties {
                set(memory, tx, material_id, props);
            }
        });
    }

    /// Forget buffered mutations and keep the transaction open
    pub fn clear(&mut self) {
        self.call(|entry, memory, tx| {
            if let Some(clear) = entry.editor_clear_transaction {
                clear(memory, tx);
            }
        });
    }

    // ========== Terminal operations ==========

    /// Apply everything in order and return what was published
    pub fn commit(mut self) -> Option<PublishedTransaction> {
        let services = self.runtime.services();
        let before = services.publish_count();

        self.call(|entry, memory, tx| {
            if let Some(commit) = entry.editor_commit_transaction {
                commit(memory, tx);
            }
        });
        self.state = TransactionState::Committed;
        services.published_since(before)
    }

    /// Drop every buffered mutation without publishing
    pub fn discard(mut self) {
        self.discard_in_place();
    }

    fn discard_in_place(&mut self) {
        self.call(|entry, memory, tx| {
            if let Some(discard) = entry.editor_discard_transaction {
                discard(memory, tx);
            }
        });
        self.state = TransactionState::Discarded;
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            log::debug!("Transaction {:p} dropped while active, discarding", self.handle);
            self.discard_in_place();
        }
    }
}
