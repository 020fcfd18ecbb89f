//! Engine core module loading
//!
//! A module is anything that can hand out exported symbols by name: the
//! shared library built from `strata_engine`, or a static table when the
//! engine core is linked into the process. Entry points are resolved once
//! per load into [`EntryPoints`], where every slot is optional.

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use strata_abi::*;

use crate::error::{InteropError, Result};

/// Source of exported symbols
pub trait ModuleSource: Send {
    /// Name used in log messages
    fn name(&self) -> &str;

    /// Address of an exported symbol
    fn symbol(&self, name: &str) -> Option<*const c_void>;
}

/// A loaded engine core shared library
pub struct EngineLibrary {
    library: Library,
    path: PathBuf,
    name: String,
}

impl EngineLibrary {
    /// Load a shared library from a path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let library =
            unsafe { Library::new(path).map_err(|e| InteropError::load_error(path, e.to_string()))? };

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        log::info!("Loaded engine library '{}' from {}", name, path.display());
        Ok(Self {
            library,
            path: path.to_path_buf(),
            name,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModuleSource for EngineLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self, name: &str) -> Option<*const c_void> {
        let mut symbol_name = Vec::with_capacity(name.len() + 1);
        symbol_name.extend_from_slice(name.as_bytes());
        symbol_name.push(0);

        let symbol: Symbol<*const c_void> = unsafe { self.library.get(&symbol_name) }.ok()?;
        let address = *symbol;
        (!address.is_null()).then_some(address)
    }
}

impl Drop for EngineLibrary {
    fn drop(&mut self) {
        log::debug!("Unloading engine library '{}'", self.name);
    }
}

/// Symbol table for an engine core linked into the host process
#[derive(Debug, Clone)]
pub struct StaticModule {
    name: String,
    // Addresses as integers so the table stays Send
    symbols: HashMap<String, usize>,
}

impl StaticModule {
    pub fn new<'a>(name: impl Into<String>, symbols: impl IntoIterator<Item = (&'a str, *const c_void)>) -> Self {
        Self {
            name: name.into(),
            symbols: symbols
                .into_iter()
                .map(|(symbol, address)| (symbol.to_string(), address as usize))
                .collect(),
        }
    }

    /// Same table with one symbol removed
    pub fn without(mut self, symbol: &str) -> Self {
        self.symbols.remove(symbol);
        self
    }
}

impl ModuleSource for StaticModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self, name: &str) -> Option<*const c_void> {
        self.symbols.get(name).map(|&address| address as *const c_void)
    }
}

macro_rules! resolve {
    ($module:expr, $symbol:expr, $ty:ty) => {{
        let resolved = $module
            .symbol($symbol)
            .map(|address| unsafe { std::mem::transmute::<*const c_void, $ty>(address) });
        if resolved.is_none() {
            log::debug!("Module '{}' does not export '{}'", $module.name(), $symbol);
        }
        resolved
    }};
}

/// Typed entry points of one loaded module
///
/// Absent exports are `None`; callers skip them.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryPoints {
    pub engine_get_api: Option<EngineGetApiFn>,
    pub editor_initialize: Option<EditorInitializeFn>,
    pub editor_update: Option<EditorUpdateFn>,
    pub editor_begin_transaction: Option<EditorBeginTransactionFn>,
    pub editor_commit_transaction: Option<EditorCommitTransactionFn>,
    pub editor_discard_transaction: Option<EditorDiscardTransactionFn>,
    pub editor_clear_transaction: Option<EditorClearTransactionFn>,
    pub editor_add_object: Option<EditorAddObjectFn>,
    pub editor_delete_object: Option<EditorDeleteObjectFn>,
    pub editor_set_object_property: Option<EditorSetObjectPropertyFn>,
    pub editor_add_material: Option<EditorAddMaterialFn>,
    pub editor_delete_material: Option<EditorDeleteMaterialFn>,
    pub editor_swap_material: Option<EditorSwapMaterialFn>,
    pub editor_set_material_texture: Option<EditorSetMaterialTextureFn>,
    pub editor_set_material_properties: Option<EditorSetMaterialPropertiesFn>,
    pub editor_load_heightmap: Option<EditorLoadHeightmapFn>,
    pub editor_save_heightmap: Option<EditorSaveHeightmapFn>,
}

impl EntryPoints {
    /// Resolve every known entry point from a module
    pub fn resolve(module: &dyn ModuleSource) -> Self {
        Self {
            engine_get_api: resolve!(module, symbol::ENGINE_GET_API, EngineGetApiFn),
            editor_initialize: resolve!(module, symbol::EDITOR_INITIALIZE, EditorInitializeFn),
            editor_update: resolve!(module, symbol::EDITOR_UPDATE, EditorUpdateFn),
            editor_begin_transaction: resolve!(
                module,
                symbol::EDITOR_BEGIN_TRANSACTION,
                EditorBeginTransactionFn
            ),
            editor_commit_transaction: resolve!(
                module,
                symbol::EDITOR_COMMIT_TRANSACTION,
                EditorCommitTransactionFn
            ),
            editor_discard_transaction: resolve!(
                module,
                symbol::EDITOR_DISCARD_TRANSACTION,
                EditorDiscardTransactionFn
            ),
            editor_clear_transaction: resolve!(
                module,
                symbol::EDITOR_CLEAR_TRANSACTION,
                EditorClearTransactionFn
            ),
            editor_add_object: resolve!(module, symbol::EDITOR_ADD_OBJECT, EditorAddObjectFn),
            editor_delete_object: resolve!(module, symbol::EDITOR_DELETE_OBJECT, EditorDeleteObjectFn),
            editor_set_object_property: resolve!(
                module,
                symbol::EDITOR_SET_OBJECT_PROPERTY,
                EditorSetObjectPropertyFn
            ),
            editor_add_material: resolve!(module, symbol::EDITOR_ADD_MATERIAL, EditorAddMaterialFn),
            editor_delete_material: resolve!(
                module,
                symbol::EDITOR_DELETE_MATERIAL,
                EditorDeleteMaterialFn
            ),
            editor_swap_material: resolve!(module, symbol::EDITOR_SWAP_MATERIAL, EditorSwapMaterialFn),
            editor_set_material_texture: resolve!(
                module,
                symbol::EDITOR_SET_MATERIAL_TEXTURE,
                EditorSetMaterialTextureFn
            ),
            editor_set_material_properties: resolve!(
                module,
                symbol::EDITOR_SET_MATERIAL_PROPERTIES,
                EditorSetMaterialPropertiesFn
            ),
            editor_load_heightmap: resolve!(
                module,
                symbol::EDITOR_LOAD_HEIGHTMAP,
                EditorLoadHeightmapFn
            ),
            editor_save_heightmap: resolve!(
                module,
                symbol::EDITOR_SAVE_HEIGHTMAP,
                EditorSaveHeightmapFn
            ),
        }
    }

    /// No module loaded
    pub fn empty() -> Self {
        Self::default()
    }

    /// Presence of each entry point, in [`symbol::ALL`] order
    fn presence(&self) -> [bool; 17] {
        [
            self.engine_get_api.is_some(),
            self.editor_initialize.is_some(),
            self.editor_update.is_some(),
            self.editor_begin_transaction.is_some(),
            self.editor_commit_transaction.is_some(),
            self.editor_discard_transaction.is_some(),
            self.editor_clear_transaction.is_some(),
            self.editor_add_object.is_some(),
            self.editor_delete_object.is_some(),
            self.editor_set_object_property.is_some(),
            self.editor_add_material.is_some(),
            self.editor_delete_material.is_some(),
            self.editor_swap_material.is_some(),
            self.editor_set_material_texture.is_some(),
            self.editor_set_material_properties.is_some(),
            self.editor_load_heightmap.is_some(),
            self.editor_save_heightmap.is_some(),
        ]
    }

    /// Names of the resolved entry points
    pub fn present(&self) -> Vec<&'static str> {
        symbol::ALL
            .iter()
            .zip(self.presence())
            .filter_map(|(name, present)| present.then_some(*name))
            .collect()
    }

    /// Names of the entry points the module did not export
    pub fn missing(&self) -> Vec<&'static str> {
        symbol::ALL
            .iter()
            .zip(self.presence())
            .filter_map(|(name, present)| (!present).then_some(*name))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.presence().iter().all(|present| !present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn fake_initialize(_memory: *mut EngineMemory) -> bool {
        true
    }

    #[test]
    fn test_empty_entry_points() {
        let entry = EntryPoints::empty();
        assert!(entry.is_empty());
        assert!(entry.present().is_empty());
        assert_eq!(entry.missing(), symbol::ALL);
    }

    #[test]
    fn test_partial_module() {
        let module = StaticModule::new(
            "partial",
            [(
                symbol::EDITOR_INITIALIZE,
                fake_initialize as EditorInitializeFn as *const c_void,
            )],
        );
        let entry = EntryPoints::resolve(&module);

        assert!(!entry.is_empty());
        assert_eq!(entry.present(), vec![symbol::EDITOR_INITIALIZE]);
        assert_eq!(entry.missing().len(), symbol::ALL.len() - 1);
        let initialize = entry.editor_initialize.unwrap();
        assert!(initialize(std::ptr::null_mut()));
    }

    #[test]
    fn test_static_module_without() {
        let module = StaticModule::new(
            "engine",
            [(
                symbol::EDITOR_INITIALIZE,
                fake_initialize as EditorInitializeFn as *const c_void,
            )],
        )
        .without(symbol::EDITOR_INITIALIZE);
        assert!(module.symbol(symbol::EDITOR_INITIALIZE).is_none());
        assert_eq!(module.name(), "engine");
    }

    #[test]
    fn test_load_missing_library() {
        let dir = tempfile::tempdir().unwrap();
        let result = EngineLibrary::load(dir.path().join("nope.so"));
        assert!(matches!(result, Err(InteropError::LoadError { .. })));
    }
}
