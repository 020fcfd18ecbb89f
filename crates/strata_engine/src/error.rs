//! Reasons a buffered mutation was not applied

use thiserror::Error;

/// A mutation that was skipped at commit time
///
/// Skipped mutations are logged through the platform table and left out
/// of the published command buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("Object {0} does not exist")]
    UnknownObject(u32),

    #[error("Material {0} does not exist")]
    UnknownMaterial(u32),

    #[error("Unknown object property {0}")]
    UnknownProperty(u32),

    #[error("Unknown texture slot {0}")]
    UnknownTextureSlot(u32),

    #[error("Scene already holds the maximum of {0} objects")]
    ObjectCapacity(usize),

    #[error("Scene already holds the maximum of {0} materials")]
    MaterialCapacity(usize),

    #[error("Material {0} cannot be swapped with itself")]
    SelfSwap(u32),
}
