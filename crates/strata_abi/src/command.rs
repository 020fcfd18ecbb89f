//! Command records published by the engine core
//!
//! Each record is a `u32` discriminant followed by a fixed-size payload.
//! Payloads are plain old data with no interior padding, so their byte
//! image is exactly their field sequence.

use bytemuck::{Pod, Zeroable};
use serde::Serialize;

use crate::ffi::Vec3;

/// Command discriminants
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CommandKind {
    AddObject = 1,
    DeleteObject = 2,
    SetObjectProperty = 3,
    AddMaterial = 4,
    DeleteMaterial = 5,
    SwapMaterial = 6,
    SetMaterialTexture = 7,
    SetMaterialProperties = 8,
}

impl CommandKind {
    /// Decode a raw discriminant
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::AddObject),
            2 => Some(Self::DeleteObject),
            3 => Some(Self::SetObjectProperty),
            4 => Some(Self::AddMaterial),
            5 => Some(Self::DeleteMaterial),
            6 => Some(Self::SwapMaterial),
            7 => Some(Self::SetMaterialTexture),
            8 => Some(Self::SetMaterialProperties),
            _ => None,
        }
    }

    /// Size of the payload that follows this discriminant
    pub const fn payload_size(self) -> usize {
        use std::mem::size_of;
        match self {
            Self::AddObject => size_of::<AddObjectCommand>(),
            Self::DeleteObject => size_of::<DeleteObjectCommand>(),
            Self::SetObjectProperty => size_of::<SetObjectPropertyCommand>(),
            Self::AddMaterial => size_of::<AddMaterialCommand>(),
            Self::DeleteMaterial => size_of::<DeleteMaterialCommand>(),
            Self::SwapMaterial => size_of::<SwapMaterialCommand>(),
            Self::SetMaterialTexture => size_of::<SetMaterialTextureCommand>(),
            Self::SetMaterialProperties => size_of::<SetMaterialPropertiesCommand>(),
        }
    }
}

/// A payload type bound to exactly one discriminant
pub trait CommandPayload: Pod {
    const KIND: CommandKind;
}

/// Scene object properties addressable by `SetObjectProperty`
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectProperty {
    PositionX = 0,
    PositionY = 1,
    PositionZ = 2,
    RotationY = 3,
    Scale = 4,
}

impl ObjectProperty {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::PositionX),
            1 => Some(Self::PositionY),
            2 => Some(Self::PositionZ),
            3 => Some(Self::RotationY),
            4 => Some(Self::Scale),
            _ => None,
        }
    }
}

/// Texture slots of a terrain material
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TextureSlot {
    Albedo = 0,
    Normal = 1,
    Displacement = 2,
    AmbientOcclusion = 3,
}

impl TextureSlot {
    pub const COUNT: usize = 4;

    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Albedo),
            1 => Some(Self::Normal),
            2 => Some(Self::Displacement),
            3 => Some(Self::AmbientOcclusion),
            _ => None,
        }
    }
}

/// Blend parameters of a terrain material
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct MaterialProperties {
    pub texture_size_in_world_units: f32,
    pub slope_start: f32,
    pub slope_end: f32,
    pub altitude_start: f32,
    pub altitude_end: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct AddObjectCommand {
    /// Allocated by the engine when the transaction is applied
    pub object_id: u32,
    pub asset_id: u32,
    pub position: Vec3,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct DeleteObjectCommand {
    pub object_id: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct SetObjectPropertyCommand {
    pub object_id: u32,
    /// Raw [`ObjectProperty`]
    pub property: u32,
    pub value: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct AddMaterialCommand {
    /// Allocated by the engine when the transaction is applied
    pub material_id: u32,
    /// Asset ids indexed by [`TextureSlot`]
    pub texture_asset_ids: [u32; TextureSlot::COUNT],
    pub props: MaterialProperties,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct DeleteMaterialCommand {
    pub material_id: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct SwapMaterialCommand {
    pub material_id_a: u32,
    pub material_id_b: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct SetMaterialTextureCommand {
    pub material_id: u32,
    /// Raw [`TextureSlot`]
    pub slot: u32,
    pub asset_id: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct SetMaterialPropertiesCommand {
    pub material_id: u32,
    pub props: MaterialProperties,
}

macro_rules! impl_payload {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl CommandPayload for $ty {
                const KIND: CommandKind = CommandKind::$kind;
            }

            impl From<$ty> for Command {
                fn from(payload: $ty) -> Self {
                    Command::$kind(payload)
                }
            }
        )*
    };
}

impl_payload! {
    AddObjectCommand => AddObject,
    DeleteObjectCommand => DeleteObject,
    SetObjectPropertyCommand => SetObjectProperty,
    AddMaterialCommand => AddMaterial,
    DeleteMaterialCommand => DeleteMaterial,
    SwapMaterialCommand => SwapMaterial,
    SetMaterialTextureCommand => SetMaterialTexture,
    SetMaterialPropertiesCommand => SetMaterialProperties,
}

/// An owned, decoded command record
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    AddObject(AddObjectCommand),
    DeleteObject(DeleteObjectCommand),
    SetObjectProperty(SetObjectPropertyCommand),
    AddMaterial(AddMaterialCommand),
    DeleteMaterial(DeleteMaterialCommand),
    SwapMaterial(SwapMaterialCommand),
    SetMaterialTexture(SetMaterialTextureCommand),
    SetMaterialProperties(SetMaterialPropertiesCommand),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::AddObject(_) => CommandKind::AddObject,
            Self::DeleteObject(_) => CommandKind::DeleteObject,
            Self::SetObjectProperty(_) => CommandKind::SetObjectProperty,
            Self::AddMaterial(_) => CommandKind::AddMaterial,
            Self::DeleteMaterial(_) => CommandKind::DeleteMaterial,
            Self::SwapMaterial(_) => CommandKind::SwapMaterial,
            Self::SetMaterialTexture(_) => CommandKind::SetMaterialTexture,
            Self::SetMaterialProperties(_) => CommandKind::SetMaterialProperties,
        }
    }
}
