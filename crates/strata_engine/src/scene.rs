//! Scene objects and terrain materials
//!
//! Applying a command either changes the scene and returns the command as
//! it should be published (with freshly allocated ids filled in), or
//! leaves the scene untouched and says why.

use strata_abi::{
    AddMaterialCommand, AddObjectCommand, Command, DeleteMaterialCommand, DeleteObjectCommand,
    MaterialProperties, ObjectProperty, SetMaterialPropertiesCommand, SetMaterialTextureCommand,
    SetObjectPropertyCommand, SwapMaterialCommand, TextureSlot, Vec3,
};

use crate::error::ApplyError;

pub const MAX_OBJECTS: usize = 1024;
pub const MAX_MATERIALS: usize = 32;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SceneObject {
    pub id: u32,
    pub asset_id: u32,
    pub position: Vec3,
    pub rotation_y: f32,
    pub scale: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Material {
    pub id: u32,
    pub texture_asset_ids: [u32; TextureSlot::COUNT],
    pub props: MaterialProperties,
}

/// Objects in insertion order, materials in blend order
#[repr(C)]
pub struct Scene {
    pub next_object_id: u32,
    pub next_material_id: u32,
    pub object_count: u32,
    pub material_count: u32,
    pub objects: [SceneObject; MAX_OBJECTS],
    pub materials: [Material; MAX_MATERIALS],
}

fn allocate_id(next: &mut u32) -> u32 {
    let id = *next;
    *next = next.wrapping_add(1).max(1);
    id
}

impl Scene {
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects[..self.object_count as usize]
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials[..self.material_count as usize]
    }

    pub fn object(&self, id: u32) -> Option<&SceneObject> {
        self.objects().iter().find(|o| o.id == id)
    }

    pub fn material(&self, id: u32) -> Option<&Material> {
        self.materials().iter().find(|m| m.id == id)
    }

    fn object_index(&self, id: u32) -> Result<usize, ApplyError> {
        self.objects()
            .iter()
            .position(|o| o.id == id)
            .ok_or(ApplyError::UnknownObject(id))
    }

    fn material_index(&self, id: u32) -> Result<usize, ApplyError> {
        self.materials()
            .iter()
            .position(|m| m.id == id)
            .ok_or(ApplyError::UnknownMaterial(id))
    }

    /// Apply one buffered mutation
    pub fn apply(&mut self, command: &Command) -> Result<Command, ApplyError> {
        match *command {
            Command::AddObject(cmd) => self.add_object(cmd).map(Command::AddObject),
            Command::DeleteObject(cmd) => self.delete_object(cmd).map(Command::DeleteObject),
            Command::SetObjectProperty(cmd) => {
                self.set_object_property(cmd).map(Command::SetObjectProperty)
            }
            Command::AddMaterial(cmd) => self.add_material(cmd).map(Command::AddMaterial),
            Command::DeleteMaterial(cmd) => self.delete_material(cmd).map(Command::DeleteMaterial),
            Command::SwapMaterial(cmd) => self.swap_material(cmd).map(Command::SwapMaterial),
            Command::SetMaterialTexture(cmd) => {
                self.set_material_texture(cmd).map(Command::SetMaterialTexture)
            }
            Command::SetMaterialProperties(cmd) => {
                self.set_material_properties(cmd).map(Command::SetMaterialProperties)
            }
        }
    }

    fn add_object(&mut self, mut cmd: AddObjectCommand) -> Result<AddObjectCommand, ApplyError> {
        let count = self.object_count as usize;
        if count >= MAX_OBJECTS {
            return Err(ApplyError::ObjectCapacity(MAX_OBJECTS));
        }

        cmd.object_id = allocate_id(&mut self.next_object_id);
        self.objects[count] = SceneObject {
            id: cmd.object_id,
            asset_id: cmd.asset_id,
            position: cmd.position,
            rotation_y: 0.0,
            scale: 1.0,
        };
        self.object_count += 1;
        Ok(cmd)
    }

    fn delete_object(&mut self, cmd: DeleteObjectCommand) -> Result<DeleteObjectCommand, ApplyError> {
        let index = self.object_index(cmd.object_id)?;
        let count = self.object_count as usize;
        self.objects.copy_within(index + 1..count, index);
        self.objects[count - 1] = SceneObject::default();
        self.object_count -= 1;
        Ok(cmd)
    }

    fn set_object_property(
        &mut self,
        cmd: SetObjectPropertyCommand,
    ) -> Result<SetObjectPropertyCommand, ApplyError> {
        let property =
            ObjectProperty::from_raw(cmd.property).ok_or(ApplyError::UnknownProperty(cmd.property))?;
        let index = self.object_index(cmd.object_id)?;
        let object = &mut self.objects[index];
        match property {
            ObjectProperty::PositionX => object.position.x = cmd.value,
            ObjectProperty::PositionY => object.position.y = cmd.value,
            ObjectProperty::PositionZ => object.position.z = cmd.value,
            ObjectProperty::RotationY => object.rotation_y = cmd.value,
            ObjectProperty::Scale => object.scale = cmd.value,
        }
        Ok(cmd)
    }

    fn add_material(&mut self, mut cmd: AddMaterialCommand) -> Result<AddMaterialCommand, ApplyError> {
        let count = self.material_count as usize;
        if count >= MAX_MATERIALS {
            return Err(ApplyError::MaterialCapacity(MAX_MATERIALS));
        }

        cmd.material_id = allocate_id(&mut self.next_material_id);
        self.materials[count] = Material {
            id: cmd.material_id,
            texture_asset_ids: cmd.texture_asset_ids,
            props: cmd.props,
        };
        self.material_count += 1;
        Ok(cmd)
    }

    fn delete_material(
        &mut self,
        cmd: DeleteMaterialCommand,
    ) -> Result<DeleteMaterialCommand, ApplyError> {
        let index = self.material_index(cmd.material_id)?;
        let count = self.material_count as usize;
        self.materials.copy_within(index + 1..count, index);
        self.materials[count - 1] = Material::default();
        self.material_count -= 1;
        Ok(cmd)
    }

    fn swap_material(&mut self, cmd: SwapMaterialCommand) -> Result<SwapMaterialCommand, ApplyError> {
        let a = self.material_index(cmd.material_id_a)?;
        let b = self.material_index(cmd.material_id_b)?;
        if a == b {
            return Err(ApplyError::SelfSwap(cmd.material_id_a));
        }
        self.materials.swap(a, b);
        Ok(cmd)
    }

    fn set_material_texture(
        &mut self,
        cmd: SetMaterialTextureCommand,
    ) -> Result<SetMaterialTextureCommand, ApplyError> {
        let slot = TextureSlot::from_raw(cmd.slot).ok_or(ApplyError::UnknownTextureSlot(cmd.slot))?;
        let index = self.material_index(cmd.material_id)?;
        self.materials[index].texture_asset_ids[slot as usize] = cmd.asset_id;
        Ok(cmd)
    }

    fn set_material_properties(
        &mut self,
        cmd: SetMaterialPropertiesCommand,
    ) -> Result<SetMaterialPropertiesCommand, ApplyError> {
        let index = self.material_index(cmd.material_id)?;
        self.materials[index].props = cmd.props;
        Ok(cmd)
    }
}
