//! Flat scene model consumed by the lightmapper
//!
//! Nodes live in a table owned by [`Scene`]; everything else refers to them by
//! [`NodeId`] and looks them up on demand, so no baking structure ever owns a node.

use crate::accel::Aabb;
use crate::geometry::MeshBuffers;
use crate::lightmap::tracer::DirectionalLightParameters;
use glam::{Mat4, Quat, Vec3};

/// Index of a node in [`Scene`]'s node table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// World transformation of a node
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub fn new() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::new()
        }
    }

    pub fn new_with(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Largest absolute scale component
    pub fn max_scale(&self) -> f32 {
        self.scale.abs().max_element()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/// Renderable flavours; only static models and terrain patches are baked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderableKind {
    StaticModel,
    TerrainPatch,
    Dynamic,
}

/// One sub-geometry with its LOD chain (LOD 0 first)
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub lods: Vec<MeshBuffers>,
}

impl Geometry {
    pub fn single(mesh: MeshBuffers) -> Self {
        Self { lods: vec![mesh] }
    }

    /// Requested LOD, clamped to the coarsest available
    pub fn lod(&self, lod: u32) -> Option<(u32, &MeshBuffers)> {
        let last = self.lods.len().checked_sub(1)?;
        let index = (lod as usize).min(last);
        Some((index as u32, &self.lods[index]))
    }
}

/// Drawable component; the lightmap fields are written by chart assignment
#[derive(Debug, Clone)]
pub struct Renderable {
    pub kind: RenderableKind,
    pub geometries: Vec<Geometry>,
    pub bake_lightmap: bool,
    pub lightmap_index: Option<u32>,
    /// Lightmap UV transform as (scale.x, scale.y, offset.x, offset.y)
    pub lightmap_scale_offset: [f32; 4],
}

impl Renderable {
    pub fn static_model(mesh: MeshBuffers) -> Self {
        Self::new(RenderableKind::StaticModel, vec![Geometry::single(mesh)])
    }

    pub fn new(kind: RenderableKind, geometries: Vec<Geometry>) -> Self {
        Self {
            kind,
            geometries,
            bake_lightmap: true,
            lightmap_index: None,
            lightmap_scale_offset: [1.0, 1.0, 0.0, 0.0],
        }
    }

    pub fn is_lightmapped(&self) -> bool {
        self.bake_lightmap &&
        matches!(self.kind, RenderableKind::StaticModel | RenderableKind::TerrainPatch)
    }

    /// Local bounds of all geometries at the given LOD
    pub fn local_bounds(&self, lod: u32) -> Aabb {
        let mut aabb = Aabb::empty();
        for geometry in &self.geometries {
            if let Some((_, mesh)) = geometry.lod(lod) {
                aabb.expand_aabb(&mesh.bounds());
            }
        }
        aabb
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub renderable: Option<Renderable>,
}

impl SceneNode {
    pub fn world_matrix(&self) -> Mat4 {
        self.transform.to_matrix()
    }

    /// Renderable that takes part in lightmapping, if any
    pub fn lightmapped(&self) -> Option<&Renderable> {
        self.renderable.as_ref().filter(|r| r.is_lightmapped())
    }

    /// World bounds of the lightmapped renderable; empty box otherwise
    pub fn world_bounding_box(&self, lod: u32) -> Aabb {
        match self.lightmapped() {
            Some(renderable) => renderable.local_bounds(lod).transformed(&self.world_matrix()),
            None => Aabb::empty(),
        }
    }
}

/// Node table plus the lights used for baking
#[derive(Debug, Clone, Default)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    directional_lights: Vec<DirectionalLightParameters>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, transform: Transform, renderable: Option<Renderable>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SceneNode {
            name: name.into(),
            transform,
            renderable,
        });
        id
    }

    pub fn add_static_model(&mut self, name: impl Into<String>, transform: Transform, mesh: MeshBuffers) -> NodeId {
        self.add_node(name, transform, Some(Renderable::static_model(mesh)))
    }

    pub fn add_directional_light(&mut self, light: DirectionalLightParameters) {
        self.directional_lights.push(light);
    }

    pub fn directional_lights(&self) -> &[DirectionalLightParameters] {
        &self.directional_lights
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
