// src/geometry/mod.rs
// Geometry module hub providing the mesh container shared by the scene model and bakers
// Exists to centralize vertex data, bounds and world-space conversion for lightmapping
// RELEVANT FILES:src/geometry/primitives.rs,src/scene/mod.rs,src/lightmap/geometry_baker.rs

mod primitives;

pub use primitives::{generate_plane, generate_sphere, generate_unit_box};

use crate::accel::{Aabb, MeshCPU};
use glam::{Mat3, Mat4, Vec3};

/// Shared mesh container; `lightmap_uvs` is the second UV channel used for baking.
#[derive(Debug, Clone, Default)]
pub struct MeshBuffers {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub lightmap_uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_capacity),
            normals: Vec::with_capacity(vertex_capacity),
            uvs: Vec::with_capacity(vertex_capacity),
            lightmap_uvs: Vec::with_capacity(vertex_capacity),
            indices: Vec::with_capacity(index_capacity),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// UV channel used for lightmapping; falls back to the primary channel
    pub fn lightmap_uv_channel(&self) -> &[[f32; 2]] {
        if self.lightmap_uvs.len() == self.positions.len() {
            &self.lightmap_uvs
        } else {
            &self.uvs
        }
    }

    /// Local-space bounds, empty for a mesh without vertices
    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for p in &self.positions {
            aabb.expand_point(*p);
        }
        aabb
    }

    pub fn world_position(&self, transform: &Mat4, vertex: usize) -> Vec3 {
        transform.transform_point3(Vec3::from_array(self.positions[vertex]))
    }

    /// Normal transformed by the inverse-transpose, zero when the mesh has no normals
    pub fn world_normal(&self, normal_matrix: &Mat3, vertex: usize) -> Vec3 {
        self.normals
            .get(vertex)
            .map(|n| (*normal_matrix * Vec3::from_array(*n)).normalize_or_zero())
            .unwrap_or(Vec3::ZERO)
    }

    /// World-space triangle soup for the ray-tracing backend
    pub fn to_mesh_cpu(&self, transform: &Mat4) -> MeshCPU {
        let vertices = self
            .positions
            .iter()
            .map(|p| transform.transform_point3(Vec3::from_array(*p)).to_array())
            .collect();
        let indices = self
            .indices
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
            .collect();
        MeshCPU::new(vertices, indices)
    }
}

/// Inverse-transpose of the upper 3x3, for transforming normals
pub fn normal_matrix(transform: &Mat4) -> Mat3 {
    Mat3::from_mat4(*transform).inverse().transpose()
}
