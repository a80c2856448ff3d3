// src/accel/backend.rs
// Opaque ray-tracing backend seam: device creation, scene build, intersection queries.
// This file exists so acceleration scenes own backend handles without knowing which backend produced them.
// RELEVANT FILES:src/accel/cpu_bvh.rs,src/accel/traverse.rs,src/lightmap/acceleration_scene.rs

use super::cpu_bvh::{build_bvh_cpu, BuildOptions, BvhCPU, MeshCPU};
use super::traverse::{BvhTraverser, Ray};
use super::types::Aabb;
use anyhow::{Context, Result};
use std::fmt;

/// Closest hit reported by a native scene
#[derive(Debug, Clone, Copy)]
pub struct SceneHit {
    pub t: f32,
    /// Index of the submitted geometry, in submission order
    pub geometry_id: u32,
    /// Triangle index local to that geometry
    pub primitive_id: u32,
    pub normal: [f32; 3],
}

/// Factory for backend devices
pub trait RayTracingBackend: Send + Sync {
    fn name(&self) -> &str;
    fn create_device(&self) -> Result<Box<dyn RayTracingDevice>>;
}

/// Device context; builds committed scenes from world-space triangle geometry
pub trait RayTracingDevice: Send + Sync + fmt::Debug {
    fn create_scene(&self, geometries: &[MeshCPU]) -> Result<Box<dyn NativeScene>>;
}

/// Committed, immutable acceleration structure
pub trait NativeScene: Send + Sync + fmt::Debug {
    fn geometry_count(&self) -> u32;
    fn triangle_count(&self) -> u32;
    fn bounds(&self) -> Aabb;
    fn intersect(&self, ray: &Ray) -> Option<SceneHit>;
    fn occluded(&self, ray: &Ray) -> bool;
    /// Approximate bytes held by the structure
    fn memory_usage_bytes(&self) -> u64;
}

/// CPU backend built on the median-split BVH
#[derive(Debug, Clone, Default)]
pub struct CpuRayTracingBackend {
    pub options: BuildOptions,
}

impl CpuRayTracingBackend {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }
}

impl RayTracingBackend for CpuRayTracingBackend {
    fn name(&self) -> &str {
        "cpu-bvh"
    }

    fn create_device(&self) -> Result<Box<dyn RayTracingDevice>> {
        Ok(Box::new(CpuRayTracingDevice {
            options: self.options.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct CpuRayTracingDevice {
    options: BuildOptions,
}

impl RayTracingDevice for CpuRayTracingDevice {
    fn create_scene(&self, geometries: &[MeshCPU]) -> Result<Box<dyn NativeScene>> {
        let mut mesh = MeshCPU::default();
        let mut first_triangle = Vec::with_capacity(geometries.len());
        for (id, geometry) in geometries.iter().enumerate() {
            if let Some(bad) = geometry
                .indices
                .iter()
                .flatten()
                .find(|&&index| index >= geometry.vertex_count())
            {
                anyhow::bail!("Geometry {id} references vertex {bad} out of {}", geometry.vertex_count());
            }
            first_triangle.push(mesh.triangle_count());
            mesh.append(geometry);
        }

        // A scene without triangles is valid and never reports hits
        let bvh = if mesh.indices.is_empty() {
            None
        } else {
            Some(build_bvh_cpu(&mesh, &self.options).context("CPU BVH build failed")?)
        };

        Ok(Box::new(CpuNativeScene {
            mesh,
            bvh,
            first_triangle,
        }))
    }
}

#[derive(Debug)]
pub struct CpuNativeScene {
    mesh: MeshCPU,
    bvh: Option<BvhCPU>,
    /// First merged triangle index of each geometry
    first_triangle: Vec<u32>,
}

impl CpuNativeScene {
    fn locate(&self, triangle: u32) -> (u32, u32) {
        let geometry = self.first_triangle.partition_point(|&first| first <= triangle).saturating_sub(1);
        let first = self.first_triangle.get(geometry).copied().unwrap_or(0);
        (geometry as u32, triangle - first)
    }
}

impl NativeScene for CpuNativeScene {
    fn geometry_count(&self) -> u32 {
        self.first_triangle.len() as u32
    }

    fn triangle_count(&self) -> u32 {
        self.mesh.triangle_count()
    }

    fn bounds(&self) -> Aabb {
        self.bvh.as_ref().map(|bvh| bvh.world_aabb).unwrap_or_default()
    }

    fn intersect(&self, ray: &Ray) -> Option<SceneHit> {
        let bvh = self.bvh.as_ref()?;
        let hit = BvhTraverser::new().intersect(bvh, &self.mesh, ray)?;
        let (geometry_id, primitive_id) = self.locate(hit.triangle_idx);
        Some(SceneHit {
            t: hit.t,
            geometry_id,
            primitive_id,
            normal: hit.normal,
        })
    }

    fn occluded(&self, ray: &Ray) -> bool {
        match &self.bvh {
            Some(bvh) => BvhTraverser::new().occluded(bvh, &self.mesh, ray),
            None => false,
        }
    }

    fn memory_usage_bytes(&self) -> u64 {
        let geometry = bytemuck::cast_slice::<[f32; 3], u8>(&self.mesh.vertices).len() +
                       bytemuck::cast_slice::<[u32; 3], u8>(&self.mesh.indices).len();
        geometry as u64 + self.bvh.as_ref().map_or(0, |bvh| bvh.build_stats.memory_usage_bytes)
    }
}
