// src/accel/mod.rs
// Acceleration structures module - CPU BVH construction, traversal and the backend seam used by lightmap tracing.
// RELEVANT FILES:src/accel/backend.rs,src/lightmap/acceleration_scene.rs,src/lightmap/tracer.rs

pub mod backend;
pub mod cpu_bvh;
pub mod traverse;
pub mod types;

pub use backend::{
    CpuRayTracingBackend, NativeScene, RayTracingBackend, RayTracingDevice, SceneHit,
};
pub use cpu_bvh::{build_bvh_cpu, BuildOptions, BvhCPU, BvhNode, MeshCPU};
pub use traverse::{BvhTraverser, HitInfo, Ray};
pub use types::{Aabb, Triangle};
