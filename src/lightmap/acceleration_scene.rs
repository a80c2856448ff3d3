//! Ray-tracing scenes built from a subset of scene nodes
//!
//! An [`AccelerationScene`] exclusively owns its backend device and native
//! scene; dropping it releases both. Instances refer back to nodes by
//! [`NodeId`] only.

use crate::accel::{Aabb, MeshCPU, NativeScene, Ray, RayTracingBackend, RayTracingDevice, SceneHit};
use crate::error::{BakeError, BakeResult};
use crate::scene::{NodeId, Scene};
use glam::Vec3;
use std::fmt;

/// One submitted geometry of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelerationInstance {
    pub node: NodeId,
    pub geometry_index: u32,
    pub geometry_lod: u32,
    /// Chart assigned by the charting phase, if it ran for this node
    pub lightmap_index: Option<u32>,
    /// Geometry id inside the native scene
    pub native_geometry: u32,
}

pub struct AccelerationScene {
    // Field order matters: the native scene is dropped before its device.
    scene: Box<dyn NativeScene>,
    device: Box<dyn RayTracingDevice>,
    instances: Vec<AccelerationInstance>,
    bounding_box: Aabb,
    max_distance: f32,
}

impl AccelerationScene {
    pub fn native_scene(&self) -> &dyn NativeScene {
        self.scene.as_ref()
    }

    pub fn device(&self) -> &dyn RayTracingDevice {
        self.device.as_ref()
    }

    pub fn instances(&self) -> &[AccelerationInstance] {
        &self.instances
    }

    pub fn bounding_box(&self) -> Aabb {
        self.bounding_box
    }

    /// Diagonal of the combined bounds; upper bound for any ray inside the scene
    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    /// Instance owning a native geometry id
    pub fn instance_for(&self, native_geometry: u32) -> Option<&AccelerationInstance> {
        self.instances.get(native_geometry as usize)
    }

    pub fn intersect(&self, ray: &Ray) -> Option<SceneHit> {
        self.scene.intersect(ray)
    }

    pub fn occluded(&self, ray: &Ray) -> bool {
        self.scene.occluded(ray)
    }
}

impl fmt::Debug for AccelerationScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccelerationScene")
            .field("instances", &self.instances.len())
            .field("triangles", &self.scene.triangle_count())
            .field("bounding_box", &self.bounding_box)
            .field("max_distance", &self.max_distance)
            .finish()
    }
}

/// Combined world bounds of the lightmapped renderables of `nodes`.
///
/// With `pad_if_zero`, an empty result becomes a unit box at the origin and
/// flat axes are widened to one unit, so the box always has volume.
pub fn calculate_bounding_box_of_nodes(scene: &Scene, nodes: &[NodeId], lod: u32, pad_if_zero: bool) -> Aabb {
    let mut aabb = Aabb::empty();
    for node in nodes.iter().filter_map(|&id| scene.node(id)) {
        aabb.expand_aabb(&node.world_bounding_box(lod));
    }

    if !pad_if_zero {
        return aabb;
    }
    if !aabb.is_valid() {
        return Aabb::new([-0.5; 3], [0.5; 3]);
    }

    let mut min = aabb.min_vec3();
    let mut max = aabb.max_vec3();
    let flat = (max - min).cmple(Vec3::splat(f32::EPSILON));
    let half = Vec3::select(flat, Vec3::splat(0.5), Vec3::ZERO);
    min -= half;
    max += half;
    Aabb::from_vec3(min, max)
}

/// Build an acceleration scene over every lightmapped geometry of `nodes`.
///
/// One instance is recorded per geometry, in submission order. Backend
/// failures surface as [`BakeError::Backend`]; an empty node set yields a
/// valid scene with no instances and a padded bounding box.
pub fn create_acceleration_scene(
    backend: &dyn RayTracingBackend,
    scene: &Scene,
    nodes: &[NodeId],
    lod: u32,
) -> BakeResult<AccelerationScene> {
    let mut instances = Vec::new();
    let mut geometries: Vec<MeshCPU> = Vec::new();

    for &id in nodes {
        let node = scene
            .node(id)
            .ok_or_else(|| BakeError::collaborator(format!("Node {} is not in the scene", id.index())))?;
        let Some(renderable) = node.lightmapped() else {
            continue;
        };
        let world = node.world_matrix();
        for (geometry_index, geometry) in renderable.geometries.iter().enumerate() {
            let Some((geometry_lod, mesh)) = geometry.lod(lod) else {
                continue;
            };
            instances.push(AccelerationInstance {
                node: id,
                geometry_index: geometry_index as u32,
                geometry_lod,
                lightmap_index: renderable.lightmap_index,
                native_geometry: geometries.len() as u32,
            });
            geometries.push(mesh.to_mesh_cpu(&world));
        }
    }

    let device = backend
        .create_device()
        .map_err(|e| BakeError::backend(format!("{} device creation failed: {e:#}", backend.name())))?;
    let native = device
        .create_scene(&geometries)
        .map_err(|e| BakeError::backend(format!("{} scene creation failed: {e:#}", backend.name())))?;

    let bounding_box = calculate_bounding_box_of_nodes(scene, nodes, lod, true);
    let max_distance = bounding_box.diagonal();

    log::debug!(
        "Built acceleration scene: {} instances, {} triangles, max distance {:.3}",
        instances.len(),
        native.triangle_count(),
        max_distance
    );

    Ok(AccelerationScene {
        scene: native,
        device,
        instances,
        bounding_box,
        max_distance,
    })
}
