// src/accel/traverse.rs
// Ray traversal over CPU BVHs: closest-hit and any-hit queries.
// This file exists to give the CPU backend intersection and occlusion queries for shadow rays.
// RELEVANT FILES:src/accel/cpu_bvh.rs,src/accel/backend.rs,src/lightmap/tracer.rs

use super::cpu_bvh::{BvhCPU, MeshCPU};
use super::types::{Aabb, Triangle};
use glam::Vec3;

/// Ray structure for traversal
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: [f32; 3],
    pub t_min: f32,
    pub direction: [f32; 3],
    pub t_max: f32,
}

impl Ray {
    pub fn new(origin: [f32; 3], direction: [f32; 3]) -> Self {
        Self {
            origin,
            t_min: 0.0,
            direction,
            t_max: f32::INFINITY,
        }
    }

    pub fn with_t_max(mut self, t_max: f32) -> Self {
        self.t_max = t_max;
        self
    }

    pub fn at(&self, t: f32) -> [f32; 3] {
        (Vec3::from_array(self.origin) + Vec3::from_array(self.direction) * t).to_array()
    }
}

/// Hit information from ray-triangle intersection
#[derive(Debug, Clone, Copy)]
pub struct HitInfo {
    pub t: f32,
    pub triangle_idx: u32,
    pub barycentric: [f32; 2], // u, v coordinates (w = 1-u-v)
    pub normal: [f32; 3],
    pub hit_point: [f32; 3],
}

/// Stack-based BVH traverser; reuse one per thread to avoid reallocating the stack
pub struct BvhTraverser {
    stack: Vec<u32>,
}

impl BvhTraverser {
    pub fn new() -> Self {
        Self {
            stack: Vec::with_capacity(64),
        }
    }

    /// Closest intersection along the ray
    pub fn intersect(&mut self, bvh: &BvhCPU, mesh: &MeshCPU, ray: &Ray) -> Option<HitInfo> {
        let mut closest_hit: Option<HitInfo> = None;
        let mut current_ray = *ray;

        self.walk(bvh, mesh, &mut current_ray, |hit, ray| {
            ray.t_max = hit.t; // Shrink ray for early termination
            closest_hit = Some(hit);
            false
        });

        closest_hit
    }

    /// True if anything blocks the ray within [t_min, t_max]
    pub fn occluded(&mut self, bvh: &BvhCPU, mesh: &MeshCPU, ray: &Ray) -> bool {
        let mut blocked = false;
        let mut current_ray = *ray;
        self.walk(bvh, mesh, &mut current_ray, |_, _| {
            blocked = true;
            true
        });
        blocked
    }

    /// `on_hit` returns true to stop the walk
    fn walk<F>(&mut self, bvh: &BvhCPU, mesh: &MeshCPU, ray: &mut Ray, mut on_hit: F)
    where
        F: FnMut(HitInfo, &mut Ray) -> bool,
    {
        if bvh.nodes.is_empty() {
            return;
        }

        self.stack.clear();
        self.stack.push(bvh.root);

        while let Some(node_idx) = self.stack.pop() {
            let Some(node) = bvh.nodes.get(node_idx as usize) else {
                continue;
            };

            if !ray_aabb_intersect(ray, &node.aabb()) {
                continue;
            }

            if let Some((first, count)) = node.triangles() {
                for i in first..first + count {
                    let Some(&tri_idx) = bvh.tri_indices.get(i as usize) else {
                        continue;
                    };
                    let Some((v0, v1, v2)) = mesh.get_triangle(tri_idx as usize) else {
                        continue;
                    };
                    if let Some(mut hit) = ray_triangle_intersect(ray, &Triangle::new(v0, v1, v2)) {
                        hit.triangle_idx = tri_idx;
                        if on_hit(hit, ray) {
                            return;
                        }
                    }
                }
            } else if let Some((left, right)) = node.children() {
                self.stack.push(right);
                self.stack.push(left);
            }
        }
    }
}

impl Default for BvhTraverser {
    fn default() -> Self {
        Self::new()
    }
}

/// Slab test of the ray against an AABB
pub fn ray_aabb_intersect(ray: &Ray, aabb: &Aabb) -> bool {
    let mut t_min = ray.t_min;
    let mut t_max = ray.t_max;

    for i in 0..3 {
        let inv_dir = 1.0 / ray.direction[i];
        let mut t0 = (aabb.min[i] - ray.origin[i]) * inv_dir;
        let mut t1 = (aabb.max[i] - ray.origin[i]) * inv_dir;

        if inv_dir < 0.0 {
            std::mem::swap(&mut t0, &mut t1);
        }

        // NaN from 0 * inf leaves the bound untouched
        if t0 > t_min {
            t_min = t0;
        }
        if t1 < t_max {
            t_max = t1;
        }

        if t_min > t_max {
            return false;
        }
    }

    true
}

/// Ray-triangle intersection using Möller-Trumbore algorithm
pub fn ray_triangle_intersect(ray: &Ray, triangle: &Triangle) -> Option<HitInfo> {
    let origin = Vec3::from_array(ray.origin);
    let direction = Vec3::from_array(ray.direction);
    let v0 = Vec3::from_array(triangle.v0);
    let edge1 = Vec3::from_array(triangle.v1) - v0;
    let edge2 = Vec3::from_array(triangle.v2) - v0;

    let h = direction.cross(edge2);
    let a = edge1.dot(h);
    if a.abs() < 1e-9 {
        return None; // Ray is parallel to triangle
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    if t <= ray.t_min || t >= ray.t_max {
        return None;
    }

    let normal = edge1.cross(edge2).try_normalize().unwrap_or(Vec3::Y);

    Some(HitInfo {
        t,
        triangle_idx: 0, // set by caller
        barycentric: [u, v],
        normal: normal.to_array(),
        hit_point: ray.at(t),
    })
}
