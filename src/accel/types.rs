// src/accel/types.rs
// Core types for acceleration structures - AABB and triangle primitives.
// This file exists to provide the packed bounding-volume math shared by the BVH builder, the scene model and chunking.
// RELEVANT FILES:src/accel/cpu_bvh.rs,src/accel/traverse.rs,src/lightmap/collector.rs

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Axis-aligned bounding box - GPU compatible layout
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Aabb {
    pub min: [f32; 3],
    pub _pad0: f32,
    pub max: [f32; 3],
    pub _pad1: f32,
}

impl Aabb {
    /// Create empty AABB (inverted bounds for union operations)
    pub fn empty() -> Self {
        Self {
            min: [f32::INFINITY; 3],
            _pad0: 0.0,
            max: [f32::NEG_INFINITY; 3],
            _pad1: 0.0,
        }
    }

    /// Create AABB from min/max points
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self {
            min,
            _pad0: 0.0,
            max,
            _pad1: 0.0,
        }
    }

    pub fn from_vec3(min: Vec3, max: Vec3) -> Self {
        Self::new(min.to_array(), max.to_array())
    }

    pub fn min_vec3(&self) -> Vec3 {
        Vec3::from_array(self.min)
    }

    pub fn max_vec3(&self) -> Vec3 {
        Vec3::from_array(self.max)
    }

    /// Expand AABB to include a point
    pub fn expand_point(&mut self, point: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(point[i]);
            self.max[i] = self.max[i].max(point[i]);
        }
    }

    /// Expand AABB to include another AABB
    pub fn expand_aabb(&mut self, other: &Aabb) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
    }

    /// Get AABB center
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Get AABB extent (max - min)
    pub fn extent(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Check if AABB is valid (min <= max)
    pub fn is_valid(&self) -> bool {
        self.min[0] <= self.max[0] &&
        self.min[1] <= self.max[1] &&
        self.min[2] <= self.max[2]
    }

    /// Length of the min-max diagonal, zero for an empty box
    pub fn diagonal(&self) -> f32 {
        if !self.is_valid() {
            return 0.0;
        }
        (self.max_vec3() - self.min_vec3()).length()
    }

    /// Closed-interval overlap test; touching boxes intersect
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.is_valid() &&
        other.is_valid() &&
        (0..3).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    /// Move the min corner down and the max corner up by `amount` on every axis
    pub fn padded(&self, amount: f32) -> Aabb {
        let offset = Vec3::splat(amount);
        Aabb::from_vec3(self.min_vec3() - offset, self.max_vec3() + offset)
    }

    /// Bounds of the eight transformed corners
    pub fn transformed(&self, transform: &Mat4) -> Aabb {
        if !self.is_valid() {
            return Aabb::empty();
        }
        let mut result = Aabb::empty();
        for corner in 0..8 {
            let local = Vec3::new(
                if corner & 1 == 0 { self.min[0] } else { self.max[0] },
                if corner & 2 == 0 { self.min[1] } else { self.max[1] },
                if corner & 4 == 0 { self.min[2] } else { self.max[2] },
            );
            result.expand_point(transform.transform_point3(local).to_array());
        }
        result
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

/// Triangle primitive in world space
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: [f32; 3],
    pub v1: [f32; 3],
    pub v2: [f32; 3],
}

impl Triangle {
    pub fn new(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> Self {
        Self { v0, v1, v2 }
    }
}
