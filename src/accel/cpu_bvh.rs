// src/accel/cpu_bvh.rs
// CPU BVH builder with a flattened, GPU-compatible node layout for triangle soups.
// This file provides the median-split builder behind the CPU ray-tracing backend.
// RELEVANT FILES:src/accel/types.rs,src/accel/traverse.rs,src/accel/backend.rs

use super::types::Aabb;
use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use std::time::Instant;

/// Triangle mesh for BVH construction - simple vertex/index representation
#[derive(Debug, Clone, Default)]
pub struct MeshCPU {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<[u32; 3]>, // triangle indices (CCW winding)
}

impl MeshCPU {
    pub fn new(vertices: Vec<[f32; 3]>, indices: Vec<[u32; 3]>) -> Self {
        Self { vertices, indices }
    }

    pub fn triangle_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    /// Append another mesh, rebasing its indices
    pub fn append(&mut self, other: &MeshCPU) {
        let base = self.vertex_count();
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(
            other
                .indices
                .iter()
                .map(|tri| [tri[0] + base, tri[1] + base, tri[2] + base]),
        );
    }

    /// Get triangle vertices by index
    pub fn get_triangle(&self, tri_idx: usize) -> Option<([f32; 3], [f32; 3], [f32; 3])> {
        let indices = self.indices.get(tri_idx)?;
        let v0 = *self.vertices.get(indices[0] as usize)?;
        let v1 = *self.vertices.get(indices[1] as usize)?;
        let v2 = *self.vertices.get(indices[2] as usize)?;
        Some((v0, v1, v2))
    }

    pub fn triangle_centroid(&self, tri_idx: usize) -> Option<[f32; 3]> {
        let (v0, v1, v2) = self.get_triangle(tri_idx)?;
        Some([
            (v0[0] + v1[0] + v2[0]) / 3.0,
            (v0[1] + v1[1] + v2[1]) / 3.0,
            (v0[2] + v1[2] + v2[2]) / 3.0,
        ])
    }

    pub fn triangle_aabb(&self, tri_idx: usize) -> Option<Aabb> {
        let (v0, v1, v2) = self.get_triangle(tri_idx)?;
        let mut aabb = Aabb::empty();
        aabb.expand_point(v0);
        aabb.expand_point(v1);
        aabb.expand_point(v2);
        Some(aabb)
    }
}

const LEAF_BIT: u32 = 0x8000_0000;

/// Flattened 32-byte BVH node layout
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BvhNode {
    pub aabb_min: [f32; 3],
    pub left: u32,      // if internal: left child index; if leaf: first triangle index
    pub aabb_max: [f32; 3],
    pub right: u32,     // if internal: right child index; if leaf: LEAF_BIT | triangle count
}

impl BvhNode {
    pub fn internal(aabb: Aabb, left_idx: u32, right_idx: u32) -> Self {
        Self {
            aabb_min: aabb.min,
            left: left_idx,
            aabb_max: aabb.max,
            right: right_idx & !LEAF_BIT,
        }
    }

    pub fn leaf(aabb: Aabb, first_tri: u32, tri_count: u32) -> Self {
        Self {
            aabb_min: aabb.min,
            left: first_tri,
            aabb_max: aabb.max,
            right: LEAF_BIT | (tri_count & !LEAF_BIT),
        }
    }

    pub fn is_leaf(&self) -> bool {
        (self.right & LEAF_BIT) != 0
    }

    pub fn is_internal(&self) -> bool {
        !self.is_leaf()
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.aabb_min, self.aabb_max)
    }

    /// Get child indices for internal nodes
    pub fn children(&self) -> Option<(u32, u32)> {
        if self.is_internal() {
            Some((self.left, self.right))
        } else {
            None
        }
    }

    /// Get triangle range for leaf nodes
    pub fn triangles(&self) -> Option<(u32, u32)> {
        if self.is_leaf() {
            Some((self.left, self.right & !LEAF_BIT))
        } else {
            None
        }
    }
}

const _: () = {
    assert!(std::mem::size_of::<BvhNode>() == 32);
    assert!(std::mem::align_of::<BvhNode>() == 4);
};

/// Build options for BVH construction
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub max_leaf_size: u32,
    pub max_depth: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_leaf_size: 4,
            max_depth: 64,
        }
    }
}

/// CPU BVH data; the root is always the last node pushed
#[derive(Debug, Clone)]
pub struct BvhCPU {
    pub nodes: Vec<BvhNode>,
    pub tri_indices: Vec<u32>, // reordered triangle indices
    pub root: u32,
    pub world_aabb: Aabb,
    pub build_stats: BuildStats,
}

impl BvhCPU {
    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    pub fn triangle_count(&self) -> u32 {
        self.build_stats.triangle_count
    }
}

/// Build statistics
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub build_time_ms: f32,
    pub triangle_count: u32,
    pub node_count: u32,
    pub leaf_count: u32,
    pub internal_count: u32,
    pub max_depth: u32,
    pub avg_leaf_size: f32,
    pub memory_usage_bytes: u64,
}

/// Build BVH from mesh using median splits along the widest axis
pub fn build_bvh_cpu(mesh: &MeshCPU, options: &BuildOptions) -> Result<BvhCPU> {
    let start_time = Instant::now();

    if mesh.indices.is_empty() {
        anyhow::bail!("Cannot build BVH from empty mesh");
    }

    let triangle_count = mesh.triangle_count();

    let mut tri_aabbs = Vec::with_capacity(triangle_count as usize);
    let mut tri_centroids = Vec::with_capacity(triangle_count as usize);

    for i in 0..triangle_count as usize {
        let aabb = mesh
            .triangle_aabb(i)
            .with_context(|| format!("Triangle {i} references a missing vertex"))?;
        let centroid = mesh
            .triangle_centroid(i)
            .with_context(|| format!("Triangle {i} references a missing vertex"))?;
        tri_aabbs.push(aabb);
        tri_centroids.push(centroid);
    }

    let world_aabb = compute_bounds(&tri_aabbs, &(0..triangle_count).collect::<Vec<_>>());

    let mut tri_indices: Vec<u32> = (0..triangle_count).collect();
    let mut nodes = Vec::new();
    let mut stats = BuildStats {
        triangle_count,
        ..Default::default()
    };

    let build_info = BuildInfo {
        aabb: world_aabb,
        first: 0,
        count: triangle_count,
        depth: 0,
    };

    let root = build_recursive(
        &tri_aabbs,
        &tri_centroids,
        &mut tri_indices,
        &mut nodes,
        build_info,
        options,
        &mut stats,
    );

    stats.build_time_ms = start_time.elapsed().as_secs_f32() * 1000.0;
    stats.node_count = nodes.len() as u32;
    stats.internal_count = stats.node_count - stats.leaf_count;
    stats.memory_usage_bytes = (bytemuck::cast_slice::<BvhNode, u8>(&nodes).len() +
                               bytemuck::cast_slice::<u32, u8>(&tri_indices).len()) as u64;

    if stats.leaf_count > 0 {
        stats.avg_leaf_size = triangle_count as f32 / stats.leaf_count as f32;
    }

    Ok(BvhCPU {
        nodes,
        tri_indices,
        root,
        world_aabb,
        build_stats: stats,
    })
}

struct BuildInfo {
    aabb: Aabb,
    first: u32,
    count: u32,
    depth: u32,
}

fn push_leaf(nodes: &mut Vec<BvhNode>, info: &BuildInfo, stats: &mut BuildStats) -> u32 {
    stats.leaf_count += 1;
    let node_idx = nodes.len() as u32;
    nodes.push(BvhNode::leaf(info.aabb, info.first, info.count));
    node_idx
}

fn build_recursive(
    tri_aabbs: &[Aabb],
    tri_centroids: &[[f32; 3]],
    tri_indices: &mut [u32],
    nodes: &mut Vec<BvhNode>,
    info: BuildInfo,
    options: &BuildOptions,
    stats: &mut BuildStats,
) -> u32 {
    stats.max_depth = stats.max_depth.max(info.depth);

    if info.count <= options.max_leaf_size || info.depth >= options.max_depth {
        return push_leaf(nodes, &info, stats);
    }

    let range = info.first as usize..(info.first + info.count) as usize;
    let Some((split_axis, split_pos)) = find_median_split(tri_centroids, &tri_indices[range.clone()], &info.aabb) else {
        return push_leaf(nodes, &info, stats);
    };

    let split_index = partition_triangles(
        tri_indices,
        info.first,
        info.count,
        split_axis,
        split_pos,
        tri_centroids,
    );

    let left_count = split_index - info.first;
    let right_count = info.count - left_count;

    // All centroids equal along the axis
    if left_count == 0 || right_count == 0 {
        return push_leaf(nodes, &info, stats);
    }

    let left_aabb = compute_bounds(tri_aabbs, &tri_indices[info.first as usize..split_index as usize]);
    let right_aabb = compute_bounds(tri_aabbs, &tri_indices[split_index as usize..range.end]);

    let left_info = BuildInfo {
        aabb: left_aabb,
        first: info.first,
        count: left_count,
        depth: info.depth + 1,
    };

    let right_info = BuildInfo {
        aabb: right_aabb,
        first: split_index,
        count: right_count,
        depth: info.depth + 1,
    };

    let left_child_idx = build_recursive(
        tri_aabbs, tri_centroids, tri_indices, nodes, left_info, options, stats
    );
    let right_child_idx = build_recursive(
        tri_aabbs, tri_centroids, tri_indices, nodes, right_info, options, stats
    );

    let node_idx = nodes.len() as u32;
    nodes.push(BvhNode::internal(info.aabb, left_child_idx, right_child_idx));
    node_idx
}

fn find_median_split(
    tri_centroids: &[[f32; 3]],
    indices: &[u32],
    parent_aabb: &Aabb,
) -> Option<(usize, f32)> {
    if indices.len() < 2 {
        return None;
    }

    let extent = parent_aabb.extent();

    let axis = if extent[0] > extent[1] && extent[0] > extent[2] {
        0
    } else if extent[1] > extent[2] {
        1
    } else {
        2
    };

    let mut centroids: Vec<f32> = indices.iter()
        .map(|&idx| tri_centroids[idx as usize][axis])
        .collect();
    centroids.sort_by(|a, b| a.total_cmp(b));

    let split_pos = centroids[centroids.len() / 2];
    Some((axis, split_pos))
}

fn partition_triangles(
    indices: &mut [u32],
    first: u32,
    count: u32,
    axis: usize,
    split_pos: f32,
    tri_centroids: &[[f32; 3]],
) -> u32 {
    let range = &mut indices[first as usize..(first + count) as usize];

    let mut left = 0;
    let mut right = range.len();

    while left < right {
        let centroid = tri_centroids[range[left] as usize];
        if centroid[axis] < split_pos {
            left += 1;
        } else {
            right -= 1;
            range.swap(left, right);
        }
    }

    first + left as u32
}

fn compute_bounds(tri_aabbs: &[Aabb], indices: &[u32]) -> Aabb {
    let mut aabb = Aabb::empty();
    for &idx in indices {
        aabb.expand_aabb(&tri_aabbs[idx as usize]);
    }
    aabb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube() -> MeshCPU {
        let vertices = vec![
            [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0],
        ];
        let indices = vec![
            [0, 1, 2], [0, 2, 3],
            [1, 5, 6], [1, 6, 2],
            [5, 4, 7], [5, 7, 6],
            [4, 0, 3], [4, 3, 7],
            [3, 2, 6], [3, 6, 7],
            [4, 5, 1], [4, 1, 0],
        ];
        MeshCPU::new(vertices, indices)
    }

    #[test]
    fn test_bvh_node_layout() {
        assert_eq!(std::mem::size_of::<BvhNode>(), 32);

        let aabb = Aabb::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let leaf = BvhNode::leaf(aabb, 0, 4);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.triangles(), Some((0, 4)));

        let internal = BvhNode::internal(aabb, 1, 2);
        assert!(internal.is_internal());
        assert_eq!(internal.children(), Some((1, 2)));
        assert_eq!(internal.aabb(), aabb);
    }

    #[test]
    fn test_bvh_node_leaf_bit_packing() {
        let aabb = Aabb::new([0.0; 3], [1.0; 3]);
        let nodes = [BvhNode::leaf(aabb, 7, 3), BvhNode::internal(aabb, 0, 0x7fff_ffff)];
        assert_eq!(bytemuck::cast_slice::<BvhNode, u8>(&nodes).len(), 64);

        assert_eq!(nodes[0].triangles(), Some((7, 3)));
        assert_eq!(nodes[0].children(), None);
        assert_eq!(nodes[1].children(), Some((0, 0x7fff_ffff)));
        assert_eq!(nodes[1].triangles(), None);

        let empty_leaf = BvhNode::leaf(aabb, 0, 0);
        assert!(empty_leaf.is_leaf());
        assert_eq!(empty_leaf.triangles(), Some((0, 0)));
    }

    #[test]
    fn test_bvh_build_single_triangle() {
        let mesh = MeshCPU::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0]],
            vec![[0, 1, 2]],
        );

        let bvh = build_bvh_cpu(&mesh, &BuildOptions::default()).unwrap();

        assert_eq!(bvh.triangle_count(), 1);
        assert_eq!(bvh.node_count(), 1);
        assert_eq!(bvh.root, 0);
        assert_eq!(bvh.build_stats.leaf_count, 1);
        assert!(bvh.world_aabb.is_valid());
    }

    #[test]
    fn test_bvh_build_cube() {
        let mesh = unit_cube();
        let bvh = build_bvh_cpu(&mesh, &BuildOptions::default()).unwrap();

        assert_eq!(bvh.triangle_count(), 12);
        assert!(bvh.build_stats.leaf_count > 1);
        assert!(bvh.build_stats.max_depth > 0);
        assert_eq!(bvh.root, bvh.node_count() - 1);
        assert_eq!(bvh.world_aabb.min, [0.0; 3]);
        assert_eq!(bvh.world_aabb.max, [1.0; 3]);

        // Every triangle lands in exactly one leaf
        let covered: u32 = bvh.nodes.iter()
            .filter_map(|n| n.triangles())
            .map(|(_, count)| count)
            .sum();
        assert_eq!(covered, 12);
        let mut sorted = bvh.tri_indices.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let err = build_bvh_cpu(&MeshCPU::default(), &BuildOptions::default()).unwrap_err();
        assert!(err.to_string().contains("empty mesh"));
    }

    #[test]
    fn test_dangling_index_is_rejected() {
        let mesh = MeshCPU::new(vec![[0.0; 3], [1.0, 0.0, 0.0]], vec![[0, 1, 7]]);
        let err = build_bvh_cpu(&mesh, &BuildOptions::default()).unwrap_err();
        assert!(err.to_string().contains("missing vertex"));
    }

    #[test]
    fn test_append_rebases_indices() {
        let mut mesh = unit_cube();
        let other = unit_cube();
        mesh.append(&other);
        assert_eq!(mesh.triangle_count(), 24);
        assert_eq!(mesh.indices[12], [8, 9, 10]);
    }
}
