//! Scene partitioning into chunks
//!
//! The collector snapshots node bounds when the scene is locked, so the
//! pipeline can keep writing chart assignments onto the scene while chunk
//! queries stay stable.

use crate::accel::Aabb;
use crate::lightmap::chunk::{chunk_grid_box, chunk_of_point, ChunkCoord};
use crate::scene::{NodeId, Scene};
use glam::Vec3;
use std::collections::HashMap;

/// Chunk grid and per-chunk node sets
pub trait LightmapSceneCollector {
    /// Snapshot the scene partitioned into `chunk_size` cells
    fn lock_scene(&mut self, scene: &Scene, chunk_size: Vec3);

    /// Occupied chunks, in no particular order
    fn get_chunks(&self) -> Vec<ChunkCoord>;

    /// Nodes whose primary chunk is `chunk`
    fn get_unique_nodes(&self, chunk: ChunkCoord) -> Vec<NodeId>;

    fn get_chunk_bounding_box(&self, chunk: ChunkCoord) -> Aabb;

    /// Nodes overlapping `bounding_box`, including other chunks' nodes
    fn get_nodes_in_bounding_box(&self, chunk: ChunkCoord, bounding_box: &Aabb) -> Vec<NodeId>;
}

#[derive(Debug, Clone)]
struct CollectedNode {
    id: NodeId,
    bounds: Aabb,
}

/// Assigns each lightmapped node to the chunk holding its bounding-box center.
#[derive(Debug, Clone, Default)]
pub struct DefaultLightmapSceneCollector {
    chunk_size: Vec3,
    nodes: Vec<CollectedNode>,
    chunks: HashMap<ChunkCoord, Vec<NodeId>>,
    chunk_bounds: HashMap<ChunkCoord, Aabb>,
}

impl DefaultLightmapSceneCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl LightmapSceneCollector for DefaultLightmapSceneCollector {
    fn lock_scene(&mut self, scene: &Scene, chunk_size: Vec3) {
        self.chunk_size = chunk_size;
        self.nodes.clear();
        self.chunks.clear();
        self.chunk_bounds.clear();

        for id in scene.node_ids() {
            let Some(node) = scene.node(id) else {
                continue;
            };
            let bounds = node.world_bounding_box(0);
            if !bounds.is_valid() {
                continue;
            }

            let chunk = chunk_of_point(Vec3::from_array(bounds.center()), chunk_size);
            self.chunks.entry(chunk).or_default().push(id);
            self.chunk_bounds.entry(chunk).or_insert_with(Aabb::empty).expand_aabb(&bounds);
            self.nodes.push(CollectedNode { id, bounds });
        }

        log::debug!(
            "Collected {} lightmapped nodes into {} chunks",
            self.nodes.len(),
            self.chunks.len()
        );
    }

    fn get_chunks(&self) -> Vec<ChunkCoord> {
        self.chunks.keys().copied().collect()
    }

    fn get_unique_nodes(&self, chunk: ChunkCoord) -> Vec<NodeId> {
        self.chunks.get(&chunk).cloned().unwrap_or_default()
    }

    fn get_chunk_bounding_box(&self, chunk: ChunkCoord) -> Aabb {
        self.chunk_bounds
            .get(&chunk)
            .copied()
            .unwrap_or_else(|| chunk_grid_box(chunk, self.chunk_size))
    }

    fn get_nodes_in_bounding_box(&self, _chunk: ChunkCoord, bounding_box: &Aabb) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| node.bounds.intersects(bounding_box))
            .map(|node| node.id)
            .collect()
    }
}
