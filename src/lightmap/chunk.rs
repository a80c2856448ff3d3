// src/lightmap/chunk.rs
// Chunk grid helpers and the locality-preserving chunk order shared by every baking phase.
// RELEVANT FILES:src/lightmap/incremental.rs,src/lightmap/collector.rs

use crate::accel::Aabb;
use glam::{IVec3, Vec3};

/// Chunk coordinate in chunk-size units
pub type ChunkCoord = IVec3;

const NUM_COMPONENTS: u32 = 3;
const KEY_BITS: u32 = u64::BITS;
/// 21 bits per axis fit in the 64-bit key
pub const MAX_BITS_PER_COMPONENT: u32 = KEY_BITS / NUM_COMPONENTS;

/// Component-wise minimum of all chunks, `None` for an empty set
pub fn base_chunk(chunks: &[ChunkCoord]) -> Option<ChunkCoord> {
    chunks.iter().copied().reduce(|a, b| a.min(b))
}

/// Bit-interleaved key of `chunk` relative to `base`.
///
/// Bit `i` of axis `j` (x, y, z) lands at position `3 * i + j`. The offset from
/// `base` is taken modulo 2^32, which is the exact non-negative distance when
/// `base` is the component-wise minimum; only the low 21 bits of each take part.
pub fn locality_key(chunk: ChunkCoord, base: ChunkCoord) -> u64 {
    let xyz = [
        chunk.x.wrapping_sub(base.x) as u32,
        chunk.y.wrapping_sub(base.y) as u32,
        chunk.z.wrapping_sub(base.z) as u32,
    ];

    let mut key = 0u64;
    for (j, &component) in xyz.iter().enumerate() {
        for i in 0..MAX_BITS_PER_COMPONENT {
            let bit = ((component >> i) & 1) as u64;
            key |= bit << (i * NUM_COMPONENTS + j as u32);
        }
    }
    key
}

/// Sort chunks along the interleaved curve.
///
/// Ties (only possible beyond 2^21 chunks per axis) fall back to lexicographic
/// order so the result is a total order; duplicate coordinates are dropped.
pub fn sort_chunks_by_locality(mut chunks: Vec<ChunkCoord>) -> Vec<ChunkCoord> {
    let Some(base) = base_chunk(&chunks) else {
        return chunks;
    };

    chunks.sort_by_cached_key(|&chunk| (locality_key(chunk, base), chunk.x, chunk.y, chunk.z));

    let before = chunks.len();
    chunks.dedup();
    if chunks.len() != before {
        log::warn!(
            "Dropped {} duplicate chunk coordinates from collector output",
            before - chunks.len()
        );
    }
    chunks
}

/// Chunk that contains `point`
pub fn chunk_of_point(point: Vec3, chunk_size: Vec3) -> ChunkCoord {
    (point / chunk_size).floor().as_ivec3()
}

/// Grid cell of `chunk` in world space
pub fn chunk_grid_box(chunk: ChunkCoord, chunk_size: Vec3) -> Aabb {
    let min = chunk.as_vec3() * chunk_size;
    Aabb::from_vec3(min, min + chunk_size)
}
