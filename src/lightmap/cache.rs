//! Per-chunk cache for intermediate baking artifacts
//!
//! Geometry buffers are produced by chart generation and consumed by direct
//! light baking; chunk vicinities are produced by the adjacent pass and
//! consumed by direct light baking. Peak memory is bounded by the entries
//! alive at once, which the pipeline keeps to the chunks not yet baked.

use crate::error::{BakeError, BakeResult};
use crate::lightmap::acceleration_scene::AccelerationScene;
use crate::lightmap::chunk::ChunkCoord;
use crate::lightmap::geometry_baker::LightmapChartGeometryBuffer;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Geometry buffers of every chart in one chunk
pub type ChunkGeometryBuffers = Vec<LightmapChartGeometryBuffer>;

/// Ray-tracing neighbourhood of one chunk
#[derive(Debug)]
pub struct ChunkVicinity {
    pub acceleration_scene: AccelerationScene,
}

/// Storage for chunk artifacts.
///
/// A successful store must make later loads of the same chunk return an
/// equivalent artifact until it is released. Loads after release, or without
/// a store, return `Ok(None)`.
pub trait LightmapCache {
    fn store_geometry_buffers(&mut self, chunk: ChunkCoord, buffers: ChunkGeometryBuffers) -> BakeResult<()>;
    fn load_geometry_buffers(&mut self, chunk: ChunkCoord) -> BakeResult<Option<Arc<ChunkGeometryBuffers>>>;
    fn release_geometry_buffers(&mut self, chunk: ChunkCoord);

    fn store_chunk_vicinity(&mut self, chunk: ChunkCoord, vicinity: ChunkVicinity) -> BakeResult<()>;
    fn load_chunk_vicinity(&mut self, chunk: ChunkCoord) -> BakeResult<Option<Arc<ChunkVicinity>>>;
    fn release_chunk_vicinity(&mut self, chunk: ChunkCoord);
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub geometry_buffer_entries: usize,
    pub vicinity_entries: usize,
    pub peak_geometry_buffer_entries: usize,
    pub peak_vicinity_entries: usize,
    pub stores: usize,
    pub releases: usize,
}

impl CacheStats {
    fn record_store(&mut self, geometry_buffer_entries: usize, vicinity_entries: usize) {
        self.stores += 1;
        self.update(geometry_buffer_entries, vicinity_entries);
    }

    fn record_release(&mut self, geometry_buffer_entries: usize, vicinity_entries: usize) {
        self.releases += 1;
        self.update(geometry_buffer_entries, vicinity_entries);
    }

    fn update(&mut self, geometry_buffer_entries: usize, vicinity_entries: usize) {
        self.geometry_buffer_entries = geometry_buffer_entries;
        self.vicinity_entries = vicinity_entries;
        self.peak_geometry_buffer_entries = self.peak_geometry_buffer_entries.max(geometry_buffer_entries);
        self.peak_vicinity_entries = self.peak_vicinity_entries.max(vicinity_entries);
    }
}

/// Keeps every artifact in memory
#[derive(Debug, Default)]
pub struct LightmapMemoryCache {
    geometry_buffers: HashMap<ChunkCoord, Arc<ChunkGeometryBuffers>>,
    vicinities: HashMap<ChunkCoord, Arc<ChunkVicinity>>,
    stats: CacheStats,
}

impl LightmapMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn counts(&self) -> (usize, usize) {
        (self.geometry_buffers.len(), self.vicinities.len())
    }
}

impl LightmapCache for LightmapMemoryCache {
    fn store_geometry_buffers(&mut self, chunk: ChunkCoord, buffers: ChunkGeometryBuffers) -> BakeResult<()> {
        self.geometry_buffers.insert(chunk, Arc::new(buffers));
        let (g, v) = self.counts();
        self.stats.record_store(g, v);
        Ok(())
    }

    fn load_geometry_buffers(&mut self, chunk: ChunkCoord) -> BakeResult<Option<Arc<ChunkGeometryBuffers>>> {
        Ok(self.geometry_buffers.get(&chunk).cloned())
    }

    fn release_geometry_buffers(&mut self, chunk: ChunkCoord) {
        if self.geometry_buffers.remove(&chunk).is_some() {
            let (g, v) = self.counts();
            self.stats.record_release(g, v);
        }
    }

    fn store_chunk_vicinity(&mut self, chunk: ChunkCoord, vicinity: ChunkVicinity) -> BakeResult<()> {
        self.vicinities.insert(chunk, Arc::new(vicinity));
        let (g, v) = self.counts();
        self.stats.record_store(g, v);
        Ok(())
    }

    fn load_chunk_vicinity(&mut self, chunk: ChunkCoord) -> BakeResult<Option<Arc<ChunkVicinity>>> {
        Ok(self.vicinities.get(&chunk).cloned())
    }

    fn release_chunk_vicinity(&mut self, chunk: ChunkCoord) {
        if self.vicinities.remove(&chunk).is_some() {
            let (g, v) = self.counts();
            self.stats.record_release(g, v);
        }
    }
}

/// Spills geometry buffers to JSON files; vicinities stay in memory since they
/// own live backend handles.
#[derive(Debug)]
pub struct LightmapDiskCache {
    directory: PathBuf,
    stored: HashMap<ChunkCoord, PathBuf>,
    vicinities: HashMap<ChunkCoord, Arc<ChunkVicinity>>,
    stats: CacheStats,
}

impl LightmapDiskCache {
    pub fn new(directory: impl Into<PathBuf>) -> BakeResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            stored: HashMap::new(),
            vicinities: HashMap::new(),
            stats: CacheStats::default(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn file_for(&self, chunk: ChunkCoord) -> PathBuf {
        self.directory
            .join(format!("chunk_{}_{}_{}.gbuffer.json", chunk.x, chunk.y, chunk.z))
    }

    fn counts(&self) -> (usize, usize) {
        (self.stored.len(), self.vicinities.len())
    }
}

impl LightmapCache for LightmapDiskCache {
    fn store_geometry_buffers(&mut self, chunk: ChunkCoord, buffers: ChunkGeometryBuffers) -> BakeResult<()> {
        let path = self.file_for(chunk);
        let text = serde_json::to_string(&buffers)?;
        fs::write(&path, text)
            .map_err(|e| BakeError::cache(format!("Failed to write {}: {e}", path.display())))?;
        self.stored.insert(chunk, path);
        let (g, v) = self.counts();
        self.stats.record_store(g, v);
        Ok(())
    }

    fn load_geometry_buffers(&mut self, chunk: ChunkCoord) -> BakeResult<Option<Arc<ChunkGeometryBuffers>>> {
        let Some(path) = self.stored.get(&chunk) else {
            return Ok(None);
        };
        let text = fs::read_to_string(path)
            .map_err(|e| BakeError::cache(format!("Failed to read {}: {e}", path.display())))?;
        let buffers: ChunkGeometryBuffers = serde_json::from_str(&text)?;
        Ok(Some(Arc::new(buffers)))
    }

    fn release_geometry_buffers(&mut self, chunk: ChunkCoord) {
        if let Some(path) = self.stored.remove(&chunk) {
            // A leftover file is only wasted space
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("Failed to remove cached geometry buffers {}: {e}", path.display());
            }
            let (g, v) = self.counts();
            self.stats.record_release(g, v);
        }
    }

    fn store_chunk_vicinity(&mut self, chunk: ChunkCoord, vicinity: ChunkVicinity) -> BakeResult<()> {
        self.vicinities.insert(chunk, Arc::new(vicinity));
        let (g, v) = self.counts();
        self.stats.record_store(g, v);
        Ok(())
    }

    fn load_chunk_vicinity(&mut self, chunk: ChunkCoord) -> BakeResult<Option<Arc<ChunkVicinity>>> {
        Ok(self.vicinities.get(&chunk).cloned())
    }

    fn release_chunk_vicinity(&mut self, chunk: ChunkCoord) {
        if self.vicinities.remove(&chunk).is_some() {
            let (g, v) = self.counts();
            self.stats.record_release(g, v);
        }
    }
}
