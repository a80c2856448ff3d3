//! Incremental, chunked lightmap baking
//!
//! [`IncrementalLightmapper`] walks the locality-sorted chunk list three
//! times:
//!
//! 1. local chunk processing: charts, chart assignment and geometry buffers,
//! 2. adjacent chunk processing: one padded acceleration scene per chunk,
//! 3. direct light baking: tracing against the cached artifacts, which are
//!    released as soon as the chunk is baked.
//!
//! Every phase advances one chunk per step and keeps its cursor in a small
//! context struct, so callers can interleave steps with other work or stop
//! between chunks. A failed step leaves its cursor in place. A phase refuses
//! to start until the previous one has visited every chunk.

use crate::accel::{CpuRayTracingBackend, RayTracingBackend};
use crate::error::{ArtifactKind, BakeError, BakeResult};
use crate::lightmap::acceleration_scene::create_acceleration_scene;
use crate::lightmap::cache::{ChunkVicinity, LightmapCache};
use crate::lightmap::charter::{apply_lightmap_charts, LightmapCharter, ShelfCharter};
use crate::lightmap::chunk::{sort_chunks_by_locality, ChunkCoord};
use crate::lightmap::collector::LightmapSceneCollector;
use crate::lightmap::geometry_baker::{CpuGeometryBaker, LightmapGeometryBaker};
use crate::lightmap::pass_registry::PassRegistry;
use crate::lightmap::settings::{IncrementalLightmapperSettings, LightmapSettings};
use crate::lightmap::tracer::{
    initialize_lightmap_charts_baked_direct, CpuDirectLightTracer, DirectLightTracer, DirectionalLightParameters,
    LightmapChartBakedDirect,
};
use crate::scene::Scene;

/// Cursor of the chart generation phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalChunkProcessingContext {
    pub current_chunk_index: usize,
    /// Global index of the next chart to be generated
    pub lightmap_chart_base_index: u32,
}

/// Cursor of the acceleration scene phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacentChunkProcessingContext {
    pub current_chunk_index: usize,
}

/// Cursor of the direct light phase plus results not yet handed out
#[derive(Debug, Clone, Default)]
pub struct DirectLightBakingContext {
    pub current_chunk_index: usize,
    pub baked: Vec<ChunkBakedDirect>,
}

impl DirectLightBakingContext {
    /// Drain the results accumulated so far
    pub fn take_baked(&mut self) -> Vec<ChunkBakedDirect> {
        std::mem::take(&mut self.baked)
    }
}

/// Baked direct light of every chart in one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkBakedDirect {
    pub chunk: ChunkCoord,
    pub charts: Vec<LightmapChartBakedDirect>,
}

pub struct IncrementalLightmapper<'a> {
    settings: LightmapSettings,
    incremental_settings: IncrementalLightmapperSettings,

    scene: &'a mut Scene,
    collector: &'a mut dyn LightmapSceneCollector,
    cache: &'a mut dyn LightmapCache,

    charter: Box<dyn LightmapCharter + 'a>,
    geometry_baker: Box<dyn LightmapGeometryBaker + 'a>,
    tracer: Box<dyn DirectLightTracer + 'a>,
    backend: Box<dyn RayTracingBackend + 'a>,
    passes: PassRegistry,

    chunks: Vec<ChunkCoord>,
    local_context: LocalChunkProcessingContext,
    adjacent_context: AdjacentChunkProcessingContext,
    bake_direct_context: DirectLightBakingContext,
}

impl<'a> IncrementalLightmapper<'a> {
    /// Lock the scene in the collector and fix the chunk order for all phases.
    pub fn new(
        scene: &'a mut Scene,
        collector: &'a mut dyn LightmapSceneCollector,
        cache: &'a mut dyn LightmapCache,
        settings: LightmapSettings,
        incremental_settings: IncrementalLightmapperSettings,
    ) -> Self {
        collector.lock_scene(scene, incremental_settings.chunk_size);
        let chunks = sort_chunks_by_locality(collector.get_chunks());
        log::info!(
            "Lightmapper initialized: {} chunks of size {:?}",
            chunks.len(),
            incremental_settings.chunk_size
        );

        Self {
            settings,
            incremental_settings,
            scene,
            collector,
            cache,
            charter: Box::new(ShelfCharter),
            geometry_baker: Box::new(CpuGeometryBaker),
            tracer: Box::new(CpuDirectLightTracer::new()),
            backend: Box::new(CpuRayTracingBackend::default()),
            passes: PassRegistry::new(),
            chunks,
            local_context: LocalChunkProcessingContext::default(),
            adjacent_context: AdjacentChunkProcessingContext::default(),
            bake_direct_context: DirectLightBakingContext::default(),
        }
    }

    pub fn with_charter(mut self, charter: impl LightmapCharter + 'a) -> Self {
        self.charter = Box::new(charter);
        self
    }

    pub fn with_geometry_baker(mut self, geometry_baker: impl LightmapGeometryBaker + 'a) -> Self {
        self.geometry_baker = Box::new(geometry_baker);
        self
    }

    pub fn with_tracer(mut self, tracer: impl DirectLightTracer + 'a) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    pub fn with_backend(mut self, backend: impl RayTracingBackend + 'a) -> Self {
        self.backend = Box::new(backend);
        self
    }

    /// Chunks in processing order
    pub fn chunks(&self) -> &[ChunkCoord] {
        &self.chunks
    }

    pub fn scene(&self) -> &Scene {
        &*self.scene
    }

    pub fn passes(&self) -> &PassRegistry {
        &self.passes
    }

    pub fn local_context(&self) -> &LocalChunkProcessingContext {
        &self.local_context
    }

    pub fn adjacent_context(&self) -> &AdjacentChunkProcessingContext {
        &self.adjacent_context
    }

    pub fn bake_direct_context(&self) -> &DirectLightBakingContext {
        &self.bake_direct_context
    }

    pub fn bake_direct_context_mut(&mut self) -> &mut DirectLightBakingContext {
        &mut self.bake_direct_context
    }

    /// Generate charts and geometry buffers for the next chunk.
    /// Returns `true` once every chunk has been processed.
    pub fn step_local_chunk_processing(&mut self) -> BakeResult<bool> {
        let Some(&chunk) = self.chunks.get(self.local_context.current_chunk_index) else {
            return Ok(true);
        };
        let base = self.local_context.lightmap_chart_base_index;

        let nodes = self.collector.get_unique_nodes(chunk);
        let charts = self
            .charter
            .generate_charts(self.scene, &nodes, &self.settings.charting)?;
        apply_lightmap_charts(self.scene, &charts, base)?;

        let baking_scenes = self.geometry_baker.generate_geometry_baking_scenes(
            self.scene,
            &charts,
            base,
            &self.settings.geometry_baking,
            &mut self.passes,
        )?;
        let buffers = self.geometry_baker.bake_geometry_buffers(self.scene, &baking_scenes)?;
        let buffer_count = buffers.len();
        self.cache.store_geometry_buffers(chunk, buffers)?;

        log::debug!(
            "Chunk {chunk}: {} nodes, charts {}..{}, {buffer_count} geometry buffers",
            nodes.len(),
            base,
            base + charts.len() as u32
        );

        self.local_context.lightmap_chart_base_index += charts.len() as u32;
        self.local_context.current_chunk_index += 1;
        Ok(self.local_context.current_chunk_index >= self.chunks.len())
    }

    /// Build and cache the padded acceleration scene of the next chunk.
    /// Returns `true` once every chunk has been processed.
    pub fn step_adjacent_chunk_processing(&mut self) -> BakeResult<bool> {
        if self.local_context.current_chunk_index < self.chunks.len() {
            return Err(BakeError::PhaseOrder {
                phase: "adjacent chunk processing",
                requires: "local chunk processing",
            });
        }
        let Some(&chunk) = self.chunks.get(self.adjacent_context.current_chunk_index) else {
            return Ok(true);
        };

        let chunk_box = self.collector.get_chunk_bounding_box(chunk);
        let padded = self
            .incremental_settings
            .vicinity_padding
            .apply(&chunk_box, self.incremental_settings.raytracing_scene_padding);
        let nodes = self.collector.get_nodes_in_bounding_box(chunk, &padded);

        let acceleration_scene = create_acceleration_scene(
            self.backend.as_ref(),
            self.scene,
            &nodes,
            self.incremental_settings.raytracing_lod,
        )?;
        log::debug!(
            "Chunk {chunk}: vicinity of {} nodes, {} instances",
            nodes.len(),
            acceleration_scene.instances().len()
        );
        self.cache
            .store_chunk_vicinity(chunk, ChunkVicinity { acceleration_scene })?;

        self.adjacent_context.current_chunk_index += 1;
        Ok(self.adjacent_context.current_chunk_index >= self.chunks.len())
    }

    /// Trace direct light for the next chunk and release its cached artifacts.
    /// Returns `true` once every chunk has been baked.
    pub fn step_bake_direct(&mut self) -> BakeResult<bool> {
        if self.adjacent_context.current_chunk_index < self.chunks.len() {
            return Err(BakeError::PhaseOrder {
                phase: "direct light baking",
                requires: "adjacent chunk processing",
            });
        }
        let Some(&chunk) = self.chunks.get(self.bake_direct_context.current_chunk_index) else {
            return Ok(true);
        };

        let buffers = self
            .cache
            .load_geometry_buffers(chunk)?
            .ok_or_else(|| BakeError::missing(chunk, ArtifactKind::GeometryBuffers))?;
        let vicinity = self
            .cache
            .load_chunk_vicinity(chunk)?
            .ok_or_else(|| BakeError::missing(chunk, ArtifactKind::ChunkVicinity))?;

        let lights = self.baking_lights();
        let mut charts = initialize_lightmap_charts_baked_direct(&buffers);
        for (baked, buffer) in charts.iter_mut().zip(buffers.iter()) {
            for light in &lights {
                self.tracer.bake_directional_light(
                    baked,
                    buffer,
                    &vicinity.acceleration_scene,
                    light,
                    &self.settings.tracing,
                )?;
            }
        }

        drop(vicinity);
        drop(buffers);
        self.cache.release_geometry_buffers(chunk);
        self.cache.release_chunk_vicinity(chunk);

        log::debug!("Chunk {chunk}: baked {} charts", charts.len());
        self.bake_direct_context.baked.push(ChunkBakedDirect { chunk, charts });
        self.bake_direct_context.current_chunk_index += 1;
        Ok(self.bake_direct_context.current_chunk_index >= self.chunks.len())
    }

    /// Run chart generation and acceleration scene construction to completion.
    pub fn process_scene(&mut self) -> BakeResult<()> {
        log::info!("Processing {} chunks: charts and geometry buffers", self.chunks.len());
        while !self.step_local_chunk_processing()? {}
        log::info!(
            "Generated {} lightmap charts",
            self.local_context.lightmap_chart_base_index
        );

        log::info!("Processing {} chunks: ray-tracing vicinities", self.chunks.len());
        while !self.step_adjacent_chunk_processing()? {}
        Ok(())
    }

    /// Run direct light baking to completion and hand out every result not
    /// yet taken.
    pub fn bake(&mut self) -> BakeResult<Vec<ChunkBakedDirect>> {
        log::info!("Baking direct light for {} chunks", self.chunks.len());
        while !self.step_bake_direct()? {}
        let baked = self.bake_direct_context.take_baked();
        log::info!(
            "Baked {} charts",
            baked.iter().map(|chunk| chunk.charts.len()).sum::<usize>()
        );
        Ok(baked)
    }

    fn baking_lights(&self) -> Vec<DirectionalLightParameters> {
        let lights = self.scene.directional_lights();
        if lights.is_empty() {
            if self.bake_direct_context.current_chunk_index == 0 {
                log::warn!("Scene has no directional lights, baking with the default downward white light");
            }
            return vec![DirectionalLightParameters::default()];
        }
        lights.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::generate_unit_box;
    use crate::lightmap::cache::LightmapMemoryCache;
    use crate::lightmap::collector::DefaultLightmapSceneCollector;
    use crate::scene::Transform;
    use glam::{IVec3, Vec3};

    fn incremental(chunk: f32, padding: f32) -> IncrementalLightmapperSettings {
        IncrementalLightmapperSettings {
            chunk_size: Vec3::splat(chunk),
            raytracing_scene_padding: padding,
            ..Default::default()
        }
    }

    fn small_charts() -> LightmapSettings {
        let mut settings = LightmapSettings::default();
        settings.charting.chart_size = 16;
        settings.tracing.num_threads = 2;
        settings
    }

    #[test]
    fn empty_scene_is_vacuously_complete() {
        let mut scene = Scene::new();
        let mut collector = DefaultLightmapSceneCollector::new();
        let mut cache = LightmapMemoryCache::new();
        let mut lightmapper = IncrementalLightmapper::new(
            &mut scene,
            &mut collector,
            &mut cache,
            LightmapSettings::default(),
            incremental(10.0, 0.0),
        );
        assert!(lightmapper.chunks().is_empty());
        assert!(lightmapper.step_local_chunk_processing().unwrap());
        lightmapper.process_scene().unwrap();
        assert!(lightmapper.bake().unwrap().is_empty());
    }

    #[test]
    fn steps_report_completion_on_last_chunk() {
        let mut scene = Scene::new();
        scene.add_static_model("a", Transform::from_translation(Vec3::splat(2.0)), generate_unit_box());
        scene.add_static_model("b", Transform::from_translation(Vec3::new(12.0, 2.0, 2.0)), generate_unit_box());
        let mut collector = DefaultLightmapSceneCollector::new();
        let mut cache = LightmapMemoryCache::new();
        let mut lightmapper =
            IncrementalLightmapper::new(&mut scene, &mut collector, &mut cache, small_charts(), incremental(10.0, 0.0));

        assert_eq!(lightmapper.chunks(), &[IVec3::ZERO, IVec3::X]);
        assert!(!lightmapper.step_local_chunk_processing().unwrap());
        assert_eq!(lightmapper.local_context().lightmap_chart_base_index, 1);
        assert!(lightmapper.step_local_chunk_processing().unwrap());
        assert_eq!(lightmapper.local_context().lightmap_chart_base_index, 2);
        // Further steps are no-ops
        assert!(lightmapper.step_local_chunk_processing().unwrap());
        assert_eq!(lightmapper.local_context().current_chunk_index, 2);
    }

    #[test]
    fn bake_releases_cached_artifacts() {
        let mut scene = Scene::new();
        scene.add_static_model("a", Transform::from_translation(Vec3::splat(2.0)), generate_unit_box());
        let mut collector = DefaultLightmapSceneCollector::new();
        let mut cache = LightmapMemoryCache::new();
        {
            let mut lightmapper =
                IncrementalLightmapper::new(&mut scene, &mut collector, &mut cache, small_charts(), incremental(10.0, 1.0));
            lightmapper.process_scene().unwrap();
            assert!(lightmapper.step_bake_direct().unwrap());
            assert_eq!(lightmapper.bake_direct_context_mut().take_baked().len(), 1);
            assert!(lightmapper.bake().unwrap().is_empty());
        }
        assert_eq!(cache.stats().geometry_buffer_entries, 0);
        assert_eq!(cache.stats().vicinity_entries, 0);
        assert_eq!(cache.stats().peak_vicinity_entries, 1);
        assert!(cache.load_chunk_vicinity(IVec3::ZERO).unwrap().is_none());
    }

    #[test]
    fn chart_indices_are_written_to_scene() {
        let mut scene = Scene::new();
        let a = scene.add_static_model("a", Transform::from_translation(Vec3::splat(2.0)), generate_unit_box());
        let b = scene.add_static_model("b", Transform::from_translation(Vec3::new(12.0, 2.0, 2.0)), generate_unit_box());
        let mut collector = DefaultLightmapSceneCollector::new();
        let mut cache = LightmapMemoryCache::new();
        {
            let mut lightmapper =
                IncrementalLightmapper::new(&mut scene, &mut collector, &mut cache, small_charts(), incremental(10.0, 0.0));
            lightmapper.process_scene().unwrap();
        }
        let index = |id| scene.node(id).and_then(|n| n.renderable.as_ref()).and_then(|r| r.lightmap_index);
        assert_eq!(index(a), Some(0));
        assert_eq!(index(b), Some(1));
    }
}
