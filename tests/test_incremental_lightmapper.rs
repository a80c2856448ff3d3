// tests/test_incremental_lightmapper.rs
// End-to-end behaviour of the three-phase incremental lightmapper.
// Covers chart index ranges, phase ordering, vicinity padding, backend failures and resumable steps.
// RELEVANT FILES:src/lightmap/incremental.rs,src/lightmap/cache.rs,src/lightmap/collector.rs,src/accel/backend.rs

use glam::{IVec3, Quat, Vec3};
use lightbake::accel::{CpuRayTracingBackend, MeshCPU, NativeScene, RayTracingBackend, RayTracingDevice};
use lightbake::geometry::{generate_plane, generate_unit_box};
use lightbake::lightmap::tracer::DirectionalLightParameters;
use lightbake::lightmap::{
    ChunkGeometryBuffers, ChunkVicinity, IncrementalLightmapperSettings, LightmapCache, LightmapDiskCache,
    LightmapSettings, VicinityPadding,
};
use lightbake::{
    ArtifactKind, BakeError, BakeResult, ChunkBakedDirect, DefaultLightmapSceneCollector, IncrementalLightmapper,
    LightmapMemoryCache, NodeId, Scene, Transform,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const CHUNK: f32 = 10.0;

fn settings() -> LightmapSettings {
    let mut settings = LightmapSettings::default();
    settings.charting.chart_size = 16;
    settings.tracing.num_threads = 2;
    settings
}

fn incremental(padding: f32, mode: VicinityPadding) -> IncrementalLightmapperSettings {
    IncrementalLightmapperSettings {
        chunk_size: Vec3::splat(CHUNK),
        raytracing_scene_padding: padding,
        vicinity_padding: mode,
        ..Default::default()
    }
}

/// One unit box per center, plus a light shining straight down
fn boxes(centers: &[Vec3]) -> (Scene, Vec<NodeId>) {
    let mut scene = Scene::new();
    let ids = centers
        .iter()
        .enumerate()
        .map(|(i, c)| scene.add_static_model(format!("box{i}"), Transform::from_translation(*c), generate_unit_box()))
        .collect();
    scene.add_directional_light(DirectionalLightParameters::new(Vec3::NEG_Y, [1.0; 3]));
    (scene, ids)
}

fn two_chunk_scene() -> (Scene, Vec<NodeId>) {
    boxes(&[Vec3::splat(2.0), Vec3::new(12.0, 2.0, 2.0)])
}

#[test]
fn two_chunks_bake_independently() {
    let (mut scene, ids) = two_chunk_scene();
    let mut collector = DefaultLightmapSceneCollector::new();
    let mut cache = LightmapMemoryCache::new();

    let order = {
        let mut lightmapper = IncrementalLightmapper::new(
            &mut scene,
            &mut collector,
            &mut cache,
            settings(),
            incremental(0.0, VicinityPadding::Symmetric),
        );
        lightmapper.process_scene().unwrap();
        lightmapper.chunks().to_vec()
    };
    assert_eq!(order, vec![IVec3::ZERO, IVec3::X]);

    // Zero padding and disjoint meshes: each vicinity only sees its own node
    for (chunk, node) in order.iter().zip(&ids) {
        let vicinity = cache.load_chunk_vicinity(*chunk).unwrap().expect("vicinity stored");
        let nodes: Vec<NodeId> = vicinity.acceleration_scene.instances().iter().map(|i| i.node).collect();
        assert_eq!(nodes, vec![*node]);
    }

    // A fresh lightmapper over the same cache picks up where processing stopped
    let baked = {
        let mut lightmapper = IncrementalLightmapper::new(
            &mut scene,
            &mut collector,
            &mut cache,
            settings(),
            incremental(0.0, VicinityPadding::Symmetric),
        );
        lightmapper.bake().unwrap()
    };

    assert_eq!(baked.len(), 2);
    for (i, chunk) in baked.iter().enumerate() {
        assert_eq!(chunk.chunk, order[i]);
        assert_eq!(chunk.charts.len(), 1);
        assert_eq!(chunk.charts[0].index, i as u32);
        let lit = chunk.charts[0].light.iter().filter(|t| t[1] > 0.0).count();
        assert!(lit > 0, "chunk {} received no light", chunk.chunk);
    }

    assert_eq!(cache.stats().geometry_buffer_entries, 0);
    assert_eq!(cache.stats().vicinity_entries, 0);
    for chunk in &order {
        assert!(cache.load_geometry_buffers(*chunk).unwrap().is_none());
    }
}

#[test]
fn chart_ranges_are_disjoint_across_chunks() {
    // Chunk sizes 2, 1 and 3 nodes; a 16 texel chart holds one box
    let (mut scene, _) = boxes(&[
        Vec3::new(2.0, 2.0, 2.0),
        Vec3::new(6.0, 2.0, 2.0),
        Vec3::new(12.0, 2.0, 2.0),
        Vec3::new(2.0, 12.0, 2.0),
        Vec3::new(5.0, 15.0, 2.0),
        Vec3::new(8.0, 18.0, 2.0),
    ]);
    let mut collector = DefaultLightmapSceneCollector::new();
    let mut cache = LightmapMemoryCache::new();
    let order = {
        let mut lightmapper = IncrementalLightmapper::new(
            &mut scene,
            &mut collector,
            &mut cache,
            settings(),
            incremental(0.0, VicinityPadding::Symmetric),
        );
        lightmapper.process_scene().unwrap();
        assert_eq!(lightmapper.local_context().lightmap_chart_base_index, 6);
        lightmapper.chunks().to_vec()
    };

    let mut next = 0u32;
    for chunk in &order {
        let buffers = cache.load_geometry_buffers(*chunk).unwrap().expect("buffers stored");
        assert!(!buffers.is_empty());
        for buffer in buffers.iter() {
            assert_eq!(buffer.index, next, "chunk {chunk} breaks the chart sequence");
            next += 1;
        }
    }
    assert_eq!(next, 6);

    // Every renderable points at a chart inside the produced range
    for id in scene.node_ids() {
        let index = scene.node(id).and_then(|n| n.renderable.as_ref()).and_then(|r| r.lightmap_index);
        assert!(matches!(index, Some(i) if i < 6));
    }
}

#[test]
fn bake_before_process_scene_fails() {
    let (mut scene, _) = two_chunk_scene();
    let mut collector = DefaultLightmapSceneCollector::new();
    let mut cache = LightmapMemoryCache::new();
    let mut lightmapper = IncrementalLightmapper::new(
        &mut scene,
        &mut collector,
        &mut cache,
        settings(),
        incremental(0.0, VicinityPadding::Symmetric),
    );

    match lightmapper.bake() {
        Err(BakeError::PhaseOrder { requires, .. }) => assert_eq!(requires, "adjacent chunk processing"),
        other => panic!("expected a phase order error, got {other:?}"),
    }
    assert_eq!(lightmapper.bake_direct_context().current_chunk_index, 0);
}

#[test]
fn adjacent_processing_waits_for_every_chart() {
    let (mut scene, _) = two_chunk_scene();
    let mut collector = DefaultLightmapSceneCollector::new();
    let mut cache = LightmapMemoryCache::new();
    {
        let mut lightmapper = IncrementalLightmapper::new(
            &mut scene,
            &mut collector,
            &mut cache,
            settings(),
            incremental(0.0, VicinityPadding::Symmetric),
        );

        let err = lightmapper.step_adjacent_chunk_processing().unwrap_err();
        assert_eq!(err.category(), "PhaseOrder");
        assert!(!lightmapper.step_local_chunk_processing().unwrap());
        assert!(matches!(
            lightmapper.step_adjacent_chunk_processing(),
            Err(BakeError::PhaseOrder { requires: "local chunk processing", .. })
        ));
        assert_eq!(lightmapper.adjacent_context().current_chunk_index, 0);

        assert!(lightmapper.step_local_chunk_processing().unwrap());
        while !lightmapper.step_adjacent_chunk_processing().unwrap() {}
    }

    // Every cached instance sees the chart assigned in the first phase
    for chunk in [IVec3::ZERO, IVec3::X] {
        let vicinity = cache.load_chunk_vicinity(chunk).unwrap().expect("vicinity stored");
        for instance in vicinity.acceleration_scene.instances() {
            assert!(instance.lightmap_index.is_some(), "{chunk}: {instance:?}");
        }
    }
}

#[test]
fn direct_baking_waits_for_every_vicinity() {
    let (mut scene, _) = two_chunk_scene();
    let mut collector = DefaultLightmapSceneCollector::new();
    let mut cache = LightmapMemoryCache::new();
    let mut lightmapper = IncrementalLightmapper::new(
        &mut scene,
        &mut collector,
        &mut cache,
        settings(),
        incremental(0.0, VicinityPadding::Symmetric),
    );

    while !lightmapper.step_local_chunk_processing().unwrap() {}
    assert!(!lightmapper.step_adjacent_chunk_processing().unwrap());
    match lightmapper.step_bake_direct() {
        Err(BakeError::PhaseOrder { phase, requires }) => {
            assert_eq!(phase, "direct light baking");
            assert_eq!(requires, "adjacent chunk processing");
        }
        other => panic!("expected a phase order error, got {other:?}"),
    }
    assert_eq!(lightmapper.bake_direct_context().current_chunk_index, 0);

    assert!(lightmapper.step_adjacent_chunk_processing().unwrap());
    assert_eq!(lightmapper.bake().unwrap().len(), 2);
}

/// Memory cache that silently drops every stored vicinity
#[derive(Default)]
struct VicinityDroppingCache {
    inner: LightmapMemoryCache,
}

impl LightmapCache for VicinityDroppingCache {
    fn store_geometry_buffers(&mut self, chunk: IVec3, buffers: ChunkGeometryBuffers) -> BakeResult<()> {
        self.inner.store_geometry_buffers(chunk, buffers)
    }

    fn load_geometry_buffers(&mut self, chunk: IVec3) -> BakeResult<Option<Arc<ChunkGeometryBuffers>>> {
        self.inner.load_geometry_buffers(chunk)
    }

    fn release_geometry_buffers(&mut self, chunk: IVec3) {
        self.inner.release_geometry_buffers(chunk)
    }

    fn store_chunk_vicinity(&mut self, _chunk: IVec3, _vicinity: ChunkVicinity) -> BakeResult<()> {
        Ok(())
    }

    fn load_chunk_vicinity(&mut self, chunk: IVec3) -> BakeResult<Option<Arc<ChunkVicinity>>> {
        self.inner.load_chunk_vicinity(chunk)
    }

    fn release_chunk_vicinity(&mut self, chunk: IVec3) {
        self.inner.release_chunk_vicinity(chunk)
    }
}

#[test]
fn cache_miss_is_reported_as_missing_artifact() {
    let (mut scene, _) = two_chunk_scene();
    let mut collector = DefaultLightmapSceneCollector::new();
    let mut cache = VicinityDroppingCache::default();
    let mut lightmapper = IncrementalLightmapper::new(
        &mut scene,
        &mut collector,
        &mut cache,
        settings(),
        incremental(0.0, VicinityPadding::Symmetric),
    );

    lightmapper.process_scene().unwrap();
    match lightmapper.step_bake_direct() {
        Err(BakeError::MissingArtifact { chunk, artifact }) => {
            assert_eq!(chunk, IVec3::ZERO);
            assert_eq!(artifact, ArtifactKind::ChunkVicinity);
        }
        other => panic!("expected a missing vicinity, got {other:?}"),
    }
    assert_eq!(lightmapper.bake_direct_context().current_chunk_index, 0);
}

#[test]
fn rerunning_adjacent_processing_is_idempotent() {
    let (mut scene, _) = boxes(&[Vec3::splat(2.0), Vec3::new(12.0, 2.0, 2.0), Vec3::new(2.0, 13.0, 4.0)]);
    let mut collector = DefaultLightmapSceneCollector::new();

    let mut summaries = Vec::new();
    for _ in 0..2 {
        let mut cache = LightmapMemoryCache::new();
        let order = {
            let mut lightmapper = IncrementalLightmapper::new(
                &mut scene,
                &mut collector,
                &mut cache,
                settings(),
                incremental(3.0, VicinityPadding::Symmetric),
            );
            lightmapper.process_scene().unwrap();
            lightmapper.chunks().to_vec()
        };
        let summary: Vec<(IVec3, usize, [f32; 3], [f32; 3])> = order
            .iter()
            .map(|chunk| {
                let vicinity = cache.load_chunk_vicinity(*chunk).unwrap().expect("vicinity stored");
                let accel = &vicinity.acceleration_scene;
                (*chunk, accel.instances().len(), accel.bounding_box().min, accel.bounding_box().max)
            })
            .collect();
        summaries.push(summary);
    }
    assert_eq!(summaries[0], summaries[1]);
}

#[test]
fn padding_mode_controls_neighbour_collection() {
    let instance_counts = |mode: VicinityPadding| -> Vec<usize> {
        let (mut scene, _) = two_chunk_scene();
        let mut collector = DefaultLightmapSceneCollector::new();
        let mut cache = LightmapMemoryCache::new();
        let order = {
            let mut lightmapper =
                IncrementalLightmapper::new(&mut scene, &mut collector, &mut cache, settings(), incremental(10.0, mode));
            lightmapper.process_scene().unwrap();
            lightmapper.chunks().to_vec()
        };
        order
            .iter()
            .map(|chunk| {
                let vicinity = cache.load_chunk_vicinity(*chunk).unwrap().expect("vicinity stored");
                vicinity.acceleration_scene.instances().len()
            })
            .collect()
    };

    assert_eq!(instance_counts(VicinityPadding::Symmetric), vec![2, 2]);
    assert_eq!(instance_counts(VicinityPadding::Legacy), vec![1, 1]);
}

#[test]
fn neighbour_occluder_shadows_across_chunk_border() {
    // A roof in chunk (0, 1, 0) hangs over a floor in chunk (0, 0, 0)
    let mut scene = Scene::new();
    let floor = Transform::new_with(
        Vec3::new(5.0, 9.0, 5.0),
        Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        Vec3::splat(2.0),
    );
    scene.add_static_model("floor", floor, generate_plane(1, 1));
    let roof = Transform::new_with(Vec3::new(5.0, 11.0, 5.0), Quat::IDENTITY, Vec3::new(4.0, 0.5, 4.0));
    scene.add_static_model("roof", roof, generate_unit_box());
    scene.add_directional_light(DirectionalLightParameters::new(Vec3::NEG_Y, [1.0; 3]));

    let floor_light = |padding: f32| -> f32 {
        let mut scene = scene.clone();
        let mut collector = DefaultLightmapSceneCollector::new();
        let mut cache = LightmapMemoryCache::new();
        let mut lightmapper = IncrementalLightmapper::new(
            &mut scene,
            &mut collector,
            &mut cache,
            settings(),
            incremental(padding, VicinityPadding::Symmetric),
        );
        lightmapper.process_scene().unwrap();
        let baked = lightmapper.bake().unwrap();
        let floor_chunk = baked.iter().find(|c| c.chunk == IVec3::ZERO).expect("floor chunk");
        floor_chunk.charts.iter().flat_map(|c| c.light.iter()).map(|t| t[1]).sum()
    };

    let lit = floor_light(0.0);
    let shadowed = floor_light(5.0);
    assert!(lit > 0.0);
    assert!(shadowed < lit * 0.1, "roof should shadow the floor: {shadowed} vs {lit}");
}

#[derive(Debug)]
struct FailingBackend;

impl RayTracingBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn create_device(&self) -> anyhow::Result<Box<dyn RayTracingDevice>> {
        anyhow::bail!("device lost")
    }
}

#[test]
fn backend_failure_stops_adjacent_processing() {
    let (mut scene, _) = two_chunk_scene();
    let mut collector = DefaultLightmapSceneCollector::new();
    let mut cache = LightmapMemoryCache::new();
    let mut lightmapper = IncrementalLightmapper::new(
        &mut scene,
        &mut collector,
        &mut cache,
        settings(),
        incremental(0.0, VicinityPadding::Symmetric),
    )
    .with_backend(FailingBackend);

    match lightmapper.process_scene() {
        Err(BakeError::Backend(message)) => assert!(message.contains("device lost"), "{message}"),
        other => panic!("expected a backend error, got {other:?}"),
    }
    assert_eq!(lightmapper.local_context().current_chunk_index, 2);
    assert_eq!(lightmapper.adjacent_context().current_chunk_index, 0);
    assert!(lightmapper.bake().is_err());
}

/// Fails the first scene build, then delegates to the CPU backend
#[derive(Debug, Default)]
struct FlakyBackend {
    attempts: AtomicUsize,
}

#[derive(Debug)]
struct FlakyDevice {
    fail: bool,
    inner: Box<dyn RayTracingDevice>,
}

impl RayTracingDevice for FlakyDevice {
    fn create_scene(&self, geometries: &[MeshCPU]) -> anyhow::Result<Box<dyn NativeScene>> {
        if self.fail {
            anyhow::bail!("out of device memory");
        }
        self.inner.create_scene(geometries)
    }
}

impl RayTracingBackend for FlakyBackend {
    fn name(&self) -> &str {
        "flaky"
    }

    fn create_device(&self) -> anyhow::Result<Box<dyn RayTracingDevice>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FlakyDevice {
            fail: attempt == 0,
            inner: CpuRayTracingBackend::default().create_device()?,
        }))
    }
}

#[test]
fn failed_step_can_be_retried() {
    let (mut scene, _) = two_chunk_scene();
    let mut collector = DefaultLightmapSceneCollector::new();
    let mut cache = LightmapMemoryCache::new();
    let mut lightmapper = IncrementalLightmapper::new(
        &mut scene,
        &mut collector,
        &mut cache,
        settings(),
        incremental(0.0, VicinityPadding::Symmetric),
    )
    .with_backend(FlakyBackend::default());

    while !lightmapper.step_local_chunk_processing().unwrap() {}
    assert!(lightmapper.step_adjacent_chunk_processing().is_err());
    assert_eq!(lightmapper.adjacent_context().current_chunk_index, 0);

    assert!(!lightmapper.step_adjacent_chunk_processing().unwrap());
    assert!(lightmapper.step_adjacent_chunk_processing().unwrap());
    assert_eq!(lightmapper.bake().unwrap().len(), 2);
}

fn bake_two_chunks_with(cache: &mut dyn LightmapCache) -> Vec<ChunkBakedDirect> {
    let (mut scene, _) = two_chunk_scene();
    let mut collector = DefaultLightmapSceneCollector::new();
    let mut lightmapper = IncrementalLightmapper::new(
        &mut scene,
        &mut collector,
        cache,
        settings(),
        incremental(2.0, VicinityPadding::Symmetric),
    );
    lightmapper.process_scene().unwrap();
    lightmapper.bake().unwrap()
}

#[test]
fn disk_cache_matches_memory_cache() {
    let mut dir = std::env::temp_dir();
    dir.push(format!("lightbake-{}-pipeline", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let mut disk = LightmapDiskCache::new(&dir).unwrap();
    let mut memory = LightmapMemoryCache::new();

    let from_disk = bake_two_chunks_with(&mut disk);
    let from_memory = bake_two_chunks_with(&mut memory);
    assert_eq!(from_disk, from_memory);
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    let _ = std::fs::remove_dir_all(&dir);
}
