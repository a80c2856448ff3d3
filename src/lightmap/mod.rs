// src/lightmap/mod.rs
// Incremental lightmap baking: chunk ordering, artifact caching and the three-phase pipeline.
// This exists to bake static lighting chunk by chunk without holding the whole scene's ray-tracing data at once.
// RELEVANT FILES:src/lightmap/incremental.rs,src/lightmap/cache.rs,src/lightmap/acceleration_scene.rs,src/accel/backend.rs

pub mod acceleration_scene;
pub mod cache;
pub mod charter;
pub mod chunk;
pub mod collector;
pub mod geometry_baker;
pub mod incremental;
pub mod pass_registry;
pub mod settings;
pub mod tracer;

pub use acceleration_scene::{
    calculate_bounding_box_of_nodes, create_acceleration_scene, AccelerationInstance, AccelerationScene,
};
pub use cache::{CacheStats, ChunkGeometryBuffers, ChunkVicinity, LightmapCache, LightmapDiskCache, LightmapMemoryCache};
pub use charter::{apply_lightmap_charts, LightmapChart, LightmapChartElement, LightmapCharter, ShelfCharter};
pub use chunk::{sort_chunks_by_locality, ChunkCoord};
pub use collector::{DefaultLightmapSceneCollector, LightmapSceneCollector};
pub use geometry_baker::{
    CpuGeometryBaker, LightmapChartGeometryBuffer, LightmapGeometryBaker, LightmapGeometryBakingScene,
};
pub use incremental::{
    AdjacentChunkProcessingContext, ChunkBakedDirect, DirectLightBakingContext, IncrementalLightmapper,
    LocalChunkProcessingContext,
};
pub use pass_registry::PassRegistry;
pub use settings::{
    ConfigError, IncrementalLightmapperSettings, LightmapChartingSettings, LightmapGeometryBakingSettings,
    LightmapSettings, LightmapTracingSettings, LightmapperConfig, VicinityPadding,
};
pub use tracer::{
    initialize_lightmap_charts_baked_direct, CpuDirectLightTracer, DirectLightTracer, DirectionalLightParameters,
    LightmapChartBakedDirect,
};
