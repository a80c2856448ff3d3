//! Incremental lightmap baker for static scenes.
//! Chunks a scene, caches per-chunk geometry buffers and ray-tracing vicinities, and bakes direct light chunk by chunk.

pub mod accel;
pub mod error;
pub mod geometry;
pub mod lightmap;
pub mod scene;

pub use error::{ArtifactKind, BakeError, BakeResult};
pub use lightmap::{
    ChunkBakedDirect, DefaultLightmapSceneCollector, IncrementalLightmapper, LightmapCache, LightmapDiskCache,
    LightmapMemoryCache, LightmapSceneCollector, LightmapperConfig,
};
pub use scene::{NodeId, Scene, Transform};
