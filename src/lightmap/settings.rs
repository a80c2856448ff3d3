use crate::error::BakeError;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

/// Largest accepted chart edge in texels
pub const MAX_CHART_SIZE: u32 = 16384;

#[derive(Debug, Clone)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LightmapperConfig validation failed: {}", self.message)
    }
}

impl Error for ConfigError {}

impl From<ConfigError> for BakeError {
    fn from(err: ConfigError) -> Self {
        BakeError::config(err)
    }
}

/// Lightmap chart allocation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightmapChartingSettings {
    /// Size of lightmap chart in texels.
    pub chart_size: u32,
    /// Padding between individual objects on the chart.
    pub padding: u32,
    /// Texel density in texels per scene unit.
    pub texel_density: u32,
    /// Minimal scale of object lightmaps.
    /// Values below 1 may cause bleeding due to insufficient padding.
    pub min_object_scale: f32,
}

impl Default for LightmapChartingSettings {
    fn default() -> Self {
        Self {
            chart_size: 1024,
            padding: 1,
            texel_density: 10,
            min_object_scale: 1.0,
        }
    }
}

/// Geometry buffer baking settings; names are resolved by the renderer collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightmapGeometryBakingSettings {
    pub render_path_name: String,
    pub material_name: String,
    /// Pass the baking material renders in.
    pub pass_name: String,
}

impl Default for LightmapGeometryBakingSettings {
    fn default() -> Self {
        Self {
            render_path_name: "RenderPaths/LightmapGBuffer.xml".to_string(),
            material_name: "Materials/LightmapBaker.xml".to_string(),
            pass_name: "deferred".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightmapTracingSettings {
    /// Number of worker threads used by the tracer.
    pub num_threads: u32,
    /// Ray origin offset along the surface normal.
    pub ray_position_offset: f32,
}

impl Default for LightmapTracingSettings {
    fn default() -> Self {
        Self {
            num_threads: 8,
            ray_position_offset: 0.001,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightmapSettings {
    pub charting: LightmapChartingSettings,
    pub geometry_baking: LightmapGeometryBakingSettings,
    pub tracing: LightmapTracingSettings,
}

/// How the chunk box is grown before collecting ray-tracing neighbours.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VicinityPadding {
    /// Both corners move outwards by the padding distance.
    #[default]
    Symmetric,
    /// Historical arithmetic: padding is subtracted from and re-added to the
    /// min corner, so the chunk box is used unexpanded.
    Legacy,
}

impl VicinityPadding {
    pub fn apply(self, chunk_box: &crate::accel::Aabb, padding: f32) -> crate::accel::Aabb {
        match self {
            VicinityPadding::Symmetric => chunk_box.padded(padding),
            VicinityPadding::Legacy => {
                let mut min = chunk_box.min_vec3();
                min -= Vec3::splat(padding);
                min += Vec3::splat(padding);
                crate::accel::Aabb::from_vec3(min, chunk_box.max_vec3())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalLightmapperSettings {
    /// Chunk extent in scene units.
    pub chunk_size: Vec3,
    /// Distance the chunk box is grown by when collecting occluders.
    pub raytracing_scene_padding: f32,
    pub vicinity_padding: VicinityPadding,
    /// LOD submitted to the acceleration structure.
    pub raytracing_lod: u32,
    /// Directory for caller-owned outputs and spilled cache files. The
    /// lightmapper never touches it; drivers derive their paths from it.
    pub output_directory: PathBuf,
}

impl IncrementalLightmapperSettings {
    /// Where a [`LightmapDiskCache`](crate::lightmap::LightmapDiskCache) should spill geometry buffers
    pub fn cache_directory(&self) -> PathBuf {
        self.output_directory.join("cache")
    }
}

impl Default for IncrementalLightmapperSettings {
    fn default() -> Self {
        Self {
            chunk_size: Vec3::splat(128.0),
            raytracing_scene_padding: 10.0,
            vicinity_padding: VicinityPadding::Symmetric,
            raytracing_lod: 0,
            output_directory: PathBuf::from("lightmaps"),
        }
    }
}

/// Full configuration as loaded from disk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LightmapperConfig {
    #[serde(default)]
    pub lightmap: LightmapSettings,
    #[serde(default)]
    pub incremental: IncrementalLightmapperSettings,
}

impl LightmapperConfig {
    pub fn from_json_str(text: &str) -> Result<Self, BakeError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BakeError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, BakeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plausibility checks only; the pipeline itself trusts its settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let charting = &self.lightmap.charting;
        if charting.chart_size == 0 {
            return Err(ConfigError::new("lightmap.charting.chart_size must be positive"));
        }
        if charting.chart_size > MAX_CHART_SIZE {
            return Err(ConfigError::new(format!(
                "lightmap.charting.chart_size {} exceeds the {MAX_CHART_SIZE} texel limit",
                charting.chart_size
            )));
        }
        if charting.padding.saturating_mul(2) >= charting.chart_size {
            return Err(ConfigError::new(format!(
                "lightmap.charting.padding {} leaves no room in a {} texel chart",
                charting.padding, charting.chart_size
            )));
        }
        if charting.texel_density == 0 {
            return Err(ConfigError::new("lightmap.charting.texel_density must be positive"));
        }
        if !(charting.min_object_scale >= 0.0) {
            return Err(ConfigError::new("lightmap.charting.min_object_scale must be non-negative"));
        }

        let tracing = &self.lightmap.tracing;
        if tracing.num_threads == 0 {
            return Err(ConfigError::new("lightmap.tracing.num_threads must be positive"));
        }
        if !(tracing.ray_position_offset >= 0.0) {
            return Err(ConfigError::new("lightmap.tracing.ray_position_offset must be non-negative"));
        }

        let incremental = &self.incremental;
        if !incremental.chunk_size.cmpgt(Vec3::ZERO).all() || !incremental.chunk_size.is_finite() {
            return Err(ConfigError::new(format!(
                "incremental.chunk_size must be positive on every axis, got {:?}",
                incremental.chunk_size
            )));
        }
        if !(incremental.raytracing_scene_padding >= 0.0) {
            return Err(ConfigError::new("incremental.raytracing_scene_padding must be non-negative"));
        }
        Ok(())
    }
}
