//! Direct light tracing over baked geometry buffers
//!
//! Each covered texel casts one shadow ray toward every directional light. The
//! ray starts slightly above the surface to avoid self-intersection and never
//! travels further than the acceleration scene's diagonal.

use crate::accel::Ray;
use crate::error::{BakeError, BakeResult};
use crate::lightmap::acceleration_scene::AccelerationScene;
use crate::lightmap::geometry_baker::{
    chart_texel_count, chart_texel_offset, LightmapChartGeometryBuffer, EMPTY_GEOMETRY_ID,
};
use crate::lightmap::settings::LightmapTracingSettings;
use glam::Vec3;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::{Arc, Mutex};

/// Directional light used for baking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLightParameters {
    /// Direction the light travels in
    pub direction: Vec3,
    /// Linear color, intensity premultiplied
    pub color: [f32; 3],
}

impl DirectionalLightParameters {
    pub fn new(direction: Vec3, color: [f32; 3]) -> Self {
        Self { direction, color }
    }
}

impl Default for DirectionalLightParameters {
    /// Straight down, white
    fn default() -> Self {
        Self {
            direction: Vec3::NEG_Y,
            color: [1.0, 1.0, 1.0],
        }
    }
}

/// Accumulated direct light of one chart; alpha marks covered texels
#[derive(Debug, Clone, PartialEq)]
pub struct LightmapChartBakedDirect {
    /// Global chart index
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub light: Vec<[f32; 4]>,
}

impl LightmapChartBakedDirect {
    pub fn new(index: u32, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
            light: vec![[0.0; 4]; chart_texel_count(width, height)],
        }
    }

    /// Texel at (x, y), `None` outside the chart
    pub fn texel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.light.get(chart_texel_offset(self.width, x, y)).copied()
    }
}

/// One zeroed result per geometry buffer, in the same order
pub fn initialize_lightmap_charts_baked_direct(
    buffers: &[LightmapChartGeometryBuffer],
) -> Vec<LightmapChartBakedDirect> {
    buffers
        .iter()
        .map(|buffer| LightmapChartBakedDirect::new(buffer.index, buffer.width, buffer.height))
        .collect()
}

/// Direct light tracing collaborator
pub trait DirectLightTracer {
    fn bake_directional_light(
        &self,
        baked: &mut LightmapChartBakedDirect,
        buffer: &LightmapChartGeometryBuffer,
        scene: &AccelerationScene,
        light: &DirectionalLightParameters,
        settings: &LightmapTracingSettings,
    ) -> BakeResult<()>;
}

/// Lambertian shadow-ray tracer running on a rayon pool
#[derive(Debug, Default)]
pub struct CpuDirectLightTracer {
    pool: Mutex<Option<(usize, Arc<ThreadPool>)>>,
}

impl CpuDirectLightTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool sized for `num_threads`, rebuilt when the count changes
    fn pool(&self, num_threads: usize) -> BakeResult<Arc<ThreadPool>> {
        let mut slot = self
            .pool
            .lock()
            .map_err(|_| BakeError::collaborator("Tracer thread pool lock poisoned"))?;
        if let Some((threads, pool)) = slot.as_ref() {
            if *threads == num_threads {
                return Ok(Arc::clone(pool));
            }
        }
        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|i| format!("lightmap-tracer-{i}"))
                .build()
                .map_err(|e| BakeError::collaborator(format!("Failed to build tracer thread pool: {e}")))?,
        );
        *slot = Some((num_threads, Arc::clone(&pool)));
        Ok(pool)
    }
}

impl DirectLightTracer for CpuDirectLightTracer {
    fn bake_directional_light(
        &self,
        baked: &mut LightmapChartBakedDirect,
        buffer: &LightmapChartGeometryBuffer,
        scene: &AccelerationScene,
        light: &DirectionalLightParameters,
        settings: &LightmapTracingSettings,
    ) -> BakeResult<()> {
        if baked.light.len() != buffer.texel_count() {
            return Err(BakeError::collaborator(format!(
                "Chart {} has {} baked texels but {} geometry texels",
                buffer.index,
                baked.light.len(),
                buffer.texel_count()
            )));
        }

        let to_light = -light.direction.normalize_or_zero();
        if to_light == Vec3::ZERO {
            log::warn!("Skipping directional light with zero direction");
            return Ok(());
        }
        let color = Vec3::from_array(light.color);
        let offset = settings.ray_position_offset;
        let max_distance = scene.max_distance();

        let pool = self.pool(settings.num_threads.max(1) as usize)?;
        pool.install(|| {
            baked.light.par_iter_mut().enumerate().for_each(|(texel, out)| {
                if buffer.geometry_ids[texel] == EMPTY_GEOMETRY_ID {
                    return;
                }
                out[3] = 1.0;

                let normal = Vec3::from_array(buffer.smooth_normals[texel]);
                let n_dot_l = normal.dot(to_light);
                if n_dot_l <= 0.0 {
                    return;
                }

                let origin = Vec3::from_array(buffer.positions[texel]) + normal * offset;
                let ray = Ray::new(origin.to_array(), to_light.to_array()).with_t_max(max_distance);
                if scene.occluded(&ray) {
                    return;
                }

                let contribution = color * n_dot_l;
                out[0] += contribution.x;
                out[1] += contribution.y;
                out[2] += contribution.z;
            });
        });

        Ok(())
    }
}
