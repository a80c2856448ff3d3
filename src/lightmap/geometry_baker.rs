// src/lightmap/geometry_baker.rs
// Per-texel surface attribute baking for lightmap charts.
// Rasterizes lightmapped triangles in chart UV space so the tracer knows where each texel lives in the world.
// RELEVANT FILES:src/lightmap/charter.rs,src/lightmap/tracer.rs,src/lightmap/pass_registry.rs

use crate::error::{BakeError, BakeResult};
use crate::geometry::normal_matrix;
use crate::lightmap::charter::LightmapChart;
use crate::lightmap::pass_registry::PassRegistry;
use crate::lightmap::settings::LightmapGeometryBakingSettings;
use crate::scene::{NodeId, Scene};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Geometry id of texels no triangle covers
pub const EMPTY_GEOMETRY_ID: u32 = 0;

/// One object to be rendered into a chart
#[derive(Debug, Clone, PartialEq)]
pub struct LightmapGeometryBakingElement {
    pub node: NodeId,
    /// Non-zero id written into covered texels
    pub geometry_id: u32,
    pub scale_offset: [f32; 4],
}

/// Everything needed to render one chart's geometry buffer
#[derive(Debug, Clone, PartialEq)]
pub struct LightmapGeometryBakingScene {
    /// Global chart index
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub render_path_name: String,
    pub material_name: String,
    pub pass_index: u32,
    pub elements: Vec<LightmapGeometryBakingElement>,
}

/// Rasterized surface attributes of one chart, row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightmapChartGeometryBuffer {
    /// Global chart index
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub positions: Vec<[f32; 3]>,
    pub smooth_normals: Vec<[f32; 3]>,
    pub geometry_ids: Vec<u32>,
}

/// Texel count of a `width` x `height` chart, computed without u32 overflow
pub fn chart_texel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Row-major offset of texel (x, y)
pub fn chart_texel_offset(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

impl LightmapChartGeometryBuffer {
    pub fn new(index: u32, width: u32, height: u32) -> Self {
        let texels = chart_texel_count(width, height);
        Self {
            index,
            width,
            height,
            positions: vec![[0.0; 3]; texels],
            smooth_normals: vec![[0.0; 3]; texels],
            geometry_ids: vec![EMPTY_GEOMETRY_ID; texels],
        }
    }

    pub fn texel_count(&self) -> usize {
        self.geometry_ids.len()
    }

    pub fn is_covered(&self, texel: usize) -> bool {
        self.geometry_ids.get(texel).is_some_and(|&id| id != EMPTY_GEOMETRY_ID)
    }

    pub fn covered_texels(&self) -> usize {
        self.geometry_ids.iter().filter(|&&id| id != EMPTY_GEOMETRY_ID).count()
    }
}

/// Geometry buffer collaborator
pub trait LightmapGeometryBaker {
    /// Prepare one baking scene per chart; `base` turns local chart indices global
    fn generate_geometry_baking_scenes(
        &self,
        scene: &Scene,
        charts: &[LightmapChart],
        base: u32,
        settings: &LightmapGeometryBakingSettings,
        passes: &mut PassRegistry,
    ) -> BakeResult<Vec<LightmapGeometryBakingScene>>;

    fn bake_geometry_buffers(
        &self,
        scene: &Scene,
        baking_scenes: &[LightmapGeometryBakingScene],
    ) -> BakeResult<Vec<LightmapChartGeometryBuffer>>;
}

/// Software rasterizer sampling at texel centers
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuGeometryBaker;

impl LightmapGeometryBaker for CpuGeometryBaker {
    fn generate_geometry_baking_scenes(
        &self,
        _scene: &Scene,
        charts: &[LightmapChart],
        base: u32,
        settings: &LightmapGeometryBakingSettings,
        passes: &mut PassRegistry,
    ) -> BakeResult<Vec<LightmapGeometryBakingScene>> {
        let pass_index = passes.index_of(&settings.pass_name);
        Ok(charts
            .iter()
            .map(|chart| LightmapGeometryBakingScene {
                index: base + chart.index,
                width: chart.size,
                height: chart.size,
                render_path_name: settings.render_path_name.clone(),
                material_name: settings.material_name.clone(),
                pass_index,
                elements: chart
                    .elements
                    .iter()
                    .enumerate()
                    .map(|(i, element)| LightmapGeometryBakingElement {
                        node: element.node,
                        geometry_id: i as u32 + 1,
                        scale_offset: element.scale_offset,
                    })
                    .collect(),
            })
            .collect())
    }

    fn bake_geometry_buffers(
        &self,
        scene: &Scene,
        baking_scenes: &[LightmapGeometryBakingScene],
    ) -> BakeResult<Vec<LightmapChartGeometryBuffer>> {
        baking_scenes
            .iter()
            .map(|baking_scene| rasterize_chart(scene, baking_scene))
            .collect()
    }
}

fn rasterize_chart(scene: &Scene, baking_scene: &LightmapGeometryBakingScene) -> BakeResult<LightmapChartGeometryBuffer> {
    let mut buffer = LightmapChartGeometryBuffer::new(baking_scene.index, baking_scene.width, baking_scene.height);
    let texture_size = Vec2::new(baking_scene.width as f32, baking_scene.height as f32);

    for element in &baking_scene.elements {
        let node = scene.node(element.node).ok_or_else(|| {
            BakeError::collaborator(format!(
                "Chart {} references missing node {}",
                baking_scene.index,
                element.node.index()
            ))
        })?;
        let Some(renderable) = node.lightmapped() else {
            continue;
        };
        let world = node.world_matrix();
        let normals = normal_matrix(&world);
        let [sx, sy, ox, oy] = element.scale_offset;

        for geometry in &renderable.geometries {
            let Some((_, mesh)) = geometry.lod(0) else {
                continue;
            };
            let uvs = mesh.lightmap_uv_channel();
            if uvs.len() != mesh.vertex_count() {
                return Err(BakeError::collaborator(format!(
                    "Node '{}' has {} lightmap UVs for {} vertices",
                    node.name,
                    uvs.len(),
                    mesh.vertex_count()
                )));
            }

            for tri in mesh.indices.chunks_exact(3) {
                let ids = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
                if ids.iter().any(|&i| i >= mesh.vertex_count()) {
                    return Err(BakeError::collaborator(format!(
                        "Node '{}' has a triangle referencing a missing vertex",
                        node.name
                    )));
                }
                let texel_uv = ids.map(|i| {
                    let uv = uvs[i];
                    Vec2::new(uv[0] * sx + ox, uv[1] * sy + oy) * texture_size
                });
                let corners = TriangleCorners {
                    uv: texel_uv,
                    position: ids.map(|i| mesh.world_position(&world, i)),
                    normal: ids.map(|i| mesh.world_normal(&normals, i)),
                };
                rasterize_triangle(&mut buffer, &corners, element.geometry_id);
            }
        }
    }

    Ok(buffer)
}

struct TriangleCorners {
    uv: [Vec2; 3],
    position: [Vec3; 3],
    normal: [Vec3; 3],
}

fn rasterize_triangle(buffer: &mut LightmapChartGeometryBuffer, corners: &TriangleCorners, geometry_id: u32) {
    let [a, b, c] = corners.uv;
    let area = (b - a).perp_dot(c - a);
    if area.abs() <= f32::EPSILON {
        return;
    }

    let min = a.min(b).min(c).floor().max(Vec2::ZERO);
    let max = a.max(b).max(c).ceil().min(Vec2::new(buffer.width as f32, buffer.height as f32));
    if min.x >= max.x || min.y >= max.y {
        return;
    }

    const EDGE_EPSILON: f32 = -1e-5;
    for y in min.y as u32..max.y as u32 {
        for x in min.x as u32..max.x as u32 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = (c - b).perp_dot(p - b) / area;
            let w1 = (a - c).perp_dot(p - c) / area;
            let w2 = 1.0 - w0 - w1;
            if w0 < EDGE_EPSILON || w1 < EDGE_EPSILON || w2 < EDGE_EPSILON {
                continue;
            }

            let texel = chart_texel_offset(buffer.width, x, y);
            let position = corners.position[0] * w0 + corners.position[1] * w1 + corners.position[2] * w2;
            let normal = (corners.normal[0] * w0 + corners.normal[1] * w1 + corners.normal[2] * w2).normalize_or_zero();
            buffer.positions[texel] = position.to_array();
            buffer.smooth_normals[texel] = normal.to_array();
            buffer.geometry_ids[texel] = geometry_id;
        }
    }
}
