//! Lightmap chart allocation
//!
//! Charts are square texel regions; each lightmapped node receives one
//! rectangular element on exactly one chart. Chart indices returned by a
//! charter are local to the call and become global once offset by the
//! running base index in [`apply_lightmap_charts`].

use crate::error::{BakeError, BakeResult};
use crate::lightmap::settings::LightmapChartingSettings;
use crate::scene::{NodeId, Scene};

/// Region of one node on a chart
#[derive(Debug, Clone, PartialEq)]
pub struct LightmapChartElement {
    pub node: NodeId,
    /// Texel rectangle as (x, y, width, height)
    pub region: [u32; 4],
    /// Lightmap UV transform as (scale.x, scale.y, offset.x, offset.y)
    pub scale_offset: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightmapChart {
    /// Index local to the charting call
    pub index: u32,
    /// Width and height in texels
    pub size: u32,
    pub elements: Vec<LightmapChartElement>,
}

impl LightmapChart {
    pub fn new(index: u32, size: u32) -> Self {
        Self {
            index,
            size,
            elements: Vec::new(),
        }
    }
}

/// Chart generation collaborator
pub trait LightmapCharter {
    fn generate_charts(
        &self,
        scene: &Scene,
        nodes: &[NodeId],
        settings: &LightmapChartingSettings,
    ) -> BakeResult<Vec<LightmapChart>>;
}

/// Shelf packer: elements fill rows left to right, a new row starts when the
/// current one is full and a new chart starts when rows run out.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShelfCharter;

impl ShelfCharter {
    /// Edge length in texels for a node, before clamping to the chart
    pub fn object_size(scene: &Scene, node: NodeId, settings: &LightmapChartingSettings) -> Option<u32> {
        let node = scene.node(node)?;
        let renderable = node.lightmapped()?;
        let bounds = renderable.local_bounds(0);
        if !bounds.is_valid() {
            return None;
        }
        let extent = bounds.extent().into_iter().fold(0.0f32, f32::max);
        let scale = node.transform.max_scale().max(settings.min_object_scale);
        let texels = (extent * scale * settings.texel_density as f32).ceil();
        Some(texels.max(1.0) as u32)
    }
}

struct ShelfCursor {
    x: u32,
    y: u32,
    shelf_height: u32,
}

impl LightmapCharter for ShelfCharter {
    fn generate_charts(
        &self,
        scene: &Scene,
        nodes: &[NodeId],
        settings: &LightmapChartingSettings,
    ) -> BakeResult<Vec<LightmapChart>> {
        let chart_size = settings.chart_size;
        let padding = settings.padding;
        let max_object = chart_size.saturating_sub(padding.saturating_mul(2));
        if max_object == 0 {
            return Err(BakeError::collaborator(format!(
                "Chart size {chart_size} cannot hold any object with padding {padding}"
            )));
        }

        let mut charts: Vec<LightmapChart> = Vec::new();
        let mut cursor = ShelfCursor { x: 0, y: 0, shelf_height: 0 };

        for &node in nodes {
            let Some(size) = Self::object_size(scene, node, settings) else {
                continue;
            };
            let size = size.min(max_object);
            let cell = size + 2 * padding;

            if cursor.x + cell > chart_size {
                cursor.x = 0;
                cursor.y += cursor.shelf_height;
                cursor.shelf_height = 0;
            }
            if charts.is_empty() || cursor.y + cell > chart_size {
                charts.push(LightmapChart::new(charts.len() as u32, chart_size));
                cursor = ShelfCursor { x: 0, y: 0, shelf_height: 0 };
            }

            let x = cursor.x + padding;
            let y = cursor.y + padding;
            let inv = 1.0 / chart_size as f32;
            let element = LightmapChartElement {
                node,
                region: [x, y, size, size],
                scale_offset: [size as f32 * inv, size as f32 * inv, x as f32 * inv, y as f32 * inv],
            };
            if let Some(chart) = charts.last_mut() {
                chart.elements.push(element);
            }

            cursor.x += cell;
            cursor.shelf_height = cursor.shelf_height.max(cell);
        }

        Ok(charts)
    }
}

/// Write chart assignments onto the renderables; chart `i` becomes `base + i`.
pub fn apply_lightmap_charts(scene: &mut Scene, charts: &[LightmapChart], base: u32) -> BakeResult<()> {
    for chart in charts {
        let lightmap_index = base + chart.index;
        for element in &chart.elements {
            let renderable = scene
                .node_mut(element.node)
                .and_then(|node| node.renderable.as_mut())
                .ok_or_else(|| {
                    BakeError::collaborator(format!(
                        "Chart {lightmap_index} references node {} without a renderable",
                        element.node.index()
                    ))
                })?;
            renderable.lightmap_index = Some(lightmap_index);
            renderable.lightmap_scale_offset = element.scale_offset;
        }
    }
    Ok(())
}
