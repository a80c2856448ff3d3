// src/bin/lightmap_static_scene.rs
// Bakes direct lighting for a small static scene: two spheres resting on a ground plane under one sun.
//
// Usage:
//   lightmap_static_scene [CONFIG.json]
//
// Without a config file the default settings are used with a 4-unit chunk grid,
// so each sphere lands in its own chunk. Geometry buffers are spilled under
// `<output_directory>/cache` while baking. Set RUST_LOG=debug for per-chunk progress.

use glam::{Quat, Vec3};
use lightbake::geometry::{generate_plane, generate_sphere};
use lightbake::lightmap::tracer::DirectionalLightParameters;
use lightbake::{
    BakeError, DefaultLightmapSceneCollector, IncrementalLightmapper, LightmapDiskCache, LightmapperConfig, Scene,
    Transform,
};
use std::env;

fn build_scene() -> Scene {
    let mut scene = Scene::new();

    // Ground plane lies in XZ, facing +Y
    let ground = Transform::new_with(
        Vec3::ZERO,
        Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        Vec3::new(8.0, 8.0, 1.0),
    );
    scene.add_static_model("ground", ground, generate_plane(8, 8));

    scene.add_static_model(
        "sphere-left",
        Transform::from_translation(Vec3::new(-2.0, 1.0, 0.0)),
        generate_sphere(16, 32, 1.0),
    );
    scene.add_static_model(
        "sphere-right",
        Transform::from_translation(Vec3::new(2.0, 0.75, 1.0)),
        generate_sphere(16, 32, 0.75),
    );

    scene.add_directional_light(DirectionalLightParameters::new(
        Vec3::new(-0.4, -1.0, -0.3),
        [1.0, 0.95, 0.85],
    ));
    scene
}

fn load_config() -> Result<LightmapperConfig, BakeError> {
    match env::args().nth(1) {
        Some(path) => {
            log::info!("Loading lightmapper config from {path}");
            LightmapperConfig::from_path(path)
        }
        None => {
            let mut config = LightmapperConfig::default();
            config.lightmap.charting.chart_size = 256;
            config.incremental.chunk_size = Vec3::splat(4.0);
            config.incremental.raytracing_scene_padding = 2.0;
            Ok(config)
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = env_logger::try_init();

    let config = load_config()?;
    config.validate()?;

    let mut scene = build_scene();
    let mut collector = DefaultLightmapSceneCollector::new();
    let cache_directory = config.incremental.cache_directory();
    log::info!("Spilling geometry buffers to {}", cache_directory.display());
    let mut cache = LightmapDiskCache::new(&cache_directory)?;

    let baked = {
        let mut lightmapper = IncrementalLightmapper::new(
            &mut scene,
            &mut collector,
            &mut cache,
            config.lightmap.clone(),
            config.incremental.clone(),
        );
        lightmapper.process_scene()?;
        lightmapper.bake()?
    };

    for chunk in &baked {
        for chart in &chunk.charts {
            let covered = chart.light.iter().filter(|texel| texel[3] > 0.0).count();
            let lit = chart.light.iter().filter(|texel| texel[0] + texel[1] + texel[2] > 0.0).count();
            log::info!(
                "Chunk {}: chart {} ({}x{}), {} covered texels, {} lit",
                chunk.chunk,
                chart.index,
                chart.width,
                chart.height,
                covered,
                lit
            );
        }
    }

    let stats = cache.stats();
    log::info!(
        "Done: {} chunks baked, peak cache entries {} geometry buffers / {} vicinities",
        baked.len(),
        stats.peak_geometry_buffer_entries,
        stats.peak_vicinity_entries
    );
    Ok(())
}
