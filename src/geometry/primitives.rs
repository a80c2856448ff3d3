// src/geometry/primitives.rs
// Procedural unit primitives with lightmap UV layouts
// Exists to supply base meshes for demo scenes and baking tests
// RELEVANT FILES:src/geometry/mod.rs,src/bin/lightmap_static_scene.rs

use std::f32::consts::TAU;

use glam::Vec3;

use super::MeshBuffers;

/// Unit plane in XY facing +Z; lightmap UVs equal the primary UVs.
pub fn generate_plane(segments_x: u32, segments_y: u32) -> MeshBuffers {
    let sx = segments_x.max(1);
    let sy = segments_y.max(1);
    let vertex_count = ((sx + 1) * (sy + 1)) as usize;
    let index_count = (sx * sy * 6) as usize;

    let mut mesh = MeshBuffers::with_capacity(vertex_count, index_count);

    for y in 0..=sy {
        let v = y as f32 / sy as f32;
        for x in 0..=sx {
            let u = x as f32 / sx as f32;
            mesh.positions.push([u - 0.5, v - 0.5, 0.0]);
            mesh.normals.push([0.0, 0.0, 1.0]);
            mesh.uvs.push([u, 1.0 - v]);
            mesh.lightmap_uvs.push([u, 1.0 - v]);
        }
    }

    for y in 0..sy {
        for x in 0..sx {
            let a = y * (sx + 1) + x;
            let b = a + 1;
            let c = a + sx + 1;
            let d = c + 1;
            mesh.indices.extend_from_slice(&[a, b, d, a, d, c]);
        }
    }

    mesh
}

/// Unit cube centred at the origin. Each face gets its own cell of a 3x2 lightmap grid.
pub fn generate_unit_box() -> MeshBuffers {
    let mut mesh = MeshBuffers::with_capacity(24, 36);

    let faces = [
        (Vec3::X, Vec3::Y, -Vec3::Z, Vec3::new(0.5, -0.5, 0.5)),   // +X
        (-Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(-0.5, -0.5, -0.5)), // -X
        (Vec3::Y, -Vec3::Z, Vec3::X, Vec3::new(-0.5, 0.5, 0.5)),   // +Y
        (-Vec3::Y, Vec3::Z, Vec3::X, Vec3::new(-0.5, -0.5, -0.5)), // -Y
        (Vec3::Z, Vec3::Y, Vec3::X, Vec3::new(-0.5, -0.5, 0.5)),   // +Z
        (-Vec3::Z, Vec3::Y, -Vec3::X, Vec3::new(0.5, -0.5, -0.5)), // -Z
    ];

    // Inset keeps neighbouring cells from sharing edge texels
    const INSET: f32 = 0.02;

    for (face, &(normal, up, right, origin)) in faces.iter().enumerate() {
        let corners = [origin, origin + right, origin + right + up, origin + up];
        let uv = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
        let cell = [(face % 3) as f32, (face / 3) as f32];
        let base = mesh.vertex_count() as u32;
        for (corner, uv) in corners.iter().zip(uv.iter()) {
            mesh.positions.push(corner.to_array());
            mesh.normals.push(normal.to_array());
            mesh.uvs.push(*uv);
            mesh.lightmap_uvs.push([
                (cell[0] + INSET + uv[0] * (1.0 - 2.0 * INSET)) / 3.0,
                (cell[1] + INSET + uv[1] * (1.0 - 2.0 * INSET)) / 2.0,
            ]);
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    mesh
}

/// UV sphere; the equirectangular UVs double as lightmap UVs.
pub fn generate_sphere(rings: u32, segments: u32, radius: f32) -> MeshBuffers {
    let rings = rings.max(2);
    let segments = segments.max(3);
    let mut mesh = MeshBuffers::with_capacity(
        ((rings + 1) * (segments + 1)) as usize,
        (rings * segments * 6) as usize,
    );

    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let theta = v * std::f32::consts::PI;
        let y = (theta.cos() * radius).clamp(-radius, radius);
        let r = theta.sin() * radius;
        for seg in 0..=segments {
            let u = seg as f32 / segments as f32;
            let phi = u * TAU;
            let x = r * phi.cos();
            let z = r * phi.sin();
            let normal = Vec3::new(x, y, z).normalize_or_zero();
            mesh.positions.push([x, y, z]);
            mesh.normals.push(normal.to_array());
            mesh.uvs.push([u, 1.0 - v]);
            mesh.lightmap_uvs.push([u, v]);
        }
    }

    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * (segments + 1) + seg;
            let b = a + segments + 1;
            mesh.indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_counts() {
        let mesh = generate_plane(2, 3);
        assert_eq!(mesh.vertex_count(), 12);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.lightmap_uvs.len(), mesh.vertex_count());
    }

    #[test]
    fn box_faces_point_outwards() {
        let mesh = generate_unit_box();
        assert_eq!(mesh.triangle_count(), 12);
        for tri in mesh.indices.chunks_exact(3) {
            let p: Vec<Vec3> = tri.iter().map(|&i| Vec3::from_array(mesh.positions[i as usize])).collect();
            let geometric = (p[1] - p[0]).cross(p[2] - p[0]);
            let shading = Vec3::from_array(mesh.normals[tri[0] as usize]);
            assert!(geometric.dot(shading) > 0.0);
        }
    }

    #[test]
    fn box_lightmap_cells_do_not_overlap() {
        let mesh = generate_unit_box();
        for face in 0..6 {
            let cell_u = (face % 3) as f32 / 3.0;
            let cell_v = (face / 3) as f32 / 2.0;
            for uv in &mesh.lightmap_uvs[face * 4..face * 4 + 4] {
                assert!(uv[0] > cell_u && uv[0] < cell_u + 1.0 / 3.0);
                assert!(uv[1] > cell_v && uv[1] < cell_v + 0.5);
            }
        }
    }

    #[test]
    fn sphere_respects_radius() {
        let mesh = generate_sphere(8, 12, 2.0);
        for p in &mesh.positions {
            assert!((Vec3::from_array(*p).length() - 2.0).abs() < 1e-4);
        }
    }
}
