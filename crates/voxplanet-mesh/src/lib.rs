//! Surface extraction: turns a chunk's density lattice into triangle
//! geometry with per-axis face culling and surface-nets vertex placement.
#![forbid(unsafe_code)]

use hashbrown::HashMap;
use voxplanet_chunk::ChunkVolume;
use voxplanet_geom::{Vec3, Vec3i};

/// Extraction switches. `scale` multiplies all output positions and is the
/// chunk's LOD resolution in practice.
#[derive(Clone, Copy, Debug)]
pub struct MesherOptions {
    /// Place cell vertices at edge-crossing centroids instead of cell
    /// centers.
    pub surface_nets: bool,
    /// Also emit the flat collision vertex soup.
    pub collision: bool,
    pub scale: f32,
}

impl Default for MesherOptions {
    fn default() -> Self {
        Self {
            surface_nets: true,
            collision: false,
            scale: 1.0,
        }
    }
}

/// Renderer-agnostic mesh output. `positions`, `normals` are parallel;
/// `indices` is the full triangle list and `material_indices` partitions it
/// by solid material so each material can be drawn as its own surface.
#[derive(Clone, Debug, Default)]
pub struct MeshBuffers {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub material_indices: HashMap<u8, Vec<u32>>,
    /// Triangle soup for the physics collider, only filled when requested.
    pub collision: Vec<Vec3>,
}

impl MeshBuffers {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn push_triangle(&mut self, v0: Vec3, v1: Vec3, v2: Vec3, material: u8, collision: bool) {
        let start = self.positions.len() as u32;

        self.positions.push(v0);
        self.positions.push(v1);
        self.positions.push(v2);
        if collision {
            self.collision.push(v0);
            self.collision.push(v1);
            self.collision.push(v2);
        }

        // Flat shading: one face normal repeated for all three vertices.
        let normal = (v2 - v0).cross(v1 - v0).normalized();
        self.normals.push(normal);
        self.normals.push(normal);
        self.normals.push(normal);

        self.indices.extend([start, start + 1, start + 2]);
        self.material_indices
            .entry(material)
            .or_default()
            .extend([start, start + 1, start + 2]);
    }
}

const CORNER_OFFSETS: [Vec3i; 8] = [
    Vec3i { x: 0, y: 0, z: 0 },
    Vec3i { x: 1, y: 0, z: 0 },
    Vec3i { x: 0, y: 1, z: 0 },
    Vec3i { x: 1, y: 1, z: 0 },
    Vec3i { x: 0, y: 0, z: 1 },
    Vec3i { x: 1, y: 0, z: 1 },
    Vec3i { x: 0, y: 1, z: 1 },
    Vec3i { x: 1, y: 1, z: 1 },
];

const EDGE_PAIRS: [(usize, usize); 12] = [
    (0, 1),
    (1, 3),
    (3, 2),
    (2, 0),
    (4, 5),
    (5, 7),
    (7, 6),
    (6, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

struct VertexGrid {
    px: usize,
    py: usize,
    pz: usize,
    verts: Vec<Vec3>,
}

impl VertexGrid {
    #[inline]
    fn get(&self, x: usize, y: usize, z: usize) -> Vec3 {
        self.verts[(x * self.py + y) * self.pz + z]
    }
}

/// One candidate vertex for the cell anchored at lattice point `pos`.
///
/// Surface-nets mode averages the zero crossings of the cell's 12 edges;
/// a cell with no crossing gets the invalid sentinel so face generation
/// skips it. Block mode always uses the cell center.
fn find_vertex(volume: &ChunkVolume, pos: Vec3i, opts: &MesherOptions) -> Vec3 {
    if !opts.surface_nets {
        return (pos.as_vec3() + Vec3::splat(0.5)) * opts.scale;
    }

    let mut sum = Vec3::ZERO;
    let mut crossings = 0u32;

    for (e1, e2) in EDGE_PAIRS {
        let a = pos + CORNER_OFFSETS[e1];
        let b = pos + CORNER_OFFSETS[e2];

        let val_a = volume.density(a.x as usize, a.y as usize, a.z as usize);
        let val_b = volume.density(b.x as usize, b.y as usize, b.z as usize);

        if (val_a > 0.0) != (val_b > 0.0) {
            let t = val_a / (val_a - val_b);
            sum += (a.as_vec3() + (b.as_vec3() - a.as_vec3()) * t) * opts.scale;
            crossings += 1;
        }
    }

    if crossings == 0 {
        return Vec3::INVALID;
    }
    sum / crossings as f32
}

/// Extracts the isosurface of `volume`. Pure function of the volume and the
/// options; holds no state between calls.
pub fn extract(volume: &ChunkVolume, opts: &MesherOptions) -> MeshBuffers {
    // Point range is one less than the lattice on each axis because every
    // cell reads its +1 corner.
    let px = volume.size_x() - 1;
    let py = volume.size_y() - 1;
    let pz = volume.size_z() - 1;

    // Vertex placement phase: one cached candidate vertex per cell, shared
    // by up to six adjacent faces.
    let mut verts = Vec::with_capacity(px * py * pz);
    for x in 0..px {
        for y in 0..py {
            for z in 0..pz {
                verts.push(find_vertex(volume, Vec3i::new(x as i32, y as i32, z as i32), opts));
            }
        }
    }
    let grid = VertexGrid { px, py, pz, verts };

    // Face generation phase: a face is emitted exactly where solidity flips
    // between a cell pair along one axis. Interior range only, the border
    // cells are the seam skirt owned by the neighboring chunk.
    let mut out = MeshBuffers::default();
    for x in 1..px {
        for y in 1..py {
            for z in 1..pz {
                let solid = volume.solid(x, y, z);

                let solid_xn = volume.solid(x + 1, y, z);
                if solid != solid_xn {
                    let mat = if solid_xn {
                        volume.material(x + 1, y, z)
                    } else {
                        volume.material(x, y, z)
                    };
                    emit_quad(
                        &mut out,
                        &grid,
                        [
                            (x, y - 1, z - 1),
                            (x, y, z - 1),
                            (x, y, z),
                            (x, y - 1, z),
                        ],
                        solid_xn,
                        mat,
                        opts.collision,
                    );
                }

                let solid_yn = volume.solid(x, y + 1, z);
                if solid != solid_yn {
                    let mat = if solid_yn {
                        volume.material(x, y + 1, z)
                    } else {
                        volume.material(x, y, z)
                    };
                    emit_quad(
                        &mut out,
                        &grid,
                        [
                            (x - 1, y, z - 1),
                            (x, y, z - 1),
                            (x, y, z),
                            (x - 1, y, z),
                        ],
                        !solid_yn,
                        mat,
                        opts.collision,
                    );
                }

                let solid_zn = volume.solid(x, y, z + 1);
                if solid != solid_zn {
                    let mat = if solid_zn {
                        volume.material(x, y, z + 1)
                    } else {
                        volume.material(x, y, z)
                    };
                    emit_quad(
                        &mut out,
                        &grid,
                        [
                            (x - 1, y - 1, z),
                            (x, y - 1, z),
                            (x, y, z),
                            (x - 1, y, z),
                        ],
                        solid_zn,
                        mat,
                        opts.collision,
                    );
                }
            }
        }
    }

    out
}

fn emit_quad(
    out: &mut MeshBuffers,
    grid: &VertexGrid,
    corners: [(usize, usize, usize); 4],
    flip: bool,
    material: u8,
    collision: bool,
) {
    let a = grid.get(corners[0].0, corners[0].1, corners[0].2);
    let b = grid.get(corners[1].0, corners[1].1, corners[1].2);
    let c = grid.get(corners[2].0, corners[2].1, corners[2].2);
    let d = grid.get(corners[3].0, corners[3].1, corners[3].2);

    if a.is_invalid() || b.is_invalid() || c.is_invalid() || d.is_invalid() {
        return;
    }

    if flip {
        out.push_triangle(a, b, c, material, collision);
        out.push_triangle(c, d, a, material, collision);
    } else {
        out.push_triangle(c, b, a, material, collision);
        out.push_triangle(a, d, c, material, collision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxplanet_field::FieldSample;

    fn volume_with<F>(f: F) -> ChunkVolume
    where
        F: Fn(Vec3) -> FieldSample,
    {
        let mut vol = ChunkVolume::for_chunk(8, 8, 1);
        vol.generate_with(Vec3::ZERO, f);
        vol
    }

    fn half_space(limit: f32) -> impl Fn(Vec3) -> FieldSample {
        move |p| {
            let density = limit - p.y;
            FieldSample {
                density,
                material: if density > 0.0 { 2 } else { 0 },
            }
        }
    }

    #[test]
    fn fully_solid_volume_yields_no_faces() {
        let vol = volume_with(|_| FieldSample {
            density: 1.0,
            material: 1,
        });
        let mesh = extract(&vol, &MesherOptions::default());
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
        assert!(mesh.material_indices.is_empty());
    }

    #[test]
    fn flat_boundary_emits_upward_faces() {
        let vol = volume_with(half_space(4.5));
        let mesh = extract(&vol, &MesherOptions::default());
        assert!(!mesh.is_empty());
        // One horizontal sheet: every face normal points up, away from the
        // solid half below.
        for n in &mesh.normals {
            assert!(n.y > 0.9, "normal {n:?}");
        }
    }

    #[test]
    fn indices_are_valid_and_triangle_aligned() {
        for opts in [
            MesherOptions::default(),
            MesherOptions {
                surface_nets: false,
                collision: true,
                scale: 2.0,
            },
        ] {
            let vol = volume_with(half_space(3.25));
            let mesh = extract(&vol, &opts);
            assert_eq!(mesh.indices.len() % 3, 0);
            assert_eq!(mesh.positions.len(), mesh.normals.len());
            for &i in &mesh.indices {
                assert!((i as usize) < mesh.vertex_count());
            }
        }
    }

    #[test]
    fn material_lists_partition_the_index_buffer() {
        let vol = volume_with(|p| {
            let density = 4.5 - p.y;
            let material = if density <= 0.0 {
                0
            } else if p.x < 5.0 {
                1
            } else {
                3
            };
            FieldSample { density, material }
        });
        let mesh = extract(&vol, &MesherOptions::default());
        assert!(mesh.material_indices.len() >= 2);

        let mut merged: Vec<u32> = mesh
            .material_indices
            .values()
            .flat_map(|v| v.iter().copied())
            .collect();
        merged.sort_unstable();
        let mut full = mesh.indices.clone();
        full.sort_unstable();
        assert_eq!(merged, full);
    }

    #[test]
    fn single_boundary_cell_pair_emits_one_face() {
        // Solid only at lattice point (4,4,4): every adjacent pair with a
        // solidity flip contributes exactly one quad, so six in total.
        let mut vol = ChunkVolume::for_chunk(8, 8, 1);
        vol.generate_with(Vec3::ZERO, |p| {
            let solid = p == Vec3::new(4.0, 4.0, 4.0);
            FieldSample {
                density: if solid { 1.0 } else { -1.0 },
                material: if solid { 2 } else { 0 },
            }
        });
        let mesh = extract(&vol, &MesherOptions::default());
        assert_eq!(mesh.triangle_count(), 12);

        // Outward orientation: each normal points away from the solid point.
        let solid_center = Vec3::new(4.0, 4.0, 4.0);
        for tri in 0..mesh.triangle_count() {
            let v0 = mesh.positions[mesh.indices[tri * 3] as usize];
            let v1 = mesh.positions[mesh.indices[tri * 3 + 1] as usize];
            let v2 = mesh.positions[mesh.indices[tri * 3 + 2] as usize];
            let center = (v0 + v1 + v2) / 3.0;
            let n = mesh.normals[mesh.indices[tri * 3] as usize];
            assert!(
                n.dot(center - solid_center) > 0.0,
                "inward-facing triangle at {center:?}"
            );
        }
    }

    #[test]
    fn collision_soup_mirrors_positions_only_when_enabled() {
        let vol = volume_with(half_space(4.5));
        let without = extract(&vol, &MesherOptions::default());
        assert!(without.collision.is_empty());

        let with = extract(
            &vol,
            &MesherOptions {
                collision: true,
                ..MesherOptions::default()
            },
        );
        assert_eq!(with.collision, with.positions);
    }

    #[test]
    fn block_mode_snaps_vertices_to_cell_centers() {
        let vol = volume_with(half_space(4.5));
        let mesh = extract(
            &vol,
            &MesherOptions {
                surface_nets: false,
                ..MesherOptions::default()
            },
        );
        for p in &mesh.positions {
            assert_eq!(p.x.fract().abs(), 0.5);
            assert_eq!(p.y.fract().abs(), 0.5);
            assert_eq!(p.z.fract().abs(), 0.5);
        }
    }
}
