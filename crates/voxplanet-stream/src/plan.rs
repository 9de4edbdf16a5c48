use voxplanet_chunk::ChunkCoord;
use voxplanet_geom::Vec3;
use voxplanet_topo::{CubeTopology, FaceCoord, face_of, sphere_to_face_chunk};

/// One coordinate the streamer wants active, with its load priority.
/// Lower priority loads first; the tier term dominates so coarse rings
/// never preempt fine ones.
#[derive(Clone, Copy, Debug)]
pub struct PlannedChunk {
    pub coord: ChunkCoord,
    pub priority: i64,
    pub collider: bool,
}

/// Chunk cell of a world position at the given LOD resolution.
pub fn world_to_lod(position: Vec3, chunk_size: i32, resolution: i32) -> (i32, i32) {
    let scale = (chunk_size * resolution) as f32;
    (
        (position.x / scale).floor() as i32,
        (position.z / scale).floor() as i32,
    )
}

#[inline]
fn ring_priority(tier: usize, dx: i32, dz: i32) -> i64 {
    let distance = ((dx * dx + dz * dz) as f32).sqrt() + 0.1;
    tier as i64 * 1000 + distance as i64
}

/// Concentric square LOD rings around the observer for a flat world.
///
/// Tier `i` runs at resolution `2^i` over its own chunk grid and covers
/// Chebyshev radii `[inner, inner + thresholds[i]]`, where each tier's inner
/// edge is the previous outer edge rescaled into the coarser grid. Only the
/// finest tier gets colliders.
pub fn plan_flat_rings(observer: Vec3, chunk_size: i32, thresholds: &[i32]) -> Vec<PlannedChunk> {
    let mut out = Vec::new();
    let mut inner = 0i32;

    for (tier, &threshold) in thresholds.iter().enumerate() {
        let resolution = 1i32 << tier;
        let outer = inner + threshold;
        let (px, pz) = world_to_lod(observer, chunk_size, resolution);

        for dx in -outer..=outer {
            for dz in -outer..=outer {
                if dx.abs().max(dz.abs()) < inner {
                    continue;
                }
                out.push(PlannedChunk {
                    coord: ChunkCoord::flat(px + dx, pz + dz, resolution),
                    priority: ring_priority(tier, dx, dz),
                    collider: tier == 0,
                });
            }
        }

        inner = outer / 2;
    }

    out
}

/// Needed set for a planet world: rings on the observer's cube face, with
/// out-of-bounds coordinates wrapped onto neighboring faces. All tiers share
/// the face chunk grid; the ring distance picks the resolution.
pub fn plan_face_rings(
    observer: Vec3,
    topo: &CubeTopology,
    thresholds: &[i32],
) -> Vec<PlannedChunk> {
    let face = face_of(observer);
    let center = sphere_to_face_chunk(observer, face, topo.bounds());

    let mut out = Vec::new();
    let view = thresholds[0];
    for r in 0..view {
        for du in -r..=r {
            for dv in -r..=r {
                if du.abs().max(dv.abs()) != r {
                    continue;
                }

                let (wface, wcoord) =
                    topo.wrap(face, FaceCoord::new(center.u + du, center.v + dv));
                let tier = lod_index(r, thresholds);
                out.push(PlannedChunk {
                    coord: ChunkCoord::face(wface, wcoord.u, wcoord.v, 1 << tier),
                    priority: ring_priority(tier, du, dv),
                    collider: tier == 0,
                });
            }
        }
    }

    out
}

fn lod_index(distance: i32, thresholds: &[i32]) -> usize {
    for (i, &t) in thresholds.iter().enumerate() {
        if distance <= t {
            return i;
        }
    }
    thresholds.len()
}
