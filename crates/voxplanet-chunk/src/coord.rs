use std::fmt;

use voxplanet_geom::Vec3;
use voxplanet_topo::Face;

/// Position and LOD of one chunk. Two chunks at the same grid cell but
/// different resolutions are distinct entities, so `resolution` takes part
/// in equality and hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkCoord {
    Flat {
        x: i32,
        z: i32,
        resolution: i32,
    },
    Face {
        face: Face,
        u: i32,
        v: i32,
        resolution: i32,
    },
}

impl ChunkCoord {
    #[inline]
    pub const fn flat(x: i32, z: i32, resolution: i32) -> Self {
        ChunkCoord::Flat { x, z, resolution }
    }

    #[inline]
    pub const fn face(face: Face, u: i32, v: i32, resolution: i32) -> Self {
        ChunkCoord::Face {
            face,
            u,
            v,
            resolution,
        }
    }

    #[inline]
    pub fn resolution(&self) -> i32 {
        match *self {
            ChunkCoord::Flat { resolution, .. } | ChunkCoord::Face { resolution, .. } => resolution,
        }
    }

    /// Sampling-space origin of the chunk. Flat chunks sit on a world grid;
    /// face chunks sit on a face-local grid centered on the face
    /// (`chunk_radius` chunks on each side of the face center).
    pub fn origin(&self, chunk_size: i32, chunk_radius: i32) -> Vec3 {
        match *self {
            ChunkCoord::Flat { x, z, resolution } => Vec3::new(
                (x * chunk_size * resolution) as f32,
                0.0,
                (z * chunk_size * resolution) as f32,
            ),
            ChunkCoord::Face {
                u, v, resolution, ..
            } => Vec3::new(
                ((u - chunk_radius) * chunk_size * resolution) as f32,
                0.0,
                ((v - chunk_radius) * chunk_size * resolution) as f32,
            ),
        }
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ChunkCoord::Flat { x, z, resolution } => write!(f, "flat({x},{z})@{resolution}"),
            ChunkCoord::Face {
                face,
                u,
                v,
                resolution,
            } => write!(f, "{face:?}({u},{v})@{resolution}"),
        }
    }
}
