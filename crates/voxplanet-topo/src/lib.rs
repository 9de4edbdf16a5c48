//! Cube-sphere topology: face selection, the cube-to-sphere mapping, and the
//! face-adjacency table that wraps out-of-bounds face coordinates onto the
//! correct neighboring face for planet-shaped terrain.
#![forbid(unsafe_code)]

use voxplanet_geom::Vec3;

/// One of the six cube faces, identified the way the planet assembles them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Face {
    Front = 0,
    Right = 1,
    Back = 2,
    Left = 3,
    Top = 4,
    Bottom = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Front,
        Face::Right,
        Face::Back,
        Face::Left,
        Face::Top,
        Face::Bottom,
    ];

    /// Outward normal of the face on the unit cube.
    #[inline]
    pub fn normal(self) -> Vec3 {
        match self {
            Face::Front => Vec3::Z,
            Face::Right => Vec3::X,
            Face::Back => -Vec3::Z,
            Face::Left => -Vec3::X,
            Face::Top => Vec3::Y,
            Face::Bottom => -Vec3::Y,
        }
    }

    /// Axis the face-local `u` coordinate runs along.
    #[inline]
    pub fn u_axis(self) -> Vec3 {
        match self {
            Face::Front => Vec3::X,
            Face::Right => -Vec3::Z,
            Face::Back => -Vec3::X,
            Face::Left => Vec3::Z,
            Face::Top => Vec3::X,
            Face::Bottom => Vec3::X,
        }
    }

    /// Axis the face-local `v` coordinate runs along.
    #[inline]
    pub fn v_axis(self) -> Vec3 {
        match self {
            Face::Front | Face::Right | Face::Back | Face::Left => Vec3::Y,
            Face::Top => -Vec3::Z,
            Face::Bottom => Vec3::Z,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Edge a face coordinate leaves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Exit {
    Left,
    Right,
    Up,
    Down,
}

impl Exit {
    pub const ALL: [Exit; 4] = [Exit::Left, Exit::Right, Exit::Up, Exit::Down];
}

/// Coordinate transform applied when crossing onto a neighboring face:
/// optional axis swap, optional mirrors, then a translation.
#[derive(Clone, Copy, Debug, Default)]
pub struct FaceTransform {
    pub swap: bool,
    pub flip_u: bool,
    pub flip_v: bool,
    pub offset_u: i32,
    pub offset_v: i32,
}

impl FaceTransform {
    #[inline]
    pub fn apply(self, mut u: i32, mut v: i32, bounds: i32) -> (i32, i32) {
        if self.swap {
            core::mem::swap(&mut u, &mut v);
        }
        if self.flip_u {
            u = bounds - u - 1;
        }
        if self.flip_v {
            v = bounds - v - 1;
        }
        (u + self.offset_u, v + self.offset_v)
    }
}

/// Neighbor entry: destination face and the transform into its coordinates.
#[derive(Clone, Copy, Debug)]
pub struct Neighbor {
    pub face: Face,
    pub transform: FaceTransform,
}

/// Face-local chunk coordinate, `[0, bounds)` on both axes when in range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FaceCoord {
    pub u: i32,
    pub v: i32,
}

impl FaceCoord {
    #[inline]
    pub const fn new(u: i32, v: i32) -> Self {
        Self { u, v }
    }
}

/// Stateless cube topology for a planet whose faces are `bounds x bounds`
/// chunks (`bounds = 2 * chunk_radius`).
pub struct CubeTopology {
    bounds: i32,
    // Indexed [face][exit].
    neighbors: [[Neighbor; 4]; 6],
}

// Wrapping across a corner needs at most one step per axis; anything deeper
// is a doubly-out-of-bounds corner ray and falls back to clamping.
const MAX_WRAP_STEPS: u32 = 4;

impl CubeTopology {
    pub fn new(chunk_radius: i32) -> Self {
        let bounds = chunk_radius * 2;
        Self {
            bounds,
            neighbors: assemble_neighbors(bounds),
        }
    }

    #[inline]
    pub fn bounds(&self) -> i32 {
        self.bounds
    }

    #[inline]
    pub fn neighbor(&self, face: Face, exit: Exit) -> Neighbor {
        self.neighbors[face.index()][exit as usize]
    }

    /// Routes an out-of-bounds face coordinate onto the proper neighboring
    /// face, applying adjacency transforms until it lands in bounds. A
    /// coordinate that fails to settle (corner rays) is clamped in place.
    pub fn wrap(&self, face: Face, coord: FaceCoord) -> (Face, FaceCoord) {
        let bounds = self.bounds;
        let mut face = face;
        let mut u = coord.u;
        let mut v = coord.v;
        let mut steps = 0u32;

        while u < 0 || u >= bounds || v < 0 || v >= bounds {
            if steps >= MAX_WRAP_STEPS {
                u = u.clamp(0, bounds - 1);
                v = v.clamp(0, bounds - 1);
                break;
            }
            steps += 1;

            let exit = if u < 0 {
                Exit::Left
            } else if u >= bounds {
                Exit::Right
            } else if v < 0 {
                Exit::Down
            } else {
                Exit::Up
            };

            let n = self.neighbor(face, exit);
            let (nu, nv) = n.transform.apply(u, v, bounds);
            face = n.face;
            u = nu;
            v = nv;
        }

        (face, FaceCoord::new(u, v))
    }
}

fn assemble_neighbors(bounds: i32) -> [[Neighbor; 4]; 6] {
    let plain = |face: Face, offset_u: i32, offset_v: i32| Neighbor {
        face,
        transform: FaceTransform {
            offset_u,
            offset_v,
            ..FaceTransform::default()
        },
    };
    let full = |face: Face, swap: bool, flip_u: bool, flip_v: bool, offset_u: i32, offset_v: i32| {
        Neighbor {
            face,
            transform: FaceTransform {
                swap,
                flip_u,
                flip_v,
                offset_u,
                offset_v,
            },
        }
    };
    let b = bounds;

    // Indexed [Left, Right, Up, Down] per face.
    [
        // Front
        [
            plain(Face::Left, b, 0),
            plain(Face::Right, -b, 0),
            plain(Face::Top, 0, -b),
            plain(Face::Bottom, 0, b),
        ],
        // Right
        [
            plain(Face::Front, b, 0),
            plain(Face::Back, -b, 0),
            full(Face::Top, true, true, false, b, 0),
            full(Face::Bottom, true, false, true, b, 0),
        ],
        // Back
        [
            plain(Face::Right, b, 0),
            plain(Face::Left, -b, 0),
            full(Face::Top, false, true, true, 0, b),
            full(Face::Bottom, false, true, true, 0, -b),
        ],
        // Left
        [
            plain(Face::Back, b, 0),
            plain(Face::Front, -b, 0),
            full(Face::Top, true, false, true, -b, 0),
            full(Face::Bottom, true, true, false, -b, 0),
        ],
        // Top
        [
            full(Face::Left, true, true, false, 0, b),
            full(Face::Right, true, false, true, 0, b),
            full(Face::Back, false, true, true, 0, b),
            plain(Face::Front, 0, b),
        ],
        // Bottom
        [
            full(Face::Left, true, false, true, 0, -b),
            full(Face::Right, true, true, false, 0, -b),
            plain(Face::Front, 0, -b),
            full(Face::Back, false, true, true, 0, -b),
        ],
    ]
}

/// Picks the cube face a world-space point projects onto, by dominant axis.
pub fn face_of(p: Vec3) -> Face {
    let a = p.abs();
    if a.x >= a.y && a.x >= a.z {
        if p.x >= 0.0 { Face::Right } else { Face::Left }
    } else if a.y >= a.z {
        if p.y >= 0.0 { Face::Top } else { Face::Bottom }
    } else if p.z >= 0.0 {
        Face::Front
    } else {
        Face::Back
    }
}

/// Maps a face-local position onto the sphere shell.
///
/// `local.x`/`local.z` run along the face plane in world units (`[-radius,
/// radius]` across the face) and `local.y` is the shell height above the
/// nominal surface. Uses the standard cube-to-sphere distribution so chunk
/// spacing stays near-uniform toward face edges.
pub fn cube_to_sphere(local: Vec3, face: Face, radius: f32) -> Vec3 {
    let shell = local.y;
    let u = local.x / radius;
    let v = local.z / radius;

    let c = face.u_axis() * u + face.v_axis() * v + face.normal();

    let (x2, y2, z2) = (c.x * c.x, c.y * c.y, c.z * c.z);
    let s = Vec3::new(
        c.x * (1.0 - y2 / 2.0 - z2 / 2.0 + y2 * z2 / 3.0).sqrt(),
        c.y * (1.0 - z2 / 2.0 - x2 / 2.0 + z2 * x2 / 3.0).sqrt(),
        c.z * (1.0 - x2 / 2.0 - y2 / 2.0 + x2 * y2 / 3.0).sqrt(),
    );

    s * (radius + shell)
}

/// Inverse of the cube-to-sphere distribution for one axis pair. `a`/`b` are
/// components of a unit-sphere point in a face's u/v axes; returns the
/// matching cube-face coordinates in `[-1, 1]`.
/// Adapted from the closed-form inverse at <https://stackoverflow.com/a/2698997>.
fn inverse_spherify(mut a: f32, mut b: f32) -> (f32, f32) {
    const INV_SQRT2: f32 = 0.70710678;

    let a2 = a * a * 2.0;
    let b2 = b * b * 2.0;
    let inner = -a2 + b2 - 3.0;
    let inner_sqrt = -((inner * inner - 12.0 * a2).max(0.0)).sqrt();

    if a != 0.0 {
        let val = (inner_sqrt + a2 - b2 + 3.0).max(0.0);
        a = a.signum() * val.sqrt() * INV_SQRT2;
    }
    if b != 0.0 {
        let val = (inner_sqrt - a2 + b2 + 3.0).max(0.0);
        b = b.signum() * val.sqrt() * INV_SQRT2;
    }

    (a.clamp(-1.0, 1.0), b.clamp(-1.0, 1.0))
}

/// Continuous inverse of [`cube_to_sphere`]: recovers the face-local
/// position (plane x/z in world units, shell height in y) of a world point.
pub fn sphere_to_face_local(world: Vec3, face: Face, radius: f32) -> Vec3 {
    let s = world.normalized();
    let (u, v) = inverse_spherify(s.dot(face.u_axis()), s.dot(face.v_axis()));
    Vec3::new(u * radius, world.length() - radius, v * radius)
}

/// Projects a world-space point to its face-local chunk coordinate.
/// `bounds` is the face width in chunks (`2 * chunk_radius`).
pub fn sphere_to_face_chunk(world: Vec3, face: Face, bounds: i32) -> FaceCoord {
    let s = world.normalized();
    let (u, v) = inverse_spherify(s.dot(face.u_axis()), s.dot(face.v_axis()));

    let to_chunk = |t: f32| {
        let c = ((t + 1.0) * 0.5 * bounds as f32).floor() as i32;
        c.clamp(0, bounds - 1)
    };
    FaceCoord::new(to_chunk(u), to_chunk(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_of_picks_dominant_axis() {
        assert_eq!(face_of(Vec3::new(0.1, 0.2, 5.0)), Face::Front);
        assert_eq!(face_of(Vec3::new(-9.0, 1.0, 2.0)), Face::Left);
        assert_eq!(face_of(Vec3::new(0.0, -3.0, 1.0)), Face::Bottom);
    }

    #[test]
    fn cube_to_sphere_lands_on_shell() {
        let radius = 64.0;
        for face in Face::ALL {
            for (x, z) in [(0.0, 0.0), (30.0, -20.0), (-64.0, 64.0)] {
                let p = cube_to_sphere(Vec3::new(x, 0.0, z), face, radius);
                assert!(
                    (p.length() - radius).abs() < 1e-3 * radius,
                    "face {face:?} ({x},{z}) length {}",
                    p.length()
                );
            }
            let lifted = cube_to_sphere(Vec3::new(10.0, 5.0, 10.0), face, radius);
            assert!((lifted.length() - (radius + 5.0)).abs() < 1e-3 * radius);
        }
    }

    #[test]
    fn face_center_projects_back_to_center_chunk() {
        let bounds = 8;
        for face in Face::ALL {
            let world = face.normal() * 100.0;
            assert_eq!(face_of(world), face);
            let c = sphere_to_face_chunk(world, face, bounds);
            // Center of the face falls on the seam of the middle chunks.
            assert!(c.u == bounds / 2 || c.u == bounds / 2 - 1, "u={}", c.u);
            assert!(c.v == bounds / 2 || c.v == bounds / 2 - 1, "v={}", c.v);
        }
    }

    #[test]
    fn in_bounds_coords_wrap_to_themselves() {
        let topo = CubeTopology::new(4);
        for face in Face::ALL {
            for u in 0..topo.bounds() {
                for v in 0..topo.bounds() {
                    let c = FaceCoord::new(u, v);
                    assert_eq!(topo.wrap(face, c), (face, c));
                }
            }
        }
    }

    #[test]
    fn wrapped_coords_land_in_bounds() {
        let topo = CubeTopology::new(4);
        let b = topo.bounds();
        for face in Face::ALL {
            for (u, v) in [(-1, 3), (b, 3), (3, -1), (3, b), (-1, -1), (b, b)] {
                let (_, c) = topo.wrap(face, FaceCoord::new(u, v));
                assert!((0..b).contains(&c.u) && (0..b).contains(&c.v), "{face:?} ({u},{v}) -> {c:?}");
            }
        }
    }
}
