//! Chunk volume: the dense density/material lattice one chunk samples its
//! field into, plus the in-place spherical deform edit.
#![forbid(unsafe_code)]

use rayon::prelude::*;
use voxplanet_field::FieldSample;
use voxplanet_geom::Vec3;

mod coord;

pub use coord::ChunkCoord;

/// Deform-time edit rules. Lattice rows below `floor_min_y` are never
/// written, protecting a bottom layer from being dug through.
#[derive(Clone, Copy, Debug)]
pub struct DeformPolicy {
    pub floor_min_y: i32,
}

impl Default for DeformPolicy {
    fn default() -> Self {
        Self { floor_min_y: 0 }
    }
}

/// Dense point lattice for one chunk. Extents are fixed at construction;
/// generation and deform mutate values in place only.
///
/// Layout is x-major (`(x * size_y + y) * size_z + z`) so each x-slab is one
/// contiguous run, which is what the parallel generator splits on.
#[derive(Clone, Debug)]
pub struct ChunkVolume {
    size_x: usize,
    size_y: usize,
    size_z: usize,
    resolution: i32,
    samples: Vec<f32>,
    materials: Vec<u8>,
}

impl ChunkVolume {
    pub fn new(size_x: usize, size_y: usize, size_z: usize, resolution: i32) -> Self {
        let n = size_x * size_y * size_z;
        Self {
            size_x,
            size_y,
            size_z,
            resolution,
            samples: vec![-1.0; n],
            materials: vec![0; n],
        }
    }

    /// Lattice sized for a `chunk_size` x `chunk_height` x `chunk_size`
    /// voxel chunk: one extra point column on each horizontal side so the
    /// mesher can read across chunk seams, one extra row on top.
    pub fn for_chunk(chunk_size: usize, chunk_height: usize, resolution: i32) -> Self {
        Self::new(chunk_size + 2, chunk_height + 1, chunk_size + 2, resolution)
    }

    #[inline]
    pub fn size_x(&self) -> usize {
        self.size_x
    }
    #[inline]
    pub fn size_y(&self) -> usize {
        self.size_y
    }
    #[inline]
    pub fn size_z(&self) -> usize {
        self.size_z
    }
    #[inline]
    pub fn resolution(&self) -> i32 {
        self.resolution
    }

    #[inline]
    fn idx(&self, x: usize, y: usize, z: usize) -> usize {
        (x * self.size_y + y) * self.size_z + z
    }

    #[inline]
    pub fn density(&self, x: usize, y: usize, z: usize) -> f32 {
        self.samples[self.idx(x, y, z)]
    }

    #[inline]
    pub fn material(&self, x: usize, y: usize, z: usize) -> u8 {
        self.materials[self.idx(x, y, z)]
    }

    /// Solidity predicate used everywhere: density exactly 0 counts as air.
    #[inline]
    pub fn solid(&self, x: usize, y: usize, z: usize) -> bool {
        self.density(x, y, z) > 0.0
    }

    /// Fills the lattice by sampling `sampler` at
    /// `origin + (x, y, z) * resolution` for every point.
    pub fn generate_with<F>(&mut self, origin: Vec3, sampler: F)
    where
        F: Fn(Vec3) -> FieldSample,
    {
        let step = self.resolution as f32;
        for x in 0..self.size_x {
            for y in 0..self.size_y {
                for z in 0..self.size_z {
                    let p = origin + Vec3::new(x as f32, y as f32, z as f32) * step;
                    let s = sampler(p);
                    let i = self.idx(x, y, z);
                    self.samples[i] = s.density;
                    self.materials[i] = s.material;
                }
            }
        }
    }

    /// Parallel variant of [`generate_with`](Self::generate_with), splitting
    /// on x-slabs. Lattice points are independent so slabs never overlap.
    pub fn par_generate_with<F>(&mut self, origin: Vec3, sampler: F)
    where
        F: Fn(Vec3) -> FieldSample + Sync,
    {
        let step = self.resolution as f32;
        let (size_y, size_z) = (self.size_y, self.size_z);
        let slab = size_y * size_z;

        self.samples
            .par_chunks_mut(slab)
            .zip(self.materials.par_chunks_mut(slab))
            .enumerate()
            .for_each(|(x, (densities, materials))| {
                for y in 0..size_y {
                    for z in 0..size_z {
                        let p = origin + Vec3::new(x as f32, y as f32, z as f32) * step;
                        let s = sampler(p);
                        let i = y * size_z + z;
                        densities[i] = s.density;
                        materials[i] = s.material;
                    }
                }
            });
    }

    /// Overwrites every lattice point within `radius` of `local_point` with
    /// `delta` density and no material. Points outside the lattice or below
    /// the policy floor are skipped. Returns whether anything was written,
    /// so callers can skip re-meshing untouched volumes.
    pub fn deform(&mut self, local_point: Vec3, radius: i32, delta: f32, policy: &DeformPolicy) -> bool {
        let cx = local_point.x.floor() as i32;
        let cy = local_point.y.floor() as i32;
        let cz = local_point.z.floor() as i32;
        let r2 = radius as i64 * radius as i64;

        let mut changed = false;
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                for dz in -radius..=radius {
                    let d2 = (dx as i64 * dx as i64)
                        + (dy as i64 * dy as i64)
                        + (dz as i64 * dz as i64);
                    if d2 > r2 {
                        continue;
                    }

                    let (vx, vy, vz) = (cx + dx, cy + dy, cz + dz);
                    if vy < policy.floor_min_y {
                        continue;
                    }
                    if vx < 0
                        || vy < 0
                        || vz < 0
                        || vx >= self.size_x as i32
                        || vy >= self.size_y as i32
                        || vz >= self.size_z as i32
                    {
                        continue;
                    }

                    let i = self.idx(vx as usize, vy as usize, vz as usize);
                    self.samples[i] = delta;
                    self.materials[i] = 0;
                    changed = true;
                }
            }
        }
        changed
    }

    pub fn is_fully_solid(&self) -> bool {
        self.samples.iter().all(|&d| d > 0.0)
    }

    pub fn is_fully_empty(&self) -> bool {
        self.samples.iter().all(|&d| d <= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(p: Vec3) -> FieldSample {
        let density = 8.0 - p.y;
        FieldSample {
            density,
            material: if density > 0.0 { 2 } else { 0 },
        }
    }

    #[test]
    fn parallel_generation_matches_serial() {
        let origin = Vec3::new(32.0, 0.0, -16.0);
        let mut serial = ChunkVolume::for_chunk(8, 16, 2);
        let mut parallel = ChunkVolume::for_chunk(8, 16, 2);
        serial.generate_with(origin, gradient);
        parallel.par_generate_with(origin, gradient);

        for x in 0..serial.size_x() {
            for y in 0..serial.size_y() {
                for z in 0..serial.size_z() {
                    assert_eq!(serial.density(x, y, z), parallel.density(x, y, z));
                    assert_eq!(serial.material(x, y, z), parallel.material(x, y, z));
                }
            }
        }
    }

    #[test]
    fn deform_twice_equals_deform_once() {
        let mut once = ChunkVolume::for_chunk(8, 16, 1);
        once.generate_with(Vec3::ZERO, gradient);
        let mut twice = once.clone();

        let p = Vec3::new(4.5, 7.5, 4.5);
        let policy = DeformPolicy::default();
        assert!(once.deform(p, 3, -10.0, &policy));
        assert!(twice.deform(p, 3, -10.0, &policy));
        assert!(twice.deform(p, 3, -10.0, &policy));

        assert_eq!(once.samples, twice.samples);
        assert_eq!(once.materials, twice.materials);
    }

    #[test]
    fn zero_radius_deform_touches_one_point() {
        let mut vol = ChunkVolume::for_chunk(8, 16, 1);
        vol.generate_with(Vec3::ZERO, gradient);
        let before = vol.clone();

        assert!(vol.deform(Vec3::new(5.2, 3.4, 7.1), 0, -10.0, &DeformPolicy::default()));

        let mut touched = Vec::new();
        for x in 0..vol.size_x() {
            for y in 0..vol.size_y() {
                for z in 0..vol.size_z() {
                    if vol.density(x, y, z) != before.density(x, y, z) {
                        touched.push((x, y, z));
                    }
                }
            }
        }
        assert_eq!(touched, vec![(5, 3, 7)]);
        assert_eq!(vol.density(5, 3, 7), -10.0);
        assert_eq!(vol.material(5, 3, 7), 0);
    }

    #[test]
    fn deform_respects_the_floor_policy() {
        let mut vol = ChunkVolume::for_chunk(8, 16, 1);
        vol.generate_with(Vec3::ZERO, gradient);

        let policy = DeformPolicy { floor_min_y: 4 };
        assert!(vol.deform(Vec3::new(4.0, 5.0, 4.0), 2, -10.0, &policy));
        for y in 0..4 {
            for x in 0..vol.size_x() {
                for z in 0..vol.size_z() {
                    assert_ne!(vol.density(x, y, z), -10.0);
                }
            }
        }
        assert_eq!(vol.density(4, 5, 4), -10.0);
    }

    #[test]
    fn deform_missing_the_lattice_reports_no_change() {
        let mut vol = ChunkVolume::for_chunk(8, 16, 1);
        vol.generate_with(Vec3::ZERO, gradient);
        assert!(!vol.deform(Vec3::new(-50.0, 3.0, 3.0), 2, -10.0, &DeformPolicy::default()));
    }

    #[test]
    fn occupancy_helpers_see_the_whole_lattice() {
        let mut vol = ChunkVolume::for_chunk(4, 4, 1);
        vol.generate_with(Vec3::ZERO, |_| FieldSample {
            density: 1.0,
            material: 2,
        });
        assert!(vol.is_fully_solid());
        assert!(!vol.is_fully_empty());

        assert!(vol.deform(Vec3::new(2.0, 2.0, 2.0), 0, -1.0, &DeformPolicy::default()));
        assert!(!vol.is_fully_solid());
    }
}
