//! Density field: the pure world-position -> (density, material) function the
//! rest of the terrain pipeline samples. Positive density means solid matter.
#![forbid(unsafe_code)]

use fastnoise_lite::{FastNoiseLite, NoiseType};
use voxplanet_geom::Vec3;
use voxplanet_topo::{Face, cube_to_sphere};

pub mod config;

pub use config::{TerrainConfig, TerrainParams, load_params_from_path};

pub const MAT_AIR: u8 = 0;
pub const MAT_BEDROCK: u8 = 1;
pub const MAT_STONE: u8 = 2;
pub const MAT_SAND: u8 = 3;
pub const MAT_GRASS: u8 = 4;

/// One field evaluation. `material` is `MAT_AIR` exactly when `density <= 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldSample {
    pub density: f32,
    pub material: u8,
}

impl FieldSample {
    pub const EMPTY: FieldSample = FieldSample {
        density: -1.0,
        material: MAT_AIR,
    };
}

/// Octave stack over one noise instance. Built once, read-only afterwards.
struct Fractal {
    noise: FastNoiseLite,
    octaves: u32,
    base_roughness: f32,
    roughness: f32,
    persistence: f32,
    // Sum of all octave amplitudes, bounds |sample| from above.
    amp_sum: f32,
}

impl Fractal {
    fn new(seed: i32, params: &TerrainParams) -> Self {
        let mut noise = FastNoiseLite::with_seed(seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(params.frequency));

        let mut amp_sum = 0.0;
        let mut amp = 1.0;
        for _ in 0..params.octaves {
            amp_sum += amp;
            amp *= params.persistence;
        }

        Self {
            noise,
            octaves: params.octaves,
            base_roughness: params.base_roughness,
            roughness: params.roughness,
            persistence: params.persistence,
            amp_sum,
        }
    }

    #[inline]
    fn amplitude(&self) -> f32 {
        self.amp_sum
    }

    fn sample2(&self, x: f32, z: f32) -> f32 {
        let mut sum = 0.0;
        let mut freq = self.base_roughness;
        let mut amp = 1.0;
        for _ in 0..self.octaves {
            sum += self.noise.get_noise_2d(x * freq, z * freq) * amp;
            freq *= self.roughness;
            amp *= self.persistence;
        }
        sum
    }

    fn sample3(&self, p: Vec3) -> f32 {
        let mut sum = 0.0;
        let mut freq = self.base_roughness;
        let mut amp = 1.0;
        for _ in 0..self.octaves {
            sum += self
                .noise
                .get_noise_3d(p.x * freq, p.y * freq, p.z * freq)
                * amp;
            freq *= self.roughness;
            amp *= self.persistence;
        }
        sum
    }
}

#[inline]
fn band_material(height: f32, params: &TerrainParams) -> u8 {
    if height < params.bedrock_below {
        MAT_BEDROCK
    } else if height < params.stone_below {
        MAT_STONE
    } else if height < params.sand_below {
        MAT_SAND
    } else {
        MAT_GRASS
    }
}

/// Heightmap terrain for flat worlds: a 2D octave surface plus an optional
/// 3D cave layer carved out below `cave_max_y`.
pub struct FlatField {
    params: TerrainParams,
    fractal: Fractal,
    cave: FastNoiseLite,
}

impl FlatField {
    pub fn new(params: TerrainParams) -> Self {
        let fractal = Fractal::new(params.seed, &params);
        let mut cave = FastNoiseLite::with_seed(params.seed ^ 41_337);
        cave.set_noise_type(Some(NoiseType::OpenSimplex2));
        cave.set_frequency(Some(params.cave_frequency));
        Self {
            params,
            fractal,
            cave,
        }
    }

    #[inline]
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// The highest density any world point at height `y` can reach.
    #[inline]
    pub fn density_ceiling(&self, y: f32) -> f32 {
        self.fractal.amplitude() * self.params.strength + self.params.base_height - y
    }

    pub fn sample(&self, world: Vec3) -> FieldSample {
        let p = &self.params;
        // Above the octave ceiling no noise value can turn the point solid,
        // so skip the noise entirely.
        if self.density_ceiling(world.y) <= 0.0 {
            return FieldSample::EMPTY;
        }

        let mut density = self.fractal.sample2(world.x, world.z) * p.strength + p.base_height
            - world.y;

        if p.caves && world.y < p.cave_max_y {
            let carve = self.cave.get_noise_3d(world.x, world.y, world.z) - p.cave_threshold;
            if carve > 0.0 {
                density -= carve * p.cave_strength;
            }
        }

        let material = if density > 0.0 {
            band_material(world.y, p)
        } else {
            MAT_AIR
        };
        FieldSample { density, material }
    }
}

/// Full-3D terrain over a cube-sphere shell for planet worlds. Face-local
/// coordinates are projected to the sphere before the noise is read, so two
/// faces sampling the same world point agree exactly.
pub struct SphereField {
    params: TerrainParams,
    fractal: Fractal,
    // Noise-space scale applied to sphere positions, the chunk width in
    // voxels.
    chunk_size: f32,
}

impl SphereField {
    pub fn new(params: TerrainParams, chunk_size: f32) -> Self {
        let fractal = Fractal::new(params.seed, &params);
        Self {
            params,
            fractal,
            chunk_size,
        }
    }

    #[inline]
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    #[inline]
    pub fn density_ceiling(&self, shell_y: f32) -> f32 {
        self.fractal.amplitude() * self.params.strength + self.params.base_height - shell_y
    }

    /// Samples at a face-local position: `local.x`/`local.z` across the face
    /// plane, `local.y` the shell height. `radius` is the face half-width in
    /// world units.
    pub fn sample(&self, local: Vec3, face: Face, radius: f32) -> FieldSample {
        let p = &self.params;
        if self.density_ceiling(local.y) <= 0.0 {
            return FieldSample::EMPTY;
        }

        let sphere = cube_to_sphere(local, face, radius) * self.chunk_size;
        let density = self.fractal.sample3(sphere) * p.strength + p.base_height - local.y;

        let material = if density > 0.0 {
            band_material(local.y, p)
        } else {
            MAT_AIR
        };
        FieldSample { density, material }
    }
}
