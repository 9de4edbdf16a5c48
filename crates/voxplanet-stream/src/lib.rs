//! Chunk streaming: decides which chunks should exist around the observer,
//! owns the active-chunk registry and load queue, and integrates finished
//! generation jobs.
#![forbid(unsafe_code)]

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use voxplanet_chunk::{ChunkCoord, ChunkVolume, DeformPolicy};
use voxplanet_field::{FlatField, SphereField, TerrainParams};
use voxplanet_geom::Vec3;
use voxplanet_mesh::{MeshBuffers, extract};
use voxplanet_runtime::{GenJob, Runtime, WorldField};
use voxplanet_topo::{CubeTopology, FaceCoord, face_of, sphere_to_face_chunk, sphere_to_face_local};

mod plan;

pub use plan::{PlannedChunk, plan_face_rings, plan_flat_rings, world_to_lod};

/// Construction-time validation failures. The streamer refuses to start
/// rather than stream a corrupt world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroChunkSize,
    ZeroChunkHeight,
    ZeroChunkRadius,
    EmptyLodTable,
    NonPositiveLodThreshold(i32),
    ZeroMaxLoads,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroChunkSize => write!(f, "chunk size must be positive"),
            ConfigError::ZeroChunkHeight => write!(f, "chunk height must be positive"),
            ConfigError::ZeroChunkRadius => {
                write!(f, "planet chunk radius must be positive")
            }
            ConfigError::EmptyLodTable => write!(f, "LOD threshold table is empty"),
            ConfigError::NonPositiveLodThreshold(t) => {
                write!(f, "LOD threshold {t} must be positive")
            }
            ConfigError::ZeroMaxLoads => write!(f, "max concurrent loads must be positive"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct StreamerConfig {
    pub chunk_size: usize,
    pub chunk_height: usize,
    /// Planet worlds only: half-width of one cube face, in chunks.
    pub chunk_radius: i32,
    pub lod_thresholds: Vec<i32>,
    /// Generation jobs allowed in flight at once.
    pub max_loads: usize,
    /// Worker threads; 0 sizes from available parallelism.
    pub workers: usize,
    pub surface_nets: bool,
    pub floor_min_y: i32,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            chunk_height: 256,
            chunk_radius: 8,
            lod_thresholds: vec![8, 16, 32, 64],
            max_loads: 4,
            workers: 0,
            surface_nets: true,
            floor_min_y: 0,
        }
    }
}

impl StreamerConfig {
    pub fn validate(&self, planet: bool) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.chunk_height == 0 {
            return Err(ConfigError::ZeroChunkHeight);
        }
        if planet && self.chunk_radius <= 0 {
            return Err(ConfigError::ZeroChunkRadius);
        }
        if self.lod_thresholds.is_empty() {
            return Err(ConfigError::EmptyLodTable);
        }
        if let Some(&t) = self.lod_thresholds.iter().find(|&&t| t <= 0) {
            return Err(ConfigError::NonPositiveLodThreshold(t));
        }
        if self.max_loads == 0 {
            return Err(ConfigError::ZeroMaxLoads);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// Waiting in the load queue.
    Queued,
    /// A generation job is in flight.
    Building,
    /// Volume and mesh are present.
    Ready,
}

/// One live chunk entity, exclusively owned by the registry.
pub struct Chunk {
    pub coord: ChunkCoord,
    /// Bumped on every (re)creation at this coordinate; results carrying an
    /// older revision are discarded at integration.
    pub rev: u64,
    pub state: ChunkState,
    pub collider: bool,
    pub volume: Option<ChunkVolume>,
    pub mesh: Option<MeshBuffers>,
}

struct QueueEntry {
    priority: i64,
    seq: u64,
    coord: ChunkCoord,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.seq.cmp(&other.seq))
    }
}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for QueueEntry {}

#[derive(Clone, Copy, Debug, Default)]
pub struct StreamStats {
    pub active: usize,
    pub ready: usize,
    pub queued: usize,
    pub building: usize,
    pub jobs_queued: usize,
    pub jobs_inflight: usize,
}

// Chunks a boundary edit can spill into, in face-grid offsets. The lattice
// margin means an edit near a chunk edge also lands in up to three
// neighbors.
const DEFORM_NEIGHBORS: [(i32, i32); 9] = [
    (0, 0),
    (1, 0),
    (0, 1),
    (1, 1),
    (-1, 0),
    (0, -1),
    (-1, -1),
    (-1, 1),
    (1, -1),
];

/// Control-thread owner of the whole streaming pipeline. All registry and
/// queue mutation happens through `&mut self` on one thread; workers only
/// ever see immutable field state and their own job buffers.
pub struct ChunkStreamer {
    cfg: StreamerConfig,
    field: Arc<WorldField>,
    runtime: Runtime,
    topo: Option<CubeTopology>,
    chunks: HashMap<ChunkCoord, Chunk>,
    queue: BinaryHeap<Reverse<QueueEntry>>,
    policy: DeformPolicy,
    outstanding: usize,
    next_rev: u64,
    next_job: u64,
    next_seq: u64,
}

impl ChunkStreamer {
    pub fn flat(cfg: StreamerConfig, params: TerrainParams) -> Result<Self, Box<dyn Error>> {
        cfg.validate(false)?;
        let field = Arc::new(WorldField::flat(
            FlatField::new(params),
            cfg.chunk_size,
            cfg.chunk_height,
            cfg.surface_nets,
        ));
        Self::with_field(cfg, field, None)
    }

    pub fn planet(cfg: StreamerConfig, params: TerrainParams) -> Result<Self, Box<dyn Error>> {
        cfg.validate(true)?;
        let field = Arc::new(WorldField::sphere(
            SphereField::new(params, cfg.chunk_size as f32),
            cfg.chunk_size,
            cfg.chunk_height,
            cfg.chunk_radius,
            cfg.surface_nets,
        ));
        let topo = CubeTopology::new(cfg.chunk_radius);
        Self::with_field(cfg, field, Some(topo))
    }

    fn with_field(
        cfg: StreamerConfig,
        field: Arc<WorldField>,
        topo: Option<CubeTopology>,
    ) -> Result<Self, Box<dyn Error>> {
        let runtime = Runtime::new(field.clone(), cfg.workers)?;
        let policy = DeformPolicy {
            floor_min_y: cfg.floor_min_y,
        };
        Ok(Self {
            cfg,
            field,
            runtime,
            topo,
            chunks: HashMap::new(),
            queue: BinaryHeap::new(),
            policy,
            outstanding: 0,
            next_rev: 1,
            next_job: 1,
            next_seq: 0,
        })
    }

    pub fn set_deform_policy(&mut self, policy: DeformPolicy) {
        self.policy = policy;
    }

    /// One streaming tick: recompute the needed set around `observer`,
    /// create/destroy chunks, feed the scheduler, and integrate finished
    /// jobs. Returns coordinates whose mesh changed this tick.
    pub fn update(&mut self, observer: Vec3) -> Vec<ChunkCoord> {
        self.retarget(observer);
        self.pump();
        self.integrate()
    }

    fn retarget(&mut self, observer: Vec3) {
        let planned = match &self.topo {
            None => plan_flat_rings(observer, self.cfg.chunk_size as i32, &self.cfg.lod_thresholds),
            Some(topo) => plan_face_rings(observer, topo, &self.cfg.lod_thresholds),
        };

        let mut needed: HashSet<ChunkCoord> = HashSet::with_capacity(planned.len());
        for p in &planned {
            needed.insert(p.coord);
            if self.chunks.contains_key(&p.coord) {
                continue;
            }
            let rev = self.next_rev;
            self.next_rev += 1;
            self.chunks.insert(
                p.coord,
                Chunk {
                    coord: p.coord,
                    rev,
                    state: ChunkState::Queued,
                    collider: p.collider,
                    volume: None,
                    mesh: None,
                },
            );
            let seq = self.next_seq;
            self.next_seq += 1;
            self.queue.push(Reverse(QueueEntry {
                priority: p.priority,
                seq,
                coord: p.coord,
            }));
        }

        // Immediate teardown of anything outside the rings; in-flight jobs
        // for these become stale results.
        let stale: Vec<ChunkCoord> = self
            .chunks
            .keys()
            .filter(|c| !needed.contains(*c))
            .copied()
            .collect();
        for coord in stale {
            self.chunks.remove(&coord);
            log::debug!(target: "stream", "unload {coord}");
        }
    }

    fn pump(&mut self) {
        while self.outstanding < self.cfg.max_loads {
            let Some(Reverse(entry)) = self.queue.pop() else {
                break;
            };
            // Entries outlive their chunks; only a still-queued chunk may
            // start a job.
            let Some(chunk) = self.chunks.get_mut(&entry.coord) else {
                continue;
            };
            if chunk.state != ChunkState::Queued {
                continue;
            }
            chunk.state = ChunkState::Building;
            let job_id = self.next_job;
            self.next_job += 1;
            self.runtime.submit(GenJob {
                coord: entry.coord,
                rev: chunk.rev,
                job_id,
                collider: chunk.collider,
            });
            self.outstanding += 1;
        }
    }

    fn integrate(&mut self) -> Vec<ChunkCoord> {
        let mut updates = Vec::new();
        for out in self.runtime.drain_results() {
            self.outstanding = self.outstanding.saturating_sub(1);
            match self.chunks.get_mut(&out.coord) {
                Some(chunk) if chunk.rev == out.rev => {
                    chunk.volume = Some(out.volume);
                    chunk.mesh = Some(out.mesh);
                    chunk.state = ChunkState::Ready;
                    updates.push(out.coord);
                }
                _ => {
                    log::debug!(target: "stream", "discard stale result {}", out.coord);
                }
            }
        }
        updates
    }

    /// Carves (or fills) a sphere of `radius` lattice points around
    /// `world_point`, re-extracting every touched chunk synchronously.
    /// Returns the coordinates whose mesh was replaced.
    ///
    /// Only `Ready` chunks are edited: a target still queued or building has
    /// no volume yet and the edit is dropped for it, not deferred.
    pub fn apply_deform(&mut self, world_point: Vec3, radius: i32, delta: f32) -> Vec<ChunkCoord> {
        let targets: Vec<(ChunkCoord, Vec3)> = match &self.topo {
            None => {
                let (bx, bz) = world_to_lod(world_point, self.cfg.chunk_size as i32, 1);
                DEFORM_NEIGHBORS
                    .iter()
                    .map(|&(ox, oz)| (ChunkCoord::flat(bx + ox, bz + oz, 1), world_point))
                    .collect()
            }
            Some(topo) => {
                let face = face_of(world_point);
                let center = sphere_to_face_chunk(world_point, face, topo.bounds());
                let face_radius = (self.cfg.chunk_radius * self.cfg.chunk_size as i32) as f32;
                DEFORM_NEIGHBORS
                    .iter()
                    .map(|&(ou, ov)| {
                        let (wface, wc) =
                            topo.wrap(face, FaceCoord::new(center.u + ou, center.v + ov));
                        let local = sphere_to_face_local(world_point, wface, face_radius);
                        (ChunkCoord::face(wface, wc.u, wc.v, 1), local)
                    })
                    .collect()
            }
        };

        let mut updated: Vec<ChunkCoord> = Vec::new();
        for (coord, point) in targets {
            // Wrapping can fold two offsets onto the same chunk near face
            // corners.
            if updated.contains(&coord) {
                continue;
            }
            if self.deform_chunk(coord, point, radius, delta) {
                updated.push(coord);
            }
        }
        updated
    }

    /// `point` is in the chunk's sampling space (world space for flat
    /// worlds, face-local for planet faces).
    fn deform_chunk(&mut self, coord: ChunkCoord, point: Vec3, radius: i32, delta: f32) -> bool {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return false;
        };
        // Only a settled chunk may be edited; a building chunk's volume is
        // still owned by its worker.
        let Some(volume) = chunk.volume.as_mut() else {
            return false;
        };

        let origin = coord.origin(self.cfg.chunk_size as i32, self.cfg.chunk_radius);
        let local = point - origin;
        if !volume.deform(local, radius, delta, &self.policy) {
            return false;
        }

        let opts = self.field.mesher_options(coord, chunk.collider);
        chunk.mesh = Some(extract(volume, &opts));
        log::debug!(target: "stream", "deform re-mesh {coord}");
        true
    }

    #[inline]
    pub fn chunk(&self, coord: &ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(coord)
    }

    #[inline]
    pub fn mesh(&self, coord: &ChunkCoord) -> Option<&MeshBuffers> {
        self.chunks.get(coord).and_then(|c| c.mesh.as_ref())
    }

    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    pub fn stats(&self) -> StreamStats {
        let mut s = StreamStats {
            active: self.chunks.len(),
            ..StreamStats::default()
        };
        for c in self.chunks.values() {
            match c.state {
                ChunkState::Queued => s.queued += 1,
                ChunkState::Building => s.building += 1,
                ChunkState::Ready => s.ready += 1,
            }
        }
        let (jq, ji) = self.runtime.queue_counts();
        s.jobs_queued = jq;
        s.jobs_inflight = ji;
        s
    }

    pub fn all_ready(&self) -> bool {
        self.chunks.values().all(|c| c.state == ChunkState::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation_fails_fast() {
        let ok = StreamerConfig::default();
        assert!(ok.validate(false).is_ok());
        assert!(ok.validate(true).is_ok());

        let mut bad = StreamerConfig::default();
        bad.chunk_size = 0;
        assert_eq!(bad.validate(false), Err(ConfigError::ZeroChunkSize));

        let mut bad = StreamerConfig::default();
        bad.lod_thresholds.clear();
        assert_eq!(bad.validate(false), Err(ConfigError::EmptyLodTable));

        let mut bad = StreamerConfig::default();
        bad.lod_thresholds = vec![8, -1];
        assert_eq!(
            bad.validate(false),
            Err(ConfigError::NonPositiveLodThreshold(-1))
        );

        let mut bad = StreamerConfig::default();
        bad.max_loads = 0;
        assert_eq!(bad.validate(false), Err(ConfigError::ZeroMaxLoads));

        let mut bad = StreamerConfig::default();
        bad.chunk_radius = 0;
        assert!(bad.validate(false).is_ok());
        assert_eq!(bad.validate(true), Err(ConfigError::ZeroChunkRadius));
    }

    #[test]
    fn queue_orders_by_priority_then_arrival() {
        let mut heap = BinaryHeap::new();
        for (priority, seq) in [(1000, 0), (3, 1), (3, 2), (7, 3)] {
            heap.push(Reverse(QueueEntry {
                priority,
                seq,
                coord: ChunkCoord::flat(0, 0, 1),
            }));
        }
        let order: Vec<(i64, u64)> = std::iter::from_fn(|| heap.pop())
            .map(|Reverse(e)| (e.priority, e.seq))
            .collect();
        assert_eq!(order, vec![(3, 1), (3, 2), (7, 3), (1000, 0)]);
    }
}
