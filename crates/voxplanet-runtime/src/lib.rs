//! Generation scheduler: a bounded worker pool that samples chunk volumes,
//! extracts their meshes, and hands results back over a channel drained by
//! the control thread.
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use voxplanet_chunk::{ChunkCoord, ChunkVolume};
use voxplanet_field::{FlatField, SphereField};
use voxplanet_mesh::{MeshBuffers, MesherOptions, extract};

/// The world's sampling surface plus the chunk dimensions every job shares.
/// Immutable after construction and shared read-only across all workers.
pub struct WorldField {
    kind: FieldKind,
    chunk_size: usize,
    chunk_height: usize,
    chunk_radius: i32,
    surface_nets: bool,
}

enum FieldKind {
    Flat(FlatField),
    Sphere(SphereField),
}

impl WorldField {
    pub fn flat(field: FlatField, chunk_size: usize, chunk_height: usize, surface_nets: bool) -> Self {
        Self {
            kind: FieldKind::Flat(field),
            chunk_size,
            chunk_height,
            chunk_radius: 0,
            surface_nets,
        }
    }

    pub fn sphere(
        field: SphereField,
        chunk_size: usize,
        chunk_height: usize,
        chunk_radius: i32,
        surface_nets: bool,
    ) -> Self {
        Self {
            kind: FieldKind::Sphere(field),
            chunk_size,
            chunk_height,
            chunk_radius,
            surface_nets,
        }
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn chunk_height(&self) -> usize {
        self.chunk_height
    }

    #[inline]
    pub fn chunk_radius(&self) -> i32 {
        self.chunk_radius
    }

    #[inline]
    pub fn surface_nets(&self) -> bool {
        self.surface_nets
    }

    /// Samples a full volume for `coord`. Pure with respect to shared state,
    /// safe to run from any worker.
    pub fn generate(&self, coord: ChunkCoord) -> ChunkVolume {
        let mut volume =
            ChunkVolume::for_chunk(self.chunk_size, self.chunk_height, coord.resolution());
        let origin = coord.origin(self.chunk_size as i32, self.chunk_radius);
        match (&self.kind, coord) {
            (FieldKind::Flat(field), _) => {
                volume.par_generate_with(origin, |p| field.sample(p));
            }
            (FieldKind::Sphere(field), ChunkCoord::Face { face, .. }) => {
                let radius = (self.chunk_radius * self.chunk_size as i32) as f32;
                volume.par_generate_with(origin, |p| field.sample(p, face, radius));
            }
            // A flat coordinate on a sphere world samples nothing solid.
            (FieldKind::Sphere(_), ChunkCoord::Flat { .. }) => {}
        }
        volume
    }

    pub fn mesher_options(&self, coord: ChunkCoord, collider: bool) -> MesherOptions {
        MesherOptions {
            surface_nets: self.surface_nets,
            collision: collider,
            scale: coord.resolution() as f32,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GenJob {
    pub coord: ChunkCoord,
    /// Revision of the chunk this job was queued for; integration drops
    /// results whose revision no longer matches.
    pub rev: u64,
    pub job_id: u64,
    pub collider: bool,
}

pub struct JobOut {
    pub coord: ChunkCoord,
    pub rev: u64,
    pub job_id: u64,
    pub volume: ChunkVolume,
    pub mesh: MeshBuffers,
    pub t_gen_ms: u32,
    pub t_mesh_ms: u32,
}

fn process_gen_job(job: GenJob, field: &WorldField, tx: &Sender<JobOut>) {
    let t0 = Instant::now();
    let volume = field.generate(job.coord);
    let t_gen_ms = t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;

    let opts = field.mesher_options(job.coord, job.collider);
    let t0 = Instant::now();
    let mesh = extract(&volume, &opts);
    let t_mesh_ms = t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;

    log::trace!(
        target: "runtime",
        "built {} tris={} gen={}ms mesh={}ms",
        job.coord,
        mesh.triangle_count(),
        t_gen_ms,
        t_mesh_ms
    );

    // The control thread may already be gone during shutdown.
    let _ = tx.send(JobOut {
        coord: job.coord,
        rev: job.rev,
        job_id: job.job_id,
        volume,
        mesh,
        t_gen_ms,
        t_mesh_ms,
    });
}

/// Worker-pool front end. Submission never blocks; completed jobs are
/// collected with [`drain_results`](Runtime::drain_results) once per tick.
pub struct Runtime {
    job_tx: Sender<GenJob>,
    res_rx: Receiver<JobOut>,
    _pool: Arc<ThreadPool>,
    queued: Arc<AtomicUsize>,
    inflight: Arc<AtomicUsize>,
    pub workers: usize,
}

impl Runtime {
    /// `workers == 0` sizes the pool from available parallelism.
    pub fn new(field: Arc<WorldField>, workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let (job_tx, job_rx) = unbounded::<GenJob>();
        let (res_tx, res_rx) = unbounded::<JobOut>();

        let workers = if workers > 0 {
            workers
        } else {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        };

        let queued = Arc::new(AtomicUsize::new(0));
        let inflight = Arc::new(AtomicUsize::new(0));

        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("voxplanet-gen-{i}"))
                .build()?,
        );
        // Every pool thread hosts one recv loop, so a job's slab-parallel
        // volume sampling has no idle threads to steal onto and runs on its
        // own worker. Parallelism here is across jobs, not within one.
        for _ in 0..workers {
            let rx = job_rx.clone();
            let tx = res_tx.clone();
            let field = field.clone();
            let queued = queued.clone();
            let inflight = inflight.clone();
            pool.spawn(move || {
                while let Ok(job) = rx.recv() {
                    queued.fetch_sub(1, Ordering::Relaxed);
                    inflight.fetch_add(1, Ordering::Relaxed);
                    process_gen_job(job, field.as_ref(), &tx);
                    inflight.fetch_sub(1, Ordering::Relaxed);
                }
            });
        }

        Ok(Self {
            job_tx,
            res_rx,
            _pool: pool,
            queued,
            inflight,
            workers,
        })
    }

    pub fn submit(&self, job: GenJob) {
        self.queued.fetch_add(1, Ordering::Relaxed);
        if self.job_tx.send(job).is_err() {
            self.queued.fetch_sub(1, Ordering::Relaxed);
        }
    }

    pub fn drain_results(&self) -> Vec<JobOut> {
        self.res_rx.try_iter().collect()
    }

    pub fn queue_counts(&self) -> (usize, usize) {
        (
            self.queued.load(Ordering::Relaxed),
            self.inflight.load(Ordering::Relaxed),
        )
    }
}
