use crate::foundation::error::{TesseraError, TesseraResult};

/// A job submitted to a [`TileExecutor`].
pub type TileJob = Box<dyn FnOnce() + Send + 'static>;

/// Where tile render tasks run.
pub trait TileExecutor: Send + Sync {
    /// Schedule `job`. Must not block on the job's completion.
    fn execute(&self, job: TileJob);
}

/// Bounded rayon thread pool: the default worker pool for tiles.
pub struct RayonExecutor {
    pool: rayon::ThreadPool,
}

impl RayonExecutor {
    /// Build a pool with `threads` workers, clamped to `1..=available_parallelism`.
    /// `None` uses all available cores.
    pub fn new(threads: Option<usize>) -> TesseraResult<Self> {
        Ok(Self {
            pool: build_thread_pool(threads)?,
        })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl TileExecutor for RayonExecutor {
    fn execute(&self, job: TileJob) {
        self.pool.spawn(job);
    }
}

/// Runs every job on the submitting thread, before `execute` returns.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl TileExecutor for InlineExecutor {
    fn execute(&self, job: TileJob) {
        job();
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn build_thread_pool(threads: Option<usize>) -> TesseraResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(TesseraError::validation(
            "renderer 'worker_threads' must be >= 1 when set",
        ));
    }

    let max = available_parallelism();
    let n = threads.map_or(max, |n| n.min(max));
    rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .thread_name(|i| format!("tessera-tile-{i}"))
        .build()
        .map_err(|e| TesseraError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}
