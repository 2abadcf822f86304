use crate::foundation::core::DeviceRect;
use crate::foundation::error::{TesseraError, TesseraResult, panic_message};
use crate::render::assemble::{AssemblyOutcome, assemble};
use crate::render::block::{BlockId, CacheableBlock};
use crate::render::buffer::{BufferPool, BufferPoolOpts, BufferProvider, Raster};
use crate::render::cache::AssemblyInfo;
use crate::render::cancel::CancelToken;
use crate::render::draw::{Drawable, root_device_bounds};
use crate::render::executor::{RayonExecutor, TileExecutor};
use crate::render::scheduler::{CancelPolicy, PassQueue, PassState};
use crate::render::tile::{TileHandle, TileOutcome, TileTask};
use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

/// Options for constructing a [`Renderer`].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererOpts {
    /// Which outstanding passes a new or finished pass cancels.
    pub cancel_policy: CancelPolicy,
    /// Tile worker count. `None` uses every available core; larger values are clamped.
    pub worker_threads: Option<usize>,
    /// Raster recycling.
    pub buffer_pool: BufferPoolOpts,
}

impl RendererOpts {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> TesseraResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| TesseraError::serde(format!("parse renderer options: {e}")))
    }

    /// Parse options from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> TesseraResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            TesseraError::io(format!("open renderer options '{}': {e}", path.display()))
        })?;
        serde_json::from_reader(BufReader::new(f)).map_err(|e| {
            TesseraError::serde(format!("parse renderer options '{}': {e}", path.display()))
        })
    }
}

/// Delivered result of one pass.
#[derive(Clone, Debug)]
pub struct RenderComplete {
    /// Sequence number returned by [`Renderer::render`].
    pub seq: u64,
    /// The composited raster; `None` when the root covers no pixels.
    pub raster: Option<Arc<Raster>>,
}

/// Receives completed passes.
///
/// Called on the thread that assembled the pass, outside the renderer lock. Errors and panics
/// are logged and otherwise ignored.
pub trait RenderListener: Send + Sync {
    /// A pass delivered its result.
    fn render_complete(&self, event: &RenderComplete) -> anyhow::Result<()>;
}

impl<F> RenderListener for F
where
    F: Fn(&RenderComplete) -> anyhow::Result<()> + Send + Sync,
{
    fn render_complete(&self, event: &RenderComplete) -> anyhow::Result<()> {
        self(event)
    }
}

/// Registration handle returned by [`Renderer::add_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Lifetime counters of a renderer.
///
/// Every submitted pass ends up counted exactly once as completed, cancelled or failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Calls to [`Renderer::render`].
    pub passes_submitted: u64,
    /// Passes that delivered a notification.
    pub passes_completed: u64,
    /// Passes that were superseded or lost a tile to cancellation.
    pub passes_cancelled: u64,
    /// Passes whose assembly failed.
    pub passes_failed: u64,
    /// Tile tasks created.
    pub tiles_submitted: u64,
    /// Tiles taken from the cache instead of redrawn.
    pub tiles_reused: u64,
}

struct RendererState {
    policy: CancelPolicy,
    passes: PassQueue,
    cache: AssemblyInfo,
    listeners: IndexMap<ListenerId, Arc<dyn RenderListener>>,
    next_listener: u64,
    stats: RenderStats,
    in_flight: usize,
}

struct Shared {
    state: Mutex<RendererState>,
    idle: Condvar,
    executor: Arc<dyn TileExecutor>,
    provider: Arc<dyn BufferProvider>,
}

/// Cache-aware, cancellable tile compositor.
///
/// Each [`Renderer::render`] call is one pass: blocks whose cached tile is still valid are
/// reused, the rest are drawn on the worker pool, and the tiles are composited bottom to top
/// on a dedicated pass thread. A pass that is not cancelled notifies every listener once.
///
/// Cloning is cheap; clones share the cache, queue and listeners.
#[derive(Clone)]
pub struct Renderer {
    inner: Arc<Shared>,
}

impl Renderer {
    /// Renderer with a rayon tile pool and a [`BufferPool`], both configured from `opts`.
    pub fn new(opts: RendererOpts) -> TesseraResult<Self> {
        let executor = RayonExecutor::new(opts.worker_threads)?;
        tracing::debug!(
            threads = executor.threads(),
            policy = ?opts.cancel_policy,
            "renderer created"
        );
        Ok(Self::with_parts(
            opts.cancel_policy,
            Arc::new(executor),
            Arc::new(BufferPool::new(opts.buffer_pool)),
        ))
    }

    /// Renderer over caller-supplied worker pool and buffer provider.
    pub fn with_parts(
        policy: CancelPolicy,
        executor: Arc<dyn TileExecutor>,
        provider: Arc<dyn BufferProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(RendererState {
                    policy,
                    passes: PassQueue::new(),
                    cache: AssemblyInfo::new(),
                    listeners: IndexMap::new(),
                    next_listener: 0,
                    stats: RenderStats::default(),
                    in_flight: 0,
                }),
                idle: Condvar::new(),
                executor,
                provider,
            }),
        }
    }

    /// Start a pass over `blocks` (bottom to top) and return its sequence number.
    ///
    /// The output covers `root`'s device bounds. With at most one block the whole pass runs on
    /// the calling thread before this returns; otherwise tiles go to the worker pool and
    /// assembly runs on a pass thread. Never blocks on drawing in the multi-block case.
    pub fn render(&self, root: &dyn Drawable, blocks: Vec<CacheableBlock>) -> u64 {
        let out_rect = root_device_bounds(root);
        let blocks = dedup_blocks(blocks);
        let inline = blocks.len() <= 1;
        let cancel = CancelToken::new();

        let mut tasks = Vec::new();
        let (seq, info) = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            let seq = st.passes.next_seq();

            let mut info = AssemblyInfo::new();
            let mut reused = 0u64;
            for block in &blocks {
                let cached = st
                    .cache
                    .get(block.id())
                    .filter(|e| !block.is_redraw_needed() && reusable(&e.handle))
                    .map(|e| (e.bounds, e.handle.clone()));
                match cached {
                    Some((bounds, handle)) => {
                        reused += 1;
                        info.put(block.id(), bounds, handle);
                    }
                    None => {
                        let handle = TileHandle::pending();
                        tasks.push(TileTask {
                            block: block.id(),
                            drawables: block.shared_drawables(),
                            rect: block.rect(),
                            provider: Arc::clone(&self.inner.provider),
                            handle: handle.clone(),
                        });
                        info.put(block.id(), block.rect(), handle);
                    }
                }
            }

            st.cache = info.clone();
            if st.policy == CancelPolicy::CancelBeforeExecNewer {
                let swept = st.passes.cancel_outstanding(&st.cache);
                if !swept.is_empty() {
                    tracing::debug!(seq, cancelled = ?swept, "cancelled superseded passes");
                }
            }
            st.stats.passes_submitted += 1;
            st.stats.tiles_submitted += tasks.len() as u64;
            st.stats.tiles_reused += reused;
            let tiles = info.iter().map(|(_, e)| e.handle.clone()).collect();
            st.passes.enqueue(seq, cancel.clone(), tiles);
            st.in_flight += 1;

            tracing::debug!(
                seq,
                blocks = blocks.len(),
                redraw = tasks.len(),
                reused,
                policy = ?st.policy,
                "pass submitted"
            );
            (seq, info)
        };

        let pass = PassRun {
            shared: Arc::clone(&self.inner),
            seq,
            info,
            out_rect,
            cancel,
            retired: false,
        };

        if inline {
            for task in tasks {
                task.run();
            }
            pass.run();
            return seq;
        }

        for task in tasks {
            self.inner.executor.execute(Box::new(move || task.run()));
        }
        let spawned = std::thread::Builder::new()
            .name(format!("tessera-pass-{seq}"))
            .spawn(move || pass.run());
        // On failure the closure, and the pass with it, is dropped and retires as failed.
        if let Err(e) = spawned {
            tracing::warn!(seq, error = %e, "failed to spawn pass thread");
        }
        seq
    }

    /// Current cancellation policy.
    pub fn cancel_policy(&self) -> CancelPolicy {
        self.inner.state.lock().policy
    }

    /// Switch policy. Applies to submissions and retirements from now on.
    pub fn set_cancel_policy(&self, policy: CancelPolicy) {
        let mut st = self.inner.state.lock();
        if st.policy != policy {
            tracing::info!(from = ?st.policy, to = ?policy, "cancel policy changed");
            st.policy = policy;
        }
    }

    /// Register a completion listener. Listeners are notified in registration order.
    pub fn add_listener(&self, listener: impl RenderListener + 'static) -> ListenerId {
        let mut st = self.inner.state.lock();
        let id = ListenerId(st.next_listener);
        st.next_listener += 1;
        st.listeners.insert(id, Arc::new(listener));
        id
    }

    /// Unregister a listener. Returns `false` if `id` was not registered.
    ///
    /// A notification already in progress may still reach the removed listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.state.lock().listeners.shift_remove(&id).is_some()
    }

    /// Block until every pass started so far has finished assembling and notifying.
    ///
    /// Deadlocks if called from a listener.
    pub fn wait_idle(&self) {
        let mut st = self.inner.state.lock();
        while st.in_flight > 0 {
            self.inner.idle.wait(&mut st);
        }
    }

    /// Snapshot of the lifetime counters.
    pub fn stats(&self) -> RenderStats {
        self.inner.state.lock().stats
    }

    /// Outstanding passes in queue order.
    pub fn outstanding_passes(&self) -> Vec<(u64, PassState)> {
        self.inner.state.lock().passes.snapshot()
    }

    /// Block identities in the tile cache, bottom to top.
    pub fn cached_blocks(&self) -> Vec<BlockId> {
        self.inner.state.lock().cache.ids()
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.state.lock();
        f.debug_struct("Renderer")
            .field("policy", &st.policy)
            .field("outstanding", &st.passes.len())
            .field("cached_blocks", &st.cache.len())
            .field("listeners", &st.listeners.len())
            .finish()
    }
}

// A failed or cancelled tile is redrawn even when its block is unchanged.
fn reusable(handle: &TileHandle) -> bool {
    !matches!(
        handle.try_outcome(),
        Some(TileOutcome::Cancelled | TileOutcome::Failed(_))
    )
}

fn dedup_blocks(blocks: Vec<CacheableBlock>) -> Vec<CacheableBlock> {
    let mut seen = HashSet::with_capacity(blocks.len());
    blocks
        .into_iter()
        .filter(|b| {
            let first = seen.insert(b.id());
            if !first {
                tracing::warn!(block = %b.id(), "duplicate block identity in one pass, dropping it");
            }
            first
        })
        .collect()
}

/// Assembly, commit and notification of one pass.
///
/// Dropping it without running (spawn failure, panic) retires the pass as failed. Either way
/// the renderer's in-flight count is released on drop.
struct PassRun {
    shared: Arc<Shared>,
    seq: u64,
    info: AssemblyInfo,
    out_rect: DeviceRect,
    cancel: CancelToken,
    retired: bool,
}

impl PassRun {
    fn run(mut self) {
        let seq = self.seq;
        if !self.shared.state.lock().passes.mark_running(seq) {
            tracing::debug!(seq, "pass swept before assembly started");
        }

        let provider = Arc::clone(&self.shared.provider);
        let (state, raster) = match assemble(
            seq,
            &self.info,
            self.out_rect,
            provider.as_ref(),
            &self.cancel,
        ) {
            AssemblyOutcome::Complete(raster) => (PassState::Completed, raster),
            AssemblyOutcome::Cancelled => (PassState::Cancelled, None),
            AssemblyOutcome::Failed(e) => {
                tracing::warn!(seq, error = %e, "assembly failed, dropping pass");
                (PassState::Failed, None)
            }
        };

        // A newer submission may have cancelled this pass after assembly finished; the check
        // and the retirement share one critical section with submission.
        let (state, listeners) = {
            let mut guard = self.shared.state.lock();
            let st = &mut *guard;
            let state = if state == PassState::Completed && self.cancel.is_cancelled() {
                PassState::Cancelled
            } else {
                state
            };
            let swept = st.passes.retire(seq, state, st.policy, &st.cache);
            self.retired = true;
            if !swept.is_empty() {
                tracing::debug!(seq, cancelled = ?swept, "retirement cancelled older passes");
            }
            record(&mut st.stats, state);
            let listeners: Vec<Arc<dyn RenderListener>> = if state == PassState::Completed {
                st.listeners.values().cloned().collect()
            } else {
                Vec::new()
            };
            (state, listeners)
        };

        if state != PassState::Completed {
            tracing::debug!(seq, ?state, "pass delivers nothing");
            if let Some(r) = raster {
                provider.recycle(r);
            }
            return;
        }

        let event = RenderComplete {
            seq,
            raster: raster.map(Arc::new),
        };
        for listener in &listeners {
            notify(listener.as_ref(), &event);
        }
        tracing::debug!(seq, listeners = listeners.len(), "pass delivered");

        drop(listeners);
        if let Some(Ok(r)) = event.raster.map(Arc::try_unwrap) {
            provider.recycle(r);
        }
    }
}

impl Drop for PassRun {
    fn drop(&mut self) {
        let mut guard = self.shared.state.lock();
        let st = &mut *guard;
        if !self.retired {
            tracing::warn!(seq = self.seq, "pass abandoned before delivery");
            self.cancel.cancel();
            st.passes
                .retire(self.seq, PassState::Failed, st.policy, &st.cache);
            record(&mut st.stats, PassState::Failed);
        }
        st.in_flight -= 1;
        if st.in_flight == 0 {
            self.shared.idle.notify_all();
        }
    }
}

fn record(stats: &mut RenderStats, state: PassState) {
    match state {
        PassState::Completed => stats.passes_completed += 1,
        PassState::Cancelled => stats.passes_cancelled += 1,
        PassState::Failed => stats.passes_failed += 1,
        PassState::Queued | PassState::Running => {}
    }
}

fn notify(listener: &dyn RenderListener, event: &RenderComplete) {
    match std::panic::catch_unwind(AssertUnwindSafe(|| listener.render_complete(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(seq = event.seq, error = %format!("{e:#}"), "listener failed"),
        Err(payload) => tracing::warn!(
            seq = event.seq,
            panic = %panic_message(payload.as_ref()),
            "listener panicked"
        ),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/renderer.rs"]
mod tests;
