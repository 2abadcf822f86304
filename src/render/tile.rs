use crate::foundation::core::DeviceRect;
use crate::foundation::error::{TesseraError, panic_message};
use crate::render::block::BlockId;
use crate::render::buffer::{BufferProvider, Raster};
use crate::render::cancel::CancelToken;
use crate::render::draw::{DrawContext, Drawable};
use parking_lot::{Condvar, Mutex};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Final state of one tile.
#[derive(Clone, Debug)]
pub enum TileOutcome {
    /// The block was fully drawn.
    Ready(Arc<Raster>),
    /// The block covers no pixels; nothing to composite.
    Empty,
    /// Cancellation was observed before the block finished. No partial content is kept.
    Cancelled,
    /// A drawable failed (error or panic).
    Failed(Arc<str>),
}

impl TileOutcome {
    /// `true` for [`TileOutcome::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

struct TileSlot {
    outcome: Mutex<Option<TileOutcome>>,
    done: Condvar,
    cancel: CancelToken,
}

/// Shared handle to a tile that will become ready, fail, or be cancelled.
///
/// Clones refer to the same tile; the tile cache and every pass assembling it hold one.
#[derive(Clone)]
pub struct TileHandle(Arc<TileSlot>);

impl TileHandle {
    pub(crate) fn pending() -> Self {
        Self(Arc::new(TileSlot {
            outcome: Mutex::new(None),
            done: Condvar::new(),
            cancel: CancelToken::new(),
        }))
    }

    /// A handle that is already complete.
    pub fn completed(outcome: TileOutcome) -> Self {
        let h = Self::pending();
        h.complete(outcome);
        h
    }

    /// Request cancellation of the tile. Returns `true` if this call flipped the flag.
    ///
    /// A tile that already finished keeps its outcome.
    pub fn cancel(&self) -> bool {
        self.0.cancel.cancel()
    }

    pub(crate) fn cancel_token(&self) -> CancelToken {
        self.0.cancel.clone()
    }

    /// Whether the tile has reached a final state.
    pub fn is_done(&self) -> bool {
        self.0.outcome.lock().is_some()
    }

    /// The outcome, if the tile has finished.
    pub fn try_outcome(&self) -> Option<TileOutcome> {
        self.0.outcome.lock().clone()
    }

    /// Block until the tile finishes.
    pub fn wait(&self) -> TileOutcome {
        let mut guard = self.0.outcome.lock();
        loop {
            if let Some(outcome) = guard.as_ref() {
                return outcome.clone();
            }
            self.0.done.wait(&mut guard);
        }
    }

    /// Both handles refer to the same tile.
    pub fn same_tile(&self, other: &TileHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// First completion wins; later ones are ignored.
    pub(crate) fn complete(&self, outcome: TileOutcome) {
        let mut guard = self.0.outcome.lock();
        if guard.is_none() {
            *guard = Some(outcome);
            self.0.done.notify_all();
        }
    }
}

impl std::fmt::Debug for TileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileHandle")
            .field("done", &self.is_done())
            .field("cancel_requested", &self.0.cancel.is_cancelled())
            .finish()
    }
}

/// One unit of parallel work: draw a block onto its own buffer.
pub(crate) struct TileTask {
    pub(crate) block: BlockId,
    pub(crate) drawables: Arc<[Arc<dyn Drawable>]>,
    pub(crate) rect: DeviceRect,
    pub(crate) provider: Arc<dyn BufferProvider>,
    pub(crate) handle: TileHandle,
}

impl TileTask {
    pub(crate) fn run(self) {
        let cancel = self.handle.cancel_token();
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            render_tile(&self.drawables, self.rect, self.provider.as_ref(), &cancel)
        }))
        .unwrap_or_else(|payload| {
            let msg = panic_message(payload.as_ref());
            TileOutcome::Failed(
                TesseraError::draw(format!("drawable panicked: {msg}"))
                    .to_string()
                    .into(),
            )
        });
        tracing::trace!(block = %self.block, ?outcome, "tile finished");
        self.handle.complete(outcome);
    }
}

// An executor that drops a task unrun must not leave its handle pending forever.
impl Drop for TileTask {
    fn drop(&mut self) {
        self.handle
            .complete(TileOutcome::Failed("tile task dropped before running".into()));
    }
}

/// Draw `drawables` in order onto a fresh transparent buffer covering `rect`.
///
/// `cancel` is polled before each drawable. On cancellation or failure the buffer goes back
/// to `provider` and no partial content is returned.
pub fn render_tile(
    drawables: &[Arc<dyn Drawable>],
    rect: DeviceRect,
    provider: &dyn BufferProvider,
    cancel: &CancelToken,
) -> TileOutcome {
    if cancel.is_cancelled() {
        return TileOutcome::Cancelled;
    }
    if rect.is_empty() {
        return TileOutcome::Empty;
    }

    let mut raster = match provider.create_transparent_buffer(rect.width, rect.height) {
        Ok(r) => r,
        Err(e) => return TileOutcome::Failed(e.to_string().into()),
    };

    // Raster construction already bounded both dimensions to u16.
    let mut ctx = vello_cpu::RenderContext::new(raster.width() as u16, raster.height() as u16);
    {
        let mut dc = DrawContext::new(&mut ctx, rect);
        for (i, d) in drawables.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::debug!(drawn = i, total = drawables.len(), "tile cancelled mid-block");
                provider.recycle(raster);
                return TileOutcome::Cancelled;
            }
            if let Err(e) = d.draw(&mut dc) {
                provider.recycle(raster);
                return TileOutcome::Failed(TesseraError::draw(format!("{e:#}")).to_string().into());
            }
        }
    }
    ctx.flush();
    ctx.render_to_pixmap(raster.pixmap_mut());
    TileOutcome::Ready(Arc::new(raster))
}

#[cfg(test)]
#[path = "../../tests/unit/render/tile.rs"]
mod tests;
