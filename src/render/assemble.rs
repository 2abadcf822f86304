use crate::foundation::core::DeviceRect;
use crate::foundation::error::TesseraError;
use crate::render::buffer::{BufferProvider, Raster};
use crate::render::cache::AssemblyInfo;
use crate::render::cancel::CancelToken;
use crate::render::composite::blit_over;
use crate::render::tile::TileOutcome;

/// Result of assembling one pass.
#[derive(Debug)]
pub(crate) enum AssemblyOutcome {
    /// Every tile was joined. `None` when the output rectangle is empty.
    Complete(Option<Raster>),
    /// The pass or one of its tiles was cancelled. The output buffer was released.
    Cancelled,
    /// The output could not be produced. The output buffer, if any, was released.
    Failed(TesseraError),
}

/// Join every tile of `info` in z-order and composite it onto one output raster.
///
/// Tiles are waited on strictly bottom to top, regardless of which finishes first. A failed
/// tile is logged and skipped; a cancelled tile (or a cancelled pass) aborts the assembly.
pub(crate) fn assemble(
    seq: u64,
    info: &AssemblyInfo,
    out_rect: DeviceRect,
    provider: &dyn BufferProvider,
    cancel: &CancelToken,
) -> AssemblyOutcome {
    if cancel.is_cancelled() {
        return AssemblyOutcome::Cancelled;
    }
    if out_rect.is_empty() {
        return AssemblyOutcome::Complete(None);
    }

    let mut out = match provider.create_output_buffer(out_rect.width, out_rect.height) {
        Ok(r) => r,
        Err(e) => {
            return AssemblyOutcome::Failed(TesseraError::assembly(format!(
                "cannot allocate {}x{} output: {e}",
                out_rect.width, out_rect.height
            )));
        }
    };

    for (block, entry) in info.iter() {
        if cancel.is_cancelled() {
            provider.recycle(out);
            return AssemblyOutcome::Cancelled;
        }
        match entry.handle.wait() {
            TileOutcome::Ready(tile) => {
                let dx = i64::from(entry.bounds.x) - i64::from(out_rect.x);
                let dy = i64::from(entry.bounds.y) - i64::from(out_rect.y);
                if let Err(e) = blit_over(&mut out, &tile, dx, dy) {
                    provider.recycle(out);
                    return AssemblyOutcome::Failed(e);
                }
            }
            TileOutcome::Empty => {}
            TileOutcome::Cancelled => {
                tracing::debug!(seq, %block, "tile cancelled, abandoning assembly");
                provider.recycle(out);
                return AssemblyOutcome::Cancelled;
            }
            TileOutcome::Failed(msg) => {
                tracing::warn!(seq, %block, error = %msg, "tile draw failed, skipping its content");
            }
        }
    }

    AssemblyOutcome::Complete(Some(out))
}

#[cfg(test)]
#[path = "../../tests/unit/render/assemble.rs"]
mod tests;
