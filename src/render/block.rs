use crate::foundation::core::DeviceRect;
use crate::render::draw::{Drawable, device_bounds};
use std::sync::Arc;

/// Stable identity of a cacheable block across passes.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct BlockId(pub u64);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// An ordered (bottom to top) group of drawables rendered onto one tile.
///
/// Immutable once constructed. The device rectangle is computed once, here.
#[derive(Clone)]
pub struct CacheableBlock {
    id: BlockId,
    drawables: Arc<[Arc<dyn Drawable>]>,
    rect: DeviceRect,
}

impl CacheableBlock {
    /// Group `drawables` under `id`; the tile rectangle encloses all of them.
    pub fn new(id: BlockId, drawables: Vec<Arc<dyn Drawable>>) -> Self {
        let rect = drawables
            .iter()
            .map(|d| device_bounds(d.as_ref()))
            .fold(DeviceRect::default(), DeviceRect::union);
        Self::with_rect(id, drawables, rect)
    }

    /// Group `drawables` under `id` with an explicit tile rectangle.
    pub fn with_rect(id: BlockId, drawables: Vec<Arc<dyn Drawable>>, rect: DeviceRect) -> Self {
        Self {
            id,
            drawables: drawables.into(),
            rect,
        }
    }

    /// Block identity.
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Device rectangle covered by the block's tile.
    pub fn rect(&self) -> DeviceRect {
        self.rect
    }

    /// Drawables in z-order (first = bottom).
    pub fn drawables(&self) -> &[Arc<dyn Drawable>] {
        &self.drawables
    }

    pub(crate) fn shared_drawables(&self) -> Arc<[Arc<dyn Drawable>]> {
        Arc::clone(&self.drawables)
    }

    /// `true` when any drawable in the block reports a pending change.
    pub fn is_redraw_needed(&self) -> bool {
        self.drawables.iter().any(|d| d.is_redraw_needed())
    }
}

impl std::fmt::Debug for CacheableBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheableBlock")
            .field("id", &self.id)
            .field("drawables", &self.drawables.len())
            .field("rect", &self.rect)
            .finish()
    }
}
