//! Tessera is a cache-aware, cancellable tile compositor.
//!
//! Callers group drawables into [`CacheableBlock`]s and hand them to a [`Renderer`]:
//!
//! - Unchanged blocks reuse the tile rendered by an earlier pass
//! - Changed blocks are redrawn in parallel on a bounded worker pool
//! - Tiles are composited bottom to top and delivered to [`RenderListener`]s
//!
//! A [`CancelPolicy`] decides which in-flight passes survive when newer ones arrive.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// PNG export.
pub mod export;
/// Tile rendering, caching, scheduling and assembly.
pub mod render;
/// JSON scene description.
pub mod scene;
/// Concrete drawables.
pub mod shapes;

pub use crate::foundation::core::{
    Affine, BezPath, DeviceRect, Point, Rect, Rgba8, Rgba8Premul, Size, Vec2,
};
pub use crate::foundation::error::{TesseraError, TesseraResult};

pub use crate::export::{PngFileExporter, write_png};
pub use crate::render::block::{BlockId, CacheableBlock};
pub use crate::render::buffer::{BufferPool, BufferPoolOpts, BufferPoolStats, BufferProvider, Raster};
pub use crate::render::cancel::CancelToken;
pub use crate::render::draw::{DrawContext, Drawable, device_bounds, root_device_bounds};
pub use crate::render::executor::{InlineExecutor, RayonExecutor, TileExecutor, TileJob};
pub use crate::render::renderer::{
    ListenerId, RenderComplete, RenderListener, RenderStats, Renderer, RendererOpts,
};
pub use crate::render::scheduler::{CancelPolicy, PassState};
pub use crate::render::tile::{TileHandle, TileOutcome, render_tile};
pub use crate::scene::{Scene, SceneDef};
pub use crate::shapes::{Page, Shape};
