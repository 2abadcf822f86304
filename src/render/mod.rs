//! Cache-aware tile compositing.
//!
//! A render pass turns a list of [`block::CacheableBlock`]s into one raster: unchanged blocks
//! reuse their cached tile, changed ones are redrawn on the worker pool, and the assembly stage
//! joins the tiles bottom to top.

/// Pixel buffers and the provider that allocates and recycles them.
pub mod buffer;
/// Drawable capability and the per-tile drawing sink.
pub mod draw;
/// Cacheable blocks and their identities.
pub mod block;
/// Cooperative cancellation flag.
pub mod cancel;
/// Tile render task and tile handles.
pub mod tile;
/// Worker pools for tile tasks.
pub mod executor;
/// Per-pass assembly info, also used as the renderer's tile cache.
pub mod cache;
pub(crate) mod composite;
pub(crate) mod assemble;
/// Pass sequencing and cancellation policies.
pub mod scheduler;
/// The public orchestrator.
pub mod renderer;
