use crate::foundation::core::{Rgba8, Rgba8Premul};
use crate::foundation::error::{TesseraError, TesseraResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// A premultiplied RGBA8 raster: one tile, or the assembled output of a pass.
pub struct Raster {
    pixmap: vello_cpu::Pixmap,
}

impl Raster {
    /// Allocate a fully transparent raster.
    ///
    /// Both dimensions must be in `1..=u16::MAX`.
    pub fn new(width: u32, height: u32) -> TesseraResult<Self> {
        let (w, h) = raster_dims(width, height)?;
        Ok(Self {
            pixmap: vello_cpu::Pixmap::new(w, h),
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        u32::from(self.pixmap.width())
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        u32::from(self.pixmap.height())
    }

    /// Row-major premultiplied RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        self.pixmap.data_as_u8_slice_mut()
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut vello_cpu::Pixmap {
        &mut self.pixmap
    }

    /// Read one pixel, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8Premul> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let idx = ((y as usize) * (self.width() as usize) + (x as usize)) * 4;
        let px = self.data().get(idx..idx + 4)?;
        Some(Rgba8Premul::from_array([px[0], px[1], px[2], px[3]]))
    }

    /// Overwrite every pixel with `color`.
    pub fn fill(&mut self, color: Rgba8Premul) {
        let rgba = color.to_array();
        for px in self.data_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Reset to fully transparent.
    pub fn clear(&mut self) {
        self.data_mut().fill(0);
    }

    fn byte_len(&self) -> usize {
        self.data().len()
    }
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

fn raster_dims(width: u32, height: u32) -> TesseraResult<(u16, u16)> {
    if width == 0 || height == 0 {
        return Err(TesseraError::validation(format!(
            "raster must be non-empty, got {width}x{height}"
        )));
    }
    let w: u16 = width
        .try_into()
        .map_err(|_| TesseraError::validation(format!("raster width exceeds u16: {width}")))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| TesseraError::validation(format!("raster height exceeds u16: {height}")))?;
    Ok((w, h))
}

/// Allocation contract for the rasters tiles and passes draw into.
///
/// Recycling is an optimization only: an implementation may drop every recycled buffer.
pub trait BufferProvider: Send + Sync {
    /// A fully transparent buffer for one tile.
    fn create_transparent_buffer(&self, width: u32, height: u32) -> TesseraResult<Raster>;

    /// A buffer for an assembled pass, pre-filled with the output background.
    fn create_output_buffer(&self, width: u32, height: u32) -> TesseraResult<Raster>;

    /// Hand a buffer back once its owner no longer needs it.
    fn recycle(&self, buffer: Raster);
}

/// Pool configuration for recycled rasters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BufferPoolOpts {
    /// Maximum bytes retained across all buckets.
    pub max_pool_bytes: usize,
    /// Maximum number of retained rasters per (w,h) bucket.
    pub max_buffers_per_bucket: usize,
    /// Straight-alpha background that output buffers are filled with.
    pub background: Rgba8,
}

impl Default for BufferPoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 64 * 1024 * 1024,
            max_buffers_per_bucket: 8,
            background: Rgba8::TRANSPARENT,
        }
    }
}

impl BufferPoolOpts {
    /// Options that never retain a buffer: every request allocates.
    pub fn unpooled() -> Self {
        Self {
            max_pool_bytes: 0,
            max_buffers_per_bucket: 0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BufferKey {
    w: u32,
    h: u32,
}

impl BufferKey {
    fn byte_len(self) -> usize {
        (self.w as usize)
            .saturating_mul(self.h as usize)
            .saturating_mul(4)
    }
}

/// Allocation and recycling counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Rasters currently held for reuse.
    pub retained_buffers: usize,
    /// Bytes currently held for reuse.
    pub retained_bytes: usize,
    /// Fresh allocations made.
    pub alloc_buffers: u64,
    /// Requests served from the pool.
    pub reused_buffers: u64,
    /// Rasters handed back through [`BufferProvider::recycle`].
    pub recycled_buffers: u64,
    /// Recycled rasters dropped because a cap was hit.
    pub dropped_on_recycle: u64,
}

#[derive(Default)]
struct PoolState {
    stats: BufferPoolStats,
    buckets: HashMap<BufferKey, Vec<Raster>>,
}

/// Bounded recycling allocator keyed by `(width, height)`.
///
/// Shared by every tile task and assembly of a renderer; the lock is held per request,
/// never while drawing.
pub struct BufferPool {
    opts: BufferPoolOpts,
    background: Rgba8Premul,
    state: Mutex<PoolState>,
}

impl BufferPool {
    /// Construct a pool with the given caps.
    pub fn new(opts: BufferPoolOpts) -> Self {
        Self {
            background: opts.background.premultiply(),
            opts,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> BufferPoolStats {
        self.state.lock().stats.clone()
    }

    fn take(&self, width: u32, height: u32) -> TesseraResult<(Raster, bool)> {
        let key = BufferKey {
            w: width,
            h: height,
        };
        {
            let mut st = self.state.lock();
            if let Some(r) = st.buckets.get_mut(&key).and_then(Vec::pop) {
                st.stats.retained_buffers = st.stats.retained_buffers.saturating_sub(1);
                st.stats.retained_bytes = st.stats.retained_bytes.saturating_sub(key.byte_len());
                st.stats.reused_buffers = st.stats.reused_buffers.saturating_add(1);
                return Ok((r, true));
            }
        }

        let raster = Raster::new(width, height)?;
        let mut st = self.state.lock();
        st.stats.alloc_buffers = st.stats.alloc_buffers.saturating_add(1);
        Ok((raster, false))
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(BufferPoolOpts::default())
    }
}

impl BufferProvider for BufferPool {
    fn create_transparent_buffer(&self, width: u32, height: u32) -> TesseraResult<Raster> {
        let (mut raster, reused) = self.take(width, height)?;
        if reused {
            raster.clear();
        }
        Ok(raster)
    }

    fn create_output_buffer(&self, width: u32, height: u32) -> TesseraResult<Raster> {
        let (mut raster, reused) = self.take(width, height)?;
        if self.background.a != 0 {
            raster.fill(self.background);
        } else if reused {
            raster.clear();
        }
        Ok(raster)
    }

    fn recycle(&self, buffer: Raster) {
        let mut st = self.state.lock();
        st.stats.recycled_buffers = st.stats.recycled_buffers.saturating_add(1);

        if self.opts.max_pool_bytes == 0 || self.opts.max_buffers_per_bucket == 0 {
            st.stats.dropped_on_recycle = st.stats.dropped_on_recycle.saturating_add(1);
            return;
        }

        let key = BufferKey {
            w: buffer.width(),
            h: buffer.height(),
        };
        let bytes = buffer.byte_len();
        if st.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes {
            st.stats.dropped_on_recycle = st.stats.dropped_on_recycle.saturating_add(1);
            return;
        }

        let cap = self.opts.max_buffers_per_bucket;
        let bucket = st.buckets.entry(key).or_default();
        if bucket.len() >= cap {
            st.stats.dropped_on_recycle = st.stats.dropped_on_recycle.saturating_add(1);
            return;
        }
        bucket.push(buffer);
        st.stats.retained_buffers = st.stats.retained_buffers.saturating_add(1);
        st.stats.retained_bytes = st.stats.retained_bytes.saturating_add(bytes);
    }
}
