//! PNG output for delivered rasters.

use crate::foundation::error::{TesseraError, TesseraResult};
use crate::render::buffer::Raster;
use crate::render::renderer::{RenderComplete, RenderListener};
use std::path::{Path, PathBuf};

/// Un-premultiplied RGBA8 copy of `raster`, row-major.
pub fn to_straight_rgba(raster: &Raster) -> Vec<u8> {
    let mut out = Vec::with_capacity(raster.data().len());
    for px in raster.data().chunks_exact(4) {
        let c = crate::foundation::core::Rgba8Premul::from_array([px[0], px[1], px[2], px[3]])
            .to_straight();
        out.extend_from_slice(&[c.r, c.g, c.b, c.a]);
    }
    out
}

/// Write `raster` to `path` as a straight-alpha PNG, creating parent directories.
pub fn write_png(raster: &Raster, path: impl AsRef<Path>) -> TesseraResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            TesseraError::io(format!("create output dir '{}': {e}", parent.display()))
        })?;
    }
    image::save_buffer_with_format(
        path,
        &to_straight_rgba(raster),
        raster.width(),
        raster.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .map_err(|e| TesseraError::io(format!("write png '{}': {e}", path.display())))
}

/// Listener that writes every delivered raster to `<dir>/<prefix><seq>.png`.
///
/// Passes without a raster are skipped.
#[derive(Clone, Debug)]
pub struct PngFileExporter {
    dir: PathBuf,
    prefix: String,
}

impl PngFileExporter {
    /// Export into `dir` with file names `pass-<seq>.png`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "pass-".to_string(),
        }
    }

    /// Replace the file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Path the raster of pass `seq` is written to.
    pub fn path_for(&self, seq: u64) -> PathBuf {
        self.dir.join(format!("{}{seq}.png", self.prefix))
    }
}

impl RenderListener for PngFileExporter {
    fn render_complete(&self, event: &RenderComplete) -> anyhow::Result<()> {
        let Some(raster) = &event.raster else {
            return Ok(());
        };
        let path = self.path_for(event.seq);
        write_png(raster, &path)?;
        tracing::debug!(seq = event.seq, path = %path.display(), "exported pass");
        Ok(())
    }
}
