//! JSON scene description: a page plus an ordered list of blocks of solid shapes.

use crate::foundation::core::{Affine, BezPath, Rect, Rgba8, Size};
use crate::foundation::error::{TesseraError, TesseraResult};
use crate::render::block::{BlockId, CacheableBlock};
use crate::render::draw::Drawable;
use crate::shapes::{Page, Shape};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Block identity reserved for the page background.
pub const BACKGROUND_BLOCK: BlockId = BlockId(u64::MAX);

/// Top-level scene document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneDef {
    /// Page width in paper units.
    pub width: f64,
    /// Page height in paper units.
    pub height: f64,
    /// Device pixels per paper unit.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Page fill, drawn as its own bottom block.
    #[serde(default)]
    pub background: Option<ColorDef>,
    /// Blocks, bottom to top.
    pub blocks: Vec<BlockDef>,
}

fn default_scale() -> f64 {
    1.0
}

/// One cacheable block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockDef {
    /// Identity, stable across renders of the same scene.
    pub id: u64,
    /// Shapes, bottom to top.
    pub shapes: Vec<ShapeDef>,
}

/// A solid-filled shape in paper units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ShapeDef {
    /// Axis-aligned rectangle.
    Rect {
        /// Left edge.
        x: f64,
        /// Top edge.
        y: f64,
        /// Width.
        w: f64,
        /// Height.
        h: f64,
        /// Fill.
        color: ColorDef,
    },
    /// Closed polygon through `points`.
    Polygon {
        /// Vertices, at least three.
        points: Vec<[f64; 2]>,
        /// Fill.
        color: ColorDef,
    },
}

/// Straight-alpha color, written as `"#rrggbb[aa]"` or `[r, g, b]` / `[r, g, b, a]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorDef(pub Rgba8);

impl Serialize for ColorDef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let Rgba8 { r, g, b, a } = self.0;
        [r, g, b, a].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ColorDef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Hex(String),
            Rgba([u8; 4]),
            Rgb([u8; 3]),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Hex(s) => Rgba8::from_hex(&s)
                .map(Self)
                .map_err(serde::de::Error::custom),
            Repr::Rgba(c) => Ok(Self(Rgba8::from(c))),
            Repr::Rgb([r, g, b]) => Ok(Self(Rgba8::opaque(r, g, b))),
        }
    }
}

/// A built scene: the root page and its blocks.
///
/// Holds on to its drawables so their redraw flags can be cleared between passes.
#[derive(Debug)]
pub struct Scene {
    page: Arc<Page>,
    blocks: Vec<CacheableBlock>,
    shapes: Vec<Arc<Shape>>,
}

impl Scene {
    /// Root drawable.
    pub fn root(&self) -> &Page {
        &self.page
    }

    /// Blocks bottom to top, ready for [`crate::Renderer::render`].
    pub fn blocks(&self) -> Vec<CacheableBlock> {
        self.blocks.clone()
    }

    /// Output size in device pixels.
    pub fn device_size(&self) -> (u32, u32) {
        let r = crate::render::draw::root_device_bounds(self.page.as_ref());
        (r.width, r.height)
    }

    /// Mark every drawable as unchanged, so the next pass reuses all cached tiles.
    pub fn mark_clean(&self) {
        self.page.set_redraw_needed(false);
        for s in &self.shapes {
            s.set_redraw_needed(false);
        }
    }

    /// Mark every drawable as changed.
    pub fn mark_dirty(&self) {
        self.page.set_redraw_needed(true);
        for s in &self.shapes {
            s.set_redraw_needed(true);
        }
    }
}

impl SceneDef {
    /// Parse a scene from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> TesseraResult<Self> {
        serde_json::from_reader(r).map_err(|e| TesseraError::serde(format!("parse scene JSON: {e}")))
    }

    /// Parse a scene from a JSON string.
    pub fn from_json_str(s: &str) -> TesseraResult<Self> {
        serde_json::from_str(s).map_err(|e| TesseraError::serde(format!("parse scene JSON: {e}")))
    }

    /// Parse a scene from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> TesseraResult<Self> {
        let path = path.as_ref();
        let f = File::open(path)
            .map_err(|e| TesseraError::io(format!("open scene '{}': {e}", path.display())))?;
        Self::from_reader(BufReader::new(f))
    }

    /// Check dimensions, identities and shapes.
    pub fn validate(&self) -> TesseraResult<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.width) || !positive(self.height) {
            return Err(TesseraError::validation(format!(
                "scene size must be positive and finite, got {}x{}",
                self.width, self.height
            )));
        }
        if !positive(self.scale) {
            return Err(TesseraError::validation(format!(
                "scene scale must be positive and finite, got {}",
                self.scale
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for b in &self.blocks {
            if BlockId(b.id) == BACKGROUND_BLOCK {
                return Err(TesseraError::validation(format!(
                    "block id {} is reserved for the background",
                    b.id
                )));
            }
            if !seen.insert(b.id) {
                return Err(TesseraError::validation(format!("duplicate block id {}", b.id)));
            }
            for (i, s) in b.shapes.iter().enumerate() {
                s.validate()
                    .map_err(|e| TesseraError::validation(format!("block {} shape {i}: {e}", b.id)))?;
            }
        }
        Ok(())
    }

    /// Validate and build the drawables.
    pub fn build(&self) -> TesseraResult<Scene> {
        self.validate()?;
        let to_device = Affine::scale(self.scale);

        let mut page = Page::new(Size::new(self.width, self.height), self.scale);
        if let Some(bg) = self.background {
            page = page.with_background(bg.0);
        }
        let page = Arc::new(page);

        let mut blocks = Vec::with_capacity(self.blocks.len() + 1);
        if self.background.is_some() {
            blocks.push(CacheableBlock::new(
                BACKGROUND_BLOCK,
                vec![page.clone() as Arc<dyn Drawable>],
            ));
        }

        let mut shapes = Vec::new();
        for b in &self.blocks {
            let mut drawables: Vec<Arc<dyn Drawable>> = Vec::with_capacity(b.shapes.len());
            for s in &b.shapes {
                let shape = Arc::new(s.to_shape().with_transform(to_device));
                shapes.push(shape.clone());
                drawables.push(shape);
            }
            blocks.push(CacheableBlock::new(BlockId(b.id), drawables));
        }

        Ok(Scene {
            page,
            blocks,
            shapes,
        })
    }
}

impl ShapeDef {
    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Rect { x, y, w, h, .. } => {
                if ![x, y, w, h].iter().all(|v| v.is_finite()) {
                    return Err("rect coordinates must be finite".to_string());
                }
                if *w < 0.0 || *h < 0.0 {
                    return Err(format!("rect size must be non-negative, got {w}x{h}"));
                }
                Ok(())
            }
            Self::Polygon { points, .. } => {
                if points.len() < 3 {
                    return Err(format!("polygon needs at least 3 points, got {}", points.len()));
                }
                if !points.iter().flatten().all(|v| v.is_finite()) {
                    return Err("polygon points must be finite".to_string());
                }
                Ok(())
            }
        }
    }

    fn to_shape(&self) -> Shape {
        match self {
            Self::Rect { x, y, w, h, color } => {
                Shape::rect(Rect::new(*x, *y, x + w, y + h), color.0)
            }
            Self::Polygon { points, color } => {
                let mut path = BezPath::new();
                for (i, [x, y]) in points.iter().enumerate() {
                    if i == 0 {
                        path.move_to((*x, *y));
                    } else {
                        path.line_to((*x, *y));
                    }
                }
                path.close_path();
                Shape::path(path, color.0)
            }
        }
    }
}
