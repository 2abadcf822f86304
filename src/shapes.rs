//! Solid-fill drawables: enough to build pages out of rectangles and paths.

use crate::foundation::core::{Affine, BezPath, Point, Rect, Rgba8, Size};
use crate::render::draw::{DrawContext, Drawable};
use std::sync::atomic::{AtomicBool, Ordering};

/// Root drawable: a page of `size` paper units, rasterized at `scale` device pixels per unit.
#[derive(Debug)]
pub struct Page {
    size: Size,
    scale: f64,
    background: Option<Rgba8>,
    redraw_needed: AtomicBool,
}

impl Page {
    /// A transparent page.
    pub fn new(size: Size, scale: f64) -> Self {
        Self {
            size,
            scale,
            background: None,
            redraw_needed: AtomicBool::new(true),
        }
    }

    /// Fill the page with `color` when it is drawn as part of a block.
    pub fn with_background(mut self, color: Rgba8) -> Self {
        self.background = Some(color);
        self
    }

    /// Set or clear the redraw-needed flag.
    pub fn set_redraw_needed(&self, needed: bool) {
        self.redraw_needed.store(needed, Ordering::Release);
    }
}

impl Drawable for Page {
    fn transform(&self) -> Affine {
        Affine::scale(self.scale)
    }

    fn bounds(&self) -> Rect {
        Rect::from_origin_size(Point::ORIGIN, self.size)
    }

    fn is_redraw_needed(&self) -> bool {
        self.redraw_needed.load(Ordering::Acquire)
    }

    fn draw(&self, ctx: &mut DrawContext<'_>) -> anyhow::Result<()> {
        if let Some(bg) = self.background {
            ctx.set_transform(self.transform());
            ctx.fill_rect(self.bounds(), bg);
        }
        Ok(())
    }
}

/// Outline of a [`Shape`].
#[derive(Clone, Debug)]
pub enum Geometry {
    /// Axis-aligned rectangle in paper space.
    Rect(Rect),
    /// Arbitrary path in paper space, filled with the non-zero rule.
    Path(BezPath),
}

/// A solid-colored rectangle or path.
#[derive(Debug)]
pub struct Shape {
    geometry: Geometry,
    transform: Affine,
    color: Rgba8,
    redraw_needed: AtomicBool,
}

impl Shape {
    /// A filled rectangle drawn with the identity transform.
    pub fn rect(rect: Rect, color: Rgba8) -> Self {
        Self::new(Geometry::Rect(rect), color)
    }

    /// A filled path drawn with the identity transform.
    pub fn path(path: BezPath, color: Rgba8) -> Self {
        Self::new(Geometry::Path(path), color)
    }

    fn new(geometry: Geometry, color: Rgba8) -> Self {
        Self {
            geometry,
            transform: Affine::IDENTITY,
            color,
            redraw_needed: AtomicBool::new(true),
        }
    }

    /// Replace the paper-to-device transform.
    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }

    /// Fill color.
    pub fn color(&self) -> Rgba8 {
        self.color
    }

    /// Set or clear the redraw-needed flag.
    pub fn set_redraw_needed(&self, needed: bool) {
        self.redraw_needed.store(needed, Ordering::Release);
    }
}

impl Drawable for Shape {
    fn transform(&self) -> Affine {
        self.transform
    }

    fn bounds(&self) -> Rect {
        match &self.geometry {
            Geometry::Rect(r) => *r,
            Geometry::Path(p) => kurbo::Shape::bounding_box(p),
        }
    }

    fn is_redraw_needed(&self) -> bool {
        self.redraw_needed.load(Ordering::Acquire)
    }

    fn draw(&self, ctx: &mut DrawContext<'_>) -> anyhow::Result<()> {
        ctx.set_transform(self.transform);
        match &self.geometry {
            Geometry::Rect(r) => ctx.fill_rect(*r, self.color),
            Geometry::Path(p) => ctx.fill_path(p, self.color),
        }
        Ok(())
    }
}
