use crate::foundation::core::{Affine, BezPath, DeviceRect, Rect, Rgba8};

/// The capability the compositor needs from anything it draws.
///
/// `transform` maps the drawable's paper-space `bounds` into device space. For the root of a
/// pass it is the physical (paper to device) transform, whose scale sizes the output.
pub trait Drawable: Send + Sync {
    /// Paper-to-device transform.
    fn transform(&self) -> Affine;

    /// Bounds in paper space.
    fn bounds(&self) -> Rect;

    /// Whether anything affecting this drawable's pixels changed since the last pass.
    fn is_redraw_needed(&self) -> bool;

    /// Draw in device space onto `ctx`.
    fn draw(&self, ctx: &mut DrawContext<'_>) -> anyhow::Result<()>;
}

/// Device rectangle enclosing a nested drawable: its paper bounds mapped through its
/// transform.
pub fn device_bounds(d: &dyn Drawable) -> DeviceRect {
    DeviceRect::enclosing(d.transform().transform_rect_bbox(d.bounds()))
}

/// Device rectangle of a root drawable: origin at zero, size = paper size × scale.
pub fn root_device_bounds(root: &dyn Drawable) -> DeviceRect {
    let size = root.bounds().size();
    let scale = transform_scale(root.transform());
    DeviceRect::enclosing(Rect::new(0.0, 0.0, size.width * scale, size.height * scale))
}

/// Uniform scale factor of `a` (square root of the absolute determinant).
fn transform_scale(a: Affine) -> f64 {
    a.determinant().abs().sqrt()
}

/// Drawing sink handed to [`Drawable::draw`] for one tile.
///
/// Coordinates are device space; the context shifts them so the tile's top-left corner
/// lands at pixel (0, 0).
pub struct DrawContext<'a> {
    ctx: &'a mut vello_cpu::RenderContext,
    origin: Affine,
    transform: Affine,
    tile: DeviceRect,
}

impl<'a> DrawContext<'a> {
    pub(crate) fn new(ctx: &'a mut vello_cpu::RenderContext, tile: DeviceRect) -> Self {
        let origin = Affine::translate((-f64::from(tile.x), -f64::from(tile.y)));
        ctx.set_transform(affine_to_cpu(origin));
        Self {
            ctx,
            origin,
            transform: Affine::IDENTITY,
            tile,
        }
    }

    /// Device rectangle of the tile being drawn.
    pub fn tile_rect(&self) -> DeviceRect {
        self.tile
    }

    /// Current user transform (applied before the tile offset).
    pub fn transform(&self) -> Affine {
        self.transform
    }

    /// Replace the user transform for subsequent fills.
    pub fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
        self.ctx.set_transform(affine_to_cpu(self.origin * transform));
    }

    /// Fill `rect` with a solid color.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba8) {
        self.ctx.set_paint(to_cpu_color(color));
        self.ctx
            .fill_rect(&vello_cpu::kurbo::Rect::new(rect.x0, rect.y0, rect.x1, rect.y1));
    }

    /// Fill `path` (non-zero winding) with a solid color.
    pub fn fill_path(&mut self, path: &BezPath, color: Rgba8) {
        self.ctx.set_paint(to_cpu_color(color));
        self.ctx.fill_path(&bezpath_to_cpu(path));
    }
}

fn to_cpu_color(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
