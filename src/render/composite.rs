use crate::foundation::error::{TesseraError, TesseraResult};
use crate::render::buffer::Raster;

pub(crate) type PremulRgba8 = [u8; 4];

/// Premultiplied source-over with an extra opacity multiplier.
pub(crate) fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

pub(crate) fn over_in_place(dst: &mut [u8], src: &[u8], opacity: f32) -> TesseraResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(TesseraError::assembly(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = if s[3] == 255 && opacity >= 1.0 {
            [s[0], s[1], s[2], s[3]]
        } else {
            over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity)
        };
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Composite `src` over `dst` with `src`'s top-left corner at `(dx, dy)` in `dst` pixels.
///
/// Parts of `src` outside `dst` are clipped away.
pub(crate) fn blit_over(dst: &mut Raster, src: &Raster, dx: i64, dy: i64) -> TesseraResult<()> {
    let dw = i64::from(dst.width());
    let dh = i64::from(dst.height());
    let sw = i64::from(src.width());
    let sh = i64::from(src.height());

    let x0 = dx.max(0);
    let y0 = dy.max(0);
    let x1 = (dx + sw).min(dw);
    let y1 = (dy + sh).min(dh);
    if x0 >= x1 || y0 >= y1 {
        return Ok(());
    }

    let row_bytes = ((x1 - x0) * 4) as usize;
    let dst_stride = (dw * 4) as usize;
    let src_stride = (sw * 4) as usize;
    let src_data = src.data();
    let dst_data = dst.data_mut();
    for y in y0..y1 {
        let d_off = (y as usize) * dst_stride + (x0 as usize) * 4;
        let s_off = ((y - dy) as usize) * src_stride + ((x0 - dx) as usize) * 4;
        over_in_place(
            &mut dst_data[d_off..d_off + row_bytes],
            &src_data[s_off..s_off + row_bytes],
            1.0,
        )?;
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}
