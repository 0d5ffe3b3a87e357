use crate::foundation::error::{ReelError, ReelResult};

pub type PremulRgba8 = [u8; 4];

/// Porter-Duff source-over for one premultiplied pixel, with `src` scaled by `opacity`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let op = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let src = src.map(|c| mul_div255(c, op));
    if src[3] == 0 {
        return dst;
    }
    let inv = 255 - src[3];
    std::array::from_fn(|i| src[i].saturating_add(mul_div255(dst[i], inv)))
}

/// Stack one full-frame layer onto another. Both buffers are premultiplied RGBA8 of equal size.
pub fn over_in_place(dst: &mut [u8], src: &[u8], opacity: f32) -> ReelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::render(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
    Ok(())
}

pub fn fill_solid(dst: &mut [u8], px: PremulRgba8) {
    for d in dst.chunks_exact_mut(4) {
        d.copy_from_slice(&px);
    }
}

fn mul_div255(x: u8, y: u8) -> u8 {
    ((u16::from(x) * u16::from(y) + 127) / 255) as u8
}
