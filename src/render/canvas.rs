use std::sync::Arc;

use crate::{
    assets::PreparedImage,
    foundation::{
        core::{Affine, Size},
        error::{ReelError, ReelResult},
    },
    render::fit::{FitMode, fit_rect},
};

/// The drawing surface the media layer paints into.
///
/// Its backing store is sized to the parent element's layout box. Pixels persist between draws,
/// so a skipped draw leaves the previous frame visible, while a resync discards them.
pub struct CanvasSurface {
    size: Size,
    pixmap: vello_cpu::Pixmap,
    draws: u64,
}

impl std::fmt::Debug for CanvasSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasSurface")
            .field("size", &self.size)
            .field("draws", &self.draws)
            .finish()
    }
}

impl CanvasSurface {
    pub fn new(size: Size) -> ReelResult<Self> {
        let (w, h) = size.to_u16()?;
        Ok(Self {
            size,
            pixmap: vello_cpu::Pixmap::new(w, h),
            draws: 0,
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Number of completed image draws since creation.
    pub fn draw_count(&self) -> u64 {
        self.draws
    }

    /// Match the backing store to the parent's layout size.
    ///
    /// Always reallocates, leaving the surface blank until the next draw.
    pub fn resync(&mut self, parent: Size) -> ReelResult<()> {
        let (w, h) = parent.to_u16()?;
        self.pixmap = vello_cpu::Pixmap::new(w, h);
        self.size = parent;
        tracing::debug!(width = parent.width, height = parent.height, "canvas resynced");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.pixmap.data_as_u8_slice_mut().fill(0);
    }

    /// Clear, then paint `image` scaled by `fit` to the current backing-store size.
    ///
    /// Returns `false` when nothing could be drawn (empty surface or image); the surface is left
    /// untouched in that case.
    #[tracing::instrument(skip(self, image), fields(w = image.width, h = image.height))]
    pub fn draw_image(&mut self, image: &PreparedImage, fit: FitMode) -> ReelResult<bool> {
        if self.size.is_empty() || !image.is_drawable() {
            return Ok(false);
        }
        let iw = f64::from(image.width);
        let ih = f64::from(image.height);
        let Some(rect) = fit_rect(
            (f64::from(self.size.width), f64::from(self.size.height)),
            (iw, ih),
            fit,
        ) else {
            return Ok(false);
        };

        let paint = image_paint(image)?;
        let (w, h) = self.size.to_u16()?;
        self.clear();

        let mut ctx = vello_cpu::RenderContext::new(w, h);
        ctx.set_transform(affine_to_cpu(rect.transform(iw, ih)));
        ctx.set_paint(paint);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, iw, ih));
        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);

        self.draws += 1;
        Ok(true)
    }

    /// Current backing-store pixels, premultiplied RGBA8.
    pub fn pixels(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }
}

pub(crate) fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn image_paint(image: &PreparedImage) -> ReelResult<vello_cpu::Image> {
    let pixmap = premul_bytes_to_pixmap(image.rgba8_premul.as_slice(), image.width, image.height)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> ReelResult<vello_cpu::Pixmap> {
    let (w, h) = Size::new(width, height).to_u16()?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(ReelError::render("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let pixels = rgba8_premul
        .chunks_exact(4)
        .map(|px| {
            may_have_opacities |= px[3] != 255;
            vello_cpu::peniko::color::PremulRgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            }
        })
        .collect::<Vec<_>>();

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> PreparedImage {
        PreparedImage {
            width: w,
            height: h,
            rgba8_premul: Arc::new(px.repeat((w * h) as usize)),
        }
    }

    fn px_at(surface: &CanvasSurface, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * surface.size().width + x) * 4) as usize;
        let p = &surface.pixels()[i..i + 4];
        [p[0], p[1], p[2], p[3]]
    }

    fn close_to(a: [u8; 4], b: [u8; 4]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| x.abs_diff(*y) <= 2)
    }

    #[test]
    fn contain_draw_letterboxes_wide_image() {
        let mut s = CanvasSurface::new(Size::new(16, 12)).unwrap();
        let drawn = s
            .draw_image(&solid(16, 9, [255, 0, 0, 255]), FitMode::Contain)
            .unwrap();
        assert!(drawn);
        // 16x9 placement starting at y=1.5: row 0 is bar, middle rows are image.
        assert_eq!(px_at(&s, 8, 0)[3], 0);
        assert!(close_to(px_at(&s, 8, 6), [255, 0, 0, 255]));
        assert_eq!(px_at(&s, 8, 11)[3], 0);
        assert_eq!(s.draw_count(), 1);
    }

    #[test]
    fn cover_draw_leaves_no_bars() {
        let mut s = CanvasSurface::new(Size::new(8, 6)).unwrap();
        s.draw_image(&solid(16, 9, [0, 0, 255, 255]), FitMode::Cover)
            .unwrap();
        assert!(close_to(px_at(&s, 0, 0), [0, 0, 255, 255]));
        assert!(close_to(px_at(&s, 7, 5), [0, 0, 255, 255]));
    }

    #[test]
    fn resync_clears_backing_store() {
        let mut s = CanvasSurface::new(Size::new(4, 4)).unwrap();
        s.draw_image(&solid(4, 4, [9, 9, 9, 255]), FitMode::Contain)
            .unwrap();
        s.resync(Size::new(6, 2)).unwrap();
        assert_eq!(s.size(), Size::new(6, 2));
        assert_eq!(s.pixels().len(), 6 * 2 * 4);
        assert!(s.pixels().iter().all(|b| *b == 0));
    }

    #[test]
    fn empty_surface_skips_draw() {
        let mut s = CanvasSurface::new(Size::new(0, 0)).unwrap();
        assert!(
            !s.draw_image(&solid(2, 2, [1, 1, 1, 255]), FitMode::Contain)
                .unwrap()
        );
        assert_eq!(s.draw_count(), 0);
    }

    #[test]
    fn mismatched_image_bytes_are_rejected() {
        let mut s = CanvasSurface::new(Size::new(2, 2)).unwrap();
        let bad = PreparedImage {
            width: 2,
            height: 2,
            rgba8_premul: Arc::new(vec![0; 3]),
        };
        assert!(s.draw_image(&bad, FitMode::Contain).is_err());
    }
}
