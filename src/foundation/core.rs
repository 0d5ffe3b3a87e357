use crate::foundation::error::{ReelError, ReelResult};

pub use kurbo::Affine;

/// Normalized scroll traversal of the tall scroll region, always within `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct ScrollProgress(f64);

impl ScrollProgress {
    /// Region top at viewport top.
    pub const START: Self = Self(0.0);
    /// Region bottom at viewport bottom.
    pub const END: Self = Self(1.0);

    /// Clamp `value` into `[0, 1]`. Non-finite input maps to 0.
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Self(value.clamp(0.0, 1.0))
        } else {
            Self(0.0)
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

/// Layout size in CSS-like pixels (viewport, parent element, canvas backing store).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }

    /// Sizes fed to the rasterizer must fit in `u16` per axis.
    pub fn to_u16(self) -> ReelResult<(u16, u16)> {
        let w: u16 = self
            .width
            .try_into()
            .map_err(|_| ReelError::render("surface width exceeds u16"))?;
        let h: u16 = self
            .height
            .try_into()
            .map_err(|_| ReelError::render("surface height exceeds u16"))?;
        Ok((w, h))
    }
}

/// Straight (non-premultiplied) RGBA8 color as authored in configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8(pub [u8; 4]);

impl Rgba8 {
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    pub fn with_alpha(self, a: u8) -> Self {
        let [r, g, b, _] = self.0;
        Self([r, g, b, a])
    }

    pub fn premultiplied(self) -> [u8; 4] {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        let [r, g, b, a] = self.0;
        [premul(r, a), premul(g, a), premul(b, a), a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_clamps_and_rejects_nan() {
        assert_eq!(ScrollProgress::new(-0.5).get(), 0.0);
        assert_eq!(ScrollProgress::new(1.5).get(), 1.0);
        assert_eq!(ScrollProgress::new(0.25).get(), 0.25);
        assert_eq!(ScrollProgress::new(f64::NAN).get(), 0.0);
        assert_eq!(ScrollProgress::new(f64::INFINITY).get(), 0.0);
    }

    #[test]
    fn size_aspect_and_u16_bounds() {
        assert!((Size::new(800, 600).aspect() - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(Size::new(10, 0).aspect(), 0.0);
        assert!(Size::new(70_000, 10).to_u16().is_err());
        assert_eq!(Size::new(64, 32).to_u16().unwrap(), (64, 32));
    }

    #[test]
    fn premultiply_half_alpha() {
        assert_eq!(Rgba8([255, 0, 0, 128]).premultiplied(), [128, 0, 0, 128]);
        assert_eq!(Rgba8::WHITE.premultiplied(), [255, 255, 255, 255]);
    }
}
