use crate::foundation::core::Affine;

/// How a media source is scaled into the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Whole source visible, letterboxed on the diverging axis.
    #[default]
    Contain,
    /// Canvas fully covered, overflow cropped.
    Cover,
}

/// Placement of a scaled source inside the canvas, in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitRect {
    pub draw_width: f64,
    pub draw_height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl FitRect {
    /// Maps source pixel space onto the placement.
    pub fn transform(&self, image_width: f64, image_height: f64) -> Affine {
        Affine::translate((self.offset_x, self.offset_y))
            * Affine::scale_non_uniform(
                self.draw_width / image_width,
                self.draw_height / image_height,
            )
    }
}

/// Aspect-preserving placement of an `image` inside a `canvas`, centered on the cropped or
/// letterboxed axis.
///
/// Returns `None` when either box has no area (nothing can be drawn).
pub fn fit_rect(canvas: (f64, f64), image: (f64, f64), mode: FitMode) -> Option<FitRect> {
    let (cw, ch) = canvas;
    let (iw, ih) = image;
    if !(cw > 0.0 && ch > 0.0 && iw > 0.0 && ih > 0.0) {
        return None;
    }

    let canvas_ratio = cw / ch;
    let image_ratio = iw / ih;
    let fit_height = match mode {
        FitMode::Contain => canvas_ratio > image_ratio,
        FitMode::Cover => canvas_ratio <= image_ratio,
    };

    Some(if fit_height {
        let draw_width = iw * (ch / ih);
        FitRect {
            draw_width,
            draw_height: ch,
            offset_x: (cw - draw_width) / 2.0,
            offset_y: 0.0,
        }
    } else {
        let draw_height = ih * (cw / iw);
        FitRect {
            draw_width: cw,
            draw_height,
            offset_x: 0.0,
            offset_y: (ch - draw_height) / 2.0,
        }
    })
}
