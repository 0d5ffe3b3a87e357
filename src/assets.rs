use std::sync::Arc;

pub mod decode;
pub mod media;
pub mod preload;
pub mod source;

/// Decoded still image ready to be uploaded to the canvas.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8, row-major, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// A zero-sized decode is treated like a failed load (nothing to draw).
    pub fn is_drawable(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}
