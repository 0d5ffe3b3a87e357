use std::sync::Arc;

use anyhow::Context;

use crate::{
    assets::PreparedImage,
    foundation::{core::Rgba8, error::ReelResult},
};

/// Decode any format the `image` crate recognizes into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> ReelResult<PreparedImage> {
    let rgba = image::load_from_memory(bytes)
        .context("decode image from memory")?
        .into_rgba8();
    let (width, height) = rgba.dimensions();
    let mut data = rgba.into_raw();
    premultiply_rgba8_in_place(&mut data);
    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(data),
    })
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        if px[3] == 255 {
            continue;
        }
        let premul = Rgba8([px[0], px[1], px[2], px[3]]).premultiplied();
        px.copy_from_slice(&premul);
    }
}
