//! Pixel buffer helpers for captured regions.

use image::{ImageBuffer, Rgb, Rgba, RgbaImage};

use crate::grid::CellRect;

/// RGB pixels of a captured rectangle.
pub type PixelBuffer = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Crops a capture-relative rectangle out of a larger buffer.
///
/// Returns None if the rectangle does not lie fully inside the buffer.
pub fn crop(buffer: &PixelBuffer, rect: &CellRect) -> Option<PixelBuffer> {
    if rect.is_empty() || !rect.fits_within(buffer.width(), buffer.height()) {
        return None;
    }
    Some(
        image::imageops::crop_imm(
            buffer,
            rect.left as u32,
            rect.top as u32,
            rect.width,
            rect.height,
        )
        .to_image(),
    )
}

/// Rows `y_start..` of a buffer as an RGBA image with a uniform alpha.
///
/// Returns None when nothing lies below `y_start`.
pub fn rows_below_with_alpha(buffer: &PixelBuffer, y_start: u32, alpha: u8) -> Option<RgbaImage> {
    if buffer.height() <= y_start || buffer.width() == 0 {
        return None;
    }
    let height = buffer.height() - y_start;
    Some(ImageBuffer::from_fn(buffer.width(), height, |x, y| {
        let Rgb([r, g, b]) = *buffer.get_pixel(x, y + y_start);
        Rgba([r, g, b, alpha])
    }))
}

/// Converts tightly packed BGRA rows (as produced by GDI) into an RGB buffer.
pub fn from_bgra(width: u32, height: u32, bgra: &[u8]) -> Option<PixelBuffer> {
    if bgra.len() < (width as usize) * (height as usize) * 4 {
        return None;
    }
    let rgb: Vec<u8> = bgra
        .chunks_exact(4)
        .take((width * height) as usize)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect();
    ImageBuffer::from_raw(width, height, rgb)
}
