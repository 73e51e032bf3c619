//! Bitmap operations used to turn a source image into uploadable pieces:
//! resizing it to each mip level and cropping levels into chunks.
//!
//! None of this touches the GPU. Everything here is safe to run on worker
//! threads.

use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::Dimensions;

/// The filter used when shrinking a source image down to a mip level.
const MIP_FILTER: FilterType = FilterType::Triangle;

/// The dimensions of `bitmap`, or [None] if it has no pixels.
pub fn dimensions(bitmap: &RgbaImage) -> Option<Dimensions> {
    Dimensions::new(bitmap.width(), bitmap.height())
}

/// Resize `source` to `size`.
///
/// This is the expensive step of the decode pipeline, so callers should only
/// ask for it when `size` actually differs from the source.
pub fn resize(source: &RgbaImage, size: Dimensions) -> RgbaImage {
    imageops::resize(source, size.width(), size.height(), MIP_FILTER)
}

/// Copy out the `size` rectangle of `bitmap` whose top-left corner is at
/// `(x, y)`.
///
/// The rectangle is clamped to the bitmap, so a chunk hanging off the right or
/// bottom edge comes back smaller rather than padded.
pub fn crop(bitmap: &RgbaImage, x: u32, y: u32, size: Dimensions) -> RgbaImage {
    imageops::crop_imm(bitmap, x, y, size.width(), size.height()).to_image()
}

/// Build the full mip chain of `source`, level 0 being `source` itself,
/// halving until `1x1`.
pub fn mip_chain(source: &RgbaImage) -> Vec<RgbaImage> {
    let Some(mut size) = dimensions(source) else {
        return Vec::new();
    };

    let mut levels = vec![source.clone()];
    while !size.is_one() {
        size = size.halved();
        levels.push(resize(source, size));
    }
    levels
}

/// A `1x1` bitmap holding a single pixel.
pub fn solid(pixel: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(1, 1, image::Rgba(pixel))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255])
        })
    }

    #[test]
    fn crop_keeps_source_pixels() {
        let src = gradient(16, 16);
        let chunk = crop(&src, 8, 4, (4, 4).into());

        assert_eq!(chunk.dimensions(), (4, 4));
        assert_eq!(chunk.get_pixel(0, 0), src.get_pixel(8, 4));
        assert_eq!(chunk.get_pixel(3, 3), src.get_pixel(11, 7));
    }

    #[test]
    fn crop_is_clamped_at_the_edge() {
        let src = gradient(10, 6);
        let chunk = crop(&src, 8, 4, (4, 4).into());
        assert_eq!(chunk.dimensions(), (2, 2));
    }

    #[test]
    fn resize_hits_requested_size() {
        let src = gradient(64, 32);
        assert_eq!(resize(&src, (16, 8).into()).dimensions(), (16, 8));
    }

    #[test]
    fn mip_chain_ends_at_one_texel() {
        let chain = mip_chain(&gradient(8, 2));
        let sizes: Vec<_> = chain.iter().map(|b| b.dimensions()).collect();
        assert_eq!(sizes, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
    }
}
