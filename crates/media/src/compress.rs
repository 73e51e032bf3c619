//! Block compression (BC1/BC2/BC3, a.k.a. DXT1/DXT3/DXT5) of RGBA bitmaps.
//!
//! This is independent of the upload scheduler: it produces compressed texture
//! data that a host can upload through its own path. [CompressionWorker] runs
//! the encoder off the calling thread.
//!
//! The flag bits are compatible with the `squish` library's, so flag values
//! recorded by existing tooling keep their meaning.

mod block;
mod worker;

use std::ops::BitOr;

use image::RgbaImage;
use thiserror::Error;

pub use worker::{
    CompressRequest, CompressResponse, CompressedImage, CompressionWorker, ImageSource,
};

/// Encoder flags. Combine with `|`.
///
/// Exactly one of [Self::DXT1], [Self::DXT3] or [Self::DXT5] picks the output
/// format. If none (or an invalid combination) is set, DXT1 is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressFlags(u32);

impl CompressFlags {
    /// BC1: 8 bytes per block, 1-bit alpha.
    pub const DXT1: Self = Self(1);
    /// BC2: 16 bytes per block, explicit 4-bit alpha.
    pub const DXT3: Self = Self(1 << 1);
    /// BC3: 16 bytes per block, interpolated alpha.
    pub const DXT5: Self = Self(1 << 2);
    /// Cluster-fit colour compression. Served by the range fitter.
    pub const CLUSTER_FIT: Self = Self(1 << 3);
    /// Range-fit colour compression (fast).
    pub const RANGE_FIT: Self = Self(1 << 4);
    /// Iterative cluster-fit colour compression. Served by the range fitter.
    pub const ITERATIVE_CLUSTER_FIT: Self = Self(1 << 8);

    /// The raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// The block format these flags select.
    pub const fn format(&self) -> BlockFormat {
        let method = self.0 & (Self::DXT1.0 | Self::DXT3.0 | Self::DXT5.0);
        if method == Self::DXT3.0 {
            BlockFormat::Dxt3
        } else if method == Self::DXT5.0 {
            BlockFormat::Dxt5
        } else {
            BlockFormat::Dxt1
        }
    }
}

impl Default for CompressFlags {
    fn default() -> Self {
        Self::DXT1 | Self::RANGE_FIT
    }
}

impl BitOr for CompressFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The compressed layout of one 4x4 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockFormat {
    Dxt1,
    Dxt3,
    Dxt5,
}

impl BlockFormat {
    /// Bytes used by one 4x4 block.
    pub const fn block_size(&self) -> usize {
        match self {
            BlockFormat::Dxt1 => 8,
            BlockFormat::Dxt3 | BlockFormat::Dxt5 => 16,
        }
    }
}

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Failed to load image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Pixel data size mismatch (expected {expected} bytes, got {actual} bytes)")]
    DataSizeMismatch { expected: usize, actual: usize },

    #[error("Cannot compress an image with no pixels")]
    ZeroSizedImage,

    #[error("The compression worker is no longer running")]
    WorkerGone,
}

/// The number of bytes [compress_image] produces for a `width` x `height`
/// image with `flags`.
pub fn storage_requirements(width: u32, height: u32, flags: CompressFlags) -> usize {
    let blocks = width.div_ceil(4) as usize * height.div_ceil(4) as usize;
    blocks * flags.format().block_size()
}

/// Compress `image` into row-major 4x4 blocks.
///
/// Blocks overhanging the right or bottom edge only fit the texels that
/// exist; the missing ones are given index 0 and don't influence endpoints.
pub fn compress_image(image: &RgbaImage, flags: CompressFlags) -> Result<Vec<u8>, CompressError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(CompressError::ZeroSizedImage);
    }

    let format = flags.format();
    let mut out = Vec::with_capacity(storage_requirements(width, height, flags));

    for block_y in (0..height).step_by(4) {
        for block_x in (0..width).step_by(4) {
            let mut texels = [[0u8; 4]; 16];
            let mut mask = 0u16;

            for py in 0..4 {
                for px in 0..4 {
                    let (x, y) = (block_x + px, block_y + py);
                    if x < width && y < height {
                        let i = (py * 4 + px) as usize;
                        texels[i] = image.get_pixel(x, y).0;
                        mask |= 1 << i;
                    }
                }
            }

            block::compress(&texels, mask, format, &mut out);
        }
    }

    debug_assert_eq!(out.len(), storage_requirements(width, height, flags));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_selection_matches_squish() {
        assert_eq!(CompressFlags::default().format(), BlockFormat::Dxt1);
        assert_eq!(CompressFlags::default().bits(), (1 << 4) | 1);
        assert_eq!(CompressFlags::DXT3.format(), BlockFormat::Dxt3);
        assert_eq!(
            (CompressFlags::DXT5 | CompressFlags::CLUSTER_FIT).format(),
            BlockFormat::Dxt5
        );
        // Conflicting format bits fall back to DXT1.
        assert_eq!(
            (CompressFlags::DXT3 | CompressFlags::DXT5).format(),
            BlockFormat::Dxt1
        );
    }

    #[test]
    fn storage_rounds_up_to_whole_blocks() {
        assert_eq!(storage_requirements(4, 4, CompressFlags::DXT1), 8);
        assert_eq!(storage_requirements(5, 4, CompressFlags::DXT1), 16);
        assert_eq!(storage_requirements(256, 256, CompressFlags::DXT5), 64 * 64 * 16);
        assert_eq!(storage_requirements(1, 1, CompressFlags::DXT3), 16);
    }

    #[test]
    fn output_size_matches_requirements() {
        let image = RgbaImage::from_fn(13, 7, |x, y| {
            image::Rgba([x as u8 * 19, y as u8 * 33, 7, 255])
        });
        for flags in [CompressFlags::DXT1, CompressFlags::DXT3, CompressFlags::DXT5] {
            let data = compress_image(&image, flags).unwrap();
            assert_eq!(data.len(), storage_requirements(13, 7, flags));
        }
    }

    #[test]
    fn empty_images_are_rejected() {
        let image = RgbaImage::new(0, 0);
        assert!(matches!(
            compress_image(&image, CompressFlags::default()),
            Err(CompressError::ZeroSizedImage)
        ));
    }
}
