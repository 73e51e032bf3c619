//! This library contains the CPU-side image work needed to stream textures:
//! sizes, bitmap resizing/cropping, and block compression.

pub mod bitmap;
pub mod compress;

mod dimensions;
pub use dimensions::Dimensions;

/// The bitmap type every stage of the pipeline passes around (8-bit RGBA).
pub use image::RgbaImage;
