use crate::texture::{PixelFormat, PixelType};

/// Which generation of the graphics API is in use. Only the modern one has
/// sized internal formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    Legacy,
    Modern,
}

/// How texels are stored on the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalFormat {
    R8,
    R16F,
    R32F,
    Rgb8,
    Rgb16F,
    Rgb32F,
    Rgba8,
    Rgba16F,
    Rgba32F,
    /// The driver picks the storage from the base format.
    Unsized(PixelFormat),
}

impl InternalFormat {
    pub const fn channels(&self) -> u32 {
        match self {
            InternalFormat::R8 | InternalFormat::R16F | InternalFormat::R32F => 1,
            InternalFormat::Rgb8 | InternalFormat::Rgb16F | InternalFormat::Rgb32F => 3,
            InternalFormat::Rgba8 | InternalFormat::Rgba16F | InternalFormat::Rgba32F => 4,
            InternalFormat::Unsized(PixelFormat::Red) => 1,
            InternalFormat::Unsized(PixelFormat::Rgb) => 3,
            InternalFormat::Unsized(PixelFormat::Rgba) => 4,
        }
    }
}

/// Infer the storage format for `format` texels of type `pixel_type`.
pub fn internal_format(
    format: PixelFormat,
    pixel_type: PixelType,
    api: ApiVersion,
) -> InternalFormat {
    if api == ApiVersion::Legacy {
        return InternalFormat::Unsized(format);
    }

    match (format, pixel_type) {
        (PixelFormat::Red, PixelType::UnsignedByte) => InternalFormat::R8,
        (PixelFormat::Red, PixelType::HalfFloat) => InternalFormat::R16F,
        (PixelFormat::Red, PixelType::Float) => InternalFormat::R32F,
        (PixelFormat::Rgb, PixelType::UnsignedByte) => InternalFormat::Rgb8,
        (PixelFormat::Rgb, PixelType::HalfFloat) => InternalFormat::Rgb16F,
        (PixelFormat::Rgb, PixelType::Float) => InternalFormat::Rgb32F,
        (PixelFormat::Rgba, PixelType::UnsignedByte) => InternalFormat::Rgba8,
        (PixelFormat::Rgba, PixelType::HalfFloat) => InternalFormat::Rgba16F,
        (PixelFormat::Rgba, PixelType::Float) => InternalFormat::Rgba32F,
    }
}
