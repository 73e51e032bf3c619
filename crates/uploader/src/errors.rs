use thiserror::Error;

use crate::texture::TextureId;

/// Why a configuration change was refused. The previous configuration is
/// always kept when one of these is returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot change {setting} while uploads are still in flight")]
    QueuesNotEmpty { setting: &'static str },

    #[error(
        "Unknown upload mode '{0}' (one_by_one, at_the_same_time, partial or partial_no_interim)"
    )]
    InvalidMode(String),

    #[error("Chunk size must be a non-zero power of two on both sides, got {width}x{height}")]
    NonPowerOfTwoChunkSize { width: u32, height: u32 },

    #[error("The frame interval must be at least 1")]
    ZeroInterval,

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a texture was not taken on by the uploader. None of these are fatal;
/// the texture keeps whatever content it already had.
#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("Chunked modes do not support cube textures")]
    CubeTexture,

    #[error("Chunked modes do not support pre-compressed textures")]
    CompressedTexture,

    #[error("Chunked modes do not support raw data textures")]
    DataTexture,

    #[error("Chunked modes do not support 3D data textures")]
    Data3dTexture,

    #[error("Chunked modes do not support textures with precomputed mipmaps")]
    PrecomputedMipmaps,

    #[error("Chunked modes need a source image to be set")]
    NoImage,

    #[error("Chunked modes need a power-of-two source image, got {width}x{height}")]
    NotPowerOfTwo { width: u32, height: u32 },

    #[error("Texture {0} has not been marked for update since its last upload")]
    Stale(TextureId),

    #[error("GPU error while preparing the texture: {0}")]
    Backend(#[from] BackendError),
}

/// Failures reported by a [crate::gpu::GpuBackend].
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Mip level {level} is out of range (the texture has {level_count} levels)")]
    LevelOutOfRange { level: u32, level_count: u32 },

    #[error("Mip level {level} is {level_width}x{level_height}, not {width}x{height}")]
    LevelSizeMismatch {
        level: u32,
        level_width: u32,
        level_height: u32,
        width: u32,
        height: u32,
    },

    #[error(
        "{width}x{height} at ({x}, {y}) overflows level {level} ({level_width}x{level_height})"
    )]
    RegionOutOfBounds {
        level: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        level_width: u32,
        level_height: u32,
    },

    #[error("Data size mismatch (expected {expected} bytes, got {actual} bytes)")]
    DataSizeMismatch { expected: usize, actual: usize },

    #[error("Texture {0} has no GPU storage bound")]
    NotBound(TextureId),

    #[error("Failed to request GPU adapter")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),

    #[error("Failed to request GPU device")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}
