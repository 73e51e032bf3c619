//! The seam between the scheduler and the graphics API.

mod format;
mod wgpu_backend;

use std::fmt::Debug;

use media::{Dimensions, RgbaImage};

pub use format::{ApiVersion, InternalFormat, internal_format};
pub use wgpu_backend::{WgpuBackend, WgpuTexture};

use crate::errors::BackendError;
use crate::texture::{SamplerParams, Texture};

/// What a backend needs to create texture storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageDescriptor {
    /// The size of level 0.
    pub size: Dimensions,
    pub level_count: u32,
    pub format: InternalFormat,
    pub sampler: SamplerParams,
}

impl StorageDescriptor {
    /// Storage for `texture` at `size` with `level_count` levels, using the
    /// internal format `api` would infer for it.
    pub fn for_texture(
        texture: &Texture,
        size: Dimensions,
        level_count: u32,
        api: ApiVersion,
    ) -> Self {
        Self {
            size,
            level_count,
            format: internal_format(texture.format(), texture.pixel_type(), api),
            sampler: texture.sampler(),
        }
    }

    /// The size of `level`, or [None] if the storage doesn't have that level.
    pub fn level_size(&self, level: u32) -> Option<Dimensions> {
        if level >= self.level_count {
            return None;
        }
        let mut size = self.size;
        for _ in 0..level {
            size = size.halved();
        }
        Some(size)
    }
}

/// A graphics API that can hold textures.
///
/// Calls are expected to be quick: one allocation or one small transfer each.
/// Pixels always arrive as 8-bit RGBA; converting them to the storage format
/// is up to the backend.
pub trait GpuBackend {
    type Handle: Debug;

    fn api(&self) -> ApiVersion;

    /// Create (empty) storage. No level is usable until it's allocated.
    fn create_texture(
        &mut self,
        descriptor: &StorageDescriptor,
    ) -> Result<Self::Handle, BackendError>;

    /// Give `level` of `handle` its memory. `size` must match the level's size.
    fn allocate_level(
        &mut self,
        handle: &Self::Handle,
        level: u32,
        size: Dimensions,
    ) -> Result<(), BackendError>;

    /// Write `pixels` into an allocated level with the top-left corner at
    /// `(x, y)`.
    fn write_region(
        &mut self,
        handle: &Self::Handle,
        level: u32,
        x: u32,
        y: u32,
        pixels: &RgbaImage,
    ) -> Result<(), BackendError>;

    fn delete_texture(&mut self, handle: Self::Handle);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_sizes_halve() {
        let texture = Texture::builder().build();
        let descriptor =
            StorageDescriptor::for_texture(&texture, (8, 2).into(), 4, ApiVersion::Modern);

        assert_eq!(descriptor.format, InternalFormat::Rgba8);
        assert_eq!(descriptor.level_size(0), Some((8, 2).into()));
        assert_eq!(descriptor.level_size(2), Some((2, 1).into()));
        assert_eq!(descriptor.level_size(3), Some((1, 1).into()));
        assert_eq!(descriptor.level_size(4), None);
    }

    #[test]
    fn writes_past_the_last_level_are_out_of_range() {
        let texture = Texture::builder().build();
        let descriptor =
            StorageDescriptor::for_texture(&texture, (4, 4).into(), 3, ApiVersion::Modern);
        let mut backend = recording::RecordingBackend::new();
        let handle = backend.create_texture(&descriptor).unwrap();

        assert!(matches!(
            backend.write_region(&handle, 3, 0, 0, &RgbaImage::new(1, 1)),
            Err(BackendError::LevelOutOfRange {
                level: 3,
                level_count: 3
            })
        ));
        assert!(backend.writes.is_empty());
    }
}
