//! The renderer-side texture table: which GPU storage each texture samples
//! from right now.

use std::collections::{HashMap, HashSet};

use media::{RgbaImage, bitmap};

use crate::errors::BackendError;
use crate::gpu::{GpuBackend, StorageDescriptor};
use crate::texture::{Texture, TextureId};

/// What a texture is bound to.
#[derive(Debug)]
struct Binding<H> {
    handle: H,
    /// The [Texture::version] the storage holds.
    version: u64,
    max_mip_level: u32,
}

/// Owns a [GpuBackend] and every texture's live storage on it.
///
/// A renderer calls [Self::prepare] before drawing with a texture, which does
/// the standard blocking upload when the texture has changed. The uploader
/// hooks in by [holding](Self::hold) textures it is still working on and by
/// [exposing](Self::expose) storage it has filled itself.
#[derive(Debug)]
pub struct GpuTextures<B: GpuBackend> {
    backend: B,
    bound: HashMap<TextureId, Binding<B::Handle>>,
    held: HashSet<TextureId>,
}

impl<B: GpuBackend> GpuTextures<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            bound: HashMap::new(),
            held: HashSet::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Make [Self::prepare] leave the texture alone until it's released.
    pub fn hold(&mut self, id: TextureId) {
        self.held.insert(id);
    }

    /// Undo [Self::hold]. Returns whether the texture was held.
    pub fn release(&mut self, id: TextureId) -> bool {
        self.held.remove(&id)
    }

    pub fn is_held(&self, id: TextureId) -> bool {
        self.held.contains(&id)
    }

    /// The storage `id` currently samples from.
    pub fn live_handle(&self, id: TextureId) -> Option<&B::Handle> {
        self.bound.get(&id).map(|binding| &binding.handle)
    }

    /// The texture version held by the live storage.
    pub fn uploaded_version(&self, id: TextureId) -> Option<u64> {
        self.bound.get(&id).map(|binding| binding.version)
    }

    pub fn max_mip_level(&self, id: TextureId) -> Option<u32> {
        self.bound.get(&id).map(|binding| binding.max_mip_level)
    }

    /// Upload `texture` in one go if its content is newer than what's bound.
    ///
    /// Returns whether an upload happened. Held textures, textures that were
    /// never marked for update and textures without an image are skipped.
    pub fn prepare(&mut self, texture: &Texture) -> Result<bool, BackendError> {
        let id = texture.id();
        let version = texture.version();
        if self.is_held(id) || version == 0 || self.uploaded_version(id) == Some(version) {
            return Ok(false);
        }
        let Some(image) = texture.image() else {
            return Ok(false);
        };
        let Some(size) = bitmap::dimensions(image) else {
            return Ok(false);
        };

        let levels: Vec<RgbaImage> = if !texture.mipmaps().is_empty() {
            std::iter::once(image.as_ref().clone())
                .chain(texture.mipmaps().iter().map(|mip| mip.as_ref().clone()))
                .collect()
        } else if texture.needs_mipmaps() {
            bitmap::mip_chain(image)
        } else {
            vec![image.as_ref().clone()]
        };

        let level_count = levels.len() as u32;
        let descriptor =
            StorageDescriptor::for_texture(texture, size, level_count, self.backend.api());
        let handle = self.backend.create_texture(&descriptor)?;

        if let Err(e) = self.fill(&handle, &levels) {
            self.backend.delete_texture(handle);
            return Err(e);
        }

        log::debug!("Uploaded texture {id} ({size}, {level_count} levels) in one go");
        self.expose(id, handle, level_count - 1, version);
        Ok(true)
    }

    fn fill(&mut self, handle: &B::Handle, levels: &[RgbaImage]) -> Result<(), BackendError> {
        for (level, pixels) in levels.iter().enumerate() {
            let Some(size) = bitmap::dimensions(pixels) else {
                continue;
            };
            self.backend.allocate_level(handle, level as u32, size)?;
            self.backend.write_region(handle, level as u32, 0, 0, pixels)?;
        }
        Ok(())
    }

    /// Bind `texture` to a single transparent texel, so it can be sampled
    /// while its real content streams in.
    pub fn upload_placeholder(&mut self, texture: &Texture) -> Result<(), BackendError> {
        let pixel = bitmap::solid([0, 0, 0, 0]);
        let size = media::Dimensions::ONE;
        let descriptor = StorageDescriptor::for_texture(texture, size, 1, self.backend.api());

        let handle = self.backend.create_texture(&descriptor)?;
        if let Err(e) = self.fill(&handle, std::slice::from_ref(&pixel)) {
            self.backend.delete_texture(handle);
            return Err(e);
        }

        self.expose(texture.id(), handle, 0, texture.version());
        Ok(())
    }

    /// Make `handle` the storage `id` samples from, deleting what was bound
    /// before. Nothing can observe the texture between the two steps.
    pub fn expose(&mut self, id: TextureId, handle: B::Handle, max_mip_level: u32, version: u64) {
        let previous = self.bound.insert(
            id,
            Binding {
                handle,
                version,
                max_mip_level,
            },
        );
        if let Some(previous) = previous {
            self.backend.delete_texture(previous.handle);
        }
    }

    /// Write into the storage `id` currently samples from.
    pub fn write_to_live(
        &mut self,
        id: TextureId,
        level: u32,
        x: u32,
        y: u32,
        pixels: &RgbaImage,
    ) -> Result<(), BackendError> {
        let binding = self.bound.get(&id).ok_or(BackendError::NotBound(id))?;
        self.backend.write_region(&binding.handle, level, x, y, pixels)
    }

    /// Forget `id`, deleting its storage.
    pub fn remove(&mut self, id: TextureId) {
        self.held.remove(&id);
        if let Some(binding) = self.bound.remove(&id) {
            self.backend.delete_texture(binding.handle);
        }
    }
}

impl<B: GpuBackend> Drop for GpuTextures<B> {
    fn drop(&mut self) {
        for (_, binding) in self.bound.drain() {
            self.backend.delete_texture(binding.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::RecordingBackend;
    use crate::texture::Filter;

    fn texture(width: u32, height: u32) -> std::sync::Arc<Texture> {
        let texture = Texture::builder().image(RgbaImage::new(width, height)).build();
        texture.mark_needs_update();
        texture
    }

    #[test]
    fn prepare_uploads_full_chain_once() {
        let mut gpu = GpuTextures::new(RecordingBackend::new());
        let texture = texture(8, 4);

        assert!(gpu.prepare(&texture).unwrap());
        assert!(!gpu.prepare(&texture).unwrap());

        let handle = *gpu.live_handle(texture.id()).unwrap();
        let levels: Vec<_> = gpu.backend().writes_to(handle).map(|w| w.level).collect();
        assert_eq!(levels, vec![0, 1, 2, 3]);
        assert_eq!(gpu.max_mip_level(texture.id()), Some(3));
        assert_eq!(gpu.uploaded_version(texture.id()), Some(1));
    }

    #[test]
    fn prepare_skips_unmarked_and_held_textures() {
        let mut gpu = GpuTextures::new(RecordingBackend::new());

        let unmarked = Texture::builder().image(RgbaImage::new(4, 4)).build();
        assert!(!gpu.prepare(&unmarked).unwrap());

        let held = texture(4, 4);
        gpu.hold(held.id());
        assert!(!gpu.prepare(&held).unwrap());
        assert!(gpu.release(held.id()));
        assert!(gpu.prepare(&held).unwrap());
    }

    #[test]
    fn prepare_without_mipmaps_uploads_one_level() {
        let mut gpu = GpuTextures::new(RecordingBackend::new());
        let texture = Texture::builder()
            .image(RgbaImage::new(16, 16))
            .min_filter(Filter::Linear)
            .build();
        texture.mark_needs_update();

        gpu.prepare(&texture).unwrap();
        assert_eq!(gpu.backend().writes.len(), 1);
        assert_eq!(gpu.max_mip_level(texture.id()), Some(0));
    }

    #[test]
    fn updates_replace_and_delete_old_storage() {
        let mut gpu = GpuTextures::new(RecordingBackend::new());
        let texture = texture(2, 2);

        gpu.prepare(&texture).unwrap();
        let first = *gpu.live_handle(texture.id()).unwrap();

        texture.mark_needs_update();
        gpu.prepare(&texture).unwrap();
        let second = *gpu.live_handle(texture.id()).unwrap();

        assert_ne!(first, second);
        assert_eq!(gpu.backend().deleted, vec![first]);
        assert_eq!(gpu.backend().live.len(), 1);
    }

    #[test]
    fn placeholder_is_one_transparent_texel() {
        let mut gpu = GpuTextures::new(RecordingBackend::new());
        let texture = texture(64, 64);

        gpu.upload_placeholder(&texture).unwrap();
        let handle = *gpu.live_handle(texture.id()).unwrap();
        let storage = &gpu.backend().live[&handle];
        assert_eq!(storage.descriptor.size, media::Dimensions::ONE);
        assert_eq!(storage.descriptor.level_count, 1);
        // The placeholder counts as the current version.
        assert!(!gpu.prepare(&texture).unwrap());
    }

    #[test]
    fn writing_to_unbound_textures_fails() {
        let mut gpu = GpuTextures::new(RecordingBackend::new());
        let texture = texture(4, 4);
        assert!(matches!(
            gpu.write_to_live(texture.id(), 0, 0, 0, &RgbaImage::new(1, 1)),
            Err(BackendError::NotBound(_))
        ));
    }
}
