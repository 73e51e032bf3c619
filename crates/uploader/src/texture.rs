//! The application-side texture description.
//!
//! A [Texture] is what materials point at. It carries the source image and
//! sampling settings but none of the uploader's streaming state; that lives in
//! side tables keyed by [TextureId] so several uploaders can look at the same
//! texture without stepping on each other.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use media::{Dimensions, RgbaImage};

use crate::errors::RegisterError;

/// Identifies one [Texture] for its whole lifetime. No two textures created by
/// the same process share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for TextureId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What kind of data backs a texture. Only [TextureKind::Image2d] can be
/// streamed in chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureKind {
    #[default]
    Image2d,
    Cube,
    /// Already block-compressed data.
    Compressed,
    /// Raw typed pixel data rather than a decoded image.
    Data,
    /// Volumetric data.
    Data3d,
}

/// Texture filtering, including the mip selection for minification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    Nearest,
    NearestMipmapNearest,
    NearestMipmapLinear,
    Linear,
    LinearMipmapNearest,
    #[default]
    LinearMipmapLinear,
}

impl Filter {
    /// Whether sampling with this filter reads from mip levels other than 0.
    pub const fn uses_mipmaps(&self) -> bool {
        !matches!(self, Filter::Nearest | Filter::Linear)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wrap {
    Repeat,
    #[default]
    ClampToEdge,
    MirroredRepeat,
}

/// Channel layout of the texture's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    Red,
    Rgb,
    #[default]
    Rgba,
}

/// Component type of the texture's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelType {
    #[default]
    UnsignedByte,
    HalfFloat,
    Float,
}

/// Sampler and unpack settings applied when storage is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerParams {
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub flip_y: bool,
    pub premultiply_alpha: bool,
    pub unpack_alignment: u32,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            wrap_s: Wrap::default(),
            wrap_t: Wrap::default(),
            mag_filter: Filter::Linear,
            min_filter: Filter::default(),
            flip_y: false,
            premultiply_alpha: false,
            unpack_alignment: 4,
        }
    }
}

/// A texture as the application sees it.
///
/// Build one with [Texture::builder]. The content [version](Self::version)
/// starts at `0`; call [Self::mark_needs_update] once the image is ready to
/// be uploaded.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    kind: TextureKind,
    image: Option<Arc<RgbaImage>>,
    mipmaps: Vec<Arc<RgbaImage>>,
    generate_mipmaps: bool,
    sampler: SamplerParams,
    format: PixelFormat,
    pixel_type: PixelType,
    version: AtomicU64,
}

impl Texture {
    /// Start building a texture.
    pub fn builder() -> TextureBuilder {
        TextureBuilder::default()
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    /// The source image, if one is bound.
    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        self.image.as_ref()
    }

    /// The source image's size, or [None] if there is no (non-empty) image.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.image
            .as_deref()
            .and_then(media::bitmap::dimensions)
    }

    /// Precomputed mip images supplied by the application.
    pub fn mipmaps(&self) -> &[Arc<RgbaImage>] {
        &self.mipmaps
    }

    pub fn sampler(&self) -> SamplerParams {
        self.sampler
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    /// The content version. Bumped by [Self::mark_needs_update].
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Flag the current image as new content that should be uploaded.
    pub fn mark_needs_update(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Whether a full mip chain has to exist for this texture: mipmap
    /// generation is on and the minification filter actually samples mips.
    pub fn needs_mipmaps(&self) -> bool {
        self.generate_mipmaps && self.sampler.min_filter.uses_mipmaps()
    }

    /// Check that this texture can be split into chunks, returning the source
    /// size if it can.
    pub fn check_streamable(&self) -> Result<Dimensions, RegisterError> {
        match self.kind {
            TextureKind::Image2d => {}
            TextureKind::Cube => return Err(RegisterError::CubeTexture),
            TextureKind::Compressed => return Err(RegisterError::CompressedTexture),
            TextureKind::Data => return Err(RegisterError::DataTexture),
            TextureKind::Data3d => return Err(RegisterError::Data3dTexture),
        }

        if !self.mipmaps.is_empty() {
            return Err(RegisterError::PrecomputedMipmaps);
        }

        let size = self.dimensions().ok_or(RegisterError::NoImage)?;

        if !size.is_power_of_two() {
            return Err(RegisterError::NotPowerOfTwo {
                width: size.width(),
                height: size.height(),
            });
        }

        Ok(size)
    }
}

/// Builder for [Texture]. Defaults match a freshly loaded image texture:
/// 2D, mipmaps generated, trilinear filtering, RGBA8 storage.
#[derive(Debug, Clone)]
pub struct TextureBuilder {
    kind: TextureKind,
    image: Option<Arc<RgbaImage>>,
    mipmaps: Vec<Arc<RgbaImage>>,
    generate_mipmaps: bool,
    sampler: SamplerParams,
    format: PixelFormat,
    pixel_type: PixelType,
}

impl Default for TextureBuilder {
    fn default() -> Self {
        Self {
            kind: TextureKind::default(),
            image: None,
            mipmaps: Vec::new(),
            generate_mipmaps: true,
            sampler: SamplerParams::default(),
            format: PixelFormat::default(),
            pixel_type: PixelType::default(),
        }
    }
}

impl TextureBuilder {
    pub fn image(mut self, image: impl Into<Arc<RgbaImage>>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn kind(mut self, kind: TextureKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn mipmaps(mut self, mipmaps: Vec<Arc<RgbaImage>>) -> Self {
        self.mipmaps = mipmaps;
        self
    }

    pub fn generate_mipmaps(mut self, generate: bool) -> Self {
        self.generate_mipmaps = generate;
        self
    }

    pub fn min_filter(mut self, filter: Filter) -> Self {
        self.sampler.min_filter = filter;
        self
    }

    pub fn mag_filter(mut self, filter: Filter) -> Self {
        self.sampler.mag_filter = filter;
        self
    }

    pub fn wrap(mut self, wrap_s: Wrap, wrap_t: Wrap) -> Self {
        self.sampler.wrap_s = wrap_s;
        self.sampler.wrap_t = wrap_t;
        self
    }

    pub fn format(mut self, format: PixelFormat, pixel_type: PixelType) -> Self {
        self.format = format;
        self.pixel_type = pixel_type;
        self
    }

    pub fn flip_y(mut self, flip_y: bool) -> Self {
        self.sampler.flip_y = flip_y;
        self
    }

    pub fn premultiply_alpha(mut self, premultiply: bool) -> Self {
        self.sampler.premultiply_alpha = premultiply;
        self
    }

    pub fn unpack_alignment(mut self, alignment: u32) -> Self {
        self.sampler.unpack_alignment = alignment;
        self
    }

    /// Finish the texture, giving it a fresh [TextureId] and version `0`.
    pub fn build(self) -> Arc<Texture> {
        Arc::new(Texture {
            id: TextureId::next(),
            kind: self.kind,
            image: self.image,
            mipmaps: self.mipmaps,
            generate_mipmaps: self.generate_mipmaps,
            sampler: self.sampler,
            format: self.format,
            pixel_type: self.pixel_type,
            version: AtomicU64::new(0),
        })
    }
}
