//! Splits a texture into mip levels and each level into chunks.
//!
//! Planning happens once, at registration, so the number of chunks a texture
//! will produce is known before any decode finishes.

use media::Dimensions;

use crate::errors::RegisterError;
use crate::texture::Texture;

/// One level of a texture's mip chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MipLevel {
    pub level: u32,
    pub size: Dimensions,
}

/// A rectangle within a mip level, transferred as a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRect {
    pub x: u32,
    pub y: u32,
    pub size: Dimensions,
}

/// The levels to stream for a `source`-sized texture. Halves each side (never
/// below 1) down to `1x1` if `needs_mipmaps`, otherwise just level 0.
pub fn plan_mip_chain(source: Dimensions, needs_mipmaps: bool) -> Vec<MipLevel> {
    let mut levels = vec![MipLevel {
        level: 0,
        size: source,
    }];

    if needs_mipmaps {
        let mut size = source;
        while !size.is_one() {
            size = size.halved();
            levels.push(MipLevel {
                level: levels.len() as u32,
                size,
            });
        }
    }

    levels
}

/// Tile `level_size` with `chunk_size` rectangles, row by row from the origin.
/// The last column and row are clamped to what's left rather than padded.
pub fn plan_chunks(level_size: Dimensions, chunk_size: Dimensions) -> Vec<ChunkRect> {
    let (width, height) = (level_size.width(), level_size.height());
    let (chunk_width, chunk_height) = (chunk_size.width(), chunk_size.height());

    let mut chunks = Vec::with_capacity(chunks_per_level(level_size, chunk_size) as usize);
    for y in (0..height).step_by(chunk_height as usize) {
        for x in (0..width).step_by(chunk_width as usize) {
            let w = chunk_width.min(width - x);
            let h = chunk_height.min(height - y);
            chunks.push(ChunkRect {
                x,
                y,
                // Both sides are at least 1 since x < width and y < height.
                size: (w, h).into(),
            });
        }
    }
    chunks
}

/// How many chunks [plan_chunks] produces for a level.
pub fn chunks_per_level(level_size: Dimensions, chunk_size: Dimensions) -> u32 {
    level_size.width().div_ceil(chunk_size.width())
        * level_size.height().div_ceil(chunk_size.height())
}

/// Everything decided about a chunked texture before streaming starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    pub source: Dimensions,
    pub levels: Vec<MipLevel>,
    pub chunk_size: Dimensions,
    /// Chunks across every level.
    pub chunk_count: u32,
}

impl UploadPlan {
    /// Plan `texture`, or say why it can't be chunked.
    pub fn for_texture(texture: &Texture, chunk_size: Dimensions) -> Result<Self, RegisterError> {
        let source = texture.check_streamable()?;
        Ok(Self::new(source, texture.needs_mipmaps(), chunk_size))
    }

    pub fn new(source: Dimensions, needs_mipmaps: bool, chunk_size: Dimensions) -> Self {
        let levels = plan_mip_chain(source, needs_mipmaps);
        let chunk_count = levels
            .iter()
            .map(|level| chunks_per_level(level.size, chunk_size))
            .sum();

        Self {
            source,
            levels,
            chunk_size,
            chunk_count,
        }
    }

    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// The highest level index a sampler may read once streaming is done.
    pub fn max_mip_level(&self) -> u32 {
        self.level_count() - 1
    }
}
