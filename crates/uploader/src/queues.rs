//! The scheduler's two work queues.
//!
//! Both are shared by every texture an uploader tracks, so textures that were
//! registered together make progress together in insertion order.

use std::collections::VecDeque;
use std::sync::Arc;

use media::RgbaImage;

use crate::planner::{ChunkRect, MipLevel};
use crate::texture::{Texture, TextureId};

/// Pixels ready to be written into one chunk of one mip level.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub texture: TextureId,
    pub level: u32,
    pub x: u32,
    pub y: u32,
    pub pixels: RgbaImage,
}

/// An entry in the upload queue.
#[derive(Debug, Clone)]
pub enum UploadItem {
    /// A whole texture waiting for its standard upload to be released.
    Whole(Arc<Texture>),
    Chunk(ChunkUpload),
}

/// An entry in the create queue.
#[derive(Debug, Clone)]
pub enum CreateCommand {
    /// Give one mip level of a texture's new storage its memory.
    AllocateLevel { texture: TextureId, level: MipLevel },
    /// Start cropping one chunk out of a decoded mip level.
    CropChunk {
        texture: TextureId,
        level: u32,
        bitmap: Arc<RgbaImage>,
        rect: ChunkRect,
    },
}

#[derive(Debug, Default)]
pub struct WorkQueues {
    pub uploads: VecDeque<UploadItem>,
    pub creates: VecDeque<CreateCommand>,
}

impl WorkQueues {
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.creates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.uploads.len() + self.creates.len()
    }
}
