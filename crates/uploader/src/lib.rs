//! Progressive texture uploading.
//!
//! A [TextureUploader] spreads the work of getting textures onto the GPU
//! across many frames. Depending on its [UploadMode] it either defers whole
//! uploads and releases a bounded number per frame, or splits each texture
//! into per-mip-level chunks that are decoded off-thread and written one at a
//! time, swapping the finished texture in without exposing half-written
//! storage.
//!
//! The host drives everything by calling [TextureUploader::update] once per
//! frame with its [GpuTextures] table.

pub mod bindings;
pub mod config;
pub mod decode;
pub mod errors;
pub mod gpu;
pub mod material;
pub mod planner;
pub mod queues;
pub mod texture;
pub mod uploader;

pub use bindings::GpuTextures;
pub use config::{ChunkSize, UploadMode, UploaderConfig};
pub use decode::{Decoder, InlineDecoder, ThreadedDecoder};
pub use errors::{BackendError, ConfigError, RegisterError};
pub use gpu::{GpuBackend, StorageDescriptor, WgpuBackend, WgpuTexture};
pub use material::{Material, SceneObject};
pub use texture::{
    Filter, PixelFormat, PixelType, Texture, TextureBuilder, TextureId, TextureKind, Wrap,
};
pub use uploader::{Progress, Registration, TextureUploader};
