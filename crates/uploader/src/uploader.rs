//! The frame-driven scheduler.
//!
//! [TextureUploader::update] runs once per frame. On every `interval`th frame
//! it does one step of upload work and one step of create work, so the GPU
//! time spent per frame stays bounded no matter how many textures are queued.
//!
//! In the whole-texture modes a step releases one (or every) queued texture
//! to the renderer's normal upload path. In the chunked modes, registration
//! binds a placeholder and creates hidden full-size storage; create steps
//! then allocate that storage level by level and start cropping chunks, and
//! upload steps write one finished chunk at a time.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::mem;
use std::sync::Arc;

use media::{Dimensions, RgbaImage};

use crate::bindings::GpuTextures;
use crate::config::{ChunkSize, UploadMode, UploaderConfig};
use crate::decode::{DecodeJob, Decoded, Decoder, ThreadedDecoder};
use crate::errors::{ConfigError, RegisterError};
use crate::gpu::{GpuBackend, StorageDescriptor};
use crate::material::SceneObject;
use crate::planner::{MipLevel, UploadPlan, plan_chunks};
use crate::queues::{ChunkUpload, CreateCommand, UploadItem, WorkQueues};
use crate::texture::{Texture, TextureId};

/// The outcome of a successful [TextureUploader::add_texture].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Tracked,
    /// The texture was already being uploaded. Nothing changed.
    AlreadyTracked,
}

/// How far a chunked texture has got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub allocated_levels: u32,
    pub level_count: u32,
    pub uploaded_chunks: u32,
    pub chunk_count: u32,
}

/// Where a streaming texture's new storage is.
#[derive(Debug)]
enum Target<H> {
    /// Only the uploader knows about it.
    Hidden(H),
    /// It is the texture's live storage.
    Exposed,
}

#[derive(Debug)]
struct Streaming<H> {
    texture: Arc<Texture>,
    mode: UploadMode,
    version: u64,
    chunk_size: Dimensions,
    level_count: u32,
    max_mip_level: u32,
    allocated_levels: u32,
    chunk_count: u32,
    uploaded_chunks: u32,
    target: Target<H>,
}

#[derive(Debug)]
enum Tracked<H> {
    Whole,
    Streaming(Streaming<H>),
}

type UploadCallback = Box<dyn FnMut(&Texture)>;

/// Streams textures to a [GpuTextures] table a little at a time.
pub struct TextureUploader<B: GpuBackend> {
    config: UploaderConfig,
    chunk_size: Dimensions,
    frame_count: u64,
    queues: WorkQueues,
    tracked: HashMap<TextureId, Tracked<B::Handle>>,
    decoder: Box<dyn Decoder>,
    /// Jobs handed to the decoder that haven't come back yet.
    in_flight: usize,
    decoded: Vec<Decoded>,
    on_texture_upload: UploadCallback,
}

impl<B: GpuBackend> TextureUploader<B> {
    /// An uploader that decodes on a pool of worker threads.
    pub fn new(config: UploaderConfig) -> Result<Self, ConfigError> {
        Self::with_decoder(config, ThreadedDecoder::with_available_parallelism())
    }

    pub fn with_decoder(
        config: UploaderConfig,
        decoder: impl Decoder + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let chunk_size = config.chunk_size.validate()?;

        Ok(Self {
            config,
            chunk_size,
            frame_count: 0,
            queues: WorkQueues::default(),
            tracked: HashMap::new(),
            decoder: Box::new(decoder),
            in_flight: 0,
            decoded: Vec::new(),
            on_texture_upload: Box::new(|_| {}),
        })
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// The number of times [Self::update] has been called.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Whether any texture still has work queued or decoding.
    pub fn is_busy(&self) -> bool {
        !self.queues.is_empty() || self.in_flight > 0
    }

    pub fn is_tracked(&self, id: TextureId) -> bool {
        self.tracked.contains_key(&id)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Progress of a texture being streamed in a chunked mode.
    pub fn progress(&self, id: TextureId) -> Option<Progress> {
        match self.tracked.get(&id)? {
            Tracked::Whole => None,
            Tracked::Streaming(record) => Some(Progress {
                allocated_levels: record.allocated_levels,
                level_count: record.level_count,
                uploaded_chunks: record.uploaded_chunks,
                chunk_count: record.chunk_count,
            }),
        }
    }

    pub fn set_interval(&mut self, interval: u32) -> Result<(), ConfigError> {
        if interval == self.config.interval {
            return Ok(());
        }
        self.check_idle("interval")?;
        if interval == 0 {
            return reject(ConfigError::ZeroInterval);
        }
        self.config.interval = interval;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: UploadMode) -> Result<(), ConfigError> {
        if mode == self.config.mode {
            return Ok(());
        }
        self.check_idle("mode")?;
        log::debug!("Upload mode changed from {} to {mode}", self.config.mode);
        self.config.mode = mode;
        Ok(())
    }

    /// Like [Self::set_mode], taking the mode's name in any case.
    pub fn set_mode_name(&mut self, name: &str) -> Result<(), ConfigError> {
        match name.parse() {
            Ok(mode) => self.set_mode(mode),
            Err(e) => reject(e),
        }
    }

    pub fn set_chunk_size(&mut self, chunk_size: ChunkSize) -> Result<(), ConfigError> {
        if chunk_size == self.config.chunk_size {
            return Ok(());
        }
        self.check_idle("chunk size")?;
        self.chunk_size = match chunk_size.validate() {
            Ok(size) => size,
            Err(e) => return reject(e),
        };
        self.config.chunk_size = chunk_size;
        Ok(())
    }

    /// Replace the whole configuration at once. Follows the same rules as the
    /// individual setters.
    pub fn apply_config(&mut self, config: UploaderConfig) -> Result<(), ConfigError> {
        if config == self.config {
            return Ok(());
        }
        self.check_idle("configuration")?;
        let chunk_size = match config.validate().and_then(|()| config.chunk_size.validate()) {
            Ok(size) => size,
            Err(e) => return reject(e),
        };
        self.config = config;
        self.chunk_size = chunk_size;
        Ok(())
    }

    /// Called once for every texture whose upload finishes.
    pub fn set_on_texture_upload(&mut self, callback: impl FnMut(&Texture) + 'static) {
        self.on_texture_upload = Box::new(callback);
    }

    fn check_idle(&self, setting: &'static str) -> Result<(), ConfigError> {
        if self.is_busy() {
            return reject(ConfigError::QueuesNotEmpty { setting });
        }
        Ok(())
    }

    /// Register every texture used by `object`, and by its descendants if
    /// `recursive`. Returns how many textures started uploading.
    ///
    /// Textures that can't be taken on are logged and skipped.
    pub fn add(
        &mut self,
        gpu: &mut GpuTextures<B>,
        object: &SceneObject,
        recursive: bool,
    ) -> usize {
        let mut added = 0;
        let mut visit = |object: &SceneObject| {
            for texture in object.own_textures() {
                if let Ok(Registration::Tracked) = self.add_texture(gpu, texture) {
                    added += 1;
                }
            }
        };

        if recursive {
            object.traverse(&mut visit);
        } else {
            visit(object);
        }
        added
    }

    /// Register one texture. Rejections are also logged as warnings.
    pub fn add_texture(
        &mut self,
        gpu: &mut GpuTextures<B>,
        texture: &Arc<Texture>,
    ) -> Result<Registration, RegisterError> {
        let id = texture.id();
        if self.tracked.contains_key(&id) {
            log::trace!("Texture {id} is already being uploaded");
            return Ok(Registration::AlreadyTracked);
        }

        match self.register(gpu, texture) {
            Ok(()) => {
                log::debug!("Registered texture {id} for {} upload", self.config.mode);
                Ok(Registration::Tracked)
            }
            Err(e) => {
                log::warn!("Not uploading texture {id}: {e}");
                Err(e)
            }
        }
    }

    fn register(
        &mut self,
        gpu: &mut GpuTextures<B>,
        texture: &Arc<Texture>,
    ) -> Result<(), RegisterError> {
        let id = texture.id();
        let plan = if self.config.mode.is_chunked() {
            Some(UploadPlan::for_texture(texture, self.chunk_size)?)
        } else {
            None
        };

        let version = texture.version();
        if version == 0 || gpu.uploaded_version(id) == Some(version) {
            return Err(RegisterError::Stale(id));
        }

        match plan {
            Some(plan) => self.start_streaming(gpu, texture, plan),
            None => {
                gpu.hold(id);
                self.queues.uploads.push_back(UploadItem::Whole(texture.clone()));
                self.tracked.insert(id, Tracked::Whole);
                Ok(())
            }
        }
    }

    fn start_streaming(
        &mut self,
        gpu: &mut GpuTextures<B>,
        texture: &Arc<Texture>,
        plan: UploadPlan,
    ) -> Result<(), RegisterError> {
        let id = texture.id();
        let source = texture.image().cloned().ok_or(RegisterError::NoImage)?;

        let descriptor = StorageDescriptor::for_texture(
            texture,
            plan.source,
            plan.level_count(),
            gpu.backend().api(),
        );
        let handle = gpu.backend_mut().create_texture(&descriptor)?;
        if let Err(e) = gpu.upload_placeholder(texture) {
            gpu.backend_mut().delete_texture(handle);
            return Err(e.into());
        }
        gpu.hold(id);

        self.tracked.insert(
            id,
            Tracked::Streaming(Streaming {
                texture: texture.clone(),
                mode: self.config.mode,
                version: texture.version(),
                chunk_size: plan.chunk_size,
                level_count: plan.level_count(),
                max_mip_level: plan.max_mip_level(),
                allocated_levels: 0,
                chunk_count: plan.chunk_count,
                uploaded_chunks: 0,
                target: Target::Hidden(handle),
            }),
        );

        // Every allocation goes in before any of this texture's crops, so no
        // chunk can reach a level that doesn't exist yet.
        for &level in &plan.levels {
            self.queues
                .creates
                .push_back(CreateCommand::AllocateLevel { texture: id, level });
        }

        for &level in &plan.levels {
            if level.size == plan.source {
                enqueue_crops(&mut self.queues, id, level, source.clone(), plan.chunk_size);
            } else {
                self.decoder.submit(DecodeJob::Resize {
                    texture: id,
                    level,
                    source: source.clone(),
                });
                self.in_flight += 1;
            }
        }

        log::debug!(
            "Planned texture {id}: {} levels, {} chunks of {}",
            plan.level_count(),
            plan.chunk_count,
            plan.chunk_size
        );
        Ok(())
    }

    /// Advance by one frame. Never fails: problems with individual textures
    /// are logged and the rest of the work carries on.
    pub fn update(&mut self, gpu: &mut GpuTextures<B>) {
        self.collect_decoded();

        let frame = self.frame_count;
        self.frame_count += 1;
        if frame % u64::from(self.config.interval) != 0 {
            return;
        }

        self.upload_step(gpu);
        self.create_step(gpu);
    }

    fn collect_decoded(&mut self) {
        let mut decoded = mem::take(&mut self.decoded);
        self.decoder.drain(&mut decoded);

        for result in decoded.drain(..) {
            self.in_flight = self.in_flight.saturating_sub(1);
            match result {
                Decoded::Level {
                    texture,
                    level,
                    bitmap,
                } => {
                    let Some(Tracked::Streaming(record)) = self.tracked.get(&texture) else {
                        log::warn!(
                            "Dropping decoded level {} of untracked texture {texture}",
                            level.level
                        );
                        continue;
                    };
                    let chunk_size = record.chunk_size;
                    enqueue_crops(&mut self.queues, texture, level, bitmap, chunk_size);
                }
                Decoded::Chunk(chunk) => self.queues.uploads.push_back(UploadItem::Chunk(chunk)),
            }
        }

        self.decoded = decoded;
    }

    fn upload_step(&mut self, gpu: &mut GpuTextures<B>) {
        let count = match self.config.mode {
            UploadMode::AtTheSameTime => self.queues.uploads.len(),
            UploadMode::OneByOne | UploadMode::Partial | UploadMode::PartialNoInterim => 1,
        };

        for _ in 0..count {
            let Some(item) = self.queues.uploads.pop_front() else {
                break;
            };
            match item {
                UploadItem::Whole(texture) => self.release_whole(gpu, texture),
                UploadItem::Chunk(chunk) => self.upload_chunk(gpu, chunk),
            }
        }
    }

    fn release_whole(&mut self, gpu: &mut GpuTextures<B>, texture: Arc<Texture>) {
        let id = texture.id();
        gpu.release(id);
        self.tracked.remove(&id);
        log::debug!("Released texture {id} to the standard upload");
        (self.on_texture_upload)(&texture);
    }

    fn upload_chunk(&mut self, gpu: &mut GpuTextures<B>, chunk: ChunkUpload) {
        let id = chunk.texture;
        let Some(Tracked::Streaming(record)) = self.tracked.get_mut(&id) else {
            log::warn!("Dropping chunk of untracked texture {id}");
            return;
        };

        log::trace!(
            "Writing {}x{} chunk at ({}, {}) of level {} of texture {id}",
            chunk.pixels.width(),
            chunk.pixels.height(),
            chunk.x,
            chunk.y,
            chunk.level
        );
        let result = match &record.target {
            Target::Hidden(handle) => gpu
                .backend_mut()
                .write_region(handle, chunk.level, chunk.x, chunk.y, &chunk.pixels),
            Target::Exposed => gpu.write_to_live(id, chunk.level, chunk.x, chunk.y, &chunk.pixels),
        };
        if let Err(e) = result {
            log::error!(
                "Failed to write chunk at ({}, {}) of level {} of texture {id}: {e}",
                chunk.x,
                chunk.y,
                chunk.level
            );
        }

        record.uploaded_chunks += 1;
        debug_assert!(record.uploaded_chunks <= record.chunk_count);
        if record.uploaded_chunks < record.chunk_count {
            return;
        }

        let Some(Tracked::Streaming(record)) = self.tracked.remove(&id) else {
            return;
        };
        if let Target::Hidden(handle) = record.target {
            // Still hidden at the end means the old content stayed up the whole
            // time. Swap the new storage in and delete the old in one go.
            gpu.expose(id, handle, record.max_mip_level, record.version);
            log::debug!("Swapped in new storage for texture {id}");
        }
        gpu.release(id);
        log::debug!("Finished streaming texture {id} ({} chunks)", record.chunk_count);
        (self.on_texture_upload)(&record.texture);
    }

    fn create_step(&mut self, gpu: &mut GpuTextures<B>) {
        let Some(command) = self.queues.creates.pop_front() else {
            return;
        };

        match command {
            CreateCommand::AllocateLevel { texture, level } => {
                self.allocate_level(gpu, texture, level)
            }
            CreateCommand::CropChunk {
                texture,
                level,
                bitmap,
                rect,
            } => {
                if !self.tracked.contains_key(&texture) {
                    log::warn!("Dropping crop for untracked texture {texture}");
                    return;
                }
                self.decoder.submit(DecodeJob::Crop {
                    texture,
                    level,
                    bitmap,
                    rect,
                });
                self.in_flight += 1;
            }
        }
    }

    fn allocate_level(&mut self, gpu: &mut GpuTextures<B>, id: TextureId, level: MipLevel) {
        let Some(Tracked::Streaming(record)) = self.tracked.get_mut(&id) else {
            log::warn!("Dropping allocation for untracked texture {id}");
            return;
        };

        if let Target::Hidden(handle) = &record.target
            && let Err(e) = gpu.backend_mut().allocate_level(handle, level.level, level.size)
        {
            log::error!("Failed to allocate level {} of texture {id}: {e}", level.level);
        }

        record.allocated_levels += 1;
        log::trace!(
            "Allocated level {} ({}) of texture {id}, {}/{}",
            level.level,
            level.size,
            record.allocated_levels,
            record.level_count
        );
        if record.allocated_levels < record.level_count {
            return;
        }

        if record.mode == UploadMode::Partial
            && let Target::Hidden(handle) = mem::replace(&mut record.target, Target::Exposed)
        {
            gpu.expose(id, handle, record.max_mip_level, record.version);
            log::debug!("Exposed texture {id}, its chunks will appear as they land");
        }
    }
}

impl<B: GpuBackend> Debug for TextureUploader<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureUploader")
            .field("config", &self.config)
            .field("frame_count", &self.frame_count)
            .field("queued", &self.queues.len())
            .field("tracked", &self.tracked.len())
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

fn reject<T>(e: ConfigError) -> Result<T, ConfigError> {
    log::warn!("Configuration rejected: {e}");
    Err(e)
}

fn enqueue_crops(
    queues: &mut WorkQueues,
    texture: TextureId,
    level: MipLevel,
    bitmap: Arc<RgbaImage>,
    chunk_size: Dimensions,
) {
    for rect in plan_chunks(level.size, chunk_size) {
        queues.creates.push_back(CreateCommand::CropChunk {
            texture,
            level: level.level,
            bitmap: bitmap.clone(),
            rect,
        });
    }
}
