//! Streams one image onto a headless GPU and reports progress per frame.
//!
//! ```text
//! stream_demo path/to/image.png --mode partial_no_interim --chunk-size 128
//! ```
//!
//! Set `RUST_LOG=debug` (or `trace`) to see the scheduler's own logging.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use uploader::{
    ChunkSize, GpuTextures, Texture, TextureUploader, UploadMode, UploaderConfig, WgpuBackend,
};

/// Parsed command line arguments.
#[derive(Parser, Debug, Clone)]
#[command(about = "Stream an image to the GPU a few chunks per frame.")]
struct Args {
    /// The image to upload. Chunked modes need power-of-two sides.
    image: PathBuf,

    /// A JSON configuration file. Flags given on the command line override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// one_by_one, at_the_same_time, partial or partial_no_interim.
    #[arg(long)]
    mode: Option<UploadMode>,

    /// The side length of a (square) chunk.
    #[arg(long)]
    chunk_size: Option<u32>,

    /// Only do work every this many frames.
    #[arg(long)]
    interval: Option<u32>,

    /// How long a simulated frame lasts, in milliseconds.
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Give up after this many frames.
    #[arg(long, default_value_t = 100_000)]
    max_frames: u64,
}

impl Args {
    fn uploader_config(&self) -> Result<UploaderConfig, uploader::ConfigError> {
        let mut config = match &self.config {
            Some(path) => UploaderConfig::from_json_file(path)?,
            None => UploaderConfig::default(),
        };
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(side) = self.chunk_size {
            config.chunk_size = ChunkSize::new(side, side);
        }
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let config = match args.uploader_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let image = match image::open(&args.image) {
        Ok(image) => image.to_rgba8(),
        Err(e) => {
            eprintln!("Failed to open {}: {e}", args.image.display());
            return ExitCode::FAILURE;
        }
    };

    let backend = match WgpuBackend::request_headless() {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("No GPU available: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut gpu = GpuTextures::new(backend);

    let mut uploader = match TextureUploader::new(config) {
        Ok(uploader) => uploader,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let done = Arc::new(AtomicBool::new(false));
    let done_flag = done.clone();
    uploader.set_on_texture_upload(move |texture: &Texture| {
        log::info!("Texture {} is fully uploaded", texture.id());
        done_flag.store(true, Ordering::Release);
    });

    let texture = Texture::builder().image(image).build();
    texture.mark_needs_update();
    if let Err(e) = uploader.add_texture(&mut gpu, &texture) {
        eprintln!("Can't upload {}: {e}", args.image.display());
        return ExitCode::FAILURE;
    }

    println!(
        "Uploading {} ({}) with {}",
        args.image.display(),
        texture.dimensions().map(|d| d.to_string()).unwrap_or_default(),
        config.mode
    );

    let frame_time = Duration::from_millis(args.frame_ms);
    let started = Instant::now();
    for frame in 0..args.max_frames {
        let frame_start = Instant::now();
        uploader.update(&mut gpu);
        // What a renderer does before drawing with the texture.
        if let Err(e) = gpu.prepare(&texture) {
            eprintln!("Upload failed: {e}");
            return ExitCode::FAILURE;
        }
        let work = frame_start.elapsed();

        if let Some(progress) = uploader.progress(texture.id()) {
            println!(
                "frame {frame:>5}: levels {}/{}, chunks {}/{} ({work:?})",
                progress.allocated_levels,
                progress.level_count,
                progress.uploaded_chunks,
                progress.chunk_count
            );
        } else {
            println!("frame {frame:>5}: ({work:?})");
        }

        if done.load(Ordering::Acquire) {
            let flushed = gpu.backend().device().poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(Duration::from_secs(5)),
            });
            if let Err(e) = flushed {
                log::warn!("Failed to wait for the GPU to finish: {e}");
            }
            println!("Done after {} frames in {:?}", frame + 1, started.elapsed());
            return ExitCode::SUCCESS;
        }

        thread::sleep(frame_time.saturating_sub(work));
    }

    eprintln!("Gave up after {} frames", args.max_frames);
    ExitCode::FAILURE
}
