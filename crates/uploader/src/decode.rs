//! Resizing and cropping of source images, off the frame loop.
//!
//! The scheduler hands [DecodeJob]s to a [Decoder] and collects [Decoded]
//! results on later frames. Results may come back in any order.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel as cb;
use media::{RgbaImage, bitmap};

use crate::planner::{ChunkRect, MipLevel};
use crate::queues::ChunkUpload;
use crate::texture::TextureId;

/// A unit of CPU-side image work.
#[derive(Debug, Clone)]
pub enum DecodeJob {
    /// Produce the bitmap for one mip level from the source image.
    Resize {
        texture: TextureId,
        level: MipLevel,
        source: Arc<RgbaImage>,
    },
    /// Cut one chunk out of a level bitmap.
    Crop {
        texture: TextureId,
        level: u32,
        bitmap: Arc<RgbaImage>,
        rect: ChunkRect,
    },
}

/// The result of a [DecodeJob].
#[derive(Debug, Clone)]
pub enum Decoded {
    Level {
        texture: TextureId,
        level: MipLevel,
        bitmap: Arc<RgbaImage>,
    },
    Chunk(ChunkUpload),
}

impl DecodeJob {
    pub fn texture(&self) -> TextureId {
        match self {
            DecodeJob::Resize { texture, .. } | DecodeJob::Crop { texture, .. } => *texture,
        }
    }

    /// Do the work on the calling thread.
    pub fn run(self) -> Decoded {
        match self {
            DecodeJob::Resize {
                texture,
                level,
                source,
            } => {
                let started = Instant::now();
                let resized = bitmap::resize(&source, level.size);
                log::trace!(
                    "Resized texture {texture} to {} for level {} in {:?}",
                    level.size,
                    level.level,
                    started.elapsed()
                );
                Decoded::Level {
                    texture,
                    level,
                    bitmap: Arc::new(resized),
                }
            }
            DecodeJob::Crop {
                texture,
                level,
                bitmap,
                rect,
            } => Decoded::Chunk(ChunkUpload {
                texture,
                level,
                x: rect.x,
                y: rect.y,
                pixels: bitmap::crop(&bitmap, rect.x, rect.y, rect.size),
            }),
        }
    }
}

/// Somewhere to run [DecodeJob]s.
///
/// Every submitted job must eventually come out of [Self::drain] exactly once,
/// though not necessarily in submission order.
pub trait Decoder {
    fn submit(&mut self, job: DecodeJob);

    /// Move every finished result into `out` without blocking.
    fn drain(&mut self, out: &mut Vec<Decoded>);
}

/// Runs each job immediately on [Decoder::submit]. Results are handed out on
/// the next drain, in submission order.
#[derive(Debug, Default)]
pub struct InlineDecoder {
    finished: Vec<Decoded>,
}

impl InlineDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for InlineDecoder {
    fn submit(&mut self, job: DecodeJob) {
        self.finished.push(job.run());
    }

    fn drain(&mut self, out: &mut Vec<Decoded>) {
        out.append(&mut self.finished);
    }
}

/// A pool of worker threads sharing one job channel.
///
/// Dropping the decoder throws away the jobs still waiting in the channel,
/// lets the workers finish their current job and then joins them.
#[derive(Debug)]
pub struct ThreadedDecoder {
    jobs: Option<cb::Sender<DecodeJob>>,
    /// The decoder's own end of the job channel, for emptying it on drop.
    backlog: cb::Receiver<DecodeJob>,
    results: cb::Receiver<Decoded>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadedDecoder {
    /// Start `workers` threads.
    pub fn new(workers: NonZeroUsize) -> Self {
        let (job_tx, job_rx) = cb::unbounded::<DecodeJob>();
        let (result_tx, result_rx) = cb::unbounded::<Decoded>();

        let workers = (0..workers.get())
            .map(|_| {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                thread::spawn(move || {
                    for job in job_rx {
                        if result_tx.send(job.run()).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();

        Self {
            jobs: Some(job_tx),
            backlog: job_rx,
            results: result_rx,
            workers,
        }
    }

    /// One worker per available core (or a single worker if that's unknown).
    pub fn with_available_parallelism() -> Self {
        Self::new(thread::available_parallelism().unwrap_or(NonZeroUsize::MIN))
    }
}

impl Decoder for ThreadedDecoder {
    fn submit(&mut self, job: DecodeJob) {
        // `backlog` keeps the channel connected, so sending never fails.
        if let Some(jobs) = &self.jobs
            && let Err(cb::SendError(job)) = jobs.send(job)
        {
            log::error!("Dropped decode job for texture {}", job.texture());
        }
    }

    fn drain(&mut self, out: &mut Vec<Decoded>) {
        out.extend(self.results.try_iter());
    }
}

impl Drop for ThreadedDecoder {
    fn drop(&mut self) {
        let abandoned = self.backlog.try_iter().count();
        if abandoned > 0 {
            log::debug!("Abandoned {abandoned} queued decode jobs");
        }
        // Closing the job channel ends each worker's loop.
        drop(self.jobs.take());
        for worker in self.workers.drain(..) {
            _ = worker.join();
        }
    }
}
