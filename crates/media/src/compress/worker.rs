//! A background thread that compresses images on request.
//!
//! Requests and responses travel over channels, so a host can fire off a
//! request from its frame loop and collect the result on a later frame without
//! blocking.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{self as cb, RecvTimeoutError, TryRecvError};
use image::RgbaImage;

use super::{CompressError, CompressFlags, compress_image};

/// Where the pixels to compress come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// An encoded image file, decoded on the worker.
    Path(PathBuf),
    /// An already decoded bitmap.
    Bitmap(RgbaImage),
    /// Tightly packed 8-bit RGBA pixels.
    Pixels { data: Vec<u8>, width: u32, height: u32 },
}

impl ImageSource {
    fn into_bitmap(self) -> Result<RgbaImage, CompressError> {
        match self {
            ImageSource::Path(path) => Ok(image::open(path)?.to_rgba8()),
            ImageSource::Bitmap(bitmap) => Ok(bitmap),
            ImageSource::Pixels {
                data,
                width,
                height,
            } => {
                let expected = width as usize * height as usize * 4;
                let actual = data.len();
                RgbaImage::from_raw(width, height, data)
                    .ok_or(CompressError::DataSizeMismatch { expected, actual })
            }
        }
    }
}

/// A request to compress `source` with `flags`.
#[derive(Debug, Clone)]
pub struct CompressRequest {
    pub source: ImageSource,
    pub flags: CompressFlags,
}

/// Compressed block data plus the source's size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// What the worker sends back for each request, in request order.
pub type CompressResponse = Result<CompressedImage, CompressError>;

/// Owns the compression thread. Dropping the worker closes the request
/// channel and joins the thread (after it finishes the request in progress).
#[derive(Debug)]
pub struct CompressionWorker {
    requests: Option<cb::Sender<CompressRequest>>,
    responses: cb::Receiver<CompressResponse>,
    thread: Option<JoinHandle<()>>,
}

impl CompressionWorker {
    /// Start the worker thread.
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = cb::unbounded::<CompressRequest>();
        let (response_tx, response_rx) = cb::unbounded::<CompressResponse>();

        let thread = thread::spawn(move || {
            // Ends once every sender is gone.
            for request in request_rx {
                if response_tx.send(handle(request)).is_err() {
                    break;
                }
            }
        });

        Self {
            requests: Some(request_tx),
            responses: response_rx,
            thread: Some(thread),
        }
    }

    /// Queue a request. Responses come back in the order requests were made.
    pub fn request(&self, request: CompressRequest) -> Result<(), CompressError> {
        self.requests
            .as_ref()
            .ok_or(CompressError::WorkerGone)?
            .send(request)
            .map_err(|_| CompressError::WorkerGone)
    }

    /// Take a finished response if one is waiting. Never blocks.
    pub fn try_recv(&self) -> Option<CompressResponse> {
        match self.responses.try_recv() {
            Ok(response) => Some(response),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(CompressError::WorkerGone)),
        }
    }

    /// Wait for the next response.
    pub fn recv(&self) -> CompressResponse {
        self.responses.recv().unwrap_or(Err(CompressError::WorkerGone))
    }

    /// Wait up to `timeout` for the next response, returning [None] if none
    /// arrived in time.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<CompressResponse> {
        match self.responses.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(CompressError::WorkerGone)),
        }
    }
}

impl Drop for CompressionWorker {
    fn drop(&mut self) {
        drop(self.requests.take());
        if let Some(thread) = self.thread.take() {
            _ = thread.join();
        }
    }
}

fn handle(request: CompressRequest) -> CompressResponse {
    let bitmap = request.source.into_bitmap()?;
    let (width, height) = bitmap.dimensions();

    let started = Instant::now();
    let data = compress_image(&bitmap, request.flags)?;
    log::debug!(
        "Compressed {width}x{height} image ({} bytes, {:?}) in {:?}",
        data.len(),
        request.flags.format(),
        started.elapsed()
    );

    Ok(CompressedImage {
        data,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::storage_requirements;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn responses_come_back_in_request_order() {
        let worker = CompressionWorker::spawn();

        worker
            .request(CompressRequest {
                source: ImageSource::Bitmap(RgbaImage::new(8, 8)),
                flags: CompressFlags::DXT5,
            })
            .unwrap();
        worker
            .request(CompressRequest {
                source: ImageSource::Pixels {
                    data: vec![255; 4 * 4 * 4],
                    width: 4,
                    height: 4,
                },
                flags: CompressFlags::default(),
            })
            .unwrap();

        let first = worker.recv_timeout(TIMEOUT).unwrap().unwrap();
        assert_eq!((first.width, first.height), (8, 8));
        assert_eq!(first.data.len(), storage_requirements(8, 8, CompressFlags::DXT5));

        let second = worker.recv_timeout(TIMEOUT).unwrap().unwrap();
        assert_eq!((second.width, second.height), (4, 4));
        assert_eq!(second.data.len(), 8);
    }

    #[test]
    fn bad_pixel_buffers_are_reported() {
        let worker = CompressionWorker::spawn();
        worker
            .request(CompressRequest {
                source: ImageSource::Pixels {
                    data: vec![0; 10],
                    width: 4,
                    height: 4,
                },
                flags: CompressFlags::default(),
            })
            .unwrap();

        assert!(matches!(
            worker.recv_timeout(TIMEOUT),
            Some(Err(CompressError::DataSizeMismatch {
                expected: 64,
                actual: 10
            }))
        ));
    }

    #[test]
    fn missing_files_are_reported() {
        let worker = CompressionWorker::spawn();
        worker
            .request(CompressRequest {
                source: ImageSource::Path("definitely/not/here.png".into()),
                flags: CompressFlags::default(),
            })
            .unwrap();

        assert!(matches!(
            worker.recv_timeout(TIMEOUT),
            Some(Err(CompressError::Image(_)))
        ));
    }

    #[test]
    fn try_recv_does_not_block() {
        let worker = CompressionWorker::spawn();
        assert!(worker.try_recv().is_none());
    }
}
