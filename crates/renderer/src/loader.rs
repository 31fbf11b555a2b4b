//! Off-thread image decoding.
//!
//! Decoding is the only work that leaves the render thread. Requests go to a
//! single worker over a channel; results come back on another channel that
//! the render thread drains at the start of each frame. A shared
//! [`LoadToken`] marks the surface as alive; once it is cancelled the worker
//! skips queued requests and late results are discarded.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use image::imageops::flip_vertical_in_place;
use image::RgbaImage;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("load cancelled")]
    Cancelled,
    #[error("image loader worker exited")]
    WorkerLost,
}

/// Shared liveness flag between the surface and in-flight loads.
#[derive(Debug, Clone, Default)]
pub struct LoadToken(Arc<AtomicBool>);

impl LoadToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Decodes `path` into RGBA8 rows ordered bottom-up, matching texture
/// coordinates where `v = 0` is the bottom edge.
pub fn decode_image(path: &Path) -> Result<RgbaImage, LoadError> {
    let image = image::open(path).map_err(|source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rgba = image.to_rgba8();
    flip_vertical_in_place(&mut rgba);
    Ok(rgba)
}

#[derive(Debug)]
pub struct LoadResult {
    pub index: usize,
    pub path: PathBuf,
    pub image: Result<RgbaImage, LoadError>,
}

struct LoadJob {
    index: usize,
    path: PathBuf,
}

pub struct ImageLoader {
    requests: Option<Sender<LoadJob>>,
    results: Receiver<LoadResult>,
    worker: Option<JoinHandle<()>>,
    token: LoadToken,
    pending: usize,
}

impl ImageLoader {
    pub fn spawn(token: LoadToken) -> std::io::Result<Self> {
        Self::spawn_with(token, decode_image)
    }

    fn spawn_with<F>(token: LoadToken, decode: F) -> std::io::Result<Self>
    where
        F: Fn(&Path) -> Result<RgbaImage, LoadError> + Send + 'static,
    {
        let (request_tx, request_rx) = unbounded::<LoadJob>();
        let (result_tx, result_rx) = unbounded();
        let worker_token = token.clone();
        let worker = thread::Builder::new()
            .name("ripplewall-loader".into())
            .spawn(move || run_worker(request_rx, result_tx, worker_token, decode))?;
        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            worker: Some(worker),
            token,
            pending: 0,
        })
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn request(&mut self, index: usize, path: PathBuf) -> Result<(), LoadError> {
        if self.token.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        let sender = self.requests.as_ref().ok_or(LoadError::WorkerLost)?;
        debug!(index, path = %path.display(), "requesting image");
        sender
            .send(LoadJob { index, path })
            .map_err(|_| LoadError::WorkerLost)?;
        self.pending += 1;
        Ok(())
    }

    /// Drains finished loads without blocking. Results that arrive after the
    /// token was cancelled are dropped.
    pub fn poll(&mut self) -> Vec<LoadResult> {
        let mut ready = Vec::new();
        loop {
            match self.results.try_recv() {
                Ok(result) => {
                    self.pending = self.pending.saturating_sub(1);
                    if self.token.is_cancelled() {
                        debug!(
                            index = result.index,
                            path = %result.path.display(),
                            "dropping image load completed after teardown"
                        );
                        continue;
                    }
                    ready.push(result);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.pending > 0 && !self.token.is_cancelled() {
                        warn!(pending = self.pending, "image loader worker disconnected");
                    }
                    self.requests = None;
                    self.pending = 0;
                    break;
                }
            }
        }
        ready
    }

    /// Cancels the token and closes the request channel. A worker still busy
    /// decoding is detached; it exits after the current image and its result
    /// is never read.
    pub fn shutdown(&mut self) {
        self.token.cancel();
        self.requests = None;
        let Some(worker) = self.worker.take() else {
            return;
        };
        if worker.is_finished() {
            if worker.join().is_err() {
                warn!("image loader worker panicked");
            }
        } else {
            debug!("detaching image loader worker mid-decode");
        }
    }
}

impl Drop for ImageLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<F>(
    requests: Receiver<LoadJob>,
    results: Sender<LoadResult>,
    token: LoadToken,
    decode: F,
) where
    F: Fn(&Path) -> Result<RgbaImage, LoadError>,
{
    for job in requests.iter() {
        if token.is_cancelled() {
            break;
        }
        let image = decode(&job.path);
        if results
            .send(LoadResult {
                index: job.index,
                path: job.path,
                image,
            })
            .is_err()
        {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        let mut image = RgbaImage::new(width, height);
        for (_, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = if y == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            };
        }
        image.save(&path).expect("write png");
        path
    }

    fn wait_for(loader: &mut ImageLoader, count: usize) -> Vec<LoadResult> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut results = Vec::new();
        while results.len() < count && Instant::now() < deadline {
            results.extend(loader.poll());
            std::thread::sleep(Duration::from_millis(5));
        }
        results
    }

    #[test]
    fn decode_flips_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_png(dir.path(), "flip.png", 2, 2);
        let decoded = decode_image(&path).expect("decode");
        assert_eq!(decoded.get_pixel(0, 1).0, [255, 0, 0, 255]);
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn loads_on_worker_thread() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = write_png(dir.path(), "good.png", 4, 2);
        let missing = dir.path().join("missing.png");

        let mut loader = ImageLoader::spawn(LoadToken::new()).unwrap();
        loader.request(0, good).unwrap();
        loader.request(1, missing).unwrap();
        let mut results = wait_for(&mut loader, 2);
        results.sort_by_key(|result| result.index);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].image.as_ref().unwrap().dimensions(), (4, 2));
        assert!(matches!(results[1].image, Err(LoadError::Decode { .. })));
        assert_eq!(loader.pending(), 0);
    }

    #[test]
    fn cancelled_token_rejects_and_drops() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_png(dir.path(), "late.png", 1, 1);
        let token = LoadToken::new();
        let mut loader = ImageLoader::spawn(token.clone()).unwrap();
        loader.request(0, path.clone()).unwrap();
        token.cancel();
        assert!(matches!(loader.request(1, path), Err(LoadError::Cancelled)));
        std::thread::sleep(Duration::from_millis(50));
        assert!(loader.poll().is_empty());
    }

    #[test]
    fn shutdown_does_not_wait_for_slow_decode() {
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        let mut loader = ImageLoader::spawn_with(LoadToken::new(), move |_path: &Path| {
            let _ = started_tx.send(());
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
            Ok(RgbaImage::new(1, 1))
        })
        .unwrap();

        loader.request(0, PathBuf::from("huge.png")).unwrap();
        started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker picked up the request");

        let started = Instant::now();
        loader.shutdown();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(loader.poll().is_empty());
        let _ = release_tx.send(());
    }
}
