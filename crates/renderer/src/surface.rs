//! The mounted water surface: GPU state, scene and image loader bound to
//! one window.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::gpu::{GpuState, ImageTexture};
use crate::input::{BoundingRect, InputOutcome};
use crate::lifecycle::{Lifecycle, TeardownHooks};
use crate::loader::{ImageLoader, LoadToken};
use crate::runtime::FrameScheduler;
use crate::scene::WaterScene;
use crate::types::{RendererError, SurfaceConfig};

pub struct WaterSurface {
    gpu: GpuState,
    scene: WaterScene<Arc<ImageTexture>>,
    loader: ImageLoader,
    frames: FrameScheduler,
    lifecycle: Lifecycle,
    input_attached: bool,
    // Dropped after `gpu`, whose surface borrows the window's handles.
    window: Arc<Window>,
}

impl WaterSurface {
    /// Creates the GPU context, water program and scene for `window` and
    /// requests the first image. Fails with
    /// [`RendererError::ResourceUnavailable`] when the GPU, the program or the
    /// loader thread cannot be set up.
    pub fn mount(window: Arc<Window>, config: SurfaceConfig) -> Result<Self, RendererError> {
        let size = window.inner_size();
        let gpu = construct("GPU renderer", || {
            GpuState::new(window.as_ref(), size, config.antialiasing)
        })?;
        debug!(sample_count = gpu.sample_count(), "GPU context ready");

        let token = LoadToken::new();
        let loader = construct("image loader", || Ok(ImageLoader::spawn(token.clone())?))?;

        let now = Instant::now();
        let mut scene = WaterScene::new(&config, token, now)?;
        let surface_size = gpu.size();
        scene.set_viewport((surface_size.width, surface_size.height), window.scale_factor());

        let mut lifecycle = Lifecycle::new();
        lifecycle.mount();

        let mut surface = Self {
            gpu,
            scene,
            loader,
            frames: FrameScheduler::new(config.target_fps),
            lifecycle,
            input_attached: true,
            window,
        };
        surface.dispatch_load_requests();
        info!(
            images = config.images.len(),
            width = surface_size.width,
            height = surface_size.height,
            "water surface mounted"
        );
        Ok(surface)
    }

    pub fn window(&self) -> &Window {
        self.window.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_live()
    }

    pub fn start_slideshow(&mut self, now: Instant) {
        if self.is_active() {
            self.scene.start_slideshow(now);
        }
    }

    pub fn skip(&mut self, now: Instant) {
        if self.is_active() {
            self.scene.skip(now);
            self.dispatch_load_requests();
        }
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64, now: Instant) -> Option<InputOutcome> {
        if !self.input_attached {
            return None;
        }
        let rect = self.bounding_rect();
        Some(self.scene.pointer_moved(x, y, rect, now))
    }

    pub fn touch_moved(&mut self, x: f64, y: f64, now: Instant) -> Option<InputOutcome> {
        if !self.input_attached {
            return None;
        }
        let rect = self.bounding_rect();
        Some(self.scene.touch_moved(x, y, rect, now))
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if !self.is_active() || new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.gpu.resize(new_size);
        let size = self.gpu.size();
        self.scene
            .set_viewport((size.width, size.height), self.window.scale_factor());
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        if !self.is_active() {
            return;
        }
        let size = self.gpu.size();
        self.scene
            .set_viewport((size.width, size.height), scale_factor);
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.gpu.size()
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        self.is_active() && self.frames.ready_for_frame(now)
    }

    /// Earliest moment the event loop has to wake up: a capped frame, a
    /// slide change or a sweep step.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.is_active() {
            return None;
        }
        [self.frames.next_deadline(), self.scene.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Consumes finished loads, advances the scene to `now` and draws.
    pub fn render_frame(&mut self, now: Instant) -> Result<(), wgpu::SurfaceError> {
        if !self.is_active() {
            return Ok(());
        }
        self.collect_loads(now);

        let frame = self.scene.tick(now);
        self.dispatch_load_requests();
        for texture in self.scene.take_released() {
            self.gpu.release_image(&texture);
        }

        let result = self.gpu.render(&frame);
        self.frames.mark_rendered(now);
        result
    }

    pub fn reconfigure(&mut self) {
        self.gpu.reconfigure();
    }

    /// Releases everything in order. Safe to call more than once.
    pub fn teardown(&mut self) {
        let mut hooks = SurfaceTeardown {
            scene: &mut self.scene,
            gpu: &mut self.gpu,
            loader: &mut self.loader,
            frames: &mut self.frames,
            input_attached: &mut self.input_attached,
        };
        if self.lifecycle.teardown(&mut hooks) {
            info!("water surface torn down");
        }
    }

    fn bounding_rect(&self) -> BoundingRect {
        let size = self.window.inner_size();
        BoundingRect::from_size(f64::from(size.width), f64::from(size.height))
    }

    fn collect_loads(&mut self, now: Instant) {
        for result in self.loader.poll() {
            match result.image {
                Ok(image) => {
                    let Some(texture) = self.gpu.upload_image(&image) else {
                        debug!(index = result.index, "GPU released; dropping decoded slide");
                        continue;
                    };
                    debug!(
                        index = result.index,
                        width = texture.width,
                        height = texture.height,
                        "uploaded slide"
                    );
                    self.scene.image_loaded(result.index, texture, now);
                }
                Err(err) => self.scene.image_failed(result.index, &err),
            }
        }
    }

    fn dispatch_load_requests(&mut self) {
        for request in self.scene.take_load_requests() {
            if let Err(err) = self.loader.request(request.index, request.path.clone()) {
                warn!(
                    index = request.index,
                    path = %request.path.display(),
                    error = %err,
                    "could not queue image load"
                );
                self.scene.image_failed(request.index, &err);
            }
        }
    }
}

impl Drop for WaterSurface {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Runs one construction step of [`WaterSurface::mount`]. Any failure is
/// fatal for the surface and reported as `ResourceUnavailable`.
fn construct<R>(
    what: &'static str,
    step: impl FnOnce() -> anyhow::Result<R>,
) -> Result<R, RendererError> {
    step().map_err(|err| {
        error!(what, error = %format!("{err:#}"), "surface construction failed");
        RendererError::unavailable(what, format!("{err:#}"))
    })
}

struct SurfaceTeardown<'a> {
    scene: &'a mut WaterScene<Arc<ImageTexture>>,
    gpu: &'a mut GpuState,
    loader: &'a mut ImageLoader,
    frames: &'a mut FrameScheduler,
    input_attached: &'a mut bool,
}

impl TeardownHooks for SurfaceTeardown<'_> {
    fn stop_cycler(&mut self) {
        self.scene.stop();
    }

    fn cancel_render_loop(&mut self) {
        self.frames.pause();
        self.loader.shutdown();
    }

    fn release_gpu(&mut self) {
        for texture in self.scene.clear_images() {
            self.gpu.release_image(&texture);
        }
        self.gpu.release();
    }

    fn detach_input(&mut self) {
        *self.input_attached = false;
    }
}
