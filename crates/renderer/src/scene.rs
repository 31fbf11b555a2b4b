//! Per-frame state of the water surface, independent of the GPU.
//!
//! `WaterScene` owns everything that changes over time: the ripple store,
//! the crossfade controller, the slide cycler, running sweeps and the input
//! throttle. The render loop feeds it input and finished image loads between
//! frames and calls [`WaterScene::tick`] once per frame to get the values the
//! GPU needs.

use std::path::PathBuf;
use std::time::Instant;

use scheduler::{ImageCycler, SweepScheduler};
use tracing::{debug, error, info, warn};

use crate::geometry::{aspect_of, plane_dimensions, shader_resolution, PlaneSize};
use crate::input::{BoundingRect, InputAdapter, InputOutcome};
use crate::loader::{LoadError, LoadToken};
use crate::ripples::{RippleSlot, RippleStore, RIPPLE_SLOTS};
use crate::transition::{BeginOutcome, TransitionController, TransitionEvent, TransitionPhase};
use crate::types::{RendererError, SurfaceConfig};

/// Anything the scene can show as a slide.
pub trait SurfaceImage: Clone {
    fn dimensions(&self) -> (u32, u32);
}

/// Seconds since the surface was mounted; the time base of ripples and the
/// shader's `uTime`.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceClock {
    origin: Instant,
}

impl SurfaceClock {
    pub fn new(origin: Instant) -> Self {
        Self { origin }
    }

    pub fn seconds_at(&self, now: Instant) -> f32 {
        now.saturating_duration_since(self.origin).as_secs_f32()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub index: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FrameSnapshot<T> {
    pub time: f32,
    pub resolution: [f32; 2],
    pub aspect: f32,
    pub mix: f32,
    pub ripples: [RippleSlot; RIPPLE_SLOTS],
    pub ripple_count: usize,
    pub current: Option<T>,
    /// Incoming image; equal to `current` while idle.
    pub next: Option<T>,
    pub phase: TransitionPhase,
    pub plane: Option<PlaneSize>,
    /// Bumped whenever `plane` changes so the renderer knows to rebuild its
    /// vertex buffer.
    pub geometry_revision: u64,
}

#[derive(Debug, Clone, Copy)]
struct Viewport {
    physical: (u32, u32),
    scale_factor: f64,
}

pub struct WaterScene<T> {
    images: Vec<PathBuf>,
    ripples: RippleStore,
    ripple_export: [RippleSlot; RIPPLE_SLOTS],
    export_revision: u64,
    transition: TransitionController<T>,
    cycler: ImageCycler,
    sweeps: SweepScheduler,
    input: InputAdapter,
    clock: SurfaceClock,
    token: LoadToken,
    requests: Vec<LoadRequest>,
    released: Vec<T>,
    autostart: bool,
    max_pixel_ratio: f32,
    viewport: Viewport,
    plane: Option<PlaneSize>,
    geometry_revision: u64,
}

impl<T: SurfaceImage> WaterScene<T> {
    pub fn new(
        config: &SurfaceConfig,
        token: LoadToken,
        now: Instant,
    ) -> Result<Self, RendererError> {
        let cycler = ImageCycler::new(config.images.len(), config.slideshow_duration)?;
        let ripples = RippleStore::new(config.ripples.max_ripples, config.ripples.max_age);
        let ripple_export = ripples.export();
        let mut scene = Self {
            images: config.images.clone(),
            export_revision: ripples.revision(),
            ripples,
            ripple_export,
            transition: TransitionController::new(config.transition_duration, config.curve),
            cycler,
            sweeps: SweepScheduler::new(config.sweep, config.sweep_seed),
            input: InputAdapter::new(config.ripples.throttle),
            clock: SurfaceClock::new(now),
            token,
            requests: Vec::new(),
            released: Vec::new(),
            autostart: config.autostart,
            max_pixel_ratio: config.max_pixel_ratio,
            viewport: Viewport {
                physical: config.window_size,
                scale_factor: 1.0,
            },
            plane: None,
            geometry_revision: 0,
        };
        scene.request(0);
        Ok(scene)
    }

    pub fn ripples(&self) -> &RippleStore {
        &self.ripples
    }

    pub fn transition(&self) -> &TransitionController<T> {
        &self.transition
    }

    pub fn cycler(&self) -> &ImageCycler {
        &self.cycler
    }

    pub fn token(&self) -> &LoadToken {
        &self.token
    }

    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn take_load_requests(&mut self) -> Vec<LoadRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Images the scene no longer references; the caller frees their GPU
    /// memory.
    pub fn take_released(&mut self) -> Vec<T> {
        std::mem::take(&mut self.released)
    }

    pub fn set_viewport(&mut self, physical: (u32, u32), scale_factor: f64) {
        if physical.0 == 0 || physical.1 == 0 {
            return;
        }
        self.viewport = Viewport {
            physical,
            scale_factor,
        };
        self.refresh_plane();
    }

    pub fn start_slideshow(&mut self, now: Instant) {
        if !self.is_live() || self.cycler.is_running() {
            return;
        }
        info!(
            images = self.cycler.total(),
            period_ms = self.cycler.period().as_millis() as u64,
            "starting slideshow"
        );
        self.cycler.start(now);
    }

    pub fn stop(&mut self) {
        self.cycler.stop();
        self.sweeps.clear();
    }

    pub fn skip(&mut self, now: Instant) {
        if !self.is_live() {
            return;
        }
        if let Some(advance) = self.cycler.skip(now) {
            info!(index = advance.index, "skipping to next slide");
            self.request(advance.index);
        }
    }

    pub fn image_loaded(&mut self, index: usize, image: T, now: Instant) {
        if !self.is_live() {
            debug!(index, "ignoring image load after teardown");
            return;
        }
        match self.transition.begin(image, now) {
            BeginOutcome::Installed => {
                info!(index, "first image installed");
                self.cycler.set_index(index);
                self.refresh_plane();
                if self.autostart {
                    self.start_slideshow(now);
                }
            }
            BeginOutcome::Started => {
                debug!(index, "transition started");
                self.sweeps.begin(now);
            }
            BeginOutcome::Swapped { released } => {
                debug!(index, "image swapped without transition");
                self.released.extend(released);
                self.refresh_plane();
                self.sweeps.begin(now);
            }
            BeginOutcome::Queued { superseded } => {
                debug!(
                    index,
                    superseded = superseded.is_some(),
                    "transition in flight; image queued"
                );
                self.released.extend(superseded);
            }
        }
    }

    pub fn image_failed(&mut self, index: usize, err: &LoadError) {
        if !self.is_live() {
            return;
        }
        let path = self.images.get(index).cloned().unwrap_or_default();
        warn!(index, path = %path.display(), error = %err, "image failed to load; skipping slot");
        self.cycler.mark_absent(index);

        if self.transition.current().is_some() {
            return;
        }
        match self.cycler.next_present(index) {
            Some(next) if !self.cycler.is_absent(next) => {
                self.cycler.set_index(next);
                self.request(next);
            }
            _ => error!("no slideshow image could be loaded; surface stays blank"),
        }
    }

    pub fn pointer_moved(
        &mut self,
        client_x: f64,
        client_y: f64,
        rect: BoundingRect,
        now: Instant,
    ) -> InputOutcome {
        let outcome = self.input.pointer_moved(client_x, client_y, rect, now);
        self.apply_input(outcome, now);
        outcome
    }

    pub fn touch_moved(
        &mut self,
        client_x: f64,
        client_y: f64,
        rect: BoundingRect,
        now: Instant,
    ) -> InputOutcome {
        let outcome = self.input.touch_moved(client_x, client_y, rect, now);
        self.apply_input(outcome, now);
        outcome
    }

    fn apply_input(&mut self, outcome: InputOutcome, now: Instant) {
        if !self.is_live() {
            return;
        }
        if let Some((x, y)) = outcome.ripple {
            self.ripples.add(x, y, self.clock.seconds_at(now));
        }
        if outcome.first_interaction && !self.autostart {
            self.start_slideshow(now);
        }
    }

    /// Advances every timer to `now` and returns the frame's render inputs.
    pub fn tick(&mut self, now: Instant) -> FrameSnapshot<T> {
        let seconds = self.clock.seconds_at(now);

        if self.is_live() {
            if let Some(advance) = self.cycler.tick(now) {
                info!(index = advance.index, "advancing slideshow");
                self.request(advance.index);
            }
        }

        for step in self.sweeps.drain_due(now) {
            self.ripples
                .add(step.x, step.y, self.clock.seconds_at(step.at));
        }

        if let TransitionEvent::Completed {
            released,
            started_next,
        } = self.transition.tick(now)
        {
            debug!(started_next, "transition completed");
            self.released.extend(released);
            self.refresh_plane();
            if started_next {
                self.sweeps.begin(now);
            }
        }

        self.ripples.prune(seconds);
        if self.ripples.revision() != self.export_revision {
            self.ripple_export = self.ripples.export();
            self.export_revision = self.ripples.revision();
        }

        let current = self.transition.current().cloned();
        let next = self.transition.next().cloned().or_else(|| current.clone());
        FrameSnapshot {
            time: seconds,
            resolution: shader_resolution(
                self.viewport.physical,
                self.viewport.scale_factor,
                self.max_pixel_ratio,
            ),
            aspect: self.screen_aspect(),
            mix: self.transition.mix(),
            ripples: self.ripple_export,
            ripple_count: self.ripples.len(),
            current,
            next,
            phase: self.transition.phase(),
            plane: self.plane,
            geometry_revision: self.geometry_revision,
        }
    }

    /// Earliest timer deadline, for event-loop wake-ups.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.cycler.next_deadline(), self.sweeps.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Drops every image reference, returning them for release.
    pub fn clear_images(&mut self) -> Vec<T> {
        let mut images = self.transition.clear();
        images.append(&mut self.released);
        self.plane = None;
        images
    }

    fn screen_aspect(&self) -> f32 {
        aspect_of(self.viewport.physical.0, self.viewport.physical.1)
    }

    fn request(&mut self, index: usize) {
        if let Some(path) = self.images.get(index) {
            self.requests.push(LoadRequest {
                index,
                path: path.clone(),
            });
        }
    }

    fn refresh_plane(&mut self) {
        let plane = self.transition.current().map(|image| {
            let (width, height) = image.dimensions();
            plane_dimensions(aspect_of(width, height), self.screen_aspect())
        });
        if plane != self.plane {
            self.plane = plane;
            self.geometry_revision = self.geometry_revision.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::types::RippleLimits;

    #[derive(Debug, Clone, PartialEq)]
    struct Slide(&'static str, u32, u32);

    impl SurfaceImage for Slide {
        fn dimensions(&self) -> (u32, u32) {
            (self.1, self.2)
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn config(autostart: bool) -> SurfaceConfig {
        SurfaceConfig {
            images: vec!["a.png".into(), "b.png".into(), "c.png".into()],
            autostart,
            window_size: (2000, 1000),
            ..SurfaceConfig::default()
        }
    }

    fn mounted(autostart: bool, start: Instant) -> WaterScene<Slide> {
        let mut scene = WaterScene::new(&config(autostart), LoadToken::new(), start).unwrap();
        let requests = scene.take_load_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].index, 0);
        scene.image_loaded(0, Slide("a", 1000, 1000), start);
        scene
    }

    #[test]
    fn slideshow_advances_and_crossfades() {
        let start = Instant::now();
        let mut scene = mounted(true, start);
        assert_eq!(scene.tick(start + ms(4999)).phase, TransitionPhase::Idle);
        assert!(scene.take_load_requests().is_empty());

        scene.tick(start + ms(5000));
        let requests = scene.take_load_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].index, 1);
        assert_eq!(scene.cycler().index(), 1);

        scene.image_loaded(1, Slide("b", 1000, 1000), start + ms(5000));
        let frame = scene.tick(start + ms(5000));
        assert_eq!(
            frame.phase,
            TransitionPhase::Active {
                started_at: start + ms(5000)
            }
        );
        assert_eq!(frame.current, Some(Slide("a", 1000, 1000)));
        assert_eq!(frame.next, Some(Slide("b", 1000, 1000)));

        let frame = scene.tick(start + ms(6000));
        assert_eq!(frame.phase, TransitionPhase::Idle);
        assert_eq!(frame.mix, 0.0);
        assert_eq!(frame.current, Some(Slide("b", 1000, 1000)));
        assert_eq!(frame.next, frame.current);
        assert_eq!(scene.take_released(), vec![Slide("a", 1000, 1000)]);
    }

    #[test]
    fn transition_start_plays_sweep() {
        let start = Instant::now();
        let mut scene = mounted(true, start);
        scene.tick(start + ms(5000));
        scene.image_loaded(1, Slide("b", 1000, 1000), start + ms(5000));
        let frame = scene.tick(start + ms(5600));
        assert_eq!(frame.ripple_count, 5);
        let xs: Vec<f32> = frame.ripples.iter().map(|slot| slot.x).collect();
        assert_eq!(xs, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!((frame.ripples[0].created_at - 5.0).abs() < 1e-3);
        assert!((frame.ripples[4].created_at - 5.6).abs() < 1e-3);
    }

    #[test]
    fn ripples_expire_after_max_age() {
        let start = Instant::now();
        let mut scene = mounted(true, start);
        let rect = BoundingRect::from_size(100.0, 100.0);
        scene.pointer_moved(10.0, 10.0, rect, start + ms(100));
        assert_eq!(scene.tick(start + ms(3000)).ripple_count, 1);
        let frame = scene.tick(start + ms(3200));
        assert_eq!(frame.ripple_count, 0);
        assert!(frame.ripples.iter().all(RippleSlot::is_sentinel));
    }

    #[test]
    fn throttled_pointer_input() {
        let start = Instant::now();
        let rect = BoundingRect::from_size(100.0, 100.0);

        let mut scene = mounted(true, start);
        scene.pointer_moved(10.0, 10.0, rect, start);
        scene.pointer_moved(20.0, 10.0, rect, start + ms(50));
        assert_eq!(scene.ripples().len(), 1);

        let mut scene = mounted(true, start);
        scene.pointer_moved(10.0, 10.0, rect, start);
        scene.pointer_moved(20.0, 10.0, rect, start + ms(150));
        assert_eq!(scene.ripples().len(), 2);
    }

    #[test]
    fn first_interaction_arms_slideshow() {
        let start = Instant::now();
        let mut scene = mounted(false, start);
        assert!(!scene.cycler().is_running());
        scene.tick(start + ms(10_000));
        assert!(scene.take_load_requests().is_empty());

        let outcome = scene.touch_moved(5.0, 5.0, BoundingRect::from_size(10.0, 10.0), start);
        assert!(outcome.consumed);
        assert!(scene.cycler().is_running());
        assert_eq!(scene.next_deadline(), Some(start + ms(5000)));
    }

    #[test]
    fn queued_image_starts_after_active_transition() {
        let start = Instant::now();
        let mut scene = mounted(true, start);
        scene.image_loaded(1, Slide("b", 1000, 1000), start + ms(100));
        scene.image_loaded(2, Slide("c", 1000, 1000), start + ms(200));
        let frame = scene.tick(start + ms(700));
        assert_eq!(frame.next, Some(Slide("b", 1000, 1000)));

        let frame = scene.tick(start + ms(1100));
        assert_eq!(frame.current, Some(Slide("b", 1000, 1000)));
        assert_eq!(frame.next, Some(Slide("c", 1000, 1000)));
        assert_eq!(
            frame.phase,
            TransitionPhase::Active {
                started_at: start + ms(1100)
            }
        );
        assert_eq!(scene.next_deadline(), Some(start + ms(1100)));
    }

    #[test]
    fn first_image_failure_requests_next_slot() {
        let start = Instant::now();
        let mut scene: WaterScene<Slide> =
            WaterScene::new(&config(true), LoadToken::new(), start).unwrap();
        scene.take_load_requests();
        scene.image_failed(0, &LoadError::WorkerLost);
        let requests = scene.take_load_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].index, 1);
        assert!(scene.cycler().is_absent(0));

        scene.image_failed(1, &LoadError::WorkerLost);
        scene.image_failed(2, &LoadError::WorkerLost);
        assert_eq!(scene.take_load_requests().len(), 1);
        assert!(scene.tick(start).current.is_none());
    }

    #[test]
    fn loads_after_teardown_are_ignored() {
        let start = Instant::now();
        let mut scene = mounted(true, start);
        scene.token().cancel();
        scene.stop();
        scene.image_loaded(1, Slide("b", 1000, 1000), start + ms(10));
        let frame = scene.tick(start + ms(20_000));
        assert_eq!(frame.phase, TransitionPhase::Idle);
        assert_eq!(frame.current, Some(Slide("a", 1000, 1000)));
        assert!(scene.take_load_requests().is_empty());
    }

    #[test]
    fn geometry_follows_viewport_and_image() {
        let start = Instant::now();
        let mut scene = mounted(true, start);
        let frame = scene.tick(start);
        assert_eq!(
            frame.plane,
            Some(PlaneSize {
                width: 4.0,
                height: 4.0
            })
        );
        let revision = frame.geometry_revision;

        scene.set_viewport((1000, 1000), 1.0);
        let frame = scene.tick(start);
        assert_eq!(
            frame.plane,
            Some(PlaneSize {
                width: 2.0,
                height: 2.0
            })
        );
        assert!(frame.geometry_revision != revision);
    }

    #[test]
    fn custom_ripple_capacity() {
        let start = Instant::now();
        let config = SurfaceConfig {
            ripples: RippleLimits {
                max_ripples: 2,
                throttle: Duration::ZERO,
                ..RippleLimits::default()
            },
            ..config(true)
        };
        let mut scene: WaterScene<Slide> =
            WaterScene::new(&config, LoadToken::new(), start).unwrap();
        let rect = BoundingRect::from_size(10.0, 10.0);
        for i in 0..4 {
            scene.pointer_moved(i as f64, 1.0, rect, start + ms(i));
        }
        let frame = scene.tick(start + ms(10));
        assert_eq!(frame.ripple_count, 2);
        assert!(frame.ripples[2].is_sentinel());
    }
}
