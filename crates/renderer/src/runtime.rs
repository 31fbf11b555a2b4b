use std::time::{Duration, Instant};

use slideconfig::MIN_FPS;

/// Decides when the window should be asked for another frame.
///
/// Without a cap every loop iteration requests a redraw and the Fifo present
/// mode paces the loop to the display. With a cap, frames are spaced at least
/// `1 / fps` apart and [`FrameScheduler::next_deadline`] tells the event loop
/// how long it may sleep.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    /// Minimum spacing between frames; `None` follows the display.
    interval: Option<Duration>,
    last_frame: Option<Instant>,
    paused: bool,
}

impl FrameScheduler {
    /// Caps below [`MIN_FPS`] or non-finite caps are treated as uncapped.
    pub fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps >= MIN_FPS)
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)));
        Self {
            interval,
            last_frame: None,
            paused: false,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stops issuing frames for good; used when the surface is torn down.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        if self.paused {
            return false;
        }
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => now >= last + interval,
            _ => true,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_frame = Some(now);
    }

    /// When the next capped frame is due. `None` means either "render as
    /// soon as possible" or, when paused, "never".
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.paused {
            return None;
        }
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => Some(last + interval),
            _ => None,
        }
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_is_always_ready() {
        let start = Instant::now();
        let mut frames = FrameScheduler::new(None);
        assert!(frames.ready_for_frame(start));
        frames.mark_rendered(start);
        assert!(frames.ready_for_frame(start));
        assert_eq!(frames.next_deadline(), None);
    }

    #[test]
    fn cap_spaces_frames() {
        let start = Instant::now();
        let mut frames = FrameScheduler::new(Some(20.0));
        assert_eq!(frames.interval(), Some(Duration::from_millis(50)));
        assert!(frames.ready_for_frame(start));
        frames.mark_rendered(start);
        assert!(!frames.ready_for_frame(start + Duration::from_millis(49)));
        assert!(frames.ready_for_frame(start + Duration::from_millis(50)));
        assert_eq!(
            frames.next_deadline(),
            Some(start + Duration::from_millis(50))
        );
    }

    #[test]
    fn invalid_caps_mean_uncapped() {
        assert_eq!(FrameScheduler::new(Some(0.0)).interval(), None);
        assert_eq!(FrameScheduler::new(Some(-5.0)).interval(), None);
        assert_eq!(FrameScheduler::new(Some(f32::NAN)).interval(), None);
        assert_eq!(FrameScheduler::new(Some(1e-30)).interval(), None);
        assert_eq!(FrameScheduler::new(Some(f32::INFINITY)).interval(), None);
    }

    #[test]
    fn paused_never_renders() {
        let start = Instant::now();
        let mut frames = FrameScheduler::new(Some(30.0));
        frames.mark_rendered(start);
        frames.pause();
        assert!(frames.is_paused());
        assert!(!frames.ready_for_frame(start + Duration::from_secs(10)));
        assert_eq!(frames.next_deadline(), None);
    }
}
