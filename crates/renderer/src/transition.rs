use std::time::{Duration, Instant};

use crate::types::CrossfadeCurve;

impl CrossfadeCurve {
    /// Maps linear crossfade progress onto the mix factor handed to the
    /// shader. Progress outside `[0, 1]` is clamped.
    pub fn ease(self, progress: f32) -> f32 {
        let p = progress.clamp(0.0, 1.0);
        match self {
            Self::Linear => p,
            Self::Smoothstep => p * p * (3.0 - 2.0 * p),
            Self::EaseInOut if p < 0.5 => 2.0 * p * p,
            Self::EaseInOut => 1.0 - (2.0 - 2.0 * p).powi(2) / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    Active { started_at: Instant },
}

/// Result of handing a freshly loaded image to the controller.
#[derive(Debug, PartialEq)]
pub enum BeginOutcome<T> {
    /// No current image yet; the image was installed directly.
    Installed,
    /// A crossfade towards the image started.
    Started,
    /// Zero-length transition: the image replaced the current one at once.
    Swapped { released: Option<T> },
    /// A crossfade is in flight; the image waits for it to finish. An image
    /// that was already waiting is handed back.
    Queued { superseded: Option<T> },
}

#[derive(Debug, PartialEq)]
pub enum TransitionEvent<T> {
    Idle,
    Running,
    /// The incoming image became current. `started_next` is set when a queued
    /// image immediately began its own crossfade.
    Completed {
        released: Option<T>,
        started_next: bool,
    },
}

/// Two-slot crossfade state machine with a single-entry wait queue.
///
/// `Idle --begin--> Active --elapsed >= duration--> Idle`. An image arriving
/// while a crossfade runs never disturbs it; it waits and starts its own
/// crossfade at the moment the running one completes. Newer arrivals replace
/// the waiting image.
pub struct TransitionController<T> {
    duration: Duration,
    curve: CrossfadeCurve,
    current: Option<T>,
    next: Option<T>,
    queued: Option<T>,
    phase: TransitionPhase,
    mix: f32,
}

impl<T> TransitionController<T> {
    pub fn new(duration: Duration, curve: CrossfadeCurve) -> Self {
        Self {
            duration,
            curve,
            current: None,
            next: None,
            queued: None,
            phase: TransitionPhase::Idle,
            mix: 0.0,
        }
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, TransitionPhase::Active { .. })
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn next(&self) -> Option<&T> {
        self.next.as_ref()
    }

    pub fn queued(&self) -> Option<&T> {
        self.queued.as_ref()
    }

    pub fn begin(&mut self, image: T, now: Instant) -> BeginOutcome<T> {
        if self.current.is_none() {
            self.current = Some(image);
            return BeginOutcome::Installed;
        }
        if self.is_active() {
            let superseded = self.queued.replace(image);
            return BeginOutcome::Queued { superseded };
        }
        if self.duration.is_zero() {
            let released = self.current.replace(image);
            return BeginOutcome::Swapped { released };
        }
        self.next = Some(image);
        self.phase = TransitionPhase::Active { started_at: now };
        self.mix = 0.0;
        BeginOutcome::Started
    }

    pub fn tick(&mut self, now: Instant) -> TransitionEvent<T> {
        let TransitionPhase::Active { started_at } = self.phase else {
            return TransitionEvent::Idle;
        };
        let elapsed = now.saturating_duration_since(started_at);
        if elapsed < self.duration {
            let progress = elapsed.as_secs_f32() / self.duration.as_secs_f32();
            self.mix = self.curve.ease(progress);
            return TransitionEvent::Running;
        }

        let released = match self.next.take() {
            Some(next) => self.current.replace(next),
            None => None,
        };
        self.phase = TransitionPhase::Idle;
        self.mix = 0.0;

        let started_next = match self.queued.take() {
            Some(queued) => matches!(self.begin(queued, now), BeginOutcome::Started),
            None => false,
        };
        TransitionEvent::Completed {
            released,
            started_next,
        }
    }

    /// Drops every held image, returning them so the caller can release GPU
    /// resources.
    pub fn clear(&mut self) -> Vec<T> {
        self.phase = TransitionPhase::Idle;
        self.mix = 0.0;
        [self.current.take(), self.next.take(), self.queued.take()]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    /// Mix factors observed every 100 ms across a one second crossfade.
    fn mix_trace(curve: CrossfadeCurve) -> Vec<f32> {
        let start = Instant::now();
        let mut controller = TransitionController::new(ms(1000), curve);
        controller.begin("lake", start);
        controller.begin("dunes", start);
        (1..10u64)
            .map(|step| {
                controller.tick(start + ms(step * 100));
                controller.mix()
            })
            .collect()
    }

    #[test]
    fn linear_crossfade_tracks_elapsed_time() {
        for (step, mix) in mix_trace(CrossfadeCurve::Linear).into_iter().enumerate() {
            let expected = (step + 1) as f32 / 10.0;
            assert!((mix - expected).abs() < 1e-3, "step {step}: {mix}");
        }
    }

    #[test]
    fn smoothstep_crossfade_is_symmetric_around_midpoint() {
        let trace = mix_trace(CrossfadeCurve::Smoothstep);
        assert!((trace[4] - 0.5).abs() < 1e-3);
        for i in 0..4 {
            assert!((trace[i] + trace[8 - i] - 1.0).abs() < 1e-3, "pair {i}");
            assert!(trace[i] < trace[i + 1]);
        }
        assert!(trace[0] < 0.1, "slow start, got {}", trace[0]);
    }

    #[test]
    fn ease_in_out_crossfade_follows_quadratic_form() {
        for (step, mix) in mix_trace(CrossfadeCurve::EaseInOut).into_iter().enumerate() {
            let p = (step + 1) as f32 / 10.0;
            let expected = if p < 0.5 {
                2.0 * p * p
            } else {
                1.0 - (-2.0 * p + 2.0).powi(2) / 2.0
            };
            assert!((mix - expected).abs() < 1e-3, "p = {p}: {mix}");
        }
        assert_eq!(CrossfadeCurve::EaseInOut.ease(-1.0), 0.0);
        assert_eq!(CrossfadeCurve::EaseInOut.ease(2.0), 1.0);
    }

    #[test]
    fn first_image_is_installed() {
        let mut controller = TransitionController::new(ms(1000), CrossfadeCurve::EaseInOut);
        assert_eq!(controller.begin("a", Instant::now()), BeginOutcome::Installed);
        assert_eq!(controller.current(), Some(&"a"));
        assert_eq!(controller.phase(), TransitionPhase::Idle);
    }

    #[test]
    fn mix_is_monotone_and_completes_once() {
        let start = Instant::now();
        let mut controller = TransitionController::new(ms(1000), CrossfadeCurve::EaseInOut);
        controller.begin("a", start);
        assert_eq!(controller.begin("b", start), BeginOutcome::Started);
        assert_eq!(controller.mix(), 0.0);

        let mut last = 0.0;
        for step in 1..10u64 {
            assert_eq!(controller.tick(start + ms(step * 100)), TransitionEvent::Running);
            assert!(controller.mix() >= last);
            last = controller.mix();
        }

        let done = controller.tick(start + ms(1000));
        assert_eq!(
            done,
            TransitionEvent::Completed {
                released: Some("a"),
                started_next: false
            }
        );
        assert_eq!(controller.current(), Some(&"b"));
        assert_eq!(controller.next(), None);
        assert_eq!(controller.mix(), 0.0);
        assert_eq!(controller.tick(start + ms(1100)), TransitionEvent::Idle);
    }

    #[test]
    fn arrivals_during_fade_queue_without_retrigger() {
        let start = Instant::now();
        let mut controller = TransitionController::new(ms(1000), CrossfadeCurve::Linear);
        controller.begin("a", start);
        controller.begin("b", start);
        controller.tick(start + ms(400));
        let before = controller.mix();

        assert_eq!(
            controller.begin("c", start + ms(400)),
            BeginOutcome::Queued { superseded: None }
        );
        assert_eq!(
            controller.begin("d", start + ms(500)),
            BeginOutcome::Queued {
                superseded: Some("c")
            }
        );
        assert_eq!(controller.next(), Some(&"b"));
        assert_eq!(
            controller.phase(),
            TransitionPhase::Active { started_at: start }
        );
        controller.tick(start + ms(500));
        assert!(controller.mix() > before);

        let done = controller.tick(start + ms(1000));
        assert_eq!(
            done,
            TransitionEvent::Completed {
                released: Some("a"),
                started_next: true
            }
        );
        assert_eq!(controller.current(), Some(&"b"));
        assert_eq!(controller.next(), Some(&"d"));
        assert_eq!(
            controller.phase(),
            TransitionPhase::Active {
                started_at: start + ms(1000)
            }
        );
        assert_eq!(controller.queued(), None);
    }

    #[test]
    fn zero_duration_swaps_immediately() {
        let start = Instant::now();
        let mut controller = TransitionController::new(Duration::ZERO, CrossfadeCurve::EaseInOut);
        controller.begin("a", start);
        assert_eq!(
            controller.begin("b", start),
            BeginOutcome::Swapped {
                released: Some("a")
            }
        );
        assert_eq!(controller.current(), Some(&"b"));
        assert_eq!(controller.tick(start), TransitionEvent::Idle);
    }

    #[test]
    fn clear_returns_everything_held() {
        let start = Instant::now();
        let mut controller = TransitionController::new(ms(1000), CrossfadeCurve::EaseInOut);
        controller.begin("a", start);
        controller.begin("b", start);
        controller.begin("c", start);
        let mut released = controller.clear();
        released.sort();
        assert_eq!(released, vec!["a", "b", "c"]);
        assert_eq!(controller.phase(), TransitionPhase::Idle);
    }
}
