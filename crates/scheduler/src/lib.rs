use std::collections::{BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use rand::prelude::*;
use slideconfig::{SlideConfig, SweepSettings};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("slideshow has no images")]
    EmptySlideshow,
    #[error("slide period must be greater than zero")]
    InvalidPeriod,
}

/// Slot change reported by [`ImageCycler::tick`] or [`ImageCycler::skip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub index: usize,
    pub at: Instant,
}

/// Periodic advance through a fixed list of image slots.
///
/// The cycler never touches images itself; it only decides which slot is
/// current and when the next one is due. Slots whose image failed to load are
/// marked absent and skipped.
#[derive(Debug, Clone)]
pub struct ImageCycler {
    index: usize,
    total: usize,
    period: Duration,
    deadline: Option<Instant>,
    absent: BTreeSet<usize>,
}

impl ImageCycler {
    pub fn new(total: usize, period: Duration) -> Result<Self, SchedulerError> {
        if total == 0 {
            return Err(SchedulerError::EmptySlideshow);
        }
        if period.is_zero() {
            return Err(SchedulerError::InvalidPeriod);
        }
        Ok(Self {
            index: 0,
            total,
            period,
            deadline: None,
            absent: BTreeSet::new(),
        })
    }

    pub fn from_config(config: &SlideConfig) -> Result<Self, SchedulerError> {
        Self::new(
            config.slideshow.images.len(),
            config.slideshow.slide_duration,
        )
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Arms the timer. Calling this again while running keeps the existing
    /// deadline. A period too long to represent never fires.
    pub fn start(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = now.checked_add(self.period);
        }
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// Moves the current slot without touching the timer. Used when the
    /// initial image fails and a later slot is shown instead.
    pub fn set_index(&mut self, index: usize) {
        if index < self.total {
            self.index = index;
        }
    }

    pub fn tick(&mut self, now: Instant) -> Option<Advance> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }

        let mut next_deadline = deadline.checked_add(self.period);
        if next_deadline.is_some_and(|next| next <= now) {
            // Stalled for more than a whole period; resume the cadence from
            // here rather than firing a burst of catch-up advances.
            next_deadline = now.checked_add(self.period);
        }
        self.deadline = next_deadline;

        self.advance(deadline)
    }

    /// Manual advance. Restarts the period when the timer is running.
    pub fn skip(&mut self, now: Instant) -> Option<Advance> {
        if self.deadline.is_some() {
            self.deadline = now.checked_add(self.period);
        }
        self.advance(now)
    }

    pub fn mark_absent(&mut self, index: usize) {
        if index < self.total {
            self.absent.insert(index);
        }
    }

    pub fn is_absent(&self, index: usize) -> bool {
        self.absent.contains(&index)
    }

    /// First non-absent slot after `from`, wrapping around and ending with
    /// `from` itself.
    pub fn next_present(&self, from: usize) -> Option<usize> {
        (1..=self.total)
            .map(|step| (from + step) % self.total)
            .find(|idx| !self.absent.contains(idx))
    }

    fn advance(&mut self, at: Instant) -> Option<Advance> {
        if self.total <= 1 {
            return None;
        }
        let next = self.next_present(self.index)?;
        if next == self.index {
            return None;
        }
        self.index = next;
        Some(Advance { index: next, at })
    }
}

/// Shape of the scripted ripple sweep played at each slide change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPattern {
    pub count: usize,
    pub interval: Duration,
    pub jitter: f32,
}

impl Default for SweepPattern {
    fn default() -> Self {
        Self {
            count: 5,
            interval: Duration::from_millis(150),
            jitter: 0.3,
        }
    }
}

impl SweepPattern {
    pub fn from_settings(settings: &SweepSettings) -> Self {
        Self {
            count: settings.count.max(1),
            interval: settings.interval,
            jitter: settings.jitter.clamp(0.0, 1.0),
        }
    }

    /// Lays out every step of one sweep starting at `start`. Steps run left
    /// to right with a random vertical offset around the centre line.
    pub fn schedule<R: Rng + ?Sized>(&self, start: Instant, rng: &mut R) -> RippleSweep {
        let count = self.count.max(1);
        let steps = (0..count)
            .map_while(|i| {
                let x = if count == 1 {
                    0.5
                } else {
                    i as f32 / (count - 1) as f32
                };
                let y = 0.5 + (rng.gen::<f32>() - 0.5) * self.jitter;
                let offset = u32::try_from(i)
                    .ok()
                    .and_then(|i| self.interval.checked_mul(i))?;
                Some(SweepStep {
                    at: start.checked_add(offset)?,
                    x,
                    y,
                })
            })
            .collect();
        RippleSweep { steps }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepStep {
    pub at: Instant,
    pub x: f32,
    pub y: f32,
}

/// Pending steps of one sweep, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RippleSweep {
    steps: VecDeque<SweepStep>,
}

impl RippleSweep {
    pub fn drain_due(&mut self, now: Instant) -> Vec<SweepStep> {
        let mut due = Vec::new();
        while let Some(step) = self.steps.front() {
            if step.at > now {
                break;
            }
            if let Some(step) = self.steps.pop_front() {
                due.push(step);
            }
        }
        due
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.steps.front().map(|step| step.at)
    }

    pub fn is_finished(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> impl Iterator<Item = &SweepStep> {
        self.steps.iter()
    }
}

/// Owns the random source behind sweep jitter so runs can be replayed from a
/// seed.
pub struct SweepScheduler {
    pattern: SweepPattern,
    rng: StdRng,
    active: Vec<RippleSweep>,
}

impl SweepScheduler {
    pub fn new(pattern: SweepPattern, seed: u64) -> Self {
        Self {
            pattern,
            rng: StdRng::seed_from_u64(seed),
            active: Vec::new(),
        }
    }

    pub fn begin(&mut self, start: Instant) {
        let sweep = self.pattern.schedule(start, &mut self.rng);
        self.active.push(sweep);
    }

    /// Collects every step due at `now` across all running sweeps, ordered by
    /// scheduled time.
    pub fn drain_due(&mut self, now: Instant) -> Vec<SweepStep> {
        let mut due: Vec<SweepStep> = self
            .active
            .iter_mut()
            .flat_map(|sweep| sweep.drain_due(now))
            .collect();
        self.active.retain(|sweep| !sweep.is_finished());
        due.sort_by_key(|step| step.at);
        due
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.active
            .iter()
            .filter_map(RippleSweep::next_deadline)
            .min()
    }

    pub fn active(&self) -> usize {
        self.active.len()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}
