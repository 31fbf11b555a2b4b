use std::time::{Duration, Instant};

use crate::ripples::clamp_unit;

/// Client-space rectangle of the surface, in the same units as pointer
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Maps client coordinates to surface space: x grows rightwards, y grows
/// upwards, both clamped into `[0, 1]`. Returns `None` for a zero-area rect.
pub fn normalize(client_x: f64, client_y: f64, rect: BoundingRect) -> Option<(f32, f32)> {
    if rect.is_empty() {
        return None;
    }
    let x = (client_x - rect.left) / rect.width;
    let y = 1.0 - (client_y - rect.top) / rect.height;
    Some((clamp_unit(x as f32), clamp_unit(y as f32)))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputOutcome {
    /// Normalized position of the ripple to insert, if the event was accepted.
    pub ripple: Option<(f32, f32)>,
    /// The host should suppress its default handling (scroll/pan) for this
    /// event.
    pub consumed: bool,
    /// First accepted interaction of the session.
    pub first_interaction: bool,
}

impl InputOutcome {
    fn ignored(consumed: bool) -> Self {
        Self {
            ripple: None,
            consumed,
            first_interaction: false,
        }
    }
}

/// Turns pointer and touch motion into throttled ripple insertions.
#[derive(Debug, Clone)]
pub struct InputAdapter {
    throttle: Duration,
    last_accepted: Option<Instant>,
    interacted: bool,
}

impl InputAdapter {
    pub fn new(throttle: Duration) -> Self {
        Self {
            throttle,
            last_accepted: None,
            interacted: false,
        }
    }

    pub fn has_interacted(&self) -> bool {
        self.interacted
    }

    pub fn pointer_moved(
        &mut self,
        client_x: f64,
        client_y: f64,
        rect: BoundingRect,
        now: Instant,
    ) -> InputOutcome {
        self.accept(client_x, client_y, rect, now, false)
    }

    /// Same as [`InputAdapter::pointer_moved`] but always reports the event
    /// as consumed so the default touch pan does not fire.
    pub fn touch_moved(
        &mut self,
        client_x: f64,
        client_y: f64,
        rect: BoundingRect,
        now: Instant,
    ) -> InputOutcome {
        self.accept(client_x, client_y, rect, now, true)
    }

    fn accept(
        &mut self,
        client_x: f64,
        client_y: f64,
        rect: BoundingRect,
        now: Instant,
        consumed: bool,
    ) -> InputOutcome {
        let Some(position) = normalize(client_x, client_y, rect) else {
            return InputOutcome::ignored(consumed);
        };
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.throttle {
                return InputOutcome::ignored(consumed);
            }
        }
        self.last_accepted = Some(now);
        let first_interaction = !self.interacted;
        self.interacted = true;
        InputOutcome {
            ripple: Some(position),
            consumed,
            first_interaction,
        }
    }
}
