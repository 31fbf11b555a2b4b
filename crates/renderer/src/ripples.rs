use std::collections::VecDeque;
use std::time::Duration;

use bytemuck::{Pod, Zeroable};

pub use slideconfig::RIPPLE_SLOTS;

/// `created_at` written into unused slots. Far enough in the past that the
/// ripple's decay term is exactly zero.
pub const SENTINEL_TIME: f32 = -999.0;

/// A single disturbance on the surface, timestamped on the surface clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ripple {
    pub x: f32,
    pub y: f32,
    pub created_at: f32,
}

/// One `vec4` entry of the ripple uniform array: `(x, y, created_at, 0)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RippleSlot {
    pub x: f32,
    pub y: f32,
    pub created_at: f32,
    pub _pad: f32,
}

impl RippleSlot {
    pub const SENTINEL: RippleSlot = RippleSlot {
        x: 0.0,
        y: 0.0,
        created_at: SENTINEL_TIME,
        _pad: 0.0,
    };

    pub fn is_sentinel(&self) -> bool {
        self.created_at == SENTINEL_TIME
    }
}

impl From<Ripple> for RippleSlot {
    fn from(ripple: Ripple) -> Self {
        Self {
            x: ripple.x,
            y: ripple.y,
            created_at: ripple.created_at,
            _pad: 0.0,
        }
    }
}

/// Bounded, oldest-first collection of live ripples.
///
/// The store is the only owner of ripple lifetime: insertion past capacity
/// evicts the oldest entry and [`RippleStore::prune`] drops anything older
/// than `max_age`. Every mutation bumps [`RippleStore::revision`] so callers
/// can cache the exported uniform array.
#[derive(Debug, Clone)]
pub struct RippleStore {
    ripples: VecDeque<Ripple>,
    capacity: usize,
    max_age: f32,
    revision: u64,
}

impl RippleStore {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        let capacity = capacity.clamp(1, RIPPLE_SLOTS);
        Self {
            ripples: VecDeque::with_capacity(capacity),
            capacity,
            max_age: max_age.as_secs_f32(),
            revision: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_age(&self) -> f32 {
        self.max_age
    }

    pub fn len(&self) -> usize {
        self.ripples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ripples.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ripple> {
        self.ripples.iter()
    }

    /// Appends a ripple at normalized `(x, y)`. Coordinates are clamped into
    /// `[0, 1]`; non-finite values collapse to 0.
    pub fn add(&mut self, x: f32, y: f32, now: f32) {
        self.ripples.push_back(Ripple {
            x: clamp_unit(x),
            y: clamp_unit(y),
            created_at: now,
        });
        while self.ripples.len() > self.capacity {
            self.ripples.pop_front();
        }
        self.revision = self.revision.wrapping_add(1);
    }

    /// Drops ripples whose age reached `max_age`. Returns how many were
    /// removed.
    pub fn prune(&mut self, now: f32) -> usize {
        let before = self.ripples.len();
        let max_age = self.max_age;
        self.ripples
            .retain(|ripple| now - ripple.created_at < max_age);
        let removed = before - self.ripples.len();
        if removed > 0 {
            self.revision = self.revision.wrapping_add(1);
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.ripples.is_empty() {
            self.ripples.clear();
            self.revision = self.revision.wrapping_add(1);
        }
    }

    /// Fixed-size uniform view: live ripples oldest first, then sentinels.
    pub fn export(&self) -> [RippleSlot; RIPPLE_SLOTS] {
        let mut slots = [RippleSlot::SENTINEL; RIPPLE_SLOTS];
        for (slot, ripple) in slots.iter_mut().zip(self.ripples.iter()) {
            *slot = RippleSlot::from(*ripple);
        }
        slots
    }
}

pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RippleStore {
        RippleStore::new(RIPPLE_SLOTS, Duration::from_secs(3))
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut store = store();
        for i in 0..7 {
            store.add(i as f32 / 10.0, 0.5, i as f32 * 0.1);
        }
        assert_eq!(store.len(), RIPPLE_SLOTS);
        let first = store.iter().next().copied().unwrap();
        assert!((first.x - 0.2).abs() < 1e-6);
        let times: Vec<f32> = store.iter().map(|r| r.created_at).collect();
        assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn prune_removes_expired_and_keeps_order() {
        let mut store = store();
        store.add(0.1, 0.1, 0.0);
        store.add(0.2, 0.2, 1.0);
        store.add(0.3, 0.3, 2.5);
        assert_eq!(store.prune(3.0), 1);
        let xs: Vec<f32> = store.iter().map(|r| r.x).collect();
        assert_eq!(xs, vec![0.2, 0.3]);
        for ripple in store.iter() {
            assert!(3.0 - ripple.created_at < 3.0);
        }
    }

    #[test]
    fn prune_is_idempotent() {
        let mut store = store();
        store.add(0.5, 0.5, 0.0);
        store.add(0.5, 0.5, 2.0);
        store.prune(4.0);
        let revision = store.revision();
        let snapshot: Vec<Ripple> = store.iter().copied().collect();
        assert_eq!(store.prune(4.0), 0);
        assert_eq!(store.revision(), revision);
        assert_eq!(store.iter().copied().collect::<Vec<_>>(), snapshot);
    }

    #[test]
    fn clamps_coordinates() {
        let mut store = store();
        store.add(-0.5, 1.5, 0.0);
        store.add(f32::NAN, 0.25, 0.0);
        let ripples: Vec<Ripple> = store.iter().copied().collect();
        assert_eq!((ripples[0].x, ripples[0].y), (0.0, 1.0));
        assert_eq!((ripples[1].x, ripples[1].y), (0.0, 0.25));
    }

    #[test]
    fn export_pads_with_sentinels() {
        let mut store = store();
        let empty = store.export();
        assert!(empty.iter().all(RippleSlot::is_sentinel));

        store.add(0.25, 0.75, 1.5);
        store.add(0.5, 0.5, 1.75);
        let slots = store.export();
        assert_eq!(slots.len(), RIPPLE_SLOTS);
        assert_eq!(slots[0].x, 0.25);
        assert_eq!(slots[0].created_at, 1.5);
        assert_eq!(slots[1].created_at, 1.75);
        assert!(slots[2..].iter().all(RippleSlot::is_sentinel));
        assert_eq!(slots[4].created_at, SENTINEL_TIME);
    }

    #[test]
    fn revision_tracks_mutations() {
        let mut store = store();
        assert_eq!(store.revision(), 0);
        store.add(0.1, 0.1, 0.0);
        assert_eq!(store.revision(), 1);
        store.prune(0.5);
        assert_eq!(store.revision(), 1);
        store.prune(3.0);
        assert_eq!(store.revision(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn capacity_is_bounded_by_slots() {
        assert_eq!(RippleStore::new(12, Duration::from_secs(3)).capacity(), RIPPLE_SLOTS);
        assert_eq!(RippleStore::new(0, Duration::from_secs(3)).capacity(), 1);
    }
}
