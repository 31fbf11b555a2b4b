use bytemuck::{Pod, Zeroable};

use crate::ripples::{RippleSlot, RIPPLE_SLOTS};
use crate::scene::FrameSnapshot;

/// CPU mirror of the `WaterParams` std140 block in the water shaders.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct WaterUniforms {
    pub u_resolution: [f32; 2],
    pub u_time: f32,
    pub u_mix_factor: f32,
    pub u_aspect: f32,
    pub u_ripple_count: i32,
    pub u_padding0: [f32; 2],
    pub u_ripples: [RippleSlot; RIPPLE_SLOTS],
}

impl WaterUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            u_resolution: [width.max(1) as f32, height.max(1) as f32],
            u_time: 0.0,
            u_mix_factor: 0.0,
            u_aspect: width.max(1) as f32 / height.max(1) as f32,
            u_ripple_count: 0,
            u_padding0: [0.0; 2],
            u_ripples: [RippleSlot::SENTINEL; RIPPLE_SLOTS],
        }
    }

    pub fn apply<T>(&mut self, frame: &FrameSnapshot<T>) {
        self.u_resolution = frame.resolution;
        self.u_time = frame.time;
        self.u_mix_factor = frame.mix;
        self.u_aspect = frame.aspect;
        self.u_ripple_count = frame.ripple_count.min(RIPPLE_SLOTS) as i32;
        self.u_ripples = frame.ripples;
    }
}
