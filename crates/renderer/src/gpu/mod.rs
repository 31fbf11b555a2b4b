//! GPU side of the water surface.
//!
//! - `context` owns the wgpu instance, device and surface and reconfigures
//!   the swapchain on resize.
//! - `pipeline` holds the bind group layouts and compiles the water program.
//! - `textures` uploads decoded slides and shares one sampler between them.
//! - `mesh` builds the vertex buffer for the aspect-fitted image plane.
//! - `uniforms` mirrors the `WaterParams` block written every frame.
//! - `state` glues everything together behind `GpuState`.

mod context;
mod mesh;
mod pipeline;
mod state;
mod textures;
mod uniforms;

pub(crate) use state::GpuState;
pub(crate) use textures::ImageTexture;
