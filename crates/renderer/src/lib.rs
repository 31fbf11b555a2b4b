//! Renderer crate for ripplewall.
//!
//! Draws an image slideshow through a simulated water surface. The overall
//! flow is:
//!
//! ```text
//!   ripplewall CLI
//!          │ SurfaceConfig
//!          ▼
//!   Renderer::run ──▶ WaterSurface ──▶ winit event loop ──▶ render_frame()
//!                          │                                     │
//!                          ├─ ImageLoader (worker thread)        ├─ WaterScene::tick ─▶ FrameSnapshot
//!                          └─ Lifecycle (ordered teardown)       └─ GpuState::render ─▶ WaterParams UBO
//! ```
//!
//! `WaterScene` holds all time-dependent state (ripples, crossfade, slide
//! cycler, sweeps) and is independent of the GPU, which keeps it testable
//! with synthetic `Instant`s. `surface_model` is a CPU port of the fragment
//! shader used for still export.

mod compile;
pub mod geometry;
mod gpu;
pub mod input;
pub mod lifecycle;
pub mod loader;
pub mod ripples;
pub mod runtime;
pub mod scene;
mod surface;
pub mod surface_model;
pub mod transition;
mod types;
mod window;

pub use geometry::{plane_dimensions, PlaneSize};
pub use input::{BoundingRect, InputAdapter, InputOutcome};
pub use loader::{decode_image, ImageLoader, LoadError, LoadToken};
pub use ripples::{Ripple, RippleSlot, RippleStore, RIPPLE_SLOTS, SENTINEL_TIME};
pub use runtime::FrameScheduler;
pub use scene::{FrameSnapshot, SurfaceClock, SurfaceImage, WaterScene};
pub use surface::WaterSurface;
pub use transition::{TransitionController, TransitionPhase};
pub use types::{Antialiasing, CrossfadeCurve, RendererError, RippleLimits, SurfaceConfig};
pub use window::Renderer;
