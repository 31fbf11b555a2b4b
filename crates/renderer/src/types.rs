use std::path::PathBuf;
use std::time::Duration;

use scheduler::SweepPattern;
use slideconfig::{AntialiasSetting, CurveSetting, SlideConfig};

use crate::loader::LoadError;

/// Shape of the crossfade between two slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossfadeCurve {
    Linear,
    Smoothstep,
    /// Quadratic ease-in-out.
    #[default]
    EaseInOut,
}

impl From<CurveSetting> for CrossfadeCurve {
    fn from(value: CurveSetting) -> Self {
        match value {
            CurveSetting::Linear => Self::Linear,
            CurveSetting::Smoothstep => Self::Smoothstep,
            CurveSetting::EaseInOut => Self::EaseInOut,
        }
    }
}

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    #[default]
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

impl From<AntialiasSetting> for Antialiasing {
    fn from(value: AntialiasSetting) -> Self {
        match value.samples() {
            None => Self::Auto,
            Some(1) => Self::Off,
            Some(count) => Self::Samples(count),
        }
    }
}

/// Ripple bookkeeping limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RippleLimits {
    pub max_ripples: usize,
    pub max_age: Duration,
    /// Minimum spacing between ripples produced by pointer or touch input.
    pub throttle: Duration,
}

impl Default for RippleLimits {
    fn default() -> Self {
        Self {
            max_ripples: crate::ripples::RIPPLE_SLOTS,
            max_age: Duration::from_secs(3),
            throttle: Duration::from_millis(100),
        }
    }
}

/// Everything the water surface needs at mount time.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    pub images: Vec<PathBuf>,
    pub slideshow_duration: Duration,
    pub transition_duration: Duration,
    pub curve: CrossfadeCurve,
    /// Start cycling as soon as the first image is up instead of waiting for
    /// the first pointer or touch interaction.
    pub autostart: bool,
    pub ripples: RippleLimits,
    pub sweep: SweepPattern,
    pub sweep_seed: u64,
    pub antialiasing: Antialiasing,
    /// Optional FPS cap; None = render on every display refresh.
    pub target_fps: Option<f32>,
    pub fullscreen: bool,
    /// Window size in physical pixels when not fullscreen.
    pub window_size: (u32, u32),
    pub max_pixel_ratio: f32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            slideshow_duration: Duration::from_millis(5000),
            transition_duration: Duration::from_millis(1000),
            curve: CrossfadeCurve::default(),
            autostart: false,
            ripples: RippleLimits::default(),
            sweep: SweepPattern::default(),
            sweep_seed: 0,
            antialiasing: Antialiasing::default(),
            target_fps: None,
            fullscreen: true,
            window_size: (1280, 720),
            max_pixel_ratio: 2.0,
        }
    }
}

impl SurfaceConfig {
    pub fn from_config(config: &SlideConfig, sweep_seed: u64) -> Self {
        Self {
            images: config.slideshow.images.clone(),
            slideshow_duration: config.slideshow.slide_duration,
            transition_duration: config.slideshow.transition,
            curve: config.slideshow.curve.into(),
            autostart: config.slideshow.autostart,
            ripples: RippleLimits {
                max_ripples: config.ripples.max_ripples,
                max_age: config.ripples.max_age,
                throttle: config.ripples.throttle,
            },
            sweep: SweepPattern::from_settings(&config.sweep),
            sweep_seed: config.sweep.seed.unwrap_or(sweep_seed),
            antialiasing: config.render.antialias.into(),
            target_fps: config.target_fps(),
            fullscreen: config.render.fullscreen,
            window_size: SurfaceConfig::default().window_size,
            max_pixel_ratio: config.render.max_pixel_ratio,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    /// GPU or windowing resources could not be created. Nothing is rendered.
    #[error("{what} unavailable: {reason}")]
    ResourceUnavailable { what: &'static str, reason: String },
    /// An image could not be decoded. The slot is skipped from then on.
    #[error("failed to load image {}: {source}", path.display())]
    LoadFailure {
        index: usize,
        path: PathBuf,
        #[source]
        source: LoadError,
    },
    #[error(transparent)]
    Schedule(#[from] scheduler::SchedulerError),
}

impl RendererError {
    pub(crate) fn unavailable(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::ResourceUnavailable {
            what,
            reason: err.to_string(),
        }
    }
}
