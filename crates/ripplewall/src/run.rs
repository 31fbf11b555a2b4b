use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use renderer::{Renderer, SurfaceConfig};
use scheduler::SweepPattern;
use slideconfig::SlideConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;

const DEFAULT_FILTER: &str = "warn,ripplewall=info,renderer=info,scheduler=info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error,winit=error";

pub fn initialise_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    CommandLine,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::CommandLine => f.write_str("command line"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: SlideConfig,
    pub source: ConfigSource,
}

/// Loads the explicit or default config file and applies CLI overrides on
/// top. Fails when neither supplies any images.
pub fn resolve_config(args: &RunArgs, paths: &AppPaths) -> Result<ResolvedConfig> {
    let file = args
        .config
        .clone()
        .or_else(|| paths.existing_config_file());

    let (mut config, source) = match file {
        Some(path) => {
            let config = SlideConfig::read(&path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            (config, ConfigSource::File(path))
        }
        None if args.images.is_empty() => bail!(
            "no images given; pass IMAGE paths or create {}",
            paths.config_file().display()
        ),
        None => (
            SlideConfig::from_images(args.images.clone()),
            ConfigSource::CommandLine,
        ),
    };

    apply_overrides(&mut config, args);
    config
        .validate()
        .context("invalid configuration after applying command-line overrides")?;
    Ok(ResolvedConfig { config, source })
}

pub fn apply_overrides(config: &mut SlideConfig, args: &RunArgs) {
    if !args.images.is_empty() {
        config.slideshow.images = args.images.clone();
    }
    if let Some(duration) = args.slide_duration {
        config.slideshow.slide_duration = duration;
    }
    if let Some(transition) = args.transition {
        config.slideshow.transition = transition;
    }
    if args.autostart {
        config.slideshow.autostart = true;
    }
    if args.windowed {
        config.render.fullscreen = false;
    }
    if let Some(antialias) = args.antialias {
        config.render.antialias = antialias;
    }
    if let Some(fps) = args.fps {
        config.render.fps = Some(fps);
    }
    if let Some(seed) = args.seed {
        config.sweep.seed = Some(seed);
    }
}

pub fn surface_config(resolved: &ResolvedConfig, args: &RunArgs) -> SurfaceConfig {
    let seed = resolved.config.sweep.seed.unwrap_or_else(rand::random);
    let mut surface = SurfaceConfig::from_config(&resolved.config, seed);
    if let Some(size) = args.size {
        surface.window_size = size;
    }
    surface
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let resolved = resolve_config(&args, &paths)?;
    tracing::debug!(
        config_dir = %paths.config_dir().display(),
        source = %resolved.source,
        "resolved configuration"
    );
    let surface = surface_config(&resolved, &args);
    tracing::info!(
        images = surface.images.len(),
        slide_ms = surface.slideshow_duration.as_millis() as u64,
        transition_ms = surface.transition_duration.as_millis() as u64,
        fullscreen = surface.fullscreen,
        autostart = surface.autostart,
        "starting ripplewall"
    );
    Renderer::new(surface).run()
}

pub fn check(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let resolved = resolve_config(&args, &paths)?;
    let config = &resolved.config;

    println!("Configuration: {}", resolved.source);
    println!("Images ({}):", config.slideshow.images.len());
    let mut readable = 0;
    for (index, image) in config.slideshow.images.iter().enumerate() {
        match image::image_dimensions(image) {
            Ok((width, height)) => {
                readable += 1;
                println!("  [{index}] {} ({width}x{height})", image.display());
            }
            Err(err) => println!("  [{index}] {} (unreadable: {err})", image.display()),
        }
    }
    println!(
        "Slideshow: {:?} per slide, {:?} {} crossfade, autostart {}",
        config.slideshow.slide_duration,
        config.slideshow.transition,
        curve_name(config),
        yes_no(config.slideshow.autostart)
    );
    println!(
        "Ripples: max {}, max age {:?}, throttle {:?}",
        config.ripples.max_ripples, config.ripples.max_age, config.ripples.throttle
    );

    let pattern = SweepPattern::from_settings(&config.sweep);
    let start = Instant::now();
    let seed = config.sweep.seed.unwrap_or_default();
    let sweep = pattern.schedule(start, &mut StdRng::seed_from_u64(seed));
    let offsets: Vec<String> = sweep
        .steps()
        .map(|step| format!("{}ms", step.at.duration_since(start).as_millis()))
        .collect();
    println!(
        "Sweep: {} steps, jitter {}, offsets {}",
        config.sweep.count,
        config.sweep.jitter,
        offsets.join(" ")
    );

    let fps = config
        .target_fps()
        .map(|fps| format!("{fps} fps cap"))
        .unwrap_or_else(|| "display rate".to_string());
    println!(
        "Render: {}, antialias {:?}, {fps}, max pixel ratio {}",
        if config.render.fullscreen {
            "fullscreen"
        } else {
            "windowed"
        },
        config.render.antialias,
        config.render.max_pixel_ratio
    );

    if readable == 0 {
        bail!("none of the configured images could be read");
    }
    Ok(())
}

fn curve_name(config: &SlideConfig) -> &'static str {
    match config.slideshow.curve {
        slideconfig::CurveSetting::Linear => "linear",
        slideconfig::CurveSetting::Smoothstep => "smoothstep",
        slideconfig::CurveSetting::EaseInOut => "ease-in-out",
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
