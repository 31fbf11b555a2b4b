//! Offline rendering of a single water frame through the CPU surface model.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::RgbaImage;
use renderer::geometry::aspect_of;
use renderer::surface_model::{render_frame, ImageSampler, ShadeParams};
use renderer::{decode_image, plane_dimensions, RendererError, RippleStore, RIPPLE_SLOTS};
use slideconfig::SlideConfig;

use crate::cli::StillArgs;
use crate::paths::AppPaths;

pub fn run(args: StillArgs) -> Result<()> {
    let config = load_config(&args)?;
    let image_path = match (&args.image, &config) {
        (Some(path), _) => path.clone(),
        (None, Some(config)) => config
            .slideshow
            .images
            .first()
            .cloned()
            .context("configuration lists no images")?,
        (None, None) => bail!("no IMAGE given and no configuration file found"),
    };

    let current = load(0, &image_path)?;
    let next = match &args.next {
        Some(path) => Some(load(1, path)?),
        None => None,
    };

    let frame = render_still(&args, config.as_ref(), &current, next.as_ref());
    frame
        .save(&args.out)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    tracing::info!(
        out = %args.out.display(),
        width = frame.width(),
        height = frame.height(),
        ripples = args.ripples.len(),
        "wrote still frame"
    );
    Ok(())
}

fn load_config(args: &StillArgs) -> Result<Option<SlideConfig>> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => AppPaths::discover()?.existing_config_file(),
    };
    path.map(|path| {
        SlideConfig::from_path(&path)
            .with_context(|| format!("failed to load config {}", path.display()))
    })
    .transpose()
}

fn load(index: usize, path: &Path) -> Result<RgbaImage> {
    decode_image(path).map_err(|source| {
        RendererError::LoadFailure {
            index,
            path: PathBuf::from(path),
            source,
        }
        .into()
    })
}

/// Shades one frame at `args.time`. `next` falls back to `current`, so a
/// non-zero mix without `--next` leaves the picture unchanged.
pub fn render_still(
    args: &StillArgs,
    config: Option<&SlideConfig>,
    current: &RgbaImage,
    next: Option<&RgbaImage>,
) -> RgbaImage {
    let ripple_settings = config.map(|config| config.ripples.clone()).unwrap_or_default();
    let mut store = RippleStore::new(
        ripple_settings.max_ripples.min(RIPPLE_SLOTS),
        ripple_settings.max_age,
    );
    let mut ripples = args.ripples.clone();
    ripples.sort_by(|a, b| a.created_at.total_cmp(&b.created_at));
    for ripple in ripples.iter().filter(|r| r.created_at <= args.time) {
        store.add(ripple.x, ripple.y, ripple.created_at);
    }
    store.prune(args.time);

    let params = ShadeParams {
        time: args.time,
        mix: args.mix,
        ripples: store.export(),
        ripple_count: store.len(),
    };
    let (width, height) = args.size;
    let plane = plane_dimensions(
        aspect_of(current.width(), current.height()),
        aspect_of(width, height),
    );
    let current_sampler = ImageSampler::new(current);
    let next_sampler = ImageSampler::new(next.unwrap_or(current));
    render_frame(width, height, plane, &params, &current_sampler, &next_sampler)
}
