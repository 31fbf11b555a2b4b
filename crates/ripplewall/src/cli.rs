use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use slideconfig::AntialiasSetting;

#[derive(Parser, Debug)]
#[command(
    name = "ripplewall",
    author,
    version,
    about = "Image slideshow rendered through an interactive water surface",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Images to show, in order. Replaces the list from the config file.
    #[arg(value_name = "IMAGE")]
    pub images: Vec<PathBuf>,

    /// Configuration file; defaults to `ripplewall.toml` in the config directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Time each slide stays on screen (e.g. `5s`, `7500ms`, `4.5`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub slide_duration: Option<Duration>,

    /// Crossfade length between slides.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub transition: Option<Duration>,

    /// Start cycling immediately instead of waiting for the first interaction.
    #[arg(long)]
    pub autostart: bool,

    /// Open a regular window instead of going fullscreen.
    #[arg(long)]
    pub windowed: bool,

    /// Window size when running windowed (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<AntialiasSetting>,

    /// Optional FPS cap (0 = follow the display).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Seed for the sweep jitter, for reproducible runs.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve and validate the configuration, print a summary and exit.
    Check(RunArgs),
    /// Render a single frame on the CPU and write it to a PNG.
    Still(StillArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StillArgs {
    /// Image to render; defaults to the first slide of the configuration.
    #[arg(value_name = "IMAGE")]
    pub image: Option<PathBuf>,

    /// Configuration file used when no IMAGE is given.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Destination PNG.
    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,

    /// Surface clock value in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 1.0)]
    pub time: f32,

    /// Ripple as `X,Y,T` (normalized position, creation time in seconds). Repeatable.
    #[arg(long = "ripple", value_name = "X,Y,T", value_parser = parse_ripple)]
    pub ripples: Vec<RippleArg>,

    /// Crossfade mix towards `--next` (0..1).
    #[arg(long, value_name = "MIX", default_value_t = 0.0, value_parser = parse_unit)]
    pub mix: f32,

    /// Incoming image for the crossfade; defaults to IMAGE.
    #[arg(long, value_name = "IMAGE")]
    pub next: Option<PathBuf>,

    /// Output size.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, default_value = "1280x720")]
    pub size: (u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RippleArg {
    pub x: f32,
    pub y: f32,
    pub created_at: f32,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_duration(value: &str) -> Result<Duration, String> {
    slideconfig::parse_duration(value)
}

pub fn parse_antialias(value: &str) -> Result<AntialiasSetting, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("anti-alias mode must not be empty".to_string());
    }
    trimmed
        .parse::<AntialiasSetting>()
        .map_err(|_| format!("invalid anti-alias mode '{trimmed}'; use auto/off or 2/4/8/16"))
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_ripple(value: &str) -> Result<RippleArg, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [x, y, t] = parts.as_slice() else {
        return Err(format!("expected X,Y,T but got '{value}'"));
    };
    let parse = |raw: &str, name: &str| {
        raw.parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("invalid ripple {name} '{raw}'"))
    };
    Ok(RippleArg {
        x: parse(*x, "x")?,
        y: parse(*y, "y")?,
        created_at: parse(*t, "time")?,
    })
}

fn parse_unit(value: &str) -> Result<f32, String> {
    let parsed = value
        .trim()
        .parse::<f32>()
        .map_err(|_| format!("invalid number '{value}'"))?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(format!("{parsed} is outside 0..1"));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_size("640 X 480").unwrap(), (640, 480));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("1280").is_err());
    }

    #[test]
    fn parses_ripples() {
        assert_eq!(
            parse_ripple("0.5, 0.25, 1.5").unwrap(),
            RippleArg {
                x: 0.5,
                y: 0.25,
                created_at: 1.5
            }
        );
        assert!(parse_ripple("0.5,0.25").is_err());
        assert!(parse_ripple("a,b,c").is_err());
        assert!(parse_ripple("nan,0,0").is_err());
    }

    #[test]
    fn parses_antialias_modes() {
        assert_eq!(parse_antialias("auto").unwrap(), AntialiasSetting::Auto);
        assert_eq!(parse_antialias("4").unwrap(), AntialiasSetting::Samples4);
        assert!(parse_antialias("3").is_err());
        assert!(parse_antialias("").is_err());
    }

    #[test]
    fn run_args_are_the_default_command() {
        let cli = Cli::try_parse_from([
            "ripplewall",
            "a.png",
            "b.png",
            "--slide-duration",
            "7s",
            "--windowed",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.images.len(), 2);
        assert_eq!(cli.run.slide_duration, Some(Duration::from_secs(7)));
        assert!(cli.run.windowed);
    }

    #[test]
    fn still_collects_repeated_ripples() {
        let cli = Cli::try_parse_from([
            "ripplewall",
            "still",
            "photo.png",
            "--out",
            "frame.png",
            "--ripple",
            "0.1,0.2,0.5",
            "--ripple",
            "0.9,0.8,0.7",
            "--mix",
            "0.5",
        ])
        .unwrap();
        let Some(Command::Still(args)) = cli.command else {
            panic!("expected still command");
        };
        assert_eq!(args.ripples.len(), 2);
        assert_eq!(args.size, (1280, 720));
        assert!((args.mix - 0.5).abs() < f32::EPSILON);
        assert!(Cli::try_parse_from(["ripplewall", "still", "--out", "f.png", "--mix", "2"]).is_err());
    }
}
