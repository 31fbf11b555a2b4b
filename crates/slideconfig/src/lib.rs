use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Number of ripple slots the surface shader exposes.
pub const RIPPLE_SLOTS: usize = 5;

/// Upper bound for every configured duration.
pub const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Slowest accepted frame cap; lower positive values are rejected.
pub const MIN_FPS: f32 = 0.1;

const MAX_SWEEP_STEPS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurveSetting {
    Linear,
    Smoothstep,
    #[default]
    EaseInOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples2,
    Samples4,
    Samples8,
    Samples16,
}

impl AntialiasSetting {
    pub fn samples(self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::Off => Some(1),
            Self::Samples2 => Some(2),
            Self::Samples4 => Some(4),
            Self::Samples8 => Some(8),
            Self::Samples16 => Some(16),
        }
    }
}

impl std::str::FromStr for AntialiasSetting {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_antialias(raw)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlideConfig {
    pub version: u32,
    pub slideshow: Slideshow,
    #[serde(default)]
    pub ripples: RippleSettings,
    #[serde(default)]
    pub sweep: SweepSettings,
    #[serde(default)]
    pub render: RenderSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Slideshow {
    #[serde(default)]
    pub images: Vec<PathBuf>,
    #[serde(
        default = "default_slide_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub slide_duration: Duration,
    #[serde(
        default = "default_transition",
        deserialize_with = "deserialize_duration"
    )]
    pub transition: Duration,
    #[serde(default)]
    pub curve: CurveSetting,
    #[serde(default)]
    pub autostart: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RippleSettings {
    #[serde(default = "default_max_ripples")]
    pub max_ripples: usize,
    #[serde(default = "default_max_age", deserialize_with = "deserialize_duration")]
    pub max_age: Duration,
    #[serde(default = "default_throttle", deserialize_with = "deserialize_duration")]
    pub throttle: Duration,
}

impl Default for RippleSettings {
    fn default() -> Self {
        Self {
            max_ripples: default_max_ripples(),
            max_age: default_max_age(),
            throttle: default_throttle(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepSettings {
    #[serde(default = "default_sweep_count")]
    pub count: usize,
    #[serde(
        default = "default_sweep_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub interval: Duration,
    #[serde(default = "default_jitter")]
    pub jitter: f32,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            count: default_sweep_count(),
            interval: default_sweep_interval(),
            jitter: default_jitter(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderSettings {
    #[serde(
        default = "default_antialias",
        deserialize_with = "deserialize_antialias"
    )]
    pub antialias: AntialiasSetting,
    #[serde(default)]
    pub fps: Option<f32>,
    #[serde(default = "default_fullscreen")]
    pub fullscreen: bool,
    #[serde(default = "default_pixel_ratio")]
    pub max_pixel_ratio: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            antialias: default_antialias(),
            fps: None,
            fullscreen: default_fullscreen(),
            max_pixel_ratio: default_pixel_ratio(),
        }
    }
}

fn default_slide_duration() -> Duration {
    Duration::from_millis(5000)
}

fn default_transition() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_ripples() -> usize {
    RIPPLE_SLOTS
}

fn default_max_age() -> Duration {
    Duration::from_secs(3)
}

fn default_throttle() -> Duration {
    Duration::from_millis(100)
}

fn default_sweep_count() -> usize {
    5
}

fn default_sweep_interval() -> Duration {
    Duration::from_millis(150)
}

fn default_jitter() -> f32 {
    0.3
}

fn default_antialias() -> AntialiasSetting {
    AntialiasSetting::Auto
}

fn default_fullscreen() -> bool {
    true
}

fn default_pixel_ratio() -> f32 {
    2.0
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration_opt(deserializer)?
        .ok_or_else(|| de::Error::custom("duration may not be empty"))
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_duration(v).map(Some).map_err(E::custom)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            seconds_to_duration(v).map(Some).map_err(E::custom)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_antialias<'de, D>(deserializer: D) -> Result<AntialiasSetting, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    match Helper::deserialize(deserializer)? {
        Helper::Str(raw) => parse_antialias(&raw).map_err(de::Error::custom),
        Helper::Num(value) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            parse_antialias(&value.to_string()).map_err(de::Error::custom)
        }
    }
}

/// Parses a duration given either as bare seconds (`"2.5"`) or a humantime
/// string (`"150ms"`, `"5s"`).
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();
    if let Ok(seconds) = trimmed.parse::<f64>() {
        return seconds_to_duration(seconds).map_err(|err| format!("invalid duration '{raw}': {err}"));
    }
    humantime::parse_duration(trimmed).map_err(|err| format!("invalid duration '{raw}': {err}"))
}

fn seconds_to_duration(seconds: f64) -> Result<Duration, String> {
    if seconds.is_nan() || seconds.is_sign_negative() {
        return Err("must be non-negative".into());
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| "value is too large".to_string())
}

fn parse_antialias(raw: &str) -> Result<AntialiasSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(AntialiasSetting::Off),
        "2" => Ok(AntialiasSetting::Samples2),
        "4" => Ok(AntialiasSetting::Samples4),
        "8" => Ok(AntialiasSetting::Samples8),
        "16" => Ok(AntialiasSetting::Samples16),
        other => Err(format!("invalid antialias setting '{other}'")),
    }
}

impl SlideConfig {
    /// Builds a configuration with default timings around the given images.
    pub fn from_images(images: Vec<PathBuf>) -> Self {
        Self {
            version: 1,
            slideshow: Slideshow {
                images,
                slide_duration: default_slide_duration(),
                transition: default_transition(),
                curve: CurveSetting::default(),
                autostart: false,
            },
            ripples: RippleSettings::default(),
            sweep: SweepSettings::default(),
            render: RenderSettings::default(),
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SlideConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates a config file; relative image paths are resolved
    /// against the file's directory.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`SlideConfig::from_path`] but leaves validation to the caller,
    /// so overrides can be layered on first.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: SlideConfig = toml::from_str(&contents)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_images(base);
        }
        Ok(config)
    }

    pub fn resolve_relative_images(&mut self, base: &Path) {
        for image in &mut self.slideshow.images {
            if image.is_relative() {
                *image = base.join(&*image);
            }
        }
    }

    /// Effective FPS cap; `fps = 0` means uncapped.
    pub fn target_fps(&self) -> Option<f32> {
        self.render.fps.filter(|fps| *fps > 0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let slideshow = &self.slideshow;
        if slideshow.images.is_empty() {
            return Err(ConfigError::Invalid(
                "slideshow must list at least one image".into(),
            ));
        }
        for image in &slideshow.images {
            if image.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "slideshow contains an image with an empty path".into(),
                ));
            }
        }
        if slideshow.slide_duration.is_zero() {
            return Err(ConfigError::Invalid(
                "slideshow.slide_duration must be greater than zero".into(),
            ));
        }
        check_upper_bound("slideshow.slide_duration", slideshow.slide_duration)?;
        check_upper_bound("slideshow.transition", slideshow.transition)?;

        let ripples = &self.ripples;
        if ripples.max_ripples == 0 || ripples.max_ripples > RIPPLE_SLOTS {
            return Err(ConfigError::Invalid(format!(
                "ripples.max_ripples must be between 1 and {RIPPLE_SLOTS}"
            )));
        }
        if ripples.max_age.is_zero() {
            return Err(ConfigError::Invalid(
                "ripples.max_age must be greater than zero".into(),
            ));
        }
        check_upper_bound("ripples.max_age", ripples.max_age)?;
        check_upper_bound("ripples.throttle", ripples.throttle)?;

        let sweep = &self.sweep;
        if sweep.count == 0 || sweep.count > MAX_SWEEP_STEPS {
            return Err(ConfigError::Invalid(format!(
                "sweep.count must be between 1 and {MAX_SWEEP_STEPS}"
            )));
        }
        check_upper_bound("sweep.interval", sweep.interval)?;
        if !(0.0..=1.0).contains(&sweep.jitter) {
            return Err(ConfigError::Invalid(
                "sweep.jitter must be within 0.0..=1.0".into(),
            ));
        }

        if let Some(fps) = self.render.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid(
                    "render.fps must be a finite number >= 0".into(),
                ));
            }
            if fps > 0.0 && fps < MIN_FPS {
                return Err(ConfigError::Invalid(format!(
                    "render.fps must be 0 (uncapped) or at least {MIN_FPS}"
                )));
            }
        }
        if !(self.render.max_pixel_ratio > 0.0) {
            return Err(ConfigError::Invalid(
                "render.max_pixel_ratio must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

fn check_upper_bound(field: &str, value: Duration) -> Result<(), ConfigError> {
    if value > MAX_DURATION {
        return Err(ConfigError::Invalid(format!(
            "{field} must not exceed {}",
            humantime::format_duration(MAX_DURATION)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[slideshow]
images = ["one.jpg", "two.jpg", "/srv/three.png"]
slide_duration = "8s"
transition = 1.5
curve = "smoothstep"
autostart = true

[ripples]
max_ripples = 4
throttle = "50ms"

[sweep]
count = 7
interval = "100ms"
seed = 9

[render]
antialias = 4
fps = 0
fullscreen = false
"#;

    #[test]
    fn parses_sample_config() {
        let config = SlideConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.slideshow.images.len(), 3);
        assert_eq!(config.slideshow.slide_duration, Duration::from_secs(8));
        assert_eq!(config.slideshow.transition, Duration::from_millis(1500));
        assert_eq!(config.slideshow.curve, CurveSetting::Smoothstep);
        assert!(config.slideshow.autostart);
        assert_eq!(config.ripples.max_ripples, 4);
        assert_eq!(config.ripples.max_age, Duration::from_secs(3));
        assert_eq!(config.ripples.throttle, Duration::from_millis(50));
        assert_eq!(config.sweep.count, 7);
        assert_eq!(config.sweep.seed, Some(9));
        assert_eq!(config.render.antialias, AntialiasSetting::Samples4);
        assert_eq!(config.target_fps(), None, "fps=0 should map to uncapped");
        assert!(!config.render.fullscreen);
    }

    #[test]
    fn applies_defaults() {
        let config = SlideConfig::from_toml_str(
            r#"
version = 1

[slideshow]
images = ["a.png"]
"#,
        )
        .unwrap();
        assert_eq!(config.slideshow.slide_duration, Duration::from_millis(5000));
        assert_eq!(config.slideshow.transition, Duration::from_millis(1000));
        assert_eq!(config.slideshow.curve, CurveSetting::EaseInOut);
        assert!(!config.slideshow.autostart);
        assert_eq!(config.ripples.max_ripples, RIPPLE_SLOTS);
        assert_eq!(config.ripples.throttle, Duration::from_millis(100));
        assert_eq!(config.sweep.count, 5);
        assert_eq!(config.sweep.interval, Duration::from_millis(150));
        assert!((config.sweep.jitter - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.render.antialias, AntialiasSetting::Auto);
        assert!(config.render.fullscreen);
    }

    #[test]
    fn rejects_empty_slideshow() {
        let err = SlideConfig::from_toml_str(
            r#"
version = 1

[slideshow]
images = []
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_more_ripples_than_shader_slots() {
        let err = SlideConfig::from_toml_str(
            r#"
version = 1

[slideshow]
images = ["a.png"]

[ripples]
max_ripples = 6
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = SlideConfig::from_toml_str(
            r#"
version = 2

[slideshow]
images = ["a.png"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_duration() {
        let err = SlideConfig::from_toml_str(
            r#"
version = 1

[slideshow]
images = ["a.png"]
slide_duration = "soon"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn parse_duration_accepts_seconds_and_humantime() {
        assert_eq!(parse_duration("2.5").unwrap(), Duration::from_millis(2500));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert!(parse_duration("-1").is_err());
    }

    #[test]
    fn oversized_float_durations_are_errors() {
        assert!(parse_duration("inf").is_err());
        assert!(parse_duration("1e300").is_err());
        let err = SlideConfig::from_toml_str(
            r#"
version = 1

[slideshow]
images = ["a.png"]
slide_duration = 1e300
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn durations_beyond_a_day_are_rejected() {
        let err = SlideConfig::from_toml_str(
            r#"
version = 1

[slideshow]
images = ["a.png"]
slide_duration = "500000000000years"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let mut config = SlideConfig::from_images(vec![PathBuf::from("a.png")]);
        config.sweep.interval = MAX_DURATION + Duration::from_secs(1);
        assert!(config.validate().is_err());
        config.sweep.interval = MAX_DURATION;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fps_cap_must_be_usable() {
        let mut config = SlideConfig::from_images(vec![PathBuf::from("a.png")]);
        for bad in [1e-30, f32::INFINITY, f32::NAN, -1.0] {
            config.render.fps = Some(bad);
            assert!(config.validate().is_err(), "fps {bad} accepted");
        }
        for good in [0.0, MIN_FPS, 60.0] {
            config.render.fps = Some(good);
            assert!(config.validate().is_ok(), "fps {good} rejected");
        }
    }

    #[test]
    fn from_path_resolves_relative_images() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ripplewall.toml");
        fs::write(&path, SAMPLE).unwrap();
        let config = SlideConfig::from_path(&path).expect("load config");
        assert_eq!(config.slideshow.images[0], dir.path().join("one.jpg"));
        assert_eq!(config.slideshow.images[2], PathBuf::from("/srv/three.png"));
    }

    #[test]
    fn from_path_reports_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = SlideConfig::from_path(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn read_defers_validation() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ripplewall.toml");
        fs::write(&path, "version = 1\n\n[slideshow]\nslide_duration = \"3s\"\n").unwrap();
        let config = SlideConfig::read(&path).expect("read config");
        assert!(config.slideshow.images.is_empty());
        assert!(config.validate().is_err());
        assert!(SlideConfig::from_path(&path).is_err());
    }

    #[test]
    fn from_images_is_valid() {
        let config = SlideConfig::from_images(vec![PathBuf::from("a.png")]);
        config.validate().expect("defaults validate");
    }
}
